//! Harness Toggle Example
//!
//! Headless run of the harness: a pony stands in front of a cart, toggles the
//! harness on, tows the cart forward and then into a right turn, and finally
//! toggles the harness off again. Hitching, unhitching and the final
//! positions are logged.
//!
//! Run with: `cargo run --example harness_toggle`

use std::time::Duration;

use bevy::app::ScheduleRunnerPlugin;
use bevy::log::LogPlugin;
use bevy::prelude::*;
use bevy_rapier3d::prelude::*;
use harness_character_controller::prelude::*;
use harness_character_controller::rapier::Rapier3dCharacterBundle;

const CAPSULE_HALF_HEIGHT: f32 = 0.15;
const CAPSULE_RADIUS: f32 = 0.1;

/// Fixed ticks at which the script acts.
const HITCH_TICK: u32 = 30;
const TURN_TICK: u32 = 150;
const UNHITCH_TICK: u32 = 240;
const EXIT_TICK: u32 = 300;

fn main() {
    App::new()
        .add_plugins(MinimalPlugins.set(ScheduleRunnerPlugin::run_loop(
            Duration::from_secs_f64(1.0 / 60.0),
        )))
        .add_plugins((LogPlugin::default(), TransformPlugin))
        .add_plugins(RapierPhysicsPlugin::<NoUserData>::default())
        .add_plugins(LocomotionPlugin::<Rapier3dBackend>::default())
        .init_resource::<Script>()
        .add_systems(Startup, setup)
        .add_systems(FixedUpdate, drive_pony.before(LocomotionSet::Commands))
        .add_systems(Update, report_hitching)
        .run();
}

#[derive(Component)]
struct Pony;

#[derive(Component)]
struct Cart;

#[derive(Resource, Default)]
struct Script {
    tick: u32,
}

fn setup(mut commands: Commands) {
    // Ground slab, top face at y = 0
    commands.spawn((
        Transform::from_xyz(0.0, -0.5, 0.0),
        RigidBody::Fixed,
        Collider::cuboid(20.0, 0.5, 20.0),
    ));

    // Cart with its harness point sticking out toward the pony
    let cart = commands
        .spawn((
            Cart,
            Transform::from_xyz(0.0, 0.1, 2.0),
            RigidBody::Dynamic,
            Collider::cuboid(0.2, 0.1, 0.3),
            Harness::new(Vec3::new(0.0, 0.15, -0.4)),
        ))
        .id();

    // Pony standing next to the harness point
    let pony = commands
        .spawn((
            Pony,
            Transform::from_xyz(0.0, CAPSULE_HALF_HEIGHT + CAPSULE_RADIUS + 0.002, 1.4),
            LocomotionConfig::player(),
            LocomotionState::default(),
            GroundSensor::default(),
            MovementCommand::default(),
            HarnessAccess(cart),
            Rapier3dCharacterBundle::rotation_locked(),
            Collider::capsule_y(CAPSULE_HALF_HEIGHT, CAPSULE_RADIUS),
        ))
        .id();

    // Waist the harness hangs from
    commands.spawn((
        Transform::from_xyz(0.0, 0.05, 0.08),
        HarnessReferencePoint { body: pony },
        ChildOf(pony),
    ));
}

fn drive_pony(
    mut script: ResMut<Script>,
    mut ponies: Query<(&mut MovementCommand, &Transform), With<Pony>>,
    carts: Query<&Transform, With<Cart>>,
    mut exit: EventWriter<AppExit>,
) {
    script.tick += 1;
    let tick = script.tick;
    let Ok((mut command, transform)) = ponies.single_mut() else {
        return;
    };

    if tick == HITCH_TICK || tick == UNHITCH_TICK {
        command.request_harness_toggle();
    }

    let towing = (HITCH_TICK..UNHITCH_TICK).contains(&tick);
    let turn = if tick >= TURN_TICK { 30.0 } else { 0.0 };
    if towing {
        command.set_motion(turn, 1.0);
    } else {
        command.set_motion(0.0, 0.0);
    }

    if tick == EXIT_TICK {
        if let Ok(cart) = carts.single() {
            info!(
                "pony at {:?}, cart at {:?}",
                transform.translation, cart.translation
            );
        }
        exit.write(AppExit::Success);
    }
}

fn report_hitching(hitched: Query<Entity, Added<Towing>>, mut unhitched: RemovedComponents<Towing>) {
    for pony in &hitched {
        info!("{pony:?} hitched to the cart");
    }
    for pony in unhitched.read() {
        info!("{pony:?} unhitched");
    }
}
