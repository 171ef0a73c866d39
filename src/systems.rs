//! Core locomotion systems.
//!
//! These systems turn movement commands and ground sensing into body
//! velocity and orientation. They are generic over the physics backend so
//! that different physics engines can be used.

use bevy::prelude::*;

use crate::backend::CharacterPhysicsBackend;
use crate::config::{LocomotionConfig, VerticalMotion};
use crate::detection::GroundSensor;
use crate::harness::{self, HarnessAccess};
use crate::intent::MovementCommand;
use crate::math::look_rotation;
use crate::state::{Airborne, Grounded, LocomotionState};

/// Resolve the edge events of this tick's movement commands.
///
/// A run toggle flips the run latch. A harness toggle attaches the character
/// to the harness it has access to, or releases whatever it tows. Releasing
/// also works when the towed load no longer exists.
pub fn process_command_edges<B: CharacterPhysicsBackend>(world: &mut World) {
    let edges: Vec<(Entity, MovementCommand, Option<HarnessAccess>, bool)> = world
        .query::<(
            Entity,
            &MovementCommand,
            Option<&HarnessAccess>,
            Option<&LocomotionState>,
        )>()
        .iter(world)
        .filter(|(_, command, _, _)| command.toggle_run || command.toggle_harness)
        .map(|(e, command, access, state)| {
            (
                e,
                *command,
                access.copied(),
                state.is_some_and(|s| s.is_pulling_load),
            )
        })
        .collect();

    for (entity, command, access, pulling) in edges {
        if command.toggle_run {
            if let Some(mut state) = world.get_mut::<LocomotionState>(entity) {
                state.run_latched = !state.run_latched;
            }
        }

        if !command.toggle_harness {
            continue;
        }
        if pulling {
            harness::release::<B>(world, entity);
            continue;
        }
        let Some(HarnessAccess(towed)) = access else {
            debug!("{entity:?} toggled a harness without HarnessAccess");
            continue;
        };
        harness::request_attach::<B>(world, towed, entity);
    }
}

/// Integrate forward speed, turning and orientation, and write velocity back.
///
/// Grounded characters align to the sampled ground normal and may jump.
/// Airborne characters slowly right themselves toward world up. Characters
/// towing a load can neither run nor jump; the suppressed flags are written
/// back to their command. Tuning values outside their supported range are
/// clamped before use.
pub fn apply_locomotion<B: CharacterPhysicsBackend>(world: &mut World) {
    let dt = B::get_fixed_timestep(world);

    let entities: Vec<(
        Entity,
        LocomotionConfig,
        GroundSensor,
        MovementCommand,
        LocomotionState,
    )> = world
        .query::<(
            Entity,
            &LocomotionConfig,
            Option<&GroundSensor>,
            &MovementCommand,
            &LocomotionState,
        )>()
        .iter(world)
        .map(|(e, config, sensor, command, state)| {
            (
                e,
                config.clamped(),
                sensor.copied().unwrap_or_default(),
                *command,
                *state,
            )
        })
        .collect();

    for (entity, config, sensor, mut command, mut state) in entities {
        let mut run = state.effective_run(command.run);
        let mut jump = command.jump;
        if state.is_pulling_load {
            run = false;
            jump = false;
            if command.run || command.jump {
                command.suppress_run_and_jump();
                if let Some(mut stored) = world.get_mut::<MovementCommand>(entity) {
                    *stored = command;
                }
            }
        }

        let forward_speed = state.step_forward(
            config.target_speed(command.throttle(), run),
            config.acceleration,
            dt,
        );

        let rotation = B::get_rotation(world, entity);
        let move_velocity = rotation * Vec3::NEG_Z * forward_speed;
        let mut velocity = B::get_velocity(world, entity);

        let (up, align_speed) = if sensor.is_grounded() {
            (sensor.ground_normal(), config.ground_align_speed)
        } else {
            (Vec3::Y, config.air_align_speed)
        };
        let right = rotation * Vec3::X;
        let target_rotation = look_rotation(up.cross(right), up);
        let mut rotation = rotation.slerp(target_rotation, (align_speed * dt).clamp(0.0, 1.0));

        if sensor.is_grounded() {
            if jump {
                velocity.y = config.jump_speed;
            } else if let VerticalMotion::Scripted { .. } = config.vertical_motion {
                // Press onto the ground harder the steeper it is.
                let slope = 1.0 - sensor.ground_normal().dot(Vec3::Y).clamp(0.0, 1.0);
                velocity.y = (-0.5 * slope + (1.0 - slope) * -0.01) / dt;
            }
        } else if let VerticalMotion::Scripted {
            gravity,
            gravity_fraction,
        } = config.vertical_motion
        {
            velocity.y += gravity.y * dt * gravity_fraction;
        }

        B::set_velocity(
            world,
            entity,
            Vec3::new(move_velocity.x, velocity.y, move_velocity.z),
        );

        let turn = state.step_turn(command.turn, &config, dt);
        rotation *= Quat::from_rotation_y(-turn.to_radians());
        B::set_rotation(world, entity, rotation.normalize());

        if let Some(mut stored) = world.get_mut::<LocomotionState>(entity) {
            *stored = state;
        }
    }
}

/// Sync state marker components based on the ground sensor.
pub fn sync_state_markers(
    mut commands: Commands,
    q: Query<(Entity, &GroundSensor, Has<Grounded>, Has<Airborne>)>,
) {
    for (entity, sensor, has_grounded, has_airborne) in &q {
        if sensor.is_grounded() && !has_grounded {
            commands.entity(entity).insert(Grounded).remove::<Airborne>();
        } else if !sensor.is_grounded() && !has_airborne {
            commands.entity(entity).insert(Airborne).remove::<Grounded>();
        }
    }
}

/// Clear movement command edge events at the end of each fixed tick.
pub fn reset_command_edges(mut q: Query<&mut MovementCommand>) {
    for mut command in &mut q {
        if command.toggle_run || command.toggle_harness {
            command.clear_edges();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::test_backend::{TestBackend, TestJoint, TestVelocity};
    use crate::detection::GroundNormal;
    use crate::harness::Harness;
    use crate::state::Towing;

    const DT: f32 = 1.0 / 60.0;
    const EPS: f32 = 1e-4;

    fn spawn_character(world: &mut World, position: Vec3, grounded: bool) -> Entity {
        let transform = Transform::from_translation(position);
        let mut sensor = GroundSensor::default();
        if grounded {
            sensor.set_grounded(None, GroundNormal::UP);
        }
        world
            .spawn((
                transform,
                GlobalTransform::from(transform),
                LocomotionConfig::default(),
                LocomotionState::new(),
                MovementCommand::new(),
                sensor,
                TestVelocity::default(),
            ))
            .id()
    }

    fn set_command(world: &mut World, entity: Entity, command: MovementCommand) {
        *world.get_mut::<MovementCommand>(entity).unwrap() = command;
    }

    fn velocity(world: &World, entity: Entity) -> Vec3 {
        world.get::<TestVelocity>(entity).unwrap().0
    }

    #[test]
    fn forward_command_accelerates_along_facing() {
        let mut world = World::new();
        let character = spawn_character(&mut world, Vec3::ZERO, true);
        set_command(
            &mut world,
            character,
            MovementCommand {
                forward: 1.0,
                ..default()
            },
        );

        apply_locomotion::<TestBackend>(&mut world);

        let config = LocomotionConfig::default();
        let v = velocity(&world, character);
        assert!((v.z + config.acceleration * DT).abs() < EPS);
        assert!(v.x.abs() < EPS);
        let state = world.get::<LocomotionState>(character).unwrap();
        assert!((state.forward_speed() - config.acceleration * DT).abs() < EPS);
    }

    #[test]
    fn velocity_keeps_engine_vertical_component() {
        let mut world = World::new();
        let character = spawn_character(&mut world, Vec3::ZERO, false);
        world.get_mut::<TestVelocity>(character).unwrap().0 = Vec3::new(3.0, -2.0, 3.0);

        apply_locomotion::<TestBackend>(&mut world);

        let v = velocity(&world, character);
        assert!((v.y + 2.0).abs() < EPS);
        assert!(v.x.abs() < EPS && v.z.abs() < EPS);
    }

    #[test]
    fn grounded_jump_sets_vertical_speed() {
        let mut world = World::new();
        let character = spawn_character(&mut world, Vec3::ZERO, true);
        world.get_mut::<TestVelocity>(character).unwrap().0 = Vec3::new(0.0, -0.3, 0.0);
        set_command(
            &mut world,
            character,
            MovementCommand {
                jump: true,
                ..default()
            },
        );

        apply_locomotion::<TestBackend>(&mut world);

        assert!((velocity(&world, character).y - 1.0).abs() < EPS);
    }

    #[test]
    fn airborne_jump_is_ignored() {
        let mut world = World::new();
        let character = spawn_character(&mut world, Vec3::ZERO, false);
        set_command(
            &mut world,
            character,
            MovementCommand {
                jump: true,
                ..default()
            },
        );

        apply_locomotion::<TestBackend>(&mut world);

        assert!(velocity(&world, character).y.abs() < EPS);
    }

    #[test]
    fn positive_turn_rotates_right() {
        let mut world = World::new();
        let character = spawn_character(&mut world, Vec3::ZERO, true);
        set_command(
            &mut world,
            character,
            MovementCommand {
                turn: 90.0,
                ..default()
            },
        );

        for _ in 0..10 {
            apply_locomotion::<TestBackend>(&mut world);
        }

        let forward = world.get::<Transform>(character).unwrap().rotation * Vec3::NEG_Z;
        assert!(forward.x > 0.0);
    }

    #[test]
    fn grounded_aligns_toward_ground_normal() {
        let mut world = World::new();
        let character = spawn_character(&mut world, Vec3::ZERO, true);
        let normal = Vec3::new(0.0, 1.0, -0.3).normalize();
        world.get_mut::<GroundSensor>(character).unwrap().set_grounded(
            None,
            GroundNormal {
                normal,
                valid: true,
            },
        );

        let before = (world.get::<Transform>(character).unwrap().rotation * Vec3::Y).dot(normal);
        apply_locomotion::<TestBackend>(&mut world);
        let after = (world.get::<Transform>(character).unwrap().rotation * Vec3::Y).dot(normal);

        assert!(after > before);
    }

    #[test]
    fn airborne_rights_toward_up() {
        let mut world = World::new();
        let character = spawn_character(&mut world, Vec3::ZERO, false);
        world.get_mut::<Transform>(character).unwrap().rotation = Quat::from_rotation_x(0.5);

        for _ in 0..600 {
            apply_locomotion::<TestBackend>(&mut world);
        }

        let up = world.get::<Transform>(character).unwrap().rotation * Vec3::Y;
        assert!(up.dot(Vec3::Y) > 0.999);
    }

    #[test]
    fn towing_suppresses_run_and_jump() {
        let mut world = World::new();
        let character = spawn_character(&mut world, Vec3::ZERO, true);
        world.get_mut::<LocomotionState>(character).unwrap().is_pulling_load = true;
        set_command(
            &mut world,
            character,
            MovementCommand {
                forward: 1.0,
                run: true,
                jump: true,
                ..default()
            },
        );

        for _ in 0..120 {
            apply_locomotion::<TestBackend>(&mut world);
        }

        let command = world.get::<MovementCommand>(character).unwrap();
        assert!(!command.run);
        assert!(!command.jump);
        let state = world.get::<LocomotionState>(character).unwrap();
        assert!((state.forward_speed() - LocomotionConfig::default().walk_speed).abs() < EPS);
        assert!(velocity(&world, character).y.abs() < EPS);
    }

    #[test]
    fn towing_overrides_run_latch() {
        let mut world = World::new();
        let character = spawn_character(&mut world, Vec3::ZERO, true);
        {
            let mut state = world.get_mut::<LocomotionState>(character).unwrap();
            state.is_pulling_load = true;
            state.run_latched = true;
        }
        set_command(
            &mut world,
            character,
            MovementCommand {
                forward: 1.0,
                ..default()
            },
        );

        for _ in 0..120 {
            apply_locomotion::<TestBackend>(&mut world);
        }

        let state = world.get::<LocomotionState>(character).unwrap();
        assert!((state.forward_speed() - 1.0).abs() < EPS);
    }

    #[test]
    fn scripted_vertical_motion_adheres_to_flat_ground() {
        let mut world = World::new();
        let character = spawn_character(&mut world, Vec3::ZERO, true);
        *world.get_mut::<LocomotionConfig>(character).unwrap() =
            LocomotionConfig::default().with_vertical_motion(VerticalMotion::scripted(1.0));

        apply_locomotion::<TestBackend>(&mut world);

        assert!((velocity(&world, character).y - (-0.01 / DT)).abs() < EPS);
    }

    #[test]
    fn scripted_vertical_motion_applies_gravity_in_air() {
        let mut world = World::new();
        let character = spawn_character(&mut world, Vec3::ZERO, false);
        *world.get_mut::<LocomotionConfig>(character).unwrap() =
            LocomotionConfig::default().with_vertical_motion(VerticalMotion::scripted(0.5));

        apply_locomotion::<TestBackend>(&mut world);

        assert!((velocity(&world, character).y - (-9.81 * DT * 0.5)).abs() < EPS);
    }

    #[test]
    fn run_toggle_flips_latch() {
        let mut world = World::new();
        let character = spawn_character(&mut world, Vec3::ZERO, true);
        world
            .get_mut::<MovementCommand>(character)
            .unwrap()
            .request_run_toggle();

        process_command_edges::<TestBackend>(&mut world);

        assert!(world.get::<LocomotionState>(character).unwrap().run_latched);
    }

    #[test]
    fn harness_toggle_attaches_then_detaches() {
        let mut world = World::new();
        let towed = world
            .spawn((Transform::default(), Harness::new(Vec3::new(0.0, 0.0, -0.5))))
            .id();
        let character = spawn_character(&mut world, Vec3::new(0.0, 0.0, -0.7), true);
        world.entity_mut(character).insert(HarnessAccess(towed));

        world
            .get_mut::<MovementCommand>(character)
            .unwrap()
            .request_harness_toggle();
        process_command_edges::<TestBackend>(&mut world);

        assert!(world.get::<TestJoint>(towed).is_some());
        assert!(world.get::<LocomotionState>(character).unwrap().is_pulling_load);

        process_command_edges::<TestBackend>(&mut world);

        assert!(world.get::<TestJoint>(towed).is_none());
        assert!(!world.get::<LocomotionState>(character).unwrap().is_pulling_load);
    }

    #[test]
    fn harness_toggle_out_of_range_changes_nothing() {
        let mut world = World::new();
        let towed = world
            .spawn((Transform::default(), Harness::new(Vec3::new(0.0, 0.0, -0.5))))
            .id();
        let character = spawn_character(&mut world, Vec3::new(0.0, 0.0, -1.0), true);
        world.entity_mut(character).insert(HarnessAccess(towed));
        world
            .get_mut::<MovementCommand>(character)
            .unwrap()
            .request_harness_toggle();

        process_command_edges::<TestBackend>(&mut world);

        assert!(world.get::<TestJoint>(towed).is_none());
        assert!(!world.get::<LocomotionState>(character).unwrap().is_pulling_load);
    }

    #[test]
    fn harness_toggle_releases_when_load_is_gone() {
        let mut world = World::new();
        let towed = world
            .spawn((Transform::default(), Harness::new(Vec3::new(0.0, 0.0, -0.5))))
            .id();
        let character = spawn_character(&mut world, Vec3::new(0.0, 0.0, -0.7), true);
        world.entity_mut(character).insert(HarnessAccess(towed));
        world
            .get_mut::<MovementCommand>(character)
            .unwrap()
            .request_harness_toggle();
        process_command_edges::<TestBackend>(&mut world);
        assert!(world.get::<Towing>(character).is_some());

        world.despawn(towed);
        process_command_edges::<TestBackend>(&mut world);

        assert!(!world.get::<LocomotionState>(character).unwrap().is_pulling_load);
        assert!(world.get::<Towing>(character).is_none());

        set_command(
            &mut world,
            character,
            MovementCommand {
                forward: 1.0,
                run: true,
                ..default()
            },
        );
        for _ in 0..120 {
            apply_locomotion::<TestBackend>(&mut world);
        }

        assert!(world.get::<MovementCommand>(character).unwrap().run);
        let state = world.get::<LocomotionState>(character).unwrap();
        assert!((state.forward_speed() - LocomotionConfig::default().run_speed).abs() < EPS);
    }

    #[test]
    fn out_of_range_config_is_clamped_before_use() {
        let mut world = World::new();
        let character = spawn_character(&mut world, Vec3::ZERO, true);
        *world.get_mut::<LocomotionConfig>(character).unwrap() =
            LocomotionConfig::default().with_acceleration(100.0);
        set_command(
            &mut world,
            character,
            MovementCommand {
                forward: 1.0,
                ..default()
            },
        );

        apply_locomotion::<TestBackend>(&mut world);

        let state = world.get::<LocomotionState>(character).unwrap();
        assert!((state.forward_speed() - 10.0 * DT).abs() < EPS);
    }

    #[test]
    fn markers_follow_sensor() {
        let mut app = App::new();
        app.add_systems(Update, sync_state_markers);
        let character = app.world_mut().spawn(GroundSensor::default()).id();

        app.update();
        assert!(app.world().get::<Airborne>(character).is_some());
        assert!(app.world().get::<Grounded>(character).is_none());

        app.world_mut()
            .get_mut::<GroundSensor>(character)
            .unwrap()
            .set_grounded(None, GroundNormal::UP);
        app.update();
        assert!(app.world().get::<Grounded>(character).is_some());
        assert!(app.world().get::<Airborne>(character).is_none());
    }

    #[test]
    fn edges_reset_after_tick() {
        let mut app = App::new();
        app.add_systems(Update, reset_command_edges);
        let mut command = MovementCommand::new();
        command.request_harness_toggle();
        command.set_motion(3.0, 1.0);
        let character = app.world_mut().spawn(command).id();

        app.update();

        let command = app.world().get::<MovementCommand>(character).unwrap();
        assert!(!command.toggle_harness);
        assert_eq!(command.turn, 3.0);
    }
}
