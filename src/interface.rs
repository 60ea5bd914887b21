//! Algorithm-facing interface layer.
//!
//! The only entry point algorithms have into the simulation. Two variants
//! interpret the shared command surface differently: the discrete variant
//! makes tile-atomic moves with synthetic timing and no physics, the
//! continuous variant drives wheel setpoints and simulated sensors while the
//! clock integrates. Construction picks the variant from the static options.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use crate::geometry::cast_ray;
use crate::maze::Direction;
use crate::options::{DynamicOptions, InterfaceMode, StaticOptions};
use crate::protocol::{Command, Response};
use crate::sim::{MazeWorld, MouseSlot, Simulation};

pub enum Interface {
    Discrete(DiscreteInterface),
    Continuous(ContinuousInterface),
}

impl Interface {
    pub(crate) fn new(sim: Simulation, statics: StaticOptions, cancel: Arc<AtomicBool>) -> Interface {
        let core = InterfaceCore { sim, statics, cancel };
        match statics.mode {
            InterfaceMode::Discrete => Interface::Discrete(DiscreteInterface { core }),
            InterfaceMode::Continuous => Interface::Continuous(ContinuousInterface { core }),
        }
    }

    fn core(&self) -> &InterfaceCore {
        match self {
            Interface::Discrete(i) => &i.core,
            Interface::Continuous(i) => &i.core,
        }
    }

    pub fn mode(&self) -> InterfaceMode {
        self.core().statics.mode
    }

    pub fn static_options(&self) -> &StaticOptions {
        &self.core().statics
    }

    pub fn dynamic_options(&self) -> Option<DynamicOptions> {
        self.core().sim.dynamic_options()
    }

    pub fn is_crashed(&self) -> bool {
        self.core()
            .sim
            .with_slot(|slot| slot.map(|s| s.stats.crashed()).unwrap_or(false))
    }

    /// Dispatches one algorithm command and produces its response line.
    pub fn handle(&self, command: &Command) -> Response {
        if let Some(response) = self.core().handle_common(command) {
            return response;
        }
        match self {
            Interface::Discrete(i) => i.handle(command),
            Interface::Continuous(i) => i.handle(command),
        }
    }

    /// Applies tile-entry effects to the tile the mouse currently occupies.
    /// Called once right after the mouse is placed, so the start tile is
    /// unfogged before the algorithm issues its first command.
    pub(crate) fn enter_current_tile(&self) {
        let core = self.core();
        let Some(world) = core.sim.world() else {
            return;
        };
        core.sim.with_slot(|slot| {
            if let Some(slot) = slot {
                let tile = slot.mouse.current_tile();
                apply_entry_effects(slot, &world, &core.statics, tile);
            }
        });
    }
}

struct InterfaceCore {
    sim: Simulation,
    statics: StaticOptions,
    cancel: Arc<AtomicBool>,
}

impl InterfaceCore {
    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Handles the commands both variants share; `None` means the command is
    /// variant-specific.
    fn handle_common(&self, command: &Command) -> Option<Response> {
        let response = match command {
            Command::Sleep { ms } => {
                if self.synthetic_sleep(*ms as f64 / 1000.0) {
                    Response::Ack
                } else {
                    Response::Error
                }
            }
            Command::DeclareWall { x, y, direction, present } => {
                self.mutate_slot(|slot| {
                    let both = slot.dynamic.declare_both_wall_halves;
                    slot.fog.declare_wall(*x, *y, *direction, *present, both);
                })
                .map(|_| Response::Ack)
                .unwrap_or(Response::Error)
            }
            Command::SetTileText { x, y, text } => {
                let capacity = self.statics.tile_text_capacity();
                self.mutate_slot(|slot| slot.fog.set_tile_text(*x, *y, text, capacity))
                    .map(|_| Response::Ack)
                    .unwrap_or(Response::Error)
            }
            Command::SetTileColor { x, y, color } => self
                .mutate_slot(|slot| slot.fog.set_tile_color(*x, *y, *color))
                .map(|_| Response::Ack)
                .unwrap_or(Response::Error),
            Command::MazeWidth => match self.sim.world() {
                Some(world) => Response::Integer(world.maze.width()),
                None => Response::Error,
            },
            Command::MazeHeight => match self.sim.world() {
                Some(world) => Response::Integer(world.maze.height()),
                None => Response::Error,
            },
            Command::CurrentXTile => self.omniscient(|slot| Response::Integer(slot.mouse.current_tile().0)),
            Command::CurrentYTile => self.omniscient(|slot| Response::Integer(slot.mouse.current_tile().1)),
            Command::CurrentDirection => {
                self.omniscient(|slot| Response::Direction(slot.mouse.current_direction()))
            }
            _ => return None,
        };
        Some(response)
    }

    /// Pose introspection is only answered when the application allows
    /// omniscience; algorithms are otherwise expected to track their own
    /// position.
    fn omniscient(&self, f: impl FnOnce(&MouseSlot) -> Response) -> Response {
        self.sim.with_slot(|slot| match slot {
            Some(slot) if slot.dynamic.allow_omniscience => f(slot),
            Some(_) => Response::Denied,
            None => Response::Error,
        })
    }

    /// Runs a mutation against the mouse slot unless the run is being torn
    /// down. The cancellation check and the mutation share one critical
    /// section, so no mutation lands after a stop request has returned.
    fn mutate_slot<R>(&self, f: impl FnOnce(&mut MouseSlot) -> R) -> Option<R> {
        self.sim.with_slot(|slot| {
            let slot = slot?;
            if self.cancelled() {
                return None;
            }
            Some(f(slot))
        })
    }

    /// Sleeps for `sim_secs` of simulated time, in small real-time slices
    /// that observe pause, the speed factor, and cancellation. Returns false
    /// when interrupted by a stop request.
    fn synthetic_sleep(&self, sim_secs: f64) -> bool {
        let slice = Duration::from_millis(self.sim.config().min_sleep_ms);
        let slice_secs = self.sim.config().min_sleep_ms as f64 / 1000.0;
        let mut remaining = sim_secs;
        while remaining > 0.0 {
            if self.cancelled() {
                return false;
            }
            if self.sim.paused() {
                thread::sleep(slice);
                continue;
            }
            thread::sleep(slice);
            remaining -= slice_secs * self.sim.sim_speed() as f64;
        }
        !self.cancelled()
    }

    fn wrong_mode(&self, command: &Command) -> Response {
        warn!(
            mode = self.statics.mode.as_str(),
            ?command,
            "command is not available in this interface mode"
        );
        Response::Error
    }
}

pub struct DiscreteInterface {
    core: InterfaceCore,
}

impl DiscreteInterface {
    fn handle(&self, command: &Command) -> Response {
        match command {
            Command::WallFront => self.wall_query(|d| d),
            Command::WallLeft => self.wall_query(Direction::left),
            Command::WallRight => self.wall_query(Direction::right),
            Command::MoveForward => self.move_forward(),
            Command::TurnLeft => self.turn(Direction::left),
            Command::TurnRight => self.turn(Direction::right),
            Command::SetWheelSpeeds { .. } | Command::ReadSensor { .. } => {
                self.core.wrong_mode(command)
            }
            _ => Response::Error,
        }
    }

    /// Reads maze truth for the wall on the given side of the mouse, and
    /// optionally records it as a declaration (declare-on-read).
    fn wall_query(&self, relative: impl Fn(Direction) -> Direction) -> Response {
        let Some(world) = self.core.sim.world() else {
            return Response::Error;
        };
        self.core
            .mutate_slot(|slot| {
                let (x, y) = slot.mouse.current_tile();
                let side = relative(slot.mouse.current_direction());
                let present = world.maze.has_wall(x, y, side);
                if slot.dynamic.declare_wall_on_read {
                    let both = slot.dynamic.declare_both_wall_halves;
                    slot.fog.declare_wall(x, y, side, present, both);
                }
                Response::Bool(present)
            })
            .unwrap_or(Response::Error)
    }

    fn move_forward(&self) -> Response {
        let Some(world) = self.core.sim.world() else {
            return Response::Error;
        };

        // Check the move against maze truth first: driving into a wall (or
        // off the maze) crashes without consuming synthetic time.
        let target = self.core.sim.with_slot(|slot| {
            let slot = slot?;
            if slot.stats.crashed() {
                return Some(None);
            }
            let (x, y) = slot.mouse.current_tile();
            let direction = slot.mouse.current_direction();
            if world.maze.has_wall(x, y, direction) {
                slot.stats.set_crashed();
                warn!(tile = ?(x, y), ?direction, "illegal move; mouse crashed");
                Some(None)
            } else {
                let (dx, dy) = direction.delta();
                Some(Some(((x as i64 + dx) as u32, (y as i64 + dy) as u32, direction)))
            }
        });
        let (nx, ny, direction) = match target {
            None => return Response::Error,
            Some(None) => return Response::Crash,
            Some(Some(step)) => step,
        };

        if !self.core.synthetic_sleep(self.tile_duration()) {
            return Response::Error;
        }

        self.core
            .mutate_slot(|slot| {
                slot.mouse.place_at_tile(nx, ny, direction);
                apply_entry_effects(slot, &world, &self.core.statics, (nx, ny));
            })
            .map(|_| Response::Ack)
            .unwrap_or(Response::Error)
    }

    fn turn(&self, rotate: impl Fn(Direction) -> Direction) -> Response {
        if self.core.sim.with_slot(|slot| slot.map(|s| s.stats.crashed())) == Some(true) {
            return Response::Crash;
        }
        if !self.core.synthetic_sleep(self.tile_duration() / 2.0) {
            return Response::Error;
        }
        self.core
            .mutate_slot(|slot| {
                let (x, y) = slot.mouse.current_tile();
                let facing = rotate(slot.mouse.current_direction());
                slot.mouse.place_at_tile(x, y, facing);
            })
            .map(|_| Response::Ack)
            .unwrap_or(Response::Error)
    }

    /// Simulated seconds one forward move takes at the configured speed.
    fn tile_duration(&self) -> f64 {
        1.0 / self.core.statics.discrete_speed(self.core.sim.config()) as f64
    }
}

pub struct ContinuousInterface {
    core: InterfaceCore,
}

impl ContinuousInterface {
    fn handle(&self, command: &Command) -> Response {
        match command {
            Command::SetWheelSpeeds { left, right } => {
                let limit = self
                    .core
                    .statics
                    .wheel_speed_limit(self.core.sim.config());
                self.core
                    .mutate_slot(|slot| {
                        slot.mouse
                            .set_wheel_speeds(left.clamp(-limit, limit), right.clamp(-limit, limit));
                    })
                    .map(|_| Response::Ack)
                    .unwrap_or(Response::Error)
            }
            Command::ReadSensor { index } => self.read_sensor(*index),
            Command::WallFront => self.wall_probe(0.0),
            Command::WallLeft => self.wall_probe(std::f32::consts::FRAC_PI_2),
            Command::WallRight => self.wall_probe(-std::f32::consts::FRAC_PI_2),
            Command::MoveForward | Command::TurnLeft | Command::TurnRight => {
                self.core.wrong_mode(command)
            }
            _ => Response::Error,
        }
    }

    /// Casts one sensor's ray fan against the walls and reports the nearest
    /// hit across the fan.
    fn read_sensor(&self, index: usize) -> Response {
        let Some(world) = self.core.sim.world() else {
            return Response::Error;
        };
        let edge_points = self.core.sim.config().sensor_edge_points;
        let reading = self.core.sim.with_slot(|slot| {
            let slot = slot?;
            let (rays, range) = slot.mouse.sensor_rays(index, edge_points)?;
            let mut nearest = range;
            for (origin, angle) in rays {
                nearest = nearest.min(cast_ray(origin, angle, range, &world.segments));
            }
            Some(nearest)
        });
        match reading {
            Some(distance) => Response::Number(distance),
            None => {
                warn!(index, "sensor read failed; no such sensor or no mouse");
                Response::Error
            }
        }
    }

    /// A wall query in continuous mode is a forward/left/right ray probe:
    /// anything within three quarters of a tile reads as a wall.
    fn wall_probe(&self, bearing: f32) -> Response {
        let Some(world) = self.core.sim.world() else {
            return Response::Error;
        };
        let pitch = self.core.sim.config().tile_pitch();
        self.core
            .sim
            .with_slot(|slot| {
                let slot = slot?;
                let (position, heading) = slot.mouse.pose();
                let distance = cast_ray(position, heading + bearing, pitch, &world.segments);
                Some(Response::Bool(distance < pitch * 0.75))
            })
            .unwrap_or(Response::Error)
    }
}

fn apply_entry_effects(
    slot: &mut MouseSlot,
    world: &MazeWorld,
    statics: &StaticOptions,
    tile: (u32, u32),
) {
    let (x, y) = tile;
    let options = slot.dynamic;
    if options.auto_clear_fog && slot.fog.discover(x, y) {
        debug!(tile = ?(x, y), "tile unfogged");
    }
    if options.auto_set_tile_text {
        if let Some(distance) = world.maze.distance(x, y) {
            slot.fog
                .set_tile_text(x, y, &distance.to_string(), statics.tile_text_capacity());
        }
    }
    if options.auto_set_tile_color {
        slot.fog.set_tile_color(x, y, 'g');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use crate::fog::WallDeclaration;
    use crate::maze::test_mazes::{official_16, open_maze};
    use crate::maze::Maze;
    use crate::mouse::{Mouse, MouseGeometry};
    use std::time::Instant;

    fn setup(maze_text: &str, mode: InterfaceMode) -> (Simulation, Interface, Arc<AtomicBool>) {
        let sim = Simulation::new(SimConfig::default());
        sim.set_maze(Maze::parse(maze_text).unwrap());
        let config = sim.config();
        let statics = StaticOptions::new(config, mode);
        let mouse = Mouse::new(
            MouseGeometry::standard(config),
            config,
            statics.initial_direction,
        );
        sim.set_mouse("", mouse).unwrap();
        // Keep synthetic delays negligible in tests.
        sim.set_sim_speed(100.0);
        let cancel = Arc::new(AtomicBool::new(false));
        let interface = Interface::new(sim.clone(), statics, Arc::clone(&cancel));
        interface.enter_current_tile();
        (sim, interface, cancel)
    }

    fn tile_of(sim: &Simulation) -> (u32, u32, Direction) {
        sim.with_slot(|slot| {
            let slot = slot.unwrap();
            let (x, y) = slot.mouse.current_tile();
            (x, y, slot.mouse.current_direction())
        })
    }

    #[test]
    fn discrete_scenario_reaches_expected_tile() {
        let (sim, interface, _) = setup(&official_16(&[]), InterfaceMode::Discrete);

        for command in [
            Command::MoveForward,
            Command::MoveForward,
            Command::TurnRight,
            Command::MoveForward,
        ] {
            assert_eq!(interface.handle(&command), Response::Ack);
        }

        assert_eq!(tile_of(&sim), (1, 2, Direction::East));
        assert!(!interface.is_crashed());
    }

    #[test]
    fn walled_move_crashes_without_moving() {
        let maze = open_maze(3, 3, &[(0, 0, Direction::North)]);
        let (sim, interface, _) = setup(&maze, InterfaceMode::Discrete);

        assert_eq!(interface.handle(&Command::MoveForward), Response::Crash);
        assert!(interface.is_crashed());
        assert_eq!(tile_of(&sim), (0, 0, Direction::North));
    }

    #[test]
    fn wall_queries_read_truth_and_declare() {
        let (sim, interface, _) = setup(&official_16(&[]), InterfaceMode::Discrete);

        // Official start cell: only north is open.
        assert_eq!(interface.handle(&Command::WallFront), Response::Bool(false));
        assert_eq!(interface.handle(&Command::WallRight), Response::Bool(true));
        assert_eq!(interface.handle(&Command::WallLeft), Response::Bool(true));

        // declare-on-read recorded the east wall on both halves.
        sim.with_slot(|slot| {
            let slot = slot.unwrap();
            assert_eq!(
                slot.fog.declaration(0, 0, Direction::East),
                WallDeclaration::Declared { present: true }
            );
            assert_eq!(
                slot.fog.declaration(1, 0, Direction::West),
                WallDeclaration::Declared { present: true }
            );
        });
    }

    #[test]
    fn start_tile_is_unfogged_on_entry() {
        let (sim, _interface, _) = setup(&official_16(&[]), InterfaceMode::Discrete);
        sim.with_slot(|slot| assert!(slot.unwrap().fog.is_discovered(0, 0)));
    }

    #[test]
    fn omniscience_gates_pose_introspection() {
        let (sim, interface, _) = setup(&official_16(&[]), InterfaceMode::Discrete);

        assert_eq!(interface.handle(&Command::CurrentXTile), Response::Denied);
        assert_eq!(interface.handle(&Command::MazeWidth), Response::Integer(16));

        let mut options = sim.dynamic_options().unwrap();
        options.allow_omniscience = true;
        sim.set_dynamic_options(options);

        assert_eq!(interface.handle(&Command::CurrentXTile), Response::Integer(0));
        assert_eq!(
            interface.handle(&Command::CurrentDirection),
            Response::Direction(Direction::North)
        );
    }

    #[test]
    fn discrete_mode_rejects_continuous_commands() {
        let (_, interface, _) = setup(&official_16(&[]), InterfaceMode::Discrete);
        assert_eq!(
            interface.handle(&Command::SetWheelSpeeds { left: 1.0, right: 1.0 }),
            Response::Error
        );
        assert_eq!(interface.handle(&Command::ReadSensor { index: 0 }), Response::Error);
    }

    #[test]
    fn continuous_mode_rejects_discrete_commands() {
        let (_, interface, _) = setup(&official_16(&[]), InterfaceMode::Continuous);
        assert_eq!(interface.handle(&Command::MoveForward), Response::Error);
        assert_eq!(interface.handle(&Command::TurnLeft), Response::Error);
    }

    #[test]
    fn wheel_setpoints_are_clamped_to_the_speed_fraction() {
        let (sim, interface, _) = setup(&official_16(&[]), InterfaceMode::Continuous);
        let limit = interface
            .static_options()
            .wheel_speed_limit(sim.config());

        assert_eq!(
            interface.handle(&Command::SetWheelSpeeds { left: 1e6, right: -1e6 }),
            Response::Ack
        );
        sim.with_slot(|slot| {
            let (left, right) = slot.unwrap().mouse.wheel_speeds();
            assert_eq!(left, limit);
            assert_eq!(right, -limit);
        });
    }

    #[test]
    fn sensor_readings_depend_on_facing() {
        let (sim, interface, _) = setup(&official_16(&[]), InterfaceMode::Continuous);
        let range = MouseGeometry::standard(sim.config()).sensors[0].range;

        // Facing north from the start tile: nothing ahead for two tiles.
        let open = match interface.handle(&Command::ReadSensor { index: 0 }) {
            Response::Number(d) => d,
            other => panic!("unexpected response {other:?}"),
        };
        assert!((open - range).abs() < 1e-4, "open reading {open}");

        // Turn to face the west boundary wall.
        sim.with_slot(|slot| {
            let slot = slot.unwrap();
            let (x, y) = slot.mouse.current_tile();
            slot.mouse.place_at_tile(x, y, Direction::West);
        });
        let blocked = match interface.handle(&Command::ReadSensor { index: 0 }) {
            Response::Number(d) => d,
            other => panic!("unexpected response {other:?}"),
        };
        assert!(blocked < 0.1, "blocked reading {blocked}");

        assert_eq!(interface.handle(&Command::ReadSensor { index: 99 }), Response::Error);
    }

    #[test]
    fn continuous_wall_probes_use_rays() {
        let (sim, interface, _) = setup(&official_16(&[]), InterfaceMode::Continuous);

        assert_eq!(interface.handle(&Command::WallFront), Response::Bool(false));
        assert_eq!(interface.handle(&Command::WallRight), Response::Bool(true));

        sim.with_slot(|slot| {
            let slot = slot.unwrap();
            slot.mouse.place_at_tile(0, 0, Direction::West);
        });
        assert_eq!(interface.handle(&Command::WallFront), Response::Bool(true));
    }

    #[test]
    fn sleep_observes_cancellation_quickly() {
        let (_, interface, cancel) = setup(&official_16(&[]), InterfaceMode::Discrete);
        let started = Instant::now();
        let canceller = {
            let cancel = Arc::clone(&cancel);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(30));
                cancel.store(true, Ordering::SeqCst);
            })
        };
        // 10 simulated minutes; must return as soon as the flag is set.
        let response = interface.handle(&Command::Sleep { ms: 600_000_000 });
        assert_eq!(response, Response::Error);
        assert!(started.elapsed() < Duration::from_secs(5));
        canceller.join().unwrap();
    }

    #[test]
    fn declarations_and_annotations_flow_through() {
        let (sim, interface, _) = setup(&official_16(&[]), InterfaceMode::Discrete);

        assert_eq!(
            interface.handle(&Command::DeclareWall {
                x: 3,
                y: 4,
                direction: Direction::North,
                present: true,
            }),
            Response::Ack
        );
        assert_eq!(
            interface.handle(&Command::SetTileText {
                x: 3,
                y: 4,
                text: "abcdefghijkl".to_string(),
            }),
            Response::Ack
        );
        assert_eq!(
            interface.handle(&Command::SetTileColor { x: 3, y: 4, color: 'b' }),
            Response::Ack
        );

        sim.with_slot(|slot| {
            let slot = slot.unwrap();
            assert_eq!(
                slot.fog.declaration(3, 4, Direction::North),
                WallDeclaration::Declared { present: true }
            );
            // Clamped to the tile text capacity (2 rows x 4 cols).
            assert_eq!(slot.fog.tile_text(3, 4), Some("abcdefgh"));
            assert_eq!(slot.fog.tile_color(3, 4), Some('b'));
        });
    }
}
