//! Run controller.
//!
//! Owns one running algorithm: spawns its process, dispatches its command
//! lines against the interface, forwards its plain output, and tears it down.
//! Stopping is cooperative first (a flag observed at every blocking point)
//! and forced second (the process is killed after a bounded grace period);
//! the trade deliberately favors liveness over leak-free worker shutdown.

use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, Command as ProcessCommand, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::SimConfig;
use crate::interface::Interface;
use crate::mouse::{Mouse, MouseGeometry};
use crate::options::{DynamicOptions, InterfaceMode, StaticOptions};
use crate::protocol::{parse_line, ParsedLine, Response};
use crate::sim::{lock, SimError, Simulation};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Initialized,
    Running,
    Stopped,
    Crashed,
    Finished,
}

/// What to run. Resolving a name to a command is the caller's business; the
/// controller only drives the process once told what it is.
#[derive(Debug, Clone)]
pub struct AlgoSpec {
    pub name: String,
    pub run_command: String,
    pub working_dir: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("operation requires state {expected:?}, but the controller is {actual:?}")]
    BadState { expected: RunState, actual: RunState },
    #[error(transparent)]
    Sim(#[from] SimError),
    #[error("failed to spawn algorithm process: {0}")]
    Spawn(std::io::Error),
}

pub struct Controller {
    config: SimConfig,
    state: Arc<Mutex<RunState>>,
    cancel: Arc<AtomicBool>,
    sim: Option<Simulation>,
    interface: Option<Arc<Interface>>,
    output_tx: Sender<String>,
    output_rx: Mutex<Option<Receiver<String>>>,
    child: Arc<Mutex<Option<Child>>>,
    worker_done: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl Controller {
    pub fn new(config: &SimConfig) -> Controller {
        let (output_tx, output_rx) = mpsc::channel();
        Controller {
            config: config.clone(),
            state: Arc::new(Mutex::new(RunState::Idle)),
            cancel: Arc::new(AtomicBool::new(false)),
            sim: None,
            interface: None,
            output_tx,
            output_rx: Mutex::new(Some(output_rx)),
            child: Arc::new(Mutex::new(None)),
            worker_done: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }

    pub fn state(&self) -> RunState {
        *lock(&self.state)
    }

    /// The stream of raw algorithm output (stdout lines that are not
    /// commands, plus all stderr), in emission order. Take it once.
    pub fn take_output(&self) -> Option<Receiver<String>> {
        lock(&self.output_rx).take()
    }

    /// True once the dispatch worker has fully unwound.
    pub fn worker_finished(&self) -> bool {
        self.worker_done.load(Ordering::SeqCst)
    }

    pub fn interface_mode(&self) -> Option<InterfaceMode> {
        self.interface.as_ref().map(|i| i.mode())
    }

    pub fn static_options(&self) -> Option<StaticOptions> {
        self.interface.as_ref().map(|i| *i.static_options())
    }

    pub fn dynamic_options(&self) -> Option<DynamicOptions> {
        self.interface.as_ref().and_then(|i| i.dynamic_options())
    }

    /// Binds this controller to a simulation: places a fresh mouse, clears
    /// fog and stats, and constructs the interface. Valid from idle or any
    /// terminal state; a running algorithm must be stopped first.
    pub fn init(&mut self, sim: &Simulation, statics: StaticOptions) -> Result<(), ControllerError> {
        let actual = self.state();
        if actual == RunState::Running {
            return Err(ControllerError::BadState { expected: RunState::Idle, actual });
        }

        let mouse = Mouse::new(
            MouseGeometry::standard(&self.config),
            &self.config,
            statics.initial_direction,
        );
        sim.remove_mouse();
        sim.set_mouse("", mouse)?;

        self.cancel = Arc::new(AtomicBool::new(false));
        self.worker_done = Arc::new(AtomicBool::new(false));
        let interface = Arc::new(Interface::new(
            sim.clone(),
            statics,
            Arc::clone(&self.cancel),
        ));
        interface.enter_current_tile();

        self.sim = Some(sim.clone());
        self.interface = Some(interface);
        *lock(&self.state) = RunState::Initialized;
        info!(mode = statics.mode.as_str(), "controller initialized");
        Ok(())
    }

    /// Spawns the algorithm process and the dispatch worker. Returns
    /// immediately; all blocking happens on the worker thread.
    pub fn start(&mut self, spec: &AlgoSpec) -> Result<(), ControllerError> {
        let actual = self.state();
        if actual != RunState::Initialized {
            return Err(ControllerError::BadState { expected: RunState::Initialized, actual });
        }
        let interface = match self.interface.as_ref() {
            Some(interface) => Arc::clone(interface),
            None => {
                return Err(ControllerError::BadState {
                    expected: RunState::Initialized,
                    actual: RunState::Idle,
                })
            }
        };

        let mut command = ProcessCommand::new("sh");
        command
            .arg("-c")
            .arg(&spec.run_command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &spec.working_dir {
            command.current_dir(dir);
        }

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(error) => {
                let _ = self
                    .output_tx
                    .send(format!("[process failed to start: {error}]"));
                warn!(name = %spec.name, %error, "algorithm process failed to start");
                return Err(ControllerError::Spawn(error));
            }
        };
        info!(name = %spec.name, command = %spec.run_command, "algorithm started");

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let stdin = child.stdin.take();
        *lock(&self.child) = Some(child);

        // stderr is forwarded verbatim on its own thread.
        if let Some(stderr) = stderr {
            let tx = self.output_tx.clone();
            let _ = thread::Builder::new()
                .name("mousim-algo-stderr".to_string())
                .spawn(move || {
                    for line in BufReader::new(stderr).lines() {
                        let Ok(line) = line else { break };
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                });
        }

        let worker_ctx = WorkerContext {
            interface,
            state: Arc::clone(&self.state),
            cancel: Arc::clone(&self.cancel),
            done: Arc::clone(&self.worker_done),
            output: self.output_tx.clone(),
            child: Arc::clone(&self.child),
        };
        // Transition before the worker exists so its own transitions
        // (crash, finish) never race a still-Initialized state.
        *lock(&self.state) = RunState::Running;
        let worker = thread::Builder::new()
            .name("mousim-algo-dispatch".to_string())
            .spawn(move || worker_ctx.run(stdout, stdin));
        let worker = match worker {
            Ok(worker) => worker,
            Err(error) => {
                *lock(&self.state) = RunState::Initialized;
                if let Some(child) = lock(&self.child).as_mut() {
                    let _ = child.kill();
                }
                return Err(ControllerError::Spawn(error));
            }
        };

        self.worker = Some(worker);
        Ok(())
    }

    /// Requests a cooperative stop and returns immediately. Once this call
    /// returns, no further interface mutation is attributed to the stopped
    /// algorithm; if the worker has not unwound after the grace period, the
    /// process is killed.
    pub fn request_stop(&self) {
        self.cancel.store(true, Ordering::SeqCst);

        // Synchronize with any dispatch in flight: its cancellation check and
        // mutation share the slot critical section, so draining that lock
        // once here fences all later mutations out.
        if let Some(sim) = &self.sim {
            sim.with_slot(|_| ());
        }

        {
            let mut state = lock(&self.state);
            if *state == RunState::Running {
                *state = RunState::Stopped;
            }
        }

        let grace = Duration::from_millis(self.config.stop_grace_period_ms);
        let done = Arc::clone(&self.worker_done);
        let child = Arc::clone(&self.child);
        let _ = thread::Builder::new()
            .name("mousim-algo-reaper".to_string())
            .spawn(move || {
                thread::sleep(grace);
                if done.load(Ordering::SeqCst) {
                    return;
                }
                if let Some(child) = lock(&child).as_mut() {
                    warn!("algorithm ignored stop request; killing process");
                    let _ = child.kill();
                }
            });
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.cancel.store(true, Ordering::SeqCst);
        if let Some(child) = lock(&self.child).as_mut() {
            let _ = child.kill();
        }
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

struct WorkerContext {
    interface: Arc<Interface>,
    state: Arc<Mutex<RunState>>,
    cancel: Arc<AtomicBool>,
    done: Arc<AtomicBool>,
    output: Sender<String>,
    child: Arc<Mutex<Option<Child>>>,
}

impl WorkerContext {
    fn run(
        self,
        stdout: Option<std::process::ChildStdout>,
        stdin: Option<std::process::ChildStdin>,
    ) {
        if let (Some(stdout), Some(stdin)) = (stdout, stdin) {
            self.dispatch_loop(stdout, stdin);
        }

        // Reap the process if it is still ours to reap.
        if let Some(mut child) = lock(&self.child).take() {
            if self.cancel.load(Ordering::SeqCst) {
                let _ = child.kill();
            }
            match child.wait() {
                Ok(status) => debug!(%status, "algorithm process exited"),
                Err(error) => warn!(%error, "failed to reap algorithm process"),
            }
        }

        {
            let mut state = lock(&self.state);
            if *state == RunState::Running {
                if self.interface.is_crashed() {
                    *state = RunState::Crashed;
                } else {
                    *state = RunState::Finished;
                    info!("algorithm finished on its own");
                }
            }
        }
        self.done.store(true, Ordering::SeqCst);
    }

    fn dispatch_loop(&self, stdout: std::process::ChildStdout, mut stdin: std::process::ChildStdin) {
        for line in BufReader::new(stdout).lines() {
            let Ok(line) = line else { break };
            if self.cancel.load(Ordering::SeqCst) {
                break;
            }

            let response = match parse_line(&line) {
                ParsedLine::Output => {
                    let _ = self.output.send(line);
                    continue;
                }
                ParsedLine::Malformed { verb } => {
                    warn!(%verb, "malformed algorithm command");
                    Response::Error
                }
                ParsedLine::Command(command) => {
                    if self.interface.is_crashed() {
                        // Crashed runs stop dispatching; every further
                        // request is answered with the crash sentinel.
                        Response::Crash
                    } else {
                        self.interface.handle(&command)
                    }
                }
            };

            if self.interface.is_crashed() {
                let mut state = lock(&self.state);
                if *state == RunState::Running {
                    *state = RunState::Crashed;
                    warn!("run crashed");
                }
            }

            // A dead reader is not our signal to stop: the algorithm may
            // have exited while residual commands are still buffered. EOF on
            // stdout ends the loop.
            if writeln!(stdin, "{}", response.render()).is_err() {
                debug!("algorithm stdin closed; response dropped");
            }

            if self.cancel.load(Ordering::SeqCst) {
                break;
            }
        }
    }
}
