//! mousim daemon - headless simulation service.
//!
//! Runs the simulation core and exposes the collaborator API to UI clients
//! over a line-delimited JSON protocol on localhost:
//! - maze loading (files or generator output)
//! - the algorithm registry (which command a name maps to)
//! - run control: start/stop, pause, sim speed, dynamic options
//! - state snapshots and the algorithm's raw output
//!
//! Storage locations:
//! - Linux: ~/.local/share/mousim/
//! - Windows: %APPDATA%\mousim\
//! - MacOS: ~/Library/Application Support/mousim/

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use mousim::{
    Controller, DynamicOptions, InterfaceMode, Maze, MazeInfo, RunState, SimConfig, SimSnapshot,
    Simulation, SimulationClock, StaticOptions,
};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::RwLock;
use tracing::{error, info, warn};

mod paths;
mod registry;

use paths::AppPaths;
use registry::{AlgoEntry, Registry};

const LISTEN_ADDR: &str = "127.0.0.1:9877";
const OUTPUT_LOG_CAP: usize = 1000;

// ═══════════════════════════════════════════════════════════════════════════
// Protocol Messages
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
enum Request {
    GetState,
    LoadMaze { path: String },
    SetGeneratedMaze { text: String },
    ListAlgos,
    AddAlgo { name: String, dir_path: Option<PathBuf>, run_command: String },
    RemoveAlgo { name: String },
    Start { name: String, mode: String, speed_fraction: Option<f32> },
    Stop,
    SetPaused { paused: bool },
    SetSimSpeed { factor: f32 },
    SetDynamicOptions { options: DynamicOptions },
    GetOutput,
    Shutdown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
enum Response {
    State(Box<StateSnapshot>),
    Algos { names: Vec<String> },
    Output { lines: Vec<String> },
    Success { message: String },
    Error { message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StateSnapshot {
    run_state: String,
    interface_mode: Option<String>,
    paused: bool,
    sim_speed: f32,
    maze: Option<MazeInfo>,
    snapshot: SimSnapshot,
    static_options: Option<StaticOptions>,
    dynamic_options: Option<DynamicOptions>,
}

fn run_state_name(state: Option<RunState>) -> String {
    match state {
        None => "idle".to_string(),
        Some(RunState::Idle) => "idle".to_string(),
        Some(RunState::Initialized) => "initialized".to_string(),
        Some(RunState::Running) => "running".to_string(),
        Some(RunState::Stopped) => "stopped".to_string(),
        Some(RunState::Crashed) => "crashed".to_string(),
        Some(RunState::Finished) => "finished".to_string(),
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Daemon State
// ═══════════════════════════════════════════════════════════════════════════

type OutputLog = Arc<StdMutex<VecDeque<String>>>;

fn lock_log(log: &StdMutex<VecDeque<String>>) -> std::sync::MutexGuard<'_, VecDeque<String>> {
    log.lock().unwrap_or_else(PoisonError::into_inner)
}

struct DaemonState {
    sim: Simulation,
    controller: Option<Controller>,
    registry: Registry,
    paths: AppPaths,
    output: OutputLog,
}

impl DaemonState {
    fn new(sim: Simulation, registry: Registry, paths: AppPaths) -> Self {
        Self {
            sim,
            controller: None,
            registry,
            paths,
            output: Arc::new(StdMutex::new(VecDeque::new())),
        }
    }

    fn state_snapshot(&self) -> StateSnapshot {
        let controller = self.controller.as_ref();
        StateSnapshot {
            run_state: run_state_name(controller.map(Controller::state)),
            interface_mode: controller
                .and_then(Controller::interface_mode)
                .map(|mode| mode.as_str().to_string()),
            paused: self.sim.paused(),
            sim_speed: self.sim.sim_speed(),
            maze: self.sim.maze_info(),
            snapshot: self.sim.snapshot(),
            static_options: controller.and_then(Controller::static_options),
            dynamic_options: controller.and_then(Controller::dynamic_options),
        }
    }

    fn load_maze(&mut self, path: &str) -> Result<(), String> {
        let requested = PathBuf::from(path);
        let resolved = if requested.is_absolute() {
            requested
        } else {
            self.paths.maze_dir().join(requested)
        };
        let maze = Maze::from_file(&resolved).map_err(|e| e.to_string())?;
        self.replace_maze(maze);
        Ok(())
    }

    fn set_generated_maze(&mut self, text: &str) -> Result<(), String> {
        let maze = Maze::from_generated(text.as_bytes()).map_err(|e| e.to_string())?;
        self.replace_maze(maze);
        Ok(())
    }

    /// Loading a maze ends any active run before the swap.
    fn replace_maze(&mut self, maze: Maze) {
        if let Some(controller) = self.controller.take() {
            controller.request_stop();
        }
        self.sim.set_maze(maze);
    }

    fn start_run(
        &mut self,
        name: &str,
        mode: &str,
        speed_fraction: Option<f32>,
    ) -> Result<(), String> {
        let mode = match mode {
            "discrete" => InterfaceMode::Discrete,
            "continuous" => InterfaceMode::Continuous,
            other => return Err(format!("unknown interface mode {other:?}")),
        };
        if let Some(controller) = &self.controller {
            if controller.state() == RunState::Running {
                return Err("a run is already active; stop it first".to_string());
            }
        }
        let entry = self.registry.get(name).map_err(|e| e.to_string())?.clone();

        let config = self.sim.config().clone();
        let mut statics = StaticOptions::new(&config, mode);
        if let Some(fraction) = speed_fraction {
            statics.speed_fraction = fraction.clamp(0.0, 1.0);
        }
        if let Some(info) = self.sim.maze_info() {
            statics.initial_direction = info.optimal_start_direction;
        }

        let mut controller = Controller::new(&config);
        controller
            .init(&self.sim, statics)
            .map_err(|e| e.to_string())?;

        // Forward the run's raw output into the bounded log. The thread ends
        // when the controller (and with it the sender) goes away.
        if let Some(rx) = controller.take_output() {
            let log = Arc::clone(&self.output);
            let _ = std::thread::Builder::new()
                .name("mousimd-output".to_string())
                .spawn(move || {
                    while let Ok(line) = rx.recv() {
                        let mut buffer = lock_log(&log);
                        buffer.push_back(line);
                        if buffer.len() > OUTPUT_LOG_CAP {
                            let _ = buffer.pop_front();
                        }
                    }
                });
        }

        controller.start(&entry.spec()).map_err(|e| e.to_string())?;
        // Replacing the previous controller drops it, which tears down any
        // leftover process.
        self.controller = Some(controller);
        Ok(())
    }

    fn stop_run(&self) -> Result<(), String> {
        match &self.controller {
            Some(controller) => {
                controller.request_stop();
                Ok(())
            }
            None => Err("no run to stop".to_string()),
        }
    }

    /// Returns and clears the buffered algorithm output.
    fn drain_output(&self) -> Vec<String> {
        lock_log(&self.output).drain(..).collect()
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Client Handler
// ═══════════════════════════════════════════════════════════════════════════

async fn handle_client(
    stream: TcpStream,
    state: Arc<RwLock<DaemonState>>,
) -> Result<(), Box<dyn std::error::Error>> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines.next_line().await? {
        let request: Request = match serde_json::from_str(&line) {
            Ok(req) => req,
            Err(e) => {
                let resp = Response::Error { message: format!("Invalid request: {}", e) };
                writer.write_all(serde_json::to_string(&resp)?.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                continue;
            }
        };

        let shutdown = matches!(request, Request::Shutdown);
        let response = dispatch(request, &state).await;

        writer.write_all(serde_json::to_string(&response)?.as_bytes()).await?;
        writer.write_all(b"\n").await?;

        if shutdown {
            writer.flush().await?;
            info!("shutdown requested by client");
            std::process::exit(0);
        }
    }
    Ok(())
}

async fn dispatch(request: Request, state: &Arc<RwLock<DaemonState>>) -> Response {
    let ok = |message: &str| Response::Success { message: message.to_string() };
    let err = |message: String| Response::Error { message };

    match request {
        Request::GetState => {
            let s = state.read().await;
            Response::State(Box::new(s.state_snapshot()))
        }
        Request::LoadMaze { path } => {
            let mut s = state.write().await;
            match s.load_maze(&path) {
                Ok(()) => ok("maze loaded"),
                Err(message) => err(message),
            }
        }
        Request::SetGeneratedMaze { text } => {
            let mut s = state.write().await;
            match s.set_generated_maze(&text) {
                Ok(()) => ok("maze loaded"),
                Err(message) => err(message),
            }
        }
        Request::ListAlgos => {
            let s = state.read().await;
            Response::Algos { names: s.registry.names() }
        }
        Request::AddAlgo { name, dir_path, run_command } => {
            let mut s = state.write().await;
            match s.registry.add(AlgoEntry { name, dir_path, run_command }) {
                Ok(()) => ok("algorithm registered"),
                Err(e) => err(e.to_string()),
            }
        }
        Request::RemoveAlgo { name } => {
            let mut s = state.write().await;
            match s.registry.remove(&name) {
                Ok(()) => ok("algorithm removed"),
                Err(e) => err(e.to_string()),
            }
        }
        Request::Start { name, mode, speed_fraction } => {
            let mut s = state.write().await;
            match s.start_run(&name, &mode, speed_fraction) {
                Ok(()) => ok("run started"),
                Err(message) => err(message),
            }
        }
        Request::Stop => {
            let s = state.read().await;
            match s.stop_run() {
                Ok(()) => ok("stop requested"),
                Err(message) => err(message),
            }
        }
        Request::SetPaused { paused } => {
            let s = state.read().await;
            s.sim.set_paused(paused);
            ok(if paused { "paused" } else { "resumed" })
        }
        Request::SetSimSpeed { factor } => {
            let s = state.read().await;
            s.sim.set_sim_speed(factor);
            ok("speed updated")
        }
        Request::SetDynamicOptions { options } => {
            let s = state.read().await;
            s.sim.set_dynamic_options(options);
            ok("options updated")
        }
        Request::GetOutput => {
            let s = state.read().await;
            Response::Output { lines: s.drain_output() }
        }
        Request::Shutdown => ok("shutting down"),
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Main
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    // A bad configuration is fatal before any simulation state exists.
    let config = SimConfig::default();
    if let Err(e) = config.validate() {
        error!("invalid simulation configuration: {}", e);
        std::process::exit(1);
    }

    let paths = AppPaths::new()?;
    let registry = match Registry::load(paths.registry_file()) {
        Ok(registry) => registry,
        Err(e) => {
            warn!("could not load algorithm registry: {}", e);
            Registry::empty(paths.registry_file())
        }
    };

    let sim = Simulation::new(config);
    let _clock = SimulationClock::spawn(sim.clone());

    let state = Arc::new(RwLock::new(DaemonState::new(sim, registry, paths)));

    // Stop any running algorithm on Ctrl-C so no child process is orphaned.
    {
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let s = state.read().await;
                let _ = s.stop_run();
                info!("Ctrl-C: shutting down");
                std::process::exit(0);
            }
        });
    }

    let listener = TcpListener::bind(LISTEN_ADDR).await?;
    info!("mousim daemon listening on {}", LISTEN_ADDR);

    loop {
        let (stream, addr) = listener.accept().await?;
        info!("Client connected: {}", addr);
        let state_clone = Arc::clone(&state);

        tokio::spawn(async move {
            if let Err(e) = handle_client(stream, state_clone).await {
                error!("Client handler error: {}", e);
            }
        });
    }
}
