//! keydrag Daemon
//!
//! Main daemon process for the keydrag window-drag utility.
//!
//! Responsibilities:
//! - Install the global low-level keyboard hook
//! - Interpret modifier chords into gesture transitions
//! - Drive the geometry engine that moves/resizes the target window
//! - System tray icon and menu

mod config;
mod tray;

use anyhow::{Context, Result};
use config::Config;
use keydrag_core_gesture::{
    GeometryEngine, GestureInterpreter, Modifier, Transition, WindowSystem,
};
use keydrag_platform_win32::{
    acquire_instance_guard, install_keyboard_hook, modifier_from_vk, KeyEvent, Win32Error,
    Win32WindowSystem,
};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// Events that the daemon event loop processes.
enum DaemonEvent {
    /// A key press or release from the global keyboard hook.
    Key(KeyEvent),
    /// A tray menu event.
    Tray(tray::TrayEvent),
    /// Shutdown signal.
    Shutdown,
}

/// Connects the gesture interpreter to the geometry engine.
///
/// The interpreter decides WHAT should happen (begin, re-anchor, downgrade,
/// end); the engine does it. Pausing ends any in-flight gesture and resets
/// the interpreter so keys held across the pause cannot leave a half-tracked
/// chord behind.
struct GestureController<W: WindowSystem> {
    interpreter: GestureInterpreter,
    engine: GeometryEngine<W>,
    paused: bool,
}

impl<W: WindowSystem> GestureController<W> {
    fn new(window_system: W, config: &Config) -> Self {
        Self {
            interpreter: GestureInterpreter::new(config.gesture.release_policy.into()),
            engine: GeometryEngine::new(
                window_system,
                Duration::from_millis(config.gesture.poll_interval_ms),
            ),
            paused: false,
        }
    }

    fn handle_modifier(&mut self, modifier: Modifier, pressed: bool) {
        if self.paused {
            return;
        }

        let transition = if pressed {
            self.interpreter.key_down(modifier)
        } else {
            self.interpreter.key_up(modifier)
        };

        match transition {
            Some(Transition::Begin(mode)) => {
                info!("Gesture started: {:?}", mode);
                if let Err(e) = self.engine.begin(mode) {
                    warn!("Failed to start gesture: {}", e);
                }
            }
            Some(Transition::Rebase(mode)) => {
                debug!("Gesture re-anchored as {:?}", mode);
                if let Err(e) = self.engine.begin(mode) {
                    warn!("Failed to re-anchor gesture: {}", e);
                }
            }
            Some(Transition::Downgrade) => {
                debug!("Resize key released, continuing as move");
                self.engine.downgrade();
            }
            Some(Transition::End) => {
                info!("Gesture ended");
                self.engine.end();
            }
            None => {}
        }
    }

    /// Flip the paused state, ending any active gesture when pausing.
    fn toggle_pause(&mut self) -> bool {
        self.paused = !self.paused;
        if self.paused {
            self.engine.end();
            self.interpreter.reset();
        }
        self.paused
    }

    fn shutdown(&self) {
        self.engine.shutdown();
    }
}

/// Spawn a named forwarding thread that receives events from a std::sync::mpsc channel
/// and forwards them to a tokio mpsc sender. Returns the JoinHandle for graceful shutdown.
fn spawn_forwarding_thread<T: Send + 'static>(
    name: &str,
    receiver: std::sync::mpsc::Receiver<T>,
    sender: mpsc::Sender<DaemonEvent>,
    map_fn: impl Fn(T) -> DaemonEvent + Send + 'static,
) -> Result<std::thread::JoinHandle<()>> {
    let thread_name = name.to_string();
    std::thread::Builder::new()
        .name(thread_name.clone())
        .spawn(move || {
            while let Ok(event) = receiver.recv() {
                if sender.blocking_send(map_fn(event)).is_err() {
                    break; // Channel closed, daemon shutting down
                }
            }
        })
        .map_err(|e| anyhow::anyhow!("Failed to spawn {} thread: {}", thread_name, e))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (needed for log level)
    let mut config = Config::load().unwrap_or_else(|e| {
        // Can't use tracing yet, fall back to eprintln
        eprintln!("Failed to load configuration: {}. Using defaults.", e);
        Config::default()
    });

    // Initialize logging with configured log level
    let log_level = match config.behavior.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO, // default fallback for invalid values
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Validate and clamp config values
    let config_warnings = config.validate();
    for w in &config_warnings {
        warn!("Config: {} - {}", w.field, w.message);
    }

    info!("keydrag daemon starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    // Check if another instance is already running
    let _instance_guard = match acquire_instance_guard() {
        Ok(guard) => guard,
        Err(Win32Error::AlreadyRunning) => {
            error!("Another keydrag instance is already running");
            return Ok(());
        }
        Err(e) => return Err(e).context("Failed to acquire single-instance guard"),
    };

    info!(
        "Configuration loaded: poll_interval_ms={}, release_policy={:?}, log_level={}",
        config.gesture.poll_interval_ms, config.gesture.release_policy, config.behavior.log_level
    );

    // Create event channel
    let (event_tx, mut event_rx) = mpsc::channel::<DaemonEvent>(100);

    // Collect forwarding thread handles for graceful shutdown
    let mut thread_handles: Vec<std::thread::JoinHandle<()>> = Vec::new();

    // Install the global keyboard hook. Without it the daemon is inert, so
    // failure here is fatal.
    let (key_tx, key_rx) = std::sync::mpsc::channel::<KeyEvent>();
    let hook_handle =
        install_keyboard_hook(key_tx).context("Failed to install keyboard hook")?;

    match spawn_forwarding_thread("keyhook-fwd", key_rx, event_tx.clone(), DaemonEvent::Key) {
        Ok(handle) => thread_handles.push(handle),
        Err(e) => warn!("{}", e),
    }

    // Initialize system tray icon
    // Create an intermediate sync channel that bridges tray events to the async event loop
    let _tray_manager = {
        let (tray_sync_tx, tray_sync_rx) = std::sync::mpsc::channel();

        // Deliberately not joined on shutdown: the tray menu thread holds its
        // sender for the whole process lifetime, so this thread only exits
        // with the process.
        if let Err(e) =
            spawn_forwarding_thread("tray-fwd", tray_sync_rx, event_tx.clone(), DaemonEvent::Tray)
        {
            warn!("{}", e);
        }

        match tray::TrayManager::new(tray_sync_tx) {
            Ok(manager) => {
                info!("System tray icon initialized");
                Some(manager)
            }
            Err(e) => {
                warn!("Failed to create system tray icon: {}. Tray disabled.", e);
                None
            }
        }
    };

    // Install Ctrl+C handler so terminal kill triggers graceful shutdown
    {
        let shutdown_tx = event_tx.clone();
        tokio::spawn(async move {
            if let Ok(()) = tokio::signal::ctrl_c().await {
                info!("Ctrl+C received, initiating shutdown...");
                let _ = shutdown_tx.send(DaemonEvent::Shutdown).await;
            }
        });
    }

    let mut controller = GestureController::new(Win32WindowSystem, &config);

    info!("Ready. Hold Ctrl+Win (move) or Alt+Win (resize) and move the mouse.");

    // Main event loop
    loop {
        let event = match event_rx.recv().await {
            Some(e) => e,
            None => break,
        };

        match event {
            DaemonEvent::Key(key) => {
                // Non-modifier keys never reach the controller.
                if let Some(modifier) = modifier_from_vk(key.vk) {
                    controller.handle_modifier(modifier, key.pressed);
                }
            }
            DaemonEvent::Tray(tray_event) => match tray_event {
                tray::TrayEvent::TogglePause => {
                    let paused = controller.toggle_pause();
                    info!("Tray: Gestures {}", if paused { "paused" } else { "resumed" });
                }
                tray::TrayEvent::About => {
                    info!("Tray: About requested");
                    let _ = std::process::Command::new("cmd")
                        .args(["/c", "start", "", env!("CARGO_PKG_REPOSITORY")])
                        .spawn();
                }
                tray::TrayEvent::Exit => {
                    info!("Tray: Exit requested");
                    let _ = event_tx.send(DaemonEvent::Shutdown).await;
                }
            },
            DaemonEvent::Shutdown => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    // Stop the polling worker before tearing down the hook so no bounds are
    // applied during shutdown.
    controller.shutdown();

    // Dropping the hook handle stops the hook thread and closes the key
    // channel, which lets keyhook-fwd exit.
    drop(hook_handle);

    info!("Waiting for forwarding threads to exit...");
    for handle in thread_handles {
        let _ = handle.join();
    }

    info!("keydrag daemon shutting down.");
    Ok(())
}
