//! Geometry engine: owns the active gesture session and the polling worker
//! that turns cursor motion into window bounds.
//!
//! The engine is deliberately platform-free; it reaches the OS only through
//! the [`WindowSystem`] trait, which keeps the whole gesture pipeline
//! testable without a desktop.

use crate::{apply_delta, Anchor, OpMode, Point, Rect, WindowHandle};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Default polling interval for the geometry worker (~60 Hz).
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(16);

/// Errors that can occur while driving a gesture.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Failed to spawn geometry worker: {0}")]
    WorkerSpawn(std::io::Error),
}

/// Platform access needed by the engine.
///
/// All methods are best-effort: a `None` or a swallowed failure degrades the
/// gesture (nothing happens) rather than erroring out, because the window
/// under manipulation can vanish at any time.
pub trait WindowSystem: Send + Sync + 'static {
    /// Current cursor position in screen coordinates.
    fn cursor_position(&self) -> Option<Point>;

    /// Resolve the top-level window a gesture starting at `cursor` should
    /// manipulate, bringing it to the foreground. Implementations fall back
    /// to the current foreground window when activation is refused.
    fn resolve_target(&self, cursor: Point) -> Option<WindowHandle>;

    /// Current outer bounds of the window.
    fn window_bounds(&self, window: WindowHandle) -> Option<Rect>;

    /// Apply new outer bounds. Failures are swallowed; the window may have
    /// been destroyed mid-gesture.
    fn apply_bounds(&self, window: WindowHandle, bounds: Rect);
}

/// The active gesture: which window, which operation, and the anchor the
/// operation is relative to.
#[derive(Debug, Clone, Copy)]
struct Session {
    target: WindowHandle,
    mode: OpMode,
    anchor: Anchor,
}

/// State shared between the engine handle and the polling worker.
struct EngineShared<W> {
    window_system: W,
    /// Set while a gesture is in progress. The compare-and-swap on this flag
    /// is what guarantees at most one worker is ever spawned per gesture.
    operating: AtomicBool,
    /// Bumped on every worker spawn. A worker exits as soon as the epoch no
    /// longer matches the one it was spawned with, so a stale worker from a
    /// just-ended gesture can never race a new one.
    epoch: AtomicU64,
    session: Mutex<Option<Session>>,
    poll_interval: Duration,
}

/// Drives the active gesture session.
///
/// `begin` captures the anchor and spawns the polling worker; `downgrade`
/// flips the session to move mid-flight; `end` cancels cooperatively. The
/// worker computes bounds purely from the anchor and the current cursor.
pub struct GeometryEngine<W: WindowSystem> {
    shared: Arc<EngineShared<W>>,
    worker: Mutex<Option<thread::JoinHandle<()>>>,
}

impl<W: WindowSystem> GeometryEngine<W> {
    /// Create an engine over the given window system.
    pub fn new(window_system: W, poll_interval: Duration) -> Self {
        Self {
            shared: Arc::new(EngineShared {
                window_system,
                operating: AtomicBool::new(false),
                epoch: AtomicU64::new(0),
                session: Mutex::new(None),
                poll_interval,
            }),
            worker: Mutex::new(None),
        }
    }

    /// Whether a gesture session is currently active.
    pub fn is_operating(&self) -> bool {
        self.shared.operating.load(Ordering::SeqCst)
    }

    /// Mode of the active session, if any.
    pub fn current_mode(&self) -> Option<OpMode> {
        lock(&self.shared.session).map(|s| s.mode)
    }

    /// Start a gesture, or re-anchor the active one in a new mode.
    ///
    /// Requesting the mode that is already active is a no-op: the session and
    /// its anchor are left untouched. Requesting the other mode replaces the
    /// session with a fresh anchor (current cursor, current window bounds)
    /// while the existing worker keeps polling.
    ///
    /// Failure to observe the cursor, resolve a target, or read its bounds
    /// silently ignores the gesture. Only worker spawn failure is an error.
    pub fn begin(&self, mode: OpMode) -> Result<(), EngineError> {
        if self.shared.operating.load(Ordering::SeqCst) {
            let same_mode = lock(&self.shared.session)
                .map(|s| s.mode == mode)
                .unwrap_or(false);
            if same_mode {
                return Ok(());
            }
        }

        let Some(cursor) = self.shared.window_system.cursor_position() else {
            debug!("Cursor position unavailable, ignoring gesture");
            return Ok(());
        };
        let Some(target) = self.shared.window_system.resolve_target(cursor) else {
            debug!("No target window at ({}, {}), ignoring gesture", cursor.x, cursor.y);
            return Ok(());
        };
        let Some(bounds) = self.shared.window_system.window_bounds(target) else {
            debug!("Could not read bounds of window {}, ignoring gesture", target);
            return Ok(());
        };

        *lock_mut(&self.shared.session) = Some(Session {
            target,
            mode,
            anchor: Anchor { cursor, bounds },
        });

        if self
            .shared
            .operating
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            // A worker is already polling; it picks up the new session on its
            // next iteration.
            debug!("Re-anchored active session as {:?}", mode);
            return Ok(());
        }

        let epoch = self.shared.epoch.fetch_add(1, Ordering::SeqCst) + 1;

        // Reap the previous worker. It was spawned under an older epoch, so
        // it is exiting (or already gone) regardless of the flag we just set.
        if let Some(handle) = lock_mut(&self.worker).take() {
            let _ = handle.join();
        }

        let shared = Arc::clone(&self.shared);
        match thread::Builder::new()
            .name("geometry-loop".to_string())
            .spawn(move || poll_loop(shared, epoch))
        {
            Ok(handle) => {
                *lock_mut(&self.worker) = Some(handle);
                debug!("Gesture session started in {:?} mode on window {}", mode, target);
                Ok(())
            }
            Err(e) => {
                self.shared.operating.store(false, Ordering::SeqCst);
                *lock_mut(&self.shared.session) = None;
                Err(EngineError::WorkerSpawn(e))
            }
        }
    }

    /// Continue the active session as a move, keeping its anchor.
    pub fn downgrade(&self) {
        if let Some(session) = lock_mut(&self.shared.session).as_mut() {
            session.mode = OpMode::Move;
        }
    }

    /// End the active session. The worker observes the cleared flag within
    /// one poll interval and exits; no bounds are applied after that.
    pub fn end(&self) {
        self.shared.operating.store(false, Ordering::SeqCst);
        *lock_mut(&self.shared.session) = None;
    }

    /// End the active session and wait for the worker to exit.
    pub fn shutdown(&self) {
        self.end();
        if let Some(handle) = lock_mut(&self.worker).take() {
            let _ = handle.join();
        }
    }
}

/// Snapshot accessor that treats a poisoned lock as recoverable; the data
/// under it is a plain-old-data session slot.
fn lock<T: Copy>(mutex: &Mutex<Option<T>>) -> Option<T> {
    *mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn lock_mut<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// The polling worker. Runs until the gesture ends or a newer worker takes
/// over (epoch mismatch). Idles while the cursor is stationary.
fn poll_loop<W: WindowSystem>(shared: Arc<EngineShared<W>>, my_epoch: u64) {
    let mut last_cursor: Option<Point> = None;

    loop {
        if !shared.operating.load(Ordering::SeqCst)
            || shared.epoch.load(Ordering::SeqCst) != my_epoch
        {
            break;
        }

        let Some(cursor) = shared.window_system.cursor_position() else {
            thread::sleep(shared.poll_interval);
            continue;
        };

        if last_cursor == Some(cursor) {
            thread::sleep(shared.poll_interval);
            continue;
        }
        last_cursor = Some(cursor);

        let snapshot = lock(&shared.session);
        let Some(session) = snapshot else {
            thread::sleep(shared.poll_interval);
            continue;
        };

        let bounds = apply_delta(session.mode, &session.anchor, cursor);
        shared.window_system.apply_bounds(session.target, bounds);
    }

    debug!("Geometry loop exited");
}
