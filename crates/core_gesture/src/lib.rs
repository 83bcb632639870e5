//! keydrag Core Gesture Engine
//!
//! Platform-agnostic gesture state machine and window geometry engine.
//!
//! This crate implements the "chord plus motion" paradigm where:
//! - A held modifier chord arms a move or resize operation
//! - The window under the cursor is captured once, as an anchor
//! - Mouse motion is translated into new window bounds relative to that anchor
//!
//! Platform access goes through the [`WindowSystem`] trait; no OS types leak
//! into this crate.

mod engine;

pub use engine::{EngineError, GeometryEngine, WindowSystem, DEFAULT_POLL_INTERVAL};

/// Opaque identifier for a top-level window.
/// On Windows, this will typically be the HWND cast to u64.
pub type WindowHandle = u64;

/// A point in screen coordinates (pixels).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    /// Create a new point.
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// A rectangle in screen coordinates (pixels).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    /// Create a new rectangle.
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    /// Get the right edge x-coordinate.
    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    /// Get the bottom edge y-coordinate.
    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }
}

/// Modifier keys that participate in gesture chords.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modifier {
    Ctrl,
    Alt,
    Win,
    Shift,
}

/// Held/released state of the tracked modifiers.
///
/// Press and release are idempotent: keyboard auto-repeat delivers duplicate
/// key-down events, and they must not perturb the state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModifierState {
    ctrl: bool,
    alt: bool,
    win: bool,
    shift: bool,
}

impl ModifierState {
    /// Record a modifier press.
    pub fn press(&mut self, modifier: Modifier) {
        self.set(modifier, true);
    }

    /// Record a modifier release.
    pub fn release(&mut self, modifier: Modifier) {
        self.set(modifier, false);
    }

    /// Whether the given modifier is currently held.
    pub fn is_held(&self, modifier: Modifier) -> bool {
        match modifier {
            Modifier::Ctrl => self.ctrl,
            Modifier::Alt => self.alt,
            Modifier::Win => self.win,
            Modifier::Shift => self.shift,
        }
    }

    fn set(&mut self, modifier: Modifier, held: bool) {
        match modifier {
            Modifier::Ctrl => self.ctrl = held,
            Modifier::Alt => self.alt = held,
            Modifier::Win => self.win = held,
            Modifier::Shift => self.shift = held,
        }
    }

    /// The operation the current chord calls for, if any.
    ///
    /// Resize takes precedence: Ctrl+Win+Shift is a resize chord even though
    /// it contains the move chord Ctrl+Win.
    pub fn desired_mode(&self) -> Option<OpMode> {
        if (self.alt && self.win) || (self.ctrl && self.win && self.shift) {
            Some(OpMode::Resize)
        } else if self.ctrl && self.win {
            Some(OpMode::Move)
        } else {
            None
        }
    }
}

/// The two window operations a gesture can perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpMode {
    /// Translate the window, preserving its size.
    Move,
    /// Grow/shrink the window from its bottom-right, preserving its origin.
    Resize,
}

/// How key releases end an active gesture.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReleasePolicy {
    /// Releasing any tracked key ends the gesture immediately.
    AnyRelease,
    /// The gesture lives as long as Ctrl is held. Releasing another key
    /// during a resize downgrades it to a move (without re-anchoring).
    #[default]
    CtrlAnchored,
}

/// A state change emitted by the interpreter, at most one per key event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Start a new gesture in the given mode.
    Begin(OpMode),
    /// Switch the active gesture to the given mode, re-anchoring at the
    /// current cursor and window bounds.
    Rebase(OpMode),
    /// Continue the active resize as a move, keeping the existing anchor.
    Downgrade,
    /// End the active gesture.
    End,
}

/// Current phase of the interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Active(OpMode),
}

/// Turns raw modifier key events into gesture transitions.
///
/// The interpreter is the single source of truth for whether a gesture is
/// conceptually in progress; the [`GeometryEngine`] owns the mechanics of
/// actually driving the window.
#[derive(Debug)]
pub struct GestureInterpreter {
    modifiers: ModifierState,
    phase: Phase,
    policy: ReleasePolicy,
}

impl GestureInterpreter {
    /// Create an interpreter with the given release policy.
    pub fn new(policy: ReleasePolicy) -> Self {
        Self {
            modifiers: ModifierState::default(),
            phase: Phase::Idle,
            policy,
        }
    }

    /// The tracked modifier state (mainly for diagnostics).
    pub fn modifiers(&self) -> ModifierState {
        self.modifiers
    }

    /// Whether a gesture is active, and in which mode.
    pub fn active_mode(&self) -> Option<OpMode> {
        match self.phase {
            Phase::Idle => None,
            Phase::Active(mode) => Some(mode),
        }
    }

    /// Process a modifier press.
    pub fn key_down(&mut self, modifier: Modifier) -> Option<Transition> {
        self.modifiers.press(modifier);
        let wanted = self.modifiers.desired_mode()?;

        match self.phase {
            Phase::Idle => {
                self.phase = Phase::Active(wanted);
                Some(Transition::Begin(wanted))
            }
            Phase::Active(current) if current != wanted => {
                self.phase = Phase::Active(wanted);
                Some(Transition::Rebase(wanted))
            }
            // Auto-repeat of a key already part of the chord: nothing changes.
            Phase::Active(_) => None,
        }
    }

    /// Process a modifier release.
    pub fn key_up(&mut self, modifier: Modifier) -> Option<Transition> {
        self.modifiers.release(modifier);
        let Phase::Active(current) = self.phase else {
            return None;
        };

        match self.policy {
            ReleasePolicy::AnyRelease => {
                self.phase = Phase::Idle;
                Some(Transition::End)
            }
            ReleasePolicy::CtrlAnchored => {
                if !self.modifiers.is_held(Modifier::Ctrl) {
                    self.phase = Phase::Idle;
                    Some(Transition::End)
                } else if current == OpMode::Resize {
                    self.phase = Phase::Active(OpMode::Move);
                    Some(Transition::Downgrade)
                } else {
                    None
                }
            }
        }
    }

    /// Drop all tracked state (used when the daemon pauses gesture handling,
    /// so keys held across the pause cannot leave a half-tracked chord).
    pub fn reset(&mut self) {
        self.modifiers = ModifierState::default();
        self.phase = Phase::Idle;
    }
}

/// Cursor position and window bounds captured at gesture start.
///
/// All bounds produced during a gesture derive from this snapshot and the
/// current cursor position only; the window's live geometry is never re-read
/// after capture, so slow or coalesced window updates cannot accumulate error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Anchor {
    pub cursor: Point,
    pub bounds: Rect,
}

/// Compute the window bounds for the given cursor position.
///
/// Move translates the anchored bounds by the cursor delta; resize applies
/// the delta to width and height instead. Deltas are unclamped: degenerate
/// sizes are left for the OS to reject.
pub fn apply_delta(mode: OpMode, anchor: &Anchor, cursor: Point) -> Rect {
    let dx = cursor.x - anchor.cursor.x;
    let dy = cursor.y - anchor.cursor.y;

    match mode {
        OpMode::Move => Rect::new(
            anchor.bounds.x + dx,
            anchor.bounds.y + dy,
            anchor.bounds.width,
            anchor.bounds.height,
        ),
        OpMode::Resize => Rect::new(
            anchor.bounds.x,
            anchor.bounds.y,
            anchor.bounds.width + dx,
            anchor.bounds.height + dy,
        ),
    }
}
