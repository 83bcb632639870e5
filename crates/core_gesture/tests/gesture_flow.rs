//! End-to-end gesture flow tests for the core gesture engine.
//!
//! These drive the interpreter and the geometry engine together over an
//! in-memory window system, the way the daemon does, without requiring a
//! desktop. They verify:
//! - Full chord lifecycles (press, drag, release)
//! - Re-anchoring on mode switches
//! - Downgrade continuing with the original anchor
//! - That ending a gesture stops bounds application

use keydrag_core_gesture::{
    GeometryEngine, GestureInterpreter, Modifier, OpMode, Point, Rect, ReleasePolicy, Transition,
    WindowHandle, WindowSystem,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// In-memory window system shared between the test and the engine worker.
#[derive(Clone, Default)]
struct FakeWindows {
    inner: Arc<FakeInner>,
}

#[derive(Default)]
struct FakeInner {
    cursor: Mutex<Option<Point>>,
    windows: Mutex<HashMap<WindowHandle, Rect>>,
    target: Mutex<Option<WindowHandle>>,
    applied: Mutex<Vec<(WindowHandle, Rect)>>,
}

impl FakeWindows {
    fn with_window(handle: WindowHandle, bounds: Rect, cursor: Point) -> Self {
        let fake = Self::default();
        fake.inner.windows.lock().unwrap().insert(handle, bounds);
        *fake.inner.target.lock().unwrap() = Some(handle);
        *fake.inner.cursor.lock().unwrap() = Some(cursor);
        fake
    }

    fn set_cursor(&self, cursor: Point) {
        *self.inner.cursor.lock().unwrap() = Some(cursor);
    }

    fn applied_count(&self) -> usize {
        self.inner.applied.lock().unwrap().len()
    }

    fn last_applied(&self) -> Option<Rect> {
        self.inner.applied.lock().unwrap().last().map(|(_, r)| *r)
    }
}

impl WindowSystem for FakeWindows {
    fn cursor_position(&self) -> Option<Point> {
        *self.inner.cursor.lock().unwrap()
    }

    fn resolve_target(&self, _cursor: Point) -> Option<WindowHandle> {
        *self.inner.target.lock().unwrap()
    }

    fn window_bounds(&self, window: WindowHandle) -> Option<Rect> {
        self.inner.windows.lock().unwrap().get(&window).copied()
    }

    fn apply_bounds(&self, window: WindowHandle, bounds: Rect) {
        self.inner.applied.lock().unwrap().push((window, bounds));
    }
}

const POLL: Duration = Duration::from_millis(5);

fn settle() {
    thread::sleep(Duration::from_millis(100));
}

/// Small harness mirroring the daemon's controller wiring.
struct Harness {
    interpreter: GestureInterpreter,
    engine: GeometryEngine<FakeWindows>,
}

impl Harness {
    fn new(fake: &FakeWindows, policy: ReleasePolicy) -> Self {
        Self {
            interpreter: GestureInterpreter::new(policy),
            engine: GeometryEngine::new(fake.clone(), POLL),
        }
    }

    fn key(&mut self, modifier: Modifier, pressed: bool) {
        let transition = if pressed {
            self.interpreter.key_down(modifier)
        } else {
            self.interpreter.key_up(modifier)
        };

        match transition {
            Some(Transition::Begin(mode)) | Some(Transition::Rebase(mode)) => {
                self.engine.begin(mode).expect("worker spawn");
            }
            Some(Transition::Downgrade) => self.engine.downgrade(),
            Some(Transition::End) => self.engine.end(),
            None => {}
        }
    }
}

#[test]
fn move_gesture_lifecycle() {
    let fake = FakeWindows::with_window(9, Rect::new(100, 100, 200, 150), Point::new(500, 500));
    let mut harness = Harness::new(&fake, ReleasePolicy::CtrlAnchored);

    harness.key(Modifier::Ctrl, true);
    harness.key(Modifier::Win, true);
    assert!(harness.engine.is_operating());

    fake.set_cursor(Point::new(520, 480));
    settle();
    assert_eq!(fake.last_applied(), Some(Rect::new(120, 80, 200, 150)));

    harness.key(Modifier::Win, false); // Ctrl still held: gesture continues
    assert!(harness.engine.is_operating());

    harness.key(Modifier::Ctrl, false);
    assert!(!harness.engine.is_operating());

    settle();
    let count = fake.applied_count();
    fake.set_cursor(Point::new(900, 900));
    settle();
    assert_eq!(fake.applied_count(), count, "no applies after the gesture ends");

    harness.engine.shutdown();
}

#[test]
fn resize_gesture_via_alt_win() {
    let fake = FakeWindows::with_window(9, Rect::new(100, 100, 200, 150), Point::new(500, 500));
    let mut harness = Harness::new(&fake, ReleasePolicy::CtrlAnchored);

    harness.key(Modifier::Alt, true);
    harness.key(Modifier::Win, true);
    assert_eq!(harness.engine.current_mode(), Some(OpMode::Resize));

    fake.set_cursor(Point::new(520, 480));
    settle();
    assert_eq!(fake.last_applied(), Some(Rect::new(100, 100, 220, 130)));

    // No Ctrl in this chord: any release ends it even under CtrlAnchored.
    harness.key(Modifier::Win, false);
    assert!(!harness.engine.is_operating());

    harness.engine.shutdown();
}

#[test]
fn shift_upgrade_re_anchors_and_release_downgrades_without_re_anchor() {
    let fake = FakeWindows::with_window(9, Rect::new(100, 100, 200, 150), Point::new(500, 500));
    let mut harness = Harness::new(&fake, ReleasePolicy::CtrlAnchored);

    harness.key(Modifier::Ctrl, true);
    harness.key(Modifier::Win, true);

    // Drag some distance in move mode.
    fake.set_cursor(Point::new(550, 550));
    settle();
    assert_eq!(fake.last_applied(), Some(Rect::new(150, 150, 200, 150)));

    // Shift upgrades to resize, re-anchoring at the CURRENT cursor. The fake
    // still reports the original window bounds, which is exactly what a
    // re-anchor captures.
    harness.key(Modifier::Shift, true);
    assert_eq!(harness.engine.current_mode(), Some(OpMode::Resize));

    fake.set_cursor(Point::new(560, 545));
    settle();
    assert_eq!(fake.last_applied(), Some(Rect::new(100, 100, 210, 145)));

    // Releasing Shift downgrades to move but keeps the resize anchor.
    harness.key(Modifier::Shift, false);
    assert_eq!(harness.engine.current_mode(), Some(OpMode::Move));

    fake.set_cursor(Point::new(570, 560));
    settle();
    // Delta from the re-anchor cursor (550,550): +20,+10 on origin (100,100).
    assert_eq!(fake.last_applied(), Some(Rect::new(120, 110, 200, 150)));

    harness.key(Modifier::Ctrl, false);
    assert!(!harness.engine.is_operating());
    harness.engine.shutdown();
}

#[test]
fn any_release_policy_ends_on_first_release() {
    let fake = FakeWindows::with_window(9, Rect::new(100, 100, 200, 150), Point::new(500, 500));
    let mut harness = Harness::new(&fake, ReleasePolicy::AnyRelease);

    harness.key(Modifier::Ctrl, true);
    harness.key(Modifier::Win, true);
    assert!(harness.engine.is_operating());

    harness.key(Modifier::Win, false);
    assert!(!harness.engine.is_operating());

    harness.engine.shutdown();
}

#[test]
fn auto_repeat_does_not_restart_or_re_anchor() {
    let fake = FakeWindows::with_window(9, Rect::new(100, 100, 200, 150), Point::new(500, 500));
    let mut harness = Harness::new(&fake, ReleasePolicy::CtrlAnchored);

    harness.key(Modifier::Ctrl, true);
    harness.key(Modifier::Win, true);

    fake.set_cursor(Point::new(530, 530));
    settle();

    // Held keys auto-repeat; the anchor must not move.
    harness.key(Modifier::Win, true);
    harness.key(Modifier::Ctrl, true);

    fake.set_cursor(Point::new(540, 540));
    settle();
    assert_eq!(fake.last_applied(), Some(Rect::new(140, 140, 200, 150)));

    harness.engine.shutdown();
}

#[test]
fn gesture_with_no_window_under_cursor_is_inert() {
    let fake = FakeWindows::default();
    fake.set_cursor(Point::new(10, 10));
    let mut harness = Harness::new(&fake, ReleasePolicy::CtrlAnchored);

    harness.key(Modifier::Ctrl, true);
    harness.key(Modifier::Win, true);
    assert!(!harness.engine.is_operating());
    assert_eq!(fake.applied_count(), 0);
}

#[test]
fn second_gesture_after_first_completes() {
    let fake = FakeWindows::with_window(9, Rect::new(100, 100, 200, 150), Point::new(500, 500));
    let mut harness = Harness::new(&fake, ReleasePolicy::CtrlAnchored);

    harness.key(Modifier::Ctrl, true);
    harness.key(Modifier::Win, true);
    harness.key(Modifier::Ctrl, false);
    settle();

    // New chord, new anchor at the new cursor position.
    fake.set_cursor(Point::new(0, 0));
    harness.key(Modifier::Ctrl, true);
    harness.key(Modifier::Win, true);
    assert!(harness.engine.is_operating());

    fake.set_cursor(Point::new(5, 7));
    settle();
    assert_eq!(fake.last_applied(), Some(Rect::new(105, 107, 200, 150)));

    harness.engine.shutdown();
}
