//! System tray icon management for the keydrag daemon.
//!
//! keydrag has no window of its own; the tray icon is its only surface.
//! The context menu offers:
//! - Pause/Resume gestures
//! - About
//! - Exit

use std::sync::mpsc;
use thiserror::Error;
use tracing::{debug, info};
use tray_icon::{
    menu::{Menu, MenuEvent, MenuItem, PredefinedMenuItem},
    TrayIcon, TrayIconBuilder,
};

/// Menu item IDs for tray context menu.
mod menu_ids {
    pub const TOGGLE_PAUSE: &str = "toggle_pause";
    pub const ABOUT: &str = "about";
    pub const EXIT: &str = "exit";
}

/// Events emitted by the tray icon.
#[derive(Debug, Clone)]
pub enum TrayEvent {
    /// User clicked "Pause/Resume Gestures" menu item.
    TogglePause,
    /// User clicked "About" menu item.
    About,
    /// User clicked "Exit" menu item.
    Exit,
}

/// Manages the system tray icon and context menu.
pub struct TrayManager {
    _tray: TrayIcon,
}

impl TrayManager {
    /// Create a new tray manager with icon and context menu.
    ///
    /// The provided sender will receive tray events when menu items are
    /// clicked. The sender should be a std::sync::mpsc::Sender that can be
    /// passed to the event thread.
    pub fn new(event_sender: mpsc::Sender<TrayEvent>) -> Result<Self, TrayError> {
        // Create context menu
        let menu = Menu::new();

        // Title item (disabled)
        let title = MenuItem::new("keydrag", false, None);
        menu.append(&title).map_err(|e| TrayError::Menu(e.to_string()))?;

        // Separator
        menu.append(&PredefinedMenuItem::separator())
            .map_err(|e| TrayError::Menu(e.to_string()))?;

        // Pause/Resume Gestures
        let toggle_pause =
            MenuItem::with_id(menu_ids::TOGGLE_PAUSE, "Pause/Resume Gestures", true, None);
        menu.append(&toggle_pause)
            .map_err(|e| TrayError::Menu(e.to_string()))?;

        // About
        let about = MenuItem::with_id(menu_ids::ABOUT, "About", true, None);
        menu.append(&about).map_err(|e| TrayError::Menu(e.to_string()))?;

        // Separator
        menu.append(&PredefinedMenuItem::separator())
            .map_err(|e| TrayError::Menu(e.to_string()))?;

        // Exit
        let exit = MenuItem::with_id(menu_ids::EXIT, "Exit", true, None);
        menu.append(&exit).map_err(|e| TrayError::Menu(e.to_string()))?;

        // Create the tray icon with a simple embedded icon
        let icon = create_default_icon()?;

        let tray = TrayIconBuilder::new()
            .with_menu(Box::new(menu))
            .with_tooltip("keydrag - move and resize windows with modifier keys")
            .with_icon(icon)
            .build()
            .map_err(|e| TrayError::Build(e.to_string()))?;

        info!("System tray icon created");

        // Spawn thread to handle menu events and forward them
        std::thread::spawn(move || {
            let menu_channel = MenuEvent::receiver();
            while let Ok(event) = menu_channel.recv() {
                let tray_event = match event.id.0.as_str() {
                    menu_ids::TOGGLE_PAUSE => TrayEvent::TogglePause,
                    menu_ids::ABOUT => TrayEvent::About,
                    menu_ids::EXIT => TrayEvent::Exit,
                    id => {
                        debug!("Unknown menu item clicked: {}", id);
                        continue;
                    }
                };

                if event_sender.send(tray_event).is_err() {
                    // Receiver dropped, exit thread
                    break;
                }
            }
        });

        Ok(Self { _tray: tray })
    }
}

/// Create a default icon for the tray.
///
/// Draws a four-way move cross on a dark rounded disc.
fn create_default_icon() -> Result<tray_icon::Icon, TrayError> {
    const SIZE: usize = 32;
    let mut rgba = vec![0u8; SIZE * SIZE * 4];

    let disc_r = 38u8;
    let disc_g = 41u8;
    let disc_b = 48u8;
    let cross_r = 120u8;
    let cross_g = 190u8;
    let cross_b = 255u8;

    let center = SIZE as f32 / 2.0;
    let max_dist = center - 2.0;

    for y in 0..SIZE {
        for x in 0..SIZE {
            let idx = (y * SIZE + x) * 4;

            let dx = x as f32 - center;
            let dy = y as f32 - center;
            let dist = (dx * dx + dy * dy).sqrt();

            if dist < max_dist {
                // Cross arms: a horizontal and a vertical bar through the
                // center, widening toward the rim to hint at arrowheads.
                let fx = dx.abs();
                let fy = dy.abs();
                let on_horizontal = fy < 2.5 || (fy < fx / 2.5 && fx > 8.0);
                let on_vertical = fx < 2.5 || (fx < fy / 2.5 && fy > 8.0);

                if on_horizontal || on_vertical {
                    rgba[idx] = cross_r;
                    rgba[idx + 1] = cross_g;
                    rgba[idx + 2] = cross_b;
                } else {
                    rgba[idx] = disc_r;
                    rgba[idx + 1] = disc_g;
                    rgba[idx + 2] = disc_b;
                }
                rgba[idx + 3] = 255; // Fully opaque
            } else if dist < max_dist + 2.0 {
                // Anti-aliased edge
                let alpha = ((max_dist + 2.0 - dist) / 2.0 * 255.0) as u8;
                rgba[idx] = disc_r;
                rgba[idx + 1] = disc_g;
                rgba[idx + 2] = disc_b;
                rgba[idx + 3] = alpha;
            }
            // else: transparent (default 0)
        }
    }

    tray_icon::Icon::from_rgba(rgba, SIZE as u32, SIZE as u32)
        .map_err(|e| TrayError::Icon(e.to_string()))
}

/// Errors that can occur during tray operations.
#[derive(Debug, Error)]
pub enum TrayError {
    #[error("Failed to create menu: {0}")]
    Menu(String),

    #[error("Failed to build tray icon: {0}")]
    Build(String),

    #[error("Failed to create icon: {0}")]
    Icon(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_default_icon() {
        let icon = create_default_icon();
        assert!(icon.is_ok(), "Should create default icon successfully");
    }
}
