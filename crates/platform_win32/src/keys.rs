//! Virtual-key mapping for gesture chords.

use keydrag_core_gesture::Modifier;
use windows::Win32::UI::Input::KeyboardAndMouse::{
    VIRTUAL_KEY, VK_LCONTROL, VK_LMENU, VK_LSHIFT, VK_LWIN,
};

/// Map a low-level hook virtual-key code to a tracked modifier.
///
/// Only the left-hand variants participate in gestures; right-hand modifiers
/// and every other key return `None` and are ignored upstream.
pub fn modifier_from_vk(vk: u32) -> Option<Modifier> {
    match VIRTUAL_KEY(vk as u16) {
        VK_LCONTROL => Some(Modifier::Ctrl),
        VK_LMENU => Some(Modifier::Alt),
        VK_LWIN => Some(Modifier::Win),
        VK_LSHIFT => Some(Modifier::Shift),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_left_modifiers_map() {
        assert_eq!(modifier_from_vk(0xA2), Some(Modifier::Ctrl)); // VK_LCONTROL
        assert_eq!(modifier_from_vk(0xA4), Some(Modifier::Alt)); // VK_LMENU
        assert_eq!(modifier_from_vk(0x5B), Some(Modifier::Win)); // VK_LWIN
        assert_eq!(modifier_from_vk(0xA0), Some(Modifier::Shift)); // VK_LSHIFT
    }

    #[test]
    fn test_right_modifiers_are_ignored() {
        assert_eq!(modifier_from_vk(0xA3), None); // VK_RCONTROL
        assert_eq!(modifier_from_vk(0xA5), None); // VK_RMENU
        assert_eq!(modifier_from_vk(0x5C), None); // VK_RWIN
        assert_eq!(modifier_from_vk(0xA1), None); // VK_RSHIFT
    }

    #[test]
    fn test_ordinary_keys_are_ignored() {
        assert_eq!(modifier_from_vk(0x41), None); // 'A'
        assert_eq!(modifier_from_vk(0x0D), None); // VK_RETURN
        assert_eq!(modifier_from_vk(0), None);
    }
}
