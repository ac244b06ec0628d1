use bitflags::bitflags;

use crate::error::KeyError;
use crate::NUM_KEYS;

bitflags! {
    /// Pressed state of the 16-key hex keypad; bit `n` is key `n`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Keypad: u16 {
        const KEY_0 = 1 << 0x0;
        const KEY_1 = 1 << 0x1;
        const KEY_2 = 1 << 0x2;
        const KEY_3 = 1 << 0x3;
        const KEY_4 = 1 << 0x4;
        const KEY_5 = 1 << 0x5;
        const KEY_6 = 1 << 0x6;
        const KEY_7 = 1 << 0x7;
        const KEY_8 = 1 << 0x8;
        const KEY_9 = 1 << 0x9;
        const KEY_A = 1 << 0xA;
        const KEY_B = 1 << 0xB;
        const KEY_C = 1 << 0xC;
        const KEY_D = 1 << 0xD;
        const KEY_E = 1 << 0xE;
        const KEY_F = 1 << 0xF;
    }
}

impl Keypad {
    pub fn key(index: usize) -> Result<Keypad, KeyError> {
        if index >= NUM_KEYS {
            return Err(KeyError(index));
        }
        Ok(Keypad::from_bits_retain(1 << index))
    }

    /// Whether key `index` is held. Out-of-range keys are never held.
    pub fn is_pressed(&self, index: usize) -> bool {
        Keypad::key(index).is_ok_and(|key| self.contains(key))
    }

    /// Record a key transition. Returns `true` on a press edge (up -> down).
    pub fn update(&mut self, index: usize, pressed: bool) -> Result<bool, KeyError> {
        let key = Keypad::key(index)?;
        let edge = pressed && !self.contains(key);
        self.set(key, pressed);
        Ok(edge)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_reports_press_edges_only() {
        let mut keys = Keypad::empty();
        assert_eq!(keys.update(5, true), Ok(true));
        assert_eq!(keys.update(5, true), Ok(false));
        assert!(keys.is_pressed(5));
        assert_eq!(keys.update(5, false), Ok(false));
        assert!(!keys.is_pressed(5));
        assert_eq!(keys.update(5, true), Ok(true));
    }

    #[test]
    fn rejects_out_of_range_keys() {
        let mut keys = Keypad::empty();
        assert_eq!(keys.update(16, true), Err(KeyError(16)));
        assert!(!keys.is_pressed(16));
        assert_eq!(keys, Keypad::empty());
    }

    #[test]
    fn key_bits_match_names() {
        assert_eq!(Keypad::key(0xA), Ok(Keypad::KEY_A));
        assert_eq!(Keypad::key(0x0), Ok(Keypad::KEY_0));
    }
}
