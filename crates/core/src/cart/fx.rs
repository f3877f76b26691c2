//! Standard Atari bank switching (F8, F6, F4).
//!
//! A contiguous run of hotspots at the top of the window selects the bank:
//! touching hotspot `n` (read or write) makes bank `n` visible.
//!
//! | Scheme | Banks | Hotspots      | Start bank |
//! |--------|-------|---------------|------------|
//! | F8     | 2     | `$1FF8–$1FF9` | 1          |
//! | F6     | 4     | `$1FF6–$1FF9` | 0          |
//! | F4     | 8     | `$1FF4–$1FFB` | 0          |

use log::debug;

use super::{CartBase, Cartridge, BANK_SIZE, WINDOW_MASK};
use crate::system::System;

pub struct CartridgeFx {
    base: CartBase,
    name: &'static str,
    /// First and last hotspot, as window offsets
    first_hotspot: u16,
    last_hotspot: u16,
}

impl CartridgeFx {
    fn with_hotspots(image: Vec<u8>, name: &'static str, first: u16, last: u16, start_bank: u16) -> Self {
        CartridgeFx {
            base: CartBase::new(image, BANK_SIZE, start_bank, Some(0x1000 | first)),
            name,
            first_hotspot: first,
            last_hotspot: last,
        }
    }

    pub(crate) fn f8(image: Vec<u8>) -> Self {
        Self::with_hotspots(image, "CartridgeF8", 0x0FF8, 0x0FF9, 1)
    }

    pub(crate) fn f6(image: Vec<u8>) -> Self {
        Self::with_hotspots(image, "CartridgeF6", 0x0FF6, 0x0FF9, 0)
    }

    pub(crate) fn f4(image: Vec<u8>) -> Self {
        Self::with_hotspots(image, "CartridgeF4", 0x0FF4, 0x0FFB, 0)
    }

    /// Switch if `address` is a hotspot. Returns true if it was.
    fn check_switch_bank(&mut self, address: u16, sys: &mut System) -> bool {
        let a = address & WINDOW_MASK;
        if a < self.first_hotspot || a > self.last_hotspot {
            return false;
        }
        let bank = a - self.first_hotspot;
        if self.bank(bank, sys) {
            debug!("{}: hotspot ${:04X} -> bank {}", self.name, address, bank);
        }
        true
    }
}

impl Cartridge for CartridgeFx {
    fn name(&self) -> &'static str {
        self.name
    }

    fn base(&self) -> &CartBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut CartBase {
        &mut self.base
    }

    fn peek(&mut self, address: u16, sys: &mut System) -> u8 {
        let value = self.base.read(address);
        self.check_switch_bank(address, sys);
        value
    }

    fn poke(&mut self, address: u16, _value: u8, sys: &mut System) -> bool {
        self.check_switch_bank(address, sys)
    }

    fn about(&self) -> String {
        format!(
            "Standard {} cartridge, {} × 4KiB banks\nStartup bank = {}\nHotspots ${:03X} - ${:03X}",
            &self.name[9..],
            self.bank_count(),
            self.base.start_bank,
            self.first_hotspot,
            self.last_hotspot
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Each bank filled with its own index.
    fn banked_image(banks: usize) -> Vec<u8> {
        (0..banks * BANK_SIZE).map(|i| (i / BANK_SIZE) as u8).collect()
    }

    #[test]
    fn test_f8_starts_in_last_bank() {
        let mut sys = System::new();
        let mut cart = CartridgeFx::f8(banked_image(2));
        cart.install(&mut sys);
        assert_eq!(cart.get_bank(), 1);
        cart.reset(&mut sys);
        assert_eq!(cart.get_bank(), 1);
    }

    #[test]
    fn test_f6_hotspots() {
        let mut sys = System::new();
        let mut cart = CartridgeFx::f6(banked_image(4));
        cart.install(&mut sys);
        for bank in 0..4u16 {
            assert!(cart.poke(0x1FF6 + bank, 0, &mut sys));
            assert_eq!(cart.get_bank(), bank);
            assert_eq!(sys.page_access(0x1000).direct_peek_base, Some(bank as usize * BANK_SIZE));
        }
        assert!(!cart.poke(0x1FFA, 0, &mut sys));
        assert!(!cart.poke(0x1FF5, 0, &mut sys));
    }

    #[test]
    fn test_read_returns_byte_before_switch() {
        let mut sys = System::new();
        let mut cart = CartridgeFx::f4(banked_image(8));
        cart.install(&mut sys);
        assert_eq!(cart.get_bank(), 0);
        // Byte comes from bank 0 even though the read selects bank 5
        assert_eq!(cart.peek(0x1FF9, &mut sys), 0);
        assert_eq!(cart.get_bank(), 5);
        assert_eq!(cart.peek(0x1FF0, &mut sys), 5);
    }

    #[test]
    fn test_locked_hotspot_is_still_consumed() {
        let mut sys = System::new();
        let mut cart = CartridgeFx::f8(banked_image(2));
        cart.install(&mut sys);
        cart.lock_bank();
        assert!(cart.poke(0x1FF8, 0, &mut sys));
        assert_eq!(cart.get_bank(), 1);
    }
}
