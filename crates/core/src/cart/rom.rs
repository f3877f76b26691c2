//! Plain 2K / 4K ROM cartridges with no bank switching.
//!
//! A 2K image appears twice in the 4K window (A11 is not decoded).

use super::{CartBase, Cartridge};
use crate::system::System;

pub struct CartridgeRom {
    base: CartBase,
}

impl CartridgeRom {
    /// `image` must be 2048 or 4096 bytes; the factory checks this.
    pub(crate) fn new(image: Vec<u8>) -> Self {
        let bank_size = image.len();
        CartridgeRom { base: CartBase::new(image, bank_size, 0, None) }
    }
}

impl Cartridge for CartridgeRom {
    fn name(&self) -> &'static str {
        if self.base.bank_size == 2048 { "Cartridge2K" } else { "Cartridge4K" }
    }

    fn base(&self) -> &CartBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut CartBase {
        &mut self.base
    }

    fn peek(&mut self, address: u16, _sys: &mut System) -> u8 {
        self.base.read(address)
    }

    fn poke(&mut self, _address: u16, _value: u8, _sys: &mut System) -> bool {
        false
    }

    fn about(&self) -> String {
        format!("Standard {}K ROM cartridge, non-bankswitched", self.base.bank_size / 1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_2k_is_mirrored() {
        let mut image = vec![0u8; 2048];
        image[0x123] = 0x5A;
        let mut sys = System::new();
        let mut cart = CartridgeRom::new(image);
        cart.install(&mut sys);
        assert_eq!(cart.bank_count(), 1);
        assert_eq!(sys.page_access(0x1100).direct_peek_base, Some(0x100));
        assert_eq!(sys.page_access(0x1900).direct_peek_base, Some(0x100));
        assert_eq!(cart.peek(0x1923, &mut sys), 0x5A);
    }

    #[test]
    fn test_writes_are_never_consumed() {
        let mut sys = System::new();
        let mut cart = CartridgeRom::new(vec![0u8; 4096]);
        cart.install(&mut sys);
        assert!(!cart.poke(0x1FF9, 3, &mut sys));
        assert_eq!(cart.get_bank(), 0);
    }

    #[test]
    fn test_any_bank_wraps_to_zero() {
        let mut sys = System::new();
        let mut cart = CartridgeRom::new(vec![0u8; 4096]);
        assert!(cart.bank(7, &mut sys));
        assert_eq!(cart.get_bank(), 0);
    }
}
