//! Skyline F9 cartridge.
//!
//! Up to 1 MiB of ROM in 4 KiB banks behind a single latch at `$FF9`
//! (`$1FF9` on the bus):
//!
//! - **Write** `$FF9`: the written value selects the bank.
//! - **Read** `$FF9`: the cartridge sees whatever is on the data bus, which is
//!   the byte it is itself driving. The bank becomes `current | byte`. This is
//!   bus contention the hardware never promised, but existing images rely on
//!   it, so it is reproduced exactly: the byte is returned from the bank that
//!   was visible *before* the switch.
//!
//! Bank numbers wrap modulo the bank count, so every latch value is legal.

use log::debug;

use super::{CartBase, Cartridge, BANK_SIZE, WINDOW_MASK};
use crate::system::System;

/// Latch address inside the 4K window.
pub const HOTSPOT: u16 = 0x0FF9;

pub struct CartridgeF9 {
    base: CartBase,
}

impl CartridgeF9 {
    /// `image.len()` must be a non-zero multiple of 4 KiB; the factory checks this.
    pub(crate) fn new(image: Vec<u8>) -> Self {
        CartridgeF9 { base: CartBase::new(image, BANK_SIZE, 0, Some(0x1000 | HOTSPOT)) }
    }
}

impl Cartridge for CartridgeF9 {
    fn name(&self) -> &'static str {
        "CartridgeF9"
    }

    fn base(&self) -> &CartBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut CartBase {
        &mut self.base
    }

    fn peek(&mut self, address: u16, sys: &mut System) -> u8 {
        let value = self.base.read(address);
        if address & WINDOW_MASK == HOTSPOT {
            let bank = self.base.current_bank | value as u16;
            if self.bank(bank, sys) {
                debug!("F9: read latch ${:02X} -> bank {}", value, self.base.current_bank);
            }
        }
        value
    }

    fn poke(&mut self, address: u16, value: u8, sys: &mut System) -> bool {
        if address & WINDOW_MASK != HOTSPOT {
            return false;
        }
        if self.bank(value as u16, sys) {
            debug!("F9: write latch ${:02X} -> bank {}", value, self.base.current_bank);
        }
        true
    }

    fn about(&self) -> String {
        let start = self.base.start_bank;
        format!(
            "Skyline F9 cartridge, {} × 4KiB banks\nStartup bank = {} (${:X})\nHotspot latch $FF9",
            self.bank_count(),
            start,
            start
        )
    }
}
