//! Cartridge bank-switching controllers.
//!
//! A cartridge exposes a 4 KiB window at `0x1000–0x1FFF`. Larger images are
//! split into banks, and touching a *hotspot* address selects which bank is
//! visible. Every scheme below is one implementation of [`Cartridge`], chosen
//! once when the ROM is loaded:
//!
//! | Kind | Size       | Hotspots           | Module   |
//! |------|------------|--------------------|----------|
//! | 2K   | 2 KiB      | —                  | [`rom`]  |
//! | 4K   | 4 KiB      | —                  | [`rom`]  |
//! | F8   | 8 KiB      | `$1FF8–$1FF9`      | [`fx`]   |
//! | F6   | 16 KiB     | `$1FF6–$1FF9`      | [`fx`]   |
//! | F4   | 32 KiB     | `$1FF4–$1FFB`      | [`fx`]   |
//! | F9   | n × 4 KiB  | `$1FF9` latch      | [`f9`]   |
//!
//! Shared bookkeeping (current/start bank, lock, dirty flag, code-access table
//! and the page remap) lives in [`CartBase`]; the schemes only decide *when*
//! to switch.

pub mod f9;
pub mod fx;
pub mod rom;

use std::fmt;
use std::str::FromStr;

use log::{error, trace, warn};
use thiserror::Error;

use crate::serializer::{Serializer, SerializerError};
use crate::system::{AccessFlags, Device, PageAccess, System, PAGE_MASK, PAGE_SIZE};

pub use f9::CartridgeF9;
pub use fx::CartridgeFx;
pub use rom::CartridgeRom;

/// Standard bank size.
pub const BANK_SIZE: usize = 4096;
/// Mask for an address inside the 4K cartridge window.
pub const WINDOW_MASK: u16 = 0x0FFF;
/// First address of the cartridge window.
pub const WINDOW_START: u16 = 0x1000;
/// One past the last address of the cartridge window.
pub const WINDOW_END: u32 = 0x2000;
/// Largest image accepted for F9 cartridges.
pub const MAX_IMAGE_SIZE: usize = 1024 * 1024;

/// Errors creating a cartridge from a ROM image.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CartError {
    #[error("ROM image is empty")]
    Empty,

    #[error("cannot detect cartridge type for a {0}-byte image")]
    UnknownSize(usize),

    #[error("{size}-byte image is not valid for {kind} cartridges")]
    InvalidSize { kind: CartKind, size: usize },

    #[error("unknown cartridge type \"{0}\"")]
    UnknownType(String),
}

// ─── Shared state ───────────────────────────────────────────────────────────

/// State common to every bank-switched cartridge.
pub struct CartBase {
    /// ROM image (mutable only through debugger patches)
    pub image: Vec<u8>,
    /// Bank size in bytes (power of two)
    pub bank_size: usize,
    /// Bank selected on reset
    pub start_bank: u16,
    /// Currently visible bank
    pub current_bank: u16,
    /// First hotspot address; its page and those above stay device-routed
    hotspot: Option<u16>,
    /// Bank switching disabled (debugger forced display)
    locked: bool,
    /// Set by any switch or patch, consumed by the debugger
    changed: bool,
    /// Per-byte debugger access classification
    code_access: Vec<u8>,
}

impl CartBase {
    pub(crate) fn new(image: Vec<u8>, bank_size: usize, start_bank: u16, hotspot: Option<u16>) -> Self {
        let code_access = vec![0u8; image.len()];
        CartBase {
            image,
            bank_size,
            start_bank,
            current_bank: start_bank,
            hotspot,
            locked: false,
            changed: false,
            code_access,
        }
    }

    pub fn bank_count(&self) -> u16 {
        (self.image.len() / self.bank_size) as u16
    }

    /// Image offset of the current bank.
    #[inline(always)]
    pub fn bank_offset(&self) -> usize {
        self.current_bank as usize * self.bank_size
    }

    /// Image offset of a window address in the current bank.
    #[inline(always)]
    pub fn offset_of(&self, address: u16) -> usize {
        self.bank_offset() + ((address & WINDOW_MASK) as usize & (self.bank_size - 1))
    }

    /// Byte at a window address in the current bank.
    #[inline(always)]
    pub fn read(&self, address: u16) -> u8 {
        self.image[self.offset_of(address)]
    }

    /// Select `bank` (modulo the bank count) and point every page of the
    /// window at it. Pages at or above the hotspot page get no direct base so
    /// their reads reach the cartridge.
    pub fn map_bank(&mut self, bank: u16, sys: &mut System) {
        self.current_bank = bank % self.bank_count().max(1);
        let offset = self.bank_offset();
        let hotspot_page = self.hotspot.map(|h| h & !PAGE_MASK);

        let mut addr = WINDOW_START as u32;
        while addr < WINDOW_END {
            let a = addr as u16;
            let base = offset + ((a & WINDOW_MASK) as usize & (self.bank_size - 1));
            let routed = hotspot_page.is_some_and(|h| a >= h);
            let access = PageAccess {
                device: Device::Cartridge,
                direct_peek_base: if routed { None } else { Some(base) },
                code_access_base: Some(base),
            };
            sys.set_page_access(System::page_index(a), access);
            addr += PAGE_SIZE as u32;
        }
        self.changed = true;
        trace!("bank {} mapped at offset 0x{:05X}", self.current_bank, offset);
    }

    /// Program-driven switch. Refused while locked.
    pub fn switch_bank(&mut self, bank: u16, sys: &mut System) -> bool {
        if self.locked {
            return false;
        }
        self.map_bank(bank, sys);
        true
    }
}

/// Read the `{tag, u16 bank}` record written by [`Cartridge::save`].
fn read_bank_record(input: &mut Serializer, name: &str) -> Result<u16, SerializerError> {
    input.expect_tag(name)?;
    input.get_short()
}

// ─── Controller interface ───────────────────────────────────────────────────

/// A cartridge bank-switching controller.
///
/// `peek`/`poke` are only called for device-routed pages and for writes;
/// reads of directly mapped pages are served by the bus from [`Cartridge::image`].
pub trait Cartridge {
    /// Tag used in saved state; also identifies the scheme.
    fn name(&self) -> &'static str;

    fn base(&self) -> &CartBase;

    fn base_mut(&mut self) -> &mut CartBase;

    /// Read a byte, triggering any hotspot after the value is fetched.
    fn peek(&mut self, address: u16, sys: &mut System) -> u8;

    /// Returns true if the write was consumed by hotspot logic.
    fn poke(&mut self, address: u16, value: u8, sys: &mut System) -> bool;

    /// Human-readable description for the debugger.
    fn about(&self) -> String;

    /// Install the startup bank's pages on the bus.
    fn install(&mut self, sys: &mut System) {
        let start = self.base().start_bank;
        self.base_mut().map_bank(start, sys);
    }

    /// Power-on / console reset.
    fn reset(&mut self, sys: &mut System) {
        let start = self.base().start_bank;
        self.bank(start, sys);
    }

    /// Switch to `bank` (wrapping modulo the bank count). False when locked.
    fn bank(&mut self, bank: u16, sys: &mut System) -> bool {
        self.base_mut().switch_bank(bank, sys)
    }

    fn get_bank(&self) -> u16 {
        self.base().current_bank
    }

    fn bank_count(&self) -> u16 {
        self.base().bank_count()
    }

    fn start_bank(&self) -> u16 {
        self.base().start_bank
    }

    /// Overwrite a ROM byte in the current bank.
    fn patch(&mut self, address: u16, value: u8) -> bool {
        let base = self.base_mut();
        let offset = base.offset_of(address);
        base.image[offset] = value;
        base.changed = true;
        true
    }

    fn image(&self) -> &[u8] {
        &self.base().image
    }

    /// Persist the current bank index.
    fn save(&self, out: &mut Serializer) -> bool {
        out.put_string(self.name());
        out.put_short(self.base().current_bank);
        true
    }

    /// Restore the bank index and remap the window. A record tagged for a
    /// different cartridge is rejected without touching any state.
    fn load(&mut self, input: &mut Serializer, sys: &mut System) -> bool {
        let name = self.name();
        match read_bank_record(input, name) {
            Ok(bank) => {
                self.base_mut().map_bank(bank, sys);
                true
            }
            Err(e @ SerializerError::TagMismatch { .. }) => {
                warn!("{}::load: {}", name, e);
                false
            }
            Err(e) => {
                error!("ERROR: {}::load: {}", name, e);
                false
            }
        }
    }

    fn lock_bank(&mut self) {
        self.base_mut().locked = true;
    }

    fn unlock_bank(&mut self) {
        self.base_mut().locked = false;
    }

    fn bank_locked(&self) -> bool {
        self.base().locked
    }

    /// True if the bank or image changed since the last call.
    fn bank_changed(&mut self) -> bool {
        std::mem::take(&mut self.base_mut().changed)
    }

    /// Access flags recorded for an image offset.
    fn code_access(&self, offset: usize) -> AccessFlags {
        self.base()
            .code_access
            .get(offset)
            .map_or(AccessFlags::empty(), |&b| AccessFlags::from_bits_truncate(b))
    }

    fn mark_code_access(&mut self, offset: usize, flags: AccessFlags) {
        if let Some(b) = self.base_mut().code_access.get_mut(offset) {
            *b |= flags.bits();
        }
    }
}

// ─── Type selection ─────────────────────────────────────────────────────────

/// Supported bank-switching schemes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartKind {
    Rom2K,
    Rom4K,
    F8,
    F6,
    F4,
    F9,
}

impl CartKind {
    /// Guess the scheme from the image size. F9 is never guessed.
    pub fn detect(image: &[u8]) -> Option<CartKind> {
        match image.len() {
            2048 => Some(CartKind::Rom2K),
            4096 => Some(CartKind::Rom4K),
            8192 => Some(CartKind::F8),
            16384 => Some(CartKind::F6),
            32768 => Some(CartKind::F4),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            CartKind::Rom2K => "2K",
            CartKind::Rom4K => "4K",
            CartKind::F8 => "F8",
            CartKind::F6 => "F6",
            CartKind::F4 => "F4",
            CartKind::F9 => "F9",
        }
    }

    fn accepts(self, size: usize) -> bool {
        match self {
            CartKind::Rom2K => size == 2048,
            CartKind::Rom4K => size == 4096,
            CartKind::F8 => size == 8192,
            CartKind::F6 => size == 16384,
            CartKind::F4 => size == 32768,
            CartKind::F9 => size >= BANK_SIZE && size <= MAX_IMAGE_SIZE && size % BANK_SIZE == 0,
        }
    }
}

impl fmt::Display for CartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for CartKind {
    type Err = CartError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "2K" => Ok(CartKind::Rom2K),
            "4K" => Ok(CartKind::Rom4K),
            "F8" => Ok(CartKind::F8),
            "F6" => Ok(CartKind::F6),
            "F4" => Ok(CartKind::F4),
            "F9" => Ok(CartKind::F9),
            _ => Err(CartError::UnknownType(s.to_string())),
        }
    }
}

/// Build the controller for `image`, detecting the scheme when `kind` is `None`.
pub fn create(image: Vec<u8>, kind: Option<CartKind>) -> Result<Box<dyn Cartridge>, CartError> {
    if image.is_empty() {
        return Err(CartError::Empty);
    }
    let kind = match kind {
        Some(k) => k,
        None => CartKind::detect(&image).ok_or(CartError::UnknownSize(image.len()))?,
    };
    if !kind.accepts(image.len()) {
        return Err(CartError::InvalidSize { kind, size: image.len() });
    }
    let cart: Box<dyn Cartridge> = match kind {
        CartKind::Rom2K | CartKind::Rom4K => Box::new(CartridgeRom::new(image)),
        CartKind::F8 => Box::new(CartridgeFx::f8(image)),
        CartKind::F6 => Box::new(CartridgeFx::f6(image)),
        CartKind::F4 => Box::new(CartridgeFx::f4(image)),
        CartKind::F9 => Box::new(CartridgeF9::new(image)),
    };
    Ok(cart)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_by_size() {
        assert_eq!(CartKind::detect(&[0u8; 2048]), Some(CartKind::Rom2K));
        assert_eq!(CartKind::detect(&[0u8; 8192]), Some(CartKind::F8));
        assert_eq!(CartKind::detect(&[0u8; 32768]), Some(CartKind::F4));
        assert_eq!(CartKind::detect(&[0u8; 12288]), None);
    }

    #[test]
    fn test_parse_kind() {
        assert_eq!("f9".parse::<CartKind>(), Ok(CartKind::F9));
        assert_eq!("4K".parse::<CartKind>(), Ok(CartKind::Rom4K));
        assert!(matches!("E0".parse::<CartKind>(), Err(CartError::UnknownType(_))));
    }

    #[test]
    fn test_create_rejects_bad_sizes() {
        assert_eq!(create(Vec::new(), None).err(), Some(CartError::Empty));
        assert_eq!(create(vec![0; 12288], None).err(), Some(CartError::UnknownSize(12288)));
        assert_eq!(
            create(vec![0; 5000], Some(CartKind::F9)).err(),
            Some(CartError::InvalidSize { kind: CartKind::F9, size: 5000 })
        );
        assert!(create(vec![0; 2 * MAX_IMAGE_SIZE], Some(CartKind::F9)).is_err());
    }

    #[test]
    fn test_create_rejects_images_smaller_than_a_bank() {
        for kind in [CartKind::F8, CartKind::F6, CartKind::F4, CartKind::F9, CartKind::Rom4K] {
            assert_eq!(
                create(vec![0; 2048], Some(kind)).err(),
                Some(CartError::InvalidSize { kind, size: 2048 })
            );
        }
        assert!(create(vec![0; 1024], Some(CartKind::Rom2K)).is_err());
    }

    #[test]
    fn test_create_f9_any_bank_multiple() {
        let cart = create(vec![0; 12288], Some(CartKind::F9)).unwrap();
        assert_eq!(cart.name(), "CartridgeF9");
        assert_eq!(cart.bank_count(), 3);
    }

    #[test]
    fn test_map_bank_leaves_hotspot_page_routed() {
        let mut sys = System::new();
        let mut base = CartBase::new(vec![0; 8192], BANK_SIZE, 0, Some(0x1FF8));
        base.map_bank(1, &mut sys);
        assert_eq!(sys.page_access(0x1000).direct_peek_base, Some(4096));
        assert_eq!(sys.page_access(0x1F80).direct_peek_base, Some(4096 + 0xF80));
        assert_eq!(sys.page_access(0x1FC0).direct_peek_base, None);
        assert_eq!(sys.page_access(0x1FC0).code_access_base, Some(4096 + 0xFC0));
    }

    #[test]
    fn test_code_access_marks() {
        let mut cart = create(vec![0; 4096], None).unwrap();
        cart.mark_code_access(0x10, AccessFlags::CODE);
        cart.mark_code_access(0x10, AccessFlags::DATA);
        assert_eq!(cart.code_access(0x10), AccessFlags::CODE | AccessFlags::DATA);
        assert_eq!(cart.code_access(0x9999), AccessFlags::empty());
    }
}
