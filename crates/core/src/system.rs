//! Page-access bus.
//!
//! The 6507 only drives 13 address lines, so the whole address space is
//! `0x0000–0x1FFF`. It is split into 64-byte pages; each page records which
//! device answers for it and, for ROM-backed pages, the offset of the page's
//! first byte inside the device image. Reads of such pages never call into the
//! device, which is what keeps the common path cheap.
//!
//! | Address (A12 A9 A7) | Device              |
//! |---------------------|---------------------|
//! | `1 x x`             | Cartridge (4K window at `0x1000`) |
//! | `0 x 0`             | TIA                 |
//! | `0 0 1`             | RIOT RAM (128 bytes)|
//! | `0 1 1`             | RIOT I/O + timer    |
//!
//! Only the cartridge rewrites its own pages after installation; it does so on
//! every bank switch.

use bitflags::bitflags;

use crate::serializer::{Result, Serializer};

/// Address lines decoded by the bus.
pub const ADDRESS_MASK: u16 = 0x1FFF;
/// log2 of the page size.
pub const PAGE_SHIFT: u16 = 6;
/// Bytes per page.
pub const PAGE_SIZE: u16 = 1 << PAGE_SHIFT;
/// Offset-within-page mask.
pub const PAGE_MASK: u16 = PAGE_SIZE - 1;
/// Number of pages in the address space.
pub const NUM_PAGES: usize = (ADDRESS_MASK as usize + 1) >> PAGE_SHIFT;

/// Devices that can own a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Device {
    /// Nothing drives the bus; reads return the last data-bus value
    #[default]
    None,
    Tia,
    Ram,
    Riot,
    Cartridge,
}

bitflags! {
    /// Debugger classification of how a ROM byte has been accessed.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct AccessFlags: u8 {
        /// Executed as an instruction
        const CODE = 0x80;
        /// Read as playfield/sprite graphics
        const GFX  = 0x40;
        /// Read as playfield graphics
        const PGFX = 0x20;
        /// Read as plain data
        const DATA = 0x10;
        /// Row-mode data (display tables)
        const ROW  = 0x08;
    }
}

/// How the bus resolves accesses to one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PageAccess {
    pub device: Device,
    /// Offset into the device image of this page's first byte. `None` routes
    /// reads through the device itself (hotspot pages).
    pub direct_peek_base: Option<usize>,
    /// Offset into the device's code-access table of this page's first byte.
    pub code_access_base: Option<usize>,
}

impl PageAccess {
    /// A page answered by `device` without direct access.
    pub fn device(device: Device) -> Self {
        PageAccess { device, direct_peek_base: None, code_access_base: None }
    }
}

/// Page table, master clock and data-bus latch.
pub struct System {
    pages: [PageAccess; NUM_PAGES],
    /// Master CPU cycle counter
    cycles: u64,
    /// Last value driven on the data bus
    data_bus: u8,
}

impl System {
    pub fn new() -> Self {
        System {
            pages: [PageAccess::default(); NUM_PAGES],
            cycles: 0,
            data_bus: 0,
        }
    }

    /// Clear the clock and bus latch. Page mappings survive; devices
    /// re-establish theirs in their own reset.
    pub fn reset(&mut self) {
        self.cycles = 0;
        self.data_bus = 0;
    }

    /// Page index for an address (upper address lines ignored).
    #[inline(always)]
    pub fn page_index(addr: u16) -> usize {
        ((addr & ADDRESS_MASK) >> PAGE_SHIFT) as usize
    }

    #[inline(always)]
    pub fn page_access(&self, addr: u16) -> &PageAccess {
        &self.pages[Self::page_index(addr)]
    }

    /// Install the access descriptor for page `page`.
    pub fn set_page_access(&mut self, page: usize, access: PageAccess) {
        if let Some(slot) = self.pages.get_mut(page) {
            *slot = access;
        }
    }

    /// Give every page whose first address satisfies `matches` to `device`.
    pub fn install_device(&mut self, device: Device, matches: impl Fn(u16) -> bool) {
        for page in 0..NUM_PAGES {
            let addr = (page as u16) << PAGE_SHIFT;
            if matches(addr) {
                self.pages[page] = PageAccess::device(device);
            }
        }
    }

    #[inline(always)]
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    #[inline(always)]
    pub fn increment_cycles(&mut self, amount: u64) {
        self.cycles += amount;
    }

    #[inline(always)]
    pub fn data_bus_state(&self) -> u8 {
        self.data_bus
    }

    #[inline(always)]
    pub fn set_data_bus_state(&mut self, value: u8) {
        self.data_bus = value;
    }

    pub fn save(&self, out: &mut Serializer) -> Result<()> {
        out.put_string("System");
        out.put_long(self.cycles);
        out.put_byte(self.data_bus);
        Ok(())
    }

    pub fn load(&mut self, input: &mut Serializer) -> Result<()> {
        input.expect_tag("System")?;
        let cycles = input.get_long()?;
        let data_bus = input.get_byte()?;
        self.cycles = cycles;
        self.data_bus = data_bus;
        Ok(())
    }
}

impl Default for System {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_geometry() {
        assert_eq!(NUM_PAGES, 128);
        assert_eq!(System::page_index(0x1000), 64);
        assert_eq!(System::page_index(0x1FFF), 127);
        // A13-A15 are not connected
        assert_eq!(System::page_index(0xF000), 64);
    }

    #[test]
    fn test_install_device() {
        let mut sys = System::new();
        sys.install_device(Device::Cartridge, |a| a & 0x1000 != 0);
        assert_eq!(sys.page_access(0x1234).device, Device::Cartridge);
        assert_eq!(sys.page_access(0x0080).device, Device::None);
    }

    #[test]
    fn test_save_load() {
        let mut sys = System::new();
        sys.increment_cycles(12345);
        sys.set_data_bus_state(0xA9);
        let mut s = Serializer::new();
        sys.save(&mut s).unwrap();

        let mut other = System::new();
        other.load(&mut s).unwrap();
        assert_eq!(other.cycles(), 12345);
        assert_eq!(other.data_bus_state(), 0xA9);
    }
}
