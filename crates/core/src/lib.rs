//! # vcs-core
//!
//! Atari 2600 (VCS) emulation core: the page-access bus, cartridge bank
//! switching, RIOT RAM, machine state serialization and a rewind history.
//!
//! ## Architecture
//!
//! - [`Vcs`] — Top-level machine that wires together bus, cartridge, RAM and display
//! - [`system::System`] — 64-byte page table, master clock, data-bus latch
//! - [`cart`] — Bank-switching controllers (2K/4K, F8/F6/F4, Skyline F9)
//! - [`memory::Ram`] — 128 bytes of RIOT RAM
//! - [`display::Display`] — Frame buffer and frame/scanline counters
//! - [`serializer`] — Tagged binary state format
//! - [`state::StateManager`] — What the rewind history needs from a machine
//! - [`rewind`] — Bounded, exponentially thinned rewind history
//! - [`savestate`] — Quick save / quick load files
//! - [`debugger`] — Watchpoints, bank views, hex dumps
//!
//! ## Timing
//!
//! One scanline is 76 CPU cycles and an NTSC frame is 262 scanlines, so a
//! second of emulated time is `76 × 262 × 60` cycles. The rewind history
//! measures distances in these units.
//!
//! TIA video/audio and RIOT timers are outside this core: their pages answer
//! reads with the last data-bus value and ignore writes.

pub mod cart;
pub mod debugger;
pub mod display;
pub mod memory;
pub mod rewind;
pub mod savestate;
pub mod serializer;
pub mod state;
pub mod system;

use log::{debug, warn};

pub use cart::{CartError, CartKind, Cartridge};
pub use debugger::Debugger;
pub use display::Display;
pub use memory::Ram;
pub use rewind::{RewindConfig, RewindManager};
pub use serializer::{Serializer, SerializerError};
pub use state::StateManager;
pub use system::System;

use debugger::Access;
use system::{AccessFlags, Device, ADDRESS_MASK, PAGE_MASK};

/// CPU cycles per scanline
pub const CYCLES_PER_SCANLINE: u64 = 76;
/// Scanlines per NTSC frame
pub const SCANLINES_PER_FRAME: u32 = 262;
/// NTSC field rate
pub const FIELD_RATE: u64 = 60;
/// CPU cycles per frame
pub const CYCLES_PER_FRAME: u64 = CYCLES_PER_SCANLINE * SCANLINES_PER_FRAME as u64;
/// CPU cycles per second of emulated time
pub const CYCLES_PER_SECOND: u64 = CYCLES_PER_FRAME * FIELD_RATE;

/// Visible pixels per scanline
pub const SCREEN_WIDTH: usize = 160;
/// Frame buffer height (one row per scanline)
pub const SCREEN_HEIGHT: usize = SCANLINES_PER_FRAME as usize;

/// The console: bus, cartridge, RAM and video buffer.
pub struct Vcs {
    pub system: System,
    pub cart: Box<dyn Cartridge>,
    pub ram: Ram,
    pub display: Display,
    pub debugger: Debugger,
}

impl Vcs {
    /// Build a console around `cart` and map every device onto the bus.
    pub fn new(cart: Box<dyn Cartridge>) -> Self {
        let mut vcs = Vcs {
            system: System::new(),
            cart,
            ram: Ram::new(),
            display: Display::new(),
            debugger: Debugger::new(),
        };
        vcs.system.install_device(Device::Tia, |a| a & 0x1080 == 0);
        vcs.system.install_device(Device::Ram, Ram::decodes);
        vcs.system.install_device(Device::Riot, |a| a & 0x1280 == 0x0280);
        vcs.cart.install(&mut vcs.system);
        debug!("{} installed, {} bank(s)", vcs.cart.name(), vcs.cart.bank_count());
        vcs
    }

    /// Create the cartridge for `image` and build a console around it.
    pub fn from_image(image: Vec<u8>, kind: Option<CartKind>) -> Result<Self, CartError> {
        Ok(Self::new(cart::create(image, kind)?))
    }

    /// Console reset: clock, RAM, video and the cartridge's startup bank.
    pub fn reset(&mut self) {
        self.system.reset();
        self.ram.reset();
        self.display.reset();
        self.cart.reset(&mut self.system);
    }

    // ─── Bus ────────────────────────────────────────────────────────────────

    /// CPU-side read. May switch banks if `addr` is a hotspot.
    pub fn peek(&mut self, addr: u16) -> u8 {
        let addr = addr & ADDRESS_MASK;
        let access = *self.system.page_access(addr);
        let bank = self.cart.get_bank();
        let value = match access.device {
            Device::Cartridge => match access.direct_peek_base {
                Some(base) => self.cart.image()[base + (addr & PAGE_MASK) as usize],
                None => self.cart.peek(addr, &mut self.system),
            },
            Device::Ram => self.ram.read(addr),
            Device::Tia | Device::Riot | Device::None => self.system.data_bus_state(),
        };
        self.system.set_data_bus_state(value);
        if self.debugger.is_active() {
            self.debugger.check(Access::Read, addr, value, value, bank);
        }
        value
    }

    /// Read and record how the byte was used (code, graphics, data).
    pub fn peek_flagged(&mut self, addr: u16, flags: AccessFlags) -> u8 {
        let addr = addr & ADDRESS_MASK;
        let code_base = self.system.page_access(addr).code_access_base;
        let value = self.peek(addr);
        if let Some(base) = code_base {
            if !flags.is_empty() {
                self.cart.mark_code_access(base + (addr & PAGE_MASK) as usize, flags);
            }
        }
        value
    }

    /// CPU-side write. Returns true if a device took the write (RAM stored
    /// it, or the cartridge consumed it as a hotspot access).
    pub fn poke(&mut self, addr: u16, value: u8) -> bool {
        let addr = addr & ADDRESS_MASK;
        let device = self.system.page_access(addr).device;
        if self.debugger.is_active() {
            let old = match device {
                Device::Ram => self.ram.read(addr),
                Device::Cartridge => self.cart.base().read(addr),
                _ => self.system.data_bus_state(),
            };
            let bank = self.cart.get_bank();
            self.debugger.check(Access::Write, addr, old, value, bank);
        }
        self.system.set_data_bus_state(value);
        match device {
            Device::Cartridge => self.cart.poke(addr, value, &mut self.system),
            Device::Ram => {
                self.ram.write(addr, value);
                true
            }
            Device::Tia | Device::Riot | Device::None => false,
        }
    }

    /// Debugger read: no bank switch, no bus change, no watchpoint.
    pub fn debug_peek(&mut self, addr: u16) -> u8 {
        let addr = addr & ADDRESS_MASK;
        let access = *self.system.page_access(addr);
        match access.device {
            Device::Cartridge => match access.direct_peek_base {
                Some(base) => self.cart.image()[base + (addr & PAGE_MASK) as usize],
                None => {
                    let was_locked = self.cart.bank_locked();
                    let bus = self.system.data_bus_state();
                    self.cart.lock_bank();
                    let value = self.cart.peek(addr, &mut self.system);
                    if !was_locked {
                        self.cart.unlock_bank();
                    }
                    self.system.set_data_bus_state(bus);
                    value
                }
            },
            Device::Ram => self.ram.read(addr),
            Device::Tia | Device::Riot | Device::None => self.system.data_bus_state(),
        }
    }

    /// Overwrite a ROM byte in the visible bank (debugger patch).
    pub fn patch(&mut self, addr: u16, value: u8) -> bool {
        let addr = addr & ADDRESS_MASK;
        if self.system.page_access(addr).device != Device::Cartridge {
            warn!("patch ${:04X}: not a cartridge address", addr);
            return false;
        }
        self.cart.patch(addr, value)
    }

    // ─── Timing ─────────────────────────────────────────────────────────────

    /// Move the master clock forward.
    pub fn advance(&mut self, cycles: u64) {
        self.system.increment_cycles(cycles);
    }

    /// Run one NTSC frame.
    pub fn run_frame(&mut self) {
        self.advance(CYCLES_PER_FRAME);
        self.display.add_scanlines(SCANLINES_PER_FRAME);
        self.display.end_frame();
    }

    /// True if the bank or ROM changed since the last call (UI refresh hint).
    pub fn take_bank_changed(&mut self) -> bool {
        self.cart.bank_changed()
    }
}

impl StateManager for Vcs {
    fn save_state(&mut self, out: &mut Serializer) -> serializer::Result<()> {
        out.put_string("Vcs");
        self.system.save(out)?;
        self.ram.save(out)?;
        if !self.cart.save(out) {
            return Err(SerializerError::Component(self.cart.name()));
        }
        self.display.save(out)
    }

    fn load_state(&mut self, input: &mut Serializer) -> serializer::Result<()> {
        input.expect_tag("Vcs")?;
        self.system.load(input)?;
        self.ram.load(input)?;
        if !self.cart.load(input, &mut self.system) {
            return Err(SerializerError::Component(self.cart.name()));
        }
        self.display.load(input)
    }

    fn save_display(&self, out: &mut Serializer) -> serializer::Result<()> {
        self.display.save_display(out)
    }

    fn load_display(&mut self, input: &mut Serializer) -> serializer::Result<()> {
        self.display.load_display(input)
    }

    fn cycles(&self) -> u64 {
        self.system.cycles()
    }

    fn frame_count(&self) -> u64 {
        self.display.frame_count()
    }

    fn scanlines_last_frame(&self) -> u32 {
        self.display.scanlines_last_frame()
    }
}
