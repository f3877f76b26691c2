//! Debugging facilities.
//!
//! - **Watchpoints**: Stop on bus reads/writes, optionally only while a given
//!   cartridge bank is visible
//! - **Bank view**: Current bank string, bank list, forced bank display
//! - **RAM Viewer**: Hex + ASCII dump of any region
//! - **Code access**: Summary of how ROM bytes of a bank have been used
//!
//! The bus calls [`Debugger::check`] from [`crate::Vcs::peek`] /
//! [`crate::Vcs::poke`] whenever [`Debugger::is_active`].

use log::debug;

use crate::cart::{Cartridge, WINDOW_START};
use crate::system::{AccessFlags, System, ADDRESS_MASK};

/// Direction of a bus access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
}

/// Accesses a watchpoint reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchKind {
    Read,
    Write,
    ReadWrite,
}

impl WatchKind {
    fn covers(self, access: Access) -> bool {
        matches!(
            (self, access),
            (WatchKind::ReadWrite, _) | (WatchKind::Read, Access::Read) | (WatchKind::Write, Access::Write)
        )
    }

    fn label(self) -> &'static str {
        match self {
            WatchKind::Read => "R",
            WatchKind::Write => "W",
            WatchKind::ReadWrite => "RW",
        }
    }
}

/// A bus watchpoint.
#[derive(Debug, Clone)]
pub struct Watchpoint {
    /// 13-bit bus address
    pub addr: u16,
    pub kind: WatchKind,
    /// Cartridge addresses only: trigger only while this bank is visible
    pub bank: Option<u16>,
    /// Trigger only when the byte read or written equals this
    pub value: Option<u8>,
    pub hits: u64,
    pub enabled: bool,
}

impl Watchpoint {
    fn triggers(&self, access: Access, addr: u16, value: u8, bank: u16) -> bool {
        self.enabled
            && self.addr == addr
            && self.kind.covers(access)
            && self.value.map_or(true, |v| v == value)
            && (addr < WINDOW_START || self.bank.map_or(true, |b| b == bank))
    }
}

/// First watchpoint that fired since the last [`Debugger::take_hit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchHit {
    pub index: usize,
    pub addr: u16,
    /// Cartridge bank visible when the access happened
    pub bank: u16,
    pub access: Access,
    /// Byte before the access (equal to `new_val` for reads)
    pub old_val: u8,
    pub new_val: u8,
}

/// Debugger state.
pub struct Debugger {
    pub watchpoints: Vec<Watchpoint>,
    hit: Option<WatchHit>,
}

impl Debugger {
    pub fn new() -> Self {
        Debugger { watchpoints: Vec::new(), hit: None }
    }

    /// True if any watchpoint is set.
    #[inline]
    pub fn is_active(&self) -> bool {
        !self.watchpoints.is_empty()
    }

    /// Watch `addr` in every bank. Returns the watchpoint index.
    pub fn watch(&mut self, addr: u16, kind: WatchKind) -> usize {
        self.push(addr, kind, None)
    }

    /// Watch a cartridge address only while `bank` is visible.
    pub fn watch_bank(&mut self, addr: u16, kind: WatchKind, bank: u16) -> usize {
        self.push(addr, kind, Some(bank))
    }

    fn push(&mut self, addr: u16, kind: WatchKind, bank: Option<u16>) -> usize {
        self.watchpoints.push(Watchpoint {
            addr: addr & ADDRESS_MASK,
            kind,
            bank,
            value: None,
            hits: 0,
            enabled: true,
        });
        self.watchpoints.len() - 1
    }

    pub fn unwatch(&mut self, index: usize) -> bool {
        if index >= self.watchpoints.len() {
            return false;
        }
        self.watchpoints.remove(index);
        true
    }

    /// Record a bus access. `bank` is the cartridge bank visible before it.
    pub fn check(&mut self, access: Access, addr: u16, old_val: u8, new_val: u8, bank: u16) {
        for (index, wp) in self.watchpoints.iter_mut().enumerate() {
            if !wp.triggers(access, addr, new_val, bank) {
                continue;
            }
            wp.hits += 1;
            if self.hit.is_none() {
                debug!("watchpoint {}: {:?} ${:04X} = ${:02X} (bank {})", index, access, addr, new_val, bank);
                self.hit = Some(WatchHit { index, addr, bank, access, old_val, new_val });
            }
        }
    }

    pub fn take_hit(&mut self) -> Option<WatchHit> {
        self.hit.take()
    }

    /// One line per watchpoint, e.g. `  #0   $1FF9 W  bank 3  hits 2`.
    pub fn list_watchpoints(&self) -> String {
        if self.watchpoints.is_empty() {
            return "No watchpoints set.\n".into();
        }
        let mut s = String::new();
        for (i, wp) in self.watchpoints.iter().enumerate() {
            s.push_str(&format!("  #{:<3} ${:04X} {:<2}", i, wp.addr, wp.kind.label()));
            if let Some(bank) = wp.bank {
                s.push_str(&format!("  bank {}", bank));
            }
            if let Some(v) = wp.value {
                s.push_str(&format!("  =${:02X}", v));
            }
            s.push_str(&format!("  hits {}", wp.hits));
            if !wp.enabled {
                s.push_str("  (off)");
            }
            s.push('\n');
        }
        s
    }
}

impl Default for Debugger {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Bank view ──────────────────────────────────────────────────────────────

/// One-line bank status, e.g. `Bank = 3 ($3)`.
pub fn bank_state(cart: &dyn Cartridge) -> String {
    let bank = cart.get_bank();
    format!("Bank = {} (${:X})", bank, bank)
}

/// Labels for a bank selector, one per bank.
pub fn bank_list(cart: &dyn Cartridge) -> Vec<String> {
    (0..cart.bank_count()).map(|i| format!("{} (${:X})", i, i)).collect()
}

/// Show `bank` regardless of what the program does: switch, then keep the
/// cartridge locked so hotspot accesses can't move it. Returns the bank now
/// visible.
pub fn force_bank(cart: &mut dyn Cartridge, sys: &mut System, bank: u16) -> u16 {
    cart.unlock_bank();
    cart.bank(bank, sys);
    cart.lock_bank();
    debug!("debugger: forced bank {}", cart.get_bank());
    cart.get_bank()
}

/// Let the program switch banks again after [`force_bank`].
pub fn release_bank(cart: &mut dyn Cartridge) {
    cart.unlock_bank();
    debug!("debugger: bank {} released", cart.get_bank());
}

/// Cartridge description plus the current bank.
pub fn cart_info(cart: &dyn Cartridge) -> String {
    let lock = if cart.bank_locked() { " [locked]" } else { "" };
    format!("{}\n{}{}\n", cart.about(), bank_state(cart), lock)
}

// ─── RAM Viewer ─────────────────────────────────────────────────────────────

/// Format a hex + ASCII dump of `data`, whose first byte lives at bus
/// address `base`. `start` and `length` are bus addresses/counts.
///
/// Outputs 16 bytes per line with address, hex values, and ASCII printable chars.
pub fn dump_ram(data: &[u8], base: u16, start: u16, length: u16) -> String {
    let mut s = String::new();
    let first = start.saturating_sub(base) as usize;
    let end = (first + length as usize).min(data.len());
    let mut i = first;
    while i < end {
        let line_end = (i + 16).min(end);
        s.push_str(&format!("{:04X}: ", base as usize + i));
        // Hex bytes
        for j in i..i + 16 {
            if j < line_end {
                s.push_str(&format!("{:02X} ", data[j]));
            } else {
                s.push_str("   ");
            }
            if j == i + 7 { s.push(' '); }
        }
        s.push(' ');
        // ASCII
        for &c in &data[i..line_end] {
            s.push(if (0x20..0x7F).contains(&c) { c as char } else { '.' });
        }
        s.push('\n');
        i += 16;
    }
    s
}

// ─── Code access ────────────────────────────────────────────────────────────

/// Count how many bytes of `bank` carry each access flag.
pub fn code_access_summary(cart: &dyn Cartridge, bank: u16) -> String {
    let bank_size = cart.base().bank_size;
    let start = (bank % cart.bank_count().max(1)) as usize * bank_size;
    let names = [
        (AccessFlags::CODE, "CODE"),
        (AccessFlags::GFX, "GFX"),
        (AccessFlags::PGFX, "PGFX"),
        (AccessFlags::DATA, "DATA"),
        (AccessFlags::ROW, "ROW"),
    ];
    let mut counts = [0usize; 5];
    for offset in start..start + bank_size {
        let flags = cart.code_access(offset);
        for (n, (flag, _)) in names.iter().enumerate() {
            if flags.contains(*flag) { counts[n] += 1; }
        }
    }
    let mut s = format!("Bank {} access:", bank);
    for ((_, name), count) in names.iter().zip(counts) {
        s.push_str(&format!(" {}={}", name, count));
    }
    s.push('\n');
    s
}
