//! Rewind history.
//!
//! The emulation loop calls [`RewindManager::add_state`] once per frame (the
//! debugger once per step). Each call serializes the whole machine into a
//! slot of a fixed arena, so memory use is bounded and slot buffers are reused
//! instead of reallocated.
//!
//! ## Retention
//!
//! When the history is full, older entries are thinned rather than dropped:
//!
//! ```text
//!  oldest                                                   newest
//!  |  ~1 s apart  |  ... doubling steps ...  | 1 frame apart (single_steps) |
//! ```
//!
//! Scanning backwards past the `single_steps` newest entries, runs of
//! `merge_count` or more entries with the same spacing lose one interior
//! entry, doubling the spacing there while keeping the run's first and last
//! timestamps. Repeated passes give resolution that falls off exponentially
//! with age.
//!
//! ## Cursor
//!
//! `current` is a position in the history; `len()` means "live", i.e. the
//! machine has moved on since the newest entry. Rewind and unwind only move
//! the cursor and load state; they never delete entries. The next
//! `add_state` discards everything after the cursor.

use std::collections::VecDeque;

use log::{debug, error, info, trace};

use crate::serializer::Serializer;
use crate::state::StateManager;
use crate::{CYCLES_PER_SCANLINE, CYCLES_PER_SECOND, FIELD_RATE};

/// Minimum distance of a coarse (emulation) rewind: ¾ s of emulated time.
pub const COARSE_REWIND_CYCLES: u64 = CYCLES_PER_SECOND * 3 / 4;

/// History shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RewindConfig {
    /// Newest entries kept at full resolution
    pub single_steps: usize,
    /// Entries guaranteed at roughly one-second spacing
    pub second_steps: usize,
    /// Equal-step run length that triggers thinning (at least 2)
    pub merge_count: usize,
    /// Extra capacity for the thinned region
    pub slack: usize,
}

impl RewindConfig {
    /// Capacity of the history.
    pub fn max_size(&self) -> usize {
        (self.single_steps + self.second_steps.saturating_sub(self.merge_count) + self.slack).max(2)
    }
}

impl Default for RewindConfig {
    fn default() -> Self {
        RewindConfig { single_steps: 60, second_steps: 10, merge_count: 4, slack: 46 }
    }
}

/// One arena slot.
#[derive(Default)]
struct RewindState {
    data: Serializer,
    cycles: u64,
    frames: u64,
    message: String,
}

/// Read-only view of a history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryInfo<'a> {
    pub cycles: u64,
    pub frames: u64,
    pub message: &'a str,
}

pub struct RewindManager {
    config: RewindConfig,
    max_size: usize,
    /// Arena; one more slot than `max_size` so a new state can be captured
    /// before a full history is compressed
    slots: Vec<RewindState>,
    /// Unused slot indices
    free: Vec<usize>,
    /// Slot indices, oldest first
    list: VecDeque<usize>,
    /// Cursor into `list`; `list.len()` = live machine
    current: usize,
    /// States added since creation
    state_count: u64,
    last_message: Option<String>,
    /// Machine state captured before a restore, reloaded if the restore fails
    scratch: Serializer,
}

impl RewindManager {
    pub fn new(config: RewindConfig) -> Self {
        let config = RewindConfig {
            single_steps: config.single_steps.max(1),
            merge_count: config.merge_count.max(2),
            ..config
        };
        let max_size = config.max_size();
        RewindManager {
            config,
            max_size,
            slots: (0..=max_size).map(|_| RewindState::default()).collect(),
            free: (0..=max_size).rev().collect(),
            list: VecDeque::with_capacity(max_size + 1),
            current: 0,
            state_count: 0,
            last_message: None,
            scratch: Serializer::new(),
        }
    }

    pub fn config(&self) -> &RewindConfig {
        &self.config
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Cursor position; equals [`RewindManager::len`] when live.
    pub fn current_position(&self) -> usize {
        self.current
    }

    /// True if the machine is not sitting on a history entry.
    pub fn is_live(&self) -> bool {
        self.current >= self.list.len()
    }

    pub fn states_added(&self) -> u64 {
        self.state_count
    }

    /// Message describing the last rewind/unwind, for on-screen display.
    pub fn last_message(&self) -> Option<&str> {
        self.last_message.as_deref()
    }

    /// Drop the whole history.
    pub fn clear(&mut self) {
        while let Some(slot) = self.list.pop_back() {
            self.free.push(slot);
        }
        self.current = 0;
        self.last_message = None;
    }

    pub fn iter(&self) -> impl Iterator<Item = EntryInfo<'_>> + '_ {
        self.list.iter().map(move |&slot| {
            let s = &self.slots[slot];
            EntryInfo { cycles: s.cycles, frames: s.frames, message: &s.message }
        })
    }

    /// Frame distance from each entry to the one before it (0 for the oldest).
    pub fn frame_steps(&self) -> Vec<u64> {
        let mut last = None;
        self.iter()
            .map(|e| {
                let step = last.map_or(0, |l| e.frames - l);
                last = Some(e.frames);
                step
            })
            .collect()
    }

    #[inline]
    fn cycles_at(&self, pos: usize) -> u64 {
        self.slots[self.list[pos]].cycles
    }

    fn remove_at(&mut self, pos: usize) {
        if let Some(slot) = self.list.remove(pos) {
            self.free.push(slot);
        }
    }

    // ─── Recording ──────────────────────────────────────────────────────────

    /// Capture the machine and append it to the history.
    ///
    /// Entries after the cursor (an abandoned future) are discarded first.
    /// Returns false, leaving the history untouched, if the machine cannot be
    /// serialized.
    pub fn add_state<M: StateManager>(&mut self, machine: &mut M, message: &str) -> bool {
        let Some(slot) = self.free.pop() else {
            error!("rewind: no free slot ({} entries)", self.list.len());
            return false;
        };

        let state = &mut self.slots[slot];
        state.data.clear();
        if let Err(e) = machine.save_snapshot(&mut state.data) {
            error!("rewind: cannot capture state: {}", e);
            self.free.push(slot);
            return false;
        }
        let cycles = machine.cycles();
        state.cycles = cycles;
        state.frames = machine.frame_count();
        state.message.clear();
        state.message.push_str(message);

        self.discard_future(cycles);
        if self.list.len() >= self.max_size {
            self.compress_states();
        }
        self.list.push_back(slot);
        self.current = self.list.len();
        self.state_count += 1;

        debug!("rewind: +{} at cycle {} ({} entries)", message, cycles, self.list.len());
        true
    }

    /// Drop entries after the cursor, and any entry not strictly older than
    /// `cycles`, so history stays in increasing time order.
    fn discard_future(&mut self, cycles: u64) {
        let keep = (self.current + 1).min(self.list.len());
        while self.list.len() > keep {
            self.remove_at(self.list.len() - 1);
        }
        while let Some(&slot) = self.list.back() {
            if self.slots[slot].cycles < cycles {
                break;
            }
            self.remove_at(self.list.len() - 1);
        }
    }

    /// Free at least one entry by thinning equal-step runs outside the
    /// single-step region.
    fn compress_states(&mut self) {
        let n = self.list.len();
        let single = self.config.single_steps;
        let merge = self.config.merge_count;
        let mut last_step = 0u64;
        let mut step_count = 0usize;
        let mut removed = 0usize;

        if n > single + 1 {
            // `i` is the older entry of the pair being measured
            let mut i = n - 1 - single;
            loop {
                let this_step = self.cycles_at(i + 1).saturating_sub(self.cycles_at(i));
                if this_step == last_step {
                    step_count += 1;
                } else {
                    if step_count >= merge {
                        // Run spans i+1 ..= i+1+step_count; i+2 is interior
                        self.remove_at(i + 2);
                        removed += 1;
                        step_count = 2;
                    } else {
                        step_count = 1;
                    }
                    last_step = this_step;
                }
                if i == 0 {
                    break;
                }
                i -= 1;
            }
        }

        if step_count >= merge || self.list.len() >= self.max_size {
            // The oldest entry anchors the history; thin right after it
            self.remove_at(1);
            removed += 1;
        }
        trace!("rewind: compressed {} -> {} entries ({} removed)", n, self.list.len(), removed);
    }

    // ─── Playback ───────────────────────────────────────────────────────────

    /// Step back in history.
    ///
    /// Fine mode moves to the previous entry. Coarse mode keeps going until
    /// the target is at least [`COARSE_REWIND_CYCLES`] behind the machine, or
    /// the oldest entry is reached. Returns false if there is nothing older.
    pub fn rewind_state<M: StateManager>(&mut self, machine: &mut M, coarse: bool) -> bool {
        let len = self.list.len();
        if len == 0 || self.current == 0 {
            return false;
        }
        let now = machine.cycles();
        let mut target = self.current.min(len) - 1;
        // The newest entry may be the live state itself
        while self.cycles_at(target) >= now {
            if target == 0 {
                return false;
            }
            target -= 1;
        }
        if coarse {
            while target > 0 && now - self.cycles_at(target) < COARSE_REWIND_CYCLES {
                target -= 1;
            }
        }
        self.restore(machine, target, now)
    }

    /// Step forward again after a rewind, with the same granularity rules.
    /// Returns false if the cursor is already on the newest entry or live.
    pub fn unwind_state<M: StateManager>(&mut self, machine: &mut M, coarse: bool) -> bool {
        let len = self.list.len();
        if self.current + 1 >= len {
            return false;
        }
        let now = machine.cycles();
        let mut target = self.current + 1;
        while self.cycles_at(target) <= now {
            target += 1;
            if target >= len {
                return false;
            }
        }
        if coarse {
            while target + 1 < len && self.cycles_at(target) - now < COARSE_REWIND_CYCLES {
                target += 1;
            }
        }
        self.restore(machine, target, now)
    }

    /// Single-entry rewind (debugger).
    pub fn rewind_debugger_state<M: StateManager>(&mut self, machine: &mut M) -> bool {
        self.rewind_state(machine, false)
    }

    /// ~1 second rewind (emulation).
    pub fn rewind_emulation_state<M: StateManager>(&mut self, machine: &mut M) -> bool {
        self.rewind_state(machine, true)
    }

    pub fn unwind_debugger_state<M: StateManager>(&mut self, machine: &mut M) -> bool {
        self.unwind_state(machine, false)
    }

    pub fn unwind_emulation_state<M: StateManager>(&mut self, machine: &mut M) -> bool {
        self.unwind_state(machine, true)
    }

    /// Load entry `target` into the machine. A load that fails part way is
    /// undone from a copy of the machine taken first.
    fn restore<M: StateManager>(&mut self, machine: &mut M, target: usize, now: u64) -> bool {
        self.scratch.clear();
        if let Err(e) = machine.save_snapshot(&mut self.scratch) {
            error!("rewind: cannot capture current state: {}", e);
            return false;
        }

        let slot = self.list[target];
        let state = &mut self.slots[slot];
        if let Err(e) = machine.load_snapshot(&mut state.data) {
            error!("rewind: cannot restore state at cycle {}: {}", state.cycles, e);
            if let Err(e) = machine.load_snapshot(&mut self.scratch) {
                error!("rewind: cannot roll back: {}", e);
            }
            return false;
        }
        let msg = rewind_message(now, state.cycles, machine.scanlines_last_frame());
        info!("{} [{}]", msg, state.message);
        self.current = target;
        self.last_message = Some(msg);
        true
    }
}

impl Default for RewindManager {
    fn default() -> Self {
        Self::new(RewindConfig::default())
    }
}

/// Describe a jump from cycle `now` to cycle `target`, e.g. "Rewind 3 frame(s)".
pub fn rewind_message(now: u64, target: u64, scanlines_last_frame: u32) -> String {
    let (verb, diff) = if target > now { ("Unwind", target - now) } else { ("Rewind", now - target) };
    let line = CYCLES_PER_SCANLINE;
    let frame = line * scanlines_last_frame.max(1) as u64;
    let second = frame * FIELD_RATE;

    if diff < line {
        format!("{} {} cycle(s)", verb, diff)
    } else if diff < frame {
        format!("{} {} scanline(s)", verb, diff / line)
    } else if diff < second {
        format!("{} {} frame(s)", verb, diff / frame)
    } else if diff < second * 60 {
        format!("{} {} second(s)", verb, diff / second)
    } else {
        format!("{} {} minute(s)", verb, diff / second / 60)
    }
}
