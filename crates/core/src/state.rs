//! Whole-machine state capture.
//!
//! The rewind manager and the quick-save code only ever see a machine through
//! this trait: they hand it a [`Serializer`] and get back an opaque blob. A
//! snapshot is always the machine state followed by the display buffer, and is
//! restored in the same order.

use crate::serializer::{Result, Serializer};

/// A machine whose full state can be written to and read from a serializer.
pub trait StateManager {
    /// Write CPU, bus and peripheral state.
    fn save_state(&mut self, out: &mut Serializer) -> Result<()>;

    /// Restore what [`StateManager::save_state`] wrote.
    fn load_state(&mut self, input: &mut Serializer) -> Result<()>;

    /// Write the video output buffer.
    fn save_display(&self, out: &mut Serializer) -> Result<()>;

    /// Restore what [`StateManager::save_display`] wrote.
    fn load_display(&mut self, input: &mut Serializer) -> Result<()>;

    /// Master cycle counter.
    fn cycles(&self) -> u64;

    /// Completed frames since power-on.
    fn frame_count(&self) -> u64;

    /// Scanlines in the last completed frame.
    fn scanlines_last_frame(&self) -> u32 {
        crate::SCANLINES_PER_FRAME
    }

    /// Capture state and display together.
    fn save_snapshot(&mut self, out: &mut Serializer) -> Result<()> {
        self.save_state(out)?;
        self.save_display(out)
    }

    /// Restore state and display together, reading from the start of `input`.
    fn load_snapshot(&mut self, input: &mut Serializer) -> Result<()> {
        input.reset();
        self.load_state(input)?;
        self.load_display(input)
    }
}
