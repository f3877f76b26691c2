//! Video output buffer.
//!
//! Holds one palette index per pixel for the most recent frame, plus the
//! frame and scanline counters the TIA keeps. Turning indices into colors is
//! the frontend's job.
//!
//! Saved in two halves so a snapshot can restore counters and picture
//! independently: [`Display::save`] writes the counters, [`Display::save_display`]
//! the pixels.

use crate::serializer::{Result, Serializer};
use crate::{SCANLINES_PER_FRAME, SCREEN_HEIGHT, SCREEN_WIDTH};

const FB_SIZE: usize = SCREEN_WIDTH * SCREEN_HEIGHT;

pub struct Display {
    /// Palette index per pixel, row-major
    pub framebuffer: Vec<u8>,
    /// Completed frames since power-on
    frame_count: u64,
    /// Scanlines drawn so far in the current frame
    scanlines: u32,
    /// Scanlines in the last completed frame
    scanlines_last_frame: u32,
    /// Whether framebuffer has been updated
    pub dirty: bool,
}

impl Display {
    pub fn new() -> Self {
        Display {
            framebuffer: vec![0; FB_SIZE],
            frame_count: 0,
            scanlines: 0,
            scanlines_last_frame: SCANLINES_PER_FRAME,
            dirty: false,
        }
    }

    pub fn reset(&mut self) {
        self.framebuffer.fill(0);
        self.frame_count = 0;
        self.scanlines = 0;
        self.scanlines_last_frame = SCANLINES_PER_FRAME;
        self.dirty = true;
    }

    pub fn set_pixel(&mut self, x: usize, y: usize, color: u8) {
        if x < SCREEN_WIDTH && y < SCREEN_HEIGHT {
            self.framebuffer[y * SCREEN_WIDTH + x] = color;
            self.dirty = true;
        }
    }

    pub fn pixel(&self, x: usize, y: usize) -> u8 {
        if x < SCREEN_WIDTH && y < SCREEN_HEIGHT { self.framebuffer[y * SCREEN_WIDTH + x] } else { 0 }
    }

    /// Count scanlines drawn in the current frame.
    pub fn add_scanlines(&mut self, n: u32) {
        self.scanlines += n;
    }

    /// Close the current frame (VSYNC).
    pub fn end_frame(&mut self) {
        self.frame_count += 1;
        if self.scanlines > 0 {
            self.scanlines_last_frame = self.scanlines;
        }
        self.scanlines = 0;
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn scanlines(&self) -> u32 {
        self.scanlines
    }

    pub fn scanlines_last_frame(&self) -> u32 {
        self.scanlines_last_frame
    }

    pub fn save(&self, out: &mut Serializer) -> Result<()> {
        out.put_string("TIA");
        out.put_long(self.frame_count);
        out.put_int(self.scanlines);
        out.put_int(self.scanlines_last_frame);
        Ok(())
    }

    pub fn load(&mut self, input: &mut Serializer) -> Result<()> {
        input.expect_tag("TIA")?;
        let frame_count = input.get_long()?;
        let scanlines = input.get_int()?;
        let scanlines_last_frame = input.get_int()?;
        self.frame_count = frame_count;
        self.scanlines = scanlines;
        self.scanlines_last_frame = scanlines_last_frame;
        Ok(())
    }

    pub fn save_display(&self, out: &mut Serializer) -> Result<()> {
        out.put_string("TIADisplay");
        out.put_byte_array(&self.framebuffer);
        Ok(())
    }

    pub fn load_display(&mut self, input: &mut Serializer) -> Result<()> {
        input.expect_tag("TIADisplay")?;
        input.get_byte_array(&mut self.framebuffer)?;
        self.dirty = true;
        Ok(())
    }
}

impl Default for Display {
    fn default() -> Self {
        Self::new()
    }
}
