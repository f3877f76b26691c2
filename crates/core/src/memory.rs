//! RIOT (6532) RAM.
//!
//! The console has exactly 128 bytes of RAM, inside the RIOT chip:
//!
//! | Address Range   | Content                     |
//! |-----------------|-----------------------------|
//! | `0x0080–0x00FF` | RAM                         |
//! | `0x0180–0x01FF` | RAM mirror (6502 stack page)|
//!
//! Any address with A7 set and A9 clear decodes to RAM; only the low 7 bits
//! select the byte.

use crate::serializer::{Result, Serializer};

/// RAM size in bytes.
pub const RAM_SIZE: usize = 128;
/// Mask applied to every RAM access.
pub const RAM_MASK: u16 = 0x7F;

/// 128-byte RIOT RAM.
pub struct Ram {
    pub data: [u8; RAM_SIZE],
}

impl Ram {
    pub fn new() -> Self {
        Ram { data: [0u8; RAM_SIZE] }
    }

    /// True if `addr` decodes to RAM.
    #[inline(always)]
    pub fn decodes(addr: u16) -> bool {
        addr & 0x1080 == 0x0080 && addr & 0x0200 == 0
    }

    #[inline(always)]
    pub fn read(&self, addr: u16) -> u8 {
        self.data[(addr & RAM_MASK) as usize]
    }

    #[inline(always)]
    pub fn write(&mut self, addr: u16, v: u8) {
        self.data[(addr & RAM_MASK) as usize] = v;
    }

    pub fn reset(&mut self) {
        self.data = [0u8; RAM_SIZE];
    }

    pub fn save(&self, out: &mut Serializer) -> Result<()> {
        out.put_string("M6532");
        out.put_byte_array(&self.data);
        Ok(())
    }

    pub fn load(&mut self, input: &mut Serializer) -> Result<()> {
        input.expect_tag("M6532")?;
        let mut data = [0u8; RAM_SIZE];
        input.get_byte_array(&mut data)?;
        self.data = data;
        Ok(())
    }
}

impl Default for Ram {
    fn default() -> Self {
        Self::new()
    }
}
