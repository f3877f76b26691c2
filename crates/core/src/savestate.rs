//! Save state (quick save / quick load).
//!
//! Captures the full machine to a file using the same tagged serializer blob
//! the rewind history keeps in memory, wrapped in bincode and deflate. The
//! frontend binds it to `s` / `l`.
//!
//! ## File format
//!
//! ```text
//! +------------------+
//! | Magic "VCSS"     |  4 bytes
//! +------------------+
//! | Format version   |  u32 little-endian (currently 1)
//! +------------------+
//! | Compressed data  |  deflate-compressed bincode SaveState
//! +------------------+
//! ```

use std::io;
use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::serializer::{Serializer, SerializerError};
use crate::state::StateManager;
use crate::Vcs;

/// Magic bytes identifying a save state file.
const MAGIC: &[u8; 4] = b"VCSS";
/// Current save state format version.
const FORMAT_VERSION: u32 = 1;
/// Magic + version.
const HEADER_LEN: usize = 8;

#[derive(Debug, Error)]
pub enum SaveStateError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("encoding error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("decompress error: {0}")]
    Decompress(String),

    #[error("invalid save state file (bad magic)")]
    BadMagic,

    #[error("unsupported save state version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("cartridge mismatch: save={saved} current={current}")]
    CartMismatch { saved: String, current: String },

    #[error("machine state: {0}")]
    State(#[from] SerializerError),
}

/// Everything needed to put a machine back where it was.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveState {
    /// Cartridge tag, e.g. `CartridgeF9`
    pub cart_name: String,
    pub bank_count: u16,
    pub frames: u64,
    pub cycles: u64,
    /// Machine state followed by the display buffer
    pub state: Vec<u8>,
}

/// Snapshot `vcs`.
pub fn capture(vcs: &mut Vcs) -> Result<SaveState, SaveStateError> {
    let mut s = Serializer::new();
    vcs.save_snapshot(&mut s)?;
    Ok(SaveState {
        cart_name: vcs.cart.name().to_string(),
        bank_count: vcs.cart.bank_count(),
        frames: vcs.frame_count(),
        cycles: vcs.cycles(),
        state: s.into_bytes(),
    })
}

/// Put `vcs` back into `state`. On failure the machine is left as it was.
pub fn restore(vcs: &mut Vcs, state: &SaveState) -> Result<(), SaveStateError> {
    if state.cart_name != vcs.cart.name() || state.bank_count != vcs.cart.bank_count() {
        return Err(SaveStateError::CartMismatch {
            saved: format!("{} ({} banks)", state.cart_name, state.bank_count),
            current: format!("{} ({} banks)", vcs.cart.name(), vcs.cart.bank_count()),
        });
    }

    let mut backup = Serializer::new();
    vcs.save_snapshot(&mut backup)?;

    let mut input = Serializer::from_bytes(state.state.clone());
    if let Err(e) = vcs.load_snapshot(&mut input) {
        warn!("save state rejected ({}), rolling back", e);
        vcs.load_snapshot(&mut backup)?;
        return Err(e.into());
    }
    Ok(())
}

/// Serialize to the on-disk format.
pub fn encode(state: &SaveState) -> Result<Vec<u8>, SaveStateError> {
    let payload = bincode::serialize(state)?;
    let compressed = miniz_oxide::deflate::compress_to_vec(&payload, 6);

    let mut out = Vec::with_capacity(HEADER_LEN + compressed.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    out.extend_from_slice(&compressed);
    Ok(out)
}

/// Parse the on-disk format, verifying magic and version.
pub fn decode(data: &[u8]) -> Result<SaveState, SaveStateError> {
    if data.len() < HEADER_LEN || &data[0..4] != MAGIC {
        return Err(SaveStateError::BadMagic);
    }
    let version = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
    if version != FORMAT_VERSION {
        return Err(SaveStateError::UnsupportedVersion { found: version, expected: FORMAT_VERSION });
    }

    let decompressed = miniz_oxide::inflate::decompress_to_vec(&data[HEADER_LEN..])
        .map_err(|e| SaveStateError::Decompress(format!("{:?}", e)))?;

    Ok(bincode::deserialize(&decompressed)?)
}

/// Capture `vcs` and write it to `path`.
pub fn save_to_file(vcs: &mut Vcs, path: &Path) -> Result<(), SaveStateError> {
    let state = capture(vcs)?;
    std::fs::write(path, encode(&state)?)?;
    info!("state saved to {} (frame {})", path.display(), state.frames);
    Ok(())
}

/// Read `path` and restore `vcs` from it.
pub fn load_from_file(vcs: &mut Vcs, path: &Path) -> Result<(), SaveStateError> {
    let data = std::fs::read(path)?;
    let state = decode(&data)?;
    restore(vcs, &state)?;
    info!("state loaded from {} (frame {})", path.display(), state.frames);
    Ok(())
}

/// Derive save state file path from ROM path.
/// `game.bin` → `game.state`, `game.a26` → `game.state`
pub fn state_path(rom_path: &Path) -> PathBuf {
    rom_path.with_extension("state")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart::CartKind;

    fn f9_vcs() -> Vcs {
        let image: Vec<u8> = (0..8 * 4096).map(|i| (i / 4096) as u8).collect();
        Vcs::from_image(image, Some(CartKind::F9)).unwrap()
    }

    #[test]
    fn test_round_trip() {
        let mut vcs = f9_vcs();
        vcs.poke(0x1FF9, 6);
        vcs.poke(0x0081, 0x5A);
        vcs.run_frame();
        let bytes = encode(&capture(&mut vcs).unwrap()).unwrap();
        assert_eq!(&bytes[0..4], b"VCSS");

        let mut other = f9_vcs();
        let state = decode(&bytes).unwrap();
        assert_eq!(state.frames, 1);
        restore(&mut other, &state).unwrap();
        assert_eq!(other.cart.get_bank(), 6);
        assert_eq!(other.peek(0x0081), 0x5A);
        assert_eq!(other.cycles(), vcs.cycles());
    }

    #[test]
    fn test_bad_header() {
        assert!(matches!(decode(b"NOPE\x01\0\0\0"), Err(SaveStateError::BadMagic)));
        assert!(matches!(decode(b"VCS"), Err(SaveStateError::BadMagic)));
        assert!(matches!(
            decode(b"VCSS\x02\0\0\0"),
            Err(SaveStateError::UnsupportedVersion { found: 2, expected: 1 })
        ));
    }

    #[test]
    fn test_cartridge_mismatch() {
        let mut f8 = Vcs::from_image(vec![0; 8192], None).unwrap();
        let state = capture(&mut f8).unwrap();
        let mut vcs = f9_vcs();
        assert!(matches!(restore(&mut vcs, &state), Err(SaveStateError::CartMismatch { .. })));
    }

    #[test]
    fn test_corrupt_state_rolls_back() {
        let mut vcs = f9_vcs();
        let mut state = capture(&mut vcs).unwrap();
        state.state.truncate(state.state.len() / 2);

        vcs.poke(0x1FF9, 3);
        vcs.poke(0x0080, 9);
        assert!(matches!(restore(&mut vcs, &state), Err(SaveStateError::State(_))));
        assert_eq!(vcs.cart.get_bank(), 3);
        assert_eq!(vcs.peek(0x0080), 9);
    }

    #[test]
    fn test_file_round_trip() {
        let path = std::env::temp_dir().join(format!("vcs-core-test-{}.state", std::process::id()));
        let mut vcs = f9_vcs();
        vcs.poke(0x1FF9, 2);
        save_to_file(&mut vcs, &path).unwrap();

        let mut other = f9_vcs();
        load_from_file(&mut other, &path).unwrap();
        assert_eq!(other.cart.get_bank(), 2);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_state_path() {
        assert_eq!(state_path(Path::new("roms/game.bin")), PathBuf::from("roms/game.state"));
        assert_eq!(state_path(Path::new("pitfall")), PathBuf::from("pitfall.state"));
    }
}
