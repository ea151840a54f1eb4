//! Stored pointer correction and companion-archive classification
//!
//! Maps store pointers as virtual addresses. Subtracting the matching magic
//! yields a file offset; the arithmetic is modular 32-bit, so
//! `offset.wrapping_add(magic) == raw` holds for every local pointer.

use serde::{Deserialize, Serialize};

/// Bits of a raw offset that carry the address
pub const OFFSET_MASK: u32 = 0x3FFF_FFFF;

const BIT_30: u32 = 1 << 30;
const BIT_31: u32 = 1 << 31;

/// Archive that physically holds a tag or BSP block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ExternalSource {
    /// Stored in the archive being decoded
    #[default]
    Local,
    /// Stored in the main menu archive
    MainMenu,
    /// Stored in the multiplayer shared archive
    MultiplayerShared,
    /// Stored in the single player shared archive
    SinglePlayerShared,
    /// Stored in the external bitmap library (V2 only)
    BitmapLibrary,
}

impl ExternalSource {
    /// Classify a raw (uncorrected) offset by its top two bits
    ///
    /// `00` local, `01` main menu, `10` multiplayer shared, `11` single
    /// player shared. The bit assignment has only been checked against a
    /// small set of archives.
    pub const fn classify(raw: u32) -> Self {
        match (raw & BIT_31 != 0, raw & BIT_30 != 0) {
            (false, false) => Self::Local,
            (false, true) => Self::MainMenu,
            (true, false) => Self::MultiplayerShared,
            (true, true) => Self::SinglePlayerShared,
        }
    }

    /// Whether the data lives outside the archive being decoded
    pub const fn is_external(self) -> bool {
        !matches!(self, Self::Local)
    }
}

impl std::fmt::Display for ExternalSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Local => "local",
            Self::MainMenu => "mainmenu",
            Self::MultiplayerShared => "shared",
            Self::SinglePlayerShared => "single_player_shared",
            Self::BitmapLibrary => "bitmaps",
        };
        f.write_str(name)
    }
}

/// A corrected pointer with the archive it points into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedPointer {
    /// Pointer as stored
    pub raw: u32,
    /// Corrected offset, in the archive named by `source`
    pub offset: u32,
    /// Archive holding the data
    pub source: ExternalSource,
}

/// Subtract a magic from a stored pointer
pub const fn correct(raw: u32, magic: u32) -> u32 {
    raw.wrapping_sub(magic)
}

/// Correct a pointer whose top bits name a companion archive
///
/// Local pointers keep all 32 bits; external pointers drop the two
/// classification bits before the magic is subtracted.
pub const fn resolve(raw: u32, magic: u32) -> ResolvedPointer {
    let source = ExternalSource::classify(raw);
    let address = if source.is_external() {
        raw & OFFSET_MASK
    } else {
        raw
    };
    ResolvedPointer {
        raw,
        offset: correct(address, magic),
        source,
    }
}
