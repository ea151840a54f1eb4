//! Decoded BSP descriptors and lightmap tables

use crate::pointer::ExternalSource;
use crate::tags::TagId;
use binrw::BinRead;

/// Colours per lightmap palette
pub const PALETTE_COLORS: usize = 256;

/// Bytes per lightmap palette
pub const PALETTE_SIZE: u32 = 1024;

/// One palette colour, stored B, G, R, A
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, BinRead)]
#[br(little)]
pub struct PaletteColor {
    /// Blue
    pub b: u8,
    /// Green
    pub g: u8,
    /// Red
    pub r: u8,
    /// Alpha
    pub a: u8,
}

/// 256-colour lightmap palette
#[derive(Debug, Clone, PartialEq, Eq, BinRead)]
#[br(little)]
pub struct Palette {
    /// Colours in palette order
    #[br(count = PALETTE_COLORS)]
    pub colors: Vec<PaletteColor>,
}

/// Lightmap reference disabled because its pointer was null
///
/// Carries what [`repair_lightmap_reference`](crate::bsp::repair_lightmap_reference)
/// needs to persist the fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrokenLightmap {
    /// Position of the BSP in the scenario array
    pub bsp_index: usize,
    /// Absolute offset of the stored lightmap identifier
    pub identifier_slot: u64,
    /// Identifier stored there at decode time
    pub identifier: TagId,
}

/// One BSP descriptor from the scenario tag
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BspEntry {
    /// Offset of the BSP block, in the archive named by `source`
    pub offset: u32,
    /// Size of the BSP block
    pub size: u32,
    /// Correction constant for pointers inside the block
    pub local_magic: u32,
    /// Archive holding the block
    pub source: ExternalSource,
    /// BSP tag identifier
    pub identifier: Option<TagId>,
    /// BSP tag index
    pub tag_index: Option<usize>,
    /// Lightmap tag identifier
    pub lightmap_identifier: Option<TagId>,
    /// Lightmap tag index
    pub lightmap_tag_index: Option<usize>,
    /// Offset of the lightmap header
    pub lightmap_offset: u32,
    /// Bytes from the lightmap header to the end of the BSP block
    pub lightmap_size: u32,
    /// Tag index of the lightmap bitmap
    pub lightmap_bitmap_tag_index: Option<usize>,
    /// Lightmap palettes
    pub palettes: Vec<Palette>,
    /// Bitmap index per visual chunk
    pub visual_chunk_bitmap_index: Vec<i16>,
    /// Lightmap index per visual chunk
    pub visual_chunk_lightmap_index: Vec<i16>,
    /// Bitmap index per scenery chunk
    pub scenery_chunk_bitmap_index: Vec<i16>,
    /// Lightmap index per scenery chunk
    pub scenery_chunk_lightmap_index: Vec<i16>,
    /// Set when the lightmap pointer was null
    pub broken_lightmap: Option<BrokenLightmap>,
}

impl BspEntry {
    /// Correct a pointer stored inside this BSP block
    pub const fn correct(&self, raw: u32) -> u32 {
        raw.wrapping_sub(self.local_magic)
    }

    /// Whether a lightmap chain was followed
    pub const fn has_lightmap(&self) -> bool {
        self.lightmap_tag_index.is_some()
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use binrw::BinReaderExt;
    use std::io::Cursor;

    #[test]
    fn test_palette_is_bgra() {
        let mut data = vec![0u8; PALETTE_SIZE as usize];
        data[4..8].copy_from_slice(&[0x10, 0x20, 0x30, 0xFF]);
        let palette: Palette = Cursor::new(data)
            .read_le()
            .expect("Test operation should succeed");

        assert_eq!(palette.colors.len(), PALETTE_COLORS);
        assert_eq!(
            palette.colors[1],
            PaletteColor {
                b: 0x10,
                g: 0x20,
                r: 0x30,
                a: 0xFF
            }
        );
    }

    #[test]
    fn test_local_correction() {
        let entry = BspEntry {
            offset: 0x2000,
            local_magic: 0x4FFF_E000,
            ..BspEntry::default()
        };
        assert_eq!(entry.correct(0x5000_0400), 0x2400);
    }
}
