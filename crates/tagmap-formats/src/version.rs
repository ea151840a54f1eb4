//! Map format version detection and per-version layout constants

use crate::error::{MapError, Result};
use crate::reader::read_u32_at;
use serde::{Deserialize, Serialize};
use std::io::{Read, Seek};

/// Map format generations
///
/// V1 and V2 share the older header layout and 32-byte tag records without a
/// size field. V3 and V4 share the newer layout with 16-byte tag records,
/// companion-archive references and a secondary magic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MapVersion {
    /// Original console release, 36-byte index header
    V1,
    /// Desktop release, 40-byte index header and external bitmap library
    V2,
    /// Second generation
    V3,
    /// Second generation alternate layout, reached through the sentinel identifier
    V4,
}

/// Offset of the version field in the archive header
pub const VERSION_FIELD_OFFSET: u64 = 4;

impl MapVersion {
    /// Detect the version from the header's version field
    ///
    /// V4 archives carry the same version field as V3; they are told apart
    /// during tag index decoding.
    pub fn detect<R: Read + Seek>(reader: &mut R) -> Result<Self> {
        let field = read_u32_at(reader, VERSION_FIELD_OFFSET)?;
        Self::from_version_field(field).ok_or(MapError::UnsupportedVersion(field))
    }

    /// Map a header version field to a format version
    pub const fn from_version_field(field: u32) -> Option<Self> {
        match field {
            5 => Some(Self::V1),
            7 | 609 => Some(Self::V2),
            8 => Some(Self::V3),
            _ => None,
        }
    }

    /// Whether this version uses the newer header and tag layouts
    pub const fn is_newer(self) -> bool {
        matches!(self, Self::V3 | Self::V4)
    }

    /// Length of the index header in bytes (the `K` of the primary magic)
    pub const fn index_header_size(self) -> u32 {
        match self {
            Self::V1 => 36,
            Self::V2 => 40,
            Self::V3 | Self::V4 => 32,
        }
    }

    /// Tag table record stride
    pub const fn tag_stride(self) -> u32 {
        if self.is_newer() { 16 } else { 32 }
    }

    /// Whether tag records carry an explicit size field
    pub const fn has_explicit_tag_sizes(self) -> bool {
        self.is_newer()
    }

    /// Whether raw tag offsets encode companion-archive references
    pub const fn classifies_external(self) -> bool {
        self.is_newer()
    }

    /// Whether `bitm` entries may live in the external bitmap library
    pub const fn uses_bitmap_library(self) -> bool {
        matches!(self, Self::V2)
    }

    /// Version to restart with when the sentinel identifier is found
    pub const fn sentinel_fallback(self) -> Option<Self> {
        match self {
            Self::V3 => Some(Self::V4),
            Self::V1 | Self::V2 | Self::V4 => None,
        }
    }

    /// Fixed tag index of the scenario when the index header cannot name it
    pub const fn scenario_tag_index(self) -> usize {
        match self {
            Self::V1 | Self::V2 | Self::V4 => 0,
            Self::V3 => 3,
        }
    }

    /// Offset of the BSP descriptor (count, pointer) inside the scenario tag
    pub const fn bsp_descriptor_offset(self) -> u32 {
        if self.is_newer() { 528 } else { 1444 }
    }

    /// BSP descriptor array stride
    pub const fn bsp_stride(self) -> u32 {
        if self.is_newer() { 68 } else { 32 }
    }

    /// Convert to numeric representation
    pub const fn to_u32(self) -> u32 {
        match self {
            Self::V1 => 1,
            Self::V2 => 2,
            Self::V3 => 3,
            Self::V4 => 4,
        }
    }

    /// Create from numeric representation
    pub const fn from_u32(value: u32) -> Option<Self> {
        match value {
            1 => Some(Self::V1),
            2 => Some(Self::V2),
            3 => Some(Self::V3),
            4 => Some(Self::V4),
            _ => None,
        }
    }
}

impl std::fmt::Display for MapVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::V1 => write!(f, "V1 (console)"),
            Self::V2 => write!(f, "V2 (desktop)"),
            Self::V3 => write!(f, "V3 (second generation)"),
            Self::V4 => write!(f, "V4 (second generation, alternate)"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn header_with_version(field: u32) -> Vec<u8> {
        let mut data = vec![0u8; 16];
        data[0..4].copy_from_slice(b"daeh");
        data[4..8].copy_from_slice(&field.to_le_bytes());
        data
    }

    #[test]
    fn test_detect_known_fields() {
        for (field, expected) in [
            (5, MapVersion::V1),
            (7, MapVersion::V2),
            (609, MapVersion::V2),
            (8, MapVersion::V3),
        ] {
            let mut cursor = Cursor::new(header_with_version(field));
            let version = MapVersion::detect(&mut cursor).expect("Test operation should succeed");
            assert_eq!(version, expected);
        }
    }

    #[test]
    fn test_detect_unknown_field() {
        let mut cursor = Cursor::new(header_with_version(42));
        assert!(matches!(
            MapVersion::detect(&mut cursor),
            Err(MapError::UnsupportedVersion(42))
        ));
    }

    #[test]
    fn test_detect_truncated() {
        let mut cursor = Cursor::new(vec![0u8; 6]);
        assert!(matches!(
            MapVersion::detect(&mut cursor),
            Err(MapError::Truncated { offset: 4, len: 4 })
        ));
    }

    #[test]
    fn test_layout_properties() {
        assert_eq!(MapVersion::V1.index_header_size(), 36);
        assert_eq!(MapVersion::V2.index_header_size(), 40);
        assert_eq!(MapVersion::V3.index_header_size(), 32);
        assert_eq!(MapVersion::V4.index_header_size(), 32);

        assert_eq!(MapVersion::V1.tag_stride(), 32);
        assert_eq!(MapVersion::V4.tag_stride(), 16);
        assert_eq!(MapVersion::V2.bsp_stride(), 32);
        assert_eq!(MapVersion::V3.bsp_stride(), 68);
        assert_eq!(MapVersion::V3.bsp_descriptor_offset(), 528);

        assert!(MapVersion::V2.uses_bitmap_library());
        assert!(!MapVersion::V1.uses_bitmap_library());
        assert!(!MapVersion::V2.classifies_external());
        assert!(MapVersion::V3.classifies_external());
    }

    #[test]
    fn test_fallback_is_single_step() {
        assert_eq!(MapVersion::V3.sentinel_fallback(), Some(MapVersion::V4));
        assert_eq!(MapVersion::V4.sentinel_fallback(), None);
        assert_eq!(MapVersion::V1.sentinel_fallback(), None);
    }

    #[test]
    fn test_numeric_conversion() {
        for version in [MapVersion::V1, MapVersion::V2, MapVersion::V3, MapVersion::V4] {
            assert_eq!(MapVersion::from_u32(version.to_u32()), Some(version));
        }
        assert_eq!(MapVersion::from_u32(0), None);
        assert_eq!(MapVersion::from_u32(5), None);
    }
}
