//! Archive header decoding
//!
//! The header is a fixed 2048-byte block. Every field sits at a
//! version-specific absolute offset:
//!
//! | Field | V1/V2 | V3/V4 |
//! |-------|-------|-------|
//! | Signature (`daeh`) | 0 | 0 |
//! | Version field | 4 | 4 |
//! | File size | 8 | 8 |
//! | Index offset | 16 | 16 |
//! | Meta start | 20 | 20 |
//! | Meta size | 24 | 24 |
//! | Map name (36 bytes) | 408 | 420 |
//! | Scenario path (64/80 bytes) | 444 | 456 |
//! | Tag file count | 704 | 716 |
//! | Footer (`toof`) | 2044 | 2044 |

use crate::context::DecodeContext;
use crate::error::{DecodeWarning, MapError, Result};
use crate::reader::{read_array4_at, read_fixed_string_at, read_u32_at};
use crate::version::{MapVersion, VERSION_FIELD_OFFSET};
use std::io::{Read, Seek};

/// Signature as stored on disk (`head` byte-reversed)
pub const HEADER_SIGNATURE: [u8; 4] = *b"daeh";
/// Footer as stored on disk (`foot` byte-reversed)
pub const FOOTER_SIGNATURE: [u8; 4] = *b"toof";
/// Size of the header block
pub const HEADER_SIZE: u64 = 2048;

const FOOTER_OFFSET: u64 = 2044;
const FILE_SIZE_OFFSET: u64 = 8;
const INDEX_OFFSET_OFFSET: u64 = 16;
const META_START_OFFSET: u64 = 20;
const META_SIZE_OFFSET: u64 = 24;
const MAP_NAME_WIDTH: usize = 36;

/// Byte positions of the layout-dependent header fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderLayout {
    /// Map name position
    pub map_name: u64,
    /// Scenario path position
    pub scenario_path: u64,
    /// Scenario path width in bytes
    pub scenario_path_width: usize,
    /// Tag file count position
    pub tag_file_count: u64,
}

impl HeaderLayout {
    /// Layout shared by V1 and V2
    pub const OLDER: Self = Self {
        map_name: 408,
        scenario_path: 444,
        scenario_path_width: 64,
        tag_file_count: 704,
    };

    /// Layout shared by V3 and V4
    pub const NEWER: Self = Self {
        map_name: 420,
        scenario_path: 456,
        scenario_path_width: 80,
        tag_file_count: 716,
    };

    /// Layout used by a version
    pub const fn for_version(version: MapVersion) -> Self {
        if version.is_newer() {
            Self::NEWER
        } else {
            Self::OLDER
        }
    }
}

/// Role of an archive, derived from its scenario path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ArchiveKind {
    /// A regular level
    #[default]
    Playable,
    /// The main menu archive
    MainMenu,
    /// Shared resources for multiplayer levels
    MultiplayerShared,
    /// Shared resources for single player levels
    SinglePlayerShared,
}

impl ArchiveKind {
    const PATTERNS: [(&'static str, Self); 3] = [
        ("ui\\mainmenu\\mainmenu", Self::MainMenu),
        ("shared\\shared", Self::MultiplayerShared),
        ("shared\\single_player_shared", Self::SinglePlayerShared),
    ];

    /// Classify a scenario path; the first matching fragment wins
    pub fn from_scenario_path(path: &str) -> Self {
        let normalized = path.replace('/', "\\").to_ascii_lowercase();
        Self::PATTERNS
            .iter()
            .find(|(fragment, _)| normalized.contains(fragment))
            .map_or(Self::Playable, |(_, kind)| *kind)
    }
}

/// Decoded archive header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapHeader {
    /// Signature matched `head`
    pub signature_valid: bool,
    /// Footer matched `foot`
    pub footer_valid: bool,
    /// Raw version field
    pub version_field: u32,
    /// File size recorded in the header
    pub file_size: u32,
    /// Offset of the index header
    pub index_offset: u32,
    /// Start of tag data relative to the index
    pub meta_start: u32,
    /// Size of the tag data region
    pub meta_size: u32,
    /// `meta_start + meta_size`
    pub combined_size: u32,
    /// Internal map name
    pub map_name: String,
    /// Scenario tag path
    pub scenario_path: String,
    /// Role derived from the scenario path
    pub archive_kind: ArchiveKind,
    /// Number of tag records
    pub tag_file_count: u32,
}

impl MapHeader {
    /// Decode the header using the layout of `version`
    pub fn read<R: Read + Seek>(
        reader: &mut R,
        version: MapVersion,
        ctx: &mut DecodeContext<'_>,
    ) -> Result<Self> {
        let layout = HeaderLayout::for_version(version);

        let signature = read_array4_at(reader, 0)?;
        let signature_valid = signature == HEADER_SIGNATURE;
        if !signature_valid {
            if ctx.options().strict_signature {
                return Err(MapError::InvalidSignature(signature));
            }
            ctx.warn("header", DecodeWarning::MissingSignature { found: signature });
        }

        let footer = read_array4_at(reader, FOOTER_OFFSET)?;
        let footer_valid = footer == FOOTER_SIGNATURE;
        if !footer_valid {
            ctx.warn("header", DecodeWarning::MissingFooter { found: footer });
        }

        let version_field = read_u32_at(reader, VERSION_FIELD_OFFSET)?;
        let file_size = read_u32_at(reader, FILE_SIZE_OFFSET)?;
        let index_offset = read_u32_at(reader, INDEX_OFFSET_OFFSET)?;
        let meta_start = read_u32_at(reader, META_START_OFFSET)?;
        let meta_size = read_u32_at(reader, META_SIZE_OFFSET)?;
        let map_name = read_fixed_string_at(reader, layout.map_name, MAP_NAME_WIDTH)?;
        let scenario_path =
            read_fixed_string_at(reader, layout.scenario_path, layout.scenario_path_width)?;
        let tag_file_count = read_u32_at(reader, layout.tag_file_count)?;

        let archive_kind = ArchiveKind::from_scenario_path(&scenario_path);

        ctx.debug(
            "header",
            &format!(
                "{version}: '{map_name}' ({archive_kind:?}), index at {index_offset:#x}, {tag_file_count} tags"
            ),
        );

        Ok(Self {
            signature_valid,
            footer_valid,
            version_field,
            file_size,
            index_offset,
            meta_start,
            meta_size,
            combined_size: meta_start.wrapping_add(meta_size),
            map_name,
            scenario_path,
            archive_kind,
            tag_file_count,
        })
    }
}
