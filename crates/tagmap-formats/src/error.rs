//! Error and warning types for map decoding

use crate::tags::TagId;
use crate::version::MapVersion;
use thiserror::Error;

/// Fatal errors for the current decode
///
/// Every variant except `Io` and `BinRw` is a structural format error. No
/// partially decoded structures are returned alongside any of them.
#[derive(Error, Debug)]
pub enum MapError {
    /// Header signature missing while strict signature checking is enabled
    #[error("Invalid map signature: {0:?}")]
    InvalidSignature([u8; 4]),

    /// Header version field does not name a supported format
    #[error("Unsupported map version field: {0}")]
    UnsupportedVersion(u32),

    /// Read ran past the end of the stream
    #[error("Truncated map: {len} bytes requested at offset {offset:#x}")]
    Truncated {
        /// Absolute offset of the failed read
        offset: u64,
        /// Number of bytes requested
        len: u64,
    },

    /// A counted table does not fit inside the stream
    #[error("{table} table overruns stream: {count} entries at {offset:#x} need {needed} bytes, stream is {stream_len} bytes")]
    TableOverrun {
        /// Name of the table being read
        table: &'static str,
        /// Absolute offset of the table
        offset: u64,
        /// Entry count read from the archive
        count: u32,
        /// Bytes required by the table
        needed: u64,
        /// Total stream length
        stream_len: u64,
    },

    /// Tag count exceeds the configured cap
    #[error("Tag count {count} exceeds limit {max}")]
    TagCountOutOfRange {
        /// Tag count read from the header
        count: u32,
        /// Configured maximum
        max: u32,
    },

    /// BSP descriptor count exceeds the configured cap
    #[error("BSP count {count} exceeds limit {max}")]
    BspCountOutOfRange {
        /// Count read from the scenario descriptor
        count: u32,
        /// Configured maximum
        max: u32,
    },

    /// A nested table count exceeds the configured cap
    #[error("{table} count {count} exceeds limit {max}")]
    CountOutOfRange {
        /// Name of the table being read
        table: &'static str,
        /// Count read from the archive
        count: u32,
        /// Configured maximum
        max: u32,
    },

    /// A local tag's corrected offset falls outside the file
    #[error("Tag {index} offset {offset:#x} outside file of {file_size} bytes")]
    TagOutOfBounds {
        /// Tag index
        index: usize,
        /// Corrected file offset
        offset: u32,
        /// File size from the header
        file_size: u32,
    },

    /// Two tag entries share an identifier
    #[error("Duplicate tag identifier {id} at indices {first} and {second}")]
    DuplicateTagId {
        /// Colliding identifier
        id: TagId,
        /// Index of the first entry
        first: usize,
        /// Index of the colliding entry
        second: usize,
    },

    /// No scenario tag could be located
    #[error("Scenario tag not found for {version}")]
    ScenarioNotFound {
        /// Version used for the lookup
        version: MapVersion,
    },

    /// Repair slot no longer holds the identifier recorded during decode
    #[error("Repair slot {slot:#x} holds {found}, expected {expected}")]
    StaleRepair {
        /// Absolute offset of the identifier slot
        slot: u64,
        /// Identifier recorded during decode
        expected: TagId,
        /// Value currently stored
        found: TagId,
    },

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// `BinRw` parsing error
    #[error("Binary format error: {0}")]
    BinRw(#[from] binrw::Error),
}

impl MapError {
    /// Convert a binrw error, mapping end-of-stream to [`MapError::Truncated`]
    pub(crate) fn from_binrw(err: binrw::Error, offset: u64, len: u64) -> Self {
        if err.is_eof() {
            Self::Truncated { offset, len }
        } else {
            Self::BinRw(err)
        }
    }
}

/// Type alias for map decoding results
pub type Result<T> = std::result::Result<T, MapError>;

/// Recoverable conditions found during a decode
///
/// Decoding continues past every warning; the affected reference is marked
/// absent or the affected entry is zeroed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeWarning {
    /// Header signature was not `head`
    MissingSignature {
        /// Bytes found at offset 0, in stored order
        found: [u8; 4],
    },
    /// Header footer was not `foot`
    MissingFooter {
        /// Bytes found at the footer offset, in stored order
        found: [u8; 4],
    },
    /// Index header tag count disagrees with the header's tag file count
    TagCountMismatch {
        /// Count from the archive header
        header: u32,
        /// Count from the index header
        index: u32,
    },
    /// A tag identifier did not resolve to any tag index
    UnresolvedTag {
        /// What the identifier was read for
        context: &'static str,
        /// Identifier that failed to resolve
        identifier: TagId,
    },
    /// A BSP's lightmap pointer was zero
    BrokenLightmap {
        /// Position of the BSP in the scenario array
        bsp_index: usize,
        /// Lightmap identifier that was disabled
        identifier: TagId,
    },
    /// A bitmap-library entry could not be resolved and was zeroed
    BitmapLibraryUnavailable {
        /// Tag index of the zeroed entry
        tag_index: usize,
        /// Library index stored in the entry
        library_index: u32,
    },
    /// Sentinel identifier truncated the tag table without a fallback
    SentinelTruncated {
        /// Index of the sentinel entry
        at_index: usize,
    },
    /// No local, non-zero tag offset was available for the secondary magic
    NoSecondaryMagicCandidate,
    /// The located scenario tag has an unexpected class
    UnexpectedScenarioClass {
        /// Tag index used as scenario
        tag_index: usize,
        /// Class found on that tag
        class: crate::tags::TagClass,
    },
}

impl std::fmt::Display for DecodeWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingSignature { found } => write!(f, "missing header signature, found {found:02x?}"),
            Self::MissingFooter { found } => write!(f, "missing header footer, found {found:02x?}"),
            Self::TagCountMismatch { header, index } => {
                write!(f, "tag count mismatch: header {header}, index {index}")
            }
            Self::UnresolvedTag {
                context,
                identifier,
            } => write!(f, "unresolved {context} identifier {identifier}"),
            Self::BrokenLightmap {
                bsp_index,
                identifier,
            } => write!(
                f,
                "bsp {bsp_index}: lightmap {identifier} has a null pointer, reference disabled"
            ),
            Self::BitmapLibraryUnavailable {
                tag_index,
                library_index,
            } => write!(
                f,
                "tag {tag_index}: bitmap library entry {library_index} unavailable, zeroed"
            ),
            Self::SentinelTruncated { at_index } => {
                write!(f, "sentinel identifier at tag {at_index}, table truncated")
            }
            Self::NoSecondaryMagicCandidate => {
                write!(f, "no local tag offset available for secondary magic")
            }
            Self::UnexpectedScenarioClass { tag_index, class } => {
                write!(f, "scenario tag {tag_index} has class {class}")
            }
        }
    }
}

/// Controlled restart of index decoding under a different version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionFallback {
    /// Version that encountered the sentinel
    pub from: MapVersion,
    /// Version used for the restart
    pub to: MapVersion,
    /// Tag index of the sentinel; the tag count is truncated to this
    pub at_index: usize,
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_binrw_eof_maps_to_truncated() {
        let io = std::io::Error::from(std::io::ErrorKind::UnexpectedEof);
        let err = MapError::from_binrw(binrw::Error::Io(io), 0x40, 16);
        assert!(matches!(err, MapError::Truncated { offset: 0x40, len: 16 }));
    }

    #[test]
    fn test_warning_display() {
        let warning = DecodeWarning::BrokenLightmap {
            bsp_index: 2,
            identifier: TagId(0xE174_0004),
        };
        assert_eq!(
            warning.to_string(),
            "bsp 2: lightmap 0xe1740004 has a null pointer, reference disabled"
        );
    }
}
