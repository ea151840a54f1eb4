//! Index header decoding and magic calibration
//!
//! Stored pointers are virtual addresses. The primary magic comes from the
//! index header constant alone:
//!
//! ```text
//! primary = constant - (index_offset + K)    K = 36 (V1), 40 (V2), 32 (V3/V4)
//! ```
//!
//! V3/V4 tag offsets use a second base. The secondary magic is derived from
//! the smallest local offset in the tag table, so the table geometry must be
//! known and scanned before any tag offset is corrected:
//!
//! ```text
//! secondary = min(local tag offsets) - (index_offset + meta_start)
//! ```

use crate::context::DecodeContext;
use crate::error::{DecodeWarning, MapError, Result};
use crate::header::MapHeader;
use crate::pointer::{ExternalSource, correct};
use crate::reader::{check_table_bounds, read_record_at, read_u32_at, stream_len};
use crate::tags::TagId;
use crate::version::MapVersion;
use binrw::BinRead;
use std::io::{Read, Seek};

/// Index header signature as stored (`tags` byte-reversed)
pub const INDEX_SIGNATURE: [u8; 4] = *b"sgat";

#[derive(Debug, BinRead)]
#[br(little)]
struct NewerIndexRecord {
    constant: u32,
    tag_class_count: u32,
    tags_pointer: u32,
    scenario_id: u32,
    globals_id: u32,
    checksum: u32,
    tag_count: u32,
    signature: [u8; 4],
}

#[derive(Debug, BinRead)]
#[br(little)]
struct OlderIndexRecord {
    constant: u32,
    tags_pointer: u32,
}

/// Decoded index header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexHeader {
    /// Virtual address of the end of the index header
    pub constant: u32,
    /// Stored pointer to the tag table
    pub tags_pointer: u32,
    /// Number of tag class records (V3/V4)
    pub tag_class_count: u32,
    /// Scenario tag identifier (V3/V4)
    pub scenario_id: Option<TagId>,
    /// Globals tag identifier (V3/V4)
    pub globals_id: Option<TagId>,
    /// Index checksum (V3/V4)
    pub checksum: Option<u32>,
    /// Tag count recorded in the index (V3/V4)
    pub tag_count: Option<u32>,
    /// Signature matched `tags` (always true for V1/V2, which have none)
    pub signature_valid: bool,
    /// Size of the index header in bytes
    pub size: u32,
}

impl IndexHeader {
    /// Decode the index header at `header.index_offset`
    pub fn read<R: Read + Seek>(
        reader: &mut R,
        header: &MapHeader,
        version: MapVersion,
    ) -> Result<Self> {
        let offset = u64::from(header.index_offset);
        let size = version.index_header_size();

        if version.is_newer() {
            let record: NewerIndexRecord = read_record_at(reader, offset, u64::from(size))?;
            Ok(Self {
                constant: record.constant,
                tags_pointer: record.tags_pointer,
                tag_class_count: record.tag_class_count,
                scenario_id: TagId::non_null(record.scenario_id),
                globals_id: TagId::non_null(record.globals_id),
                checksum: Some(record.checksum),
                tag_count: Some(record.tag_count),
                signature_valid: record.signature == INDEX_SIGNATURE,
                size,
            })
        } else {
            let record: OlderIndexRecord = read_record_at(reader, offset, 8)?;
            Ok(Self {
                constant: record.constant,
                tags_pointer: record.tags_pointer,
                tag_class_count: 0,
                scenario_id: None,
                globals_id: None,
                checksum: None,
                tag_count: None,
                signature_valid: true,
                size,
            })
        }
    }

    /// Absolute offset of the tag class table (V3/V4)
    pub fn tag_classes_offset(&self, header: &MapHeader) -> u64 {
        u64::from(header.index_offset) + u64::from(self.size)
    }
}

/// Pointer correction constants for one archive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Magics {
    /// Corrects index-relative pointers, and tag offsets for V1/V2
    pub primary: u32,
    /// Corrects tag offsets for V3/V4
    pub secondary: Option<u32>,
}

impl Magics {
    /// Magic that applies to tag table offsets
    pub const fn tag_magic(&self) -> u32 {
        match self.secondary {
            Some(secondary) => secondary,
            None => self.primary,
        }
    }
}

/// Position and shape of the tag table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagTableGeometry {
    /// Absolute offset of the first record
    pub offset: u64,
    /// Number of records to read
    pub count: u32,
    /// Record stride
    pub stride: u32,
}

impl TagTableGeometry {
    /// Absolute offset of record `index`
    pub fn record_offset(&self, index: u32) -> u64 {
        self.offset + u64::from(index) * u64::from(self.stride)
    }
}

/// Output of magic calibration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Calibration {
    /// Correction constants
    pub magics: Magics,
    /// Validated tag table geometry
    pub tag_table: TagTableGeometry,
    /// Total stream length
    pub stream_len: u64,
}

/// Primary magic for an index header
pub const fn primary_magic(index: &IndexHeader, header: &MapHeader) -> u32 {
    index
        .constant
        .wrapping_sub(header.index_offset.wrapping_add(index.size))
}

/// Derive the magics and validate the tag table geometry
///
/// `count_limit` caps the tag count after a sentinel fallback.
pub fn calibrate<R: Read + Seek>(
    reader: &mut R,
    header: &MapHeader,
    index: &IndexHeader,
    version: MapVersion,
    count_limit: Option<u32>,
    ctx: &mut DecodeContext<'_>,
) -> Result<Calibration> {
    let stream_len = stream_len(reader)?;
    let primary = primary_magic(index, header);

    if let Some(index_count) = index.tag_count
        && index_count != header.tag_file_count
    {
        ctx.warn(
            "magic",
            DecodeWarning::TagCountMismatch {
                header: header.tag_file_count,
                index: index_count,
            },
        );
    }

    let count = count_limit.map_or(header.tag_file_count, |limit| {
        limit.min(header.tag_file_count)
    });
    let max = ctx.options().max_tag_count;
    if count > max {
        return Err(MapError::TagCountOutOfRange { count, max });
    }

    let tag_table = TagTableGeometry {
        offset: u64::from(correct(index.tags_pointer, primary)),
        count,
        stride: version.tag_stride(),
    };
    check_table_bounds(
        "tag",
        tag_table.offset,
        tag_table.count,
        tag_table.stride,
        stream_len,
    )?;

    let secondary = if version.is_newer() {
        Some(secondary_magic(reader, header, &tag_table, primary, ctx)?)
    } else {
        None
    };

    ctx.debug(
        "magic",
        &format!(
            "primary {primary:#010x}, secondary {secondary:#x?}, tag table at {:#x}",
            tag_table.offset
        ),
    );

    Ok(Calibration {
        magics: Magics { primary, secondary },
        tag_table,
        stream_len,
    })
}

fn secondary_magic<R: Read + Seek>(
    reader: &mut R,
    header: &MapHeader,
    table: &TagTableGeometry,
    primary: u32,
    ctx: &mut DecodeContext<'_>,
) -> Result<u32> {
    let mut minimum: Option<u32> = None;

    for i in 0..table.count {
        let record = table.record_offset(i);
        if read_u32_at(reader, record + 4)? == TagId::SENTINEL.0 {
            break;
        }
        let raw = read_u32_at(reader, record + 8)?;
        if raw == 0 || ExternalSource::classify(raw).is_external() {
            continue;
        }
        minimum = Some(minimum.map_or(raw, |m| m.min(raw)));
    }

    match minimum {
        Some(m) => Ok(m.wrapping_sub(header.index_offset.wrapping_add(header.meta_start))),
        None => {
            ctx.warn("magic", DecodeWarning::NoSecondaryMagicCandidate);
            Ok(primary)
        }
    }
}
