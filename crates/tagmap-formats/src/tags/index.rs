//! Tag table decoding

use crate::context::DecodeContext;
use crate::error::{DecodeWarning, MapError, Result};
use crate::header::MapHeader;
use crate::magic::{Calibration, IndexHeader};
use crate::pointer::{ExternalSource, correct, resolve};
use crate::reader::{check_table_bounds, read_c_string_at, read_record_at};
use crate::tags::bitmap_library::BitmapLibrary;
use crate::tags::entry::{TagClass, TagClassInfo, TagEntry, TagId};
use crate::tags::size::infer_gap_sizes;
use crate::version::MapVersion;
use binrw::BinRead;
use std::collections::HashMap;
use std::io::{Read, Seek};

const MAX_TAG_NAME: usize = 256;
const TAG_CLASS_RECORD_SIZE: u32 = 12;

#[derive(Debug, BinRead)]
#[br(little)]
struct NewerTagRecord {
    class: [u8; 4],
    id: u32,
    offset: u32,
    size: u32,
}

#[derive(Debug, BinRead)]
#[br(little)]
struct OlderTagRecord {
    class: [u8; 4],
    id: u32,
    name_pointer: u32,
    offset: u32,
    #[br(pad_after = 12)]
    indexed: u32,
}

#[derive(Debug, BinRead)]
#[br(little)]
struct TagClassRecord {
    class: [u8; 4],
    parent: [u8; 4],
    grandparent: [u8; 4],
}

/// Result of decoding the tag table
#[derive(Debug)]
pub enum TagDecodeOutcome {
    /// Every record was decoded
    Complete(TagIndex),
    /// The sentinel identifier was found; restart with `to` and at most
    /// `at_index` records
    Fallback {
        /// Version to restart with
        to: MapVersion,
        /// Index of the sentinel record
        at_index: usize,
    },
}

/// Decoded tag table with lookups
///
/// Entry positions are stable handles: they are never reordered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagIndex {
    entries: Vec<TagEntry>,
    by_identifier: HashMap<TagId, usize>,
    by_offset: HashMap<u32, usize>,
    min_identifier: Option<TagId>,
    max_identifier: Option<TagId>,
    tag_classes: Vec<TagClassInfo>,
}

impl TagIndex {
    /// Decode the tag table described by `calibration`
    ///
    /// `library` resolves V2 `bitm` records stored in the bitmap library.
    pub fn read<R: Read + Seek>(
        reader: &mut R,
        header: &MapHeader,
        index_header: &IndexHeader,
        calibration: &Calibration,
        version: MapVersion,
        library: Option<&dyn BitmapLibrary>,
        ctx: &mut DecodeContext<'_>,
    ) -> Result<TagDecodeOutcome> {
        let table = calibration.tag_table;
        let mut index = Self {
            entries: Vec::with_capacity(table.count as usize),
            by_identifier: HashMap::with_capacity(table.count as usize),
            ..Self::default()
        };

        for i in 0..table.count {
            let position = i as usize;
            let at = table.record_offset(i);

            let entry = if version.is_newer() {
                let record: NewerTagRecord = read_record_at(reader, at, u64::from(table.stride))?;
                if record.id == TagId::SENTINEL.0 {
                    if let Some(to) = version.sentinel_fallback() {
                        ctx.info(
                            "tags",
                            &format!(
                                "sentinel identifier at tag {position}, restarting as {to}"
                            ),
                        );
                        return Ok(TagDecodeOutcome::Fallback {
                            to,
                            at_index: position,
                        });
                    }
                    ctx.warn("tags", DecodeWarning::SentinelTruncated { at_index: position });
                    break;
                }
                newer_entry(&record, calibration.magics.tag_magic())
            } else {
                let record: OlderTagRecord = read_record_at(reader, at, u64::from(table.stride))?;
                older_entry(reader, &record, position, calibration, version, library, ctx)?
            };

            index.insert(position, entry, header)?;
        }

        if !version.has_explicit_tag_sizes() {
            infer_gap_sizes(&mut index.entries, header.file_size);
        }

        if version.is_newer() {
            index.tag_classes = read_tag_classes(reader, header, index_header, calibration)?;
        }

        ctx.debug(
            "tags",
            &format!(
                "{} tags, identifiers {:?}..={:?}",
                index.entries.len(),
                index.min_identifier,
                index.max_identifier
            ),
        );

        Ok(TagDecodeOutcome::Complete(index))
    }

    fn insert(&mut self, position: usize, entry: TagEntry, header: &MapHeader) -> Result<()> {
        if let Some(&first) = self.by_identifier.get(&entry.identifier) {
            return Err(MapError::DuplicateTagId {
                id: entry.identifier,
                first,
                second: position,
            });
        }
        if !entry.is_external() && entry.file_offset >= header.file_size {
            return Err(MapError::TagOutOfBounds {
                index: position,
                offset: entry.file_offset,
                file_size: header.file_size,
            });
        }

        self.by_identifier.insert(entry.identifier, position);
        if !entry.is_external() && !entry.is_placeholder() {
            self.by_offset.entry(entry.file_offset).or_insert(position);
        }
        let id = entry.identifier;
        self.min_identifier = Some(self.min_identifier.map_or(id, |m| m.min(id)));
        self.max_identifier = Some(self.max_identifier.map_or(id, |m| m.max(id)));
        self.entries.push(entry);
        Ok(())
    }

    /// Number of tags
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries in table order
    pub fn entries(&self) -> &[TagEntry] {
        &self.entries
    }

    /// Entry at a tag index
    pub fn get(&self, index: usize) -> Option<&TagEntry> {
        self.entries.get(index)
    }

    /// Tag index for an identifier
    pub fn index_of(&self, identifier: TagId) -> Option<usize> {
        self.by_identifier.get(&identifier).copied()
    }

    /// Entry for an identifier
    pub fn by_identifier(&self, identifier: TagId) -> Option<&TagEntry> {
        self.index_of(identifier).and_then(|i| self.entries.get(i))
    }

    /// Tag index of the local tag whose data starts at `offset`
    pub fn index_at_offset(&self, offset: u32) -> Option<usize> {
        self.by_offset.get(&offset).copied()
    }

    /// Indices of every tag of a class
    pub fn indices_of_class(&self, class: TagClass) -> impl Iterator<Item = usize> + '_ {
        self.entries
            .iter()
            .enumerate()
            .filter(move |(_, e)| e.tag_class == class)
            .map(|(i, _)| i)
    }

    /// Smallest identifier seen
    pub const fn min_identifier(&self) -> Option<TagId> {
        self.min_identifier
    }

    /// Largest identifier seen
    pub const fn max_identifier(&self) -> Option<TagId> {
        self.max_identifier
    }

    /// Tag class hierarchy table (V3/V4)
    pub fn tag_classes(&self) -> &[TagClassInfo] {
        &self.tag_classes
    }

    /// Companion archives referenced by any tag
    pub fn external_sources(&self) -> Vec<ExternalSource> {
        let mut sources: Vec<ExternalSource> = self
            .entries
            .iter()
            .map(|e| e.source)
            .filter(|s| s.is_external())
            .collect();
        sources.sort_by_key(|s| *s as u8);
        sources.dedup();
        sources
    }
}

fn newer_entry(record: &NewerTagRecord, magic: u32) -> TagEntry {
    let (file_offset, source) = if record.offset == 0 {
        (0, ExternalSource::Local)
    } else {
        let pointer = resolve(record.offset, magic);
        (pointer.offset, pointer.source)
    };

    TagEntry {
        tag_class: TagClass::from_stored(record.class),
        identifier: TagId(record.id),
        raw_offset: record.offset,
        file_offset,
        size: if record.offset == 0 { 0 } else { record.size },
        source,
        name: None,
    }
}

fn older_entry<R: Read + Seek>(
    reader: &mut R,
    record: &OlderTagRecord,
    position: usize,
    calibration: &Calibration,
    version: MapVersion,
    library: Option<&dyn BitmapLibrary>,
    ctx: &mut DecodeContext<'_>,
) -> Result<TagEntry> {
    let primary = calibration.magics.primary;
    let tag_class = TagClass::from_stored(record.class);

    let name = if record.name_pointer == 0 {
        None
    } else {
        let at = u64::from(correct(record.name_pointer, primary));
        if at < calibration.stream_len {
            read_c_string_at(reader, at, MAX_TAG_NAME)?
        } else {
            None
        }
    };

    let mut entry = TagEntry {
        tag_class,
        identifier: TagId(record.id),
        raw_offset: record.offset,
        file_offset: if record.offset == 0 {
            0
        } else {
            correct(record.offset, primary)
        },
        size: 0,
        source: ExternalSource::Local,
        name,
    };

    if version.uses_bitmap_library() && tag_class == TagClass::BITMAP && record.indexed != 0 {
        entry.source = ExternalSource::BitmapLibrary;
        let located = library.map(|lib| lib.locate(record.offset));
        match located {
            Some(Ok(found)) => {
                entry.file_offset = found.offset;
                entry.size = found.size;
            }
            Some(Err(err)) => {
                ctx.debug("tags", &format!("bitmap library lookup failed: {err}"));
                zero_library_entry(&mut entry, position, record.offset, ctx);
            }
            None => zero_library_entry(&mut entry, position, record.offset, ctx),
        }
    }

    Ok(entry)
}

fn zero_library_entry(
    entry: &mut TagEntry,
    position: usize,
    library_index: u32,
    ctx: &mut DecodeContext<'_>,
) {
    entry.file_offset = 0;
    entry.size = 0;
    ctx.warn(
        "tags",
        DecodeWarning::BitmapLibraryUnavailable {
            tag_index: position,
            library_index,
        },
    );
}

fn read_tag_classes<R: Read + Seek>(
    reader: &mut R,
    header: &MapHeader,
    index_header: &IndexHeader,
    calibration: &Calibration,
) -> Result<Vec<TagClassInfo>> {
    let offset = index_header.tag_classes_offset(header);
    let count = index_header.tag_class_count;
    check_table_bounds(
        "tag class",
        offset,
        count,
        TAG_CLASS_RECORD_SIZE,
        calibration.stream_len,
    )?;

    (0..count)
        .map(|i| {
            let at = offset + u64::from(i) * u64::from(TAG_CLASS_RECORD_SIZE);
            let record: TagClassRecord =
                read_record_at(reader, at, u64::from(TAG_CLASS_RECORD_SIZE))?;
            let parent = TagClass::from_stored(record.parent);
            let grandparent = TagClass::from_stored(record.grandparent);
            Ok(TagClassInfo {
                class: TagClass::from_stored(record.class),
                parent: (parent != TagClass::NONE).then_some(parent),
                grandparent: (grandparent != TagClass::NONE).then_some(grandparent),
            })
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::header::ArchiveKind;
    use crate::magic::{Magics, TagTableGeometry};
    use crate::observer::NullObserver;
    use crate::options::DecodeOptions;
    use crate::tags::bitmap_library::{BitmapLibraryError, LibraryEntry};
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    const FILE_SIZE: u32 = 0x3800;
    const OLDER_PRIMARY: u32 = 0x4000_0000;

    struct FixedLibrary;

    impl BitmapLibrary for FixedLibrary {
        fn locate(&self, index: u32) -> std::result::Result<LibraryEntry, BitmapLibraryError> {
            if index == 5 {
                Ok(LibraryEntry {
                    offset: 0x20_0000,
                    size: 0x400,
                })
            } else {
                Err(BitmapLibraryError::Unavailable)
            }
        }
    }

    fn header(version_field: u32, count: u32) -> MapHeader {
        MapHeader {
            signature_valid: true,
            footer_valid: true,
            version_field,
            file_size: FILE_SIZE,
            index_offset: 0x800,
            meta_start: 0x800,
            meta_size: 0,
            combined_size: 0x800,
            map_name: String::new(),
            scenario_path: String::new(),
            archive_kind: ArchiveKind::Playable,
            tag_file_count: count,
        }
    }

    fn index_header(size: u32) -> IndexHeader {
        IndexHeader {
            constant: 0,
            tags_pointer: 0,
            tag_class_count: 0,
            scenario_id: None,
            globals_id: None,
            checksum: None,
            tag_count: None,
            signature_valid: true,
            size,
        }
    }

    fn calibration(primary: u32, secondary: Option<u32>, count: u32, stride: u32) -> Calibration {
        Calibration {
            magics: Magics { primary, secondary },
            tag_table: TagTableGeometry {
                offset: 0x828,
                count,
                stride,
            },
            stream_len: u64::from(FILE_SIZE),
        }
    }

    fn put_u32(data: &mut [u8], offset: usize, value: u32) {
        data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    fn older_tag(data: &mut [u8], slot: usize, class: &[u8; 4], id: u32, name: u32, offset: u32, indexed: u32) {
        let at = 0x828 + slot * 32;
        data[at..at + 4].copy_from_slice(class);
        put_u32(data, at + 4, id);
        put_u32(data, at + 8, name);
        put_u32(data, at + 12, offset);
        put_u32(data, at + 16, indexed);
    }

    fn newer_tag(data: &mut [u8], slot: usize, id: u32, offset: u32, size: u32) {
        let at = 0x828 + slot * 16;
        data[at..at + 4].copy_from_slice(b"mtib");
        put_u32(data, at + 4, id);
        put_u32(data, at + 8, offset);
        put_u32(data, at + 12, size);
    }

    fn older_fixture() -> Vec<u8> {
        let mut data = vec![0u8; FILE_SIZE as usize];
        older_tag(&mut data, 0, b"rncs", 0xE174_0000, OLDER_PRIMARY + 0x900, OLDER_PRIMARY + 0x1000, 0);
        older_tag(&mut data, 1, b"psbs", 0xE174_0001, 0, OLDER_PRIMARY + 0x2000, 0);
        older_tag(&mut data, 2, b"mtib", 0xE174_0002, 0, 5, 1);
        data[0x900..0x90E].copy_from_slice(b"scenarios\\test");
        data
    }

    fn decode(
        data: &[u8],
        header: &MapHeader,
        calibration: &Calibration,
        version: MapVersion,
        library: Option<&dyn BitmapLibrary>,
    ) -> (Result<TagDecodeOutcome>, Vec<DecodeWarning>) {
        let options = DecodeOptions::default();
        let mut ctx = DecodeContext::new(&options, &NullObserver);
        let outcome = TagIndex::read(
            &mut Cursor::new(data),
            header,
            &index_header(version.index_header_size()),
            calibration,
            version,
            library,
            &mut ctx,
        );
        (outcome, ctx.take_warnings())
    }

    fn complete(outcome: Result<TagDecodeOutcome>) -> TagIndex {
        match outcome.expect("Test operation should succeed") {
            TagDecodeOutcome::Complete(index) => index,
            TagDecodeOutcome::Fallback { .. } => panic!("unexpected fallback"),
        }
    }

    #[test]
    fn test_older_table_with_library() {
        let data = older_fixture();
        let (outcome, warnings) = decode(
            &data,
            &header(7, 3),
            &calibration(OLDER_PRIMARY, None, 3, 32),
            MapVersion::V2,
            Some(&FixedLibrary),
        );
        let index = complete(outcome);

        assert!(warnings.is_empty());
        assert_eq!(index.len(), 3);
        let scenario = index.get(0).expect("Test operation should succeed");
        assert_eq!(scenario.tag_class, TagClass::SCENARIO);
        assert_eq!(scenario.name.as_deref(), Some("scenarios\\test"));
        assert_eq!((scenario.file_offset, scenario.size), (0x1000, 0x1000));

        let bsp = index.get(1).expect("Test operation should succeed");
        assert_eq!((bsp.file_offset, bsp.size), (0x2000, 0x1800));

        let bitmap = index.by_identifier(TagId(0xE174_0002)).expect("Test operation should succeed");
        assert_eq!(bitmap.source, ExternalSource::BitmapLibrary);
        assert_eq!((bitmap.file_offset, bitmap.size), (0x20_0000, 0x400));

        assert_eq!(index.index_at_offset(0x2000), Some(1));
        assert_eq!(index.min_identifier(), Some(TagId(0xE174_0000)));
        assert_eq!(index.max_identifier(), Some(TagId(0xE174_0002)));
        assert_eq!(index.external_sources(), vec![ExternalSource::BitmapLibrary]);
    }

    #[test]
    fn test_missing_library_zeroes_entry() {
        let data = older_fixture();
        let (outcome, warnings) = decode(
            &data,
            &header(7, 3),
            &calibration(OLDER_PRIMARY, None, 3, 32),
            MapVersion::V2,
            None,
        );
        let index = complete(outcome);

        let bitmap = index.get(2).expect("Test operation should succeed");
        assert_eq!((bitmap.file_offset, bitmap.size), (0, 0));
        assert_eq!(
            warnings,
            vec![DecodeWarning::BitmapLibraryUnavailable {
                tag_index: 2,
                library_index: 5
            }]
        );
    }

    #[test]
    fn test_duplicate_identifier_rejected() {
        let mut data = older_fixture();
        older_tag(&mut data, 1, b"psbs", 0xE174_0000, 0, OLDER_PRIMARY + 0x2000, 0);
        let (outcome, _) = decode(
            &data,
            &header(7, 2),
            &calibration(OLDER_PRIMARY, None, 2, 32),
            MapVersion::V2,
            None,
        );

        assert!(matches!(
            outcome,
            Err(MapError::DuplicateTagId {
                first: 0,
                second: 1,
                ..
            })
        ));
    }

    #[test]
    fn test_local_tag_outside_file() {
        let mut data = older_fixture();
        older_tag(&mut data, 1, b"psbs", 0xE174_0001, 0, OLDER_PRIMARY + 0x9000, 0);
        let (outcome, _) = decode(
            &data,
            &header(7, 2),
            &calibration(OLDER_PRIMARY, None, 2, 32),
            MapVersion::V2,
            None,
        );

        assert!(matches!(
            outcome,
            Err(MapError::TagOutOfBounds {
                index: 1,
                offset: 0x9000,
                ..
            })
        ));
    }

    #[test]
    fn test_sentinel_requests_fallback_under_v3() {
        let mut data = vec![0u8; FILE_SIZE as usize];
        newer_tag(&mut data, 0, 1, 0x0010_0000, 0x10);
        newer_tag(&mut data, 1, u32::MAX, 0, 0);
        newer_tag(&mut data, 2, 3, 0x0010_0100, 0x10);

        let (outcome, _) = decode(
            &data,
            &header(8, 3),
            &calibration(0x8000_0000, Some(0x000F_F000), 3, 16),
            MapVersion::V3,
            None,
        );
        assert!(matches!(
            outcome,
            Ok(TagDecodeOutcome::Fallback {
                to: MapVersion::V4,
                at_index: 1
            })
        ));

        let (outcome, warnings) = decode(
            &data,
            &header(8, 3),
            &calibration(0x8000_0000, Some(0x000F_F000), 3, 16),
            MapVersion::V4,
            None,
        );
        let index = complete(outcome);
        assert_eq!(index.len(), 1);
        assert_eq!(warnings, vec![DecodeWarning::SentinelTruncated { at_index: 1 }]);
    }

    #[test]
    fn test_newer_external_and_placeholder_entries() {
        let mut data = vec![0u8; FILE_SIZE as usize];
        newer_tag(&mut data, 0, 1, 0x0010_0000, 0x20);
        newer_tag(&mut data, 1, 2, 0x8010_0400, 0x30);
        newer_tag(&mut data, 2, 3, 0, 0x40);

        let (outcome, _) = decode(
            &data,
            &header(8, 3),
            &calibration(0x8000_0000, Some(0x000F_F000), 3, 16),
            MapVersion::V3,
            None,
        );
        let index = complete(outcome);

        let local = index.get(0).expect("Test operation should succeed");
        assert_eq!((local.file_offset, local.size), (0x1000, 0x20));

        let shared = index.get(1).expect("Test operation should succeed");
        assert_eq!(shared.source, ExternalSource::MultiplayerShared);
        assert_eq!(shared.file_offset, 0x1400);
        assert_eq!(shared.size, 0x30);

        let empty = index.get(2).expect("Test operation should succeed");
        assert!(empty.is_placeholder());
        assert_eq!((empty.file_offset, empty.size), (0, 0));

        assert_eq!(index.index_at_offset(0x1400), None);
        assert_eq!(index.indices_of_class(TagClass::BITMAP).count(), 3);
    }
}
