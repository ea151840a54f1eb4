//! External bitmap library lookup (V2)
//!
//! V2 archives may keep bitmap data in a separate library file. Their `bitm`
//! records set the indexed flag and store a library index in the offset
//! field; the library maps that index to an offset and size.
//!
//! Library file layout (little-endian):
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0x00   | 4    | Library kind |
//! | 0x04   | 4    | Record table offset |
//! | 0x08   | 4    | Record count |
//!
//! Each 12-byte record holds a name offset, a data size and a data offset.

use crate::error::{MapError, Result};
use crate::reader::{check_table_bounds, read_record_at, stream_len};
use binrw::BinRead;
use std::io::{Read, Seek};
use thiserror::Error;

/// Location of one bitmap inside the library
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LibraryEntry {
    /// Offset in the library file
    pub offset: u32,
    /// Size in bytes
    pub size: u32,
}

/// Lookup failures reported by a bitmap library
#[derive(Error, Debug)]
pub enum BitmapLibraryError {
    /// Library is not loaded
    #[error("bitmap library unavailable")]
    Unavailable,

    /// Index past the end of the library
    #[error("bitmap library has no entry {index} ({count} entries)")]
    MissingEntry {
        /// Requested index
        index: u32,
        /// Number of entries in the library
        count: u32,
    },
}

/// Resolves library indices to offsets and sizes
pub trait BitmapLibrary {
    /// Locate bitmap `index`
    fn locate(&self, index: u32) -> std::result::Result<LibraryEntry, BitmapLibraryError>;
}

#[derive(Debug, BinRead)]
#[br(little)]
struct LibraryHeader {
    _kind: u32,
    table_offset: u32,
    count: u32,
}

#[derive(Debug, BinRead)]
#[br(little)]
struct LibraryRecord {
    _name_offset: u32,
    size: u32,
    offset: u32,
}

const LIBRARY_RECORD_SIZE: u32 = 12;

/// Record table of a bitmap library file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BitmapLibraryTable {
    entries: Vec<LibraryEntry>,
}

impl BitmapLibraryTable {
    /// Parse a library file's record table
    pub fn read<R: Read + Seek>(reader: &mut R, max_entries: u32) -> Result<Self> {
        let len = stream_len(reader)?;
        let header: LibraryHeader = read_record_at(reader, 0, 12)?;
        if header.count > max_entries {
            return Err(MapError::CountOutOfRange {
                table: "bitmap library",
                count: header.count,
                max: max_entries,
            });
        }
        let table = u64::from(header.table_offset);
        check_table_bounds(
            "bitmap library",
            table,
            header.count,
            LIBRARY_RECORD_SIZE,
            len,
        )?;

        let mut entries = Vec::with_capacity(header.count as usize);
        for i in 0..header.count {
            let at = table + u64::from(i) * u64::from(LIBRARY_RECORD_SIZE);
            let record: LibraryRecord =
                read_record_at(reader, at, u64::from(LIBRARY_RECORD_SIZE))?;
            entries.push(LibraryEntry {
                offset: record.offset,
                size: record.size,
            });
        }

        Ok(Self { entries })
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the library has no records
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl BitmapLibrary for BitmapLibraryTable {
    fn locate(&self, index: u32) -> std::result::Result<LibraryEntry, BitmapLibraryError> {
        self.entries
            .get(index as usize)
            .copied()
            .ok_or(BitmapLibraryError::MissingEntry {
                index,
                count: self.entries.len() as u32,
            })
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn library_bytes(records: &[(u32, u32)]) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&1u32.to_le_bytes());
        data.extend_from_slice(&12u32.to_le_bytes());
        data.extend_from_slice(&(records.len() as u32).to_le_bytes());
        for (i, (offset, size)) in records.iter().enumerate() {
            data.extend_from_slice(&(i as u32 * 32).to_le_bytes());
            data.extend_from_slice(&size.to_le_bytes());
            data.extend_from_slice(&offset.to_le_bytes());
        }
        data
    }

    #[test]
    fn test_read_and_locate() {
        let data = library_bytes(&[(0x100, 0x40), (0x140, 0x80)]);
        let library = BitmapLibraryTable::read(&mut Cursor::new(data), 1024)
            .expect("Test operation should succeed");

        assert_eq!(library.len(), 2);
        assert_eq!(
            library.locate(1).expect("Test operation should succeed"),
            LibraryEntry {
                offset: 0x140,
                size: 0x80
            }
        );
        assert!(matches!(
            library.locate(2),
            Err(BitmapLibraryError::MissingEntry { index: 2, count: 2 })
        ));
    }

    #[test]
    fn test_truncated_table() {
        let mut data = library_bytes(&[(0x100, 0x40), (0x140, 0x80)]);
        data.truncate(30);
        assert!(matches!(
            BitmapLibraryTable::read(&mut Cursor::new(data), 1024),
            Err(MapError::TableOverrun { .. })
        ));
    }

    #[test]
    fn test_empty_library() {
        let library = BitmapLibraryTable::default();
        assert!(library.is_empty());
        assert!(matches!(
            library.locate(0),
            Err(BitmapLibraryError::MissingEntry { index: 0, count: 0 })
        ));
    }
}
