//! Memory-mapped map files

use crate::{Result, StorageError};
use memmap2::{Mmap, MmapOptions};
use std::fs::File;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tagmap_formats::{
    BitmapLibrary, BitmapLibraryTable, DecodeOptions, DecodedMap, MapDecoder, MapVersion,
};
use tracing::debug;

/// Memory-map one file read-only
fn map_file(path: &Path) -> Result<Mmap> {
    let file = File::open(path)?;

    // Memory-map the file for tag byte access
    #[allow(unsafe_code)]
    let mmap = unsafe { MmapOptions::new().map(&file)? };
    Ok(mmap)
}

/// Decoded map backed by a memory mapping
pub struct MapFile {
    path: PathBuf,
    mmap: Mmap,
    map: DecodedMap,
}

impl MapFile {
    /// Open and decode a map
    ///
    /// The version is detected from the header when `version` is `None`.
    pub fn open<P: AsRef<Path>>(
        path: P,
        version: Option<MapVersion>,
        options: &DecodeOptions,
    ) -> Result<Self> {
        Self::open_with_library(path, version, options, None)
    }

    /// Open and decode a map, resolving V2 library bitmaps through `library`
    pub fn open_with_library<P: AsRef<Path>>(
        path: P,
        version: Option<MapVersion>,
        options: &DecodeOptions,
        library: Option<&dyn BitmapLibrary>,
    ) -> Result<Self> {
        let path = path.as_ref();
        let mmap = map_file(path)?;
        let version = match version {
            Some(version) => version,
            None => detect_version(&mmap)?,
        };

        let mut decoder =
            MapDecoder::new(Cursor::new(&mmap[..]), version).with_options(options.clone());
        if let Some(library) = library {
            decoder = decoder.with_bitmap_library(library);
        }
        let map = decoder.decode()?;

        debug!(
            "Opened {} as {}: {} tags, {} bsps",
            path.display(),
            map.version,
            map.tags.len(),
            map.bsps.len()
        );

        Ok(Self {
            path: path.to_path_buf(),
            mmap,
            map,
        })
    }

    /// Decoded structures
    pub const fn decoded(&self) -> &DecodedMap {
        &self.map
    }

    /// Path the map was opened from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whole file contents
    pub fn bytes(&self) -> &[u8] {
        &self.mmap
    }

    /// Bytes of a local tag
    pub fn tag_bytes(&self, index: usize) -> Result<&[u8]> {
        let entry = self
            .map
            .tags
            .get(index)
            .ok_or(StorageError::TagIndexOutOfRange {
                index,
                count: self.map.tags.len(),
            })?;
        if entry.is_external() {
            return Err(StorageError::NotLocal {
                index,
                archive: entry.source,
            });
        }
        slice(&self.path, &self.mmap, entry.file_offset, entry.size)
    }
}

impl std::fmt::Debug for MapFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapFile")
            .field("path", &self.path)
            .field("len", &self.mmap.len())
            .field("version", &self.map.version)
            .finish_non_exhaustive()
    }
}

/// Memory-mapped V2 bitmap library
pub struct LibraryFile {
    path: PathBuf,
    mmap: Mmap,
    table: BitmapLibraryTable,
}

impl LibraryFile {
    /// Open a bitmap library and read its record table
    pub fn open<P: AsRef<Path>>(path: P, max_entries: u32) -> Result<Self> {
        let path = path.as_ref();
        let mmap = map_file(path)?;
        let table = BitmapLibraryTable::read(&mut Cursor::new(&mmap[..]), max_entries)?;
        debug!("Opened bitmap library {}: {} entries", path.display(), table.len());
        Ok(Self {
            path: path.to_path_buf(),
            mmap,
            table,
        })
    }

    /// Record table
    pub const fn table(&self) -> &BitmapLibraryTable {
        &self.table
    }

    /// Bytes at a location inside the library
    pub fn range(&self, offset: u32, size: u32) -> Result<&[u8]> {
        slice(&self.path, &self.mmap, offset, size)
    }
}

impl std::fmt::Debug for LibraryFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LibraryFile")
            .field("path", &self.path)
            .field("entries", &self.table.len())
            .finish_non_exhaustive()
    }
}

/// Detect the version of a mapped file
pub fn detect_version(bytes: &[u8]) -> Result<MapVersion> {
    Ok(MapVersion::detect(&mut Cursor::new(bytes))?)
}

pub(crate) fn slice<'a>(path: &Path, bytes: &'a [u8], offset: u32, size: u32) -> Result<&'a [u8]> {
    let start = offset as usize;
    let end = start.saturating_add(size as usize);
    bytes.get(start..end).ok_or_else(|| StorageError::OutOfBounds {
        path: path.to_path_buf(),
        offset,
        size,
        len: bytes.len() as u64,
    })
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use tagmap_test_utils::{NewerMapBuilder, class, temp_maps_dir};

    #[test]
    fn test_open_detects_and_slices() {
        let bytes = NewerMapBuilder::new()
            .tag(class::SCENARIO, 0xA, 0x0010_0000, 0x200)
            .tag(class::BITMAP, 0xB, 0x0010_0200, 0x10)
            .tag(class::BITMAP, 0xC, 0x8010_0000, 0x10)
            .with_u32(0x1200, 0xDEAD_BEEF)
            .build();
        let dir = temp_maps_dir(&[("test.map", &bytes)]).expect("Test operation should succeed");

        let file = MapFile::open(dir.path().join("test.map"), None, &DecodeOptions::default())
            .expect("Test operation should succeed");
        assert_eq!(file.decoded().version, MapVersion::V3);
        assert_eq!(file.bytes().len(), bytes.len());

        let tag = file.tag_bytes(1).expect("Test operation should succeed");
        assert_eq!(tag.len(), 0x10);
        assert_eq!(&tag[..4], &0xDEAD_BEEFu32.to_le_bytes());

        assert!(matches!(
            file.tag_bytes(2),
            Err(StorageError::NotLocal { index: 2, .. })
        ));
        assert!(matches!(
            file.tag_bytes(9),
            Err(StorageError::TagIndexOutOfRange { index: 9, count: 3 })
        ));
    }

    #[test]
    fn test_slice_bounds() {
        let bytes = [0u8; 16];
        assert_eq!(slice(Path::new("x"), &bytes, 4, 8).expect("in range").len(), 8);
        assert!(matches!(
            slice(Path::new("x"), &bytes, 12, 8),
            Err(StorageError::OutOfBounds { offset: 12, size: 8, len: 16, .. })
        ));
    }
}
