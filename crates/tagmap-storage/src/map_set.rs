//! A primary map together with the companion archives it references
//!
//! Tags whose raw offset carries companion bits are stored in another
//! archive. The companion is opened and decoded once; the tag is then found
//! there by identifier, or by offset when the identifier is unknown.

use crate::config::StorageConfig;
use crate::map_file::{LibraryFile, MapFile};
use crate::{Result, StorageError};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use tagmap_formats::{BitmapLibrary, DecodedMap, ExternalSource, MapVersion, TagLocation};
use tracing::{debug, info, warn};

/// Primary map plus every companion it needs
#[derive(Debug)]
pub struct MapSet {
    primary: MapFile,
    library: Option<LibraryFile>,
    library_path: PathBuf,
    companions: HashMap<ExternalSource, MapFile>,
}

impl MapSet {
    /// Open `name` from the configured maps directory with its companions
    ///
    /// V2 maps use the bitmap library when the file exists; without it their
    /// library bitmaps decode with a warning. Any other companion the map
    /// references must exist.
    pub fn open(config: &StorageConfig, name: &str) -> Result<Self> {
        let path = config.map_path(name);
        let version = MapVersion::detect(&mut BufReader::new(File::open(&path)?))?;

        let library_path = config
            .companion_path(ExternalSource::BitmapLibrary)
            .unwrap_or_else(|| config.maps_dir.clone());
        let library = if version.uses_bitmap_library() && library_path.is_file() {
            Some(LibraryFile::open(&library_path, config.decode.max_tag_count)?)
        } else {
            None
        };

        let primary = MapFile::open_with_library(
            &path,
            Some(version),
            &config.decode,
            library.as_ref().map(|l| l.table() as &dyn BitmapLibrary),
        )?;
        info!(
            "Opened {} ({}, {} tags)",
            path.display(),
            version,
            primary.decoded().tags.len()
        );

        let mut companions = HashMap::new();
        for source in primary.decoded().external_sources() {
            if source == ExternalSource::BitmapLibrary {
                continue;
            }
            let Some(companion_path) = config.companion_path(source) else {
                continue;
            };
            if !companion_path.is_file() {
                return Err(StorageError::MissingCompanion {
                    archive: source,
                    path: companion_path,
                });
            }
            debug!("Opening companion {source} at {}", companion_path.display());
            let companion = MapFile::open(&companion_path, None, &config.decode)?;
            companions.insert(source, companion);
        }

        Ok(Self {
            primary,
            library,
            library_path,
            companions,
        })
    }

    /// The map that was asked for
    pub const fn primary(&self) -> &MapFile {
        &self.primary
    }

    /// Decoded structures of the primary map
    pub const fn decoded(&self) -> &DecodedMap {
        self.primary.decoded()
    }

    /// An opened companion
    pub fn companion(&self, source: ExternalSource) -> Option<&MapFile> {
        self.companions.get(&source)
    }

    /// Opened bitmap library
    pub const fn library(&self) -> Option<&LibraryFile> {
        self.library.as_ref()
    }

    /// Where the bytes of tag `index` actually live
    ///
    /// Local and library tags resolve to the primary's computed location.
    /// Companion tags resolve to the matching entry in the companion, with
    /// `source` naming the companion.
    pub fn resolve(&self, index: usize) -> Result<TagLocation> {
        let tags = &self.primary.decoded().tags;
        let entry = tags.get(index).ok_or(StorageError::TagIndexOutOfRange {
            index,
            count: tags.len(),
        })?;

        let source = entry.source;
        if matches!(source, ExternalSource::Local | ExternalSource::BitmapLibrary) {
            return Ok(entry.location());
        }

        let companion = self
            .companions
            .get(&source)
            .ok_or_else(|| StorageError::MissingCompanion {
                archive: source,
                path: self.primary.path().with_file_name(source.to_string()),
            })?;
        let companion_tags = &companion.decoded().tags;

        let found = companion_tags.by_identifier(entry.identifier).or_else(|| {
            let by_offset = companion_tags
                .index_at_offset(entry.file_offset)
                .and_then(|i| companion_tags.get(i));
            if by_offset.is_some() {
                warn!(
                    "Tag {} not in {source} by identifier, matched by offset {:#x}",
                    entry.identifier, entry.file_offset
                );
            }
            by_offset
        });

        let found = found.ok_or(StorageError::UnresolvedExternal {
            identifier: entry.identifier,
            archive: source,
        })?;
        Ok(TagLocation {
            source,
            ..found.location()
        })
    }

    /// Resolved location of every tag, in table order
    pub fn locations(&self) -> Result<Vec<TagLocation>> {
        (0..self.primary.decoded().tags.len())
            .map(|index| self.resolve(index))
            .collect()
    }

    /// Bytes of tag `index` from whichever archive holds them
    pub fn tag_bytes(&self, index: usize) -> Result<&[u8]> {
        let location = self.resolve(index)?;
        match location.source {
            ExternalSource::Local => self.primary.tag_bytes(index),
            ExternalSource::BitmapLibrary => {
                let library = self
                    .library
                    .as_ref()
                    .ok_or_else(|| StorageError::MissingCompanion {
                        archive: ExternalSource::BitmapLibrary,
                        path: self.library_path.clone(),
                    })?;
                library.range(location.file_offset, location.size)
            }
            source => {
                let companion =
                    self.companions
                        .get(&source)
                        .ok_or_else(|| StorageError::MissingCompanion {
                            archive: source,
                            path: self.primary.path().with_file_name(source.to_string()),
                        })?;
                crate::map_file::slice(
                    companion.path(),
                    companion.bytes(),
                    location.file_offset,
                    location.size,
                )
            }
        }
    }
}
