//! Configuration for map storage

use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tagmap_formats::{DecodeOptions, ExternalSource};

/// Configuration for opening maps and their companions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the map files
    pub maps_dir: PathBuf,

    /// Main menu archive file name
    pub mainmenu_file: String,

    /// Multiplayer shared archive file name
    pub shared_file: String,

    /// Single player shared archive file name
    pub single_player_shared_file: String,

    /// Bitmap library file name (V2)
    pub bitmap_library_file: String,

    /// Options for every decode
    pub decode: DecodeOptions,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            maps_dir: PathBuf::from("./maps"),
            mainmenu_file: "mainmenu.map".to_string(),
            shared_file: "shared.map".to_string(),
            single_player_shared_file: "single_player_shared.map".to_string(),
            bitmap_library_file: "bitmaps.map".to_string(),
            decode: DecodeOptions::default(),
        }
    }
}

impl StorageConfig {
    /// Create a new configuration with the specified maps directory
    pub fn new<P: AsRef<Path>>(maps_dir: P) -> Self {
        Self {
            maps_dir: maps_dir.as_ref().to_path_buf(),
            ..Default::default()
        }
    }

    /// Load a configuration from a JSON file
    ///
    /// Missing fields take their default values.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Parse a configuration from JSON text
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Set the maps directory
    #[must_use]
    pub fn with_maps_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.maps_dir = path.as_ref().to_path_buf();
        self
    }

    /// Set the decode options
    #[must_use]
    pub fn with_decode_options(mut self, options: DecodeOptions) -> Self {
        self.decode = options;
        self
    }

    /// Path of a map in the maps directory
    pub fn map_path(&self, name: &str) -> PathBuf {
        self.maps_dir.join(name)
    }

    /// Path of the archive that holds data for `source`
    ///
    /// `None` for [`ExternalSource::Local`], which has no fixed file.
    pub fn companion_path(&self, source: ExternalSource) -> Option<PathBuf> {
        let name = match source {
            ExternalSource::Local => return None,
            ExternalSource::MainMenu => &self.mainmenu_file,
            ExternalSource::MultiplayerShared => &self.shared_file,
            ExternalSource::SinglePlayerShared => &self.single_player_shared_file,
            ExternalSource::BitmapLibrary => &self.bitmap_library_file,
        };
        Some(self.maps_dir.join(name))
    }
}
