//! On-disk access to tag map archives and their companions.
//!
//! This crate opens map files through memory mappings, decodes them with
//! `tagmap-formats`, and follows external tag references into the companion
//! archives that sit next to a map:
//!
//! - **Main menu** (`mainmenu.map`)
//! - **Multiplayer shared** (`shared.map`)
//! - **Single player shared** (`single_player_shared.map`)
//! - **Bitmap library** (`bitmaps.map`, second-version archives only)
//!
//! It also persists lightmap repairs back into a map file.
//!
//! # Example
//!
//! ```rust,no_run
//! use tagmap_storage::{MapSet, StorageConfig};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = StorageConfig::new("/games/halo2/maps");
//! let set = MapSet::open(&config, "zanzibar.map")?;
//!
//! for (index, location) in set.locations()?.iter().enumerate() {
//!     println!("{index}: {} in {}", location.tag_class, location.source);
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![allow(clippy::must_use_candidate)]

use std::path::PathBuf;
use tagmap_formats::{ExternalSource, MapError, TagId};
use thiserror::Error;

// Configuration
pub mod config;

// Memory-mapped files
pub mod map_file;

// Primary map plus companions
pub mod map_set;

// Lightmap repair on disk
pub mod repair;

pub use config::StorageConfig;
pub use map_file::{LibraryFile, MapFile, detect_version};
pub use map_set::MapSet;
pub use repair::{repair_all_lightmaps, repair_lightmap};

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Archive could not be decoded.
    #[error("Map error: {0}")]
    Map(#[from] MapError),

    /// Configuration could not be parsed.
    #[error("Configuration error: {0}")]
    Config(#[from] serde_json::Error),

    /// Tag index past the end of the tag table.
    #[error("Tag index {index} out of range ({count} tags)")]
    TagIndexOutOfRange {
        /// Requested index
        index: usize,
        /// Number of tags
        count: usize,
    },

    /// Tag bytes live in another archive.
    #[error("Tag {index} is stored in {archive}, not locally")]
    NotLocal {
        /// Requested index
        index: usize,
        /// Archive holding the bytes
        archive: ExternalSource,
    },

    /// Byte range outside a mapped file.
    #[error("Range {offset:#x}+{size:#x} outside {} ({len} bytes)", path.display())]
    OutOfBounds {
        /// File the range was taken from
        path: PathBuf,
        /// Start of the range
        offset: u32,
        /// Length of the range
        size: u32,
        /// File length
        len: u64,
    },

    /// A companion archive the map depends on is missing.
    #[error("Companion archive {archive} not found at {}", path.display())]
    MissingCompanion {
        /// Companion kind
        archive: ExternalSource,
        /// Expected path
        path: PathBuf,
    },

    /// An external tag has no counterpart in its companion.
    #[error("Tag {identifier} not found in {archive}")]
    UnresolvedExternal {
        /// Identifier looked up
        identifier: TagId,
        /// Companion searched
        archive: ExternalSource,
    },
}

/// Version information for the storage crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
