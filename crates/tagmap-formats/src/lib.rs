//! Decoders for versioned tag-map game archives
//!
#![allow(clippy::cast_possible_truncation)] // Intentional for binary format parsing
#![allow(clippy::cast_sign_loss)] // Clamped before casting
#![allow(clippy::doc_markdown)] // Format terms don't need backticks
#![allow(clippy::module_name_repetitions)] // Clear naming is preferred
#![allow(clippy::similar_names)] // Domain-specific naming patterns
#![allow(clippy::too_many_arguments)] // Decode stages thread shared state
#![allow(clippy::missing_errors_doc)] // Every decode returns MapError
#![allow(clippy::return_self_not_must_use)] // Builder patterns
//! A map archive is a single file holding a fixed 2048-byte header, a tag
//! index and the tag data itself. Pointers inside the archive are stored as
//! virtual addresses; each archive carries the constants ("magics") needed to
//! turn them back into file offsets.
//!
//! # Supported Versions
//!
//! - **V1**: Original release, 36-byte index header
//! - **V2**: Desktop release, 40-byte index header, external bitmap library
//! - **V3**: Second generation, explicit tag sizes and companion archives
//! - **V4**: Alternate second generation layout, reached from V3 through the
//!   sentinel identifier
//!
//! # Pipeline
//!
//! Decoding is linear: [`MapHeader`] then [`calibrate`] then [`TagIndex`]
//! then [`BspSection`]. [`MapDecoder`] drives the stages and returns a
//! [`DecodedMap`]. Recoverable problems are collected as
//! [`DecodeWarning`]s and forwarded to a [`DecodeObserver`]; structural
//! problems end the decode with a [`MapError`].
//!
//! ```no_run
//! use tagmap_formats::{MapVersion, decode_bytes};
//!
//! let bytes = std::fs::read("zanzibar.map")?;
//! let map = decode_bytes(&bytes, MapVersion::V3)?;
//! for location in map.locations() {
//!     println!("{} {} {:#x}+{}", location.tag_class, location.identifier, location.file_offset, location.size);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]

/// BSP descriptors, lightmap chains and lightmap repair
pub mod bsp;
/// Per-decode state shared by every stage
pub mod context;
/// Errors and recoverable warnings
pub mod error;
/// Fixed-size archive header
pub mod header;
/// Index header and magic calibration
pub mod magic;
/// Decode pipeline
pub mod map;
/// Injected logging sink
pub mod observer;
/// Decode options
pub mod options;
/// Pointer correction and companion classification
pub mod pointer;
mod reader;
/// Tag table decoding
pub mod tags;
/// Format versions
pub mod version;

pub use bsp::{
    BrokenLightmap, BspEntry, BspSection, Palette, PaletteColor, RepairOutcome,
    repair_lightmap_reference,
};
pub use context::DecodeContext;
pub use error::{DecodeWarning, MapError, Result, VersionFallback};
pub use header::{ArchiveKind, MapHeader};
pub use magic::{Calibration, IndexHeader, Magics, calibrate};
pub use map::{DecodeState, DecodedMap, MapDecoder, decode_bytes, decode_bytes_with};
pub use observer::{DecodeObserver, NullObserver, TracingObserver};
pub use options::DecodeOptions;
pub use pointer::{ExternalSource, ResolvedPointer};
pub use tags::{
    BitmapLibrary, BitmapLibraryError, BitmapLibraryTable, LibraryEntry, TagClass, TagEntry,
    TagId, TagIndex, TagLocation,
};
pub use version::MapVersion;
