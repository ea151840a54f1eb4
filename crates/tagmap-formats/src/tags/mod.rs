//! Tag table: entries, lookups, size inference and the V2 bitmap library
//!
//! Record layouts (little-endian):
//!
//! | Version | Stride | Fields |
//! |---------|--------|--------|
//! | V3/V4   | 16     | class, id, offset, size |
//! | V1/V2   | 32     | class, id, name pointer, offset, indexed flag, 12 bytes padding |
//!
//! Classes are stored byte-reversed (`rncs` for `scnr`).

mod bitmap_library;
mod entry;
mod index;
mod size;

pub use bitmap_library::{BitmapLibrary, BitmapLibraryError, BitmapLibraryTable, LibraryEntry};
pub use entry::{TagClass, TagClassInfo, TagEntry, TagId, TagLocation};
pub use index::{TagDecodeOutcome, TagIndex};
pub use size::infer_gap_sizes;
