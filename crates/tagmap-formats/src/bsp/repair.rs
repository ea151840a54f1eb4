//! Persisting a broken lightmap fix
//!
//! Decoding never writes. A caller that wants the null lightmap pointer
//! handled permanently overwrites the stored lightmap identifier with the
//! null identifier, so later decodes skip the chain without a warning.

use crate::bsp::entry::BrokenLightmap;
use crate::error::{MapError, Result};
use crate::reader::read_u32_at;
use crate::tags::TagId;
use std::io::{Read, Seek, SeekFrom, Write};

/// Result of a repair request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairOutcome {
    /// The null identifier was written
    Applied,
    /// The caller declined; nothing was written
    Declined,
}

/// Overwrite a broken lightmap identifier with `FF FF FF FF`
///
/// `confirm` is asked once, after the slot has been checked. The slot must
/// still hold the identifier recorded at decode time.
pub fn repair_lightmap_reference<S, F>(
    stream: &mut S,
    broken: &BrokenLightmap,
    confirm: F,
) -> Result<RepairOutcome>
where
    S: Read + Write + Seek,
    F: FnOnce(&BrokenLightmap) -> bool,
{
    let found = TagId(read_u32_at(stream, broken.identifier_slot)?);
    if found != broken.identifier {
        return Err(MapError::StaleRepair {
            slot: broken.identifier_slot,
            expected: broken.identifier,
            found,
        });
    }

    if !confirm(broken) {
        return Ok(RepairOutcome::Declined);
    }

    stream.seek(SeekFrom::Start(broken.identifier_slot))?;
    stream.write_all(&TagId::SENTINEL.0.to_le_bytes())?;
    stream.flush()?;
    Ok(RepairOutcome::Applied)
}
