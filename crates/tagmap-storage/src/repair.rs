//! Lightmap repair on map files
//!
//! A BSP whose lightmap pointer is null decodes with the lightmap disabled.
//! Repairing writes the null identifier into the BSP record so later decodes
//! skip the chain silently. Only the four identifier bytes change.

use crate::Result;
use crate::map_file::MapFile;
use std::fs::OpenOptions;
use std::path::Path;
use tagmap_formats::{BrokenLightmap, DecodeOptions, RepairOutcome, repair_lightmap_reference};
use tracing::info;

/// Repair one broken lightmap reference in the file at `path`
///
/// `confirm` is asked once; when it declines the file is left untouched.
pub fn repair_lightmap<P, F>(path: P, broken: &BrokenLightmap, confirm: F) -> Result<RepairOutcome>
where
    P: AsRef<Path>,
    F: FnOnce(&BrokenLightmap) -> bool,
{
    let path = path.as_ref();
    let mut file = OpenOptions::new().read(true).write(true).open(path)?;
    let outcome = repair_lightmap_reference(&mut file, broken, confirm)?;

    match outcome {
        RepairOutcome::Applied => info!(
            "Repaired lightmap of bsp {} in {}: cleared {} at {:#x}",
            broken.bsp_index,
            path.display(),
            broken.identifier,
            broken.identifier_slot
        ),
        RepairOutcome::Declined => info!(
            "Lightmap repair of bsp {} in {} declined",
            broken.bsp_index,
            path.display()
        ),
    }
    Ok(outcome)
}

/// Decode the map at `path` and offer every broken lightmap to `confirm`
///
/// Returns the number of references that were rewritten.
pub fn repair_all_lightmaps<P, F>(path: P, options: &DecodeOptions, mut confirm: F) -> Result<usize>
where
    P: AsRef<Path>,
    F: FnMut(&BrokenLightmap) -> bool,
{
    let path = path.as_ref();
    let broken: Vec<BrokenLightmap> = {
        let map = MapFile::open(path, None, options)?;
        map.decoded().broken_lightmaps().copied().collect()
    };

    let mut applied = 0;
    for entry in &broken {
        if repair_lightmap(path, entry, &mut confirm)? == RepairOutcome::Applied {
            applied += 1;
        }
    }
    Ok(applied)
}
