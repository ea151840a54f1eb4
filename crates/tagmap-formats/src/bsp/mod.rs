//! BSP descriptors referenced from the scenario tag
//!
//! The scenario tag holds a `(count, pointer)` descriptor at a fixed offset
//! (528 for V3/V4, 1444 for V1/V2). The pointer, corrected with the tag
//! magic, locates an array of BSP records:
//!
//! | Offset | V3/V4 (68 bytes) | V1/V2 (32 bytes) |
//! |--------|------------------|------------------|
//! | +0     | Block offset (top bits classify) | Block offset |
//! | +4     | Block size | Block size |
//! | +8     | Block base address | Block base address |
//! | +20    | BSP tag id | |
//! | +28    | Lightmap tag id | BSP tag id |
//!
//! `local_magic = base - offset` corrects every pointer inside the block.

mod entry;
mod lightmap;
mod repair;

pub use entry::{BrokenLightmap, BspEntry, PALETTE_COLORS, PALETTE_SIZE, Palette, PaletteColor};
pub use repair::{RepairOutcome, repair_lightmap_reference};

use crate::context::DecodeContext;
use crate::error::{DecodeWarning, MapError, Result};
use crate::magic::{IndexHeader, Magics};
use crate::pointer::{correct, resolve};
use crate::reader::{check_table_bounds, read_record_at, read_u32_at, stream_len};
use crate::tags::{TagClass, TagId, TagIndex};
use crate::version::MapVersion;
use binrw::BinRead;
use std::io::{Read, Seek};

/// Offset of the lightmap identifier inside a V3/V4 BSP record
const LIGHTMAP_ID_FIELD: u64 = 28;

#[derive(Debug, BinRead)]
#[br(little)]
struct NewerBspRecord {
    raw_offset: u32,
    size: u32,
    raw_base: u32,
    #[br(pad_before = 8)]
    bsp_id: u32,
    #[br(pad_before = 4, pad_after = 36)]
    lightmap_id: u32,
}

#[derive(Debug, BinRead)]
#[br(little)]
struct OlderBspRecord {
    offset: u32,
    size: u32,
    raw_base: u32,
    #[br(pad_before = 16)]
    bsp_id: u32,
}

/// Decoded BSP section of an archive
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BspSection {
    /// Tag index of the scenario the descriptors were read from
    pub scenario_tag_index: usize,
    /// One entry per descriptor, in stored order
    pub entries: Vec<BspEntry>,
}

impl BspSection {
    /// Locate the scenario, then decode its BSP descriptors and lightmaps
    pub fn read<R: Read + Seek>(
        reader: &mut R,
        index_header: &IndexHeader,
        tags: &TagIndex,
        magics: &Magics,
        version: MapVersion,
        ctx: &mut DecodeContext<'_>,
    ) -> Result<Self> {
        let scenario_tag_index = locate_scenario(tags, index_header, version, ctx)?;
        let scenario = tags
            .get(scenario_tag_index)
            .filter(|e| !e.is_external() && !e.is_placeholder())
            .ok_or(MapError::ScenarioNotFound { version })?;

        let stream_len = stream_len(reader)?;
        let descriptor = u64::from(scenario.file_offset) + u64::from(version.bsp_descriptor_offset());
        let count = read_u32_at(reader, descriptor)?;
        let pointer = read_u32_at(reader, descriptor + 4)?;

        let max = ctx.options().max_bsp_count;
        if count > max {
            return Err(MapError::BspCountOutOfRange { count, max });
        }

        let array = u64::from(correct(pointer, magics.tag_magic()));
        let stride = version.bsp_stride();
        if count > 0 {
            check_table_bounds("bsp", array, count, stride, stream_len)?;
        }

        ctx.debug(
            "bsp",
            &format!("scenario tag {scenario_tag_index}: {count} bsp descriptors at {array:#x}"),
        );

        let mut entries = Vec::with_capacity(count as usize);
        for i in 0..count {
            let bsp_index = i as usize;
            let at = array + u64::from(i) * u64::from(stride);
            let entry = if version.is_newer() {
                read_newer(reader, at, bsp_index, tags, stream_len, ctx)?
            } else {
                read_older(reader, at, tags, stream_len, ctx)?
            };
            entries.push(entry);
        }

        Ok(Self {
            scenario_tag_index,
            entries,
        })
    }

    /// Broken lightmap references found while decoding
    pub fn broken_lightmaps(&self) -> impl Iterator<Item = &BrokenLightmap> {
        self.entries.iter().filter_map(|e| e.broken_lightmap.as_ref())
    }
}

fn locate_scenario(
    tags: &TagIndex,
    index_header: &IndexHeader,
    version: MapVersion,
    ctx: &mut DecodeContext<'_>,
) -> Result<usize> {
    let from_index = if version.is_newer() {
        index_header.scenario_id.and_then(|id| {
            let found = tags.index_of(id);
            if found.is_none() {
                ctx.debug(
                    "bsp",
                    &format!("scenario id {id} not in tag table, using fixed index"),
                );
            }
            found
        })
    } else {
        None
    };
    let fixed = version.scenario_tag_index();
    let tag_index = from_index
        .or_else(|| (fixed < tags.len()).then_some(fixed))
        .or_else(|| tags.indices_of_class(TagClass::SCENARIO).next())
        .ok_or(MapError::ScenarioNotFound { version })?;

    let Some(entry) = tags.get(tag_index) else {
        return Err(MapError::ScenarioNotFound { version });
    };
    if entry.tag_class != TagClass::SCENARIO {
        ctx.warn(
            "bsp",
            DecodeWarning::UnexpectedScenarioClass {
                tag_index,
                class: entry.tag_class,
            },
        );
    }
    Ok(tag_index)
}

fn resolve_tag(
    tags: &TagIndex,
    identifier: Option<TagId>,
    context: &'static str,
    ctx: &mut DecodeContext<'_>,
) -> Option<usize> {
    let identifier = identifier?;
    let index = tags.index_of(identifier);
    if index.is_none() {
        ctx.warn("bsp", DecodeWarning::UnresolvedTag { context, identifier });
    }
    index
}

fn read_newer<R: Read + Seek>(
    reader: &mut R,
    at: u64,
    bsp_index: usize,
    tags: &TagIndex,
    stream_len: u64,
    ctx: &mut DecodeContext<'_>,
) -> Result<BspEntry> {
    let record: NewerBspRecord = read_record_at(reader, at, 68)?;
    let block = resolve(record.raw_offset, 0);
    let identifier = TagId::non_null(record.bsp_id);

    let mut entry = BspEntry {
        offset: block.offset,
        size: record.size,
        local_magic: record.raw_base.wrapping_sub(block.offset),
        source: block.source,
        identifier,
        tag_index: resolve_tag(tags, identifier, "bsp", ctx),
        lightmap_identifier: TagId::non_null(record.lightmap_id),
        ..BspEntry::default()
    };

    let Some(lightmap_id) = entry.lightmap_identifier else {
        return Ok(entry);
    };
    if !ctx.options().decode_lightmaps {
        return Ok(entry);
    }
    if entry.source.is_external() {
        ctx.debug(
            "bsp",
            &format!("bsp {bsp_index} lives in {}, lightmap not followed", entry.source),
        );
        return Ok(entry);
    }
    if u64::from(entry.offset) + 12 > stream_len {
        return Err(MapError::Truncated {
            offset: u64::from(entry.offset),
            len: 12,
        });
    }

    lightmap::read_newer_chain(
        reader,
        &mut entry,
        bsp_index,
        at + LIGHTMAP_ID_FIELD,
        lightmap_id,
        tags,
        ctx,
    )?;
    Ok(entry)
}

fn read_older<R: Read + Seek>(
    reader: &mut R,
    at: u64,
    tags: &TagIndex,
    stream_len: u64,
    ctx: &mut DecodeContext<'_>,
) -> Result<BspEntry> {
    let record: OlderBspRecord = read_record_at(reader, at, 32)?;
    let identifier = TagId::non_null(record.bsp_id);

    let mut entry = BspEntry {
        offset: record.offset,
        size: record.size,
        local_magic: record.raw_base.wrapping_sub(record.offset),
        identifier,
        tag_index: resolve_tag(tags, identifier, "bsp", ctx),
        ..BspEntry::default()
    };

    if !ctx.options().decode_lightmaps {
        return Ok(entry);
    }
    if u64::from(entry.offset) + 4 > stream_len {
        return Err(MapError::Truncated {
            offset: u64::from(entry.offset),
            len: 4,
        });
    }
    lightmap::read_older_chain(reader, &mut entry, tags, stream_len, ctx)?;
    Ok(entry)
}
