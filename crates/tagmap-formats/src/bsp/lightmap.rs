//! Lightmap chain: BSP block -> lightmap header -> palettes and chunk tables
//!
//! Lightmap header fields used (offsets from the header start):
//!
//! | Offset | Field |
//! |--------|-------|
//! | +8     | Palette count, pointer |
//! | +40    | Visual chunk count, pointer |
//! | +72    | Scenery chunk count, pointer |
//! | +128   | Bitmap tag identifier |
//!
//! Every pointer inside the chain is corrected with the BSP's local magic.

use crate::bsp::entry::{BrokenLightmap, BspEntry, PALETTE_SIZE, Palette};
use crate::context::DecodeContext;
use crate::error::{DecodeWarning, MapError, Result};
use crate::reader::{check_table_bounds, read_record_at, read_u32_at, stream_len};
use crate::tags::{TagId, TagIndex};
use binrw::BinRead;
use std::io::{Read, Seek};

const LIGHTMAP_POINTER: u64 = 8;
const PALETTE_TABLE: u64 = 8;
const VISUAL_CHUNK_TABLE: u64 = 40;
const SCENERY_CHUNK_TABLE: u64 = 72;
const BITMAP_ID: u64 = 128;
const CHUNK_RECORD_SIZE: u32 = 4;

/// Structure-BSP header field holding the lightmap bitmap id (V1/V2)
const OLDER_BITMAP_ID: u64 = 12;

#[derive(Debug, BinRead)]
#[br(little)]
struct ChunkRecord {
    bitmap: i16,
    lightmap: i16,
}

/// Follow the V3/V4 lightmap chain of a local BSP
///
/// `lightmap_slot` is the absolute offset of the lightmap identifier in the
/// descriptor array.
pub(crate) fn read_newer_chain<R: Read + Seek>(
    reader: &mut R,
    entry: &mut BspEntry,
    bsp_index: usize,
    lightmap_slot: u64,
    lightmap_id: TagId,
    tags: &TagIndex,
    ctx: &mut DecodeContext<'_>,
) -> Result<()> {
    let Some(tag_index) = tags.index_of(lightmap_id) else {
        ctx.warn(
            "bsp",
            DecodeWarning::UnresolvedTag {
                context: "lightmap",
                identifier: lightmap_id,
            },
        );
        return Ok(());
    };

    let pointer = read_u32_at(reader, u64::from(entry.offset) + LIGHTMAP_POINTER)?;
    if pointer == 0 {
        entry.lightmap_identifier = None;
        entry.lightmap_tag_index = None;
        entry.broken_lightmap = Some(BrokenLightmap {
            bsp_index,
            identifier_slot: lightmap_slot,
            identifier: lightmap_id,
        });
        ctx.warn(
            "bsp",
            DecodeWarning::BrokenLightmap {
                bsp_index,
                identifier: lightmap_id,
            },
        );
        return Ok(());
    }

    entry.lightmap_tag_index = Some(tag_index);
    entry.lightmap_offset = entry.correct(pointer);
    let end = i64::from(entry.size) + i64::from(entry.offset);
    entry.lightmap_size =
        u32::try_from((end - i64::from(entry.lightmap_offset)).max(0)).unwrap_or(0);

    let header = u64::from(entry.lightmap_offset);
    let stream_len = stream_len(reader)?;
    let options = ctx.options();
    let (max_palettes, max_chunks) = (options.max_palette_count, options.max_chunk_count);

    let (count, offset) = read_table_ref(reader, entry, header + PALETTE_TABLE)?;
    if count > 0 {
        check_count("palette", count, max_palettes)?;
        check_table_bounds("palette", offset, count, PALETTE_SIZE, stream_len)?;
        entry.palettes = (0..count)
            .map(|i| {
                let at = offset + u64::from(i) * u64::from(PALETTE_SIZE);
                read_record_at::<_, Palette>(reader, at, u64::from(PALETTE_SIZE))
            })
            .collect::<Result<_>>()?;
    }

    let (bitmaps, lightmaps) = read_chunks(
        reader,
        entry,
        header + VISUAL_CHUNK_TABLE,
        "visual chunk",
        max_chunks,
        stream_len,
    )?;
    entry.visual_chunk_bitmap_index = bitmaps;
    entry.visual_chunk_lightmap_index = lightmaps;

    let (bitmaps, lightmaps) = read_chunks(
        reader,
        entry,
        header + SCENERY_CHUNK_TABLE,
        "scenery chunk",
        max_chunks,
        stream_len,
    )?;
    entry.scenery_chunk_bitmap_index = bitmaps;
    entry.scenery_chunk_lightmap_index = lightmaps;

    entry.lightmap_bitmap_tag_index =
        resolve_bitmap(reader, header + BITMAP_ID, tags, ctx)?;

    ctx.debug(
        "bsp",
        &format!(
            "bsp {bsp_index}: lightmap at {:#x}, {} palettes, {} visual chunks, {} scenery chunks",
            entry.lightmap_offset,
            entry.palettes.len(),
            entry.visual_chunk_bitmap_index.len(),
            entry.scenery_chunk_bitmap_index.len()
        ),
    );
    Ok(())
}

/// Follow the V1/V2 chain: BSP block -> structure BSP -> bitmap id
pub(crate) fn read_older_chain<R: Read + Seek>(
    reader: &mut R,
    entry: &mut BspEntry,
    tags: &TagIndex,
    stream_len: u64,
    ctx: &mut DecodeContext<'_>,
) -> Result<()> {
    let pointer = read_u32_at(reader, u64::from(entry.offset))?;
    if pointer == 0 {
        return Ok(());
    }
    let structure = u64::from(entry.correct(pointer));
    if structure + OLDER_BITMAP_ID + 4 > stream_len {
        ctx.debug(
            "bsp",
            &format!("structure bsp pointer {pointer:#010x} outside stream"),
        );
        return Ok(());
    }
    entry.lightmap_bitmap_tag_index =
        resolve_bitmap(reader, structure + OLDER_BITMAP_ID, tags, ctx)?;
    Ok(())
}

fn resolve_bitmap<R: Read + Seek>(
    reader: &mut R,
    at: u64,
    tags: &TagIndex,
    ctx: &mut DecodeContext<'_>,
) -> Result<Option<usize>> {
    let Some(identifier) = TagId::non_null(read_u32_at(reader, at)?) else {
        return Ok(None);
    };
    let index = tags.index_of(identifier);
    if index.is_none() {
        ctx.warn(
            "bsp",
            DecodeWarning::UnresolvedTag {
                context: "lightmap bitmap",
                identifier,
            },
        );
    }
    Ok(index)
}

fn read_table_ref<R: Read + Seek>(
    reader: &mut R,
    entry: &BspEntry,
    at: u64,
) -> Result<(u32, u64)> {
    let count = read_u32_at(reader, at)?;
    let pointer = read_u32_at(reader, at + 4)?;
    Ok((count, u64::from(entry.correct(pointer))))
}

fn check_count(table: &'static str, count: u32, max: u32) -> Result<()> {
    if count > max {
        return Err(MapError::CountOutOfRange { table, count, max });
    }
    Ok(())
}

fn read_chunks<R: Read + Seek>(
    reader: &mut R,
    entry: &BspEntry,
    at: u64,
    table: &'static str,
    max: u32,
    stream_len: u64,
) -> Result<(Vec<i16>, Vec<i16>)> {
    let (count, offset) = read_table_ref(reader, entry, at)?;
    if count == 0 {
        return Ok((Vec::new(), Vec::new()));
    }
    check_count(table, count, max)?;
    check_table_bounds(table, offset, count, CHUNK_RECORD_SIZE, stream_len)?;

    let mut bitmaps = Vec::with_capacity(count as usize);
    let mut lightmaps = Vec::with_capacity(count as usize);
    for i in 0..count {
        let record: ChunkRecord = read_record_at(
            reader,
            offset + u64::from(i) * u64::from(CHUNK_RECORD_SIZE),
            u64::from(CHUNK_RECORD_SIZE),
        )?;
        bitmaps.push(record.bitmap);
        lightmaps.push(record.lightmap);
    }
    Ok((bitmaps, lightmaps))
}
