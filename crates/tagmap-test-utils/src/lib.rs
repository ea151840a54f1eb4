//! Test utilities for tagmap
//!
//! Builds small synthetic map archives byte by byte so tests never need real
//! game data. Layout constants match the decoders; every fixture is
//! little-endian.

/// Offset of the index header in every fixture
pub const INDEX_OFFSET: u32 = 0x800;

/// Header version field for V1 fixtures
pub const VERSION_FIELD_V1: u32 = 5;
/// Header version field for V2 fixtures
pub const VERSION_FIELD_V2: u32 = 7;
/// Header version field for V3/V4 fixtures
pub const VERSION_FIELD_V3: u32 = 8;

const HEADER_SIGNATURE: &[u8; 4] = b"daeh";
const FOOTER_SIGNATURE: &[u8; 4] = b"toof";
const INDEX_SIGNATURE: &[u8; 4] = b"sgat";

/// Newer (V3/V4) fixture constants
pub mod newer {
    /// File size of newer fixtures
    pub const FILE_SIZE: u32 = 0x4000;
    /// Meta start written to the header
    pub const META_START: u32 = 0x800;
    /// Primary magic implied by the index constant
    pub const PRIMARY_MAGIC: u32 = 0x8000_0000;
    /// Index header constant (`primary + index_offset + 32`)
    pub const INDEX_CONSTANT: u32 = 0x8000_0820;
    /// Absolute offset of the first tag record
    pub const TAG_TABLE: u32 = 0x820;
    /// Secondary magic when the smallest local raw offset is 0x100000
    pub const SECONDARY_MAGIC: u32 = 0x000F_F000;
    /// Raw base address of the fixture BSP block
    pub const BSP_BASE: u32 = 0x5000_0000;
}

/// Older (V1/V2) fixture constants
pub mod older {
    /// File size of older fixtures
    pub const FILE_SIZE: u32 = 0x3800;
    /// Primary magic implied by the index constant
    pub const PRIMARY_MAGIC: u32 = 0x4000_0000;
    /// Raw base address of the fixture BSP block
    pub const BSP_BASE: u32 = 0x6000_0000;
}

/// Tag class codes in reading order
pub mod class {
    /// Scenario
    pub const SCENARIO: &[u8; 4] = b"scnr";
    /// Structure BSP
    pub const STRUCTURE_BSP: &[u8; 4] = b"sbsp";
    /// Lightmap
    pub const LIGHTMAP: &[u8; 4] = b"ltmp";
    /// Bitmap
    pub const BITMAP: &[u8; 4] = b"bitm";
}

/// Byte buffer with absolute little-endian writers
#[derive(Debug, Clone)]
pub struct FixtureBuffer {
    data: Vec<u8>,
}

impl FixtureBuffer {
    /// Zero-filled buffer of `len` bytes
    pub fn zeroed(len: u32) -> Self {
        Self {
            data: vec![0; len as usize],
        }
    }

    /// Write a little-endian `u32`
    pub fn put_u32(&mut self, offset: u32, value: u32) -> &mut Self {
        self.put_bytes(offset, &value.to_le_bytes())
    }

    /// Write a little-endian `i16`
    pub fn put_i16(&mut self, offset: u32, value: i16) -> &mut Self {
        self.put_bytes(offset, &value.to_le_bytes())
    }

    /// Write raw bytes
    pub fn put_bytes(&mut self, offset: u32, bytes: &[u8]) -> &mut Self {
        let start = offset as usize;
        self.data[start..start + bytes.len()].copy_from_slice(bytes);
        self
    }

    /// Read back a little-endian `u32`
    pub fn u32_at(&self, offset: u32) -> u32 {
        let start = offset as usize;
        let mut word = [0u8; 4];
        word.copy_from_slice(&self.data[start..start + 4]);
        u32::from_le_bytes(word)
    }

    /// Borrow the bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Take the bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

fn stored_class(class: &[u8; 4]) -> [u8; 4] {
    [class[3], class[2], class[1], class[0]]
}

/// Builder for V3/V4 archives
///
/// Tags are appended to a 16-byte record table right after the 32-byte index
/// header; header and index tag counts follow the number of records.
#[derive(Debug, Clone)]
pub struct NewerMapBuilder {
    buffer: FixtureBuffer,
    tag_count: u32,
}

impl Default for NewerMapBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl NewerMapBuilder {
    /// Header and index header with no tags
    pub fn new() -> Self {
        let mut buffer = FixtureBuffer::zeroed(newer::FILE_SIZE);
        buffer
            .put_bytes(0, HEADER_SIGNATURE)
            .put_u32(4, VERSION_FIELD_V3)
            .put_u32(8, newer::FILE_SIZE)
            .put_u32(16, INDEX_OFFSET)
            .put_u32(20, newer::META_START)
            .put_u32(24, newer::FILE_SIZE - newer::META_START)
            .put_bytes(420, b"fixture")
            .put_bytes(456, b"scenarios\\multi\\fixture\\fixture")
            .put_bytes(2044, FOOTER_SIGNATURE);
        buffer
            .put_u32(INDEX_OFFSET, newer::INDEX_CONSTANT)
            .put_u32(INDEX_OFFSET + 8, newer::INDEX_CONSTANT)
            .put_u32(INDEX_OFFSET + 12, u32::MAX)
            .put_u32(INDEX_OFFSET + 16, u32::MAX)
            .put_bytes(INDEX_OFFSET + 28, INDEX_SIGNATURE);
        Self {
            buffer,
            tag_count: 0,
        }
    }

    /// Append a tag record
    pub fn tag(mut self, class: &[u8; 4], id: u32, raw_offset: u32, size: u32) -> Self {
        let at = newer::TAG_TABLE + self.tag_count * 16;
        self.buffer
            .put_bytes(at, &stored_class(class))
            .put_u32(at + 4, id)
            .put_u32(at + 8, raw_offset)
            .put_u32(at + 12, size);
        self.tag_count += 1;
        self.buffer
            .put_u32(716, self.tag_count)
            .put_u32(INDEX_OFFSET + 24, self.tag_count);
        self
    }

    /// Set the scenario identifier in the index header
    pub fn scenario_id(mut self, id: u32) -> Self {
        self.buffer.put_u32(INDEX_OFFSET + 12, id);
        self
    }

    /// Overwrite the scenario path
    pub fn scenario_path(mut self, path: &str) -> Self {
        self.buffer.put_bytes(456, &[0; 80]).put_bytes(456, path.as_bytes());
        self
    }

    /// Write a `u32` anywhere
    pub fn with_u32(mut self, offset: u32, value: u32) -> Self {
        self.buffer.put_u32(offset, value);
        self
    }

    /// Raw access for multi-field writes
    pub fn buffer_mut(&mut self) -> &mut FixtureBuffer {
        &mut self.buffer
    }

    /// Finished archive bytes
    pub fn build(self) -> Vec<u8> {
        self.buffer.into_bytes()
    }
}

/// Builder for V1/V2 archives
#[derive(Debug, Clone)]
pub struct OlderMapBuilder {
    buffer: FixtureBuffer,
    tag_count: u32,
    tag_table: u32,
}

impl OlderMapBuilder {
    /// Header and index header for a V1 (`version_field` 5) or V2 (7) archive
    pub fn new(version_field: u32) -> Self {
        let index_size = if version_field == VERSION_FIELD_V1 { 36 } else { 40 };
        let tag_table = INDEX_OFFSET + index_size;
        let constant = older::PRIMARY_MAGIC + tag_table;

        let mut buffer = FixtureBuffer::zeroed(older::FILE_SIZE);
        buffer
            .put_bytes(0, HEADER_SIGNATURE)
            .put_u32(4, version_field)
            .put_u32(8, older::FILE_SIZE)
            .put_u32(16, INDEX_OFFSET)
            .put_u32(20, INDEX_OFFSET)
            .put_u32(24, older::FILE_SIZE - INDEX_OFFSET)
            .put_bytes(408, b"beavercreek")
            .put_bytes(444, b"levels\\test\\beavercreek\\beavercreek")
            .put_bytes(2044, FOOTER_SIGNATURE)
            .put_u32(INDEX_OFFSET, constant)
            .put_u32(INDEX_OFFSET + 4, constant);
        Self {
            buffer,
            tag_count: 0,
            tag_table,
        }
    }

    /// Append a tag record; `offset` is the stored (uncorrected) value
    pub fn tag(
        mut self,
        class: &[u8; 4],
        id: u32,
        name_pointer: u32,
        offset: u32,
        indexed: bool,
    ) -> Self {
        let at = self.tag_table + self.tag_count * 32;
        self.buffer
            .put_bytes(at, &stored_class(class))
            .put_u32(at + 4, id)
            .put_u32(at + 8, name_pointer)
            .put_u32(at + 12, offset)
            .put_u32(at + 16, u32::from(indexed));
        self.tag_count += 1;
        self.buffer.put_u32(704, self.tag_count);
        self
    }

    /// Write a NUL-terminated string at an absolute offset
    pub fn string(mut self, offset: u32, text: &str) -> Self {
        self.buffer.put_bytes(offset, text.as_bytes());
        self.buffer.put_bytes(offset + text.len() as u32, &[0]);
        self
    }

    /// Write a `u32` anywhere
    pub fn with_u32(mut self, offset: u32, value: u32) -> Self {
        self.buffer.put_u32(offset, value);
        self
    }

    /// Finished archive bytes
    pub fn build(self) -> Vec<u8> {
        self.buffer.into_bytes()
    }
}

/// Identifiers used by [`lightmap_map`]
pub mod lightmap_ids {
    /// Scenario tag
    pub const SCENARIO: u32 = 0xE174_000A;
    /// Structure BSP tag
    pub const BSP: u32 = 0xE174_000B;
    /// Lightmap tag
    pub const LIGHTMAP: u32 = 0xE174_000C;
    /// Lightmap bitmap tag
    pub const BITMAP: u32 = 0xE174_000D;
}

/// Absolute offset of the BSP lightmap identifier in [`lightmap_map`]
pub const LIGHTMAP_ID_SLOT: u32 = 0x141C;

/// V3 archive with one scenario, one BSP and a full lightmap chain
///
/// Tags: scenario at 0x1000, BSP block at 0x2000 (0x1000 bytes), lightmap
/// header at 0x2400 with two palettes, three visual chunks, one scenery
/// chunk and a bitmap reference. With `broken` the BSP's lightmap pointer is
/// zero.
pub fn lightmap_map(broken: bool) -> Vec<u8> {
    use lightmap_ids::{BITMAP, BSP, LIGHTMAP, SCENARIO};

    let base = newer::BSP_BASE;
    let mut builder = NewerMapBuilder::new()
        .scenario_id(SCENARIO)
        .tag(class::SCENARIO, SCENARIO, 0x0010_0000, 0x400)
        .tag(class::STRUCTURE_BSP, BSP, 0x0010_1000, 0x1000)
        .tag(class::LIGHTMAP, LIGHTMAP, 0x0010_0800, 0x100)
        .tag(class::BITMAP, BITMAP, 0x0010_0900, 0x100);

    let buffer = builder.buffer_mut();
    // Scenario BSP descriptor: one entry at 0x1400
    buffer.put_u32(0x1210, 1).put_u32(0x1214, 0x0010_0400);
    buffer
        .put_u32(0x1400, 0x2000)
        .put_u32(0x1404, 0x1000)
        .put_u32(0x1408, base)
        .put_u32(0x1414, BSP)
        .put_u32(LIGHTMAP_ID_SLOT, LIGHTMAP);

    // BSP block header: lightmap pointer
    buffer.put_u32(0x2008, if broken { 0 } else { base + 0x400 });

    // Lightmap header at 0x2400
    buffer
        .put_u32(0x2408, 2)
        .put_u32(0x240C, base + 0x600)
        .put_u32(0x2428, 3)
        .put_u32(0x242C, base + 0xE00)
        .put_u32(0x2448, 1)
        .put_u32(0x244C, base + 0xE20)
        .put_u32(0x2480, BITMAP);

    // Second palette, first colour (B, G, R, A)
    buffer.put_bytes(0x2A00, &[0x11, 0x22, 0x33, 0xFF]);

    // Visual chunks (bitmap, lightmap)
    for (i, (bitmap, lightmap)) in [(0i16, 1i16), (1, -1), (2, 0)].into_iter().enumerate() {
        let at = 0x2E00 + i as u32 * 4;
        buffer.put_i16(at, bitmap).put_i16(at + 2, lightmap);
    }
    // Scenery chunk
    buffer.put_i16(0x2E20, 5).put_i16(0x2E22, 6);

    builder.build()
}

/// V2 archive with three tags and one BSP
///
/// Tags: scenario at 0x1000, BSP at 0x2000, bitmap at 0x3000; sizes are
/// inferred from the gaps (0x1000, 0x1000, 0x800). The BSP block's first
/// word points at structure data at 0x2010 whose bitmap id names the bitmap.
pub fn older_map() -> Vec<u8> {
    older_map_with_version(VERSION_FIELD_V2)
}

/// [`older_map`] with another first-generation version field
pub fn older_map_with_version(version_field: u32) -> Vec<u8> {
    let primary = older::PRIMARY_MAGIC;
    let base = older::BSP_BASE;
    OlderMapBuilder::new(version_field)
        .tag(class::SCENARIO, 0xE174_0000, primary + 0x900, primary + 0x1000, false)
        .tag(class::STRUCTURE_BSP, 0xE174_0001, primary + 0x940, primary + 0x2000, false)
        .tag(class::BITMAP, 0xE174_0002, 0, primary + 0x3000, false)
        .string(0x900, "levels\\test\\beavercreek\\beavercreek")
        .string(0x940, "levels\\test\\beavercreek\\beavercreek_bsp")
        // Scenario descriptor at scenario + 1444
        .with_u32(0x15A4, 1)
        .with_u32(0x15A8, primary + 0x1600)
        .with_u32(0x1600, 0x2000)
        .with_u32(0x1604, 0x1000)
        .with_u32(0x1608, base)
        .with_u32(0x161C, 0xE174_0001)
        // Structure pointer and bitmap id
        .with_u32(0x2000, base + 0x10)
        .with_u32(0x201C, 0xE174_0002)
        .build()
}

/// Write archives into a fresh temporary directory
pub fn temp_maps_dir(files: &[(&str, &[u8])]) -> std::io::Result<tempfile::TempDir> {
    let dir = tempfile::tempdir()?;
    for (name, bytes) in files {
        std::fs::write(dir.path().join(name), bytes)?;
    }
    Ok(dir)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_newer_builder_counts() {
        let bytes = NewerMapBuilder::new()
            .tag(class::SCENARIO, 1, 0x0010_0000, 0x10)
            .tag(class::BITMAP, 2, 0x0010_0100, 0x10)
            .build();
        let buffer = FixtureBuffer { data: bytes };
        assert_eq!(buffer.u32_at(716), 2);
        assert_eq!(buffer.u32_at(INDEX_OFFSET + 24), 2);
        assert_eq!(&buffer.as_bytes()[0x820..0x824], b"rncs");
    }

    #[test]
    fn test_lightmap_slot_holds_identifier() {
        let buffer = FixtureBuffer {
            data: lightmap_map(true),
        };
        assert_eq!(buffer.u32_at(LIGHTMAP_ID_SLOT), lightmap_ids::LIGHTMAP);
        assert_eq!(buffer.u32_at(0x2008), 0);
    }
}
