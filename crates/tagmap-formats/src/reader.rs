//! Absolute-seek read helpers
//!
//! Every field in a map is addressed by absolute offset, so each helper
//! seeks before reading and reports a short read as [`MapError::Truncated`].

use crate::error::{MapError, Result};
use binrw::meta::ReadEndian;
use binrw::{BinRead, BinReaderExt};
use std::io::{Read, Seek, SeekFrom};

/// Total length of the stream in bytes
pub fn stream_len<R: Seek>(reader: &mut R) -> Result<u64> {
    Ok(reader.seek(SeekFrom::End(0))?)
}

/// Read a little-endian `u32` at an absolute offset
pub fn read_u32_at<R: Read + Seek>(reader: &mut R, offset: u64) -> Result<u32> {
    reader.seek(SeekFrom::Start(offset))?;
    reader
        .read_le::<u32>()
        .map_err(|e| MapError::from_binrw(e, offset, 4))
}

/// Read `len` raw bytes at an absolute offset
pub fn read_bytes_at<R: Read + Seek>(reader: &mut R, offset: u64, len: usize) -> Result<Vec<u8>> {
    reader.seek(SeekFrom::Start(offset))?;
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            MapError::Truncated {
                offset,
                len: len as u64,
            }
        } else {
            MapError::Io(e)
        }
    })?;
    Ok(buf)
}

/// Read four bytes at an absolute offset in stored order
pub fn read_array4_at<R: Read + Seek>(reader: &mut R, offset: u64) -> Result<[u8; 4]> {
    let bytes = read_bytes_at(reader, offset, 4)?;
    Ok([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// Read a fixed-width text field, cut at the first NUL and trimmed
pub fn read_fixed_string_at<R: Read + Seek>(
    reader: &mut R,
    offset: u64,
    width: usize,
) -> Result<String> {
    let bytes = read_bytes_at(reader, offset, width)?;
    Ok(decode_text(&bytes))
}

/// Read a NUL-terminated string of at most `max` bytes
///
/// Returns `None` when no terminator is found before `max` bytes or the end
/// of the stream.
pub fn read_c_string_at<R: Read + Seek>(
    reader: &mut R,
    offset: u64,
    max: usize,
) -> Result<Option<String>> {
    let available = stream_len(reader)?.saturating_sub(offset);
    let len = max.min(usize::try_from(available).unwrap_or(max));
    if len == 0 {
        return Ok(None);
    }
    let bytes = read_bytes_at(reader, offset, len)?;
    Ok(bytes
        .iter()
        .position(|&b| b == 0)
        .map(|end| decode_text(&bytes[..end])))
}

/// Read a fixed-layout record at an absolute offset
pub fn read_record_at<R, T>(reader: &mut R, offset: u64, len: u64) -> Result<T>
where
    R: Read + Seek,
    T: for<'a> BinRead<Args<'a> = ()> + ReadEndian,
{
    reader.seek(SeekFrom::Start(offset))?;
    T::read_args(reader, ()).map_err(|e| MapError::from_binrw(e, offset, len))
}

/// Check that `count` records of `stride` bytes at `offset` fit in the stream
pub fn check_table_bounds(
    table: &'static str,
    offset: u64,
    count: u32,
    stride: u32,
    stream_len: u64,
) -> Result<()> {
    let needed = u64::from(count) * u64::from(stride);
    if offset.saturating_add(needed) > stream_len {
        return Err(MapError::TableOverrun {
            table,
            offset,
            count,
            needed,
            stream_len,
        });
    }
    Ok(())
}

fn decode_text(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).trim().to_string()
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_read_u32_at_is_absolute() {
        let mut cursor = Cursor::new(vec![0, 0, 0, 0, 0x78, 0x56, 0x34, 0x12]);
        assert_eq!(read_u32_at(&mut cursor, 4).expect("read"), 0x1234_5678);
        // Position left elsewhere does not matter
        assert_eq!(read_u32_at(&mut cursor, 0).expect("read"), 0);
    }

    #[test]
    fn test_short_read_is_truncated() {
        let mut cursor = Cursor::new(vec![0u8; 6]);
        assert!(matches!(
            read_u32_at(&mut cursor, 4),
            Err(MapError::Truncated { offset: 4, len: 4 })
        ));
        assert!(matches!(
            read_bytes_at(&mut cursor, 100, 8),
            Err(MapError::Truncated { offset: 100, len: 8 })
        ));
    }

    #[test]
    fn test_fixed_string_trims() {
        let mut data = b"  test_map ".to_vec();
        data.extend_from_slice(&[0, b'x', b'y']);
        let mut cursor = Cursor::new(data);
        let text = read_fixed_string_at(&mut cursor, 0, 14).expect("read");
        assert_eq!(text, "test_map");
    }

    #[test]
    fn test_c_string() {
        let mut cursor = Cursor::new(b"xxweapons\\rifle\0tail".to_vec());
        assert_eq!(
            read_c_string_at(&mut cursor, 2, 64).expect("read"),
            Some("weapons\\rifle".to_string())
        );
        // No terminator within range
        assert_eq!(read_c_string_at(&mut cursor, 16, 64).expect("read"), None);
        // Past the end
        assert_eq!(read_c_string_at(&mut cursor, 400, 64).expect("read"), None);
    }

    #[test]
    fn test_table_bounds() {
        assert!(check_table_bounds("tag", 0x100, 4, 16, 0x140).is_ok());
        assert!(matches!(
            check_table_bounds("tag", 0x100, 5, 16, 0x140),
            Err(MapError::TableOverrun { needed: 80, .. })
        ));
    }
}
