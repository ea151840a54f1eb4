//! Tag identifiers, classes and table entries

use crate::pointer::ExternalSource;

/// Tag identifier as stored in the tag table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TagId(pub u32);

impl TagId {
    /// All-ones identifier: null reference, and the table sentinel
    pub const SENTINEL: Self = Self(u32::MAX);

    /// Wrap a stored value, mapping the all-ones value to `None`
    pub const fn non_null(value: u32) -> Option<Self> {
        if value == u32::MAX {
            None
        } else {
            Some(Self(value))
        }
    }

    /// Whether this is the all-ones identifier
    pub const fn is_null(self) -> bool {
        self.0 == u32::MAX
    }
}

impl std::fmt::Display for TagId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

/// Four-character tag class code in reading order (`scnr`, `bitm`, ...)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TagClass(pub [u8; 4]);

impl TagClass {
    /// Scenario
    pub const SCENARIO: Self = Self(*b"scnr");
    /// Structure BSP
    pub const STRUCTURE_BSP: Self = Self(*b"sbsp");
    /// Lightmap
    pub const LIGHTMAP: Self = Self(*b"ltmp");
    /// Bitmap
    pub const BITMAP: Self = Self(*b"bitm");
    /// Globals
    pub const GLOBALS: Self = Self(*b"matg");
    /// Unused class slot in the class hierarchy table
    pub const NONE: Self = Self(*b"\xff\xff\xff\xff");

    /// Build from the byte-reversed stored form
    pub const fn from_stored(stored: [u8; 4]) -> Self {
        Self([stored[3], stored[2], stored[1], stored[0]])
    }

    /// Byte-reversed stored form
    pub const fn to_stored(self) -> [u8; 4] {
        let [a, b, c, d] = self.0;
        [d, c, b, a]
    }

    /// Class code as text, `????` when it is not UTF-8
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.0).unwrap_or("????")
    }
}

impl std::fmt::Display for TagClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One record of the tag table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagEntry {
    /// Tag class
    pub tag_class: TagClass,
    /// Unique identifier
    pub identifier: TagId,
    /// Offset as stored
    pub raw_offset: u32,
    /// Corrected offset, in the archive named by `source`
    pub file_offset: u32,
    /// Data size in bytes
    pub size: u32,
    /// Archive holding the data
    pub source: ExternalSource,
    /// Tag path (V1/V2 only)
    pub name: Option<String>,
}

impl TagEntry {
    /// Whether the data lives in another archive
    pub const fn is_external(&self) -> bool {
        self.source.is_external()
    }

    /// Whether this is an empty record with no data
    pub const fn is_placeholder(&self) -> bool {
        self.raw_offset == 0 && !self.is_external()
    }

    /// Byte range handed to content decoders
    pub fn location(&self) -> TagLocation {
        TagLocation {
            tag_class: self.tag_class,
            identifier: self.identifier,
            file_offset: self.file_offset,
            size: self.size,
            source: self.source,
        }
    }
}

/// Where a tag's bytes live
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagLocation {
    /// Tag class
    pub tag_class: TagClass,
    /// Tag identifier
    pub identifier: TagId,
    /// Offset within the archive named by `source`
    pub file_offset: u32,
    /// Data size in bytes
    pub size: u32,
    /// Archive holding the bytes
    pub source: ExternalSource,
}

/// One record of the tag class hierarchy table (V3/V4)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagClassInfo {
    /// Class
    pub class: TagClass,
    /// Parent class, if any
    pub parent: Option<TagClass>,
    /// Grandparent class, if any
    pub grandparent: Option<TagClass>,
}
