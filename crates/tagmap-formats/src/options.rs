//! Decode limits and switches

use serde::{Deserialize, Serialize};

/// Options controlling a decode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeOptions {
    /// Fail instead of warning when the header signature is missing
    pub strict_signature: bool,

    /// Maximum accepted tag count
    pub max_tag_count: u32,

    /// Maximum accepted BSP descriptor count
    pub max_bsp_count: u32,

    /// Maximum palettes per lightmap
    pub max_palette_count: u32,

    /// Maximum entries per lightmap chunk table
    pub max_chunk_count: u32,

    /// Follow lightmap chains when decoding BSP entries
    pub decode_lightmaps: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            strict_signature: false,
            max_tag_count: 65_536,
            max_bsp_count: 512,
            max_palette_count: 256,
            max_chunk_count: 65_536,
            decode_lightmaps: true,
        }
    }
}

impl DecodeOptions {
    /// Require the header signature
    #[must_use]
    pub const fn with_strict_signature(mut self, strict: bool) -> Self {
        self.strict_signature = strict;
        self
    }

    /// Set the maximum tag count
    #[must_use]
    pub const fn with_max_tag_count(mut self, max: u32) -> Self {
        self.max_tag_count = max;
        self
    }

    /// Set the maximum BSP count
    #[must_use]
    pub const fn with_max_bsp_count(mut self, max: u32) -> Self {
        self.max_bsp_count = max;
        self
    }

    /// Set the maximum palette count per lightmap
    #[must_use]
    pub const fn with_max_palette_count(mut self, max: u32) -> Self {
        self.max_palette_count = max;
        self
    }

    /// Set the maximum entry count per chunk table
    #[must_use]
    pub const fn with_max_chunk_count(mut self, max: u32) -> Self {
        self.max_chunk_count = max;
        self
    }

    /// Enable or disable lightmap chain decoding
    #[must_use]
    pub const fn with_lightmaps(mut self, enable: bool) -> Self {
        self.decode_lightmaps = enable;
        self
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let options: DecodeOptions =
            serde_json::from_str(r#"{ "strict_signature": true, "max_bsp_count": 8 }"#)
                .expect("Test operation should succeed");
        assert!(options.strict_signature);
        assert_eq!(options.max_bsp_count, 8);
        assert_eq!(options.max_tag_count, 65_536);
        assert!(options.decode_lightmaps);
    }

    #[test]
    fn test_builders() {
        let options = DecodeOptions::default()
            .with_strict_signature(true)
            .with_max_tag_count(10)
            .with_max_palette_count(4)
            .with_max_chunk_count(16)
            .with_lightmaps(false);
        assert!(options.strict_signature);
        assert_eq!(options.max_tag_count, 10);
        assert_eq!(options.max_palette_count, 4);
        assert_eq!(options.max_chunk_count, 16);
        assert!(!options.decode_lightmaps);
    }
}
