//! Decode pipeline: header, magics, tag index, BSP section
//!
//! ```text
//! Unopened -> HeaderRead -> MagicsCalibrated -> TagIndexBuilt -> BspDecoded -> Closed
//!                 ^                                   |
//!                 +---------- sentinel fallback ------+   (at most once)
//! ```
//!
//! The decoder owns its stream for the whole pass and drops it on every exit
//! path.

use crate::bsp::{BrokenLightmap, BspEntry, BspSection};
use crate::context::DecodeContext;
use crate::error::{DecodeWarning, MapError, Result, VersionFallback};
use crate::header::MapHeader;
use crate::magic::{IndexHeader, Magics, calibrate};
use crate::observer::{DecodeObserver, TracingObserver};
use crate::options::DecodeOptions;
use crate::pointer::ExternalSource;
use crate::tags::{BitmapLibrary, TagDecodeOutcome, TagIndex, TagLocation};
use crate::version::MapVersion;
use std::io::{Cursor, Read, Seek};

/// Pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeState {
    /// Nothing read yet
    Unopened,
    /// Header decoded
    HeaderRead,
    /// Magics derived and tag table geometry validated
    MagicsCalibrated,
    /// Tag index decoded, or a fallback requested
    TagIndexBuilt,
    /// BSP section decoded
    BspDecoded,
    /// Stream released
    Closed,
}

impl DecodeState {
    /// Whether the pipeline may move from `self` to `next`
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Unopened | Self::TagIndexBuilt, Self::HeaderRead)
                | (Self::HeaderRead, Self::MagicsCalibrated)
                | (Self::MagicsCalibrated, Self::TagIndexBuilt)
                | (Self::TagIndexBuilt, Self::BspDecoded)
                | (Self::BspDecoded, Self::Closed)
        )
    }
}

/// Fully decoded archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedMap {
    /// Effective version, after any fallback
    pub version: MapVersion,
    /// Archive header
    pub header: MapHeader,
    /// Index header
    pub index_header: IndexHeader,
    /// Pointer correction constants
    pub magics: Magics,
    /// Tag table
    pub tags: TagIndex,
    /// Tag index of the scenario
    pub scenario_tag_index: usize,
    /// BSP descriptors in scenario order
    pub bsps: Vec<BspEntry>,
    /// Recoverable conditions, in the order they were found
    pub warnings: Vec<DecodeWarning>,
    /// Set when the sentinel identifier switched versions
    pub fallback: Option<VersionFallback>,
}

impl DecodedMap {
    /// Location of one tag
    pub fn tag_location(&self, index: usize) -> Option<TagLocation> {
        self.tags.get(index).map(crate::tags::TagEntry::location)
    }

    /// Location of every tag, in table order
    pub fn locations(&self) -> impl Iterator<Item = TagLocation> + '_ {
        self.tags.entries().iter().map(crate::tags::TagEntry::location)
    }

    /// Broken lightmap references that can be repaired
    pub fn broken_lightmaps(&self) -> impl Iterator<Item = &BrokenLightmap> {
        self.bsps.iter().filter_map(|b| b.broken_lightmap.as_ref())
    }

    /// Companion archives referenced by tags or BSP blocks
    pub fn external_sources(&self) -> Vec<ExternalSource> {
        let mut sources = self.tags.external_sources();
        for bsp in &self.bsps {
            if bsp.source.is_external() && !sources.contains(&bsp.source) {
                sources.push(bsp.source);
            }
        }
        sources
    }
}

/// Single-pass archive decoder
///
/// ```no_run
/// use tagmap_formats::{MapDecoder, MapVersion, NullObserver};
///
/// let file = std::fs::File::open("zanzibar.map")?;
/// let map = MapDecoder::new(std::io::BufReader::new(file), MapVersion::V3)
///     .with_observer(NullObserver)
///     .decode()?;
/// println!("{} tags", map.tags.len());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct MapDecoder<'a, R> {
    stream: R,
    version: MapVersion,
    options: DecodeOptions,
    observer: Box<dyn DecodeObserver + 'a>,
    library: Option<&'a dyn BitmapLibrary>,
}

impl<'a, R: Read + Seek> MapDecoder<'a, R> {
    /// Create a decoder for a known version
    pub fn new(stream: R, version: MapVersion) -> Self {
        Self {
            stream,
            version,
            options: DecodeOptions::default(),
            observer: Box::new(TracingObserver),
            library: None,
        }
    }

    /// Create a decoder, detecting the version from the header
    pub fn detect(mut stream: R) -> Result<Self> {
        let version = MapVersion::detect(&mut stream)?;
        Ok(Self::new(stream, version))
    }

    /// Set decode options
    #[must_use]
    pub fn with_options(mut self, options: DecodeOptions) -> Self {
        self.options = options;
        self
    }

    /// Replace the default `tracing` observer
    #[must_use]
    pub fn with_observer<O: DecodeObserver + 'a>(mut self, observer: O) -> Self {
        self.observer = Box::new(observer);
        self
    }

    /// Resolve V2 bitmap-library entries through `library`
    #[must_use]
    pub fn with_bitmap_library(mut self, library: &'a dyn BitmapLibrary) -> Self {
        self.library = Some(library);
        self
    }

    /// Version the decode starts with
    pub const fn version(&self) -> MapVersion {
        self.version
    }

    /// Run the pipeline, consuming the decoder and its stream
    ///
    /// Warnings found by a pass that ends in a fallback reach the observer
    /// at debug level only and are not part of the result.
    pub fn decode(self) -> Result<DecodedMap> {
        let Self {
            stream,
            version,
            options,
            observer,
            library,
        } = self;
        let mut ctx = DecodeContext::new(&options, observer.as_ref());
        let result = run(stream, version, library, &mut ctx);
        ctx.release_warnings();
        result
    }
}

impl<R> std::fmt::Debug for MapDecoder<'_, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapDecoder")
            .field("version", &self.version)
            .field("options", &self.options)
            .field("has_library", &self.library.is_some())
            .finish_non_exhaustive()
    }
}

fn run<R: Read + Seek>(
    mut stream: R,
    mut version: MapVersion,
    library: Option<&dyn BitmapLibrary>,
    ctx: &mut DecodeContext<'_>,
) -> Result<DecodedMap> {
    let mut state = DecodeState::Unopened;
    let mut fallback: Option<VersionFallback> = None;

    loop {
        if fallback.is_none() && version.sentinel_fallback().is_some() {
            ctx.hold_warnings();
        }
        advance(ctx, &mut state, DecodeState::HeaderRead);
        let header = MapHeader::read(&mut stream, version, ctx)?;
        let index_header = IndexHeader::read(&mut stream, &header, version)?;
        if !index_header.signature_valid {
            ctx.debug("map", "index header signature missing");
        }

        let limit = fallback.map(|f| u32::try_from(f.at_index).unwrap_or(u32::MAX));
        let calibration =
            calibrate(&mut stream, &header, &index_header, version, limit, ctx)?;
        advance(ctx, &mut state, DecodeState::MagicsCalibrated);

        let outcome = TagIndex::read(
            &mut stream,
            &header,
            &index_header,
            &calibration,
            version,
            library,
            ctx,
        )?;
        advance(ctx, &mut state, DecodeState::TagIndexBuilt);

        let tags = match outcome {
            TagDecodeOutcome::Complete(tags) => {
                ctx.release_warnings();
                tags
            }
            TagDecodeOutcome::Fallback { to, at_index } if fallback.is_none() => {
                fallback = Some(VersionFallback {
                    from: version,
                    to,
                    at_index,
                });
                ctx.discard_warnings();
                version = to;
                continue;
            }
            TagDecodeOutcome::Fallback { .. } => {
                return Err(MapError::UnsupportedVersion(header.version_field));
            }
        };

        let section = BspSection::read(
            &mut stream,
            &index_header,
            &tags,
            &calibration.magics,
            version,
            ctx,
        )?;
        advance(ctx, &mut state, DecodeState::BspDecoded);

        drop(stream);
        advance(ctx, &mut state, DecodeState::Closed);

        ctx.info(
            "map",
            &format!(
                "decoded '{}' as {version}: {} tags, {} bsps, {} warnings",
                header.map_name,
                tags.len(),
                section.entries.len(),
                ctx.warnings().len()
            ),
        );

        return Ok(DecodedMap {
            version,
            header,
            index_header,
            magics: calibration.magics,
            tags,
            scenario_tag_index: section.scenario_tag_index,
            bsps: section.entries,
            warnings: ctx.take_warnings(),
            fallback,
        });
    }
}

fn advance(ctx: &DecodeContext<'_>, state: &mut DecodeState, next: DecodeState) {
    debug_assert!(
        state.can_transition_to(next),
        "invalid transition {state:?} -> {next:?}"
    );
    ctx.debug("map", &format!("{state:?} -> {next:?}"));
    *state = next;
}

/// Decode an in-memory archive
pub fn decode_bytes(bytes: &[u8], version: MapVersion) -> Result<DecodedMap> {
    MapDecoder::new(Cursor::new(bytes), version).decode()
}

/// Decode an in-memory archive with explicit options and observer
pub fn decode_bytes_with<O: DecodeObserver>(
    bytes: &[u8],
    version: MapVersion,
    options: DecodeOptions,
    observer: O,
) -> Result<DecodedMap> {
    MapDecoder::new(Cursor::new(bytes), version)
        .with_options(options)
        .with_observer(observer)
        .decode()
}
