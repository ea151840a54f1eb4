//! Dump the header, tag table and BSP section of a map.
//!
//! Usage:
//!   cargo run --example dump_map -p tagmap-storage -- \
//!       --maps-dir /path/to/maps zanzibar.map --tags
//!
//! Set `RUST_LOG=tagmap_formats=debug` to follow the decode.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tagmap_storage::{MapSet, StorageConfig, repair_lightmap};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Dump a tag map archive")]
struct Args {
    /// Map file name inside the maps directory
    map: String,

    /// Directory holding the map and its companions
    #[arg(long, env = "TAGMAP_MAPS_DIR", default_value = "./maps")]
    maps_dir: PathBuf,

    /// JSON storage configuration; overrides --maps-dir
    #[arg(long)]
    config: Option<PathBuf>,

    /// List every tag with its resolved location
    #[arg(long)]
    tags: bool,

    /// Null out broken lightmap references in place
    #[arg(long)]
    repair: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tagmap_storage=info")),
        )
        .with_target(false)
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => StorageConfig::load(path)
            .with_context(|| format!("loading configuration {}", path.display()))?,
        None => StorageConfig::new(&args.maps_dir),
    };

    let set = MapSet::open(&config, &args.map).with_context(|| format!("opening {}", args.map))?;
    let map = set.decoded();

    println!("=== {} ===", set.primary().path().display());
    println!("Version:        {}", map.version);
    println!("Kind:           {:?}", map.header.archive_kind);
    println!("Name:           {}", map.header.map_name);
    println!("Scenario:       {}", map.header.scenario_path);
    println!("Tags:           {}", map.tags.len());
    println!("Primary magic:  {:#010x}", map.magics.primary);
    if let Some(secondary) = map.magics.secondary {
        println!("Second magic:   {secondary:#010x}");
    }
    if let Some(fallback) = map.fallback {
        println!(
            "Fallback:       {} -> {} at tag {}",
            fallback.from, fallback.to, fallback.at_index
        );
    }

    println!("\n=== BSPs (scenario tag {}) ===", map.scenario_tag_index);
    for (i, bsp) in map.bsps.iter().enumerate() {
        println!(
            "  [{i}] offset={:#x} size={:#x} magic={:#010x} source={} palettes={} visual_chunks={}",
            bsp.offset,
            bsp.size,
            bsp.local_magic,
            bsp.source,
            bsp.palettes.len(),
            bsp.visual_chunk_bitmap_index.len()
        );
    }

    if args.tags {
        println!("\n=== Tags ===");
        for (i, entry) in map.tags.entries().iter().enumerate() {
            match set.resolve(i) {
                Ok(location) => println!(
                    "  [{i:>5}] {} {} {:>10} offset={:#010x} size={:#x} {}",
                    location.tag_class,
                    location.identifier,
                    location.source,
                    location.file_offset,
                    location.size,
                    entry.name.as_deref().unwrap_or("")
                ),
                Err(err) => println!(
                    "  [{i:>5}] {} {} unresolved: {err}",
                    entry.tag_class, entry.identifier
                ),
            }
        }
    }

    if !map.warnings.is_empty() {
        println!("\n=== Warnings ===");
        for warning in &map.warnings {
            println!("  {warning}");
        }
    }

    if args.repair {
        let broken: Vec<_> = map.broken_lightmaps().copied().collect();
        let path = set.primary().path().to_path_buf();
        drop(set);
        for entry in &broken {
            repair_lightmap(&path, entry, |_| true)
                .with_context(|| format!("repairing bsp {}", entry.bsp_index))?;
        }
        println!("\nRepaired {} lightmap reference(s)", broken.len());
    }

    Ok(())
}
