//! Command line export: one JSON scene in, renderer nodes out as JSON.
//!
//! Run with: cargo run --bin strix -- scene.json [--config config.json] [--out nodes.json]

use std::env;
use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use serde::Serialize;
use strix_core::output::RecordedGroup;
use strix_core::{export_frame, ExportConfig, ExportContext, ExportStats, RecordingSink, Scene};

struct Args {
    scene: PathBuf,
    config: Option<PathBuf>,
    out: Option<PathBuf>,
}

fn parse_args() -> Result<Args> {
    let mut args = env::args().skip(1);
    let mut scene = None;
    let mut config = None;
    let mut out = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => config = Some(args.next().context("--config needs a path")?.into()),
            "--out" => out = Some(args.next().context("--out needs a path")?.into()),
            flag if flag.starts_with("--") => bail!("unknown option {}", flag),
            path if scene.is_none() => scene = Some(PathBuf::from(path)),
            extra => bail!("unexpected argument {}", extra),
        }
    }

    Ok(Args {
        scene: scene.context("Usage: strix <scene.json> [--config config.json] [--out nodes.json]")?,
        config,
        out,
    })
}

#[derive(Serialize)]
struct Report<'a> {
    frame: f64,
    stats: &'a ExportStats,
    groups: Vec<RecordedGroup<'a>>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let args = parse_args()?;

    let config = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            ExportConfig::from_json(&text)
                .with_context(|| format!("Failed to parse config {}", path.display()))?
        }
        None => ExportConfig::default(),
    };

    let text = fs::read_to_string(&args.scene)
        .with_context(|| format!("Failed to read scene {}", args.scene.display()))?;
    let scene = Scene::from_json(&text)
        .with_context(|| format!("Failed to load scene {}", args.scene.display()))?;
    log::info!(
        "Loaded scene '{}' with {} objects",
        scene.name,
        scene.object_count()
    );

    let frame = config.frame;
    let mut ctx = ExportContext::new(config);
    let mut sink = RecordingSink::new();
    let stats = export_frame(&mut ctx, &scene, &mut sink).context("Export failed")?;

    println!("Objects exported: {}", stats.objects_exported);
    println!("Objects failed:   {}", stats.objects_failed);
    println!("Strands:          {}", stats.strands);
    println!("Nodes:            {}", stats.nodes);
    println!(
        "Masters:          {} computed, {} reused",
        stats.cache_computations, stats.cache_hits
    );
    if stats.motion_blur_downgrades > 0 {
        println!("Motion blur downgraded on {} objects", stats.motion_blur_downgrades);
    }

    if let Some(out) = &args.out {
        let report = Report {
            frame,
            stats: &stats,
            groups: sink.groups(),
        };
        let json = serde_json::to_string_pretty(&report).context("Failed to serialize nodes")?;
        fs::write(out, json).with_context(|| format!("Failed to write {}", out.display()))?;
        log::info!("Wrote {} nodes to {}", sink.live_count(), out.display());
    }

    Ok(())
}
