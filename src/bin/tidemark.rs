use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tidemark::{
    Compositor, ImageRecord, RenderOutcome, WatermarkSpec,
    batch::process_all,
    compositor::encode_png,
    package::export_archive,
};

#[derive(Parser, Debug)]
#[command(name = "tidemark", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Watermark a single image and write it as a PNG.
    Apply(ApplyArgs),
    /// Watermark a directory of images and write a zip archive.
    Batch(BatchArgs),
}

#[derive(Parser, Debug)]
struct ApplyArgs {
    /// Input image.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Watermark spec JSON.
    #[arg(long)]
    spec: PathBuf,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct BatchArgs {
    /// Input directory, walked recursively.
    #[arg(long = "in")]
    in_dir: PathBuf,

    /// Watermark spec JSON.
    #[arg(long)]
    spec: PathBuf,

    /// Output zip path.
    #[arg(long)]
    out: PathBuf,
}

const RASTER_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "webp"];

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Apply(args) => cmd_apply(args),
        Command::Batch(args) => cmd_batch(args),
    }
}

fn read_spec_json(path: &Path) -> anyhow::Result<WatermarkSpec> {
    let f = File::open(path).with_context(|| format!("open spec '{}'", path.display()))?;
    let r = BufReader::new(f);
    let spec: WatermarkSpec = serde_json::from_reader(r).with_context(|| "parse spec JSON")?;
    spec.validate()?;
    Ok(spec)
}

/// Builds a compositor, loading the watermark image named by the spec.
/// Relative image paths resolve against the spec file's directory.
fn make_compositor(spec: &WatermarkSpec, spec_path: &Path) -> anyhow::Result<Compositor> {
    let mut compositor = Compositor::new();
    if let Some(image) = &spec.image {
        let root = spec_path.parent().unwrap_or_else(|| Path::new("."));
        let path = root.join(image);
        let bytes = std::fs::read(&path)
            .with_context(|| format!("read watermark image '{}'", path.display()))?;
        compositor.watermark.replace(bytes);
    }
    Ok(compositor)
}

fn cmd_apply(args: ApplyArgs) -> anyhow::Result<()> {
    let spec = read_spec_json(&args.spec)?;
    let mut compositor = make_compositor(&spec, &args.spec)?;

    let bytes = std::fs::read(&args.in_path)
        .with_context(|| format!("read image '{}'", args.in_path.display()))?;
    let base = tidemark::assets::decode_image(&bytes)
        .with_context(|| format!("decode image '{}'", args.in_path.display()))?;

    let out_bytes = match compositor.render(&base, &spec)? {
        RenderOutcome::Composited(frame) => encode_png(&frame)?,
        RenderOutcome::Unchanged => bytes,
    };

    if let Some(parent) = args.out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    std::fs::write(&args.out, out_bytes)
        .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_batch(args: BatchArgs) -> anyhow::Result<()> {
    let spec = read_spec_json(&args.spec)?;
    let mut compositor = make_compositor(&spec, &args.spec)?;

    let mut records = collect_records(&args.in_dir)?;
    if records.is_empty() {
        anyhow::bail!("no images found under '{}'", args.in_dir.display());
    }
    eprintln!("processing {} images", records.len());

    process_all(&mut records, &spec, &mut compositor, |p| {
        eprint!("\r{:3.0}%", p * 100.0);
    });
    eprintln!();

    let archive = export_archive(&records)?;

    if let Some(parent) = args.out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    std::fs::write(&args.out, archive)
        .with_context(|| format!("write archive '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

/// Walks `root` recursively and imports every raster image, keyed by its
/// path relative to `root`. Entries are sorted for a stable archive order.
fn collect_records(root: &Path) -> anyhow::Result<Vec<ImageRecord>> {
    let mut paths = Vec::new();
    walk(root, &mut paths)
        .with_context(|| format!("walk input dir '{}'", root.display()))?;
    paths.sort();

    let mut records = Vec::with_capacity(paths.len());
    for path in paths {
        let rel = path
            .strip_prefix(root)
            .unwrap_or(&path)
            .to_string_lossy()
            .into_owned();
        let bytes =
            std::fs::read(&path).with_context(|| format!("read image '{}'", path.display()))?;
        records.push(ImageRecord::import(rel.clone(), rel, bytes));
    }
    Ok(records)
}

fn walk(dir: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            walk(&path, out)?;
        } else if is_raster(&path) {
            out.push(path);
        }
    }
    Ok(())
}

fn is_raster(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| RASTER_EXTENSIONS.iter().any(|r| e.eq_ignore_ascii_case(r)))
}
