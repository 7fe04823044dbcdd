use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use pixelio::{ByteStore as _, FsStore};

#[derive(Parser, Debug)]
#[command(name = "pixelio", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Alpha-blend an rgba overlay image onto a background image.
    Composite(CompositeArgs),
    /// Print container metadata for a video file as JSON (requires `ffprobe` on PATH).
    Probe(ProbeArgs),
    /// Extract the audio track from a video file (requires `ffmpeg` on PATH).
    ExtractAudio(ExtractAudioArgs),
}

#[derive(Parser, Debug)]
struct CompositeArgs {
    /// Background image path.
    #[arg(long)]
    background: PathBuf,

    /// Overlay image path (must decode with an alpha channel).
    #[arg(long)]
    overlay: PathBuf,

    /// Canvas x coordinate of the overlay's top-left corner (may be negative).
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    x: i64,

    /// Canvas y coordinate of the overlay's top-left corner (may be negative).
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    y: i64,

    /// Output image path; the format is inferred from the extension.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct ProbeArgs {
    /// Input video path.
    #[arg(long = "in")]
    in_path: PathBuf,
}

#[derive(Parser, Debug)]
struct ExtractAudioArgs {
    /// Input video path.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output path for the remuxed audio clip.
    #[arg(long)]
    out: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Composite(args) => cmd_composite(args),
        Command::Probe(args) => cmd_probe(args),
        Command::ExtractAudio(args) => cmd_extract_audio(args),
    }
}

fn cmd_composite(args: CompositeArgs) -> anyhow::Result<()> {
    let background = pixelio::read_image(&FsStore, &args.background)
        .with_context(|| format!("read background '{}'", args.background.display()))?;
    let fg = pixelio::read_image(&FsStore, &args.overlay)
        .with_context(|| format!("read overlay '{}'", args.overlay.display()))?;

    let composed = pixelio::overlay(background, &fg, args.x, args.y)?;

    let format = format_for_path(&args.out)?;
    pixelio::write_image(&FsStore, &args.out, &composed, format)
        .with_context(|| format!("write '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_probe(args: ProbeArgs) -> anyhow::Result<()> {
    let meta = pixelio::probe_video(&args.in_path)?;
    println!("{}", serde_json::to_string_pretty(&meta)?);
    Ok(())
}

fn cmd_extract_audio(args: ExtractAudioArgs) -> anyhow::Result<()> {
    let bytes = FsStore.read(&args.in_path)?;
    let clip = pixelio::extract_audio(&bytes)?;

    if let Some(parent) = args.out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    std::fs::copy(clip.path(), &args.out)
        .with_context(|| format!("copy audio clip to '{}'", args.out.display()))?;

    eprintln!(
        "wrote {} ({:.3}s)",
        args.out.display(),
        clip.duration_sec()
    );
    Ok(())
}

fn format_for_path(path: &Path) -> anyhow::Result<image::ImageFormat> {
    image::ImageFormat::from_path(path)
        .with_context(|| format!("unsupported output extension for '{}'", path.display()))
}
