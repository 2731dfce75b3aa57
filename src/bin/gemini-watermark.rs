use std::path::{Path, PathBuf};
use std::process;

use clap::{Args, Parser, Subcommand, ValueEnum};
use image::Rgba;
use tracing_subscriber::EnvFilter;

use gemini_watermark_remover::blending::draw_outline;
use gemini_watermark_remover::capture::extract_capture;
use gemini_watermark_remover::geometry;
use gemini_watermark_remover::{
    default_output_path, is_supported_image, save_image, AlphaStrategy, BatchProgress,
    EntryStatus, ImageSource, ProcessingQueue, QueueEntry, QueueObserver, QueueOptions,
    RemovalOptions, WatermarkEngine, WatermarkProvider,
};

#[derive(Parser)]
#[command(
    name = "gemini-watermark",
    about = "Remove the visible Gemini corner watermark",
    version,
    after_help = "Simple usage: gemini-watermark remove <image>  (writes <name>_no_watermark.<ext>)\n\n\
                  NOTE: This tool only removes the VISIBLE Gemini watermark (star/sparkle logo).\n\
                  It cannot remove SynthID (invisible watermark)."
)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all non-error output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Remove the watermark from an image or every image in a directory
    Remove(RemoveArgs),
    /// Crop the watermark region from a sample to build a reference capture
    Extract(ExtractArgs),
}

#[derive(Args)]
struct RemoveArgs {
    /// Input image file or directory
    input: PathBuf,

    /// Output file or directory (default: {name}_no_watermark.{ext})
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Directory holding bg_48.png and bg_96.png reference captures
    #[arg(short, long, default_value = "assets")]
    captures: PathBuf,

    /// Opacity estimation strategy
    #[arg(long, value_enum, default_value_t = Strategy::Direct)]
    strategy: Strategy,

    /// Watermark provider, selects the reference capture set
    #[arg(long, value_enum, default_value_t = Provider::Unknown)]
    provider: Provider,

    /// Draw a red outline around the processed region
    #[arg(long)]
    debug_outline: bool,
}

#[derive(Args)]
struct ExtractArgs {
    /// Watermarked sample image
    input: PathBuf,

    /// Output capture file
    #[arg(short, long)]
    output: PathBuf,
}

#[derive(Clone, Copy, ValueEnum)]
enum Strategy {
    /// Damped brightness of the watermarked region
    Direct,
    /// Cached alpha map from the reference captures
    Reference,
}

#[derive(Clone, Copy, ValueEnum)]
enum Provider {
    Gemini,
    NanoBanana,
    Unknown,
}

impl From<Strategy> for AlphaStrategy {
    fn from(s: Strategy) -> Self {
        match s {
            Strategy::Direct => AlphaStrategy::Direct,
            Strategy::Reference => AlphaStrategy::ReferenceCapture,
        }
    }
}

impl From<Provider> for WatermarkProvider {
    fn from(p: Provider) -> Self {
        match p {
            Provider::Gemini => WatermarkProvider::Gemini,
            Provider::NanoBanana => WatermarkProvider::NanoBanana,
            Provider::Unknown => WatermarkProvider::Unknown,
        }
    }
}

/// Prints one line per finished entry.
struct Reporter {
    quiet: bool,
    verbose: bool,
}

impl QueueObserver for Reporter {
    fn entry_changed(&self, _index: usize, entry: &QueueEntry, progress: &BatchProgress) {
        match entry.status() {
            EntryStatus::Success if !self.quiet => {
                eprint!("[OK] {}", entry.name());
                if self.verbose {
                    if let Some(info) = entry.watermark_info() {
                        eprint!(
                            " ({}x{} at {},{})",
                            info.rect.width, info.rect.height, info.rect.x, info.rect.y
                        );
                    }
                }
                eprintln!(" [{}%]", progress.percentage);
            }
            EntryStatus::Failed => {
                eprintln!("[FAIL] {}: {}", entry.name(), entry.error().unwrap_or("unknown error"));
            }
            _ => {}
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let code = match &cli.command {
        Commands::Remove(args) => run_remove(args, cli.verbose, cli.quiet),
        Commands::Extract(args) => run_extract(args, cli.quiet),
    };
    process::exit(code);
}

fn collect_inputs(input: &Path) -> Vec<PathBuf> {
    if !input.is_dir() {
        return vec![input.to_path_buf()];
    }
    let mut paths: Vec<PathBuf> = match std::fs::read_dir(input) {
        Ok(rd) => rd
            .filter_map(std::result::Result::ok)
            .filter(|e| e.file_type().map(|ft| ft.is_file()).unwrap_or(false))
            .map(|e| e.path())
            .filter(|p| is_supported_image(p))
            .collect(),
        Err(e) => {
            eprintln!("Error: Failed to read directory: {e}");
            process::exit(1);
        }
    };
    paths.sort();
    paths
}

/// Names of offered sources that never made it into the queue.
fn rejected_names<'a>(offered: &'a [String], entries: &[QueueEntry]) -> Vec<&'a str> {
    offered
        .iter()
        .filter(|name| !entries.iter().any(|e| e.name() == name.as_str()))
        .map(String::as_str)
        .collect()
}

fn run_remove(args: &RemoveArgs, verbose: bool, quiet: bool) -> i32 {
    if !args.input.exists() {
        eprintln!("Error: Input path does not exist: {}", args.input.display());
        return 1;
    }
    let is_dir = args.input.is_dir();
    if is_dir && args.output.is_none() {
        eprintln!("Error: Output directory is required for batch processing");
        eprintln!("Usage: gemini-watermark remove <input_dir> -o <output_dir>");
        return 1;
    }

    let engine = match WatermarkEngine::from_dir(&args.captures) {
        Ok(e) => e,
        Err(e) => {
            eprintln!("Fatal: Failed to initialize engine: {e}");
            return 1;
        }
    };
    let engine = engine.with_options(RemovalOptions {
        strategy: args.strategy.into(),
        provider: args.provider.into(),
        debug_outline: args.debug_outline,
    });

    let mut read_failures = 0usize;
    let sources: Vec<ImageSource> = collect_inputs(&args.input)
        .into_iter()
        .filter_map(|path| match ImageSource::from_path(&path) {
            Ok(source) => Some(source),
            Err(e) => {
                eprintln!("[FAIL] {}: {e}", path.display());
                read_failures += 1;
                None
            }
        })
        .collect();
    let offered: Vec<String> = sources.iter().map(|s| s.name.clone()).collect();

    let mut queue = ProcessingQueue::new(engine)
        .with_options(QueueOptions {
            auto_process: false,
            ..QueueOptions::default()
        })
        .with_observer(Reporter { quiet, verbose });

    let accepted = queue.enqueue(sources);
    let skipped = offered.len() - accepted;
    for name in rejected_names(&offered, queue.entries()) {
        eprintln!("[FAIL] {name}: not a decodable image");
    }
    queue.run_batch();

    let mut write_failures = 0usize;
    if is_dir {
        let output_dir = args.output.as_deref().unwrap_or(Path::new("."));
        if let Err(e) = queue.write_results(output_dir) {
            eprintln!("Error: Failed to write results: {e}");
            write_failures += 1;
        }
    } else if let Some(result) = queue.entry(0).and_then(QueueEntry::result) {
        let output = args
            .output
            .clone()
            .unwrap_or_else(|| default_output_path(&args.input));
        match save_image(result, &output) {
            Ok(()) if !quiet => eprintln!("Saved {}", output.display()),
            Ok(()) => {}
            Err(e) => {
                eprintln!("[FAIL] {}: Failed to save: {e}", output.display());
                write_failures += 1;
            }
        }
    }

    let progress = queue.progress();
    if progress.total + skipped > 1 && !quiet {
        eprintln!();
        eprint!("[Summary] Processed: {}", progress.success);
        if skipped > 0 {
            eprint!(", Skipped: {skipped}");
        }
        if progress.failed > 0 {
            eprint!(", Failed: {}", progress.failed);
        }
        eprintln!(" (Total: {})", progress.total + skipped);
    }

    if progress.failed + skipped + read_failures + write_failures > 0 {
        1
    } else {
        0
    }
}

fn run_extract(args: &ExtractArgs, quiet: bool) -> i32 {
    let img = match image::open(&args.input) {
        Ok(img) => img.to_rgba8(),
        Err(e) => {
            eprintln!("Error: Failed to load {}: {e}", args.input.display());
            return 1;
        }
    };

    let (width, height) = img.dimensions();
    let config = geometry::resolve(width, height, WatermarkProvider::Unknown);
    let rect = match geometry::compute_rect(width, height, &config) {
        Ok(rect) => rect,
        Err(e) => {
            eprintln!("Error: {e}");
            return 1;
        }
    };

    let capture = match extract_capture(&img, &config) {
        Ok(capture) => capture,
        Err(e) => {
            eprintln!("Error: {e}");
            return 1;
        }
    };
    if let Err(e) = capture.save(&args.output) {
        eprintln!("Error: Failed to save {}: {e}", args.output.display());
        return 1;
    }

    let mut debug_img = img;
    draw_outline(&mut debug_img, rect, Rgba([255, 0, 0, 255]), 3);
    let stem = args.output.file_stem().unwrap_or_default().to_string_lossy();
    let debug_path = args.output.with_file_name(format!("{stem}_debug.png"));
    if let Err(e) = debug_img.save(&debug_path) {
        eprintln!("Error: Failed to save {}: {e}", debug_path.display());
        return 1;
    }

    if !quiet {
        eprintln!("Image size: {width}x{height}");
        eprintln!(
            "Watermark: {size}x{size} at ({x}, {y}), margins right={mr}px bottom={mb}px",
            size = config.logo_size(),
            x = rect.x,
            y = rect.y,
            mr = config.margin_right,
            mb = config.margin_bottom,
        );
        eprintln!("Saved capture to {}", args.output.display());
        eprintln!("Saved debug image to {}", debug_path.display());
    }
    0
}
