use clap::{ArgAction, Parser, Subcommand};
use picture_cache::config::{self, BuildConfig};
use picture_cache::generated::{Generator, VariantRequest};
use picture_cache::imaging::RustBackend;
use picture_cache::{output, process};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

fn version_string() -> &'static str {
    let hash = env!("GIT_HASH");
    if hash.is_empty() {
        env!("CARGO_PKG_VERSION")
    } else {
        // Leaked once at startup
        Box::leak(format!("{}@{}", env!("CARGO_PKG_VERSION"), hash).into_boxed_str())
    }
}

#[derive(Parser)]
#[command(name = "picture-cache")]
#[command(about = "Generate responsive image variants, skipping the ones that already exist")]
#[command(long_about = "\
Generate responsive image variants, skipping the ones that already exist

Every variant is named after everything that affects its pixels:

  {source-name}-{width}-{id}.{format}
  photos/dawn-800-e391bf5cd.webp

where id is a hash of the source content, crop, gravity and quality. If a
file with that name exists it is current, so repeated builds only encode
what changed. Source and cropped dimensions are remembered in the cache
directory so they never need a second decode.

Run 'picture-cache gen-config' to generate a documented picture-cache.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Config file (missing file = stock defaults)
    #[arg(long, default_value = config::CONFIG_FILENAME, global = true)]
    config: PathBuf,

    /// Increase verbosity (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args)]
struct GenerateArgs {
    /// Source images, relative to --source
    #[arg(required = true)]
    images: Vec<String>,

    /// Directory the image names are relative to
    #[arg(long, default_value = ".")]
    source: PathBuf,

    /// Override the configured destination directory
    #[arg(long)]
    dest: Option<PathBuf>,

    /// Target widths in pixels
    #[arg(long, value_delimiter = ',', default_value = "400,800,1600")]
    widths: Vec<u32>,

    /// Output formats; "original" keeps the source format
    #[arg(long, value_delimiter = ',', default_value = "webp,original")]
    formats: Vec<String>,

    /// Crop geometry: WxH, WxH+X+Y, W%xH% or W:H
    #[arg(long)]
    crop: Option<String>,

    /// Crop anchor (north, southeast, center, ...)
    #[arg(long, default_value = "")]
    gravity: String,

    /// Accept any existing file with a matching name without hashing sources
    #[arg(long)]
    fast_build: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Generate every width × format variant of the given images
    Generate(GenerateArgs),
    /// Print a stock picture-cache.toml with all options documented
    GenConfig,
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Generate(args) => {
            let mut config = config::load_config(&cli.config)?;
            debug!(config = %cli.config.display(), "loaded config");
            if args.fast_build {
                config.fast_build = true;
            }
            if let Some(dest) = args.dest {
                config.dest_dir = dest;
            }
            init_thread_pool(&config);

            let requests = variant_requests(
                &args.widths,
                &args.formats,
                args.crop.as_deref(),
                &args.gravity,
            );
            let generator = Generator::new(config, RustBackend::new());

            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    output::print_process_event(&event);
                }
            });
            let result = process::process(
                &generator,
                &args.source,
                &args.images,
                &requests,
                Some(tx),
            );
            printer.join().map_err(|_| "progress printer panicked")?;
            output::print_summary(&result?.stats);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Every width × format combination, sharing one crop.
fn variant_requests(
    widths: &[u32],
    formats: &[String],
    crop: Option<&str>,
    gravity: &str,
) -> Vec<VariantRequest> {
    widths
        .iter()
        .flat_map(|&width| {
            formats.iter().map(move |format| VariantRequest {
                width,
                format: format.clone(),
                crop: crop.map(str::to_string),
                gravity: gravity.to_string(),
            })
        })
        .collect()
}

/// 0 = warn, 1 = info, 2+ = debug. `RUST_LOG` wins when set.
fn init_tracing(verbose: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match verbose {
        0 => EnvFilter::new("picture_cache=warn"),
        1 => EnvFilter::new("picture_cache=info"),
        _ => EnvFilter::new("picture_cache=debug"),
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores: users can constrain down, not up.
fn init_thread_pool(config: &BuildConfig) {
    let threads = config::effective_threads(&config.processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
