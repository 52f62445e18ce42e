use clap::{Parser, Subcommand};
use compressor::cache::CacheDir;
use compressor::compress::{
    self, Compression, CompressError, DefaultConstraint, SizeConstraint,
};
use compressor::config::{self, CompressorConfig};
use compressor::content::{self, FileContentResolver};
use compressor::imaging::{
    self, CompressFormat, ImageBackend, Quality, RustBackend, rotation_for_exif,
};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;
use walkdir::WalkDir;

/// Extensions picked up when an input is a directory.
const INPUT_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];

/// Constraint flags for the `compress` command.
#[derive(clap::Args, Clone)]
struct ConstraintArgs {
    /// Downsample until no power-of-two reduction still covers WIDTH
    #[arg(long, requires = "height")]
    width: Option<u32>,

    /// Downsample until no power-of-two reduction still covers HEIGHT
    #[arg(long, requires = "width")]
    height: Option<u32>,

    /// Re-encode as jpeg, png or webp (the extension follows)
    #[arg(long)]
    format: Option<CompressFormat>,

    /// Encoding quality, 0-100
    #[arg(long, value_parser = clap::value_parser!(u32).range(0..=100))]
    quality: Option<u32>,

    /// Lower quality step by step until the file is at most this many bytes
    #[arg(long)]
    max_size: Option<u64>,

    /// Directory the compressed files are written to
    #[arg(long, default_value = "compressed")]
    destination: PathBuf,
}

#[derive(Parser)]
#[command(name = "compressor")]
#[command(about = "Shrink photos: bounded decoding, EXIF rotation, re-encoding")]
#[command(long_about = "\
Shrink photos: bounded decoding, EXIF rotation, re-encoding

Every input is first copied into the cache directory; the copy is what
gets compressed, and the result is written to --destination. Inputs are
never modified.

Constraints are applied in this order: resolution (--width/--height),
format, quality, size (--max-size). With none given, the [defaults]
section of compressor.toml applies: 612x816, jpeg, quality 80.

Inputs may be files, directories (jpg/jpeg/png/webp inside are picked
up recursively), or file:// URIs. Files found in a directory keep their
path below it, so photos/2023/a.png lands in <destination>/photos/2023/.
Two inputs that would produce the same output file are an error.

Run 'compressor gen-config' to print a documented compressor.toml.")]
#[command(version)]
struct Cli {
    /// Config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Root for working copies (overrides cache_dir in the config file)
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compress images into the destination directory
    Compress {
        /// Files, directories or file:// URIs
        #[arg(required = true)]
        inputs: Vec<String>,

        #[command(flatten)]
        constraints: ConstraintArgs,
    },
    /// Print dimensions, inferred format and EXIF orientation as JSON
    Identify {
        input: PathBuf,
    },
    /// Delete the cache directory
    CleanCache,
    /// Print a stock compressor.toml with all options documented
    GenConfig,
}

/// One thing to compress.
enum Source {
    File(PathBuf),
    Uri(Url),
}

/// A source plus the path its result takes under `--destination`.
///
/// Files found by walking a directory keep their path below that
/// directory (prefixed by the directory's own name), so same-named files
/// in sibling folders stay apart in the cache and in the output.
struct Input {
    source: Source,
    relative: PathBuf,
}

impl Input {
    fn label(&self) -> String {
        match &self.source {
            Source::File(path) => path.display().to_string(),
            Source::Uri(uri) => uri.to_string(),
        }
    }
}

#[derive(Serialize)]
struct IdentifyOutput {
    path: PathBuf,
    width: u32,
    height: u32,
    format: Option<CompressFormat>,
    orientation: u32,
    rotation_degrees: u16,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = load_config(cli.config.as_deref())?;
    let cache = match cli.cache_dir.as_ref().or(config.cache_dir.as_ref()) {
        Some(root) => CacheDir::new(root),
        None => CacheDir::system_default(),
    };

    match cli.command {
        Command::Compress {
            inputs,
            constraints,
        } => {
            let inputs = expand_inputs(&inputs)?;
            init_thread_pool(&config.processing);
            let backend = RustBackend::new();
            let resolver = FileContentResolver::new();

            let results: Vec<(String, Result<PathBuf, CompressError>)> = inputs
                .par_iter()
                .map(|input| {
                    let result =
                        compress_one(&backend, &cache, &resolver, input, &constraints, &config);
                    (input.label(), result)
                })
                .collect();

            let mut failed = 0;
            for (label, result) in results {
                match result {
                    Ok(path) => {
                        let size = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
                        println!("{} → {} ({} bytes)", label, path.display(), size);
                    }
                    Err(e) => {
                        failed += 1;
                        eprintln!("{}: {}", label, e);
                    }
                }
            }
            if failed > 0 {
                return Err(format!("{failed} input(s) failed").into());
            }
        }
        Command::Identify { input } => {
            let backend = RustBackend::new();
            let dims = imaging::get_dimensions(&backend, &input)?;
            let orientation = backend.read_orientation(&input);
            let output = IdentifyOutput {
                width: dims.width,
                height: dims.height,
                format: imaging::compress_format(&input),
                orientation,
                rotation_degrees: rotation_for_exif(orientation).degrees(),
                path: input,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Command::CleanCache => {
            cache.clear()?;
            println!("Removed {}", cache.path().display());
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "compressor=debug"
    } else {
        "compressor=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Load the config file. An explicitly named file must exist; the default
/// `compressor.toml` in the working directory is optional.
fn load_config(path: Option<&Path>) -> Result<CompressorConfig, Box<dyn std::error::Error>> {
    match path {
        Some(path) if !path.exists() => {
            Err(format!("config file not found: {}", path.display()).into())
        }
        Some(path) => Ok(config::load_config(path)?),
        None => Ok(config::load_config(Path::new(config::CONFIG_FILENAME))?),
    }
}

/// Initialize the rayon thread pool based on processing config.
///
/// Capped at the number of available cores.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}

/// Turn command-line inputs into files and URIs, walking directories.
///
/// Fails when two inputs would produce the same output file. Outputs are
/// compared without their extension because a format change renames them.
fn expand_inputs(raw: &[String]) -> Result<Vec<Input>, Box<dyn std::error::Error>> {
    let mut inputs = Vec::new();
    for item in raw {
        if let Ok(uri) = content::parse_uri(item)
            && uri.scheme() == "file"
        {
            let relative = uri
                .to_file_path()
                .ok()
                .and_then(|path| path.file_name().map(PathBuf::from))
                .ok_or_else(|| format!("not a local file URI: {uri}"))?;
            inputs.push(Input {
                source: Source::Uri(uri),
                relative,
            });
            continue;
        }
        let path = PathBuf::from(item);
        if path.is_dir() {
            let base = path.file_name().map(PathBuf::from).unwrap_or_default();
            for entry in WalkDir::new(&path).sort_by_file_name() {
                let entry = entry?;
                if entry.file_type().is_file() && has_input_extension(entry.path()) {
                    let relative = base.join(entry.path().strip_prefix(&path)?);
                    inputs.push(Input {
                        source: Source::File(entry.into_path()),
                        relative,
                    });
                }
            }
        } else {
            let relative = path
                .file_name()
                .map(PathBuf::from)
                .ok_or_else(|| format!("not a file: {}", path.display()))?;
            inputs.push(Input {
                source: Source::File(path),
                relative,
            });
        }
    }
    reject_output_collisions(&inputs)?;
    Ok(inputs)
}

fn reject_output_collisions(inputs: &[Input]) -> Result<(), Box<dyn std::error::Error>> {
    let mut seen: HashMap<PathBuf, &Input> = HashMap::new();
    for input in inputs {
        if let Some(previous) = seen.insert(input.relative.with_extension(""), input) {
            return Err(format!(
                "{} and {} would both be written as {}",
                previous.label(),
                input.label(),
                input.relative.with_extension("*").display()
            )
            .into());
        }
    }
    Ok(())
}

fn has_input_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| INPUT_EXTENSIONS.iter().any(|x| e.eq_ignore_ascii_case(x)))
}

/// Assemble the constraint list from flags, falling back to the configured
/// default constraint when no flag asks for anything.
fn build_compression(args: &ConstraintArgs, config: &CompressorConfig) -> Compression {
    let mut compression = Compression::new();
    if let (Some(width), Some(height)) = (args.width, args.height) {
        compression = compression.resolution(width, height);
    }
    if let Some(format) = args.format {
        compression = compression.format(format);
    }
    if let Some(quality) = args.quality {
        compression = compression.quality(Quality::new(quality));
    }
    if let Some(max_size) = args.max_size {
        compression = compression.constraint(SizeConstraint::from_config(max_size, &config.size));
    }
    if compression.is_empty() {
        compression = compression.constraint(DefaultConstraint::from_config(&config.defaults));
    }
    compression
}

fn compress_one(
    backend: &RustBackend,
    cache: &CacheDir,
    resolver: &FileContentResolver,
    input: &Input,
    args: &ConstraintArgs,
    config: &CompressorConfig,
) -> Result<PathBuf, CompressError> {
    let compression = build_compression(args, config);
    let compressed = match &input.source {
        Source::File(path) => {
            compress::compress_as(backend, cache, path, &input.relative, compression)?
        }
        Source::Uri(uri) => compress::compress_uri(backend, cache, resolver, uri, compression)?,
    };

    let Some(name) = compressed.file_name() else {
        return Ok(compressed);
    };
    Compression::new()
        .destination(args.destination.join(input.relative.with_file_name(name)))
        .run(backend, compressed)
}
