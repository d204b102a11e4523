use assetserve::config::{self, AssetServerConfig};
use assetserve::serve::{AssetPipeline, ServeRequest, mime_from_extension};
use assetserve::upload::AssetUpload;
use clap::{Parser, Subcommand};
use rayon::prelude::*;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "assetserve")]
#[command(about = "Asset storage with on-demand image transforms")]
#[command(long_about = "\
Asset storage with on-demand image transforms

Imports files into a sharded local store (generating previews as it goes)
and serves size/crop variants of stored images, caching each generated
variant next to its source.

Examples:

  assetserve import photos/                 # ingest a directory tree
  assetserve import cat.jpg dog.png         # ingest individual files
  assetserve get source/3f/cat.jpg \\
      --query 'w=150&h=150&mode=crop' -o thumb.jpg
  assetserve gen-config > assetserve.toml   # documented stock config")]
#[command(version)]
struct Cli {
    /// Config file (defaults apply when absent)
    #[arg(long, default_value = "assetserve.toml", global = true)]
    config: PathBuf,

    /// Override the configured upload directory
    #[arg(long, global = true)]
    upload_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Store files (or directory trees) and generate their previews
    Import {
        /// Files or directories to ingest
        paths: Vec<PathBuf>,
    },
    /// Serve one request against the local store
    Get {
        /// Stored asset path, e.g. source/3f/photo.jpg
        path: String,
        /// Transform query string, e.g. 'w=150&h=150&mode=crop'
        #[arg(long, short, default_value = "")]
        query: String,
        /// Write the payload here instead of describing it
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Print a stock assetserve.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "assetserve=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = if cli.config.exists() {
        AssetServerConfig::load(&cli.config)?
    } else {
        AssetServerConfig::default()
    };
    if let Some(dir) = cli.upload_dir {
        config.upload_dir = dir;
    }

    match cli.command {
        Command::Import { paths } => {
            let pipeline = AssetPipeline::new(&config)?;
            let files = collect_files(&paths)?;
            if files.is_empty() {
                eprintln!("nothing to import");
                return Ok(());
            }

            let results: Vec<_> = files
                .par_iter()
                .map(|path| (path, import_file(&pipeline, path)))
                .collect();

            let mut failures = 0;
            for (path, result) in results {
                match result {
                    Ok(json) => println!("{json}"),
                    Err(err) => {
                        failures += 1;
                        eprintln!("{}: {err}", path.display());
                    }
                }
            }
            if failures > 0 {
                return Err(format!("{failures} import(s) failed").into());
            }
        }
        Command::Get {
            path,
            query,
            output,
        } => {
            let pipeline = AssetPipeline::new(&config)?;
            let request = ServeRequest::from_query_str(path, &query);
            match pipeline.serve(&request) {
                Ok(response) => match output {
                    Some(out) => {
                        std::fs::write(&out, &response.bytes)?;
                        println!(
                            "{} ({} bytes, {})",
                            out.display(),
                            response.bytes.len(),
                            response.content_type
                        );
                    }
                    None => println!(
                        "{} bytes, {} (pass --output to save)",
                        response.bytes.len(),
                        response.content_type
                    ),
                },
                Err(err) => return Err(format!("{} ({})", err, err.status()).into()),
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Expand the argument list: files stay, directories are walked.
fn collect_files(paths: &[PathBuf]) -> Result<Vec<PathBuf>, std::io::Error> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            for entry in walkdir::WalkDir::new(path) {
                let entry = entry?;
                if entry.file_type().is_file() {
                    files.push(entry.into_path());
                }
            }
        } else {
            files.push(path.clone());
        }
    }
    Ok(files)
}

/// Ingest one file and render its descriptor as a JSON line.
///
/// The error type is `Send + Sync` so results can cross rayon's worker
/// threads.
fn import_file(
    pipeline: &AssetPipeline,
    path: &Path,
) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
    let bytes = std::fs::read(path)?;
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or("path has no usable filename")?
        .to_string();
    let mime_type = guess_mime(path).to_string();

    let descriptor = pipeline.create_asset(AssetUpload {
        filename,
        mime_type,
        bytes,
    })?;
    Ok(serde_json::to_string(&descriptor)?)
}

/// Extension-based mime guess for imports; the serving pipeline sniffs
/// content where this falls short.
fn guess_mime(path: &Path) -> &'static str {
    let name = path.to_str().unwrap_or_default();
    if let Some(mime) = mime_from_extension(name) {
        return mime;
    }
    match name.rsplit('.').next().map(str::to_ascii_lowercase).as_deref() {
        Some("pdf") => "application/pdf",
        Some("mp4") => "video/mp4",
        Some("webm") => "video/webm",
        Some("txt") => "text/plain",
        _ => "application/octet-stream",
    }
}
