use clap::{Parser, Subcommand};
use imgbundle::imaging::PreferredFormat;
use imgbundle::validate::UploadedImage;
use imgbundle::{config, logging, pipeline, server};
use std::io::Write;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "imgbundle")]
#[command(about = "Turn one image into a zip of renditions plus metadata")]
#[command(long_about = "\
Turn one image into a zip of renditions plus metadata

Accepts JPEG, PNG or WEBP and produces:

  thumb_256.<ext>      longest side at most 256 px, lightly sharpened
  medium_1024.<ext>    longest side at most 1024 px
  optimized.<ext>      original dimensions, re-encoded at maximum effort
  metadata.json        { \"width\", \"height\", \"exif\" } of the original

Images are never upscaled. Renditions are AVIF unless configured otherwise.

Run 'imgbundle gen-config' to generate a documented config file.")]
#[command(version = version_string())]
struct Cli {
    /// Config file (TOML). Stock defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP service
    Serve {
        /// Listen address, overrides [server] bind
        #[arg(long)]
        bind: Option<SocketAddr>,
    },
    /// Process one image file into a zip without starting the server
    Process {
        /// Image to process
        input: PathBuf,
        /// Where to write the zip ("-" for stdout). Defaults to
        /// <stem>-renditions.zip next to the input.
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Output encoding: avif, webp or original
        #[arg(long)]
        format: Option<PreferredFormat>,
    },
    /// Print a stock config file with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve { bind } => {
            let app_config = setup(cli.config.as_deref())?;
            let bind = bind.unwrap_or(app_config.server.bind);
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            runtime.block_on(server::serve(bind, app_config.pipeline))?;
        }
        Command::Process {
            input,
            output,
            format,
        } => {
            let app_config = setup(cli.config.as_deref())?;
            let pipeline_config = match format {
                Some(format) => app_config.pipeline.with_preferred_format(format),
                None => app_config.pipeline,
            };
            let mut upload = UploadedImage::new(std::fs::read(&input)?);
            upload.file_name = input
                .file_name()
                .map(|name| name.to_string_lossy().into_owned());

            let archive =
                pipeline::process_upload(&pipeline_config.codec(), &upload, &pipeline_config)?;

            match output {
                Some(path) if path == Path::new("-") => {
                    std::io::stdout().write_all(&archive.bytes)?;
                }
                Some(path) => write_archive(&path, &archive.bytes)?,
                None => {
                    let dir = input.parent().unwrap_or_else(|| Path::new("."));
                    write_archive(&dir.join(&archive.filename), &archive.bytes)?;
                }
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Load config, then install logging and the worker pool it describes.
fn setup(config_path: Option<&Path>) -> Result<config::AppConfig, Box<dyn std::error::Error>> {
    let app_config = config::load_config(config_path)?;
    logging::init_logging(&app_config.logging)?;
    init_thread_pool(&app_config.processing);
    Ok(app_config)
}

fn write_archive(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    std::fs::write(path, bytes)?;
    eprintln!("wrote {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores; users can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
