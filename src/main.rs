use clap::Parser;
use env_logger::{Builder, Target};
use log::{LevelFilter, debug, error, info, warn};
use rayon::ThreadPoolBuilder;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use fileforge::session::LongMedia;
use fileforge::transcoders::video::VideoQuality;
use fileforge::{BatchEvent, BatchOutcome, Config, ConvertError, Converter, Session, SourceFile, catalog};

#[derive(Parser, Debug)]
#[clap(author, version, about = "A file converter for images, documents, audio and video", long_about = None)]
struct CliArgs {
    /// input files to convert
    #[arg(value_name = "FILE", required_unless_present = "list_formats")]
    inputs: Vec<PathBuf>,

    /// target extension for every input
    /// if not specified, each file goes to the first format it can be converted to
    #[arg(short = 't', long = "to", value_name = "EXT")]
    to: Option<String>,

    /// directory converted files are written to
    #[arg(short, long, value_name = "DIR", default_value = ".")]
    out_dir: PathBuf,

    /// image encoder quality between 0 and 1
    /// JPEG and WebP output honor it
    #[arg(long, value_name = "Q")]
    quality: Option<f32>,

    /// MP3 bitrate in kbps, snapped to the nearest standard rate
    #[arg(long, value_name = "KBPS")]
    bitrate: Option<u32>,

    /// quality preset for video encoding
    #[arg(long, value_enum)]
    video_quality: Option<VideoQuality>,

    /// number of threads for the image and sample pipelines and the video engine
    /// defaults to the number of logical CPU cores
    #[arg(long, value_name = "NUM")]
    threads: Option<usize>,

    /// convert long audio and video without asking
    #[arg(short, long)]
    yes: bool,

    /// TOML file with converter settings; flags override it
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// print every supported source format and what it converts to
    #[arg(long)]
    list_formats: bool,

    /// increasing verbosity of logging
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<(), ConvertError> {
    let cli = CliArgs::parse();

    // configuring logging based on level of verbosity
    let log_level = match cli.verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    Builder::new()
        .filter_level(log_level)
        .target(Target::Stdout)
        .init();

    if cli.list_formats {
        print_catalog();
        return Ok(());
    }

    let config = load_config(&cli)?;

    let num_threads = cli.threads.unwrap_or_else(num_cpus::get);
    if num_threads > 0 {
        match ThreadPoolBuilder::new().num_threads(num_threads).build_global() {
            Ok(_) => debug!("Rayon thread pool configured with {} threads", num_threads),
            Err(e) => warn!("Failed to configure Rayon thread pool: {}. Rayon will use default threading", e),
        }
    }

    info!("File converter started");

    let converter = Arc::new(Converter::new(config));
    let mut session = Session::new(converter);

    let mut sources = Vec::with_capacity(cli.inputs.len());
    for path in &cli.inputs {
        match SourceFile::open(path).await {
            Ok(source) => sources.push(source),
            Err(e) => error!("Skipping {:?}: {}", path, e),
        }
    }

    let admission = session.add_files(sources);
    for (name, reason) in &admission.rejected {
        warn!("{}: {}", name, reason);
    }
    if admission.admitted.is_empty() {
        return Err(ConvertError::Argument("No convertible input files".to_string()));
    }

    if let Some(target) = &cli.to {
        for &id in &admission.admitted {
            if let Err(e) = session.set_target(id, target) {
                let fallback = session.file(id).map(|f| f.target().to_string()).unwrap_or_default();
                warn!("{}; converting to '{}' instead", e, fallback);
            }
        }
    }

    for file in session.files() {
        info!(
            "{} ({}, {}) -> {}",
            file.name(),
            file.category(),
            Converter::format_file_size(file.source().size()),
            file.target()
        );
    }

    let events = session.subscribe();
    let printer = tokio::spawn(print_events(events, session_names(&session)));

    let summary = match session.convert_all().await {
        BatchOutcome::Finished(summary) => summary,
        BatchOutcome::NeedsConfirmation(long_files) => {
            if cli.yes || confirm(&long_files).await? {
                session.convert_all_confirmed().await
            } else {
                printer.abort();
                info!("Conversion cancelled");
                return Ok(());
            }
        }
    };
    printer.await?;

    let saved = session.download_all(&cli.out_dir).await?;
    for path in &saved {
        info!("Saved {}", path.display());
    }

    if summary.failed > 0 {
        error!("{} of {} file(s) failed to convert", summary.failed, summary.completed + summary.failed);
    } else {
        info!("All {} file(s) converted successfully!", summary.completed);
    }

    info!("File converter finished");
    Ok(())
}

fn load_config(cli: &CliArgs) -> Result<Config, ConvertError> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };

    if let Some(quality) = cli.quality {
        if !(0.0..=1.0).contains(&quality) {
            return Err(ConvertError::Argument(format!("Quality must be between 0 and 1, got {}", quality)));
        }
        config.image.quality = quality;
    }
    if let Some(bitrate) = cli.bitrate {
        config.audio.bitrate_kbps = bitrate;
    }
    if let Some(video_quality) = cli.video_quality {
        config.video.quality = video_quality;
    }
    if cli.threads.is_some() {
        config.video.threads = cli.threads;
    }

    Ok(config)
}

fn session_names(session: &Session) -> Vec<(uuid::Uuid, String)> {
    session.files().iter().map(|f| (f.id(), f.name().to_string())).collect()
}

async fn print_events(
    mut events: tokio::sync::mpsc::UnboundedReceiver<BatchEvent>,
    names: Vec<(uuid::Uuid, String)>,
) {
    let name_of = |id: uuid::Uuid| {
        names.iter().find(|(known, _)| *known == id).map(|(_, name)| name.as_str()).unwrap_or("?")
    };

    while let Some(event) = events.recv().await {
        match event {
            BatchEvent::FileStarted { id } => info!("Converting {}", name_of(id)),
            BatchEvent::FileProgress { id, percent } => debug!("{}: {:.0}%", name_of(id), percent),
            BatchEvent::FileCompleted { id, filename } => info!("{} -> {}", name_of(id), filename),
            BatchEvent::FileFailed { id, message } => error!("{}: {}", name_of(id), message),
            BatchEvent::Overall { percent } => info!("Overall progress: {:.0}%", percent),
            BatchEvent::Finished(_) => break,
        }
    }
}

async fn confirm(long_files: &[LongMedia]) -> Result<bool, ConvertError> {
    let mut stdout = tokio::io::stdout();
    let mut prompt = String::from("These files are long and may take a while to convert:\n");
    for file in long_files {
        prompt.push_str(&format!("  {} ({})\n", file.name, Converter::format_duration(file.duration_secs)));
    }
    prompt.push_str("Continue? [y/N] ");
    stdout.write_all(prompt.as_bytes()).await?;
    stdout.flush().await?;

    let mut answer = String::new();
    BufReader::new(tokio::io::stdin()).read_line(&mut answer).await?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

fn print_catalog() {
    for info in catalog::supported_formats() {
        println!(
            "{:<5} {:<9} {:<6} -> {:<32} {}",
            info.extension,
            info.name,
            info.category.as_str(),
            info.convert_to.join(", "),
            info.description
        );
    }
}
