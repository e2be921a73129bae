use clap::{ArgAction, Parser};
use image_scaler::config::{self, ConfigError, JobConfig, ScalerConfig, Source};
use image_scaler::fetch::{Fetch, HttpFetcher};
use image_scaler::imaging::RustBackend;
use image_scaler::process::Orchestrator;
use image_scaler::report::ExitStatus;
use image_scaler::resolve::{self, FetchEvent};
use image_scaler::{logging, output};
use std::path::PathBuf;
use std::process::ExitCode;

/// Exit code for errors that stop the run before any item is processed.
const FATAL_EXIT: u8 = 2;

#[derive(Parser)]
#[command(name = "image-scaler")]
#[command(version)]
#[command(about = "Resize images into thumbnail and full-size copies")]
#[command(long_about = "\
Resize images into thumbnail and full-size copies

Every source image produces two files with the same name and format:

  <thumb-out>/<name>   scaled to --thumb-width
  <full-out>/<name>    scaled to --full-width

Heights follow the original aspect ratio.

Sources (first one given wins):
  -i/--input-file   manifest, one path or URL per line (URLs fetched with --online)
  -d/--input-dir    every jpg, jpeg, png, bmp, gif and wbmp file (-r to recurse)
  FILES...          explicit paths

Exit status: 0 all images scaled, 1 some images or downloads failed,
2 nothing was processed (bad arguments, unreadable input).

Run 'image-scaler --print-config' for a documented scaler.toml.")]
struct Cli {
    /// Thumbnail width in pixels [default: 150]
    #[arg(short = 't', long, value_name = "PX")]
    thumb_width: Option<u32>,

    /// Full-size width in pixels [default: 400]
    #[arg(short = 'f', long, value_name = "PX")]
    full_width: Option<u32>,

    /// Output directory for thumbnails
    #[arg(long, value_name = "DIR", required_unless_present = "print_config")]
    thumb_out: Option<PathBuf>,

    /// Output directory for full-size images (must differ from --thumb-out)
    #[arg(long, value_name = "DIR", required_unless_present = "print_config")]
    full_out: Option<PathBuf>,

    /// Replace existing output files instead of keeping them
    #[arg(long)]
    overwrite: bool,

    /// Manifest file listing one path or URL per line
    #[arg(short = 'i', long, value_name = "FILE")]
    input_file: Option<PathBuf>,

    /// Download URL entries of the manifest into the staging directory
    #[arg(long)]
    online: bool,

    /// Directory to scan for images
    #[arg(short = 'd', long, value_name = "DIR")]
    input_dir: Option<PathBuf>,

    /// Descend into subdirectories of --input-dir
    #[arg(short = 'r', long)]
    recursive: bool,

    /// Maximum concurrent transforms [default: CPU cores]
    #[arg(short = 'j', long, value_name = "N")]
    jobs: Option<usize>,

    /// Settings file [default: ./scaler.toml if present]
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Write the full batch report as JSON
    #[arg(long, value_name = "FILE")]
    report: Option<PathBuf>,

    /// Emit diagnostics as JSON lines on stderr
    #[arg(long)]
    log_json: bool,

    /// More diagnostics on stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Print a stock scaler.toml with all options documented
    #[arg(long)]
    print_config: bool,

    /// Image files to scale
    files: Vec<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_tracing(cli.log_json, logging::level_for_verbosity(cli.verbose));

    if cli.print_config {
        print!("{}", config::stock_config_toml());
        return ExitCode::SUCCESS;
    }

    match run(cli) {
        Ok(status) => ExitCode::from(status.code()),
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(FATAL_EXIT)
        }
    }
}

fn run(cli: Cli) -> Result<ExitStatus, Box<dyn std::error::Error>> {
    let mut settings = config::load_settings(cli.config.as_deref())?;
    if let Some(jobs) = cli.jobs {
        settings.processing.max_workers = Some(jobs);
    }
    let job = build_job(&cli, &settings)?;
    job.validate()?;
    job.prepare_output_dirs()?;

    let fetcher = if job.needs_network() {
        Some(HttpFetcher::new(&settings.network)?)
    } else {
        None
    };
    let print_event = |event: FetchEvent| output::print_fetch_event(&event);
    let resolution = resolve::resolve(
        &job,
        fetcher.as_ref().map(|f| f as &dyn Fetch),
        Some(&print_event),
    )?;
    output::print_resolved(resolution.items.len());

    let orchestrator = Orchestrator::new(config::effective_workers(&settings.processing))?;
    let (tx, rx) = std::sync::mpsc::channel();
    let printer = std::thread::spawn(move || {
        for outcome in rx {
            output::print_outcome(&outcome);
        }
    });
    let report = orchestrator.run_resolved(&RustBackend::new(), &resolution, &job, Some(tx));
    printer.join().map_err(|_| "output thread panicked")?;
    let report = report?;

    if let Some(path) = &cli.report {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(path, json)?;
    }
    output::print_summary(&report);

    Ok(report.exit_status())
}

/// Combine CLI flags with settings. Flags win.
fn build_job(cli: &Cli, settings: &ScalerConfig) -> Result<JobConfig, ConfigError> {
    let thumb_dir = cli
        .thumb_out
        .clone()
        .ok_or_else(|| ConfigError::Validation("--thumb-out is required".into()))?;
    let full_dir = cli
        .full_out
        .clone()
        .ok_or_else(|| ConfigError::Validation("--full-out is required".into()))?;

    let source = if let Some(path) = &cli.input_file {
        if cli.input_dir.is_some() || !cli.files.is_empty() {
            tracing::warn!("--input-file given; ignoring --input-dir and positional files");
        }
        Source::Manifest {
            path: path.clone(),
            online: cli.online,
        }
    } else if let Some(path) = &cli.input_dir {
        if !cli.files.is_empty() {
            tracing::warn!("--input-dir given; ignoring positional files");
        }
        Source::Directory {
            path: path.clone(),
            recursive: cli.recursive,
        }
    } else {
        Source::Files(cli.files.clone())
    };

    let mut job = JobConfig::new(thumb_dir, full_dir, source);
    job.thumb_width = cli.thumb_width.unwrap_or(settings.widths.thumb);
    job.full_width = cli.full_width.unwrap_or(settings.widths.full);
    job.overwrite = cli.overwrite;
    Ok(job)
}
