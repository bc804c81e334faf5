use std::path::PathBuf;
use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ocads_mirror::aggregate::MirrorSettings;
use ocads_mirror::config::ConfigLoader;
use ocads_mirror::domain::DatasetDescriptor;
use ocads_mirror::error::MirrorError;
use ocads_mirror::index::fetch_index;
use ocads_mirror::output::{ConsoleOutput, JsonOutput, OutputMode};
use ocads_mirror::remote::HttpRemote;
use ocads_mirror::scheduler::{ProgressSink, Scheduler};
use ocads_mirror::state::StateStore;
use ocads_mirror::tree::TraversalPolicy;

const EXIT_INCOMPLETE: u8 = 4;

#[derive(Parser)]
#[command(name = "ocads-mirror")]
#[command(about = "Mirror the NCEI OCADS dataset archive and verify local copies")]
#[command(version, author)]
struct Cli {
    #[arg(
        short = 'o',
        long,
        help = "Directory to store the aggregated OCADS data in (default: current directory)"
    )]
    output_dir: Option<PathBuf>,

    #[arg(
        short = 't',
        long,
        default_value_t = 1,
        help = "Number of datasets aggregated concurrently"
    )]
    num_threads: usize,

    #[arg(
        short = 'c',
        long,
        help = "Verify the local mirror against the remote tree instead of downloading"
    )]
    check: bool,

    #[arg(long, help = "Path to an ocads-mirror.json config file")]
    config: Option<String>,

    #[arg(long, help = "Location of the aggregation state file")]
    state_file: Option<Utf8PathBuf>,

    #[arg(long, help = "Keep mirroring sibling folders after a failed download")]
    continue_on_error: bool,

    #[arg(long, help = "Print the run summary as JSON")]
    json: bool,

    #[arg(long, help = "Only process the first N datasets of the index")]
    limit: Option<usize>,
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(report) => {
            eprintln!("{report:?}");
            if let Some(error) = report.downcast_ref::<MirrorError>() {
                return ExitCode::from(map_exit_code(error));
            }
            ExitCode::from(1)
        }
    }
}

fn map_exit_code(error: &MirrorError) -> u8 {
    match error {
        MirrorError::ConfigRead(_) | MirrorError::ConfigParse(_) => 2,
        MirrorError::IndexHttp(_)
        | MirrorError::IndexStatus { .. }
        | MirrorError::IndexParse(_)
        | MirrorError::FetchHttp { .. }
        | MirrorError::FetchStatus { .. } => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Console
    };

    let mut config = ConfigLoader::resolve(cli.config.as_deref())?;
    if cli.continue_on_error {
        config.traversal = TraversalPolicy::Continue;
    }

    let root = output_root(cli.output_dir)?;
    let remote = HttpRemote::new(&config.http)?;
    let settings = MirrorSettings::from_config(&config, root.clone());

    let index = fetch_index(&remote, &config.index_url)?;
    let mut descriptors: Vec<DatasetDescriptor> = index.descriptors().to_vec();
    if let Some(limit) = cli.limit {
        descriptors.truncate(limit);
    }

    let sink: &dyn ProgressSink = match output_mode {
        OutputMode::Console => &ConsoleOutput,
        OutputMode::Json => &JsonOutput,
    };
    let scheduler = Scheduler::new(&remote, &settings);

    if cli.check {
        let summary = scheduler.run_check(&descriptors, &config.pacing, sink);
        match output_mode {
            OutputMode::Console => ConsoleOutput::print_check(&summary),
            OutputMode::Json => JsonOutput::print_check(&summary),
        }
        .map_err(|err| MirrorError::Filesystem(err.to_string()))?;
        if summary.problems.is_empty() {
            return Ok(ExitCode::SUCCESS);
        }
        return Ok(ExitCode::from(EXIT_INCOMPLETE));
    }

    let state = match cli.state_file.or(config.state_file.clone()) {
        Some(path) => StateStore::new(path),
        None => StateStore::beside_executable()?,
    };
    info!(state = %state.path(), output = %root, "starting OCADS data aggregation");
    index.write_snapshot(&root)?;

    let summary = scheduler.run_mirror(&state, &descriptors, cli.num_threads, sink)?;
    match output_mode {
        OutputMode::Console => ConsoleOutput::print_mirror(&summary),
        OutputMode::Json => JsonOutput::print_mirror(&summary),
    }
    .map_err(|err| MirrorError::Filesystem(err.to_string()))?;

    if summary.has_failures() {
        return Ok(ExitCode::from(EXIT_INCOMPLETE));
    }
    Ok(ExitCode::SUCCESS)
}

fn output_root(output_dir: Option<PathBuf>) -> Result<Utf8PathBuf, MirrorError> {
    let dir = match output_dir {
        Some(dir) => dir,
        None => std::env::current_dir().map_err(|err| MirrorError::Filesystem(err.to_string()))?,
    };
    Utf8PathBuf::from_path_buf(dir)
        .map_err(|path| MirrorError::Filesystem(format!("non-utf8 output path: {}", path.display())))
}
