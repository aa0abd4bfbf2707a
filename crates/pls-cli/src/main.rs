//! Command-line front end for the scheduling engine: load a project (native
//! JSON or MSPDI), run a calculation pass, and report the result — or
//! convert between the two file formats. A thin demonstration of the
//! `pls-core` / `pls-engine` / `pls-io` stack; the GUI-facing host/
//! controller/persistence layers live behind `pls-host`/`pls-controller`/
//! `pls-persistence` and are driven by an embedding application, not this
//! binary.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};

use pls_core::Calendar;
use pls_engine::CalcStats;
use pls_io::ProjectFile;

#[derive(Parser)]
#[command(name = "pls")]
#[command(about = "Critical-path scheduling engine")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Json,
    Mspdi,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a CPM calculation pass over a project file and report statistics.
    Calculate {
        /// Input project file.
        input: PathBuf,
        #[arg(long, value_enum, default_value = "json")]
        format: Format,
        /// If set, write the recalculated project back to this path.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Convert a project file between the native JSON and MSPDI formats.
    Convert {
        input: PathBuf,
        #[arg(long, value_enum)]
        input_format: Format,
        output: PathBuf,
        #[arg(long, value_enum)]
        output_format: Format,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Calculate { input, format, output } => run_calculate(&input, format, output.as_deref()),
        Commands::Convert { input, input_format, output, output_format } => {
            run_convert(&input, input_format, &output, output_format)
        }
    }
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_new(level).unwrap_or_else(|_| "warn".into()))
        .init();
}

fn load_project(path: &std::path::Path, format: Format) -> Result<(Vec<pls_core::Task>, Calendar)> {
    let contents = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    match format {
        Format::Json => {
            let project = pls_io::from_json(&contents).with_context(|| "parsing native project JSON")?;
            Ok((project.tasks, project.calendar))
        }
        Format::Mspdi => pls_io::import_mspdi(&contents).with_context(|| "parsing MSPDI XML"),
    }
}

fn run_calculate(input: &std::path::Path, format: Format, output: Option<&std::path::Path>) -> Result<()> {
    let (tasks, calendar) = load_project(input, format)?;
    pls_core::validate_project(&tasks).with_context(|| "validating project structure")?;

    let result = pls_engine::calculate(&tasks, &calendar);
    print_stats(&result.stats);

    if let Some(output_path) = output {
        let project = ProjectFile::new(result.tasks, calendar, Vec::new(), Utc::now());
        let json = pls_io::to_json(&project)?;
        fs::write(output_path, json).with_context(|| format!("writing {}", output_path.display()))?;
        println!("wrote recalculated project to {}", output_path.display());
    }

    if result.stats.error.is_some() {
        anyhow::bail!("calculation reported an error: {}", result.stats.error.unwrap());
    }
    Ok(())
}

fn run_convert(
    input: &std::path::Path,
    input_format: Format,
    output: &std::path::Path,
    output_format: Format,
) -> Result<()> {
    let (tasks, calendar) = load_project(input, input_format)?;
    let contents = match output_format {
        Format::Json => {
            let project = ProjectFile::new(tasks, calendar, Vec::new(), Utc::now());
            pls_io::to_json(&project)?
        }
        Format::Mspdi => pls_io::export_mspdi(&tasks, &calendar)?,
    };
    fs::write(output, contents).with_context(|| format!("writing {}", output.display()))?;
    println!("converted {} -> {}", input.display(), output.display());
    Ok(())
}

fn print_stats(stats: &CalcStats) {
    println!("tasks:          {}", stats.task_count);
    println!("critical tasks: {}", stats.critical_count);
    println!("project end:    {}", stats.project_end.map(|d| d.to_string()).unwrap_or_else(|| "n/a".into()));
    println!("duration:       {} working day(s)", stats.project_duration);
    println!("calc time:      {} ms", stats.calc_time_ms);
    for warning in &stats.warnings {
        println!("warning: {warning}");
    }
}
