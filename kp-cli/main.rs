use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Args, Parser, Subcommand};
use kp_cli::runner::{output_path, save_annotated};
use kp_cli::{
    init_threads, DetectionSummary, DetectorKind, DetectorRunner, Mode, RunOutcome, RunnerConfig, RunnerError,
    RunnerResult,
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "kpd",
    version,
    about = "Compare SIFT, ORB and BRISK keypoint detectors",
    arg_required_else_help = true
)]
struct Cli {
    /// More log output on stderr (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect keypoints with one detector or compare all of them
    Run(RunArgs),
    /// List the available detectors and their parameters
    List(ListArgs),
    /// Print the default configuration as TOML
    Config,
}

#[derive(Args)]
struct RunArgs {
    /// Input image
    #[arg(long, value_name = "PATH")]
    image: PathBuf,

    /// SIFT, ORB, BRISK or COMPARE (case-insensitive)
    #[arg(long, short = 'd', value_name = "NAME")]
    detector: String,

    /// TOML configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Directory for annotated images
    #[arg(long, value_name = "DIR", default_value = ".")]
    out_dir: PathBuf,

    /// Annotated image path (single detector only)
    #[arg(long, value_name = "FILE", conflicts_with = "no_save")]
    output: Option<PathBuf>,

    /// Do not write annotated images
    #[arg(long)]
    no_save: bool,

    /// Skip descriptor computation
    #[arg(long)]
    no_descriptors: bool,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    /// Write a bar chart of the comparison to this PNG
    #[arg(long, value_name = "FILE")]
    plot: Option<PathBuf>,

    /// Worker threads inside a detector, 0 for one per CPU
    #[arg(long, value_name = "N")]
    threads: Option<usize>,
}

#[derive(Args)]
struct ListArgs {
    /// Show parameters from this TOML file instead of the defaults
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&PathBuf>) -> RunnerResult<RunnerConfig> {
    match path {
        Some(p) => RunnerConfig::load(p),
        None => Ok(RunnerConfig::default()),
    }
}

fn run(args: RunArgs) -> RunnerResult<()> {
    // Reject unknown detector names before touching any file
    let mode: Mode = args.detector.parse()?;
    if mode == Mode::Compare && args.output.is_some() {
        return Err(RunnerError::InvalidConfig(
            "--output applies to a single detector; use --out-dir with COMPARE".to_string(),
        ));
    }

    let mut config = load_config(args.config.as_ref())?;
    if args.no_descriptors {
        config.compute_descriptors = false;
    }
    if let Some(threads) = args.threads {
        config.threads = threads;
    }
    init_threads(config.threads)?;
    debug!(
        threads = rayon::current_num_threads(),
        descriptors = config.compute_descriptors,
        "configuration ready"
    );

    let runner = DetectorRunner::new(config)?;
    match runner.run_mode(&args.image, mode)? {
        RunOutcome::Single { image, result } => {
            if args.json {
                let summary = DetectionSummary::from_result(&result);
                let json = serde_json::to_string_pretty(&summary).map_err(|e| RunnerError::Serialization(e.to_string()))?;
                println!("{}", json);
            } else {
                println!("Detector:    {}", result.detector);
                println!("Image:       {}x{}", result.width, result.height);
                println!("Keypoints:   {}", result.count());
                println!("Time:        {:.4} s", result.elapsed_secs());
                println!(
                    "Descriptors: {}",
                    result.descriptor_shape().unwrap_or_else(|| "none".to_string())
                );
            }
            if !args.no_save {
                let path = args
                    .output
                    .clone()
                    .unwrap_or_else(|| output_path(&args.out_dir, &image.path, result.detector));
                save_annotated(&runner.visualize(&image.color, &result), &path)?;
                if !args.json {
                    println!("Saved:       {}", path.display());
                }
            }
        }
        RunOutcome::Compare { image, report } => {
            if args.json {
                println!("{}", report.to_json()?);
            } else {
                print!("{}", report);
            }
            if !args.no_save {
                for (kind, entry) in report.iter() {
                    if let Some(result) = entry.result() {
                        let path = output_path(&args.out_dir, &image.path, kind);
                        save_annotated(&runner.visualize(&image.color, result), &path)?;
                    }
                }
            }
            if let Some(plot) = &args.plot {
                report.save_plot(plot)?;
                if !args.json {
                    println!("Plot saved to {}", plot.display());
                }
            }
            report.check()?;
        }
    }
    Ok(())
}

fn list(args: ListArgs) -> RunnerResult<()> {
    let config = load_config(args.config.as_ref())?;
    println!("{:<8} {}", "Name", "Parameters");
    for kind in DetectorKind::ALL {
        println!("{:<8} {}", kind.name(), kind.summary(&config));
    }
    println!("{:<8} run all of the above and compare", "COMPARE");
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Run(args) => run(args),
        Commands::List(args) => list(args),
        Commands::Config => RunnerConfig::default().to_toml_string().map(|text| print!("{}", text)),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {}", err);
            ExitCode::from(err.kind().exit_code())
        }
    }
}
