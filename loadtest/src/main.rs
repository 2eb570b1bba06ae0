use chatload::config::{Config, parse_think_time_scale};
use chatload::runtime::{
    EXIT_GENERIC_ERROR, Interpolation, Runner, ScenarioOptions, Stage, stage::format_duration,
};
use chatload::scenarios::{self, ScenarioKind};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Base URL of the application under test (overrides BASE_URL)
    #[arg(long, value_name = "URL", global = true)]
    base_url: Option<String>,

    /// Replace the scenario's stages (repeatable, e.g. --stage 30s:10)
    #[arg(long = "stage", value_name = "DUR:TARGET", global = true)]
    stages: Vec<Stage>,

    /// How the VU target moves within a stage (overrides LOADTEST_INTERPOLATION)
    #[arg(long, value_enum, value_name = "MODE", global = true)]
    interpolation: Option<Interpolation>,

    /// VU count the first stage ramps from (overrides LOADTEST_START_VUS)
    #[arg(long, value_name = "N", global = true)]
    start_vus: Option<u32>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scenario against the target
    Run {
        #[arg(value_enum)]
        scenario: ScenarioKind,

        /// Write the end-of-test summary as JSON
        #[arg(long, value_name = "PATH")]
        summary_export: Option<PathBuf>,

        /// Multiplier for think-time sleeps (0 disables them)
        #[arg(long, value_name = "FACTOR", value_parser = think_time_scale_arg)]
        think_time_scale: Option<f64>,

        /// Skip threshold evaluation
        #[arg(long)]
        no_thresholds: bool,
    },

    /// Print the stage profile and thresholds of a scenario
    Inspect {
        #[arg(value_enum)]
        scenario: ScenarioKind,
    },
}

fn think_time_scale_arg(val: &str) -> Result<f64, String> {
    parse_think_time_scale(val)
        .ok_or_else(|| format!("'{}' is not a finite non-negative number", val))
}

fn print_plan(kind: ScenarioKind, config: &Config, options: &ScenarioOptions) {
    println!("Scenario:   {}", kind);
    println!("Target:     {}", config.base_url);
    println!(
        "Duration:   {:?} (max {} VUs, {:?} ramp)",
        options.profile.total_duration(),
        options.profile.max_target(),
        options.profile.interpolation()
    );
    println!("Stages (from {} VUs):", options.profile.start_vus());
    let starts = options.profile.stage_starts();
    for (start, stage) in starts.iter().zip(options.profile.stages()) {
        println!("  +{:<8} {}", format_duration(*start), stage);
    }
    if options.thresholds.is_empty() {
        println!("Thresholds: none");
    } else {
        println!("Thresholds:");
        for t in &options.thresholds {
            println!("  {}: {}", t.metric, t.expr);
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let mut config = Config::from_env();
    if let Some(url) = cli.base_url {
        config.base_url = url;
    }
    if !cli.stages.is_empty() {
        config.stages_override = Some(cli.stages);
    }
    if cli.interpolation.is_some() {
        config.interpolation = cli.interpolation;
    }
    if cli.start_vus.is_some() {
        config.start_vus = cli.start_vus;
    }

    match cli.command {
        Commands::Inspect { scenario } => {
            let runner = Runner::new(config)?;
            let options = scenarios::describe(&runner, scenario)?;
            print_plan(scenario, runner.config(), &options);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Run {
            scenario,
            summary_export,
            think_time_scale,
            no_thresholds,
        } => {
            if let Some(path) = summary_export {
                config.summary_export = Some(path);
            }
            if let Some(scale) = think_time_scale {
                config.think_time_scale = scale;
            }
            if no_thresholds {
                config.thresholds_enabled = false;
            }

            let runner = Runner::new(config)?;
            let report = match scenarios::run(&runner, scenario).await {
                Ok(report) => report,
                Err(e) => {
                    error!("Scenario '{}' aborted: {}", scenario, e);
                    return Ok(ExitCode::from(e.exit_code()));
                }
            };

            report.print_summary();
            if let Some(ref path) = runner.config().summary_export {
                report.export(path)?;
                info!("Summary written to {:?}", path);
            }
            Ok(ExitCode::from(report.exit_code()))
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chatload=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(EXIT_GENERIC_ERROR)
        }
    }
}
