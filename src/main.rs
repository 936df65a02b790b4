//! waverunner CLI entry point

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use waverunner::config::CONFIG_HELP;
use waverunner::core::{effective_tools, group_waves, output_file_name};
use waverunner::error::FAILURE_EXIT_CODE;
use waverunner::{ConfigError, RunConfig, WaveRunner};

#[derive(Debug, Parser)]
#[command(
    name = "waverunner",
    version,
    about = "Run external tools against targets in ordered parallel waves"
)]
struct Cli {
    /// YAML file listing targets (env) and tools
    #[arg(short = 'c', long = "config")]
    config: PathBuf,

    /// Per-tool timeout in seconds (overrides settings.timeout)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    timeout: Option<u64>,

    /// Seconds between SIGTERM and SIGKILL when stopping a tool
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    kill_grace: Option<u64>,

    /// Directory for tool output files (overrides settings.output_dir)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Print the wave plan for every target and exit without running
    #[arg(long)]
    list: bool,
}

#[tokio::main]
async fn main() {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            log::error!("{:#}", e);
            FAILURE_EXIT_CODE
        }
    };
    std::process::exit(code);
}

async fn run(cli: Cli) -> Result<i32> {
    log::info!("waverunner v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Loading config from: {}", cli.config.display());

    let mut config = match RunConfig::from_file(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            log::error!("Configuration Error: {}", e);
            if !matches!(e, ConfigError::NotFound(_)) {
                eprintln!("\n{}", CONFIG_HELP);
            }
            return Ok(FAILURE_EXIT_CODE);
        }
    };

    if let Some(secs) = cli.timeout {
        config.settings.timeout = Duration::from_secs(secs);
    }
    if let Some(secs) = cli.kill_grace {
        config.settings.kill_grace = Duration::from_secs(secs);
    }
    if let Some(dir) = cli.output_dir {
        config.settings.output_dir = dir;
    }

    log::info!(
        "Loaded {} tools, {} targets",
        config.tools.len(),
        config.targets.len()
    );
    for name in config.unknown_tool_references() {
        log::warn!("include/exclude references unknown tool '{}'", name);
    }

    if cli.list {
        print_plan(&config);
        return Ok(0);
    }

    std::fs::create_dir_all(&config.settings.output_dir)?;

    let engine = WaveRunner::new(config);
    engine.install_signal_handler()?;

    let (report, outcome) = engine.run().await;
    report.log_summary();

    match outcome {
        Ok(()) => Ok(0),
        Err(e) => {
            if !e.is_interrupted() {
                log::error!("{}", e);
            }
            Ok(e.exit_code())
        }
    }
}

fn print_plan(config: &RunConfig) {
    for target in &config.targets {
        println!("{}", target.value);
        let waves = group_waves(&effective_tools(&config.tools, target));
        if waves.is_empty() {
            println!("  (no tools selected)");
        }
        for wave in waves {
            println!("  wave {}:", wave.key);
            for tool in &wave.tools {
                println!(
                    "    {}: {} {} -> {}",
                    tool.name,
                    tool.command,
                    tool.args,
                    config
                        .settings
                        .output_dir
                        .join(output_file_name(&target.value, &tool.output_suffix))
                        .display()
                );
            }
        }
    }
}
