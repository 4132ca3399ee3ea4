//! `bolder` binary: resolve configuration, start logging, run one command.
#![deny(unsafe_code)]

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use bolder::{Cli, Commands, commands};
use bolder_core::config::{Config, ConfigLoader, ConfigSources};
use camino::Utf8PathBuf;
use clap::Parser;
use owo_colors::{OwoColorize, Stream};

mod observability;

fn utf8(path: PathBuf, what: &str) -> anyhow::Result<Utf8PathBuf> {
    Utf8PathBuf::try_from(path)
        .map_err(|e| anyhow::anyhow!("{what} is not valid UTF-8: {}", e.into_path_buf().display()))
}

/// Project files are searched from the working directory; `--config`
/// files layer on top.
fn load_config(cli: &Cli) -> anyhow::Result<(Config, ConfigSources)> {
    if let Some(dir) = &cli.chdir {
        std::env::set_current_dir(dir)
            .with_context(|| format!("failed to change directory to {}", dir.display()))?;
    }
    let cwd = std::env::current_dir().context("failed to determine current directory")?;
    let cwd = utf8(cwd, "current directory")?;

    let mut loader = ConfigLoader::new().with_project_search(&cwd);
    if let Some(path) = &cli.config {
        loader = loader.with_file(utf8(path.clone(), "config path")?);
    }
    loader.load().context("failed to load configuration")
}

fn run(cli: &Cli, command: Commands) -> anyhow::Result<()> {
    let (config, sources) = load_config(cli)?;

    let log_dir = config
        .log_dir
        .as_ref()
        .map(|dir| dir.as_std_path().to_path_buf());
    let obs_config = observability::ObservabilityConfig::from_env_with_overrides(log_dir);
    let env_filter = observability::env_filter(cli.quiet, cli.verbose, config.log_level.as_str());
    let _guard = observability::init_observability(&obs_config, env_filter)
        .context("failed to initialize logging")?;

    tracing::debug!(
        origin = config.origin.as_deref(),
        store_dir = ?config.store_dir,
        config_file = sources.primary_file().map(camino::Utf8Path::as_str),
        json = cli.json,
        "configuration resolved"
    );

    let max_input = config
        .max_input_bytes
        .unwrap_or(bolder_core::DEFAULT_MAX_INPUT_BYTES);
    let result = match command {
        Commands::Scan(args) => commands::scan::cmd_scan(args, cli.json, &config, max_input),
        Commands::Classify(args) => commands::classify::cmd_classify(args, cli.json),
        Commands::Registry(args) => commands::registry::cmd_registry(args, cli.json, &config),
        Commands::Info(args) => commands::info::cmd_info(args, cli.json, &config, &sources),
    };
    if let Err(err) = &result {
        tracing::error!(error = %err, "command failed");
    }
    result
}

fn main() -> ExitCode {
    let mut cli = Cli::parse();
    cli.color.apply();

    if cli.version_only {
        println!("{}", env!("CARGO_PKG_VERSION"));
        return ExitCode::SUCCESS;
    }
    // arg_required_else_help guarantees a subcommand past this point
    let Some(command) = cli.command.take() else {
        return ExitCode::SUCCESS;
    };

    match run(&cli, command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!(
                "{} {err:#}",
                "error:".if_supports_color(Stream::Stderr, |t| t.red())
            );
            ExitCode::FAILURE
        }
    }
}
