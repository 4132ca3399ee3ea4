//! Info command implementation

use clap::Args;
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing::{debug, instrument};

use bolder_core::config::{Config, ConfigSources};
use bolder_core::custom::CustomRules;
use bolder_core::scheduler::SchedulerConfig;
use bolder_core::store::default_store_dir;

use super::scan::DEFAULT_ORIGIN;

/// Arguments for the `info` subcommand.
#[derive(Args, Debug, Default)]
pub struct InfoArgs {
    // No subcommand-specific arguments; uses global --json flag
}

#[derive(Serialize)]
struct PackageInfo {
    name: &'static str,
    version: &'static str,
    #[serde(skip_serializing_if = "str::is_empty")]
    description: &'static str,
    #[serde(skip_serializing_if = "str::is_empty")]
    repository: &'static str,
    #[serde(skip_serializing_if = "str::is_empty")]
    homepage: &'static str,
    #[serde(skip_serializing_if = "str::is_empty")]
    license: &'static str,
}

impl PackageInfo {
    const fn new() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            description: env!("CARGO_PKG_DESCRIPTION"),
            repository: env!("CARGO_PKG_REPOSITORY"),
            homepage: env!("CARGO_PKG_HOMEPAGE"),
            license: env!("CARGO_PKG_LICENSE"),
        }
    }
}

#[derive(Serialize)]
struct ConfigInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    config_file: Option<String>,
    log_level: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    log_dir: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    store_dir: Option<String>,
    origin: String,
}

#[derive(Serialize)]
struct EngineInfo {
    default_enabled: bool,
    site_list: Vec<String>,
    min_words_in_block: usize,
    disable_auto_detect: bool,
    skip_short_metadata_lines: bool,
    custom_rules: usize,
    registry_config: String,
}

impl ConfigInfo {
    fn from_config(config: &Config, sources: &ConfigSources) -> Self {
        Self {
            config_file: sources.primary_file().map(|p| p.to_string()),
            log_level: config.log_level.as_str().to_string(),
            log_dir: config.log_dir.as_ref().map(|p| p.to_string()),
            store_dir: config
                .store_dir
                .clone()
                .or_else(default_store_dir)
                .map(|p| p.to_string()),
            origin: config
                .origin
                .clone()
                .unwrap_or_else(|| DEFAULT_ORIGIN.to_string()),
        }
    }
}

impl EngineInfo {
    fn from_config(config: &Config) -> Self {
        let engine = &config.engine;
        Self {
            default_enabled: engine.default_enabled,
            site_list: engine.site_list.clone(),
            min_words_in_block: engine.min_words_in_block,
            disable_auto_detect: engine.disable_auto_detect,
            skip_short_metadata_lines: engine.skip_short_metadata_lines,
            custom_rules: CustomRules::parse(&engine.custom_highlights).rules().len(),
            registry_config: engine.registry_config.clone(),
        }
    }
}

#[derive(Serialize)]
struct FullInfo {
    #[serde(flatten)]
    package: PackageInfo,
    config: ConfigInfo,
    engine: EngineInfo,
    scheduler: SchedulerConfig,
}

/// Print package information
///
/// # Arguments
/// * `global_json` - Global `--json` flag from CLI
/// * `config` - Loaded configuration
/// * `sources` - Config source metadata from loading
#[instrument(name = "cmd_info", skip_all, fields(json_output))]
pub fn cmd_info(
    _args: InfoArgs,
    global_json: bool,
    config: &Config,
    sources: &ConfigSources,
) -> anyhow::Result<()> {
    debug!(json_output = global_json, "executing info command");

    let full_info = FullInfo {
        package: PackageInfo::new(),
        config: ConfigInfo::from_config(config, sources),
        engine: EngineInfo::from_config(config),
        scheduler: config.scheduler,
    };

    if global_json {
        println!("{}", serde_json::to_string_pretty(&full_info)?);
        return Ok(());
    }

    let package = &full_info.package;
    println!("{} {}", package.name.bold(), package.version.green());
    if !package.description.is_empty() {
        println!("{}", package.description);
    }
    if !package.license.is_empty() {
        println!("{}: {}", "License".dimmed(), package.license);
    }
    if !package.repository.is_empty() {
        println!("{}: {}", "Repository".dimmed(), package.repository.cyan());
    }

    let cfg = &full_info.config;
    println!();
    println!("{}", "Configuration".bold().underline());
    if let Some(ref path) = cfg.config_file {
        println!("{}: {}", "Config file".dimmed(), path.cyan());
    } else {
        println!("{}: {}", "Config file".dimmed(), "none loaded".yellow());
    }
    println!("{}: {}", "Log level".dimmed(), cfg.log_level);
    if let Some(ref dir) = cfg.log_dir {
        println!("{}: {}", "Log directory".dimmed(), dir);
    }
    match cfg.store_dir {
        Some(ref dir) => println!("{}: {}", "Registry directory".dimmed(), dir),
        None => println!("{}: {}", "Registry directory".dimmed(), "(not set)".dimmed()),
    }
    println!("{}: {}", "Origin".dimmed(), cfg.origin);

    let engine = &full_info.engine;
    println!();
    println!("{}", "Engine".bold().underline());
    let mode = if engine.default_enabled {
        "on except listed sites"
    } else {
        "only on listed sites"
    };
    println!("{}: {}", "Sites".dimmed(), mode);
    if !engine.site_list.is_empty() {
        println!("{}: {}", "Site list".dimmed(), engine.site_list.join(", "));
    }
    println!("{}: {}", "Min words in block".dimmed(), engine.min_words_in_block);
    println!("{}: {}", "Auto-detect".dimmed(), on_off(!engine.disable_auto_detect));
    println!(
        "{}: {}",
        "Skip metadata lines".dimmed(),
        on_off(engine.skip_short_metadata_lines)
    );
    println!("{}: {}", "Custom rules".dimmed(), engine.custom_rules);

    let scheduler = &full_info.scheduler;
    println!();
    println!("{}", "Scheduler".bold().underline());
    println!(
        "{}: {} ms, {} nodes",
        "Slice".dimmed(),
        scheduler.slice_budget_ms,
        scheduler.slice_node_cap
    );
    println!(
        "{}: {} changes in {} ms, {} ms cooldown",
        "Storm breaker".dimmed(),
        scheduler.storm_threshold,
        scheduler.storm_window_ms,
        scheduler.cooldown_ms
    );

    Ok(())
}

const fn on_off(value: bool) -> &'static str {
    if value { "on" } else { "off" }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bolder_core::config::Settings;

    fn test_config() -> Config {
        Config::default()
    }

    fn test_sources() -> ConfigSources {
        ConfigSources::default()
    }

    #[test]
    fn test_cmd_info_text_succeeds() {
        assert!(cmd_info(InfoArgs::default(), false, &test_config(), &test_sources()).is_ok());
    }

    #[test]
    fn test_cmd_info_json_via_global() {
        assert!(cmd_info(InfoArgs::default(), true, &test_config(), &test_sources()).is_ok());
    }

    #[test]
    fn test_config_info_no_file() {
        let info = ConfigInfo::from_config(&test_config(), &test_sources());
        assert!(info.config_file.is_none());
        assert_eq!(info.log_level, "info");
        assert_eq!(info.origin, DEFAULT_ORIGIN);
    }

    #[test]
    fn engine_info_counts_valid_custom_rules() {
        let config = Config {
            engine: Settings {
                custom_highlights: "#ff0: tokio\nbroken line\n#0ff: serde, axum".to_string(),
                ..Settings::default()
            },
            ..Config::default()
        };
        assert_eq!(EngineInfo::from_config(&config).custom_rules, 2);
    }

    #[test]
    fn scheduler_tuning_is_reported() {
        let config = Config {
            scheduler: SchedulerConfig {
                storm_threshold: 25,
                ..SchedulerConfig::default()
            },
            ..Config::default()
        };
        let info = FullInfo {
            package: PackageInfo::new(),
            config: ConfigInfo::from_config(&config, &test_sources()),
            engine: EngineInfo::from_config(&config),
            scheduler: config.scheduler,
        };
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["scheduler"]["storm_threshold"], 25);
        assert_eq!(json["scheduler"]["cooldown_ms"], 2000);
    }
}
