//! Registry command: inspect or clear persisted keyword registries.

use anyhow::{Context, bail};
use clap::{Args, Subcommand};
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing::{debug, instrument};

use bolder_core::config::Config;
use bolder_core::scope::{REGISTRY_KEY_PREFIX, parse_registry_config};
use bolder_core::store::RegistryStore;

use super::file_store;

/// Arguments for the `registry` subcommand.
#[derive(Args, Debug)]
pub struct RegistryArgs {
    /// Registry operation.
    #[command(subcommand)]
    pub action: RegistryAction,
}

/// Registry operations.
#[derive(Subcommand, Debug)]
pub enum RegistryAction {
    /// List stored registries and their sizes
    List,
    /// Print the words in one registry
    Show {
        /// Registry key, or a hostname to resolve through `registry_config`.
        target: String,
    },
    /// Delete stored registries
    Clear {
        /// Registry key, or a hostname to resolve through `registry_config`.
        #[arg(required_unless_present = "all", conflicts_with = "all")]
        target: Option<String>,
        /// Delete every stored registry.
        #[arg(long)]
        all: bool,
    },
}

#[derive(Debug, Serialize)]
struct RegistryEntry {
    key: String,
    words: usize,
}

/// Resolve a key or hostname to a registry key.
fn resolve_key(target: &str, config: &Config) -> anyhow::Result<String> {
    if target.starts_with(REGISTRY_KEY_PREFIX) {
        return Ok(target.to_string());
    }
    let (_, key) = parse_registry_config(&config.engine.registry_config, target);
    key.with_context(|| format!("no registry is configured for {target}"))
}

/// Run a registry operation against the configured file store.
#[instrument(name = "cmd_registry", skip_all)]
pub fn cmd_registry(args: RegistryArgs, global_json: bool, config: &Config) -> anyhow::Result<()> {
    let store = file_store(config)?;
    debug!(dir = %store.dir(), action = ?args.action, "executing registry command");
    run(args.action, global_json, config, store)
}

fn run<S: RegistryStore>(
    action: RegistryAction,
    global_json: bool,
    config: &Config,
    mut store: S,
) -> anyhow::Result<()> {
    match action {
        RegistryAction::List => {
            let mut entries = Vec::new();
            for key in store.keys()? {
                let words = store.load(&key)?.map_or(0, |w| w.len());
                entries.push(RegistryEntry { key, words });
            }
            if global_json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else if entries.is_empty() {
                println!("{}", "no registries stored".dimmed());
            } else {
                for entry in &entries {
                    let size = format!("({} words)", entry.words);
                    println!("{} {}", entry.key.cyan(), size.dimmed());
                }
            }
        }
        RegistryAction::Show { target } => {
            let key = resolve_key(&target, config)?;
            let Some(words) = store.load(&key)? else {
                bail!("no registry stored under {key}");
            };
            if global_json {
                println!("{}", serde_json::to_string_pretty(&words)?);
            } else {
                for word in &words {
                    println!("{word}");
                }
            }
        }
        RegistryAction::Clear { target, all } => {
            let keys = if all {
                store.keys()?
            } else {
                let target = target.context("a registry key or hostname is required")?;
                vec![resolve_key(&target, config)?]
            };
            let mut removed = Vec::new();
            for key in keys {
                if store.remove(&key)? {
                    removed.push(key);
                }
            }
            if global_json {
                println!("{}", serde_json::to_string_pretty(&removed)?);
            } else {
                let noun = if removed.len() == 1 { "registry" } else { "registries" };
                println!("{} {} {noun}", "Cleared".green(), removed.len());
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bolder_core::config::Settings;
    use bolder_core::store::MemoryStore;

    fn config() -> Config {
        Config {
            engine: Settings {
                registry_config: "50: docs.rs\n1000: *.*".to_string(),
                ..Settings::default()
            },
            ..Config::default()
        }
    }

    #[test]
    fn hostnames_resolve_through_the_registry_table() {
        let config = config();
        assert_eq!(
            resolve_key("docs.rs", &config).unwrap(),
            "bolder_registry_docs.rs"
        );
        assert_eq!(
            resolve_key("example.com", &config).unwrap(),
            "bolder_registry_global"
        );
        assert_eq!(
            resolve_key("bolder_registry_custom", &config).unwrap(),
            "bolder_registry_custom"
        );
    }

    #[test]
    fn unconfigured_hostname_is_an_error() {
        let config = Config {
            engine: Settings {
                registry_config: "50: docs.rs".to_string(),
                ..Settings::default()
            },
            ..Config::default()
        };
        assert!(resolve_key("example.com", &config).is_err());
    }

    #[test]
    fn clear_removes_the_resolved_registry() {
        let mut store = MemoryStore::new();
        store.save("bolder_registry_docs.rs", &["tokio".to_string()]).unwrap();
        store.save("bolder_registry_global", &[]).unwrap();
        let action = RegistryAction::Clear {
            target: Some("docs.rs".to_string()),
            all: false,
        };
        run(action, true, &config(), &mut store).unwrap();
        assert_eq!(store.keys().unwrap(), vec!["bolder_registry_global"]);
    }

    #[test]
    fn show_fails_for_missing_registry() {
        let store = MemoryStore::new();
        let action = RegistryAction::Show {
            target: "docs.rs".to_string(),
        };
        assert!(run(action, false, &config(), store).is_err());
    }

    #[test]
    fn list_and_clear_all() {
        let mut store = MemoryStore::new();
        store.save("bolder_registry_a.org", &["alpha".to_string()]).unwrap();
        run(RegistryAction::List, false, &config(), &mut store).unwrap();
        let action = RegistryAction::Clear {
            target: None,
            all: true,
        };
        run(action, false, &config(), &mut store).unwrap();
        assert!(store.keys().unwrap().is_empty());
    }
}
