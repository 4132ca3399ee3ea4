//! Origin-based resolution of per-site behaviour.
//!
//! Three things depend on the document's hostname: which containers are
//! excluded from scanning, how large the learned registry is and where it is
//! persisted, and whether the engine runs at all.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::config::Settings;

/// Default capacity table: one global registry of 1000 words.
pub const DEFAULT_REGISTRY_CONFIG: &str = "1000: *.*";

/// Default excluded-container table.
pub const DEFAULT_EXCLUDED_TAGS_CONFIG: &str =
    "*.*: SCRIPT, STYLE, NOSCRIPT, TEXTAREA, INPUT, SELECT, OPTION, CODE, PRE, IFRAME, SVG, CANVAS, KBD, VAR, A";

/// Containers excluded when no excluded-tags table is configured at all.
pub const DEFAULT_EXCLUDED_TAGS: &[&str] = &[
    "SCRIPT", "STYLE", "NOSCRIPT", "TEXTAREA", "INPUT", "SELECT", "OPTION", "CODE", "PRE",
    "IFRAME", "SVG", "CANVAS", "KBD", "VAR", "A",
];

/// Registry capacity used when a size cannot be parsed or nothing matches.
pub const DEFAULT_REGISTRY_CAPACITY: usize = 1000;

/// Prefix of every persisted registry key.
pub const REGISTRY_KEY_PREFIX: &str = "bolder_registry_";

/// Key of the catch-all registry.
pub const GLOBAL_REGISTRY_KEY: &str = "bolder_registry_global";

const WILDCARD: &str = "*.*";

/// Everything resolved from the hostname.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScopeConfig {
    /// Uppercase tag names whose contents are never emphasized.
    pub excluded_tags: BTreeSet<String>,
    /// Maximum number of learned words.
    pub registry_capacity: usize,
    /// Persistence key; `None` disables learning.
    pub registry_key: Option<String>,
}

impl ScopeConfig {
    /// Resolve every scoped setting for `hostname`.
    #[tracing::instrument(skip(settings))]
    pub fn resolve(hostname: &str, settings: &Settings) -> Self {
        let excluded_tags = parse_excluded_tags(&settings.excluded_tags_config, hostname);
        let (registry_capacity, registry_key) =
            parse_registry_config(&settings.registry_config, hostname);
        tracing::debug!(
            excluded = excluded_tags.len(),
            registry_capacity,
            registry_key = registry_key.as_deref().unwrap_or("<none>"),
            "resolved scope"
        );
        Self {
            excluded_tags,
            registry_capacity,
            registry_key,
        }
    }
}

/// Resolve the excluded containers for `hostname`.
///
/// Each line is `domain: TAG, TAG`. A domain matches the hostname exactly or
/// as a `.domain` suffix and ranks by its length; `*.*` matches everything
/// with the lowest rank. The highest-ranked line wins, the first one on a
/// tie. No matching line excludes nothing; an empty table falls back to
/// [`DEFAULT_EXCLUDED_TAGS`].
pub fn parse_excluded_tags(config: &str, hostname: &str) -> BTreeSet<String> {
    if config.is_empty() {
        return DEFAULT_EXCLUDED_TAGS
            .iter()
            .map(|t| (*t).to_string())
            .collect();
    }

    let mut best: Option<(usize, &str)> = None;
    for line in config.lines() {
        let Some((domain, tags)) = line.split_once(':') else {
            continue;
        };
        let domain = domain.trim();
        let rank = if domain == WILDCARD {
            0
        } else if hostname == domain || hostname.ends_with(&format!(".{domain}")) {
            domain.len()
        } else {
            continue;
        };
        if best.is_none_or(|(best_rank, _)| rank > best_rank) {
            best = Some((rank, tags));
        }
    }

    best.map(|(_, tags)| {
        tags.split(',')
            .map(|t| t.trim().to_ascii_uppercase())
            .filter(|t| !t.is_empty())
            .collect()
    })
    .unwrap_or_default()
}

/// Resolve registry capacity and persistence key for `hostname`.
///
/// Each line is `size: domain, domain`. The first line listing a domain that
/// occurs anywhere in the hostname wins and keys the registry by hostname.
/// Otherwise the first line mentioning `*.*` selects the global registry. An
/// unparsable or zero size means [`DEFAULT_REGISTRY_CAPACITY`]. When nothing
/// matches, the registry has no key and learns nothing.
pub fn parse_registry_config(config: &str, hostname: &str) -> (usize, Option<String>) {
    let parse_size = |raw: &str| {
        raw.trim()
            .parse::<usize>()
            .ok()
            .filter(|&n| n > 0)
            .unwrap_or(DEFAULT_REGISTRY_CAPACITY)
    };

    for line in config.lines() {
        let Some((size, domains)) = line.split_once(':') else {
            continue;
        };
        let hit = domains
            .split(',')
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .any(|d| hostname.contains(d));
        if hit {
            return (
                parse_size(size),
                Some(format!("{REGISTRY_KEY_PREFIX}{hostname}")),
            );
        }
    }

    config
        .lines()
        .find(|line| line.contains(WILDCARD))
        .map(|line| {
            let size = line.split(':').next().unwrap_or_default();
            (parse_size(size), Some(GLOBAL_REGISTRY_KEY.to_string()))
        })
        .unwrap_or((DEFAULT_REGISTRY_CAPACITY, None))
}

/// `default_enabled` flipped when the hostname contains any listed site.
pub fn is_site_enabled(hostname: &str, settings: &Settings) -> bool {
    let listed = settings
        .site_list
        .iter()
        .filter(|site| !site.is_empty())
        .any(|site| hostname.contains(site.as_str()));
    settings.default_enabled != listed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|t| (*t).to_string()).collect()
    }

    #[test]
    fn default_table_excludes_code_and_links() {
        let excluded = parse_excluded_tags(DEFAULT_EXCLUDED_TAGS_CONFIG, "example.com");
        assert!(excluded.contains("CODE"));
        assert!(excluded.contains("A"));
        assert_eq!(excluded.len(), DEFAULT_EXCLUDED_TAGS.len());
    }

    #[test]
    fn empty_table_uses_builtin_list() {
        assert_eq!(
            parse_excluded_tags("", "example.com").len(),
            DEFAULT_EXCLUDED_TAGS.len()
        );
    }

    #[test]
    fn longest_matching_domain_wins() {
        let config = "*.*: SCRIPT\nexample.com: CODE\nnews.example.com: pre, kbd";
        assert_eq!(
            parse_excluded_tags(config, "news.example.com"),
            tags(&["PRE", "KBD"])
        );
        assert_eq!(parse_excluded_tags(config, "www.example.com"), tags(&["CODE"]));
        assert_eq!(parse_excluded_tags(config, "other.org"), tags(&["SCRIPT"]));
    }

    #[test]
    fn suffix_match_requires_a_dot_boundary() {
        let config = "example.com: CODE";
        assert!(parse_excluded_tags(config, "badexample.com").is_empty());
        assert_eq!(parse_excluded_tags(config, "example.com"), tags(&["CODE"]));
    }

    #[test]
    fn equal_specificity_keeps_first_listed() {
        let config = "example.com: CODE\nexample.com: PRE";
        assert_eq!(parse_excluded_tags(config, "example.com"), tags(&["CODE"]));
    }

    #[test]
    fn no_match_excludes_nothing() {
        assert!(parse_excluded_tags("example.com: CODE", "rust-lang.org").is_empty());
    }

    #[test]
    fn registry_prefers_host_specific_line() {
        let config = "50: *.*\n20: docs.rs, github.com";
        assert_eq!(
            parse_registry_config(config, "gist.github.com"),
            (20, Some("bolder_registry_gist.github.com".to_string()))
        );
        assert_eq!(
            parse_registry_config(config, "example.com"),
            (50, Some(GLOBAL_REGISTRY_KEY.to_string()))
        );
    }

    #[test]
    fn registry_size_falls_back_on_garbage() {
        assert_eq!(
            parse_registry_config("lots: *.*", "x.org"),
            (DEFAULT_REGISTRY_CAPACITY, Some(GLOBAL_REGISTRY_KEY.to_string()))
        );
        assert_eq!(
            parse_registry_config("0: x.org", "x.org").0,
            DEFAULT_REGISTRY_CAPACITY
        );
    }

    #[test]
    fn registry_without_match_is_unkeyed() {
        assert_eq!(
            parse_registry_config("100: docs.rs", "example.com"),
            (DEFAULT_REGISTRY_CAPACITY, None)
        );
    }

    #[test]
    fn trailing_comma_does_not_match_every_host() {
        assert_eq!(
            parse_registry_config("100: docs.rs,", "example.com"),
            (DEFAULT_REGISTRY_CAPACITY, None)
        );
    }

    #[test]
    fn enable_check_is_an_xor() {
        let mut settings = Settings {
            site_list: vec!["example.com".to_string()],
            ..Settings::default()
        };
        assert!(!is_site_enabled("www.example.com", &settings));
        assert!(is_site_enabled("docs.rs", &settings));

        settings.default_enabled = false;
        assert!(is_site_enabled("www.example.com", &settings));
        assert!(!is_site_enabled("docs.rs", &settings));
    }

    #[test]
    fn resolve_combines_all_tables() {
        let scope = ScopeConfig::resolve("example.com", &Settings::default());
        assert!(scope.excluded_tags.contains("PRE"));
        assert_eq!(scope.registry_capacity, 1000);
        assert_eq!(scope.registry_key.as_deref(), Some(GLOBAL_REGISTRY_KEY));
    }
}
