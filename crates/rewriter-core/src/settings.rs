use crate::error::ConfigurationError;
use crate::item::ItemId;
use serde::Deserialize;
use typed_builder::TypedBuilder;

pub const DEFAULT_CORE_DATABASE: &str = "core";
pub const DEFAULT_IGNORE_FOR_SITES: &str = "shell,login";
pub const DEFAULT_IGNORED_PATH_PREFIXES: [&str; 2] = ["/mvc/", "/~/media/"];

/// Settings of the rewriter, populated once at startup.
///
/// # Example
///
/// ```rust
/// use rewriter_core::{ItemId, RewriterSettings};
///
/// let settings = RewriterSettings::builder()
///     .rules_folder_id(ItemId::new("rules").unwrap())
///     .remove_trailing_slash(true)
///     .enabled(true)
///     .build();
///
/// assert!(settings.is_ignored_site("Shell"));
/// assert!(settings.is_core_database("CORE"));
/// ```
#[derive(Debug, Clone, TypedBuilder, Deserialize)]
pub struct RewriterSettings {
    /// Item whose descendants are the rewrite rules.
    pub rules_folder_id: ItemId,

    /// Item holding the bulk rules table, if any.
    #[builder(default, setter(strip_option))]
    #[serde(default)]
    pub rules_table_item_id: Option<ItemId>,

    /// Redirect paths with trailing slashes to the same path without them.
    pub remove_trailing_slash: bool,

    /// Write an audit entry for every redirect.
    #[builder(default)]
    #[serde(default)]
    pub log_rewrites: bool,

    #[builder(default)]
    #[serde(default)]
    pub enabled: bool,

    /// Requests resolved to this database are never rewritten.
    #[builder(default = DEFAULT_CORE_DATABASE.to_string())]
    #[serde(default = "default_core_database")]
    pub core_database: String,

    /// Names of sites that are never rewritten.
    #[builder(default = parse_sites(DEFAULT_IGNORE_FOR_SITES))]
    #[serde(default = "default_ignore_for_sites")]
    pub ignore_for_sites: Vec<String>,

    /// Raw path prefixes that are never rewritten.
    #[builder(default = default_ignored_path_prefixes())]
    #[serde(default = "default_ignored_path_prefixes")]
    pub ignored_path_prefixes: Vec<String>,
}

impl RewriterSettings {
    pub fn is_ignored_site(&self, site: &str) -> bool {
        self.ignore_for_sites
            .iter()
            .any(|ignored| ignored.eq_ignore_ascii_case(site))
    }

    pub fn is_core_database(&self, database: &str) -> bool {
        self.core_database.eq_ignore_ascii_case(database)
    }

    pub fn is_ignored_path(&self, raw_path: &str) -> bool {
        self.ignored_path_prefixes.iter().any(|prefix| {
            raw_path
                .get(..prefix.len())
                .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
        })
    }
}

/// Parses a comma-separated site list, lower-casing names and dropping
/// empty entries.
pub fn parse_sites(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|site| site.trim().to_lowercase())
        .filter(|site| !site.is_empty())
        .collect()
}

/// Parses a boolean setting, accepting `true` or `false` in any case.
///
/// # Arguments
///
/// * `name` - The setting name reported on failure
/// * `value` - The raw setting value
pub fn parse_bool(name: &'static str, value: &str) -> Result<bool, ConfigurationError> {
    let trimmed = value.trim();
    if trimmed.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if trimmed.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        Err(ConfigurationError::InvalidSetting {
            name,
            value: value.to_string(),
            expected: "true or false",
        })
    }
}

fn default_core_database() -> String {
    DEFAULT_CORE_DATABASE.to_string()
}

fn default_ignore_for_sites() -> Vec<String> {
    parse_sites(DEFAULT_IGNORE_FOR_SITES)
}

fn default_ignored_path_prefixes() -> Vec<String> {
    DEFAULT_IGNORED_PATH_PREFIXES
        .iter()
        .map(|prefix| prefix.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> RewriterSettings {
        RewriterSettings::builder()
            .rules_folder_id(ItemId::new_unchecked("rules"))
            .remove_trailing_slash(false)
            .build()
    }

    #[test]
    fn defaults() {
        let s = settings();
        assert!(!s.enabled);
        assert!(!s.log_rewrites);
        assert_eq!(s.core_database, "core");
        assert_eq!(s.ignore_for_sites, vec!["shell", "login"]);
        assert!(s.rules_table_item_id.is_none());
    }

    #[test]
    fn parse_sites_drops_empty_entries() {
        assert_eq!(parse_sites("Shell,,login, "), vec!["shell", "login"]);
        assert!(parse_sites("").is_empty());
    }

    #[test]
    fn ignored_paths_match_prefix_case_insensitively() {
        let s = settings();
        assert!(s.is_ignored_path("/mvc/controller"));
        assert!(s.is_ignored_path("/~/MEDIA/logo.png"));
        assert!(!s.is_ignored_path("/media/logo.png"));
        assert!(!s.is_ignored_path("/mv"));
    }

    #[test]
    fn parse_bool_is_case_insensitive() {
        assert!(parse_bool("Enabled", "True").unwrap());
        assert!(!parse_bool("Enabled", " false ").unwrap());

        let err = parse_bool("Enabled", "yes").unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::InvalidSetting { name: "Enabled", .. }
        ));
    }

    #[test]
    fn deserializes_with_defaults() {
        let s: RewriterSettings = serde_json::from_str(
            r#"{"rules_folder_id": "rules", "remove_trailing_slash": true}"#,
        )
        .unwrap();
        assert!(s.remove_trailing_slash);
        assert_eq!(s.core_database, "core");
        assert!(s.is_ignored_site("login"));
    }

    #[test]
    fn missing_required_setting_fails() {
        let result = serde_json::from_str::<RewriterSettings>(r#"{"rules_folder_id": "rules"}"#);
        assert!(result.is_err());
    }
}
