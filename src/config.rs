use std::collections::{BTreeMap, HashMap};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::logging;
use crate::source::{Mapper, SourceConfig};

const DEFAULT_ENV_PREFIX: &str = "POST_ROULETTE";
pub const DEFAULT_TIMEZONE: &str = "America/New_York";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub view: ViewConfig,
    #[serde(default)]
    pub keys: Keymap,
    #[serde(default = "default_sources")]
    pub sources: BTreeMap<String, SourceConfig>,
    #[serde(default)]
    pub log: LogConfig,
    /// IANA zone used to format epoch timestamps from export files.
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            storage: StorageConfig::default(),
            view: ViewConfig::default(),
            keys: Keymap::default(),
            sources: default_sources(),
            log: LogConfig::default(),
            timezone: default_timezone(),
        }
    }
}

fn default_timezone() -> String {
    DEFAULT_TIMEZONE.to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_sources() -> BTreeMap<String, SourceConfig> {
    let mut sources = BTreeMap::new();
    sources.insert(
        "Facebook".to_string(),
        SourceConfig {
            name: "facebook".to_string(),
            data_file: "fb_posts.json".to_string(),
            mapper: Mapper::FacebookGroup,
        },
    );
    sources
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct StorageConfig {
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogConfig {
    #[serde(default)]
    pub file: Option<PathBuf>,
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            file: None,
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

/// Screen geometry, in terminal cells.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ViewConfig {
    #[serde(default = "default_width")]
    pub width: u16,
    #[serde(default = "default_card_height")]
    pub card_height: u16,
    #[serde(default = "default_padding_left")]
    pub padding_left: u16,
    #[serde(default = "default_padding_top")]
    pub padding_top: u16,
}

/// Columns taken by the card border and inner margin.
pub const CARD_HORIZONTAL_ALLOWANCE: u16 = 6;
/// Rows taken by the border, datetime, position and pagination rows.
pub const CARD_VERTICAL_ALLOWANCE: u16 = 9;

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            card_height: default_card_height(),
            padding_left: default_padding_left(),
            padding_top: default_padding_top(),
        }
    }
}

fn default_width() -> u16 {
    100
}

fn default_card_height() -> u16 {
    20
}

fn default_padding_left() -> u16 {
    2
}

fn default_padding_top() -> u16 {
    1
}

impl ViewConfig {
    pub fn page_width(&self) -> usize {
        self.width.saturating_sub(CARD_HORIZONTAL_ALLOWANCE) as usize
    }

    pub fn page_height(&self) -> usize {
        self.card_height.saturating_sub(CARD_VERTICAL_ALLOWANCE) as usize
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width <= CARD_HORIZONTAL_ALLOWANCE {
            return Err(ConfigError::CardTooNarrow {
                width: self.width,
                min: CARD_HORIZONTAL_ALLOWANCE + 1,
            });
        }
        if self.card_height <= CARD_VERTICAL_ALLOWANCE {
            return Err(ConfigError::CardTooShort {
                height: self.card_height,
                min: CARD_VERTICAL_ALLOWANCE + 1,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    NextPost,
    PreviousPost,
    ToggleSave,
    RandomPost,
    Quit,
    NextPage,
    PreviousPage,
    ResetCursor,
}

impl Action {
    pub const ALL: [Action; 8] = [
        Action::NextPost,
        Action::PreviousPost,
        Action::ToggleSave,
        Action::RandomPost,
        Action::Quit,
        Action::NextPage,
        Action::PreviousPage,
        Action::ResetCursor,
    ];

    pub fn config_key(self) -> &'static str {
        match self {
            Action::NextPost => "next_post",
            Action::PreviousPost => "previous_post",
            Action::ToggleSave => "toggle_save",
            Action::RandomPost => "random_post",
            Action::Quit => "quit",
            Action::NextPage => "next_page",
            Action::PreviousPage => "previous_page",
            Action::ResetCursor => "reset_cursor",
        }
    }
}

/// One character per action, matched case-insensitively.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Keymap {
    #[serde(default = "default_next_post")]
    pub next_post: char,
    #[serde(default = "default_previous_post")]
    pub previous_post: char,
    #[serde(default = "default_toggle_save")]
    pub toggle_save: char,
    #[serde(default = "default_random_post")]
    pub random_post: char,
    #[serde(default = "default_quit")]
    pub quit: char,
    #[serde(default = "default_next_page")]
    pub next_page: char,
    #[serde(default = "default_previous_page")]
    pub previous_page: char,
    #[serde(default = "default_reset_cursor")]
    pub reset_cursor: char,
}

impl Default for Keymap {
    fn default() -> Self {
        Self {
            next_post: default_next_post(),
            previous_post: default_previous_post(),
            toggle_save: default_toggle_save(),
            random_post: default_random_post(),
            quit: default_quit(),
            next_page: default_next_page(),
            previous_page: default_previous_page(),
            reset_cursor: default_reset_cursor(),
        }
    }
}

fn default_next_post() -> char {
    'M'
}

fn default_previous_post() -> char {
    'N'
}

fn default_toggle_save() -> char {
    'T'
}

fn default_random_post() -> char {
    'R'
}

fn default_quit() -> char {
    'Q'
}

fn default_next_page() -> char {
    'L'
}

fn default_previous_page() -> char {
    'K'
}

fn default_reset_cursor() -> char {
    'C'
}

impl Keymap {
    pub fn key(&self, action: Action) -> char {
        match action {
            Action::NextPost => self.next_post,
            Action::PreviousPost => self.previous_post,
            Action::ToggleSave => self.toggle_save,
            Action::RandomPost => self.random_post,
            Action::Quit => self.quit,
            Action::NextPage => self.next_page,
            Action::PreviousPage => self.previous_page,
            Action::ResetCursor => self.reset_cursor,
        }
    }

    fn key_mut(&mut self, action: Action) -> &mut char {
        match action {
            Action::NextPost => &mut self.next_post,
            Action::PreviousPost => &mut self.previous_post,
            Action::ToggleSave => &mut self.toggle_save,
            Action::RandomPost => &mut self.random_post,
            Action::Quit => &mut self.quit,
            Action::NextPage => &mut self.next_page,
            Action::PreviousPage => &mut self.previous_page,
            Action::ResetCursor => &mut self.reset_cursor,
        }
    }

    /// Key label as shown on screen.
    pub fn label(&self, action: Action) -> char {
        self.key(action).to_ascii_uppercase()
    }

    pub fn action_for(&self, pressed: char) -> Option<Action> {
        Action::ALL
            .into_iter()
            .find(|action| self.key(*action).eq_ignore_ascii_case(&pressed))
    }

    pub fn validate(&self) -> Result<(), KeymapError> {
        for (i, action) in Action::ALL.iter().enumerate() {
            let key = self.key(*action);
            if !key.is_ascii_alphanumeric() {
                return Err(KeymapError::Unsupported {
                    action: action.config_key(),
                    key,
                });
            }
            if let Some(other) = Action::ALL[..i]
                .iter()
                .find(|other| self.key(**other).eq_ignore_ascii_case(&key))
            {
                return Err(KeymapError::Duplicate {
                    key,
                    first: other.config_key(),
                    second: action.config_key(),
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeymapError {
    #[error("config: key {key:?} for {action} must be a single letter or digit")]
    Unsupported { action: &'static str, key: char },
    #[error("config: key {key:?} is bound to both {first} and {second}")]
    Duplicate {
        key: char,
        first: &'static str,
        second: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Keymap(#[from] KeymapError),
    #[error("config: view.width {width} is too narrow (minimum {min})")]
    CardTooNarrow { width: u16, min: u16 },
    #[error("config: view.card_height {height} is too short (minimum {min})")]
    CardTooShort { height: u16, min: u16 },
    #[error("config: no sources configured")]
    NoSources,
    #[error("config: unknown timezone {0:?}")]
    UnknownTimezone(String),
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.keys.validate()?;
        self.view.validate()?;
        if self.sources.is_empty() {
            return Err(ConfigError::NoSources);
        }
        self.zone()?;
        Ok(())
    }

    pub fn zone(&self) -> Result<Tz, ConfigError> {
        self.timezone
            .trim()
            .parse::<Tz>()
            .map_err(|_| ConfigError::UnknownTimezone(self.timezone.clone()))
    }

    /// Finds a configured source by its selector, ignoring case.
    pub fn source(&self, selector: &str) -> Option<&SourceConfig> {
        self.sources
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(selector))
            .map(|(_, source)| source)
    }

    pub fn source_names(&self) -> Vec<&str> {
        self.sources.keys().map(String::as_str).collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub config_file: Option<PathBuf>,
    pub env_prefix: Option<String>,
}

pub fn load(options: LoadOptions) -> Result<Config> {
    let mut cfg = if let Some(path) = options.config_file.as_ref() {
        read_config_file(path)?
    } else if let Some(default_path) = default_config_path().filter(|path| path.exists()) {
        read_config_file(&default_path)?
    } else {
        Config::default()
    };

    let prefix = options.env_prefix.as_deref().unwrap_or(DEFAULT_ENV_PREFIX);
    apply_env(&mut cfg, prefix);

    cfg.validate()?;
    Ok(cfg)
}

fn read_config_file(path: &Path) -> Result<Config> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("config: read {}", path.display()))?;
    let config: Config = serde_yaml::from_str(&data)
        .with_context(|| format!("config: parse {}", path.display()))?;
    Ok(config)
}

fn apply_env(cfg: &mut Config, prefix: &str) {
    for key in apply_vars(cfg, prefix, env::vars()) {
        tracing::warn!(key = %key, "ignoring unknown config override");
    }
}

/// Applies `<PREFIX>_SECTION__FIELD` overrides and returns the keys nothing
/// consumed. The log filter variable shares the prefix and is left alone.
fn apply_vars<I>(cfg: &mut Config, prefix: &str, vars: I) -> Vec<String>
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut map: HashMap<String, String> = HashMap::new();
    let upper_prefix = format!("{}_", prefix.to_uppercase());

    for (key, value) in vars {
        if key == logging::LOG_ENV {
            continue;
        }
        if let Some(stripped) = key.strip_prefix(&upper_prefix) {
            let normalized = stripped.to_ascii_lowercase().replace("__", ".");
            map.insert(normalized, value);
        }
    }

    let mut ignored: Vec<String> = map
        .into_iter()
        .filter_map(|(key, value)| (!apply_env_value(cfg, &key, value)).then_some(key))
        .collect();
    ignored.sort();
    ignored
}

fn apply_env_value(cfg: &mut Config, key: &str, value: String) -> bool {
    match key {
        "data_dir" => cfg.data_dir = PathBuf::from(value),
        "storage.path" => cfg.storage.path = Some(PathBuf::from(value)),
        "log.file" => cfg.log.file = Some(PathBuf::from(value)),
        "log.level" => cfg.log.level = value,
        "timezone" => cfg.timezone = value,
        "view.width" => set_parsed(&mut cfg.view.width, &value),
        "view.card_height" => set_parsed(&mut cfg.view.card_height, &value),
        "view.padding_left" => set_parsed(&mut cfg.view.padding_left, &value),
        "view.padding_top" => set_parsed(&mut cfg.view.padding_top, &value),
        _ => {
            let Some(field) = key.strip_prefix("keys.") else {
                return false;
            };
            let Some(action) = Action::ALL
                .into_iter()
                .find(|action| action.config_key() == field)
            else {
                return false;
            };
            let mut chars = value.chars();
            if let (Some(ch), None) = (chars.next(), chars.next()) {
                *cfg.keys.key_mut(action) = ch;
            }
        }
    }
    true
}

fn set_parsed(slot: &mut u16, value: &str) {
    if let Ok(parsed) = value.trim().parse::<u16>() {
        *slot = parsed;
    }
}

pub fn default_path() -> Option<PathBuf> {
    default_config_path()
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("post-roulette").join("config.yaml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_are_valid() {
        let cfg = Config::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.view.page_width(), 94);
        assert_eq!(cfg.view.page_height(), 11);
        assert_eq!(cfg.source("facebook").unwrap().name, "facebook");
    }

    #[test]
    fn keymap_matches_case_insensitively() {
        let keys = Keymap::default();
        assert_eq!(keys.action_for('q'), Some(Action::Quit));
        assert_eq!(keys.action_for('Q'), Some(Action::Quit));
        assert_eq!(keys.action_for('m'), Some(Action::NextPost));
        assert_eq!(keys.action_for('z'), None);
        assert_eq!(keys.label(Action::ResetCursor), 'C');
    }

    #[test]
    fn keymap_rejects_duplicates_ignoring_case() {
        let keys = Keymap {
            quit: 'm',
            ..Keymap::default()
        };
        assert_eq!(
            keys.validate(),
            Err(KeymapError::Duplicate {
                key: 'm',
                first: "next_post",
                second: "quit",
            })
        );
    }

    #[test]
    fn keymap_rejects_non_alphanumeric() {
        let keys = Keymap {
            toggle_save: ' ',
            ..Keymap::default()
        };
        assert!(matches!(
            keys.validate(),
            Err(KeymapError::Unsupported { action: "toggle_save", .. })
        ));
    }

    #[test]
    fn geometry_must_leave_room_for_text() {
        let view = ViewConfig {
            card_height: 9,
            ..ViewConfig::default()
        };
        assert!(matches!(view.validate(), Err(ConfigError::CardTooShort { .. })));
        let view = ViewConfig {
            width: 6,
            ..ViewConfig::default()
        };
        assert!(matches!(view.validate(), Err(ConfigError::CardTooNarrow { .. })));
    }

    #[test]
    fn reads_partial_yaml_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(
            &path,
            r#"
data_dir: /srv/exports
keys:
  quit: x
sources:
  Group:
    name: group
    data_file: group.json
    mapper: plain
"#,
        )
        .unwrap();
        let cfg = load(LoadOptions {
            config_file: Some(path),
            env_prefix: Some("POST_ROULETTE_TEST_FILE".into()),
        })
        .unwrap();
        assert_eq!(cfg.data_dir, PathBuf::from("/srv/exports"));
        assert_eq!(cfg.keys.quit, 'x');
        assert_eq!(cfg.keys.next_post, 'M');
        assert_eq!(cfg.view, ViewConfig::default());
        assert_eq!(cfg.source("group").unwrap().mapper, Mapper::Plain);
        assert!(cfg.source("facebook").is_none());
    }

    #[test]
    fn invalid_file_keymap_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "keys:\n  quit: t\n").unwrap();
        let err = load(LoadOptions {
            config_file: Some(path),
            env_prefix: Some("POST_ROULETTE_TEST_INVALID".into()),
        })
        .unwrap_err();
        assert!(err.to_string().contains("bound to both"));
    }

    #[test]
    fn log_filter_variable_is_not_an_override() {
        let mut cfg = Config::default();
        let ignored = apply_vars(
            &mut cfg,
            "POST_ROULETTE",
            vec![
                (logging::LOG_ENV.to_string(), "debug".to_string()),
                ("POST_ROULETTE_TIMEZONE".to_string(), "Europe/Berlin".to_string()),
                ("POST_ROULETTE_NOPE".to_string(), "1".to_string()),
            ],
        );
        assert_eq!(ignored, vec!["nope".to_string()]);
        assert_eq!(cfg.timezone, "Europe/Berlin");
        assert_eq!(cfg.log, LogConfig::default());
    }

    #[test]
    fn timezone_defaults_and_validates() {
        let mut cfg = Config::default();
        assert_eq!(cfg.zone().unwrap(), chrono_tz::America::New_York);
        cfg.timezone = "Mars/Olympus_Mons".into();
        assert_eq!(
            cfg.validate().unwrap_err(),
            ConfigError::UnknownTimezone("Mars/Olympus_Mons".into())
        );
    }

    #[test]
    fn env_overrides() {
        env::set_var("POST_ROULETTE_TEST_ENV_VIEW__WIDTH", "120");
        env::set_var("POST_ROULETTE_TEST_ENV_KEYS__QUIT", "x");
        let mut cfg = Config::default();
        apply_env(&mut cfg, "POST_ROULETTE_TEST_ENV");
        env::remove_var("POST_ROULETTE_TEST_ENV_VIEW__WIDTH");
        env::remove_var("POST_ROULETTE_TEST_ENV_KEYS__QUIT");
        assert_eq!(cfg.view.width, 120);
        assert_eq!(cfg.keys.quit, 'x');
    }
}
