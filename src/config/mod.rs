#![forbid(unsafe_code)]

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::TodoError;
use crate::task::model::{DEFAULT_DATE_FORMAT, parse_date_format};
use crate::task::row::SwipeThresholds;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub ui: UiConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    #[serde(alias = "dir")]
    pub data_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.local/share/todui".to_owned(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UiConfig {
    pub dark_mode: bool,
    /// Columns one drag key press moves a row.
    pub swipe_step: u16,
    pub swipe_activation: u16,
    pub swipe_full: u16,
    pub date_format: String,
}

impl Default for UiConfig {
    fn default() -> Self {
        let swipe = SwipeThresholds::default();
        Self {
            dark_mode: false,
            swipe_step: 4,
            swipe_activation: swipe.activation,
            swipe_full: swipe.full,
            date_format: DEFAULT_DATE_FORMAT.to_owned(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    /// Log file used by the TUI. Empty means `<data_dir>/todui.log`.
    pub file: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            file: String::new(),
        }
    }
}

impl Config {
    pub fn data_dir(&self) -> anyhow::Result<PathBuf> {
        expand_path(&self.storage.data_dir)
    }

    pub fn log_file(&self) -> anyhow::Result<PathBuf> {
        if self.log.file.trim().is_empty() {
            return Ok(self.data_dir()?.join("todui.log"));
        }
        expand_path(&self.log.file)
    }

    #[must_use]
    pub fn swipe_thresholds(&self) -> SwipeThresholds {
        SwipeThresholds {
            activation: self.ui.swipe_activation,
            full: self.ui.swipe_full,
        }
    }

    pub fn validate(&self) -> Result<(), TodoError> {
        if self.storage.data_dir.trim().is_empty() {
            return Err(TodoError::Config(
                "storage.data_dir must not be empty".to_owned(),
            ));
        }
        if self.ui.swipe_step == 0 {
            return Err(TodoError::Config("ui.swipe_step must be >= 1".to_owned()));
        }
        if self.ui.swipe_activation == 0 {
            return Err(TodoError::Config(
                "ui.swipe_activation must be >= 1".to_owned(),
            ));
        }
        if self.ui.swipe_activation >= self.ui.swipe_full {
            return Err(TodoError::Config(
                "ui.swipe_activation must be smaller than ui.swipe_full".to_owned(),
            ));
        }
        if let Err(e) = parse_date_format(&self.ui.date_format) {
            return Err(TodoError::Config(format!("ui.date_format: {e}")));
        }
        if !LOG_LEVELS.contains(&self.log.level.trim()) {
            return Err(TodoError::Config(format!(
                "log.level must be one of: {}",
                LOG_LEVELS.join(", ")
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub config_file: PathBuf,
}

pub fn default_paths() -> anyhow::Result<ConfigPaths> {
    let unix = home_config_path_unix();
    if !cfg!(windows) || unix.exists() {
        return Ok(ConfigPaths { config_file: unix });
    }

    let proj = ProjectDirs::from("com", "todui", "todui")
        .context("failed to determine platform config directory")?;
    Ok(ConfigPaths {
        config_file: proj.config_dir().join("config.toml"),
    })
}

fn home_config_path_unix() -> PathBuf {
    let home = home_dir().unwrap_or_else(|| PathBuf::from("~"));
    home.join(".config").join("todui").join("config.toml")
}

fn home_dir() -> Option<PathBuf> {
    if let Some(v) = std::env::var_os("HOME") {
        return Some(PathBuf::from(v));
    }
    if let Some(v) = std::env::var_os("USERPROFILE") {
        return Some(PathBuf::from(v));
    }
    directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf())
}

#[must_use]
pub fn expand_tilde(input: &str) -> String {
    if let Some(rest) = input.strip_prefix("~/")
        && let Some(home) = home_dir()
    {
        return home.join(rest).to_string_lossy().to_string();
    }
    input.to_owned()
}

pub fn expand_path(input: &str) -> anyhow::Result<PathBuf> {
    let expanded = expand_env_vars(&expand_tilde(input.trim()));
    let p = PathBuf::from(expanded);
    if p.is_absolute() {
        return Ok(p);
    }
    let cwd = std::env::current_dir().context("failed to get current directory")?;
    Ok(cwd.join(p))
}

fn expand_env_vars(input: &str) -> String {
    // $VAR and ${VAR}; unknown vars stay as written.
    let Ok(re) = regex::Regex::new(r"\$\{?([A-Za-z_][A-Za-z0-9_]*)\}?") else {
        return input.to_owned();
    };
    re.replace_all(input, |caps: &regex::Captures<'_>| {
        std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_owned())
    })
    .to_string()
}

pub fn load() -> anyhow::Result<(Config, ConfigPaths)> {
    let paths = default_paths()?;
    let (_doc, cfg) = load_from_file(&paths.config_file)?;
    cfg.validate()?;
    Ok((cfg, paths))
}

pub fn list_resolved_toml() -> anyhow::Result<String> {
    let (cfg, _paths) = load()?;
    Ok(toml::to_string_pretty(&cfg)?)
}

pub fn get_value_string(key: &str) -> anyhow::Result<Option<String>> {
    let paths = default_paths()?;
    get_value_string_at_path(&paths.config_file, key)
}

pub fn set_value_string(key: &str, value: &str) -> anyhow::Result<()> {
    let paths = default_paths()?;
    set_value_string_at_path(&paths.config_file, key, value)
}

fn load_from_file(path: &Path) -> anyhow::Result<(toml_edit::DocumentMut, Config)> {
    if !path.exists() {
        return Ok((toml_edit::DocumentMut::new(), Config::default()));
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;

    let doc = raw
        .parse::<toml_edit::DocumentMut>()
        .with_context(|| format!("failed to parse TOML in {}", path.display()))?;

    let cfg: Config = toml::from_str(&raw)
        .with_context(|| format!("failed to deserialize TOML in {}", path.display()))?;
    Ok((doc, cfg))
}

pub fn get_value_string_at_path(path: &Path, key: &str) -> anyhow::Result<Option<String>> {
    let (_doc, cfg) = load_from_file(path)?;
    cfg.validate()?;

    let norm = normalize_key(key);
    Ok(lookup_value(&cfg, &norm).map(format_value_for_stdout))
}

/// Writes one dotted key into the config file, keeping the rest of the
/// document (comments included) as it was.
pub fn set_value_string_at_path(path: &Path, key: &str, value: &str) -> anyhow::Result<()> {
    let (mut doc, _cfg) = load_from_file(path)?;

    let norm_key = normalize_key(key);
    let key_type = key_type(&norm_key).ok_or_else(|| TodoError::InvalidConfigKey(key.to_owned()))?;
    let item = parse_value(key, value, key_type)?;
    apply_set(&mut doc, &norm_key, item)?;

    let new_raw = doc.to_string();
    let new_cfg: Config = toml::from_str(&new_raw)
        .with_context(|| format!("config update produced invalid TOML for {}", path.display()))?;
    new_cfg.validate()?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(path, new_raw.as_bytes())
        .with_context(|| format!("failed to write {}", path.display()))?;

    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyType {
    Bool,
    Int,
    String,
    Enum(&'static [&'static str]),
}

fn normalize_key(key: &str) -> String {
    match key.trim() {
        "data_dir" | "storage.dir" => "storage.data_dir",
        "dark_mode" | "theme.dark" => "ui.dark_mode",
        "log_level" => "log.level",
        other => other,
    }
    .to_owned()
}

fn key_type(key: &str) -> Option<KeyType> {
    Some(match key {
        "storage.data_dir" | "ui.date_format" | "log.file" => KeyType::String,
        "ui.dark_mode" => KeyType::Bool,
        "ui.swipe_step" | "ui.swipe_activation" | "ui.swipe_full" => KeyType::Int,
        "log.level" => KeyType::Enum(LOG_LEVELS),
        _ => return None,
    })
}

fn parse_value(key: &str, value: &str, key_type: KeyType) -> Result<toml_edit::Item, TodoError> {
    let invalid = |msg: String| TodoError::InvalidConfigValue {
        key: key.to_owned(),
        msg,
    };
    Ok(match key_type {
        KeyType::Bool => toml_edit::value(parse_bool(value).map_err(invalid)?),
        KeyType::Int => toml_edit::value(parse_int(value).map_err(invalid)?),
        KeyType::String => toml_edit::value(value),
        KeyType::Enum(allowed) => {
            let v = value.trim();
            if !allowed.contains(&v) {
                return Err(invalid(format!("must be one of: {}", allowed.join(", "))));
            }
            toml_edit::value(v)
        }
    })
}

fn parse_bool(s: &str) -> Result<bool, String> {
    match s.trim() {
        "true" | "on" | "yes" => Ok(true),
        "false" | "off" | "no" => Ok(false),
        other => Err(format!("expected true|false, got '{other}'")),
    }
}

fn parse_int(s: &str) -> Result<i64, String> {
    let n = s
        .trim()
        .parse::<i64>()
        .map_err(|e| format!("expected integer, got '{s}': {e}"))?;
    if !(0..=i64::from(u16::MAX)).contains(&n) {
        return Err(format!("expected 0..={}, got {n}", u16::MAX));
    }
    Ok(n)
}

fn apply_set(
    doc: &mut toml_edit::DocumentMut,
    key: &str,
    value: toml_edit::Item,
) -> anyhow::Result<()> {
    let parts: Vec<&str> = key.split('.').filter(|p| !p.is_empty()).collect();
    let Some((leaf, tables)) = parts.split_last() else {
        return Err(TodoError::InvalidConfigKey(key.to_owned()).into());
    };

    let mut cur = doc.as_table_mut();
    for seg in tables {
        if !cur.contains_key(seg) {
            cur.insert(seg, toml_edit::Item::Table(toml_edit::Table::new()));
        }
        cur = cur[seg].as_table_mut().ok_or_else(|| {
            TodoError::Config(format!("cannot set {key}: '{seg}' is not a table"))
        })?;
    }

    cur.insert(leaf, value);
    Ok(())
}

fn lookup_value(cfg: &Config, key: &str) -> Option<serde_json::Value> {
    let mut v = serde_json::to_value(cfg).ok()?;
    for seg in key.split('.').filter(|s| !s.is_empty()) {
        match v {
            serde_json::Value::Object(mut map) => {
                v = map.remove(seg)?;
            }
            _ => return None,
        }
    }
    Some(v)
}

fn format_value_for_stdout(v: serde_json::Value) -> String {
    match v {
        serde_json::Value::Null => "null".to_owned(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) => s,
        other => serde_json::to_string_pretty(&other).unwrap_or_else(|_| other.to_string()),
    }
}
