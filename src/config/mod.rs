//! Configuration management for `traq_rust`.
//!
//! Layers, lowest to highest precedence:
//! defaults, user `~/.config/traq/config.yaml`, project `.traq/config.yaml`,
//! `TRAQ_*` environment variables, CLI flags.
//!
//! YAML is flattened to dotted keys, so
//!
//! ```yaml
//! per-page: 50
//! default-filter:
//!   status: all.open
//!   type: [Defect, Task]
//! ```
//!
//! yields `per-page = 50`, `default-filter.status = all.open` and
//! `default-filter.type = Defect,Task`. Sequences also keep their items, so
//! a listed default filter reaches the query as a list, never re-split.

use crate::error::{Result, TraqError};
use crate::filter::{FilterRequest, RawValue, TicketSort};
use crate::storage::SqliteStorage;
use std::collections::{BTreeMap, HashMap};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Name of the workspace directory.
pub const TRAQ_DIR_NAME: &str = ".traq";
/// Database file inside the workspace directory.
pub const DEFAULT_DB_FILENAME: &str = "traq.db";
pub const DEFAULT_PER_PAGE: usize = 25;
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 30_000;

const ENV_PREFIX: &str = "TRAQ_";
/// `TRAQ_*` variables that are not config keys.
const NON_CONFIG_ENV: &[&str] = &["DIR", "LOG_FORMAT"];
const DEFAULT_FILTER_PREFIX: &str = "default-filter.";

/// Discover the active `.traq` directory.
///
/// Honors `TRAQ_DIR` when set, otherwise walks up from `start` (or CWD).
///
/// # Errors
///
/// Returns `NotInitialized` if no workspace is found.
pub fn discover_traq_dir(start: Option<&Path>) -> Result<PathBuf> {
    let env_override = env::var_os("TRAQ_DIR").map(PathBuf::from);
    discover_traq_dir_with_env(start, env_override.as_deref())
}

fn discover_traq_dir_with_env(start: Option<&Path>, env_override: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = env_override {
        if !path.as_os_str().is_empty() && path.is_dir() {
            return Ok(path.to_path_buf());
        }
    }

    let mut current = match start {
        Some(path) => path.to_path_buf(),
        None => env::current_dir()?,
    };

    loop {
        let candidate = current.join(TRAQ_DIR_NAME);
        if candidate.is_dir() {
            return Ok(candidate);
        }

        if !current.pop() {
            break;
        }
    }

    Err(TraqError::NotInitialized)
}

/// A flattened set of configuration keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigLayer {
    pub values: HashMap<String, String>,
    /// Items of keys set from a YAML sequence; `values` holds them joined.
    pub lists: HashMap<String, Vec<String>>,
}

impl ConfigLayer {
    /// Merge another layer on top of this one (higher precedence wins).
    pub fn merge_from(&mut self, other: &Self) {
        for (key, value) in &other.values {
            self.values.insert(key.clone(), value.clone());
            match other.lists.get(key) {
                Some(items) => {
                    self.lists.insert(key.clone(), items.clone());
                }
                None => {
                    self.lists.remove(key);
                }
            }
        }
    }

    /// Merge multiple layers in precedence order (lowest to highest).
    #[must_use]
    pub fn merge_layers(layers: &[Self]) -> Self {
        let mut merged = Self::default();
        for layer in layers {
            merged.merge_from(layer);
        }
        merged
    }

    /// Build a layer from a YAML file path. Missing files return empty config.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn from_yaml(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    /// Build a layer from YAML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML cannot be parsed.
    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        let value: serde_yaml::Value = serde_yaml::from_str(contents)?;
        let mut layer = Self::default();
        flatten_yaml(&value, "", &mut layer);
        Ok(layer)
    }

    /// Build a layer from `TRAQ_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_vars(env::vars())
    }

    /// Build a layer from `(name, value)` pairs shaped like environment variables.
    ///
    /// `TRAQ_PER_PAGE` maps to `per-page`; `TRAQ_DEFAULT_FILTER_ASSIGNED_TO`
    /// maps to `default-filter.assigned_to`.
    #[must_use]
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut layer = Self::default();
        for (key, value) in vars {
            let Some(stripped) = key.as_ref().strip_prefix(ENV_PREFIX) else {
                continue;
            };
            if NON_CONFIG_ENV.contains(&stripped) {
                continue;
            }
            let lowered = stripped.to_lowercase();
            let key = match lowered.strip_prefix("default_filter_") {
                Some(filter) => format!("{DEFAULT_FILTER_PREFIX}{filter}"),
                None => lowered,
            };
            layer.set(&key, value.into());
        }
        layer
    }

    /// Set a key, normalizing its spelling.
    pub fn set(&mut self, key: &str, value: String) {
        let key = normalize_key(key);
        self.lists.remove(&key);
        self.values.insert(key, value);
    }

    /// Set a list-valued key. `get` sees the items joined with `,`.
    pub fn set_list(&mut self, key: &str, items: Vec<String>) {
        let key = normalize_key(key);
        self.values.insert(key.clone(), items.join(","));
        self.lists.insert(key, items);
    }

    #[must_use]
    pub fn get_list(&self, key: &str) -> Option<&[String]> {
        self.lists.get(&normalize_key(key)).map(Vec::as_slice)
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(&normalize_key(key)).map(String::as_str)
    }

    fn get_trimmed(&self, key: &str) -> Option<&str> {
        self.get(key).map(str::trim).filter(|value| !value.is_empty())
    }
}

/// CLI overrides for config loading (optional).
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub db: Option<PathBuf>,
    pub lock_timeout: Option<u64>,
    pub per_page: Option<usize>,
    pub order: Option<String>,
}

impl CliOverrides {
    #[must_use]
    pub fn as_layer(&self) -> ConfigLayer {
        let mut layer = ConfigLayer::default();

        if let Some(path) = &self.db {
            layer.set("db", path.to_string_lossy().to_string());
        }
        if let Some(lock_timeout) = self.lock_timeout {
            layer.set("lock-timeout", lock_timeout.to_string());
        }
        if let Some(per_page) = self.per_page {
            layer.set("per-page", per_page.to_string());
        }
        if let Some(order) = &self.order {
            layer.set("order", order.clone());
        }

        layer
    }
}

/// Default config layer (lowest precedence).
#[must_use]
pub fn default_config_layer() -> ConfigLayer {
    let mut layer = ConfigLayer::default();
    layer.set("per-page", DEFAULT_PER_PAGE.to_string());
    layer.set("order", "id".to_string());
    layer.set("default-filter.status", crate::filter::ALL_OPEN.to_string());
    layer
}

/// Load project config (`.traq/config.yaml`).
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_project_config(traq_dir: &Path) -> Result<ConfigLayer> {
    ConfigLayer::from_yaml(&traq_dir.join("config.yaml"))
}

/// Load user config (`~/.config/traq/config.yaml`).
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_user_config() -> Result<ConfigLayer> {
    let Ok(home) = env::var("HOME") else {
        return Ok(ConfigLayer::default());
    };
    let path = Path::new(&home)
        .join(".config")
        .join("traq")
        .join("config.yaml");
    ConfigLayer::from_yaml(&path)
}

/// Load configuration with the full precedence order.
///
/// `traq_dir` is `None` before a workspace exists (e.g. `tq init`).
///
/// # Errors
///
/// Returns an error if any config file cannot be read or parsed.
pub fn load_config(traq_dir: Option<&Path>, cli: &CliOverrides) -> Result<ConfigLayer> {
    let project = match traq_dir {
        Some(dir) => load_project_config(dir)?,
        None => ConfigLayer::default(),
    };

    let merged = ConfigLayer::merge_layers(&[
        default_config_layer(),
        load_user_config()?,
        project,
        ConfigLayer::from_env(),
        cli.as_layer(),
    ]);
    debug!(keys = merged.values.len(), "configuration loaded");
    Ok(merged)
}

/// Database path: the `db` key, or `traq.db` inside the workspace.
///
/// A relative `db` value is taken relative to the workspace directory.
#[must_use]
pub fn db_path_from_layer(layer: &ConfigLayer, traq_dir: &Path) -> PathBuf {
    match layer.get_trimmed("db") {
        Some(value) => {
            let path = PathBuf::from(value);
            if path.is_absolute() {
                path
            } else {
                traq_dir.join(path)
            }
        }
        None => traq_dir.join(DEFAULT_DB_FILENAME),
    }
}

/// Busy timeout in milliseconds.
///
/// # Errors
///
/// Returns a config error if the value is not a number.
pub fn lock_timeout_from_layer(layer: &ConfigLayer) -> Result<u64> {
    layer
        .get_trimmed("lock-timeout")
        .map_or(Ok(DEFAULT_LOCK_TIMEOUT_MS), |value| {
            value.parse::<u64>().map_err(|_| {
                TraqError::Config(format!("lock-timeout must be milliseconds, got '{value}'"))
            })
        })
}

/// Page size for listings.
///
/// # Errors
///
/// Returns a config error if the value is not a positive number.
pub fn per_page_from_layer(layer: &ConfigLayer) -> Result<usize> {
    let Some(value) = layer.get_trimmed("per-page") else {
        return Ok(DEFAULT_PER_PAGE);
    };
    match value.parse::<usize>() {
        Ok(per_page) if per_page > 0 => Ok(per_page),
        _ => Err(TraqError::Config(format!(
            "per-page must be a positive number, got '{value}'"
        ))),
    }
}

/// Listing order.
///
/// # Errors
///
/// Returns a validation error if the order key is not recognized.
pub fn order_from_layer(layer: &ConfigLayer) -> Result<TicketSort> {
    layer
        .get_trimmed("order")
        .map_or_else(|| Ok(TicketSort::default()), str::parse)
}

/// Filters applied when a listing is requested without any.
///
/// Returned in name order so runs are reproducible. An empty value
/// disables that default. Keys set from a YAML sequence stay lists.
#[must_use]
pub fn default_filters_from_layer(layer: &ConfigLayer) -> FilterRequest {
    let defaults: BTreeMap<&str, RawValue> = layer
        .values
        .iter()
        .filter_map(|(key, value)| {
            let name = key.strip_prefix(DEFAULT_FILTER_PREFIX)?;
            if name.is_empty() || value.trim().is_empty() {
                return None;
            }
            let raw = layer.lists.get(key).map_or_else(
                || RawValue::from(value.as_str()),
                |items| RawValue::List(items.clone()),
            );
            Some((name, raw))
        })
        .collect();
    defaults.into_iter().collect()
}

/// Open storage for an existing workspace.
///
/// # Errors
///
/// Returns `DatabaseNotFound` if the database file is missing, or an error
/// if it cannot be opened.
pub fn open_storage(traq_dir: &Path, layer: &ConfigLayer) -> Result<SqliteStorage> {
    let db_path = db_path_from_layer(layer, traq_dir);
    if !db_path.exists() {
        return Err(TraqError::DatabaseNotFound { path: db_path });
    }
    let lock_timeout = lock_timeout_from_layer(layer)?;
    SqliteStorage::open_with_timeout(&db_path, Some(lock_timeout))
}

/// An opened workspace: storage plus the configuration it was opened with.
#[derive(Debug)]
pub struct StorageContext {
    pub storage: SqliteStorage,
    pub layer: ConfigLayer,
    pub traq_dir: PathBuf,
}

/// Discover the workspace from the CWD, load every config layer and open
/// the database. An explicit `--db` works without a workspace; its parent
/// directory then stands in for `.traq`.
///
/// # Errors
///
/// Returns an error if no workspace is found, config is invalid, or the
/// database cannot be opened.
pub fn open_storage_with_cli(cli: &CliOverrides) -> Result<StorageContext> {
    let traq_dir = match (discover_traq_dir(None), &cli.db) {
        (Ok(dir), _) => dir,
        (Err(TraqError::NotInitialized), Some(db)) => db
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf),
        (Err(err), _) => return Err(err),
    };
    let layer = load_config(Some(&traq_dir), cli)?;
    let storage = open_storage(&traq_dir, &layer)?;
    Ok(StorageContext {
        storage,
        layer,
        traq_dir,
    })
}

/// Keys are case-insensitive and `_` is spelled `-`, except inside a
/// default filter name where `_` is meaningful (`assigned_to`).
fn normalize_key(key: &str) -> String {
    let lowered = key.trim().to_lowercase();
    let (head, filter) = match lowered.split_once('.') {
        Some((head, rest)) => (head.replace('_', "-"), Some(rest)),
        None => (lowered.replace('_', "-"), None),
    };
    match filter {
        Some(rest) if head == "default-filter" => format!("{head}.{rest}"),
        Some(rest) => format!("{head}.{}", rest.replace('_', "-")),
        None => head,
    }
}

fn flatten_yaml(value: &serde_yaml::Value, prefix: &str, out: &mut ConfigLayer) {
    match value {
        serde_yaml::Value::Mapping(map) => {
            for (key, value) in map {
                let Some(key_str) = yaml_scalar_to_string(key) else {
                    continue;
                };
                let next_prefix = if prefix.is_empty() {
                    key_str
                } else {
                    format!("{prefix}.{key_str}")
                };
                flatten_yaml(value, &next_prefix, out);
            }
        }
        serde_yaml::Value::Sequence(values) => {
            let items = values.iter().filter_map(yaml_scalar_to_string).collect();
            out.set_list(prefix, items);
        }
        _ => {
            if let Some(value) = yaml_scalar_to_string(value) {
                out.set(prefix, value);
            }
        }
    }
}

fn yaml_scalar_to_string(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::Bool(v) => Some(v.to_string()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Null => Some(String::new()),
        serde_yaml::Value::Sequence(_) | serde_yaml::Value::Mapping(_) => None,
        serde_yaml::Value::Tagged(tagged) => yaml_scalar_to_string(&tagged.value),
    }
}
