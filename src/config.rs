//! Store configuration (JSON from the host, environment overrides, defaults).

use log::warn;
use serde::{Deserialize, Serialize};

use crate::app_response::AppResponse;

pub const DEFAULT_DB_NAME: &str = "library_desk";
pub const DEFAULT_MAP_SIZE: usize = 10 * 1024 * 1024;
pub const DEFAULT_PAGE_SIZE: usize = 5;

/// Settings used to open an [`AppDbState`](crate::local_db_state::AppDbState).
///
/// Every field has a default so hosts can send `{}` or only the keys they care
/// about:
///
/// ```rust
/// use library_desk_core::config::StoreConfig;
///
/// let config: StoreConfig = serde_json::from_str(r#"{"name":"branch_a"}"#)?;
/// assert_eq!(config.name, "branch_a");
/// assert_eq!(config.default_page_size, 5);
/// # Ok::<(), serde_json::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Store name; the environment lives in `<name>.lmdb`.
    pub name: String,
    /// Upper bound of the memory map in bytes.
    pub map_size: usize,
    /// Page size used by view-states that do not set their own.
    pub default_page_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_DB_NAME.to_string(),
            map_size: DEFAULT_MAP_SIZE,
            default_page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl StoreConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Defaults overridden by `LIBRARY_DESK_DB`, `LIBRARY_DESK_MAP_SIZE` and
    /// `LIBRARY_DESK_PAGE_SIZE`. Unparseable numbers are ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(name) = std::env::var("LIBRARY_DESK_DB") {
            if !name.trim().is_empty() {
                config.name = name;
            }
        }

        if let Some(map_size) = parse_env_usize("LIBRARY_DESK_MAP_SIZE") {
            config.map_size = map_size;
        }

        if let Some(page_size) = parse_env_usize("LIBRARY_DESK_PAGE_SIZE") {
            config.default_page_size = page_size;
        }

        config
    }

    pub fn validate(&self) -> Result<(), AppResponse> {
        if self.name.trim().is_empty() {
            return Err(AppResponse::ValidationError("Store name cannot be empty".to_string()));
        }
        if self.map_size == 0 {
            return Err(AppResponse::ValidationError("map_size must be greater than zero".to_string()));
        }
        if self.default_page_size == 0 {
            return Err(AppResponse::ValidationError(
                "default_page_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_env_usize(key: &str) -> Option<usize> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse::<usize>() {
        Ok(value) if value > 0 => Some(value),
        _ => {
            warn!("Ignoring {key}={raw:?}: expected a positive integer");
            None
        }
    }
}
