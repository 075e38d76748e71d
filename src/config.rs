// Copyright 2025 dentsusoken
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::error::{LockError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const HOME_ENV_VAR: &str = "CHAINLOCK_HOME";
const ENV_PREFIX: &str = "CHAINLOCK";

const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_WAIT_MS: u64 = 5;
const DEFAULT_MAX_CLASSES: usize = 1000;
const DEFAULT_MAX_KEYS: usize = 100_000;
const DEFAULT_KEY_TTL_SECS: u64 = 5 * 60;

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ChainLockConfig {
    #[serde(default)]
    pub locking: LockingConfig,

    #[serde(default)]
    pub key_cache: KeyCacheConfig,
}

/// Tuning for chain acquisition and the lock registry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LockingConfig {
    /// Timed attempts per lock before the whole chain is rolled back.
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Wait per timed attempt, in milliseconds.
    #[serde(default = "default_retry_wait_ms")]
    pub retry_wait_ms: u64,

    /// Number of object classes the registry tracks before evicting idle ones.
    #[serde(default = "default_max_classes")]
    pub max_classes: usize,
}

impl LockingConfig {
    pub fn retry_wait(&self) -> Duration {
        Duration::from_millis(self.retry_wait_ms)
    }
}

impl Default for LockingConfig {
    fn default() -> Self {
        Self {
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            retry_wait_ms: DEFAULT_RETRY_WAIT_MS,
            max_classes: DEFAULT_MAX_CLASSES,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeyCacheConfig {
    #[serde(default = "default_max_keys")]
    pub max_keys: usize,

    /// Entries expire this long after they were written.
    #[serde(default = "default_key_ttl_secs")]
    pub ttl_secs: u64,
}

impl KeyCacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for KeyCacheConfig {
    fn default() -> Self {
        Self {
            max_keys: DEFAULT_MAX_KEYS,
            ttl_secs: DEFAULT_KEY_TTL_SECS,
        }
    }
}

fn default_retry_attempts() -> u32 {
    DEFAULT_RETRY_ATTEMPTS
}

fn default_retry_wait_ms() -> u64 {
    DEFAULT_RETRY_WAIT_MS
}

fn default_max_classes() -> usize {
    DEFAULT_MAX_CLASSES
}

fn default_max_keys() -> usize {
    DEFAULT_MAX_KEYS
}

fn default_key_ttl_secs() -> u64 {
    DEFAULT_KEY_TTL_SECS
}

impl ChainLockConfig {
    pub fn load(home: &Path) -> Result<Self> {
        let config_path = home.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            log::debug!("Config file not found at {config_path:?}, using defaults");
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&config_path)?;
        let config: ChainLockConfig = toml::from_str(&contents)?;
        config.validate()?;

        log::debug!("Loaded config from {config_path:?}");
        Ok(config)
    }

    pub fn save(&self, home: &Path) -> Result<()> {
        let config_path = home.join(CONFIG_FILE_NAME);

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        fs::write(&config_path, contents)?;
        log::debug!("Saved config to {config_path:?}");
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.locking.retry_attempts == 0 {
            return Err(LockError::ConfigError(
                "locking.retry_attempts must be at least 1".to_string(),
            ));
        }
        if self.locking.max_classes == 0 {
            return Err(LockError::ConfigError(
                "locking.max_classes must be at least 1".to_string(),
            ));
        }
        if self.key_cache.max_keys == 0 {
            return Err(LockError::ConfigError(
                "key_cache.max_keys must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Directory holding `config.toml`: `$CHAINLOCK_HOME`, else the platform config dir.
pub fn config_home() -> Option<PathBuf> {
    if let Ok(home) = std::env::var(HOME_ENV_VAR)
        && !home.trim().is_empty()
    {
        return Some(PathBuf::from(home));
    }
    dirs::config_dir().map(|dir| dir.join("chainlock"))
}

/// Loads configuration from the config file layered under `CHAINLOCK_*` environment variables.
pub fn new_config() -> Result<ChainLockConfig> {
    let mut builder = config::Config::builder();

    if let Some(home) = config_home() {
        let path = home.join(CONFIG_FILE_NAME);
        log::debug!("Reading configuration from {path:?} if present");
        builder = builder.add_source(config::File::from(path).required(false));
    }

    builder = builder.add_source(
        config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    let config: ChainLockConfig = builder.build()?.try_deserialize()?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = ChainLockConfig::default();
        assert_eq!(config.locking.retry_attempts, 3);
        assert_eq!(config.locking.retry_wait(), Duration::from_millis(5));
        assert_eq!(config.locking.max_classes, 1000);
        assert_eq!(config.key_cache.max_keys, 100_000);
        assert_eq!(config.key_cache.ttl(), Duration::from_secs(300));
    }

    #[test]
    fn test_load_missing_config() {
        let temp_dir = TempDir::new().unwrap();
        let config = ChainLockConfig::load(temp_dir.path()).unwrap();
        assert_eq!(config, ChainLockConfig::default());
    }

    #[test]
    fn test_save_and_load_config() {
        let temp_dir = TempDir::new().unwrap();

        let mut config = ChainLockConfig::default();
        config.locking.retry_attempts = 5;
        config.key_cache.ttl_secs = 10;

        config.save(temp_dir.path()).unwrap();

        let loaded = ChainLockConfig::load(temp_dir.path()).unwrap();
        assert_eq!(loaded.locking.retry_attempts, 5);
        assert_eq!(loaded.key_cache.ttl_secs, 10);
    }

    #[test]
    fn test_partial_config() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join(CONFIG_FILE_NAME),
            r#"
[locking]
retry_wait_ms = 20
"#,
        )
        .unwrap();

        let loaded = ChainLockConfig::load(temp_dir.path()).unwrap();
        assert_eq!(loaded.locking.retry_wait_ms, 20);
        assert_eq!(loaded.locking.retry_attempts, DEFAULT_RETRY_ATTEMPTS);
        assert_eq!(loaded.key_cache, KeyCacheConfig::default());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join(CONFIG_FILE_NAME),
            "[locking]\nretry_attempts = 0\n",
        )
        .unwrap();

        let err = ChainLockConfig::load(temp_dir.path()).unwrap_err();
        assert!(matches!(err, LockError::ConfigError(_)));
    }

    #[test]
    #[serial]
    fn test_new_config_layers_environment() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join(CONFIG_FILE_NAME),
            "[locking]\nretry_attempts = 7\nmax_classes = 10\n",
        )
        .unwrap();

        unsafe {
            std::env::set_var(HOME_ENV_VAR, temp_dir.path());
            std::env::set_var("CHAINLOCK_LOCKING__MAX_CLASSES", "25");
        }

        let config = new_config();

        unsafe {
            std::env::remove_var(HOME_ENV_VAR);
            std::env::remove_var("CHAINLOCK_LOCKING__MAX_CLASSES");
        }

        let config = config.unwrap();
        assert_eq!(config.locking.retry_attempts, 7);
        assert_eq!(config.locking.max_classes, 25);
        assert_eq!(config.locking.retry_wait_ms, DEFAULT_RETRY_WAIT_MS);
    }
}
