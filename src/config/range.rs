//! Sound range config: JSON persistence and the shared snapshot read by the sound loop

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use super::ConfigError;

/// Radius used when the config file is missing or unusable
pub const DEFAULT_RADIUS: f64 = 500.0;

/// Process-wide sound range settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeConfig {
    /// Radius of the circular sound range in blocks
    #[serde(default = "default_radius")]
    pub radius: f64,
    /// Promote sound-event and area transition logs to info
    #[serde(default)]
    pub debug_logging: bool,
}

fn default_radius() -> f64 {
    DEFAULT_RADIUS
}

impl Default for RangeConfig {
    fn default() -> Self {
        Self {
            radius: DEFAULT_RADIUS,
            debug_logging: false,
        }
    }
}

impl RangeConfig {
    fn validate_radius(radius: f64) -> Result<f64, ConfigError> {
        if radius.is_finite() && radius > 0.0 {
            Ok(radius)
        } else {
            Err(ConfigError::InvalidRadius(radius))
        }
    }
}

/// Atomically swapped config snapshot.
///
/// Readers take a cheap `Arc` clone and never see a half-written value.
#[derive(Clone, Debug)]
pub struct SharedRangeConfig {
    current: Arc<RwLock<Arc<RangeConfig>>>,
}

impl SharedRangeConfig {
    pub fn new(config: RangeConfig) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(config))),
        }
    }

    /// Current config snapshot
    pub fn snapshot(&self) -> Arc<RangeConfig> {
        self.current.read().clone()
    }

    pub fn radius(&self) -> f64 {
        self.current.read().radius
    }

    pub fn debug_logging(&self) -> bool {
        self.current.read().debug_logging
    }

    /// Replace the whole snapshot
    pub fn replace(&self, config: RangeConfig) {
        *self.current.write() = Arc::new(config);
    }
}

impl Default for SharedRangeConfig {
    fn default() -> Self {
        Self::new(RangeConfig::default())
    }
}

/// JSON file backing the range config, plus the live shared snapshot
#[derive(Clone, Debug)]
pub struct RangeConfigStore {
    path: PathBuf,
    shared: SharedRangeConfig,
    /// Serializes read-modify-write updates so concurrent setters never drop each other
    write_lock: Arc<Mutex<()>>,
}

impl RangeConfigStore {
    /// Load the config file, falling back to defaults on any problem.
    ///
    /// A missing file is created with default values.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let config = match read_config(&path) {
            Ok(Some(config)) => {
                info!(path = %path.display(), radius = config.radius, "Loaded sound range config");
                config
            }
            Ok(None) => {
                let config = RangeConfig::default();
                if let Err(e) = write_config(&path, &config) {
                    warn!(path = %path.display(), error = %e, "Failed to write default config");
                } else {
                    info!(path = %path.display(), "Created default sound range config");
                }
                config
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Invalid sound range config, using defaults");
                RangeConfig::default()
            }
        };

        Self {
            path,
            shared: SharedRangeConfig::new(config),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn shared(&self) -> SharedRangeConfig {
        self.shared.clone()
    }

    /// Update the sound range radius and persist it
    pub fn set_radius(&self, radius: f64) -> Result<RangeConfig, ConfigError> {
        let radius = RangeConfig::validate_radius(radius)?;
        self.update(|config| config.radius = radius)
    }

    /// Toggle debug logging and persist it
    pub fn set_debug_logging(&self, enabled: bool) -> Result<RangeConfig, ConfigError> {
        self.update(|config| config.debug_logging = enabled)
    }

    /// Snapshot, modify, swap and persist under the write lock.
    ///
    /// The swap happens first so the live value changes even if the disk write fails.
    fn update(&self, apply: impl FnOnce(&mut RangeConfig)) -> Result<RangeConfig, ConfigError> {
        let _guard = self.write_lock.lock();
        let mut config = *self.shared.snapshot();
        apply(&mut config);
        self.shared.replace(config);
        write_config(&self.path, &config).map_err(|e| {
            warn!(path = %self.path.display(), error = %e, "Failed to save sound range config");
            e
        })?;
        Ok(config)
    }
}

fn read_config(path: &Path) -> Result<Option<RangeConfig>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)?;
    let config: RangeConfig = serde_json::from_str(&raw)?;
    RangeConfig::validate_radius(config.radius)?;
    Ok(Some(config))
}

fn write_config(path: &Path, config: &RangeConfig) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(config)?;
    fs::write(path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn temp_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("railgun-sounds-{}", Uuid::new_v4()))
            .join("server-config.json")
    }

    #[test]
    fn missing_file_writes_defaults() {
        let path = temp_path();
        let store = RangeConfigStore::load(&path);

        assert_eq!(*store.shared().snapshot(), RangeConfig::default());
        let written = fs::read_to_string(&path).unwrap();
        assert!(written.contains("\"radius\": 500.0"));
        assert!(written.contains("\"debugLogging\": false"));
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let path = temp_path();
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "{ radius: nope").unwrap();

        let store = RangeConfigStore::load(&path);
        assert_eq!(store.shared().radius(), DEFAULT_RADIUS);
    }

    #[test]
    fn non_positive_radius_in_file_falls_back() {
        let path = temp_path();
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, r#"{ "radius": -3.0, "debugLogging": true }"#).unwrap();

        let store = RangeConfigStore::load(&path);
        assert_eq!(*store.shared().snapshot(), RangeConfig::default());
    }

    #[test]
    fn partial_document_keeps_defaults_for_missing_keys() {
        let path = temp_path();
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, r#"{ "debugLogging": true }"#).unwrap();

        let store = RangeConfigStore::load(&path);
        let config = store.shared().snapshot();
        assert_eq!(config.radius, DEFAULT_RADIUS);
        assert!(config.debug_logging);
    }

    #[test]
    fn set_radius_persists_and_swaps() {
        let path = temp_path();
        let store = RangeConfigStore::load(&path);
        let shared = store.shared();

        store.set_radius(750.0).unwrap();
        assert_eq!(shared.radius(), 750.0);

        let reloaded = RangeConfigStore::load(&path);
        assert_eq!(reloaded.shared().radius(), 750.0);
    }

    #[test]
    fn set_radius_rejects_invalid_values() {
        let store = RangeConfigStore::load(temp_path());

        assert!(matches!(store.set_radius(0.0), Err(ConfigError::InvalidRadius(_))));
        assert!(matches!(store.set_radius(f64::NAN), Err(ConfigError::InvalidRadius(_))));
        assert_eq!(store.shared().radius(), DEFAULT_RADIUS);
    }

    #[test]
    fn debug_toggle_keeps_radius() {
        let store = RangeConfigStore::load(temp_path());
        store.set_radius(120.0).unwrap();

        let config = store.set_debug_logging(true).unwrap();
        assert_eq!(config.radius, 120.0);
        assert!(store.shared().debug_logging());
    }

    #[test]
    fn concurrent_setters_keep_both_updates() {
        let path = temp_path();
        let store = RangeConfigStore::load(&path);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    if i % 2 == 0 {
                        store.set_radius(750.0).unwrap();
                    } else {
                        store.set_debug_logging(true).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let expected = RangeConfig {
            radius: 750.0,
            debug_logging: true,
        };
        assert_eq!(*store.shared().snapshot(), expected);
        let reloaded = RangeConfigStore::load(&path);
        assert_eq!(*reloaded.shared().snapshot(), expected);
    }

    #[test]
    fn snapshot_is_stable_across_replace() {
        let shared = SharedRangeConfig::default();
        let before = shared.snapshot();
        shared.replace(RangeConfig {
            radius: 10.0,
            debug_logging: true,
        });
        assert_eq!(before.radius, DEFAULT_RADIUS);
        assert_eq!(shared.radius(), 10.0);
    }
}
