//! Engine configuration
use serde::{Deserialize, Serialize};
use soul_core::types::{ExclusiveFlags, InitFlags};
use soul_core::{Result, SoulError};
use std::path::Path;

/// Prefix of environment variables overriding configuration
/// (`SOUL_ENGINE__SAMPLE_RATE=48000`)
pub const ENV_PREFIX: &str = "SOUL_ENGINE";

/// Which format plugins the bootstrap loads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginStrategy {
    /// The fixed list of format plugins the application ships
    #[default]
    Essential,
    /// Every provisioned library except the engine itself
    All,
}

/// Settings applied while bringing the engine up
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Output sample rate requested at init (Hz)
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Raw [`InitFlags`] bits
    #[serde(default)]
    pub init_flags: u32,

    /// Whether to bring up the exclusive-mode output subsystem
    #[serde(default)]
    pub exclusive_mode: bool,

    /// Raw [`ExclusiveFlags`] bits
    #[serde(default = "default_exclusive_flags")]
    pub exclusive_flags: u32,

    /// Playback buffer length in milliseconds
    #[serde(default = "default_playback_buffer_ms")]
    pub playback_buffer_ms: u32,

    /// Update period in milliseconds (0 disables automatic updates)
    #[serde(default = "default_update_period_ms")]
    pub update_period_ms: u32,

    /// Number of update threads
    #[serde(default = "default_update_threads")]
    pub update_threads: u32,

    #[serde(default)]
    pub plugin_strategy: PluginStrategy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            init_flags: 0,
            exclusive_mode: false,
            exclusive_flags: default_exclusive_flags(),
            playback_buffer_ms: default_playback_buffer_ms(),
            update_period_ms: default_update_period_ms(),
            update_threads: default_update_threads(),
            plugin_strategy: PluginStrategy::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from an optional TOML file and the environment
    ///
    /// Environment variables (`SOUL_ENGINE__<FIELD>`) override the file; any
    /// field set in neither keeps its default.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = config::Config::builder();

        if let Some(path) = path {
            if !path.exists() {
                return Err(SoulError::not_found("Config file", path.display().to_string()));
            }
            settings = settings.add_source(config::File::from(path));
        }

        settings = settings.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        let config: Self = settings
            .build()
            .map_err(|e| SoulError::config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| SoulError::config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !(8000..=384_000).contains(&self.sample_rate) {
            return Err(SoulError::config(format!(
                "sample_rate must be between 8000 and 384000 Hz, got {}",
                self.sample_rate
            )));
        }

        if !(10..=5000).contains(&self.playback_buffer_ms) {
            return Err(SoulError::config(format!(
                "playback_buffer_ms must be between 10 and 5000, got {}",
                self.playback_buffer_ms
            )));
        }

        if self.update_period_ms != 0 && !(5..=100).contains(&self.update_period_ms) {
            return Err(SoulError::config(format!(
                "update_period_ms must be 0 or between 5 and 100, got {}",
                self.update_period_ms
            )));
        }

        if self.update_threads > 8 {
            return Err(SoulError::config(format!(
                "update_threads must be at most 8, got {}",
                self.update_threads
            )));
        }

        Ok(())
    }

    pub fn init_flags(&self) -> InitFlags {
        InitFlags::from_bits(self.init_flags)
    }

    pub fn exclusive_flags(&self) -> ExclusiveFlags {
        ExclusiveFlags::from_bits(self.exclusive_flags)
    }
}

// Default values
fn default_sample_rate() -> u32 {
    44100
}

fn default_exclusive_flags() -> u32 {
    (ExclusiveFlags::EXCLUSIVE | ExclusiveFlags::AUTOFORMAT | ExclusiveFlags::EVENT).bits()
}

fn default_playback_buffer_ms() -> u32 {
    500
}

fn default_update_period_ms() -> u32 {
    100
}

fn default_update_threads() -> u32 {
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.sample_rate, 44100);
        assert_eq!(config.plugin_strategy, PluginStrategy::Essential);
        assert!(config.exclusive_flags().contains(ExclusiveFlags::EXCLUSIVE));
        assert!(config.init_flags().is_empty());
    }

    #[test]
    fn validation_rejects_out_of_range_values() {
        let mut config = EngineConfig::default();
        config.sample_rate = 1000;
        assert!(matches!(config.validate(), Err(SoulError::Config(_))));

        let mut config = EngineConfig::default();
        config.update_period_ms = 3;
        assert!(config.validate().is_err());
        config.update_period_ms = 0;
        assert!(config.validate().is_ok());

        let mut config = EngineConfig::default();
        config.update_threads = 9;
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.toml");
        std::fs::write(
            &path,
            "sample_rate = 48000\nexclusive_mode = true\nplugin_strategy = \"all\"\n",
        )
        .unwrap();

        let config = EngineConfig::load(Some(&path)).unwrap();
        assert_eq!(config.sample_rate, 48000);
        assert!(config.exclusive_mode);
        assert_eq!(config.plugin_strategy, PluginStrategy::All);
        // Unset fields keep their defaults
        assert_eq!(config.update_threads, 1);
    }

    #[test]
    fn load_rejects_invalid_file_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.toml");
        std::fs::write(&path, "playback_buffer_ms = 1\n").unwrap();

        assert!(matches!(
            EngineConfig::load(Some(&path)),
            Err(SoulError::Config(_))
        ));
    }

    #[test]
    fn load_missing_file_is_not_found() {
        let result = EngineConfig::load(Some(Path::new("/nonexistent/engine.toml")));
        assert!(matches!(result, Err(SoulError::NotFound { .. })));
    }

    #[test]
    fn environment_overrides_defaults() {
        std::env::set_var("SOUL_ENGINE__UPDATE_PERIOD_MS", "25");
        let config = EngineConfig::load(None);
        std::env::remove_var("SOUL_ENGINE__UPDATE_PERIOD_MS");

        assert_eq!(config.unwrap().update_period_ms, 25);
    }

    proptest::proptest! {
        #[test]
        fn sample_rate_validation_matches_range(rate in 0_u32..=500_000) {
            let config = EngineConfig {
                sample_rate: rate,
                ..EngineConfig::default()
            };
            proptest::prop_assert_eq!(
                config.validate().is_ok(),
                (8000..=384_000).contains(&rate)
            );
        }

        #[test]
        fn update_period_is_off_or_in_range(period in 0_u32..=1000) {
            let config = EngineConfig {
                update_period_ms: period,
                ..EngineConfig::default()
            };
            proptest::prop_assert_eq!(
                config.validate().is_ok(),
                period == 0 || (5..=100).contains(&period)
            );
        }
    }
}
