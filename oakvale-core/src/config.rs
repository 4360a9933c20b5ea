//! Configuration types for Oakvale
//!
//! All options are read once at startup and are immutable for the rest of the
//! run. Values come from defaults, then `oakvale.toml`, then the file named by
//! `OAKVALE_CONFIG_PATH`, then `OAKVALE_`-prefixed environment variables
//! (nested keys separated by `__`, e.g. `OAKVALE_SCHEDULER__MAX_ACTIVE_WORKERS=4`).

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{OakvaleError, Result};

/// Main configuration for Oakvale
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct OakvaleConfig {
    /// LLM provider configuration
    pub llm: LLMProviderConfig,

    /// NPC worker scheduling
    pub scheduler: SchedulerConfig,

    /// Combat and revival rules
    pub rules: RulesConfig,

    /// History bounds
    pub memory: MemoryConfig,

    /// Perception and prompt bounds
    pub perception: PerceptionConfig,

    /// World clock
    pub world: WorldConfig,

    /// User interface selector
    pub ui: UiMode,

    /// Verbose logging
    pub debug: bool,
}

/// LLM provider type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LLMProviderKind {
    /// Local Ollama server
    #[default]
    Ollama,
    /// Canned offline replies
    Scripted,
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LLMProviderConfig {
    /// Provider type
    pub provider: LLMProviderKind,

    /// Model identifier
    pub model: String,

    /// Base URL of the inference service
    pub base_url: String,

    /// Sampling temperature for NPC decisions
    pub temperature: f32,

    /// Maximum tokens generated per decision
    pub max_tokens: usize,

    /// Bound on a single request attempt
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Pause before the single retry on a transient failure
    #[serde(with = "humantime_serde")]
    pub retry_delay: Duration,
}

impl Default for LLMProviderConfig {
    fn default() -> Self {
        Self {
            provider: LLMProviderKind::Ollama,
            model: "llama3".to_string(),
            base_url: "http://localhost:11434".to_string(),
            temperature: 0.8,
            max_tokens: 300,
            request_timeout: Duration::from_secs(20),
            retry_delay: Duration::from_millis(500),
        }
    }
}

/// Worker runtime used by the process manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeKind {
    /// One tokio task per NPC
    #[default]
    Task,
    /// One child process per NPC
    Process,
}

/// NPC worker scheduling configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Worker runtime
    pub runtime: RuntimeKind,

    /// Upper bound on concurrently active workers
    pub max_active_workers: usize,

    /// NPCs further than this from the player are suspended
    pub activation_radius: f64,

    /// Minimum time between two decision requests of one worker
    #[serde(with = "humantime_serde")]
    pub action_interval: Duration,

    /// Hard bound on an in-flight decision before the worker is killed
    #[serde(with = "humantime_serde")]
    pub worker_timeout: Duration,

    /// Crashes tolerated before an NPC is suspended for good
    pub max_respawns: u32,

    /// Capacity of each worker mailbox (per direction)
    pub mailbox_capacity: usize,

    /// Grace period between the shutdown sentinel and a hard kill
    #[serde(with = "humantime_serde")]
    pub shutdown_grace: Duration,

    /// How long the player waits for an NPC to answer before it hedges
    #[serde(with = "humantime_serde")]
    pub dialog_timeout: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            runtime: RuntimeKind::Task,
            max_active_workers: 8,
            activation_radius: 10.0,
            action_interval: Duration::from_secs(2),
            worker_timeout: Duration::from_secs(45),
            max_respawns: 3,
            mailbox_capacity: 4,
            shutdown_grace: Duration::from_secs(1),
            dialog_timeout: Duration::from_secs(5),
        }
    }
}

/// Combat and revival rules
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RulesConfig {
    /// Flat damage added to every hit
    pub base_damage: f64,

    /// Weight of the attacker's strength modifier
    pub strength_weight: f64,

    /// Weight of the attacker's dexterity modifier
    pub dexterity_weight: f64,

    /// Weight of the defender's constitution modifier
    pub constitution_weight: f64,

    /// Lower bound on a landed hit (never below zero)
    pub min_damage: u32,

    /// Distance from a shrine within which a body accrues revival time
    pub shrine_radius: f64,

    /// Consecutive turns a body must stay near a shrine
    pub revival_turns: u32,

    /// Fraction of max HP restored on revival
    pub revival_hp_fraction: f64,

    /// Turns after defeat before the character is dead for good
    pub revival_window: u64,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            base_damage: 2.0,
            strength_weight: 1.0,
            dexterity_weight: 0.5,
            constitution_weight: 0.5,
            min_damage: 1,
            shrine_radius: 2.0,
            revival_turns: 3,
            revival_hp_fraction: 0.25,
            revival_window: 50,
        }
    }
}

/// History bounds
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MemoryConfig {
    /// Entries kept in each character's memory log
    pub max_character_memories: usize,

    /// Events kept in the shared world timeline
    pub max_world_events: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_character_memories: 50,
            max_world_events: 100,
        }
    }
}

/// Perception and prompt bounds
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PerceptionConfig {
    /// Sight radius in tiles
    pub visibility_range: i32,

    /// Cap on entities listed in one snapshot
    pub max_visible_entities: usize,

    /// World events included in one snapshot
    pub recent_events: usize,

    /// Own memories included in one snapshot
    pub recent_memories: usize,

    /// Upper bound on the rendered prompt
    pub max_prompt_chars: usize,
}

impl Default for PerceptionConfig {
    fn default() -> Self {
        Self {
            visibility_range: 5,
            max_visible_entities: 8,
            recent_events: 5,
            recent_memories: 10,
            max_prompt_chars: 6000,
        }
    }
}

/// World clock configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorldConfig {
    /// In-game minutes per turn
    pub minutes_per_turn: u64,

    /// Minute of day the game starts at
    pub start_minute: u64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            minutes_per_turn: 1,
            start_minute: 8 * 60,
        }
    }
}

/// User interface selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UiMode {
    /// Line-oriented terminal UI
    #[default]
    Terminal,
    /// No interaction; waits every turn and prints snapshots
    Headless,
}

impl std::str::FromStr for UiMode {
    type Err = OakvaleError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "terminal" => Ok(UiMode::Terminal),
            "headless" => Ok(UiMode::Headless),
            other => Err(OakvaleError::Configuration(format!(
                "Invalid UI mode: {}",
                other
            ))),
        }
    }
}

impl OakvaleConfig {
    /// Load configuration from file and environment variables.
    ///
    /// Loads in this order:
    /// 1. Default configuration
    /// 2. `oakvale.toml` in the working directory
    /// 3. File from `OAKVALE_CONFIG_PATH`
    /// 4. `OAKVALE_` environment overrides
    pub fn load() -> Result<Self> {
        use figment::{
            Figment,
            providers::{Env, Format, Serialized, Toml},
        };

        let mut figment = Figment::from(Serialized::defaults(OakvaleConfig::default()))
            .merge(Toml::file("oakvale.toml"));

        if let Ok(path) = std::env::var("OAKVALE_CONFIG_PATH") {
            figment = figment.merge(Toml::file(path));
        }

        let config: OakvaleConfig = figment
            .merge(Env::prefixed("OAKVALE_").split("__").ignore(&["config_path"]))
            .extract()
            .map_err(|e| {
                OakvaleError::Configuration(format!("Failed to load configuration: {}", e))
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path, on top of the defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        use figment::{
            Figment,
            providers::{Format, Serialized, Toml},
        };

        let path = path.as_ref();
        if !path.exists() {
            return Err(OakvaleError::Configuration(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }

        let config: OakvaleConfig = Figment::from(Serialized::defaults(OakvaleConfig::default()))
            .merge(Toml::file(path))
            .extract()
            .map_err(|e| {
                OakvaleError::Configuration(format!("Failed to load configuration file: {}", e))
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: &str| Err(OakvaleError::Configuration(msg.to_string()));

        if self.llm.model.trim().is_empty() {
            return fail("llm.model must not be empty");
        }
        if self.llm.request_timeout.is_zero() {
            return fail("llm.request_timeout must be positive");
        }
        if self.scheduler.max_active_workers == 0 {
            return fail("scheduler.max_active_workers must be at least 1");
        }
        if self.scheduler.mailbox_capacity == 0 {
            return fail("scheduler.mailbox_capacity must be at least 1");
        }
        if !(self.scheduler.activation_radius >= 0.0) {
            return fail("scheduler.activation_radius must be non-negative");
        }
        if self.scheduler.dialog_timeout.is_zero() {
            return fail("scheduler.dialog_timeout must be positive");
        }
        // Two attempts plus the retry pause have to fit inside the hard timeout.
        let worst_case = self.llm.request_timeout * 2 + self.llm.retry_delay;
        if self.scheduler.worker_timeout <= worst_case {
            return fail("scheduler.worker_timeout must exceed 2 * llm.request_timeout + llm.retry_delay");
        }
        if !(self.rules.revival_hp_fraction > 0.0 && self.rules.revival_hp_fraction <= 1.0) {
            return fail("rules.revival_hp_fraction must be in (0, 1]");
        }
        if self.rules.revival_turns == 0 {
            return fail("rules.revival_turns must be at least 1");
        }
        if self.rules.revival_window < u64::from(self.rules.revival_turns) {
            return fail("rules.revival_window must be at least rules.revival_turns");
        }
        if self.memory.max_character_memories == 0 || self.memory.max_world_events == 0 {
            return fail("memory bounds must be at least 1");
        }
        if self.perception.visibility_range < 0 {
            return fail("perception.visibility_range must be non-negative");
        }
        if self.perception.max_prompt_chars < 256 {
            return fail("perception.max_prompt_chars must be at least 256");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = OakvaleConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.scheduler.max_active_workers, 8);
        assert_eq!(config.rules.revival_hp_fraction, 0.25);
        assert_eq!(config.ui, UiMode::Terminal);
    }

    #[test]
    fn test_from_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
debug = true
ui = "headless"

[llm]
model = "mistral"
request_timeout = "5s"

[scheduler]
max_active_workers = 2
worker_timeout = "30s"
dialog_timeout = "3s"
"#
        )
        .unwrap();

        let config = OakvaleConfig::from_file(file.path()).unwrap();
        assert!(config.debug);
        assert_eq!(config.ui, UiMode::Headless);
        assert_eq!(config.llm.model, "mistral");
        assert_eq!(config.llm.request_timeout, Duration::from_secs(5));
        assert_eq!(config.scheduler.max_active_workers, 2);
        assert_eq!(config.scheduler.dialog_timeout, Duration::from_secs(3));
        // Untouched sections keep their defaults
        assert_eq!(config.rules, RulesConfig::default());
    }

    #[test]
    fn test_missing_file_is_configuration_error() {
        let result = OakvaleConfig::from_file("/nonexistent/oakvale.toml");
        assert!(matches!(result, Err(OakvaleError::Configuration(_))));
    }

    #[test]
    fn test_validate_rejects_zero_workers() {
        let mut config = OakvaleConfig::default();
        config.scheduler.max_active_workers = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_tight_worker_timeout() {
        let mut config = OakvaleConfig::default();
        config.scheduler.worker_timeout = config.llm.request_timeout;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_revival_fraction() {
        let mut config = OakvaleConfig::default();
        config.rules.revival_hp_fraction = 1.5;
        assert!(config.validate().is_err());

        config.rules.revival_hp_fraction = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_ui_mode_from_str() {
        assert_eq!("terminal".parse::<UiMode>().unwrap(), UiMode::Terminal);
        assert_eq!("HEADLESS".parse::<UiMode>().unwrap(), UiMode::Headless);
        assert!("gui".parse::<UiMode>().is_err());
    }
}
