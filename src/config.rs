use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Configuration for timestamp synchronization
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Class names and attributes used in the rendered document
    #[serde(default)]
    pub markup: MarkupConfig,

    /// Mutation watcher settings
    #[serde(default)]
    pub watcher: WatcherConfig,

    /// Embedded player discovery and command settings
    #[serde(default)]
    pub player: PlayerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkupConfig {
    /// Class of elements holding the text of one block
    pub container_class: String,

    /// Class of the block groupings walked when searching for a player.
    /// Empty means every ancestor element counts as a block.
    pub block_class: String,

    /// Class put on timestamp markers
    pub marker_class: String,

    /// Attribute on markers carrying the offset in seconds
    pub seconds_attribute: String,

    /// `id` of the injected stylesheet element
    pub style_id: String,

    /// Rules injected while the watcher runs
    pub stylesheet: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    /// Quiet period after the last mutation before a pass runs
    pub debounce_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Substrings of embed `src` values that identify a video provider
    pub provider_patterns: Vec<String>,

    /// Query flag enabling the embed's external command API
    pub api_flag: String,

    /// Target origin for posted commands
    pub target_origin: String,
}

impl Default for MarkupConfig {
    fn default() -> Self {
        Self {
            container_class: "block-content".to_string(),
            block_class: String::new(),
            marker_class: "yt-timestamp".to_string(),
            seconds_attribute: "data-seconds".to_string(),
            style_id: "yt-timestamp-style".to_string(),
            stylesheet: ".yt-timestamp { cursor: pointer; color: var(--ls-link-text-color, #045591); text-decoration: underline; }".to_string(),
        }
    }
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self { debounce_ms: 100 }
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            provider_patterns: vec![
                "youtube.com".to_string(),
                "youtube-nocookie.com".to_string(),
                "youtu.be".to_string(),
            ],
            api_flag: "enablejsapi=1".to_string(),
            target_origin: "*".to_string(),
        }
    }
}

impl WatcherConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Config {
    /// Load configuration from the first readable config file, then the environment
    pub fn load() -> Result<Self> {
        let config_paths = [
            "yt-timestamp-sync.toml",
            "config/yt-timestamp-sync.toml",
            "~/.config/yt-timestamp-sync/config.toml",
        ];

        for path in &config_paths {
            if Path::new(path).exists() {
                match Self::load_from(path) {
                    Ok(config) => {
                        tracing::info!("📄 Loaded configuration from: {}", path);
                        return Ok(config);
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse config file {}: {}", path, e);
                    }
                }
            }
        }

        Self::from_env()
    }

    /// Load configuration from a specific TOML file, applying environment overrides
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config_str = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("Cannot read {}: {}", path.display(), e))?;
        let mut config: Self = toml::from_str(&config_str)?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Defaults with environment overrides
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(debounce) = std::env::var("YT_TIMESTAMP_SYNC_DEBOUNCE_MS") {
            match debounce.parse() {
                Ok(ms) => self.watcher.debounce_ms = ms,
                Err(_) => tracing::warn!("Ignoring invalid YT_TIMESTAMP_SYNC_DEBOUNCE_MS: {}", debounce),
            }
        }

        if let Ok(class) = std::env::var("YT_TIMESTAMP_SYNC_CONTAINER_CLASS") {
            self.markup.container_class = class;
        }

        if let Ok(class) = std::env::var("YT_TIMESTAMP_SYNC_BLOCK_CLASS") {
            self.markup.block_class = class;
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let config_str = toml::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), config_str)?;
        tracing::info!("💾 Configuration saved to: {}", path.as_ref().display());
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.watcher.debounce_ms == 0 {
            return Err(anyhow!("debounce_ms must be greater than 0"));
        }

        if self.markup.container_class.trim().is_empty() {
            return Err(anyhow!("container_class must not be empty"));
        }

        if self.markup.marker_class.trim().is_empty() {
            return Err(anyhow!("marker_class must not be empty"));
        }

        if self.markup.seconds_attribute.trim().is_empty() {
            return Err(anyhow!("seconds_attribute must not be empty"));
        }

        if self.player.provider_patterns.iter().all(|p| p.trim().is_empty()) {
            return Err(anyhow!("at least one provider pattern is required"));
        }

        if self.player.api_flag.contains(['?', '&']) || !self.player.api_flag.contains('=') {
            return Err(anyhow!("api_flag must be a single key=value pair"));
        }

        Ok(())
    }

    /// Get runtime configuration summary
    pub fn summary(&self) -> String {
        format!(
            "Timestamp Sync Configuration:\n\
            - Containers: .{}\n\
            - Blocks: {}\n\
            - Marker: .{}\n\
            - Debounce: {}ms\n\
            - Providers: {}",
            self.markup.container_class,
            if self.markup.block_class.is_empty() {
                "any ancestor".to_string()
            } else {
                format!(".{}", self.markup.block_class)
            },
            self.markup.marker_class,
            self.watcher.debounce_ms,
            self.player.provider_patterns.join(", ")
        )
    }
}

/// Configuration builder for programmatic config creation
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_debounce_ms(mut self, debounce_ms: u64) -> Self {
        self.config.watcher.debounce_ms = debounce_ms;
        self
    }

    pub fn with_container_class(mut self, class: &str) -> Self {
        self.config.markup.container_class = class.to_string();
        self
    }

    pub fn with_block_class(mut self, class: &str) -> Self {
        self.config.markup.block_class = class.to_string();
        self
    }

    pub fn with_marker_class(mut self, class: &str) -> Self {
        self.config.markup.marker_class = class.to_string();
        self
    }

    pub fn with_provider_patterns(mut self, patterns: Vec<String>) -> Self {
        self.config.player.provider_patterns = patterns;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
