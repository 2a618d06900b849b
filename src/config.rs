use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub browser: BrowserConfig,
    pub check: CheckConfig,
    pub screenshots: ScreenshotConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    pub headless: bool,
    pub window_width: u32,
    pub window_height: u32,
    pub user_agent: String,
    pub chrome_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckConfig {
    /// Wall-clock budget for the pagination loop, minutes granularity.
    pub pagination_budget_minutes: u64,
    /// Per-element wait deadline, seconds.
    pub element_wait_secs: u64,
    /// Poll interval while waiting for page state to settle, milliseconds.
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenshotConfig {
    pub enabled: bool,
    pub dir: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // Start with default configuration
            .add_source(File::with_name("config/default"))
            // Add environment-specific config
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add local config (ignored by git)
            .add_source(File::with_name("config/local").required(false))
            // Add environment variables with prefix "SHELFCHECK_"
            .add_source(Environment::with_prefix("SHELFCHECK").separator("__"))
            .build()?;

        let mut config: AppConfig = s.try_deserialize()?;

        // Add Chrome path from environment if not set
        if config.browser.chrome_path.is_none() {
            config.browser.chrome_path = env::var("CHROME_PATH").ok();
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.browser.window_width == 0 || self.browser.window_height == 0 {
            return Err(ConfigError::Message(
                "Browser window dimensions must be greater than 0".into(),
            ));
        }

        if self.browser.user_agent.trim().is_empty() {
            return Err(ConfigError::Message(
                "Browser user_agent must not be empty".into(),
            ));
        }

        if self.check.element_wait_secs == 0 {
            return Err(ConfigError::Message(
                "Check element_wait_secs must be greater than 0".into(),
            ));
        }

        if self.check.poll_interval_ms == 0 {
            return Err(ConfigError::Message(
                "Check poll_interval_ms must be greater than 0".into(),
            ));
        }

        if self.screenshots.enabled && self.screenshots.dir.trim().is_empty() {
            return Err(ConfigError::Message(
                "Screenshot dir must not be empty when screenshots are enabled".into(),
            ));
        }

        Ok(())
    }
}
