use crate::reqwest_helpers::RetrySettings;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.spacetraders.io";

#[derive(Clone, Debug)]
pub struct AgentConfiguration {
    pub spacetraders_username: String,
    pub spacetraders_token: String,
    pub spacetraders_base_url: String,
    pub retry_settings: RetrySettings,
}

impl AgentConfiguration {
    pub fn new(username: &str, token: &str) -> Self {
        AgentConfiguration {
            spacetraders_username: username.to_string(),
            spacetraders_token: token.to_string(),
            spacetraders_base_url: DEFAULT_BASE_URL.to_string(),
            retry_settings: RetrySettings::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TradingConfig {
    /// Ships below this level are topped up before buying goods.
    pub fuel_reserve: u32,
    /// Pause between spawning the ships of a fleet.
    pub stagger_delay: Duration,
    /// Interval between two flight progress events.
    pub progress_interval: Duration,
}

impl Default for TradingConfig {
    fn default() -> Self {
        TradingConfig {
            fuel_reserve: 20,
            stagger_delay: Duration::from_secs(2),
            progress_interval: Duration::from_secs(1),
        }
    }
}

impl TradingConfig {
    pub fn fleet() -> Self {
        TradingConfig {
            fuel_reserve: 30,
            ..Self::default()
        }
    }
}
