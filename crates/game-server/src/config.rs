use std::env;
use std::time::Duration;

use chess_core::RuleSet;

#[derive(Clone, Debug)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub rules: RuleSet,
    /// Unset means a waiting player stays queued until paired or gone.
    pub matching_timeout: Option<Duration>,
    pub reconnect_grace: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 7201,
            rules: RuleSet::Standard,
            matching_timeout: None,
            reconnect_grace: Duration::from_secs(60),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: env::var("HOST").unwrap_or(defaults.host),
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.port),
            rules: env::var("MOVE_RULES")
                .ok()
                .map(|v| {
                    v.parse().unwrap_or_else(|e| {
                        tracing::warn!("{e}, falling back to {}", defaults.rules);
                        defaults.rules
                    })
                })
                .unwrap_or(defaults.rules),
            matching_timeout: env::var("MATCHING_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            reconnect_grace: env::var("RECONNECT_GRACE_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.reconnect_grace),
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
