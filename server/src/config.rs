//! Engine tunables injected into the lobby

use std::time::Duration;

/// Limits and timeouts the engine enforces
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// A table with no action for this long is ended or torn down
    pub idle_timeout: Duration,
    /// Extra sleep added on top of `idle_timeout` before the idle check runs
    pub idle_grace: Duration,
    pub max_strikes: usize,
    pub max_clues: usize,
    pub max_players: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(30 * 60),
            idle_grace: Duration::from_secs(1),
            max_strikes: 3,
            max_clues: 8,
            max_players: 6,
        }
    }
}

impl ServerConfig {
    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }
}
