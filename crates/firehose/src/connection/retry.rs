use crate::config::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
	pub initial_delay: Duration,
	pub max_delay: Duration,
	pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
	fn default() -> Self {
		Self {
			initial_delay: Duration::from_millis(500),
			max_delay: Duration::from_secs(30),
			backoff_multiplier: 2.0,
		}
	}
}

impl RetryConfig {
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.backoff_multiplier < 1.0 || !self.backoff_multiplier.is_finite() {
			return Err(ConfigError::Invalid {
				field: "backoff_multiplier",
				reason: format!("{} is not a finite value >= 1.0", self.backoff_multiplier),
			});
		}
		if self.max_delay < self.initial_delay {
			return Err(ConfigError::Invalid {
				field: "max_delay",
				reason: "must not be shorter than initial_delay".to_string(),
			});
		}
		Ok(())
	}
}

/// Exponential backoff with a ceiling and no limit on the number of attempts
#[derive(Debug)]
pub struct RetryPolicy {
	config: RetryConfig,
	attempts: u32,
	current_delay: Duration,
}

impl RetryPolicy {
	pub fn new(config: RetryConfig) -> Self {
		let current_delay = config.initial_delay;
		Self {
			config,
			attempts: 0,
			current_delay,
		}
	}

	/// Delay to wait before the next attempt; grows the one after it
	pub fn next_delay(&mut self) -> Duration {
		let delay = self.current_delay;
		self.attempts = self.attempts.saturating_add(1);
		let grown = self.current_delay.as_secs_f64() * self.config.backoff_multiplier;
		// Saturates at the ceiling when the product does not fit in a Duration
		self.current_delay = Duration::try_from_secs_f64(grown).map_or(self.config.max_delay, |next| next.min(self.config.max_delay));
		delay
	}

	pub const fn attempts(&self) -> u32 {
		self.attempts
	}

	pub fn reset(&mut self) {
		self.attempts = 0;
		self.current_delay = self.config.initial_delay;
	}
}
