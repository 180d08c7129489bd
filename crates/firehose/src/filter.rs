use crate::config::{ClientOptions, ConfigError};
use crate::envelope::{Envelope, EventType};

/// Predicate deciding which envelopes reach the sink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
	All,
	Only(EventType),
}

impl Filter {
	/// `no_filter` wins over `filter`. An empty `filter` shows everything, an
	/// unrecognized one is a configuration error rather than an empty stream.
	pub fn from_options(options: &ClientOptions) -> Result<Self, ConfigError> {
		if options.no_filter {
			return Ok(Self::All);
		}
		if options.filter.is_empty() {
			return Ok(Self::All);
		}
		Ok(Self::Only(options.filter.parse()?))
	}

	pub fn accept(&self, envelope: &Envelope) -> bool {
		match self {
			Self::All => true,
			Self::Only(event_type) => envelope.event_type() == *event_type,
		}
	}
}
