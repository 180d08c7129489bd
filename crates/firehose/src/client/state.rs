use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ClientState {
	Idle,
	Connecting,
	Streaming,
	Reconnecting,
	Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateTransition {
	Start,
	SessionEstablished,
	SessionLost,
	Stop,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StateError {
	#[error("Invalid state transition: {transition:?} from {from:?}")]
	InvalidTransition { from: ClientState, transition: StateTransition },
}

/// Pure FSM: validates transitions only
pub fn transition(state: ClientState, event: StateTransition) -> Result<ClientState, StateError> {
	use ClientState::*;
	use StateTransition::*;

	Ok(match (state, event) {
		(Idle, Start) => Connecting,

		(Connecting | Reconnecting, SessionEstablished) => Streaming,

		(Streaming, SessionLost) => Reconnecting,
		(Reconnecting, SessionLost) => Reconnecting,

		// Stop is reachable from everywhere and idempotent
		(_, Stop) => Stopped,

		(from, transition) => return Err(StateError::InvalidTransition { from, transition }),
	})
}

/// Publishes the client state to any number of observers
#[derive(Debug)]
pub struct StateTracker {
	state_tx: watch::Sender<ClientState>,
}

impl StateTracker {
	pub fn new() -> Self {
		let (state_tx, _) = watch::channel(ClientState::Idle);
		Self { state_tx }
	}

	pub fn subscribe(&self) -> watch::Receiver<ClientState> {
		self.state_tx.subscribe()
	}

	pub fn current(&self) -> ClientState {
		*self.state_tx.borrow()
	}

	pub fn apply(&self, event: StateTransition) -> Result<ClientState, StateError> {
		let mut outcome = Ok(ClientState::Idle);
		self.state_tx.send_if_modified(|state| match transition(*state, event) {
			Ok(next) => {
				let changed = next != *state;
				*state = next;
				outcome = Ok(next);
				changed
			}
			Err(e) => {
				outcome = Err(e);
				false
			}
		});
		outcome
	}
}

impl Default for StateTracker {
	fn default() -> Self {
		Self::new()
	}
}
