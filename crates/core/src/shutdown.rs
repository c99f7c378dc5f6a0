//! Cooperative shutdown token passed into the session entry point.
//!
//! The host registers its own signal handlers and calls
//! [`ShutdownHandle::trigger`]; the session observes the signal at its
//! suspension points rather than installing ambient handlers of its own.

use tokio::sync::watch;

/// How the host asked the session to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopMode {
	Graceful,
	Immediate,
}

/// Trigger half held by the host.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
	tx: watch::Sender<Option<StopMode>>,
}

impl ShutdownHandle {
	/// Requests shutdown. Later triggers may only escalate graceful to
	/// immediate, never the reverse.
	pub fn trigger(&self, graceful: bool) {
		let mode = if graceful { StopMode::Graceful } else { StopMode::Immediate };
		self.tx.send_if_modified(|current| match (*current, mode) {
			(None, _) | (Some(StopMode::Graceful), StopMode::Immediate) => {
				*current = Some(mode);
				true
			}
			_ => false,
		});
	}
}

/// Observe half passed through the session; cheap to clone.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
	rx: watch::Receiver<Option<StopMode>>,
}

impl ShutdownSignal {
	pub fn is_triggered(&self) -> bool {
		self.rx.borrow().is_some()
	}

	pub fn mode(&self) -> Option<StopMode> {
		*self.rx.borrow()
	}

	/// Resolves once shutdown has been requested. Resolves immediately if it
	/// already was.
	pub async fn triggered(&self) {
		let mut rx = self.rx.clone();
		while rx.borrow_and_update().is_none() {
			if rx.changed().await.is_err() {
				return;
			}
		}
	}
}

/// Creates a connected trigger/observe pair.
pub fn shutdown_channel() -> (ShutdownHandle, ShutdownSignal) {
	let (tx, rx) = watch::channel(None);
	(ShutdownHandle { tx }, ShutdownSignal { rx })
}
