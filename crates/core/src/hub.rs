//! Update hub: the long-lived channel between a session and local clients.
//!
//! Line-delimited JSON over a localhost TCP connection. Every client gets a
//! full [`SessionSnapshot`] on connect, then state-change events as they
//! happen. Inbound actions are forwarded to the orchestrator; the hub itself
//! holds no state the orchestrator does not also own.
//!
//! Delivery is per-client independent: each client has its own unbounded
//! outbound queue and writer task, so a slow or dead client never blocks the
//! others.

use std::net::SocketAddr;
use std::sync::Arc;

use loft_protocol::{ClientAction, ClientMessage, ServerMessage, SessionEvent, SessionSnapshot};
use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::Result;

/// Client-originated request forwarded to the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HubAction {
	Redeploy,
	RestartComponent { component_id: String },
}

/// Shared view of the session the hub serves snapshots from.
///
/// The orchestrator updates it on every state change; the hub only reads.
#[derive(Clone)]
pub struct SharedSnapshot {
	inner: Arc<Mutex<SessionSnapshot>>,
}

impl SharedSnapshot {
	pub fn new(initial: SessionSnapshot) -> Self {
		Self { inner: Arc::new(Mutex::new(initial)) }
	}

	pub fn update(&self, snapshot: SessionSnapshot) {
		*self.inner.lock() = snapshot;
	}

	pub fn current(&self) -> SessionSnapshot {
		self.inner.lock().clone()
	}
}

type ClientRegistry = Arc<Mutex<Vec<mpsc::UnboundedSender<ServerMessage>>>>;

/// One hub per session; a transport, not a source of truth.
pub struct UpdateHub {
	local_addr: SocketAddr,
	clients: ClientRegistry,
	view: SharedSnapshot,
	actions_tx: mpsc::UnboundedSender<HubAction>,
	accept_task: JoinHandle<()>,
}

impl UpdateHub {
	/// Binds a localhost listener and starts accepting clients.
	///
	/// Returns the hub and the receiver the orchestrator consumes client
	/// actions from.
	pub async fn bind(port: u16, view: SharedSnapshot) -> Result<(Self, mpsc::UnboundedReceiver<HubAction>)> {
		let listener = TcpListener::bind(("127.0.0.1", port)).await?;
		let local_addr = listener.local_addr()?;
		let (actions_tx, actions_rx) = mpsc::unbounded_channel();
		let clients: ClientRegistry = Arc::new(Mutex::new(Vec::new()));

		let accept_task = tokio::spawn(accept_loop(
			listener,
			Arc::clone(&clients),
			view.clone(),
			actions_tx.clone(),
		));

		let hub = Self { local_addr, clients, view, actions_tx, accept_task };
		Ok((hub, actions_rx))
	}

	pub fn local_addr(&self) -> SocketAddr {
		self.local_addr
	}

	/// Attaches a client over an arbitrary stream; tests use in-memory
	/// duplex streams instead of TCP.
	pub fn attach<S>(&self, stream: S)
	where
		S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
	{
		attach_client(stream, &self.clients, &self.view, self.actions_tx.clone());
	}

	/// Sends `event` to every connected client; dead clients are dropped.
	pub fn broadcast(&self, event: SessionEvent) {
		let message = ServerMessage::Event { event };
		self.clients.lock().retain(|client| client.send(message.clone()).is_ok());
	}

	/// Stops accepting and disconnects every client cleanly.
	pub async fn close(self) {
		self.accept_task.abort();
		let _ = self.accept_task.await;
		// Dropping the senders ends each writer task, which shuts its
		// stream down so clients observe EOF rather than a timeout.
		self.clients.lock().clear();
		debug!(target: "loft.hub", "hub closed");
	}
}

async fn accept_loop(listener: TcpListener, clients: ClientRegistry, view: SharedSnapshot, actions_tx: mpsc::UnboundedSender<HubAction>) {
	loop {
		match listener.accept().await {
			Ok((stream, peer)) => {
				debug!(target: "loft.hub", %peer, "client connected");
				attach_client(stream, &clients, &view, actions_tx.clone());
			}
			Err(err) => {
				warn!(target: "loft.hub", error = %err, "accept failed");
			}
		}
	}
}

fn attach_client<S>(stream: S, clients: &ClientRegistry, view: &SharedSnapshot, actions_tx: mpsc::UnboundedSender<HubAction>)
where
	S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
	let (read_half, write_half) = tokio::io::split(stream);
	let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

	// Snapshot first, before the client can observe any event.
	let _ = outbound_tx.send(ServerMessage::Snapshot { session: view.current() });
	clients.lock().push(outbound_tx);

	tokio::spawn(write_loop(write_half, outbound_rx));
	tokio::spawn(read_loop(read_half, actions_tx));
}

async fn write_loop<W>(mut write: W, mut outbound: mpsc::UnboundedReceiver<ServerMessage>)
where
	W: AsyncWrite + Unpin,
{
	while let Some(message) = outbound.recv().await {
		let mut line = match serde_json::to_string(&message) {
			Ok(line) => line,
			Err(err) => {
				warn!(target: "loft.hub", error = %err, "failed to encode server message");
				continue;
			}
		};
		line.push('\n');
		if write.write_all(line.as_bytes()).await.is_err() {
			// Dead client; its sender is dropped on the next broadcast.
			break;
		}
	}
	let _ = write.shutdown().await;
}

async fn read_loop<R>(read: R, actions_tx: mpsc::UnboundedSender<HubAction>)
where
	R: AsyncRead + Unpin,
{
	let mut lines = BufReader::new(read).lines();
	while let Ok(Some(line)) = lines.next_line().await {
		if line.trim().is_empty() {
			continue;
		}
		let message = match serde_json::from_str::<ClientMessage>(&line) {
			Ok(message) => message,
			Err(err) => {
				// Unknown message types are ignored for forward compatibility.
				debug!(target: "loft.hub", error = %err, "ignoring unrecognized client message");
				continue;
			}
		};
		let ClientMessage::Action { action, component_id } = message;
		let action = match action {
			ClientAction::Redeploy => HubAction::Redeploy,
			ClientAction::RestartComponent => {
				let Some(component_id) = component_id else {
					debug!(target: "loft.hub", "restart-component without componentId; ignoring");
					continue;
				};
				HubAction::RestartComponent { component_id }
			}
		};
		if actions_tx.send(action).is_err() {
			break;
		}
	}
	debug!(target: "loft.hub", "client reader finished");
}
