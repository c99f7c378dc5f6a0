//! Line-delimited JSON messages exchanged over the hub connection.

use serde::{Deserialize, Serialize};

use crate::session::{SessionEvent, SessionSnapshot};

/// Server-to-client message.
///
/// A freshly connected (or reconnected) client always receives one
/// `Snapshot` before any `Event`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
	Snapshot { session: SessionSnapshot },
	Event { event: SessionEvent },
}

/// Action a client may request of the running session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClientAction {
	Redeploy,
	RestartComponent,
}

/// Client-to-server message.
///
/// Unknown `type` tags are ignored by the server for forward compatibility;
/// this enum only needs to describe the messages it understands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
	Action {
		action: ClientAction,
		#[serde(default, rename = "componentId", skip_serializing_if = "Option::is_none")]
		component_id: Option<String>,
	},
}
