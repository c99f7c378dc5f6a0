//! End-to-end session scenarios against in-memory collaborators.

mod support;

use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use loft::{LoftError, SessionConfig, SessionOutcome, shutdown_channel};
use loft_protocol::{AccountClass, ServerMessage, SessionStatus};
use support::{
	FakeDirectory, FakeProjects, FakeProvisioner, FakeTranslator, GatedSource, PendingForeverSource,
	ScriptedPrompt, World, account, function_component, public_app_component,
};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc;

const WAIT_BUDGET: Duration = Duration::from_secs(5);

async fn wait_for(what: &str, mut ready: impl FnMut() -> bool) {
	let deadline = Instant::now() + WAIT_BUDGET;
	while !ready() {
		assert!(Instant::now() < deadline, "timed out waiting for {what}");
		tokio::time::sleep(Duration::from_millis(10)).await;
	}
}

/// Waits for the session to report the hub's ephemeral bound address.
async fn hub_addr(rx: &mut mpsc::UnboundedReceiver<SocketAddr>) -> SocketAddr {
	tokio::time::timeout(WAIT_BUDGET, rx.recv())
		.await
		.expect("session never went live")
		.expect("session ended before going live")
}

async fn connect(addr: SocketAddr) -> (Lines<BufReader<OwnedReadHalf>>, OwnedWriteHalf) {
	let stream = TcpStream::connect(addr).await.expect("hub not reachable");
	let (read, write) = stream.into_split();
	(BufReader::new(read).lines(), write)
}

async fn next_message(lines: &mut Lines<BufReader<OwnedReadHalf>>) -> Option<ServerMessage> {
	let line = lines.next_line().await.expect("hub connection error")?;
	Some(serde_json::from_str(&line).expect("unparseable server message"))
}

#[tokio::test]
async fn creates_missing_project_and_goes_live() {
	let world = World::new(
		FakeDirectory::new(
			vec![account("100", AccountClass::DeveloperTest, true, true)],
			Some(account("100", AccountClass::DeveloperTest, true, true)),
		),
		FakeProvisioner::new(account("901", AccountClass::DeveloperTest, true, true)),
		FakeProjects::new(false, None),
		FakeTranslator::new(vec![function_component("fn-api")], "aaaa"),
		// Default account, then project creation.
		ScriptedPrompt::new(&[true, true]),
	);

	let (handle, signal) = shutdown_channel();
	let config = SessionConfig::new("crm-cards", "/tmp/crm-cards");
	let task = tokio::spawn(loft::start(config, world.collaborators(), signal));

	wait_for("initial deploy", || world.projects.deploy_calls.load(Ordering::SeqCst) >= 1).await;
	handle.trigger(true);
	task.await.unwrap().unwrap();

	assert_eq!(world.projects.create_calls.load(Ordering::SeqCst), 1);
	assert_eq!(world.projects.upload_calls.load(Ordering::SeqCst), 1);
	assert_eq!(world.provisioner.created.load(Ordering::SeqCst), 0);
	assert_eq!(world.prompt.questions.lock().len(), 2);
}

#[tokio::test]
async fn drift_mismatch_warns_without_aborting() {
	let world = World::new(
		FakeDirectory::new(
			vec![account("100", AccountClass::DeveloperTest, true, true)],
			Some(account("100", AccountClass::DeveloperTest, true, true)),
		),
		FakeProvisioner::new(account("901", AccountClass::DeveloperTest, true, true)),
		FakeProjects::new(true, Some("deadbeef".into())),
		FakeTranslator::new(vec![function_component("fn-api")], "cafe"),
		ScriptedPrompt::new(&[]),
	);

	let (handle, signal) = shutdown_channel();
	let config = SessionConfig::new("crm-cards", "/tmp/crm-cards").with_assume_yes(true);
	let task = tokio::spawn(loft::start(config, world.collaborators(), signal));

	wait_for("initial deploy", || world.projects.deploy_calls.load(Ordering::SeqCst) >= 1).await;
	handle.trigger(true);
	task.await.unwrap().unwrap();

	// The stale deploy is reported, never treated as an error.
	assert_eq!(world.projects.create_calls.load(Ordering::SeqCst), 0);
	assert_eq!(world.projects.upload_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn declined_provisioning_exits_cleanly_with_no_side_effects() {
	let world = World::new(
		FakeDirectory::new(
			vec![account("100", AccountClass::Standard, false, true)],
			Some(account("100", AccountClass::Standard, false, true)),
		),
		FakeProvisioner::new(account("901", AccountClass::DeveloperTest, true, true)),
		FakeProjects::new(true, None),
		FakeTranslator::new(vec![function_component("fn-api")], "aaaa"),
		ScriptedPrompt::new(&[false]),
	);

	let (_handle, signal) = shutdown_channel();
	let config = SessionConfig::new("crm-cards", "/tmp/crm-cards");
	let result = loft::start(config, world.collaborators(), signal).await;

	assert!(matches!(result, Err(LoftError::UserDeclined)));
	assert_eq!(SessionOutcome::from_result(&result), SessionOutcome::CleanExit);
	assert_eq!(world.provisioner.created.load(Ordering::SeqCst), 0);
	assert_eq!(world.projects.create_calls.load(Ordering::SeqCst), 0);
	assert_eq!(world.projects.upload_calls.load(Ordering::SeqCst), 0);
	assert!(world.directory.persisted.lock().is_empty());
}

#[tokio::test]
async fn explicit_account_capability_mismatch_is_fatal() {
	let world = World::new(
		FakeDirectory::new(vec![account("200", AccountClass::Standard, false, true)], None),
		FakeProvisioner::new(account("901", AccountClass::AppDeveloper, true, true)),
		FakeProjects::new(true, None),
		FakeTranslator::new(vec![public_app_component("app-card")], "aaaa"),
		ScriptedPrompt::new(&[]),
	);

	let (_handle, signal) = shutdown_channel();
	let config = SessionConfig::new("crm-cards", "/tmp/crm-cards").with_explicit_account(Some("200".into()));
	let result = loft::start(config, world.collaborators(), signal).await;

	assert!(matches!(result, Err(LoftError::CapabilityMismatch { .. })));
	assert_eq!(SessionOutcome::from_result(&result), SessionOutcome::Fatal);
	// An explicit account is never silently substituted.
	assert_eq!(world.provisioner.created.load(Ordering::SeqCst), 0);
	assert!(world.prompt.questions.lock().is_empty());
}

#[tokio::test]
async fn provisioned_account_is_persisted_and_torn_down() {
	let world = World::new(
		FakeDirectory::new(
			vec![account("100", AccountClass::Standard, false, true)],
			Some(account("100", AccountClass::Standard, false, true)),
		),
		FakeProvisioner::new(account("901", AccountClass::DeveloperTest, true, true)),
		FakeProjects::new(true, Some("aaaa".into())),
		FakeTranslator::new(vec![function_component("fn-api")], "aaaa"),
		ScriptedPrompt::new(&[]),
	);

	let (handle, signal) = shutdown_channel();
	let (addr_tx, mut addr_rx) = mpsc::unbounded_channel();
	let config = SessionConfig::new("crm-cards", "/tmp/crm-cards")
		.with_assume_yes(true)
		.with_teardown_on_exit(true)
		.with_hub_addr_notify(addr_tx);
	let task = tokio::spawn(loft::start(config, world.collaborators(), signal));

	// Teardown only happens on the way out of a live session.
	hub_addr(&mut addr_rx).await;
	handle.trigger(true);
	task.await.unwrap().unwrap();

	assert_eq!(world.provisioner.created.load(Ordering::SeqCst), 1);
	assert_eq!(*world.directory.persisted.lock(), vec!["901".to_string()]);
	assert_eq!(*world.provisioner.torn_down.lock(), vec!["901".to_string()]);
}

#[tokio::test]
async fn interrupt_during_redeploy_poll_shuts_down_promptly() {
	let world = World::new(
		FakeDirectory::new(
			vec![account("100", AccountClass::DeveloperTest, true, true)],
			Some(account("100", AccountClass::DeveloperTest, true, true)),
		),
		FakeProvisioner::new(account("901", AccountClass::DeveloperTest, true, true)),
		FakeProjects::new(true, Some("aaaa".into())),
		FakeTranslator::new(vec![function_component("fn-api")], "aaaa"),
		ScriptedPrompt::new(&[]),
	);

	let (handle, signal) = shutdown_channel();
	let (addr_tx, mut addr_rx) = mpsc::unbounded_channel();
	let config = SessionConfig::new("crm-cards", "/tmp/crm-cards")
		.with_assume_yes(true)
		.with_hub_addr_notify(addr_tx);
	let task = tokio::spawn(loft::start(config, world.collaborators(), signal));

	let (mut lines, mut write) = connect(hub_addr(&mut addr_rx).await).await;
	match next_message(&mut lines).await {
		Some(ServerMessage::Snapshot { session }) => assert_eq!(session.status, SessionStatus::Live),
		other => panic!("expected snapshot first, got {other:?}"),
	}

	// The next build never reaches a terminal status.
	world.projects.push_build_source(Box::new(PendingForeverSource));
	write.write_all(b"{\"type\":\"action\",\"action\":\"redeploy\"}\n").await.unwrap();
	wait_for("redeploy upload", || world.projects.upload_calls.load(Ordering::SeqCst) >= 2).await;

	handle.trigger(true);
	tokio::time::timeout(WAIT_BUDGET, task)
		.await
		.expect("session did not shut down within budget")
		.unwrap()
		.unwrap();

	// The client sees the shutdown announcement, then a clean EOF.
	loop {
		match next_message(&mut lines).await {
			Some(ServerMessage::Event { event }) => {
				if serde_json::to_string(&event).unwrap().contains("shutting_down") {
					break;
				}
			}
			Some(other) => panic!("unexpected message while draining: {other:?}"),
			None => panic!("connection closed before the shutdown announcement"),
		}
	}
	assert!(next_message(&mut lines).await.is_none());
}

#[tokio::test]
async fn queued_redeploys_coalesce_into_one_extra_cycle() {
	let world = World::new(
		FakeDirectory::new(
			vec![account("100", AccountClass::DeveloperTest, true, true)],
			Some(account("100", AccountClass::DeveloperTest, true, true)),
		),
		FakeProvisioner::new(account("901", AccountClass::DeveloperTest, true, true)),
		FakeProjects::new(true, Some("aaaa".into())),
		FakeTranslator::new(vec![function_component("fn-api")], "aaaa"),
		ScriptedPrompt::new(&[]),
	);

	let (handle, signal) = shutdown_channel();
	let (addr_tx, mut addr_rx) = mpsc::unbounded_channel();
	let config = SessionConfig::new("crm-cards", "/tmp/crm-cards")
		.with_assume_yes(true)
		.with_hub_addr_notify(addr_tx);
	let task = tokio::spawn(loft::start(config, world.collaborators(), signal));

	let (mut lines, mut write) = connect(hub_addr(&mut addr_rx).await).await;
	assert!(matches!(next_message(&mut lines).await, Some(ServerMessage::Snapshot { .. })));

	// First redeploy blocks in its build poll until the gate opens.
	let (gated, gate) = GatedSource::new();
	world.projects.push_build_source(Box::new(gated));
	write.write_all(b"{\"type\":\"action\",\"action\":\"redeploy\"}\n").await.unwrap();
	wait_for("blocked redeploy upload", || world.projects.upload_calls.load(Ordering::SeqCst) >= 2).await;

	// Two more requests arrive while the first is still polling.
	write.write_all(b"{\"type\":\"action\",\"action\":\"redeploy\"}\n").await.unwrap();
	write.write_all(b"{\"type\":\"action\",\"action\":\"redeploy\"}\n").await.unwrap();
	tokio::time::sleep(Duration::from_millis(100)).await;
	gate.add_permits(1);

	wait_for("coalesced redeploy", || world.projects.upload_calls.load(Ordering::SeqCst) >= 3).await;
	tokio::time::sleep(Duration::from_millis(300)).await;
	// Initial deploy + blocked redeploy + exactly one coalesced cycle.
	assert_eq!(world.projects.upload_calls.load(Ordering::SeqCst), 3);

	handle.trigger(true);
	tokio::time::timeout(WAIT_BUDGET, task).await.unwrap().unwrap().unwrap();
}

#[tokio::test]
async fn restart_component_action_reaches_the_platform() {
	let world = World::new(
		FakeDirectory::new(
			vec![account("100", AccountClass::DeveloperTest, true, true)],
			Some(account("100", AccountClass::DeveloperTest, true, true)),
		),
		FakeProvisioner::new(account("901", AccountClass::DeveloperTest, true, true)),
		FakeProjects::new(true, Some("aaaa".into())),
		FakeTranslator::new(vec![function_component("fn-api")], "aaaa"),
		ScriptedPrompt::new(&[]),
	);

	let (handle, signal) = shutdown_channel();
	let (addr_tx, mut addr_rx) = mpsc::unbounded_channel();
	let config = SessionConfig::new("crm-cards", "/tmp/crm-cards")
		.with_assume_yes(true)
		.with_hub_addr_notify(addr_tx);
	let task = tokio::spawn(loft::start(config, world.collaborators(), signal));

	let (mut lines, mut write) = connect(hub_addr(&mut addr_rx).await).await;
	assert!(matches!(next_message(&mut lines).await, Some(ServerMessage::Snapshot { .. })));

	write
		.write_all(b"{\"type\":\"action\",\"action\":\"restart-component\",\"componentId\":\"fn-api\"}\n")
		.await
		.unwrap();
	wait_for("component restart", || !world.projects.restarted.lock().is_empty()).await;
	assert_eq!(*world.projects.restarted.lock(), vec!["fn-api".to_string()]);

	handle.trigger(true);
	tokio::time::timeout(WAIT_BUDGET, task).await.unwrap().unwrap().unwrap();
}
