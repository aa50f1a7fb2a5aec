//! End-to-end tests against a local WebSocket server.

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use futures::{SinkExt, StreamExt};
use mass_client::{EventCallback, EventFilter, LifecyclePhase, MassClient};
use mass_core::{ClientError, EventType, MassEvent, ServerError, ServerErrorKind};
use mass_settings::{ClientSettings, ConnectionSettings};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;

const TIMEOUT: Duration = Duration::from_secs(5);

/// Frames the test asks the fake server to push.
enum Push {
    Frame(Value),
    Text(String),
    Ping,
    Close,
}

fn server_info(min_supported: u32) -> Value {
    json!({
        "server_id": "fake",
        "server_version": "2.5.0",
        "schema_version": 25,
        "min_supported_schema_version": min_supported,
        "base_url": "http://127.0.0.1",
        "homeassistant_addon": false,
        "onboard_done": true,
    })
}

/// Canned answers keyed by command name.
fn respond(id: &Value, command: &str, args: &Value) -> Value {
    let result = match command {
        "providers" => json!([{
            "type": "music",
            "domain": "filesystem_local",
            "name": "Local",
            "instance_id": "filesystem_local--1",
            "available": true,
        }]),
        "providers/manifests" => json!([]),
        "player_queues/all" => json!([]),
        "players/all" => json!([{"player_id": "kitchen", "name": "Kitchen"}]),
        "echo" => args.clone(),
        "fail" => {
            return json!({"message_id": id, "error_code": 12, "details": "no such command"});
        }
        _ => Value::Null,
    };
    json!({"message_id": id, "result": result})
}

/// Accept one client, greet it with `info`, answer its commands, and push
/// whatever the test sends on the returned channel.
async fn boot_server(info: Value) -> (String, mpsc::UnboundedSender<Push>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (push_tx, mut push_rx) = mpsc::unbounded_channel::<Push>();

    let _server = tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
        let (mut sink, mut stream) = ws.split();
        sink.send(Message::text(info.to_string())).await.unwrap();

        loop {
            tokio::select! {
                incoming = stream.next() => {
                    let Some(Ok(Message::Text(text))) = incoming else { break };
                    let frame: Value = serde_json::from_str(&text).unwrap();
                    let command = frame["command"].as_str().unwrap_or_default();
                    let reply = respond(&frame["message_id"], command, &frame["args"]);
                    if sink.send(Message::text(reply.to_string())).await.is_err() {
                        break;
                    }
                }
                push = push_rx.recv() => match push {
                    Some(Push::Frame(frame)) => {
                        let _ = sink.send(Message::text(frame.to_string())).await;
                    }
                    Some(Push::Text(text)) => {
                        let _ = sink.send(Message::text(text)).await;
                    }
                    Some(Push::Ping) => {
                        let _ = sink.send(Message::Ping(vec![1, 2, 3].into())).await;
                    }
                    Some(Push::Close) | None => {
                        let _ = sink.send(Message::Close(None)).await;
                        break;
                    }
                },
            }
        }
    });

    (format!("http://{addr}"), push_tx)
}

fn client_for(url: &str) -> Arc<MassClient> {
    client_with_limit(url, ConnectionSettings::default().max_message_size)
}

fn client_with_limit(url: &str, max_message_size: usize) -> Arc<MassClient> {
    let settings = ClientSettings {
        server_url: url.to_string(),
        connection: ConnectionSettings {
            connect_timeout_ms: 2_000,
            max_message_size,
            ..ConnectionSettings::default()
        },
        ..ClientSettings::default()
    };
    Arc::new(MassClient::new(&settings).unwrap())
}

/// An event frame padded with a filler field to roughly `size` bytes.
fn padded_event(size: usize) -> Value {
    json!({
        "event": "player_updated",
        "object_id": "kitchen",
        "data": {"player_id": "kitchen", "filler": "x".repeat(size)},
    })
}

type Listener = tokio::task::JoinHandle<mass_core::Result<()>>;

/// Client with the given frame limit, listening and initialised.
async fn listening_client(url: &str, max_message_size: usize) -> (Arc<MassClient>, Listener) {
    let client = client_with_limit(url, max_message_size);
    let listener = {
        let client = Arc::clone(&client);
        tokio::spawn(async move { client.start_listening().await })
    };
    timeout(TIMEOUT, client.wait_initialized()).await.unwrap().unwrap();
    (client, listener)
}

#[tokio::test]
async fn full_session_over_websocket() {
    let (url, push) = boot_server(server_info(20)).await;
    let client = client_for(&url);

    let listener = {
        let client = Arc::clone(&client);
        tokio::spawn(async move { client.start_listening().await })
    };
    timeout(TIMEOUT, client.wait_initialized()).await.unwrap().unwrap();

    assert_eq!(client.phase(), LifecyclePhase::Listening);
    assert_eq!(client.server_info().unwrap().server_id, "fake");
    assert!(client.get_provider("filesystem_local", false).is_some());
    assert_eq!(client.players().get("kitchen").unwrap().name, "Kitchen");

    let echoed = timeout(TIMEOUT, client.send_command("echo", json!({"x": 1}), None))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(echoed, json!({"x": 1}));

    let (seen_tx, mut seen) = mpsc::unbounded_channel();
    let _ = client.subscribe(
        EventCallback::from_async(move |event: MassEvent| {
            let seen_tx = seen_tx.clone();
            async move {
                let _ = seen_tx.send(event);
            }
        }),
        EventFilter::all()
            .events([EventType::PlayerUpdated])
            .ids(["kitchen"]),
    );

    push.send(Push::Ping).unwrap();
    push.send(Push::Frame(json!({
        "event": "player_updated",
        "object_id": "lounge",
        "data": {"player_id": "lounge"},
    })))
    .unwrap();
    push.send(Push::Frame(json!({
        "event": "player_updated",
        "object_id": "kitchen",
        "data": {"player_id": "kitchen", "name": "Kitchen", "volume_level": 55},
    })))
    .unwrap();

    let event = timeout(TIMEOUT, seen.recv()).await.unwrap().unwrap();
    assert_eq!(event.object_id.as_deref(), Some("kitchen"));
    assert_eq!(client.players().get("kitchen").unwrap().volume_level, Some(55));

    push.send(Push::Close).unwrap();
    assert_matches!(timeout(TIMEOUT, listener).await.unwrap().unwrap(), Ok(()));
    assert_eq!(client.phase(), LifecyclePhase::Closed);
    assert!(!client.is_connected());
}

#[tokio::test]
async fn server_error_reaches_caller() {
    let (url, _push) = boot_server(server_info(20)).await;
    let client = client_for(&url);
    let listener = {
        let client = Arc::clone(&client);
        tokio::spawn(async move { client.start_listening().await })
    };
    timeout(TIMEOUT, client.wait_initialized()).await.unwrap().unwrap();

    let outcome = timeout(TIMEOUT, client.send_command("fail", Value::Null, None))
        .await
        .unwrap();
    assert_matches!(
        outcome,
        Err(ClientError::Server(ServerError { kind: ServerErrorKind::InvalidCommand, .. }))
    );

    client.disconnect().await;
    timeout(TIMEOUT, listener).await.unwrap().unwrap().unwrap();
}

#[tokio::test]
async fn incompatible_server_is_refused() {
    let (url, _push) = boot_server(server_info(99)).await;
    let client = client_for(&url);

    assert_matches!(
        timeout(TIMEOUT, client.connect()).await.unwrap(),
        Err(ClientError::IncompatibleVersion(_))
    );
    assert!(client.server_info().is_none());
    assert!(!client.is_connected());
}

#[tokio::test]
async fn unreachable_server_is_cannot_connect() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = client_for(&format!("http://{addr}"));
    assert_matches!(
        timeout(TIMEOUT, client.connect()).await.unwrap(),
        Err(ClientError::CannotConnect { .. })
    );
}

#[tokio::test]
async fn oversize_and_garbled_frames_are_skipped() {
    let (url, push) = boot_server(server_info(20)).await;
    let (client, listener) = listening_client(&url, 4 * 1024).await;

    let (seen_tx, mut seen) = mpsc::unbounded_channel();
    let _ = client.subscribe(
        EventCallback::sync(move |event: &MassEvent| {
            let _ = seen_tx.send(event.event);
        }),
        EventFilter::all(),
    );

    // over the message limit but inside the transport's headroom
    push.send(Push::Frame(padded_event(6 * 1024))).unwrap();
    push.send(Push::Text("this is not json".into())).unwrap();
    push.send(Push::Frame(json!({"event": "shutdown"}))).unwrap();

    assert_eq!(timeout(TIMEOUT, seen.recv()).await.unwrap(), Some(EventType::Shutdown));
    assert_eq!(client.phase(), LifecyclePhase::Listening);
    assert!(client.players().get("kitchen").unwrap().extra.get("filler").is_none());

    client.disconnect().await;
    timeout(TIMEOUT, listener).await.unwrap().unwrap().unwrap();
}

#[tokio::test]
async fn frame_beyond_transport_limit_ends_session() {
    let (url, push) = boot_server(server_info(20)).await;
    let (client, listener) = listening_client(&url, 4 * 1024).await;

    push.send(Push::Frame(padded_event(64 * 1024))).unwrap();

    assert_matches!(timeout(TIMEOUT, listener).await.unwrap().unwrap(), Ok(()));
    assert_eq!(client.phase(), LifecyclePhase::Closed);
    assert!(!client.is_connected());
}
