//! End-to-end tests: real WebSocket clients against a running server,
//! checking the exact JSON each side sees.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio_tungstenite::tungstenite::Message;
use wingduel::prelude::*;

// =========================================================================
// Helpers
// =========================================================================

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

const RECV_TIMEOUT: Duration = Duration::from_secs(2);

/// Starts a server on a random port with a short grace delay.
async fn start_server() -> (String, CoordinatorHandle) {
    start_server_with(WingduelServer::builder()).await
}

async fn start_server_with(builder: WingduelServerBuilder) -> (String, CoordinatorHandle) {
    let server = builder
        .bind("127.0.0.1:0")
        .lobby_config(LobbyConfig::with_grace_delay(Duration::from_millis(50)))
        .build()
        .await
        .expect("server should build");

    let addr = server
        .local_addr()
        .expect("should have local addr")
        .to_string();
    let coordinator = server.coordinator();

    tokio::spawn(async move {
        let _ = server.run().await;
    });

    // Give the accept loop a moment to start.
    tokio::time::sleep(Duration::from_millis(10)).await;
    (addr, coordinator)
}

async fn connect(addr: &str) -> ClientWs {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .expect("should connect");
    ws
}

async fn send(ws: &mut ClientWs, value: Value) {
    ws.send(Message::text(value.to_string()))
        .await
        .expect("send");
}

/// Next JSON frame from the server; `None` once the socket is closed.
async fn try_recv(ws: &mut ClientWs) -> Option<Value> {
    loop {
        let msg = tokio::time::timeout(RECV_TIMEOUT, ws.next())
            .await
            .expect("timed out waiting for a frame");
        match msg {
            Some(Ok(Message::Text(text))) => {
                return Some(serde_json::from_str(text.as_str()).expect("server sent invalid JSON"));
            }
            Some(Ok(Message::Binary(data))) => {
                return Some(serde_json::from_slice(&data).expect("server sent invalid JSON"));
            }
            Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return None,
            Some(Ok(_)) => continue,
        }
    }
}

async fn recv(ws: &mut ClientWs) -> Value {
    try_recv(ws).await.expect("connection closed unexpectedly")
}

/// Connects two clients in order and waits until both are matched.
/// Returns them with the session id.
async fn matched_pair(addr: &str) -> (ClientWs, ClientWs, String) {
    let mut a = connect(addr).await;
    assert_eq!(recv(&mut a).await, json!({"event": "searching"}));
    let mut b = connect(addr).await;
    assert_eq!(recv(&mut b).await, json!({"event": "searching"}));

    let a_matched = recv(&mut a).await;
    let b_matched = recv(&mut b).await;
    let session_id = a_matched["data"]["sessionId"]
        .as_str()
        .expect("sessionId should be a string")
        .to_string();
    assert_eq!(b_matched["data"]["sessionId"], json!(session_id));

    (a, b, session_id)
}

/// A matched pair that has also exchanged ready and received the start.
async fn started_pair(addr: &str) -> (ClientWs, ClientWs, String) {
    let (mut a, mut b, session_id) = matched_pair(addr).await;
    send(&mut a, json!({"event": "ready"})).await;
    send(&mut b, json!({"event": "ready"})).await;
    for ws in [&mut a, &mut b] {
        assert_eq!(recv(ws).await["event"], "started");
        assert_eq!(recv(ws).await["event"], "player-assignment");
    }
    (a, b, session_id)
}

// =========================================================================
// Matchmaking
// =========================================================================

#[tokio::test]
async fn test_connect_receives_searching() {
    let (addr, coordinator) = start_server().await;
    let mut ws = connect(&addr).await;

    assert_eq!(recv(&mut ws).await, json!({"event": "searching"}));
    assert_eq!(coordinator.stats().await.unwrap().waiting, 1);
}

#[tokio::test]
async fn test_two_clients_matched_with_seats() {
    let (addr, _) = start_server().await;
    let mut a = connect(&addr).await;
    recv(&mut a).await;
    let mut b = connect(&addr).await;
    recv(&mut b).await;

    let a_matched = recv(&mut a).await;
    let b_matched = recv(&mut b).await;

    assert_eq!(a_matched["event"], "matched");
    assert_eq!(a_matched["data"]["playerNumber"], 1);
    assert_eq!(b_matched["data"]["playerNumber"], 2);

    let id = a_matched["data"]["sessionId"].as_str().unwrap();
    assert_eq!(id.len(), 16);
    assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    assert_eq!(b_matched["data"]["sessionId"], json!(id));
}

// =========================================================================
// Start
// =========================================================================

#[tokio::test]
async fn test_both_ready_start_with_shared_seed() {
    let (addr, _) = start_server().await;
    let (mut a, mut b, _) = matched_pair(&addr).await;

    send(&mut a, json!({"event": "ready"})).await;
    send(&mut b, json!({"event": "ready"})).await;

    let a_started = recv(&mut a).await;
    let b_started = recv(&mut b).await;
    assert_eq!(a_started["event"], "started");
    assert_eq!(a_started, b_started);
    let seed = a_started["data"]["seed"].as_u64().unwrap();
    assert!(seed < 1_000_000);
    // The broadcast carries nothing player-specific.
    assert_eq!(a_started["data"].as_object().unwrap().len(), 1);

    assert_eq!(
        recv(&mut a).await,
        json!({"event": "player-assignment", "data": {"playerNumber": 1}})
    );
    assert_eq!(
        recv(&mut b).await,
        json!({"event": "player-assignment", "data": {"playerNumber": 2}})
    );
}

// =========================================================================
// Relay
// =========================================================================

#[tokio::test]
async fn test_flap_relayed_to_opponent_with_player_number() {
    let (addr, _) = start_server().await;
    let (mut a, mut b, _) = started_pair(&addr).await;

    send(&mut a, json!({"event": "flap", "data": {"y": 212.5}})).await;

    assert_eq!(
        recv(&mut b).await,
        json!({"event": "opponent-flap", "data": {"playerNumber": 1, "y": 212.5}})
    );
}

#[tokio::test]
async fn test_position_and_ability_relayed_both_directions() {
    let (addr, _) = start_server().await;
    let (mut a, mut b, _) = started_pair(&addr).await;

    send(&mut b, json!({"event": "position", "data": {"x": 10, "y": 20, "vy": -1}})).await;
    assert_eq!(
        recv(&mut a).await,
        json!({"event": "opponent-position", "data": {"playerNumber": 2, "x": 10, "y": 20, "vy": -1}})
    );

    send(&mut a, json!({"event": "ability-use", "data": {"ability": "shield"}})).await;
    assert_eq!(
        recv(&mut b).await,
        json!({"event": "opponent-ability", "data": {"playerNumber": 1, "ability": "shield"}})
    );
}

#[tokio::test]
async fn test_flap_without_data_relayed() {
    let (addr, _) = start_server().await;
    let (mut a, mut b, _) = started_pair(&addr).await;

    send(&mut a, json!({"event": "flap"})).await;
    send(&mut b, json!({"event": "flap", "data": null})).await;

    assert_eq!(
        recv(&mut b).await,
        json!({"event": "opponent-flap", "data": {"playerNumber": 1}})
    );
    assert_eq!(
        recv(&mut a).await,
        json!({"event": "opponent-flap", "data": {"playerNumber": 2}})
    );
}

#[tokio::test]
async fn test_malformed_frames_dropped_connection_kept() {
    let (addr, _) = start_server().await;
    let (mut a, mut b, _) = started_pair(&addr).await;

    a.send(Message::text("not json")).await.unwrap();
    send(&mut a, json!({"event": "teleport", "data": {}})).await;
    send(&mut a, json!({"event": "flap", "data": 7})).await;
    send(&mut a, json!({"event": "flap", "data": {"y": 1}})).await;

    // Only the well-formed flap gets through.
    assert_eq!(
        recv(&mut b).await,
        json!({"event": "opponent-flap", "data": {"playerNumber": 1, "y": 1}})
    );
}

// =========================================================================
// Game over
// =========================================================================

#[tokio::test]
async fn test_death_broadcasts_game_over_then_session_removed() {
    let (addr, coordinator) = start_server().await;
    let (mut a, mut b, session_id) = started_pair(&addr).await;

    send(&mut b, json!({"event": "death", "data": {"cause": "pipe"}})).await;

    let verdict = json!({
        "event": "game-over",
        "data": {"winner": 1, "loser": 2, "cause": "pipe"}
    });
    assert_eq!(recv(&mut a).await, verdict);
    assert_eq!(recv(&mut b).await, verdict);

    // A late second death changes nothing.
    send(&mut a, json!({"event": "death", "data": {"cause": "ground"}})).await;

    let id = SessionId::new(session_id);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(coordinator.session_info(id).await.unwrap().is_none());
    assert_eq!(coordinator.stats().await.unwrap().sessions, 0);
}

#[tokio::test]
async fn test_death_without_cause_reported_as_unknown() {
    let (addr, _) = start_server().await;
    let (mut a, _b, _) = started_pair(&addr).await;

    send(&mut a, json!({"event": "death", "data": {}})).await;

    assert_eq!(
        recv(&mut a).await,
        json!({"event": "game-over", "data": {"winner": 2, "loser": 1, "cause": "unknown"}})
    );
}

#[tokio::test]
async fn test_death_without_data_reported_as_unknown() {
    let (addr, _) = start_server().await;
    let (mut a, mut b, _) = started_pair(&addr).await;

    send(&mut b, json!({"event": "death"})).await;

    let verdict = json!({"event": "game-over", "data": {"winner": 1, "loser": 2, "cause": "unknown"}});
    assert_eq!(recv(&mut a).await, verdict);
    assert_eq!(recv(&mut b).await, verdict);
}

// =========================================================================
// Disconnect
// =========================================================================

#[tokio::test]
async fn test_disconnect_mid_game_notifies_opponent() {
    let (addr, coordinator) = start_server().await;
    let (mut a, mut b, session_id) = started_pair(&addr).await;

    a.close(None).await.unwrap();

    assert_eq!(recv(&mut b).await, json!({"event": "opponent-disconnected"}));
    let info = coordinator
        .session_info(SessionId::new(session_id))
        .await
        .unwrap();
    assert!(info.is_none());
}

#[tokio::test]
async fn test_disconnect_while_searching_frees_queue() {
    let (addr, coordinator) = start_server().await;
    let mut a = connect(&addr).await;
    recv(&mut a).await;
    a.close(None).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    // The next client waits rather than pairing with the departed one.
    let mut b = connect(&addr).await;
    assert_eq!(recv(&mut b).await, json!({"event": "searching"}));
    tokio::time::sleep(Duration::from_millis(50)).await;
    let stats = coordinator.stats().await.unwrap();
    assert_eq!(stats.waiting, 1);
    assert_eq!(stats.sessions, 0);
}

#[tokio::test]
async fn test_quiet_client_answering_pings_stays_queued() {
    let (addr, coordinator) = start_server_with(
        WingduelServer::builder()
            .idle_timeout(Duration::from_millis(300))
            .heartbeat_interval(Duration::from_millis(100)),
    )
    .await;
    let mut ws = connect(&addr).await;
    recv(&mut ws).await;

    // Keep polling so the client answers pings, but send nothing ourselves.
    let quiet = tokio::time::timeout(Duration::from_millis(800), async {
        let mut pings = 0;
        while let Some(msg) = ws.next().await {
            match msg.expect("socket should stay open") {
                Message::Ping(_) => pings += 1,
                Message::Close(_) => panic!("quiet client was dropped"),
                other => panic!("unexpected frame {other:?}"),
            }
        }
        pings
    })
    .await;
    assert!(quiet.is_err(), "socket closed while the client was answering pings");

    assert_eq!(coordinator.stats().await.unwrap().waiting, 1);

    // Still matchable.
    let mut other = connect(&addr).await;
    recv(&mut other).await;
    assert_eq!(recv(&mut ws).await["event"], "matched");
}

#[tokio::test]
async fn test_unresponsive_client_dropped_after_idle_timeout() {
    let (addr, coordinator) = start_server_with(
        WingduelServer::builder()
            .idle_timeout(Duration::from_millis(300))
            .heartbeat_interval(Duration::from_millis(100)),
    )
    .await;
    let mut ws = connect(&addr).await;
    recv(&mut ws).await;

    // Never reading means never ponging.
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(coordinator.stats().await.unwrap().waiting, 0);
    drop(ws);
}

#[tokio::test]
async fn test_stalled_peer_does_not_delay_next_client() {
    let (addr, _) = start_server().await;

    // Holds the listener's attention without ever sending the upgrade request.
    let _silent = tokio::net::TcpStream::connect(&addr).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    let greeting = tokio::time::timeout(Duration::from_secs(1), async {
        let mut ws = connect(&addr).await;
        recv(&mut ws).await
    })
    .await
    .expect("second client waited behind the stalled peer");
    assert_eq!(greeting, json!({"event": "searching"}));
}

#[tokio::test]
async fn test_four_clients_form_two_sessions() {
    let (addr, coordinator) = start_server().await;
    let (_a, _b, first) = matched_pair(&addr).await;
    let (_c, _d, second) = matched_pair(&addr).await;

    assert_ne!(first, second);
    assert_eq!(coordinator.stats().await.unwrap().sessions, 2);
}
