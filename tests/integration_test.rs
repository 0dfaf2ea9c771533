//! Integration tests for the speaking queue using process-based testing.
//!
//! Each test spawns a real server process and drives it with raw WebSocket
//! clients speaking the wire protocol, so replication is observed exactly
//! as a real client would observe it.

use std::process::{Child, Command, Stdio};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async, tungstenite::protocol::Message,
};

use speaking_queue_rs::protocol::QueueMessage;

type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Helper struct to manage server process lifecycle
struct TestServer {
    process: Child,
    port: u16,
}

impl TestServer {
    /// Start a test server on the specified port and wait until it answers
    /// health checks
    async fn start(port: u16) -> Self {
        let process = Command::new("cargo")
            .args(["run", "--bin", "server", "--", "--port", &port.to_string()])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .expect("Failed to start server");

        let server = TestServer { process, port };
        server.wait_until_ready().await;
        server
    }

    /// Poll the health endpoint until the server is up
    async fn wait_until_ready(&self) {
        let health_url = format!("http://127.0.0.1:{}/api/health", self.port);
        for _ in 0..100 {
            if reqwest::get(&health_url).await.is_ok() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(300)).await;
        }
        panic!("Server did not become ready on port {}", self.port);
    }

    /// Get the WebSocket URL for this server
    fn ws_url(&self) -> String {
        format!("ws://127.0.0.1:{}/ws", self.port)
    }

    /// Get the queue inspection URL for this server
    fn queue_url(&self) -> String {
        format!("http://127.0.0.1:{}/api/queue", self.port)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        // Kill the server process when the test ends
        let _ = self.process.kill();
        let _ = self.process.wait();
    }
}

/// Connect a raw WebSocket client with the given identity
async fn connect_client(server: &TestServer, client_id: &str, role: &str) -> WsClient {
    let url = format!(
        "{}?client_id={}&name={}&role={}",
        server.ws_url(),
        client_id,
        client_id,
        role
    );
    let (ws, _response) = connect_async(&url)
        .await
        .unwrap_or_else(|e| panic!("Failed to connect '{}': {}", client_id, e));
    ws
}

/// Send one action message over an open client connection
async fn send_action(ws: &mut WsClient, msg: &QueueMessage) {
    let json = serde_json::to_string(msg).expect("action should serialize");
    ws.send(Message::Text(json.into()))
        .await
        .expect("Failed to send action");
}

/// Read messages until an updateQueue snapshot equal to `expected` arrives.
///
/// Skips roster updates and intermediate snapshots; panics on timeout.
async fn wait_for_snapshot(ws: &mut WsClient, expected: &[&str]) {
    let expected: Vec<String> = expected.iter().map(|s| s.to_string()).collect();
    let deadline = Duration::from_secs(10);

    let result = tokio::time::timeout(deadline, async {
        while let Some(message) = ws.next().await {
            let message = message.expect("WebSocket read error");
            if let Message::Text(text) = message
                && let Ok(QueueMessage::UpdateQueue { queue }) =
                    serde_json::from_str::<QueueMessage>(&text)
                && queue == expected
            {
                return;
            }
        }
        panic!("Connection closed before expected snapshot arrived");
    })
    .await;

    result.unwrap_or_else(|_| panic!("Timed out waiting for snapshot {:?}", expected));
}

/// Read messages until an actionRejected notice arrives
async fn wait_for_rejection(ws: &mut WsClient) -> String {
    let deadline = Duration::from_secs(10);

    tokio::time::timeout(deadline, async {
        while let Some(message) = ws.next().await {
            let message = message.expect("WebSocket read error");
            if let Message::Text(text) = message
                && let Ok(QueueMessage::ActionRejected { reason }) =
                    serde_json::from_str::<QueueMessage>(&text)
            {
                return reason;
            }
        }
        panic!("Connection closed before rejection notice arrived");
    })
    .await
    .expect("Timed out waiting for rejection notice")
}

/// Fetch the authoritative queue from the inspection endpoint
async fn fetch_queue(server: &TestServer) -> serde_json::Value {
    reqwest::get(server.queue_url())
        .await
        .expect("Failed to query /api/queue")
        .json()
        .await
        .expect("Failed to parse /api/queue response")
}

#[tokio::test]
async fn test_health_endpoint() {
    // テスト項目: サーバーが起動し、ヘルスチェックに応答する
    // given (前提条件):
    let server = TestServer::start(18090).await;

    // when (操作):
    let response: serde_json::Value = reqwest::get(format!(
        "http://127.0.0.1:{}/api/health",
        server.port
    ))
    .await
    .expect("Failed to query health endpoint")
    .json()
    .await
    .expect("Failed to parse health response");

    // then (期待する結果):
    assert_eq!(response["status"], "ok");
}

#[tokio::test]
async fn test_join_broadcasts_snapshot_to_all_clients() {
    // テスト項目: 参加アクションの結果が送信者を含む全クライアントに配信される
    // given (前提条件):
    let server = TestServer::start(18091).await;
    let mut alice = connect_client(&server, "alice", "player").await;
    let mut bob = connect_client(&server, "bob", "player").await;

    // when (操作):
    send_action(
        &mut alice,
        &QueueMessage::AddPlayer {
            user_id: "alice".to_string(),
        },
    )
    .await;

    // then (期待する結果): 送信者自身にもスナップショットが届く
    wait_for_snapshot(&mut alice, &["alice"]).await;
    wait_for_snapshot(&mut bob, &["alice"]).await;
}

#[tokio::test]
async fn test_duplicate_client_id_is_rejected() {
    // テスト項目: 重複する client_id での接続が拒否される
    // given (前提条件):
    let server = TestServer::start(18092).await;
    let _alice = connect_client(&server, "alice", "player").await;

    // when (操作):
    let url = format!("{}?client_id=alice&role=player", server.ws_url());
    let result = connect_async(&url).await;

    // then (期待する結果): 409 で接続が確立されない
    assert!(result.is_err());
}

#[tokio::test]
async fn test_late_joiner_receives_current_snapshot() {
    // テスト項目: 後から接続したクライアントが接続直後に現在のキューを受信する
    // given (前提条件):
    let server = TestServer::start(18093).await;
    let mut alice = connect_client(&server, "alice", "player").await;
    send_action(
        &mut alice,
        &QueueMessage::AddPlayer {
            user_id: "alice".to_string(),
        },
    )
    .await;
    wait_for_snapshot(&mut alice, &["alice"]).await;

    // when (操作):
    let mut bob = connect_client(&server, "bob", "player").await;

    // then (期待する結果): 次のアクションを待たずにキューが見える
    wait_for_snapshot(&mut bob, &["alice"]).await;
}

#[tokio::test]
async fn test_unprivileged_clear_is_rejected() {
    // テスト項目: 非特権クライアントの clearQueue はサーバー側で拒否される
    // given (前提条件):
    let server = TestServer::start(18094).await;
    let mut alice = connect_client(&server, "alice", "player").await;
    send_action(
        &mut alice,
        &QueueMessage::AddPlayer {
            user_id: "alice".to_string(),
        },
    )
    .await;
    wait_for_snapshot(&mut alice, &["alice"]).await;

    // when (操作):
    send_action(&mut alice, &QueueMessage::ClearQueue).await;
    let reason = wait_for_rejection(&mut alice).await;

    // then (期待する結果): 拒否され、権威レプリカのキューは変化しない
    assert!(reason.contains("GM"));
    let state = fetch_queue(&server).await;
    assert_eq!(state["queue"], serde_json::json!(["alice"]));
}

#[tokio::test]
async fn test_unrecognized_action_is_ignored() {
    // テスト項目: 未知の action は無視され、サーバーは処理を継続する
    // given (前提条件):
    let server = TestServer::start(18095).await;
    let mut alice = connect_client(&server, "alice", "player").await;

    // when (操作): 未知のアクションに続けて正常なアクションを送る
    alice
        .send(Message::Text(
            r#"{"action":"reorderQueue","order":[1,0]}"#.to_string().into(),
        ))
        .await
        .expect("Failed to send unknown action");
    send_action(
        &mut alice,
        &QueueMessage::AddPlayer {
            user_id: "alice".to_string(),
        },
    )
    .await;

    // then (期待する結果): 後続のアクションは正常に適用される
    wait_for_snapshot(&mut alice, &["alice"]).await;
}

#[tokio::test]
async fn test_end_to_end_queue_lifecycle() {
    // テスト項目: 参加・重複参加・現スピーカー除去の一連の流れが全クライアントで収束する
    // given (前提条件):
    let server = TestServer::start(18096).await;
    let mut alice = connect_client(&server, "alice", "player").await;
    let mut bob = connect_client(&server, "bob", "player").await;
    let mut gm = connect_client(&server, "gm", "gm").await;

    // when (操作): alice が参加、bob が参加、GM が alice を重複参加させる
    send_action(
        &mut alice,
        &QueueMessage::AddPlayer {
            user_id: "alice".to_string(),
        },
    )
    .await;
    wait_for_snapshot(&mut alice, &["alice"]).await;

    send_action(
        &mut bob,
        &QueueMessage::AddPlayer {
            user_id: "bob".to_string(),
        },
    )
    .await;
    wait_for_snapshot(&mut bob, &["alice", "bob"]).await;

    send_action(
        &mut gm,
        &QueueMessage::AddPlayer {
            user_id: "alice".to_string(),
        },
    )
    .await;

    // then (期待する結果): 重複参加は no-op だがスナップショットは再配信される
    wait_for_snapshot(&mut gm, &["alice", "bob"]).await;

    // when (操作): GM が現スピーカーを除去する
    send_action(&mut gm, &QueueMessage::RemoveCurrent).await;

    // then (期待する結果): 全クライアントが [bob] に収束し、bob が現スピーカーになる
    wait_for_snapshot(&mut alice, &["bob"]).await;
    wait_for_snapshot(&mut bob, &["bob"]).await;
    wait_for_snapshot(&mut gm, &["bob"]).await;

    let state = fetch_queue(&server).await;
    assert_eq!(state["queue"], serde_json::json!(["bob"]));
    assert_eq!(state["current_speaker"], "bob");
    assert_eq!(state["connected_clients"], 3);
}

#[tokio::test]
async fn test_gm_clear_empties_queue_everywhere() {
    // テスト項目: GM の clearQueue で全クライアントのキューが空になる
    // given (前提条件):
    let server = TestServer::start(18097).await;
    let mut alice = connect_client(&server, "alice", "player").await;
    let mut gm = connect_client(&server, "gm", "gm").await;

    send_action(
        &mut alice,
        &QueueMessage::AddPlayer {
            user_id: "alice".to_string(),
        },
    )
    .await;
    wait_for_snapshot(&mut alice, &["alice"]).await;

    // when (操作):
    send_action(&mut gm, &QueueMessage::ClearQueue).await;

    // then (期待する結果):
    wait_for_snapshot(&mut alice, &[]).await;
    wait_for_snapshot(&mut gm, &[]).await;

    let state = fetch_queue(&server).await;
    assert_eq!(state["queue"], serde_json::json!([]));
    assert_eq!(state["current_speaker"], serde_json::Value::Null);
}
