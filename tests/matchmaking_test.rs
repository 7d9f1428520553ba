//! End-to-end tests over a real socket.
//!
//! Each test starts its own server on an ephemeral port.

mod common;

use std::time::Duration;

use common::{matching, mv, recv_json, send_json, send_text, try_recv_json, TestServer};
use game_server::Config;
use serde_json::Value;

const QUIET: Duration = Duration::from_millis(300);

fn session_id(matched: &Value) -> String {
    matched["sessionId"]
        .as_str()
        .expect("matched reply has no sessionId")
        .to_string()
}

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_two_players_share_a_session() {
    let server = TestServer::with_defaults().await;
    let (_a, matched_a, _b, matched_b) = server.pair("A", "B").await;

    assert_eq!(matched_a["type"], "matched");
    assert_eq!(matched_b["type"], "matched");
    assert_eq!(session_id(&matched_a), session_id(&matched_b));
    assert_eq!(matched_a["side"], "white");
    assert_eq!(matched_b["side"], "black");
    assert_eq!(matched_a["opponentId"], "B");
    assert_eq!(matched_b["opponentId"], "A");
    assert_eq!(matched_a["turn"], "white");
    assert_eq!(matched_a["board"][4][1], "wP");
}

#[tokio::test]
async fn test_queued_player_cannot_queue_again() {
    let server = TestServer::with_defaults().await;
    let mut a = server.connect().await;
    send_json(&mut a, matching("A")).await;
    server.wait_for_queue(1).await;
    // A queued player is always reachable.
    assert_eq!(server.services.registry.len().await, 1);

    send_json(&mut a, matching("A")).await;
    let reply = recv_json(&mut a).await;
    assert_eq!(reply["type"], "error");
    assert_eq!(reply["code"], "ALREADY_QUEUED");

    let mut other = server.connect().await;
    send_json(&mut other, matching("A")).await;
    let reply = recv_json(&mut other).await;
    assert_eq!(reply["code"], "ALREADY_QUEUED");
    assert_eq!(server.services.queue.len().await, 1);

    // The rejected connection did not take over A's binding.
    let mut b = server.connect().await;
    send_json(&mut b, matching("B")).await;
    assert_eq!(recv_json(&mut a).await["type"], "matched");
    assert_eq!(recv_json(&mut b).await["type"], "matched");
    assert!(try_recv_json(&mut other, QUIET).await.is_none());
}

#[tokio::test]
async fn test_matching_times_out() {
    let server = TestServer::start(Config {
        matching_timeout: Some(Duration::from_millis(200)),
        ..Config::default()
    })
    .await;
    let mut a = server.connect().await;
    send_json(&mut a, matching("A")).await;

    let reply = recv_json(&mut a).await;
    assert_eq!(reply["type"], "timeout");
    assert_eq!(server.services.queue.len().await, 0);
}

#[tokio::test]
async fn test_queued_player_leaving_is_never_paired() {
    let server = TestServer::with_defaults().await;
    let mut a = server.connect().await;
    send_json(&mut a, matching("A")).await;
    server.wait_for_queue(1).await;
    a.close(None).await.expect("Failed to close");
    server.wait_for_queue(0).await;

    let mut b = server.connect().await;
    send_json(&mut b, matching("B")).await;
    server.wait_for_queue(1).await;
    assert!(try_recv_json(&mut b, QUIET).await.is_none());
    assert!(server.services.sessions.is_empty().await);
}

// ---------------------------------------------------------------------------
// Moves
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_move_is_pushed_to_both_players() {
    let server = TestServer::with_defaults().await;
    let (mut a, matched, mut b, _) = server.pair("A", "B").await;
    let sid = session_id(&matched);

    send_json(&mut a, mv("A", &sid, "e2-e4")).await;

    for ws in [&mut a, &mut b] {
        let board = recv_json(ws).await;
        assert!(board.is_array(), "expected a bare board, got {board}");
        assert_eq!(board[4][1], "");
        assert_eq!(board[4][3], "wP");
        assert_eq!(board[4][6], "bP");
    }

    // Same move again: not white's turn any more, and only A hears about it.
    send_json(&mut a, mv("A", &sid, "e2-e4")).await;
    let reply = recv_json(&mut a).await;
    assert_eq!(reply["type"], "error");
    assert_eq!(reply["code"], "NOT_YOUR_TURN");
    assert!(try_recv_json(&mut b, QUIET).await.is_none());

    send_json(&mut b, mv("B", &sid, "e7-e5")).await;
    for ws in [&mut a, &mut b] {
        let board = recv_json(ws).await;
        assert_eq!(board[4][6], "");
        assert_eq!(board[4][4], "bP");
    }
}

#[tokio::test]
async fn test_illegal_move_keeps_the_turn() {
    let server = TestServer::with_defaults().await;
    let (mut a, matched, mut b, _) = server.pair("A", "B").await;
    let sid = session_id(&matched);

    send_json(&mut a, mv("A", &sid, "e2-e5")).await;
    let reply = recv_json(&mut a).await;
    assert_eq!(reply["code"], "ILLEGAL_MOVE");

    send_json(&mut a, mv("A", &sid, "e2e4")).await;
    let reply = recv_json(&mut a).await;
    assert_eq!(reply["code"], "ILLEGAL_MOVE");
    assert!(try_recv_json(&mut b, QUIET).await.is_none());

    send_json(&mut a, mv("A", &sid, "g1-f3")).await;
    let board = recv_json(&mut a).await;
    assert_eq!(board[5][2], "wN");
}

#[tokio::test]
async fn test_unknown_session_and_player() {
    let server = TestServer::with_defaults().await;
    let (mut a, matched, _b, _) = server.pair("A", "B").await;
    let sid = session_id(&matched);

    send_json(&mut a, mv("A", "no-such-session", "e2-e4")).await;
    assert_eq!(recv_json(&mut a).await["code"], "UNKNOWN_SESSION");

    send_json(&mut a, mv("C", &sid, "e2-e4")).await;
    assert_eq!(recv_json(&mut a).await["code"], "UNKNOWN_PLAYER");
}

#[tokio::test]
async fn test_connection_cannot_move_for_its_opponent() {
    let server = TestServer::with_defaults().await;
    let (mut a, matched, mut b, _) = server.pair("A", "B").await;
    let sid = session_id(&matched);

    send_json(&mut a, mv("A", &sid, "e2-e4")).await;
    for ws in [&mut a, &mut b] {
        assert!(recv_json(ws).await.is_array());
    }

    // Black to move, but this socket is bound to A.
    send_json(&mut a, mv("B", &sid, "e7-e5")).await;
    assert_eq!(recv_json(&mut a).await["code"], "UNKNOWN_PLAYER");
    assert!(try_recv_json(&mut b, QUIET).await.is_none());

    send_json(&mut b, mv("B", &sid, "e7-e5")).await;
    assert_eq!(recv_json(&mut b).await[4][4], "bP");
}

#[tokio::test]
async fn test_fools_mate_ends_the_game() {
    let server = TestServer::with_defaults().await;
    let (mut a, matched, mut b, _) = server.pair("A", "B").await;
    let sid = session_id(&matched);

    let script = [("A", "f2-f3"), ("B", "e7-e5"), ("A", "g2-g4"), ("B", "d8-h4")];
    for (player, m) in script {
        let ws = if player == "A" { &mut a } else { &mut b };
        send_json(ws, mv(player, &sid, m)).await;
        recv_json(&mut a).await;
        recv_json(&mut b).await;
    }

    for ws in [&mut a, &mut b] {
        let over = recv_json(ws).await;
        assert_eq!(over["type"], "game_over");
        assert_eq!(over["outcome"], "checkmate");
        assert_eq!(over["winner"], "black");
    }
    assert!(server.services.sessions.is_empty().await);

    send_json(&mut a, mv("A", &sid, "e2-e4")).await;
    assert_eq!(recv_json(&mut a).await["code"], "UNKNOWN_SESSION");
}

// ---------------------------------------------------------------------------
// Protocol errors
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_bad_frames_get_error_replies() {
    let server = TestServer::with_defaults().await;
    let mut ws = server.connect().await;

    send_text(&mut ws, r#"{"action":"resign","data":{}}"#).await;
    let reply = recv_json(&mut ws).await;
    assert_eq!(reply["type"], "error");
    assert_eq!(reply["code"], "UNKNOWN_ACTION");

    send_text(&mut ws, "{not json").await;
    assert_eq!(recv_json(&mut ws).await["code"], "MALFORMED_MESSAGE");

    send_text(&mut ws, r#"{"action":"move","data":{"playerId":"A"}}"#).await;
    assert_eq!(recv_json(&mut ws).await["code"], "MALFORMED_MESSAGE");

    // The connection survives all of the above.
    send_json(&mut ws, matching("A")).await;
    server.wait_for_queue(1).await;
}

// ---------------------------------------------------------------------------
// Disconnects
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_player_can_rejoin_after_disconnect() {
    let server = TestServer::with_defaults().await;
    let (mut a, matched, mut b, _) = server.pair("A", "B").await;
    let sid = session_id(&matched);

    send_json(&mut a, mv("A", &sid, "e2-e4")).await;
    recv_json(&mut a).await;
    recv_json(&mut b).await;

    a.close(None).await.expect("Failed to close");
    let left = recv_json(&mut b).await;
    assert_eq!(left["type"], "opponent_left");
    assert_eq!(left["opponentId"], "A");

    let mut a = server.connect().await;
    send_json(&mut a, matching("A")).await;
    let view = recv_json(&mut a).await;
    assert_eq!(view["type"], "matched");
    assert_eq!(view["rejoined"], true);
    assert_eq!(session_id(&view), sid);
    assert_eq!(view["turn"], "black");
    assert_eq!(view["board"][4][3], "wP");
    assert_eq!(view["moves"][0], "e2-e4");

    let back = recv_json(&mut b).await;
    assert_eq!(back["type"], "opponent_rejoined");

    send_json(&mut b, mv("B", &sid, "e7-e5")).await;
    assert_eq!(recv_json(&mut a).await[4][4], "bP");
}

#[tokio::test]
async fn test_repeat_matching_while_connected_is_silent_to_opponent() {
    let server = TestServer::with_defaults().await;
    let (mut a, matched, mut b, _) = server.pair("A", "B").await;

    send_json(&mut a, matching("A")).await;
    let resumed = recv_json(&mut a).await;
    assert_eq!(resumed["type"], "matched");
    assert_eq!(session_id(&resumed), session_id(&matched));
    assert!(try_recv_json(&mut b, QUIET).await.is_none());
}

#[tokio::test]
async fn test_abandoned_session_is_awarded_to_opponent() {
    let server = TestServer::start(Config {
        reconnect_grace: Duration::from_millis(200),
        ..Config::default()
    })
    .await;
    let (a, _, mut b, _) = server.pair("A", "B").await;

    drop(a);
    assert_eq!(recv_json(&mut b).await["type"], "opponent_left");

    let over = recv_json(&mut b).await;
    assert_eq!(over["type"], "game_over");
    assert_eq!(over["outcome"], "abandoned");
    assert_eq!(over["winner"], "black");
    assert!(server.services.sessions.is_empty().await);
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_health_reports_counts() {
    let server = TestServer::with_defaults().await;
    let client = common::client();

    let body: Value = client
        .get(server.url("/health"))
        .send()
        .await
        .expect("Failed to send health request")
        .json()
        .await
        .expect("Health is not JSON");
    assert_eq!(body["status"], "ok");
    assert_eq!(body["sessions"], 0);
    assert_eq!(body["waiting"], 0);

    let (_a, _, _b, _) = server.pair("A", "B").await;
    let mut c = server.connect().await;
    send_json(&mut c, matching("C")).await;
    server.wait_for_queue(1).await;

    let body: Value = client
        .get(server.url("/health"))
        .send()
        .await
        .expect("Failed to send health request")
        .json()
        .await
        .expect("Health is not JSON");
    assert_eq!(body["sessions"], 1);
    assert_eq!(body["waiting"], 1);
}

#[tokio::test]
async fn test_shutdown_closes_connections() {
    let server = TestServer::with_defaults().await;
    let (mut a, _, _b, _) = server.pair("A", "B").await;

    server.services.shutdown().await;
    assert!(try_recv_json(&mut a, Duration::from_secs(2)).await.is_none());
    assert!(server.services.sessions.is_empty().await);
}
