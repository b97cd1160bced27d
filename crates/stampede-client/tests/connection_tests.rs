//! Connection lifecycle tests (stampede-client)
//!
//! Timing scenarios run on a paused Tokio clock, so a 10 second timeout costs
//! nothing and attempt spacing can be checked exactly.

use stampede_client::{ClientIdentity, Connection, ConnectionState, RetryPolicy};
use stampede_core::{tag, Dispatch, Login, MoveApproved, MoveRequest, Vector3f};
use stampede_test_utils::{Attempt, ScriptedTransport};
use stampede_transport::TransportEvent;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use url::Url;

use ConnectionState::*;

fn server_url() -> Url {
    Url::parse("ws://127.0.0.1:9160/ws").unwrap()
}

fn connection(transport: &Arc<ScriptedTransport>) -> Connection<ScriptedTransport, u32> {
    Connection::new(
        ClientIdentity::new(0, "client_0"),
        RetryPolicy::default(),
        transport.clone(),
    )
}

fn assert_about(actual: Duration, expected: Duration) {
    let diff = if actual > expected {
        actual - expected
    } else {
        expected - actual
    };
    assert!(
        diff <= Duration::from_millis(2),
        "expected ~{:?}, got {:?}",
        expected,
        actual
    );
}

// ============================================================================
// Handshake
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_opens_on_first_attempt() {
    let transport = Arc::new(ScriptedTransport::always(Attempt::Open));
    let mut conn = connection(&transport);

    assert_eq!(conn.establish(&server_url()).await, Connected);
    assert_eq!(conn.attempts_made(), 0);
    assert_eq!(conn.transitions(), &[Idle, Connecting, Connected]);
    assert_eq!(transport.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_login_sent_on_open() {
    let transport = Arc::new(ScriptedTransport::always(Attempt::Open));
    let mut conn = Connection::<_, ()>::new(
        ClientIdentity::new(42, "client_42"),
        RetryPolicy::default(),
        transport.clone(),
    );
    conn.establish(&server_url()).await;

    let sent = transport.peer(0).unwrap().sent_envelopes();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].tag, tag::LOGIN);
    let login: Login = sent[0].decode().unwrap();
    assert_eq!(login.client_id, 42);
    assert_eq!(login.username, "client_42");
}

#[tokio::test(start_paused = true)]
async fn test_never_opens_fails_after_budget() {
    let transport = Arc::new(ScriptedTransport::always(Attempt::Hang));
    let mut conn = connection(&transport);
    let start = Instant::now();

    assert_eq!(conn.establish(&server_url()).await, Failed);

    assert_eq!(conn.attempts_made(), 3);
    assert_eq!(
        conn.transitions(),
        &[Idle, Connecting, Retrying, Connecting, Retrying, Connecting, Failed]
    );

    // Three 10s timeouts separated by the 1s delay
    let times = transport.attempt_times();
    assert_eq!(times.len(), 3);
    assert_about(times[0] - start, Duration::ZERO);
    assert_about(times[1] - times[0], Duration::from_secs(11));
    assert_about(times[2] - times[1], Duration::from_secs(11));
    assert_about(start.elapsed(), Duration::from_secs(32));

    // Sends after failure are silent no-ops
    assert!(!conn.send(&MoveRequest {
        target: Vector3f::new(1.0, 0.0, 0.0)
    }));
    assert!(transport.peers().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_connect_error_waits_for_timeout() {
    let transport = Arc::new(ScriptedTransport::scripted(
        vec![Attempt::Refuse("connection refused".to_string())],
        Attempt::Open,
    ));
    let mut conn = connection(&transport);
    let start = Instant::now();

    assert_eq!(conn.establish(&server_url()).await, Connected);

    assert_eq!(conn.attempts_made(), 1);
    assert_eq!(
        conn.transitions(),
        &[Idle, Connecting, Retrying, Connecting, Connected]
    );
    assert_about(start.elapsed(), Duration::from_secs(11));
}

#[tokio::test(start_paused = true)]
async fn test_late_open_is_cancelled() {
    // First attempt would open after its timeout has already fired
    let transport = Arc::new(ScriptedTransport::scripted(
        vec![Attempt::OpenAfter(Duration::from_secs(12))],
        Attempt::Open,
    ));
    let mut conn = connection(&transport);

    assert_eq!(conn.establish(&server_url()).await, Connected);
    assert_eq!(conn.attempts_made(), 1);

    // Let the cancelled attempt's deadline pass
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(transport.peers().len(), 1);
    assert_eq!(conn.state(), Connected);
}

#[tokio::test(start_paused = true)]
async fn test_single_attempt_budget() {
    let transport = Arc::new(ScriptedTransport::always(Attempt::Hang));
    let mut conn = Connection::<_, ()>::new(
        ClientIdentity::new(1, "client_1"),
        RetryPolicy {
            max_attempts: 1,
            per_attempt_timeout: Duration::from_secs(2),
            inter_attempt_delay: Duration::from_secs(1),
        },
        transport.clone(),
    );

    assert_eq!(conn.establish(&server_url()).await, Failed);
    assert_eq!(conn.transitions(), &[Idle, Connecting, Failed]);
    assert_eq!(transport.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_establish_twice_is_noop() {
    let transport = Arc::new(ScriptedTransport::always(Attempt::Hang));
    let mut conn = connection(&transport);

    conn.establish(&server_url()).await;
    assert_eq!(conn.establish(&server_url()).await, Failed);
    assert_eq!(transport.attempts(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_token_in_connect_url() {
    let transport = Arc::new(ScriptedTransport::always(Attempt::Open));
    let mut conn = Connection::<_, ()>::new(
        ClientIdentity::new(0, "client_0").with_token("tok123"),
        RetryPolicy::default(),
        transport.clone(),
    );
    conn.establish(&server_url()).await;

    assert_eq!(transport.urls(), vec!["ws://127.0.0.1:9160/ws?token=tok123"]);
    assert_eq!(
        transport.peer(0).unwrap().url(),
        "ws://127.0.0.1:9160/ws?token=tok123"
    );
}

#[tokio::test(start_paused = true)]
async fn test_status_published() {
    let transport = Arc::new(ScriptedTransport::always(Attempt::Hang));
    let mut conn = connection(&transport);
    let status = conn.subscribe();

    conn.establish(&server_url()).await;

    let latest = *status.borrow();
    assert_eq!(latest.state, Failed);
    assert_eq!(latest.attempts_made, 3);
}

// ============================================================================
// Established connection
// ============================================================================

async fn connected() -> (Arc<ScriptedTransport>, Connection<ScriptedTransport, u32>) {
    let transport = Arc::new(ScriptedTransport::always(Attempt::Open));
    let mut conn = connection(&transport);
    conn.on::<MoveApproved, _>(|count, _| *count += 1);
    assert_eq!(conn.establish(&server_url()).await, Connected);
    (transport, conn)
}

#[tokio::test(start_paused = true)]
async fn test_registered_handler_runs() {
    let (transport, mut conn) = connected().await;
    let peer = transport.peer(0).unwrap();
    let mut handled = 0u32;

    peer.deliver(&MoveApproved {
        target: Vector3f::new(5.0, 0.0, 0.0),
        speed: 2.0,
    });
    let event = conn.next_event().await;

    assert_eq!(conn.handle_event(event, &mut handled), Some(Dispatch::Handled));
    assert_eq!(handled, 1);
}

#[tokio::test(start_paused = true)]
async fn test_unknown_tag_is_silent() {
    let (transport, mut conn) = connected().await;
    let peer = transport.peer(0).unwrap();
    let mut handled = 0u32;

    peer.deliver_raw(r#"{"type":"playerJoined","data":"e30="}"#);
    let event = conn.next_event().await;

    assert_eq!(conn.handle_event(event, &mut handled), Some(Dispatch::Unhandled));
    assert_eq!(handled, 0);
    assert_eq!(conn.state(), Connected);
}

#[tokio::test(start_paused = true)]
async fn test_malformed_frame_is_discarded() {
    let (transport, mut conn) = connected().await;
    let peer = transport.peer(0).unwrap();
    let mut handled = 0u32;

    peer.deliver_raw("not json at all");
    let event = conn.next_event().await;

    assert_eq!(conn.handle_event(event, &mut handled), None);
    assert_eq!(conn.state(), Connected);
}

#[tokio::test(start_paused = true)]
async fn test_transport_error_does_not_transition() {
    let (_transport, mut conn) = connected().await;
    let mut handled = 0u32;

    conn.handle_event(TransportEvent::Error("broken pipe".to_string()), &mut handled);

    assert_eq!(conn.state(), Connected);
    assert_eq!(conn.transitions(), &[Idle, Connecting, Connected]);
}

#[tokio::test(start_paused = true)]
async fn test_server_close_is_terminal() {
    let (transport, mut conn) = connected().await;
    let peer = transport.peer(0).unwrap();
    let mut handled = 0u32;

    peer.disconnect("server shutting down");
    let event = conn.next_event().await;
    conn.handle_event(event, &mut handled);

    assert_eq!(conn.state(), Closed);
    assert_eq!(conn.transitions(), &[Idle, Connecting, Connected, Closed]);

    // No reconnection, no sends
    assert_eq!(conn.establish(&server_url()).await, Closed);
    assert_eq!(transport.attempts(), 1);
    assert!(!conn.send(&MoveRequest {
        target: Vector3f::ZERO
    }));
}

#[tokio::test(start_paused = true)]
async fn test_close_is_idempotent() {
    let (transport, mut conn) = connected().await;

    conn.close().await;
    conn.close().await;

    assert!(transport.peer(0).unwrap().was_closed());
    assert_eq!(conn.transitions(), &[Idle, Connecting, Connected, Closed]);
}

#[tokio::test(start_paused = true)]
async fn test_send_while_connected() {
    let (transport, conn) = connected().await;

    assert!(conn.send(&MoveRequest {
        target: Vector3f::new(1.0, 2.0, 3.0)
    }));

    let sent = transport.peer(0).unwrap().sent_envelopes();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[1].tag, tag::MOVE_REQUEST);
    let request: MoveRequest = sent[1].decode().unwrap();
    assert_eq!(request.target, Vector3f::new(1.0, 2.0, 3.0));
}
