//! Unit tests for client behaviours not covered by the scenarios.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use mockall::mock;
use rstest::rstest;
use serde_json::json;

use crate::connection::{Connection, ConnectionState};
use crate::error::ConnectionError;
use crate::kind::{EntityKind, MessageKind, OperationKind};
use crate::tests::support::{
    APPLICATION_ID, ConnectionHandle, acknowledgement, client_in_state, config, entity_message,
    open_client, routed, transport_update,
};
use crate::{
    CallKey, Client, ClientError, CommodityUpdate, Config, Coordinate, DispatchError, EntityId,
    NewCluster, NewTransport, Route, Transport, TransportUpdate,
};

mock! {
    Link {}
    impl Connection for Link {
        fn state(&self) -> ConnectionState;
        fn send(&mut self, text: &str) -> Result<(), ConnectionError>;
        fn close(&mut self);
    }
}

fn open_link() -> MockLink {
    let mut link = MockLink::new();
    link.expect_state().return_const(ConnectionState::Open);
    link
}

#[rstest]
fn writes_one_envelope_per_read() {
    let mut link = open_link();
    link.expect_send()
        .withf(|text| text == r#"{"operation":"Read","entityKind":"Transport","id":3}"#)
        .times(1)
        .returning(|_| Ok(()));
    let client = Client::new(link, &Config::default());

    let _reply = client
        .get_transport(EntityId::new(3))
        .expect("read should be accepted");
    assert_eq!(client.pending_calls(), 1);
}

#[rstest]
fn refused_send_leaves_nothing_pending() {
    let mut link = open_link();
    link.expect_send()
        .times(2)
        .returning(|_| Err(ConnectionError::send("socket buffer full")));
    let client = Client::new(link, &Config::default());

    for _ in 0..2 {
        match client.get_cluster(EntityId::new(7)) {
            Err(ClientError::Connection(_)) => {}
            other => panic!("expected a connection error, got {other:?}"),
        }
        assert_eq!(client.pending_calls(), 0);
    }
}

#[rstest]
fn refused_subscribe_leaves_no_subscription(open_client: (Client, ConnectionHandle)) {
    let (client, connection) = open_client;
    let mut read = client
        .get_cluster(EntityId::new(4))
        .expect("read should be accepted");
    client
        .handle_message(&entity_message(MessageKind::Read, EntityKind::Cluster, 4))
        .expect("read reply should match");
    let cluster = read
        .try_take()
        .expect("reply should have arrived")
        .expect("read should succeed");

    connection.refuse_sends("gone away");
    assert!(matches!(
        cluster.subscribe(|_, _| {}),
        Err(ClientError::Connection(_))
    ));
    assert_eq!(client.subscriptions(), 0);
    assert_eq!(client.pending_calls(), 0);
}

fn fetched_transport(client: &Client, id: i64) -> Transport {
    let mut read = client
        .get_transport(EntityId::new(id))
        .expect("read should be accepted");
    client
        .handle_message(&entity_message(MessageKind::Read, EntityKind::Transport, id))
        .expect("read reply should match");
    read.try_take()
        .expect("reply should have arrived")
        .expect("read should succeed")
}

#[rstest]
fn refused_subscription_can_be_requested_again(open_client: (Client, ConnectionHandle)) {
    let (client, connection) = open_client;
    let transport = fetched_transport(&client, 5);
    let mut ack = transport
        .subscribe(|_, _| {})
        .expect("subscribe should be accepted")
        .into_reply()
        .expect("a fresh subscription sends a request");

    let refusal = json!({
        "kind": "Error",
        "message": "subscriptions disabled",
        "operation": "Subscribe",
        "entityKind": "Transport",
        "id": 5,
    });
    let dispatched = client.handle_message(&refusal.to_string());
    assert!(matches!(
        dispatched,
        Err(DispatchError::Server { correlated: true, .. })
    ));
    assert!(matches!(
        ack.try_take(),
        Some(Err(ClientError::Protocol { message })) if message == "subscriptions disabled"
    ));
    assert_eq!(client.subscriptions(), 0);

    let retry = transport
        .subscribe(|_, _| {})
        .expect("retry should be accepted");
    assert!(!retry.is_reused());
    assert_eq!(connection.sent_operations("Subscribe"), 2);
}

#[rstest]
fn timed_out_route_subscription_can_be_requested_again() {
    let config = Config {
        request_timeout_ms: Some(50),
        ..config()
    };
    let (client, connection) = client_in_state(ConnectionState::Open, &config);
    let mut read = client
        .get_commodity(EntityId::new(8))
        .expect("read should be accepted");
    client
        .handle_message(&entity_message(MessageKind::Read, EntityKind::Commodity, 8))
        .expect("read reply should match");
    let commodity = read
        .try_take()
        .expect("reply should have arrived")
        .expect("read should succeed");
    let mut ack = commodity
        .route_subscribe(|_, _| {})
        .expect("route subscribe should be accepted")
        .into_reply()
        .expect("a fresh subscription sends a request");
    assert_eq!(client.subscriptions(), 1);

    assert_eq!(client.expire_overdue_at(Instant::now() + Duration::from_secs(1)), 1);
    assert!(matches!(ack.try_take(), Some(Err(ClientError::Timeout { .. }))));
    assert_eq!(client.subscriptions(), 0);

    let retry = commodity
        .route_subscribe(|_, _| {})
        .expect("retry should be accepted");
    assert!(!retry.is_reused());
    assert_eq!(connection.sent_operations("RouteSubscribe"), 2);
}

#[rstest]
fn failed_flush_fails_the_queued_subscribe() {
    let (client, connection) = client_in_state(ConnectionState::Connecting, &config());
    let transport = fetched_transport(&client, 5);
    let mut ack = transport
        .subscribe(|_, _| {})
        .expect("subscribe should be queued")
        .into_reply()
        .expect("a fresh subscription sends a request");
    assert_eq!(client.backlog_len(), 2);
    assert_eq!(client.subscriptions(), 1);

    connection.refuse_sends("socket reset");
    client.handle_open();
    assert!(matches!(ack.try_take(), Some(Err(ClientError::Connection(_)))));
    assert_eq!(client.pending_calls(), 0);
    assert_eq!(client.subscriptions(), 0);
    assert_eq!(client.backlog_len(), 0);

    connection.accept_sends();
    let retry = transport
        .subscribe(|_, _| {})
        .expect("retry should be accepted");
    assert!(!retry.is_reused());
    assert_eq!(connection.sent_operations("Subscribe"), 1);
}

#[rstest]
fn rejects_duplicate_keyed_calls(open_client: (Client, ConnectionHandle)) {
    let (client, connection) = open_client;
    let _first = client
        .get_cluster(EntityId::new(7))
        .expect("first read should be accepted");
    match client.get_cluster(EntityId::new(7)) {
        Err(ClientError::AlreadyPending { key }) => assert_eq!(
            key,
            CallKey::Entity {
                operation: OperationKind::Read,
                kind: EntityKind::Cluster,
                id: EntityId::new(7),
            }
        ),
        other => panic!("expected already pending, got {other:?}"),
    }
    let _other_id = client
        .get_cluster(EntityId::new(8))
        .expect("a different id is independent");
    assert_eq!(connection.sent().len(), 2);
}

#[rstest]
fn overdue_reads_time_out_and_free_their_key() {
    let config = Config {
        request_timeout_ms: Some(50),
        ..config()
    };
    let (client, _connection) = client_in_state(ConnectionState::Open, &config);
    let mut first = client
        .get_commodity(EntityId::new(9))
        .expect("read should be accepted");

    assert_eq!(client.expire_overdue_at(Instant::now() + Duration::from_secs(1)), 1);
    assert!(matches!(
        first.try_take(),
        Some(Err(ClientError::Timeout { after })) if after == Duration::from_millis(50)
    ));

    let late =
        client.handle_message(&entity_message(MessageKind::Read, EntityKind::Commodity, 9));
    assert!(matches!(late, Err(DispatchError::UnmatchedResponse { .. })));
    assert!(client.get_commodity(EntityId::new(9)).is_ok());
}

#[rstest]
fn expiry_is_disabled_without_a_timeout(open_client: (Client, ConnectionHandle)) {
    let (client, _connection) = open_client;
    let _reply = client
        .get_cluster(EntityId::new(1))
        .expect("read should be accepted");
    assert_eq!(client.expire_overdue_at(Instant::now() + Duration::from_secs(3600)), 0);
    assert_eq!(client.pending_calls(), 1);
}

#[rstest]
fn service_error_fails_the_oldest_create(open_client: (Client, ConnectionHandle)) {
    let (client, _connection) = open_client;
    let position = Coordinate::new(51.5, -0.12);
    let mut first = client
        .create_transport(&NewTransport::new(position, EntityId::new(1)))
        .expect("create should be accepted");
    let mut second = client
        .create_transport(&NewTransport::new(position, EntityId::new(1)))
        .expect("create should be accepted");

    let error = json!({
        "kind": "Error",
        "message": "cluster is full",
        "operation": "Create",
        "entityKind": "Transport",
    });
    assert!(matches!(
        client.handle_message(&error.to_string()),
        Err(DispatchError::Server { correlated: true, .. })
    ));
    assert!(matches!(
        first.try_take(),
        Some(Err(ClientError::Protocol { message })) if message == "cluster is full"
    ));
    assert!(second.try_take().is_none());
}

#[rstest]
fn uncorrelated_service_errors_leave_calls_pending(open_client: (Client, ConnectionHandle)) {
    let (client, _connection) = open_client;
    let mut reply = client
        .get_cluster(EntityId::new(2))
        .expect("read should be accepted");
    let outcome = client.handle_message(r#"{"kind":"Error","message":"overloaded"}"#);
    assert!(matches!(
        outcome,
        Err(DispatchError::Server { correlated: false, .. })
    ));
    assert!(reply.try_take().is_none());
}

#[rstest]
fn undecodable_reply_fails_the_waiter(open_client: (Client, ConnectionHandle)) {
    let (client, _connection) = open_client;
    let mut reply = client
        .get_transport(EntityId::new(6))
        .expect("read should be accepted");
    let text = json!({
        "kind": "Read",
        "entityKind": "Transport",
        "id": 6,
        "value": {"id": 6, "latitude": "north"},
    });
    let delivery = client
        .handle_message(&text.to_string())
        .expect("a claimed reply is not a dispatch error");
    assert!(delivery.resolved_call());
    assert!(matches!(
        reply.try_take(),
        Some(Err(ClientError::MalformedPayload {
            kind: EntityKind::Transport,
            ..
        }))
    ));
}

#[rstest]
#[case("not json at all")]
#[case(r#"{"kind":"Depot","entityKind":"Cluster"}"#)]
fn bad_inbound_messages_do_not_disturb_pending_calls(
    open_client: (Client, ConnectionHandle),
    #[case] text: &str,
) {
    let (client, _connection) = open_client;
    let mut reply = client
        .get_cluster(EntityId::new(7))
        .expect("read should be accepted");
    assert!(client.handle_message(text).is_err());
    client
        .handle_message(&entity_message(MessageKind::Read, EntityKind::Cluster, 7))
        .expect("read reply should match");
    assert!(matches!(reply.try_take(), Some(Ok(_))));
}

#[rstest]
fn vehicle_and_model_aliases_are_understood(open_client: (Client, ConnectionHandle)) {
    let (client, _connection) = open_client;
    let mut reply = client
        .get_transport(EntityId::new(12))
        .expect("read should be accepted");
    let text = json!({
        "kind": "Model",
        "entityKind": "Vehicle",
        "value": {"id": 12, "latitude": 1.0, "longitude": 2.0, "capacity": {"seats": 4}},
    });
    client
        .handle_message(&text.to_string())
        .expect("aliased reply should match");
    let transport = reply
        .try_take()
        .expect("reply should have arrived")
        .expect("read should succeed");
    assert_eq!(transport.metadata(), &json!({"seats": 4}));
}

#[rstest]
fn entity_updates_send_only_changed_fields(open_client: (Client, ConnectionHandle)) {
    let (client, connection) = open_client;
    let _commodity = client
        .update_commodity(EntityId::new(3), &CommodityUpdate::new().status("PickedUp"))
        .expect("update should be accepted");
    let _transport = client
        .update_transport(
            EntityId::new(4),
            &TransportUpdate::new().position(Coordinate::new(1.5, 2.5)),
        )
        .expect("update should be accepted");

    insta::assert_snapshot!(
        connection.sent().join("\n"),
        @r#"
    {"operation":"Update","entityKind":"Commodity","id":3,"value":{"status":"PickedUp"}}
    {"operation":"Update","entityKind":"Transport","id":4,"value":{"latitude":1.5,"longitude":2.5}}
    "#
    );
}

#[rstest]
fn create_cluster_sends_the_path(open_client: (Client, ConnectionHandle)) {
    let (client, connection) = open_client;
    let mut reply = client
        .create_cluster(&NewCluster::new("/depots/north"))
        .expect("create should be accepted");
    assert_eq!(
        connection.sent_json(),
        vec![json!({
            "operation": "Create",
            "entityKind": "Cluster",
            "value": {"path": "/depots/north"},
        })]
    );
    client
        .handle_message(&entity_message(MessageKind::Created, EntityKind::Cluster, 42))
        .expect("created reply should match");
    let cluster = reply
        .try_take()
        .expect("reply should have arrived")
        .expect("create should succeed");
    assert_eq!(cluster.id(), EntityId::new(42));
}

#[rstest]
fn route_subscriptions_track_the_latest_route(open_client: (Client, ConnectionHandle)) {
    let (client, connection) = open_client;
    let mut read = client
        .get_commodity(EntityId::new(8))
        .expect("read should be accepted");
    client
        .handle_message(&entity_message(MessageKind::Read, EntityKind::Commodity, 8))
        .expect("read reply should match");
    let commodity = read
        .try_take()
        .expect("reply should have arrived")
        .expect("read should succeed");

    let seen: Arc<Mutex<Vec<Route>>> = Arc::default();
    let sink = Arc::clone(&seen);
    let mut ack = commodity
        .route_subscribe(move |subject, route| {
            assert_eq!(subject.id(), EntityId::new(8));
            sink.lock().expect("route sink poisoned").push(route.clone());
        })
        .expect("route subscribe should be accepted")
        .into_reply()
        .expect("a fresh subscription sends a request");
    assert_eq!(connection.sent_operations("RouteSubscribe"), 1);

    client
        .handle_message(&acknowledgement(
            MessageKind::RouteSubscribed,
            EntityKind::Commodity,
            8,
        ))
        .expect("acknowledgement should match");
    assert!(matches!(ack.try_take(), Some(Ok(id)) if id == EntityId::new(8)));

    let path = json!([{"latitude": 51.5, "longitude": -0.12}]);
    let delivery = client
        .handle_message(&routed(EntityKind::Commodity, 8, &path))
        .expect("route update should reach the subscription");
    assert_eq!(delivery.notified(), 1);
    assert!(!delivery.resolved_call());

    let latest = client
        .latest_route(EntityKind::Commodity, EntityId::new(8))
        .expect("latest route should be kept");
    assert_eq!(latest.payload(), &path);
    assert_eq!(seen.lock().expect("route sink poisoned").len(), 1);

    commodity.route_unsubscribe();
    assert!(
        client
            .latest_route(EntityKind::Commodity, EntityId::new(8))
            .is_none()
    );
}

#[rstest]
fn callbacks_may_call_back_into_the_client(open_client: (Client, ConnectionHandle)) {
    let (client, _connection) = open_client;
    let mut read = client
        .get_transport(EntityId::new(5))
        .expect("read should be accepted");
    client
        .handle_message(&entity_message(MessageKind::Read, EntityKind::Transport, 5))
        .expect("read reply should match");
    let transport = read
        .try_take()
        .expect("reply should have arrived")
        .expect("read should succeed");

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let _outcome = transport
        .subscribe(move |previous, current| {
            assert_eq!(previous.status(), "Online");
            assert_eq!(current.status(), "Busy");
            counter.fetch_add(1, Ordering::SeqCst);
            current.unsubscribe();
        })
        .expect("subscribe should be accepted");

    client
        .handle_message(&transport_update(5, "Busy"))
        .expect("update should reach the subscription");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(client.subscriptions(), 0);
}

#[rstest]
fn closed_connection_rejects_new_calls(open_client: (Client, ConnectionHandle)) {
    let (client, _connection) = open_client;
    let mut reply = client
        .get_cluster(EntityId::new(1))
        .expect("read should be accepted");
    client.handle_close();

    assert_eq!(client.state(), ConnectionState::Closed);
    assert!(matches!(
        reply.try_take(),
        Some(Err(ClientError::ConnectionClosed))
    ));
    match client.get_cluster(EntityId::new(1)) {
        Err(error @ ClientError::TransportUnavailable { .. }) => {
            assert!(error.is_connection_lost());
        }
        other => panic!("expected transport unavailable, got {other:?}"),
    }
    assert_eq!(client.close(), 0);
}

#[rstest]
fn default_cluster_needs_an_application_id() {
    let (client, connection) = client_in_state(ConnectionState::Open, &Config::default());
    assert!(matches!(
        client.default_cluster_id(),
        Err(ClientError::MissingApplicationId)
    ));
    assert!(connection.sent().is_empty());
}

#[tokio::test]
async fn default_cluster_is_looked_up_then_read() {
    let (client, connection) = client_in_state(ConnectionState::Open, &config());
    let lookup = client
        .get_default_cluster()
        .expect("lookup should be accepted");
    assert_eq!(
        connection.sent_json(),
        vec![json!({
            "operation": "Read",
            "entityKind": "ApplicationCluster",
            "id": APPLICATION_ID,
        })]
    );

    let resolved = json!({"kind": "ApplicationCluster", "id": APPLICATION_ID, "value": 3});
    client
        .handle_message(&resolved.to_string())
        .expect("lookup reply should match");
    let task = tokio::spawn(lookup);
    for _ in 0..16 {
        if connection.sent().len() == 2 {
            break;
        }
        tokio::task::yield_now().await;
    }
    client
        .handle_message(&entity_message(MessageKind::Read, EntityKind::Cluster, 3))
        .expect("cluster reply should match");

    let cluster = task
        .await
        .expect("lookup task should not panic")
        .expect("default cluster should resolve");
    assert_eq!(cluster.id(), EntityId::new(3));
}

#[tokio::test]
async fn replies_are_awaitable() {
    let (client, _connection) = client_in_state(ConnectionState::Open, &config());
    let reply = client
        .route_cluster(EntityId::new(2))
        .expect("route should be accepted");
    client
        .handle_message(&routed(EntityKind::Cluster, 2, &json!({"legs": []})))
        .expect("route reply should match");
    let route = reply.await.expect("route should resolve");
    assert_eq!(route.kind(), EntityKind::Cluster);
    assert_eq!(route.into_payload(), json!({"legs": []}));
}

#[tokio::test]
async fn dropping_the_client_fails_outstanding_replies() {
    let (client, _connection) = client_in_state(ConnectionState::Open, &config());
    let reply = client
        .delete_cluster(EntityId::new(2))
        .expect("delete should be accepted");
    drop(client);
    assert!(matches!(reply.await, Err(ClientError::ConnectionClosed)));
}
