//! Integration tests for the ExtPlane client
//!
//! These tests verify end-to-end behavior of the client including:
//! - Serialized subscription handshakes
//! - Idempotent registration and no-op unregistration
//! - Replaying subscriptions across reconnects
//! - Tolerance of malformed server lines
//! - The async actor talking to a fake server over an in-memory pipe

use extplane_client::{
    run_connection, ClientCommand, ClientConfig, ClientEvent, ExtPlaneClient,
    SubscriptionManager, SubscriptionState,
};
use extplane_protocol::{Command, Dataref, DatarefType, DatarefValue, UpdateInterval};

// ============================================================================
// Helper Functions
// ============================================================================

mod helpers {
    use super::*;

    pub fn float_ref(identifier: &str) -> Dataref {
        Dataref::new(identifier, DatarefType::Float).unwrap()
    }

    /// A manager that is connected, with the connect traffic discarded
    pub fn connected_manager() -> SubscriptionManager {
        let mut manager = SubscriptionManager::new();
        manager.on_connected();
        manager.take_outbound();
        manager.drain_events();
        manager
    }

    /// Outbound commands as wire lines
    pub fn sent_lines(manager: &mut SubscriptionManager) -> Vec<String> {
        manager
            .take_outbound()
            .iter()
            .map(Command::encode)
            .collect()
    }

    pub fn subscribed_identifiers(events: &[ClientEvent]) -> Vec<String> {
        events
            .iter()
            .filter_map(|e| match e {
                ClientEvent::Subscribed { dataref } => Some(dataref.identifier().to_string()),
                _ => None,
            })
            .collect()
    }
}

// ============================================================================
// Registration Tests
// ============================================================================

mod registration_tests {
    use super::*;

    #[test]
    fn second_sub_waits_for_first_value() {
        let mut manager = helpers::connected_manager();
        let a = helpers::float_ref("sim/a/a");
        let b = helpers::float_ref("sim/b/b");

        manager.register(a.clone());
        manager.register(b.clone());
        assert_eq!(helpers::sent_lines(&mut manager), vec!["sub sim/a/a"]);

        // Values for anything else don't unblock the queue
        manager.handle_line("u f sim/z/z 9.0 0").unwrap();
        assert!(helpers::sent_lines(&mut manager).is_empty());

        manager.handle_line("u f sim/a/a 1.0 0").unwrap();
        assert_eq!(helpers::sent_lines(&mut manager), vec!["sub sim/b/b"]);
        assert_eq!(manager.state(a.id()), SubscriptionState::Registered);
        assert_eq!(manager.state(b.id()), SubscriptionState::PendingRegistration);

        manager.handle_line("u f sim/b/b 2.0 0").unwrap();
        assert_eq!(manager.state(b.id()), SubscriptionState::Registered);
        assert_eq!(
            helpers::subscribed_identifiers(&manager.drain_events()),
            vec!["sim/a/a", "sim/b/b"]
        );
    }

    #[test]
    fn register_twice_keeps_one_entry() {
        let mut manager = helpers::connected_manager();
        let a = helpers::float_ref("sim/a/a");

        assert!(manager.register(a.clone()));
        assert!(!manager.register(a.clone()));
        assert_eq!(manager.snapshot().occurrences(a.id()), 1);

        manager.handle_line("u f sim/a/a 1.0 0").unwrap();
        assert!(!manager.register(a.clone()));
        assert_eq!(manager.snapshot().occurrences(a.id()), 1);
        assert_eq!(helpers::sent_lines(&mut manager), vec!["sub sim/a/a"]);
    }

    #[test]
    fn same_identifier_different_type_is_distinct() {
        let mut manager = helpers::connected_manager();
        let as_float = helpers::float_ref("sim/a/a");
        let as_double = Dataref::new("sim/a/a", DatarefType::Double).unwrap();

        assert!(manager.register(as_float));
        assert!(manager.register(as_double));
        assert_eq!(manager.snapshot().pending_registration.len(), 2);
    }

    #[test]
    fn unregister_unknown_is_noop() {
        let mut manager = helpers::connected_manager();
        let a = helpers::float_ref("sim/a/a");

        assert!(!manager.unregister(a.id()));
        assert!(manager.take_outbound().is_empty());
        assert!(manager.drain_events().is_empty());
        assert!(manager.snapshot().is_empty());
    }

    #[test]
    fn accuracy_is_sent_with_sub() {
        let mut manager = helpers::connected_manager();
        let a = Dataref::new("sim/flightmodel/misc/h_ind", DatarefType::Float)
            .unwrap()
            .with_accuracy(10.0)
            .unwrap();

        manager.register(a);
        assert_eq!(
            helpers::sent_lines(&mut manager),
            vec!["sub sim/flightmodel/misc/h_ind 10.00"]
        );
    }
}

// ============================================================================
// Connection Lifecycle Tests
// ============================================================================

mod lifecycle_tests {
    use super::*;

    #[test]
    fn reconnect_replays_registered_then_resumes_queue() {
        let mut manager = SubscriptionManager::with_update_interval(Some(UpdateInterval::Hz60));
        let a = helpers::float_ref("sim/a/a");
        let b = helpers::float_ref("sim/b/b");
        let c = helpers::float_ref("sim/c/c");

        manager.register(a.clone());
        manager.register(b.clone());
        manager.on_connected();
        manager.handle_line("u f sim/a/a 1.0 0").unwrap();
        manager.handle_line("u f sim/b/b 2.0 0").unwrap();
        manager.register(c.clone());
        manager.take_outbound();

        manager.on_disconnected(Some("connection reset".to_string()));
        assert!(!manager.is_connected());
        assert_eq!(manager.state(a.id()), SubscriptionState::Registered);
        assert_eq!(manager.state(c.id()), SubscriptionState::PendingRegistration);

        manager.on_connected();
        assert_eq!(
            helpers::sent_lines(&mut manager),
            vec![
                "extplane-set update_interval 0.6",
                "sub sim/a/a",
                "sub sim/b/b",
                "sub sim/c/c",
            ]
        );
        assert_eq!(manager.in_flight(), Some(&c));
    }

    #[test]
    fn values_survive_reconnect() {
        let mut manager = helpers::connected_manager();
        let a = helpers::float_ref("sim/a/a");
        manager.register(a.clone());
        manager.handle_line("u f sim/a/a 3.5 0").unwrap();

        manager.on_disconnected(None);
        manager.on_connected();

        assert_eq!(manager.value(a.id()), Some(&DatarefValue::Float(3.5)));
    }

    #[test]
    fn commands_queued_while_connected_are_dropped_on_disconnect() {
        let mut manager = helpers::connected_manager();
        assert!(manager.send(Command::command_once("sim/operation/pause_toggle")));

        manager.on_disconnected(None);
        manager.on_connected();

        assert!(helpers::sent_lines(&mut manager).is_empty());
    }
}

// ============================================================================
// Malformed Input Tests
// ============================================================================

mod malformed_input_tests {
    use super::*;

    #[test]
    fn bad_line_does_not_disturb_other_subscriptions() {
        let mut manager = helpers::connected_manager();
        let a = helpers::float_ref("sim/a/a");
        let b = Dataref::new("sim/b/b", DatarefType::IntArray).unwrap();

        manager.register(a.clone());
        manager.handle_line("u f sim/a/a 1.0 0").unwrap();
        manager.register(b.clone());
        manager.handle_line("u ia sim/b/b [1,2,3]").unwrap();

        for line in ["u", "u x sim/a/a 1 0", "u f sim/a/a", "garbage", "u f sim/a/a abc 0"] {
            assert!(manager.handle_line(line).is_err(), "{line:?} should fail");
        }

        assert_eq!(manager.value(a.id()), Some(&DatarefValue::Float(1.0)));
        assert_eq!(
            manager.value(b.id()),
            Some(&DatarefValue::IntArray(vec![1, 2, 3]))
        );

        manager.handle_line("u f sim/a/a 2.0 0").unwrap();
        assert_eq!(manager.value(a.id()), Some(&DatarefValue::Float(2.0)));
    }

    #[test]
    fn bad_array_elements_are_skipped() {
        let mut manager = helpers::connected_manager();
        let a = Dataref::new("sim/a/a", DatarefType::FloatArray).unwrap();
        manager.register(a.clone());

        manager.handle_line("u fa sim/a/a [1.5, x, 2.5]").unwrap();
        assert_eq!(
            manager.value(a.id()),
            Some(&DatarefValue::FloatArray(vec![1.5, 2.5]))
        );
    }
}

// ============================================================================
// Async Client Tests
// ============================================================================

mod async_client_tests {
    use std::time::Duration;

    use super::*;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

    #[tokio::test]
    async fn client_talks_to_fake_server() {
        let (client, mut events, actor) = ExtPlaneClient::spawn(ClientConfig::default());
        let (client_io, server_io) = tokio::io::duplex(4096);
        let connection = tokio::spawn(run_connection(
            client_io,
            "fake server".to_string(),
            client.sender(),
        ));

        let (server_read, mut server_write) = tokio::io::split(server_io);
        let mut server_lines = BufReader::new(server_read).lines();
        server_write.write_all(b"EXTPLANE\n").await.unwrap();

        client
            .register_identifier("sim/a/a", DatarefType::Int, Some(1.0))
            .await
            .unwrap();
        client
            .register_identifier("sim/b/b", DatarefType::Double, None)
            .await
            .unwrap();

        assert_eq!(
            server_lines.next_line().await.unwrap().as_deref(),
            Some("sub sim/a/a 1")
        );
        server_write.write_all(b"u i sim/a/a 7 0\n").await.unwrap();
        assert_eq!(
            server_lines.next_line().await.unwrap().as_deref(),
            Some("sub sim/b/b")
        );
        server_write.write_all(b"u d sim/b/b 0.25 0\n").await.unwrap();

        let mut subscribed = Vec::new();
        let mut greeted = false;
        while subscribed.len() < 2 {
            match events.recv().await.unwrap() {
                ClientEvent::ServerGreeting => greeted = true,
                ClientEvent::Subscribed { dataref } => subscribed.push(dataref),
                _ => {}
            }
        }
        assert!(greeted);
        assert_eq!(subscribed[0].value(), Some(&DatarefValue::Int(7)));
        assert_eq!(subscribed[1].value(), Some(&DatarefValue::Double(0.25)));

        let a = Dataref::new("sim/a/a", DatarefType::Int).unwrap();
        assert!(client.unregister(&a).await.unwrap());
        assert_eq!(
            server_lines.next_line().await.unwrap().as_deref(),
            Some("unsub sim/a/a")
        );
        assert_eq!(client.value(&a).await.unwrap(), None);

        client.send(Command::Disconnect).await.unwrap();
        assert_eq!(
            server_lines.next_line().await.unwrap().as_deref(),
            Some("disconnect")
        );

        drop(server_write);
        drop(server_lines);
        connection.await.unwrap().unwrap();

        loop {
            if let ClientEvent::Disconnected { .. } = events.recv().await.unwrap() {
                break;
            }
        }
        assert!(matches!(
            client.send(Command::key_tap("1")).await,
            Err(extplane_client::ClientError::NotConnected)
        ));

        client.shutdown().await.unwrap();
        actor.await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn reconnect_with_many_subscriptions_under_value_flood() {
        const DATAREFS: usize = 40;

        let config = ClientConfig {
            channel_capacity: 8,
            ..Default::default()
        };
        let (client, mut events, actor) = ExtPlaneClient::spawn(config);
        let drain_events = tokio::spawn(async move { while events.recv().await.is_some() {} });

        // Register and acknowledge well over a channel's worth of datarefs
        let (line_tx, _line_rx) = tokio::sync::mpsc::unbounded_channel();
        client
            .sender()
            .send(ClientCommand::TransportConnected { line_tx })
            .await
            .unwrap();
        for i in 0..DATAREFS {
            client
                .register_identifier(&format!("sim/flood/d{}", i), DatarefType::Int, None)
                .await
                .unwrap();
            client
                .sender()
                .send(ClientCommand::LineReceived {
                    line: format!("u i sim/flood/d{} {} 0", i, i),
                })
                .await
                .unwrap();
        }
        assert_eq!(client.subscriptions().await.unwrap().registered.len(), DATAREFS);
        client
            .sender()
            .send(ClientCommand::TransportDisconnected { reason: None })
            .await
            .unwrap();

        // Reconnect to a server that floods values before reading anything
        let (client_io, server_io) = tokio::io::duplex(256);
        let connection = tokio::spawn(run_connection(
            client_io,
            "flooding server".to_string(),
            client.sender(),
        ));
        let (server_read, mut server_write) = tokio::io::split(server_io);
        let flood = tokio::spawn(async move {
            for n in 0..2000 {
                let line = format!("u i sim/flood/d{} {} 0\n", n % DATAREFS, n);
                if server_write.write_all(line.as_bytes()).await.is_err() {
                    break;
                }
            }
            server_write
        });

        let snapshot = tokio::time::timeout(Duration::from_secs(5), client.subscriptions())
            .await
            .expect("actor stays responsive during the replay")
            .unwrap();
        assert_eq!(snapshot.registered.len(), DATAREFS);

        // Every registered dataref is replayed once the server reads
        let mut server_lines = BufReader::new(server_read).lines();
        let mut replayed = std::collections::HashSet::new();
        while replayed.len() < DATAREFS {
            let line = tokio::time::timeout(Duration::from_secs(5), server_lines.next_line())
                .await
                .expect("replay arrives")
                .unwrap()
                .unwrap();
            if let Some(identifier) = line.strip_prefix("sub ") {
                replayed.insert(identifier.to_string());
            }
        }

        let server_write = tokio::time::timeout(Duration::from_secs(5), flood)
            .await
            .expect("flood drains")
            .unwrap();
        drop(server_write);
        drop(server_lines);
        let _ = connection.await.unwrap();

        client.shutdown().await.unwrap();
        actor.await.unwrap();
        drain_events.await.unwrap();
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

mod proptest_tests {
    use super::*;
    use proptest::prelude::*;

    fn identifier() -> impl Strategy<Value = String> {
        "sim/[a-z]{1,8}/[a-z_]{1,8}"
    }

    proptest! {
        #[test]
        fn at_most_one_sub_in_flight(ids in prop::collection::vec(identifier(), 1..12)) {
            let mut manager = helpers::connected_manager();
            for id in &ids {
                manager.register(helpers::float_ref(id));
            }

            let sent = helpers::sent_lines(&mut manager);
            prop_assert_eq!(sent.len(), 1);
            prop_assert_eq!(&sent[0], &format!("sub {}", ids[0]));
        }

        #[test]
        fn every_dataref_occurs_at_most_once(
            ids in prop::collection::vec(identifier(), 1..12),
            acks in prop::collection::vec(any::<bool>(), 12),
        ) {
            let mut manager = helpers::connected_manager();
            for (id, ack) in ids.iter().zip(&acks) {
                manager.register(helpers::float_ref(id));
                if *ack {
                    if let Some(flight) = manager.in_flight().cloned() {
                        manager
                            .handle_line(&format!("u f {} 1.0 0", flight.identifier()))
                            .unwrap();
                    }
                }
            }

            let snapshot = manager.snapshot();
            for id in &ids {
                let dataref = helpers::float_ref(id);
                prop_assert_eq!(snapshot.occurrences(dataref.id()), 1);
            }
        }

        #[test]
        fn arbitrary_lines_never_panic(line in ".{0,64}") {
            let mut manager = helpers::connected_manager();
            manager.register(helpers::float_ref("sim/a/a"));
            let _ = manager.handle_line(&line);
            prop_assert!(manager.snapshot().occurrences(helpers::float_ref("sim/a/a").id()) <= 1);
        }
    }
}
