mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{plain_settings, DeliveryLog, EchoEntityProps, ImmediateHandOffStopper, Msg, TestExtractor};
use shardkeeper::prelude::*;
use tokio::sync::oneshot;

fn spawn_plain_shard(
    shard_id: &str,
    settings: ShardSettings,
    log: DeliveryLog,
) -> (ShardHandle<Msg>, tokio::task::JoinHandle<()>, oneshot::Receiver<ShardId>) {
    let (init_tx, init_rx) = oneshot::channel();
    let config = ShardConfig {
        type_name: "test".to_owned(),
        shard_id: ShardId::new(shard_id),
        settings,
        hand_off_stop_message: Msg::StopNow(String::new()),
        entity_props: Arc::new(EchoEntityProps { log }),
        hand_off_stopper_props: Arc::new(ImmediateHandOffStopper),
        extractor: Arc::new(TestExtractor),
        persistence: Box::new(NoopPersistence::new()),
        dead_letters: Arc::new(LoggingDeadLetters),
        on_initialized: Box::new(move |shard_id| {
            let _ = init_tx.send(shard_id);
        }),
    };
    let (handle, join) = Shard::spawn(config);
    (handle, join, init_rx)
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(30)).await;
}

/// Scenario 1: lazy spawn and direct route.
#[tokio::test]
async fn lazy_spawn_and_direct_route() {
    let log = DeliveryLog::default();
    let (handle, _join, _init) = spawn_plain_shard("s1", plain_settings(100), log.clone());

    handle.tell(Msg::Value("a".to_owned(), 1));
    settle().await;

    let ids = handle.current_shard_state().await.unwrap();
    assert_eq!(ids, vec![EntityId::new("a").unwrap()]);
    assert_eq!(log.deliveries_for("a"), vec![1]);
    assert_eq!(log.spawn_count("a"), 1);
}

/// Scenario 2: passivation round trip.
#[tokio::test]
async fn passivation_round_trip() {
    let log = DeliveryLog::default();
    let (handle, _join, _init) = spawn_plain_shard("s2", plain_settings(100), log.clone());

    handle.tell(Msg::Value("b".to_owned(), 0));
    settle().await;
    assert_eq!(log.spawn_count("b"), 1);

    handle.tell(Msg::RequestPassivate("b".to_owned()));
    settle().await;

    // "b" has received its stop message and is winding down; these should
    // land in the buffer rather than reach the (dying) worker directly.
    handle.tell(Msg::Value("b".to_owned(), 2));
    handle.tell(Msg::Value("b".to_owned(), 3));

    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(log.spawn_count("b"), 2);
    assert_eq!(log.deliveries_for("b"), vec![0, 2, 3]);

    let ids = handle.current_shard_state().await.unwrap();
    assert!(ids.contains(&EntityId::new("b").unwrap()));
}

/// Scenario 3: buffer overflow drops to dead letters without disturbing the
/// buffer already held.
#[tokio::test]
async fn buffer_overflow_drops_excess() {
    let log = DeliveryLog::default();
    let (handle, _join, _init) = spawn_plain_shard("s3", plain_settings(1), log.clone());

    handle.tell(Msg::Value("c".to_owned(), 0));
    settle().await;

    handle.tell(Msg::RequestPassivate("c".to_owned()));
    settle().await;

    // "c" is now passivating with one buffered slot available; fill it, then
    // overflow. The worker itself is still winding down (it only stops after
    // its own artificial delay), so both arrive while the buffer is open.
    handle.tell(Msg::Value("c".to_owned(), 1));
    handle.tell(Msg::Value("c".to_owned(), 2));

    // Once the worker actually stops, the buffer (holding only "1") flushes
    // to a freshly spawned worker.
    tokio::time::sleep(Duration::from_millis(200)).await;

    // Only the first buffered message ("1") should have survived; "2"
    // overflowed the cap of 1 and was dropped to dead letters.
    assert_eq!(log.deliveries_for("c"), vec![0, 1]);
    assert_eq!(log.spawn_count("c"), 2);
}

/// Scenario 4: hand-off of an empty shard replies immediately and stops.
#[tokio::test]
async fn hand_off_empty_shard_stops_immediately() {
    let log = DeliveryLog::default();
    let (handle, join, _init) = spawn_plain_shard("s4", plain_settings(100), log);

    let (tx, rx) = oneshot::channel();
    handle.hand_off(
        ShardId::new("s4"),
        Box::new(move |shard_id| {
            let _ = tx.send(shard_id);
        }),
    );

    let stopped = tokio::time::timeout(Duration::from_millis(200), rx).await.unwrap().unwrap();
    assert_eq!(stopped, ShardId::new("s4"));
    tokio::time::timeout(Duration::from_millis(200), join).await.unwrap().unwrap();
}

/// Scenario 5: hand-off of a non-empty shard suppresses further routing and
/// stops once the stopper terminates. A second `HandOff` mid-flight is
/// ignored.
#[tokio::test]
async fn hand_off_non_empty_shard_suppresses_routing() {
    let log = DeliveryLog::default();
    let (handle, join, _init) = spawn_plain_shard("s5", plain_settings(100), log.clone());

    handle.tell(Msg::Value("x".to_owned(), 1));
    handle.tell(Msg::Value("y".to_owned(), 1));
    settle().await;

    let (tx, rx) = oneshot::channel();
    handle.hand_off(
        ShardId::new("s5"),
        Box::new(move |shard_id| {
            let _ = tx.send(shard_id);
        }),
    );

    // Ignored: a hand-off is already underway.
    let (tx2, _rx2) = oneshot::channel();
    handle.hand_off(ShardId::new("s5"), Box::new(move |shard_id| {
        let _ = tx2.send(shard_id);
    }));

    handle.tell(Msg::Value("x".to_owned(), 99));
    settle().await;

    // The application message sent during hand-off never reached "x".
    assert_eq!(log.deliveries_for("x"), vec![1]);

    let stopped = tokio::time::timeout(Duration::from_millis(200), rx).await.unwrap().unwrap();
    assert_eq!(stopped, ShardId::new("s5"));
    tokio::time::timeout(Duration::from_millis(200), join).await.unwrap().unwrap();
}

/// Scenario 6: persistent recovery with the constant-rate strategy paces
/// restarts and announces initialization exactly once.
#[tokio::test]
async fn persistent_recovery_constant_rate() {
    let journal = Arc::new(InMemoryJournal::new());
    let snapshots = Arc::new(InMemorySnapshotStore::new());
    let persistence_id = shardkeeper::persistence::persistence_id("Test", "s6");

    for (seq, id) in [(1u64, "a"), (2, "b"), (3, "c")] {
        let event = Event::EntityStarted(EntityId::new(id).unwrap());
        journal.append(&persistence_id, seq, &event).await.unwrap();
    }

    let settings = ShardSettings {
        entity_recovery_strategy: RecoveryStrategyKind::ConstantRate,
        entity_recovery_constant_rate_frequency: Duration::from_millis(100),
        entity_recovery_constant_rate_number_of_entities: 2,
        ..plain_settings(100)
    };
    let config = JournaledPersistenceConfig::from_settings(persistence_id, &settings);
    let persistence = JournaledPersistence::new(journal, snapshots, config);

    let log = DeliveryLog::default();
    let (init_tx, init_rx) = oneshot::channel();
    let shard_config = ShardConfig {
        type_name: "Test".to_owned(),
        shard_id: ShardId::new("s6"),
        settings: plain_settings(100),
        hand_off_stop_message: Msg::StopNow(String::new()),
        entity_props: Arc::new(EchoEntityProps { log: log.clone() }),
        hand_off_stopper_props: Arc::new(ImmediateHandOffStopper),
        extractor: Arc::new(TestExtractor),
        persistence: Box::new(persistence),
        dead_letters: Arc::new(LoggingDeadLetters),
        on_initialized: Box::new(move |shard_id| {
            let _ = init_tx.send(shard_id);
        }),
    };
    let (handle, _join) = Shard::spawn(shard_config);

    let initialized =
        tokio::time::timeout(Duration::from_millis(200), init_rx).await.unwrap().unwrap();
    assert_eq!(initialized, ShardId::new("s6"));

    let stats = handle.shard_stats().await.unwrap();
    assert_eq!(stats, 3);

    // No workers yet; the recovery batches haven't resolved.
    assert_eq!(log.spawn_count("a"), 0);

    tokio::time::sleep(Duration::from_millis(150)).await;
    let after_first_batch =
        log.spawn_count("a") + log.spawn_count("b") + log.spawn_count("c");
    assert_eq!(after_first_batch, 2);

    tokio::time::sleep(Duration::from_millis(150)).await;
    let after_second_batch =
        log.spawn_count("a") + log.spawn_count("b") + log.spawn_count("c");
    assert_eq!(after_second_batch, 3);

    let ids = handle.current_shard_state().await.unwrap();
    assert_eq!(ids.len(), 3);
}
