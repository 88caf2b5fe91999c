//! End-to-end behavior of the transition engine.

use statusflow::builder::EngineBuilder;
use statusflow::core::{EntityKind, TransitionContext};
use statusflow::effects::{subscriber_fn, Subscriber, TransitionMetrics};
use statusflow::enforcement::ValidationFailure;
use statusflow::rules::{side_effect_fn, validator_fn, HandlerError, TransitionRule};
use statusflow::{transition_rules, TransitionEngine, TransitionError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{self, UnboundedReceiver};

fn task(id: &str, from: &str, to: &str) -> TransitionContext {
    TransitionContext::new(EntityKind::Task, id, from, to)
}

fn todo_engine() -> TransitionEngine {
    let engine = TransitionEngine::with_defaults();
    engine
        .register_rules(
            EntityKind::Task,
            transition_rules!["start" => { from: "TODO", to: "DOING" }],
        )
        .unwrap();
    engine
}

#[tokio::test]
async fn registered_edge_resolves_and_unregistered_edge_rejects() {
    let engine = todo_engine();

    engine.transition(task("t1", "TODO", "DOING")).await.unwrap();
    let err = engine.transition(task("t1", "DOING", "DONE")).await.unwrap_err();

    assert!(matches!(err, TransitionError::InvalidTransition { .. }));
    assert!(matches!(
        err.failures(),
        [ValidationFailure::NoMatchingRule { .. }]
    ));
    assert_eq!(engine.get_history("t1").len(), 1);
}

#[tokio::test]
async fn concurrent_transitions_on_one_entity_yield_one_winner() {
    let engine = TransitionEngine::with_defaults();
    engine.register_validator(
        "slow",
        validator_fn(|_| async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(true)
        }),
    );
    engine
        .register_rules(
            EntityKind::Task,
            transition_rules!["start" => { from: "TODO", to: "DOING", validator: "slow" }],
        )
        .unwrap();

    let (a, b) = tokio::join!(
        engine.transition(task("t1", "TODO", "DOING")),
        engine.transition(task("t1", "TODO", "DOING")),
    );

    let results = [a, b];
    let successes = results.iter().filter(|r| r.is_ok()).count();
    let conflicts = results
        .iter()
        .filter(|r| matches!(r, Err(e) if e.is_concurrent()))
        .count();
    assert_eq!(successes, 1);
    assert_eq!(conflicts, 1);
    assert_eq!(engine.get_history("t1").len(), 1);
}

#[tokio::test]
async fn distinct_entities_proceed_in_parallel() {
    let engine = Arc::new(TransitionEngine::with_defaults());
    engine.register_validator(
        "slow",
        validator_fn(|_| async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok(true)
        }),
    );
    engine
        .register_rules(
            EntityKind::Task,
            transition_rules!["start" => { from: "TODO", to: "DOING", validator: "slow" }],
        )
        .unwrap();

    let started = Instant::now();
    let handles: Vec<_> = (0..10)
        .map(|i| {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move {
                let id = format!("t{i}");
                engine.transition(task(&id, "TODO", "DOING")).await
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert!(started.elapsed() < Duration::from_millis(900));
    assert_eq!(engine.get_status_counts(EntityKind::Task).get("DOING"), Some(&10));
}

#[tokio::test]
async fn never_resolving_validator_times_out() {
    let engine = EngineBuilder::new()
        .validation_timeout(Duration::from_millis(50))
        .validator(
            "hangs",
            validator_fn(|_| async {
                std::future::pending::<()>().await;
                Ok(true)
            }),
        )
        .rules(
            EntityKind::Task,
            transition_rules!["start" => { from: "TODO", to: "DOING", validator: "hangs" }],
        )
        .build()
        .unwrap();

    let started = Instant::now();
    let allowed = engine.can_transition(&task("t1", "TODO", "DOING")).await;
    assert!(!allowed);
    assert!(started.elapsed() < Duration::from_secs(1));

    let err = engine.transition(task("t1", "TODO", "DOING")).await.unwrap_err();
    assert!(err.is_invalid());
    assert!(err.is_timeout());
}

#[tokio::test]
async fn failed_side_effect_leaves_no_trace_and_frees_key() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&attempts);
    let engine = EngineBuilder::new()
        .side_effect(
            "flaky",
            side_effect_fn(move |_| {
                let seen = Arc::clone(&seen);
                async move {
                    if seen.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err::<(), HandlerError>("first attempt fails".into())
                    } else {
                        Ok(())
                    }
                }
            }),
        )
        .rules(
            EntityKind::Task,
            transition_rules!["start" => { from: "TODO", to: "DOING", side_effect: "flaky" }],
        )
        .build()
        .unwrap();

    let err = engine.transition(task("t1", "TODO", "DOING")).await.unwrap_err();
    assert!(err.is_side_effect());
    assert!(engine.get_history("t1").is_empty());
    assert!(!engine.is_in_flight(EntityKind::Task, "t1"));

    engine.transition(task("t1", "TODO", "DOING")).await.unwrap();
    assert_eq!(engine.get_history("t1").len(), 1);
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

/// Subscriber forwarding each event's `(entity_id, new_status)` into a channel.
fn forwarding() -> (Arc<dyn Subscriber>, UnboundedReceiver<(String, String)>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let subscriber = subscriber_fn(move |event| {
        let tx = tx.clone();
        async move {
            let _ = tx.send((event.entity_id, event.new_status.to_string()));
            Ok(())
        }
    });
    (subscriber, rx)
}

async fn next_event(rx: &mut UnboundedReceiver<(String, String)>) -> (String, String) {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("event delivered")
        .expect("channel open")
}

#[tokio::test]
async fn unsubscribed_callback_stops_receiving() {
    let engine = todo_engine();
    engine
        .append_rules(
            EntityKind::Task,
            transition_rules!["pause" => { from: "DOING", to: "TODO" }],
        )
        .unwrap();

    let (removed, mut removed_rx) = forwarding();
    let (sentinel, mut sentinel_rx) = forwarding();
    let subscription = engine.subscribe(removed);
    let _sentinel = engine.subscribe(sentinel);

    engine.transition(task("t1", "TODO", "DOING")).await.unwrap();
    assert_eq!(next_event(&mut removed_rx).await.1, "DOING");
    assert_eq!(next_event(&mut sentinel_rx).await.1, "DOING");

    assert!(subscription.unsubscribe());
    engine.transition(task("t1", "DOING", "TODO")).await.unwrap();

    assert_eq!(next_event(&mut sentinel_rx).await.1, "TODO");

    // The removed subscriber's worker exits and drops its sender without
    // delivering anything further.
    let rest = tokio::time::timeout(Duration::from_secs(5), removed_rx.recv()).await;
    assert!(matches!(rest, Ok(None)));
}

#[tokio::test]
async fn failing_subscriber_does_not_affect_transition() {
    let engine = todo_engine();
    let _broken = engine.subscribe(subscriber_fn(|_| async {
        Err::<(), HandlerError>("subscriber down".into())
    }));
    let metrics = Arc::new(TransitionMetrics::new());
    let _metrics = engine.subscribe(metrics.clone());
    let (sentinel, mut sentinel_rx) = forwarding();
    let _sentinel = engine.subscribe(sentinel);

    engine.transition(task("t1", "TODO", "DOING")).await.unwrap();
    next_event(&mut sentinel_rx).await;

    // Deliveries to distinct subscribers are independent; poll until counted.
    tokio::time::timeout(Duration::from_secs(5), async {
        while metrics.edge(EntityKind::Task, "TODO", "DOING") == 0 {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("metrics subscriber counted the transition");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn subscriber_sees_one_entity_in_transition_order() {
    let engine = TransitionEngine::with_defaults();
    engine
        .register_rules(
            EntityKind::Task,
            vec![TransitionRule::new("step", ["A", "B"], ["A", "B"])],
        )
        .unwrap();
    let (subscriber, mut rx) = forwarding();
    let _subscription = engine.subscribe(subscriber);

    let rounds = 1000;
    for n in 0..rounds {
        let (from, to) = if n % 2 == 0 { ("A", "B") } else { ("B", "A") };
        engine.transition(task("t1", from, to)).await.unwrap();
    }

    for n in 0..rounds {
        let expected = if n % 2 == 0 { "B" } else { "A" };
        assert_eq!(next_event(&mut rx).await.1, expected, "event {n} out of order");
    }
}

#[tokio::test]
async fn clear_history_scopes() {
    let engine = TransitionEngine::with_defaults();
    for kind in [EntityKind::Task, EntityKind::Agent] {
        engine
            .register_rules(kind, vec![TransitionRule::new("go", "A", "B")])
            .unwrap();
    }
    for (kind, id) in [
        (EntityKind::Task, "x"),
        (EntityKind::Task, "y"),
        (EntityKind::Agent, "x"),
    ] {
        engine
            .transition(TransitionContext::new(kind, id, "A", "B"))
            .await
            .unwrap();
    }

    engine.clear_history(Some(EntityKind::Task), Some("x"));
    assert_eq!(engine.get_history("x").len(), 1);
    assert_eq!(engine.get_history("y").len(), 1);

    engine.clear_history(Some(EntityKind::Task), None);
    assert!(engine.get_history("y").is_empty());
    assert_eq!(engine.get_entity_history(EntityKind::Agent, "x").len(), 1);

    engine.clear_history(None, None);
    assert!(engine.get_history("x").is_empty());
}

#[tokio::test]
async fn history_entries_carry_context_metadata() {
    let engine = todo_engine();
    let ctx = task("t1", "TODO", "DOING").with_metadata("assignee", "agent-3");

    let event = engine.transition(ctx).await.unwrap();
    let history = engine.get_history("t1");

    assert_eq!(history[0].metadata["assignee"], "agent-3");
    assert_eq!(event.metadata, history[0].metadata);
    assert_eq!(event.transition_id, history[0].transition_id);
}
