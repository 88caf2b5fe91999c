//! Task Lifecycle
//!
//! This example drives a task through TODO -> DOING -> REVIEW -> DONE.
//!
//! Key concepts:
//! - Declaring rules with the `transition_rules!` macro
//! - Named validators and side effects
//! - Rejected edges and failed validation
//! - Subscribing to change events and reading history
//!
//! Run with: RUST_LOG=statusflow=debug cargo run --example task_lifecycle

use statusflow::builder::EngineBuilder;
use statusflow::core::{EntityKind, TransitionContext};
use statusflow::effects::{subscriber_fn, TransitionMetrics};
use statusflow::rules::{side_effect_fn, validator_fn, HandlerError};
use statusflow::transition_rules;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// Review needs a reviewer recorded in the request metadata
fn has_reviewer(ctx: &TransitionContext) -> bool {
    ctx.metadata
        .get("reviewer")
        .and_then(|v| v.as_str())
        .is_some_and(|r| !r.is_empty())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== Task Lifecycle Example ===\n");

    let engine = EngineBuilder::new()
        .validation_timeout(Duration::from_millis(500))
        .validator(
            "has_reviewer",
            validator_fn(|ctx| async move { Ok(has_reviewer(&ctx)) }),
        )
        .side_effect(
            "notify_assignee",
            side_effect_fn(|ctx| async move {
                println!("  -> notifying assignee of {}", ctx.entity_id);
                Ok::<(), HandlerError>(())
            }),
        )
        .rules(
            EntityKind::Task,
            transition_rules![
                "start" => { from: "TODO", to: "DOING", side_effect: "notify_assignee" },
                "submit" => { from: "DOING", to: "REVIEW", validator: "has_reviewer" },
                "rework" => { from: "REVIEW", to: "DOING" },
                "approve" => { from: "REVIEW", to: "DONE" },
                "block" => { from: ["TODO", "DOING"], to: "BLOCKED" },
                "unblock" => { from: "BLOCKED", to: "TODO" },
            ],
        )
        .build()?;

    let metrics = Arc::new(TransitionMetrics::new());
    let _metrics = engine.subscribe(metrics.clone());
    let _printer = engine.subscribe(subscriber_fn(|event| async move {
        println!(
            "  event: {} {} -> {}",
            event.entity_id, event.previous_status, event.new_status
        );
        Ok(())
    }));

    println!("Starting task-42...");
    engine
        .transition(TransitionContext::new(EntityKind::Task, "task-42", "TODO", "DOING"))
        .await?;

    println!("\nSkipping review (DOING -> DONE)...");
    let skip = TransitionContext::new(EntityKind::Task, "task-42", "DOING", "DONE");
    match engine.transition(skip).await {
        Ok(_) => println!("  unexpectedly allowed"),
        Err(e) => println!("  rejected: {e}"),
    }

    println!("\nSubmitting without a reviewer...");
    let unreviewed = TransitionContext::new(EntityKind::Task, "task-42", "DOING", "REVIEW");
    if let Err(failures) = engine.validate(&unreviewed).await {
        for failure in failures {
            println!("  {failure}");
        }
    }

    println!("\nSubmitting with a reviewer...");
    engine
        .transition(unreviewed.with_metadata("reviewer", "dana"))
        .await?;
    engine
        .transition(TransitionContext::new(EntityKind::Task, "task-42", "REVIEW", "DONE"))
        .await?;

    // Let the spawned deliveries land before reading metrics
    tokio::time::sleep(Duration::from_millis(20)).await;

    println!("\nHistory for task-42:");
    for entry in engine.get_history("task-42") {
        println!(
            "  {} {} -> {} ({})",
            entry.timestamp.format("%H:%M:%S%.3f"),
            entry.from,
            entry.to,
            entry.transition_id
        );
    }

    println!("\nStatus counts:");
    for (status, count) in engine.get_status_counts(EntityKind::Task) {
        println!("  {status}: {count}");
    }
    println!("\nTransitions observed: {}", metrics.total());

    Ok(())
}
