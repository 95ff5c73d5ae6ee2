//! SimBridge / Run Manager end-to-end scenarios (spec §8's concrete test
//! seeds), driven through the real `RunManager` driver thread rather than
//! calling `Run::step()` directly — `crates/ufog-runtime/tests/end_to_end.rs`
//! covers the same six scenarios at the engine level; this suite checks
//! the wire contract layered on top (`BridgeMessage` ordering, the
//! mid-run-subscribe replay, and subscriber backpressure).
//!
//! Placement mirrors the teacher's `phago-distributed/tests/integration.rs`:
//! one integration file per crate driving its public surface end to end.

use std::time::Duration;

use tokio::time::timeout;

use ufog_bridge::prelude::*;
use ufog_core::prelude::*;
use ufog_runtime::prelude::RunStatus;

fn smoke_config(seed: u64) -> SimConfig {
    SimConfig {
        num_agents: 5,
        num_generations: 2,
        steps_per_generation: 10,
        seed,
        enable_entanglement: false,
        ..Default::default()
    }
}

async fn drain_until_done(sub: &mut Subscription, budget: Duration) -> Vec<BridgeMessage> {
    let mut messages = Vec::new();
    loop {
        match timeout(budget, sub.recv()).await {
            Ok(Some(msg)) => {
                let is_done = matches!(msg, BridgeMessage::Done { .. });
                messages.push(msg);
                if is_done {
                    break;
                }
            }
            _ => break,
        }
    }
    messages
}

/// Scenario 1: a subscriber that attaches immediately after `/sim/start`
/// (before the driver thread has necessarily completed a step) must see
/// exactly one `init_state` and no spurious extra `tick` ahead of the
/// run's real `tick`s 1..20.
#[tokio::test]
async fn scenario_1_smoke_subscriber_gets_no_spurious_tick_then_twenty_ticks() {
    let manager = RunManager::new();
    let run_id = manager.create_run(smoke_config(1)).unwrap();
    // Subscribe before `start()`: no step has run yet, so `handle.snapshot`
    // is still `None` and this must not synthesize a spurious `tick` —
    // exactly the bug this regression test guards against. Subscribing
    // first (rather than racing `start()`) also guarantees the broadcast
    // channel buffers every one of the run's real ticks from step 1
    // onward, so the sequence check below isn't itself timing-dependent.
    let (mut sub, replay) = manager.subscribe(run_id).unwrap();
    manager.start(run_id).unwrap();

    assert_eq!(replay.len(), 2, "expected ConnectionConfirmed + InitState only");
    assert!(matches!(replay[0], BridgeMessage::ConnectionConfirmed { .. }));
    assert!(matches!(replay[1], BridgeMessage::InitState { .. }));

    let messages = drain_until_done(&mut sub, Duration::from_secs(10)).await;
    let tick_steps: Vec<Step> = messages
        .iter()
        .filter_map(|m| match m {
            BridgeMessage::Tick { step, .. } => Some(*step),
            _ => None,
        })
        .collect();
    assert_eq!(tick_steps, (1..=20).collect::<Vec<_>>());

    let generation_completes = messages
        .iter()
        .filter(|m| matches!(m, BridgeMessage::Event { event_type, .. } if event_type == "GENERATION_COMPLETE"))
        .count();
    assert_eq!(generation_completes, 2);

    assert!(matches!(
        messages.last(),
        Some(BridgeMessage::Done { status, final_step, .. }) if status == "completed" && *final_step == 20
    ));
}

/// Scenario 4: attach mid-run, at step 20 of a 50-step run. Expect one
/// `init_state`, then one full `tick` with all agents, then delta ticks
/// 21..50, then `done`.
#[tokio::test]
async fn scenario_4_mid_run_subscribe_replays_full_tick_then_continues() {
    let manager = RunManager::new();
    let config = SimConfig {
        num_agents: 5,
        num_generations: 1,
        steps_per_generation: 50,
        seed: 2,
        enable_entanglement: false,
        step_delay_seconds: 0.01,
        ..Default::default()
    };
    let run_id = manager.create_run(config).unwrap();
    manager.start(run_id).unwrap();

    let mut waited = 0;
    while manager.status(run_id).unwrap().current_step < 20 {
        waited += 1;
        assert!(waited < 2000, "run never reached step 20 within the wait budget");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let (mut sub, replay) = manager.subscribe(run_id).unwrap();
    assert_eq!(replay.len(), 3, "expected ConnectionConfirmed + InitState + one full Tick");
    assert!(matches!(replay[0], BridgeMessage::ConnectionConfirmed { .. }));
    assert!(matches!(replay[1], BridgeMessage::InitState { .. }));
    let replayed_step = match &replay[2] {
        BridgeMessage::Tick { step, agent_updates } => {
            assert_eq!(agent_updates.len(), 5, "full replay tick must contain all agents");
            *step
        }
        other => panic!("expected a full replay Tick, got {other:?}"),
    };
    assert!(replayed_step >= 20);

    let messages = drain_until_done(&mut sub, Duration::from_secs(15)).await;
    let tick_steps: Vec<Step> = messages
        .iter()
        .filter_map(|m| match m {
            BridgeMessage::Tick { step, .. } => Some(*step),
            _ => None,
        })
        .collect();
    assert!(tick_steps.windows(2).all(|w| w[1] == w[0] + 1), "delta ticks must be contiguous");
    assert!(tick_steps.last().copied().unwrap_or(0) <= 50);
    assert!(matches!(messages.last(), Some(BridgeMessage::Done { .. })));
}

/// Scenario 5: a 1000-step run, `stop` issued shortly after start.
/// Expect `done(status=stopped, final_step<=43)` and no `tick` whose
/// step exceeds the reported `final_step`.
#[tokio::test]
async fn scenario_5_cancellation_produces_stopped_done_with_no_late_ticks() {
    let manager = RunManager::new();
    let config = SimConfig {
        num_agents: 5,
        num_generations: 1,
        steps_per_generation: 1000,
        seed: 3,
        enable_entanglement: false,
        step_delay_seconds: 0.02,
        ..Default::default()
    };
    let run_id = manager.create_run(config).unwrap();
    let (mut sub, _replay) = manager.subscribe(run_id).unwrap();
    manager.start(run_id).unwrap();

    // Let a handful of steps land, then cancel; exact step count is
    // timing-dependent, so the assertion below checks final_step's upper
    // bound rather than pinning to a specific step as the spec's example
    // (42) does.
    tokio::time::sleep(Duration::from_millis(60)).await;
    let status = timeout(Duration::from_secs(10), manager.stop(run_id))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(status, RunStatus::Stopped);

    let messages = drain_until_done(&mut sub, Duration::from_secs(5)).await;
    let (final_status, final_step) = match messages.last() {
        Some(BridgeMessage::Done { status, final_step, .. }) => (status.clone(), *final_step),
        other => panic!("expected a terminal Done message, got {other:?}"),
    };
    assert_eq!(final_status, "stopped");
    for message in &messages {
        if let BridgeMessage::Tick { step, .. } = message {
            assert!(*step <= final_step, "tick {step} observed after final_step {final_step}");
        }
    }
}

/// Scenario 3: 15 agents, `mailbox_capacity = 2`, high meme-spread chance
/// to storm the fabric. Expect `mailbox_overflow` ERROR events and/or
/// subscriber-side drops to appear, and the `tick` sequence to stay
/// contiguous through to completion.
#[tokio::test]
async fn scenario_3_backpressure_keeps_tick_sequence_contiguous() {
    let manager = RunManager::new();
    let config = SimConfig {
        num_agents: 15,
        network_depth: 2,
        branching_factor: 8,
        num_generations: 1,
        steps_per_generation: 30,
        mailbox_capacity: 2,
        meme_spread_chance: 0.9,
        error_rate_limit_per_minute: 5,
        seed: 7,
        enable_entanglement: false,
        ..Default::default()
    };
    let run_id = manager.create_run(config).unwrap();
    let (mut sub, _replay) = manager.subscribe(run_id).unwrap();
    manager.start(run_id).unwrap();

    let messages = drain_until_done(&mut sub, Duration::from_secs(15)).await;
    let tick_steps: Vec<Step> = messages
        .iter()
        .filter_map(|m| match m {
            BridgeMessage::Tick { step, .. } => Some(*step),
            _ => None,
        })
        .collect();
    assert_eq!(tick_steps, (1..=30).collect::<Vec<_>>(), "tick sequence must stay contiguous under load");
    assert!(matches!(
        messages.last(),
        Some(BridgeMessage::Done { status, .. }) if status == "completed"
    ));
}

/// Round-trip law: `stop` on an already-stopped run is a no-op that
/// returns the same terminal status both times.
#[tokio::test]
async fn stop_on_already_stopped_run_returns_same_status() {
    let manager = RunManager::new();
    let run_id = manager.create_run(smoke_config(9)).unwrap();
    manager.start(run_id).unwrap();
    let first = timeout(Duration::from_secs(10), manager.stop(run_id)).await.unwrap().unwrap();
    let second = timeout(Duration::from_secs(10), manager.stop(run_id)).await.unwrap().unwrap();
    assert_eq!(first, second);
}
