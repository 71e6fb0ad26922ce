//! End-to-end scenarios for the coroutine timing driver on the virtual clock.
//!
//! Coroutines simulate busy work by advancing the shared [`VirtualClock`]
//! inside their own steps; the test plays scheduler and advances it between
//! protocol steps to simulate suspended delay. Accumulated runtimes are then
//! exact, so every boundary property is asserted with equality.

#[macro_use]
mod common;

use common::init_test_logging;
use coroutime::clock::VirtualClock;
use coroutime::config::{IdentifierScope, TimingConfig};
use coroutime::coroutine_path;
use coroutime::driver::{time_coroutine, MaybeTimed, Timed};
use coroutime::factory::{from_fn, from_immediate, CoroutineFactory};
use coroutime::name::Receiver;
use coroutime::stats::RecordingSink;
use coroutime::suspend::{Step, Suspendable};
use coroutime::test_utils::{Message, ScriptedCoroutine, ScriptedStep};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn test_config(clock: &Arc<VirtualClock>, sink: &Arc<RecordingSink>) -> TimingConfig {
    TimingConfig::new()
        .with_clock(clock.clone())
        .with_sink(sink.clone())
}

fn scripted_factory(
    clock: &Arc<VirtualClock>,
    script: Vec<ScriptedStep>,
) -> impl CoroutineFactory<Args = (), Coroutine = ScriptedCoroutine> {
    let clock = clock.clone();
    from_fn(move |(): ()| ScriptedCoroutine::new(clock.clone(), script.clone()))
}

#[test]
fn no_suspension_reports_own_busy_time() {
    init_test_logging();
    test_phase!("no_suspension_reports_own_busy_time");
    let clock = Arc::new(VirtualClock::new());
    let sink = RecordingSink::new();

    let timed = time_coroutine(
        scripted_factory(
            &clock,
            vec![ScriptedStep::complete(Duration::from_millis(500), 7)],
        ),
        coroutine_path!("straight_through"),
        test_config(&clock, &sink),
    );

    let mut coroutine = timed.call(());
    assert_eq!(coroutine.resume(0), Ok(Step::Completed(7)));

    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].name, "driver_e2e.straight_through");
    assert_eq!(records[0].runtime, Duration::from_millis(500));
    test_complete!("no_suspension_reports_own_busy_time");
}

#[test]
fn single_suspension_excludes_suspended_delay() {
    init_test_logging();
    test_phase!("single_suspension_excludes_suspended_delay");
    let clock = Arc::new(VirtualClock::new());
    let sink = RecordingSink::new();

    // 0.5s busy, suspend, 0.5s suspended delay, 0.5s busy: reports 1.0s.
    let timed = time_coroutine(
        scripted_factory(
            &clock,
            vec![
                ScriptedStep::suspend(Duration::from_millis(500), 1),
                ScriptedStep::complete(Duration::from_millis(500), 0),
            ],
        ),
        coroutine_path!("sleeper"),
        test_config(&clock, &sink),
    );

    let mut coroutine = timed.call(());
    test_section!("first_resume");
    assert_eq!(coroutine.resume(0), Ok(Step::Suspended(1)));

    test_section!("suspended_delay");
    clock.advance(Duration::from_millis(500));

    test_section!("second_resume");
    assert_eq!(coroutine.resume(0), Ok(Step::Completed(0)));

    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert_with_log!(
        records[0].runtime == Duration::from_secs(1),
        "suspended delay must not be attributed",
        Duration::from_secs(1),
        records[0].runtime
    );
    test_complete!("single_suspension_excludes_suspended_delay");
}

#[test]
fn multisleeper_accumulates_every_interval() {
    init_test_logging();
    test_phase!("multisleeper_accumulates_every_interval");
    let clock = Arc::new(VirtualClock::new());
    let sink = RecordingSink::new();

    let busy = [37u64, 112, 4, 250, 91];
    let mut script: Vec<ScriptedStep> = busy[..busy.len() - 1]
        .iter()
        .enumerate()
        .map(|(i, &ms)| ScriptedStep::suspend(Duration::from_millis(ms), i as u32))
        .collect();
    script.push(ScriptedStep::complete(
        Duration::from_millis(busy[busy.len() - 1]),
        99,
    ));

    let timed = time_coroutine(
        scripted_factory(&clock, script),
        coroutine_path!("multisleeper"),
        test_config(&clock, &sink),
    );

    let mut coroutine = timed.call(());
    for expected_yield in 0..4u32 {
        assert_eq!(coroutine.resume(0), Ok(Step::Suspended(expected_yield)));
        // Arbitrary suspended delay between each interval.
        clock.advance(Duration::from_millis(1000 + u64::from(expected_yield)));
    }
    assert_eq!(coroutine.resume(0), Ok(Step::Completed(99)));

    let total: u64 = busy.iter().sum();
    assert_eq!(sink.records()[0].runtime, Duration::from_millis(total));
    test_complete!("multisleeper_accumulates_every_interval");
}

#[test]
fn layered_coroutines_time_independently() {
    init_test_logging();
    test_phase!("layered_coroutines_time_independently");
    let clock = Arc::new(VirtualClock::new());
    let sink = RecordingSink::new();

    // Outer runs 100ms, suspends on the inner coroutine, then runs 200ms.
    let outer = time_coroutine(
        scripted_factory(
            &clock,
            vec![
                ScriptedStep::suspend(Duration::from_millis(100), 1),
                ScriptedStep::complete(Duration::from_millis(200), 0),
            ],
        ),
        coroutine_path!("outer"),
        test_config(&clock, &sink),
    );
    // Inner runs 400ms while the outer is suspended.
    let inner = time_coroutine(
        scripted_factory(
            &clock,
            vec![ScriptedStep::complete(Duration::from_millis(400), 5)],
        ),
        coroutine_path!("inner"),
        test_config(&clock, &sink),
    );

    let mut outer_coroutine = outer.call(());
    let mut inner_coroutine = inner.call(());

    assert_eq!(outer_coroutine.resume(0), Ok(Step::Suspended(1)));
    let inner_result = inner_coroutine.resume(0);
    assert_eq!(inner_result, Ok(Step::Completed(5)));
    assert_eq!(outer_coroutine.resume(5), Ok(Step::Completed(0)));

    let records = sink.records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].name, "driver_e2e.inner");
    assert_eq!(records[0].runtime, Duration::from_millis(400));
    assert_eq!(records[1].name, "driver_e2e.outer");
    assert_with_log!(
        records[1].runtime == Duration::from_millis(300),
        "outer layer must exclude inner's runtime",
        Duration::from_millis(300),
        records[1].runtime
    );
    test_complete!("layered_coroutines_time_independently");
}

#[test]
fn static_receiver_names_the_method() {
    init_test_logging();
    test_phase!("static_receiver_names_the_method");
    let clock = Arc::new(VirtualClock::new());
    let sink = RecordingSink::new();

    let timed = time_coroutine(
        scripted_factory(&clock, vec![ScriptedStep::complete(Duration::ZERO, 0)]),
        coroutine_path!("fetch"),
        test_config(&clock, &sink),
    )
    .with_receiver(Receiver::Static("Connection"));

    let mut coroutine = timed.call(());
    let _ = coroutine.resume(0);

    assert_eq!(sink.records()[0].name, "driver_e2e.Connection.fetch");
    test_complete!("static_receiver_names_the_method");
}

#[test]
fn aggregate_scope_shares_one_identifier() {
    init_test_logging();
    test_phase!("aggregate_scope_shares_one_identifier");
    let clock = Arc::new(VirtualClock::new());
    let sink = RecordingSink::new();
    let hook_calls = Arc::new(AtomicUsize::new(0));

    let counter = hook_calls.clone();
    let timed = time_coroutine(
        scripted_factory(&clock, vec![ScriptedStep::complete(Duration::ZERO, 0)]),
        coroutine_path!("handle"),
        test_config(&clock, &sink),
    )
    .with_receiver(Receiver::FirstCall(Box::new(move |_args: &()| {
        counter.fetch_add(1, Ordering::SeqCst);
        Some("Session".to_string())
    })));

    for _ in 0..3 {
        let mut coroutine = timed.call(());
        let _ = coroutine.resume(0);
    }

    let records = sink.records();
    assert_eq!(records.len(), 3);
    for record in &records {
        assert_eq!(record.name, "driver_e2e.Session.handle");
    }
    // The identifier is derived once and shared; the hook must not re-run.
    assert_with_log!(
        hook_calls.load(Ordering::SeqCst) == 1,
        "receiver hook runs once under aggregate scope",
        1,
        hook_calls.load(Ordering::SeqCst)
    );
    test_complete!("aggregate_scope_shares_one_identifier");
}

#[test]
fn per_invocation_scope_rederives_each_call() {
    init_test_logging();
    test_phase!("per_invocation_scope_rederives_each_call");
    let clock = Arc::new(VirtualClock::new());
    let sink = RecordingSink::new();
    let hook_calls = Arc::new(AtomicUsize::new(0));

    let counter = hook_calls.clone();
    let timed = time_coroutine(
        scripted_factory(&clock, vec![ScriptedStep::complete(Duration::ZERO, 0)]),
        coroutine_path!("handle"),
        test_config(&clock, &sink).with_scope(IdentifierScope::PerInvocation),
    )
    .with_receiver(Receiver::FirstCall(Box::new(move |_args: &()| {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        Some(format!("Shard{n}"))
    })));

    for _ in 0..2 {
        let mut coroutine = timed.call(());
        let _ = coroutine.resume(0);
    }

    let records = sink.records();
    assert_eq!(records[0].name, "driver_e2e.Shard0.handle");
    assert_eq!(records[1].name, "driver_e2e.Shard1.handle");
    assert_eq!(hook_calls.load(Ordering::SeqCst), 2);
    test_complete!("per_invocation_scope_rederives_each_call");
}

#[test]
fn error_before_suspension_still_reports() {
    init_test_logging();
    test_phase!("error_before_suspension_still_reports");
    let clock = Arc::new(VirtualClock::new());
    let sink = RecordingSink::new();

    let timed = time_coroutine(
        scripted_factory(
            &clock,
            vec![ScriptedStep::fail(Duration::from_millis(25), "boom")],
        ),
        coroutine_path!("early_failure"),
        test_config(&clock, &sink),
    );

    let mut coroutine = timed.call(());
    assert_eq!(coroutine.resume(0), Err("boom".to_string()));

    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].runtime, Duration::from_millis(25));
    test_complete!("error_before_suspension_still_reports");
}

#[test]
fn injected_error_relays_exact_value_and_times_handling() {
    init_test_logging();
    test_phase!("injected_error_relays_exact_value_and_times_handling");
    let clock = Arc::new(VirtualClock::new());
    let sink = RecordingSink::new();

    let script = vec![
        ScriptedStep::suspend(Duration::from_millis(100), 1),
        // Cleanup in response to the injected error, then re-raise.
        ScriptedStep::fail(Duration::from_millis(150), "cancelled"),
    ];
    let coroutine_clock = clock.clone();
    let factory = from_fn(move |(): ()| {
        ScriptedCoroutine::new(coroutine_clock.clone(), script.clone())
    });
    let timed = time_coroutine(
        factory,
        coroutine_path!("cancellable"),
        test_config(&clock, &sink),
    );

    let MaybeTimed::Timed(mut coroutine) = timed.call(()) else {
        panic!("suspendable factory must be instrumented");
    };
    assert_eq!(coroutine.resume(0), Ok(Step::Suspended(1)));

    clock.advance(Duration::from_millis(700)); // scheduler decides to cancel
    assert_eq!(
        coroutine.inject("cancelled".to_string()),
        Err("cancelled".to_string())
    );

    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert_with_log!(
        records[0].runtime == Duration::from_millis(250),
        "handling time is attributed, scheduler delay is not",
        Duration::from_millis(250),
        records[0].runtime
    );
    test_complete!("injected_error_relays_exact_value_and_times_handling");
}

#[test]
fn injected_error_recovery_surfaces_followup_steps() {
    init_test_logging();
    test_phase!("injected_error_recovery_surfaces_followup_steps");
    let clock = Arc::new(VirtualClock::new());
    let sink = RecordingSink::new();

    let coroutine_clock = clock.clone();
    let factory = from_fn(move |(): ()| {
        ScriptedCoroutine::new(
            coroutine_clock.clone(),
            vec![
                ScriptedStep::suspend(Duration::from_millis(10), 1),
                // Swallows the injected error and completes anyway.
                ScriptedStep::complete(Duration::from_millis(20), 42),
            ],
        )
    });
    let timed = time_coroutine(
        factory,
        coroutine_path!("recovering"),
        test_config(&clock, &sink),
    );

    let mut coroutine = timed.call(());
    assert_eq!(coroutine.resume(0), Ok(Step::Suspended(1)));
    assert_eq!(
        coroutine.inject("transient".to_string()),
        Ok(Step::Completed(42))
    );
    assert_eq!(sink.records()[0].runtime, Duration::from_millis(30));
    test_complete!("injected_error_recovery_surfaces_followup_steps");
}

#[test]
fn inject_before_first_resume_relays_in() {
    init_test_logging();
    test_phase!("inject_before_first_resume_relays_in");
    let clock = Arc::new(VirtualClock::new());
    let sink = RecordingSink::new();

    let coroutine = ScriptedCoroutine::new(
        clock.clone(),
        vec![ScriptedStep::fail(Duration::from_millis(5), "shutdown")],
    );
    let messages = coroutine.messages();
    let cell = parking_lot::Mutex::new(Some(coroutine));
    let timed = time_coroutine(
        from_fn(move |(): ()| cell.lock().take().expect("single invocation")),
        coroutine_path!("never_started"),
        test_config(&clock, &sink),
    );

    let mut driven = timed.call(());
    assert_eq!(
        driven.inject("shutdown".to_string()),
        Err("shutdown".to_string())
    );
    assert_eq!(
        *messages.lock(),
        vec![Message::Injected("shutdown".to_string())]
    );
    assert_eq!(sink.records()[0].runtime, Duration::from_millis(5));
    test_complete!("inject_before_first_resume_relays_in");
}

#[test]
fn non_coroutine_passes_through_unwrapped() {
    init_test_logging();
    test_phase!("non_coroutine_passes_through_unwrapped");
    let clock = Arc::new(VirtualClock::new());
    let sink = RecordingSink::new();

    let timed = time_coroutine(
        from_immediate::<_, _, _, String>(|x: u32| x * 2),
        coroutine_path!("plain_function"),
        test_config(&clock, &sink),
    );
    assert!(timed.is_passthrough());
    assert!(matches!(&timed, Timed::Passthrough(_)));

    // Driving the pass-through produces the value directly; the stats sink is
    // never invoked.
    let mut coroutine = timed.call(21);
    assert_eq!(coroutine.resume(()), Ok(Step::Completed(42)));
    assert!(sink.is_empty());

    // The original factory comes back out unmodified.
    let original = timed.into_inner();
    let mut direct = original.call(4);
    assert_eq!(direct.resume(()), Ok(Step::Completed(8)));
    test_complete!("non_coroutine_passes_through_unwrapped");
}

#[test]
fn concurrent_invocations_share_cached_identifier() {
    init_test_logging();
    test_phase!("concurrent_invocations_share_cached_identifier");
    let clock = Arc::new(VirtualClock::new());
    let sink = RecordingSink::new();

    let timed = Arc::new(time_coroutine(
        scripted_factory(
            &clock,
            vec![
                ScriptedStep::suspend(Duration::from_millis(1), 1),
                ScriptedStep::complete(Duration::from_millis(1), 0),
            ],
        ),
        coroutine_path!("shared"),
        test_config(&clock, &sink),
    ));

    std::thread::scope(|scope| {
        for _ in 0..4 {
            let timed = timed.clone();
            scope.spawn(move || {
                let mut coroutine = timed.call(());
                assert_eq!(coroutine.resume(0), Ok(Step::Suspended(1)));
                assert_eq!(coroutine.resume(0), Ok(Step::Completed(0)));
            });
        }
    });

    let records = sink.records();
    assert_eq!(records.len(), 4);
    for record in &records {
        assert_eq!(record.name, "driver_e2e.shared");
    }
    test_complete!("concurrent_invocations_share_cached_identifier");
}

#[test]
fn relayed_values_reach_the_coroutine_unchanged() {
    init_test_logging();
    test_phase!("relayed_values_reach_the_coroutine_unchanged");
    let clock = Arc::new(VirtualClock::new());
    let sink = RecordingSink::new();

    let coroutine = ScriptedCoroutine::new(
        clock.clone(),
        vec![
            ScriptedStep::suspend(Duration::ZERO, 10),
            ScriptedStep::suspend(Duration::ZERO, 20),
            ScriptedStep::complete(Duration::ZERO, 30),
        ],
    );
    let messages = coroutine.messages();
    let cell = parking_lot::Mutex::new(Some(coroutine));
    let timed = time_coroutine(
        from_fn(move |(): ()| cell.lock().take().expect("single invocation")),
        coroutine_path!("relay"),
        test_config(&clock, &sink),
    );

    let mut driven = timed.call(());
    assert_eq!(driven.resume(111), Ok(Step::Suspended(10)));
    assert_eq!(driven.resume(222), Ok(Step::Suspended(20)));
    assert_eq!(driven.resume(333), Ok(Step::Completed(30)));

    assert_eq!(
        *messages.lock(),
        vec![
            Message::Resumed(111),
            Message::Resumed(222),
            Message::Resumed(333),
        ]
    );
    test_complete!("relayed_values_reach_the_coroutine_unchanged");
}
