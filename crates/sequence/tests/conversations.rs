#![allow(clippy::unwrap_used, clippy::expect_used)]
//! End-to-end conversation scenarios driven through a real pipeline.

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

use {
    rstest::rstest,
    serde_json::{Value, json},
};

use {
    confab_pipeline::{Context, EventKind, Middleware, Next, Pipeline, from_fn},
    confab_sequence::{
        Sequence, interruptible, interuptable, on_connect, uninterruptible, uninteruptable,
    },
};

/// Chain tail counting the events that fell through every sequence adapter.
fn tail(counter: &Arc<AtomicUsize>) -> impl Middleware + use<> {
    let counter = Arc::clone(counter);
    from_fn(move |_ctx: Context, _next: Next| {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    })
}

async fn send(pipeline: &Pipeline, ctx: &Context, payload: Value) {
    pipeline
        .dispatch(ctx, EventKind::Message, payload)
        .await
        .unwrap();
}

#[tokio::test]
async fn match_then_assert_consumes_exactly_one_message() {
    let fell_through = Arc::new(AtomicUsize::new(0));
    let mw = interruptible(|_ctx: Context, seq: Sequence| async move {
        seq.match_message(|m| m["kind"] == "ping").await;
        seq.assert(|| true).await;
        anyhow::Ok(())
    });
    let pipeline = Pipeline::new().layer(mw).layer(tail(&fell_through));
    let ctx = Context::new();

    send(&pipeline, &ctx, json!({"kind": "ping"})).await;
    assert_eq!(fell_through.load(Ordering::SeqCst), 0);

    // The conversation is over; an identical later message flows through.
    send(&pipeline, &ctx, json!({"kind": "ping"})).await;
    assert_eq!(fell_through.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn interruptible_sequence_skips_unrelated_messages() {
    let fell_through = Arc::new(AtomicUsize::new(0));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&seen);
    let mw = interruptible(move |_ctx: Context, seq: Sequence| {
        let log = Arc::clone(&log);
        async move {
            let a = seq.match_message(|m| m["kind"] == "A").await;
            let b = seq.match_message(|m| m["kind"] == "B").await;
            log.lock().unwrap().extend([a, b]);
            Ok(())
        }
    });
    let pipeline = Pipeline::new().layer(mw).layer(tail(&fell_through));
    let ctx = Context::new();

    // decline, consume, decline, consume.
    send(&pipeline, &ctx, json!({"kind": "C"})).await;
    assert_eq!(fell_through.load(Ordering::SeqCst), 1);
    send(&pipeline, &ctx, json!({"kind": "A"})).await;
    assert_eq!(fell_through.load(Ordering::SeqCst), 1);
    send(&pipeline, &ctx, json!({"kind": "C"})).await;
    assert_eq!(fell_through.load(Ordering::SeqCst), 2);
    send(&pipeline, &ctx, json!({"kind": "B"})).await;
    assert_eq!(fell_through.load(Ordering::SeqCst), 2);

    let seen = seen.lock().unwrap();
    assert_eq!(*seen, vec![json!({"kind": "A"}), json!({"kind": "B"})]);
}

#[tokio::test]
async fn uninterruptible_sequence_is_abandoned_by_a_mismatch() {
    let fell_through = Arc::new(AtomicUsize::new(0));
    let resumed = Arc::new(AtomicUsize::new(0));
    let hits = Arc::clone(&resumed);
    let mw = uninterruptible(move |_ctx: Context, seq: Sequence| {
        let hits = Arc::clone(&hits);
        async move {
            seq.match_message(|m| m["kind"] == "A").await;
            hits.fetch_add(1, Ordering::SeqCst);
            seq.match_message(|m| m["kind"] == "B").await;
            hits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    });
    let pipeline = Pipeline::new().layer(mw).layer(tail(&fell_through));
    let ctx = Context::new();

    // Wrong-order traffic abandons the conversation without consuming.
    send(&pipeline, &ctx, json!({"kind": "C"})).await;
    send(&pipeline, &ctx, json!({"kind": "B"})).await;
    assert_eq!(fell_through.load(Ordering::SeqCst), 2);

    // A later correct message must NOT resume the routine.
    send(&pipeline, &ctx, json!({"kind": "A"})).await;
    assert_eq!(fell_through.load(Ordering::SeqCst), 3);
    assert_eq!(resumed.load(Ordering::SeqCst), 0);
}

#[rstest]
#[case::null(json!(null))]
#[case::number(json!(42))]
#[case::text(json!("plain text"))]
#[case::structured(json!({"deeply": ["nested", {"payload": true}]}))]
#[tokio::test]
async fn get_message_matches_any_payload(#[case] payload: Value) {
    let fell_through = Arc::new(AtomicUsize::new(0));
    let seen = Arc::new(Mutex::new(None));
    let slot = Arc::clone(&seen);
    let mw = interruptible(move |_ctx: Context, seq: Sequence| {
        let slot = Arc::clone(&slot);
        async move {
            let m = seq.message().await;
            *slot.lock().unwrap() = Some(m);
            Ok(())
        }
    });
    let pipeline = Pipeline::new().layer(mw).layer(tail(&fell_through));
    let ctx = Context::new();

    send(&pipeline, &ctx, payload.clone()).await;
    assert_eq!(fell_through.load(Ordering::SeqCst), 0);
    assert_eq!(seen.lock().unwrap().take(), Some(payload));
}

#[tokio::test]
async fn operations_and_assertions_need_no_extra_message() {
    let fell_through = Arc::new(AtomicUsize::new(0));
    let mw = interruptible(|_ctx: Context, seq: Sequence| async move {
        seq.match_message(|m| m == &json!("fetch")).await;
        let fetched = seq.perform(|| async { Ok(json!(5)) }).await;
        let fetched = fetched.as_i64().unwrap_or(0);
        seq.assert(move || fetched > 0).await;
        anyhow::Ok(())
    });
    let pipeline = Pipeline::new().layer(mw).layer(tail(&fell_through));
    let ctx = Context::new();

    // One message drives match, operation and assertion to completion.
    send(&pipeline, &ctx, json!("fetch")).await;
    assert_eq!(fell_through.load(Ordering::SeqCst), 0);

    send(&pipeline, &ctx, json!("fetch")).await;
    assert_eq!(fell_through.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn on_connect_sequences_span_the_connection_lifecycle() {
    let fell_through = Arc::new(AtomicUsize::new(0));
    let greeted = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&greeted);
    let mw = on_connect(move |_ctx: Context, seq: Sequence| {
        let log = Arc::clone(&log);
        async move {
            let name = seq.message().await;
            log.lock().unwrap().push(name);
            Ok(())
        }
    });
    let pipeline = Pipeline::new().layer(mw).layer(tail(&fell_through));
    let ctx = Context::new();

    // Before the open event the routine is not advanced at all.
    send(&pipeline, &ctx, json!("too early")).await;
    assert_eq!(fell_through.load(Ordering::SeqCst), 1);
    assert!(greeted.lock().unwrap().is_empty());

    pipeline
        .dispatch(&ctx, EventKind::Open, Value::Null)
        .await
        .unwrap();
    send(&pipeline, &ctx, json!("alice")).await;
    assert_eq!(*greeted.lock().unwrap(), vec![json!("alice")]);

    // Completed and re-armed: plain messages pass through until the next
    // open event starts a fresh instance.
    send(&pipeline, &ctx, json!("bob")).await;
    assert_eq!(fell_through.load(Ordering::SeqCst), 2);

    pipeline
        .dispatch(&ctx, EventKind::Open, Value::Null)
        .await
        .unwrap();
    send(&pipeline, &ctx, json!("carol")).await;
    assert_eq!(
        *greeted.lock().unwrap(),
        vec![json!("alice"), json!("carol")]
    );
}

#[tokio::test]
async fn sequences_compose_down_the_chain() {
    let fell_through = Arc::new(AtomicUsize::new(0));
    let alpha = interruptible(|_ctx: Context, seq: Sequence| async move {
        seq.match_message(|m| m == &json!("alpha")).await;
        anyhow::Ok(())
    });
    let beta = interruptible(|_ctx: Context, seq: Sequence| async move {
        seq.match_message(|m| m == &json!("beta")).await;
        anyhow::Ok(())
    });
    let pipeline = Pipeline::new()
        .layer(alpha)
        .layer(beta)
        .layer(tail(&fell_through));
    let ctx = Context::new();

    // The first adapter declines "beta"; the second consumes it.
    send(&pipeline, &ctx, json!("beta")).await;
    assert_eq!(fell_through.load(Ordering::SeqCst), 0);
    send(&pipeline, &ctx, json!("alpha")).await;
    assert_eq!(fell_through.load(Ordering::SeqCst), 0);
    send(&pipeline, &ctx, json!("gamma")).await;
    assert_eq!(fell_through.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn misspelled_aliases_keep_their_policies() {
    let fell_through = Arc::new(AtomicUsize::new(0));
    let done = Arc::new(AtomicUsize::new(0));
    let hits = Arc::clone(&done);
    let mw = interuptable(move |_ctx: Context, seq: Sequence| {
        let hits = Arc::clone(&hits);
        async move {
            seq.match_message(|m| m == &json!("yes")).await;
            hits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    });
    let pipeline = Pipeline::new().layer(mw).layer(tail(&fell_through));
    let ctx = Context::new();

    // Interruptible: a mismatch leaves the conversation alive.
    send(&pipeline, &ctx, json!("no")).await;
    send(&pipeline, &ctx, json!("yes")).await;
    assert_eq!(done.load(Ordering::SeqCst), 1);

    let strict_done = Arc::new(AtomicUsize::new(0));
    let hits = Arc::clone(&strict_done);
    let mw = uninteruptable(move |_ctx: Context, seq: Sequence| {
        let hits = Arc::clone(&hits);
        async move {
            seq.match_message(|m| m == &json!("yes")).await;
            hits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    });
    let pipeline = Pipeline::new().layer(mw).layer(tail(&fell_through));
    let ctx = Context::new();

    // Non-interruptible: the mismatch abandons it.
    send(&pipeline, &ctx, json!("no")).await;
    send(&pipeline, &ctx, json!("yes")).await;
    assert_eq!(strict_done.load(Ordering::SeqCst), 0);
}
