#![allow(clippy::disallowed_methods)]

mod common;

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use queue_core::{EntryFields, JobEvent, JobStatus, stream_key};
use ractor::ActorStatus;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use actors::{SimulatedHandler, spawn_relay};

/// Events after the leading `initial`, with its snapshot checked.
fn after_initial(events: &[JobEvent]) -> Result<&[JobEvent], Box<dyn Error>> {
    match events.split_first() {
        Some((JobEvent::Initial { .. }, rest)) => Ok(rest),
        _ => Err(format!("stream did not start with initial: {:?}", events).into()),
    }
}

#[tokio::test]
async fn live_job_streams_initial_then_log_until_completed() -> Result<(), Box<dyn Error>> {
    let store = common::memory_store().await?;
    let log = common::memory_log();
    let ctx = common::context(
        store.clone(),
        log.clone(),
        Arc::new(SimulatedHandler::new(3, Duration::from_millis(5))),
    );
    let job = store.create_job(json!({ "x": 1 })).await?;

    let (stream, _relay) = spawn_relay(job.clone(), log, common::fast_relay_config(), None).await?;
    assert_eq!(stream.job_id(), job.id);

    let worker = tokio::spawn(async move { ctx.process_next(&CancellationToken::new()).await });
    let events = common::collect(stream).await?;
    worker.await??;

    assert!(matches!(&events[0], JobEvent::Initial { job: snapshot, .. } if snapshot.status == JobStatus::Pending));
    assert_eq!(
        common::kinds(&events),
        ["initial", "started", "progress", "progress", "progress", "completed"]
    );
    Ok(())
}

#[tokio::test]
async fn failed_live_job_ends_with_error() -> Result<(), Box<dyn Error>> {
    let store = common::memory_store().await?;
    let log = common::memory_log();
    let ctx = common::context(store.clone(), log.clone(), common::failing_handler(4, 3));
    let job = store.create_job(json!("payload")).await?;

    let (stream, _relay) = spawn_relay(job, log, common::fast_relay_config(), None).await?;
    let worker = tokio::spawn(async move { ctx.process_next(&CancellationToken::new()).await });
    let events = common::collect(stream).await?;
    worker.await??;

    assert_eq!(
        common::kinds(&events),
        ["initial", "started", "progress", "progress", "error"]
    );
    Ok(())
}

#[tokio::test]
async fn finished_job_is_replayed_identically() -> Result<(), Box<dyn Error>> {
    let store = common::memory_store().await?;
    let log = common::memory_log();
    let ctx = common::context(
        store.clone(),
        log.clone(),
        Arc::new(SimulatedHandler::new(4, Duration::ZERO)),
    );
    let job = store.create_job(json!({ "x": 1 })).await?;
    ctx.process_next(&CancellationToken::new()).await?;
    let done = store.get_job(job.id).await.ok_or("job missing")?;

    let mut replays = Vec::new();
    for _ in 0..2 {
        let (stream, _relay) =
            spawn_relay(done.clone(), log.clone(), common::fast_relay_config(), None).await?;
        let events = common::collect(stream).await?;
        replays.push(after_initial(&events)?.to_vec());
    }

    assert_eq!(
        common::kinds(&replays[0]),
        ["started", "progress", "progress", "progress", "progress", "completed"]
    );
    assert_eq!(replays[0], replays[1]);

    assert!(matches!(
        replays[0].first(),
        Some(JobEvent::Started { timestamp, .. }) if *timestamp == done.created.timestamp_millis()
    ));
    assert!(matches!(
        replays[0].last(),
        Some(JobEvent::Completed { processing_time, .. }) if *processing_time == done.elapsed_ms()
    ));
    Ok(())
}

#[tokio::test]
async fn failed_job_replays_its_error() -> Result<(), Box<dyn Error>> {
    let store = common::memory_store().await?;
    let log = common::memory_log();
    let ctx = common::context(store.clone(), log.clone(), common::failing_handler(2, 1));
    let job = store.create_job(json!("payload")).await?;
    ctx.process_next(&CancellationToken::new()).await?;
    let failed = store.get_job(job.id).await.ok_or("job missing")?;

    let (stream, _relay) = spawn_relay(failed, log, common::fast_relay_config(), None).await?;
    let events = common::collect(stream).await?;

    assert_eq!(common::kinds(&events), ["initial", "started", "error"]);
    Ok(())
}

#[tokio::test]
async fn concurrent_observers_see_the_same_events() -> Result<(), Box<dyn Error>> {
    let store = common::memory_store().await?;
    let log = common::memory_log();
    let ctx = common::context(
        store.clone(),
        log.clone(),
        Arc::new(SimulatedHandler::new(5, Duration::from_millis(5))),
    );
    let job = store.create_job(json!({ "x": 1 })).await?;

    let (first, _a) = spawn_relay(job.clone(), log.clone(), common::fast_relay_config(), None).await?;
    let (second, _b) = spawn_relay(job.clone(), log.clone(), common::fast_relay_config(), None).await?;

    let worker = tokio::spawn(async move { ctx.process_next(&CancellationToken::new()).await });
    let (first, second) = tokio::join!(common::collect(first), common::collect(second));
    worker.await??;

    let first = first?;
    let second = second?;
    assert_eq!(after_initial(&first)?, after_initial(&second)?);
    assert_eq!(after_initial(&first)?.len(), 7);
    Ok(())
}

#[tokio::test]
async fn undecodable_entries_are_skipped() -> Result<(), Box<dyn Error>> {
    let store = common::memory_store().await?;
    let log = common::memory_log();
    let job = store.create_job(json!("payload")).await?;
    let key = stream_key(job.id);

    let mut junk = EntryFields::new();
    junk.insert("type".to_string(), "progress".to_string());
    junk.insert("step".to_string(), "not a number".to_string());
    log.append(&key, junk).await?;

    let completed = JobEvent::Completed {
        job_id: job.id,
        timestamp: 1,
        processing_time: 2,
        message: queue_core::COMPLETED_MESSAGE.to_string(),
    };
    log.append(&key, completed.to_fields()?).await?;

    let (stream, _relay) = spawn_relay(job, log, common::fast_relay_config(), None).await?;
    let events = common::collect(stream).await?;

    assert_eq!(after_initial(&events)?, &[completed]);
    Ok(())
}

#[tokio::test]
async fn nothing_follows_the_first_terminal_entry() -> Result<(), Box<dyn Error>> {
    let store = common::memory_store().await?;
    let log = common::memory_log();
    let job = store.create_job(json!("payload")).await?;
    let key = stream_key(job.id);

    let error = JobEvent::Error {
        job_id: job.id,
        timestamp: 1,
        error: "first".to_string(),
    };
    let late = JobEvent::Started {
        job_id: job.id,
        timestamp: 2,
        message: queue_core::STARTED_MESSAGE.to_string(),
    };
    log.append(&key, error.to_fields()?).await?;
    log.append(&key, late.to_fields()?).await?;

    let (stream, _relay) = spawn_relay(job, log, common::fast_relay_config(), None).await?;
    let events = common::collect(stream).await?;

    assert_eq!(after_initial(&events)?, &[error]);
    Ok(())
}

#[tokio::test]
async fn zero_cadence_and_batch_still_reach_completion() -> Result<(), Box<dyn Error>> {
    let store = common::memory_store().await?;
    let log = common::memory_log();
    let ctx = common::context(
        store.clone(),
        log.clone(),
        Arc::new(SimulatedHandler::new(2, Duration::from_millis(2))),
    );
    let job = store.create_job(json!({ "x": 1 })).await?;

    let mut config = common::fast_relay_config();
    config.poll_interval = Duration::ZERO;
    config.batch_size = 0;

    let (stream, _relay) = spawn_relay(job, log, config, None).await?;
    let worker = tokio::spawn(async move { ctx.process_next(&CancellationToken::new()).await });
    let events = common::collect(stream).await?;
    worker.await??;

    assert_eq!(
        common::kinds(&events),
        ["initial", "started", "progress", "progress", "completed"]
    );
    Ok(())
}

#[tokio::test]
async fn dropping_the_stream_stops_the_relay() -> Result<(), Box<dyn Error>> {
    let store = common::memory_store().await?;
    let job = store.create_job(json!("never processed")).await?;

    let (mut stream, relay) =
        spawn_relay(job, common::memory_log(), common::fast_relay_config(), None).await?;
    assert!(matches!(stream.recv().await, Some(JobEvent::Initial { .. })));
    drop(stream);

    tokio::time::timeout(common::TEST_TIMEOUT, async {
        while relay.get_status() != ActorStatus::Stopped {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await?;
    Ok(())
}
