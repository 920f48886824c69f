#![allow(clippy::disallowed_methods)]

mod common;

use std::error::Error;
use std::time::Duration;

use axum::http::StatusCode;
use serde_json::Value;

use api::JobRuntime;

async fn wait_for_status(
    app: &axum::Router,
    id: &str,
    status: &str,
) -> Result<Value, Box<dyn Error>> {
    let uri = format!("/job/{}", id);
    let job = tokio::time::timeout(common::TEST_TIMEOUT, async {
        loop {
            if let Ok((StatusCode::OK, body)) = common::get(app, &uri).await
                && let Ok(job) = common::json(&body)
                && job["status"] == status
            {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await?;
    Ok(job)
}

#[tokio::test]
async fn health_check() -> Result<(), Box<dyn Error>> {
    let (app, runtime) = common::start_app().await?;

    let (status, body) = common::get(&app, "/health").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(common::json(&body)?["status"], "ok");

    runtime.shutdown(JobRuntime::SHUTDOWN_TIMEOUT).await;
    Ok(())
}

#[tokio::test]
async fn create_job_returns_the_pending_job() -> Result<(), Box<dyn Error>> {
    let (app, runtime) = common::start_app().await?;

    let (status, body) = common::post_json(&app, "/job", r#"{"data":{"file":"a.csv"}}"#).await?;
    assert_eq!(status, StatusCode::CREATED);

    let job = common::json(&body)?;
    assert_eq!(job["status"], "pending");
    assert_eq!(job["data"]["file"], "a.csv");
    assert_eq!(job["created"], job["updated"]);
    assert!(job["id"].as_str().is_some_and(|id| !id.is_empty()));
    assert!(job.get("output").is_none());

    runtime.shutdown(JobRuntime::SHUTDOWN_TIMEOUT).await;
    Ok(())
}

#[tokio::test]
async fn missing_or_empty_data_is_rejected() -> Result<(), Box<dyn Error>> {
    let (app, runtime) = common::start_app().await?;

    for body in [
        "{}",
        r#"{"data":null}"#,
        r#"{"data":""}"#,
        r#"{"data":{}}"#,
        r#"{"data":[]}"#,
        "not json",
    ] {
        let (status, response) = common::post_json(&app, "/job", body).await?;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body {}", body);
        assert_eq!(common::json(&response)?["error"], "Job data is required");
    }

    let (status, _) = common::post_json(&app, "/job", r#"{"data":0}"#).await?;
    assert_eq!(status, StatusCode::CREATED);

    runtime.shutdown(JobRuntime::SHUTDOWN_TIMEOUT).await;
    Ok(())
}

#[tokio::test]
async fn unknown_jobs_are_not_found() -> Result<(), Box<dyn Error>> {
    let (app, runtime) = common::start_app().await?;
    let unknown = api::JobId::new().to_string();

    for uri in [
        format!("/job/{}", unknown),
        "/job/not-an-id".to_string(),
        format!("/job/{}/stream", unknown),
        "/job/not-an-id/stream".to_string(),
    ] {
        let (status, body) = common::get(&app, &uri).await?;
        assert_eq!(status, StatusCode::NOT_FOUND, "uri {}", uri);
        assert_eq!(common::json(&body)?["error"], "Job not found");
    }

    runtime.shutdown(JobRuntime::SHUTDOWN_TIMEOUT).await;
    Ok(())
}

#[tokio::test]
async fn submitted_job_is_processed() -> Result<(), Box<dyn Error>> {
    let (app, runtime) = common::start_app().await?;

    let (_, body) = common::post_json(&app, "/job", r#"{"data":{"x":1}}"#).await?;
    let id = common::json(&body)?["id"].as_str().ok_or("no id")?.to_string();

    let done = wait_for_status(&app, &id, "succeeded").await?;
    let output = done["output"].as_array().ok_or("no output")?;
    assert_eq!(output.len(), 3);
    assert_eq!(output[0]["step"], 1);
    assert!(output[0]["processingTime"].is_number());

    runtime.shutdown(JobRuntime::SHUTDOWN_TIMEOUT).await;
    Ok(())
}

#[tokio::test]
async fn stream_sends_every_event_then_ends() -> Result<(), Box<dyn Error>> {
    let (app, runtime) = common::start_app().await?;

    let (_, body) = common::post_json(&app, "/job", r#"{"data":"payload"}"#).await?;
    let id = common::json(&body)?["id"].as_str().ok_or("no id")?.to_string();

    let (status, body) = common::get(&app, &format!("/job/{}/stream", id)).await?;
    assert_eq!(status, StatusCode::OK);

    let events = common::sse_events(&body)?;
    assert_eq!(
        common::event_types(&events),
        ["initial", "started", "progress", "progress", "progress", "completed"]
    );
    assert!(events.iter().all(|e| e["jobId"] == id.as_str()));
    assert_eq!(events[0]["job"]["id"], id.as_str());

    runtime.shutdown(JobRuntime::SHUTDOWN_TIMEOUT).await;
    Ok(())
}

#[tokio::test]
async fn finished_job_stream_is_replayed() -> Result<(), Box<dyn Error>> {
    let (app, runtime) = common::start_app().await?;

    let (_, body) = common::post_json(&app, "/job", r#"{"data":[1,2,3]}"#).await?;
    let id = common::json(&body)?["id"].as_str().ok_or("no id")?.to_string();
    wait_for_status(&app, &id, "succeeded").await?;

    let uri = format!("/job/{}/stream", id);
    let (_, first) = common::get(&app, &uri).await?;
    let (_, second) = common::get(&app, &uri).await?;
    let first = common::sse_events(&first)?;
    let second = common::sse_events(&second)?;

    assert_eq!(
        common::event_types(&first),
        ["initial", "started", "progress", "progress", "progress", "completed"]
    );
    assert_eq!(first[1..], second[1..]);

    runtime.shutdown(JobRuntime::SHUTDOWN_TIMEOUT).await;
    Ok(())
}
