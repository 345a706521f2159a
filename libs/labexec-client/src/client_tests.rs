/// Integration tests for the submit-then-poll engine
///
/// These tests run the client against an in-process scripted executor and check:
/// 1. Happy path returns the completed result after queued/running polls
/// 2. The overall timeout bounds the whole call, not each poll
/// 3. Cancellation wakes a pending sleep or request immediately
/// 4. Protocol violations stop polling at once
/// 5. Transport failures are classified uniformly

#[cfg(test)]
mod polling_tests {
    use crate::client::{ExecutorClient, JobEvent, JobPhase, PollOptions};
    use crate::error::{ErrorKind, ExecutorError};
    use crate::test_support::*;
    use axum::http::StatusCode;
    use labexec_common::config::ExecutorConfig;
    use labexec_common::types::{ExecutionRequest, ExecutionStatus, JobStatus, TestCase};
    use serde_json::json;
    use std::time::{Duration, Instant};
    use tokio_util::sync::CancellationToken;

    fn doubling_request() -> ExecutionRequest {
        ExecutionRequest::new(
            "python",
            "print(int(input())*2)",
            vec![
                TestCase::new(1, "2").expect("4"),
                TestCase::new(2, "5").expect("10"),
            ],
        )
    }

    fn fast_options() -> PollOptions {
        PollOptions::default()
            .with_poll_interval(Duration::from_millis(20))
            .with_timeout(Duration::from_secs(5))
    }

    fn client_for(fake: &FakeExecutor) -> ExecutorClient {
        ExecutorClient::new(fake.config()).unwrap()
    }

    /// Test: queued → running → completed returns the embedded result
    #[tokio::test]
    async fn test_python_job_completes() {
        let fake = FakeExecutor::start(
            Script::new()
                .submit(Reply::ok(json!({"id": 17})))
                .statuses([
                    queued(),
                    running(),
                    completed(python_result(vec![
                        test_result(1, "4\n", true, 12),
                        test_result(2, "10\n", true, 15),
                    ])),
                ]),
        )
        .await;
        let client = client_for(&fake);

        let result = client
            .execute_and_wait(&doubling_request(), fast_options())
            .await
            .unwrap();

        assert_eq!(result.status, Some(ExecutionStatus::Success));
        assert_eq!(result.results.len(), 2);
        assert_eq!(result.results[0].stdout, "4\n");
        assert_eq!(result.total_duration_ms, 27);
        assert_eq!(fake.status_hits(), 3);
        assert!(fake.polled_ids().iter().all(|id| id == "17"));

        // Wire names of the submitted body
        let submitted = fake.submissions();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0]["language"], "python");
        assert_eq!(submitted[0]["code"], "print(int(input())*2)");
        assert_eq!(submitted[0]["testcases"][1]["expected"], "10");
    }

    /// Test: observer sees the job id, then every non-terminal poll
    #[tokio::test]
    async fn test_observer_sees_progress() {
        let fake = FakeExecutor::start(Script::new().statuses([
            queued(),
            running(),
            completed(python_result(Vec::new())),
        ]))
        .await;
        let client = client_for(&fake);

        let mut events = Vec::new();
        client
            .execute_with_observer(&doubling_request(), fast_options(), |event| {
                events.push(*event)
            })
            .await
            .unwrap();

        assert_eq!(
            events,
            vec![
                JobEvent::Submitted(labexec_common::types::JobId(1)),
                JobEvent::Polled {
                    attempt: 1,
                    phase: JobPhase::Queued
                },
                JobEvent::Polled {
                    attempt: 2,
                    phase: JobPhase::Running
                },
            ]
        );
    }

    /// Test: a job stuck in `running` times out near the budget, not a poll later
    #[tokio::test]
    async fn test_timeout_bounds_total_wait() {
        let fake = FakeExecutor::start(Script::new().statuses([running()])).await;
        let client = client_for(&fake);

        let options = PollOptions::default()
            .with_poll_interval(Duration::from_millis(100))
            .with_timeout(Duration::from_millis(250));

        let start = Instant::now();
        let err = client
            .execute_and_wait(&doubling_request(), options)
            .await
            .unwrap_err();
        let elapsed = start.elapsed();

        assert_eq!(err.kind(), ErrorKind::TimeoutError);
        assert!(elapsed >= Duration::from_millis(250), "elapsed {:?}", elapsed);
        assert!(elapsed < Duration::from_millis(500), "elapsed {:?}", elapsed);
        assert!(fake.status_hits() >= 2);
    }

    /// Test: a status request that hangs is cut off by the deadline
    #[tokio::test]
    async fn test_timeout_interrupts_slow_status_request() {
        let fake = FakeExecutor::start(
            Script::new()
                .statuses([running()])
                .status_delay(Duration::from_secs(10)),
        )
        .await;
        let client = client_for(&fake);

        let start = Instant::now();
        let err = client
            .execute_and_wait(
                &doubling_request(),
                PollOptions::default().with_timeout(Duration::from_millis(200)),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ExecutorError::Timeout { timeout_ms: 200 }));
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    /// Test: cancelling during a long inter-poll sleep aborts well before the next poll
    ///
    /// Real clock, so the bound leaves scheduling slack; the exact wake is pinned
    /// with a paused clock in `cancel.rs` (`test_sleep_wakes_on_cancel`).
    #[tokio::test]
    async fn test_cancel_wakes_poll_sleep() {
        let fake = FakeExecutor::start(Script::new().statuses([queued()])).await;
        let client = client_for(&fake);

        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let options = PollOptions::default()
            .with_poll_interval(Duration::from_secs(5))
            .with_timeout(Duration::from_secs(60))
            .with_cancellation(token);

        let start = Instant::now();
        let err = client
            .execute_and_wait(&doubling_request(), options)
            .await
            .unwrap_err();

        let elapsed = start.elapsed();

        assert_eq!(err.kind(), ErrorKind::AbortError);
        assert!(elapsed < Duration::from_millis(250), "elapsed {:?}", elapsed);
        assert_eq!(fake.status_hits(), 1);
    }

    /// Test: a token cancelled up front never reaches the service
    #[tokio::test]
    async fn test_cancelled_before_submit() {
        let fake = FakeExecutor::start(Script::new()).await;
        let client = client_for(&fake);

        let token = CancellationToken::new();
        token.cancel();

        let err = client
            .execute_and_wait(&doubling_request(), fast_options().with_cancellation(token))
            .await
            .unwrap_err();

        assert!(err.is_abort());
        assert_eq!(fake.status_hits(), 0);
    }

    /// Test: an unknown status tag is a protocol violation, polled exactly once
    #[tokio::test]
    async fn test_unknown_status_stops_polling() {
        let fake =
            FakeExecutor::start(Script::new().statuses([Reply::ok(json!({"status": "bogus"}))]))
                .await;
        let client = client_for(&fake);

        let err = client
            .execute_and_wait(&doubling_request(), fast_options())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidResponse);
        assert!(err.to_string().contains("bogus"));
        assert_eq!(fake.status_hits(), 1);
    }

    /// Test: the job's own error message comes through untouched
    #[tokio::test]
    async fn test_job_error_message_verbatim() {
        let fake = FakeExecutor::start(
            Script::new().statuses([running(), job_error("worker crashed: OOM")]),
        )
        .await;
        let client = client_for(&fake);

        let err = client
            .execute_and_wait(&doubling_request(), fast_options())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::JobError);
        match err {
            ExecutorError::Job { message } => assert_eq!(message, "worker crashed: OOM"),
            other => panic!("expected job error, got {:?}", other),
        }
    }

    /// Test: a non-2xx submit surfaces the body's `error` and the status code
    #[tokio::test]
    async fn test_submit_server_error_uses_body_message() {
        let fake = FakeExecutor::start(Script::new().submit(Reply::Json(
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({"error": "queue unavailable"}),
        )))
        .await;
        let client = client_for(&fake);

        let err = client
            .execute_and_wait(&doubling_request(), fast_options())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ServerError);
        assert_eq!(err.status_code(), Some(500));
        assert_eq!(err.to_string(), "queue unavailable");
        assert_eq!(fake.status_hits(), 0);
    }

    /// Test: a 404 without a JSON error falls back to the status line
    #[tokio::test]
    async fn test_status_not_found_fallback_message() {
        let fake = FakeExecutor::start(
            Script::new().statuses([Reply::Raw(StatusCode::NOT_FOUND, "not json")]),
        )
        .await;
        let client = client_for(&fake);

        let err = client
            .get_job_status(labexec_common::types::JobId(99), &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), Some(404));
        assert_eq!(err.to_string(), "HTTP 404: Not Found");
    }

    /// Test: nothing listening is a network error
    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        let client = ExecutorClient::new(ExecutorConfig::new(unused_url())).unwrap();

        let err = client
            .execute_and_wait(&doubling_request(), fast_options())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NetworkError);
        assert!(err.is_retryable());
    }

    /// Test: a 2xx body that is not JSON is a network error, not a panic
    #[tokio::test]
    async fn test_malformed_submit_body_is_network_error() {
        let fake =
            FakeExecutor::start(Script::new().submit(Reply::Raw(StatusCode::OK, "{\"id\": "))).await;
        let client = client_for(&fake);

        let err = client
            .execute_and_wait(&doubling_request(), fast_options())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NetworkError);
    }

    /// Test: a known tag with a broken payload is an invalid response
    #[tokio::test]
    async fn test_completed_without_result_is_invalid() {
        let fake =
            FakeExecutor::start(Script::new().statuses([Reply::ok(json!({"status": "completed"}))]))
                .await;
        let client = client_for(&fake);

        let err = client
            .get_job_status(labexec_common::types::JobId(1), &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidResponse);
    }

    #[tokio::test]
    async fn test_get_job_status_single_read() {
        let fake = FakeExecutor::start(Script::new().statuses([queued(), running()])).await;
        let client = client_for(&fake);
        let token = CancellationToken::new();

        let first = client
            .get_job_status(labexec_common::types::JobId(5), &token)
            .await
            .unwrap();
        let second = client
            .get_job_status(labexec_common::types::JobId(5), &token)
            .await
            .unwrap();

        assert_eq!(first, JobStatus::Queued);
        assert_eq!(second, JobStatus::Running);
        assert_eq!(fake.status_hits(), 2);
    }

    #[tokio::test]
    async fn test_health_check() {
        let healthy = FakeExecutor::start(Script::new()).await;
        assert!(client_for(&healthy).health_check().await);

        let degraded =
            FakeExecutor::start(Script::new().health(Reply::ok(json!({"status": "degraded"}))))
                .await;
        assert!(!client_for(&degraded).health_check().await);

        let failing = FakeExecutor::start(Script::new().health(Reply::Json(
            StatusCode::SERVICE_UNAVAILABLE,
            json!({"error": "draining"}),
        )))
        .await;
        assert!(!client_for(&failing).health_check().await);

        let unreachable = ExecutorClient::new(ExecutorConfig::new(unused_url())).unwrap();
        assert!(!unreachable.health_check().await);
    }

    #[tokio::test]
    async fn test_languages_in_service_order() {
        let fake = FakeExecutor::start(Script::new().languages(Reply::ok(json!([
            {"language": "go", "display_name": "Go 1.22"},
            {"language": "python", "display_name": "Python 3"},
            {"language": "c", "display_name": "C11"},
        ]))))
        .await;
        let languages = client_for(&fake).languages().await.unwrap();

        let ids: Vec<&str> = languages.iter().map(|l| l.language.as_str()).collect();
        assert_eq!(ids, vec!["go", "python", "c"]);
        assert_eq!(languages[0].display_name, "Go 1.22");
    }

    /// Test: results come back in request order with locally computed verdicts
    #[tokio::test]
    async fn test_execute_and_reconcile() {
        // Service returns them swapped and claims test 2 failed
        let fake = FakeExecutor::start(Script::new().statuses([completed(python_result(vec![
            test_result(2, "10\n", false, 4),
            test_result(1, "5\n", true, 3),
        ]))]))
        .await;
        let client = client_for(&fake);

        let result = client
            .execute_and_reconcile(&doubling_request(), fast_options())
            .await
            .unwrap();

        let ids: Vec<u32> = result.results.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert!(!result.results[0].passed);
        assert!(result.results[1].passed);
        assert_eq!(result.results[0].expected.as_deref(), Some("4"));
        assert_eq!(result.status, Some(ExecutionStatus::Error));
        assert_eq!(result.total_duration_ms, 7);
    }

    #[tokio::test]
    async fn test_execute_code_builds_request() {
        let fake = FakeExecutor::start(Script::new()).await;
        let client = client_for(&fake);

        client
            .execute_code(
                "cpp",
                "int main(){}",
                vec![TestCase::new(1, "")],
                fast_options(),
            )
            .await
            .unwrap();

        let submitted = fake.submissions();
        assert_eq!(submitted[0]["language"], "cpp");
        assert_eq!(submitted[0]["testcases"][0]["id"], 1);
        assert!(submitted[0]["testcases"][0].get("expected").is_none());
    }
}
