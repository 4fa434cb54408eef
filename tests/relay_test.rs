use std::sync::Arc;
use std::time::{Duration, Instant};

use wiremock::matchers::{body_string, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tracking_relay::{
    DispatchOutcome, FailureReason, Handled, InMemoryContext, MissingData, Relay, RelayConfig,
    RelayError, RetryPolicy, SkipReason, API_GATEWAY_URL_KEY, EVENT_CODES_KEY,
};

const OUTPUT_TOPIC: &str = "tracking-updates-out";

fn payload(location: &str, code: &str) -> String {
    format!(
        r#"{{"meta_info":{{"message_source_location":"{location}"}},"merged_order_tracking_response":{{"tracking":[{{"current_event_code":"{code}"}}]}}}}"#
    )
}

fn config(backoff: Duration) -> RelayConfig {
    RelayConfig {
        retry: RetryPolicy::new(3, backoff),
        ..RelayConfig::default()
    }
}

fn context_for(server: &MockServer) -> Arc<InMemoryContext> {
    Arc::new(
        InMemoryContext::new(OUTPUT_TOPIC)
            .with_config(EVENT_CODES_KEY, "700,710")
            .with_config(API_GATEWAY_URL_KEY, format!("{}/gateway", server.uri())),
    )
}

/// Republish runs on a detached task; give it a moment.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

#[tokio::test]
async fn test_eligible_event_is_forwarded_once() {
    let body = payload("IN", "700");

    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/gateway"))
        .and(header("content-type", "application/json"))
        .and(body_string(body.clone()))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"ok":true}"#))
        .expect(1)
        .mount(&mock_server)
        .await;

    let context = context_for(&mock_server);
    let relay = Relay::new(context.clone(), &config(Duration::from_millis(10))).unwrap();

    let handled = relay.handle(&body).await.unwrap();
    match handled {
        Handled::Dispatched(report) => {
            assert_eq!(report.outcome, DispatchOutcome::Delivered);
            assert_eq!(report.attempts, 1);
        }
        other => panic!("expected dispatch, got {other:?}"),
    }

    settle().await;
    assert_eq!(context.published().await, vec![(OUTPUT_TOPIC.to_string(), body)]);
}

#[tokio::test]
async fn test_other_source_locations_are_never_dispatched() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let context = context_for(&mock_server);
    let relay = Relay::new(context.clone(), &config(Duration::from_millis(10))).unwrap();

    for location in ["US", "GB", "", "in"] {
        for code in ["700", "710", "800"] {
            let handled = relay.handle(&payload(location, code)).await.unwrap();
            assert!(matches!(
                handled,
                Handled::Skipped(SkipReason::NotEligible { .. })
            ));
        }
    }

    settle().await;
    assert_eq!(context.published().await.len(), 12);
}

#[tokio::test]
async fn test_unlisted_code_is_skipped() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let relay = Relay::new(context_for(&mock_server), &config(Duration::from_millis(10))).unwrap();
    let handled = relay.handle(&payload("IN", "500")).await.unwrap();

    assert_eq!(
        handled,
        Handled::Skipped(SkipReason::NotEligible {
            source_location: Some("IN".to_string()),
            event_code: tracking_relay::EventCode::new("500"),
        })
    );
}

#[tokio::test]
async fn test_retries_until_delivered() {
    let backoff = Duration::from_millis(100);
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(2)
        .with_priority(1)
        .expect(2)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let relay = Relay::new(context_for(&mock_server), &config(backoff)).unwrap();

    let started = Instant::now();
    let handled = relay.handle(&payload("IN", "700")).await.unwrap();

    assert_eq!(
        handled,
        Handled::Dispatched(tracking_relay::DispatchReport {
            outcome: DispatchOutcome::Delivered,
            attempts: 3,
        })
    );
    assert!(started.elapsed() >= backoff * 2);
    assert_eq!(mock_server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_exhausted_retries_do_not_fail_invocation() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429))
        .expect(3)
        .mount(&mock_server)
        .await;

    let context = context_for(&mock_server);
    let relay = Relay::new(context.clone(), &config(Duration::from_millis(10))).unwrap();
    let handled = relay.handle(&payload("IN", "710")).await;

    assert!(matches!(
        handled,
        Ok(Handled::Dispatched(report))
            if report.attempts == 3
                && report.outcome == DispatchOutcome::RetryableFailure(FailureReason::ClientError(429))
    ));

    settle().await;
    assert_eq!(context.published().await.len(), 1);
}

#[tokio::test]
async fn test_server_error_is_not_retried() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&mock_server)
        .await;

    let relay = Relay::new(context_for(&mock_server), &config(Duration::from_millis(10))).unwrap();
    let handled = relay.handle(&payload("IN", "700")).await.unwrap();

    assert_eq!(
        handled,
        Handled::Dispatched(tracking_relay::DispatchReport {
            outcome: DispatchOutcome::FatalFailure(FailureReason::UnexpectedStatus(503)),
            attempts: 1,
        })
    );
}

#[tokio::test]
async fn test_empty_previous_tracking_aborts_without_dispatch() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let body = r#"{"meta_info":{"message_source_location":"IN"},"previous_order_tracking_response":{"tracking":[]}}"#;
    let context = context_for(&mock_server);
    let relay = Relay::new(context.clone(), &config(Duration::from_millis(10))).unwrap();

    match relay.handle(body).await {
        Err(RelayError::MissingData(MissingData::EmptyTracking)) => {}
        other => panic!("expected missing data, got {other:?}"),
    }

    settle().await;
    assert_eq!(context.published().await.len(), 1);
}

#[tokio::test]
async fn test_undecodable_payload_is_still_republished() {
    let context = Arc::new(InMemoryContext::new(OUTPUT_TOPIC));
    let relay = Relay::new(context.clone(), &RelayConfig::default()).unwrap();

    let result = relay.handle(r#"{"meta_info": "IN"}"#).await;
    assert!(matches!(result, Err(RelayError::Decode(_))));

    settle().await;
    assert_eq!(context.published().await.len(), 1);
}

#[tokio::test]
async fn test_unset_gateway_skips_dispatch() {
    let context = Arc::new(InMemoryContext::new(OUTPUT_TOPIC));
    let relay = Relay::new(context.clone(), &RelayConfig::default()).unwrap();

    let handled = relay.handle(&payload("IN", "700")).await.unwrap();
    assert_eq!(handled, Handled::Skipped(SkipReason::GatewayUnset));

    let context = Arc::new(InMemoryContext::new(OUTPUT_TOPIC).with_config(API_GATEWAY_URL_KEY, "dummy"));
    let relay = Relay::new(context, &RelayConfig::default()).unwrap();
    let handled = relay.handle(&payload("IN", "700")).await.unwrap();
    assert_eq!(handled, Handled::Skipped(SkipReason::GatewayUnset));
}

#[tokio::test]
async fn test_publish_failure_does_not_fail_invocation() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let context = Arc::new(
        InMemoryContext::new(OUTPUT_TOPIC)
            .with_config(API_GATEWAY_URL_KEY, format!("{}/gateway", mock_server.uri()))
            .with_failing_publish(),
    );
    let relay = Relay::new(context.clone(), &config(Duration::from_millis(10))).unwrap();

    let handled = relay.handle(&payload("IN", "700")).await.unwrap();
    assert!(matches!(handled, Handled::Dispatched(report) if report.outcome.is_delivered()));

    settle().await;
    assert!(context.published().await.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_invocations_share_one_relay() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(8)
        .mount(&mock_server)
        .await;

    let context = context_for(&mock_server);
    let relay = Arc::new(Relay::new(context.clone(), &config(Duration::from_millis(10))).unwrap());

    let mut handles = Vec::new();
    for i in 0..16 {
        let relay = relay.clone();
        let location = if i % 2 == 0 { "IN" } else { "US" };
        handles.push(tokio::spawn(async move {
            relay.handle(&payload(location, "700")).await
        }));
    }
    for handle in handles {
        assert!(handle.await.unwrap().is_ok());
    }

    settle().await;
    assert_eq!(context.published().await.len(), 16);
}
