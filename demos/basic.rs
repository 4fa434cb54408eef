use std::sync::Arc;

use tracking_relay::{
    Handled, InMemoryContext, Relay, RelayConfig, API_GATEWAY_URL_KEY, EVENT_CODES_KEY,
};

#[tokio::main]
async fn main() {
    let context = Arc::new(
        InMemoryContext::new("tracking-updates-out")
            .with_config(EVENT_CODES_KEY, "700,710")
            .with_config(API_GATEWAY_URL_KEY, "https://example.com/exceptions"),
    );

    let relay = match Relay::new(context, &RelayConfig::default()) {
        Ok(relay) => relay,
        Err(err) => {
            eprintln!("cannot build gateway client: {err}");
            return;
        }
    };

    let payload = r#"{
        "meta_info": {"message_source_location": "IN"},
        "merged_order_tracking_response": {"tracking": [{"current_event_code": "700"}]}
    }"#;

    match relay.handle(payload).await {
        Ok(Handled::Dispatched(report)) => {
            println!("dispatched after {} attempt(s): {:?}", report.attempts, report.outcome);
        }
        Ok(Handled::Skipped(reason)) => println!("skipped: {reason:?}"),
        Err(err) => eprintln!("invocation failed: {err}"),
    }
}
