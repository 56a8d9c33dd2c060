// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::queue::{FakePublisher, LocalBroker};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::fmt::MakeWriter;

/// A writer that captures log output for testing
#[derive(Clone, Default)]
struct CapturedLogs {
    logs: Arc<Mutex<Vec<u8>>>,
}

impl CapturedLogs {
    fn new() -> Self {
        Self::default()
    }

    fn contents(&self) -> String {
        let logs = self.logs.lock().unwrap();
        String::from_utf8_lossy(&logs).to_string()
    }
}

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.logs.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Run a test with captured tracing output
fn with_tracing<F, Fut>(f: F) -> (String, Fut::Output)
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future,
{
    let logs = CapturedLogs::new();
    let logs_clone = logs.clone();

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_writer(logs_clone)
        .with_ansi(false)
        .without_time()
        .finish();

    let result = tracing::subscriber::with_default(subscriber, || {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
            .block_on(f())
    });

    (logs.contents(), result)
}

fn batch(ids: &[&str]) -> Vec<QueuedMessage> {
    ids.iter().map(|id| QueuedMessage::new(*id, "{}")).collect()
}

// =============================================================================
// Tracing output verification tests
// =============================================================================

#[test]
fn traced_publish_logs_entry_and_completion() {
    let (logs, result) = with_tracing(|| async {
        let traced = TracedPublisher::new(FakePublisher::new());
        traced.publish("incoming", batch(&["m-1", "m-2"])).await
    });

    assert!(result.is_ok(), "publish should succeed: {:?}", result);
    assert!(
        logs.contains("queue.publish"),
        "Should log span name. Logs:\n{}",
        logs
    );
    assert!(
        logs.contains("incoming"),
        "Should log topic. Logs:\n{}",
        logs
    );
    assert!(
        logs.contains("publishing"),
        "Should log entry message. Logs:\n{}",
        logs
    );
    assert!(
        logs.contains("published"),
        "Should log completion. Logs:\n{}",
        logs
    );
    assert!(
        logs.contains("elapsed_ms"),
        "Should log timing. Logs:\n{}",
        logs
    );
}

#[test]
fn traced_publish_logs_failure() {
    let (logs, result) = with_tracing(|| async {
        let fake = FakePublisher::new();
        fake.set_failing(true);
        TracedPublisher::new(fake)
            .publish("incoming", batch(&["m-1"]))
            .await
    });

    assert!(result.is_err());
    assert!(
        logs.contains("publish failed"),
        "Should log failure. Logs:\n{}",
        logs
    );
}

#[test]
fn traced_subscribe_logs_subscription_name() {
    let (logs, result) = with_tracing(|| async {
        let broker = LocalBroker::in_memory("maira-sub", Duration::from_secs(1));
        TracedSubscriber::new(broker).subscribe("events").await
    });

    assert!(result.is_ok());
    assert!(
        logs.contains("queue.subscribe"),
        "Should log span name. Logs:\n{}",
        logs
    );
    assert!(
        logs.contains("maira-sub_events"),
        "Should log subscription name. Logs:\n{}",
        logs
    );
}

// =============================================================================
// Delegation tests - verify traced wrapper delegates to inner adapter
// =============================================================================

#[tokio::test]
async fn traced_publisher_delegates_to_inner() {
    let fake = FakePublisher::new();
    let traced = TracedPublisher::new(fake.clone());

    traced.publish("incoming", batch(&["m-1"])).await.unwrap();

    let calls = fake.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].topic, "incoming");
    assert_eq!(calls[0].messages[0].id, "m-1");
}

#[tokio::test]
async fn traced_publisher_skips_empty_batches() {
    let fake = FakePublisher::new();
    let traced = TracedPublisher::new(fake.clone());

    traced.publish("incoming", Vec::new()).await.unwrap();

    assert!(fake.calls().is_empty());
}
