//! Drains a result sequence into the peer's side-channel.

use crate::backend::ResultReceiver;
use crate::sink::ResultSink;
use tracing::{debug, warn};

/// Delivery counts for one relay run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayReport {
    pub delivered: usize,
    pub failed: usize,
}

impl RelayReport {
    /// Results seen, delivered or not.
    pub fn total(&self) -> usize {
        self.delivered + self.failed
    }
}

/// Forward every result to `sink`, then close it.
///
/// A failed send is logged and skipped; draining continues until the
/// sequence closes.
pub async fn relay_results<K>(mut results: ResultReceiver, sink: &mut K) -> RelayReport
where
    K: ResultSink + ?Sized,
{
    let mut report = RelayReport::default();

    while let Some(result) = results.recv().await {
        let index = report.total();
        let message = match result.to_json() {
            Ok(message) => message,
            Err(e) => {
                warn!(index, error = %e, "Failed to serialize result");
                report.failed += 1;
                continue;
            }
        };

        match sink.send(message.as_bytes()).await {
            Ok(()) => {
                debug!(index, sink = sink.name(), text = %result.text, is_final = result.is_final, "Relayed result");
                report.delivered += 1;
            }
            Err(e) => {
                warn!(index, sink = sink.name(), error = %e, "Failed to forward result");
                report.failed += 1;
            }
        }
    }

    if let Err(e) = sink.close().await {
        warn!(sink = sink.name(), error = %e, "Failed to close side-channel");
    }

    debug!(
        delivered = report.delivered,
        failed = report.failed,
        "Result relay finished"
    );
    report
}
