//! Reconciliation loop: long-poll diff, fan out to managers, advance
//! state only after every manager task returns.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::managers::{run_all, Manager};
use crate::metadata::{Descriptor, MetadataClient, MetadataError};

const BACKOFF_ON_ERROR: Duration = Duration::from_secs(5);

/// Drives C9's outer loop until `token` is cancelled.
pub async fn run(
    metadata: Arc<MetadataClient>,
    managers: Vec<Arc<dyn Manager>>,
    token: CancellationToken,
) {
    let mut old = Descriptor::default();
    let mut error_count: u32 = 0;

    loop {
        if token.is_cancelled() {
            return;
        }

        let watch_result = metadata.watch(&token).await;

        if token.is_cancelled() {
            return;
        }

        let new = match watch_result {
            Ok(Some(descriptor)) => descriptor,
            Ok(None) => return,
            Err(error) => {
                if error_count == 1 {
                    log_classified(&error);
                }
                error_count += 1;
                tokio::select! {
                    biased;
                    _ = token.cancelled() => return,
                    _ = tokio::time::sleep(BACKOFF_ON_ERROR) => {}
                }
                continue;
            }
        };

        run_all(&managers, &old, &new).await;

        old = new;
        error_count = 0;
    }
}

/// Only the *second* consecutive failure is logged, DNS vs.
/// generic network errors get distinct messages.
fn log_classified(error: &MetadataError) {
    match error.classify() {
        "dns" => error!(%error, "metadata watch failed: DNS resolution error"),
        "timeout" => error!(%error, "metadata watch failed: request timed out"),
        "decode" => error!(%error, "metadata watch failed: response decode error"),
        _ => error!(%error, "metadata watch failed: network error"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancelled_token_stops_the_loop_immediately() {
        let metadata = Arc::new(MetadataClient::new());
        let token = CancellationToken::new();
        token.cancel();
        // Should return promptly rather than hang on a real network call.
        tokio::time::timeout(Duration::from_secs(1), run(metadata, Vec::new(), token))
            .await
            .expect("reconciliation loop did not exit promptly after cancellation");
    }
}
