use std::future::Future;

use crate::ResultEngine;

use super::Engine;

impl Engine {
    /// Run `op` again on transient conflicts, with capped exponential backoff.
    ///
    /// Each attempt must be a whole transaction: nothing from a failed
    /// attempt survives into the next one.
    pub(super) async fn with_retry<T, F, Fut>(&self, op_name: &str, mut op: F) -> ResultEngine<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ResultEngine<T>>,
    {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op().await {
                Err(err) if err.is_transient() && attempt < max_attempts => {
                    let delay = self.retry.backoff(attempt);
                    tracing::warn!(
                        op = op_name,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "conflict, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) if err.is_transient() => {
                    tracing::warn!(op = op_name, attempt, error = %err, "giving up after conflicts");
                    return Err(err);
                }
                other => return other,
            }
        }
    }
}
