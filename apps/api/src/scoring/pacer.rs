use std::time::Duration;

/// Fixed post-call delay between model requests.
///
/// Rows are scored strictly one at a time, so a constant gap is enough to stay
/// under the provider's requests-per-minute ceiling.
#[derive(Debug, Clone, Copy)]
pub struct RequestPacer {
    delay: Duration,
}

impl RequestPacer {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    /// Derives the delay from a requests-per-minute quota.
    pub fn per_minute(requests: u32) -> Self {
        Self::new(Duration::from_secs(60) / requests.max(1))
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub async fn wait(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}
