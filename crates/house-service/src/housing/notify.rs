use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tracing::info;

/// Outbound hook used to tell subscribers about new flats (e-mail or similar).
#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    async fn send(&self, recipient: &str, message: &str) -> Result<(), NotifyError>;
}

/// Notification dispatch error.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}

/// Stand-in mail transport: waits a random delay and fails a fraction of sends.
#[derive(Debug, Clone)]
pub struct SimulatedMailer {
    max_delay: Duration,
    failure_rate: f64,
}

impl SimulatedMailer {
    pub fn new(max_delay: Duration, failure_rate: f64) -> Self {
        Self {
            max_delay,
            failure_rate: failure_rate.clamp(0.0, 1.0),
        }
    }
}

impl Default for SimulatedMailer {
    fn default() -> Self {
        Self::new(Duration::from_millis(3000), 0.1)
    }
}

#[async_trait]
impl Notifier for SimulatedMailer {
    async fn send(&self, recipient: &str, message: &str) -> Result<(), NotifyError> {
        let (delay, failed) = {
            let mut rng = rand::thread_rng();
            let max_millis = self.max_delay.as_millis() as u64;
            let delay = Duration::from_millis(rng.gen_range(0..=max_millis));
            (delay, rng.gen_bool(self.failure_rate))
        };
        tokio::time::sleep(delay).await;

        if failed {
            return Err(NotifyError::Transport(format!(
                "failed to deliver to {recipient}"
            )));
        }

        info!(%recipient, %message, "notification delivered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn never_failing_mailer_delivers() {
        let mailer = SimulatedMailer::new(Duration::ZERO, 0.0);
        mailer
            .send("bla@example.com", "new flat")
            .await
            .expect("delivery succeeds");
    }

    #[tokio::test]
    async fn always_failing_mailer_reports_transport_error() {
        let mailer = SimulatedMailer::new(Duration::ZERO, 1.0);
        let result = mailer.send("bla@example.com", "new flat").await;
        assert!(matches!(result, Err(NotifyError::Transport(_))));
    }
}
