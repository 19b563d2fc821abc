//! Rate-limited alerting.
//!
//! An alert is attempted only for frames with an unknown face and only when
//! the cooldown since the last *successful* send has passed. A failed send
//! leaves the clock alone, so the next eligible frame retries immediately.

use std::time::{Duration, Instant};
use thiserror::Error;

/// Body of every alert.
pub const ALERT_MESSAGE: &str = "Alert: Unknown person detected by security camera!";
/// Default minimum interval between successful alerts.
pub const DEFAULT_ALERT_COOLDOWN: Duration = Duration::from_secs(60);

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("notification channel is not configured")]
    Unconfigured,
    #[error("notification rejected with status {status}: {detail}")]
    Rejected { status: u16, detail: String },
    #[error("notification transport failed: {0}")]
    Transport(String),
    #[error("unexpected notification reply: {0}")]
    MalformedReply(String),
}

/// Delivers an alert message, returning the provider's message id.
pub trait Notifier {
    fn send(&self, message: &str) -> Result<String, NotifyError>;
}

/// Result of one [`AlertThrottle::maybe_alert`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertOutcome {
    Sent { message_id: String },
    SkippedCooldown,
    SkippedNoDetection,
    Failed,
}

pub struct AlertThrottle<N> {
    notifier: Option<N>,
    cooldown: Duration,
    last_sent: Option<Instant>,
}

impl<N: Notifier> AlertThrottle<N> {
    /// `notifier = None` means alerting is unconfigured: every attempt fails
    /// without contacting anything.
    pub fn new(notifier: Option<N>, cooldown: Duration) -> Self {
        Self {
            notifier,
            cooldown,
            last_sent: None,
        }
    }

    pub fn last_sent(&self) -> Option<Instant> {
        self.last_sent
    }

    pub fn maybe_alert(&mut self, unknown_detected: bool, now: Instant) -> AlertOutcome {
        if !unknown_detected {
            return AlertOutcome::SkippedNoDetection;
        }
        if let Some(last) = self.last_sent {
            if now.saturating_duration_since(last) <= self.cooldown {
                return AlertOutcome::SkippedCooldown;
            }
        }

        let Some(notifier) = self.notifier.as_ref() else {
            tracing::warn!(error = %NotifyError::Unconfigured, "alert not sent");
            return AlertOutcome::Failed;
        };

        match notifier.send(ALERT_MESSAGE) {
            Ok(message_id) => {
                tracing::info!(%message_id, "alert sent");
                self.last_sent = Some(now);
                AlertOutcome::Sent { message_id }
            }
            Err(e) => {
                tracing::warn!(error = %e, "alert failed");
                AlertOutcome::Failed
            }
        }
    }
}
