use std::sync::Arc;

use tracing::debug;

use crate::chat::Transport;
use crate::domain::{Identity, RelayError};

/// The routing table: at or under the threshold goes out through the
/// standard identity, above it only through an eligible elevated one.
pub fn decide(size: u64, threshold: u64, elevated_eligible: bool) -> Result<Identity, RelayError> {
    if size <= threshold {
        Ok(Identity::Standard)
    } else if elevated_eligible {
        Ok(Identity::Elevated)
    } else {
        Err(RelayError::Eligibility { size, threshold })
    }
}

#[derive(Clone)]
pub struct TransportRouter {
    threshold: u64,
    standard: Arc<dyn Transport>,
    elevated: Option<Arc<dyn Transport>>,
}

impl TransportRouter {
    pub fn new(
        threshold: u64,
        standard: Arc<dyn Transport>,
        elevated: Option<Arc<dyn Transport>>,
    ) -> Self {
        Self {
            threshold,
            standard,
            elevated,
        }
    }

    /// Pick the transport for a payload of `size` bytes.
    ///
    /// Fails with `Eligibility` before anything is sent when the payload is
    /// over the threshold and the elevated identity is missing or not
    /// eligible.
    pub async fn route(&self, size: u64) -> Result<Arc<dyn Transport>, RelayError> {
        let elevated_eligible = match (&self.elevated, size > self.threshold) {
            (Some(elevated), true) => elevated.is_elevated_eligible().await,
            _ => false,
        };

        let identity = decide(size, self.threshold, elevated_eligible)?;
        debug!(size, %identity, "upload routed");

        match (identity, &self.elevated) {
            (Identity::Elevated, Some(elevated)) => Ok(Arc::clone(elevated)),
            _ => Ok(Arc::clone(&self.standard)),
        }
    }
}
