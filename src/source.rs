//! The output source: a best-effort snapshot of recent console text, read
//! through a primary capture strategy with a sticky switch to a fallback.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

/// Why a capture strategy could not produce a snapshot.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("output capture closed")]
    Closed,

    #[error("capture io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Unavailable(String),
}

/// One way of reading the most recently produced console text.
#[async_trait]
pub trait CaptureStrategy: Send + Sync {
    /// Return the current snapshot.
    async fn recent_text(&self) -> Result<String, CaptureError>;
}

/// Which strategy an [`OutputSource`] currently reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceSelector {
    Primary,
    Fallback,
}

/// Reads recent console text, hiding the primary/fallback distinction.
///
/// The selector starts at [`SourceSelector::Primary`]. The first time the
/// primary strategy fails it is switched to [`SourceSelector::Fallback`] for
/// the lifetime of this value, and every later fetch skips the primary.
/// Share one instance (behind an `Arc`) between invocations so they observe
/// the same selection.
pub struct OutputSource {
    primary: Box<dyn CaptureStrategy>,
    fallback: Box<dyn CaptureStrategy>,
    use_fallback: AtomicBool,
}

impl OutputSource {
    pub fn new(
        primary: impl CaptureStrategy + 'static,
        fallback: impl CaptureStrategy + 'static,
    ) -> Self {
        Self {
            primary: Box::new(primary),
            fallback: Box::new(fallback),
            use_fallback: AtomicBool::new(false),
        }
    }

    pub fn selector(&self) -> SourceSelector {
        if self.use_fallback.load(Ordering::Acquire) {
            SourceSelector::Fallback
        } else {
            SourceSelector::Primary
        }
    }

    /// Put the selector back on the primary strategy.
    pub fn reset(&self) {
        self.use_fallback.store(false, Ordering::Release);
    }

    /// Fetch the most recent console text.
    ///
    /// A primary failure is not returned: the selector flips and the fallback
    /// is tried within the same call. Only a failure of the strategy that ends
    /// up being used is reported.
    pub async fn fetch_recent_text(&self) -> Result<String, CaptureError> {
        if !self.use_fallback.load(Ordering::Acquire) {
            match self.primary.recent_text().await {
                Ok(text) => return Ok(text),
                Err(e) => {
                    if !self.use_fallback.swap(true, Ordering::AcqRel) {
                        tracing::warn!(error = %e, "primary capture unusable, switching to fallback");
                    }
                }
            }
        }
        self.fallback.recent_text().await
    }
}
