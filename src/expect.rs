//! The expect loop: sample the [`OutputSource`] on a fixed cadence until a
//! keyword appears, the deadline passes, or the caller cancels.

use crate::source::{CaptureError, OutputSource};
use std::time::Duration;
use thiserror::Error;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Period between two samples of the output source.
pub const TICK_PERIOD: Duration = Duration::from_millis(100);

/// Longest wait the loop arms a deadline for; larger timeouts are clamped.
pub const MAX_TIMEOUT: Duration = Duration::from_secs(86400 * 365 * 30);

/// Why an expect invocation ended without a match.
#[derive(Debug, Error)]
pub enum ExpectError {
    #[error("expect: {0}")]
    Read(#[from] CaptureError),

    #[error("expect: deadline exceeded")]
    DeadlineExceeded,

    #[error("expect: cancelled")]
    Cancelled,
}

/// Sampling behaviour of [`run_expect_with`].
#[derive(Debug, Clone)]
pub struct ExpectConfig {
    pub tick_period: Duration,
    /// Take one sample immediately at start instead of waiting a full period.
    pub sample_on_start: bool,
}

impl Default for ExpectConfig {
    fn default() -> Self {
        Self {
            tick_period: TICK_PERIOD,
            sample_on_start: false,
        }
    }
}

/// Wait until one of `keywords` appears in the recent output.
///
/// Returns the index of the first keyword, in list order, that occurs
/// anywhere in a snapshot. See [`run_expect_with`].
pub async fn run_expect(
    cancel: &CancellationToken,
    source: &OutputSource,
    keywords: &[String],
    timeout: Duration,
) -> Result<usize, ExpectError> {
    run_expect_with(cancel, source, keywords, timeout, &ExpectConfig::default()).await
}

/// Wait until one of `keywords` appears in the recent output, sampling as
/// described by `config`.
///
/// The first sample is taken one tick period after the call starts (or at
/// once if `sample_on_start` is set), and the deadline never fires before
/// that first sample: a zero timeout means the first sample must match. A
/// failed read ends the invocation immediately; there is no retry beyond the
/// escalation done by the source.
///
/// # Errors
///
/// - [`ExpectError::Read`] if the output source could not be read
/// - [`ExpectError::DeadlineExceeded`] if `timeout` elapses first
/// - [`ExpectError::Cancelled`] if `cancel` fires first
pub async fn run_expect_with(
    cancel: &CancellationToken,
    source: &OutputSource,
    keywords: &[String],
    timeout: Duration,
    config: &ExpectConfig,
) -> Result<usize, ExpectError> {
    let start = Instant::now();
    let first_tick = if config.sample_on_start {
        start
    } else {
        start + config.tick_period
    };
    let deadline = tokio::time::sleep_until((start + timeout.min(MAX_TIMEOUT)).max(first_tick));
    tokio::pin!(deadline);

    let mut ticker = tokio::time::interval_at(first_tick, config.tick_period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::debug!(?keywords, ?timeout, "expect started");

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                tracing::debug!("expect cancelled");
                return Err(ExpectError::Cancelled);
            }
            _ = ticker.tick() => {
                let snapshot = source.fetch_recent_text().await.map_err(|e| {
                    tracing::debug!(error = %e, "expect read failed");
                    ExpectError::Read(e)
                })?;
                if let Some(index) = find_keyword(keywords, &snapshot) {
                    tracing::debug!(index, keyword = %keywords[index], "expect matched");
                    return Ok(index);
                }
            }
            _ = &mut deadline => {
                tracing::debug!("expect deadline exceeded");
                return Err(ExpectError::DeadlineExceeded);
            }
        }
    }
}

/// Index of the first keyword, by list order, contained in `snapshot`.
pub fn find_keyword(keywords: &[String], snapshot: &str) -> Option<usize> {
    keywords
        .iter()
        .position(|keyword| snapshot.contains(keyword.as_str()))
}
