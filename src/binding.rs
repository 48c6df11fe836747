//! The scripted-step boundary: the [`Expect`] step and the integer result
//! codes it hands back to callers that cannot carry rich errors.

use crate::expect::{ExpectError, run_expect};
use crate::settings::Settings;
use crate::source::OutputSource;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// The output source could not be read.
pub const READ_ERROR: i32 = -1;
/// No keyword appeared before the timeout.
pub const TIMED_OUT: i32 = -2;
/// The caller cancelled the wait.
pub const CANCELLED: i32 = -3;

type DiagnosticHandler = Arc<dyn Fn(&str) + Send + Sync>;

/// Translate an expect result into its result code: the matched keyword
/// index, or one of the negative sentinels.
pub fn result_code(result: &Result<usize, ExpectError>) -> i32 {
    match result {
        Ok(index) => i32::try_from(*index).unwrap_or(i32::MAX),
        Err(ExpectError::Read(_)) => READ_ERROR,
        Err(ExpectError::DeadlineExceeded) => TIMED_OUT,
        Err(ExpectError::Cancelled) => CANCELLED,
    }
}

/// Everything a step needs from its embedding runtime.
#[derive(Clone)]
pub struct Context {
    pub source: Arc<OutputSource>,
    pub settings: Settings,
    pub cancel: CancellationToken,
    diagnostics: DiagnosticHandler,
}

impl Context {
    /// Create a context that reports diagnostics on stderr.
    pub fn new(source: Arc<OutputSource>, settings: Settings, cancel: CancellationToken) -> Self {
        Self::with_diagnostics(source, settings, cancel, |line| eprintln!("{line}"))
    }

    /// Create a context with a custom diagnostic sink.
    pub fn with_diagnostics(
        source: Arc<OutputSource>,
        settings: Settings,
        cancel: CancellationToken,
        diagnostics: impl Fn(&str) + Send + Sync + 'static,
    ) -> Self {
        Self {
            source,
            settings,
            cancel,
            diagnostics: Arc::new(diagnostics),
        }
    }

    /// Write one line to the diagnostic channel.
    pub fn report(&self, line: &str) {
        (self.diagnostics)(line);
    }
}

/// The `expect` step: waits for any of `keywords` and yields a result code.
///
/// The timeout comes from the ambient `timeout` setting
/// (see [`Settings::timeout`]).
pub struct Expect {
    pub keywords: Vec<String>,
}

impl Expect {
    pub const NAME: &'static str = "expect";

    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keywords: keywords.into_iter().map(Into::into).collect(),
        }
    }

    /// Run the step. Read failures are also reported on the context's
    /// diagnostic channel.
    pub async fn execute(&self, ctx: &Context) -> i32 {
        let timeout = ctx.settings.timeout();
        let result = run_expect(&ctx.cancel, &ctx.source, &self.keywords, timeout).await;
        if let Err(e @ ExpectError::Read(_)) = &result {
            tracing::error!(error = %e, "expect could not read console output");
            ctx.report(&e.to_string());
        }
        result_code(&result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{Setting, TIMEOUT};
    use crate::source::CaptureError;
    use crate::source::testing::Scripted;
    use std::sync::Mutex;

    fn context(source: OutputSource, timeout_secs: f64) -> (Context, Arc<Mutex<Vec<String>>>) {
        let mut settings = Settings::new();
        settings.set(TIMEOUT, Setting::Number(timeout_secs));
        let lines = Arc::new(Mutex::new(Vec::new()));
        let sink = lines.clone();
        let ctx = Context::with_diagnostics(
            Arc::new(source),
            settings,
            CancellationToken::new(),
            move |line| sink.lock().unwrap().push(line.to_string()),
        );
        (ctx, lines)
    }

    #[test]
    fn test_result_codes() {
        assert_eq!(result_code(&Ok(0)), 0);
        assert_eq!(result_code(&Ok(4)), 4);
        assert_eq!(result_code(&Err(ExpectError::Read(CaptureError::Closed))), READ_ERROR);
        assert_eq!(result_code(&Err(ExpectError::DeadlineExceeded)), TIMED_OUT);
        assert_eq!(result_code(&Err(ExpectError::Cancelled)), CANCELLED);
    }

    #[tokio::test(start_paused = true)]
    async fn test_match_returns_index() {
        let (ctx, lines) = context(
            OutputSource::new(Scripted::text("...task error occurred..."), Scripted::failing()),
            10.0,
        );
        let rc = Expect::new(["done", "error"]).execute(&ctx).await;
        assert_eq!(rc, 1);
        assert!(lines.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_timeout_setting() {
        let (ctx, lines) = context(
            OutputSource::new(Scripted::text("no match"), Scripted::failing()),
            0.0,
        );
        assert_eq!(Expect::new(["x"]).execute(&ctx).await, TIMED_OUT);
        assert!(lines.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_error_is_reported() {
        let (ctx, lines) = context(OutputSource::new(Scripted::failing(), Scripted::failing()), 10.0);
        assert_eq!(Expect::new(["x"]).execute(&ctx).await, READ_ERROR);

        let lines = lines.lock().unwrap();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("expect: "), "got: {}", lines[0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_context() {
        let (ctx, lines) = context(OutputSource::new(Scripted::text(""), Scripted::failing()), 10.0);
        ctx.cancel.cancel();
        assert_eq!(Expect::new(["x"]).execute(&ctx).await, CANCELLED);
        assert!(lines.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_timeout_without_setting() {
        let ctx = Context::new(
            Arc::new(OutputSource::new(Scripted::text("ready"), Scripted::failing())),
            Settings::new(),
            CancellationToken::new(),
        );
        assert_eq!(Expect::new(["ready"]).execute(&ctx).await, 0);
    }
}
