//! # Conexpect
//!
//! Wait for keywords to appear in the output of an interactive terminal
//! program.
//!
//! The heart of the crate is [`run_expect`]: given an ordered list of
//! keywords and a timeout, it samples the most recent console text every
//! 100 ms and reports which keyword appeared, or why none did. Keyword
//! priority is list order: the first listed keyword found anywhere in a
//! snapshot wins, wherever it sits in the text.
//!
//! ## Quick start
//!
//! ```no_run
//! use conexpect::{CaptureError, CaptureStrategy, OutputSource, run_expect};
//! use async_trait::async_trait;
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! struct Screen;
//!
//! #[async_trait]
//! impl CaptureStrategy for Screen {
//!     async fn recent_text(&self) -> Result<String, CaptureError> {
//!         Ok("build finished: done".to_string())
//!     }
//! }
//!
//! struct NoConsole;
//!
//! #[async_trait]
//! impl CaptureStrategy for NoConsole {
//!     async fn recent_text(&self) -> Result<String, CaptureError> {
//!         Err(CaptureError::Unavailable("no console attached".into()))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let source = OutputSource::new(Screen, NoConsole);
//!     let keywords = vec!["done".to_string(), "error".to_string()];
//!     let cancel = CancellationToken::new();
//!
//!     match run_expect(&cancel, &source, &keywords, Duration::from_secs(5)).await {
//!         Ok(index) => println!("matched {}", keywords[index]),
//!         Err(e) => eprintln!("{e}"),
//!     }
//! }
//! ```
//!
//! ## Output source
//!
//! [`OutputSource`] reads through a primary [`CaptureStrategy`] and switches,
//! once and for good, to a fallback the first time the primary fails.
//!
//! ## Scripted steps
//!
//! Embedding runtimes use [`Expect`] with a [`Context`]: the timeout comes from
//! the ambient `timeout` setting and the outcome is an integer result code.
//!
//! | Result code | Meaning |
//! |-------------|---------|
//! | `>= 0` | index of the matched keyword |
//! | `-1` | the output could not be read (also reported on the diagnostic channel) |
//! | `-2` | timeout |
//! | `-3` | cancelled |

pub mod binding;
pub mod capture;
pub mod expect;
pub mod settings;
pub mod source;
pub(crate) mod pty;

pub use binding::{CANCELLED, Context, Expect, READ_ERROR, TIMED_OUT, result_code};
pub use expect::{ExpectConfig, ExpectError, TICK_PERIOD, run_expect, run_expect_with};
pub use pty::PtySession;
pub use settings::{Assignment, DEFAULT_TIMEOUT, Setting, Settings};
pub use source::{CaptureError, CaptureStrategy, OutputSource, SourceSelector};
