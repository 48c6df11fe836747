use anyhow::{Context as _, Result};
use clap::Parser;
use conexpect::capture::{LiveBuffer, OutputHandler, TranscriptTail, echo_to, spawn_reader};
use conexpect::settings::TIMEOUT;
use conexpect::{Assignment, Context, Expect, OutputSource, PtySession, Setting, Settings};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(
    name = "conexpect",
    about = "Wait for keywords to appear in the output of an interactive terminal program",
    version
)]
struct Args {
    /// Keyword to wait for; earlier keywords take priority (repeatable)
    #[arg(short, long = "keyword", value_name = "KEYWORD")]
    keywords: Vec<String>,

    /// Timeout in whole seconds [default: 3600]
    #[arg(short, long, env = "CONEXPECT_TIMEOUT", allow_negative_numbers = true)]
    timeout: Option<f64>,

    /// Ambient setting as NAME=VALUE (repeatable)
    #[arg(long = "set", value_name = "NAME=VALUE")]
    settings: Vec<Assignment>,

    /// Line of input to send to the program before waiting
    #[arg(long, value_name = "LINE")]
    send: Option<String>,

    /// File that receives a transcript of the program output
    #[arg(long, value_name = "PATH")]
    transcript: Option<PathBuf>,

    /// Do not echo the program output
    #[arg(short, long)]
    quiet: bool,

    /// Command to run in the PTY
    command: String,

    /// Arguments to pass to the command
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();

    let mut settings = Settings::new();
    settings.extend(args.settings);
    if let Some(secs) = args.timeout {
        settings.set(TIMEOUT, Setting::Number(secs));
    }

    // A temporary transcript lives as long as `temp` and is removed when it drops.
    let (transcript_path, transcript, temp) = match args.transcript {
        Some(path) => {
            let file = std::fs::File::create(&path)
                .with_context(|| format!("Failed to create transcript: {}", path.display()))?;
            (path, file, None)
        }
        None => {
            let temp = tempfile::Builder::new()
                .prefix("conexpect-")
                .suffix(".log")
                .tempfile()
                .context("Failed to create temporary transcript")?;
            let file = temp
                .reopen()
                .context("Failed to open temporary transcript")?;
            (temp.path().to_path_buf(), file, Some(temp))
        }
    };

    let (mut session, reader) =
        PtySession::spawn(&args.command, &args.args).context("Failed to spawn program")?;

    let quiet = args.quiet;
    let on_output: OutputHandler = if quiet {
        Box::new(|_| {})
    } else {
        echo_to(std::io::stdout())
    };
    let buffer = spawn_reader(reader, Some(transcript), on_output);

    if let Some(line) = &args.send {
        session.send_line(line).context("Failed to send input")?;
    }

    let source = OutputSource::new(LiveBuffer(buffer), TranscriptTail::new(&transcript_path));

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let ctx = Context::new(Arc::new(source), settings, cancel);
    let rc = Expect::new(args.keywords).execute(&ctx).await;

    if let Err(e) = session.terminate() {
        tracing::warn!(error = %e, "could not terminate program");
    }
    // process::exit skips destructors, so remove the temporary transcript now.
    drop(temp);

    if !quiet {
        println!();
    }
    println!("{rc}");
    std::io::stdout().flush()?;

    std::process::exit(exit_status(rc));
}

/// Map a result code onto a process exit status.
fn exit_status(rc: i32) -> i32 {
    if rc >= 0 { 0 } else { -rc }
}
