//! audiodrop - URL を受け取って音声ファイルを出力ディレクトリに置く CLI
//!
//! 引数の URL、引数がなければ標準入力の各行を依頼として受け付けます。
//! http(s) でない行は黙って読み飛ばします。ジョブが終わるたびに
//! JobReport を 1 行の JSON として標準出力に書きます。

mod copy_sink;

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use audiodrop_core::app::RelayBuilder;
use audiodrop_core::config::RelayConfig;
use audiodrop_core::domain::{is_http_url, ChatScope, JobReport, JobRequest, MediaInfo, RequesterId};
use audiodrop_core::impls::ScriptedExtractor;
use audiodrop_core::observability::init_tracing;
use audiodrop_core::ports::{Clock, IdGenerator, SystemClock, UlidGenerator};

use crate::copy_sink::CopySink;

/// Convert media URLs into audio files.
#[derive(Parser, Debug)]
#[command(name = "audiodrop", version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory delivered audio files are copied into.
    #[arg(short, long, default_value = ".")]
    out: PathBuf,

    /// Parent directory for the scratch directory (overrides config).
    #[arg(long)]
    scratch_root: Option<PathBuf>,

    /// Longest accepted media, in seconds (overrides config).
    #[arg(long)]
    max_duration_secs: Option<u64>,

    /// Maximum number of jobs converting at once (overrides config).
    #[arg(short = 'j', long)]
    jobs: Option<usize>,

    /// Name recorded as the requester of every job.
    #[arg(long, default_value = "cli")]
    requester: String,

    /// Use a scripted extractor instead of yt-dlp.
    #[arg(long)]
    dry_run: bool,

    /// URLs to convert. Read from stdin when none are given.
    urls: Vec<String>,
}

impl Cli {
    fn apply_overrides(&self, config: &mut RelayConfig) {
        if let Some(root) = &self.scratch_root {
            config.scratch_root = Some(root.clone());
        }
        if let Some(secs) = self.max_duration_secs {
            config.limits.max_duration_secs = secs;
        }
        if let Some(jobs) = self.jobs {
            config.limits.max_concurrent_jobs = jobs;
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("audiodrop: failed to start runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    let code = match runtime.block_on(run(cli)) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("audiodrop: {e}");
            ExitCode::FAILURE
        }
    };
    // the stdin reader can still be parked in a blocking read after ctrl-c
    runtime.shutdown_background();
    code
}

async fn run(cli: Cli) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => RelayConfig::load(path)?,
        None => RelayConfig::default(),
    };
    cli.apply_overrides(&mut config);
    init_tracing(&config.logging)?;

    tokio::fs::create_dir_all(&cli.out).await?;
    let mut builder = RelayBuilder::new(config).sink(Arc::new(CopySink::new(cli.out.clone())));
    if cli.dry_run {
        builder = builder.extractor(Arc::new(ScriptedExtractor::new(MediaInfo::new(
            "dry run",
            Some(1),
        ))));
    }
    let app = builder.build()?;
    let mut sweep = app.start_sweep()?;
    info!(scratch = %app.scratch().path().display(), out = %cli.out.display(), "audiodrop ready");

    let ids = UlidGenerator::new(SystemClock);
    let requester = RequesterId::new(cli.requester.as_str());
    let mut input = spawn_input(cli.urls);
    let mut input_open = true;
    let mut jobs = JoinSet::new();
    let mut all_delivered = true;

    loop {
        if !input_open && jobs.is_empty() {
            break;
        }

        tokio::select! {
            line = input.recv(), if input_open => match line {
                Some(line) => {
                    let Some(request) = request_from_line(&line, &requester, &ids) else {
                        debug!(line = %line.trim(), "skipping non-url input");
                        continue;
                    };
                    match app.dispatcher.submit(request) {
                        Ok(handle) => {
                            jobs.spawn(handle);
                        }
                        Err(e) => warn!(error = %e, "job not accepted"),
                    }
                }
                None => input_open = false,
            },
            Some(joined) = jobs.join_next(), if !jobs.is_empty() => {
                match joined {
                    Ok(Ok(report)) => {
                        all_delivered &= report.outcome.is_delivered();
                        print_report(&report)?;
                    }
                    Ok(Err(e)) | Err(e) => {
                        all_delivered = false;
                        error!(error = %e, "job task failed");
                    }
                }
            }
            stopped = sweep.stopped() => {
                // the sweep only ends on its own if something went badly wrong
                error!(result = ?stopped, "sweep loop exited");
                return Err("storage sweep stopped unexpectedly".into());
            }
            _ = tokio::signal::ctrl_c() => {
                warn!("interrupted, waiting for running jobs");
                input_open = false;
                input.close();
            }
        }
    }

    app.dispatcher.drain().await;
    let counts = app.dispatcher.counts();
    info!(
        delivered = counts.delivered,
        too_large = counts.too_large,
        delivery_failed = counts.delivery_failed,
        failed = counts.failed,
        "all jobs finished"
    );
    sweep.shutdown_and_join().await?;

    Ok(if all_delivered {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Feed URLs from the arguments, or from stdin lines when there are none.
fn spawn_input(urls: Vec<String>) -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(64);
    tokio::spawn(async move {
        if !urls.is_empty() {
            for url in urls {
                if tx.send(url).await.is_err() {
                    return;
                }
            }
            return;
        }

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if tx.send(line).await.is_err() {
                        return;
                    }
                }
                Ok(None) => return,
                Err(e) => {
                    warn!(error = %e, "stdin read failed");
                    return;
                }
            }
        }
    });
    rx
}

fn request_from_line(line: &str, requester: &RequesterId, ids: &dyn IdGenerator) -> Option<JobRequest> {
    let url = line.trim();
    if !is_http_url(url) {
        return None;
    }
    Some(JobRequest::new(
        ids.generate_job_id(),
        url,
        requester.clone(),
        ChatScope::Private,
        SystemClock.now(),
    ))
}

fn print_report(report: &JobReport) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string(report)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_urls_and_flags() {
        let cli = Cli::try_parse_from([
            "audiodrop",
            "--out",
            "/tmp/music",
            "-j",
            "2",
            "--dry-run",
            "https://example.com/a",
            "https://example.com/b",
        ])
        .unwrap();
        assert_eq!(cli.out, PathBuf::from("/tmp/music"));
        assert_eq!(cli.jobs, Some(2));
        assert!(cli.dry_run);
        assert_eq!(cli.urls.len(), 2);
        assert_eq!(cli.requester, "cli");
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["audiodrop"]).unwrap();
        assert_eq!(cli.out, PathBuf::from("."));
        assert!(cli.config.is_none());
        assert!(cli.urls.is_empty());
        assert!(!cli.dry_run);
    }

    #[test]
    fn test_overrides_replace_config_values() {
        let cli = Cli::try_parse_from([
            "audiodrop",
            "--scratch-root",
            "/var/tmp/audiodrop",
            "--max-duration-secs",
            "60",
        ])
        .unwrap();
        let mut config = RelayConfig::default();
        cli.apply_overrides(&mut config);

        assert_eq!(config.scratch_root, Some(PathBuf::from("/var/tmp/audiodrop")));
        assert_eq!(config.limits.max_duration_secs, 60);
        assert_eq!(
            config.limits.max_concurrent_jobs,
            RelayConfig::default().limits.max_concurrent_jobs
        );
    }

    #[test]
    fn test_request_from_line_skips_plain_text() {
        let ids = UlidGenerator::new(SystemClock);
        let requester = RequesterId::new("cli");

        assert!(request_from_line("hello there", &requester, &ids).is_none());
        assert!(request_from_line("ftp://example.com/x", &requester, &ids).is_none());
        assert!(request_from_line("", &requester, &ids).is_none());

        let request = request_from_line("  https://example.com/watch?v=1 \n", &requester, &ids).unwrap();
        assert_eq!(request.url, "https://example.com/watch?v=1");
        assert_eq!(request.requester, requester);
        assert_eq!(request.scope, ChatScope::Private);
    }
}
