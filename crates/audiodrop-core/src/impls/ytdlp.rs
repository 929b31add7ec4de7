//! YtDlpExtractor - yt-dlp を子プロセスとして呼ぶ MediaExtractor
//!
//! tokio::process で起動するので、変換中もランタイムのスレッドは塞ぎません。
//! `kill_on_drop` を付けているため、タイムアウトで future が落とされると
//! 子プロセスも止まります。

use async_trait::async_trait;
use serde::Deserialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use tokio::process::Command;
use tracing::debug;

use crate::config::{AudioConfig, ExtractorConfig};
use crate::domain::MediaInfo;
use crate::ports::{ExtractorError, MediaExtractor};

const UNKNOWN_TITLE: &str = "Unknown";

pub struct YtDlpExtractor {
    program: PathBuf,
    extra_args: Vec<String>,
    ffmpeg_location: Option<PathBuf>,
}

impl YtDlpExtractor {
    pub fn new(config: &ExtractorConfig) -> Self {
        Self {
            program: config.program.clone(),
            extra_args: config.extra_args.clone(),
            ffmpeg_location: config.ffmpeg_location.clone(),
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.extra_args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    async fn run(&self, mut cmd: Command) -> Result<Output, ExtractorError> {
        let output = cmd.output().await.map_err(|e| {
            ExtractorError::Failed(format!(
                "failed to launch {}: {e}",
                self.program.display()
            ))
        })?;
        if output.status.success() {
            Ok(output)
        } else {
            let message = failure_message(&output.stderr, &output.status.to_string());
            Err(ExtractorError::from_message(message))
        }
    }
}

/// Arguments for the download + transcode step.
fn fetch_args(url: &str, output_prefix: &Path, audio: &AudioConfig) -> Vec<OsString> {
    let mut template = output_prefix.as_os_str().to_os_string();
    template.push(".%(ext)s");

    let mut args: Vec<OsString> = [
        "--no-playlist",
        "--quiet",
        "--no-progress",
        "-f",
        "bestaudio/best",
        "--extract-audio",
        "--audio-format",
        audio.codec.as_str(),
        "--audio-quality",
    ]
    .into_iter()
    .map(OsString::from)
    .collect();
    args.push(format!("{}K", audio.bitrate_kbps).into());
    args.push("-o".into());
    args.push(template);
    args.push("--".into());
    args.push(url.into());
    args
}

#[derive(Debug, Deserialize)]
struct ProbeJson {
    title: Option<String>,
    duration: Option<f64>,
}

fn parse_probe_output(stdout: &[u8]) -> Result<MediaInfo, ExtractorError> {
    let probe: ProbeJson = serde_json::from_slice(stdout)
        .map_err(|e| ExtractorError::Failed(format!("unreadable probe output: {e}")))?;

    let title = probe
        .title
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| UNKNOWN_TITLE.to_string());
    let duration_secs = probe
        .duration
        .filter(|d| d.is_finite() && *d > 0.0)
        .map(|d| d.ceil() as u64);

    Ok(MediaInfo::new(title, duration_secs))
}

/// Pick the most useful line of stderr: the first `ERROR:` line, else the
/// last non-empty one, else the exit status.
fn failure_message(stderr: &[u8], status: &str) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().map(str::trim).filter(|l| !l.is_empty()).collect();

    lines
        .iter()
        .find(|l| l.starts_with("ERROR:"))
        .or_else(|| lines.last())
        .map(|l| l.to_string())
        .unwrap_or_else(|| format!("extractor exited with {status}"))
}

#[async_trait]
impl MediaExtractor for YtDlpExtractor {
    async fn probe(&self, url: &str) -> Result<MediaInfo, ExtractorError> {
        let mut cmd = self.command();
        cmd.args(["--dump-single-json", "--skip-download", "--no-playlist", "--no-warnings", "--"])
            .arg(url);

        debug!(url, "probing");
        let output = self.run(cmd).await?;
        parse_probe_output(&output.stdout)
    }

    async fn fetch(
        &self,
        url: &str,
        output_prefix: &Path,
        audio: &AudioConfig,
    ) -> Result<(), ExtractorError> {
        let mut cmd = self.command();
        if let Some(ffmpeg) = &self.ffmpeg_location {
            cmd.arg("--ffmpeg-location").arg(ffmpeg);
        }
        cmd.args(fetch_args(url, output_prefix, audio));

        debug!(url, prefix = %output_prefix.display(), "fetching");
        self.run(cmd).await.map(|_| ())
    }
}
