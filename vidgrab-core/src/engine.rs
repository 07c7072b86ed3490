use crate::{
    error::EngineError,
    types::{EngineStatus, JobDescriptor, ProgressEvent},
};
use std::{
    ffi::OsString,
    future::Future,
    path::{Path, PathBuf},
    process::Stdio,
};
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, BufReader},
    process::Command,
    sync::mpsc,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// 进度行前缀，用于从引擎输出中识别进度
pub const PROGRESS_PREFIX: &str = "[vidgrab]";

const PROGRESS_TEMPLATE: &str = "download:[vidgrab] %(progress.status)s|%(progress._percent_str)s|%(progress._speed_str)s|%(progress._eta_str)s";

/// 外部下载引擎
///
/// 引擎通过 `progress` 按产生顺序上报进度，并在每次上报时检查 `cancel`。
/// 返回时必须释放 `progress`，以便调用方确认所有进度已送达。
pub trait Engine: Send + Sync {
    fn download(
        &self,
        job: &JobDescriptor,
        progress: mpsc::Sender<ProgressEvent>,
        cancel: CancellationToken,
    ) -> impl Future<Output = Result<(), EngineError>> + Send;
}

/// 以子进程方式驱动 yt-dlp
#[derive(Debug, Clone)]
pub struct YtDlp {
    program: PathBuf,
    ffmpeg_location: Option<PathBuf>,
}

impl Default for YtDlp {
    fn default() -> Self {
        Self::new("yt-dlp")
    }
}

impl YtDlp {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            ffmpeg_location: None,
        }
    }

    pub fn with_ffmpeg_location(mut self, location: Option<PathBuf>) -> Self {
        self.ffmpeg_location = location;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// 由任务选项生成命令行参数
    pub fn args(&self, job: &JobDescriptor) -> Vec<OsString> {
        let options = &job.options;
        let mut args: Vec<OsString> = vec![
            "--newline".into(),
            "--no-colors".into(),
            "--no-warnings".into(),
            "--progress".into(),
            "--progress-template".into(),
            PROGRESS_TEMPLATE.into(),
            "-f".into(),
            options.format.clone().into(),
            "-o".into(),
            options.output_template.clone().into(),
            "--merge-output-format".into(),
            options.merge_output_format.clone().into(),
            "--concurrent-fragments".into(),
            options.concurrent_fragments.to_string().into(),
        ];

        if let Some(audio) = &options.audio {
            args.extend([
                "-x".into(),
                "--audio-format".into(),
                audio.codec.clone().into(),
                "--audio-quality".into(),
                audio.bitrate.clone().into(),
            ]);
        }

        if let Some(ffmpeg) = &self.ffmpeg_location {
            args.extend(["--ffmpeg-location".into(), ffmpeg.clone().into_os_string()]);
        }

        args.extend(["--".into(), job.url.clone().into()]);
        args
    }
}

impl Engine for YtDlp {
    async fn download(
        &self,
        job: &JobDescriptor,
        progress: mpsc::Sender<ProgressEvent>,
        cancel: CancellationToken,
    ) -> Result<(), EngineError> {
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        let args = self.args(job);
        debug!(job_id = %job.id, program = %self.program.display(), ?args, "launching engine");

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| EngineError::Spawn {
                program: self.program.display().to_string(),
                reason: e.to_string(),
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| EngineError::Io("stdout not captured".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| EngineError::Io("stderr not captured".to_string()))?;
        let stderr_task = tokio::spawn(last_error(stderr));

        let mut lines = BufReader::new(stdout).lines();
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(job_id = %job.id, "cancelling engine");
                    if let Err(e) = child.kill().await {
                        warn!(job_id = %job.id, "failed to kill engine: {e}");
                    }
                    stderr_task.abort();
                    return Err(EngineError::Cancelled);
                }
                line = lines.next_line() => {
                    let Some(line) = line.map_err(|e| EngineError::Io(e.to_string()))? else {
                        break;
                    };
                    match parse_progress_line(&line) {
                        Some(event) => {
                            if progress.send(event).await.is_err() {
                                trace!(job_id = %job.id, "progress receiver dropped");
                            }
                        }
                        None => trace!(job_id = %job.id, line = %line, "engine output"),
                    }
                }
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| EngineError::Io(e.to_string()))?;
        let message = stderr_task.await.unwrap_or_default();

        if status.success() {
            return Ok(());
        }
        Err(match message {
            Some(message) => EngineError::classify(&message),
            None => EngineError::Exit {
                code: status.code(),
            },
        })
    }
}

/// 解析进度模板输出的一行
///
/// 格式：`[vidgrab] <status>|<percent>|<speed>|<eta>`
pub fn parse_progress_line(line: &str) -> Option<ProgressEvent> {
    let rest = line.trim().strip_prefix(PROGRESS_PREFIX)?;
    let mut fields = rest.trim_start().splitn(4, '|');

    let status = fields.next()?.parse::<EngineStatus>().ok()?;
    let mut next = || fields.next().unwrap_or_default().trim().to_string();

    Some(ProgressEvent {
        status,
        percent: next(),
        speed: next(),
        eta: next(),
    })
}

/// 读取 stderr，返回最后一条 `ERROR:` 信息，没有时返回最后一个非空行
async fn last_error<R: AsyncRead + Unpin>(stderr: R) -> Option<String> {
    let mut lines = BufReader::new(stderr).lines();
    let mut error = None;
    let mut last = None;

    while let Ok(Some(line)) = lines.next_line().await {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        trace!(line, "engine stderr");
        if let Some(message) = line.strip_prefix("ERROR:") {
            error = Some(message.trim().to_string());
        } else {
            last = Some(line.to_string());
        }
    }

    error.or(last)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        format::{EngineOptions, FormatPreferences},
        types::{JobId, Mode},
    };
    use std::time::Duration;

    fn job(mode: Mode, quality: &str, url: &str) -> JobDescriptor {
        let destination = PathBuf::from("/videos");
        JobDescriptor {
            id: JobId::new(),
            url: url.to_string(),
            mode,
            quality: quality.to_string(),
            options: EngineOptions::build(mode, quality, &destination, &FormatPreferences::default()),
            destination,
        }
    }

    fn position(args: &[OsString], flag: &str) -> usize {
        args.iter()
            .position(|a| a == flag)
            .unwrap_or_else(|| panic!("missing {flag}"))
    }

    #[test]
    fn parses_progress_lines() {
        let event = parse_progress_line("[vidgrab] downloading|  57.3%|2.50MiB/s|00:12").unwrap();
        assert_eq!(event.status, EngineStatus::Downloading);
        assert_eq!(event.percent, "57.3%");
        assert_eq!(event.speed, "2.50MiB/s");
        assert_eq!(event.eta, "00:12");

        let event = parse_progress_line("[vidgrab] finished|NA|NA|NA").unwrap();
        assert_eq!(event.status, EngineStatus::Finished);
    }

    #[test]
    fn ignores_other_output() {
        assert!(parse_progress_line("[youtube] abc: Downloading webpage").is_none());
        assert!(parse_progress_line("[vidgrab] paused|1%|x|y").is_none());
    }

    #[test]
    fn missing_fields_are_empty() {
        let event = parse_progress_line("[vidgrab] downloading|12%").unwrap();
        assert_eq!(event.percent, "12%");
        assert_eq!(event.speed, "");
        assert_eq!(event.eta, "");
    }

    #[test]
    fn video_args_select_format_and_container() {
        let args = YtDlp::default().args(&job(Mode::Video, "720", "https://example.com/v"));

        let f = position(&args, "-f");
        assert_eq!(args[f + 1], "bestvideo[height=720]+bestaudio/best/best");
        let merge = position(&args, "--merge-output-format");
        assert_eq!(args[merge + 1], "mp4");
        assert!(!args.iter().any(|a| a == "-x"));
        // --quiet 会把进度输出改到 stderr
        position(&args, "--progress");
        position(&args, "--newline");
        assert!(!args.iter().any(|a| a == "--quiet" || a == "-q"));
        assert_eq!(args[args.len() - 2], "--");
        assert_eq!(args[args.len() - 1], "https://example.com/v");
    }

    #[test]
    fn audio_args_request_extraction() {
        let engine = YtDlp::new("yt-dlp").with_ffmpeg_location(Some(PathBuf::from("/opt/ffmpeg")));
        let args = engine.args(&job(Mode::Audio, "", "https://example.com/a"));

        assert!(args.iter().any(|a| a == "-x"));
        let format = position(&args, "--audio-format");
        assert_eq!(args[format + 1], "mp3");
        let quality = position(&args, "--audio-quality");
        assert_eq!(args[quality + 1], "192");
        let ffmpeg = position(&args, "--ffmpeg-location");
        assert_eq!(args[ffmpeg + 1], "/opt/ffmpeg");
    }

    #[tokio::test]
    async fn missing_program_is_spawn_error() {
        let engine = YtDlp::new("/nonexistent/vidgrab-engine");
        let (tx, _rx) = mpsc::channel(8);
        let result = engine
            .download(&job(Mode::Video, "", "https://example.com"), tx, CancellationToken::new())
            .await;
        assert!(matches!(result, Err(EngineError::Spawn { .. })));
    }

    #[tokio::test]
    async fn cancelled_before_start() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let (tx, _rx) = mpsc::channel(8);
        let result = YtDlp::default()
            .download(&job(Mode::Video, "", "https://example.com"), tx, cancel)
            .await;
        assert_eq!(result, Err(EngineError::Cancelled));
    }

    #[tokio::test]
    async fn last_error_prefers_error_lines() {
        let stderr: &[u8] = b"WARNING: slow\nERROR: Unsupported URL: x\ntrailing noise\n";
        assert_eq!(last_error(stderr).await.as_deref(), Some("Unsupported URL: x"));

        let stderr: &[u8] = b"\nsomething broke\n";
        assert_eq!(last_error(stderr).await.as_deref(), Some("something broke"));

        let stderr: &[u8] = b"";
        assert_eq!(last_error(stderr).await, None);
    }

    #[cfg(unix)]
    fn write_script(dir: &Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let script = dir.join(format!("fake-engine-{}", JobId::new().short()));
        std::fs::write(&script, format!("#!/bin/sh\n{body}")).unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        script
    }

    // 所有脚本在同一个测试中顺序执行
    #[cfg(unix)]
    #[tokio::test]
    async fn drives_engine_process() {
        let dir = tempfile::tempdir().unwrap();

        let script = write_script(
            dir.path(),
            "echo '[info] extracting'\n\
             echo '[vidgrab] downloading|  10.0%|1.00MiB/s|00:09'\n\
             echo '[vidgrab] downloading|N/A%|N/A|N/A'\n\
             echo '[vidgrab] finished|100%|N/A|N/A'\n\
             exit 0\n",
        );
        let (tx, mut rx) = mpsc::channel(8);
        YtDlp::new(&script)
            .download(&job(Mode::Video, "", "https://example.com"), tx, CancellationToken::new())
            .await
            .unwrap();

        let mut statuses = Vec::new();
        while let Some(event) = rx.recv().await {
            statuses.push((event.status, event.percent));
        }
        assert_eq!(
            statuses,
            [
                (EngineStatus::Downloading, "10.0%".to_string()),
                (EngineStatus::Downloading, "N/A%".to_string()),
                (EngineStatus::Finished, "100%".to_string()),
            ]
        );

        let script = write_script(
            dir.path(),
            "echo 'ERROR: [generic] Unsupported URL: https://example.com' >&2\nexit 1\n",
        );
        let (tx, _rx) = mpsc::channel(8);
        let result = YtDlp::new(&script)
            .download(&job(Mode::Video, "", "https://example.com"), tx, CancellationToken::new())
            .await;
        assert!(matches!(result, Err(EngineError::UnsupportedSource(_))));

        // 运行中取消：进程被杀掉，任务以 Cancelled 结束
        let script = write_script(
            dir.path(),
            "echo '[vidgrab] downloading|  1.0%|1.00MiB/s|00:30'\nexec sleep 30\n",
        );
        let engine = YtDlp::new(&script);
        let running = job(Mode::Video, "", "https://example.com");
        let cancel = CancellationToken::new();
        let (tx, mut rx) = mpsc::channel(8);
        let download = engine.download(&running, tx, cancel.clone());
        let cancel_after_first = async {
            let first = rx.recv().await;
            cancel.cancel();
            first
        };
        let (result, first) = tokio::time::timeout(Duration::from_secs(10), async {
            tokio::join!(download, cancel_after_first)
        })
        .await
        .expect("engine kept running after cancel");
        assert_eq!(first.map(|event| event.percent).as_deref(), Some("1.0%"));
        assert_eq!(result, Err(EngineError::Cancelled));
    }
}
