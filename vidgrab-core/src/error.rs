use std::io;

/// 提交阶段的错误，出现时不会启动任何任务
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("Enter a valid URL.")]
    EmptyUrl,

    #[error("Cannot prepare destination: {0}")]
    Destination(#[from] io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown download mode: {0:?}")]
pub struct ParseModeError(pub String);

/// 下载引擎可能产生的失败
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("network failure: {0}")]
    Network(String),

    #[error("unsupported source: {0}")]
    UnsupportedSource(String),

    #[error("post-processing failed: {0}")]
    PostProcessing(String),

    #[error("{0}")]
    Extraction(String),

    #[error("failed to launch {program}: {reason}")]
    Spawn { program: String, reason: String },

    #[error("engine exited with status {}", describe_code(.code))]
    Exit { code: Option<i32> },

    #[error("engine I/O failure: {0}")]
    Io(String),

    /// 引擎在执行中 panic
    #[error("engine crashed: {0}")]
    Crashed(String),

    #[error("download cancelled")]
    Cancelled,
}

fn describe_code(code: &Option<i32>) -> String {
    code.map_or_else(|| "unknown".to_string(), |c| c.to_string())
}

impl EngineError {
    /// 根据引擎的错误信息归类
    pub fn classify(message: &str) -> Self {
        let message = message.trim();
        let lower = message.to_lowercase();

        const UNSUPPORTED: &[&str] = &["unsupported url", "is not a valid url", "no video formats"];
        const POST_PROCESSING: &[&str] = &["postprocessing", "ffmpeg", "ffprobe", "conversion failed"];
        const NETWORK: &[&str] = &[
            "unable to download",
            "http error",
            "timed out",
            "connection",
            "getaddrinfo",
            "name or service not known",
            "network is unreachable",
            "ssl",
        ];

        let hit = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

        if hit(UNSUPPORTED) {
            Self::UnsupportedSource(message.to_string())
        } else if hit(POST_PROCESSING) {
            Self::PostProcessing(message.to_string())
        } else if hit(NETWORK) {
            Self::Network(message.to_string())
        } else {
            Self::Extraction(message.to_string())
        }
    }
}
