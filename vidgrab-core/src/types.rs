use crate::{
    error::{EngineError, ParseModeError},
    format::EngineOptions,
};
use serde::{Deserialize, Serialize};
use std::{fmt, path::PathBuf, str::FromStr};
use uuid::Uuid;

/// 任务唯一标识符，按创建时间有序
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// 界面上使用的短标识
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 下载模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Mode {
    /// 视频（音视频合并）
    #[default]
    Video,
    /// 仅音频（转码）
    Audio,
}

impl Mode {
    pub const ALL: [Mode; 2] = [Mode::Video, Mode::Audio];

    pub fn label(&self) -> &'static str {
        match self {
            Mode::Video => "Video",
            Mode::Audio => "Audio",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Mode {
    type Err = ParseModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Mode::ALL
            .into_iter()
            .find(|mode| mode.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseModeError(s.to_string()))
    }
}

/// 下载任务描述，提交时创建，此后不可变
#[derive(Debug, Clone)]
pub struct JobDescriptor {
    /// 任务 ID
    pub id: JobId,
    /// 源 URL（已去除首尾空白，非空）
    pub url: String,
    /// 下载模式
    pub mode: Mode,
    /// 画质/码率提示
    pub quality: String,
    /// 目标目录（任务启动前已存在）
    pub destination: PathBuf,
    /// 交给下载引擎的选项
    pub options: EngineOptions,
}

/// 引擎上报的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStatus {
    /// 正在下载
    Downloading,
    /// 单个文件下载完成（可能仍需合并/转码）
    Finished,
    /// 引擎报告错误
    Error,
}

impl FromStr for EngineStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "downloading" => Ok(Self::Downloading),
            "finished" => Ok(Self::Finished),
            "error" => Ok(Self::Error),
            _ => Err(()),
        }
    }
}

/// 引擎进度事件，字符串均为展示用，不保证可解析
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub status: EngineStatus,
    /// 形如 "57.3%"
    pub percent: String,
    pub speed: String,
    pub eta: String,
}

/// 任务最终结果：成功时为目标目录
pub type JobResult = Result<PathBuf, EngineError>;

/// 发往界面线程的更新
#[derive(Debug, Clone)]
pub struct JobUpdate {
    pub job_id: JobId,
    pub kind: UpdateKind,
}

#[derive(Debug, Clone)]
pub enum UpdateKind {
    /// 任务开始
    Starting,
    /// 任务进度；percent 解析失败时为 None
    Progress {
        status: EngineStatus,
        percent: Option<f32>,
        text: String,
    },
    /// 任务结束，每个任务恰好一次
    Finished(JobResult),
}
