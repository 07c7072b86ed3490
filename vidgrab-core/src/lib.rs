//! 视频下载任务的提交、执行与进度上报
//!
//! 提交器校验参数并为每个任务启动后台任务；后台任务驱动外部引擎，
//! 所有状态变化以不可变的 [`JobUpdate`] 经通道送往界面线程，由
//! [`StatusBoard`] 在界面线程上应用。

pub mod bridge;
pub mod destination;
pub mod engine;
pub mod error;
pub mod format;
pub mod progress;
pub mod status;
pub mod submitter;
pub mod types;

pub use bridge::Reporter;
pub use destination::DestinationTable;
pub use engine::{Engine, YtDlp};
pub use error::{EngineError, SubmitError};
pub use format::{EngineOptions, FormatPreferences};
pub use status::{JobState, JobStatus, StatusBoard};
pub use submitter::{JobHandle, Submitter};
pub use tokio_util::sync::CancellationToken;
pub use types::{JobDescriptor, JobId, JobResult, JobUpdate, Mode, ProgressEvent, UpdateKind};
