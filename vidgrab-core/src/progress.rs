use crate::types::{EngineStatus, JobResult, ProgressEvent, UpdateKind};
use tracing::trace;

pub const STARTING_TEXT: &str = "Starting...";
pub const MERGING_TEXT: &str = "Download complete. Merging...";

/// 解析形如 "57.3%" 的百分比字符串
///
/// 解析失败返回 None，结果限制在 [0, 100]。
pub fn parse_percent(text: &str) -> Option<f32> {
    let number = text.trim().trim_end_matches('%').trim();
    match number.parse::<f32>() {
        Ok(value) if value.is_finite() => Some(value.clamp(0.0, 100.0)),
        _ => {
            trace!(text, "unparseable percent");
            None
        }
    }
}

/// 下载中的状态文本
pub fn downloading_text(event: &ProgressEvent) -> String {
    format!(
        "Downloading: {}% | {} | ETA {}",
        event.percent.trim().trim_end_matches('%').trim(),
        event.speed.trim(),
        event.eta.trim()
    )
}

/// 最终结果的状态文本
pub fn terminal_text(result: &JobResult) -> String {
    match result {
        Ok(dir) => format!("Saved to: {}", dir.display()),
        Err(e) => format!("Error: {e}"),
    }
}

/// 将引擎事件转换为界面更新
///
/// 引擎的 error 状态不转发，失败由最终结果报告。
pub fn translate(event: &ProgressEvent) -> Option<UpdateKind> {
    match event.status {
        EngineStatus::Downloading => Some(UpdateKind::Progress {
            status: EngineStatus::Downloading,
            percent: parse_percent(&event.percent),
            text: downloading_text(event),
        }),
        EngineStatus::Finished => Some(UpdateKind::Progress {
            status: EngineStatus::Finished,
            percent: Some(100.0),
            text: MERGING_TEXT.to_string(),
        }),
        EngineStatus::Error => None,
    }
}
