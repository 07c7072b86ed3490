use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use vidgrab_core::{FormatPreferences, Mode, YtDlp, destination::APP_STORAGE};

/// 应用配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// yt-dlp 可执行文件
    pub ytdlp_path: PathBuf,
    /// ffmpeg 所在位置，None 时由 yt-dlp 自行查找
    pub ffmpeg_location: Option<PathBuf>,
    /// 音频模式的目标编码
    pub audio_codec: String,
    /// 未填写码率时的默认码率（kbps）
    pub default_audio_bitrate: String,
    /// 视频合并后的容器格式
    pub merge_output_format: String,
    /// 每个任务的分片并发数
    pub concurrent_fragments: u32,
    /// 同时运行的最大任务数
    pub max_concurrent_jobs: usize,
    /// 表单默认的下载模式
    pub default_mode: Mode,
    /// 表单默认的保存位置
    pub default_destination: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        let preferences = FormatPreferences::default();
        Self {
            ytdlp_path: PathBuf::from("yt-dlp"),
            ffmpeg_location: None,
            audio_codec: preferences.audio_codec,
            default_audio_bitrate: preferences.default_audio_bitrate,
            merge_output_format: preferences.merge_output_format,
            concurrent_fragments: preferences.concurrent_fragments,
            max_concurrent_jobs: 2,
            default_mode: Mode::Video,
            default_destination: APP_STORAGE.to_string(),
        }
    }
}

impl AppConfig {
    /// 从文件加载配置
    pub async fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = fs_err::tokio::read_to_string(path).await?;
            let config: AppConfig = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            // 如果配置文件不存在，返回默认配置
            Ok(Self::default())
        }
    }

    /// 保存配置到文件
    pub async fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs_err::tokio::write(path, content).await?;
        Ok(())
    }

    /// 验证配置的有效性
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_jobs == 0 {
            anyhow::bail!("max_concurrent_jobs must be greater than 0");
        }
        if self.concurrent_fragments == 0 {
            anyhow::bail!("concurrent_fragments must be greater than 0");
        }
        if self.ytdlp_path.as_os_str().is_empty() {
            anyhow::bail!("ytdlp_path must not be empty");
        }
        if self.audio_codec.trim().is_empty() {
            anyhow::bail!("audio_codec must not be empty");
        }
        if self.merge_output_format.trim().is_empty() {
            anyhow::bail!("merge_output_format must not be empty");
        }
        Ok(())
    }

    pub fn preferences(&self) -> FormatPreferences {
        FormatPreferences {
            audio_codec: self.audio_codec.clone(),
            default_audio_bitrate: self.default_audio_bitrate.clone(),
            merge_output_format: self.merge_output_format.clone(),
            concurrent_fragments: self.concurrent_fragments,
        }
    }

    pub fn engine(&self) -> YtDlp {
        YtDlp::new(&self.ytdlp_path).with_ffmpeg_location(self.ffmpeg_location.clone())
    }
}
