use crate::types::Mode;
use std::path::{Path, PathBuf};

/// 音频未指定码率时使用的默认值（kbps）
pub const DEFAULT_AUDIO_BITRATE: &str = "192";

/// 输出文件名模板，由引擎展开标题与扩展名
pub const OUTPUT_TEMPLATE: &str = "%(title)s.%(ext)s";

const BEST_VIDEO: &str = "bestvideo+bestaudio/best";
const WORST_VIDEO: &str = "worst";
const BEST_AUDIO: &str = "bestaudio/best";

/// 音频提取后处理指令
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioExtract {
    /// 目标编码，如 mp3
    pub codec: String,
    /// 目标码率，原样交给转码步骤
    pub bitrate: String,
}

/// 交给下载引擎的选项
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOptions {
    /// 输出路径模板
    pub output_template: PathBuf,
    /// 格式选择表达式
    pub format: String,
    /// 合并后的容器格式
    pub merge_output_format: String,
    /// 仅音频模式下的后处理
    pub audio: Option<AudioExtract>,
    /// 分片并发数
    pub concurrent_fragments: u32,
}

/// 组装引擎选项时使用的偏好设置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatPreferences {
    pub audio_codec: String,
    pub default_audio_bitrate: String,
    pub merge_output_format: String,
    pub concurrent_fragments: u32,
}

impl Default for FormatPreferences {
    fn default() -> Self {
        Self {
            audio_codec: "mp3".to_string(),
            default_audio_bitrate: DEFAULT_AUDIO_BITRATE.to_string(),
            merge_output_format: "mp4".to_string(),
            concurrent_fragments: 1,
        }
    }
}

impl EngineOptions {
    /// 根据模式与画质提示组装选项
    pub fn build(mode: Mode, quality: &str, destination: &Path, prefs: &FormatPreferences) -> Self {
        let quality = quality.trim();
        let (format, audio) = match mode {
            Mode::Audio => (
                BEST_AUDIO.to_string(),
                Some(AudioExtract {
                    codec: prefs.audio_codec.clone(),
                    bitrate: audio_bitrate(quality, &prefs.default_audio_bitrate).to_string(),
                }),
            ),
            Mode::Video => (video_format(quality), None),
        };

        Self {
            output_template: destination.join(OUTPUT_TEMPLATE),
            format,
            merge_output_format: prefs.merge_output_format.clone(),
            audio,
            concurrent_fragments: prefs.concurrent_fragments,
        }
    }
}

/// 视频格式选择表达式
///
/// 空值或 `best` 选择最佳合并流，`worst` 选择最差流，其他值视为目标高度，
/// 依次回退到最佳可用流，保证不会仅因高度不存在而失败。
pub fn video_format(quality: &str) -> String {
    let quality = quality.trim();
    if quality.is_empty() || quality.eq_ignore_ascii_case("best") {
        return BEST_VIDEO.to_string();
    }
    if quality.eq_ignore_ascii_case("worst") {
        return WORST_VIDEO.to_string();
    }

    let height = quality
        .strip_suffix(['p', 'P'])
        .filter(|h| !h.is_empty())
        .unwrap_or(quality);
    format!("bestvideo[height={height}]+bestaudio/best/best")
}

/// 音频码率，空值时使用默认码率
pub fn audio_bitrate<'a>(quality: &'a str, default: &'a str) -> &'a str {
    match quality.trim() {
        "" => default,
        q => q,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn best_or_empty_selects_best_combined_stream() {
        for quality in ["", "best", "BEST", "  Best "] {
            assert_eq!(video_format(quality), "bestvideo+bestaudio/best");
        }
    }

    #[test]
    fn worst_selects_lowest_stream() {
        assert_eq!(video_format("worst"), "worst");
    }

    #[test]
    fn height_falls_back_to_best() {
        assert_eq!(
            video_format("720"),
            "bestvideo[height=720]+bestaudio/best/best"
        );
        assert_eq!(
            video_format("1080p"),
            "bestvideo[height=1080]+bestaudio/best/best"
        );
    }

    #[test]
    fn audio_bitrate_defaults_to_192() {
        let options = EngineOptions::build(
            Mode::Audio,
            "",
            Path::new("/music"),
            &FormatPreferences::default(),
        );
        assert_eq!(options.format, "bestaudio/best");
        assert_eq!(
            options.audio,
            Some(AudioExtract {
                codec: "mp3".to_string(),
                bitrate: "192".to_string(),
            })
        );
    }

    #[test]
    fn audio_bitrate_is_passed_verbatim() {
        let options = EngineOptions::build(
            Mode::Audio,
            " 320 ",
            Path::new("/music"),
            &FormatPreferences::default(),
        );
        assert_eq!(options.audio.map(|a| a.bitrate), Some("320".to_string()));
    }

    #[test]
    fn video_options_use_destination_template() {
        let options = EngineOptions::build(
            Mode::Video,
            "720",
            Path::new("/videos"),
            &FormatPreferences::default(),
        );
        assert_eq!(
            options.output_template,
            Path::new("/videos").join("%(title)s.%(ext)s")
        );
        assert_eq!(options.merge_output_format, "mp4");
        assert_eq!(options.concurrent_fragments, 1);
        assert!(options.audio.is_none());
    }
}
