use std::{
    io,
    path::{Path, PathBuf},
};
use tracing::debug;

pub const APP_STORAGE: &str = "App Storage";
pub const DOWNLOADS: &str = "Downloads";
pub const DOCUMENTS: &str = "Documents";

/// 保存位置表：逻辑名称到绝对路径
#[derive(Debug, Clone)]
pub struct DestinationTable {
    private_dir: PathBuf,
    entries: Vec<(String, PathBuf)>,
}

impl DestinationTable {
    /// 使用平台默认的公共目录创建位置表
    ///
    /// # 参数
    /// * `private_dir` - 应用私有数据目录，未知选项回退到此目录
    pub fn new(private_dir: PathBuf) -> Self {
        let (downloads, documents) = public_dirs(&private_dir);
        Self::with_entries(
            private_dir.clone(),
            [
                (APP_STORAGE.to_string(), private_dir),
                (DOWNLOADS.to_string(), downloads),
                (DOCUMENTS.to_string(), documents),
            ],
        )
    }

    pub fn with_entries(
        private_dir: PathBuf,
        entries: impl IntoIterator<Item = (String, PathBuf)>,
    ) -> Self {
        Self {
            private_dir,
            entries: entries.into_iter().collect(),
        }
    }

    /// 所有可选位置名称
    pub fn choices(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn private_dir(&self) -> &Path {
        &self.private_dir
    }

    /// 解析位置名称，未知名称回退到私有目录
    pub fn resolve(&self, choice: &str) -> &Path {
        self.entries
            .iter()
            .find(|(name, _)| name == choice)
            .map(|(_, path)| path.as_path())
            .unwrap_or(self.private_dir.as_path())
    }

    /// 解析并确保目录存在（幂等）
    pub fn prepare(&self, choice: &str) -> io::Result<PathBuf> {
        let dir = self.resolve(choice);
        fs_err::create_dir_all(dir)?;
        debug!(choice, dir = %dir.display(), "destination ready");
        Ok(dir.to_path_buf())
    }
}

/// 应用私有数据目录
pub fn default_private_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("vidgrab")
}

#[cfg(target_os = "android")]
fn public_dirs(_private_dir: &Path) -> (PathBuf, PathBuf) {
    (
        PathBuf::from("/storage/emulated/0/Download"),
        PathBuf::from("/storage/emulated/0/Documents"),
    )
}

#[cfg(not(target_os = "android"))]
fn public_dirs(private_dir: &Path) -> (PathBuf, PathBuf) {
    (
        dirs::download_dir().unwrap_or_else(|| private_dir.join(DOWNLOADS)),
        dirs::document_dir().unwrap_or_else(|| private_dir.join(DOCUMENTS)),
    )
}
