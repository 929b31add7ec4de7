//! ScratchDir - プロセス専用の作業ディレクトリ
//!
//! 起動のたびに新しく作ります。再起動をまたいで残す必要はありません。
//! 中に置かれるのは変換中・変換済みの artifact と、失敗した
//! ダウンロードの残骸だけです。

use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::domain::JobId;

const DIR_PREFIX: &str = "audiodrop-";
const FILE_PREFIX: &str = "audio_";

/// Owns the directory; it is removed when this value is dropped.
#[derive(Debug)]
pub struct ScratchDir {
    dir: TempDir,
}

impl ScratchDir {
    /// Create a fresh directory under `root`, or the system temp dir.
    pub fn create(root: Option<&Path>) -> std::io::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(DIR_PREFIX);
        let dir = match root {
            Some(root) => {
                std::fs::create_dir_all(root)?;
                builder.tempdir_in(root)?
            }
            None => builder.tempdir()?,
        };
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

/// `<dir>/audio_<job token>`; the extractor appends the extension.
pub fn output_prefix(dir: &Path, job_id: JobId) -> PathBuf {
    dir.join(format!("{FILE_PREFIX}{}", job_id.token()))
}

/// `<prefix>.<extension>` without touching any existing dots in the prefix.
pub fn with_extension(prefix: &Path, extension: &str) -> PathBuf {
    let mut name = prefix.as_os_str().to_os_string();
    name.push(".");
    name.push(extension);
    PathBuf::from(name)
}
