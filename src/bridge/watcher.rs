//! 脚本包文件监视
//!
//! 监视脚本包所在目录，文件被修改或重新创建时通过句柄请求重载。

use super::handle::BridgeHandle;
use crate::core::{SourceError, SourceResult};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};

/// 脚本包监视器，丢弃即停止监视
pub struct BundleWatcher {
    path: PathBuf,
    _watcher: RecommendedWatcher,
}

impl BundleWatcher {
    pub fn watch(path: impl Into<PathBuf>, handle: BridgeHandle) -> SourceResult<Self> {
        let path = path.into();
        let directory = path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf();
        let file_name = path
            .file_name()
            .map(|name| name.to_os_string())
            .ok_or_else(|| SourceError::Watch(format!("{} is not a file", path.display())))?;

        let mut watcher = notify::recommended_watcher(move |result: Result<Event, notify::Error>| {
            let event = match result {
                Ok(event) => event,
                Err(e) => {
                    tracing::warn!(target: "source", error = %e, "Bundle watcher error");
                    return;
                }
            };
            if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                return;
            }
            if event
                .paths
                .iter()
                .any(|changed| changed.file_name() == Some(file_name.as_os_str()))
            {
                tracing::info!(target: "source", "Bundle changed, requesting reload");
                handle.request_reload();
            }
        })
        .map_err(|e| SourceError::Watch(e.to_string()))?;

        watcher
            .watch(&directory, RecursiveMode::NonRecursive)
            .map_err(|e| SourceError::Watch(e.to_string()))?;

        tracing::debug!(target: "source", path = %path.display(), "Watching bundle");
        Ok(Self {
            path,
            _watcher: watcher,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Debug for BundleWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BundleWatcher").field("path", &self.path).finish()
    }
}
