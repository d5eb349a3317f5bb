//! 脚本包加载
//!
//! 加载由 [`SourceLoader`] 协作者完成，结果通过 [`SourceCompletion`] 的两个互斥出口
//! （成功/失败）回到桥接。每次加载带一个代号，被重载取代的加载结果会被忽略。

use super::handle::{BridgeHandle, BridgeMessage};
use crate::core::{SourceError, SourceResult};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use url::Url;

/// 一次加载请求的完成通知
///
/// 只能完成一次。未完成就被丢弃时按加载失败处理。
#[derive(Debug)]
pub struct SourceCompletion {
    generation: u64,
    url: Url,
    handle: Option<BridgeHandle>,
}

impl SourceCompletion {
    pub(crate) fn new(generation: u64, url: Url, handle: BridgeHandle) -> Self {
        Self {
            generation,
            url,
            handle: Some(handle),
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// 加载成功
    pub fn finished(mut self, source: String) {
        if let Some(handle) = self.handle.take() {
            handle.send(BridgeMessage::SourcesFinished {
                generation: self.generation,
                source,
            });
        }
    }

    /// 加载失败
    pub fn failed(mut self, error: SourceError) {
        if let Some(handle) = self.handle.take() {
            handle.send(BridgeMessage::SourcesLoadFailed {
                generation: self.generation,
                error,
            });
        }
    }
}

impl Drop for SourceCompletion {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            tracing::warn!(target: "source", url = %self.url, "Source loader dropped the request");
            handle.send(BridgeMessage::SourcesLoadFailed {
                generation: self.generation,
                error: SourceError::Read {
                    path: self.url.to_string(),
                    reason: "loader dropped the request without completing it".to_string(),
                },
            });
        }
    }
}

/// 脚本包加载协作者
pub trait SourceLoader {
    /// 开始加载，可以同步完成，也可以把 `completion` 交给其他线程
    fn load(&self, completion: SourceCompletion);
}

/// 同步读取本地文件
#[derive(Debug, Default, Clone, Copy)]
pub struct FileSourceLoader;

impl SourceLoader for FileSourceLoader {
    fn load(&self, completion: SourceCompletion) {
        let path = match bundle_path(completion.url()) {
            Ok(path) => path,
            Err(e) => return completion.failed(e),
        };
        match fs::read_to_string(&path) {
            Ok(source) => {
                tracing::debug!(target: "source", path = %path.display(), bytes = source.len(), "Bundle read");
                completion.finished(source);
            }
            Err(e) => completion.failed(SourceError::Read {
                path: path.display().to_string(),
                reason: e.to_string(),
            }),
        }
    }
}

/// 在 tokio 运行时上异步读取本地文件
#[derive(Debug, Clone)]
pub struct TokioSourceLoader {
    runtime: tokio::runtime::Handle,
}

impl TokioSourceLoader {
    pub fn new(runtime: tokio::runtime::Handle) -> Self {
        Self { runtime }
    }

    /// 使用当前所在的运行时，不在运行时中时返回 `None`
    pub fn current() -> Option<Self> {
        tokio::runtime::Handle::try_current().ok().map(Self::new)
    }
}

impl SourceLoader for TokioSourceLoader {
    fn load(&self, completion: SourceCompletion) {
        let path = match bundle_path(completion.url()) {
            Ok(path) => path,
            Err(e) => return completion.failed(e),
        };
        self.runtime.spawn(async move {
            match tokio::fs::read_to_string(&path).await {
                Ok(source) => {
                    tracing::debug!(target: "source", path = %path.display(), bytes = source.len(), "Bundle read");
                    completion.finished(source);
                }
                Err(e) => completion.failed(SourceError::Read {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                }),
            }
        });
    }
}

/// 脚本包URL对应的本地路径，只支持 `file://`
pub fn bundle_path(url: &Url) -> SourceResult<PathBuf> {
    if url.scheme() != "file" {
        return Err(SourceError::UnsupportedScheme(url.scheme().to_string()));
    }
    url.to_file_path().map_err(|_| SourceError::InvalidUrl {
        url: url.to_string(),
        reason: "not a local file path".to_string(),
    })
}

/// 解析脚本包地址
///
/// 接受完整URL，也接受本地路径（相对路径按当前目录展开）。
pub fn parse_bundle_url(raw: &str) -> SourceResult<Url> {
    let raw = raw.trim();
    let invalid = |reason: String| SourceError::InvalidUrl {
        url: raw.to_string(),
        reason,
    };
    if raw.is_empty() {
        return Err(invalid("empty url".to_string()));
    }

    match Url::parse(raw) {
        Ok(url) => Ok(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let path = Path::new(raw);
            let absolute = if path.is_absolute() {
                path.to_path_buf()
            } else {
                env::current_dir()
                    .map_err(|e| invalid(e.to_string()))?
                    .join(path)
            };
            Url::from_file_path(&absolute).map_err(|_| invalid("not an absolute path".to_string()))
        }
        Err(e) => Err(invalid(e.to_string())),
    }
}
