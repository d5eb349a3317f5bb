//! 模块清单
//!
//! `plugins_path` 目录下的每个 `*.toml` 文件声明一组脚本侧模块：
//!
//! ```toml
//! [[modules]]
//! name = "Timing"
//! methods = [{ name = "createTimer" }, { name = "fetch", kind = "promise" }]
//! ```
//!
//! 清单按文件名排序加载，保证模块ID在多次启动之间稳定。

use super::MethodSpec;
use crate::config::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// 清单中声明的模块
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestModule {
    pub name: String,
    #[serde(default)]
    pub methods: Vec<MethodSpec>,
}

/// 一个清单文件
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleManifest {
    #[serde(default)]
    pub modules: Vec<ManifestModule>,
}

impl ModuleManifest {
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content).map_err(|e| match e {
            ConfigError::ParseError(msg) => {
                ConfigError::ParseError(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })
    }

    /// 扫描目录下的所有清单，返回按文件名排序后展开的模块列表
    ///
    /// 目录不存在时返回空列表。
    pub fn discover<P: AsRef<Path>>(dir: P) -> ConfigResult<Vec<ManifestModule>> {
        let dir = dir.as_ref();
        if !dir.exists() {
            tracing::debug!(target: "registry", path = %dir.display(), "Plugins path does not exist");
            return Ok(Vec::new());
        }

        let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.is_file() && path.extension().and_then(|e| e.to_str()) == Some("toml")
            })
            .collect();
        paths.sort();

        let mut modules = Vec::new();
        for path in paths {
            let manifest = Self::from_file(&path)?;
            tracing::debug!(
                target: "registry",
                path = %path.display(),
                modules = manifest.modules.len(),
                "Loaded module manifest"
            );
            modules.extend(manifest.modules);
        }
        Ok(modules)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::MethodKind;

    #[test]
    fn test_parse_manifest() {
        let manifest = ModuleManifest::from_toml_str(
            r#"
            [[modules]]
            name = "Timing"
            methods = [{ name = "createTimer" }, { name = "deleteTimer" }]

            [[modules]]
            name = "Storage"
            methods = [{ name = "getItem", kind = "promise" }]
            "#,
        )
        .unwrap();

        assert_eq!(manifest.modules.len(), 2);
        assert_eq!(manifest.modules[0].methods[1].name, "deleteTimer");
        assert_eq!(manifest.modules[1].methods[0].kind, MethodKind::Promise);
    }

    #[test]
    fn test_discover_sorted() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("b.toml"),
            "[[modules]]\nname = \"Second\"\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("a.toml"),
            "[[modules]]\nname = \"First\"\nmethods = [{ name = \"go\" }]\n",
        )
        .unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let modules = ModuleManifest::discover(dir.path()).unwrap();
        let names: Vec<_> = modules.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["First", "Second"]);
        assert!(modules[1].methods.is_empty());
    }

    #[test]
    fn test_discover_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let modules = ModuleManifest::discover(dir.path().join("missing")).unwrap();
        assert!(modules.is_empty());
    }

    #[test]
    fn test_invalid_manifest_names_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("broken.toml"), "[[modules]]\nmethods = 3\n").unwrap();

        match ModuleManifest::discover(dir.path()) {
            Err(ConfigError::ParseError(msg)) => assert!(msg.contains("broken.toml")),
            other => panic!("expected parse error, got {other:?}"),
        }
    }
}
