//! 模块注册表
//!
//! 以注册顺序为下标的模块描述数组，加上注册时建好的 名称→ID 索引。
//! 进入就绪状态后注册表被封存，模块集合和ID在整个脚本包生命周期内保持不变。

use super::{
    InvokeContext, MethodDescriptor, MethodId, MethodSpec, ModuleDescriptor, ModuleId,
    NativeModule,
};
use crate::core::{BridgeResult, RegistryError, RegistryResult};
use serde_json::{json, Value};
use std::collections::HashMap;

struct ModuleEntry {
    descriptor: ModuleDescriptor,
    method_index: HashMap<String, MethodId>,
    /// 脚本侧声明的模块没有原生实现
    implementation: Option<Box<dyn NativeModule>>,
}

#[derive(Default)]
pub struct ModuleRegistry {
    entries: Vec<ModuleEntry>,
    by_name: HashMap<String, ModuleId>,
    sealed: bool,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册原生模块，返回分配的模块ID
    pub fn register_module(&mut self, module: Box<dyn NativeModule>) -> RegistryResult<ModuleId> {
        let name = module.name().to_string();
        let methods = module.methods();
        self.insert(name, methods, Some(module))
    }

    /// 注册只在脚本侧实现的模块（只有名称和方法，用于编码发往脚本的调用）
    pub fn register_declared(
        &mut self,
        name: impl Into<String>,
        methods: Vec<MethodSpec>,
    ) -> RegistryResult<ModuleId> {
        self.insert(name.into(), methods, None)
    }

    fn insert(
        &mut self,
        name: String,
        methods: Vec<MethodSpec>,
        implementation: Option<Box<dyn NativeModule>>,
    ) -> RegistryResult<ModuleId> {
        if self.sealed {
            return Err(RegistryError::Sealed(name));
        }
        if self.by_name.contains_key(&name) {
            return Err(RegistryError::DuplicateModule(name));
        }

        let mut method_index = HashMap::with_capacity(methods.len());
        let mut descriptors = Vec::with_capacity(methods.len());
        for (index, spec) in methods.into_iter().enumerate() {
            let id = MethodId(index as u32);
            if method_index.insert(spec.name.clone(), id).is_some() {
                return Err(RegistryError::DuplicateMethod {
                    module: name,
                    method: spec.name,
                });
            }
            descriptors.push(MethodDescriptor {
                id,
                name: spec.name,
                kind: spec.kind,
            });
        }

        let id = ModuleId(self.entries.len() as u32);
        tracing::debug!(
            target: "registry",
            module = %name,
            module_id = id.0,
            methods = descriptors.len(),
            native = implementation.is_some(),
            "Registered module"
        );

        self.by_name.insert(name.clone(), id);
        self.entries.push(ModuleEntry {
            descriptor: ModuleDescriptor {
                id,
                name,
                methods: descriptors,
            },
            method_index,
            implementation,
        });
        Ok(id)
    }

    /// 按ID解析模块
    pub fn resolve(&self, module_id: ModuleId) -> RegistryResult<&ModuleDescriptor> {
        self.entries
            .get(module_id.0 as usize)
            .map(|entry| &entry.descriptor)
            .ok_or(RegistryError::ModuleNotFound(module_id))
    }

    /// 按ID解析方法
    pub fn resolve_method(
        &self,
        module_id: ModuleId,
        method_id: MethodId,
    ) -> RegistryResult<&MethodDescriptor> {
        self.resolve(module_id)?
            .method(method_id)
            .ok_or(RegistryError::MethodNotFound {
                module_id,
                method_id,
            })
    }

    /// 按名称查找 (模块ID, 方法ID)
    pub fn lookup(&self, module: &str, method: &str) -> RegistryResult<(ModuleId, MethodId)> {
        let module_id = *self
            .by_name
            .get(module)
            .ok_or_else(|| RegistryError::UnknownModule(module.to_string()))?;
        let method_id = self.entries[module_id.0 as usize]
            .method_index
            .get(method)
            .copied()
            .ok_or_else(|| RegistryError::UnknownMethod {
                module: module.to_string(),
                method: method.to_string(),
            })?;
        Ok((module_id, method_id))
    }

    /// 按名称查找模块ID
    pub fn module_id(&self, name: &str) -> Option<ModuleId> {
        self.by_name.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// 按ID顺序列出所有模块描述
    pub fn list_all(&self) -> Vec<&ModuleDescriptor> {
        self.entries.iter().map(|entry| &entry.descriptor).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 封存注册表，之后的注册都会失败
    pub fn seal(&mut self) {
        if !self.sealed {
            tracing::debug!(target: "registry", modules = self.entries.len(), "Registry sealed");
        }
        self.sealed = true;
    }

    /// 解除封存（桥接关闭后重新初始化时使用）
    pub fn unseal(&mut self) {
        self.sealed = false;
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// 注入脚本上下文的模块表
    ///
    /// `remoteModuleConfig` 的下标就是模块ID，每项为
    /// `[名称, [方法名...], [promise方法ID...]]`，方法名的下标就是方法ID。
    pub fn remote_module_config(&self) -> Value {
        let modules: Vec<Value> = self
            .entries
            .iter()
            .map(|entry| {
                let descriptor = &entry.descriptor;
                let methods: Vec<&str> =
                    descriptor.methods.iter().map(|m| m.name.as_str()).collect();
                let promise_methods: Vec<u32> = descriptor
                    .methods
                    .iter()
                    .filter(|m| m.kind == super::MethodKind::Promise)
                    .map(|m| m.id.0)
                    .collect();
                json!([descriptor.name, methods, promise_methods])
            })
            .collect();
        json!({ "remoteModuleConfig": modules })
    }

    /// 调用原生方法
    pub fn invoke(
        &mut self,
        module_id: ModuleId,
        method_id: MethodId,
        args: Vec<Value>,
        ctx: &InvokeContext<'_>,
    ) -> BridgeResult<()> {
        let entry = self
            .entries
            .get_mut(module_id.0 as usize)
            .ok_or(RegistryError::ModuleNotFound(module_id))?;
        let ModuleEntry {
            descriptor,
            implementation,
            ..
        } = entry;

        let method = descriptor.method(method_id).ok_or(RegistryError::MethodNotFound {
            module_id,
            method_id,
        })?;
        let module = implementation
            .as_mut()
            .ok_or_else(|| RegistryError::NotInvocable(descriptor.name.clone()))?;

        tracing::trace!(
            target: "registry",
            module = %descriptor.name,
            method = %method.name,
            args = args.len(),
            "Invoking native method"
        );
        module.invoke(method, args, ctx)?;
        Ok(())
    }

    /// 通知所有原生模块脚本上下文已销毁
    pub fn invalidate_all(&mut self) {
        for module in self.entries.iter_mut().filter_map(|e| e.implementation.as_mut()) {
            module.invalidate();
        }
    }
}
