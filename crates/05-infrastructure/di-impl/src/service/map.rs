//! 服务表
//!
//! [`ServiceMap`] 是服务变换器契约的唯一实现，构建期（[`ServiceBuild`](super::ServiceBuild)）
//! 和运行期派生（[`RuntimeService`](super::RuntimeService)）共用同一套变换逻辑。

use crate::binding::BindingKind;
use crate::compiled::CompiledOperation;
use crate::invocation::InvocationType;
use crate::operation::OperationSetup;
use crate::resolution::BindingResolution;
use di_abstractions::{Decorator, Key, ServiceMode, ServiceTransformer, ServiceView, Value};
use infrastructure_common::{OperationError, RegistryError, RegistryResult, TypeInfo};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

/// 服务表中的条目
pub trait ServiceEntry: ServiceView + Sized {
    /// 创建条目所需的上下文
    type Context: Clone;

    /// 条目背后操作的调用形态
    fn shape(context: &Self::Context) -> InvocationType;

    /// 由实例创建常量服务
    fn instance(context: &Self::Context, key: Key, instance: Value) -> RegistryResult<Self>;

    /// 由已编译的操作创建服务
    fn from_operation(
        context: &Self::Context,
        key: Key,
        mode: ServiceMode,
        operation: CompiledOperation,
    ) -> RegistryResult<Self>;

    /// 换键后的条目
    fn rekeyed(self, key: Key) -> Self;

    /// 装饰后的条目，服务模式不变
    fn decorated(&self, context: &Self::Context, decorator: Decorator) -> RegistryResult<Self>;

    /// 其他操作依赖此服务时使用的解析策略
    fn resolution(&self) -> BindingResolution;

    /// 服务值的类型
    fn type_info(&self) -> TypeInfo;

    /// 条目是否负责写入其他操作可能读取的常量区槽位
    ///
    /// 这样的条目从服务表移除后仍需保留，以便初始化序列写入槽位。
    fn writes_arena(&self) -> bool {
        false
    }
}

/// 服务表
#[derive(Clone)]
pub struct ServiceMap<S: ServiceEntry> {
    context: S::Context,
    entries: HashMap<Key, S>,
    order: Vec<Key>,
    hidden: Vec<S>,
}

impl<S: ServiceEntry> ServiceMap<S> {
    /// 创建空的服务表
    pub fn new(context: S::Context) -> Self {
        Self {
            context,
            entries: HashMap::new(),
            order: Vec::new(),
            hidden: Vec::new(),
        }
    }

    pub fn context(&self) -> &S::Context {
        &self.context
    }

    pub fn get(&self, key: &Key) -> Option<&S> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// 按插入顺序遍历
    pub fn iter(&self) -> impl Iterator<Item = &S> + '_ {
        self.order.iter().filter_map(|key| self.entries.get(key))
    }

    /// 已移除但仍需初始化的条目
    pub fn hidden(&self) -> &[S] {
        &self.hidden
    }

    /// 按插入顺序取出全部条目，不含已隐藏的条目
    pub fn into_entries(self) -> Vec<S> {
        self.into_parts().0
    }

    /// 取出可见条目和已隐藏的条目
    pub fn into_parts(mut self) -> (Vec<S>, Vec<S>) {
        let order = std::mem::take(&mut self.order);
        let entries = order
            .into_iter()
            .filter_map(|key| self.entries.remove(&key))
            .collect();
        (entries, self.hidden)
    }

    /// 接管其他服务表中已隐藏的条目
    pub(crate) fn adopt_hidden(&mut self, hidden: Vec<S>) {
        self.hidden.extend(hidden);
    }

    /// 插入新条目，键已存在时失败
    pub fn insert(&mut self, entry: S) -> RegistryResult<()> {
        let key = entry.key().clone();
        if self.entries.contains_key(&key) {
            return Err(RegistryError::DuplicateKey {
                key: key.to_string(),
            });
        }
        self.order.push(key.clone());
        self.entries.insert(key, entry);
        Ok(())
    }

    /// 插入或替换条目
    pub(crate) fn put(&mut self, entry: S) {
        let key = entry.key().clone();
        match self.entries.insert(key.clone(), entry) {
            Some(replaced) => self.discard(replaced),
            None => self.order.push(key),
        }
    }

    fn discard(&mut self, entry: S) {
        if entry.writes_arena() {
            debug!(key = %entry.key(), "隐藏服务，保留其常量区初始化");
            self.hidden.push(entry);
        }
    }

    /// 用已编译的操作插入或替换服务
    pub fn provide(
        &mut self,
        key: Key,
        mode: ServiceMode,
        operation: CompiledOperation,
    ) -> RegistryResult<()> {
        if operation.shape() != S::shape(&self.context) {
            return Err(RegistryError::ShapeMismatch {
                operation: operation.name().to_string(),
            });
        }
        info!(key = %key, mode = ?mode, operation = %operation.name(), "提供服务");
        let entry = S::from_operation(&self.context, key, mode, operation)?;
        self.put(entry);
        Ok(())
    }

    /// 用服务表中的服务绑定操作的未绑定参数槽
    ///
    /// 返回操作的全部依赖是否都来自常量服务。
    pub fn resolve_operation(&self, operation: &mut OperationSetup) -> RegistryResult<bool> {
        if operation.shape() != &S::shape(&self.context) {
            return Err(RegistryError::ShapeMismatch {
                operation: operation.name().to_string(),
            });
        }
        let mut constant = true;
        for slot in operation.unbound_slots() {
            let dependency = match operation.binding(slot) {
                Some(binding) => binding.dependency().clone(),
                None => continue,
            };
            match self.entries.get(dependency.key()) {
                Some(service) => {
                    constant &= service.mode() == ServiceMode::Constant;
                    operation.bind_service(
                        slot,
                        BindingKind::Hook,
                        service.resolution(),
                        service.type_info(),
                    )?;
                }
                None if dependency.is_optional() => {
                    let empty =
                        dependency
                            .empty_value()
                            .map_err(|source| OperationError::Dependency {
                                operation: operation.name().to_string(),
                                source,
                            })?;
                    operation.bind_hook(
                        slot,
                        BindingResolution::constant_value(dependency.representation(), empty),
                    )?;
                }
                None => {
                    return Err(RegistryError::UnresolvedDependency {
                        operation: operation.name().to_string(),
                        key: dependency.key().to_string(),
                    })
                }
            }
        }
        debug!(operation = %operation.name(), constant, "操作依赖已解析");
        Ok(constant)
    }
}

impl<S: ServiceEntry> ServiceTransformer for ServiceMap<S> {
    type Operation = OperationSetup;

    fn keys(&self) -> Vec<Key> {
        self.order.clone()
    }

    fn contains(&self, key: &Key) -> bool {
        self.entries.contains_key(key)
    }

    fn provide_instance(&mut self, key: Key, instance: Value) -> RegistryResult<()> {
        info!(key = %key, "提供常量实例");
        let entry = S::instance(&self.context, key, instance)?;
        self.put(entry);
        Ok(())
    }

    fn decorate(&mut self, key: &Key, decorator: Decorator) -> RegistryResult<()> {
        let entry = self
            .entries
            .get(key)
            .ok_or_else(|| RegistryError::NoSuchKey {
                key: key.to_string(),
            })?;
        let decorated = entry.decorated(&self.context, decorator)?;
        info!(key = %key, mode = ?decorated.mode(), "装饰服务");
        self.entries.insert(key.clone(), decorated);
        Ok(())
    }

    fn rekey(&mut self, from: &Key, to: Key) -> RegistryResult<()> {
        if *from == to {
            return Err(RegistryError::RekeyToSameKey {
                key: to.to_string(),
            });
        }
        if !self.entries.contains_key(from) {
            return Err(RegistryError::NoSuchKey {
                key: from.to_string(),
            });
        }
        if self.entries.contains_key(&to) {
            return Err(RegistryError::RekeyCollision {
                from: from.to_string(),
                to: to.to_string(),
            });
        }
        if let Some(entry) = self.entries.remove(from) {
            info!(from = %from, to = %to, "服务换键");
            if let Some(position) = self.order.iter().position(|k| k == from) {
                self.order[position] = to.clone();
            }
            self.entries.insert(to.clone(), entry.rekeyed(to));
        }
        Ok(())
    }

    fn rekey_all(
        &mut self,
        f: &mut dyn FnMut(&dyn ServiceView) -> Option<Key>,
    ) -> RegistryResult<()> {
        let mut planned = Vec::with_capacity(self.order.len());
        let mut targets = HashSet::with_capacity(self.order.len());
        for key in &self.order {
            let Some(entry) = self.entries.get(key) else {
                continue;
            };
            let target = f(entry);
            if let Some(target) = &target {
                if !targets.insert(target.clone()) {
                    return Err(RegistryError::RekeyCollision {
                        from: key.to_string(),
                        to: target.to_string(),
                    });
                }
            }
            planned.push((key.clone(), target));
        }

        let mut entries = std::mem::take(&mut self.entries);
        self.order.clear();
        let mut removed = 0;
        for (key, target) in planned {
            let Some(entry) = entries.remove(&key) else {
                continue;
            };
            match target {
                Some(target) => {
                    let entry = if target == key {
                        entry
                    } else {
                        entry.rekeyed(target.clone())
                    };
                    self.order.push(target.clone());
                    self.entries.insert(target, entry);
                }
                None => {
                    removed += 1;
                    self.discard(entry);
                }
            }
        }
        info!(services = self.order.len(), removed, "批量换键");
        Ok(())
    }

    fn remove(&mut self, keys: &[Key]) {
        for key in keys {
            if let Some(entry) = self.entries.remove(key) {
                self.discard(entry);
            }
        }
        let entries = &self.entries;
        self.order.retain(|key| entries.contains_key(key));
        debug!(remaining = self.order.len(), "移除服务");
    }

    fn retain(&mut self, keys: &[Key]) {
        let order = std::mem::take(&mut self.order);
        for key in order {
            if keys.contains(&key) {
                self.order.push(key);
            } else if let Some(entry) = self.entries.remove(&key) {
                self.discard(entry);
            }
        }
        debug!(remaining = self.order.len(), "保留服务");
    }

    fn remove_all(&mut self) {
        for key in std::mem::take(&mut self.order) {
            if let Some(entry) = self.entries.remove(&key) {
                self.discard(entry);
            }
        }
        debug!("移除全部服务");
    }

    fn map(&mut self, key: Key, mut operation: OperationSetup) -> RegistryResult<()> {
        let constant = self.resolve_operation(&mut operation)?;
        let compiled = operation.compile()?;
        let mode = if constant {
            ServiceMode::Constant
        } else {
            ServiceMode::Transient
        };
        self.provide(key, mode, compiled)
    }
}
