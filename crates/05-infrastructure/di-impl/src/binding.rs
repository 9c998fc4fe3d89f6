//! 参数槽绑定

use crate::resolution::BindingResolution;
use di_abstractions::{Dependency, OptionalityKind};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// 操作所属的域
///
/// 标识绑定的发起方（组件或扩展），只用于诊断。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Realm {
    /// 域的唯一标识，同名的域也互不相同
    pub id: Uuid,
    /// 诊断用名称
    pub name: String,
}

impl Realm {
    /// 创建新的域
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
        }
    }
}

impl fmt::Display for Realm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// 绑定来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BindingKind {
    /// 由扩展钩子绑定
    Hook,
    /// 手动绑定
    Manual,
}

/// 绑定的调试镜像
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BindingMirror {
    /// 参数槽下标
    pub slot: usize,
    /// 所属操作的域
    pub realm: Realm,
    /// 绑定方式，未绑定时为 `None`
    pub kind: Option<BindingKind>,
    /// 解析策略的描述，未绑定时为 `None`
    pub provider: Option<String>,
    /// 依赖的键
    pub key: String,
    /// 依赖的可选性
    pub optionality: OptionalityKind,
}

/// 自定义镜像供应函数
pub type MirrorSupplier = Arc<dyn Fn() -> BindingMirror + Send + Sync>;

/// 参数槽的绑定状态
///
/// 创建时未绑定，恰好绑定一次后不可变；由所属操作独占。
#[derive(Clone)]
pub struct BindingSetup {
    slot: usize,
    realm: Realm,
    dependency: Dependency,
    kind: Option<BindingKind>,
    resolution: Option<BindingResolution>,
    mirror: Option<MirrorSupplier>,
}

impl BindingSetup {
    pub(crate) fn new(slot: usize, realm: Realm, dependency: Dependency) -> Self {
        Self {
            slot,
            realm,
            dependency,
            kind: None,
            resolution: None,
            mirror: None,
        }
    }

    /// 参数槽下标
    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn realm(&self) -> &Realm {
        &self.realm
    }

    /// 参数槽的依赖
    pub fn dependency(&self) -> &Dependency {
        &self.dependency
    }

    pub fn kind(&self) -> Option<BindingKind> {
        self.kind
    }

    /// 绑定的解析策略，未绑定时为 `None`
    pub fn resolution(&self) -> Option<&BindingResolution> {
        self.resolution.as_ref()
    }

    pub fn is_bound(&self) -> bool {
        self.resolution.is_some()
    }

    pub(crate) fn resolve(&mut self, kind: BindingKind, resolution: BindingResolution) {
        debug_assert!(self.resolution.is_none());
        self.kind = Some(kind);
        self.resolution = Some(resolution);
    }

    /// 设置自定义镜像供应函数
    pub fn set_mirror(&mut self, mirror: MirrorSupplier) {
        self.mirror = Some(mirror);
    }

    /// 生成调试镜像
    pub fn mirror(&self) -> BindingMirror {
        if let Some(supplier) = &self.mirror {
            return supplier();
        }
        BindingMirror {
            slot: self.slot,
            realm: self.realm.clone(),
            kind: self.kind,
            provider: self.resolution.as_ref().map(ToString::to_string),
            key: self.dependency.key().to_string(),
            optionality: self.dependency.kind(),
        }
    }
}

impl fmt::Debug for BindingSetup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingSetup")
            .field("slot", &self.slot)
            .field("realm", &self.realm.name)
            .field("dependency", &self.dependency.to_string())
            .field("kind", &self.kind)
            .field("resolution", &self.resolution)
            .finish()
    }
}
