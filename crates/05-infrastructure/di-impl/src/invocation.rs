//! 调用形态

use crate::arena::LifetimeArena;
use di_abstractions::Value;
use infrastructure_common::TypeInfo;
use serde::Serialize;
use std::fmt;

/// 调用形态
///
/// 已编译操作在调用时仍需外部提供的参数：是否需要常量区，以及按顺序的实参类型。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct InvocationType {
    arena: bool,
    arguments: Vec<TypeInfo>,
}

impl InvocationType {
    /// 不需要任何外部参数
    pub fn empty() -> Self {
        Self::default()
    }

    /// 只需要生命周期常量区，构建期的组件和服务操作都使用这一形态
    pub fn lifetime() -> Self {
        Self {
            arena: true,
            arguments: Vec::new(),
        }
    }

    /// 追加实参类型
    pub fn with_argument(mut self, ty: TypeInfo) -> Self {
        self.arguments.push(ty);
        self
    }

    /// 追加类型化的实参
    pub fn with<T: Send + Sync + 'static>(self) -> Self {
        self.with_argument(TypeInfo::of::<T>())
    }

    pub fn requires_arena(&self) -> bool {
        self.arena
    }

    pub fn arguments(&self) -> &[TypeInfo] {
        &self.arguments
    }

    /// 是否不需要任何外部参数
    pub fn is_empty(&self) -> bool {
        !self.arena && self.arguments.is_empty()
    }

    /// 去掉常量区后的形态
    pub fn without_arena(&self) -> Self {
        Self {
            arena: false,
            arguments: self.arguments.clone(),
        }
    }
}

impl fmt::Display for InvocationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        let mut first = true;
        if self.arena {
            f.write_str("arena")?;
            first = false;
        }
        for ty in &self.arguments {
            if !first {
                f.write_str(", ")?;
            }
            write!(f, "{ty}")?;
            first = false;
        }
        f.write_str(")")
    }
}

/// 调用形态的调试镜像
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvocationMirror {
    pub arena: bool,
    pub arguments: Vec<String>,
}

impl From<&InvocationType> for InvocationMirror {
    fn from(shape: &InvocationType) -> Self {
        Self {
            arena: shape.arena,
            arguments: shape.arguments.iter().map(ToString::to_string).collect(),
        }
    }
}

/// 一次调用提供的外部参数
#[derive(Debug, Clone, Copy, Default)]
pub struct Invocation<'a> {
    pub arena: Option<&'a LifetimeArena>,
    pub arguments: &'a [Value],
}

impl<'a> Invocation<'a> {
    pub fn new(arena: Option<&'a LifetimeArena>, arguments: &'a [Value]) -> Self {
        Self { arena, arguments }
    }

    /// 不带任何外部参数
    pub fn empty() -> Self {
        Self::default()
    }

    /// 只带常量区
    pub fn with_arena(arena: &'a LifetimeArena) -> Self {
        Self {
            arena: Some(arena),
            arguments: &[],
        }
    }
}
