//! 服务键
//!
//! 键同时用作依赖请求和服务注册表索引。

use infrastructure_common::TypeInfo;
use std::fmt;

/// 限定符
///
/// 由限定标记名称和可选的限定值组成，用于区分同一类型的多个服务。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Qualifier {
    /// 限定标记名称
    pub marker: &'static str,
    /// 限定值
    pub value: Option<String>,
}

impl Qualifier {
    /// 名称限定标记
    pub const NAMED: &'static str = "Named";

    /// 创建无值的限定符
    pub fn marker(marker: &'static str) -> Self {
        Self {
            marker,
            value: None,
        }
    }

    /// 创建带值的限定符
    pub fn with_value(marker: &'static str, value: impl Into<String>) -> Self {
        Self {
            marker,
            value: Some(value.into()),
        }
    }

    /// 创建名称限定符
    pub fn named(name: impl Into<String>) -> Self {
        Self::with_value(Self::NAMED, name)
    }
}

impl fmt::Display for Qualifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "@{}(\"{}\")", self.marker, value),
            None => write!(f, "@{}", self.marker),
        }
    }
}

/// 服务键
///
/// 两个键相等当且仅当类型与限定符都相等。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Key {
    ty: TypeInfo,
    qualifier: Option<Qualifier>,
}

impl Key {
    /// 从类型创建键
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::from_type(TypeInfo::of::<T>())
    }

    /// 从类型信息创建键
    pub fn from_type(ty: TypeInfo) -> Self {
        Self {
            ty,
            qualifier: None,
        }
    }

    /// 创建带限定符的键
    pub fn qualified<T: ?Sized + 'static>(qualifier: Qualifier) -> Self {
        Self::of::<T>().with_qualifier(qualifier)
    }

    /// 创建名称限定的键
    pub fn named<T: ?Sized + 'static>(name: impl Into<String>) -> Self {
        Self::qualified::<T>(Qualifier::named(name))
    }

    /// 设置限定符
    #[must_use]
    pub fn with_qualifier(mut self, qualifier: Qualifier) -> Self {
        self.qualifier = Some(qualifier);
        self
    }

    /// 去掉限定符
    #[must_use]
    pub fn without_qualifier(mut self) -> Self {
        self.qualifier = None;
        self
    }

    /// 键的类型
    pub fn type_info(&self) -> TypeInfo {
        self.ty
    }

    /// 键的限定符
    pub fn qualifier(&self) -> Option<&Qualifier> {
        self.qualifier.as_ref()
    }

    /// 判断键是否为指定类型
    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.ty.is::<T>()
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.qualifier {
            Some(qualifier) => write!(f, "{} {}", qualifier, self.ty),
            None => write!(f, "{}", self.ty),
        }
    }
}
