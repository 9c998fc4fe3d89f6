//! 依赖推导
//!
//! 从 [`Variable`] 剥去一层可选性包装，得到 [`Dependency`]：键加可选性种类。

use crate::key::Key;
use crate::value::Value;
use crate::variable::{ContainerKind, OptionalContainer, TypeToken, Variable};
use infrastructure_common::{DependencyError, TypeInfo};
use serde::Serialize;
use std::fmt;
use tracing::trace;

/// 可选性种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OptionalityKind {
    /// 必需
    Required,
    /// `Option<T>` 容器
    Optional,
    /// `Option<i32>`
    OptionalInt,
    /// `Option<i64>`
    OptionalLong,
    /// `Option<f64>`
    OptionalDouble,
    /// 可空标记
    OptionalNullable,
}

impl OptionalityKind {
    /// 是否可选
    pub fn is_optional(self) -> bool {
        !matches!(self, Self::Required)
    }
}

impl From<ContainerKind> for OptionalityKind {
    fn from(kind: ContainerKind) -> Self {
        match kind {
            ContainerKind::Generic => Self::Optional,
            ContainerKind::Int => Self::OptionalInt,
            ContainerKind::Long => Self::OptionalLong,
            ContainerKind::Double => Self::OptionalDouble,
        }
    }
}

/// 依赖
///
/// 由声明点推导得到，推导是纯函数：相同的声明点总是得到相同的依赖。
#[derive(Debug, Clone)]
pub struct Dependency {
    key: Key,
    kind: OptionalityKind,
    declared: TypeToken,
}

impl Dependency {
    /// 从声明点推导依赖
    ///
    /// 最多剥去一层可选容器；检测到第二层容器，或可空标记与容器同时出现时失败。
    pub fn from_variable(variable: &Variable) -> Result<Self, DependencyError> {
        let declared = variable.type_token().clone();
        let (element, kind) = match &declared {
            TypeToken::Plain(info) => {
                let kind = if variable.is_nullable() {
                    OptionalityKind::OptionalNullable
                } else {
                    OptionalityKind::Required
                };
                (*info, kind)
            }
            TypeToken::Optional(container) => {
                let element = match container.element() {
                    TypeToken::Plain(info) => *info,
                    TypeToken::Optional(_) => {
                        return Err(DependencyError::MultipleOptionalityLayers {
                            type_name: declared.to_string(),
                        })
                    }
                };
                if variable.is_nullable() {
                    return Err(DependencyError::ConflictingOptionality {
                        type_name: declared.to_string(),
                    });
                }
                (element, OptionalityKind::from(container.kind()))
            }
        };

        let mut key = Key::from_type(element);
        if let Some(qualifier) = variable.qualifier() {
            key = key.with_qualifier(qualifier.clone());
        }

        trace!(variable = %variable, key = %key, kind = ?kind, "推导依赖");
        Ok(Self {
            key,
            kind,
            declared,
        })
    }

    /// 依赖的键
    pub fn key(&self) -> &Key {
        &self.key
    }

    /// 可选性种类
    pub fn kind(&self) -> OptionalityKind {
        self.kind
    }

    /// 声明类型
    pub fn declared(&self) -> &TypeToken {
        &self.declared
    }

    /// 参数槽在运行期的表示类型
    pub fn representation(&self) -> TypeInfo {
        self.declared.representation()
    }

    /// 是否可选
    pub fn is_optional(&self) -> bool {
        self.kind.is_optional()
    }

    /// 是否允许缺席的值
    pub fn is_nullable(&self) -> bool {
        self.kind == OptionalityKind::OptionalNullable
    }

    fn container(&self) -> Option<&OptionalContainer> {
        self.declared.container()
    }

    /// 依赖的空值表示
    ///
    /// 容器返回空容器，可空依赖返回 `None`（缺席），必需依赖没有空值。
    pub fn empty_value(&self) -> Result<Option<Value>, DependencyError> {
        match self.kind {
            OptionalityKind::Required => Err(DependencyError::RequiredValueMissing {
                key: self.key.to_string(),
            }),
            OptionalityKind::OptionalNullable => Ok(None),
            _ => Ok(self.container().map(OptionalContainer::empty)),
        }
    }

    /// 把键对应的元素值转换为参数槽的表示
    ///
    /// 容器依赖包装为非空容器；元素类型不符时返回 `None`。
    pub fn present_value(&self, element: &Value) -> Option<Value> {
        match self.container() {
            Some(container) => container.wrap(element),
            None => {
                let matches = crate::value::value_type_id(element) == self.key.type_info().id;
                matches.then(|| Value::clone(element))
            }
        }
    }
}

impl PartialEq for Dependency {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.kind == other.kind && self.declared == other.declared
    }
}

impl Eq for Dependency {}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            OptionalityKind::Required => write!(f, "{}", self.key),
            kind => write!(f, "{} ({:?})", self.key, kind),
        }
    }
}
