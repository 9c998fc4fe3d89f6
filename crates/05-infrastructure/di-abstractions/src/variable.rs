//! 依赖声明点
//!
//! [`Variable`] 描述字段、参数或返回值这类带类型和标记的声明点，
//! 创建后不再修改。

use crate::key::Qualifier;
use crate::value::{value, Value};
use infrastructure_common::TypeInfo;
use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// 可选容器的特化种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerKind {
    /// 通用单值容器 `Option<T>`
    Generic,
    /// `Option<i32>`
    Int,
    /// `Option<i64>`
    Long,
    /// `Option<f64>`
    Double,
}

/// 可选容器
///
/// 记录容器的运行期表示以及构造空值、包装现值所需的函数。
#[derive(Clone)]
pub struct OptionalContainer {
    kind: ContainerKind,
    representation: TypeInfo,
    element: Box<TypeToken>,
    empty: fn() -> Value,
    wrap: fn(&Value) -> Option<Value>,
}

impl OptionalContainer {
    /// 容器种类
    pub fn kind(&self) -> ContainerKind {
        self.kind
    }

    /// 运行期表示类型
    pub fn representation(&self) -> TypeInfo {
        self.representation
    }

    /// 容器内的元素类型
    pub fn element(&self) -> &TypeToken {
        &self.element
    }

    /// 构造空容器
    pub fn empty(&self) -> Value {
        (self.empty)()
    }

    /// 把元素值包装为非空容器，元素类型不符时返回 `None`
    pub fn wrap(&self, element: &Value) -> Option<Value> {
        (self.wrap)(element)
    }
}

impl fmt::Debug for OptionalContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OptionalContainer")
            .field("kind", &self.kind)
            .field("representation", &self.representation.name)
            .field("element", &self.element)
            .finish()
    }
}

/// 声明类型
///
/// 普通类型或可选容器；容器可以嵌套，嵌套在推导依赖时会被拒绝。
#[derive(Debug, Clone)]
pub enum TypeToken {
    /// 普通类型
    Plain(TypeInfo),
    /// 可选容器
    Optional(OptionalContainer),
}

fn empty_int() -> Value {
    value(None::<i32>)
}

fn wrap_int(v: &Value) -> Option<Value> {
    v.downcast_ref::<i32>().map(|x| value(Some(*x)))
}

fn empty_long() -> Value {
    value(None::<i64>)
}

fn wrap_long(v: &Value) -> Option<Value> {
    v.downcast_ref::<i64>().map(|x| value(Some(*x)))
}

fn empty_double() -> Value {
    value(None::<f64>)
}

fn wrap_double(v: &Value) -> Option<Value> {
    v.downcast_ref::<f64>().map(|x| value(Some(*x)))
}

fn empty_generic<T: Send + Sync + 'static>() -> Value {
    value(None::<Arc<T>>)
}

fn wrap_generic<T: Send + Sync + 'static>(v: &Value) -> Option<Value> {
    Arc::clone(v).downcast::<T>().ok().map(|a| value(Some(a)))
}

fn empty_erased() -> Value {
    value(None::<Value>)
}

fn wrap_erased(v: &Value) -> Option<Value> {
    Some(value(Some(Arc::clone(v))))
}

impl TypeToken {
    /// 普通类型
    pub fn of<T: Send + Sync + 'static>() -> Self {
        Self::Plain(TypeInfo::of::<T>())
    }

    /// `Option<T>` 声明
    ///
    /// `i32`/`i64`/`f64` 使用特化容器，运行期表示为 `Option<i32>` 等；
    /// 其他类型运行期表示为 `Option<Arc<T>>`。
    pub fn option_of<T: Send + Sync + 'static>() -> Self {
        let element = Box::new(Self::of::<T>());
        let id = TypeId::of::<T>();
        let container = if id == TypeId::of::<i32>() {
            OptionalContainer {
                kind: ContainerKind::Int,
                representation: TypeInfo::of::<Option<i32>>(),
                element,
                empty: empty_int,
                wrap: wrap_int,
            }
        } else if id == TypeId::of::<i64>() {
            OptionalContainer {
                kind: ContainerKind::Long,
                representation: TypeInfo::of::<Option<i64>>(),
                element,
                empty: empty_long,
                wrap: wrap_long,
            }
        } else if id == TypeId::of::<f64>() {
            OptionalContainer {
                kind: ContainerKind::Double,
                representation: TypeInfo::of::<Option<f64>>(),
                element,
                empty: empty_double,
                wrap: wrap_double,
            }
        } else {
            OptionalContainer {
                kind: ContainerKind::Generic,
                representation: TypeInfo::of::<Option<Arc<T>>>(),
                element,
                empty: empty_generic::<T>,
                wrap: wrap_generic::<T>,
            }
        };
        Self::Optional(container)
    }

    /// 包装任意声明类型的 `Option` 容器
    ///
    /// 元素类型只在运行期可知，运行期表示为 `Option<Value>`。
    pub fn optional(element: TypeToken) -> Self {
        Self::Optional(OptionalContainer {
            kind: ContainerKind::Generic,
            representation: TypeInfo::of::<Option<Value>>(),
            element: Box::new(element),
            empty: empty_erased,
            wrap: wrap_erased,
        })
    }

    /// 声明点在运行期的表示类型
    pub fn representation(&self) -> TypeInfo {
        match self {
            Self::Plain(info) => *info,
            Self::Optional(container) => container.representation,
        }
    }

    /// 可选容器
    pub fn container(&self) -> Option<&OptionalContainer> {
        match self {
            Self::Plain(_) => None,
            Self::Optional(container) => Some(container),
        }
    }
}

impl PartialEq for TypeToken {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Plain(a), Self::Plain(b)) => a == b,
            (Self::Optional(a), Self::Optional(b)) => {
                a.kind == b.kind
                    && a.representation == b.representation
                    && a.element == b.element
            }
            _ => false,
        }
    }
}

impl Eq for TypeToken {}

impl Hash for TypeToken {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Self::Plain(info) => {
                0u8.hash(state);
                info.hash(state);
            }
            Self::Optional(container) => {
                1u8.hash(state);
                container.kind.hash(state);
                container.representation.hash(state);
                container.element.hash(state);
            }
        }
    }
}

impl fmt::Display for TypeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain(info) => write!(f, "{info}"),
            Self::Optional(container) => write!(f, "Option<{}>", container.element),
        }
    }
}

/// 声明点上的标记
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Marker {
    /// 限定标记
    Qualifier(Qualifier),
    /// 可空标记
    Nullable,
    /// 其他标记，只为工具保留
    Named(&'static str),
}

/// 依赖声明点
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Variable {
    ty: TypeToken,
    markers: Vec<Marker>,
}

impl Variable {
    /// 创建声明点
    pub fn new(ty: TypeToken) -> Self {
        Self {
            ty,
            markers: Vec::new(),
        }
    }

    /// 普通类型声明点
    pub fn of<T: Send + Sync + 'static>() -> Self {
        Self::new(TypeToken::of::<T>())
    }

    /// `Option<T>` 声明点
    pub fn option_of<T: Send + Sync + 'static>() -> Self {
        Self::new(TypeToken::option_of::<T>())
    }

    /// 添加标记
    #[must_use]
    pub fn with_marker(mut self, marker: Marker) -> Self {
        self.markers.push(marker);
        self
    }

    /// 添加限定标记
    #[must_use]
    pub fn qualified(self, qualifier: Qualifier) -> Self {
        self.with_marker(Marker::Qualifier(qualifier))
    }

    /// 添加可空标记
    #[must_use]
    pub fn nullable(self) -> Self {
        self.with_marker(Marker::Nullable)
    }

    /// 声明类型
    pub fn type_token(&self) -> &TypeToken {
        &self.ty
    }

    /// 全部标记
    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    /// 是否带可空标记
    pub fn is_nullable(&self) -> bool {
        self.markers.iter().any(|m| matches!(m, Marker::Nullable))
    }

    /// 第一个限定标记
    pub fn qualifier(&self) -> Option<&Qualifier> {
        self.markers.iter().find_map(|m| match m {
            Marker::Qualifier(q) => Some(q),
            _ => None,
        })
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for marker in &self.markers {
            match marker {
                Marker::Qualifier(q) => write!(f, "{q} ")?,
                Marker::Nullable => f.write_str("@Nullable ")?,
                Marker::Named(name) => write!(f, "@{name} ")?,
            }
        }
        write!(f, "{}", self.ty)
    }
}
