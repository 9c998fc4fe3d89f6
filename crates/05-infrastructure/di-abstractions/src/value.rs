//! 运行期值与调用参数

use infrastructure_common::TypeInfo;
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

/// 类型擦除的运行期值
pub type Value = Arc<dyn Any + Send + Sync>;

/// 操作的基础可调用对象
///
/// 接收按参数槽顺序排列的实参，返回操作结果。
pub type Invoker = Arc<dyn Fn(&Arguments) -> Value + Send + Sync>;

/// 包装为运行期值
pub fn value<T: Send + Sync + 'static>(v: T) -> Value {
    Arc::new(v)
}

/// 包装为基础可调用对象
pub fn invoker<F>(f: F) -> Invoker
where
    F: Fn(&Arguments) -> Value + Send + Sync + 'static,
{
    Arc::new(f)
}

/// 运行期值的实际类型ID
pub fn value_type_id(v: &Value) -> TypeId {
    Any::type_id(&**v)
}

macro_rules! known_type_names {
    ($id:expr, $($ty:ty),* $(,)?) => {
        $(
            if $id == TypeId::of::<$ty>() {
                return Some(TypeInfo::of::<$ty>());
            }
        )*
    };
}

/// 运行期值的类型信息，仅识别基本类型和常见标准库类型
pub fn known_type(v: &Value) -> Option<TypeInfo> {
    let id = value_type_id(v);
    known_type_names!(
        id, bool, char, (), i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32,
        f64, String, &'static str, Vec<u8>, Vec<String>, Option<String>, Option<i32>,
        Option<i64>, Option<u32>, Option<u64>, Option<bool>,
    );
    None
}

/// 用于错误信息的类型描述
///
/// 无法识别的类型退化为类型ID，并注明期望的类型。
pub fn describe_value_type(v: &Value, expected: TypeInfo) -> String {
    match known_type(v) {
        Some(ty) => ty.to_string(),
        None => format!("{:?} (不是 {})", value_type_id(v), expected),
    }
}

/// 调用实参
///
/// 每个参数槽对应一个位置；`None` 表示可空参数槽上缺席的值。
/// 参数类型在绑定时已经校验，因此类型化读取失败属于程序错误。
#[derive(Clone, Default)]
pub struct Arguments {
    values: Vec<Option<Value>>,
}

impl Arguments {
    /// 创建调用实参
    pub fn new(values: Vec<Option<Value>>) -> Self {
        Self { values }
    }

    /// 空实参
    pub fn empty() -> Self {
        Self::default()
    }

    /// 实参数量
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// 是否没有实参
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// 读取原始值
    pub fn value(&self, index: usize) -> Option<&Value> {
        self.values.get(index).and_then(Option::as_ref)
    }

    /// 尝试读取类型化的值
    pub fn try_get<T: Send + Sync + 'static>(&self, index: usize) -> Option<Arc<T>> {
        self.value(index)
            .and_then(|v| Arc::clone(v).downcast::<T>().ok())
    }

    /// 读取类型化的值
    ///
    /// # Panics
    ///
    /// 参数缺席或类型不符时 panic。
    pub fn get<T: Send + Sync + 'static>(&self, index: usize) -> Arc<T> {
        match self.try_get::<T>(index) {
            Some(v) => v,
            None => panic!(
                "调用实参 {} 缺席或类型不是 {}",
                index,
                TypeInfo::of::<T>()
            ),
        }
    }

    /// 读取可复制的值
    ///
    /// # Panics
    ///
    /// 参数缺席或类型不符时 panic。
    pub fn copied<T: Copy + Send + Sync + 'static>(&self, index: usize) -> T {
        *self.get::<T>(index)
    }

    /// 读取可空参数槽的值
    ///
    /// # Panics
    ///
    /// 值存在但类型不符时 panic。
    pub fn nullable<T: Send + Sync + 'static>(&self, index: usize) -> Option<Arc<T>> {
        self.value(index).map(|_| self.get::<T>(index))
    }

    /// 读取 `Option<T>` 容器参数槽的值
    ///
    /// 通用可选容器在运行期表示为 `Option<Arc<T>>`。
    ///
    /// # Panics
    ///
    /// 参数缺席或类型不符时 panic。
    pub fn optional<T: Send + Sync + 'static>(&self, index: usize) -> Option<Arc<T>> {
        (*self.get::<Option<Arc<T>>>(index)).clone()
    }
}

impl fmt::Debug for Arguments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arguments")
            .field("len", &self.values.len())
            .field(
                "present",
                &self.values.iter().map(Option::is_some).collect::<Vec<_>>(),
            )
            .finish()
    }
}
