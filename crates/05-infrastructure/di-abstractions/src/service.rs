//! 服务契约
//!
//! 服务定位器（运行期查询）和服务变换器（构建期及派生时改写注册表）的抽象接口。

use crate::key::Key;
use crate::value::{value, Value};
use infrastructure_common::{LookupError, RegistryResult, TypeInfo};
use serde::Serialize;
use std::sync::Arc;

/// 服务模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceMode {
    /// 常量模式 - 每次查询返回同一个缓存实例
    Constant,
    /// 原型模式 - 每次查询重新调用背后的操作
    Transient,
}

/// 装饰函数
pub type Decorator = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// 创建类型化的装饰函数
///
/// # Panics
///
/// 被装饰的值不是 `T` 时 panic；服务键的类型保证了这一点。
pub fn decorator<T, F>(f: F) -> Decorator
where
    T: Send + Sync + 'static,
    F: Fn(Arc<T>) -> T + Send + Sync + 'static,
{
    Arc::new(move |v: Value| match v.downcast::<T>() {
        Ok(typed) => value(f(typed)),
        Err(_) => panic!("装饰的服务类型不是 {}", TypeInfo::of::<T>()),
    })
}

/// 服务的只读视图
pub trait ServiceView {
    /// 服务键
    fn key(&self) -> &Key;

    /// 服务模式
    fn mode(&self) -> ServiceMode;
}

/// 服务定位器
///
/// 不可变的服务快照，可被任意数量的线程并发查询。
pub trait ServiceLocator: Send + Sync {
    /// 查找服务，不存在时返回 `None`
    fn find_value(&self, key: &Key) -> Option<Value>;

    /// 使用服务，不存在时返回 [`LookupError::NoSuchService`]
    fn use_value(&self, key: &Key) -> Result<Value, LookupError>;

    /// 是否包含服务
    fn contains(&self, key: &Key) -> bool;

    /// 全部服务键
    fn keys(&self) -> Vec<Key>;

    /// 按键查找类型化的服务
    fn find_key<T: Send + Sync + 'static>(&self, key: &Key) -> Option<Arc<T>>
    where
        Self: Sized,
    {
        self.find_value(key).and_then(|v| v.downcast::<T>().ok())
    }

    /// 按类型查找服务
    fn find<T: Send + Sync + 'static>(&self) -> Option<Arc<T>>
    where
        Self: Sized,
    {
        self.find_key::<T>(&Key::of::<T>())
    }

    /// 按键使用类型化的服务
    fn use_key<T: Send + Sync + 'static>(&self, key: &Key) -> Result<Arc<T>, LookupError>
    where
        Self: Sized,
    {
        self.use_value(key)?
            .downcast::<T>()
            .map_err(|_| LookupError::TypeMismatch {
                key: key.to_string(),
                expected: TypeInfo::of::<T>().to_string(),
            })
    }

    /// 按类型使用服务
    fn use_service<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, LookupError>
    where
        Self: Sized,
    {
        self.use_key::<T>(&Key::of::<T>())
    }
}

/// 服务变换器
///
/// 变换器方法不得在另一个变换器回调内部被递归调用；回调只能拿到只读视图，
/// `&mut self` 借用使这一点在编译期成立。
pub trait ServiceTransformer {
    /// 用于 [`ServiceTransformer::map`] 的操作类型
    type Operation;

    /// 当前全部服务键
    fn keys(&self) -> Vec<Key>;

    /// 是否包含服务
    fn contains(&self, key: &Key) -> bool;

    /// 插入或替换常量服务
    fn provide_instance(&mut self, key: Key, instance: Value) -> RegistryResult<()>;

    /// 装饰已有服务，保持服务模式
    fn decorate(&mut self, key: &Key, decorator: Decorator) -> RegistryResult<()>;

    /// 把服务移动到新键
    fn rekey(&mut self, from: &Key, to: Key) -> RegistryResult<()>;

    /// 先计算完整的新键集合再整体应用；返回 `None` 的服务被移除
    fn rekey_all(
        &mut self,
        f: &mut dyn FnMut(&dyn ServiceView) -> Option<Key>,
    ) -> RegistryResult<()>;

    /// 移除服务，不存在的键被忽略
    fn remove(&mut self, keys: &[Key]);

    /// 只保留指定的服务
    fn retain(&mut self, keys: &[Key]);

    /// 移除全部服务
    fn remove_all(&mut self);

    /// 用新编译的操作替换（或新增）服务
    fn map(&mut self, key: Key, operation: Self::Operation) -> RegistryResult<()>;
}
