//! 运行期服务

use super::map::ServiceEntry;
use crate::compiled::CompiledOperation;
use crate::invocation::InvocationType;
use crate::resolution::BindingResolution;
use di_abstractions::{
    describe_value_type, value_type_id, Decorator, Key, ServiceMode, ServiceView, Value,
};
use infrastructure_common::{RegistryError, RegistryResult, TypeInfo};
use std::fmt;
use std::sync::Arc;

/// 不可变的运行期服务
#[derive(Clone)]
pub enum RuntimeService {
    /// 常量：每次返回同一个实例
    Constant { key: Key, ty: TypeInfo, value: Value },
    /// 原型：每次调用背后已固定常量区的操作
    Prototype { key: Key, operation: CompiledOperation },
    /// 另一个服务的别名
    Delegate { key: Key, target: Arc<RuntimeService> },
    /// 在另一个服务的值上应用映射
    Mapped {
        key: Key,
        target: Arc<RuntimeService>,
        map: Decorator,
    },
}

impl RuntimeService {
    /// 常量服务
    pub fn constant<T: Send + Sync + 'static>(key: Key, value: T) -> Self {
        Self::Constant {
            key,
            ty: TypeInfo::of::<T>(),
            value: Arc::new(value),
        }
    }

    /// 指向另一个服务的别名
    pub fn delegate(key: Key, target: &RuntimeService) -> Self {
        Self::Delegate {
            key,
            target: Arc::new(target.clone()),
        }
    }

    /// 取得服务值
    pub fn get(&self) -> Value {
        match self {
            Self::Constant { value, .. } => Arc::clone(value),
            Self::Prototype { operation, .. } => operation.call(),
            Self::Delegate { target, .. } => target.get(),
            Self::Mapped { target, map, .. } => map(target.get()),
        }
    }
}

impl ServiceView for RuntimeService {
    fn key(&self) -> &Key {
        match self {
            Self::Constant { key, .. }
            | Self::Prototype { key, .. }
            | Self::Delegate { key, .. }
            | Self::Mapped { key, .. } => key,
        }
    }

    fn mode(&self) -> ServiceMode {
        match self {
            Self::Constant { .. } => ServiceMode::Constant,
            Self::Prototype { .. } => ServiceMode::Transient,
            Self::Delegate { target, .. } | Self::Mapped { target, .. } => target.mode(),
        }
    }
}

impl ServiceEntry for RuntimeService {
    type Context = ();

    fn shape(_: &()) -> InvocationType {
        InvocationType::empty()
    }

    fn instance(_: &(), key: Key, instance: Value) -> RegistryResult<Self> {
        let ty = key.type_info();
        check_type(&key, ty, &instance)?;
        Ok(Self::Constant {
            key,
            ty,
            value: instance,
        })
    }

    fn from_operation(
        _: &(),
        key: Key,
        mode: ServiceMode,
        operation: CompiledOperation,
    ) -> RegistryResult<Self> {
        Ok(match mode {
            ServiceMode::Constant => Self::Constant {
                key,
                ty: operation.returns(),
                value: operation.call(),
            },
            ServiceMode::Transient => Self::Prototype { key, operation },
        })
    }

    fn rekeyed(self, key: Key) -> Self {
        match self {
            Self::Constant { ty, value, .. } => Self::Constant { key, ty, value },
            Self::Prototype { operation, .. } => Self::Prototype { key, operation },
            Self::Delegate { target, .. } => Self::Delegate { key, target },
            Self::Mapped { target, map, .. } => Self::Mapped { key, target, map },
        }
    }

    fn decorated(&self, _: &(), decorator: Decorator) -> RegistryResult<Self> {
        // 常量模式的服务（含常量的别名）立即装饰一次，保持实例唯一
        if self.mode() == ServiceMode::Constant {
            let ty = self.type_info();
            let value = decorator(self.get());
            check_type(self.key(), ty, &value)?;
            return Ok(Self::Constant {
                key: self.key().clone(),
                ty,
                value,
            });
        }
        Ok(Self::Mapped {
            key: self.key().clone(),
            target: Arc::new(self.clone()),
            map: decorator,
        })
    }

    fn resolution(&self) -> BindingResolution {
        match self {
            Self::Constant { ty, value, .. } => {
                BindingResolution::constant_value(*ty, Some(Arc::clone(value)))
            }
            Self::Prototype { operation, .. } => BindingResolution::operation(operation.clone()),
            _ => {
                let service = self.clone();
                BindingResolution::operation(CompiledOperation::from_fn(
                    format!("service({})", self.key()),
                    self.type_info(),
                    move || service.get(),
                ))
            }
        }
    }

    fn type_info(&self) -> TypeInfo {
        match self {
            Self::Constant { ty, .. } => *ty,
            Self::Prototype { operation, .. } => operation.returns(),
            Self::Delegate { target, .. } | Self::Mapped { target, .. } => target.type_info(),
        }
    }
}

fn check_type(key: &Key, ty: TypeInfo, value: &Value) -> RegistryResult<()> {
    if value_type_id(value) != ty.id {
        return Err(RegistryError::InstanceTypeMismatch {
            key: key.to_string(),
            expected: ty.to_string(),
            actual: describe_value_type(value, ty),
        });
    }
    Ok(())
}

impl fmt::Debug for RuntimeService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Constant { key, ty, .. } => f
                .debug_struct("Constant")
                .field("key", &key.to_string())
                .field("ty", &ty.name)
                .finish(),
            Self::Prototype { key, operation } => f
                .debug_struct("Prototype")
                .field("key", &key.to_string())
                .field("operation", &operation.name())
                .finish(),
            Self::Delegate { key, target } => f
                .debug_struct("Delegate")
                .field("key", &key.to_string())
                .field("target", target)
                .finish(),
            Self::Mapped { key, target, .. } => f
                .debug_struct("Mapped")
                .field("key", &key.to_string())
                .field("target", target)
                .finish(),
        }
    }
}
