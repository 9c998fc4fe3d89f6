//! 绑定解析策略
//!
//! 参数槽的值在运行期如何产生。策略集合是封闭的，编译器对它做穷尽匹配。

use crate::arena::ArenaSlot;
use crate::codegen::CodeGenSupplier;
use crate::compiled::CompiledOperation;
use di_abstractions::{value, Value};
use infrastructure_common::TypeInfo;
use std::fmt;
use std::sync::Arc;

/// 绑定解析策略
#[derive(Clone)]
pub enum BindingResolution {
    /// 构建期确定的常量；`None` 只允许出现在可空参数槽上
    FromConstant { ty: TypeInfo, value: Option<Value> },
    /// 代码生成阶段产生一次的常量
    FromCodeGenerated { supplier: Arc<CodeGenSupplier> },
    /// 转发外层调用的实参
    FromInvocationArgument { index: usize },
    /// 调用已编译的嵌套操作
    FromOperation { operation: CompiledOperation },
    /// 读取生命周期常量区的槽位
    FromLifetimeArena { slot: ArenaSlot },
}

impl BindingResolution {
    /// 类型化常量
    pub fn constant<T: Send + Sync + 'static>(v: T) -> Self {
        Self::FromConstant {
            ty: TypeInfo::of::<T>(),
            value: Some(value(v)),
        }
    }

    /// 已擦除类型的常量
    pub fn constant_value(ty: TypeInfo, value: Option<Value>) -> Self {
        Self::FromConstant { ty, value }
    }

    /// 缺席的常量
    pub fn absent(ty: TypeInfo) -> Self {
        Self::FromConstant { ty, value: None }
    }

    /// 代码生成阶段的值
    pub fn code_generated(supplier: Arc<CodeGenSupplier>) -> Self {
        Self::FromCodeGenerated { supplier }
    }

    /// 外层调用的第 `index` 个实参
    pub fn argument(index: usize) -> Self {
        Self::FromInvocationArgument { index }
    }

    /// 嵌套操作，每次调用时执行
    pub fn operation(operation: CompiledOperation) -> Self {
        Self::FromOperation { operation }
    }

    /// 常量区槽位
    pub fn arena(slot: ArenaSlot) -> Self {
        Self::FromLifetimeArena { slot }
    }

    /// 策略名称
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::FromConstant { .. } => "FromConstant",
            Self::FromCodeGenerated { .. } => "FromCodeGenerated",
            Self::FromInvocationArgument { .. } => "FromInvocationArgument",
            Self::FromOperation { .. } => "FromOperation",
            Self::FromLifetimeArena { .. } => "FromLifetimeArena",
        }
    }
}

impl fmt::Debug for BindingResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FromConstant { ty, value } => f
                .debug_struct("FromConstant")
                .field("ty", &ty.name)
                .field("present", &value.is_some())
                .finish(),
            Self::FromCodeGenerated { supplier } => f
                .debug_struct("FromCodeGenerated")
                .field("supplier", &supplier.name())
                .finish(),
            Self::FromInvocationArgument { index } => f
                .debug_struct("FromInvocationArgument")
                .field("index", index)
                .finish(),
            Self::FromOperation { operation } => f
                .debug_struct("FromOperation")
                .field("operation", &operation.name())
                .finish(),
            Self::FromLifetimeArena { slot } => f
                .debug_struct("FromLifetimeArena")
                .field("index", &slot.index())
                .field("ty", &slot.type_info().name)
                .finish(),
        }
    }
}

impl fmt::Display for BindingResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FromConstant { ty, value: Some(_) } => write!(f, "constant {ty}"),
            Self::FromConstant { ty, value: None } => write!(f, "absent {ty}"),
            Self::FromCodeGenerated { supplier } => write!(f, "codegen {}", supplier.name()),
            Self::FromInvocationArgument { index } => write!(f, "argument #{index}"),
            Self::FromOperation { operation } => write!(f, "invoke {}", operation.name()),
            Self::FromLifetimeArena { slot } => write!(f, "arena[{}]", slot.index()),
        }
    }
}
