//! # 依赖注入具体实现
//!
//! 绑定解析、操作编译、生命周期常量区和服务注册表的实现。
//!
//! 数据流：声明点推导出依赖 → 为每个参数槽绑定解析策略 → 全部绑定后编译操作 →
//! 已编译的操作构成常量或原型服务 → 服务经组合流水线变换后汇总为不可变的注册表。
//!
//! 构建期是单线程同步过程；运行期的已编译操作和注册表可被任意线程并发使用。

pub mod arena;
pub mod binding;
pub mod cache;
pub mod codegen;
pub mod compiled;
pub mod invocation;
pub mod operation;
pub mod resolution;
pub mod service;

#[cfg(test)]
mod tests;

pub use arena::{ArenaBuilder, ArenaLayout, ArenaSlot, LifetimeArena, LifetimeSetup};
pub use binding::{BindingKind, BindingMirror, BindingSetup, MirrorSupplier, Realm};
pub use cache::DependencyCache;
pub use codegen::{CodeGenPhase, CodeGenSupplier};
pub use compiled::{CompiledOperation, SlotFill};
pub use invocation::{Invocation, InvocationMirror, InvocationType};
pub use operation::{
    OperationKind, OperationMirror, OperationSetup, OperationSpec, OperationState,
    OperationTarget,
};
pub use resolution::BindingResolution;
pub use service::{
    BuildContext, InitializationPlan, RuntimeService, ServiceBuild, ServiceComposition,
    ServiceEntry, ServiceMap, ServiceRegistry, ServiceWirelet, TransformPass,
};
