//! # Dependency Injection Abstractions
//!
//! 依赖注入抽象层，定义依赖模型和服务契约。
//!
//! ## 核心类型
//!
//! - [`Key`] - 服务键：类型加可选的限定符
//! - [`Variable`] - 带类型和标记的依赖声明点
//! - [`Dependency`] - 由声明点推导的键与可选性种类
//! - [`Arguments`] / [`Invoker`] - 运行期调用约定
//! - [`ServiceLocator`] - 运行期服务查询接口
//! - [`ServiceTransformer`] - 服务注册表变换接口

pub mod dependency;
pub mod key;
pub mod service;
pub mod value;
pub mod variable;

pub use dependency::*;
pub use key::*;
pub use service::*;
pub use value::*;
pub use variable::*;
