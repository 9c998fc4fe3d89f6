//! # Infrastructure Common
//!
//! 这个 crate 提供了依赖注入引擎各层共用的类型。
//!
//! ## 核心内容
//!
//! - [`errors`] - 构建期与运行期的错误分类
//! - [`TypeInfo`] - 以 `TypeId` 为标识的类型元数据
//! - [`EngineConfig`] - 引擎配置及其加载

pub mod configuration;
pub mod errors;
pub mod metadata;

pub use configuration::*;
pub use errors::*;
pub use metadata::*;
