//! # 装配组合层
//!
//! 把依赖注入引擎的各个阶段串成一次完整的装配：
//! 加载配置、初始化日志、注册操作并按服务解析依赖、链接子组件、
//! 运行代码生成阶段、分配常量区并按序初始化常量服务，得到不可变的服务注册表。
//!
//! ## 基本使用
//!
//! ```rust,no_run
//! use di_abstractions::{Key, ServiceLocator};
//! use infrastructure_composition::{AssemblyBuilder, LoggingConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut builder = AssemblyBuilder::new("app").with_logging(LoggingConfig::development());
//!     builder.provide_instance(Key::of::<String>(), "World".to_string())?;
//!
//!     let app = builder.build()?;
//!     let greeting = app.use_service::<String>()?;
//!     println!("Hello {}", greeting);
//!     Ok(())
//! }
//! ```

pub mod application;
pub mod builder;

#[cfg(test)]
mod tests;

pub use application::Application;
pub use builder::{AssemblyBuilder, LoggingConfig};

// 重新导出错误类型
pub use infrastructure_common::{AssemblyError, AssemblyResult};
