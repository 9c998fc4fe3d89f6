//! 服务层：构建期服务、运行期服务、服务表变换、注册表与组合流水线

mod build;
mod composition;
mod map;
mod registry;
mod runtime;

pub use build::{BuildContext, InitializationPlan, ServiceBuild};
pub use composition::{ServiceComposition, ServiceWirelet, TransformPass};
pub use map::{ServiceEntry, ServiceMap};
pub use registry::ServiceRegistry;
pub use runtime::RuntimeService;
