//! 服务组合流水线
//!
//! 子组件导出的服务分两遍变换后并入消费方契约：链接时立即执行 LINK 遍，
//! 只作用于子组件自己的导出；消费方配置完成后执行 COMPLETE 遍，作用于累积的完整契约。
//! 同一遍内按声明顺序执行，两遍不会交错。

use super::build::{BuildContext, ServiceBuild};
use super::map::ServiceMap;
use infrastructure_common::{CompositionError, CompositionResult, RegistryResult};
use serde::Serialize;
use std::fmt;
use tracing::{debug, info};

/// 变换所在的遍
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransformPass {
    /// 链接时，作用于子组件的导出
    Link,
    /// 消费方配置完成后，作用于完整契约
    Complete,
}

type WireletAction = Box<dyn FnOnce(&mut ServiceMap<ServiceBuild>) -> RegistryResult<()> + Send>;

/// 服务变换器
pub struct ServiceWirelet {
    name: String,
    pass: TransformPass,
    action: WireletAction,
}

impl ServiceWirelet {
    pub fn new<F>(name: impl Into<String>, pass: TransformPass, action: F) -> Self
    where
        F: FnOnce(&mut ServiceMap<ServiceBuild>) -> RegistryResult<()> + Send + 'static,
    {
        Self {
            name: name.into(),
            pass,
            action: Box::new(action),
        }
    }

    /// LINK 遍的变换器
    pub fn link<F>(name: impl Into<String>, action: F) -> Self
    where
        F: FnOnce(&mut ServiceMap<ServiceBuild>) -> RegistryResult<()> + Send + 'static,
    {
        Self::new(name, TransformPass::Link, action)
    }

    /// COMPLETE 遍的变换器
    pub fn complete<F>(name: impl Into<String>, action: F) -> Self
    where
        F: FnOnce(&mut ServiceMap<ServiceBuild>) -> RegistryResult<()> + Send + 'static,
    {
        Self::new(name, TransformPass::Complete, action)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pass(&self) -> TransformPass {
        self.pass
    }

    fn apply(self, services: &mut ServiceMap<ServiceBuild>) -> CompositionResult<()> {
        debug!(wirelet = %self.name, pass = ?self.pass, "执行变换器");
        let name = self.name;
        (self.action)(services).map_err(|source| CompositionError::WireletFailed {
            wirelet: name,
            source,
        })
    }
}

impl fmt::Debug for ServiceWirelet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceWirelet")
            .field("name", &self.name)
            .field("pass", &self.pass)
            .finish()
    }
}

/// 服务组合
pub struct ServiceComposition {
    contract: ServiceMap<ServiceBuild>,
    pending: Vec<ServiceWirelet>,
    completed: bool,
}

impl ServiceComposition {
    /// 为消费方创建组合
    pub fn new(context: BuildContext) -> Self {
        Self {
            contract: ServiceMap::new(context),
            pending: Vec::new(),
            completed: false,
        }
    }

    /// 消费方契约，用于消费方自身的配置
    pub fn contract(&self) -> &ServiceMap<ServiceBuild> {
        &self.contract
    }

    pub fn contract_mut(&mut self) -> &mut ServiceMap<ServiceBuild> {
        &mut self.contract
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// 链接子组件
    ///
    /// 立即对子组件导出执行 LINK 遍，并入契约，并把 COMPLETE 遍的变换器排入队列。
    pub fn link(
        &mut self,
        child: &str,
        mut exports: ServiceMap<ServiceBuild>,
        wirelets: Vec<ServiceWirelet>,
    ) -> CompositionResult<()> {
        if self.completed {
            return Err(CompositionError::AlreadyCompleted {
                child: child.to_string(),
            });
        }
        if !exports
            .context()
            .lifetime()
            .same_lifetime(self.contract.context().lifetime())
        {
            return Err(CompositionError::LifetimeMismatch {
                child: child.to_string(),
            });
        }

        let (link, complete): (Vec<_>, Vec<_>) = wirelets
            .into_iter()
            .partition(|w| w.pass == TransformPass::Link);
        for wirelet in link {
            wirelet.apply(&mut exports)?;
        }
        let exported = exports.len();
        let (services, hidden) = exports.into_parts();
        for service in services {
            self.contract.insert(service)?;
        }
        self.contract.adopt_hidden(hidden);
        self.pending.extend(complete);
        info!(child, exported, pending = self.pending.len(), "链接子组件");
        Ok(())
    }

    /// 执行 COMPLETE 遍并返回完整契约
    pub fn complete(&mut self) -> CompositionResult<ServiceMap<ServiceBuild>> {
        if self.completed {
            return Err(CompositionError::AlreadyCompleted {
                child: "<complete>".to_string(),
            });
        }
        self.completed = true;
        let pending = std::mem::take(&mut self.pending);
        let wirelets = pending.len();
        for wirelet in pending {
            wirelet.apply(&mut self.contract)?;
        }
        let context = self.contract.context().clone();
        let contract = std::mem::replace(&mut self.contract, ServiceMap::new(context));
        info!(services = contract.len(), wirelets, "服务组合完成");
        Ok(contract)
    }
}

impl fmt::Debug for ServiceComposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceComposition")
            .field("services", &self.contract.len())
            .field("pending", &self.pending)
            .field("completed", &self.completed)
            .finish()
    }
}
