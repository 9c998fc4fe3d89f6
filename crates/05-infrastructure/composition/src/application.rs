//! 装配结果

use di_abstractions::{Key, ServiceLocator, Value};
use di_impl::{LifetimeArena, ServiceRegistry};
use infrastructure_common::LookupError;
use std::fmt;
use std::sync::Arc;

/// 已完成装配的应用
///
/// 持有服务注册表和它背后的常量区。
#[derive(Clone)]
pub struct Application {
    registry: ServiceRegistry,
    arena: Arc<LifetimeArena>,
}

impl Application {
    pub(crate) fn new(registry: ServiceRegistry, arena: Arc<LifetimeArena>) -> Self {
        Self { registry, arena }
    }

    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    /// 本次装配的常量区
    pub fn arena(&self) -> &Arc<LifetimeArena> {
        &self.arena
    }

    pub fn into_registry(self) -> ServiceRegistry {
        self.registry
    }
}

impl ServiceLocator for Application {
    fn find_value(&self, key: &Key) -> Option<Value> {
        self.registry.find_value(key)
    }

    fn use_value(&self, key: &Key) -> Result<Value, LookupError> {
        self.registry.use_value(key)
    }

    fn contains(&self, key: &Key) -> bool {
        ServiceLocator::contains(&self.registry, key)
    }

    fn keys(&self) -> Vec<Key> {
        ServiceLocator::keys(&self.registry)
    }
}

impl fmt::Debug for Application {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Application")
            .field("services", &self.registry.len())
            .field("arena", &self.arena.capacity())
            .finish()
    }
}
