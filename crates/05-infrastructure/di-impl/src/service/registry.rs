//! 服务注册表
//!
//! 不可变的服务快照，实现 [`ServiceLocator`]。派生（select、spawn、export_from）
//! 总是产生新的快照，原快照不受影响。

use super::map::ServiceMap;
use super::runtime::RuntimeService;
use di_abstractions::{Key, ServiceLocator, ServiceView, Value};
use infrastructure_common::{LookupError, RegistryError, RegistryResult};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

struct RegistryInner {
    services: HashMap<Key, RuntimeService>,
    order: Vec<Key>,
    path: Option<String>,
}

/// 服务注册表
#[derive(Clone)]
pub struct ServiceRegistry {
    inner: Arc<RegistryInner>,
}

impl ServiceRegistry {
    /// 空注册表
    pub fn empty() -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                services: HashMap::new(),
                order: Vec::new(),
                path: None,
            }),
        }
    }

    /// 由运行期服务创建注册表，键重复时失败
    pub fn from_services(
        services: impl IntoIterator<Item = RuntimeService>,
        path: Option<String>,
    ) -> RegistryResult<Self> {
        let mut map = HashMap::new();
        let mut order = Vec::new();
        for service in services {
            let key = service.key().clone();
            if map.contains_key(&key) {
                return Err(RegistryError::DuplicateKey {
                    key: key.to_string(),
                });
            }
            order.push(key.clone());
            map.insert(key, service);
        }
        info!(services = order.len(), path = ?path, "服务注册表已创建");
        Ok(Self {
            inner: Arc::new(RegistryInner {
                services: map,
                order,
                path,
            }),
        })
    }

    /// 所属组件路径
    pub fn path(&self) -> Option<&str> {
        self.inner.path.as_deref()
    }

    pub fn len(&self) -> usize {
        self.inner.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.order.is_empty()
    }

    /// 运行期服务
    pub fn service(&self, key: &Key) -> Option<&RuntimeService> {
        self.inner.services.get(key)
    }

    /// 按注册顺序遍历
    pub fn iter(&self) -> impl Iterator<Item = &RuntimeService> + '_ {
        self.inner
            .order
            .iter()
            .filter_map(|key| self.inner.services.get(key))
    }

    /// 复制为可变换的服务表
    pub fn to_map(&self) -> ServiceMap<RuntimeService> {
        let mut map = ServiceMap::new(());
        for service in self.iter() {
            map.put(service.clone());
        }
        map
    }

    /// 只保留满足条件的服务
    pub fn select<F>(&self, predicate: F) -> Self
    where
        F: Fn(&RuntimeService) -> bool,
    {
        let services = self
            .iter()
            .filter(|s| predicate(s))
            .cloned()
            .collect::<Vec<_>>();
        debug!(selected = services.len(), total = self.len(), "筛选服务");
        Self {
            inner: Arc::new(RegistryInner {
                services: services
                    .iter()
                    .map(|s| (s.key().clone(), s.clone()))
                    .collect(),
                order: services.iter().map(|s| s.key().clone()).collect(),
                path: self.inner.path.clone(),
            }),
        }
    }

    /// 在副本上运行变换，得到新的注册表
    pub fn spawn<F>(&self, transform: F) -> RegistryResult<Self>
    where
        F: FnOnce(&mut ServiceMap<RuntimeService>) -> RegistryResult<()>,
    {
        let mut map = self.to_map();
        transform(&mut map)?;
        info!(services = map.len(), "派生服务注册表");
        Self::from_services(map.into_entries(), self.inner.path.clone())
    }

    /// 把另一个注册表中的服务以别名形式加入，得到新的注册表
    pub fn export_from(&self, other: &ServiceRegistry, keys: &[Key]) -> RegistryResult<Self> {
        let mut map = self.to_map();
        for key in keys {
            let target = other.service(key).ok_or_else(|| RegistryError::NoSuchKey {
                key: key.to_string(),
            })?;
            map.insert(RuntimeService::delegate(key.clone(), target))?;
        }
        info!(exported = keys.len(), "导出服务");
        Self::from_services(map.into_entries(), self.inner.path.clone())
    }
}

impl ServiceLocator for ServiceRegistry {
    fn find_value(&self, key: &Key) -> Option<Value> {
        self.inner.services.get(key).map(RuntimeService::get)
    }

    fn use_value(&self, key: &Key) -> Result<Value, LookupError> {
        self.find_value(key).ok_or_else(|| LookupError::NoSuchService {
            key: key.to_string(),
            path: self.inner.path.clone(),
        })
    }

    fn contains(&self, key: &Key) -> bool {
        self.inner.services.contains_key(key)
    }

    fn keys(&self) -> Vec<Key> {
        self.inner.order.clone()
    }
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("path", &self.inner.path)
            .field("services", &self.iter().collect::<Vec<_>>())
            .finish()
    }
}
