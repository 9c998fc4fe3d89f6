//! 构建期服务与初始化序列

use super::map::{ServiceEntry, ServiceMap};
use super::registry::ServiceRegistry;
use super::runtime::RuntimeService;
use crate::arena::{ArenaLayout, ArenaSlot, LifetimeArena, LifetimeSetup};
use crate::binding::Realm;
use crate::compiled::CompiledOperation;
use crate::invocation::InvocationType;
use crate::operation::{OperationKind, OperationSetup, OperationSpec, OperationTarget};
use crate::resolution::BindingResolution;
use di_abstractions::{
    describe_value_type, value_type_id, Arguments, Decorator, Key, ServiceMode, ServiceView,
    TypeToken, Value, Variable,
};
use infrastructure_common::{RegistryError, RegistryResult, TypeInfo};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// 构建期上下文：所属生命周期和域
#[derive(Debug, Clone)]
pub struct BuildContext {
    lifetime: LifetimeSetup,
    realm: Realm,
}

impl BuildContext {
    pub fn new(lifetime: LifetimeSetup, realm: Realm) -> Self {
        Self { lifetime, realm }
    }

    pub fn lifetime(&self) -> &LifetimeSetup {
        &self.lifetime
    }

    pub fn realm(&self) -> &Realm {
        &self.realm
    }
}

#[derive(Clone)]
enum ServiceSource {
    Instance(Value),
    Operation {
        operation: CompiledOperation,
        slot: Option<ArenaSlot>,
    },
}

/// 构建期服务
///
/// 常量模式的操作服务在创建时分配常量区槽位，初始化序列中调用一次并写入槽位。
#[derive(Clone)]
pub struct ServiceBuild {
    key: Key,
    ty: TypeInfo,
    mode: ServiceMode,
    source: ServiceSource,
}

impl ServiceBuild {
    /// 服务值的类型
    pub fn ty(&self) -> TypeInfo {
        self.ty
    }

    /// 背后的操作，实例服务没有操作
    pub fn operation(&self) -> Option<&CompiledOperation> {
        match &self.source {
            ServiceSource::Instance(_) => None,
            ServiceSource::Operation { operation, .. } => Some(operation),
        }
    }

    /// 常量服务的常量区槽位
    pub fn arena_slot(&self) -> Option<ArenaSlot> {
        match &self.source {
            ServiceSource::Operation { slot, .. } => *slot,
            ServiceSource::Instance(_) => None,
        }
    }

    /// 调用操作并写入常量区槽位；没有槽位的服务什么也不做
    pub fn initialize(&self, arena: &LifetimeArena) -> RegistryResult<()> {
        if let ServiceSource::Operation {
            operation,
            slot: Some(slot),
        } = &self.source
        {
            let value = operation.invoke_with(arena);
            arena.initialize(*slot, value)?;
            debug!(key = %self.key, index = slot.index(), "初始化常量服务");
        }
        Ok(())
    }

    /// 转换为运行期服务
    ///
    /// # Panics
    ///
    /// 常量服务的槽位尚未初始化时 panic。
    pub fn finalize(&self, arena: &Arc<LifetimeArena>) -> RuntimeService {
        match &self.source {
            ServiceSource::Instance(value) => RuntimeService::Constant {
                key: self.key.clone(),
                ty: self.ty,
                value: Arc::clone(value),
            },
            ServiceSource::Operation {
                slot: Some(slot), ..
            } => RuntimeService::Constant {
                key: self.key.clone(),
                ty: self.ty,
                value: Arc::clone(arena.read(slot.index())),
            },
            ServiceSource::Operation {
                operation,
                slot: None,
            } => RuntimeService::Prototype {
                key: self.key.clone(),
                operation: operation.close_over(Arc::clone(arena)),
            },
        }
    }

    fn mismatch(key: &Key, value: &Value) -> RegistryError {
        RegistryError::InstanceTypeMismatch {
            key: key.to_string(),
            expected: key.type_info().to_string(),
            actual: describe_value_type(value, key.type_info()),
        }
    }
}

impl ServiceView for ServiceBuild {
    fn key(&self) -> &Key {
        &self.key
    }

    fn mode(&self) -> ServiceMode {
        self.mode
    }
}

impl ServiceEntry for ServiceBuild {
    type Context = BuildContext;

    fn shape(_: &BuildContext) -> InvocationType {
        InvocationType::lifetime()
    }

    fn instance(_: &BuildContext, key: Key, instance: Value) -> RegistryResult<Self> {
        if value_type_id(&instance) != key.type_info().id {
            return Err(Self::mismatch(&key, &instance));
        }
        Ok(Self {
            ty: key.type_info(),
            key,
            mode: ServiceMode::Constant,
            source: ServiceSource::Instance(instance),
        })
    }

    fn from_operation(
        context: &BuildContext,
        key: Key,
        mode: ServiceMode,
        operation: CompiledOperation,
    ) -> RegistryResult<Self> {
        let ty = operation.returns();
        if ty != key.type_info() {
            return Err(RegistryError::InstanceTypeMismatch {
                key: key.to_string(),
                expected: key.type_info().to_string(),
                actual: ty.to_string(),
            });
        }
        let slot = match mode {
            ServiceMode::Constant => Some(context.lifetime.reserve_type(ty)?),
            ServiceMode::Transient => None,
        };
        Ok(Self {
            key,
            ty,
            mode,
            source: ServiceSource::Operation { operation, slot },
        })
    }

    fn rekeyed(self, key: Key) -> Self {
        Self { key, ..self }
    }

    fn decorated(&self, context: &BuildContext, decorator: Decorator) -> RegistryResult<Self> {
        let source = match &self.source {
            ServiceSource::Instance(value) => {
                let decorated = decorator(Arc::clone(value));
                if value_type_id(&decorated) != self.ty.id {
                    return Err(Self::mismatch(&self.key, &decorated));
                }
                ServiceSource::Instance(decorated)
            }
            ServiceSource::Operation { operation, slot } => {
                let spec = OperationSpec::from_fn(
                    format!("decorate({})", self.key),
                    OperationTarget::new(OperationKind::Function, self.ty),
                    move |args: &Arguments| match args.value(0) {
                        Some(value) => decorator(Arc::clone(value)),
                        None => panic!("被装饰的服务值缺席"),
                    },
                )
                .param(Variable::new(TypeToken::Plain(self.ty)));
                let mut adapter =
                    OperationSetup::new(spec, context.realm.clone(), operation.shape())?;
                adapter.bind_hook(0, BindingResolution::operation(operation.clone()))?;
                ServiceSource::Operation {
                    operation: adapter.compile()?,
                    slot: *slot,
                }
            }
        };
        Ok(Self {
            key: self.key.clone(),
            ty: self.ty,
            mode: self.mode,
            source,
        })
    }

    fn resolution(&self) -> BindingResolution {
        match &self.source {
            ServiceSource::Instance(value) => {
                BindingResolution::constant_value(self.ty, Some(Arc::clone(value)))
            }
            ServiceSource::Operation {
                slot: Some(slot), ..
            } => BindingResolution::arena(*slot),
            ServiceSource::Operation {
                operation,
                slot: None,
            } => BindingResolution::operation(operation.clone()),
        }
    }

    fn type_info(&self) -> TypeInfo {
        self.ty
    }

    fn writes_arena(&self) -> bool {
        self.arena_slot().is_some()
    }
}

impl fmt::Debug for ServiceBuild {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceBuild")
            .field("key", &self.key.to_string())
            .field("mode", &self.mode)
            .field("operation", &self.operation().map(CompiledOperation::name))
            .field("slot", &self.arena_slot().map(|s| s.index()))
            .finish()
    }
}

/// 初始化序列
///
/// 冻结常量区布局，并按常量服务之间的常量区读取关系排出初始化顺序。
/// 已从服务表移除的常量服务只在仍有服务读取其槽位时初始化，且不进入注册表。
pub struct InitializationPlan {
    layout: ArenaLayout,
    services: Vec<ServiceBuild>,
    visible: usize,
    order: Vec<usize>,
}

impl InitializationPlan {
    /// 冻结生命周期并计算初始化顺序
    pub fn prepare(map: ServiceMap<ServiceBuild>) -> RegistryResult<Self> {
        let layout = map.context().lifetime().freeze()?;
        let (services, hidden) = map.into_parts();
        let visible = services.len();
        let services = services.into_iter().chain(hidden).collect::<Vec<_>>();
        let writers: HashMap<usize, usize> = services
            .iter()
            .enumerate()
            .filter_map(|(position, s)| s.arena_slot().map(|slot| (slot.index(), position)))
            .collect();

        let mut order = Vec::with_capacity(writers.len());
        let mut visited = HashSet::new();
        let mut visiting = Vec::new();
        for (position, service) in services[..visible].iter().enumerate() {
            if service.arena_slot().is_some() {
                visit(
                    position,
                    &services,
                    &writers,
                    &mut visited,
                    &mut visiting,
                    &mut order,
                )?;
            } else if let Some(operation) = service.operation() {
                for index in operation.arena_reads() {
                    if let Some(&writer) = writers.get(&index) {
                        visit(
                            writer,
                            &services,
                            &writers,
                            &mut visited,
                            &mut visiting,
                            &mut order,
                        )?;
                    }
                }
            }
        }
        info!(
            services = visible,
            hidden = services.len() - visible,
            constants = order.len(),
            capacity = layout.capacity(),
            "初始化序列已确定"
        );
        Ok(Self {
            layout,
            services,
            visible,
            order,
        })
    }

    /// 常量区布局
    pub fn layout(&self) -> &ArenaLayout {
        &self.layout
    }

    /// 按初始化顺序排列的常量服务键
    pub fn initialization_order(&self) -> Vec<&Key> {
        self.order.iter().map(|&i| &self.services[i].key).collect()
    }

    /// 依次初始化常量服务，然后生成服务注册表
    ///
    /// 常量区中不属于服务的槽位需要在调用前初始化完毕。
    pub fn initialize(
        self,
        arena: Arc<LifetimeArena>,
        path: Option<String>,
    ) -> RegistryResult<ServiceRegistry> {
        for &position in &self.order {
            self.services[position].initialize(&arena)?;
        }
        let services = self.services[..self.visible]
            .iter()
            .map(|service| service.finalize(&arena))
            .collect::<Vec<_>>();
        ServiceRegistry::from_services(services, path)
    }
}

fn visit(
    current: usize,
    services: &[ServiceBuild],
    writers: &HashMap<usize, usize>,
    visited: &mut HashSet<usize>,
    visiting: &mut Vec<usize>,
    order: &mut Vec<usize>,
) -> RegistryResult<()> {
    if let Some(start) = visiting.iter().position(|&p| p == current) {
        let chain = visiting[start..]
            .iter()
            .chain(std::iter::once(&current))
            .map(|&p| services[p].key.to_string())
            .collect::<Vec<_>>()
            .join(" -> ");
        return Err(RegistryError::CircularDependency { chain });
    }
    if visited.contains(&current) {
        return Ok(());
    }

    visiting.push(current);
    if let Some(operation) = services[current].operation() {
        for index in operation.arena_reads() {
            if let Some(&writer) = writers.get(&index) {
                visit(writer, services, writers, visited, visiting, order)?;
            }
        }
    }
    visiting.pop();
    visited.insert(current);
    order.push(current);
    Ok(())
}
