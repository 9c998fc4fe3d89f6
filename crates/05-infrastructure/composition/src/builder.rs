//! 装配构建器

use crate::application::Application;
use di_abstractions::{value, Key, ServiceMode, ServiceTransformer, Value};
use di_impl::{
    ArenaSlot, BindingResolution, BuildContext, CodeGenPhase, CodeGenSupplier, DependencyCache,
    InitializationPlan, InvocationType, LifetimeSetup, OperationSetup, OperationSpec, Realm,
    ServiceBuild, ServiceComposition, ServiceMap, ServiceWirelet,
};
use infrastructure_common::{AssemblyError, AssemblyResult, EngineConfig, LoggingSettings};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

/// 装配构建器
///
/// 驱动一次完整的装配：注册操作、按服务解析依赖、链接子组件、
/// 运行代码生成阶段、分配常量区并按序初始化常量服务，最后得到不可变的注册表。
pub struct AssemblyBuilder {
    /// 引擎配置
    config: EngineConfig,
    /// 日志配置，未设置时不初始化日志
    logging: Option<LoggingConfig>,
    realm: Realm,
    /// 组件路径，出现在查找失败的错误信息中
    path: Option<String>,
    context: BuildContext,
    cache: DependencyCache,
    codegen: CodeGenPhase,
    composition: ServiceComposition,
    /// 不属于任何服务的常量区槽位
    internals: Vec<(ArenaSlot, Value)>,
}

impl AssemblyBuilder {
    /// 使用默认配置创建构建器
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(name, EngineConfig::default())
    }

    /// 使用给定配置创建构建器
    pub fn with_config(name: impl Into<String>, config: EngineConfig) -> Self {
        let realm = Realm::new(name);
        let context = BuildContext::new(
            LifetimeSetup::new(config.max_arena_capacity),
            realm.clone(),
        );
        info!(
            realm = %realm,
            max_arena_capacity = config.max_arena_capacity,
            "创建装配构建器"
        );
        Self {
            config,
            logging: None,
            realm,
            path: None,
            composition: ServiceComposition::new(context.clone()),
            context,
            cache: DependencyCache::new(),
            codegen: CodeGenPhase::new(),
            internals: Vec::new(),
        }
    }

    /// 从配置文件和环境变量加载配置后创建构建器
    pub fn load(name: impl Into<String>, path: Option<&Path>) -> AssemblyResult<Self> {
        let config = EngineConfig::load(path)?;
        Ok(Self::with_config(name, config))
    }

    /// 配置日志
    pub fn with_logging(mut self, config: LoggingConfig) -> Self {
        self.logging = Some(config);
        self
    }

    /// 按引擎配置中的日志设置初始化日志
    pub fn with_configured_logging(self) -> AssemblyResult<Self> {
        let logging = LoggingConfig::from_settings(&self.config.logging)?;
        Ok(self.with_logging(logging))
    }

    /// 设置组件路径
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn realm(&self) -> &Realm {
        &self.realm
    }

    pub fn context(&self) -> &BuildContext {
        &self.context
    }

    /// 当前的服务契约
    pub fn services(&self) -> &ServiceMap<ServiceBuild> {
        self.composition.contract()
    }

    /// 可变的服务契约，用于直接调用变换操作
    pub fn services_mut(&mut self) -> &mut ServiceMap<ServiceBuild> {
        self.composition.contract_mut()
    }

    /// 注册一个以生命周期为调用形状的操作
    ///
    /// 依赖推导经由本次装配的缓存。
    pub fn operation(&mut self, spec: OperationSpec) -> AssemblyResult<OperationSetup> {
        let mut setup = OperationSetup::new_cached(
            spec,
            self.realm.clone(),
            InvocationType::lifetime(),
            &mut self.cache,
        )?;
        if self.config.allow_static_field_binding {
            setup.allow_static_field_binding();
        }
        Ok(setup)
    }

    /// 用当前契约中的服务绑定操作的未绑定参数槽
    ///
    /// 返回全部依赖是否都来自常量服务。
    pub fn resolve_dependencies(&self, setup: &mut OperationSetup) -> AssemblyResult<bool> {
        Ok(self.composition.contract().resolve_operation(setup)?)
    }

    /// 提供一个现成实例作为常量服务
    pub fn provide_instance<T: Send + Sync + 'static>(
        &mut self,
        key: Key,
        instance: T,
    ) -> AssemblyResult<()> {
        self.composition
            .contract_mut()
            .provide_instance(key, value(instance))?;
        Ok(())
    }

    /// 以操作提供常量服务，操作只在初始化时调用一次
    pub fn provide_constant(&mut self, key: Key, setup: OperationSetup) -> AssemblyResult<()> {
        self.provide(key, ServiceMode::Constant, setup)
    }

    /// 以操作提供原型服务，每次查找都调用一次
    pub fn provide_prototype(&mut self, key: Key, setup: OperationSetup) -> AssemblyResult<()> {
        self.provide(key, ServiceMode::Transient, setup)
    }

    /// 以操作提供服务，模式由依赖决定
    pub fn map(&mut self, key: Key, setup: OperationSetup) -> AssemblyResult<()> {
        self.composition.contract_mut().map(key, setup)?;
        Ok(())
    }

    fn provide(
        &mut self,
        key: Key,
        mode: ServiceMode,
        mut setup: OperationSetup,
    ) -> AssemblyResult<()> {
        self.resolve_dependencies(&mut setup)?;
        let operation = setup.compile()?;
        self.composition
            .contract_mut()
            .provide(key, mode, operation)?;
        Ok(())
    }

    /// 登记一个代码生成期的值，返回可用于绑定的解析策略
    pub fn code_generated<T, F>(&mut self, name: impl Into<String>, f: F) -> BindingResolution
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let supplier = CodeGenSupplier::new(name, f);
        self.codegen.register(Arc::clone(&supplier));
        BindingResolution::code_generated(supplier)
    }

    /// 在常量区预留一个内部常量，返回读取它的解析策略
    pub fn internal_constant<T: Send + Sync + 'static>(
        &mut self,
        constant: T,
    ) -> AssemblyResult<BindingResolution> {
        let slot = self.context.lifetime().reserve::<T>()?;
        debug!(slot = slot.index(), ty = %slot.type_info(), "预留内部常量");
        self.internals.push((slot, value(constant)));
        Ok(BindingResolution::arena(slot))
    }

    /// 为子组件创建与本次装配共享生命周期的服务表
    pub fn child_services(&self) -> ServiceMap<ServiceBuild> {
        ServiceMap::new(self.context.clone())
    }

    /// 链接子组件的导出服务
    pub fn link(
        &mut self,
        child: &str,
        exports: ServiceMap<ServiceBuild>,
        wirelets: Vec<ServiceWirelet>,
    ) -> AssemblyResult<()> {
        self.composition.link(child, exports, wirelets)?;
        Ok(())
    }

    /// 完成装配
    pub fn build(mut self) -> AssemblyResult<Application> {
        if let Some(logging) = &self.logging {
            logging.initialize()?;
        }
        info!(realm = %self.realm, "开始装配");

        let contract = self.composition.complete()?;
        let generated = self.codegen.run();
        debug!(generated, "代码生成阶段完成");

        let plan = InitializationPlan::prepare(contract)?;
        let arena = Arc::new(plan.layout().allocate());
        for (slot, constant) in self.internals.drain(..) {
            arena.initialize(slot, constant)?;
        }
        let registry = plan.initialize(Arc::clone(&arena), self.path.clone())?;

        info!(
            realm = %self.realm,
            services = registry.len(),
            capacity = arena.capacity(),
            "装配完成"
        );
        Ok(Application::new(registry, arena))
    }
}

/// 日志配置
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// 日志级别
    pub level: tracing::Level,
    /// 是否显示目标
    pub show_target: bool,
    /// 是否显示线程ID
    pub show_thread_ids: bool,
    /// 是否显示文件名
    pub show_file: bool,
    /// 是否显示行号
    pub show_line_number: bool,
    /// 是否使用 JSON 格式
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: tracing::Level::INFO,
            show_target: true,
            show_thread_ids: false,
            show_file: false,
            show_line_number: false,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// 创建开发环境日志配置
    pub fn development() -> Self {
        Self {
            level: tracing::Level::DEBUG,
            show_thread_ids: true,
            show_file: true,
            show_line_number: true,
            ..Self::default()
        }
    }

    /// 创建生产环境日志配置
    pub fn production() -> Self {
        Self {
            show_target: false,
            json_format: true,
            ..Self::default()
        }
    }

    /// 从引擎配置的日志设置转换
    pub fn from_settings(settings: &LoggingSettings) -> AssemblyResult<Self> {
        let level = tracing::Level::from_str(&settings.level).map_err(|e| {
            AssemblyError::BootstrapFailed {
                message: format!("无效的日志级别 {}: {}", settings.level, e),
            }
        })?;
        Ok(Self {
            level,
            json_format: settings.json,
            ..Self::default()
        })
    }

    /// 初始化全局日志订阅者
    ///
    /// 进程内只能成功一次，重复初始化返回错误。
    pub fn initialize(&self) -> AssemblyResult<()> {
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(self.level)
            .with_target(self.show_target)
            .with_thread_ids(self.show_thread_ids)
            .with_file(self.show_file)
            .with_line_number(self.show_line_number);

        if self.json_format {
            subscriber.json().try_init()
        } else {
            subscriber.try_init()
        }
        .map_err(|e| AssemblyError::BootstrapFailed {
            message: format!("日志初始化失败: {}", e),
        })?;

        info!("日志系统初始化完成");
        Ok(())
    }
}
