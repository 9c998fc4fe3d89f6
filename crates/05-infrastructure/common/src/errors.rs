//! 错误类型定义
//!
//! 构建期错误（依赖推导、绑定、编译、注册表变换）一律中止装配；
//! 运行期只会出现 [`LookupError`]。

use thiserror::Error;

/// 依赖推导错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DependencyError {
    #[error("可选性包装层数过多: {type_name}")]
    MultipleOptionalityLayers { type_name: String },

    #[error("可空标记与可选容器冲突: {type_name}")]
    ConflictingOptionality { type_name: String },

    #[error("必需依赖没有空值表示: {key}")]
    RequiredValueMissing { key: String },
}

/// 绑定错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BindingError {
    #[error("参数槽已绑定: {operation}[{slot}]")]
    AlreadyBound { operation: String, slot: usize },

    #[error("不允许绑定静态成员: {operation}[{slot}]")]
    StaticBindingNotAllowed { operation: String, slot: usize },

    #[error("参数槽不存在: {operation}[{slot}], 共 {slots} 个参数槽")]
    SlotOutOfRange {
        operation: String,
        slot: usize,
        slots: usize,
    },

    #[error("类型不匹配: {operation}[{slot}], 期望 {expected}, 实际 {actual}")]
    TypeMismatch {
        operation: String,
        slot: usize,
        expected: String,
        actual: String,
    },

    #[error("参数槽不可为空: {operation}[{slot}] ({key})")]
    NullNotAllowed {
        operation: String,
        slot: usize,
        key: String,
    },

    #[error("调用参数下标越界: {operation}[{slot}], 下标 {index}, 共 {arguments} 个调用参数")]
    ArgumentIndexOutOfRange {
        operation: String,
        slot: usize,
        index: usize,
        arguments: usize,
    },

    #[error("调用形态不一致: {operation} 与嵌套操作 {nested}")]
    InvocationShapeMismatch { operation: String, nested: String },

    #[error("调用形态不包含常量区: {operation}[{slot}]")]
    ArenaUnavailable { operation: String, slot: usize },
}

/// 操作编译错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OperationError {
    #[error("操作存在未绑定的参数槽: {operation}, 未绑定 {unbound:?}")]
    IncompleteBinding {
        operation: String,
        unbound: Vec<usize>,
    },

    #[error("操作参数依赖推导失败: {operation}, 原因: {source}")]
    Dependency {
        operation: String,
        #[source]
        source: DependencyError,
    },

    #[error(transparent)]
    Binding(#[from] BindingError),
}

/// 常量区错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArenaError {
    #[error("常量区容量超出上限: 需要 {capacity}, 上限 {limit}")]
    CapacityExceeded { capacity: usize, limit: usize },

    #[error("常量区已冻结，不能再分配槽位")]
    Frozen,

    #[error("常量区槽位已初始化: {index}")]
    AlreadyInitialized { index: usize },

    #[error("常量区槽位越界: {index}, 容量 {capacity}")]
    IndexOutOfRange { index: usize, capacity: usize },

    #[error("常量区槽位类型不匹配: {index}, 期望 {expected}, 实际 {actual}")]
    TypeMismatch {
        index: usize,
        expected: String,
        actual: String,
    },
}

/// 服务注册表变换错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("服务键不存在: {key}")]
    NoSuchKey { key: String },

    #[error("服务键重命名冲突: {from} -> {to}")]
    RekeyCollision { from: String, to: String },

    #[error("服务键不能重命名为自身: {key}")]
    RekeyToSameKey { key: String },

    #[error("服务键重复: {key}")]
    DuplicateKey { key: String },

    #[error("服务实例类型与键不符: {key}, 期望 {expected}, 实际 {actual}")]
    InstanceTypeMismatch {
        key: String,
        expected: String,
        actual: String,
    },

    #[error("无法解析依赖: {operation} 需要 {key}")]
    UnresolvedDependency { operation: String, key: String },

    #[error("常量服务之间存在循环依赖: {chain}")]
    CircularDependency { chain: String },

    #[error("服务操作调用形态不符: {operation}")]
    ShapeMismatch { operation: String },

    #[error(transparent)]
    Operation(#[from] OperationError),

    #[error(transparent)]
    Arena(#[from] ArenaError),
}

impl From<BindingError> for RegistryError {
    fn from(source: BindingError) -> Self {
        Self::Operation(OperationError::Binding(source))
    }
}

/// 服务组合流水线错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompositionError {
    #[error("服务组合已完成，不能再链接: {child}")]
    AlreadyCompleted { child: String },

    #[error("子组件不属于同一个生命周期: {child}")]
    LifetimeMismatch { child: String },

    #[error("变换器执行失败: {wirelet}, 原因: {source}")]
    WireletFailed {
        wirelet: String,
        #[source]
        source: RegistryError,
    },

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// 服务查找错误（运行期）
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("服务不存在: {key}{}", describe_path(.path))]
    NoSuchService { key: String, path: Option<String> },

    #[error("服务类型不匹配: {key}, 期望 {expected}")]
    TypeMismatch { key: String, expected: String },
}

fn describe_path(path: &Option<String>) -> String {
    path.as_ref()
        .map(|p| format!(" (组件路径: {p})"))
        .unwrap_or_default()
}

/// 配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("配置加载失败: {source}")]
    LoadFailed {
        #[from]
        source: config::ConfigError,
    },

    #[error("配置验证失败: {message}")]
    ValidationError { message: String },
}

/// 装配错误
#[derive(Error, Debug)]
pub enum AssemblyError {
    #[error("依赖推导错误: {source}")]
    Dependency {
        #[from]
        source: DependencyError,
    },

    #[error("绑定错误: {source}")]
    Binding {
        #[from]
        source: BindingError,
    },

    #[error("编译错误: {source}")]
    Operation {
        #[from]
        source: OperationError,
    },

    #[error("常量区错误: {source}")]
    Arena {
        #[from]
        source: ArenaError,
    },

    #[error("注册表错误: {source}")]
    Registry {
        #[from]
        source: RegistryError,
    },

    #[error("服务组合错误: {source}")]
    Composition {
        #[from]
        source: CompositionError,
    },

    #[error("配置错误: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error("装配启动失败: {message}")]
    BootstrapFailed { message: String },
}

/// 结果类型别名
pub type DependencyResult<T> = Result<T, DependencyError>;
pub type BindingResult<T> = Result<T, BindingError>;
pub type OperationResult<T> = Result<T, OperationError>;
pub type ArenaResult<T> = Result<T, ArenaError>;
pub type RegistryResult<T> = Result<T, RegistryError>;
pub type CompositionResult<T> = Result<T, CompositionError>;
pub type LookupResult<T> = Result<T, LookupError>;
pub type ConfigResult<T> = Result<T, ConfigError>;
pub type AssemblyResult<T> = Result<T, AssemblyError>;
