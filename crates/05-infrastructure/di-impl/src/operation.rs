//! 操作
//!
//! [`OperationSetup`] 是一个可调用单元（构造函数、方法、函数或字段访问）及其
//! 按参数顺序排列的绑定。全部参数槽绑定后编译为 [`CompiledOperation`]，
//! 编译结果被缓存，一个操作最多编译一次。

use crate::binding::{BindingKind, BindingMirror, BindingSetup, Realm};
use crate::cache::DependencyCache;
use crate::compiled::{CompiledOperation, SlotFill};
use crate::invocation::{InvocationMirror, InvocationType};
use crate::resolution::BindingResolution;
use di_abstractions::{
    invoker, value_type_id, Arguments, Dependency, Invoker, TypeToken, Variable,
};
use infrastructure_common::{
    BindingError, BindingResult, OperationError, OperationResult, TypeInfo,
};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// 可调用单元的种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationKind {
    Constructor,
    Method,
    Function,
    FieldGet,
    FieldSet,
}

/// 可调用单元的形状
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OperationTarget {
    pub kind: OperationKind,
    pub is_static: bool,
    pub returns: TypeInfo,
}

impl OperationTarget {
    pub fn new(kind: OperationKind, returns: TypeInfo) -> Self {
        Self {
            kind,
            is_static: false,
            returns,
        }
    }

    /// 构造函数，返回构造出的实例
    pub fn constructor<R: Send + Sync + 'static>() -> Self {
        Self::new(OperationKind::Constructor, TypeInfo::of::<R>())
    }

    pub fn method<R: Send + Sync + 'static>() -> Self {
        Self::new(OperationKind::Method, TypeInfo::of::<R>())
    }

    pub fn function<R: Send + Sync + 'static>() -> Self {
        Self::new(OperationKind::Function, TypeInfo::of::<R>())
    }

    pub fn field_get<R: Send + Sync + 'static>() -> Self {
        Self::new(OperationKind::FieldGet, TypeInfo::of::<R>())
    }

    /// 字段写入，返回单元类型
    pub fn field_set() -> Self {
        Self::new(OperationKind::FieldSet, TypeInfo::of::<()>())
    }

    /// 标记为静态成员
    #[must_use]
    pub fn static_site(mut self) -> Self {
        self.is_static = true;
        self
    }
}

/// 操作定义：名称、形状、参数声明点和基础可调用对象
#[derive(Clone)]
pub struct OperationSpec {
    name: String,
    target: OperationTarget,
    params: Vec<Variable>,
    invoker: Invoker,
}

impl OperationSpec {
    pub fn new(name: impl Into<String>, target: OperationTarget, invoker: Invoker) -> Self {
        Self {
            name: name.into(),
            target,
            params: Vec::new(),
            invoker,
        }
    }

    /// 由闭包创建操作定义
    pub fn from_fn<F>(name: impl Into<String>, target: OperationTarget, f: F) -> Self
    where
        F: Fn(&Arguments) -> di_abstractions::Value + Send + Sync + 'static,
    {
        Self::new(name, target, invoker(f))
    }

    /// 追加参数声明点
    #[must_use]
    pub fn param(mut self, variable: Variable) -> Self {
        self.params.push(variable);
        self
    }

    /// 追加多个参数声明点
    #[must_use]
    pub fn params(mut self, variables: impl IntoIterator<Item = Variable>) -> Self {
        self.params.extend(variables);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target(&self) -> &OperationTarget {
        &self.target
    }

    pub fn parameters(&self) -> &[Variable] {
        &self.params
    }
}

impl fmt::Debug for OperationSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationSpec")
            .field("name", &self.name)
            .field("target", &self.target)
            .field("params", &self.params)
            .finish()
    }
}

/// 操作的编译状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", tag = "state")]
pub enum OperationState {
    /// 正在收集绑定
    Collecting { bound: usize, slots: usize },
    /// 全部参数槽已绑定
    Ready,
    /// 已编译
    Compiled,
}

/// 操作的调试镜像
#[derive(Debug, Clone, Serialize)]
pub struct OperationMirror {
    pub name: String,
    pub kind: OperationKind,
    pub is_static: bool,
    pub returns: String,
    pub shape: InvocationMirror,
    pub state: OperationState,
    pub bindings: Vec<BindingMirror>,
}

impl OperationMirror {
    /// 序列化为 JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// 构建期的操作
pub struct OperationSetup {
    name: String,
    target: OperationTarget,
    realm: Realm,
    shape: InvocationType,
    invoker: Invoker,
    bindings: Vec<BindingSetup>,
    allow_static: bool,
    compiled: Option<CompiledOperation>,
}

impl OperationSetup {
    /// 创建操作，为每个参数推导依赖并创建未绑定的参数槽
    pub fn new(spec: OperationSpec, realm: Realm, shape: InvocationType) -> OperationResult<Self> {
        let dependencies = spec
            .params
            .iter()
            .map(Dependency::from_variable)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|source| OperationError::Dependency {
                operation: spec.name.clone(),
                source,
            })?;
        Ok(Self::with_dependencies(spec, realm, shape, dependencies))
    }

    /// 创建操作，依赖推导经由缓存
    pub fn new_cached(
        spec: OperationSpec,
        realm: Realm,
        shape: InvocationType,
        cache: &mut DependencyCache,
    ) -> OperationResult<Self> {
        let dependencies =
            cache
                .derive_all(&spec.params)
                .map_err(|source| OperationError::Dependency {
                    operation: spec.name.clone(),
                    source,
                })?;
        Ok(Self::with_dependencies(spec, realm, shape, dependencies))
    }

    fn with_dependencies(
        spec: OperationSpec,
        realm: Realm,
        shape: InvocationType,
        dependencies: Vec<Dependency>,
    ) -> Self {
        let bindings = dependencies
            .into_iter()
            .enumerate()
            .map(|(slot, dependency)| BindingSetup::new(slot, realm.clone(), dependency))
            .collect::<Vec<_>>();
        debug!(
            operation = %spec.name,
            slots = bindings.len(),
            shape = %shape,
            "注册操作"
        );
        Self {
            name: spec.name,
            target: spec.target,
            realm,
            shape,
            invoker: spec.invoker,
            bindings,
            allow_static: false,
            compiled: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target(&self) -> &OperationTarget {
        &self.target
    }

    pub fn realm(&self) -> &Realm {
        &self.realm
    }

    /// 调用形态
    pub fn shape(&self) -> &InvocationType {
        &self.shape
    }

    /// 全部参数槽
    pub fn bindings(&self) -> &[BindingSetup] {
        &self.bindings
    }

    pub fn binding(&self, slot: usize) -> Option<&BindingSetup> {
        self.bindings.get(slot)
    }

    pub fn binding_mut(&mut self, slot: usize) -> Option<&mut BindingSetup> {
        self.bindings.get_mut(slot)
    }

    /// 允许绑定静态成员
    pub fn allow_static_field_binding(&mut self) {
        self.allow_static = true;
    }

    /// 未绑定的参数槽
    pub fn unbound_slots(&self) -> Vec<usize> {
        self.bindings
            .iter()
            .filter(|b| !b.is_bound())
            .map(BindingSetup::slot)
            .collect()
    }

    pub fn state(&self) -> OperationState {
        if self.compiled.is_some() {
            return OperationState::Compiled;
        }
        let bound = self.bindings.iter().filter(|b| b.is_bound()).count();
        if bound == self.bindings.len() {
            OperationState::Ready
        } else {
            OperationState::Collecting {
                bound,
                slots: self.bindings.len(),
            }
        }
    }

    fn check_bindable(&self, slot: usize) -> BindingResult<&BindingSetup> {
        let binding = self
            .bindings
            .get(slot)
            .ok_or_else(|| BindingError::SlotOutOfRange {
                operation: self.name.clone(),
                slot,
                slots: self.bindings.len(),
            })?;
        if binding.is_bound() {
            return Err(BindingError::AlreadyBound {
                operation: self.name.clone(),
                slot,
            });
        }
        if self.target.is_static && !self.allow_static {
            return Err(BindingError::StaticBindingNotAllowed {
                operation: self.name.clone(),
                slot,
            });
        }
        Ok(binding)
    }

    fn type_mismatch(&self, slot: usize, expected: TypeInfo, actual: TypeInfo) -> BindingError {
        BindingError::TypeMismatch {
            operation: self.name.clone(),
            slot,
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    fn validate(
        &self,
        slot: usize,
        dependency: &Dependency,
        resolution: &BindingResolution,
    ) -> BindingResult<()> {
        let expected = dependency.representation();
        match resolution {
            BindingResolution::FromConstant { ty, value: Some(v) } => {
                if value_type_id(v) != expected.id {
                    return Err(self.type_mismatch(slot, expected, *ty));
                }
            }
            BindingResolution::FromConstant { value: None, .. } => {
                if !dependency.is_nullable() {
                    return Err(BindingError::NullNotAllowed {
                        operation: self.name.clone(),
                        slot,
                        key: dependency.key().to_string(),
                    });
                }
            }
            BindingResolution::FromCodeGenerated { supplier } => {
                if supplier.type_info() != expected {
                    return Err(self.type_mismatch(slot, expected, supplier.type_info()));
                }
            }
            BindingResolution::FromInvocationArgument { index } => {
                let actual = self.shape.arguments().get(*index).copied().ok_or(
                    BindingError::ArgumentIndexOutOfRange {
                        operation: self.name.clone(),
                        slot,
                        index: *index,
                        arguments: self.shape.arguments().len(),
                    },
                )?;
                if actual != expected {
                    return Err(self.type_mismatch(slot, expected, actual));
                }
            }
            BindingResolution::FromOperation { operation } => {
                if operation.returns() != expected {
                    return Err(self.type_mismatch(slot, expected, operation.returns()));
                }
                let nested = operation.shape();
                if !nested.is_empty() && nested != self.shape {
                    return Err(BindingError::InvocationShapeMismatch {
                        operation: self.name.clone(),
                        nested: operation.name().to_string(),
                    });
                }
            }
            BindingResolution::FromLifetimeArena { slot: arena_slot } => {
                if !self.shape.requires_arena() {
                    return Err(BindingError::ArenaUnavailable {
                        operation: self.name.clone(),
                        slot,
                    });
                }
                if arena_slot.type_info() != expected {
                    return Err(self.type_mismatch(slot, expected, arena_slot.type_info()));
                }
            }
        }
        Ok(())
    }

    /// 绑定参数槽
    ///
    /// 每个参数槽只能绑定一次；静态成员需要先调用
    /// [`allow_static_field_binding`](Self::allow_static_field_binding)。
    /// 常量、实参、嵌套操作和常量区槽位的类型在这里立即校验。
    pub fn bind(
        &mut self,
        slot: usize,
        kind: BindingKind,
        resolution: BindingResolution,
    ) -> BindingResult<()> {
        let dependency = self.check_bindable(slot)?.dependency().clone();
        self.validate(slot, &dependency, &resolution)?;
        debug!(
            operation = %self.name,
            slot,
            key = %dependency.key(),
            provider = %resolution,
            "绑定参数槽"
        );
        self.bindings[slot].resolve(kind, resolution);
        Ok(())
    }

    pub fn bind_manual(&mut self, slot: usize, resolution: BindingResolution) -> BindingResult<()> {
        self.bind(slot, BindingKind::Manual, resolution)
    }

    pub fn bind_hook(&mut self, slot: usize, resolution: BindingResolution) -> BindingResult<()> {
        self.bind(slot, BindingKind::Hook, resolution)
    }

    /// 把参数槽绑定到嵌套操作的结果
    ///
    /// 子操作继承本操作的调用形态和域，由 `configure` 绑定其参数槽后立即编译；
    /// 子操作的错误在这里直接返回。
    pub fn bind_op<F>(
        &mut self,
        slot: usize,
        kind: BindingKind,
        spec: OperationSpec,
        configure: F,
    ) -> OperationResult<CompiledOperation>
    where
        F: FnOnce(&mut OperationSetup) -> OperationResult<()>,
    {
        self.check_bindable(slot)?;
        let mut child = OperationSetup::new(spec, self.realm.clone(), self.shape.clone())?;
        child.allow_static = self.allow_static;
        configure(&mut child)?;
        let compiled = child.compile()?;
        self.bind(slot, kind, BindingResolution::operation(compiled.clone()))?;
        Ok(compiled)
    }

    /// 把参数槽绑定到一个服务值
    ///
    /// `element` 产生键对应的元素值；可选容器参数槽会把元素包装为非空容器。
    pub fn bind_service(
        &mut self,
        slot: usize,
        kind: BindingKind,
        element: BindingResolution,
        element_type: TypeInfo,
    ) -> OperationResult<()> {
        let dependency = self.check_bindable(slot)?.dependency().clone();
        if dependency.declared().container().is_none() {
            self.bind(slot, kind, element)?;
            return Ok(());
        }

        if let BindingResolution::FromConstant {
            value: Some(present),
            ..
        } = &element
        {
            let wrapped = dependency.present_value(present).ok_or_else(|| {
                self.type_mismatch(slot, dependency.key().type_info(), element_type)
            })?;
            let resolution =
                BindingResolution::constant_value(dependency.representation(), Some(wrapped));
            self.bind(slot, kind, resolution)?;
            return Ok(());
        }

        let target = OperationTarget::new(OperationKind::Function, dependency.representation());
        let spec = OperationSpec::from_fn(
            format!("{}[{}]", self.name, slot),
            target,
            move |args: &Arguments| {
                let element = args
                    .value(0)
                    .unwrap_or_else(|| panic!("可选依赖 {} 的元素缺席", dependency.key()));
                match dependency.present_value(element) {
                    Some(wrapped) => wrapped,
                    None => panic!("可选依赖 {} 的元素类型不符", dependency.key()),
                }
            },
        )
        .param(Variable::new(TypeToken::Plain(element_type)));
        self.bind_op(slot, kind, spec, |child| {
            child.bind(0, kind, element)?;
            Ok(())
        })?;
        Ok(())
    }

    /// 编译操作
    ///
    /// 全部参数槽绑定后才能编译；编译结果被缓存，重复调用返回同一个结果。
    pub fn compile(&mut self) -> OperationResult<CompiledOperation> {
        if let Some(compiled) = &self.compiled {
            return Ok(compiled.clone());
        }
        let unbound = self.unbound_slots();
        if !unbound.is_empty() {
            return Err(OperationError::IncompleteBinding {
                operation: self.name.clone(),
                unbound,
            });
        }

        let mut fills = Vec::with_capacity(self.bindings.len());
        for binding in &self.bindings {
            let fill = match binding.resolution() {
                Some(BindingResolution::FromConstant { value, .. }) => SlotFill::Constant(value.clone()),
                Some(BindingResolution::FromCodeGenerated { supplier }) => match supplier.value() {
                    Some(generated) => SlotFill::Constant(Some(Arc::clone(generated))),
                    None => SlotFill::CodeGenerated(Arc::clone(supplier)),
                },
                Some(BindingResolution::FromInvocationArgument { index }) => SlotFill::Argument(*index),
                Some(BindingResolution::FromOperation { operation }) => {
                    SlotFill::Invoke(operation.clone())
                }
                Some(BindingResolution::FromLifetimeArena { slot }) => SlotFill::ArenaRead(slot.index()),
                None => unreachable!("参数槽未绑定: {}[{}]", self.name, binding.slot()),
            };
            fills.push(fill);
        }

        let compiled = CompiledOperation::new(
            self.name.clone(),
            self.target.returns,
            self.shape.clone(),
            fills,
            Arc::clone(&self.invoker),
        );
        info!(operation = %self.name, slots = self.bindings.len(), "编译操作");
        self.compiled = Some(compiled.clone());
        Ok(compiled)
    }

    /// 已编译的结果
    pub fn compiled(&self) -> Option<&CompiledOperation> {
        self.compiled.as_ref()
    }

    /// 生成调试镜像
    pub fn describe(&self) -> OperationMirror {
        OperationMirror {
            name: self.name.clone(),
            kind: self.target.kind,
            is_static: self.target.is_static,
            returns: self.target.returns.to_string(),
            shape: InvocationMirror::from(&self.shape),
            state: self.state(),
            bindings: self.bindings.iter().map(BindingSetup::mirror).collect(),
        }
    }
}

impl fmt::Debug for OperationSetup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationSetup")
            .field("name", &self.name)
            .field("target", &self.target)
            .field("realm", &self.realm.name)
            .field("shape", &self.shape.to_string())
            .field("bindings", &self.bindings)
            .field("state", &self.state())
            .finish()
    }
}
