//! 已编译的操作
//!
//! 编译结果是一张按参数槽顺序排列的填充指令表加上基础可调用对象，
//! 调用时依次执行指令得到实参，再调用基础可调用对象。

use crate::arena::LifetimeArena;
use crate::codegen::CodeGenSupplier;
use crate::invocation::{Invocation, InvocationType};
use di_abstractions::{Arguments, Invoker, Value};
use infrastructure_common::TypeInfo;
use std::fmt;
use std::sync::Arc;

/// 参数槽填充指令
#[derive(Clone)]
pub enum SlotFill {
    /// 插入常量；`None` 表示缺席
    Constant(Option<Value>),
    /// 读取代码生成期常量
    CodeGenerated(Arc<CodeGenSupplier>),
    /// 转发外层调用的实参
    Argument(usize),
    /// 调用嵌套操作
    Invoke(CompiledOperation),
    /// 读取常量区槽位
    ArenaRead(usize),
}

impl SlotFill {
    fn evaluate(&self, invocation: &Invocation<'_>) -> Option<Value> {
        match self {
            Self::Constant(value) => value.clone(),
            Self::CodeGenerated(supplier) => match supplier.value() {
                Some(value) => Some(Arc::clone(value)),
                None => panic!("代码生成期常量尚未生成: {}", supplier.name()),
            },
            Self::Argument(index) => match invocation.arguments.get(*index) {
                Some(value) => Some(Arc::clone(value)),
                None => panic!(
                    "调用实参下标越界: {index}, 共 {} 个实参",
                    invocation.arguments.len()
                ),
            },
            Self::Invoke(operation) => Some(operation.run(invocation)),
            Self::ArenaRead(index) => match invocation.arena {
                Some(arena) => Some(Arc::clone(arena.read(*index))),
                None => panic!("读取常量区槽位 {index} 时调用没有提供常量区"),
            },
        }
    }
}

impl fmt::Debug for SlotFill {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Constant(value) => write!(f, "Constant(present: {})", value.is_some()),
            Self::CodeGenerated(supplier) => write!(f, "CodeGenerated({})", supplier.name()),
            Self::Argument(index) => write!(f, "Argument({index})"),
            Self::Invoke(operation) => write!(f, "Invoke({})", operation.name()),
            Self::ArenaRead(index) => write!(f, "ArenaRead({index})"),
        }
    }
}

struct CompiledBody {
    name: String,
    returns: TypeInfo,
    shape: InvocationType,
    fills: Vec<SlotFill>,
    invoker: Invoker,
}

/// 已编译的操作
///
/// 不可变，克隆只复制引用计数，可被任意线程并发调用。
#[derive(Clone)]
pub struct CompiledOperation {
    body: Arc<CompiledBody>,
    arena: Option<Arc<LifetimeArena>>,
}

impl CompiledOperation {
    pub(crate) fn new(
        name: String,
        returns: TypeInfo,
        shape: InvocationType,
        fills: Vec<SlotFill>,
        invoker: Invoker,
    ) -> Self {
        Self {
            body: Arc::new(CompiledBody {
                name,
                returns,
                shape,
                fills,
                invoker,
            }),
            arena: None,
        }
    }

    /// 由无参数的可调用对象直接构成的操作
    pub fn from_fn<F>(name: impl Into<String>, returns: TypeInfo, f: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        Self::new(
            name.into(),
            returns,
            InvocationType::empty(),
            Vec::new(),
            Arc::new(move |_: &Arguments| f()),
        )
    }

    pub fn name(&self) -> &str {
        &self.body.name
    }

    /// 返回值类型
    pub fn returns(&self) -> TypeInfo {
        self.body.returns
    }

    /// 调用时仍需提供的外部参数
    pub fn shape(&self) -> InvocationType {
        if self.arena.is_some() {
            self.body.shape.without_arena()
        } else {
            self.body.shape.clone()
        }
    }

    /// 填充指令
    pub fn fills(&self) -> &[SlotFill] {
        &self.body.fills
    }

    /// 调用操作
    ///
    /// # Panics
    ///
    /// 外部参数与调用形态不符时 panic。
    pub fn invoke(&self, invocation: &Invocation<'_>) -> Value {
        let shape = self.shape();
        assert!(
            !shape.requires_arena() || invocation.arena.is_some(),
            "操作 {} 需要常量区",
            self.body.name
        );
        assert_eq!(
            invocation.arguments.len(),
            shape.arguments().len(),
            "操作 {} 的调用实参数量不符",
            self.body.name
        );
        self.run(invocation)
    }

    /// 只带常量区调用
    pub fn invoke_with(&self, arena: &LifetimeArena) -> Value {
        self.invoke(&Invocation::with_arena(arena))
    }

    /// 不带外部参数调用
    pub fn call(&self) -> Value {
        self.invoke(&Invocation::empty())
    }

    fn run(&self, invocation: &Invocation<'_>) -> Value {
        let scoped = Invocation {
            arena: self.arena.as_deref().or(invocation.arena),
            arguments: invocation.arguments,
        };
        let values = self
            .body
            .fills
            .iter()
            .map(|fill| fill.evaluate(&scoped))
            .collect();
        (self.body.invoker)(&Arguments::new(values))
    }

    /// 固定常量区，得到不再需要常量区的操作
    pub fn close_over(&self, arena: Arc<LifetimeArena>) -> Self {
        Self {
            body: Arc::clone(&self.body),
            arena: Some(arena),
        }
    }

    /// 是否已固定常量区
    pub fn is_closed(&self) -> bool {
        self.arena.is_some()
    }

    /// 是否为同一个编译结果
    pub fn ptr_eq(&self, other: &Self) -> bool {
        let same_arena = match (&self.arena, &other.arena) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        };
        Arc::ptr_eq(&self.body, &other.body) && same_arena
    }

    /// 调用时会读取的外部常量区槽位，包括嵌套操作读取的槽位
    pub fn arena_reads(&self) -> Vec<usize> {
        let mut reads = Vec::new();
        if self.arena.is_none() {
            self.collect_arena_reads(&mut reads);
        }
        reads.sort_unstable();
        reads.dedup();
        reads
    }

    fn collect_arena_reads(&self, reads: &mut Vec<usize>) {
        for fill in &self.body.fills {
            match fill {
                SlotFill::ArenaRead(index) => reads.push(*index),
                SlotFill::Invoke(nested) if !nested.is_closed() => {
                    nested.collect_arena_reads(reads)
                }
                _ => {}
            }
        }
    }
}

impl fmt::Debug for CompiledOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledOperation")
            .field("name", &self.body.name)
            .field("returns", &self.body.returns.name)
            .field("shape", &self.shape().to_string())
            .field("fills", &self.body.fills)
            .finish()
    }
}
