//! 代码生成阶段
//!
//! 某些常量只有在代码生成阶段才能得到。绑定时先登记一个 [`CodeGenSupplier`]，
//! 阶段运行时依次调用，每个供应者最多运行一次。

use di_abstractions::{value_type_id, Value};
use infrastructure_common::TypeInfo;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

type Supplier = Box<dyn FnOnce() -> Value + Send>;

/// 代码生成期的值供应者
pub struct CodeGenSupplier {
    name: String,
    ty: TypeInfo,
    supplier: Mutex<Option<Supplier>>,
    cell: OnceCell<Value>,
}

impl CodeGenSupplier {
    /// 创建供应者
    pub fn new<T, F>(name: impl Into<String>, f: F) -> Arc<Self>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        Arc::new(Self {
            name: name.into(),
            ty: TypeInfo::of::<T>(),
            supplier: Mutex::new(Some(Box::new(move || Arc::new(f()) as Value))),
            cell: OnceCell::new(),
        })
    }

    /// 名称
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 产生值的类型
    pub fn type_info(&self) -> TypeInfo {
        self.ty
    }

    /// 运行供应者并缓存结果；已运行过时直接返回缓存
    pub fn generate(&self) -> &Value {
        self.cell.get_or_init(|| {
            let supplier = self.supplier.lock().take();
            let value = match supplier {
                Some(f) => f(),
                None => unreachable!("代码生成供应者在缓存前被取走: {}", self.name),
            };
            debug_assert_eq!(value_type_id(&value), self.ty.id);
            debug!(supplier = %self.name, ty = %self.ty, "代码生成期常量已生成");
            value
        })
    }

    /// 已生成的值
    pub fn value(&self) -> Option<&Value> {
        self.cell.get()
    }

    /// 是否已生成
    pub fn is_generated(&self) -> bool {
        self.cell.get().is_some()
    }
}

impl fmt::Debug for CodeGenSupplier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodeGenSupplier")
            .field("name", &self.name)
            .field("ty", &self.ty.name)
            .field("generated", &self.is_generated())
            .finish()
    }
}

/// 代码生成阶段
#[derive(Debug, Default)]
pub struct CodeGenPhase {
    suppliers: Vec<Arc<CodeGenSupplier>>,
}

impl CodeGenPhase {
    /// 创建阶段
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记供应者
    pub fn register(&mut self, supplier: Arc<CodeGenSupplier>) {
        debug!(supplier = %supplier.name(), "登记代码生成供应者");
        self.suppliers.push(supplier);
    }

    /// 已登记的数量
    pub fn len(&self) -> usize {
        self.suppliers.len()
    }

    /// 是否没有登记任何供应者
    pub fn is_empty(&self) -> bool {
        self.suppliers.is_empty()
    }

    /// 运行全部尚未生成的供应者，返回本次生成的数量
    pub fn run(&self) -> usize {
        let mut generated = 0;
        for supplier in &self.suppliers {
            if !supplier.is_generated() {
                supplier.generate();
                generated += 1;
            }
        }
        info!(generated, total = self.suppliers.len(), "代码生成阶段完成");
        generated
    }
}
