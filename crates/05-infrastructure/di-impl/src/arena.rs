//! 生命周期常量区
//!
//! 构建期由 [`ArenaBuilder`] 分配槽位下标，冻结后得到不可变的 [`ArenaLayout`]；
//! 生命周期开始时按布局分配一次 [`LifetimeArena`]。每个槽位在初始化序列中
//! 只写一次，之后的读取都是按下标直接访问，不需要加锁。

use di_abstractions::{describe_value_type, value_type_id, Value};
use infrastructure_common::{ArenaError, ArenaResult, TypeInfo, DEFAULT_MAX_ARENA_CAPACITY};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// 常量区槽位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArenaSlot {
    index: usize,
    ty: TypeInfo,
}

impl ArenaSlot {
    /// 槽位下标
    pub fn index(&self) -> usize {
        self.index
    }

    /// 槽位类型
    pub fn type_info(&self) -> TypeInfo {
        self.ty
    }
}

/// 常量区构建器
#[derive(Debug)]
pub struct ArenaBuilder {
    slots: Vec<TypeInfo>,
    limit: usize,
}

impl ArenaBuilder {
    /// 创建构建器
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_MAX_ARENA_CAPACITY)
    }

    /// 创建带容量上限的构建器
    pub fn with_limit(limit: usize) -> Self {
        Self {
            slots: Vec::new(),
            limit,
        }
    }

    /// 分配指定类型的槽位
    pub fn reserve<T: Send + Sync + 'static>(&mut self) -> ArenaResult<ArenaSlot> {
        self.reserve_type(TypeInfo::of::<T>())
    }

    /// 分配槽位
    pub fn reserve_type(&mut self, ty: TypeInfo) -> ArenaResult<ArenaSlot> {
        if self.slots.len() >= self.limit {
            return Err(ArenaError::CapacityExceeded {
                capacity: self.slots.len() + 1,
                limit: self.limit,
            });
        }
        let slot = ArenaSlot {
            index: self.slots.len(),
            ty,
        };
        self.slots.push(ty);
        debug!(index = slot.index, ty = %ty, "分配常量区槽位");
        Ok(slot)
    }

    /// 已分配的槽位数量
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// 是否没有分配任何槽位
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// 冻结为布局，之后不能再分配槽位
    pub fn freeze(self) -> ArenaLayout {
        info!(capacity = self.slots.len(), "常量区布局已冻结");
        ArenaLayout {
            slots: self.slots.into(),
        }
    }
}

impl Default for ArenaBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// 常量区布局
#[derive(Debug, Clone)]
pub struct ArenaLayout {
    slots: Arc<[TypeInfo]>,
}

impl ArenaLayout {
    /// 容量
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// 槽位类型
    pub fn slot_type(&self, index: usize) -> Option<TypeInfo> {
        self.slots.get(index).copied()
    }

    /// 为一个生命周期分配常量区
    pub fn allocate(&self) -> LifetimeArena {
        debug!(capacity = self.capacity(), "分配生命周期常量区");
        LifetimeArena {
            layout: self.clone(),
            cells: (0..self.capacity()).map(|_| OnceCell::new()).collect(),
        }
    }
}

/// 生命周期常量区
pub struct LifetimeArena {
    layout: ArenaLayout,
    cells: Box<[OnceCell<Value>]>,
}

impl LifetimeArena {
    /// 容量
    pub fn capacity(&self) -> usize {
        self.cells.len()
    }

    /// 常量区布局
    pub fn layout(&self) -> &ArenaLayout {
        &self.layout
    }

    /// 初始化槽位，每个槽位只能写一次
    pub fn initialize(&self, slot: ArenaSlot, value: Value) -> ArenaResult<()> {
        let expected = self
            .layout
            .slot_type(slot.index)
            .ok_or(ArenaError::IndexOutOfRange {
                index: slot.index,
                capacity: self.capacity(),
            })?;
        if value_type_id(&value) != expected.id {
            return Err(ArenaError::TypeMismatch {
                index: slot.index,
                expected: expected.to_string(),
                actual: describe_value_type(&value, expected),
            });
        }
        self.cells[slot.index]
            .set(value)
            .map_err(|_| ArenaError::AlreadyInitialized { index: slot.index })
    }

    /// 槽位是否已初始化
    pub fn is_initialized(&self, index: usize) -> bool {
        self.cells.get(index).is_some_and(|cell| cell.get().is_some())
    }

    /// 尝试读取槽位
    pub fn try_read(&self, index: usize) -> Option<&Value> {
        self.cells.get(index).and_then(OnceCell::get)
    }

    /// 读取槽位
    ///
    /// # Panics
    ///
    /// 下标越界或槽位尚未初始化时 panic；正确编译的操作不会出现这种情况。
    pub fn read(&self, index: usize) -> &Value {
        assert!(
            index < self.capacity(),
            "常量区槽位越界: {index}, 容量 {}",
            self.capacity()
        );
        match self.cells[index].get() {
            Some(value) => value,
            None => panic!("常量区槽位尚未初始化: {index}"),
        }
    }
}

impl fmt::Debug for LifetimeArena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifetimeArena")
            .field("capacity", &self.capacity())
            .field(
                "initialized",
                &self.cells.iter().filter(|c| c.get().is_some()).count(),
            )
            .finish()
    }
}

/// 生命周期的构建期句柄
///
/// 同一生命周期内的所有组件共享一个常量区构建器；冻结后再分配会失败。
#[derive(Debug, Clone)]
pub struct LifetimeSetup {
    arena: Arc<Mutex<Option<ArenaBuilder>>>,
}

impl LifetimeSetup {
    /// 创建生命周期
    pub fn new(limit: usize) -> Self {
        Self {
            arena: Arc::new(Mutex::new(Some(ArenaBuilder::with_limit(limit)))),
        }
    }

    /// 分配槽位
    pub fn reserve_type(&self, ty: TypeInfo) -> ArenaResult<ArenaSlot> {
        match self.arena.lock().as_mut() {
            Some(builder) => builder.reserve_type(ty),
            None => Err(ArenaError::Frozen),
        }
    }

    /// 分配指定类型的槽位
    pub fn reserve<T: Send + Sync + 'static>(&self) -> ArenaResult<ArenaSlot> {
        self.reserve_type(TypeInfo::of::<T>())
    }

    /// 冻结常量区布局
    pub fn freeze(&self) -> ArenaResult<ArenaLayout> {
        self.arena
            .lock()
            .take()
            .map(ArenaBuilder::freeze)
            .ok_or(ArenaError::Frozen)
    }

    /// 是否已冻结
    pub fn is_frozen(&self) -> bool {
        self.arena.lock().is_none()
    }

    /// 是否为同一个生命周期
    pub fn same_lifetime(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.arena, &other.arena)
    }
}

impl Default for LifetimeSetup {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ARENA_CAPACITY)
    }
}
