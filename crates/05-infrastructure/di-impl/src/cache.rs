//! 依赖推导缓存
//!
//! 每次装配拥有一个缓存，按声明点记忆推导结果；装配结束后随之丢弃。

use di_abstractions::{Dependency, Variable};
use infrastructure_common::DependencyResult;
use std::collections::HashMap;
use tracing::trace;

/// 依赖推导缓存
#[derive(Debug, Default)]
pub struct DependencyCache {
    entries: HashMap<Variable, Dependency>,
    hits: usize,
    misses: usize,
}

impl DependencyCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 推导依赖，命中缓存时直接返回
    ///
    /// 推导失败不会被缓存。
    pub fn derive(&mut self, variable: &Variable) -> DependencyResult<Dependency> {
        if let Some(dependency) = self.entries.get(variable) {
            self.hits += 1;
            trace!(variable = %variable, "依赖推导命中缓存");
            return Ok(dependency.clone());
        }
        let dependency = Dependency::from_variable(variable)?;
        self.misses += 1;
        self.entries.insert(variable.clone(), dependency.clone());
        Ok(dependency)
    }

    /// 依次推导多个声明点
    pub fn derive_all<'a>(
        &mut self,
        variables: impl IntoIterator<Item = &'a Variable>,
    ) -> DependencyResult<Vec<Dependency>> {
        variables.into_iter().map(|v| self.derive(v)).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn misses(&self) -> usize {
        self.misses
    }
}
