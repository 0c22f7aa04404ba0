// src/symbols/scope.rs

use crate::expr::ExprId;
use crate::utils::Loc;
use std::collections::HashMap;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(u32);

impl ScopeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug)]
struct Layer<T> {
    parent: Option<ScopeId>,
    entries: HashMap<String, T>,
}

/// 分层的名字到值的映射。
///
/// 最底层是一个共享、只读的基础表（比如根环境的关键字表），
/// 其上的每一层只保存自己新增的名字，查找时逐层向外。
/// 同一个 arena 同时服务于"键作用域"（名字到符号）和"变量作用域"（名字到声明）。
#[derive(Debug)]
pub struct ScopeArena<T> {
    base: Rc<HashMap<String, T>>,
    layers: Vec<Layer<T>>,
}

impl<T: Clone> ScopeArena<T> {
    /// 创建 arena，同时创建挂在基础表上的根层。
    pub fn new(base: Rc<HashMap<String, T>>) -> Self {
        Self {
            base,
            layers: vec![Layer {
                parent: None,
                entries: HashMap::new(),
            }],
        }
    }

    pub fn root(&self) -> ScopeId {
        ScopeId(0)
    }

    pub fn extend(&mut self, parent: ScopeId) -> ScopeId {
        self.layers.push(Layer {
            parent: Some(parent),
            entries: HashMap::new(),
        });
        ScopeId((self.layers.len() - 1) as u32)
    }

    pub fn parent(&self, scope: ScopeId) -> Option<ScopeId> {
        self.layers[scope.index()].parent
    }

    /// 在给定层里定义一个新名字。如果这一层已经有同名条目，返回已有的值且不覆盖。
    /// 外层（包括基础表）里的同名条目只会被遮蔽。
    pub fn define(&mut self, scope: ScopeId, name: &str, value: T) -> Result<(), T> {
        let layer = &mut self.layers[scope.index()];
        if let Some(existing) = layer.entries.get(name) {
            return Err(existing.clone());
        }
        layer.entries.insert(name.to_string(), value);
        Ok(())
    }

    /// 无条件写入，覆盖同层的旧值。
    pub fn insert(&mut self, scope: ScopeId, name: &str, value: T) {
        self.layers[scope.index()].entries.insert(name.to_string(), value);
    }

    pub fn lookup(&self, scope: ScopeId, name: &str) -> Option<&T> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let layer = &self.layers[id.index()];
            if let Some(value) = layer.entries.get(name) {
                return Some(value);
            }
            current = layer.parent;
        }
        self.base.get(name)
    }

    pub fn lookup_local(&self, scope: ScopeId, name: &str) -> Option<&T> {
        self.layers[scope.index()].entries.get(name)
    }

    /// 名字是否在基础表里（而且没有被任何层遮蔽）。
    pub fn is_from_base(&self, scope: ScopeId, name: &str) -> bool {
        let mut current = Some(scope);
        while let Some(id) = current {
            let layer = &self.layers[id.index()];
            if layer.entries.contains_key(name) {
                return false;
            }
            current = layer.parent;
        }
        self.base.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

/// 一个被声明的名字。
#[derive(Debug)]
pub struct Declaration {
    pub name: String,
    /// 声明它的标签节点；根环境里的全局名字没有
    pub tag: Option<ExprId>,
    pub loc: Option<Loc>,
    pub assignable: bool,
    /// 是否提升到宿主节点顶部的 `let` 语句里。函数参数与 catch 参数不提升。
    pub hoisted: bool,
}

impl Declaration {
    pub fn global(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tag: None,
            loc: None,
            assignable: true,
            hoisted: false,
        }
    }
}
