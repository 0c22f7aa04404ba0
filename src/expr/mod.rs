//! src/expr/mod.rs
//!
//! 表达式树。所有节点都存放在 [`ExprTree`] 这个 arena 里，用 [`ExprId`] 互相引用。
//! 父子关系由 arena 维护：任何时刻一个节点最多有一个父节点，
//! 并且出现在父节点子列表里恰好一次。

mod display;
#[cfg(test)]
mod test;

use crate::symbols::{Builtin, Declaration, ScopeId, Symbol, SymbolKind, TagKind};
use crate::utils::Loc;
use indexmap::IndexMap;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ExprId(u32);

impl ExprId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// 节点携带的字面量或名字。
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Str(String),
    Bool(bool),
    Null,
    /// 标识符、运算符和标签的源码文本
    Name(String),
}

impl Value {
    pub fn from_keyword(word: &str) -> Option<Value> {
        match word {
            "true" => Some(Value::Bool(true)),
            "false" => Some(Value::Bool(false)),
            "null" => Some(Value::Null),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub symbol: Rc<Symbol>,
    pub value: Option<Value>,
    pub loc: Loc,
    /// 宏展开产生的节点记录调用点的位置
    pub origin: Option<Loc>,
    children: Vec<ExprId>,
    parent: Option<ExprId>,
    /// 宿主节点上按声明顺序记录的提升声明
    pub decls: Option<IndexMap<String, Rc<Declaration>>>,
    pub key_scope: Option<ScopeId>,
    pub var_scope: Option<ScopeId>,
    /// 标签解析到的声明
    pub binding: Option<Rc<Declaration>>,
    pub resolved: bool,
    /// 检查阶段计算出的结果个数
    pub result_count: Option<usize>,
}

impl Node {
    fn new(symbol: Rc<Symbol>, value: Option<Value>, loc: Loc) -> Self {
        Self {
            symbol,
            value,
            loc,
            origin: None,
            children: Vec::new(),
            parent: None,
            decls: None,
            key_scope: None,
            var_scope: None,
            binding: None,
            resolved: false,
            result_count: None,
        }
    }

    pub fn children(&self) -> &[ExprId] {
        &self.children
    }

    pub fn parent(&self) -> Option<ExprId> {
        self.parent
    }

    pub fn name(&self) -> Option<&str> {
        match &self.value {
            Some(Value::Name(name)) => Some(name),
            _ => None,
        }
    }

    /// 展开链最外层的位置：展开产生的节点给出用户写下的调用点。
    pub fn expansion_site(&self) -> Loc {
        self.origin.unwrap_or(self.loc)
    }
}

#[derive(Debug, Default)]
pub struct ExprTree {
    nodes: Vec<Node>,
}

impl ExprTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, symbol: Rc<Symbol>, value: Option<Value>, loc: Loc) -> ExprId {
        self.nodes.push(Node::new(symbol, value, loc));
        ExprId((self.nodes.len() - 1) as u32)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: ExprId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn node_mut(&mut self, id: ExprId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    pub fn symbol(&self, id: ExprId) -> &Rc<Symbol> {
        &self.nodes[id.index()].symbol
    }

    pub fn set_symbol(&mut self, id: ExprId, symbol: Rc<Symbol>) {
        self.nodes[id.index()].symbol = symbol;
    }

    pub fn builtin(&self, id: ExprId) -> Option<Builtin> {
        self.symbol(id).as_builtin()
    }

    pub fn is(&self, id: ExprId, builtin: Builtin) -> bool {
        self.builtin(id) == Some(builtin)
    }

    pub fn tag_kind(&self, id: ExprId) -> Option<TagKind> {
        self.symbol(id).as_tag()
    }

    pub fn name(&self, id: ExprId) -> Option<&str> {
        self.node(id).name()
    }

    pub fn loc(&self, id: ExprId) -> Loc {
        self.node(id).loc
    }

    pub fn children(&self, id: ExprId) -> &[ExprId] {
        &self.nodes[id.index()].children
    }

    pub fn child(&self, id: ExprId, index: usize) -> Option<ExprId> {
        self.children(id).get(index).copied()
    }

    pub fn parent(&self, id: ExprId) -> Option<ExprId> {
        self.nodes[id.index()].parent
    }

    /// 把节点从它的父节点上摘下来。没有父节点时什么也不做。
    pub fn detach(&mut self, id: ExprId) {
        if let Some(parent) = self.nodes[id.index()].parent.take() {
            self.nodes[parent.index()].children.retain(|&c| c != id);
        }
    }

    fn is_ancestor(&self, ancestor: ExprId, mut id: ExprId) -> bool {
        loop {
            if id == ancestor {
                return true;
            }
            match self.parent(id) {
                Some(parent) => id = parent,
                None => return false,
            }
        }
    }

    pub fn append_child(&mut self, parent: ExprId, child: ExprId) {
        let index = self.children(parent).len();
        self.insert_child(parent, index, child);
    }

    /// 在给定位置插入子节点。子节点会先从原来的父节点上摘下。
    pub fn insert_child(&mut self, parent: ExprId, index: usize, child: ExprId) {
        debug_assert!(!self.is_ancestor(child, parent), "linking {child:?} under {parent:?} creates a cycle");
        self.detach(child);
        let children = &mut self.nodes[parent.index()].children;
        let index = index.min(children.len());
        children.insert(index, child);
        self.nodes[child.index()].parent = Some(parent);
    }

    /// `new` 占据 `old` 在父节点中的位置，`old` 被摘下。
    pub fn replace(&mut self, old: ExprId, new: ExprId) {
        if old == new {
            return;
        }
        self.detach(new);
        let Some(parent) = self.parent(old) else { return };
        let Some(index) = self.children(parent).iter().position(|&c| c == old) else { return };
        self.nodes[parent.index()].children[index] = new;
        self.nodes[new.index()].parent = Some(parent);
        self.nodes[old.index()].parent = None;
    }

    /// 摘下并返回所有子节点。
    pub fn take_children(&mut self, id: ExprId) -> Vec<ExprId> {
        let children = std::mem::take(&mut self.nodes[id.index()].children);
        for &child in &children {
            self.nodes[child.index()].parent = None;
        }
        children
    }

    /// 原地把 `target` 变成 `source`：`target` 保留自己的 id 和父节点，
    /// 其余字段与子节点都换成 `source` 的。`source` 之后成为空节点。
    pub fn transform_into(&mut self, target: ExprId, source: ExprId) {
        if target == source {
            return;
        }
        self.detach(source);
        self.take_children(target);
        let children = self.take_children(source);
        let src = self.nodes[source.index()].clone();
        let node = &mut self.nodes[target.index()];
        node.symbol = src.symbol;
        node.value = src.value;
        node.loc = src.loc;
        node.origin = src.origin;
        node.decls = src.decls;
        node.key_scope = src.key_scope;
        node.var_scope = src.var_scope;
        node.binding = src.binding;
        node.resolved = src.resolved;
        node.result_count = src.result_count;
        for child in children {
            self.append_child(target, child);
        }
    }

    /// 深拷贝一棵子树，返回新的根。新根没有父节点。
    pub fn deep_clone(&mut self, id: ExprId) -> ExprId {
        let mut copy = self.nodes[id.index()].clone();
        copy.children = Vec::new();
        copy.parent = None;
        self.nodes.push(copy);
        let new_id = ExprId((self.nodes.len() - 1) as u32);
        for child in self.children(id).to_vec() {
            let new_child = self.deep_clone(child);
            self.append_child(new_id, new_child);
        }
        new_id
    }

    pub fn set_origin_recursive(&mut self, id: ExprId, origin: Loc) {
        for node in self.descendants(id) {
            self.nodes[node.index()].origin = Some(origin);
        }
    }

    /// 先序遍历的所有节点，包括自己。
    pub fn descendants(&self, id: ExprId) -> Vec<ExprId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.children(current).iter().rev());
        }
        out
    }

    /// 检查父子链接是否一致。
    pub fn is_consistent(&self, root: ExprId) -> bool {
        self.descendants(root).into_iter().all(|id| {
            self.children(id).iter().all(|&child| {
                self.parent(child) == Some(id) && self.children(id).iter().filter(|&&c| c == child).count() == 1
            })
        })
    }

    /// 节点是否是一个块类节点（根块、缩进块或 `do` 块）。
    pub fn is_block_like(&self, id: ExprId) -> bool {
        matches!(self.symbol(id).kind(), SymbolKind::Block(kind) if kind.opens_scope())
    }
}
