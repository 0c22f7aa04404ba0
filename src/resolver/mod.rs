//! src/resolver/mod.rs
//!
//! 变量解析：沿着变量作用域链给每个标签找到它的声明。
//!
//! 根块、缩进块、`do` 块、`fn`、`catch` 和 `loop` 各开一层作用域，
//! 并且是"宿主"：本层里需要提升的声明按出现顺序登记在宿主节点的 `decls` 上，
//! 代码生成时在宿主顶部合成一条声明语句。

#[cfg(test)]
mod test;

use crate::diagnostics::codes::*;
use crate::diagnostics::{Diagnostic, DiagnosticBag, Label};
use crate::expr::{ExprId, ExprTree};
use crate::symbols::{Builtin, Declaration, RootEnv, ScopeArena, ScopeId, SymbolFlags, SymbolKind, TagKind};
use indexmap::IndexMap;
use std::rc::Rc;

pub struct Resolver<'a> {
    tree: &'a mut ExprTree,
    diagnostics: &'a mut DiagnosticBag,
    vars: ScopeArena<Rc<Declaration>>,
}

impl<'a> Resolver<'a> {
    pub fn new(env: &RootEnv, tree: &'a mut ExprTree, diagnostics: &'a mut DiagnosticBag) -> Self {
        Self {
            tree,
            diagnostics,
            vars: ScopeArena::new(env.globals()),
        }
    }

    pub fn resolve_root(&mut self, root: ExprId) {
        let scope = self.vars.root();
        self.open_host(root, scope);
        self.resolve_children(root, scope, root);
        self.tree.node_mut(root).resolved = true;
    }

    fn open_host(&mut self, id: ExprId, scope: ScopeId) {
        let node = self.tree.node_mut(id);
        node.var_scope = Some(scope);
        node.decls.get_or_insert_with(IndexMap::new);
    }

    fn resolve_children(&mut self, id: ExprId, scope: ScopeId, host: ExprId) {
        for child in self.tree.children(id).to_vec() {
            self.resolve(child, scope, host);
        }
    }

    fn resolve(&mut self, id: ExprId, scope: ScopeId, host: ExprId) {
        if self.tree.node(id).resolved {
            return;
        }
        let symbol = self.tree.symbol(id).clone();
        match symbol.kind() {
            SymbolKind::Block(_) if self.tree.is_block_like(id) => {
                let inner = self.vars.extend(scope);
                self.open_host(id, inner);
                self.resolve_children(id, inner, id);
            }
            SymbolKind::Tag(kind) => self.resolve_tag(id, *kind, scope, host, false),
            SymbolKind::Builtin(builtin) => self.resolve_builtin(id, *builtin, scope, host),
            _ => self.resolve_children(id, scope, host),
        }
        self.tree.node_mut(id).resolved = true;
    }

    fn resolve_builtin(&mut self, id: ExprId, builtin: Builtin, scope: ScopeId, host: ExprId) {
        let children = self.tree.children(id).to_vec();
        match builtin {
            Builtin::Assign => match children[..] {
                [target, value] => {
                    self.resolve_target(target, scope, host);
                    self.resolve(value, scope, host);
                }
                _ => self.resolve_children(id, scope, host),
            },
            // `.` 右边是属性名
            Builtin::Member => {
                if let Some(&object) = children.first() {
                    self.resolve(object, scope, host);
                }
                for &property in children.iter().skip(1) {
                    self.tree.node_mut(property).resolved = true;
                }
            }
            Builtin::Object => {
                for entry in children {
                    if self.tree.is(entry, Builtin::Pair) {
                        self.resolve_pair(entry, scope, host);
                    } else {
                        self.resolve(entry, scope, host);
                    }
                }
            }
            Builtin::Pair => {
                let loc = self.tree.node(id).loc;
                self.diagnostics.report(
                    Diagnostic::error(&E0110_MALFORMED_LITERAL, Label::new(loc, "not inside `{}`"))
                        .with_dynamic_message("`key: value` pairs are only valid in object literals")
                        .with_origin(self.tree.node(id).origin),
                );
                self.resolve_pair(id, scope, host);
            }
            Builtin::Var | Builtin::Const => {
                for target in children {
                    self.declare_target(target, scope, Some(host));
                }
            }
            Builtin::External => {
                for target in children {
                    self.declare_external(target, scope);
                }
            }
            Builtin::Fn | Builtin::Catch => {
                let inner = self.vars.extend(scope);
                self.open_host(id, inner);
                if let [params, body] = children[..] {
                    // 参数不提升
                    self.declare_target(params, inner, None);
                    self.resolve(body, inner, id);
                } else {
                    self.resolve_children(id, inner, id);
                }
            }
            Builtin::Loop => self.resolve_loop(id, &children, scope, host),
            _ => self.resolve_children(id, scope, host),
        }
    }

    fn resolve_pair(&mut self, pair: ExprId, scope: ScopeId, host: ExprId) {
        let children = self.tree.children(pair).to_vec();
        if let Some(&key) = children.first() {
            self.tree.node_mut(key).resolved = true;
        }
        for &value in children.iter().skip(1) {
            self.resolve(value, scope, host);
        }
        self.tree.node_mut(pair).resolved = true;
    }

    /// `loop` 的头部 `names = init`：初值在外层解析，循环变量声明在循环自己的作用域里。
    fn resolve_loop(&mut self, id: ExprId, children: &[ExprId], scope: ScopeId, host: ExprId) {
        let inner = self.vars.extend(scope);
        let body = match *children {
            [body] => body,
            [head, body] => {
                let parts = self.tree.children(head).to_vec();
                match parts[..] {
                    [targets, init] if self.tree.is(head, Builtin::Assign) => {
                        self.resolve(init, scope, host);
                        self.open_host(id, inner);
                        self.declare_target(targets, inner, Some(id));
                        self.tree.node_mut(head).resolved = true;
                    }
                    _ => {
                        self.report_invalid_declaration(head, "the head of `loop` must be `names = initial values`");
                        self.resolve(head, scope, host);
                    }
                }
                body
            }
            _ => {
                self.resolve_children(id, scope, host);
                return;
            }
        };
        self.open_host(id, inner);
        self.resolve(body, inner, id);
    }

    // --- 标签 ---

    fn resolve_tag(&mut self, id: ExprId, kind: TagKind, scope: ScopeId, host: ExprId, assigning: bool) {
        if kind == TagKind::External {
            return;
        }
        if kind.is_virtual() {
            self.report_virtual(id);
            return;
        }
        if kind.is_declaration() {
            self.declare(id, kind, scope, Some(host));
            return;
        }

        let Some(name) = self.tree.name(id).map(str::to_string) else { return };
        let loc = self.tree.node(id).loc;
        let Some(declaration) = self.vars.lookup(scope, &name).cloned() else {
            self.diagnostics.report(
                Diagnostic::error(&E0200_UNDECLARED_IDENTIFIER, Label::new(loc, "not found in this scope"))
                    .with_dynamic_message(format!("Undeclared identifier `{name}`"))
                    .with_origin(self.tree.node(id).origin),
            );
            return;
        };

        if assigning && !declaration.assignable {
            let mut diagnostic = Diagnostic::error(
                &E0202_ASSIGNMENT_TO_CONSTANT,
                Label::new(loc, "cannot assign twice to a constant"),
            )
            .with_dynamic_message(format!("Cannot assign to constant `{name}`"))
            .with_origin(self.tree.node(id).origin);
            if let Some(declared_at) = declaration.loc {
                diagnostic = diagnostic.with_secondary_label(Label::new(declared_at, "declared as a constant here"));
            }
            self.diagnostics.report(diagnostic);
        }
        self.tree.node_mut(id).binding = Some(declaration);
    }

    /// 赋值左边：标签、`var`/`const`、成员和下标，或者它们组成的元组。
    fn resolve_target(&mut self, id: ExprId, scope: ScopeId, host: ExprId) {
        let symbol = self.tree.symbol(id).clone();
        match symbol.kind() {
            SymbolKind::Tag(kind) => {
                self.resolve_tag(id, *kind, scope, host, true);
                self.tree.node_mut(id).resolved = true;
            }
            SymbolKind::Builtin(Builtin::Tuple) => {
                for element in self.tree.children(id).to_vec() {
                    self.resolve_target(element, scope, host);
                }
                self.tree.node_mut(id).resolved = true;
            }
            _ if symbol.flags().contains(SymbolFlags::ASSIGNABLE) => self.resolve(id, scope, host),
            _ => {
                let loc = self.tree.node(id).loc;
                self.diagnostics.report(
                    Diagnostic::error(
                        &E0203_INVALID_ASSIGNMENT_TARGET,
                        Label::new(loc, "cannot be assigned to"),
                    )
                    .with_origin(self.tree.node(id).origin),
                );
                self.resolve(id, scope, host);
            }
        }
    }

    /// 声明一个名字或一个名字元组。`host` 为 `None` 的声明不提升。
    fn declare_target(&mut self, id: ExprId, scope: ScopeId, host: Option<ExprId>) {
        match self.tree.tag_kind(id) {
            Some(kind) if kind.is_virtual() => self.report_virtual(id),
            Some(kind) if kind.is_declaration() => self.declare(id, kind, scope, host),
            _ if self.tree.is(id, Builtin::Tuple) => {
                for element in self.tree.children(id).to_vec() {
                    self.declare_target(element, scope, host);
                }
            }
            _ => self.report_invalid_declaration(id, "only names can be declared"),
        }
        self.tree.node_mut(id).resolved = true;
    }

    fn declare(&mut self, id: ExprId, kind: TagKind, scope: ScopeId, host: Option<ExprId>) {
        let Some(name) = self.tree.name(id).map(str::to_string) else { return };
        let loc = self.tree.node(id).loc;
        let declaration = Rc::new(Declaration {
            name: name.clone(),
            tag: Some(id),
            loc: Some(loc),
            assignable: !kind.is_constant(),
            hoisted: host.is_some(),
        });

        match self.vars.define(scope, &name, declaration.clone()) {
            Ok(()) => {
                self.tree.node_mut(id).binding = Some(declaration.clone());
                if let Some(host) = host {
                    if let Some(decls) = self.tree.node_mut(host).decls.as_mut() {
                        decls.insert(name, declaration);
                    }
                }
            }
            Err(existing) => {
                let mut diagnostic = Diagnostic::error(
                    &E0201_REDECLARED_IDENTIFIER,
                    Label::new(loc, "declared again here"),
                )
                .with_dynamic_message(format!("Identifier `{name}` is already declared in this scope"))
                .with_origin(self.tree.node(id).origin);
                if let Some(previous) = existing.loc {
                    diagnostic = diagnostic.with_secondary_label(Label::new(previous, "previously declared here"));
                }
                self.diagnostics.report(diagnostic);
            }
        }
    }

    /// `#external name` 让名字在当前作用域里可见，但不产生任何声明语句。
    fn declare_external(&mut self, id: ExprId, scope: ScopeId) {
        match (self.tree.tag_kind(id), self.tree.name(id)) {
            (Some(_), Some(name)) => {
                let name = name.to_string();
                let declaration = Rc::new(Declaration {
                    loc: Some(self.tree.node(id).loc),
                    tag: Some(id),
                    ..Declaration::global(name.clone())
                });
                // 重复的 `#external` 无害
                let _ = self.vars.define(scope, &name, declaration.clone());
                self.tree.node_mut(id).binding = Some(declaration);
            }
            _ => self.report_invalid_declaration(id, "`#external` takes a name"),
        }
        self.tree.node_mut(id).resolved = true;
    }

    fn report_virtual(&mut self, id: ExprId) {
        let name = self.tree.name(id).unwrap_or("?").to_string();
        let loc = self.tree.node(id).loc;
        self.diagnostics.report(
            Diagnostic::error(
                &E0303_UNDECLARED_VIRTUAL_IDENTIFIER,
                Label::new(loc, "backtick names are only valid inside macro templates"),
            )
            .with_dynamic_message(format!("Undeclared virtual identifier `{name}`"))
            .with_origin(self.tree.node(id).origin),
        );
    }

    fn report_invalid_declaration(&mut self, id: ExprId, message: &str) {
        let loc = self.tree.node(id).loc;
        self.diagnostics.report(
            Diagnostic::error(&E0209_INVALID_DECLARATION, Label::new(loc, message))
                .with_origin(self.tree.node(id).origin),
        );
    }
}

/// 变量解析阶段的公共入口。
pub fn resolve(root: ExprId, env: &RootEnv, tree: &mut ExprTree, diagnostics: &mut DiagnosticBag) {
    Resolver::new(env, tree, diagnostics).resolve_root(root);
    log::debug!("resolution finished");
}
