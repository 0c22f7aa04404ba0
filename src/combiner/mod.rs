//! src/combiner/mod.rs
//!
//! 组合阶段：把原始块树里每一行的扁平词法单元序列，按优先级和结合性
//! 组合成嵌套的表达式树。
//!
//! 处理顺序是文档顺序、先子后父：一行里的括号块和缩进块先被组合，
//! 然后这一行本身才被折叠。这样 `#macro` 定义在它所在的行组合完成时
//! 就进入当前键作用域，后面的行都能看到它。

mod dependent;
mod fold;
#[cfg(test)]
mod test;

use crate::diagnostics::codes::*;
use crate::diagnostics::{Diagnostic, DiagnosticBag, Label};
use crate::expr::{ExprId, ExprTree, Value};
use crate::macros::template;
use crate::symbols::{
    BlockKind, Builtin, RootEnv, ScopeArena, ScopeId, Symbol, SymbolFlags, SymbolKind, TagKind, TokenClass,
};
use crate::utils::Loc;
use std::rc::Rc;

/// 折叠时使用的一个已解析条目。
#[derive(Debug, Clone)]
pub(crate) struct Item {
    pub id: ExprId,
    pub class: ItemClass,
}

#[derive(Debug, Clone)]
pub(crate) enum ItemClass {
    /// 名字、字面量、`do` 块
    Operand,
    Operator(Rc<Symbol>),
    /// 圆括号块的结果。`spread` 表示它是一个元组，作为调用参数时要展开
    Paren { spread: bool },
    Square,
    Curly,
    /// 缩进块，只能填关键字的操作数槽位，不能作为调用参数
    Block,
}

pub struct Combiner<'a> {
    env: &'a RootEnv,
    tree: &'a mut ExprTree,
    keys: &'a mut ScopeArena<Rc<Symbol>>,
    diagnostics: &'a mut DiagnosticBag,
}

impl<'a> Combiner<'a> {
    pub fn new(
        env: &'a RootEnv,
        tree: &'a mut ExprTree,
        keys: &'a mut ScopeArena<Rc<Symbol>>,
        diagnostics: &'a mut DiagnosticBag,
    ) -> Self {
        Self {
            env,
            tree,
            keys,
            diagnostics,
        }
    }

    pub fn combine_root(&mut self, root: ExprId) {
        self.combine_block(root, None);
    }

    /// 组合根块、缩进块或 `do` 块：每一行折叠成一条语句。
    fn combine_block(&mut self, id: ExprId, parent_scope: Option<ScopeId>) {
        let scope = match parent_scope {
            Some(parent) => self.keys.extend(parent),
            None => self.keys.root(),
        };
        self.tree.node_mut(id).key_scope = Some(scope);

        let mut statements: Vec<ExprId> = Vec::new();
        for line in self.tree.take_children(id) {
            let Some(expr) = self.combine_line(line, scope) else { continue };

            if self.tree.symbol(expr).flags().contains(SymbolFlags::DEPENDENT_CLAUSE) {
                let attached = match statements.last() {
                    Some(&previous) => dependent::attach(self.tree, previous, expr),
                    None => false,
                };
                if !attached {
                    self.report_unattached(expr);
                }
                continue;
            }

            if self.tree.is(expr, Builtin::DefMacro) {
                self.register_macro(expr, scope);
            }
            statements.push(expr);
        }

        for statement in statements {
            self.tree.append_child(id, statement);
            self.validate_clauses(statement);
        }
    }

    fn combine_line(&mut self, line: ExprId, scope: ScopeId) -> Option<ExprId> {
        let loc = self.tree.loc(line);
        let children = self.tree.take_children(line);
        let has_groups = children.iter().any(|&c| self.is_block(c, BlockKind::Comma));
        if !has_groups {
            let items = self.collect_items(children, scope);
            return self.fold(items);
        }

        // 行级逗号：整行是一个元组
        let mut groups: Vec<Vec<ExprId>> = Vec::new();
        for child in children {
            if self.is_block(child, BlockKind::Comma) {
                groups.push(self.tree.take_children(child));
            } else if let Some(last) = groups.last_mut() {
                last.push(child);
            } else {
                groups.push(vec![child]);
            }
        }
        let tuple = self.tree.alloc(self.env.builtin(Builtin::Tuple), None, loc);
        for group in groups {
            let items = self.collect_items(group, scope);
            if let Some(element) = self.fold(items) {
                self.tree.append_child(tuple, element);
            }
        }
        Some(tuple)
    }

    fn is_block(&self, id: ExprId, kind: BlockKind) -> bool {
        self.tree.symbol(id).as_block() == Some(kind)
    }

    /// 把一行（或一个逗号分组）的原始子节点变成折叠用的条目。
    fn collect_items(&mut self, children: Vec<ExprId>, scope: ScopeId) -> Vec<Item> {
        let mut items = Vec::with_capacity(children.len());
        for child in children {
            let symbol = self.tree.symbol(child).clone();
            match symbol.kind() {
                SymbolKind::Block(kind @ (BlockKind::Paren | BlockKind::Square | BlockKind::Curly)) => {
                    items.push(self.combine_bracket(child, *kind, scope));
                }
                SymbolKind::Block(BlockKind::Block) => {
                    self.combine_block(child, Some(scope));
                    items.push(Item {
                        id: child,
                        class: ItemClass::Block,
                    });
                }
                SymbolKind::Block(BlockKind::Do) => {
                    self.combine_block(child, Some(scope));
                    items.push(Item {
                        id: child,
                        class: ItemClass::Operand,
                    });
                }
                SymbolKind::Token(class) => self.resolve_token(child, *class, scope, &mut items),
                _ => items.push(Item {
                    id: child,
                    class: ItemClass::Operand,
                }),
            }
        }
        items
    }

    fn combine_bracket(&mut self, node: ExprId, kind: BlockKind, scope: ScopeId) -> Item {
        let loc = self.tree.loc(node);
        let groups = self.tree.take_children(node);
        let group_count = groups.len();
        let mut elements = Vec::with_capacity(group_count);
        for group in groups {
            let children = self.tree.take_children(group);
            let items = self.collect_items(children, scope);
            if let Some(element) = self.fold(items) {
                elements.push(element);
            }
        }

        match kind {
            BlockKind::Paren if group_count == 1 && elements.len() == 1 => Item {
                id: elements[0],
                class: ItemClass::Paren { spread: false },
            },
            BlockKind::Paren => Item {
                id: self.sequence(Builtin::Tuple, elements, loc),
                class: ItemClass::Paren { spread: true },
            },
            BlockKind::Square => Item {
                id: self.sequence(Builtin::Array, elements, loc),
                class: ItemClass::Square,
            },
            _ => {
                for &element in &elements {
                    self.check_object_entry(element);
                }
                Item {
                    id: self.sequence(Builtin::Object, elements, loc),
                    class: ItemClass::Curly,
                }
            }
        }
    }

    fn sequence(&mut self, builtin: Builtin, elements: Vec<ExprId>, loc: Loc) -> ExprId {
        let node = self.tree.alloc(self.env.builtin(builtin), None, loc);
        for element in elements {
            self.tree.append_child(node, element);
        }
        node
    }

    fn check_object_entry(&mut self, entry: ExprId) {
        let valid_key = self.tree.is(entry, Builtin::Pair)
            && self.tree.child(entry, 0).is_some_and(|key| {
                self.tree.tag_kind(key).is_some() || matches!(self.tree.node(key).value, Some(Value::Str(_)))
            });
        if !valid_key {
            let loc = self.tree.loc(entry);
            self.diagnostics.report(Diagnostic::error(
                &E0110_MALFORMED_LITERAL,
                Label::new(loc, "expected `key: value`"),
            ));
        }
    }

    // --- 词法单元解析 ---

    fn resolve_token(&mut self, node: ExprId, class: TokenClass, scope: ScopeId, items: &mut Vec<Item>) {
        let text = self.tree.name(node).map(str::to_string);
        match (class, text) {
            (TokenClass::Identifier, Some(name)) => {
                let found = self.keys.lookup(scope, &name).cloned();
                match found {
                    Some(symbol) if matches!(symbol.kind(), SymbolKind::Value) => {
                        let value = Value::from_keyword(&name).unwrap_or(Value::Name(name));
                        let n = self.tree.node_mut(node);
                        n.symbol = self.env.value();
                        n.value = Some(value);
                        items.push(Item {
                            id: node,
                            class: ItemClass::Operand,
                        });
                    }
                    Some(symbol) if symbol.is_operator() => {
                        self.tree.set_symbol(node, symbol.clone());
                        items.push(Item {
                            id: node,
                            class: ItemClass::Operator(symbol),
                        });
                    }
                    _ => {
                        self.tree.set_symbol(node, self.env.tag(TagKind::USE));
                        items.push(Item {
                            id: node,
                            class: ItemClass::Operand,
                        });
                    }
                }
            }
            (TokenClass::VirtualIdentifier, _) => {
                self.tree.set_symbol(node, self.env.tag(TagKind::USE.to_virtual_tag()));
                items.push(Item {
                    id: node,
                    class: ItemClass::Operand,
                });
            }
            (TokenClass::Operator, Some(text)) => self.split_operator(node, &text, scope, items),
            (TokenClass::HashOperator, Some(text)) => match self.lookup_operator(scope, &text) {
                Some(symbol) => {
                    self.tree.set_symbol(node, symbol.clone());
                    items.push(Item {
                        id: node,
                        class: ItemClass::Operator(symbol),
                    });
                }
                None => self.report_unknown_operator(node, &text),
            },
            _ => {
                self.tree.set_symbol(node, self.env.value());
                items.push(Item {
                    id: node,
                    class: ItemClass::Operand,
                });
            }
        }
    }

    fn lookup_operator(&self, scope: ScopeId, text: &str) -> Option<Rc<Symbol>> {
        self.keys.lookup(scope, text).filter(|s| s.is_operator()).cloned()
    }

    /// 运算符字符串先整体查找；找不到时从左到右贪心地拆成已知运算符。
    fn split_operator(&mut self, node: ExprId, text: &str, scope: ScopeId, items: &mut Vec<Item>) {
        if let Some(symbol) = self.lookup_operator(scope, text) {
            self.tree.set_symbol(node, symbol.clone());
            items.push(Item {
                id: node,
                class: ItemClass::Operator(symbol),
            });
            return;
        }

        let chars: Vec<char> = text.chars().collect();
        let mut pieces = Vec::new();
        let mut start = 0;
        while start < chars.len() {
            let found = (start + 1..=chars.len()).rev().find_map(|end| {
                let piece: String = chars[start..end].iter().collect();
                self.lookup_operator(scope, &piece).map(|symbol| (end, piece, symbol))
            });
            let Some((end, piece, symbol)) = found else {
                self.report_unknown_operator(node, text);
                return;
            };
            pieces.push((start, piece, symbol));
            start = end;
        }

        let loc = self.tree.loc(node);
        for (offset, piece, symbol) in pieces {
            let piece_loc = Loc::clamped(loc.source(), loc.line(), loc.column() + offset as u32);
            let id = self.tree.alloc(symbol.clone(), Some(Value::Name(piece)), piece_loc);
            items.push(Item {
                id,
                class: ItemClass::Operator(symbol),
            });
        }
    }

    fn report_unknown_operator(&mut self, node: ExprId, text: &str) {
        let loc = self.tree.loc(node);
        self.diagnostics.report(
            Diagnostic::error(
                &E0106_UNKNOWN_OPERATOR,
                Label::new(loc, "not defined in this scope").with_width(text.chars().count() as u32),
            )
            .with_dynamic_message(format!("Unknown operator `{text}`")),
        );
    }

    // --- 宏注册 ---

    fn register_macro(&mut self, definition: ExprId, scope: ScopeId) {
        match template::define(self.env, self.tree, definition) {
            Ok((name, symbol)) => {
                log::debug!("macro `{name}` registered");
                self.keys.insert(scope, &name, symbol);
            }
            Err(diagnostic) => self.diagnostics.report(diagnostic),
        }
    }
}

/// 组合阶段的公共入口。
pub fn combine(
    root: ExprId,
    env: &RootEnv,
    tree: &mut ExprTree,
    keys: &mut ScopeArena<Rc<Symbol>>,
    diagnostics: &mut DiagnosticBag,
) {
    Combiner::new(env, tree, keys, diagnostics).combine_root(root);
    log::debug!("combination finished: {} nodes", tree.len());
}
