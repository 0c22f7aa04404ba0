// src/combiner/fold.rs
//
// 优先级爬升。每一步在"当前表达式"和"下一个条目"之间选择一个动作：
// 作为右操作数挂上、把当前表达式旋转成中缀运算符的左操作数、
// 吸收从属子句，或者插入隐式调用 / 下标。

use super::{Combiner, Item, ItemClass, dependent};
use crate::diagnostics::codes::*;
use crate::diagnostics::{Diagnostic, Label};
use crate::expr::ExprId;
use crate::symbols::{Builtin, CALL_PRECEDENCE, Symbol, SymbolFlags, TagKind};
use std::rc::Rc;

pub(super) struct Cursor {
    items: Vec<Item>,
    pos: usize,
}

impl Cursor {
    fn new(items: Vec<Item>) -> Self {
        Self { items, pos: 0 }
    }

    fn peek(&self) -> Option<&Item> {
        self.items.get(self.pos)
    }

    fn advance(&mut self) -> Option<Item> {
        let item = self.items.get(self.pos).cloned();
        if item.is_some() {
            self.pos += 1;
        }
        item
    }
}

impl Combiner<'_> {
    /// 把一行的条目折叠成一个表达式。折叠不完的条目逐个报告并跳过。
    pub(super) fn fold(&mut self, items: Vec<Item>) -> Option<ExprId> {
        if items.is_empty() {
            return None;
        }
        let mut cursor = Cursor::new(items);
        let result = self.parse_expr(&mut cursor, 0);
        while let Some(item) = cursor.advance() {
            self.report_unexpected(&item);
            // 剩下的部分照常解析，只为了报告其中的错误
            let _ = self.parse_expr(&mut cursor, 0);
        }
        result
    }

    fn parse_expr(&mut self, cursor: &mut Cursor, min_precedence: u8) -> Option<ExprId> {
        let mut lhs = self.parse_prefix(cursor)?;
        loop {
            let Some(item) = cursor.peek().cloned() else { break };
            match &item.class {
                ItemClass::Operator(symbol) if symbol.arity().left => {
                    if symbol.precedence() <= min_precedence {
                        break;
                    }
                    cursor.advance();
                    self.tree.append_child(item.id, lhs);
                    self.parse_operands(cursor, item.id, symbol);
                    lhs = item.id;
                }
                ItemClass::Paren { spread } if CALL_PRECEDENCE > min_precedence => {
                    cursor.advance();
                    lhs = self.make_call(lhs, item.id, *spread);
                }
                ItemClass::Square if CALL_PRECEDENCE > min_precedence => {
                    cursor.advance();
                    lhs = self.make_element(lhs, item.id);
                }
                _ if CALL_PRECEDENCE > min_precedence && self.starts_argument(&item) => {
                    // `a b c` 是 `a(b(c))`
                    let Some(argument) = self.parse_expr(cursor, CALL_PRECEDENCE - 1) else { break };
                    let loc = self.tree.loc(lhs);
                    let call = self.tree.alloc(self.env.builtin(Builtin::Call), None, loc);
                    self.tree.append_child(call, lhs);
                    self.tree.append_child(call, argument);
                    lhs = call;
                }
                _ => break,
            }
        }
        Some(lhs)
    }

    fn parse_prefix(&mut self, cursor: &mut Cursor) -> Option<ExprId> {
        let item = cursor.advance()?;
        let ItemClass::Operator(symbol) = &item.class else {
            return Some(item.id);
        };
        let symbol = match symbol.as_builtin().and_then(Builtin::prefix_form) {
            // 前缀位置上的 `-` 是取负
            Some(prefix) if symbol.arity().left => {
                let prefix = self.env.builtin(prefix);
                self.tree.set_symbol(item.id, prefix.clone());
                prefix
            }
            _ => symbol.clone(),
        };
        self.parse_operands(cursor, item.id, &symbol);
        Some(item.id)
    }

    /// 给运算符挂上右操作数，然后吸收同一行里紧随其后的从属子句。
    fn parse_operands(&mut self, cursor: &mut Cursor, node: ExprId, symbol: &Rc<Symbol>) {
        let arity = symbol.arity();
        let precedence = symbol.precedence();
        let operand_precedence = if arity.left && arity.right_assoc {
            precedence.saturating_sub(1)
        } else {
            precedence
        };

        let mut count = 0u8;
        while count < arity.right_max {
            let Some(item) = cursor.peek() else { break };
            let child = if count < arity.leading_atoms {
                if !self.starts_atom(item) {
                    break;
                }
                cursor.advance().map(|item| item.id)
            } else {
                if !self.starts_operand(item) {
                    break;
                }
                self.parse_expr(cursor, operand_precedence)
            };
            let Some(child) = child else { break };
            self.tree.append_child(node, child);
            count += 1;
        }

        while let Some(item) = cursor.peek() {
            let ItemClass::Operator(clause) = &item.class else { break };
            let Some(builtin) = clause.as_builtin() else { break };
            if !dependent::accepts(self.tree, node, builtin) {
                break;
            }
            let clause = clause.clone();
            let id = item.id;
            cursor.advance();
            self.parse_operands(cursor, id, &clause);
            self.tree.append_child(node, id);
        }

        self.classify(node);
    }

    fn make_call(&mut self, callee: ExprId, arguments: ExprId, spread: bool) -> ExprId {
        let loc = self.tree.loc(callee);
        let call = self.tree.alloc(self.env.builtin(Builtin::Call), None, loc);
        self.tree.append_child(call, callee);
        if spread {
            for argument in self.tree.take_children(arguments) {
                self.tree.append_child(call, argument);
            }
        } else {
            self.tree.append_child(call, arguments);
        }
        call
    }

    fn make_element(&mut self, object: ExprId, array: ExprId) -> ExprId {
        let loc = self.tree.loc(object);
        let element = self.tree.alloc(self.env.builtin(Builtin::Element), None, loc);
        self.tree.append_child(element, object);
        for index in self.tree.take_children(array) {
            self.tree.append_child(element, index);
        }
        element
    }

    fn starts_operand(&self, item: &Item) -> bool {
        match &item.class {
            ItemClass::Operator(symbol) => {
                !symbol.flags().contains(SymbolFlags::DEPENDENT_CLAUSE)
                    && (!symbol.arity().left || symbol.as_builtin().and_then(Builtin::prefix_form).is_some())
            }
            _ => true,
        }
    }

    fn starts_argument(&self, item: &Item) -> bool {
        !matches!(item.class, ItemClass::Block) && self.starts_operand(item)
    }

    /// 原子槽位接受单个名字或括号块，也接受被定义成宏的名字。
    fn starts_atom(&self, item: &Item) -> bool {
        match &item.class {
            ItemClass::Block => false,
            ItemClass::Operator(symbol) => !symbol.flags().contains(SymbolFlags::DEPENDENT_CLAUSE),
            _ => true,
        }
    }

    /// 组合时的标签重分类：声明、常量和外部名字。
    fn classify(&mut self, node: ExprId) {
        let Some(builtin) = self.tree.builtin(node) else { return };
        let first = self.tree.child(node, 0);
        match (builtin, first) {
            (Builtin::Var | Builtin::Fn | Builtin::Catch, Some(target)) => self.declare(target, false),
            (Builtin::Const, Some(target)) => self.declare(target, true),
            (Builtin::External, Some(target)) => {
                if self.tree.tag_kind(target).is_some() {
                    let external = self.env.tag(TagKind::External);
                    self.tree.set_symbol(target, external);
                }
            }
            (Builtin::Loop, Some(head)) if self.tree.children(node).len() == 2 => {
                if self.tree.is(head, Builtin::Assign) {
                    if let Some(target) = self.tree.child(head, 0) {
                        self.declare(target, false);
                    }
                }
            }
            _ => {}
        }
    }

    fn declare(&mut self, target: ExprId, constant: bool) {
        if let Some(kind) = self.tree.tag_kind(target) {
            let mut kind = kind.to_tag_declaration();
            if constant {
                kind = kind.to_constant_tag();
            }
            let symbol = self.env.tag(kind);
            self.tree.set_symbol(target, symbol);
        } else if self.tree.is(target, Builtin::Tuple) {
            for element in self.tree.children(target).to_vec() {
                self.declare(element, constant);
            }
        }
    }

    fn report_unexpected(&mut self, item: &Item) {
        let node = self.tree.node(item.id);
        let text = match &item.class {
            ItemClass::Operator(symbol) => format!("`{}`", node.name().unwrap_or(symbol.name())),
            ItemClass::Block => "an indented block".to_string(),
            _ => format!("`{}`", self.tree.sexpr(item.id)),
        };
        let loc = node.loc;
        self.diagnostics.report(
            Diagnostic::error(&E0107_UNEXPECTED_TOKEN, Label::new(loc, "cannot be combined here"))
                .with_dynamic_message(format!("Unexpected {text}")),
        );
    }
}
