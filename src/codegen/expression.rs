// src/codegen/expression.rs
//
// 能写成单个表达式的节点。子节点需要先输出语句时，为了保持从左到右的求值顺序，
// 排在它前面的操作数先存进临时变量。

use super::ast::{BinaryOp, Expr, Literal, LogicalOp, Stmt, UnaryOp};
use super::{CodeGen, Dest, Result};
use crate::expr::{ExprId, Value};
use crate::symbols::{BlockKind, Builtin, SymbolFlags, SymbolKind};

fn binary_op(builtin: Builtin) -> Option<BinaryOp> {
    Some(match builtin {
        Builtin::Eq => BinaryOp::Eq,
        Builtin::NotEq => BinaryOp::NotEq,
        Builtin::Lt => BinaryOp::Lt,
        Builtin::Le => BinaryOp::Le,
        Builtin::Gt => BinaryOp::Gt,
        Builtin::Ge => BinaryOp::Ge,
        Builtin::Add => BinaryOp::Add,
        Builtin::Sub => BinaryOp::Sub,
        Builtin::Mul => BinaryOp::Mul,
        Builtin::Div => BinaryOp::Div,
        Builtin::Mod => BinaryOp::Mod,
        _ => return None,
    })
}

impl CodeGen<'_> {
    /// 节点能否写成一个表达式（可能需要先输出一些语句）。
    pub(super) fn is_expression(&self, id: ExprId) -> bool {
        match self.tree.symbol(id).kind() {
            SymbolKind::Value | SymbolKind::Tag(_) | SymbolKind::Nothing => true,
            SymbolKind::Builtin(builtin) => match builtin {
                Builtin::If => self.is_pure(id),
                Builtin::Assign => self.tree.child(id, 0).is_some_and(|target| self.is_single_target(target)),
                Builtin::Var | Builtin::Const => {
                    self.tree.child(id, 0).is_some_and(|inner| self.tree.tag_kind(inner).is_some())
                }
                Builtin::Or
                | Builtin::And
                | Builtin::Neg
                | Builtin::Not
                | Builtin::Member
                | Builtin::Call
                | Builtin::Element
                | Builtin::Array
                | Builtin::Object
                | Builtin::New
                | Builtin::Fn => true,
                other => binary_op(*other).is_some(),
            },
            _ => false,
        }
    }

    /// 写成表达式时不需要先输出任何语句。
    pub(super) fn is_pure(&self, id: ExprId) -> bool {
        let children = self.tree.children(id);
        match self.tree.builtin(id) {
            Some(Builtin::If) => self.conditional_parts(id).is_some(),
            _ if !self.is_expression(id) => false,
            Some(Builtin::Fn | Builtin::Var | Builtin::Const) => true,
            Some(Builtin::Member) => children.first().is_none_or(|&object| self.is_pure(object)),
            Some(Builtin::Object) => children.iter().all(|&entry| match self.tree.child(entry, 1) {
                Some(value) if self.tree.is(entry, Builtin::Pair) => self.is_pure(value),
                _ => self.is_pure(entry),
            }),
            Some(Builtin::Assign) => match children {
                &[target, value] => self.is_pure_target(target) && self.is_pure(value),
                _ => false,
            },
            _ => children.iter().all(|&child| self.is_pure(child)),
        }
    }

    pub(super) fn is_single_target(&self, target: ExprId) -> bool {
        match self.tree.builtin(target) {
            Some(Builtin::Tuple) => false,
            Some(Builtin::Var | Builtin::Const) => {
                self.tree.child(target, 0).is_some_and(|inner| !self.tree.is(inner, Builtin::Tuple))
            }
            _ => true,
        }
    }

    fn is_pure_target(&self, target: ExprId) -> bool {
        match self.tree.builtin(target) {
            Some(Builtin::Member) => self.tree.child(target, 0).is_none_or(|object| self.is_pure(object)),
            Some(Builtin::Element) => self.tree.children(target).iter().all(|&c| self.is_pure(c)),
            _ => true,
        }
    }

    /// `if c a else b` 两个分支都只有一个纯表达式时，可以写成条件表达式。
    fn conditional_parts(&self, id: ExprId) -> Option<(ExprId, ExprId, ExprId)> {
        let &[condition, then_branch, clause] = self.tree.children(id) else { return None };
        if !self.tree.is(clause, Builtin::Else) {
            return None;
        }
        let consequent = self.single_value(then_branch)?;
        let inner = self.tree.child(clause, 0)?;
        let alternate = if self.tree.is(inner, Builtin::If) {
            inner
        } else {
            self.single_value(inner)?
        };
        (self.is_pure(condition) && self.is_pure(consequent) && self.is_pure(alternate))
            .then_some((condition, consequent, alternate))
    }

    /// 只有一行、没有声明的缩进块里的那一行。
    fn single_value(&self, branch: ExprId) -> Option<ExprId> {
        match self.tree.symbol(branch).kind() {
            SymbolKind::Block(BlockKind::Block) => {
                let has_decls = self.tree.node(branch).decls.as_ref().is_some_and(|d| !d.is_empty());
                match self.tree.children(branch) {
                    &[only] if !has_decls => Some(only),
                    _ => None,
                }
            }
            SymbolKind::Block(_) => None,
            _ => Some(branch),
        }
    }

    /// 求出一个值。语句类节点先写进一个新的临时变量。
    pub(super) fn value(&mut self, id: ExprId, out: &mut Vec<Stmt>) -> Result<Expr> {
        if self.is_expression(id) {
            return self.build_expression(id, out);
        }
        let temp = self.fresh_temp();
        self.lower(id, Dest::into_name(temp.clone()), out)?;
        Ok(Expr::ident(temp).located(self.span_of(id)))
    }

    /// 不平凡的表达式存进临时变量，返回那个变量。
    pub(super) fn spill(&mut self, expr: Expr, out: &mut Vec<Stmt>) -> Expr {
        if expr.is_trivial() {
            return expr;
        }
        let temp = self.fresh_temp();
        out.push(Stmt::assign(temp.clone(), expr));
        Expr::ident(temp)
    }

    /// 从左到右求出一组操作数。
    pub(super) fn operands(&mut self, children: &[ExprId], out: &mut Vec<Stmt>) -> Result<Vec<Expr>> {
        let last_impure = children.iter().rposition(|&child| !self.is_pure(child));
        let mut exprs = Vec::with_capacity(children.len());
        for (index, &child) in children.iter().enumerate() {
            let expr = self.value(child, out)?;
            if last_impure.is_some_and(|last| index < last) {
                exprs.push(self.spill(expr, out));
            } else {
                exprs.push(expr);
            }
        }
        Ok(exprs)
    }

    pub(super) fn build_expression(&mut self, id: ExprId, out: &mut Vec<Stmt>) -> Result<Expr> {
        let symbol = self.tree.symbol(id).clone();
        let expr = match symbol.kind() {
            SymbolKind::Value => self.literal(id)?,
            SymbolKind::Tag(_) => self.identifier(id)?,
            SymbolKind::Nothing => Expr::undefined(),
            SymbolKind::Builtin(builtin) => self.build_builtin(id, *builtin, out)?,
            _ => return Err(self.unsupported(id)),
        };
        Ok(expr.located(self.span_of(id)))
    }

    fn literal(&self, id: ExprId) -> Result<Expr> {
        let literal = match &self.tree.node(id).value {
            Some(Value::Number(n)) => Literal::Number(*n),
            Some(Value::Str(s)) => Literal::Str(s.clone()),
            Some(Value::Bool(b)) => Literal::Bool(*b),
            Some(Value::Null) => Literal::Null,
            _ => return Err(self.malformed(id, "a literal without a value")),
        };
        Ok(Expr::Literal(literal))
    }

    fn identifier(&self, id: ExprId) -> Result<Expr> {
        match self.tree.name(id) {
            Some(name) => Ok(Expr::ident(name)),
            None => Err(self.malformed(id, "a name without text")),
        }
    }

    fn build_builtin(&mut self, id: ExprId, builtin: Builtin, out: &mut Vec<Stmt>) -> Result<Expr> {
        let children = self.tree.children(id).to_vec();
        if let Some(op) = binary_op(builtin) {
            let [left, right]: [Expr; 2] = self
                .operands(&children, out)?
                .try_into()
                .map_err(|_| self.malformed(id, "expected two operands"))?;
            return Ok(Expr::binary(op, left, right));
        }

        match builtin {
            Builtin::And => self.logical(id, LogicalOp::And, out),
            Builtin::Or => self.logical(id, LogicalOp::Or, out),
            Builtin::Neg | Builtin::Not => {
                let &[operand] = &children[..] else { return Err(self.malformed(id, "expected one operand")) };
                let op = if builtin == Builtin::Neg { UnaryOp::Neg } else { UnaryOp::Not };
                Ok(Expr::unary(op, self.value(operand, out)?))
            }
            Builtin::Member => {
                let &[object, property] = &children[..] else {
                    return Err(self.malformed(id, "expected an object and a property"));
                };
                let object = self.value(object, out)?;
                self.member(object, property, out)
            }
            Builtin::Element => {
                let mut parts = self.operands(&children, out)?;
                let (Some(index), Some(object), true) = (parts.pop(), parts.pop(), parts.is_empty()) else {
                    return Err(self.malformed(id, "expected an object and an index"));
                };
                Ok(Expr::Member {
                    object: Box::new(object),
                    property: Box::new(index),
                    computed: true,
                })
            }
            Builtin::Call => {
                let mut parts = self.operands(&children, out)?.into_iter();
                let Some(callee) = parts.next() else { return Err(self.malformed(id, "a call without a callee")) };
                Ok(Expr::call(callee, parts.collect()))
            }
            Builtin::New => {
                let &[target] = &children[..] else { return Err(self.malformed(id, "expected one operand")) };
                let tree = self.tree;
                let (callee, args) = if tree.is(target, Builtin::Call) {
                    let mut parts = self.operands(tree.children(target), out)?.into_iter();
                    let Some(callee) = parts.next() else {
                        return Err(self.malformed(target, "a call without a callee"));
                    };
                    (callee, parts.collect())
                } else {
                    (self.value(target, out)?, Vec::new())
                };
                Ok(Expr::New {
                    callee: Box::new(callee),
                    args,
                })
            }
            Builtin::Array => Ok(Expr::Array(self.operands(&children, out)?)),
            Builtin::Object => self.object(&children, out),
            Builtin::Fn => self.function(id),
            Builtin::Var | Builtin::Const => match self.tree.child(id, 0) {
                Some(inner) => self.identifier(inner),
                None => Err(self.malformed(id, "a declaration without a name")),
            },
            Builtin::Assign => {
                let &[target, value] = &children[..] else {
                    return Err(self.malformed(id, "expected a target and a value"));
                };
                let spill = !self.is_pure(value);
                let target = self.target_expr(target, spill, out)?;
                let value = self.value(value, out)?;
                Ok(Expr::assign(target, value))
            }
            Builtin::If => {
                let Some((condition, consequent, alternate)) = self.conditional_parts(id) else {
                    return Err(self.unsupported(id));
                };
                Ok(Expr::Conditional {
                    test: Box::new(self.build_expression(condition, out)?),
                    consequent: Box::new(self.build_expression(consequent, out)?),
                    alternate: Box::new(self.build_expression(alternate, out)?),
                })
            }
            _ => Err(self.unsupported(id)),
        }
    }

    /// 右边需要语句时不能直接写成 `a && b`：先算左边，再用 `if` 决定要不要算右边。
    fn logical(&mut self, id: ExprId, op: LogicalOp, out: &mut Vec<Stmt>) -> Result<Expr> {
        let &[left, right] = self.tree.children(id) else {
            return Err(self.malformed(id, "expected two operands"));
        };
        let left = self.value(left, out)?;
        if self.is_pure(right) {
            let right = self.build_expression(right, out)?;
            return Ok(Expr::Logical {
                op,
                left: Box::new(left),
                right: Box::new(right),
            });
        }

        let temp = self.fresh_temp();
        out.push(Stmt::assign(temp.clone(), left));
        let mut branch = Vec::new();
        let right = self.value(right, &mut branch)?;
        branch.push(Stmt::assign(temp.clone(), right));
        let test = match op {
            LogicalOp::And => Expr::ident(temp.clone()),
            LogicalOp::Or => Expr::unary(UnaryOp::Not, Expr::ident(temp.clone())),
        };
        out.push(Stmt::If {
            test,
            consequent: Box::new(Stmt::Block(branch)),
            alternate: None,
        });
        Ok(Expr::ident(temp))
    }

    fn member(&mut self, object: Expr, property: ExprId, out: &mut Vec<Stmt>) -> Result<Expr> {
        let (property, computed) = match (self.tree.tag_kind(property), self.tree.name(property)) {
            (Some(_), Some(name)) => (Expr::ident(name), false),
            _ => (self.value(property, out)?, true),
        };
        Ok(Expr::Member {
            object: Box::new(object),
            property: Box::new(property),
            computed,
        })
    }

    fn object(&mut self, entries: &[ExprId], out: &mut Vec<Stmt>) -> Result<Expr> {
        let mut keys = Vec::with_capacity(entries.len());
        let mut values = Vec::with_capacity(entries.len());
        for &entry in entries {
            let (key, value) = match self.tree.children(entry) {
                &[key, value] if self.tree.is(entry, Builtin::Pair) => (key, value),
                _ => (entry, entry),
            };
            keys.push(self.key_text(key)?);
            values.push(value);
        }
        let values = self.operands(&values, out)?;
        Ok(Expr::Object(keys.into_iter().zip(values).collect()))
    }

    fn key_text(&self, key: ExprId) -> Result<String> {
        match &self.tree.node(key).value {
            Some(Value::Name(name)) | Some(Value::Str(name)) => Ok(name.clone()),
            Some(Value::Number(n)) => Ok(n.to_string()),
            _ => Err(self.malformed(key, "object keys must be names, strings or numbers")),
        }
    }

    /// `fn` 的跳转目标不越过函数边界。
    fn function(&mut self, id: ExprId) -> Result<Expr> {
        let &[params, body] = self.tree.children(id) else {
            return Err(self.malformed(id, "expected parameters and a body"));
        };
        let params = self.names_of(params)?;
        let saved = std::mem::take(&mut self.jumps);
        let body = self.function_body(id, body);
        self.jumps = saved;
        Ok(Expr::Function { params, body: body? })
    }

    /// 最后一行恰好产生一个值时作为返回值。
    fn function_body(&mut self, function: ExprId, body: ExprId) -> Result<Vec<Stmt>> {
        let is_block = matches!(self.tree.symbol(body).kind(), SymbolKind::Block(BlockKind::Block));
        let last = if is_block { self.tree.children(body).last().copied() } else { Some(body) };
        let returns = last.is_some_and(|last| {
            self.tree.node(last).result_count == Some(1)
                && !self.tree.symbol(last).flags().contains(SymbolFlags::JUMP)
        });
        let dest = if returns { Dest::Return } else { Dest::Discard };

        self.with_host(function, |cg, out| {
            if is_block {
                out.extend(cg.sequence(body, dest)?);
                Ok(())
            } else {
                cg.lower(body, dest, out)
            }
        })
    }

    /// 单个赋值目标。`spill` 为真时右边还要输出语句，目标里的对象先存起来。
    pub(super) fn target_expr(&mut self, target: ExprId, spill: bool, out: &mut Vec<Stmt>) -> Result<Expr> {
        if self.tree.tag_kind(target).is_some() {
            return self.identifier(target);
        }
        match self.tree.builtin(target) {
            Some(Builtin::Var | Builtin::Const) => match self.tree.child(target, 0) {
                Some(inner) => self.identifier(inner),
                None => Err(self.malformed(target, "a declaration without a name")),
            },
            Some(Builtin::Member) => {
                let &[object, property] = self.tree.children(target) else {
                    return Err(self.malformed(target, "expected an object and a property"));
                };
                let mut object = self.value(object, out)?;
                if spill {
                    object = self.spill(object, out);
                }
                self.member(object, property, out)
            }
            Some(Builtin::Element) => {
                let tree = self.tree;
                let mut parts = self.operands(tree.children(target), out)?;
                if spill {
                    parts = parts.into_iter().map(|part| self.spill(part, out)).collect();
                }
                let (Some(index), Some(object), true) = (parts.pop(), parts.pop(), parts.is_empty()) else {
                    return Err(self.malformed(target, "expected an object and an index"));
                };
                Ok(Expr::Member {
                    object: Box::new(object),
                    property: Box::new(index),
                    computed: true,
                })
            }
            _ => Err(self.malformed(target, "not an assignable target")),
        }
    }
}
