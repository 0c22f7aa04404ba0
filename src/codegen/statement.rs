// src/codegen/statement.rs
//
// 只能写成语句的节点。值通过 `Dest` 写进目标变量：
// `do` 是带标签的块，`loop` 是带标签的 `while (true)`，
// `give` 赋值后 break，`next` 给循环变量赋值后 continue，`end` 直接 break。

use super::ast::{CatchClause, Expr, Literal, Stmt, UnaryOp};
use super::{CodeGen, Dest, JumpKind, JumpTarget, Result};
use crate::expr::ExprId;
use crate::symbols::{BlockKind, Builtin, SymbolKind};

impl CodeGen<'_> {
    /// 生成一个节点，把它的值交给 `dest`。产生的语句标上这个节点的位置。
    pub(super) fn lower(&mut self, id: ExprId, dest: Dest, out: &mut Vec<Stmt>) -> Result<()> {
        let start = out.len();
        self.lower_node(id, dest, out)?;
        let span = self.span_of(id);
        for stmt in &mut out[start..] {
            if stmt.span().is_none() {
                let bare = std::mem::replace(stmt, Stmt::Block(Vec::new()));
                *stmt = bare.located(span);
            }
        }
        Ok(())
    }

    fn lower_node(&mut self, id: ExprId, dest: Dest, out: &mut Vec<Stmt>) -> Result<()> {
        let symbol = self.tree.symbol(id).clone();
        match symbol.kind() {
            SymbolKind::Block(BlockKind::Do) => return self.lower_do(id, dest, out),
            SymbolKind::Block(BlockKind::Block) => {
                let body = self.sequence(id, dest)?;
                out.push(Stmt::Block(body));
                return Ok(());
            }
            SymbolKind::Block(_) | SymbolKind::Token(_) | SymbolKind::Macro(_) => return Err(self.unsupported(id)),
            _ => {}
        }

        match symbol.as_builtin() {
            Some(Builtin::If) if !(dest.wants_value() && self.is_pure(id)) => self.lower_if(id, dest, out),
            Some(Builtin::While) => self.lower_while(id, out),
            Some(Builtin::Loop) => self.lower_loop(id, dest, out),
            Some(Builtin::Try) => self.lower_try(id, dest, out),
            Some(Builtin::Tuple) => self.lower_tuple(id, dest, out),
            Some(Builtin::Assign) => self.lower_assign(id, dest, out),
            Some(Builtin::Give | Builtin::Next | Builtin::End) => self.lower_jump(id, out),
            Some(Builtin::Return) => {
                let value = match self.tree.child(id, 0) {
                    Some(value) => Some(self.value(value, out)?),
                    None => None,
                };
                out.push(Stmt::Return(value));
                Ok(())
            }
            Some(Builtin::Throw) => {
                let Some(value) = self.tree.child(id, 0) else { return Err(self.malformed(id, "nothing to throw")) };
                let value = self.value(value, out)?;
                out.push(Stmt::Throw(value));
                Ok(())
            }
            Some(Builtin::External) => Ok(()),
            // 单独一行的 `var x` 只是声明，已经提升到块顶部
            Some(Builtin::Var | Builtin::Const) if dest == Dest::Discard => Ok(()),
            _ => {
                let expr = self.build_expression(id, out)?;
                self.emit(id, expr, dest, out)
            }
        }
    }

    /// 把一个表达式的值交给 `dest`。
    pub(super) fn emit(&mut self, id: ExprId, expr: Expr, dest: Dest, out: &mut Vec<Stmt>) -> Result<()> {
        match dest {
            Dest::Discard => out.push(Stmt::Expr(expr)),
            Dest::Return => out.push(Stmt::Return(Some(expr))),
            Dest::Into(names) => match <[String; 1]>::try_from(names) {
                Ok([name]) => out.push(Stmt::assign(name, expr)),
                Err(_) => return Err(self.malformed(id, "one value assigned to several names")),
            },
        }
        Ok(())
    }

    fn lower_if(&mut self, id: ExprId, dest: Dest, out: &mut Vec<Stmt>) -> Result<()> {
        let children = self.tree.children(id).to_vec();
        let [condition, then_branch, ref rest @ ..] = children[..] else {
            return Err(self.malformed(id, "expected a condition and a body"));
        };
        let test = self.value(condition, out)?;
        let consequent = Stmt::Block(self.block_body(then_branch, dest.clone())?);
        let alternate = match rest.iter().copied().find(|&c| self.tree.is(c, Builtin::Else)) {
            Some(clause) => Some(Box::new(self.lower_else(clause, dest)?)),
            None => None,
        };
        out.push(Stmt::If {
            test,
            consequent: Box::new(consequent),
            alternate,
        });
        Ok(())
    }

    /// `else if` 仍然写成 `else if`，条件需要的语句放进 else 块里。
    fn lower_else(&mut self, clause: ExprId, dest: Dest) -> Result<Stmt> {
        let Some(inner) = self.tree.child(clause, 0) else {
            return Err(self.malformed(clause, "`else` without a body"));
        };
        if !self.tree.is(inner, Builtin::If) {
            return Ok(Stmt::Block(self.block_body(inner, dest)?));
        }
        let mut stmts = Vec::new();
        self.lower_if(inner, dest, &mut stmts)?;
        Ok(match <[Stmt; 1]>::try_from(stmts) {
            Ok([only]) => only,
            Err(stmts) => Stmt::Block(stmts),
        })
    }

    /// 条件需要语句时，改写成 `while (true) { ...; if (!c) break; body }`。
    fn lower_while(&mut self, id: ExprId, out: &mut Vec<Stmt>) -> Result<()> {
        let &[condition, body] = self.tree.children(id) else {
            return Err(self.malformed(id, "expected a condition and a body"));
        };
        if self.is_pure(condition) {
            let test = self.build_expression(condition, out)?;
            let body = self.block_body(body, Dest::Discard)?;
            out.push(Stmt::While {
                test,
                body: Box::new(Stmt::Block(body)),
            });
            return Ok(());
        }

        let mut stmts = Vec::new();
        let test = self.value(condition, &mut stmts)?;
        stmts.push(Stmt::If {
            test: Expr::unary(UnaryOp::Not, test),
            consequent: Box::new(Stmt::Break(None)),
            alternate: None,
        });
        stmts.extend(self.block_body(body, Dest::Discard)?);
        out.push(Stmt::While {
            test: Expr::Literal(Literal::Bool(true)),
            body: Box::new(Stmt::Block(stmts)),
        });
        Ok(())
    }

    fn lower_do(&mut self, id: ExprId, dest: Dest, out: &mut Vec<Stmt>) -> Result<()> {
        let label = self.fresh_label(JumpKind::Do);
        self.jumps.push(JumpTarget {
            kind: JumpKind::Do,
            label: label.clone(),
            results: dest.clone(),
            variables: Vec::new(),
            used: false,
        });
        let body = self.sequence(id, dest);
        let target = self.jumps.pop();
        let body = Stmt::Block(body?);

        if target.is_some_and(|t| t.used) {
            out.push(Stmt::Labeled {
                label,
                body: Box::new(body),
            });
        } else {
            out.push(body);
        }
        Ok(())
    }

    /// `loop names = init body`：循环变量声明在包住循环的块里，
    /// 循环体走到末尾时离开循环，只有 `next` 会进入下一轮。
    fn lower_loop(&mut self, id: ExprId, dest: Dest, out: &mut Vec<Stmt>) -> Result<()> {
        let children = self.tree.children(id).to_vec();
        let (head, body) = match children[..] {
            [body] => (None, body),
            [head, body] => (Some(head), body),
            _ => return Err(self.malformed(id, "expected a head and a body")),
        };
        let label = self.fresh_label(JumpKind::Loop);

        let mut block = Vec::new();
        let mut variables = Vec::new();
        if let Some(head) = head {
            let &[targets, init] = self.tree.children(head) else {
                return Err(self.malformed(head, "expected `names = initial values`"));
            };
            variables = self.names_of(targets)?;
            if self.mentions_any(init, &variables) {
                // 初值引用了同名的外层变量，先在外面算好
                let temps: Vec<String> = variables.iter().map(|_| self.fresh_temp()).collect();
                self.lower(init, Dest::Into(temps.clone()), out)?;
                for (name, temp) in variables.iter().zip(temps) {
                    block.push(Stmt::assign(name.clone(), Expr::ident(temp)));
                }
            } else {
                self.lower(init, Dest::Into(variables.clone()), &mut block)?;
            }
        }

        self.jumps.push(JumpTarget {
            kind: JumpKind::Loop,
            label: label.clone(),
            results: dest,
            variables,
            used: false,
        });
        let stmts = self.block_body(body, Dest::Discard);
        self.jumps.pop();
        let mut stmts = stmts?;
        if !stmts.last().is_some_and(Stmt::is_terminal) {
            stmts.push(Stmt::Break(Some(label.clone())));
        }

        let declared: Vec<String> = self
            .tree
            .node(id)
            .decls
            .as_ref()
            .map(|decls| decls.keys().cloned().collect())
            .unwrap_or_default();
        if !declared.is_empty() {
            block.insert(0, Stmt::VarDecl(declared));
        }
        block.push(Stmt::Labeled {
            label,
            body: Box::new(Stmt::While {
                test: Expr::Literal(Literal::Bool(true)),
                body: Box::new(Stmt::Block(stmts)),
            }),
        });

        if block.len() == 1 {
            out.extend(block);
        } else {
            out.push(Stmt::Block(block));
        }
        Ok(())
    }

    fn mentions_any(&self, id: ExprId, names: &[String]) -> bool {
        self.tree.descendants(id).into_iter().any(|node| {
            self.tree.tag_kind(node).is_some() && self.tree.name(node).is_some_and(|n| names.iter().any(|v| v == n))
        })
    }

    fn lower_try(&mut self, id: ExprId, dest: Dest, out: &mut Vec<Stmt>) -> Result<()> {
        let children = self.tree.children(id).to_vec();
        let Some((&protected, clauses)) = children.split_first() else {
            return Err(self.malformed(id, "`try` without a body"));
        };
        let block = self.block_body(protected, dest.clone())?;

        let tree = self.tree;
        let mut handler = None;
        let mut finalizer = None;
        for &clause in clauses {
            match (tree.builtin(clause), tree.children(clause)) {
                (Some(Builtin::Catch), &[param, body]) => {
                    let param = match self.names_of(param)?.as_slice() {
                        [] => None,
                        [name] => Some(name.clone()),
                        _ => return Err(self.malformed(param, "`catch` binds a single name")),
                    };
                    // `catch` 自己是声明宿主，单行的处理体里声明的名字登记在它身上
                    let dest = dest.clone();
                    let body = self.with_host(clause, |cg, out| {
                        let statements = cg.block_body(body, dest)?;
                        out.extend(statements);
                        Ok(())
                    })?;
                    handler = Some(CatchClause { param, body });
                }
                (Some(Builtin::Finally), &[body]) => {
                    finalizer = Some(self.block_body(body, Dest::Discard)?);
                }
                _ => return Err(self.malformed(clause, "expected `catch` or `finally`")),
            }
        }
        out.push(Stmt::Try {
            block,
            handler,
            finalizer,
        });
        Ok(())
    }

    /// 多个值依次写进多个目标。先把每个值都算出来再赋值，`(a, b) = (b, a)` 才是交换。
    fn lower_tuple(&mut self, id: ExprId, dest: Dest, out: &mut Vec<Stmt>) -> Result<()> {
        let elements = self.tree.children(id).to_vec();
        let names = match dest {
            Dest::Discard => {
                for element in elements {
                    self.lower(element, Dest::Discard, out)?;
                }
                return Ok(());
            }
            Dest::Into(names) if names.len() == elements.len() => names,
            _ => return Err(self.malformed(id, "tuple width does not match its destination")),
        };
        if let (&[element], [name]) = (&elements[..], &names[..]) {
            return self.lower(element, Dest::into_name(name.clone()), out);
        }

        let mut values = Vec::with_capacity(elements.len());
        for element in elements {
            let value = self.value(element, out)?;
            values.push(self.spill(value, out));
        }
        for (name, value) in names.into_iter().zip(values) {
            out.push(Stmt::assign(name, value));
        }
        Ok(())
    }

    fn lower_assign(&mut self, id: ExprId, dest: Dest, out: &mut Vec<Stmt>) -> Result<()> {
        let &[target, value] = self.tree.children(id) else {
            return Err(self.malformed(id, "expected a target and a value"));
        };

        if !self.is_single_target(target) {
            return self.lower_multiple_assign(target, value, dest, out);
        }
        let simple = self.tree.tag_kind(target).is_some()
            || matches!(self.tree.builtin(target), Some(Builtin::Var | Builtin::Const));
        if simple && !self.is_expression(value) {
            // `x = if ...`：直接把 x 当作目标
            let name = self
                .names_of(target)?
                .pop()
                .ok_or_else(|| self.malformed(target, "a declaration without a name"))?;
            self.lower(value, Dest::into_name(name.clone()), out)?;
            return match dest {
                Dest::Discard => Ok(()),
                dest => self.emit(id, Expr::ident(name), dest, out),
            };
        }
        let expr = self.build_expression(id, out)?;
        self.emit(id, expr, dest, out)
    }

    /// `(a, b.c) = value`：名字直接作为目标，其它目标经过临时变量。
    fn lower_multiple_assign(&mut self, target: ExprId, value: ExprId, dest: Dest, out: &mut Vec<Stmt>) -> Result<()> {
        let elements = match self.tree.builtin(target) {
            Some(Builtin::Var | Builtin::Const) => match self.tree.child(target, 0) {
                Some(inner) => self.tree.children(inner).to_vec(),
                None => return Err(self.malformed(target, "a declaration without a name")),
            },
            _ => self.tree.children(target).to_vec(),
        };

        let all_names = elements.iter().all(|&e| self.tree.tag_kind(e).is_some());
        let results = if all_names {
            let names = self.names_of(target)?;
            self.lower(value, Dest::Into(names.clone()), out)?;
            names
        } else {
            let temps: Vec<String> = elements.iter().map(|_| self.fresh_temp()).collect();
            self.lower(value, Dest::Into(temps.clone()), out)?;
            for (&element, temp) in elements.iter().zip(&temps) {
                let target = self.target_expr(element, false, out)?;
                out.push(Stmt::Expr(Expr::assign(target, Expr::ident(temp.clone()))));
            }
            temps
        };

        match dest {
            Dest::Discard => Ok(()),
            Dest::Into(names) if names.len() == results.len() => {
                for (name, result) in names.into_iter().zip(results) {
                    out.push(Stmt::assign(name, Expr::ident(result)));
                }
                Ok(())
            }
            _ => Err(self.malformed(target, "tuple width does not match its destination")),
        }
    }

    /// `give`/`end` 离开最近的 `do`/`loop`，`next` 回到最近的 `loop` 开头。
    fn lower_jump(&mut self, id: ExprId, out: &mut Vec<Stmt>) -> Result<()> {
        let builtin = self.tree.builtin(id);
        let operand = self.tree.child(id, 0);
        let index = match builtin {
            Some(Builtin::Next) => self.jumps.iter().rposition(|t| t.kind == JumpKind::Loop),
            _ => self.jumps.len().checked_sub(1),
        };
        let Some(index) = index else { return Err(self.malformed(id, "jump outside of its target")) };
        let (label, results, variables) = {
            let target = &self.jumps[index];
            (target.label.clone(), target.results.clone(), target.variables.clone())
        };

        match builtin {
            Some(Builtin::Give) => {
                if let Some(value) = operand {
                    self.lower(value, results.clone(), out)?;
                }
                if results == Dest::Return {
                    return Ok(());
                }
                out.push(Stmt::Break(Some(label)));
            }
            Some(Builtin::Next) => {
                if let Some(value) = operand {
                    let dest = if variables.is_empty() { Dest::Discard } else { Dest::Into(variables) };
                    self.lower(value, dest, out)?;
                }
                out.push(Stmt::Continue(Some(label)));
            }
            _ => out.push(Stmt::Break(Some(label))),
        }
        self.jumps[index].used = true;
        Ok(())
    }
}
