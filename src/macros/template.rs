// src/macros/template.rs
//
// 用户用 `#macro NAME PARAMS TEMPLATE` 定义的模板宏。

use super::{Expansion, MacroContext, MacroError, MacroExpander};
use crate::diagnostics::codes::*;
use crate::diagnostics::{Diagnostic, Label};
use crate::expr::{ExprId, ExprTree, Value};
use crate::symbols::{BlockKind, Builtin, RootEnv, Symbol, SymbolKind};
use std::collections::HashMap;
use std::rc::Rc;

const HOLE_PREFIX: &str = "$hole";

/// 一个已经组合好的模板。`#unquote` 洞在定义时换成了占位节点。
#[derive(Debug)]
pub struct TemplateMacro {
    name: String,
    params: Vec<String>,
    /// 模板子树的根，已从定义节点上摘下
    template: ExprId,
    /// 占位名 → 参数下标
    holes: HashMap<String, usize>,
}

impl TemplateMacro {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }

    fn hole_index(&self, tree: &ExprTree, id: ExprId) -> Option<usize> {
        if !matches!(tree.symbol(id).kind(), SymbolKind::Nothing) {
            return None;
        }
        self.holes.get(tree.name(id)?).copied()
    }

    fn arguments(&self, tree: &ExprTree, node: ExprId) -> Result<Vec<ExprId>, MacroError> {
        let operand = tree.child(node, 0);
        let count_error = |found| MacroError::ArgumentCount {
            name: self.name.clone(),
            expected: self.params.len(),
            found,
        };
        match (self.params.len(), operand) {
            (0, None) => Ok(Vec::new()),
            (0, Some(_)) => Err(count_error(1)),
            (_, None) => Err(count_error(0)),
            (1, Some(argument)) => Ok(vec![argument]),
            (expected, Some(argument)) => {
                if !tree.is(argument, Builtin::Tuple) {
                    return Err(count_error(1));
                }
                let arguments = tree.children(argument).to_vec();
                if arguments.len() != expected {
                    return Err(count_error(arguments.len()));
                }
                Ok(arguments)
            }
        }
    }
}

impl MacroExpander for TemplateMacro {
    fn expand(&self, cx: &mut MacroContext<'_>, node: ExprId) -> Result<Expansion, MacroError> {
        let arguments = self.arguments(cx.tree, node)?;
        let origin = cx.tree.node(node).expansion_site();

        let mut root = cx.tree.deep_clone(self.template);
        cx.tree.set_origin_recursive(root, origin);
        for id in cx.tree.descendants(root) {
            let Some(index) = self.hole_index(cx.tree, id) else { continue };
            let replacement = cx.tree.deep_clone(arguments[index]);
            if id == root {
                root = replacement;
            } else {
                cx.tree.replace(id, replacement);
            }
        }
        Ok(Expansion::Replace(root))
    }

    fn describe(&self, tree: &ExprTree) -> Option<String> {
        Some(format!("#macro {} ({}) {}", self.name, self.params.join(", "), tree.sexpr(self.template)))
    }
}

/// 处理一个组合好的 `#macro` 节点，返回宏的名字和符号。
///
/// 模板从定义节点上摘下保存；定义节点本身在展开阶段被删除。
pub fn define(env: &RootEnv, tree: &mut ExprTree, definition: ExprId) -> Result<(String, Rc<Symbol>), Diagnostic> {
    let malformed = |tree: &ExprTree, id: ExprId, message: &str| {
        Diagnostic::error(&E0302_MALFORMED_MACRO_DEFINITION, Label::new(tree.loc(id), message))
    };

    let children = tree.children(definition).to_vec();
    let [name_node, params_node, body] = children[..] else {
        return Err(malformed(tree, definition, "expected `#macro NAME PARAMS TEMPLATE`"));
    };

    let name = match tree.name(name_node) {
        Some(name) if tree.tag_kind(name_node).is_some() || tree.symbol(name_node).is_macro() => name.to_string(),
        _ => return Err(malformed(tree, name_node, "the macro name must be an identifier")),
    };

    let params = if tree.tag_kind(params_node).is_some() {
        vec![tree.name(params_node).unwrap_or_default().to_string()]
    } else if tree.is(params_node, Builtin::Tuple) {
        let mut params = Vec::new();
        for &param in tree.children(params_node) {
            match (tree.tag_kind(param), tree.name(param)) {
                (Some(_), Some(name)) => params.push(name.to_string()),
                _ => return Err(malformed(tree, param, "macro parameters must be identifiers")),
            }
        }
        params
    } else {
        return Err(malformed(tree, params_node, "expected a parameter name or a parenthesised list"));
    };

    let mut template = body;
    if tree.is(template, Builtin::Quote) {
        template = tree
            .child(template, 0)
            .ok_or_else(|| malformed(tree, body, "`#quote` needs an operand"))?;
    }
    // 只有一行的缩进块直接用那一行
    if tree.symbol(template).as_block() == Some(BlockKind::Block) && tree.children(template).len() == 1 {
        template = tree.children(template)[0];
    }
    tree.detach(template);

    let mut holes = HashMap::new();
    for id in tree.descendants(template) {
        if !tree.is(id, Builtin::Unquote) {
            continue;
        }
        let operand = tree.child(id, 0).and_then(|c| tree.name(c));
        let Some(index) = operand.and_then(|p| params.iter().position(|q| q == p)) else {
            return Err(malformed(tree, id, "`#unquote` must name a parameter of this macro"));
        };
        let placeholder = format!("{HOLE_PREFIX}{}", holes.len());
        tree.take_children(id);
        let node = tree.node_mut(id);
        node.symbol = env.nothing();
        node.value = Some(Value::Name(placeholder.clone()));
        holes.insert(placeholder, index);
    }

    let expander = TemplateMacro {
        name: name.clone(),
        params,
        template,
        holes,
    };
    let arity = expander.params.len();
    let symbol = Rc::new(Symbol::user_macro(name.clone(), arity, Rc::new(expander)));
    Ok((name, symbol))
}
