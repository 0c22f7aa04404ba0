// src/expr/display.rs

use super::{ExprId, ExprTree, Value};
use crate::symbols::SymbolKind;

impl ExprTree {
    /// 把子树渲染成 s-表达式，例如 `(+ x (* 3 5))`。
    pub fn sexpr(&self, id: ExprId) -> String {
        let mut out = String::new();
        self.write_sexpr(id, &mut out);
        out
    }

    fn write_sexpr(&self, id: ExprId, out: &mut String) {
        let head = self.head(id);
        let children = self.children(id);
        if children.is_empty() {
            out.push_str(&head);
            return;
        }
        out.push('(');
        out.push_str(&head);
        for &child in children {
            out.push(' ');
            self.write_sexpr(child, out);
        }
        out.push(')');
    }

    fn head(&self, id: ExprId) -> String {
        let node = self.node(id);
        match node.symbol.kind() {
            SymbolKind::Builtin(builtin) => builtin.name().to_string(),
            SymbolKind::Block(kind) => kind.name().to_string(),
            SymbolKind::Tag(kind) if kind.is_virtual() => format!("`{}", node.name().unwrap_or("?")),
            _ => match &node.value {
                Some(Value::Number(n)) => n.to_string(),
                Some(Value::Str(s)) => format!("{s:?}"),
                Some(Value::Bool(b)) => b.to_string(),
                Some(Value::Null) => "null".to_string(),
                Some(Value::Name(name)) => name.clone(),
                None => node.symbol.name().to_string(),
            },
        }
    }
}
