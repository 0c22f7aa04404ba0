pub mod analyzer;
pub mod codegen;
pub mod combiner;
pub mod diagnostics;
pub mod expr;
pub mod lexer;
pub mod macros;
pub mod parser;
pub mod resolver;
pub mod symbols;
pub mod utils;

use codegen::ast::Program;
use diagnostics::DiagnosticBag;
use expr::{ExprId, ExprTree};
use macros::ExpandOptions;
use symbols::{RootEnv, ScopeArena};
use utils::SourceTable;

/// 一次编译的选项。
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// 是否把内建宏（`#macro`、`#quote`、`@` 等）放进根键作用域
    pub load_prelude: bool,
    /// 宏展开失败时附上宏的说明和调用所在的源码行
    pub trace_macro_failures: bool,
    /// 保留源码文本，用于渲染带源码片段的诊断
    pub keep_source_text: bool,
    /// 缩进里一个制表符算几列；`None` 表示制表符缩进是错误
    pub tab_size: Option<u32>,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            load_prelude: true,
            trace_macro_failures: false,
            keep_source_text: true,
            tab_size: None,
        }
    }
}

/// 一次编译的全部产物。出错时 `program` 为 `None`，树停留在出错的阶段。
#[derive(Debug)]
pub struct Compilation {
    pub sources: SourceTable,
    pub tree: ExprTree,
    pub root: ExprId,
    pub program: Option<Program>,
    pub diagnostics: DiagnosticBag,
    pub source_text: Option<String>,
}

impl Compilation {
    pub fn is_ok(&self) -> bool {
        self.program.is_some() && !self.diagnostics.has_errors()
    }

    pub fn print_diagnostics(&self) -> std::io::Result<()> {
        self.diagnostics.print(&self.sources, self.source_text.as_deref())
    }
}

/// 编译一个源文件。
///
/// 各阶段依次运行：分词与分块、组合、宏展开、变量解析、结果个数检查、代码生成。
/// 某个阶段报告了错误之后，后面的阶段都不再运行。
pub fn compile(name: &str, source: &str, env: &RootEnv, options: &CompileOptions) -> Compilation {
    let mut sources = SourceTable::new();
    let source_id = sources.add_source(name).unwrap_or_default();
    let mut tree = ExprTree::new();
    let mut diagnostics = DiagnosticBag::new();
    let source_text = options.keep_source_text.then(|| source.to_string());

    let lines = lexer::tokenize(source, source_id, options.tab_size, &mut diagnostics);
    let root = parser::parse(lines, source_id, env, &mut tree, &mut diagnostics);
    log::debug!("parsed `{name}` into {} nodes", tree.len());

    let program = run_phases(root, env, &mut tree, &mut diagnostics, options, source_text.as_deref());
    Compilation {
        sources,
        tree,
        root,
        program,
        diagnostics,
        source_text,
    }
}

fn run_phases(
    root: ExprId,
    env: &RootEnv,
    tree: &mut ExprTree,
    diagnostics: &mut DiagnosticBag,
    options: &CompileOptions,
    source_text: Option<&str>,
) -> Option<Program> {
    if diagnostics.has_errors() {
        return None;
    }
    let mut keys = ScopeArena::new(env.root_keys(options.load_prelude));
    combiner::combine(root, env, tree, &mut keys, diagnostics);
    if diagnostics.has_errors() {
        return None;
    }

    let expand_options = ExpandOptions {
        trace_failures: options.trace_macro_failures,
        source_text,
    };
    macros::expand(root, env, tree, diagnostics, expand_options);
    if diagnostics.has_errors() {
        return None;
    }

    resolver::resolve(root, env, tree, diagnostics);
    if diagnostics.has_errors() {
        return None;
    }

    analyzer::check(root, tree, diagnostics);
    if diagnostics.has_errors() {
        return None;
    }

    codegen::generate(root, tree, diagnostics)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::codegen::ast::{Expr, Stmt};
    use crate::macros::CallMacro;
    use crate::symbols::Arity;
    use crate::utils::SourceId;
    use pretty_assertions::assert_eq;
    use std::rc::Rc;

    fn with_print() -> RootEnv {
        RootEnv::standard().with_macro("print", Arity::prefix(1, 1), Rc::new(CallMacro::new("print")))
    }

    #[test]
    fn test_print_compiles_to_a_single_call() {
        let compilation = compile("main.rill", "print 42", &with_print(), &CompileOptions::default());
        assert!(compilation.is_ok(), "{:?}", compilation.diagnostics.codes());
        let program = compilation.program.unwrap();
        let span = program.body[0].span().expect("statement has a source location");
        assert_eq!(compilation.sources.position(span.loc).line, 1);
        assert_eq!(
            program.without_locations().body,
            vec![Stmt::expr(Expr::call(Expr::ident("print"), vec![Expr::number(42.0)]))]
        );
    }

    #[test]
    fn test_stray_close_reports_two_errors() {
        let env = RootEnv::standard();
        let compilation = compile("main.rill", "a (b c))", &env, &CompileOptions::default());
        assert!(compilation.program.is_none());
        assert_eq!(compilation.diagnostics.codes(), vec!["E0101", "E0102"]);

        // 多余的右括号被忽略，树和没有它时一样
        let mut tree = ExprTree::new();
        let mut diagnostics = DiagnosticBag::new();
        let lines = lexer::tokenize("a (b c)", SourceId::default(), None, &mut diagnostics);
        let root = parser::parse(lines, SourceId::default(), &env, &mut tree, &mut diagnostics);
        assert!(diagnostics.is_empty());
        assert_eq!(compilation.tree.sexpr(compilation.root), tree.sexpr(root));
    }

    #[test]
    fn test_later_phases_are_skipped_after_an_error() {
        let compilation = compile("main.rill", "x + 1\ny + 1", &RootEnv::standard(), &CompileOptions::default());
        // 两个未声明的名字都在解析阶段报告，检查阶段没有运行
        assert_eq!(compilation.diagnostics.codes(), vec!["E0200", "E0200"]);
        assert!(compilation.tree.node(compilation.root).result_count.is_none());
    }

    #[test]
    fn test_prelude_can_be_skipped() {
        let options = CompileOptions {
            load_prelude: false,
            ..CompileOptions::default()
        };
        let compilation = compile("main.rill", "@name", &RootEnv::standard(), &options);
        assert!(!compilation.is_ok());
    }
}
