// src/main.rs

use clap::Parser;
use rill::macros::CallMacro;
use rill::symbols::{Arity, RootEnv};
use rill::{CompileOptions, compile};
use std::fs;
use std::process;
use std::rc::Rc;

/// rill 源到源编译器：缩进敏感、带卫生宏的语言 → 通用语句/表达式树
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// 需要编译的源文件路径
    input_file: String,

    /// 把输出树写到这个文件，而不是标准输出
    #[arg(short, long)]
    output_file: Option<String>,

    /// 不加载内建宏（`#macro`、`#quote`、`@` 等）
    #[arg(long)]
    no_prelude: bool,

    /// 宏展开失败时附上宏的说明和调用所在的源码行
    #[arg(long)]
    trace_macros: bool,

    /// 缩进里一个制表符算几列；不指定时制表符缩进是错误
    #[arg(long)]
    tab_size: Option<u32>,

    /// 打印编译后的表达式树（s-表达式形式）
    #[arg(long)]
    dump_tree: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();

    let source_code = fs::read_to_string(&cli.input_file)
        .map_err(|e| format!("Failed to read file '{}': {}", cli.input_file, e))?;

    let options = CompileOptions {
        load_prelude: !cli.no_prelude,
        trace_macro_failures: cli.trace_macros,
        keep_source_text: true,
        tab_size: cli.tab_size,
    };
    let env = RootEnv::standard().with_macro("print", Arity::prefix(1, 1), Rc::new(CallMacro::new("print")));

    let compilation = compile(&cli.input_file, &source_code, &env, &options);
    if cli.dump_tree {
        println!("{}", compilation.tree.sexpr(compilation.root));
    }

    let Some(program) = compilation.program.as_ref().filter(|_| compilation.is_ok()) else {
        compilation.print_diagnostics()?;
        eprintln!("Compilation failed with {} error(s).", compilation.diagnostics.len());
        process::exit(1);
    };

    let rendered = format!("{program:#?}");
    match &cli.output_file {
        Some(path) => {
            fs::write(path, rendered)?;
            log::info!("wrote output tree to '{path}'");
        }
        None => println!("{rendered}"),
    }
    Ok(())
}
