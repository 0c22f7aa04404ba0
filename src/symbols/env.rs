// src/symbols/env.rs

use super::{Arity, BlockKind, Builtin, Declaration, Symbol, SymbolKind, TagKind, TokenClass};
use crate::macros::MacroExpander;
use std::collections::HashMap;
use std::rc::Rc;

/// 根环境：内建运算符表、单例符号和前奏。
///
/// 它在编译开始前构造一次，之后只读；每个编译单元都从它的键表派生自己的键作用域。
/// 可以在构造时注册宿主提供的原生宏和全局名字。
#[derive(Debug)]
pub struct RootEnv {
    builtins: HashMap<Builtin, Rc<Symbol>>,
    tags: HashMap<TagKind, Rc<Symbol>>,
    blocks: HashMap<BlockKind, Rc<Symbol>>,
    tokens: HashMap<TokenClass, Rc<Symbol>>,
    value: Rc<Symbol>,
    nothing: Rc<Symbol>,
    keys_with_prelude: Rc<HashMap<String, Rc<Symbol>>>,
    keys_without_prelude: Rc<HashMap<String, Rc<Symbol>>>,
    globals: Rc<HashMap<String, Rc<Declaration>>>,
}

impl RootEnv {
    pub fn standard() -> Self {
        let builtins: HashMap<Builtin, Rc<Symbol>> = Builtin::ALL
            .iter()
            .map(|&b| (b, Rc::new(Symbol::builtin(b))))
            .collect();

        let tags = TagKind::ALL
            .iter()
            .map(|&k| (k, Rc::new(Symbol::new(k.name(), SymbolKind::Tag(k), Arity::NONE, None))))
            .collect();
        let blocks = BlockKind::ALL
            .iter()
            .map(|&k| (k, Rc::new(Symbol::new(k.name(), SymbolKind::Block(k), Arity::sequence(), None))))
            .collect();
        let tokens = TokenClass::ALL
            .iter()
            .map(|&c| {
                let name = format!("<{c:?}>").to_lowercase();
                (c, Rc::new(Symbol::new(name, SymbolKind::Token(c), Arity::NONE, None)))
            })
            .collect();

        let mut without: HashMap<String, Rc<Symbol>> = HashMap::new();
        let mut with: HashMap<String, Rc<Symbol>> = HashMap::new();
        for builtin in Builtin::ALL {
            let Some(symbol) = builtins.get(&builtin) else { continue };
            for spelling in builtin.spellings() {
                with.insert(spelling.to_string(), symbol.clone());
                if !builtin.is_prelude() {
                    without.insert(spelling.to_string(), symbol.clone());
                }
            }
        }
        for literal in ["true", "false", "null"] {
            let symbol = Rc::new(Symbol::new(literal, SymbolKind::Value, Arity::NONE, None));
            with.insert(literal.to_string(), symbol.clone());
            without.insert(literal.to_string(), symbol);
        }

        Self {
            builtins,
            tags,
            blocks,
            tokens,
            value: Rc::new(Symbol::new("<value>", SymbolKind::Value, Arity::NONE, None)),
            nothing: Rc::new(Symbol::new("<none>", SymbolKind::Nothing, Arity::NONE, None)),
            keys_with_prelude: Rc::new(with),
            keys_without_prelude: Rc::new(without),
            globals: Rc::new(HashMap::new()),
        }
    }

    /// 注册一个原生宏。它对所有编译单元可见，不受前奏开关影响。
    pub fn with_macro(mut self, name: &str, arity: Arity, expander: Rc<dyn MacroExpander>) -> Self {
        let symbol = Rc::new(Symbol::native_macro(name, arity, expander));
        Rc::make_mut(&mut self.keys_with_prelude).insert(name.to_string(), symbol.clone());
        Rc::make_mut(&mut self.keys_without_prelude).insert(name.to_string(), symbol);
        self
    }

    /// 注册一个宿主提供的全局名字，解析时视为已声明。
    pub fn with_global(mut self, name: &str) -> Self {
        Rc::make_mut(&mut self.globals).insert(name.to_string(), Rc::new(Declaration::global(name)));
        self
    }

    pub fn builtin(&self, builtin: Builtin) -> Rc<Symbol> {
        match self.builtins.get(&builtin) {
            Some(symbol) => symbol.clone(),
            None => Rc::new(Symbol::builtin(builtin)),
        }
    }

    pub fn tag(&self, kind: TagKind) -> Rc<Symbol> {
        match self.tags.get(&kind) {
            Some(symbol) => symbol.clone(),
            None => Rc::new(Symbol::new(kind.name(), SymbolKind::Tag(kind), Arity::NONE, None)),
        }
    }

    pub fn block(&self, kind: BlockKind) -> Rc<Symbol> {
        match self.blocks.get(&kind) {
            Some(symbol) => symbol.clone(),
            None => Rc::new(Symbol::new(kind.name(), SymbolKind::Block(kind), Arity::sequence(), None)),
        }
    }

    pub fn token(&self, class: TokenClass) -> Rc<Symbol> {
        match self.tokens.get(&class) {
            Some(symbol) => symbol.clone(),
            None => Rc::new(Symbol::new("<token>", SymbolKind::Token(class), Arity::NONE, None)),
        }
    }

    pub fn value(&self) -> Rc<Symbol> {
        self.value.clone()
    }

    pub fn nothing(&self) -> Rc<Symbol> {
        self.nothing.clone()
    }

    /// 一个编译单元的根键表。
    pub fn root_keys(&self, load_prelude: bool) -> Rc<HashMap<String, Rc<Symbol>>> {
        if load_prelude {
            self.keys_with_prelude.clone()
        } else {
            self.keys_without_prelude.clone()
        }
    }

    pub fn globals(&self) -> Rc<HashMap<String, Rc<Declaration>>> {
        self.globals.clone()
    }
}

impl Default for RootEnv {
    fn default() -> Self {
        Self::standard()
    }
}
