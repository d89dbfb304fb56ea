//! Symbol table and built-ins.
//!
//! A scope is a local [`indexmap::IndexMap`] layer over a parent chain that
//! bottoms out at the root built-in set. `define` only ever writes to the
//! local layer; built-in `property` symbols mutate ambient evaluation-context
//! state through a setter callback rather than being rebound.

use indexmap::IndexMap;

use crate::{ast::Definition, value::Value};

/// The closed block-type enumeration controlling which symbols are valid
/// inside a given block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "camelCase")]
pub enum BlockType {
    Root,
    Group,
    Primitive,
    Builder,
    Csg,
    Definition,
    Path,
    /// A loop body inherits the allowed-symbol set of its enclosing block.
    LoopBody,
}

impl BlockType {
    /// Whether `option` statements are syntactically valid in a block of this
    /// type. Only custom block definitions accept `option`.
    #[must_use]
    pub const fn allows_option(self) -> bool {
        matches!(self, Self::Definition)
    }

    /// Whether `name`/`position`/`orientation` property statements are valid.
    #[must_use]
    pub const fn allows_transform_props(self) -> bool {
        !matches!(self, Self::Root)
    }
}

/// A symbol table entry.
#[derive(Clone)]
pub enum Symbol {
    /// A fixed, never-mutated value such as `pi` or a named color.
    Constant(Value),
    /// A `define`d reusable block body, re-entered fresh on every invocation.
    Block(BlockType, Vec<crate::ast::Statement>, Vec<String>),
    /// A built-in block-valued symbol (primitives, CSG, `group`) identified
    /// by its block type; the evaluator special-cases the name to decide
    /// what scene-assembly behavior to run.
    BuiltinBlock(BlockType),
    /// A built-in command, identified by name; the evaluator special-cases
    /// argument coercion and behavior by name from a closed set (there is no
    /// open extensibility mechanism for adding new commands).
    Command(&'static str),
    /// A built-in property: reads/writes ambient context state (color,
    /// detail, font, opacity, texture, name, position, orientation, size).
    Property(&'static str),
}

impl std::fmt::Debug for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Constant(v) => write!(f, "Constant({v:?})"),
            Self::Block(bt, stmts, params) => write!(f, "Block({bt:?}, {} statements, params={params:?})", stmts.len()),
            Self::BuiltinBlock(bt) => write!(f, "BuiltinBlock({bt:?})"),
            Self::Command(name) => write!(f, "Command({name})"),
            Self::Property(name) => write!(f, "Property({name})"),
        }
    }
}

/// One lexical layer of the symbol table, holding only locally `define`d
/// names. Resolution walks this layer, then `parent`, up to the root.
#[derive(Default, Clone)]
pub struct Scope {
    locals: IndexMap<String, Symbol>,
}

impl Scope {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(&mut self, name: impl Into<String>, symbol: Symbol) {
        self.locals.insert(name.into(), symbol);
    }

    #[must_use]
    pub fn get_local(&self, name: &str) -> Option<&Symbol> {
        self.locals.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.locals.keys().map(String::as_str)
    }
}

/// Converts a `define`d block definition into a [`Symbol::Block`]. Options
/// declared at the top of the body become the block's formal parameter
/// names, in source order, read during the first pass that binds caller
/// arguments to an invocation.
#[must_use]
pub fn block_symbol_from_definition(def: Definition) -> Symbol {
    match def {
        Definition::Block(body) => {
            let params = body
                .iter()
                .filter_map(|s| match &s.kind {
                    crate::ast::StatementKind::Option(name, _) => Some(name.clone()),
                    _ => None,
                })
                .collect();
            Symbol::Block(BlockType::Definition, body, params)
        }
        Definition::Expression(expr) => Symbol::Block(
            BlockType::Definition,
            vec![crate::ast::Statement::new(crate::ast::StatementKind::Expression(expr.clone()), expr.range)],
            Vec::new(),
        ),
    }
}

/// The closed set of built-in block-valued names and their block type.
#[must_use]
pub fn builtin_block_type(name: &str) -> Option<BlockType> {
    match name {
        "cube" | "sphere" | "cylinder" | "cone" => Some(BlockType::Primitive),
        "extrude" | "lathe" | "loft" | "fill" => Some(BlockType::Builder),
        "group" => Some(BlockType::Group),
        "union" | "difference" | "intersection" | "xor" | "stencil" => Some(BlockType::Csg),
        "circle" | "square" | "path" => Some(BlockType::Path),
        "for" | "if" => None, // control flow, not block-valued symbols
        _ => None,
    }
}

/// Built-in commands, identified by name; argument coercion and effects are
/// implemented in [`crate::eval`].
#[must_use]
pub fn is_builtin_command(name: &str) -> bool {
    matches!(name, "print" | "debug")
}

/// The closed set of unary math function names (spec §8 scenario 1: `cos
/// pi`), mirroring `eval::math_function`'s match arms. The parser consults
/// this to let these names take a single juxtaposed argument with no
/// parentheses (`cos pi`), in addition to the usual `cos(pi)` call form.
#[must_use]
pub fn is_math_function(name: &str) -> bool {
    matches!(
        name,
        "sin" | "cos" | "tan" | "asin" | "acos" | "atan" | "sqrt" | "abs" | "round" | "floor" | "ceil" | "exp" | "log"
    )
}

/// Built-in properties: setting one of these mutates the nearest enclosing
/// invocation's ambient state (transform, material, detail, font) rather
/// than binding a local name.
#[must_use]
pub fn is_builtin_property(name: &str) -> bool {
    matches!(
        name,
        "color" | "texture" | "opacity" | "detail" | "font" | "position" | "orientation" | "size" | "name" | "along"
    )
}

/// Named color constants available at the root scope.
#[must_use]
pub fn named_color(name: &str) -> Option<Value> {
    let (r, g, b) = match name {
        "red" => (1.0, 0.0, 0.0),
        "green" => (0.0, 1.0, 0.0),
        "blue" => (0.0, 0.0, 1.0),
        "yellow" => (1.0, 1.0, 0.0),
        "cyan" => (0.0, 1.0, 1.0),
        "magenta" => (1.0, 0.0, 1.0),
        "white" => (1.0, 1.0, 1.0),
        "black" => (0.0, 0.0, 0.0),
        "gray" | "grey" => (0.5, 0.5, 0.5),
        "orange" => (1.0, 0.5, 0.0),
        "clear" => return Some(Value::Color { r: 0.0, g: 0.0, b: 0.0, a: 0.0 }),
        _ => return None,
    };
    Some(Value::Color { r, g, b, a: 1.0 })
}

/// Root-scope constants that aren't colors: `pi`, and the `true`/`false`
/// keyword literals, which are lexed as keywords but resolved like any other
/// identifier constant — see [`crate::parser`].
#[must_use]
pub fn root_constant(name: &str) -> Option<Value> {
    match name {
        "pi" => Some(Value::Number(std::f64::consts::PI)),
        "true" => Some(Value::Boolean(true)),
        "false" => Some(Value::Boolean(false)),
        "half_pi" | "halfpi" => Some(Value::Number(std::f64::consts::FRAC_PI_2)),
        _ => named_color(name),
    }
}

/// All root-scope name candidates, used to build suggestion lists for
/// `unknownSymbol` errors.
#[must_use]
pub fn root_candidate_names() -> Vec<&'static str> {
    let mut names = vec![
        "pi", "true", "false", "red", "green", "blue", "yellow", "cyan", "magenta", "white", "black", "gray", "grey",
        "orange", "clear", "print", "debug", "random", "position", "orientation", "name", "color", "texture",
        "opacity", "detail", "font", "smoothing", "background", "cube", "sphere", "cylinder", "cone", "extrude",
        "lathe", "loft", "fill", "group", "union", "difference", "intersection", "xor", "stencil", "circle", "square",
        "path", "for", "if", "else", "define", "option", "import",
    ];
    names.sort_unstable();
    names.dedup();
    names
}
