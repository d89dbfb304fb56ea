//! Tree-walking evaluator.
//!
//! Walks statements in source order, pushing a stack of evaluation contexts
//! (`Frame`s) as it enters blocks, loop iterations, and `if`/`else`
//! branches. Two kinds of frame exist:
//!
//! - **Invocation** frames (named block/definition invocations, and the
//!   root) own a local transform, material, detail/font state, and an
//!   aggregation boundary: their `children` become a single returned value.
//! - **Transparent** frames (`for`/`if` bodies) exist only for scope and RNG
//!   isolation; their `children` are merged straight into the enclosing
//!   frame on exit, and property writes bypass them to mutate the nearest
//!   Invocation ancestor directly, so that e.g. `if true { color red }`
//!   still recolors geometry added after the `if` exits.

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use rand_chacha::rand_core::SeedableRng;

use crate::{
    ast::{Definition, Expression, ExpressionKind, InfixOp, PrefixOp, Statement, StatementKind},
    delegate::{BuildArgs, Delegate, GeometryBuilder, GeometryTag, Material, Scene, Transform},
    diagnostics::{self, Error, ErrorKind, RuntimeErrorKind},
    resource::{ResourceError, ResourceTracker},
    source_range::SourceRange,
    symbols::{self, BlockType, Scope, Symbol, block_symbol_from_definition},
    value::{Geometry, Type, Value},
};

/// Evaluation-time knobs.
pub struct EvalOptions<'a> {
    pub max_recursion_depth: usize,
    pub cancel: Option<Box<dyn FnMut() -> bool + 'a>>,
    /// Overrides the root RNG seed (zero by default); exposed for
    /// deterministic test fixtures.
    pub rng_seed: u64,
}

impl Default for EvalOptions<'_> {
    fn default() -> Self {
        Self {
            max_recursion_depth: crate::resource::DEFAULT_MAX_RECURSION_DEPTH,
            cancel: None,
            rng_seed: 0,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum FrameKind {
    Invocation,
    Transparent,
}

struct Frame {
    kind: FrameKind,
    block_type: BlockType,
    scope: Scope,
    rng: ChaCha8Rng,
    children: Vec<Value>,
    transform: Transform,
    parent_cumulative: Transform,
    material: Material,
    detail: u32,
    font: String,
    size: Option<(f64, f64, f64)>,
    name: Option<String>,
    along: Option<Value>,
}

impl Frame {
    fn root(seed: u64) -> Self {
        Self {
            kind: FrameKind::Invocation,
            block_type: BlockType::Root,
            scope: Scope::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            children: Vec::new(),
            transform: Transform::default(),
            parent_cumulative: Transform::default(),
            material: Material::default(),
            detail: 16,
            font: "Helvetica".to_owned(),
            size: None,
            name: None,
            along: None,
        }
    }

    fn cumulative(&self) -> Transform {
        self.parent_cumulative.compose(&self.transform)
    }
}

pub struct Evaluator<'a> {
    frames: Vec<Frame>,
    resources: ResourceTracker<'a>,
    delegate: &'a mut dyn Delegate,
    geometry: &'a mut dyn GeometryBuilder,
    import_cache: std::collections::HashMap<String, std::rc::Rc<Vec<Statement>>>,
    base_url: Option<String>,
}

impl<'a> Evaluator<'a> {
    #[must_use]
    pub fn new(delegate: &'a mut dyn Delegate, geometry: &'a mut dyn GeometryBuilder, options: EvalOptions<'a>, base_url: Option<String>) -> Self {
        Self {
            frames: vec![Frame::root(options.rng_seed)],
            resources: ResourceTracker::new(options.max_recursion_depth, options.cancel),
            delegate,
            geometry,
            import_cache: std::collections::HashMap::new(),
            base_url,
        }
    }

    pub fn evaluate(&mut self, statements: &[Statement]) -> Result<Scene, Error> {
        self.eval_statements(statements)?;
        let children = std::mem::take(&mut self.frames[0].children);
        Ok(Scene { children })
    }

    fn resource_err(&self, err: ResourceError, range: SourceRange) -> Error {
        let message = match err {
            ResourceError::Recursion { .. } => "Too much recursion".to_owned(),
            ResourceError::Cancelled => "Cancelled".to_owned(),
        };
        Error::new(ErrorKind::Runtime(RuntimeErrorKind::AssertionFailure { message }), range)
    }

    fn push_frame(&mut self, block_type: BlockType, kind: FrameKind, range: SourceRange) -> Result<(), Error> {
        self.resources.enter().map_err(|e| self.resource_err(e, range))?;
        let top = self.frames.last().expect("root frame always present");
        let rng = top.rng.clone();
        let inv_idx = self.nearest_invocation_index();
        let inv = &self.frames[inv_idx];
        let (material, detail, font) = (inv.material.clone(), inv.detail, inv.font.clone());
        let parent_cumulative = match kind {
            FrameKind::Invocation => inv.cumulative(),
            FrameKind::Transparent => inv.parent_cumulative,
        };
        let transform = match kind {
            FrameKind::Invocation => Transform::default(),
            FrameKind::Transparent => inv.transform,
        };
        self.frames.push(Frame {
            kind,
            block_type,
            scope: Scope::new(),
            rng,
            children: Vec::new(),
            transform,
            parent_cumulative,
            material,
            detail,
            font,
            size: None,
            name: None,
            along: None,
        });
        Ok(())
    }

    fn pop_frame(&mut self) -> Frame {
        self.resources.leave();
        let popped = self.frames.pop().expect("frame pushed before pop");
        let write_back_rng = popped.kind == FrameKind::Transparent || popped.block_type != BlockType::Definition;
        if write_back_rng {
            self.frames.last_mut().expect("root frame always present").rng = popped.rng.clone();
        }
        if popped.kind == FrameKind::Transparent {
            self.frames.last_mut().expect("root frame always present").children.extend(popped.children.clone());
        }
        popped
    }

    fn nearest_invocation_index(&self) -> usize {
        self.frames
            .iter()
            .rposition(|f| f.kind == FrameKind::Invocation)
            .expect("root frame is always an invocation frame")
    }

    fn nearest_invocation_mut(&mut self) -> &mut Frame {
        let idx = self.nearest_invocation_index();
        &mut self.frames[idx]
    }

    fn check_cancelled(&mut self, range: SourceRange) -> Result<(), Error> {
        self.resources.check_cancelled().map_err(|e| self.resource_err(e, range))
    }

    // ---- statement execution --------------------------------------------

    fn eval_statements(&mut self, statements: &[Statement]) -> Result<(), Error> {
        for stmt in statements {
            self.check_cancelled(stmt.range)?;
            self.eval_statement(stmt)?;
        }
        Ok(())
    }

    fn eval_statement(&mut self, stmt: &Statement) -> Result<(), Error> {
        match &stmt.kind {
            StatementKind::Command(name, args) => self.eval_command(name, args, stmt.range),
            StatementKind::Expression(expr) => {
                let value = self.eval_expr(expr)?;
                self.consume_value(value, expr.range)
            }
            StatementKind::Define(name, definition) => {
                let symbol = self.eval_define(definition.clone())?;
                self.frames.last_mut().expect("frame").scope.define(name.clone(), symbol);
                Ok(())
            }
            StatementKind::Option(name, default_expr) => {
                // Only meaningful during the binding pass of a definition
                // invocation (see `invoke_definition`); as a plain statement
                // outside that context it just installs the default.
                if self.frames.last().expect("frame").scope.get_local(name).is_none() {
                    let value = self.eval_expr(default_expr)?;
                    self.frames.last_mut().expect("frame").scope.define(name.clone(), Symbol::Constant(value));
                }
                Ok(())
            }
            StatementKind::ForLoop { index, sequence, body } => self.eval_for(index.as_deref(), sequence, body, stmt.range),
            StatementKind::IfElse { condition, body, else_branch } => self.eval_if(condition, body, else_branch.as_deref(), stmt.range),
            StatementKind::Import(expr) => self.eval_import(expr),
            StatementKind::Block(body) => {
                self.push_frame(self.frames.last().expect("frame").block_type, FrameKind::Transparent, stmt.range)?;
                let result = self.eval_statements(body);
                self.pop_frame();
                result
            }
        }
    }

    fn eval_define(&mut self, definition: Definition) -> Result<Symbol, Error> {
        match definition {
            Definition::Expression(expr) => {
                let value = self.eval_expr(&expr)?;
                Ok(Symbol::Constant(value))
            }
            block => Ok(block_symbol_from_definition(block)),
        }
    }

    fn eval_for(&mut self, index: Option<&str>, sequence: &Expression, body: &[Statement], range: SourceRange) -> Result<(), Error> {
        let seq = self.eval_expr(sequence)?;
        let elements: Vec<Value> = match seq {
            Value::Range(r) => (0..r.iteration_count()).map(|i| Value::Number(r.nth(i))).collect(),
            Value::Tuple(items) => items,
            other => {
                return Err(Error::new(
                    ErrorKind::Runtime(RuntimeErrorKind::TypeMismatch {
                        context: "for loop".to_owned(),
                        index: None,
                        expected: "range or tuple".to_owned(),
                        got: other.ty().to_string(),
                    }),
                    sequence.range,
                ));
            }
        };
        for element in elements {
            self.check_cancelled(range)?;
            self.push_frame(self.frames.last().expect("frame").block_type, FrameKind::Transparent, range)?;
            if let Some(name) = index {
                self.frames.last_mut().expect("frame").scope.define(name.to_owned(), Symbol::Constant(element));
            }
            let result = self.eval_statements(body);
            self.pop_frame();
            result?;
        }
        Ok(())
    }

    fn eval_if(&mut self, condition: &Expression, body: &[Statement], else_branch: Option<&[Statement]>, range: SourceRange) -> Result<(), Error> {
        let cond = self.eval_expr(condition)?;
        let taken = cond.as_boolean(condition.range)?;
        self.push_frame(self.frames.last().expect("frame").block_type, FrameKind::Transparent, range)?;
        let result = if taken {
            self.eval_statements(body)
        } else if let Some(else_body) = else_branch {
            self.eval_statements(else_body)
        } else {
            Ok(())
        };
        self.pop_frame();
        result
    }

    fn eval_import(&mut self, expr: &Expression) -> Result<(), Error> {
        let value = self.eval_expr(expr)?;
        let Value::String(path) = value else {
            return Err(Error::new(
                ErrorKind::Runtime(RuntimeErrorKind::TypeMismatch {
                    context: "import".to_owned(),
                    index: None,
                    expected: Type::String.to_string(),
                    got: value.ty().to_string(),
                }),
                expr.range,
            ));
        };
        let url = self
            .delegate
            .resolve_url(&path, self.base_url.as_deref())
            .map_err(|message| Error::new(ErrorKind::Runtime(RuntimeErrorKind::ImportError { path: path.clone(), message }), expr.range))?;

        let child_value = if url.ends_with(".shape") {
            let statements = if let Some(cached) = self.import_cache.get(&url) {
                cached.clone()
            } else {
                let source = self
                    .delegate
                    .read_source(&url)
                    .map_err(|message| Error::new(ErrorKind::Runtime(RuntimeErrorKind::ImportError { path: url.clone(), message }), expr.range))?
                    .ok_or_else(|| Error::new(ErrorKind::Runtime(RuntimeErrorKind::FileNotFound { path: url.clone() }), expr.range))?;
                let parsed = crate::parser::parse(&source).map_err(|inner| {
                    Error::new(
                        ErrorKind::Runtime(RuntimeErrorKind::ImportError { path: url.clone(), message: inner.message() }),
                        expr.range,
                    )
                })?;
                let rc = std::rc::Rc::new(parsed);
                self.import_cache.insert(url.clone(), rc.clone());
                rc
            };
            let saved_base = self.base_url.replace(url.clone());
            self.push_frame(BlockType::Root, FrameKind::Invocation, expr.range)?;
            let result = self.eval_statements(&statements);
            let frame = self.pop_frame_raw();
            self.base_url = saved_base;
            result?;
            match frame.children.len() {
                0 => None,
                1 => Some(frame.children.into_iter().next().unwrap()),
                _ => Some(Value::Tuple(frame.children)),
            }
        } else {
            let geometry = self
                .delegate
                .import_geometry(&url)
                .map_err(|message| Error::new(ErrorKind::Runtime(RuntimeErrorKind::ImportError { path: url.clone(), message }), expr.range))?;
            Some(Value::Mesh(geometry))
        };
        if let Some(v) = child_value {
            self.consume_value(v, expr.range)?;
        }
        Ok(())
    }

    /// Like `pop_frame`, but used for import's nested root context, which
    /// never merges children into the importing scope automatically (the
    /// caller decides how to consume the aggregated result).
    fn pop_frame_raw(&mut self) -> Frame {
        self.resources.leave();
        let popped = self.frames.pop().expect("frame pushed before pop");
        self.frames.last_mut().expect("root frame always present").rng = popped.rng.clone();
        popped
    }

    // ---- value consumption / scene assembly ------------------------------

    fn consume_value(&mut self, value: Value, range: SourceRange) -> Result<(), Error> {
        match value {
            Value::Tuple(items) => {
                for item in items {
                    self.consume_value(item, range)?;
                }
                Ok(())
            }
            other => {
                let block_type = self.frames.last().expect("frame").block_type;
                if accepts_child(block_type, &other) {
                    self.frames.last_mut().expect("frame").children.push(other);
                    Ok(())
                } else {
                    Err(Error::new(ErrorKind::Runtime(RuntimeErrorKind::UnusedValue { of: other.ty().to_string() }), range))
                }
            }
        }
    }

    // ---- commands ---------------------------------------------------------

    fn eval_command(&mut self, name: &str, args: &[Expression], range: SourceRange) -> Result<(), Error> {
        if name == "print" {
            let values = self.eval_args_flattened(args)?;
            self.delegate.debug_log(&values);
            return Ok(());
        }
        if name == "debug" {
            let values = self.eval_args_flattened(args)?;
            self.delegate.debug_log(&values);
            return Ok(());
        }
        if symbols::is_builtin_property(name) {
            return self.eval_property(name, args, range);
        }
        // A user-defined block/constant, or a built-in block invoked without
        // a trailing brace (e.g. a bare `cube` with default parameters).
        if let Some(symbol) = self.resolve_local(name) {
            return match symbol {
                Symbol::Block(block_type, body, params) => {
                    let call_args = self.eval_args_flattened(args)?;
                    let value = self.invoke_block(block_type, &body, &params, call_args, range)?;
                    self.consume_value(value, range)
                }
                Symbol::Constant(_) | Symbol::Command(_) | Symbol::Property(_) | Symbol::BuiltinBlock(_) => {
                    // Not invocable as a bare command; treat name as an
                    // expression statement instead.
                    let value = self.eval_identifier(name, range)?;
                    self.consume_value(value, range)
                }
            };
        }
        if let Some(block_type) = symbols::builtin_block_type(name) {
            let call_args = self.eval_args_flattened(args)?;
            let value = self.invoke_builtin(name, block_type, &[], call_args, range)?;
            return self.consume_value(value, range);
        }
        Err(self.unknown_symbol(name, range))
    }

    fn eval_property(&mut self, name: &str, args: &[Expression], range: SourceRange) -> Result<(), Error> {
        let values = self.eval_args_flattened(args)?;
        if values.is_empty() {
            return Err(Error::new(
                ErrorKind::Runtime(RuntimeErrorKind::MissingArgument {
                    command: name.to_owned(),
                    index: 0,
                    expected: property_type(name).to_string(),
                }),
                range,
            ));
        }
        match name {
            "color" => {
                let v = Value::coerce(&values, Type::Color, "color", range)?;
                self.nearest_invocation_mut().material.color = v;
            }
            "texture" => {
                let Value::String(s) = &values[0] else {
                    return Err(type_mismatch("texture", Type::String, &values[0], range));
                };
                self.nearest_invocation_mut().material.texture = Some(Value::Texture(crate::value::Texture { name: s.clone(), url: None }));
            }
            "opacity" => {
                let v = Value::coerce(&values, Type::Number, "opacity", range)?;
                if let Value::Number(n) = v {
                    self.nearest_invocation_mut().material.opacity = n.clamp(0.0, 1.0);
                }
            }
            "detail" => {
                let v = Value::coerce(&values, Type::Number, "detail", range)?;
                if let Value::Number(n) = v {
                    self.nearest_invocation_mut().detail = n.max(1.0) as u32;
                }
            }
            "font" => {
                let Value::String(s) = &values[0] else {
                    return Err(type_mismatch("font", Type::String, &values[0], range));
                };
                self.nearest_invocation_mut().font = s.clone();
            }
            "position" => {
                let v = Value::coerce(&values, Type::Vector, "position", range)?;
                if let Value::Vector { x, y, z } = v {
                    self.nearest_invocation_mut().transform.position = (x, y, z);
                }
            }
            "orientation" => {
                let v = Value::coerce(&values, Type::Rotation, "orientation", range)?;
                if let Value::Rotation { roll, pitch, yaw } = v {
                    self.nearest_invocation_mut().transform.orientation = (roll, pitch, yaw);
                }
            }
            "size" => {
                let v = Value::coerce(&values, Type::Size, "size", range)?;
                if let Value::Size { w, h, d } = v {
                    self.nearest_invocation_mut().size = Some((w, h, d));
                }
            }
            "name" => {
                let Value::String(s) = &values[0] else {
                    return Err(type_mismatch("name", Type::String, &values[0], range));
                };
                self.nearest_invocation_mut().name = Some(s.clone());
            }
            "along" => {
                self.nearest_invocation_mut().along = Some(values[0].clone());
            }
            _ => unreachable!("is_builtin_property gate"),
        }
        Ok(())
    }

    fn eval_args_flattened(&mut self, args: &[Expression]) -> Result<Vec<Value>, Error> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval_expr(arg)?);
        }
        Ok(Value::flatten(values))
    }

    // ---- block invocation ---------------------------------------------

    fn invoke_block(&mut self, block_type: BlockType, body: &[Statement], params: &[String], call_args: Vec<Value>, range: SourceRange) -> Result<Value, Error> {
        self.push_frame(block_type, FrameKind::Invocation, range)?;

        // First pass: bind `option` statements from caller arguments.
        let mut remaining = call_args;
        if block_type == BlockType::Definition {
            for stmt in body {
                if let StatementKind::Option(name, default_expr) = &stmt.kind {
                    let value = if remaining.is_empty() {
                        self.eval_expr(default_expr)?
                    } else {
                        remaining.remove(0)
                    };
                    self.frames.last_mut().expect("frame").scope.define(name.clone(), Symbol::Constant(value));
                }
            }
            if !remaining.is_empty() {
                self.pop_frame();
                let name_for_error = "block".to_owned();
                return Err(Error::new(
                    ErrorKind::Runtime(RuntimeErrorKind::UnexpectedArgument { command: name_for_error, max: params.len() }),
                    range,
                ));
            }
        }

        // Second pass: run every non-`option` statement.
        let run: Result<(), Error> = (|| {
            for stmt in body {
                if matches!(stmt.kind, StatementKind::Option(..)) {
                    continue;
                }
                self.eval_statement(stmt)?;
            }
            Ok(())
        })();

        let frame = self.pop_frame();
        run?;

        self.aggregate(block_type, frame, range)
    }

    /// Aggregates a non-builtin frame's children into its returned value:
    /// `Root`/`Definition` pass values through untouched, `Group` collapses
    /// a single child or hands multiple children to the geometry builder
    /// under the generic `Mesh` tag (there is no dedicated "group" tag).
    fn aggregate(&mut self, block_type: BlockType, frame: Frame, range: SourceRange) -> Result<Value, Error> {
        match block_type {
            BlockType::Root | BlockType::Definition => Ok(wrap_children(frame.children)),
            BlockType::Group => match frame.children.len() {
                0 => Ok(Value::Tuple(Vec::new())),
                1 => Ok(frame.children.into_iter().next().unwrap()),
                _ => self.build_named("group", GeometryTag::Mesh, block_type, frame, range),
            },
            BlockType::Csg | BlockType::Primitive | BlockType::Builder | BlockType::Path => {
                unreachable!("builtin block types are aggregated through build_named")
            }
            BlockType::LoopBody => unreachable!("loop bodies are transparent frames, never aggregated"),
        }
    }

    /// Builds the geometry for a builtin block (primitive/builder/csg/path/
    /// group), dispatching the geometry tag from the literal builtin name
    /// rather than only the coarse block type, so e.g. `sphere` and `cube`
    /// (both `Primitive`) produce distinct tags.
    fn build_named(&mut self, name: &str, tag: GeometryTag, block_type: BlockType, frame: Frame, range: SourceRange) -> Result<Value, Error> {
        let cumulative = frame.parent_cumulative.compose(&frame.transform);
        let paths = if matches!(block_type, BlockType::Builder | BlockType::Path) {
            path_handles(&frame.children, range)?
        } else {
            Vec::new()
        };
        let children = if block_type == BlockType::Csg || (block_type == BlockType::Group && name == "group") {
            mesh_handles(&frame.children, range)?
        } else {
            Vec::new()
        };
        let along = match &frame.along {
            Some(Value::Path(p)) => Some(p.clone()),
            _ => None,
        };
        let default_size = if block_type == BlockType::Primitive { Some((1.0, 1.0, 1.0)) } else { None };
        let geom = self
            .geometry
            .build(BuildArgs {
                tag,
                paths,
                children,
                transform: cumulative,
                material: frame.material,
                segments: Some(frame.detail),
                size: frame.size.or(default_size),
                along,
            })
            .map_err(|message| builder_error(message, range))?;
        if block_type == BlockType::Path {
            Ok(Value::Path(geom))
        } else {
            Ok(Value::Mesh(geom))
        }
    }

    fn geometry_tag_for(name: &str) -> GeometryTag {
        match name {
            "sphere" => GeometryTag::Sphere,
            "cylinder" => GeometryTag::Cylinder,
            "cone" => GeometryTag::Cone,
            "lathe" => GeometryTag::Lathe,
            "loft" => GeometryTag::Loft,
            "fill" => GeometryTag::Fill,
            "union" => GeometryTag::Union,
            "difference" => GeometryTag::Difference,
            "intersection" => GeometryTag::Intersection,
            "xor" => GeometryTag::Xor,
            "stencil" => GeometryTag::Stencil,
            "circle" | "square" | "path" => GeometryTag::Path,
            "extrude" => GeometryTag::Extrude,
            _ => GeometryTag::Cube,
        }
    }

    /// Invokes a builtin block (primitive/builder/csg/group/path), whether
    /// called bare (`cube 2 3 4`) or with a trailing brace body. Bare
    /// numeric arguments bind the primitive/path `size`; a brace body is
    /// evaluated for its property statements and nested children.
    fn invoke_builtin(&mut self, name: &str, block_type: BlockType, body: &[Statement], call_args: Vec<Value>, range: SourceRange) -> Result<Value, Error> {
        self.push_frame(block_type, FrameKind::Invocation, range)?;
        if !call_args.is_empty() && matches!(block_type, BlockType::Primitive | BlockType::Path) {
            let size = Value::coerce(&call_args, Type::Size, name, range)?;
            if let Value::Size { w, h, d } = size {
                self.frames.last_mut().expect("frame").size = Some((w, h, d));
            }
        }
        let run = self.eval_statements(body);
        let frame = self.pop_frame();
        run?;
        if block_type == BlockType::Group && name == "group" {
            return self.aggregate(BlockType::Group, frame, range);
        }
        let tag = Self::geometry_tag_for(name);
        self.build_named(name, tag, block_type, frame, range)
    }

    fn unknown_symbol(&self, name: &str, range: SourceRange) -> Error {
        let mut candidates: Vec<&str> = symbols::root_candidate_names();
        for frame in &self.frames {
            candidates.extend(frame.scope.names());
        }
        let suggestion = diagnostics::suggest(name, candidates);
        let mut err = Error::new(ErrorKind::Runtime(RuntimeErrorKind::UnknownSymbol { name: name.to_owned() }), range);
        if let Some(s) = suggestion {
            err = err.with_suggestion(s);
        }
        err
    }

    fn resolve_local(&self, name: &str) -> Option<Symbol> {
        for frame in self.frames.iter().rev() {
            if let Some(symbol) = frame.scope.get_local(name) {
                return Some(symbol.clone());
            }
        }
        None
    }

    fn eval_identifier(&mut self, name: &str, range: SourceRange) -> Result<Value, Error> {
        if name == "random" {
            return Ok(Value::Number(self.next_random(0.0, 1.0)));
        }
        if let Some(symbol) = self.resolve_local(name) {
            return match symbol {
                Symbol::Constant(v) => Ok(v),
                Symbol::Block(block_type, body, params) => self.invoke_block(block_type, &body, &params, Vec::new(), range),
                Symbol::BuiltinBlock(block_type) => self.invoke_block(block_type, &[], &[], Vec::new(), range),
                Symbol::Command(_) | Symbol::Property(_) => Err(self.unknown_symbol(name, range)),
            };
        }
        if let Some(v) = symbols::root_constant(name) {
            return Ok(v);
        }
        if let Some(block_type) = symbols::builtin_block_type(name) {
            return self.invoke_block(block_type, &[], &[], Vec::new(), range);
        }
        Err(self.unknown_symbol(name, range))
    }

    /// Draws a deterministic random number in `[lo, hi)` from the *current*
    /// (innermost) frame's RNG, regardless of whether that frame is
    /// `Invocation` or `Transparent` — every pushed frame clones its rng from
    /// its parent at push time and writes the resulting state back on pop
    /// (spec §5 "each block/loop iteration borrows the RNG from its parent
    /// and writes the final state back on exit"), so drawing from the
    /// innermost frame and relying on `pop_frame`'s write-back is equivalent
    /// to drawing directly from the ancestor chain.
    fn next_random(&mut self, lo: f64, hi: f64) -> f64 {
        let frame = self.frames.last_mut().expect("frame");
        lo + frame.rng.r#gen::<f64>() * (hi - lo)
    }

    // ---- expressions ------------------------------------------------------

    fn eval_expr(&mut self, expr: &Expression) -> Result<Value, Error> {
        match &expr.kind {
            ExpressionKind::Number(n) => Ok(Value::Number(*n)),
            ExpressionKind::String(s) => Ok(Value::String(s.clone())),
            ExpressionKind::HexColor(hex) => parse_hex_color(hex, expr.range),
            ExpressionKind::Identifier(name) => self.eval_identifier(name, expr.range),
            ExpressionKind::Tuple(parts) => {
                let mut values = Vec::with_capacity(parts.len());
                for p in parts {
                    values.push(self.eval_expr(p)?);
                }
                Ok(Value::Tuple(Value::flatten(values)))
            }
            ExpressionKind::Prefix(op, operand) => self.eval_prefix(*op, operand),
            ExpressionKind::Infix(lhs, op, rhs) => self.eval_infix(lhs, *op, rhs, expr.range),
            ExpressionKind::Member(base, name) => {
                let v = self.eval_expr(base)?;
                v.member(name, expr.range)
            }
            ExpressionKind::Range { from, to, step } => self.eval_range(from, to, step.as_deref(), expr.range),
            ExpressionKind::StepOverride(base, step) => self.eval_step_override(base, step, expr.range),
            ExpressionKind::Block(name, body) => self.eval_named_block(name, body, expr.range),
            ExpressionKind::Call(name, args) => self.eval_call(name, args, expr.range),
        }
    }

    /// Evaluates `name(args)`: either one of a closed set of unary math
    /// functions, or an invocation of a `define`d symbol by name (spec §9
    /// "function call expressions").
    fn eval_call(&mut self, name: &str, args: &[Expression], range: SourceRange) -> Result<Value, Error> {
        if name == "random" {
            return match args.len() {
                0 => Ok(Value::Number(self.next_random(0.0, 1.0))),
                2 => {
                    let lo = self.expect_number(&args[0])?;
                    let hi = self.expect_number(&args[1])?;
                    Ok(Value::Number(self.next_random(lo, hi)))
                }
                n => Err(Error::new(ErrorKind::Runtime(RuntimeErrorKind::UnexpectedArgument { command: name.to_owned(), max: 2 }), range).with_hint(format!("random takes 0 or 2 arguments, got {n}."))),
            };
        }
        if let Some(op) = math_function(name) {
            if args.len() != 1 {
                return Err(Error::new(
                    ErrorKind::Runtime(RuntimeErrorKind::UnexpectedArgument { command: name.to_owned(), max: 1 }),
                    range,
                ));
            }
            let v = self.eval_expr(&args[0])?;
            return numeric_unary(&v, op, range);
        }
        if let Some(symbol) = self.resolve_local(name) {
            return match symbol {
                Symbol::Block(block_type, body, params) => {
                    let call_args = self.eval_args_flattened(args)?;
                    self.invoke_block(block_type, &body, &params, call_args, range)
                }
                _ => Err(self.unknown_symbol(name, range)),
            };
        }
        if let Some(block_type) = symbols::builtin_block_type(name) {
            let call_args = self.eval_args_flattened(args)?;
            return self.invoke_builtin(name, block_type, &[], call_args, range);
        }
        Err(self.unknown_symbol(name, range))
    }

    fn eval_named_block(&mut self, name: &str, body: &[Statement], range: SourceRange) -> Result<Value, Error> {
        if let Some(symbol) = self.resolve_local(name) {
            return match symbol {
                Symbol::Block(block_type, def_body, params) => self.invoke_block(block_type, &def_body, &params, Vec::new(), range),
                _ => Err(self.unknown_symbol(name, range)),
            };
        }
        let Some(block_type) = symbols::builtin_block_type(name) else {
            return Err(self.unknown_symbol(name, range));
        };
        self.invoke_builtin(name, block_type, body, Vec::new(), range)
    }

    fn eval_prefix(&mut self, op: PrefixOp, operand: &Expression) -> Result<Value, Error> {
        let v = self.eval_expr(operand)?;
        match op {
            PrefixOp::Not => Ok(Value::Boolean(!v.as_boolean(operand.range)?)),
            PrefixOp::Plus => numeric_unary(&v, |n| n, operand.range),
            PrefixOp::Negate => numeric_unary(&v, |n| -n, operand.range),
        }
    }

    fn eval_infix(&mut self, lhs: &Expression, op: InfixOp, rhs: &Expression, range: SourceRange) -> Result<Value, Error> {
        // `and`/`or` short-circuit.
        if matches!(op, InfixOp::And) {
            let l = self.eval_expr(lhs)?.as_boolean(lhs.range)?;
            if !l {
                return Ok(Value::Boolean(false));
            }
            return Ok(Value::Boolean(self.eval_expr(rhs)?.as_boolean(rhs.range)?));
        }
        if matches!(op, InfixOp::Or) {
            let l = self.eval_expr(lhs)?.as_boolean(lhs.range)?;
            if l {
                return Ok(Value::Boolean(true));
            }
            return Ok(Value::Boolean(self.eval_expr(rhs)?.as_boolean(rhs.range)?));
        }
        let l = self.eval_expr(lhs)?;
        let r = self.eval_expr(rhs)?;
        match op {
            InfixOp::Add => numeric_binary(&l, &r, |a, b| a + b, range),
            InfixOp::Subtract => numeric_binary(&l, &r, |a, b| a - b, range),
            InfixOp::Multiply => numeric_binary(&l, &r, |a, b| a * b, range),
            InfixOp::Divide => numeric_binary(&l, &r, |a, b| a / b, range),
            InfixOp::Equal => Ok(eval_equality(l, r, false)),
            InfixOp::NotEqual => Ok(eval_equality(l, r, true)),
            InfixOp::Less | InfixOp::LessEqual | InfixOp::Greater | InfixOp::GreaterEqual => {
                let (Value::Number(a), Value::Number(b)) = (&l, &r) else {
                    return Err(Error::new(
                        ErrorKind::Runtime(RuntimeErrorKind::TypeMismatch {
                            context: "comparison".to_owned(),
                            index: None,
                            expected: Type::Number.to_string(),
                            got: if matches!(l, Value::Number(_)) { r.ty().to_string() } else { l.ty().to_string() },
                        }),
                        range,
                    ));
                };
                let result = match op {
                    InfixOp::Less => a < b,
                    InfixOp::LessEqual => a <= b,
                    InfixOp::Greater => a > b,
                    InfixOp::GreaterEqual => a >= b,
                    _ => unreachable!(),
                };
                Ok(Value::Boolean(result))
            }
            InfixOp::And | InfixOp::Or => unreachable!("handled above"),
        }
    }

    fn eval_range(&mut self, from: &Expression, to: &Expression, step: Option<&Expression>, range: SourceRange) -> Result<Value, Error> {
        let from_v = self.expect_number(from)?;
        let to_v = self.expect_number(to)?;
        let step_v = match step {
            Some(e) => {
                let s = self.expect_number(e)?;
                if s == 0.0 {
                    return Err(Error::new(
                        ErrorKind::Runtime(RuntimeErrorKind::AssertionFailure { message: "Step value must be nonzero".to_owned() }),
                        range,
                    ));
                }
                s
            }
            None => {
                if from_v <= to_v {
                    1.0
                } else {
                    0.0
                }
            }
        };
        Ok(Value::Range(crate::value::Range { from: from_v, to: to_v, step: step_v }))
    }

    /// `expr step n` with no preceding `to` (spec §8 scenario 4): evaluates
    /// `expr` once and rebinds only its step, keeping an existing range's
    /// `from`/`to` or treating a bare number as a single-point range.
    fn eval_step_override(&mut self, base: &Expression, step: &Expression, range: SourceRange) -> Result<Value, Error> {
        let base_v = self.eval_expr(base)?;
        let step_v = self.expect_number(step)?;
        if step_v == 0.0 {
            return Err(Error::new(
                ErrorKind::Runtime(RuntimeErrorKind::AssertionFailure { message: "Step value must be nonzero".to_owned() }),
                range,
            ));
        }
        match base_v {
            Value::Range(r) => Ok(Value::Range(crate::value::Range { from: r.from, to: r.to, step: step_v })),
            Value::Number(n) => Ok(Value::Range(crate::value::Range { from: n, to: n, step: step_v })),
            other => Err(type_mismatch("step", Type::Range, &other, base.range)),
        }
    }

    fn expect_number(&mut self, expr: &Expression) -> Result<f64, Error> {
        match self.eval_expr(expr)? {
            Value::Number(n) => Ok(n),
            other => Err(Error::new(
                ErrorKind::Runtime(RuntimeErrorKind::TypeMismatch {
                    context: "range bound".to_owned(),
                    index: None,
                    expected: Type::Number.to_string(),
                    got: other.ty().to_string(),
                }),
                expr.range,
            )),
        }
    }
}

fn property_type(name: &str) -> Type {
    match name {
        "color" => Type::Color,
        "texture" | "font" | "name" => Type::String,
        "opacity" | "detail" => Type::Number,
        "position" => Type::Vector,
        "orientation" => Type::Rotation,
        "size" => Type::Size,
        "along" => Type::Path,
        _ => Type::Number,
    }
}

fn type_mismatch(context: &str, expected: Type, got: &Value, range: SourceRange) -> Error {
    Error::new(
        ErrorKind::Runtime(RuntimeErrorKind::TypeMismatch {
            context: context.to_owned(),
            index: None,
            expected: expected.to_string(),
            got: got.ty().to_string(),
        }),
        range,
    )
}

fn builder_error(message: String, range: SourceRange) -> Error {
    Error::new(ErrorKind::Runtime(RuntimeErrorKind::AssertionFailure { message }), range)
}

fn wrap_children(children: Vec<Value>) -> Value {
    match children.len() {
        0 => Value::Tuple(Vec::new()),
        1 => children.into_iter().next().unwrap(),
        _ => Value::Tuple(children),
    }
}

fn accepts_child(block_type: BlockType, value: &Value) -> bool {
    match block_type {
        BlockType::Root | BlockType::Group | BlockType::Csg => matches!(value, Value::Mesh(_)),
        BlockType::Builder | BlockType::Path => matches!(value, Value::Path(_)),
        BlockType::Primitive => false,
        BlockType::Definition => true,
        BlockType::LoopBody => false,
    }
}

fn mesh_handles(children: &[Value], range: SourceRange) -> Result<Vec<Geometry>, Error> {
    children
        .iter()
        .map(|v| match v {
            Value::Mesh(g) => Ok(g.clone()),
            other => Err(Error::new(ErrorKind::Runtime(RuntimeErrorKind::UnusedValue { of: other.ty().to_string() }), range)),
        })
        .collect()
}

fn path_handles(children: &[Value], range: SourceRange) -> Result<Vec<Geometry>, Error> {
    children
        .iter()
        .map(|v| match v {
            Value::Path(g) => Ok(g.clone()),
            other => Err(Error::new(ErrorKind::Runtime(RuntimeErrorKind::UnusedValue { of: other.ty().to_string() }), range)),
        })
        .collect()
}

fn parse_hex_color(hex: &str, range: SourceRange) -> Result<Value, Error> {
    let digit = |c: char| c.to_digit(16).unwrap_or(0) as f64 / 15.0;
    let pair = |s: &str| -> f64 { u8::from_str_radix(s, 16).unwrap_or(0) as f64 / 255.0 };
    let chars: Vec<char> = hex.chars().collect();
    let (r, g, b, a) = match chars.len() {
        3 => (digit(chars[0]), digit(chars[1]), digit(chars[2]), 1.0),
        4 => (digit(chars[0]), digit(chars[1]), digit(chars[2]), digit(chars[3])),
        6 => (pair(&hex[0..2]), pair(&hex[2..4]), pair(&hex[4..6]), 1.0),
        8 => (pair(&hex[0..2]), pair(&hex[2..4]), pair(&hex[4..6]), pair(&hex[6..8])),
        _ => {
            return Err(Error::new(
                ErrorKind::Runtime(RuntimeErrorKind::AssertionFailure { message: "Invalid hex color".to_owned() }),
                range,
            ));
        }
    };
    Ok(Value::Color { r, g, b, a })
}

fn numeric_components(v: &Value) -> Option<Vec<f64>> {
    match v {
        Value::Number(n) => Some(vec![*n]),
        Value::Vector { x, y, z } => Some(vec![*x, *y, *z]),
        Value::Size { w, h, d } => Some(vec![*w, *h, *d]),
        Value::Rotation { roll, pitch, yaw } => Some(vec![*roll, *pitch, *yaw]),
        Value::Color { r, g, b, a } => Some(vec![*r, *g, *b, *a]),
        Value::Tuple(items) => items.iter().map(|i| if let Value::Number(n) = i { Some(*n) } else { None }).collect(),
        _ => None,
    }
}

fn rebuild_like(shape: &Value, nums: &[f64]) -> Value {
    match shape {
        Value::Vector { .. } => Value::Vector { x: nums[0], y: nums[1], z: nums[2] },
        Value::Size { .. } => Value::size_clamped(nums[0], nums[1], nums[2]),
        Value::Rotation { .. } => Value::Rotation { roll: nums[0], pitch: nums[1], yaw: nums[2] },
        Value::Color { .. } => Value::Color { r: nums[0], g: nums[1], b: nums[2], a: nums[3] },
        Value::Tuple(_) => Value::Tuple(nums.iter().map(|n| Value::Number(*n)).collect()),
        _ => Value::Number(nums[0]),
    }
}

/// The closed set of unary math functions callable as `name(x)` (spec §9
/// "function call expressions"); there is no open extensibility mechanism.
fn math_function(name: &str) -> Option<fn(f64) -> f64> {
    match name {
        "sin" => Some(f64::sin),
        "cos" => Some(f64::cos),
        "tan" => Some(f64::tan),
        "asin" => Some(f64::asin),
        "acos" => Some(f64::acos),
        "atan" => Some(f64::atan),
        "sqrt" => Some(f64::sqrt),
        "abs" => Some(f64::abs),
        "round" => Some(f64::round),
        "floor" => Some(f64::floor),
        "ceil" => Some(f64::ceil),
        "exp" => Some(f64::exp),
        "log" => Some(f64::ln),
        _ => None,
    }
}

fn numeric_unary(v: &Value, op: impl Fn(f64) -> f64, range: SourceRange) -> Result<Value, Error> {
    let Some(nums) = numeric_components(v) else {
        return Err(type_mismatch("unary operator", Type::Number, v, range));
    };
    let result: Vec<f64> = nums.iter().map(|n| op(*n)).collect();
    Ok(rebuild_like(v, &result))
}

fn numeric_binary(l: &Value, r: &Value, op: impl Fn(f64, f64) -> f64, range: SourceRange) -> Result<Value, Error> {
    let (Some(a), Some(b)) = (numeric_components(l), numeric_components(r)) else {
        let (bad, other) = if numeric_components(l).is_none() { (l, r) } else { (r, l) };
        return Err(type_mismatch("arithmetic", other.ty(), bad, range));
    };
    if a.len() == b.len() {
        let result: Vec<f64> = a.iter().zip(b.iter()).map(|(x, y)| op(*x, *y)).collect();
        let shape = if matches!(l, Value::Number(_)) { r } else { l };
        Ok(rebuild_like(shape, &result))
    } else if a.len() == 1 {
        let result: Vec<f64> = b.iter().map(|y| op(a[0], *y)).collect();
        Ok(rebuild_like(r, &result))
    } else if b.len() == 1 {
        let result: Vec<f64> = a.iter().map(|x| op(x, b[0])).collect();
        Ok(rebuild_like(l, &result))
    } else {
        Err(type_mismatch("arithmetic", l.ty(), r, range))
    }
}

fn eval_equality(lhs: Value, rhs: Value, negate: bool) -> Value {
    let cmp = move |a: &Value, b: &Value| if negate { a != b } else { a == b };
    match (&lhs, &rhs) {
        (Value::Tuple(_), Value::Tuple(_)) => Value::Boolean(cmp(&lhs, &rhs)),
        (Value::Tuple(a), _) => wrap(Value::compare_flattened(a, std::slice::from_ref(&rhs), cmp)),
        (_, Value::Tuple(b)) => wrap(Value::compare_flattened(std::slice::from_ref(&lhs), b, cmp)),
        _ => Value::Boolean(cmp(&lhs, &rhs)),
    }
}

fn wrap(items: Vec<Value>) -> Value {
    if items.len() == 1 { items.into_iter().next().unwrap() } else { Value::Tuple(items) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delegate::Delegate as DelegateTrait;

    struct TestDelegate {
        log: Vec<String>,
    }
    impl Delegate for TestDelegate {
        fn resolve_url(&mut self, path: &str, _base: Option<&str>) -> Result<String, String> {
            Ok(path.to_owned())
        }
        fn import_geometry(&mut self, _url: &str) -> Result<Geometry, String> {
            Err("not supported in tests".to_owned())
        }
        fn debug_log(&mut self, values: &[Value]) {
            let rendered: Vec<String> = values.iter().map(std::string::ToString::to_string).collect();
            self.log.push(format!("[{}]", rendered.join(",")));
        }
        fn read_source(&mut self, _url: &str) -> Result<Option<String>, String> {
            Ok(None)
        }
    }

    struct NullGeometry;
    impl crate::value::GeometryObject for NullGeometry {}

    struct TestBuilder;
    impl GeometryBuilder for TestBuilder {
        fn build(&mut self, _args: BuildArgs) -> Result<Geometry, String> {
            Ok(Geometry(std::rc::Rc::new(NullGeometry)))
        }
    }

    fn run(source: &str) -> Vec<String> {
        let statements = crate::parser::parse(source).unwrap();
        let mut delegate = TestDelegate { log: Vec::new() };
        let mut builder = TestBuilder;
        let mut evaluator = Evaluator::new(&mut delegate, &mut builder, EvalOptions::default(), None);
        evaluator.evaluate(&statements).unwrap();
        delegate.log
    }

    #[test]
    fn print_cos_pi() {
        let log = run("print cos pi");
        assert_eq!(log, vec!["[-1]"]);
    }

    #[test]
    fn math_call_rejects_wrong_argument_count() {
        let stmts = crate::parser::parse("print sqrt(4, 9)").unwrap();
        let mut delegate = TestDelegate { log: Vec::new() };
        let mut builder = TestBuilder;
        let mut evaluator = Evaluator::new(&mut delegate, &mut builder, EvalOptions::default(), None);
        let result = evaluator.evaluate(&stmts);
        assert!(result.is_err());
    }

    #[test]
    fn color_named_and_hex() {
        assert_eq!(run("color 1 0 0\nprint color"), vec!["[red]"]);
        assert_eq!(run("color #fff\nprint color"), vec!["[white]"]);
        assert_eq!(run("color (1 0 0) 0.5\nprint color"), vec!["[(1,0,0,0.5)]"]);
    }

    #[test]
    fn for_loop_over_range_and_reversed_and_tuple() {
        assert_eq!(run("for i in 1 to 3 { print i }"), vec!["[1]", "[2]", "[3]"]);
        assert_eq!(run("for 3 to 1 { print 0 }"), Vec::<String>::new());
        assert_eq!(run("for i in (3 1 4 1 5) { print i }"), vec!["[3]", "[1]", "[4]", "[1]", "[5]"]);
    }

    #[test]
    fn implicit_tuple_equality_interleaves_remainder() {
        assert_eq!(run("print 1 2 3 = 1 2 3"), vec!["[1,2,false,2,3]"]);
        assert_eq!(run("print (1 2 3) = (1 2 3)"), vec!["[true]"]);
    }

    #[test]
    fn recursion_guard_trips() {
        let statements = crate::parser::parse("define foo { foo }\nfoo").unwrap();
        let mut delegate = TestDelegate { log: Vec::new() };
        let mut builder = TestBuilder;
        let mut evaluator = Evaluator::new(&mut delegate, &mut builder, EvalOptions::default(), None);
        let err = evaluator.evaluate(&statements).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::Runtime(RuntimeErrorKind::AssertionFailure { ref message }) if message == "Too much recursion"));
    }

    #[test]
    fn bare_step_rebinds_an_existing_range_or_promotes_a_number() {
        assert_eq!(run("define range 1 to 5\nprint range step 2"), vec!["[range(1,5,2)]"]);
        assert_eq!(run("define range 1 to 5 step 3\nprint range step 2"), vec!["[range(1,5,2)]"]);
        assert_eq!(run("print 4 step 2"), vec!["[range(4,4,2)]"]);
    }

    #[test]
    fn step_zero_is_an_assertion_failure() {
        let statements = crate::parser::parse("for i in 1 to 5 step 0 { print i }").unwrap();
        let mut delegate = TestDelegate { log: Vec::new() };
        let mut builder = TestBuilder;
        let mut evaluator = Evaluator::new(&mut delegate, &mut builder, EvalOptions::default(), None);
        let err = evaluator.evaluate(&statements).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::Runtime(RuntimeErrorKind::AssertionFailure { .. })));
    }
}
