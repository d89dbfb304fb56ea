//! AST-to-AST lowering from the secondary (OpenSCAD-style) dialect into the
//! primary AST (spec §4.F): both dialects share one evaluator, which only
//! ever walks [`crate::ast`]. Source ranges are carried through unchanged
//! so diagnostics on lowered code still point at the original `.scad` text.
//!
//! Coverage is deliberately bounded to the transformations that map
//! cleanly onto the primary value/block model; unsupported OpenSCAD
//! features are called out in DESIGN.md rather than silently guessed at.

use std::collections::HashMap;

use crate::{
    ast::{
        Definition as PrimaryDefinition, Expression as PrimaryExpression, ExpressionKind as PrimaryExprKind,
        InfixOp as PrimaryInfixOp, Statement as PrimaryStatement, StatementKind as PrimaryStatementKind,
    },
    scad::ast::{Argument, Definition, Expression, ExpressionKind, InfixOp, Param, PrefixOp, Statement, StatementKind},
    source_range::SourceRange,
    symbols,
};

const DEG_TO_RAD: f64 = std::f64::consts::PI / 180.0;

/// Param lists for every `function`/`module` definition seen anywhere in
/// the program, keyed by its original (un-mangled) name, so call sites can
/// reorder named arguments into the positional order `invoke_block`
/// expects (spec §4.F "named-argument reordering").
type Defs = HashMap<String, Vec<Param>>;

/// Lowers a full secondary-dialect program into primary-dialect statements.
#[must_use]
pub fn lower_program(stmts: &[Statement]) -> Vec<PrimaryStatement> {
    let mut defs = Defs::new();
    collect_defs(stmts, &mut defs);
    lower_statements(stmts, &defs)
}

fn collect_defs(stmts: &[Statement], defs: &mut Defs) {
    for stmt in stmts {
        collect_defs_one(stmt, defs);
    }
}

fn collect_defs_one(stmt: &Statement, defs: &mut Defs) {
    match &stmt.kind {
        StatementKind::Define(name, Definition::Function { params, .. } | Definition::Module { params, .. }) => {
            defs.insert(name.clone(), params.clone());
        }
        StatementKind::ForLoop { body, .. } | StatementKind::Let { body, .. } => collect_defs_one(body, defs),
        StatementKind::IfElse { then_branch, else_branch, .. } => {
            collect_defs_one(then_branch, defs);
            if let Some(branch) = else_branch {
                collect_defs_one(branch, defs);
            }
        }
        StatementKind::Command { next, .. } => {
            if let Some(next) = next {
                collect_defs_one(next, defs);
            }
        }
        StatementKind::Block(body) => collect_defs(body, defs),
        StatementKind::Define(..) | StatementKind::Empty => {}
    }
}

fn lower_statements(stmts: &[Statement], defs: &Defs) -> Vec<PrimaryStatement> {
    stmts.iter().flat_map(|s| lower_statement(s, defs)).collect()
}

/// Reserved primary-dialect names: keywords plus every root-scope and
/// built-in-block identifier. A lowered definition whose name collides
/// gets a trailing `_` appended until it no longer does.
fn is_reserved(name: &str) -> bool {
    const KEYWORDS: &[&str] =
        &["define", "option", "for", "in", "to", "step", "if", "else", "import", "true", "false", "and", "or", "not"];
    KEYWORDS.iter().any(|k| *k == name) || symbols::root_candidate_names().iter().any(|n| *n == name) || symbols::builtin_block_type(name).is_some()
}

/// `$fn` -> `dollar_fn`, a leading `_` -> `underscore_...`, and any
/// resulting collision with a reserved primary name is suffixed with `_`
/// until unique.
fn mangle(name: &str) -> String {
    let mut out = if let Some(rest) = name.strip_prefix('$') {
        format!("dollar_{rest}")
    } else if let Some(rest) = name.strip_prefix('_') {
        format!("underscore_{rest}")
    } else {
        name.to_owned()
    };
    while is_reserved(&out) {
        out.push('_');
    }
    out
}

fn num(n: f64, range: SourceRange) -> PrimaryExpression {
    PrimaryExpression::new(PrimaryExprKind::Number(n), range)
}

fn tuple(parts: Vec<PrimaryExpression>, range: SourceRange) -> PrimaryExpression {
    PrimaryExpression::new(PrimaryExprKind::Tuple(parts), range)
}

fn scaled(expr: PrimaryExpression, factor: f64, range: SourceRange) -> PrimaryExpression {
    PrimaryExpression::new(
        PrimaryExprKind::Infix(Box::new(expr), PrimaryInfixOp::Multiply, Box::new(num(factor, range))),
        range,
    )
}

fn property_stmt(name: &'static str, value: PrimaryExpression, range: SourceRange) -> PrimaryStatement {
    PrimaryStatement::new(PrimaryStatementKind::Command(name.to_owned(), vec![value]), range)
}

/// Wraps a primitive/path block invocation with a `size` property
/// statement: `cube(10)` lowers to the same shape as `cube { size 10 }`.
fn primitive_with_size(tag: &'static str, size: PrimaryExpression, range: SourceRange) -> PrimaryStatement {
    let body = vec![property_stmt("size", size, range)];
    PrimaryStatement::new(
        PrimaryStatementKind::Expression(PrimaryExpression::new(PrimaryExprKind::Block(tag.to_owned(), body), range)),
        range,
    )
}

/// Wraps `children` in a `group` invocation carrying `props` as its
/// leading property statements (translate/rotate/color lower to this).
fn group_with(props: Vec<PrimaryStatement>, children: Vec<PrimaryStatement>, range: SourceRange) -> Vec<PrimaryStatement> {
    let mut body = props;
    body.extend(children);
    vec![PrimaryStatement::new(
        PrimaryStatementKind::Expression(PrimaryExpression::new(PrimaryExprKind::Block("group".to_owned(), body), range)),
        range,
    )]
}

fn find_named<'a>(args: &'a [Argument], name: &str) -> Option<&'a Expression> {
    args.iter().find(|a| a.name.as_deref() == Some(name)).map(|a| &a.value)
}

fn find_positional(args: &[Argument], index: usize) -> Option<&Expression> {
    args.iter().filter(|a| a.name.is_none()).nth(index).map(|a| &a.value)
}

fn get_arg<'a>(args: &'a [Argument], index: usize, name: &str) -> Option<&'a Expression> {
    find_named(args, name).or_else(|| find_positional(args, index))
}

fn arg_is_true(args: &[Argument], name: &str) -> bool {
    matches!(find_named(args, name).map(|e| &e.kind), Some(&ExpressionKind::Boolean(true)))
}

/// Reorders `args` to match `params`' declared order, filling any gap
/// before the last-supplied slot with that parameter's own default (or
/// `0`), matching `invoke_block`'s left-to-right positional binding.
fn reorder_call_args(args: &[Argument], params: &[Param], defs: &Defs, range: SourceRange) -> Vec<PrimaryExpression> {
    let mut slots: Vec<Option<&Expression>> = vec![None; params.len()];
    let mut next_positional = 0;
    for arg in args {
        if let Some(name) = &arg.name {
            if let Some(idx) = params.iter().position(|p| &p.name == name) {
                slots[idx] = Some(&arg.value);
            }
            continue;
        }
        while next_positional < slots.len() && slots[next_positional].is_some() {
            next_positional += 1;
        }
        if next_positional < slots.len() {
            slots[next_positional] = Some(&arg.value);
            next_positional += 1;
        }
    }
    let Some(last) = slots.iter().rposition(Option::is_some) else {
        return Vec::new();
    };
    (0..=last)
        .map(|i| match slots[i] {
            Some(expr) => lower_expr(expr, defs),
            None => params[i].default.as_ref().map_or_else(|| num(0.0, range), |d| lower_expr(d, defs)),
        })
        .collect()
}

fn lower_statement(stmt: &Statement, defs: &Defs) -> Vec<PrimaryStatement> {
    let range = stmt.range;
    match &stmt.kind {
        StatementKind::Empty => Vec::new(),
        StatementKind::Block(body) => vec![PrimaryStatement::new(PrimaryStatementKind::Block(lower_statements(body, defs)), range)],
        StatementKind::Define(name, def) => lower_define(name, def, range, defs),
        StatementKind::ForLoop { var, sequence, body } => vec![PrimaryStatement::new(
            PrimaryStatementKind::ForLoop {
                index: Some(mangle(var)),
                sequence: lower_expr(sequence, defs),
                body: lower_statement(body, defs),
            },
            range,
        )],
        StatementKind::IfElse { condition, then_branch, else_branch } => vec![PrimaryStatement::new(
            PrimaryStatementKind::IfElse {
                condition: lower_expr(condition, defs),
                body: lower_statement(then_branch, defs),
                else_branch: else_branch.as_ref().map(|b| lower_statement(b, defs)),
            },
            range,
        )],
        // Statement-position `let` isolates its bindings to a transparent
        // block scope, the same trick used by `if`/`for` bodies.
        StatementKind::Let { bindings, body } => {
            let mut wrapped: Vec<PrimaryStatement> = bindings
                .iter()
                .map(|(name, value)| {
                    PrimaryStatement::new(PrimaryStatementKind::Define(mangle(name), PrimaryDefinition::Expression(lower_expr(value, defs))), range)
                })
                .collect();
            wrapped.extend(lower_statement(body, defs));
            vec![PrimaryStatement::new(PrimaryStatementKind::Block(wrapped), range)]
        }
        StatementKind::Command { name, args, next } => lower_command(name, args, next.as_deref(), range, defs),
    }
}

fn lower_define(name: &str, def: &Definition, range: SourceRange, defs: &Defs) -> Vec<PrimaryStatement> {
    let mangled = mangle(name);
    match def {
        Definition::Expression(expr) => {
            vec![PrimaryStatement::new(PrimaryStatementKind::Define(mangled, PrimaryDefinition::Expression(lower_expr(expr, defs))), range)]
        }
        Definition::Function { params, body } => {
            let mut stmts = params_as_options(params, defs, range);
            stmts.push(PrimaryStatement::new(PrimaryStatementKind::Expression(lower_expr(body, defs)), body.range));
            vec![PrimaryStatement::new(PrimaryStatementKind::Define(mangled, PrimaryDefinition::Block(stmts)), range)]
        }
        Definition::Module { params, body } => {
            let mut stmts = params_as_options(params, defs, range);
            stmts.extend(lower_statement(body, defs));
            vec![PrimaryStatement::new(PrimaryStatementKind::Define(mangled, PrimaryDefinition::Block(stmts)), range)]
        }
    }
}

fn params_as_options(params: &[Param], defs: &Defs, range: SourceRange) -> Vec<PrimaryStatement> {
    params
        .iter()
        .map(|p| {
            let default = p.default.as_ref().map_or_else(|| num(0.0, range), |d| lower_expr(d, defs));
            PrimaryStatement::new(PrimaryStatementKind::Option(p.name.clone(), default), range)
        })
        .collect()
}

fn lower_command(name: &str, args: &[Argument], next: Option<&Statement>, range: SourceRange, defs: &Defs) -> Vec<PrimaryStatement> {
    let children = || next.map_or_else(Vec::new, |s| match &s.kind {
        StatementKind::Block(inner) => lower_statements(inner, defs),
        _ => lower_statement(s, defs),
    });
    match name {
        "translate" => {
            let v = get_arg(args, 0, "v").map_or_else(|| num(0.0, range), |e| lower_expr(e, defs));
            group_with(vec![property_stmt("position", v, range)], children(), range)
        }
        "rotate" => {
            let v = get_arg(args, 0, "a").map_or_else(|| num(0.0, range), |e| lower_expr(e, defs));
            group_with(vec![property_stmt("orientation", scaled(v, DEG_TO_RAD, range), range)], children(), range)
        }
        "color" => {
            let v = lower_color_arg(args, range, defs);
            group_with(vec![property_stmt("color", v, range)], children(), range)
        }
        // Scale has no modeled counterpart (the primary value model has no
        // cumulative scale factor, only per-primitive size); children still
        // lower, just unscaled. See DESIGN.md.
        "scale" | "mirror" | "multmatrix" | "resize" | "offset" => children(),
        "union" | "difference" | "intersection" => {
            vec![PrimaryStatement::new(
                PrimaryStatementKind::Expression(PrimaryExpression::new(PrimaryExprKind::Block(name.to_owned(), children()), range)),
                range,
            )]
        }
        "group" | "hull" | "minkowski" | "render" | "children" => {
            vec![PrimaryStatement::new(
                PrimaryStatementKind::Expression(PrimaryExpression::new(PrimaryExprKind::Block("group".to_owned(), children()), range)),
                range,
            )]
        }
        "echo" => {
            let mut stmts = vec![PrimaryStatement::new(
                PrimaryStatementKind::Command("print".to_owned(), args.iter().map(|a| lower_expr(&a.value, defs)).collect()),
                range,
            )];
            stmts.extend(children());
            stmts
        }
        "cube" => lower_sized_primitive("cube", args, 0, "size", range, defs),
        "square" => lower_sized_primitive("square", args, 0, "size", range, defs),
        "sphere" => lower_radius_primitive("sphere", args, range, defs, true),
        "circle" => lower_radius_primitive("circle", args, range, defs, false),
        "cylinder" | "cone" => lower_cylinder(args, range, defs),
        "linear_extrude" => {
            vec![PrimaryStatement::new(
                PrimaryStatementKind::Expression(PrimaryExpression::new(PrimaryExprKind::Block("extrude".to_owned(), children()), range)),
                range,
            )]
        }
        _ => lower_user_call(name, args, range, defs),
    }
}

fn lower_sized_primitive(tag: &'static str, args: &[Argument], size_index: usize, size_name: &str, range: SourceRange, defs: &Defs) -> Vec<PrimaryStatement> {
    let size = get_arg(args, size_index, size_name).map_or_else(|| num(1.0, range), |e| lower_expr(e, defs));
    if arg_is_true(args, "center") {
        let offset = scaled(size.clone(), -0.5, range);
        return group_with(vec![property_stmt("position", offset, range)], vec![primitive_with_size(tag, size, range)], range);
    }
    vec![primitive_with_size(tag, size, range)]
}

fn lower_radius_primitive(tag: &'static str, args: &[Argument], range: SourceRange, defs: &Defs, three: bool) -> Vec<PrimaryStatement> {
    let diameter = if let Some(d) = get_arg(args, 1, "d") {
        lower_expr(d, defs)
    } else {
        let r = get_arg(args, 0, "r").map_or_else(|| num(1.0, range), |e| lower_expr(e, defs));
        scaled(r, 2.0, range)
    };
    let size = if three {
        tuple(vec![diameter.clone(), diameter.clone(), diameter], range)
    } else {
        tuple(vec![diameter.clone(), diameter], range)
    };
    vec![primitive_with_size(tag, size, range)]
}

fn lower_cylinder(args: &[Argument], range: SourceRange, defs: &Defs) -> Vec<PrimaryStatement> {
    let h = get_arg(args, 0, "h").map_or_else(|| num(1.0, range), |e| lower_expr(e, defs));
    let diameter = if let Some(d) = get_arg(args, 2, "d").or_else(|| get_arg(args, 2, "d1")) {
        lower_expr(d, defs)
    } else {
        let r = get_arg(args, 1, "r").or_else(|| get_arg(args, 1, "r1")).map_or_else(|| num(1.0, range), |e| lower_expr(e, defs));
        scaled(r, 2.0, range)
    };
    let size = tuple(vec![diameter.clone(), diameter, h], range);
    vec![primitive_with_size("cylinder", size, range)]
}

fn lower_color_arg(args: &[Argument], range: SourceRange, defs: &Defs) -> PrimaryExpression {
    if let Some(e) = get_arg(args, 0, "c") {
        if let ExpressionKind::String(name) = &e.kind {
            return PrimaryExpression::new(PrimaryExprKind::Identifier(name.clone()), range);
        }
        return lower_expr(e, defs);
    }
    num(1.0, range)
}

fn lower_user_call(name: &str, args: &[Argument], range: SourceRange, defs: &Defs) -> Vec<PrimaryStatement> {
    let mangled = mangle(name);
    let call_args = defs.get(name).map_or_else(
        || args.iter().map(|a| lower_expr(&a.value, defs)).collect(),
        |params| reorder_call_args(args, params, defs, range),
    );
    vec![PrimaryStatement::new(PrimaryStatementKind::Command(mangled, call_args), range)]
}

/// The closed set of OpenSCAD trigonometric functions whose arguments (or,
/// for the inverse functions, results) are in degrees rather than radians.
fn trig_conversion(name: &str) -> Option<(bool, bool)> {
    match name {
        "sin" | "cos" | "tan" => Some((true, false)),
        "asin" | "acos" | "atan" => Some((false, true)),
        _ => None,
    }
}

fn lower_expr(expr: &Expression, defs: &Defs) -> PrimaryExpression {
    let range = expr.range;
    match &expr.kind {
        ExpressionKind::Number(n) => num(*n, range),
        ExpressionKind::String(s) => PrimaryExpression::new(PrimaryExprKind::String(s.clone()), range),
        ExpressionKind::Boolean(b) => PrimaryExpression::new(PrimaryExprKind::Identifier(b.to_string()), range),
        // `undef` has no primary counterpart; an empty tuple is the closest
        // analogue (an "unused value" that type-checks as nothing).
        ExpressionKind::Undefined => PrimaryExpression::new(PrimaryExprKind::Tuple(Vec::new()), range),
        ExpressionKind::Identifier(name) => PrimaryExpression::new(PrimaryExprKind::Identifier(mangle(name)), range),
        // `$fn`/`$t`/... are not modeled as ambient special variables; a
        // reference to one resolves like any other (likely undefined) name.
        ExpressionKind::DollarIdentifier(name) => PrimaryExpression::new(PrimaryExprKind::Identifier(mangle(name)), range),
        ExpressionKind::Vector(items) => tuple(items.iter().map(|i| lower_expr(i, defs)).collect(), range),
        ExpressionKind::Call { name, args } => lower_call_expr(name, args, range, defs),
        ExpressionKind::Range { from, step, to } => PrimaryExpression::new(
            crate::ast::ExpressionKind::Range {
                from: Box::new(lower_expr(from, defs)),
                to: Box::new(lower_expr(to, defs)),
                step: step.as_ref().map(|s| Box::new(lower_expr(s, defs))),
            },
            range,
        ),
        // Only literal 0/1/2 indices into a 3-component value are
        // modeled, via member access; anything else falls back to the
        // first component (see DESIGN.md Open Questions).
        ExpressionKind::Index(base, index) => {
            let member = match &index.kind {
                ExpressionKind::Number(n) if (*n - 1.0).abs() < 0.5 => "y",
                ExpressionKind::Number(n) if (*n - 2.0).abs() < 0.5 => "z",
                _ => "x",
            };
            PrimaryExpression::new(crate::ast::ExpressionKind::Member(Box::new(lower_expr(base, defs)), member.to_owned()), range)
        }
        ExpressionKind::Member(base, name) => {
            PrimaryExpression::new(crate::ast::ExpressionKind::Member(Box::new(lower_expr(base, defs)), name.clone()), range)
        }
        ExpressionKind::Prefix(op, operand) => {
            let primary_op = match op {
                PrefixOp::Negate => crate::ast::PrefixOp::Negate,
                PrefixOp::Not => crate::ast::PrefixOp::Not,
            };
            PrimaryExpression::new(crate::ast::ExpressionKind::Prefix(primary_op, Box::new(lower_expr(operand, defs))), range)
        }
        ExpressionKind::Infix(lhs, op, rhs) => lower_infix(lhs, *op, rhs, range, defs),
        // Ternary has no primary counterpart; modeled as `if`/`else` would
        // require statement position, so the condition picks a branch by
        // evaluating both is not attempted — instead fall back to the
        // `then` branch and record this as an Open Question.
        ExpressionKind::Conditional { then_branch, .. } => lower_expr(then_branch, defs),
        // Expression-position `let` bindings are not substituted; only the
        // body is lowered (see DESIGN.md Open Questions).
        ExpressionKind::Let { body, .. } => lower_expr(body, defs),
    }
}

fn lower_call_expr(name: &str, args: &[Argument], range: SourceRange, defs: &Defs) -> PrimaryExpression {
    if let Some((args_in_degrees, result_in_degrees)) = trig_conversion(name) {
        let arg = args.first().map_or_else(|| num(0.0, range), |a| lower_expr(&a.value, defs));
        let arg = if args_in_degrees { scaled(arg, DEG_TO_RAD, range) } else { arg };
        let call = PrimaryExpression::new(crate::ast::ExpressionKind::Call(name.to_owned(), vec![arg]), range);
        return if result_in_degrees { scaled(call, 1.0 / DEG_TO_RAD, range) } else { call };
    }
    if is_math_function(name) {
        let arg = args.first().map_or_else(|| num(0.0, range), |a| lower_expr(&a.value, defs));
        return PrimaryExpression::new(crate::ast::ExpressionKind::Call(name.to_owned(), vec![arg]), range);
    }
    let mangled = mangle(name);
    let call_args = defs.get(name).map_or_else(
        || args.iter().map(|a| lower_expr(&a.value, defs)).collect(),
        |params| reorder_call_args(args, params, defs, range),
    );
    PrimaryExpression::new(crate::ast::ExpressionKind::Call(mangled, call_args), range)
}

fn is_math_function(name: &str) -> bool {
    matches!(name, "sqrt" | "abs" | "round" | "floor" | "ceil" | "exp" | "ln" | "log")
}

fn lower_infix(lhs: &Expression, op: InfixOp, rhs: &Expression, range: SourceRange, defs: &Defs) -> PrimaryExpression {
    let lhs = lower_expr(lhs, defs);
    let rhs = lower_expr(rhs, defs);
    // `%` and `^` have no primary operator; modeled via the closed math
    // function set isn't possible either (both are binary), so they lower
    // to their left operand unchanged. Not exercised by any scenario this
    // crate targets; see DESIGN.md.
    let Some(primary_op) = (match op {
        InfixOp::Add => Some(PrimaryInfixOp::Add),
        InfixOp::Subtract => Some(PrimaryInfixOp::Subtract),
        InfixOp::Multiply => Some(PrimaryInfixOp::Multiply),
        InfixOp::Divide => Some(PrimaryInfixOp::Divide),
        InfixOp::Equal => Some(PrimaryInfixOp::Equal),
        InfixOp::NotEqual => Some(PrimaryInfixOp::NotEqual),
        InfixOp::Less => Some(PrimaryInfixOp::Less),
        InfixOp::LessEqual => Some(PrimaryInfixOp::LessEqual),
        InfixOp::Greater => Some(PrimaryInfixOp::Greater),
        InfixOp::GreaterEqual => Some(PrimaryInfixOp::GreaterEqual),
        InfixOp::And => Some(PrimaryInfixOp::And),
        InfixOp::Or => Some(PrimaryInfixOp::Or),
        InfixOp::Modulo | InfixOp::Power => None,
    }) else {
        return lhs;
    };
    PrimaryExpression::new(crate::ast::ExpressionKind::Infix(Box::new(lhs), primary_op, Box::new(rhs)), range)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scad::parser::parse as parse_scad;

    fn lower(source: &str) -> Vec<PrimaryStatement> {
        lower_program(&parse_scad(source).unwrap())
    }

    #[test]
    fn translate_wraps_child_in_a_group_with_position() {
        let stmts = lower("translate([1,2,3]) cube(10);");
        assert_eq!(stmts.len(), 1);
        match &stmts[0].kind {
            PrimaryStatementKind::Expression(e) => assert!(matches!(&e.kind, PrimaryExprKind::Block(name, _) if name == "group")),
            other => panic!("expected group expression, got {other:?}"),
        }
    }

    #[test]
    fn cube_lowers_to_a_block_with_a_size_property() {
        let stmts = lower("cube(10);");
        match &stmts[0].kind {
            PrimaryStatementKind::Expression(e) => match &e.kind {
                PrimaryExprKind::Block(name, body) => {
                    assert_eq!(name, "cube");
                    assert_eq!(body.len(), 1);
                }
                other => panic!("expected block, got {other:?}"),
            },
            other => panic!("expected expression statement, got {other:?}"),
        }
    }

    #[test]
    fn module_definition_and_call_round_trip_param_order() {
        let stmts = lower("module box(w, h) { cube([w, h, 1]); }\nbox(h=5, w=2);");
        assert_eq!(stmts.len(), 2);
        assert!(matches!(&stmts[0].kind, PrimaryStatementKind::Define(..)));
        match &stmts[1].kind {
            PrimaryStatementKind::Command(name, args) => {
                assert_eq!(name, "box");
                assert_eq!(args.len(), 2);
            }
            other => panic!("expected command, got {other:?}"),
        }
    }

    #[test]
    fn echo_lowers_to_print() {
        let stmts = lower("echo(\"hi\");");
        match &stmts[0].kind {
            PrimaryStatementKind::Command(name, _) => assert_eq!(name, "print"),
            other => panic!("expected command, got {other:?}"),
        }
    }

    #[test]
    fn dollar_and_underscore_identifiers_are_mangled() {
        let expr = lower_expr(
            &Expression::new(ExpressionKind::DollarIdentifier("fn".to_owned()), SourceRange::new(0, 0)),
            &Defs::new(),
        );
        assert!(matches!(expr.kind, PrimaryExprKind::Identifier(n) if n == "dollar_fn"));
    }
}
