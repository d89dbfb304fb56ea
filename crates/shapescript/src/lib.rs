#![doc = include_str!("../../../README.md")]
#![expect(clippy::cast_possible_truncation, reason = "numeric narrowing is checked at call sites")]
#![expect(clippy::cast_sign_loss, reason = "sign-changing casts guard against negative values first")]
#![expect(clippy::float_cmp, reason = "epsilon-clamped values compare exactly by construction")]
#![expect(clippy::too_many_arguments, reason = "geometry builder parameters mirror the spec's build() signature")]

mod ast;
pub mod delegate;
pub mod diagnostics;
mod eval;
pub mod resource;
pub mod scad;
mod source_range;
mod symbols;
mod token;
mod value;

mod lexer;
mod parser;

pub use crate::{
    delegate::{BuildArgs, Delegate, GeometryBuilder, GeometryTag, Material, Scene, Transform},
    diagnostics::{Error, ErrorKind, LexerErrorKind, ParserErrorKind, RuntimeErrorKind},
    eval::{EvalOptions, Evaluator},
    source_range::{LineColumn, SourceRange},
    value::{Geometry, GeometryObject, Range, Texture, Type, Value},
};

/// Which surface grammar a source file is written in (spec §6 "File
/// formats"): `.shape` files use the primary dialect, `.scad` files use the
/// OpenSCAD-style secondary dialect. Both lower to the same [`Program`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// The native ShapeScript grammar (spec §4.B/§4.D).
    Primary,
    /// The OpenSCAD-style grammar (spec §4.C/§4.E), lowered to the primary
    /// AST (spec §4.F) before being stored in a [`Program`].
    Secondary,
}

/// An immutable, already-parsed program (spec §3 "Programs are immutable
/// once parsed", spec §6 "Programs are value objects").
///
/// Secondary-dialect sources are parsed with the secondary grammar and
/// immediately lowered to the primary AST, so `statements` always holds
/// primary-dialect statements and the evaluator only ever walks one AST
/// shape (spec §1 "share one evaluator").
#[derive(Debug, Clone)]
pub struct Program {
    pub source: String,
    pub file_url: Option<String>,
    statements: Vec<ast::Statement>,
}

impl Program {
    /// Parses `source` as the given [`Dialect`], lowering secondary-dialect
    /// sources to the primary AST before storing them.
    pub fn parse(source: &str, file_url: Option<&str>, dialect: Dialect) -> Result<Self, Error> {
        let statements = match dialect {
            Dialect::Primary => parser::parse(source)?,
            Dialect::Secondary => {
                let scad_statements = scad::parser::parse(source)?;
                scad::lower::lower_program(&scad_statements)
            }
        };
        Ok(Self {
            source: source.to_owned(),
            file_url: file_url.map(str::to_owned),
            statements,
        })
    }

    /// Picks [`Dialect`] from a file extension (`.scad` is secondary,
    /// anything else — including `.shape` — is primary).
    #[must_use]
    pub fn dialect_for_extension(path: &str) -> Dialect {
        if path.rsplit('.').next() == Some("scad") {
            Dialect::Secondary
        } else {
            Dialect::Primary
        }
    }

    #[must_use]
    pub fn statements(&self) -> &[ast::Statement] {
        &self.statements
    }
}

/// Evaluates a parsed [`Program`] against the embedder's [`Delegate`] and
/// [`GeometryBuilder`] collaborators (spec §6 "Embedder API").
pub fn evaluate(program: &Program, delegate: &mut dyn Delegate, geometry: &mut dyn GeometryBuilder, options: EvalOptions<'_>) -> Result<Scene, Error> {
    let mut evaluator = Evaluator::new(delegate, geometry, options, program.file_url.clone());
    evaluator.evaluate(&program.statements)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct NullGeometry;
    impl GeometryObject for NullGeometry {}

    struct NullDelegate;
    impl Delegate for NullDelegate {
        fn resolve_url(&mut self, path: &str, _base: Option<&str>) -> Result<String, String> {
            Ok(path.to_owned())
        }
        fn import_geometry(&mut self, _url: &str) -> Result<Geometry, String> {
            Err("no geometry collaborator in this test".to_owned())
        }
        fn debug_log(&mut self, _values: &[Value]) {}
        fn read_source(&mut self, _url: &str) -> Result<Option<String>, String> {
            Ok(None)
        }
    }

    struct NullBuilder;
    impl GeometryBuilder for NullBuilder {
        fn build(&mut self, _args: BuildArgs) -> Result<Geometry, String> {
            Ok(Geometry(std::rc::Rc::new(NullGeometry)))
        }
    }

    #[test]
    fn parses_and_evaluates_primary_dialect() {
        let program = Program::parse("cube { size 1 }", None, Dialect::Primary).unwrap();
        let mut delegate = NullDelegate;
        let mut builder = NullBuilder;
        let scene = evaluate(&program, &mut delegate, &mut builder, EvalOptions::default()).unwrap();
        assert_eq!(scene.children.len(), 1);
    }

    #[test]
    fn secondary_dialect_lowers_before_evaluation() {
        let program = Program::parse("cube(10);", None, Dialect::Secondary).unwrap();
        let mut delegate = NullDelegate;
        let mut builder = NullBuilder;
        let scene = evaluate(&program, &mut delegate, &mut builder, EvalOptions::default()).unwrap();
        assert_eq!(scene.children.len(), 1);
    }

    #[test]
    fn dialect_is_picked_from_extension() {
        assert!(matches!(Program::dialect_for_extension("model.scad"), Dialect::Secondary));
        assert!(matches!(Program::dialect_for_extension("model.shape"), Dialect::Primary));
    }
}
