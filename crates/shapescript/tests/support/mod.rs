//! Shared integration-test harness: a `Delegate`/`GeometryBuilder` pair that
//! records `print`/`debug` output as rendered strings and counts geometry
//! builds, without needing a real polygon kernel attached.

use std::rc::Rc;

use shapescript::{BuildArgs, Delegate, Dialect, EvalOptions, Geometry, GeometryBuilder, GeometryObject, Program, Value};

#[derive(Debug)]
pub struct TagGeometry(pub String);
impl GeometryObject for TagGeometry {}

pub struct RecordingDelegate {
    pub log: Vec<String>,
    pub files: std::collections::HashMap<String, String>,
}

impl RecordingDelegate {
    pub fn new() -> Self {
        Self { log: Vec::new(), files: std::collections::HashMap::new() }
    }

    pub fn with_file(mut self, path: &str, contents: &str) -> Self {
        self.files.insert(path.to_owned(), contents.to_owned());
        self
    }
}

impl Delegate for RecordingDelegate {
    fn resolve_url(&mut self, path: &str, _base: Option<&str>) -> Result<String, String> {
        Ok(path.to_owned())
    }

    fn import_geometry(&mut self, url: &str) -> Result<Geometry, String> {
        Err(format!("no geometry importer in test harness for '{url}'"))
    }

    fn debug_log(&mut self, values: &[Value]) {
        let rendered: Vec<String> = values.iter().map(std::string::ToString::to_string).collect();
        self.log.push(format!("[{}]", rendered.join(",")));
    }

    fn read_source(&mut self, url: &str) -> Result<Option<String>, String> {
        Ok(self.files.get(url).cloned())
    }
}

#[derive(Default)]
pub struct RecordingBuilder {
    pub built_tags: Vec<String>,
}

impl GeometryBuilder for RecordingBuilder {
    fn build(&mut self, args: BuildArgs) -> Result<Geometry, String> {
        let tag = args.tag.to_string();
        self.built_tags.push(tag.clone());
        Ok(Geometry(Rc::new(TagGeometry(tag))))
    }
}

/// Parses and evaluates a primary-dialect program, returning the rendered
/// `print`/`debug` log.
pub fn run(source: &str) -> Vec<String> {
    let program = Program::parse(source, None, Dialect::Primary).expect("parse");
    let mut delegate = RecordingDelegate::new();
    let mut builder = RecordingBuilder::default();
    shapescript::evaluate(&program, &mut delegate, &mut builder, EvalOptions::default()).expect("evaluate");
    delegate.log
}

/// Like [`run`], but returns the evaluation `Result` instead of unwrapping,
/// for tests that expect an error.
pub fn try_run(source: &str) -> Result<Vec<String>, shapescript::Error> {
    let program = Program::parse(source, None, Dialect::Primary)?;
    let mut delegate = RecordingDelegate::new();
    let mut builder = RecordingBuilder::default();
    shapescript::evaluate(&program, &mut delegate, &mut builder, EvalOptions::default())?;
    Ok(delegate.log)
}

/// Parses and evaluates a secondary (OpenSCAD-style) dialect program.
pub fn run_scad(source: &str) -> (Vec<String>, Vec<String>) {
    let program = Program::parse(source, None, Dialect::Secondary).expect("parse scad");
    let mut delegate = RecordingDelegate::new();
    let mut builder = RecordingBuilder::default();
    shapescript::evaluate(&program, &mut delegate, &mut builder, EvalOptions::default()).expect("evaluate scad");
    (delegate.log, builder.built_tags)
}

pub fn run_with_options(source: &str, options: EvalOptions<'_>) -> Result<Vec<String>, shapescript::Error> {
    let program = Program::parse(source, None, Dialect::Primary)?;
    let mut delegate = RecordingDelegate::new();
    let mut builder = RecordingBuilder::default();
    shapescript::evaluate(&program, &mut delegate, &mut builder, options)?;
    Ok(delegate.log)
}
