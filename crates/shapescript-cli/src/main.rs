//! Thin embedder binary: implements [`shapescript::Delegate`] and
//! [`shapescript::GeometryBuilder`] against stdout and the local filesystem,
//! so the crate is runnable end-to-end without a real geometry kernel
//! attached (spec §6, SPEC_FULL §13). Mirrors the teacher's `StdPrint`
//! default writer: this binary is the one place allowed to write to
//! stdout/stderr directly.

use std::{env, fs, path::Path, process::ExitCode, time::Instant};

use shapescript::{BuildArgs, Delegate, Dialect, EvalOptions, Geometry, GeometryObject, Program, Value};

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();
    let file_path = if args.len() > 1 { &args[1] } else { "example.shape" };

    let source = match fs::read_to_string(file_path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("error reading '{file_path}': {err}");
            return ExitCode::FAILURE;
        }
    };

    let dialect = Program::dialect_for_extension(file_path);
    let program = match Program::parse(&source, Some(file_path), dialect) {
        Ok(program) => program,
        Err(err) => {
            eprintln!("{}", err.render(&source));
            return ExitCode::FAILURE;
        }
    };

    let mut delegate = StdDelegate::new(file_path);
    let mut builder = CountingBuilder::default();

    let start = Instant::now();
    let result = shapescript::evaluate(&program, &mut delegate, &mut builder, EvalOptions::default());
    let elapsed = start.elapsed();

    match result {
        Ok(scene) => {
            eprintln!(
                "evaluated {} top-level node(s), {} geometry build(s), in {elapsed:?}",
                scene.children.len(),
                builder.built
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{}", err.render(&program.source));
            ExitCode::FAILURE
        }
    }
}

/// Placeholder geometry handle: the CLI has no real polygon/mesh kernel
/// attached, so a build() call only records the tag it was asked to produce.
#[derive(Debug)]
struct PlaceholderGeometry {
    tag: String,
}

impl GeometryObject for PlaceholderGeometry {}

/// Counts builds and tags them by name; a real embedder would hand these
/// parameters to a triangulation/CSG kernel instead.
#[derive(Default)]
struct CountingBuilder {
    built: usize,
}

impl shapescript::GeometryBuilder for CountingBuilder {
    fn build(&mut self, args: BuildArgs) -> Result<Geometry, String> {
        self.built += 1;
        Ok(Geometry(std::rc::Rc::new(PlaceholderGeometry { tag: args.tag.to_string() })))
    }
}

/// Resolves imports relative to the importing file and reads them from disk;
/// logs `print`/`debug` to stdout, one line per statement.
struct StdDelegate {
    base_dir: std::path::PathBuf,
}

impl StdDelegate {
    fn new(entry_path: &str) -> Self {
        let base_dir = Path::new(entry_path).parent().map_or_else(|| Path::new(".").to_path_buf(), Path::to_path_buf);
        Self { base_dir }
    }
}

impl Delegate for StdDelegate {
    fn resolve_url(&mut self, path: &str, base: Option<&str>) -> Result<String, String> {
        let base_dir = base.and_then(|b| Path::new(b).parent()).unwrap_or(&self.base_dir);
        base_dir.join(path).to_str().map(str::to_owned).ok_or_else(|| format!("non-UTF8 path '{path}'"))
    }

    fn import_geometry(&mut self, url: &str) -> Result<Geometry, String> {
        Err(format!("no geometry importer configured for '{url}'"))
    }

    fn debug_log(&mut self, values: &[Value]) {
        let rendered: Vec<String> = values.iter().map(std::string::ToString::to_string).collect();
        println!("{}", rendered.join(" "));
    }

    fn read_source(&mut self, url: &str) -> Result<Option<String>, String> {
        match fs::read_to_string(url) {
            Ok(text) => Ok(Some(text)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.to_string()),
        }
    }
}
