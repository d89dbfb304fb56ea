//! External collaborator interfaces (spec §6 "External interfaces").
//!
//! The evaluator never touches a mesh file, rasterizes a font, or writes to
//! a terminal directly; every such effect is routed through one of these two
//! embedder-supplied traits, kept object-safe so embedders can pass
//! `&mut dyn Trait` (spec §9 "Source-language closures": explicit builder
//! objects carrying their parameters, rather than captured closures).

use crate::value::{Geometry, Value};

/// Geometry tag enumeration consumed by [`GeometryBuilder::build`] (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "camelCase")]
pub enum GeometryTag {
    Cone,
    Cylinder,
    Sphere,
    Cube,
    Extrude,
    Lathe,
    Loft,
    Fill,
    Union,
    Difference,
    Intersection,
    Xor,
    Stencil,
    Path,
    Mesh,
}

/// The cumulative transform carried by an evaluation context (spec §3
/// "cumulative transform/material state").
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: (f64, f64, f64),
    pub orientation: (f64, f64, f64),
    pub scale: (f64, f64, f64),
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: (0.0, 0.0, 0.0),
            orientation: (0.0, 0.0, 0.0),
            scale: (1.0, 1.0, 1.0),
        }
    }
}

impl Transform {
    /// Composes `self` (parent) with `child`, matching the spec's "cumulative
    /// transform = parent.transform composed with this context's transform".
    #[must_use]
    pub fn compose(&self, child: &Self) -> Self {
        Self {
            position: (
                self.position.0 + child.position.0 * self.scale.0,
                self.position.1 + child.position.1 * self.scale.1,
                self.position.2 + child.position.2 * self.scale.2,
            ),
            orientation: (
                self.orientation.0 + child.orientation.0,
                self.orientation.1 + child.orientation.1,
                self.orientation.2 + child.orientation.2,
            ),
            scale: (self.scale.0 * child.scale.0, self.scale.1 * child.scale.1, self.scale.2 * child.scale.2),
        }
    }
}

/// Ambient material state (spec §3 "shared material/transform state").
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub color: Value,
    pub texture: Option<Value>,
    pub opacity: f64,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            color: Value::Color { r: 1.0, g: 1.0, b: 1.0, a: 1.0 },
            texture: None,
            opacity: 1.0,
        }
    }
}

/// Parameters passed to [`GeometryBuilder::build`].
#[derive(Debug, Clone)]
pub struct BuildArgs {
    pub tag: GeometryTag,
    /// Path children collected from a path-type block body (circle/square/
    /// freeform `path` point lists), already evaluated to [`Value::Path`].
    pub paths: Vec<Geometry>,
    /// Mesh children (for CSG/group aggregation).
    pub children: Vec<Geometry>,
    pub transform: Transform,
    pub material: Material,
    /// Facet/segment count (spec §6: `cone(segments)`, `cylinder(segments)`,
    /// `sphere(segments)`, `lathe(paths, segments)`).
    pub segments: Option<u32>,
    /// Primitive size, when the tag names a sized primitive (cube/sphere/...).
    pub size: Option<(f64, f64, f64)>,
    /// `extrude`'s along-path parameter (spec §6 `extrude(paths, along)`).
    pub along: Option<Geometry>,
}

/// The embedder-supplied geometry collaborator (spec §6 "Geometry builder
/// interface"). The evaluator is blind to what a handle actually contains.
pub trait GeometryBuilder {
    fn build(&mut self, args: BuildArgs) -> Result<Geometry, String>;
}

/// The embedder-supplied delegate (spec §6 "Delegate interface").
pub trait Delegate {
    /// Maps a source-relative path to an absolute URL; may record it in a
    /// tracked-resources set.
    fn resolve_url(&mut self, path: &str, base: Option<&str>) -> Result<String, String>;

    /// Loads geometry from a non-`.shape` file (spec §6).
    fn import_geometry(&mut self, url: &str) -> Result<Geometry, String>;

    /// Records a `print`/`debug` emission.
    fn debug_log(&mut self, values: &[Value]);

    /// Reads the text contents of a resolved `.shape`/`.scad` URL for
    /// `import`. Returns `None` when the file does not exist.
    fn read_source(&mut self, url: &str) -> Result<Option<String>, String>;
}

/// The hierarchical scene produced by a successful evaluation (spec §6
/// "evaluate(program, delegate, cancel?) -> scene | error").
#[derive(Debug, Clone)]
pub struct Scene {
    pub children: Vec<Value>,
}
