//! Typed value model (spec §3 "Values", §4.G "Value model").
//!
//! Values compare by structural equality except tuples, whose `=`/`<>`
//! pairwise-consume one element from each side and pass the remainder
//! through unchanged (spec §4.G, §8 scenario 5). Coercion from a tuple to a
//! more specific type (scalar, size, vector, color, rotation) happens at the
//! call site via [`Value::coerce`].

use std::{fmt, rc::Rc};

use crate::diagnostics::{Error, ErrorKind, RuntimeErrorKind};
use crate::source_range::SourceRange;

/// An implementation epsilon that scales/sizes are clamped away from zero by.
pub const EPSILON: f64 = 1e-8;

/// Marker trait for opaque geometry produced by the external geometry
/// collaborator (spec §6 "Geometry builder interface"). The interpreter
/// never inspects the contents; it only clones the handle by reference.
pub trait GeometryObject: fmt::Debug {}

/// A reference-counted opaque geometry handle shared by the scene tree
/// (spec §3 "Geometry handles are produced by the evaluator calling the
/// geometry collaborator; they are referenced by the scene tree").
#[derive(Debug, Clone)]
pub struct Geometry(pub Rc<dyn GeometryObject>);

impl PartialEq for Geometry {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Texture {
    pub name: String,
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Range {
    pub from: f64,
    pub to: f64,
    pub step: f64,
}

impl Range {
    /// Number of values a `for` loop over this range would visit (spec §4.I,
    /// §8 "Loop semantics"): reversed ranges (wrong-signed step) are empty,
    /// not descending.
    #[must_use]
    pub fn iteration_count(&self) -> usize {
        if self.step == 0.0 {
            return 0;
        }
        let span = (self.to - self.from) / self.step;
        if span < 0.0 {
            0
        } else {
            span.floor() as usize + 1
        }
    }

    #[must_use]
    pub fn nth(&self, i: usize) -> f64 {
        self.from + self.step * i as f64
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Boolean(bool),
    String(String),
    Color { r: f64, g: f64, b: f64, a: f64 },
    Vector { x: f64, y: f64, z: f64 },
    /// Nonzero, epsilon-clamped size (spec §3 invariant).
    Size { w: f64, h: f64, d: f64 },
    /// Angle components stored in half-turns (1.0 == 180 degrees).
    Rotation { roll: f64, pitch: f64, yaw: f64 },
    Texture(Texture),
    Path(Geometry),
    Mesh(Geometry),
    Range(Range),
    Tuple(Vec<Value>),
}

/// Type tags used in diagnostics and coercion-target descriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Type {
    Number,
    Boolean,
    String,
    Color,
    Vector,
    Size,
    Rotation,
    Texture,
    Path,
    Mesh,
    Range,
    Tuple,
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::String => "string",
            Self::Color => "color",
            Self::Vector => "vector",
            Self::Size => "size",
            Self::Rotation => "rotation",
            Self::Texture => "texture",
            Self::Path => "path",
            Self::Mesh => "mesh",
            Self::Range => "range",
            Self::Tuple => "tuple",
        };
        f.write_str(s)
    }
}

fn clamp_nonzero(v: f64) -> f64 {
    if v.abs() < EPSILON {
        if v.is_sign_negative() { -EPSILON } else { EPSILON }
    } else {
        v
    }
}

impl Value {
    #[must_use]
    pub fn ty(&self) -> Type {
        match self {
            Self::Number(_) => Type::Number,
            Self::Boolean(_) => Type::Boolean,
            Self::String(_) => Type::String,
            Self::Color { .. } => Type::Color,
            Self::Vector { .. } => Type::Vector,
            Self::Size { .. } => Type::Size,
            Self::Rotation { .. } => Type::Rotation,
            Self::Texture(_) => Type::Texture,
            Self::Path(_) => Type::Path,
            Self::Mesh(_) => Type::Mesh,
            Self::Range(_) => Type::Range,
            Self::Tuple(_) => Type::Tuple,
        }
    }

    #[must_use]
    pub const fn size(w: f64, h: f64, d: f64) -> Self {
        Self::Size { w, h, d }
    }

    /// Builds a size value, clamping each component away from zero.
    #[must_use]
    pub fn size_clamped(w: f64, h: f64, d: f64) -> Self {
        Self::Size {
            w: clamp_nonzero(w),
            h: clamp_nonzero(h),
            d: clamp_nonzero(d),
        }
    }

    /// Flattens nested tuples into a single flat list, as assignment/argument
    /// binding does (spec §3 "tuple ... may be flattened on assignment").
    #[must_use]
    pub fn flatten(values: Vec<Self>) -> Vec<Self> {
        let mut out = Vec::with_capacity(values.len());
        for v in values {
            match v {
                Self::Tuple(inner) => out.extend(Self::flatten(inner)),
                other => out.push(other),
            }
        }
        out
    }

    /// Coerces a list of evaluated argument values (already flattened) to the
    /// expected type, per spec §4.G's tuple-interpretation rules. `context`
    /// and `range` are used only to build a `typeMismatch` error.
    pub fn coerce(values: &[Self], expected: Type, context: &str, range: SourceRange) -> Result<Self, Error> {
        let mismatch = |got: String| {
            Error::new(
                ErrorKind::Runtime(RuntimeErrorKind::TypeMismatch {
                    context: context.to_owned(),
                    index: None,
                    expected: expected.to_string(),
                    got,
                }),
                range,
            )
        };
        // A single already-typed value of the right shape passes straight through.
        if values.len() == 1 {
            if let Some(v) = Self::coerce_single(&values[0], expected) {
                return Ok(v);
            }
        }
        let nums: Option<Vec<f64>> = values.iter().map(|v| if let Self::Number(n) = v { Some(*n) } else { None }).collect();
        match (expected, values.len()) {
            (Type::Number, 1) => {
                if let Self::Number(n) = values[0] {
                    return Ok(Self::Number(n));
                }
            }
            (Type::Size, 1) => {
                if let Some(nums) = &nums {
                    return Ok(Self::size_clamped(nums[0], nums[0], nums[0]));
                }
            }
            (Type::Color, 1) => {
                if let Some(nums) = &nums {
                    return Ok(Self::Color { r: nums[0], g: nums[0], b: nums[0], a: 1.0 });
                }
            }
            (Type::Size, 2) => {
                if let Some(nums) = &nums {
                    return Ok(Self::size_clamped(nums[0], nums[1], 1.0));
                }
            }
            (Type::Color, 2) => {
                if let Some(nums) = &nums {
                    return Ok(Self::Color { r: nums[0], g: nums[0], b: nums[0], a: nums[1] });
                }
                if let Self::Color { r, g, b, .. } = values[0] {
                    if let Self::Number(a) = values[1] {
                        return Ok(Self::Color { r, g, b, a });
                    }
                }
            }
            (Type::Vector | Type::Size | Type::Rotation, 3) => {
                if let Some(nums) = &nums {
                    return Ok(match expected {
                        Type::Vector => Self::Vector { x: nums[0], y: nums[1], z: nums[2] },
                        Type::Size => Self::size_clamped(nums[0], nums[1], nums[2]),
                        Type::Rotation => Self::Rotation { roll: nums[0], pitch: nums[1], yaw: nums[2] },
                        _ => unreachable!(),
                    });
                }
            }
            (Type::Color, 3) => {
                if let Some(nums) = &nums {
                    return Ok(Self::Color { r: nums[0], g: nums[1], b: nums[2], a: 1.0 });
                }
            }
            (Type::Color, 4) => {
                if let Some(nums) = &nums {
                    return Ok(Self::Color { r: nums[0], g: nums[1], b: nums[2], a: nums[3] });
                }
                if let Self::Color { r, g, b, .. } = values[0] {
                    if let Self::Number(a) = values[3] {
                        return Ok(Self::Color { r, g, b, a });
                    }
                }
            }
            (Type::Tuple, _) => return Ok(Self::Tuple(values.to_vec())),
            _ => {}
        }
        let got = if values.len() == 1 {
            values[0].ty().to_string()
        } else {
            format!("tuple of {} values", values.len())
        };
        Err(mismatch(got))
    }

    fn coerce_single(value: &Self, expected: Type) -> Option<Self> {
        if value.ty() == expected {
            return Some(value.clone());
        }
        None
    }

    /// Member lookup (spec §4.G "Member lookup"): returns the member value,
    /// or the full list of valid member names on failure (for suggestions).
    pub fn member(&self, name: &str, range: SourceRange) -> Result<Self, Error> {
        let table = self.member_table();
        if let Some(v) = self.lookup_member(name) {
            return Ok(v);
        }
        let suggestion = crate::diagnostics::suggest(name, table.iter().copied());
        let mut err = Error::new(
            ErrorKind::Runtime(RuntimeErrorKind::UnknownMember {
                name: name.to_owned(),
                of: self.ty().to_string(),
            }),
            range,
        );
        if let Some(s) = suggestion {
            err = err.with_suggestion(s);
        }
        Err(err)
    }

    fn member_table(&self) -> &'static [&'static str] {
        match self {
            Self::Vector { .. } | Self::Tuple(_) => {
                &["x", "y", "z", "width", "height", "depth", "roll", "pitch", "yaw", "red", "green", "blue", "alpha"]
            }
            Self::Color { .. } => &["red", "green", "blue", "alpha"],
            Self::Size { .. } => &["width", "height", "depth"],
            Self::Rotation { .. } => &["roll", "pitch", "yaw"],
            Self::Range(_) => &["start", "end", "step"],
            _ => &["first"],
        }
    }

    fn lookup_member(&self, name: &str) -> Option<Self> {
        match self {
            Self::Vector { x, y, z } => match name {
                "x" | "width" | "red" | "roll" | "first" => Some(Self::Number(*x)),
                "y" | "height" | "green" | "pitch" | "second" => Some(Self::Number(*y)),
                "z" | "depth" | "blue" | "yaw" | "third" => Some(Self::Number(*z)),
                "alpha" => Some(Self::Number(1.0)),
                _ => ordinal_value(name).and_then(|i| [*x, *y, *z].get(i - 1).copied()).map(Self::Number),
            },
            Self::Size { w, h, d } => match name {
                "width" | "x" | "first" => Some(Self::Number(*w)),
                "height" | "y" | "second" => Some(Self::Number(*h)),
                "depth" | "z" | "third" => Some(Self::Number(*d)),
                _ => ordinal_value(name).and_then(|i| [*w, *h, *d].get(i - 1).copied()).map(Self::Number),
            },
            Self::Rotation { roll, pitch, yaw } => match name {
                "roll" | "first" => Some(Self::Number(*roll)),
                "pitch" | "second" => Some(Self::Number(*pitch)),
                "yaw" | "third" => Some(Self::Number(*yaw)),
                _ => None,
            },
            Self::Color { r, g, b, a } => match name {
                "red" | "first" => Some(Self::Number(*r)),
                "green" | "second" => Some(Self::Number(*g)),
                "blue" | "third" => Some(Self::Number(*b)),
                "alpha" | "fourth" => Some(Self::Number(*a)),
                _ => ordinal_value(name).and_then(|i| [*r, *g, *b, *a].get(i - 1).copied()).map(Self::Number),
            },
            Self::Range(r) => match name {
                "start" | "first" => Some(Self::Number(r.from)),
                "end" | "second" => Some(Self::Number(r.to)),
                "step" | "third" => Some(Self::Number(r.step)),
                _ => None,
            },
            Self::Tuple(items) => match name {
                "x" | "width" | "red" | "roll" | "first" => items.first().cloned(),
                "y" | "height" | "green" | "pitch" | "second" => items.get(1).cloned(),
                "z" | "depth" | "blue" | "yaw" | "third" => items.get(2).cloned(),
                "alpha" | "fourth" => items.get(3).cloned().or(Some(Self::Number(1.0))),
                _ => ordinal_value(name).and_then(|i| items.get(i - 1).cloned()),
            },
            Self::Number(_) => match name {
                "first" | "x" => Some(self.clone()),
                _ => None,
            },
            _ => match name {
                "first" => Some(self.clone()),
                _ => None,
            },
        }
    }

    /// Truthiness for `if`/condition evaluation; non-boolean values are a
    /// type mismatch, not coerced (spec §4.I "evaluate condition to boolean").
    pub fn as_boolean(&self, range: SourceRange) -> Result<bool, Error> {
        match self {
            Self::Boolean(b) => Ok(*b),
            other => Err(Error::new(
                ErrorKind::Runtime(RuntimeErrorKind::TypeMismatch {
                    context: "if condition".to_owned(),
                    index: None,
                    expected: Type::Boolean.to_string(),
                    got: other.ty().to_string(),
                }),
                range,
            )),
        }
    }

    /// Implements spec §4.G's element-wise comparison: pairs elements of two
    /// tuples left-to-right, passing unmatched tail elements through
    /// unchanged, interleaved with the booleans produced for matched pairs.
    #[must_use]
    pub fn compare_flattened(lhs: &[Self], rhs: &[Self], op: impl Fn(&Self, &Self) -> bool) -> Vec<Self> {
        let mut out = Vec::new();
        let n = lhs.len().min(rhs.len());
        for i in 0..n {
            out.push(Self::Boolean(op(&lhs[i], &rhs[i])));
        }
        out.extend_from_slice(&lhs[n..]);
        out.extend_from_slice(&rhs[n..]);
        out
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::String(s) => write!(f, "{s}"),
            Self::Color { r, g, b, a } => {
                if let Some(name) = named_color_name(*r, *g, *b, *a) {
                    write!(f, "{name}")
                } else if (*a - 1.0).abs() < EPSILON {
                    write!(f, "({r},{g},{b})")
                } else {
                    write!(f, "({r},{g},{b},{a})")
                }
            }
            Self::Vector { x, y, z } => write!(f, "({x},{y},{z})"),
            Self::Size { w, h, d } => write!(f, "({w},{h},{d})"),
            Self::Rotation { roll, pitch, yaw } => write!(f, "({roll},{pitch},{yaw})"),
            Self::Texture(t) => write!(f, "texture({})", t.name),
            Self::Path(_) => write!(f, "path"),
            Self::Mesh(_) => write!(f, "mesh"),
            Self::Range(r) => write!(f, "range({},{},{})", r.from, r.to, r.step),
            Self::Tuple(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
        }
    }
}

/// Reverse of `symbols::named_color`: the name a color prints as when it
/// exactly matches one of the root scope's named color constants (spec §8
/// scenario 2: `color 1 0 0` then `print color` logs `[red]`, not a tuple).
fn named_color_name(r: f64, g: f64, b: f64, a: f64) -> Option<&'static str> {
    const NAMES: &[(&str, f64, f64, f64, f64)] = &[
        ("red", 1.0, 0.0, 0.0, 1.0),
        ("green", 0.0, 1.0, 0.0, 1.0),
        ("blue", 0.0, 0.0, 1.0, 1.0),
        ("yellow", 1.0, 1.0, 0.0, 1.0),
        ("cyan", 0.0, 1.0, 1.0, 1.0),
        ("magenta", 1.0, 0.0, 1.0, 1.0),
        ("white", 1.0, 1.0, 1.0, 1.0),
        ("black", 0.0, 0.0, 0.0, 1.0),
        ("gray", 0.5, 0.5, 0.5, 1.0),
        ("orange", 1.0, 0.5, 0.0, 1.0),
        ("clear", 0.0, 0.0, 0.0, 0.0),
    ];
    NAMES.iter().find(|(_, nr, ng, nb, na)| *nr == r && *ng == g && *nb == b && *na == a).map(|(name, ..)| *name)
}

/// English ordinal word for `1..=99` (`1 -> "first"`, `21 -> "twentyfirst"`,
/// `99 -> "ninetyninth"`), used by member lookup's ordinal names.
#[must_use]
pub fn ordinal_word(n: usize) -> Option<String> {
    const UNITS: [&str; 20] = [
        "first", "second", "third", "fourth", "fifth", "sixth", "seventh", "eighth", "ninth", "tenth", "eleventh",
        "twelfth", "thirteenth", "fourteenth", "fifteenth", "sixteenth", "seventeenth", "eighteenth", "nineteenth",
        "twentieth",
    ];
    if n == 0 || n > 99 {
        return None;
    }
    if n <= 20 {
        return Some(UNITS[n - 1].to_owned());
    }
    const TENS_WORDS: [&str; 8] = ["twenty", "thirty", "forty", "fifty", "sixty", "seventy", "eighty", "ninety"];
    const TENS_ORDINAL: [&str; 8] = [
        "twentieth", "thirtieth", "fortieth", "fiftieth", "sixtieth", "seventieth", "eightieth", "ninetieth",
    ];
    const ONES_ORDINAL: [&str; 9] = ["first", "second", "third", "fourth", "fifth", "sixth", "seventh", "eighth", "ninth"];
    let tens_index = n / 10 - 2;
    let ones = n % 10;
    if ones == 0 {
        Some(TENS_ORDINAL[tens_index].to_owned())
    } else {
        Some(format!("{}{}", TENS_WORDS[tens_index], ONES_ORDINAL[ones - 1]))
    }
}

/// Reverse of [`ordinal_word`]: the 1-based index named by an ordinal word,
/// if any, for `1..=99`.
#[must_use]
pub fn ordinal_value(name: &str) -> Option<usize> {
    (1..=99).find(|&n| ordinal_word(n).as_deref() == Some(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordinal_round_trip() {
        assert_eq!(ordinal_word(1).as_deref(), Some("first"));
        assert_eq!(ordinal_word(21).as_deref(), Some("twentyfirst"));
        assert_eq!(ordinal_word(30).as_deref(), Some("thirtieth"));
        assert_eq!(ordinal_word(99).as_deref(), Some("ninetyninth"));
        assert_eq!(ordinal_value("ninetyninth"), Some(99));
        assert_eq!(ordinal_value("twentyfirst"), Some(21));
    }

    #[test]
    fn coerce_triple_to_vector() {
        let values = vec![Value::Number(1.0), Value::Number(2.0), Value::Number(3.0)];
        let v = Value::coerce(&values, Type::Vector, "test", SourceRange::empty_at(0)).unwrap();
        assert_eq!(v, Value::Vector { x: 1.0, y: 2.0, z: 3.0 });
    }

    #[test]
    fn coerce_single_scalar_to_color_gray() {
        let values = vec![Value::Number(0.5)];
        let v = Value::coerce(&values, Type::Color, "test", SourceRange::empty_at(0)).unwrap();
        assert_eq!(v, Value::Color { r: 0.5, g: 0.5, b: 0.5, a: 1.0 });
    }

    #[test]
    fn size_is_clamped_away_from_zero() {
        let v = Value::size_clamped(0.0, -0.0, 2.0);
        assert!(matches!(v, Value::Size { w, h, .. } if w > 0.0 && h < 0.0));
    }

    #[test]
    fn tuple_comparison_interleaves_remainder() {
        let lhs = vec![Value::Number(1.0), Value::Number(2.0), Value::Number(3.0)];
        let rhs = vec![Value::Number(1.0)];
        let out = Value::compare_flattened(&lhs, &rhs, |a, b| a == b);
        assert_eq!(out, vec![Value::Boolean(true), Value::Number(2.0), Value::Number(3.0)]);
    }

    #[test]
    fn range_iteration_count_matches_spec() {
        assert_eq!(Range { from: 1.0, to: 5.0, step: 1.0 }.iteration_count(), 5);
        assert_eq!(Range { from: 3.0, to: 1.0, step: 1.0 }.iteration_count(), 0);
    }
}
