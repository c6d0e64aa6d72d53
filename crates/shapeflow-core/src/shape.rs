//! Shapes and the containers that carry them between machines.
//!
//! A [`Shape`] is a small value (kind, color, rotation, stacked layers) with
//! structural equality: tags and size never take part in a match. Packages
//! and dicts group shapes the way lists, tuples and dicts group values.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Size given to freshly created shapes.
pub const DEFAULT_SIZE: u32 = 40;

// ---------------------------------------------------------------------------
// Kind and color
// ---------------------------------------------------------------------------

/// A name that is not part of a closed vocabulary (shape kinds, colors).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {what} '{name}'")]
pub struct UnknownName {
    pub what: &'static str,
    pub name: String,
}

/// The outline of a shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeKind {
    #[default]
    Circle,
    Square,
    Triangle,
    Diamond,
    Star,
    Hexagon,
}

impl ShapeKind {
    pub const ALL: [ShapeKind; 6] = [
        ShapeKind::Circle,
        ShapeKind::Square,
        ShapeKind::Triangle,
        ShapeKind::Diamond,
        ShapeKind::Star,
        ShapeKind::Hexagon,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ShapeKind::Circle => "circle",
            ShapeKind::Square => "square",
            ShapeKind::Triangle => "triangle",
            ShapeKind::Diamond => "diamond",
            ShapeKind::Star => "star",
            ShapeKind::Hexagon => "hexagon",
        }
    }
}

impl FromStr for ShapeKind {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownName {
                what: "shape kind",
                name: s.to_string(),
            })
    }
}

impl fmt::Display for ShapeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The eight paintable colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Red,
    Green,
    Blue,
    Yellow,
    Purple,
    Orange,
    #[default]
    White,
    Gray,
}

impl Color {
    pub const ALL: [Color; 8] = [
        Color::Red,
        Color::Green,
        Color::Blue,
        Color::Yellow,
        Color::Purple,
        Color::Orange,
        Color::White,
        Color::Gray,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Color::Red => "red",
            Color::Green => "green",
            Color::Blue => "blue",
            Color::Yellow => "yellow",
            Color::Purple => "purple",
            Color::Orange => "orange",
            Color::White => "white",
            Color::Gray => "gray",
        }
    }
}

impl FromStr for Color {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownName {
                what: "color",
                name: s.to_string(),
            })
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Tags
// ---------------------------------------------------------------------------

/// Free-form metadata attached to a shape (`half`, `loop_index`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TagValue {
    Int(i64),
    Text(String),
}

impl From<&str> for TagValue {
    fn from(v: &str) -> Self {
        TagValue::Text(v.to_string())
    }
}

impl From<i64> for TagValue {
    fn from(v: i64) -> Self {
        TagValue::Int(v)
    }
}

impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagValue::Int(v) => write!(f, "{v}"),
            TagValue::Text(v) => f.write_str(v),
        }
    }
}

// ---------------------------------------------------------------------------
// Shape
// ---------------------------------------------------------------------------

/// The value that flows through the factory.
///
/// Operators mutate in place and return `&mut Self` so they chain:
/// `shape.rotate(90).paint("red")`. [`Shape::cut`] is the exception and
/// leaves the original untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shape {
    pub kind: ShapeKind,
    pub color: Color,
    #[serde(default, deserialize_with = "deserialize_rotation")]
    rotation: u16,
    #[serde(default = "default_size")]
    pub size: u32,
    #[serde(default)]
    pub layers: Vec<Shape>,
    #[serde(default)]
    pub tags: BTreeMap<String, TagValue>,
}

fn default_size() -> u32 {
    DEFAULT_SIZE
}

fn normalize_degrees(degrees: i64) -> u16 {
    degrees.rem_euclid(360) as u16
}

fn deserialize_rotation<'de, D: Deserializer<'de>>(de: D) -> Result<u16, D::Error> {
    let raw = i64::deserialize(de)?;
    Ok(normalize_degrees(raw))
}

impl Shape {
    pub fn new(kind: ShapeKind, color: Color) -> Self {
        Self {
            kind,
            color,
            rotation: 0,
            size: DEFAULT_SIZE,
            layers: Vec::new(),
            tags: BTreeMap::new(),
        }
    }

    /// Build a shape from names, falling back to a white circle part by part.
    pub fn from_names(kind: &str, color: &str) -> Self {
        Self::new(kind.parse().unwrap_or_default(), color.parse().unwrap_or_default())
    }

    /// Rotation in degrees, always in `0..360`.
    pub fn rotation(&self) -> u16 {
        self.rotation
    }

    /// Add `degrees` (may be negative) and normalize modulo 360.
    pub fn rotate(&mut self, degrees: i32) -> &mut Self {
        self.rotation = normalize_degrees(i64::from(self.rotation) + i64::from(degrees));
        self
    }

    /// Repaint with a named color. Unknown names are ignored.
    pub fn paint(&mut self, color: &str) -> &mut Self {
        if let Ok(color) = color.parse::<Color>() {
            self.color = color;
        }
        self
    }

    pub fn set_color(&mut self, color: Color) -> &mut Self {
        self.color = color;
        self
    }

    /// Append a deep copy of `other` as a new top layer.
    pub fn stack(&mut self, other: &Shape) -> &mut Self {
        self.layers.push(other.clone());
        self
    }

    /// Split into left and right halves. The original is unaffected.
    pub fn cut(&self) -> (Shape, Shape) {
        let mut left = self.clone();
        let mut right = self.clone();
        left.size = self.size / 2;
        right.size = self.size / 2;
        left.set_tag("half", "left");
        right.set_tag("half", "right");
        (left, right)
    }

    /// Structural equality: kind, color, rotation and layers (recursively).
    pub fn matches(&self, target: &Shape) -> bool {
        self.kind == target.kind
            && self.color == target.color
            && self.rotation == target.rotation
            && self.layers.len() == target.layers.len()
            && self
                .layers
                .iter()
                .zip(&target.layers)
                .all(|(mine, theirs)| mine.matches(theirs))
    }

    pub fn tag(&self, key: &str) -> Option<&TagValue> {
        self.tags.get(key)
    }

    pub fn set_tag(&mut self, key: &str, value: impl Into<TagValue>) -> &mut Self {
        self.tags.insert(key.to_string(), value.into());
        self
    }
}

/// Equality is structural; see [`Shape::matches`].
impl PartialEq for Shape {
    fn eq(&self, other: &Self) -> bool {
        self.matches(other)
    }
}

impl Eq for Shape {}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Shape({}, {}, rot={})", self.kind, self.color, self.rotation)?;
        if !self.layers.is_empty() {
            write!(f, "+{} layers", self.layers.len())?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Structural spec (targets, script literals)
// ---------------------------------------------------------------------------

/// A structural description of a shape, as written in level data.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ShapeSpec {
    #[serde(alias = "type", alias = "shape_type", default)]
    pub kind: ShapeKind,
    #[serde(default)]
    pub color: Color,
    #[serde(default)]
    pub rotation: i32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub layers: Vec<ShapeSpec>,
}

impl ShapeSpec {
    pub fn new(kind: ShapeKind, color: Color) -> Self {
        Self {
            kind,
            color,
            rotation: 0,
            layers: Vec::new(),
        }
    }

    pub fn build(&self) -> Shape {
        let mut shape = Shape::new(self.kind, self.color);
        shape.rotate(self.rotation);
        shape.layers = self.layers.iter().map(ShapeSpec::build).collect();
        shape
    }

    pub fn from_shape(shape: &Shape) -> Self {
        Self {
            kind: shape.kind,
            color: shape.color,
            rotation: i32::from(shape.rotation()),
            layers: shape.layers.iter().map(ShapeSpec::from_shape).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Containers
// ---------------------------------------------------------------------------

/// Raised when appending to a tuple-like package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("package is a tuple and cannot be modified")]
pub struct PackageImmutableError;

/// An ordered group of shapes: a list (mutable) or a tuple (immutable).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ShapePackage {
    mutable: bool,
    items: Vec<Shape>,
}

impl ShapePackage {
    /// An empty, mutable list package.
    pub fn list() -> Self {
        Self {
            mutable: true,
            items: Vec::new(),
        }
    }

    /// A mutable list package holding `items`.
    pub fn list_of(items: Vec<Shape>) -> Self {
        Self {
            mutable: true,
            items,
        }
    }

    /// A frozen tuple package.
    pub fn tuple(items: Vec<Shape>) -> Self {
        Self {
            mutable: false,
            items,
        }
    }

    pub fn is_mutable(&self) -> bool {
        self.mutable
    }

    pub fn append(&mut self, shape: Shape) -> Result<(), PackageImmutableError> {
        if !self.mutable {
            return Err(PackageImmutableError);
        }
        self.items.push(shape);
        Ok(())
    }

    /// Remove the last shape. Tuples never yield.
    pub fn pop(&mut self) -> Option<Shape> {
        if self.mutable { self.items.pop() } else { None }
    }

    pub fn get(&self, index: usize) -> Option<&Shape> {
        self.items.get(index)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Shape> {
        self.items.iter()
    }

    pub fn unpack(self) -> Vec<Shape> {
        self.items
    }
}

/// Shapes stored under unique string keys, in insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ShapeDict {
    entries: Vec<(String, Shape)>,
}

impl ShapeDict {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace. Replacing keeps the key's original position.
    pub fn set(&mut self, key: impl Into<String>, shape: Shape) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = shape,
            None => self.entries.push((key, shape)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Shape> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, s)| s)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &Shape> {
        self.entries.iter().map(|(_, s)| s)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_values(self) -> Vec<Shape> {
        self.entries.into_iter().map(|(_, s)| s).collect()
    }
}

// ---------------------------------------------------------------------------
// Item
// ---------------------------------------------------------------------------

/// Anything a connection can carry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Item {
    Shape(Shape),
    Package(ShapePackage),
    Dict(ShapeDict),
}

impl Item {
    pub fn as_shape(&self) -> Option<&Shape> {
        match self {
            Item::Shape(s) => Some(s),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Item::Shape(_) => "shape",
            Item::Package(p) if p.is_mutable() => "list",
            Item::Package(_) => "tuple",
            Item::Dict(_) => "dict",
        }
    }
}

impl From<Shape> for Item {
    fn from(shape: Shape) -> Self {
        Item::Shape(shape)
    }
}

impl From<ShapePackage> for Item {
    fn from(package: ShapePackage) -> Self {
        Item::Package(package)
    }
}

impl From<ShapeDict> for Item {
    fn from(dict: ShapeDict) -> Self {
        Item::Dict(dict)
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Item::Shape(s) => s.fmt(f),
            Item::Package(p) => write!(f, "{}[{}]", self.type_name(), p.len()),
            Item::Dict(d) => write!(f, "dict[{}]", d.len()),
        }
    }
}
