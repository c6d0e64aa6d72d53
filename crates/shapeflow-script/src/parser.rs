use regex::Regex;
use serde::{Deserialize, Serialize};
use shapeflow_core::expr::Expr;
use shapeflow_core::id::GridPosition;
use shapeflow_core::machine::{
    MachineConfig, MachineKind, StageSpec, DEFAULT_CONDITION, DEFAULT_FILTER, DEFAULT_FUNCTION_NAME,
    DEFAULT_PAINT_COLOR, DEFAULT_TRANSFORM, MAX_LOOP_COUNT,
};
use shapeflow_core::shape::{Color, ShapeKind, ShapeSpec};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use tracing::{debug, info};

static ASSIGNMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z_]\w*)\s*=\s*([A-Za-z_]\w*)\s*\((.*)\)\s*(?:#.*)?$").expect("valid assignment pattern")
});

static CONNECTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z_]\w*)\s*\.\s*connect\s*\(\s*([A-Za-z_]\w*)\s*\)\s*(?:#.*)?$")
        .expect("valid connection pattern")
});

// ---------------------------------------------------------------------------
// Layout
// ---------------------------------------------------------------------------

/// Automatic placement of declared machines: a single row, left to right.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Column of the first declared machine.
    pub origin_x: i32,
    /// Columns between consecutive declarations.
    pub step_x: i32,
    pub row: i32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            origin_x: 1,
            step_x: 2,
            row: 3,
        }
    }
}

impl LayoutConfig {
    /// Cell of the `index`-th declaration (0-based).
    pub fn position(&self, index: usize) -> GridPosition {
        let index = i32::try_from(index).unwrap_or(i32::MAX);
        GridPosition::new(self.origin_x.saturating_add(self.step_x.saturating_mul(index)), self.row)
    }
}

// ---------------------------------------------------------------------------
// Results and errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParseErrorKind {
    /// The line is neither a well-formed assignment nor a connection.
    Syntax,
    UnknownMachineType,
    UndefinedVariable,
    /// A positional argument has the wrong form (non-integer count, bad
    /// expression, ...).
    InvalidArgument,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ParseErrorKind::Syntax => "syntax error",
            ParseErrorKind::UnknownMachineType => "unknown machine type",
            ParseErrorKind::UndefinedVariable => "undefined variable",
            ParseErrorKind::InvalidArgument => "invalid argument",
        })
    }
}

/// The first error of a parse. `line` is the 0-based line index.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} on line {}: {message}", line + 1)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    pub line: usize,
}

/// One machine declared by an assignment.
#[derive(Debug, Clone, PartialEq)]
pub struct MachineDeclaration {
    pub identifier: String,
    pub kind: MachineKind,
    pub position: GridPosition,
    /// Positional arguments as written, quotes stripped.
    pub args: Vec<String>,
    pub line: usize,
    pub config: MachineConfig,
}

/// Everything parsed before the first error (or the whole program).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParseResult {
    pub machines: Vec<MachineDeclaration>,
    /// Index pairs into `machines`, in source order.
    pub connections: Vec<(usize, usize)>,
    pub error: Option<ParseError>,
}

impl ParseResult {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// A line-local failure; the line number is attached by the parse loop.
struct LineError(ParseErrorKind, String);

type LineResult<T> = Result<T, LineError>;

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Translates program text into machine declarations and connections.
#[derive(Debug, Clone, Default)]
pub struct Parser {
    layout: LayoutConfig,
}

impl Parser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_layout(layout: LayoutConfig) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &LayoutConfig {
        &self.layout
    }

    /// Parse line by line, stopping at the first error.
    pub fn parse(&self, source: &str) -> ParseResult {
        let mut result = ParseResult::default();
        let mut names: HashMap<String, usize> = HashMap::new();

        for (line_no, raw) in source.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let outcome = if line.contains(".connect(") {
                self.connection(line, &names).map(|pair| result.connections.push(pair))
            } else if line.contains('=') {
                self.assignment(line, line_no, result.machines.len()).map(|decl| {
                    // Redeclaration shadows the earlier machine's name.
                    names.insert(decl.identifier.clone(), result.machines.len());
                    result.machines.push(decl);
                })
            } else {
                Err(LineError(
                    ParseErrorKind::Syntax,
                    format!("expected an assignment or a connection, found '{line}'"),
                ))
            };

            if let Err(LineError(kind, message)) = outcome {
                info!(line = line_no, %kind, %message, "parse failed");
                result.error = Some(ParseError {
                    kind,
                    message,
                    line: line_no,
                });
                return result;
            }
        }

        debug!(
            machines = result.machines.len(),
            connections = result.connections.len(),
            "parsed program"
        );
        result
    }

    fn connection(&self, line: &str, names: &HashMap<String, usize>) -> LineResult<(usize, usize)> {
        let caps = CONNECTION.captures(line).ok_or_else(|| {
            LineError(
                ParseErrorKind::Syntax,
                format!("malformed connection '{line}', expected 'a.connect(b)'"),
            )
        })?;
        let lookup = |name: &str| {
            names.get(name).copied().ok_or_else(|| {
                LineError(
                    ParseErrorKind::UndefinedVariable,
                    format!("'{name}' is not defined"),
                )
            })
        };
        Ok((lookup(&caps[1])?, lookup(&caps[2])?))
    }

    fn assignment(&self, line: &str, line_no: usize, index: usize) -> LineResult<MachineDeclaration> {
        let caps = ASSIGNMENT.captures(line).ok_or_else(|| {
            LineError(
                ParseErrorKind::Syntax,
                format!("malformed assignment '{line}', expected 'name = Machine(args)'"),
            )
        })?;
        let kind: MachineKind = caps[2].parse().map_err(|_| {
            LineError(
                ParseErrorKind::UnknownMachineType,
                format!("unknown machine type '{}'", &caps[2]),
            )
        })?;
        let args = split_args(&caps[3]);
        let config = kind_config(kind, &args)?;

        Ok(MachineDeclaration {
            identifier: caps[1].to_string(),
            kind,
            position: self.layout.position(index),
            args,
            line: line_no,
            config,
        })
    }
}

// ---------------------------------------------------------------------------
// Arguments
// ---------------------------------------------------------------------------

/// Split on commas outside quotes, trim, then strip one pair of matching
/// quotes. There is no escaping.
fn split_args(raw: &str) -> Vec<String> {
    if raw.trim().is_empty() {
        return Vec::new();
    }
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    for c in raw.chars() {
        match (quote, c) {
            (None, ',') => parts.push(std::mem::take(&mut current)),
            (None, '"' | '\'') => {
                quote = Some(c);
                current.push(c);
            }
            (Some(q), c) if c == q => {
                quote = None;
                current.push(c);
            }
            _ => current.push(c),
        }
    }
    parts.push(current);
    parts.iter().map(|p| strip_quotes(p.trim()).to_string()).collect()
}

fn strip_quotes(s: &str) -> &str {
    for q in ['"', '\''] {
        if s.len() >= 2 && s.starts_with(q) && s.ends_with(q) {
            return &s[1..s.len() - 1];
        }
    }
    s
}

fn int_arg<T: FromStr>(args: &[String], index: usize, what: &str) -> LineResult<Option<T>> {
    match args.get(index) {
        None => Ok(None),
        Some(raw) => raw.parse().map(Some).map_err(|_| {
            LineError(
                ParseErrorKind::InvalidArgument,
                format!("{what} must be an integer, got '{raw}'"),
            )
        }),
    }
}

fn positive_arg(args: &[String], index: usize, what: &str) -> LineResult<Option<usize>> {
    match int_arg::<usize>(args, index, what)? {
        Some(0) => Err(LineError(
            ParseErrorKind::InvalidArgument,
            format!("{what} must be at least 1"),
        )),
        other => Ok(other),
    }
}

fn loop_count_arg(args: &[String], index: usize) -> LineResult<Option<u32>> {
    match int_arg::<u32>(args, index, "loop count")? {
        Some(n) if n > MAX_LOOP_COUNT => Err(LineError(
            ParseErrorKind::InvalidArgument,
            format!("loop count must be at most {MAX_LOOP_COUNT}, got {n}"),
        )),
        other => Ok(other),
    }
}

fn expr_arg(args: &[String], index: usize, default: &str, what: &str) -> LineResult<String> {
    let src = args.get(index).map_or(default, String::as_str);
    Expr::parse(src)
        .map(|_| src.to_string())
        .map_err(|e| LineError(ParseErrorKind::InvalidArgument, format!("{what} '{src}': {e}")))
}

/// Kind-specific settings from positional arguments. Missing slots keep
/// their defaults and extra slots are ignored.
fn kind_config(kind: MachineKind, args: &[String]) -> LineResult<MachineConfig> {
    let arg = |i: usize| args.get(i).map(String::as_str);
    let mut cfg = MachineConfig::default();
    match kind {
        MachineKind::Source => {
            cfg.shape_type = Some(arg(0).and_then(|s| s.parse().ok()).unwrap_or_default());
            cfg.color = Some(arg(1).and_then(|s| s.parse().ok()).unwrap_or_default());
        }
        MachineKind::Painter => {
            cfg.target_color = Some(arg(0).unwrap_or(DEFAULT_PAINT_COLOR).to_string());
        }
        MachineKind::Rotator => cfg.degrees = int_arg(args, 0, "rotation")?,
        MachineKind::Splitter => {
            cfg.condition = Some(expr_arg(args, 0, DEFAULT_CONDITION, "condition")?);
        }
        MachineKind::Looper => cfg.loop_count = loop_count_arg(args, 0)?,
        MachineKind::Packer => cfg.pack_size = positive_arg(args, 0, "pack size")?,
        MachineKind::DictPacker => cfg.target_size = positive_arg(args, 0, "target size")?,
        MachineKind::Comprehension => {
            cfg.transform = Some(expr_arg(args, 0, DEFAULT_TRANSFORM, "transform")?);
            cfg.filter = Some(expr_arg(args, 1, DEFAULT_FILTER, "filter")?);
        }
        MachineKind::Function => {
            cfg.function_name = Some(arg(0).unwrap_or(DEFAULT_FUNCTION_NAME).to_string());
            let stages = args
                .iter()
                .skip(1)
                .map(|name| {
                    name.parse::<MachineKind>()
                        .map(|kind| StageSpec {
                            kind,
                            config: MachineConfig::default(),
                        })
                        .map_err(|_| {
                            LineError(
                                ParseErrorKind::InvalidArgument,
                                format!("unknown stage type '{name}'"),
                            )
                        })
                })
                .collect::<LineResult<Vec<_>>>()?;
            cfg.stages = Some(stages);
        }
        MachineKind::Output => {
            if !args.is_empty() {
                let kind: ShapeKind = arg(0).and_then(|s| s.parse().ok()).unwrap_or_default();
                let color: Color = arg(1).and_then(|s| s.parse().ok()).unwrap_or_default();
                cfg.target = Some(ShapeSpec::new(kind, color));
                cfg.required_count = Some(int_arg(args, 2, "required count")?.unwrap_or(1));
            }
        }
        MachineKind::Conveyor | MachineKind::Cutter | MachineKind::Stacker | MachineKind::Unpacker => {}
    }
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> ParseResult {
        Parser::new().parse(src)
    }

    #[test]
    fn split_respects_quotes() {
        assert_eq!(split_args(r#""a, b", 'c' , d"#), vec!["a, b", "c", "d"]);
        assert_eq!(split_args("   "), Vec::<String>::new());
        assert_eq!(split_args(r#""shape.color == 'red'""#), vec!["shape.color == 'red'"]);
        assert_eq!(split_args("x,,y"), vec!["x", "", "y"]);
    }

    #[test]
    fn strip_only_matching_pairs() {
        assert_eq!(strip_quotes("\"red'"), "\"red'");
        assert_eq!(strip_quotes("'"), "'");
        assert_eq!(strip_quotes("''"), "");
    }

    #[test]
    fn layout_steps_along_a_row() {
        let layout = LayoutConfig::default();
        assert_eq!(layout.position(0), GridPosition::new(1, 3));
        assert_eq!(layout.position(3), GridPosition::new(7, 3));
    }

    #[test]
    fn source_defaults_and_fallbacks() {
        let r = parse("s = Source()\nt = Source(\"blob\", \"green\")");
        assert!(r.is_ok());
        assert_eq!(r.machines[0].config.shape_type, Some(ShapeKind::Circle));
        assert_eq!(r.machines[0].config.color, Some(Color::White));
        assert_eq!(r.machines[1].config.shape_type, Some(ShapeKind::Circle));
        assert_eq!(r.machines[1].config.color, Some(Color::Green));
    }

    #[test]
    fn painter_keeps_color_verbatim() {
        let r = parse("p = Painter('chartreuse')");
        assert_eq!(r.machines[0].config.target_color.as_deref(), Some("chartreuse"));
    }

    #[test]
    fn rotator_requires_integer() {
        let r = parse("r = Rotator(45)");
        assert_eq!(r.machines[0].config.degrees, Some(45));
        let r = parse("r = Rotator(\"ninety\")");
        assert_eq!(r.error.unwrap().kind, ParseErrorKind::InvalidArgument);
        assert!(r.machines.is_empty());
    }

    #[test]
    fn function_stages_are_kinds() {
        let r = parse(r#"f = Function("prep", "painter", "rotator")"#);
        let stages = r.machines[0].config.stages.clone().unwrap();
        assert_eq!(stages.iter().map(|s| s.kind).collect::<Vec<_>>(), vec![MachineKind::Painter, MachineKind::Rotator]);
        let r = parse(r#"f = Function("prep", "warp")"#);
        assert_eq!(r.error.unwrap().kind, ParseErrorKind::InvalidArgument);
    }

    #[test]
    fn output_target_is_optional() {
        let r = parse("a = Output()\nb = Output('star', 'yellow', 4)");
        assert_eq!(r.machines[0].config.target, None);
        assert_eq!(r.machines[1].config.target, Some(ShapeSpec::new(ShapeKind::Star, Color::Yellow)));
        assert_eq!(r.machines[1].config.required_count, Some(4));
    }

    #[test]
    fn bad_expression_is_reported_at_parse_time() {
        let r = parse("s = Splitter(\"shape.colour == 'red'\")");
        let err = r.error.unwrap();
        assert_eq!(err.kind, ParseErrorKind::InvalidArgument);
        assert!(err.message.contains("colour"));
    }

    #[test]
    fn zero_pack_size_is_rejected() {
        let r = parse("p = Packer(0)");
        assert_eq!(r.error.unwrap().kind, ParseErrorKind::InvalidArgument);
    }

    #[test]
    fn loop_count_is_bounded() {
        assert!(parse(&format!("l = Looper({MAX_LOOP_COUNT})")).is_ok());
        for count in ["101", "4000000000", "99999999999"] {
            let r = parse(&format!("l = Looper({count})"));
            assert_eq!(r.error.unwrap().kind, ParseErrorKind::InvalidArgument, "{count}");
        }
    }

    #[test]
    fn trailing_comments_are_allowed() {
        let r = parse("s = Source()  # spawns circles\no = Output()\ns.connect(o)  # wire");
        assert!(r.is_ok());
        assert_eq!(r.connections, vec![(0, 1)]);
    }

    #[test]
    fn error_display_is_one_based() {
        let r = parse("\n\nwhat is this");
        let err = r.error.unwrap();
        assert_eq!(err.line, 2);
        assert!(err.to_string().starts_with("syntax error on line 3"));
    }
}
