//! Sandboxed condition and transform expressions.
//!
//! Splitters route on a boolean condition and comprehensions apply a
//! per-element transform. Both are written in a tiny expression language
//! bound to a single variable, `shape` (alias `item`):
//!
//! ```text
//! shape.color == 'red' and not (shape.rotation >= 180)
//! shape.rotate(90).paint('blue')
//! ```
//!
//! Supported: `== != < <= > >=`, `and`/`or`/`not`, parentheses, string and
//! integer literals, `True`/`False`, attribute reads and the whitelisted
//! methods `paint`, `rotate` and `clone`. There is no way to reach anything
//! other than the bound shape. Input is capped at [`MAX_TOKENS`] tokens and
//! [`MAX_DEPTH`] nesting levels.

use crate::shape::{Shape, TagValue};
use logos::Logos;
use std::fmt;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExprError {
    #[error("empty expression")]
    Empty,
    #[error("unexpected character '{ch}' at offset {offset}")]
    UnexpectedChar { ch: char, offset: usize },
    #[error("unterminated string literal starting at offset {offset}")]
    UnterminatedString { offset: usize },
    #[error("integer literal out of range: {0}")]
    IntOutOfRange(String),
    #[error("unexpected token {found}")]
    UnexpectedToken { found: String },
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("expression is longer than {limit} tokens")]
    TooLong { limit: usize },
    #[error("expression nests deeper than {limit} levels")]
    TooDeep { limit: usize },
    #[error("unknown name '{0}' (only 'shape' or 'item' is bound)")]
    UnknownName(String),
    #[error("unknown attribute '{0}'")]
    UnknownAttribute(String),
    #[error("unknown method '{0}'")]
    UnknownMethod(String),
    #[error("{method}() takes {expected} argument(s), got {found}")]
    Arity {
        method: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("cannot apply '{op}' to {left} and {right}")]
    TypeMismatch {
        op: &'static str,
        left: &'static str,
        right: &'static str,
    },
    #[error("'{0}' can only be used on a shape")]
    NotAShape(&'static str),
    #[error("{method}() expects a {expected} argument")]
    BadArgument {
        method: &'static str,
        expected: &'static str,
    },
    #[error("transform must produce a shape, got {0}")]
    TransformResult(&'static str),
}

// ---------------------------------------------------------------------------
// Values
// ---------------------------------------------------------------------------

/// Result of evaluating an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Str(String),
    Shape(Shape),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "None",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Str(_) => "str",
            Value::Shape(_) => "shape",
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Str(s) => !s.is_empty(),
            Value::Shape(_) => true,
        }
    }

    /// Equality across different types is `false`, never an error.
    fn equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Bool(a), Value::Int(b)) | (Value::Int(b), Value::Bool(a)) => {
                i64::from(*a) == *b
            }
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Shape(a), Value::Shape(b)) => a.matches(b),
            _ => false,
        }
    }

    fn ordering(&self, op: CmpOp, other: &Value) -> Result<std::cmp::Ordering, ExprError> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Ok(a.cmp(b)),
            (Value::Str(a), Value::Str(b)) => Ok(a.cmp(b)),
            _ => Err(ExprError::TypeMismatch {
                op: op.symbol(),
                left: self.type_name(),
                right: other.type_name(),
            }),
        }
    }
}

impl From<&TagValue> for Value {
    fn from(tag: &TagValue) -> Self {
        match tag {
            TagValue::Int(v) => Value::Int(*v),
            TagValue::Text(v) => Value::Str(v.clone()),
        }
    }
}

// ---------------------------------------------------------------------------
// Lexer
// ---------------------------------------------------------------------------

/// Longest accepted expression, in tokens.
pub const MAX_TOKENS: usize = 1024;
/// Deepest accepted nesting of parentheses, `not` and call arguments.
pub const MAX_DEPTH: usize = 256;

#[derive(Debug, Clone, Default, PartialEq)]
enum LexError {
    #[default]
    Invalid,
    IntOutOfRange,
}

fn unquote(slice: &str) -> String {
    slice[1..slice.len() - 1].to_string()
}

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(error = LexError)]
#[logos(skip r"[ \t\r\n\f]+")]
enum Token {
    #[token("and")]
    And,
    #[token("or")]
    Or,
    #[token("not")]
    Not,
    #[token("True")]
    True,
    #[token("False")]
    False,
    #[token("==", |_| CmpOp::Eq)]
    #[token("!=", |_| CmpOp::Ne)]
    #[token("<", |_| CmpOp::Lt)]
    #[token("<=", |_| CmpOp::Le)]
    #[token(">", |_| CmpOp::Gt)]
    #[token(">=", |_| CmpOp::Ge)]
    Cmp(CmpOp),
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token(".")]
    Dot,
    #[token(",")]
    Comma,
    #[regex(r"-?[0-9]+", |lex| lex.slice().parse::<i64>().map_err(|_| LexError::IntOutOfRange))]
    Int(i64),
    #[regex(r"'[^']*'", |lex| unquote(lex.slice()))]
    #[regex(r#""[^"]*""#, |lex| unquote(lex.slice()))]
    Str(String),
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Ident(s) => write!(f, "'{s}'"),
            Token::Str(s) => write!(f, "string '{s}'"),
            Token::Int(i) => write!(f, "{i}"),
            Token::Cmp(op) => write!(f, "'{}'", op.symbol()),
            Token::And => f.write_str("'and'"),
            Token::Or => f.write_str("'or'"),
            Token::Not => f.write_str("'not'"),
            Token::True => f.write_str("'True'"),
            Token::False => f.write_str("'False'"),
            Token::LParen => f.write_str("'('"),
            Token::RParen => f.write_str("')'"),
            Token::Dot => f.write_str("'.'"),
            Token::Comma => f.write_str("','"),
        }
    }
}

fn tokenize(src: &str) -> Result<Vec<Token>, ExprError> {
    let mut lexer = Token::lexer(src);
    let mut tokens = Vec::new();
    while let Some(next) = lexer.next() {
        match next {
            Ok(token) => tokens.push(token),
            Err(LexError::IntOutOfRange) => return Err(ExprError::IntOutOfRange(lexer.slice().to_string())),
            Err(LexError::Invalid) => {
                let offset = lexer.span().start;
                let ch = src[offset..].chars().next().unwrap_or_default();
                return Err(if ch == '\'' || ch == '"' {
                    ExprError::UnterminatedString { offset }
                } else {
                    ExprError::UnexpectedChar { ch, offset }
                });
            }
        }
        if tokens.len() > MAX_TOKENS {
            return Err(ExprError::TooLong { limit: MAX_TOKENS });
        }
    }
    Ok(tokens)
}

// ---------------------------------------------------------------------------
// AST
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        }
    }
}

/// Readable shape attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attribute {
    Color,
    Kind,
    Rotation,
    Size,
    LayerCount,
    Half,
    LoopIndex,
}

impl Attribute {
    fn lookup(name: &str) -> Result<Self, ExprError> {
        Ok(match name {
            "color" => Attribute::Color,
            "shape_type" | "kind" => Attribute::Kind,
            "rotation" => Attribute::Rotation,
            "size" => Attribute::Size,
            "layer_count" => Attribute::LayerCount,
            "half" => Attribute::Half,
            "loop_index" => Attribute::LoopIndex,
            _ => return Err(ExprError::UnknownAttribute(name.to_string())),
        })
    }

    fn read(&self, shape: &Shape) -> Value {
        match self {
            Attribute::Color => Value::Str(shape.color.name().to_string()),
            Attribute::Kind => Value::Str(shape.kind.name().to_string()),
            Attribute::Rotation => Value::Int(i64::from(shape.rotation())),
            Attribute::Size => Value::Int(i64::from(shape.size)),
            Attribute::LayerCount => Value::Int(shape.layers.len() as i64),
            Attribute::Half => shape.tag("half").map_or(Value::None, Value::from),
            Attribute::LoopIndex => shape.tag("loop_index").map_or(Value::None, Value::from),
        }
    }
}

/// Whitelisted shape methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Paint,
    Rotate,
    Clone,
}

impl Method {
    fn lookup(name: &str) -> Result<Self, ExprError> {
        Ok(match name {
            "paint" => Method::Paint,
            "rotate" => Method::Rotate,
            "clone" => Method::Clone,
            _ => return Err(ExprError::UnknownMethod(name.to_string())),
        })
    }

    fn name(&self) -> &'static str {
        match self {
            Method::Paint => "paint",
            Method::Rotate => "rotate",
            Method::Clone => "clone",
        }
    }

    fn arity(&self) -> usize {
        match self {
            Method::Paint | Method::Rotate => 1,
            Method::Clone => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Literal(Value),
    Bound,
    Attr(Box<Node>, Attribute),
    Call(Box<Node>, Method, Vec<Node>),
    Not(Box<Node>),
    And(Box<Node>, Box<Node>),
    Or(Box<Node>, Box<Node>),
    Compare(Box<Node>, CmpOp, Box<Node>),
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

struct ExprParser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl ExprParser {
    /// Run `f` one nesting level down.
    fn nested(&mut self, f: impl FnOnce(&mut Self) -> Result<Node, ExprError>) -> Result<Node, ExprError> {
        if self.depth >= MAX_DEPTH {
            return Err(ExprError::TooDeep { limit: MAX_DEPTH });
        }
        self.depth += 1;
        let node = f(self);
        self.depth -= 1;
        node
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Result<Token, ExprError> {
        let tok = self.tokens.get(self.pos).cloned().ok_or(ExprError::UnexpectedEnd)?;
        self.pos += 1;
        Ok(tok)
    }

    fn expect(&mut self, want: &Token) -> Result<(), ExprError> {
        let tok = self.bump()?;
        if &tok == want {
            Ok(())
        } else {
            Err(ExprError::UnexpectedToken {
                found: tok.to_string(),
            })
        }
    }

    fn or_expr(&mut self) -> Result<Node, ExprError> {
        let mut lhs = self.and_expr()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            let rhs = self.and_expr()?;
            lhs = Node::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Result<Node, ExprError> {
        let mut lhs = self.not_expr()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            let rhs = self.not_expr()?;
            lhs = Node::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn not_expr(&mut self) -> Result<Node, ExprError> {
        if self.peek() == Some(&Token::Not) {
            self.pos += 1;
            return Ok(Node::Not(Box::new(self.nested(Self::not_expr)?)));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Node, ExprError> {
        let lhs = self.postfix()?;
        if let Some(Token::Cmp(op)) = self.peek() {
            let op = *op;
            self.pos += 1;
            let rhs = self.postfix()?;
            return Ok(Node::Compare(Box::new(lhs), op, Box::new(rhs)));
        }
        Ok(lhs)
    }

    fn postfix(&mut self) -> Result<Node, ExprError> {
        let mut node = self.primary()?;
        while self.peek() == Some(&Token::Dot) {
            self.pos += 1;
            let name = match self.bump()? {
                Token::Ident(name) => name,
                other => {
                    return Err(ExprError::UnexpectedToken {
                        found: other.to_string(),
                    });
                }
            };
            if self.peek() == Some(&Token::LParen) {
                self.pos += 1;
                let method = Method::lookup(&name)?;
                let args = self.arguments()?;
                if args.len() != method.arity() {
                    return Err(ExprError::Arity {
                        method: method.name(),
                        expected: method.arity(),
                        found: args.len(),
                    });
                }
                node = Node::Call(Box::new(node), method, args);
            } else {
                node = Node::Attr(Box::new(node), Attribute::lookup(&name)?);
            }
        }
        Ok(node)
    }

    /// Arguments after an opening parenthesis, through the closing one.
    fn arguments(&mut self) -> Result<Vec<Node>, ExprError> {
        let mut args = Vec::new();
        if self.peek() == Some(&Token::RParen) {
            self.pos += 1;
            return Ok(args);
        }
        loop {
            args.push(self.nested(Self::or_expr)?);
            match self.bump()? {
                Token::Comma => continue,
                Token::RParen => return Ok(args),
                other => {
                    return Err(ExprError::UnexpectedToken {
                        found: other.to_string(),
                    });
                }
            }
        }
    }

    fn primary(&mut self) -> Result<Node, ExprError> {
        match self.bump()? {
            Token::Int(v) => Ok(Node::Literal(Value::Int(v))),
            Token::Str(s) => Ok(Node::Literal(Value::Str(s))),
            Token::True => Ok(Node::Literal(Value::Bool(true))),
            Token::False => Ok(Node::Literal(Value::Bool(false))),
            Token::Ident(name) if name == "shape" || name == "item" => Ok(Node::Bound),
            Token::Ident(name) if name == "None" => Ok(Node::Literal(Value::None)),
            Token::Ident(name) => Err(ExprError::UnknownName(name)),
            Token::LParen => {
                let inner = self.nested(Self::or_expr)?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            other => Err(ExprError::UnexpectedToken {
                found: other.to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

fn eval(node: &Node, shape: &Shape) -> Result<Value, ExprError> {
    match node {
        Node::Literal(v) => Ok(v.clone()),
        Node::Bound => Ok(Value::Shape(shape.clone())),
        Node::Attr(target, attr) => match eval(target, shape)? {
            Value::Shape(s) => Ok(attr.read(&s)),
            _ => Err(ExprError::NotAShape("attribute access")),
        },
        Node::Call(target, method, args) => {
            let Value::Shape(mut s) = eval(target, shape)? else {
                return Err(ExprError::NotAShape(method.name()));
            };
            match method {
                Method::Clone => {}
                Method::Paint => match eval(&args[0], shape)? {
                    Value::Str(color) => {
                        s.paint(&color);
                    }
                    _ => {
                        return Err(ExprError::BadArgument {
                            method: "paint",
                            expected: "string",
                        });
                    }
                },
                Method::Rotate => match eval(&args[0], shape)? {
                    Value::Int(deg) => {
                        let deg = (deg % 360) as i32;
                        s.rotate(deg);
                    }
                    _ => {
                        return Err(ExprError::BadArgument {
                            method: "rotate",
                            expected: "integer",
                        });
                    }
                },
            }
            Ok(Value::Shape(s))
        }
        Node::Not(inner) => Ok(Value::Bool(!eval(inner, shape)?.truthy())),
        Node::And(lhs, rhs) => {
            if !eval(lhs, shape)?.truthy() {
                return Ok(Value::Bool(false));
            }
            Ok(Value::Bool(eval(rhs, shape)?.truthy()))
        }
        Node::Or(lhs, rhs) => {
            if eval(lhs, shape)?.truthy() {
                return Ok(Value::Bool(true));
            }
            Ok(Value::Bool(eval(rhs, shape)?.truthy()))
        }
        Node::Compare(lhs, op, rhs) => {
            let l = eval(lhs, shape)?;
            let r = eval(rhs, shape)?;
            let result = match op {
                CmpOp::Eq => l.equals(&r),
                CmpOp::Ne => !l.equals(&r),
                CmpOp::Lt => l.ordering(*op, &r)?.is_lt(),
                CmpOp::Le => l.ordering(*op, &r)?.is_le(),
                CmpOp::Gt => l.ordering(*op, &r)?.is_gt(),
                CmpOp::Ge => l.ordering(*op, &r)?.is_ge(),
            };
            Ok(Value::Bool(result))
        }
    }
}

// ---------------------------------------------------------------------------
// Expr
// ---------------------------------------------------------------------------

/// A compiled expression together with its source text.
///
/// Built strictly with [`Expr::parse`] or leniently with [`Expr::lenient`];
/// a lenient expression that failed to compile reports the compile error
/// every time it is evaluated.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    source: String,
    root: Result<Node, ExprError>,
}

impl Expr {
    pub fn parse(source: &str) -> Result<Self, ExprError> {
        let root = compile(source)?;
        Ok(Self {
            source: source.to_string(),
            root: Ok(root),
        })
    }

    pub fn lenient(source: &str) -> Self {
        Self {
            source: source.to_string(),
            root: compile(source),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// The compile error, if any.
    pub fn error(&self) -> Option<&ExprError> {
        self.root.as_ref().err()
    }

    pub fn evaluate(&self, shape: &Shape) -> Result<Value, ExprError> {
        match &self.root {
            Ok(node) => eval(node, shape),
            Err(e) => Err(e.clone()),
        }
    }

    /// Evaluate as a condition.
    pub fn test(&self, shape: &Shape) -> Result<bool, ExprError> {
        self.evaluate(shape).map(|v| v.truthy())
    }

    /// Evaluate as a transform; the result must be a shape.
    pub fn transform(&self, shape: &Shape) -> Result<Shape, ExprError> {
        match self.evaluate(shape)? {
            Value::Shape(s) => Ok(s),
            other => Err(ExprError::TransformResult(other.type_name())),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn compile(source: &str) -> Result<Node, ExprError> {
    let tokens = tokenize(source)?;
    if tokens.is_empty() {
        return Err(ExprError::Empty);
    }
    let mut parser = ExprParser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let node = parser.or_expr()?;
    if let Some(extra) = parser.peek() {
        return Err(ExprError::UnexpectedToken {
            found: extra.to_string(),
        });
    }
    Ok(node)
}
