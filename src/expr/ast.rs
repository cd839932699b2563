//! Query expression tree
//!
//! Trees are immutable values. Nothing in the crate mutates a node in place;
//! rewriting always rebuilds. The one shared piece is a source's row storage,
//! which every clone of the source reads at evaluation time.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use serde_json::Value;

/// Binary operators usable inside lambda bodies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    And,
    Or,
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    /// Returns true for the ordering comparisons
    pub fn is_ordering(&self) -> bool {
        matches!(self, BinaryOp::Gt | BinaryOp::Gte | BinaryOp::Lt | BinaryOp::Lte)
    }

    /// Returns true for the boolean connectives
    pub fn is_logical(&self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }

    /// Returns true for arithmetic operators
    pub fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div
        )
    }

    /// Returns the operator symbol for rendering
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Gt => ">",
            BinaryOp::Gte => ">=",
            BinaryOp::Lt => "<",
            BinaryOp::Lte => "<=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
        }
    }
}

/// What a method expects in argument position 1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    /// Source only
    None,
    /// A lambda is required
    Lambda,
    /// A lambda may follow the source
    OptionalLambda,
    /// A scalar value is required
    Value,
    /// Any number of provider-specific arguments
    Variadic,
}

/// Query operator identity
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    Where,
    Select,
    OrderBy,
    OrderByDescending,
    ThenBy,
    ThenByDescending,
    Skip,
    Take,
    Distinct,
    Reverse,
    Count,
    LongCount,
    Any,
    All,
    Contains,
    First,
    FirstOrDefault,
    Single,
    SingleOrDefault,
    Last,
    LastOrDefault,
    ElementAt,
    Sum,
    Min,
    Max,
    Average,
    /// Provider-specific operator such as `Include` or `AsNoTracking`
    Extension(String),
}

impl Method {
    /// Returns the operator name
    pub fn name(&self) -> &str {
        match self {
            Method::Where => "Where",
            Method::Select => "Select",
            Method::OrderBy => "OrderBy",
            Method::OrderByDescending => "OrderByDescending",
            Method::ThenBy => "ThenBy",
            Method::ThenByDescending => "ThenByDescending",
            Method::Skip => "Skip",
            Method::Take => "Take",
            Method::Distinct => "Distinct",
            Method::Reverse => "Reverse",
            Method::Count => "Count",
            Method::LongCount => "LongCount",
            Method::Any => "Any",
            Method::All => "All",
            Method::Contains => "Contains",
            Method::First => "First",
            Method::FirstOrDefault => "FirstOrDefault",
            Method::Single => "Single",
            Method::SingleOrDefault => "SingleOrDefault",
            Method::Last => "Last",
            Method::LastOrDefault => "LastOrDefault",
            Method::ElementAt => "ElementAt",
            Method::Sum => "Sum",
            Method::Min => "Min",
            Method::Max => "Max",
            Method::Average => "Average",
            Method::Extension(name) => name,
        }
    }

    /// Returns what the method expects after its source argument
    pub fn operand(&self) -> Operand {
        match self {
            Method::Distinct | Method::Reverse => Operand::None,
            Method::Where
            | Method::Select
            | Method::OrderBy
            | Method::OrderByDescending
            | Method::ThenBy
            | Method::ThenByDescending
            | Method::All => Operand::Lambda,
            Method::Skip | Method::Take | Method::ElementAt | Method::Contains => Operand::Value,
            Method::Extension(_) => Operand::Variadic,
            _ => Operand::OptionalLambda,
        }
    }

    /// Returns true if the method starts an ordering
    pub fn is_ordering(&self) -> bool {
        matches!(self, Method::OrderBy | Method::OrderByDescending)
    }

    /// Returns true if the method refines an existing ordering
    pub fn is_then_by(&self) -> bool {
        matches!(self, Method::ThenBy | Method::ThenByDescending)
    }

    /// Returns true if the method sorts descending
    pub fn is_descending(&self) -> bool {
        matches!(self, Method::OrderByDescending | Method::ThenByDescending)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single raw-command parameter
#[derive(Debug, Clone, PartialEq)]
pub struct CommandParameter {
    /// Parameter name, empty for positional parameters
    pub name: String,
    /// Parameter value
    pub value: Value,
}

impl CommandParameter {
    /// Create a named parameter
    pub fn named(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Create a positional parameter
    pub fn positional(value: impl Into<Value>) -> Self {
        Self {
            name: String::new(),
            value: value.into(),
        }
    }
}

/// Raw-command invocation backing a query root
#[derive(Debug, Clone, PartialEq)]
pub struct RawCommand {
    /// Command text as issued by the caller
    pub sql: String,
    /// Command parameters in call order
    pub parameters: Vec<CommandParameter>,
}

/// The origin data set of a freshly built query
#[derive(Debug, Clone, PartialEq)]
pub enum QueryRoot {
    /// A named entity set with no evaluation strategy
    Entity { entity: String },
    /// A result set produced by an opaque raw command
    RawCommand(RawCommand),
}

impl QueryRoot {
    /// Returns true for raw-command roots
    pub fn is_raw_command(&self) -> bool {
        matches!(self, QueryRoot::RawCommand(_))
    }
}

/// A concrete in-memory collection, evaluable by the local engine.
///
/// Clones share row storage, so rows added through any handle are seen by
/// every tree that already holds the source.
#[derive(Debug, Clone)]
pub struct SourceRef {
    /// Collection name, used for rendering only
    pub name: String,
    rows: Arc<RwLock<Vec<Value>>>,
}

impl SourceRef {
    /// Create a new source over the given rows
    pub fn new(name: impl Into<String>, rows: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            rows: Arc::new(RwLock::new(rows)),
        }
    }

    /// Copy of the current rows
    pub fn snapshot(&self) -> Vec<Value> {
        self.rows
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Appends rows to the shared storage
    pub fn extend(&self, rows: impl IntoIterator<Item = Value>) {
        self.rows
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(rows);
    }

    /// Swaps the shared storage's contents for `rows`
    pub fn replace(&self, rows: Vec<Value>) {
        *self.rows.write().unwrap_or_else(PoisonError::into_inner) = rows;
    }

    /// Number of rows currently held
    pub fn len(&self) -> usize {
        self.rows.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when both handles share the same row storage
    pub fn shares_rows(&self, other: &SourceRef) -> bool {
        Arc::ptr_eq(&self.rows, &other.rows)
    }
}

/// Sources are equal when they share storage, or when name and current rows match
impl PartialEq for SourceRef {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && (self.shares_rows(other) || self.snapshot() == other.snapshot())
    }
}

/// An operation-call node
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    /// Operation identity
    pub method: Method,
    /// Ordered arguments; position 0 is the data source
    pub args: Vec<Expr>,
}

impl Call {
    /// Returns the data-source argument
    pub fn source(&self) -> Option<&Expr> {
        self.args.first()
    }
}

/// A single-parameter lambda
#[derive(Debug, Clone, PartialEq)]
pub struct Lambda {
    pub param: String,
    pub body: Box<Expr>,
}

/// Query expression tree node
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Operation call
    Call(Call),
    /// Query-root placeholder
    Root(QueryRoot),
    /// Concrete local collection
    Source(SourceRef),
    /// Literal value
    Constant(Value),
    /// Lambda parameter reference
    Param(String),
    /// Field access
    Member { target: Box<Expr>, field: String },
    /// Binary operation
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Boolean negation
    Not(Box<Expr>),
    /// Anonymous object construction
    Object(Vec<(String, Expr)>),
    /// Lambda abstraction
    Lambda(Lambda),
}

impl Expr {
    /// Create an operation call
    pub fn call(method: Method, args: Vec<Expr>) -> Self {
        Expr::Call(Call { method, args })
    }

    /// Create an entity query-root placeholder
    pub fn entity_root(entity: impl Into<String>) -> Self {
        Expr::Root(QueryRoot::Entity {
            entity: entity.into(),
        })
    }

    /// Create a raw-command query root
    pub fn raw_command(sql: impl Into<String>, parameters: Vec<CommandParameter>) -> Self {
        Expr::Root(QueryRoot::RawCommand(RawCommand {
            sql: sql.into(),
            parameters,
        }))
    }

    /// Create a literal
    pub fn constant(value: impl Into<Value>) -> Self {
        Expr::Constant(value.into())
    }

    /// Create a parameter reference
    pub fn param(name: impl Into<String>) -> Self {
        Expr::Param(name.into())
    }

    /// Create an anonymous object
    pub fn object<K: Into<String>>(fields: impl IntoIterator<Item = (K, Expr)>) -> Self {
        Expr::Object(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Access a field of this expression
    pub fn field(self, name: impl Into<String>) -> Self {
        Expr::Member {
            target: Box::new(self),
            field: name.into(),
        }
    }

    /// Combine with another expression
    pub fn binary(self, op: BinaryOp, rhs: impl Into<Expr>) -> Self {
        Expr::Binary {
            op,
            left: Box::new(self),
            right: Box::new(rhs.into()),
        }
    }

    pub fn equals(self, rhs: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Eq, rhs)
    }

    pub fn not_equals(self, rhs: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Ne, rhs)
    }

    pub fn gt(self, rhs: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Gt, rhs)
    }

    pub fn gte(self, rhs: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Gte, rhs)
    }

    pub fn lt(self, rhs: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Lt, rhs)
    }

    pub fn lte(self, rhs: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Lte, rhs)
    }

    pub fn and(self, rhs: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::And, rhs)
    }

    pub fn or(self, rhs: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Or, rhs)
    }

    pub fn plus(self, rhs: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Add, rhs)
    }

    pub fn minus(self, rhs: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Sub, rhs)
    }

    pub fn times(self, rhs: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Mul, rhs)
    }

    pub fn divided_by(self, rhs: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Div, rhs)
    }

    /// Negate a boolean expression
    pub fn negate(self) -> Self {
        Expr::Not(Box::new(self))
    }

    /// Returns the call node, if this is one
    pub fn as_call(&self) -> Option<&Call> {
        match self {
            Expr::Call(call) => Some(call),
            _ => None,
        }
    }

    /// Returns the query root, if this is a placeholder
    pub fn as_root(&self) -> Option<&QueryRoot> {
        match self {
            Expr::Root(root) => Some(root),
            _ => None,
        }
    }

    /// Visits this node and every descendant, parents first.
    ///
    /// Stops at the first error returned by `f`.
    pub fn visit<E>(&self, f: &mut impl FnMut(&Expr) -> Result<(), E>) -> Result<(), E> {
        f(self)?;
        match self {
            Expr::Call(call) => {
                for arg in &call.args {
                    arg.visit(f)?;
                }
            }
            Expr::Member { target, .. } => target.visit(f)?,
            Expr::Binary { left, right, .. } => {
                left.visit(f)?;
                right.visit(f)?;
            }
            Expr::Not(inner) => inner.visit(f)?,
            Expr::Object(fields) => {
                for (_, value) in fields {
                    value.visit(f)?;
                }
            }
            Expr::Lambda(lambda) => lambda.body.visit(f)?,
            Expr::Root(_) | Expr::Source(_) | Expr::Constant(_) | Expr::Param(_) => {}
        }
        Ok(())
    }
}

/// Build a lambda from a closure over its parameter.
///
/// ```ignore
/// let pred = lambda("x", |x| x.field("id").equals(2));
/// ```
pub fn lambda(param: &str, body: impl FnOnce(Expr) -> Expr) -> Expr {
    Expr::Lambda(Lambda {
        param: param.to_string(),
        body: Box::new(body(Expr::param(param))),
    })
}

impl From<Value> for Expr {
    fn from(value: Value) -> Self {
        Expr::Constant(value)
    }
}

impl From<i32> for Expr {
    fn from(value: i32) -> Self {
        Expr::Constant(Value::from(value))
    }
}

impl From<i64> for Expr {
    fn from(value: i64) -> Self {
        Expr::Constant(Value::from(value))
    }
}

impl From<f64> for Expr {
    fn from(value: f64) -> Self {
        Expr::Constant(Value::from(value))
    }
}

impl From<bool> for Expr {
    fn from(value: bool) -> Self {
        Expr::Constant(Value::from(value))
    }
}

impl From<&str> for Expr {
    fn from(value: &str) -> Self {
        Expr::Constant(Value::from(value))
    }
}

impl From<String> for Expr {
    fn from(value: String) -> Self {
        Expr::Constant(Value::from(value))
    }
}
