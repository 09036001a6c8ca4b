//! Syntax tree produced by the parser.
//!
//! The tree is a closed set of tagged variants: blocks hold ordered statement
//! vectors, expressions keep the source's flat operator chain (`first`
//! followed by `(operator, operand)` pairs) because the code generator
//! reduces chains left-to-right in exactly that order.

/// A top-level construct: a function definition or a global statement.
#[derive(Debug, Clone)]
pub enum TopLevel {
  Function(FunctionDecl),
  Global(GlobalDecl),
}

#[derive(Debug, Clone)]
pub struct FunctionDecl {
  pub name: String,
  pub params: Vec<String>,
  pub body: Block,
}

/// A top-level `name = expression` statement.
#[derive(Debug, Clone)]
pub struct GlobalDecl {
  pub name: String,
  pub value: Expr,
}

/// An ordered statement list. The parser guarantees that a `Return`, if
/// present, is the final statement.
#[derive(Debug, Clone, Default)]
pub struct Block {
  pub stmts: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub enum Stmt {
  /// `local name [= expression]`. A missing initialiser parses but has no
  /// lowering rule.
  Local { name: String, value: Option<Expr> },
  /// `name = expression` without `local`: promoted to a global.
  Assign { name: String, value: Expr },
  /// `name(arguments)`.
  Call { name: String, args: Vec<Operand> },
  /// A bare identifier statement. Accepted by the grammar, rejected by the
  /// code generator.
  Bare { name: String },
  If { cond: Expr, body: Block },
  While { cond: Expr, body: Block },
  Return { value: Option<Expr> },
}

/// An operator chain, flattened: `1 + 2 * x` is `first = 1` with
/// `rest = [(Add, 2), (Mul, x)]`. Reduction is left-to-right.
#[derive(Debug, Clone)]
pub struct Expr {
  pub first: Operand,
  pub rest: Vec<(BinOp, Operand)>,
}

impl Expr {
  pub fn single(first: Operand) -> Self {
    Self {
      first,
      rest: Vec::new(),
    }
  }
}

/// A single expression operand. String operands keep their surrounding
/// quotes, numbers keep their literal text unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
  Number(String),
  Str(String),
  Nil,
  True,
  False,
  Ident(String),
}

/// Binary operators recognised by the language. `Div`, `And` and `Or` lex
/// and parse but have no lowering rule in the generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
  Add,
  Sub,
  Mul,
  Div,
  Lt,
  Le,
  Gt,
  Ge,
  Eq,
  Ne,
  And,
  Or,
}

impl BinOp {
  /// Map an operator token's text to its operator, if any.
  pub fn from_text(text: &str) -> Option<Self> {
    Some(match text {
      "+" => Self::Add,
      "-" => Self::Sub,
      "*" => Self::Mul,
      "/" => Self::Div,
      "<" => Self::Lt,
      "<=" => Self::Le,
      ">" => Self::Gt,
      ">=" => Self::Ge,
      "==" => Self::Eq,
      "!=" => Self::Ne,
      "and" | "AND" => Self::And,
      "or" | "OR" => Self::Or,
      _ => return None,
    })
  }

  pub fn text(self) -> &'static str {
    match self {
      Self::Add => "+",
      Self::Sub => "-",
      Self::Mul => "*",
      Self::Div => "/",
      Self::Lt => "<",
      Self::Le => "<=",
      Self::Gt => ">",
      Self::Ge => ">=",
      Self::Eq => "==",
      Self::Ne => "!=",
      Self::And => "and",
      Self::Or => "or",
    }
  }

  pub fn is_comparison(self) -> bool {
    matches!(
      self,
      Self::Lt | Self::Le | Self::Gt | Self::Ge | Self::Eq | Self::Ne
    )
  }
}
