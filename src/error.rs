//! Shared error taxonomy used across the compilation pipeline.
//!
//! Every failure aborts the whole compilation: there is no retry semantic
//! anywhere in the core and partial output is never usable. Variants carry
//! enough position information for the driver to print a useful one-line
//! diagnostic.

use snafu::Snafu;

pub type CompileResult<T> = Result<T, CompileError>;

#[derive(Debug, Snafu)]
pub enum CompileError {
  /// The lexer found a byte no rule in the table matches.
  #[snafu(display("line {line}, column {column}: unexpected input '{found}'"))]
  UnexpectedInput {
    found: char,
    index: usize,
    line: usize,
    column: usize,
  },

  /// A grammar rule's required token kind set did not match the current token.
  #[snafu(display("line {line}, column {column}: unexpected token \"{found}\" ({context})"))]
  UnexpectedToken {
    found: String,
    context: String,
    line: usize,
    column: usize,
  },

  /// The parser's cursor advanced past the final token.
  #[snafu(display("unexpected end of input ({context})"))]
  UnexpectedEndOfInput { context: String },

  /// A name resolved against neither the function's locals nor the globals.
  #[snafu(display("undefined identifier \"{name}\""))]
  UndefinedIdentifier { name: String },

  /// An AST shape or data kind with no lowering rule.
  #[snafu(display("unsupported construct: {what}"))]
  UnsupportedConstruct { what: String },

  /// A data item lacks the fields required to emit its declaration.
  #[snafu(display("data item \"{name}\" cannot be declared: missing name or value"))]
  InvalidDataState { name: String },
}
