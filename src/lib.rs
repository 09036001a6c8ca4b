//! Crate root: wires together the compilation pipeline.
//!
//! The stages are intentionally small and composable so they can be evolved
//! independently:
//! - `lexer` performs regex-table lexical analysis and produces a flat token
//!   stream with positions.
//! - `parser` owns all syntactic knowledge and returns the top-level trees.
//! - `codegen` lowers the trees into GNU `as` flavoured ARM assembly.
//! - `error` centralises the error taxonomy shared by the other modules.

pub mod ast;
pub mod error;
pub mod lexer;
pub mod parser;

mod codegen;
mod data;

pub use codegen::Generator;
pub use error::{CompileError, CompileResult};

/// Compile a jam source string into ARM assembly.
pub fn compile(source: &str) -> CompileResult<String> {
  let tokens = lexer::tokenize(source)?;
  let items = parser::parse(tokens)?;
  let mut generator = Generator::new();
  generator.generate(&items)?;
  generator.output()
}
