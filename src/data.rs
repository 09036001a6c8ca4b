//! Code-generation data model: data-section declarations, the per-function
//! state (lines, locals, labels) and the synthetic register stack.
//!
//! Registers are modelled as a push/pop stack indexed from 0; the stack keeps
//! a high-water mark so function text can decide whether r4 upward need
//! push/pop framing. There is no memory-based spill.

use crate::ast::BinOp;
use crate::error::{CompileError, CompileResult};

/// Assembly directive a data item declares with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
  Word,
  Asciz,
}

/// A named `.data` section entry.
#[derive(Debug, Clone)]
pub struct DataDecl {
  pub name: String,
  pub directive: Directive,
  pub value: String,
}

impl DataDecl {
  pub fn new(name: impl Into<String>, directive: Directive, value: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      directive,
      value: value.into(),
    }
  }

  /// The `.data` section line for this item.
  pub fn decl_text(&self) -> CompileResult<String> {
    if self.name.is_empty() || self.value.is_empty() {
      return Err(CompileError::InvalidDataState {
        name: self.name.clone(),
      });
    }
    let directive = match self.directive {
      Directive::Word => ".word",
      Directive::Asciz => ".asciz",
    };
    Ok(format!("{}: {}\t{}", self.name, directive, self.value))
  }

  /// The address-table line enabling position-independent loads.
  pub fn addr_text(&self) -> String {
    format!("addr_{0}: .word {0}", self.name)
  }
}

/// One element of a value chain: a literal number, a reference to a named
/// `.data` string, or an identifier reference resolved at load time.
#[derive(Debug, Clone)]
pub enum Item {
  Number(String),
  StrData(String),
  Ref(String),
}

/// The generator's intermediate form of an expression: the flattened operand
/// chain reduced left-to-right into a single register.
#[derive(Debug, Clone)]
pub struct Chain {
  pub first: Item,
  pub rest: Vec<(BinOp, Item)>,
}

impl Chain {
  /// Is this chain a single string literal? Decides `%s` vs `%d` formatting.
  pub fn is_string(&self) -> bool {
    self.rest.is_empty() && matches!(self.first, Item::StrData(_))
  }
}

/// A registered global variable. The entry is inserted into the registry
/// before its chain is evaluated, so forward and self references resolve;
/// until evaluation finishes the chain is `None`.
#[derive(Debug, Clone)]
pub struct Global {
  pub name: String,
  pub chain: Option<Chain>,
}

/// Rough category of a local's value, kept for `print` format selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
  Number,
  Str,
}

/// A function-local binding. The register is stable for the statement's
/// lifetime: lookups by name reuse it, never reassign it.
#[derive(Debug, Clone)]
pub struct Statement {
  pub name: String,
  pub register: usize,
  pub kind: ValueKind,
}

/// The synthetic register file, a stack whose index is the register number.
#[derive(Debug, Clone, Default)]
pub struct RegisterStack {
  depth: usize,
  high_water: usize,
}

impl RegisterStack {
  pub fn new() -> Self {
    Self::default()
  }

  /// Claim the next register, returning its number.
  pub fn push(&mut self) -> usize {
    let register = self.depth;
    self.depth += 1;
    self.high_water = self.high_water.max(self.depth);
    register
  }

  /// Remember the current depth so a scope can release its temporaries.
  pub fn mark(&self) -> usize {
    self.depth
  }

  /// Truncate the stack back to a previous mark. The high-water mark is
  /// deliberately left untouched.
  pub fn rewind(&mut self, mark: usize) {
    debug_assert!(mark <= self.depth);
    self.depth = mark;
  }

  /// Maximum depth observed, deciding r4+ push/pop framing.
  pub fn high_water(&self) -> usize {
    self.high_water
  }
}

/// Per-function generation state, discarded once serialized to text.
#[derive(Debug, Clone)]
pub struct Function {
  pub name: String,
  pub is_entry: bool,
  pub lines: Vec<String>,
  pub statements: Vec<Statement>,
  pub registers: RegisterStack,
  labels: usize,
  data_count: usize,
}

impl Function {
  pub fn new(name: impl Into<String>, is_entry: bool) -> Self {
    let mut registers = RegisterStack::new();
    // Slot 0 is reserved: r0 carries return values and call results.
    registers.push();
    Self {
      name: name.into(),
      is_entry,
      lines: Vec::new(),
      statements: Vec::new(),
      registers,
      labels: 0,
      data_count: 0,
    }
  }

  pub fn line(&mut self, line: impl Into<String>) {
    self.lines.push(line.into());
  }

  pub fn statement(&self, name: &str) -> Option<&Statement> {
    self.statements.iter().find(|s| s.name == name)
  }

  /// Fresh name for a data item owned by this function.
  pub fn data_name(&mut self) -> String {
    let name = format!("{}{}", self.name, self.data_count);
    self.data_count += 1;
    name
  }

  /// Fresh label stem for a conditional or loop. Embedding the function name
  /// keeps labels unique across the whole assembly document.
  pub fn next_label(&mut self) -> String {
    let label = format!("{}{}", self.name, self.labels);
    self.labels += 1;
    label
  }

  /// Serialize the function: label (with a `.global` marker for the entry
  /// point), optional r4+ push framing, the accumulated lines, the
  /// `end<name>` early-return label, the matching pop, and `bx lr`.
  pub fn text(&self) -> String {
    let mut text = String::new();
    if self.is_entry {
      text.push_str(&format!(".global {}\n", self.name));
    }
    text.push_str(&format!("{}:\n\n", self.name));

    let framing = self.framing_range();
    if let Some(range) = &framing {
      text.push_str(&format!("\tpush {{{range}}}\n"));
    }
    for line in &self.lines {
      text.push_str(line);
      text.push('\n');
    }
    text.push_str(&format!("end{}:\n", self.name));
    if let Some(range) = &framing {
      text.push_str(&format!("\tpop {{{range}}}\n"));
    }
    text.push_str("\tbx lr\n");
    text
  }

  /// Callee-saved registers needing push/pop, if the high-water mark ever
  /// passed the caller-saved bank (r0-r3).
  fn framing_range(&self) -> Option<String> {
    let high_water = self.registers.high_water();
    if high_water <= 4 {
      return None;
    }
    let top = high_water - 1;
    Some(if top == 4 {
      "r4".to_string()
    } else {
      format!("r4-r{top}")
    })
  }
}
