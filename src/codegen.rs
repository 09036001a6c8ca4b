//! Code generation: walk the parsed trees and emit register-allocated ARM
//! assembly.
//!
//! The generator runs two passes over the top-level list: global statements
//! first, then functions, so a function body may reference a global declared
//! lexically after it. Expressions reduce left-to-right through the synthetic
//! register stack; temporaries are released with mark/rewind scopes while the
//! stack's high-water mark decides r4+ push/pop framing.
//!
//! A generator instance is single-use: state accumulates across `generate`
//! calls and is never reset, so create a fresh `Generator` per compilation.

use std::collections::{BTreeSet, HashMap};

use crate::ast::{BinOp, Block, Expr, FunctionDecl, Operand, Stmt, TopLevel};
use crate::data::{Chain, DataDecl, Directive, Function, Global, Item, Statement, ValueKind};
use crate::error::{CompileError, CompileResult};

/// Functions named this export a `.global` marker.
const ENTRY_POINT: &str = "main";

/// Branch target for comparison lowering. A forward branch exits the
/// construct on a failed comparison (inverted condition); a backward branch
/// re-enters a loop on success.
struct Branch {
  label: String,
  backward: bool,
}

/// Owns all state for one generation run: the globals registry, the `.data`
/// list, the generated functions and the referenced external symbols.
#[derive(Default)]
pub struct Generator {
  data: Vec<DataDecl>,
  globals: HashMap<String, Global>,
  functions: Vec<Function>,
  externals: BTreeSet<String>,
  return_slots: usize,
}

impl Generator {
  pub fn new() -> Self {
    Self::default()
  }

  /// Lower every top-level construct. Globals are registered ahead of any
  /// function body traversal so declaration order never matters.
  pub fn generate(&mut self, items: &[TopLevel]) -> CompileResult<()> {
    for item in items {
      if let TopLevel::Global(global) = item {
        self.register_global(&global.name, &global.value);
      }
    }
    for item in items {
      if let TopLevel::Function(func) = item {
        self.lower_function(func)?;
      }
    }
    Ok(())
  }

  /// Assemble the final document: `.data` declarations, function text
  /// blocks, the address table, and the external symbol block. A pure
  /// projection of accumulated state; calling it twice yields the same
  /// string.
  pub fn output(&self) -> CompileResult<String> {
    let mut out = String::from(".data\n\n");
    for decl in &self.data {
      out.push_str(&decl.decl_text()?);
      out.push('\n');
    }

    out.push_str("\n.text\n\n");
    for func in &self.functions {
      out.push_str(&func.text());
      out.push('\n');
    }

    out.push('\n');
    for decl in &self.data {
      out.push_str(&decl.addr_text());
      out.push('\n');
    }

    out.push_str("\n/* externals */\n");
    for name in &self.externals {
      out.push_str(&format!(".global\t{name}\n"));
    }
    Ok(out)
  }

  /// Register a global, entry first and chain second, so the name resolves
  /// while its own right-hand side is still being classified.
  fn register_global(&mut self, name: &str, value: &Expr) {
    self.globals.insert(name.to_string(), Global {
      name: name.to_string(),
      chain: None,
    });

    let mut count = 0usize;
    let stem = name.to_string();
    let chain = self.chain_for(value, &mut || {
      let data_name = format!("{stem}{count}");
      count += 1;
      data_name
    });

    if let Some(global) = self.globals.get_mut(name) {
      global.chain = Some(chain);
    }
  }

  fn lower_function(&mut self, decl: &FunctionDecl) -> CompileResult<()> {
    let mut func = Function::new(&decl.name, decl.name == ENTRY_POINT);

    // Parameters claim the first stack registers and keep them for the whole
    // function, like any other local binding.
    for param in &decl.params {
      let register = func.registers.push();
      func.statements.push(Statement {
        name: param.clone(),
        register,
        kind: ValueKind::Number,
      });
    }

    if !decl.body.stmts.is_empty() {
      // Highest argument first, so a move never clobbers a pending one.
      for index in (0..decl.params.len()).rev() {
        func.line(format!("\tmov r{}, r{index}", index + 1));
      }

      // Calls clobber the link register; park it in a data slot for the
      // duration of the body.
      let slot = format!("return{}", self.return_slots);
      self.return_slots += 1;
      self
        .data
        .push(DataDecl::new(slot.clone(), Directive::Word, "0"));
      func.line(format!("\tldr r0, addr_{slot}"));
      func.line("\tstr lr, [r0]");
      func.line("");

      for stmt in &decl.body.stmts {
        self.lower_stmt(&mut func, stmt, false)?;
      }

      func.line("");
      func.line(format!("\tldr lr, addr_{slot}"));
      func.line("\tldr lr, [lr]");
      func.line("");
    }

    self.functions.push(func);
    Ok(())
  }

  fn lower_stmt(&mut self, func: &mut Function, stmt: &Stmt, nested: bool) -> CompileResult<()> {
    match stmt {
      Stmt::Local { name, value } => {
        let Some(value) = value else {
          return Err(CompileError::UnsupportedConstruct {
            what: format!("uninitialized local \"{name}\""),
          });
        };
        let chain = self.chain_for(value, &mut || func.data_name());
        let kind = if chain.is_string() {
          ValueKind::Str
        } else {
          ValueKind::Number
        };

        // Re-declarations reuse the register; it is never reassigned.
        let register = match func.statements.iter().position(|s| s.name == *name) {
          Some(index) => {
            func.statements[index].kind = kind;
            func.statements[index].register
          }
          None => {
            let register = func.registers.push();
            func.statements.push(Statement {
              name: name.clone(),
              register,
              kind,
            });
            register
          }
        };
        self.reduce_chain(func, register, &chain, None)
      }
      Stmt::Assign { name, value } => {
        // No `local` promotes the assignment to a global.
        self.register_global(name, value);
        Ok(())
      }
      Stmt::Bare { name } => Err(CompileError::UnsupportedConstruct {
        what: format!("bare identifier statement \"{name}\""),
      }),
      Stmt::Call { name, args } => {
        if name == "print" {
          self.lower_print(func, args)
        } else {
          self.lower_call(func, name, args)
        }
      }
      Stmt::If { cond, body } => self.lower_conditional(func, cond, body, false),
      Stmt::While { cond, body } => self.lower_conditional(func, cond, body, true),
      Stmt::Return { value } => self.lower_return(func, value.as_ref(), nested),
    }
  }

  /// Reduce the return expression into r0. Inside a conditional the return
  /// additionally branches to the function's end label for the early exit.
  fn lower_return(
    &mut self,
    func: &mut Function,
    value: Option<&Expr>,
    nested: bool,
  ) -> CompileResult<()> {
    if let Some(expr) = value {
      let chain = self.chain_for(expr, &mut || func.data_name());
      func.line("");
      func.line("\t/* start assembledata() */");
      let mark = func.registers.mark();
      let start = func.registers.push();
      self.reduce_chain(func, start, &chain, None)?;
      if start != 0 {
        func.line(format!("\tmov r0, r{start}"));
      }
      func.registers.rewind(mark);
      func.line("\t/* end assembledata() */");
      if nested {
        func.line(format!("\tb end{}", func.name));
      }
      func.line("");
    } else if nested {
      func.line("");
      func.line(format!("\tb end{}", func.name));
      func.line("");
    }
    Ok(())
  }

  /// Shared lowering for `if` and `while`. `if` tests first and branches
  /// past the body on a failed (inverted) comparison; `while` runs the body
  /// first and branches back to the start label while the comparison holds.
  fn lower_conditional(
    &mut self,
    func: &mut Function,
    cond: &Expr,
    body: &Block,
    is_while: bool,
  ) -> CompileResult<()> {
    let label = func.next_label();
    let chain = self.chain_for(cond, &mut || func.data_name());

    if is_while {
      func.line(format!("start{label}:"));
      for stmt in &body.stmts {
        self.lower_stmt(func, stmt, true)?;
      }
      let mark = func.registers.mark();
      let start = func.registers.push();
      let branch = Branch {
        label: format!("start{label}"),
        backward: true,
      };
      self.reduce_chain(func, start, &chain, Some(&branch))?;
      func.registers.rewind(mark);
    } else {
      let mark = func.registers.mark();
      let start = func.registers.push();
      let branch = Branch {
        label: format!("end{label}"),
        backward: false,
      };
      self.reduce_chain(func, start, &chain, Some(&branch))?;
      func.registers.rewind(mark);
      for stmt in &body.stmts {
        self.lower_stmt(func, stmt, true)?;
      }
    }

    func.line(format!("end{label}:"));
    func.line("");
    Ok(())
  }

  /// `print` lowers to a printf call: clobbered registers pushed, arguments
  /// in r1 upward, the format string's address in r0.
  fn lower_print(&mut self, func: &mut Function, args: &[Operand]) -> CompileResult<()> {
    func.line("\tpush {r0, r1, r2, r3}");

    let mut parts = Vec::new();
    for (index, arg) in args.iter().enumerate() {
      parts.push(self.format_part(func, arg));
      let item = self.item_for(arg, &mut || func.data_name());
      self.load_item(func, index + 1, &item)?;
    }

    let fmt_name = func.data_name();
    let fmt_value = format!("\"{}\\n\"", parts.join(" "));
    self
      .data
      .push(DataDecl::new(fmt_name.clone(), Directive::Asciz, fmt_value));

    func.line(format!("\tldr r0, addr_{fmt_name}"));
    func.line("\tbl printf");
    func.line("\tpop {r0, r1, r2, r3}");
    func.line("");
    self.externals.insert("printf".to_string());
    Ok(())
  }

  /// printf conversion for one argument: strings format as `%s`, everything
  /// else as `%d`.
  fn format_part(&self, func: &Function, arg: &Operand) -> &'static str {
    match arg {
      Operand::Str(_) => "%s",
      Operand::Ident(name) => {
        if let Some(statement) = func.statement(name) {
          match statement.kind {
            ValueKind::Str => "%s",
            ValueKind::Number => "%d",
          }
        } else if let Some(global) = self.globals.get(name)
          && global.chain.as_ref().is_some_and(|chain| chain.is_string())
        {
          "%s"
        } else {
          "%d"
        }
      }
      _ => "%d",
    }
  }

  /// A user call resolves against already-generated functions and lowers to
  /// argument loads plus a branch-and-link; the result is discarded.
  fn lower_call(&mut self, func: &mut Function, name: &str, args: &[Operand]) -> CompileResult<()> {
    if !self.is_function(func, name) {
      return Err(CompileError::UndefinedIdentifier {
        name: name.to_string(),
      });
    }

    func.line("\tpush {r0, r1, r2, r3}");
    for (index, arg) in args.iter().enumerate() {
      let item = self.item_for(arg, &mut || func.data_name());
      self.load_item(func, index, &item)?;
    }
    func.line(format!("\tbl {name}"));
    func.line("\tpop {r0, r1, r2, r3}");
    func.line("");
    Ok(())
  }

  fn is_function(&self, current: &Function, name: &str) -> bool {
    current.name == name || self.functions.iter().any(|f| f.name == name)
  }

  /// Translate an expression into the generator's chain form, registering
  /// `.data` entries for any string literals along the way.
  fn chain_for(&mut self, expr: &Expr, namer: &mut dyn FnMut() -> String) -> Chain {
    let first = self.item_for(&expr.first, namer);
    let rest = expr
      .rest
      .iter()
      .map(|(op, operand)| (*op, self.item_for(operand, namer)))
      .collect();
    Chain { first, rest }
  }

  fn item_for(&mut self, operand: &Operand, namer: &mut dyn FnMut() -> String) -> Item {
    match operand {
      Operand::Number(text) => Item::Number(text.clone()),
      Operand::Nil | Operand::False => Item::Number("0".to_string()),
      Operand::True => Item::Number("1".to_string()),
      Operand::Str(text) => {
        let name = namer();
        self
          .data
          .push(DataDecl::new(name.clone(), Directive::Asciz, text.clone()));
        Item::StrData(name)
      }
      Operand::Ident(name) => Item::Ref(name.clone()),
    }
  }

  /// Load the first chain element into the target register, then fold each
  /// `(operator, operand)` pair into it. Comparison operators need a branch
  /// context; arithmetic folds in place. Temporaries are rewound on exit.
  fn reduce_chain(
    &mut self,
    func: &mut Function,
    target: usize,
    chain: &Chain,
    branch: Option<&Branch>,
  ) -> CompileResult<()> {
    self.load_item(func, target, &chain.first)?;

    let mark = func.registers.mark();
    for (op, item) in &chain.rest {
      let temp = func.registers.push();
      self.load_item(func, temp, item)?;

      if op.is_comparison() {
        let Some(branch) = branch else {
          return Err(CompileError::UnsupportedConstruct {
            what: format!("comparison \"{}\" outside a conditional", op.text()),
          });
        };
        let Some(mnemonic) = branch_mnemonic(*op, branch.backward) else {
          return Err(CompileError::UnsupportedConstruct {
            what: format!("operator \"{}\" has no branch lowering", op.text()),
          });
        };
        func.line(format!("\tcmp r{target}, r{temp}"));
        func.line(format!("\t{mnemonic} {}", branch.label));
      } else {
        match op {
          BinOp::Add => func.line(format!("\tadd r{target}, r{target}, r{temp}")),
          BinOp::Sub => func.line(format!("\tsub r{target}, r{target}, r{temp}")),
          BinOp::Mul => func.line(format!("\tmul r{target}, r{temp}, r{target}")),
          _ => {
            return Err(CompileError::UnsupportedConstruct {
              what: format!("operator \"{}\" has no lowering", op.text()),
            });
          }
        }
      }
    }
    func.registers.rewind(mark);
    Ok(())
  }

  /// Materialize one chain element in a register. Identifiers resolve, in
  /// order: function-local statement (register move, elided when already in
  /// place), global (its chain re-reduced straight into the target), a
  /// generated function (the call is re-issued with r0 saved around it).
  fn load_item(&mut self, func: &mut Function, register: usize, item: &Item) -> CompileResult<()> {
    match item {
      Item::Number(value) => func.line(format!("\tmov r{register}, #{value}")),
      Item::StrData(name) => func.line(format!("\tldr r{register}, addr_{name}")),
      Item::Ref(name) => {
        if let Some(statement) = func.statement(name) {
          if statement.register != register {
            let from = statement.register;
            func.line(format!("\tmov r{register}, r{from}"));
          }
        } else if let Some(global) = self.globals.get(name) {
          let chain = global
            .chain
            .clone()
            .ok_or_else(|| CompileError::InvalidDataState { name: name.clone() })?;
          self.reduce_chain(func, register, &chain, None)?;
        } else if self.is_function(func, name) {
          if register != 0 {
            func.line("\tpush {r0}");
            func.line(format!("\tbl {name}"));
            func.line(format!("\tmov r{register}, r0"));
            func.line("\tpop {r0}");
          } else {
            func.line(format!("\tbl {name}"));
          }
        } else {
          return Err(CompileError::UndefinedIdentifier { name: name.clone() });
        }
      }
    }
    Ok(())
  }
}

/// Branch mnemonic for a comparison. Forward branches exit the construct, so
/// the condition is inverted; backward branches re-enter a loop on success.
fn branch_mnemonic(op: BinOp, backward: bool) -> Option<&'static str> {
  Some(match (op, backward) {
    (BinOp::Lt, false) => "bge",
    (BinOp::Gt, false) => "ble",
    (BinOp::Ge, false) => "blt",
    (BinOp::Le, false) => "bgt",
    (BinOp::Eq, false) => "bne",
    (BinOp::Ne, false) => "beq",
    (BinOp::Lt, true) => "blt",
    (BinOp::Gt, true) => "bgt",
    (BinOp::Ge, true) => "bge",
    (BinOp::Le, true) => "ble",
    (BinOp::Eq, true) => "beq",
    (BinOp::Ne, true) => "bne",
    _ => return None,
  })
}
