//! Recursive-descent parser producing a list of top-level constructs.
//!
//! The parser maintains a single forward cursor over the token vector and
//! transparently skips whitespace and comment tokens so they never reach a
//! grammar rule. Each grammar rule is a function; the top level dispatches on
//! whether the current token is `function` or an identifier.

use crate::ast::{BinOp, Block, Expr, FunctionDecl, GlobalDecl, Operand, Stmt, TopLevel};
use crate::error::{CompileError, CompileResult};
use crate::lexer::{Token, TokenKind};

/// Parse a token sequence into an ordered list of top-level trees.
pub fn parse(tokens: Vec<Token>) -> CompileResult<Vec<TopLevel>> {
  let mut stream = TokenStream::new(tokens);
  let mut items = Vec::new();

  loop {
    match stream.current("expected a top-level construct")?.kind {
      TokenKind::Eof => break,
      TokenKind::Function => items.push(TopLevel::Function(parse_function(&mut stream)?)),
      TokenKind::Identifier => items.push(TopLevel::Global(parse_global(&mut stream)?)),
      _ => {
        return Err(stream.unexpected("only functions and global statements may appear here"));
      }
    }
  }

  Ok(items)
}

/// `function := 'function' identifier '(' [ identifier { ',' identifier } ] ')' block 'end'`
fn parse_function(stream: &mut TokenStream) -> CompileResult<FunctionDecl> {
  stream.expect(TokenKind::Function, "function definitions start with \"function\"")?;
  let name = stream
    .expect(TokenKind::Identifier, "function definitions need a name")?
    .text;

  stream.expect(TokenKind::OpenBracket, "function names are followed by \"(\"")?;
  let mut params = Vec::new();
  if stream.accept(TokenKind::CloseBracket).is_none() {
    loop {
      let param = stream.expect(TokenKind::Identifier, "parameter lists hold identifiers")?;
      params.push(param.text);
      if stream.accept(TokenKind::Comma).is_none() {
        break;
      }
    }
    stream.expect(TokenKind::CloseBracket, "parameter lists close with \")\"")?;
  }

  let body = parse_block(stream, TokenKind::End)?;
  stream.expect(TokenKind::End, "function bodies close with \"end\"")?;

  Ok(FunctionDecl { name, params, body })
}

/// `global-statement := identifier '=' expression`
fn parse_global(stream: &mut TokenStream) -> CompileResult<GlobalDecl> {
  let name = stream
    .expect(TokenKind::Identifier, "global statements start with a name")?
    .text;
  stream.expect(TokenKind::Equals, "global statements assign with \"=\"")?;
  let value = parse_expr(stream)?;
  Ok(GlobalDecl { name, value })
}

/// `block := { statement | if | while }, [ return-statement ]`
///
/// The block stops (without consuming) at the terminator kind; a `return`
/// always ends the block, so nothing may follow it.
fn parse_block(stream: &mut TokenStream, terminator: TokenKind) -> CompileResult<Block> {
  let mut stmts = Vec::new();

  loop {
    let current = stream.current("a block must be closed")?;
    if current.kind == terminator {
      break;
    }

    match current.kind {
      TokenKind::Return => {
        stream.advance()?;
        let value = if stream.at_operand()? {
          Some(parse_expr(stream)?)
        } else {
          None
        };
        stmts.push(Stmt::Return { value });
        // A return terminates the chain; the terminator must follow.
        break;
      }
      TokenKind::Local => {
        stream.advance()?;
        let name = stream
          .expect(TokenKind::Identifier, "\"local\" declares a named binding")?
          .text;
        let value = if stream.accept(TokenKind::Equals).is_some() {
          Some(parse_expr(stream)?)
        } else {
          None
        };
        stmts.push(Stmt::Local { name, value });
      }
      TokenKind::Identifier => {
        let name = stream.advance()?.text;
        if stream.accept(TokenKind::Equals).is_some() {
          let value = parse_expr(stream)?;
          stmts.push(Stmt::Assign { name, value });
        } else if stream.accept(TokenKind::OpenBracket).is_some() {
          let args = parse_call_args(stream)?;
          stmts.push(Stmt::Call { name, args });
        } else {
          stmts.push(Stmt::Bare { name });
        }
      }
      TokenKind::If => {
        stream.advance()?;
        let cond = parse_expr(stream)?;
        stream.expect(TokenKind::Then, "an if condition is followed by \"then\"")?;
        let body = parse_block(stream, TokenKind::EndIf)?;
        stream.expect(TokenKind::EndIf, "if blocks close with \"end if\"")?;
        stmts.push(Stmt::If { cond, body });
      }
      TokenKind::While => {
        stream.advance()?;
        let cond = parse_expr(stream)?;
        stream.expect(TokenKind::Then, "a while condition is followed by \"then\"")?;
        let body = parse_block(stream, TokenKind::EndWhile)?;
        stream.expect(TokenKind::EndWhile, "while blocks close with \"end while\"")?;
        stmts.push(Stmt::While { cond, body });
      }
      _ => return Err(stream.unexpected("expected a statement")),
    }
  }

  Ok(Block { stmts })
}

/// `arg-list := '(' [ operand { ',' operand } ] ')'` with the opening bracket
/// already consumed. Call arguments are literals or identifiers.
fn parse_call_args(stream: &mut TokenStream) -> CompileResult<Vec<Operand>> {
  let mut args = Vec::new();
  if stream.accept(TokenKind::CloseBracket).is_some() {
    return Ok(args);
  }

  loop {
    args.push(parse_operand(stream)?);
    if stream.accept(TokenKind::Comma).is_none() {
      break;
    }
  }
  stream.expect(TokenKind::CloseBracket, "argument lists close with \")\"")?;
  Ok(args)
}

/// `expression := operand [ operator expression ]`, flattened into an
/// operator chain so the generator can reduce it left-to-right.
fn parse_expr(stream: &mut TokenStream) -> CompileResult<Expr> {
  let first = parse_operand(stream)?;
  let mut rest = Vec::new();

  while stream.current("expression")?.kind == TokenKind::Operator {
    let token = stream.advance()?;
    let Some(op) = BinOp::from_text(&token.text) else {
      return Err(CompileError::UnexpectedToken {
        found: token.text,
        context: "unknown operator".to_string(),
        line: token.position.line,
        column: token.position.column,
      });
    };
    rest.push((op, parse_operand(stream)?));
  }

  Ok(Expr { first, rest })
}

fn parse_operand(stream: &mut TokenStream) -> CompileResult<Operand> {
  let token = stream.advance()?;
  let operand = match token.kind {
    TokenKind::Number => Operand::Number(token.text),
    TokenKind::Str => Operand::Str(token.text),
    TokenKind::Nil => Operand::Nil,
    TokenKind::True => Operand::True,
    TokenKind::False => Operand::False,
    TokenKind::Identifier => Operand::Ident(token.text),
    _ => {
      return Err(CompileError::UnexpectedToken {
        found: token.text,
        context: "expected an expression operand".to_string(),
        line: token.position.line,
        column: token.position.column,
      });
    }
  };
  Ok(operand)
}

/// Lightweight forward cursor over the token vector. Whitespace and comments
/// are skipped on every access so grammar rules never see them.
struct TokenStream {
  tokens: Vec<Token>,
  pos: usize,
}

impl TokenStream {
  fn new(tokens: Vec<Token>) -> Self {
    Self { tokens, pos: 0 }
  }

  fn skip_trivia(&mut self) {
    while let Some(token) = self.tokens.get(self.pos)
      && matches!(token.kind, TokenKind::Whitespace | TokenKind::Comment)
    {
      self.pos += 1;
    }
  }

  /// The current non-trivia token.
  fn current(&mut self, context: &str) -> CompileResult<&Token> {
    self.skip_trivia();
    self.tokens.get(self.pos).ok_or_else(|| {
      CompileError::UnexpectedEndOfInput {
        context: context.to_string(),
      }
    })
  }

  /// Consume and return the current non-trivia token.
  fn advance(&mut self) -> CompileResult<Token> {
    self.skip_trivia();
    let token = self
      .tokens
      .get(self.pos)
      .cloned()
      .ok_or_else(|| CompileError::UnexpectedEndOfInput {
        context: "token stream exhausted".to_string(),
      })?;
    self.pos += 1;
    Ok(token)
  }

  /// Consume the current token if it has the given kind.
  fn accept(&mut self, kind: TokenKind) -> Option<Token> {
    self.skip_trivia();
    if let Some(token) = self.tokens.get(self.pos)
      && token.kind == kind
    {
      let token = token.clone();
      self.pos += 1;
      return Some(token);
    }
    None
  }

  fn expect(&mut self, kind: TokenKind, context: &str) -> CompileResult<Token> {
    match self.accept(kind) {
      Some(token) => Ok(token),
      None => Err(self.unexpected(context)),
    }
  }

  /// Does the current token start an expression operand?
  fn at_operand(&mut self) -> CompileResult<bool> {
    Ok(matches!(
      self.current("expression")?.kind,
      TokenKind::Number
        | TokenKind::Str
        | TokenKind::Nil
        | TokenKind::True
        | TokenKind::False
        | TokenKind::Identifier
    ))
  }

  fn unexpected(&mut self, context: &str) -> CompileError {
    self.skip_trivia();
    match self.tokens.get(self.pos) {
      Some(token) => CompileError::UnexpectedToken {
        found: if token.kind == TokenKind::Eof {
          "EOF".to_string()
        } else {
          token.text.clone()
        },
        context: context.to_string(),
        line: token.position.line,
        column: token.position.column,
      },
      None => CompileError::UnexpectedEndOfInput {
        context: context.to_string(),
      },
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::lexer::tokenize;

  fn parse_source(source: &str) -> CompileResult<Vec<TopLevel>> {
    parse(tokenize(source).unwrap())
  }

  fn only_function(source: &str) -> FunctionDecl {
    let items = parse_source(source).unwrap();
    assert_eq!(items.len(), 1);
    match items.into_iter().next().unwrap() {
      TopLevel::Function(f) => f,
      TopLevel::Global(g) => panic!("expected a function, got global {}", g.name),
    }
  }

  #[test]
  fn empty_function() {
    let func = only_function("function main()\nend");
    assert_eq!(func.name, "main");
    assert!(func.params.is_empty());
    assert!(func.body.stmts.is_empty());
  }

  #[test]
  fn local_number_keeps_literal_text() {
    let func = only_function("function main()\n  local bob = 1\nend");
    let Stmt::Local { name, value } = &func.body.stmts[0] else {
      panic!("expected a local statement");
    };
    assert_eq!(name, "bob");
    let value = value.as_ref().unwrap();
    assert_eq!(value.first, Operand::Number("1".to_string()));
    assert!(value.rest.is_empty());
  }

  #[test]
  fn local_without_initialiser_parses() {
    let func = only_function("function main()\n  local bob\nend");
    assert!(matches!(
      &func.body.stmts[0],
      Stmt::Local { value: None, .. }
    ));
  }

  #[test]
  fn return_is_the_last_statement() {
    let func = only_function("function main()\n  local bob = 1\n  return 0\nend");
    assert_eq!(func.body.stmts.len(), 2);
    let Stmt::Return { value } = &func.body.stmts[1] else {
      panic!("expected a return statement");
    };
    assert_eq!(
      value.as_ref().unwrap().first,
      Operand::Number("0".to_string())
    );
  }

  #[test]
  fn statements_after_return_are_rejected() {
    let err = parse_source("function main()\n  return 0\n  local bob = 1\nend").unwrap_err();
    assert!(matches!(err, CompileError::UnexpectedToken { .. }));
  }

  #[test]
  fn parameters_and_global_promotion() {
    let func = only_function("function main(trevor, bob)\n  bob = 1\n  return 0\nend");
    assert_eq!(func.params, vec!["trevor".to_string(), "bob".to_string()]);
    assert!(matches!(&func.body.stmts[0], Stmt::Assign { name, .. } if name == "bob"));
  }

  #[test]
  fn comments_do_not_reach_the_grammar() {
    let func = only_function("function main()\n  // bob = 1\n  return 0\nend");
    assert_eq!(func.body.stmts.len(), 1);
    assert!(matches!(&func.body.stmts[0], Stmt::Return { .. }));
  }

  #[test]
  fn expression_chains_stay_flat() {
    let func = only_function("function main()\n  local a = 1 + 2 * 3\nend");
    let Stmt::Local {
      value: Some(expr), ..
    } = &func.body.stmts[0]
    else {
      panic!("expected an initialised local");
    };
    assert_eq!(expr.first, Operand::Number("1".to_string()));
    assert_eq!(expr.rest.len(), 2);
    assert_eq!(expr.rest[0].0, BinOp::Add);
    assert_eq!(expr.rest[1].0, BinOp::Mul);
  }

  #[test]
  fn if_and_while_blocks_nest() {
    let func = only_function(
      "function main()\n  local a = 1\n  if a < 2 then\n    local b = 3\n  end if\n  \
       while a > 0 then\n    local c = 4\n  end while\nend",
    );
    assert_eq!(func.body.stmts.len(), 3);
    assert!(matches!(&func.body.stmts[1], Stmt::If { .. }));
    assert!(matches!(&func.body.stmts[2], Stmt::While { .. }));
  }

  #[test]
  fn call_arguments_are_operands() {
    let func = only_function("function main()\n  print(\"hi\", 2, bob)\nend");
    let Stmt::Call { name, args } = &func.body.stmts[0] else {
      panic!("expected a call statement");
    };
    assert_eq!(name, "print");
    assert_eq!(args.len(), 3);
    assert_eq!(args[0], Operand::Str("\"hi\"".to_string()));
    assert_eq!(args[2], Operand::Ident("bob".to_string()));
  }

  #[test]
  fn top_level_global_statement() {
    let items = parse_source("x = 1 + 2").unwrap();
    let TopLevel::Global(global) = &items[0] else {
      panic!("expected a global");
    };
    assert_eq!(global.name, "x");
    assert_eq!(global.value.rest.len(), 1);
  }

  #[test]
  fn top_level_local_is_rejected() {
    let err = parse_source("local x = 1").unwrap_err();
    assert!(matches!(err, CompileError::UnexpectedToken { .. }));
  }
}
