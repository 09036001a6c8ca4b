//! Lexical analysis: turns the raw source string into a vector of tokens.
//!
//! The lexer is driven by an ordered table of regular expressions; at every
//! offset the first rule that matches wins, so keywords are listed ahead of
//! the identifier rule and multi-word keywords (`end if`, `end while`) ahead
//! of `end`. Whitespace and comments are emitted as ordinary tokens and left
//! for the parser to skip, which keeps the scan loop a pure
//! match-and-advance affair.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{CompileError, CompileResult};

/// Kinds of tokens recognised by the front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
  Operator,
  Whitespace,
  Number,
  Str,
  Nil,
  False,
  True,
  Identifier,
  Local,
  Equals,
  OpenBracket,
  CloseBracket,
  Comma,
  Return,
  End,
  Function,
  Comment,
  If,
  EndIf,
  Else,
  Then,
  While,
  EndWhile,
  Eof,
}

/// Position of a token in the source, tracked for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenPosition {
  pub index: usize,
  pub line: usize,
  pub column: usize,
}

#[derive(Debug, Clone)]
pub struct Token {
  pub kind: TokenKind,
  pub text: String,
  pub position: TokenPosition,
}

impl Token {
  fn new(kind: TokenKind, text: &str, position: TokenPosition) -> Self {
    Self {
      kind,
      text: text.to_string(),
      position,
    }
  }
}

/// The ordered rule table. Order matters twice over: operators must be tried
/// before `=` so that `==` never splits, and every keyword must be tried
/// before the identifier rule.
static RULES: Lazy<Vec<(TokenKind, Regex)>> = Lazy::new(|| {
  [
    (TokenKind::Comment, r"\A//.*"),
    (TokenKind::Whitespace, r"\A\s+"),
    (TokenKind::Str, r#"\A"[^"]+""#),
    (TokenKind::Number, r"\A[0-9]+"),
    (
      TokenKind::Operator,
      r"\A(?:>=|<=|==|!=|and\b|or\b|AND\b|OR\b|[+*/<>-])",
    ),
    (TokenKind::Equals, r"\A="),
    (TokenKind::OpenBracket, r"\A\("),
    (TokenKind::CloseBracket, r"\A\)"),
    (TokenKind::Comma, r"\A,"),
    (TokenKind::EndWhile, r"\Aend while\b"),
    (TokenKind::EndIf, r"\Aend if\b"),
    (TokenKind::Nil, r"\A(?:nil|NIL)\b"),
    (TokenKind::False, r"\A(?:false|FALSE)\b"),
    (TokenKind::True, r"\A(?:true|TRUE)\b"),
    (TokenKind::Local, r"\Alocal\b"),
    (TokenKind::Return, r"\Areturn\b"),
    (TokenKind::Function, r"\Afunction\b"),
    (TokenKind::If, r"\Aif\b"),
    (TokenKind::Then, r"\Athen\b"),
    (TokenKind::Else, r"\Aelse\b"),
    (TokenKind::While, r"\Awhile\b"),
    (TokenKind::End, r"\Aend\b"),
    (TokenKind::Identifier, r"\A[a-zA-Z_]\w*"),
  ]
  .into_iter()
  .map(|(kind, pattern)| {
    let regex = Regex::new(pattern).expect("token rule table contains only valid regexes");
    (kind, regex)
  })
  .collect()
});

/// Lex the input into a flat vector of tokens terminated by an `Eof` marker
/// carrying the final position.
pub fn tokenize(source: &str) -> CompileResult<Vec<Token>> {
  let mut tokens = Vec::new();
  let mut index = 0;
  let mut line = 1;
  let mut column = 0;

  while index < source.len() {
    let rest = &source[index..];
    let matched = RULES
      .iter()
      .find_map(|(kind, regex)| regex.find(rest).map(|m| (*kind, m.as_str())));

    let Some((kind, text)) = matched else {
      let found = rest.chars().next().unwrap_or('\0');
      return Err(CompileError::UnexpectedInput {
        found,
        index,
        line,
        column,
      });
    };

    tokens.push(Token::new(kind, text, TokenPosition {
      index,
      line,
      column,
    }));

    for ch in text.chars() {
      if ch == '\n' {
        line += 1;
        column = 0;
      } else {
        column += 1;
      }
    }
    index += text.len();
  }

  tokens.push(Token::new(TokenKind::Eof, "", TokenPosition {
    index,
    line,
    column,
  }));
  Ok(tokens)
}
