use crate::{
  diagnostics::{Diagnostic, DiagnosticEngine},
  source::{Location, SourceFile, SourceKind},
  tokens::{
    directive_kind, identifier_kind, macro_kind, CharacterPosition, ColumnNumber, LineNumber,
    Token, TokenKind, TokenStream,
  },
};
use std::rc::Rc;

/// Bookkeeping captured at the start of a token
#[derive(Copy, Clone)]
struct Start {
  position: usize,
  line: LineNumber,
  column: ColumnNumber,
}

/// Converts one source file's text into a `TokenStream`.
///
/// A single forward scan over the bytes of the file, with one character of
/// manual lookahead for the two-part operators and a sub-state for
/// `#cs`..`#ce` comment blocks. The lexer never fails: malformed input is
/// skipped or turned into `Garbage` tokens, with a diagnostic reported
/// through the engine.
pub struct Lexer<'source> {
  file: &'source SourceFile,
  source: &'source [u8],
  position: usize,
  line: LineNumber,
  column: ColumnNumber,
  in_comment_block: bool,
}

impl<'source> Lexer<'source> {
  pub fn new(file: &'source SourceFile) -> Self {
    Self {
      file,
      source: file.contents.as_bytes(),
      position: 0,
      line: 1,
      column: 1,
      in_comment_block: false,
    }
  }

  pub fn reset(&mut self) {
    self.position = 0;
    self.line = 1;
    self.column = 1;
    self.in_comment_block = false;
  }

  /// Tokenizes the whole file into a finalized stream. Deterministic: the
  /// lexer resets itself first, so repeated calls yield identical streams.
  pub fn process(&mut self, diagnostics: &mut DiagnosticEngine) -> TokenStream {
    self.reset();
    let mut stream = TokenStream::new();
    while let Some(token) = self.next_token(diagnostics) {
      stream.push(token);
    }
    stream.finalize();
    stream
  }

  /// Convenience for tokenizing a file in one call
  pub fn process_file(file: &SourceFile, diagnostics: &mut DiagnosticEngine) -> TokenStream {
    Lexer::new(file).process(diagnostics)
  }

  /// Tokenizes in-memory text, returning the backing file alongside the
  /// stream so token texts can still be resolved
  pub fn process_string(
    name: &str,
    text: &str,
    diagnostics: &mut DiagnosticEngine,
  ) -> (SourceFile, TokenStream) {
    let file = SourceFile {
      path: format!("<{name}>").into(),
      name: Rc::from(name),
      kind: SourceKind::Basic,
      contents: text.to_owned(),
    };
    let stream = Lexer::new(&file).process(diagnostics);
    (file, stream)
  }

  fn peek(&self) -> Option<u8> {
    self.source.get(self.position).copied()
  }

  fn peek_next(&self) -> Option<u8> {
    self.source.get(self.position + 1).copied()
  }

  /// Consumes one byte. `\n` increments the line and resets the column; this
  /// is the only place either counter changes, so bookkeeping is identical
  /// inside and outside comment blocks.
  fn advance(&mut self) {
    if self.source.get(self.position) == Some(&b'\n') {
      self.line += 1;
      self.column = 1;
    } else {
      self.column += 1;
    }
    self.position += 1;
  }

  fn start(&self) -> Start {
    Start {
      position: self.position,
      line: self.line,
      column: self.column,
    }
  }

  fn location_at(&self, start: Start) -> Location {
    self.file.location(start.line, start.column)
  }

  // files over 2^32 characters are not supported
  #[allow(clippy::cast_possible_truncation)]
  fn make_token(&self, kind: TokenKind, start: Start) -> Token {
    Token {
      kind,
      start: start.position as CharacterPosition,
      end: self.position as CharacterPosition,
      line: start.line,
      column: start.column,
    }
  }

  fn next_token(&mut self, diagnostics: &mut DiagnosticEngine) -> Option<Token> {
    if self.in_comment_block {
      return self.block_comment(diagnostics);
    }

    loop {
      match self.peek() {
        Some(b' ' | b'\t' | b'\r') => self.advance(),
        Some(b'\0') => {
          let start = self.start();
          diagnostics.report(
            Diagnostic::warning(self.location_at(start), "embedded null character in source")
              .with_flag("embedded-null"),
          );
          self.advance();
        }
        _ => break,
      }
    }

    let start = self.start();

    if let Some(kind) = self.two_part_operator() {
      self.advance();
      self.advance();
      return Some(self.make_token(kind, start));
    }

    let byte = self.peek()?;
    let token = match byte {
      b'\n' => {
        self.advance();
        self.make_token(TokenKind::NewLine, start)
      }
      b';' => self.line_comment(start),
      b'"' | b'\'' => return self.string_literal(start, diagnostics),
      b'0'..=b'9' => self.number(start, diagnostics),
      b'.' if matches!(self.peek_next(), Some(b'0'..=b'9')) => self.number(start, diagnostics),
      b'_' | b'a'..=b'z' | b'A'..=b'Z' => self.identifier(start),
      b'$' => self.variable(start, diagnostics),
      b'@' => self.macro_name(start, diagnostics),
      b'#' => self.directive(start, diagnostics),
      b'(' => self.single(TokenKind::LeftParen, start),
      b')' => self.single(TokenKind::RightParen, start),
      b'[' => self.single(TokenKind::LeftSquare, start),
      b']' => self.single(TokenKind::RightSquare, start),
      b',' => self.single(TokenKind::Comma, start),
      b'.' => self.single(TokenKind::Dot, start),
      b'?' => self.single(TokenKind::Question, start),
      b':' => self.single(TokenKind::Colon, start),
      b'=' => self.single(TokenKind::Equal, start),
      b'+' => self.single(TokenKind::Plus, start),
      b'-' => self.single(TokenKind::Minus, start),
      b'*' => self.single(TokenKind::Star, start),
      b'/' => self.single(TokenKind::Slash, start),
      b'^' => self.single(TokenKind::Caret, start),
      b'&' => self.single(TokenKind::Ampersand, start),
      b'<' => self.single(TokenKind::Less, start),
      b'>' => self.single(TokenKind::Greater, start),
      _ => {
        // consume the whole UTF-8 sequence so token spans stay sliceable
        self.advance();
        while matches!(self.peek(), Some(0x80..=0xBF)) {
          self.advance();
        }
        let token = self.make_token(TokenKind::Garbage, start);
        diagnostics.report(Diagnostic::error(
          self.location_at(start),
          format!(
            "unexpected character '{}'",
            token.get_value(&self.file.contents)
          ),
        ));
        token
      }
    };

    Some(token)
  }

  fn single(&mut self, kind: TokenKind, start: Start) -> Token {
    self.advance();
    self.make_token(kind, start)
  }

  /// Recognizes a two-part operator by peeking exactly one character past a
  /// one-part operator; an unmatched peek falls back to the one-part token.
  fn two_part_operator(&self) -> Option<TokenKind> {
    match (self.peek()?, self.peek_next()?) {
      (b'=', b'=') => Some(TokenKind::EqualEqual),
      (b'<', b'>') => Some(TokenKind::NotEqual),
      (b'<', b'=') => Some(TokenKind::LessEqual),
      (b'>', b'=') => Some(TokenKind::GreaterEqual),
      (b'+', b'=') => Some(TokenKind::PlusEqual),
      (b'-', b'=') => Some(TokenKind::MinusEqual),
      (b'*', b'=') => Some(TokenKind::StarEqual),
      (b'/', b'=') => Some(TokenKind::SlashEqual),
      (b'&', b'=') => Some(TokenKind::AmpersandEqual),
      _ => None,
    }
  }

  fn line_comment(&mut self, start: Start) -> Token {
    while !matches!(self.peek(), None | Some(b'\n')) {
      self.advance();
    }
    self.make_token(TokenKind::Comment, start)
  }

  /// `'...'` or `"..."` with no escape processing of any kind. An
  /// unterminated literal yields no token at all and is diagnosed.
  fn string_literal(
    &mut self,
    start: Start,
    diagnostics: &mut DiagnosticEngine,
  ) -> Option<Token> {
    let quote = self.source[start.position];
    self.advance();

    loop {
      match self.peek() {
        None => {
          diagnostics.report(Diagnostic::error(
            self.location_at(start),
            format!("unterminated string literal, missing closing {}", quote as char),
          ));
          return None;
        }
        Some(byte) if byte == quote => {
          self.advance();
          return Some(self.make_token(TokenKind::StringLiteral, start));
        }
        Some(_) => self.advance(),
      }
    }
  }

  /// Decimal, hexadecimal (`0x...`) or float (at most one `.`) literals. A
  /// hex literal with a `.`, a trailing `.`, or excess `.`s produce one
  /// `Garbage` token spanning the whole blob.
  fn number(&mut self, start: Start, diagnostics: &mut DiagnosticEngine) -> Token {
    let mut garbage = false;
    let mut seen_dot = false;

    let is_hex =
      self.peek() == Some(b'0') && matches!(self.peek_next(), Some(b'x') | Some(b'X'));

    if is_hex {
      self.advance();
      self.advance();
      let mut digits = 0;
      loop {
        match self.peek() {
          Some(byte) if byte.is_ascii_hexdigit() => {
            digits += 1;
            self.advance();
          }
          Some(b'.') => {
            garbage = true;
            self.advance();
          }
          _ => break,
        }
      }
      if digits == 0 {
        garbage = true;
      }
    } else {
      let mut trailing_dot = false;
      loop {
        match self.peek() {
          Some(b'0'..=b'9') => {
            trailing_dot = false;
            self.advance();
          }
          Some(b'.') => {
            if seen_dot {
              garbage = true;
            }
            seen_dot = true;
            trailing_dot = true;
            self.advance();
          }
          _ => break,
        }
      }
      if trailing_dot {
        garbage = true;
      }
    }

    if garbage {
      let token = self.make_token(TokenKind::Garbage, start);
      diagnostics.report(Diagnostic::error(
        self.location_at(start),
        format!(
          "malformed number literal '{}'",
          token.get_value(&self.file.contents)
        ),
      ));
      return token;
    }

    let kind = if seen_dot {
      TokenKind::FloatLiteral
    } else {
      TokenKind::IntegerLiteral
    };
    self.make_token(kind, start)
  }

  fn consume_identifier_characters(&mut self) -> usize {
    let mut consumed = 0;
    while matches!(self.peek(), Some(byte) if byte.is_ascii_alphanumeric() || byte == b'_') {
      self.advance();
      consumed += 1;
    }
    consumed
  }

  fn identifier(&mut self, start: Start) -> Token {
    self.consume_identifier_characters();
    let text = &self.file.contents[start.position..self.position];
    self.make_token(identifier_kind(&text.to_ascii_lowercase()), start)
  }

  fn variable(&mut self, start: Start, diagnostics: &mut DiagnosticEngine) -> Token {
    self.advance(); // $
    if self.consume_identifier_characters() == 0 {
      diagnostics.report(Diagnostic::error(
        self.location_at(start),
        "expected a variable name after '$'",
      ));
      return self.make_token(TokenKind::Garbage, start);
    }
    self.make_token(TokenKind::Variable, start)
  }

  fn macro_name(&mut self, start: Start, diagnostics: &mut DiagnosticEngine) -> Token {
    self.advance(); // @
    if self.consume_identifier_characters() == 0 {
      diagnostics.report(Diagnostic::error(
        self.location_at(start),
        "expected a macro name after '@'",
      ));
      return self.make_token(TokenKind::Garbage, start);
    }

    let name = &self.file.contents[start.position + 1..self.position];
    let kind = macro_kind(&name.to_ascii_lowercase());
    if kind == TokenKind::Garbage {
      diagnostics.report(Diagnostic::error(
        self.location_at(start),
        format!("unknown macro '@{name}'"),
      ));
    }
    self.make_token(kind, start)
  }

  fn consume_directive_characters(&mut self) -> usize {
    let mut consumed = 0;
    while matches!(self.peek(), Some(byte) if byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'-')
    {
      self.advance();
      consumed += 1;
    }
    consumed
  }

  fn directive(&mut self, start: Start, diagnostics: &mut DiagnosticEngine) -> Token {
    self.advance(); // #
    if self.consume_directive_characters() == 0 {
      diagnostics.report(Diagnostic::error(
        self.location_at(start),
        "expected a directive name after '#'",
      ));
      return self.make_token(TokenKind::Garbage, start);
    }

    let name = &self.file.contents[start.position + 1..self.position];
    let kind = directive_kind(&name.to_ascii_lowercase());
    if kind == TokenKind::Garbage {
      diagnostics.report(Diagnostic::error(
        self.location_at(start),
        format!("unknown directive '#{name}'"),
      ));
    }

    if kind == TokenKind::CommentsStart {
      self.in_comment_block = true;
    }
    self.make_token(kind, start)
  }

  /// Inside a `#cs` block everything up to the closing directive is
  /// swallowed into one `Comment` token spanning newlines. The closing
  /// directive itself is left unconsumed and lexed as its own token
  /// afterwards.
  fn block_comment(&mut self, diagnostics: &mut DiagnosticEngine) -> Option<Token> {
    let start = self.start();

    loop {
      match self.peek() {
        None => {
          self.in_comment_block = false;
          diagnostics.report(
            Diagnostic::warning(self.location_at(start), "unterminated comment block")
              .with_flag("unterminated-comment"),
          );
          return if self.position > start.position {
            Some(self.make_token(TokenKind::Comment, start))
          } else {
            None
          };
        }
        Some(b'#') if self.closing_directive_ahead() => {
          self.in_comment_block = false;
          return if self.position > start.position {
            Some(self.make_token(TokenKind::Comment, start))
          } else {
            self.next_token(diagnostics)
          };
        }
        Some(_) => self.advance(),
      }
    }
  }

  fn closing_directive_ahead(&self) -> bool {
    let mut end = self.position + 1;
    while end < self.source.len()
      && (self.source[end].is_ascii_alphanumeric()
        || self.source[end] == b'_'
        || self.source[end] == b'-')
    {
      end += 1;
    }
    let name = &self.file.contents[self.position + 1..end];
    directive_kind(&name.to_ascii_lowercase()) == TokenKind::CommentsEnd
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::source::SourceKind;
  use std::rc::Rc;

  struct Lexed {
    file: SourceFile,
    tokens: Vec<Token>,
    errors: usize,
    warnings: usize,
  }
  impl Lexed {
    fn text(&self, index: usize) -> &str {
      self.tokens[index].get_value(&self.file.contents)
    }
  }

  fn tokenize(source: &str) -> Lexed {
    let mut diagnostics = DiagnosticEngine::silent();
    let (file, stream) = Lexer::process_string("test.au3", source, &mut diagnostics);
    Lexed {
      tokens: stream.tokens().to_vec(),
      errors: diagnostics.error_count(),
      warnings: diagnostics.warning_count(),
      file,
    }
  }

  fn kinds(source: &str) -> Vec<TokenKind> {
    tokenize(source).tokens.iter().map(|t| t.kind).collect()
  }

  #[test]
  fn should_have_no_tokens_for_blank_input() {
    assert_eq!(tokenize("").tokens.len(), 0);
    assert_eq!(tokenize(" ").tokens.len(), 0);
    assert_eq!(tokenize(" \t\r ").tokens.len(), 0);
    assert_eq!(tokenize("\0").tokens.len(), 0);
  }

  #[test]
  fn should_warn_on_embedded_null() {
    assert_eq!(tokenize("\0").warnings, 1);
  }

  #[test]
  fn should_tokenize_newlines_with_positions() {
    let lexed = tokenize("\n");
    assert_eq!(lexed.tokens.len(), 1);
    assert_eq!(lexed.tokens[0].kind, TokenKind::NewLine);
    assert_eq!(lexed.tokens[0].line, 1);
    assert_eq!(lexed.tokens[0].column, 1);
    assert_eq!(lexed.text(0), "\n");

    let lexed = tokenize("\n\n");
    assert_eq!(lexed.tokens.len(), 2);
    assert_eq!(lexed.tokens[0].line, 1);
    assert_eq!(lexed.tokens[1].line, 2);
    assert_eq!(lexed.tokens[1].column, 1);
  }

  #[test]
  fn should_tokenize_variables() {
    let lexed = tokenize("$a");
    assert_eq!(lexed.tokens.len(), 1);
    assert_eq!(lexed.tokens[0].kind, TokenKind::Variable);
    assert_eq!(lexed.text(0), "$a");

    let lexed = tokenize("$");
    assert_eq!(lexed.tokens.len(), 1);
    assert_eq!(lexed.tokens[0].kind, TokenKind::Garbage);
    assert_eq!(lexed.errors, 1);
  }

  #[test]
  fn should_tokenize_numbers() {
    let lexed = tokenize("0x1A");
    assert_eq!(lexed.tokens.len(), 1);
    assert_eq!(lexed.tokens[0].kind, TokenKind::IntegerLiteral);
    assert_eq!(lexed.text(0), "0x1A");

    assert_eq!(kinds("752"), vec![TokenKind::IntegerLiteral]);
    assert_eq!(kinds("1.5"), vec![TokenKind::FloatLiteral]);
    assert_eq!(kinds(".75"), vec![TokenKind::FloatLiteral]);
  }

  #[test]
  fn should_reject_malformed_numbers() {
    let lexed = tokenize("1.2.3");
    assert_eq!(lexed.tokens.len(), 1);
    assert_eq!(lexed.tokens[0].kind, TokenKind::Garbage);
    assert_eq!(lexed.text(0), "1.2.3");

    assert_eq!(kinds("1."), vec![TokenKind::Garbage]);
    assert_eq!(kinds("0x"), vec![TokenKind::Garbage]);
    assert_eq!(kinds("0x1.2"), vec![TokenKind::Garbage]);
  }

  #[test]
  fn should_tokenize_strings_without_escapes() {
    let lexed = tokenize("'hello'");
    assert_eq!(lexed.tokens.len(), 1);
    assert_eq!(lexed.tokens[0].kind, TokenKind::StringLiteral);
    assert_eq!(lexed.text(0), "'hello'");

    let lexed = tokenize("\"it's\"");
    assert_eq!(lexed.tokens.len(), 1);
    assert_eq!(lexed.text(0), "\"it's\"");

    // no escape processing: backslash is a plain character
    let lexed = tokenize(r"'a\n'");
    assert_eq!(lexed.tokens.len(), 1);
    assert_eq!(lexed.text(0), r"'a\n'");
  }

  #[test]
  fn should_drop_unterminated_strings_with_a_diagnostic() {
    let lexed = tokenize("'oops");
    assert_eq!(lexed.tokens.len(), 0);
    assert_eq!(lexed.errors, 1);
  }

  #[test]
  fn should_tokenize_two_part_operators_with_fallback() {
    assert_eq!(
      kinds("== <> <= >= += -= *= /= &="),
      vec![
        TokenKind::EqualEqual,
        TokenKind::NotEqual,
        TokenKind::LessEqual,
        TokenKind::GreaterEqual,
        TokenKind::PlusEqual,
        TokenKind::MinusEqual,
        TokenKind::StarEqual,
        TokenKind::SlashEqual,
        TokenKind::AmpersandEqual,
      ]
    );
    assert_eq!(
      kinds("= < > + - * / & ^"),
      vec![
        TokenKind::Equal,
        TokenKind::Less,
        TokenKind::Greater,
        TokenKind::Plus,
        TokenKind::Minus,
        TokenKind::Star,
        TokenKind::Slash,
        TokenKind::Ampersand,
        TokenKind::Caret,
      ]
    );
  }

  #[test]
  fn should_resolve_identifiers_case_insensitively() {
    assert_eq!(
      kinds("While WHILE wHiLe"),
      vec![TokenKind::While, TokenKind::While, TokenKind::While]
    );
    assert_eq!(
      kinds("ConsoleWrite CONSOLEWRITE"),
      vec![
        TokenKind::BuiltinConsoleWrite,
        TokenKind::BuiltinConsoleWrite
      ]
    );
    assert_eq!(kinds("myFunction"), vec![TokenKind::Identifier]);
  }

  #[test]
  fn should_tokenize_macros() {
    assert_eq!(kinds("@CRLF"), vec![TokenKind::MacroCrLf]);
    assert_eq!(kinds("@crlf"), vec![TokenKind::MacroCrLf]);

    let lexed = tokenize("@nope");
    assert_eq!(lexed.tokens[0].kind, TokenKind::Garbage);
    assert_eq!(lexed.errors, 1);
  }

  #[test]
  fn should_tokenize_line_comments() {
    let lexed = tokenize("1 ; the rest\n2");
    assert_eq!(
      lexed.tokens.iter().map(|t| t.kind).collect::<Vec<_>>(),
      vec![
        TokenKind::IntegerLiteral,
        TokenKind::Comment,
        TokenKind::NewLine,
        TokenKind::IntegerLiteral,
      ]
    );
    assert_eq!(lexed.text(1), "; the rest");
  }

  #[test]
  fn should_tokenize_comment_blocks() {
    let lexed = tokenize("#cs\nhello\n#ce");
    assert_eq!(lexed.tokens.len(), 3);
    assert_eq!(lexed.tokens[0].kind, TokenKind::CommentsStart);
    assert_eq!(lexed.tokens[1].kind, TokenKind::Comment);
    assert_eq!(lexed.tokens[2].kind, TokenKind::CommentsEnd);
    assert_eq!(lexed.text(1), "\nhello\n");
    assert_eq!(lexed.tokens[2].line, 3);

    let lexed = tokenize("#comments-start x #comments-end");
    assert_eq!(lexed.tokens.len(), 3);
    assert_eq!(lexed.text(1), " x ");
  }

  #[test]
  fn should_track_lines_across_comment_blocks() {
    let lexed = tokenize("#cs\n\n\n#ce\n$a");
    let variable = lexed.tokens.last().unwrap();
    assert_eq!(variable.kind, TokenKind::Variable);
    assert_eq!(variable.line, 5);
    assert_eq!(variable.column, 1);
  }

  #[test]
  fn should_warn_on_unterminated_comment_block() {
    let lexed = tokenize("#cs\nnever closed");
    assert_eq!(lexed.tokens[0].kind, TokenKind::CommentsStart);
    assert_eq!(lexed.tokens[1].kind, TokenKind::Comment);
    assert_eq!(lexed.warnings, 1);
  }

  #[test]
  fn should_round_trip_token_texts() {
    let source = "Func test($a, $b)\n  ConsoleWrite($a + 0x1F) ; send it\nEndFunc\n";
    let lexed = tokenize(source);

    let mut reconstructed = String::new();
    let mut position = 0;
    for token in &lexed.tokens {
      let gap = &source[position..token.start as usize];
      assert!(gap.chars().all(|c| matches!(c, ' ' | '\t' | '\r' | '\0')));
      reconstructed.push_str(gap);
      reconstructed.push_str(token.get_value(&lexed.file.contents));
      position = token.end as usize;
    }
    reconstructed.push_str(&source[position..]);
    assert_eq!(reconstructed, source);
  }

  #[test]
  fn should_tokenize_a_call_expression() {
    assert_eq!(
      kinds("ConsoleWrite(1 + 2)"),
      vec![
        TokenKind::BuiltinConsoleWrite,
        TokenKind::LeftParen,
        TokenKind::IntegerLiteral,
        TokenKind::Plus,
        TokenKind::IntegerLiteral,
        TokenKind::RightParen,
      ]
    );
  }

  #[test]
  fn should_be_deterministic_across_reuse() {
    let file = SourceFile {
      path: "<test>".into(),
      name: Rc::from("test.au3"),
      kind: SourceKind::Basic,
      contents: "$a = 1\n".to_owned(),
    };
    let mut diagnostics = DiagnosticEngine::silent();
    let mut lexer = Lexer::new(&file);
    let first = lexer.process(&mut diagnostics);
    let second = lexer.process(&mut diagnostics);
    assert_eq!(first.tokens(), second.tokens());
  }
}
