use crate::{
  ast::{
    expression::{expression, operators, Callee, Expr, Expression, Keyword},
    statement::{statement, FunctionDefinition, IfCase, Parameter, Statement, Stmt, VariableScope},
    Document,
  },
  diagnostics::{Diagnostic, DiagnosticEngine},
  lexer::Lexer,
  source::{IncludeKind, Location, SourceFile, SourceManager},
  tokens::{Token, TokenKind, TokenStream},
};
use rustc_hash::FxHashSet;
use smartstring::alias::String as SmartString;
use std::{
  io,
  path::{Path, PathBuf},
  rc::Rc,
};

/// Local parse failures. Turned into diagnostics by the statement loops,
/// which then resynchronize instead of aborting the parse.
#[derive(Debug, PartialEq, Eq)]
enum Error {
  ExpectedExpression,
  ExpectedLeftParen,
  ExpectedRightParen,
  ExpectedRightSquare,
  ExpectedColon,
  ExpectedThen,
  ExpectedEndIf,
  ExpectedWEnd,
  ExpectedEndFunc,
  ExpectedVariable,
  ExpectedFunctionName,
  ExpectedNewLine,
  ExpectedIncludeTarget,
  DuplicateSpecifier,
  ConstWithoutValue,
  NestedFunction,
}

impl Error {
  fn message(&self, received: &str) -> String {
    let expectation = match self {
      Self::ExpectedExpression => "expected an expression",
      Self::ExpectedLeftParen => "expected '('",
      Self::ExpectedRightParen => "expected ')'",
      Self::ExpectedRightSquare => "expected ']'",
      Self::ExpectedColon => "expected ':'",
      Self::ExpectedThen => "expected 'Then'",
      Self::ExpectedEndIf => "expected 'EndIf'",
      Self::ExpectedWEnd => "expected 'WEnd'",
      Self::ExpectedEndFunc => "expected 'EndFunc'",
      Self::ExpectedVariable => "expected a variable",
      Self::ExpectedFunctionName => "expected a function name",
      Self::ExpectedNewLine => "expected a new line",
      Self::ExpectedIncludeTarget => "expected an include target",
      Self::DuplicateSpecifier => {
        return format!("declaration specifier '{received}' appears more than once");
      }
      Self::ConstWithoutValue => {
        return "a Const declaration must have an initial value".to_owned();
      }
      Self::NestedFunction => {
        return "functions can only be defined at the top level".to_owned();
      }
    };

    if received.is_empty() {
      format!("{expectation} but reached the end of the file")
    } else {
      format!("{expectation} but received '{received}'")
    }
  }
}

/// One entry of the include stack: a file, its token stream, and where it
/// was included from.
struct ParsingContext {
  file: Rc<SourceFile>,
  stream: TokenStream,
  included_from: Option<Location>,
}

/// Minimum binding power accepted by the expression climb; prefix operators
/// bind their operand one step tighter than any infix operator.
const PREFIX_POWER: u8 = 7;

/// Builds or extends a `Document` from one or more token streams, one per
/// file in the currently-open include chain.
pub struct Parser<'a> {
  sources: &'a mut SourceManager,
  diagnostics: &'a mut DiagnosticEngine,
  contexts: Vec<ParsingContext>,
  /// Absolute paths of every file already entered, for `#include-once`
  included: FxHashSet<PathBuf>,
}

impl<'a> Parser<'a> {
  pub fn new(sources: &'a mut SourceManager, diagnostics: &'a mut DiagnosticEngine) -> Self {
    Self {
      sources,
      diagnostics,
      contexts: Vec::new(),
      included: FxHashSet::default(),
    }
  }

  /// Parses a file from disk into the caller's document. Failing to open the
  /// initial file is the only hard error; everything afterwards degrades
  /// into diagnostics.
  pub fn parse_file(&mut self, document: &mut Document, path: &Path) -> io::Result<()> {
    let file = self.sources.load_file(path)?;
    self.included.insert(file.path.clone());
    self.push_context(file, None);
    self.parse_contexts(document);
    Ok(())
  }

  /// Parses in-memory source text (a REPL line, a test snippet) into the
  /// caller's document.
  pub fn parse_string(&mut self, document: &mut Document, name: &str, source: &str) {
    let file = self.sources.load_virtual(name, source);
    self.push_context(file, None);
    self.parse_contexts(document);
  }

  fn push_context(&mut self, file: Rc<SourceFile>, included_from: Option<Location>) {
    let stream = Lexer::new(&file).process(self.diagnostics);
    self.contexts.push(ParsingContext {
      file,
      stream,
      included_from,
    });
  }

  // Token plumbing, always against the innermost context

  fn context(&self) -> &ParsingContext {
    self.contexts.last().expect("no parsing context")
  }

  fn current(&self) -> Token {
    self.context().stream.current()
  }

  fn lookahead(&self, offset: usize) -> Token {
    self.context().stream.lookahead(offset)
  }

  fn bump(&mut self) -> Token {
    self.contexts.last_mut().expect("no parsing context").stream.bump()
  }

  fn token_text(&self, token: Token) -> &str {
    token.get_value(&self.context().file.contents)
  }

  fn location(&self) -> Location {
    let context = self.context();
    let token = context.stream.current();
    if token.kind == TokenKind::EndOfFile && token.line == 0 {
      // synthetic end-of-file token, point just past the last real one
      return match context.stream.tokens().last() {
        Some(last) => context.file.location(last.line, last.column + last.len()),
        None => context.file.location(1, 1),
      };
    }
    context.file.location(token.line, token.column)
  }

  fn matches(&mut self, kind: TokenKind) -> bool {
    if self.current().kind == kind {
      self.bump();
      true
    } else {
      false
    }
  }

  fn consume(&mut self, kind: TokenKind, error: Error) -> Result<Token, Error> {
    if self.current().kind == kind {
      Ok(self.bump())
    } else {
      Err(error)
    }
  }

  /// Newlines, comments, comment-block markers and garbage the lexer has
  /// already diagnosed are all trivia between statements
  fn skip_trivia(&mut self) {
    loop {
      match self.current().kind {
        TokenKind::NewLine
        | TokenKind::Comment
        | TokenKind::CommentsStart
        | TokenKind::CommentsEnd
        | TokenKind::Garbage => {
          self.bump();
        }
        _ => break,
      }
    }
  }

  fn skip_newlines(&mut self) {
    while matches!(self.current().kind, TokenKind::NewLine | TokenKind::Comment) {
      self.bump();
    }
  }

  /// A statement ends at a newline, the end of the file, or a block
  /// terminator (which allows `If $a Then Run() EndIf` on one line)
  fn expect_end_of_statement(&mut self) -> Result<(), Error> {
    while self.current().kind == TokenKind::Comment {
      self.bump();
    }
    let kind = self.current().kind;
    if kind == TokenKind::NewLine {
      self.bump();
      Ok(())
    } else if kind == TokenKind::EndOfFile || kind.is_block_end() {
      Ok(())
    } else {
      Err(Error::ExpectedNewLine)
    }
  }

  /// Discards the rest of the current line without diagnostics
  fn finish_line(&mut self) {
    loop {
      match self.current().kind {
        TokenKind::NewLine => {
          self.bump();
          break;
        }
        TokenKind::EndOfFile => break,
        _ => {
          self.bump();
        }
      }
    }
  }

  fn report(&mut self, error: Error) {
    let token = self.current();
    let received = if token.kind == TokenKind::EndOfFile {
      String::new()
    } else {
      self.token_text(token).to_owned()
    };
    let diagnostic = Diagnostic::error(self.location(), error.message(&received));
    self.diagnostics.report(diagnostic);
  }

  /// Drops at least one token, then everything up to and including the next
  /// newline, so the statement loop can retry on a fresh line
  fn synchronize(&mut self) {
    loop {
      let token = self.bump();
      if token.kind == TokenKind::NewLine || token.kind == TokenKind::EndOfFile {
        break;
      }
    }
  }

  // The document-level loop

  fn parse_contexts(&mut self, document: &mut Document) {
    while !self.contexts.is_empty() {
      self.skip_trivia();
      let token = self.current();
      match token.kind {
        TokenKind::EndOfFile => {
          self.contexts.pop();
        }
        TokenKind::Include | TokenKind::IncludeOnce => self.include(token.kind),
        kind if kind.is_directive() => self.finish_line(),
        TokenKind::Func => self.function_definition(document),
        _ => match self.statement() {
          Ok(statement) => document.add_statement(statement),
          Err(error) => {
            self.report(error);
            self.synchronize();
          }
        },
      }
    }
  }

  fn include_target(&mut self) -> Option<(String, IncludeKind)> {
    match self.current().kind {
      TokenKind::StringLiteral => {
        let token = self.bump();
        let text = token.get_value(&self.context().file.contents);
        Some((text[1..text.len() - 1].to_owned(), IncludeKind::Quoted))
      }
      TokenKind::Less => {
        self.bump();
        let start = self.current().start;
        let mut end = start;
        loop {
          let token = self.current();
          match token.kind {
            TokenKind::Greater => {
              self.bump();
              break;
            }
            TokenKind::NewLine | TokenKind::EndOfFile => {
              self.report(Error::ExpectedIncludeTarget);
              return None;
            }
            _ => {
              end = token.end;
              self.bump();
            }
          }
        }
        let contents = &self.context().file.contents;
        Some((
          contents[start as usize..end as usize].to_owned(),
          IncludeKind::Angled,
        ))
      }
      _ => {
        self.report(Error::ExpectedIncludeTarget);
        None
      }
    }
  }

  fn include(&mut self, directive: TokenKind) {
    let directive_location = self.location();
    self.bump();

    let Some((target, kind)) = self.include_target() else {
      self.synchronize();
      return;
    };
    self.finish_line();

    let from = Rc::clone(&self.context().file);
    let file = match self.sources.resolve_include(&target, kind, &from) {
      Ok(file) => file,
      Err(error) => {
        self.diagnostics.report(Diagnostic::fatal(
          directive_location,
          format!("could not open include '{target}': {error}"),
        ));
        return;
      }
    };

    if directive == TokenKind::IncludeOnce && self.included.contains(&file.path) {
      return;
    }

    if self.contexts.iter().any(|context| context.file.path == file.path) {
      let mut diagnostic = Diagnostic::fatal(
        directive_location,
        format!("include cycle detected while including '{target}'"),
      );
      if let Some(included_from) = &self.context().included_from {
        diagnostic = diagnostic.with_note(included_from.clone(), "current file included from here");
      }
      self.diagnostics.report(diagnostic);
      return;
    }

    self.included.insert(file.path.clone());
    self.push_context(file, Some(directive_location));
  }

  fn function_definition(&mut self, document: &mut Document) {
    match self.parse_function() {
      Ok(function) => {
        let name = function.name.clone();
        let location = function.location.clone();
        if !document.define_function(function) {
          self.diagnostics.report(Diagnostic::error(
            location,
            format!("function '{name}' is already defined"),
          ));
        }
      }
      Err(error) => {
        self.report(error);
        self.synchronize();
      }
    }
  }

  fn parse_function(&mut self) -> Result<FunctionDefinition, Error> {
    let location = self.location();
    self.bump(); // Func

    let token = self.current();
    if token.kind != TokenKind::Identifier {
      return Err(Error::ExpectedFunctionName);
    }
    let name: SmartString = self.token_text(token).into();
    self.bump();

    self.consume(TokenKind::LeftParen, Error::ExpectedLeftParen)?;
    let mut parameters = Vec::new();
    loop {
      self.skip_newlines();
      if self.matches(TokenKind::RightParen) {
        break;
      }

      let parameter_location = self.location();
      let mut constant = false;
      let mut by_ref = false;
      loop {
        if self.current().kind == TokenKind::Const && !constant {
          constant = true;
          self.bump();
        } else if self.current().kind == TokenKind::ByRef && !by_ref {
          by_ref = true;
          self.bump();
        } else {
          break;
        }
      }

      let token = self.current();
      if token.kind != TokenKind::Variable {
        return Err(Error::ExpectedVariable);
      }
      let name: SmartString = self.token_text(token)[1..].into();
      self.bump();

      let default = if self.matches(TokenKind::Equal) {
        Some(self.expression()?)
      } else {
        None
      };

      parameters.push(Parameter {
        name,
        constant,
        by_ref,
        default,
        location: parameter_location,
      });

      if !self.matches(TokenKind::Comma) {
        self.skip_newlines();
        self.consume(TokenKind::RightParen, Error::ExpectedRightParen)?;
        break;
      }
    }
    self.expect_end_of_statement()?;

    let body = self.block(&[TokenKind::EndFunc], Error::ExpectedEndFunc)?;
    self.consume(TokenKind::EndFunc, Error::ExpectedEndFunc)?;
    self.expect_end_of_statement()?;

    Ok(FunctionDefinition {
      name,
      parameters,
      body,
      location,
    })
  }

  // Statements

  fn statement(&mut self) -> Result<Statement, Error> {
    match self.current().kind {
      TokenKind::If => self.if_statement(),
      TokenKind::While => self.while_statement(),
      TokenKind::Exit => self.exit_statement(),
      TokenKind::Const
      | TokenKind::Local
      | TokenKind::Global
      | TokenKind::Static
      | TokenKind::Dim => self.assignment(),
      TokenKind::Variable if self.lookahead(1).kind.is_assignment_operator() => self.assignment(),
      TokenKind::Func => Err(Error::NestedFunction),
      _ => self.expression_statement(),
    }
  }

  /// Statements until one of `terminators`; failed statements are reported
  /// and skipped so the terminator can still be found
  fn block(
    &mut self,
    terminators: &[TokenKind],
    missing: Error,
  ) -> Result<Vec<Statement>, Error> {
    let mut statements = Vec::new();
    loop {
      self.skip_trivia();
      let kind = self.current().kind;
      if terminators.contains(&kind) {
        return Ok(statements);
      }
      if kind == TokenKind::EndOfFile {
        return Err(missing);
      }

      match self.statement() {
        Ok(statement) => statements.push(statement),
        Err(error) => {
          self.report(error);
          self.synchronize();
        }
      }
    }
  }

  fn if_statement(&mut self) -> Result<Statement, Error> {
    const CASE_ENDS: [TokenKind; 3] = [TokenKind::ElseIf, TokenKind::Else, TokenKind::EndIf];

    let location = self.location();
    self.bump(); // If

    let condition = self.expression()?;
    self.consume(TokenKind::Then, Error::ExpectedThen)?;
    let body = self.block(&CASE_ENDS, Error::ExpectedEndIf)?;
    let mut cases = vec![IfCase { condition, body }];

    while self.matches(TokenKind::ElseIf) {
      let condition = self.expression()?;
      self.consume(TokenKind::Then, Error::ExpectedThen)?;
      let body = self.block(&CASE_ENDS, Error::ExpectedEndIf)?;
      cases.push(IfCase { condition, body });
    }

    let otherwise = if self.matches(TokenKind::Else) {
      Some(self.block(&[TokenKind::EndIf], Error::ExpectedEndIf)?)
    } else {
      None
    };

    self.consume(TokenKind::EndIf, Error::ExpectedEndIf)?;
    self.expect_end_of_statement()?;

    Ok(statement!(If { cases, otherwise }, location))
  }

  fn while_statement(&mut self) -> Result<Statement, Error> {
    let location = self.location();
    self.bump(); // While

    let condition = self.expression()?;
    self.expect_end_of_statement()?;

    let body = self.block(&[TokenKind::WEnd], Error::ExpectedWEnd)?;
    self.consume(TokenKind::WEnd, Error::ExpectedWEnd)?;
    self.expect_end_of_statement()?;

    Ok(statement!(While { condition, body }, location))
  }

  fn exit_statement(&mut self) -> Result<Statement, Error> {
    let location = self.location();
    self.bump(); // Exit

    let kind = self.current().kind;
    let code = if kind == TokenKind::NewLine
      || kind == TokenKind::EndOfFile
      || kind == TokenKind::Comment
      || kind.is_block_end()
    {
      None
    } else {
      Some(self.expression()?)
    };
    self.expect_end_of_statement()?;

    Ok(statement!(Exit { code }, location))
  }

  fn assignment(&mut self) -> Result<Statement, Error> {
    let location = self.location();

    let mut scope = VariableScope::Auto;
    let mut scope_seen = false;
    let mut constant = false;
    let mut static_storage = false;

    loop {
      match self.current().kind {
        TokenKind::Const => {
          if constant {
            return Err(Error::DuplicateSpecifier);
          }
          constant = true;
          self.bump();
        }
        TokenKind::Local => {
          if scope_seen {
            return Err(Error::DuplicateSpecifier);
          }
          scope_seen = true;
          scope = VariableScope::Local;
          self.bump();
        }
        TokenKind::Global => {
          if scope_seen {
            return Err(Error::DuplicateSpecifier);
          }
          scope_seen = true;
          scope = VariableScope::Global;
          self.bump();
        }
        TokenKind::Dim => {
          if scope_seen {
            return Err(Error::DuplicateSpecifier);
          }
          scope_seen = true;
          self.bump();
        }
        TokenKind::Static => {
          if static_storage {
            return Err(Error::DuplicateSpecifier);
          }
          static_storage = true;
          self.bump();
        }
        TokenKind::Variable => break,
        _ => return Err(Error::ExpectedVariable),
      }
    }

    let token = self.current();
    let name: SmartString = self.token_text(token)[1..].into();
    self.bump();

    let (operator, value) = match operators::Assignment::from_token(self.current().kind) {
      Some(operator) => {
        self.bump();
        (operator, Some(self.expression()?))
      }
      None => (operators::Assignment::Assign, None),
    };

    if constant && value.is_none() {
      return Err(Error::ConstWithoutValue);
    }
    self.expect_end_of_statement()?;

    Ok(statement!(
      Assignment {
        name,
        scope,
        constant,
        static_storage,
        operator,
        value
      },
      location
    ))
  }

  fn expression_statement(&mut self) -> Result<Statement, Error> {
    let location = self.location();
    let expression = self.expression()?;
    self.expect_end_of_statement()?;

    Ok(statement!(Expression { expression }, location))
  }

  // Expressions

  /// Binding power of an infix operator, and whether it is right-associative.
  /// Higher binds tighter.
  fn binding_power(kind: TokenKind) -> Option<(u8, bool)> {
    match kind {
      TokenKind::Or | TokenKind::And => Some((1, false)),
      TokenKind::Less
      | TokenKind::LessEqual
      | TokenKind::Greater
      | TokenKind::GreaterEqual
      | TokenKind::Equal
      | TokenKind::NotEqual
      | TokenKind::EqualEqual => Some((2, false)),
      TokenKind::Ampersand => Some((3, false)),
      TokenKind::Plus | TokenKind::Minus => Some((4, false)),
      TokenKind::Star | TokenKind::Slash => Some((5, false)),
      TokenKind::Caret => Some((6, true)),
      _ => None,
    }
  }

  fn expression(&mut self) -> Result<Expression, Error> {
    let condition = self.parse_expression(0)?;

    if self.matches(TokenKind::Question) {
      let location = condition.location.clone();
      let truthy = self.expression()?;
      self.consume(TokenKind::Colon, Error::ExpectedColon)?;
      let falsy = self.expression()?;
      return Ok(expression!(
        Ternary {
          condition: Box::new(condition),
          truthy: Box::new(truthy),
          falsy: Box::new(falsy)
        },
        location
      ));
    }

    Ok(condition)
  }

  /// The precedence climb: a primary, then every following operator binding
  /// at least as tightly as `min_power`
  fn parse_expression(&mut self, min_power: u8) -> Result<Expression, Error> {
    let mut left = self.primary()?;

    loop {
      let kind = self.current().kind;
      let Some((power, right_associative)) = Self::binding_power(kind) else {
        break;
      };
      if power < min_power {
        break;
      }
      self.bump();

      let next_min = if right_associative { power } else { power + 1 };
      let right = self.parse_expression(next_min)?;

      let location = left.location.clone();
      left = expression!(
        Binary {
          operator: operators::Binary::from(kind),
          left: Box::new(left),
          right: Box::new(right)
        },
        location
      );
    }

    Ok(left)
  }

  fn integer_value(&mut self, token: Token) -> i64 {
    let text = self.token_text(token);
    let parsed = if let Some(digits) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X"))
    {
      i64::from_str_radix(digits, 16)
    } else {
      text.parse()
    };

    match parsed {
      Ok(value) => value,
      Err(_) => {
        let diagnostic =
          Diagnostic::warning(self.location(), format!("integer literal '{text}' out of range"));
        self.diagnostics.report(diagnostic);
        i64::MAX
      }
    }
  }

  fn primary(&mut self) -> Result<Expression, Error> {
    let token = self.current();
    let location = self.location();

    match token.kind {
      TokenKind::IntegerLiteral => {
        let value = self.integer_value(token);
        self.bump();
        Ok(expression!(Integer { value }, location))
      }
      TokenKind::FloatLiteral => {
        let value = self.token_text(token).parse().unwrap_or_default();
        self.bump();
        Ok(expression!(Float { value }, location))
      }
      TokenKind::StringLiteral => {
        let text = self.token_text(token);
        let value = text[1..text.len() - 1].to_owned();
        self.bump();
        Ok(expression!(String { value }, location))
      }
      TokenKind::True => {
        self.bump();
        Ok(expression!(Boolean { value: true }, location))
      }
      TokenKind::False => {
        self.bump();
        Ok(expression!(Boolean { value: false }, location))
      }
      TokenKind::Default => {
        self.bump();
        Ok(expression!(
          Keyword {
            keyword: Keyword::Default
          },
          location
        ))
      }
      TokenKind::Null => {
        self.bump();
        Ok(expression!(
          Keyword {
            keyword: Keyword::Null
          },
          location
        ))
      }
      TokenKind::Variable => {
        let name: SmartString = self.token_text(token)[1..].into();
        self.bump();
        let mut result = expression!(Variable { name }, location.clone());
        while self.matches(TokenKind::LeftSquare) {
          let index = self.expression()?;
          self.consume(TokenKind::RightSquare, Error::ExpectedRightSquare)?;
          result = expression!(
            Subscript {
              expression: Box::new(result),
              index: Box::new(index)
            },
            location.clone()
          );
        }
        Ok(result)
      }
      TokenKind::Identifier => {
        let name: SmartString = self.token_text(token).into();
        self.bump();
        if self.current().kind == TokenKind::LeftParen {
          self.call(Callee::User(name), location)
        } else {
          Ok(expression!(FunctionReference { name }, location))
        }
      }
      kind if kind.is_builtin_function() => {
        let name: SmartString = self.token_text(token).into();
        self.bump();
        if self.current().kind == TokenKind::LeftParen {
          self.call(Callee::Builtin(kind), location)
        } else {
          Ok(expression!(FunctionReference { name }, location))
        }
      }
      kind if kind.is_macro() => {
        self.bump();
        Ok(expression!(Macro { kind }, location))
      }
      TokenKind::LeftParen => {
        self.bump();
        let grouped = self.expression()?;
        self.consume(TokenKind::RightParen, Error::ExpectedRightParen)?;
        Ok(grouped)
      }
      TokenKind::Not => {
        self.bump();
        let operand = self.parse_expression(PREFIX_POWER + 1)?;
        Ok(expression!(
          Unary {
            operator: operators::Unary::Not,
            expression: Box::new(operand)
          },
          location
        ))
      }
      TokenKind::Minus | TokenKind::Plus => {
        self.bump();
        let operand = self.parse_expression(PREFIX_POWER + 1)?;
        Ok(expression!(
          Unary {
            operator: operators::Unary::from(token.kind),
            expression: Box::new(operand)
          },
          location
        ))
      }
      _ => Err(Error::ExpectedExpression),
    }
  }

  /// Comma-separated arguments terminated by `)`, zero arguments tolerated
  fn call(&mut self, callee: Callee, location: Location) -> Result<Expression, Error> {
    self.bump(); // (

    let mut arguments = Vec::new();
    loop {
      self.skip_newlines();
      if self.matches(TokenKind::RightParen) {
        break;
      }

      arguments.push(self.expression()?);

      if !self.matches(TokenKind::Comma) {
        self.skip_newlines();
        self.consume(TokenKind::RightParen, Error::ExpectedRightParen)?;
        break;
      }
    }

    Ok(expression!(Call { callee, arguments }, location))
  }
}
