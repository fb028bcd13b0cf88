use crate::source::Location;
use smallvec::SmallVec;
use std::{cell::RefCell, fmt, rc::Rc};

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
  Ignored,
  Note,
  Warning,
  Error,
  FatalError,
}
impl fmt::Display for Level {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Ignored => write!(f, "ignored"),
      Self::Note => write!(f, "note"),
      Self::Warning => write!(f, "warning"),
      Self::Error => write!(f, "error"),
      Self::FatalError => write!(f, "fatal error"),
    }
  }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Note {
  pub location: Location,
  pub message: String,
}

/// A structured, located, severity-tagged message.
///
/// Notes are owned by their parent diagnostic and rendered indented below it.
#[derive(Clone, Debug, PartialEq)]
pub struct Diagnostic {
  pub level: Level,
  pub location: Location,
  pub message: String,
  /// Name of the policy flag that produced this diagnostic, if any
  pub flag: Option<&'static str>,
  pub notes: SmallVec<[Note; 1]>,
}

impl Diagnostic {
  pub fn new(level: Level, location: Location, message: impl Into<String>) -> Self {
    Self {
      level,
      location,
      message: message.into(),
      flag: None,
      notes: SmallVec::new(),
    }
  }

  pub fn note(location: Location, message: impl Into<String>) -> Self {
    Self::new(Level::Note, location, message)
  }

  pub fn warning(location: Location, message: impl Into<String>) -> Self {
    Self::new(Level::Warning, location, message)
  }

  pub fn error(location: Location, message: impl Into<String>) -> Self {
    Self::new(Level::Error, location, message)
  }

  pub fn fatal(location: Location, message: impl Into<String>) -> Self {
    Self::new(Level::FatalError, location, message)
  }

  pub fn with_flag(mut self, flag: &'static str) -> Self {
    self.flag = Some(flag);
    self
  }

  pub fn with_note(mut self, location: Location, message: impl Into<String>) -> Self {
    self.notes.push(Note {
      location,
      message: message.into(),
    });
    self
  }
}

impl fmt::Display for Diagnostic {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}: {}: {}", self.location, self.level, self.message)?;
    if let Some(flag) = self.flag {
      write!(f, " [{flag}]")?;
    }
    for note in &self.notes {
      write!(f, "\n  {}: note: {}", note.location, note.message)?;
    }
    Ok(())
  }
}

/// Where reported diagnostics end up once the engine has applied its
/// policies. One consumer per engine; swap it for capture or silence.
pub trait DiagnosticConsumer {
  fn consume(&mut self, diagnostic: &Diagnostic);
}

/// Prints warnings and notes to stdout, errors to stderr
#[derive(Default)]
pub struct ConsoleConsumer;
impl DiagnosticConsumer for ConsoleConsumer {
  fn consume(&mut self, diagnostic: &Diagnostic) {
    match diagnostic.level {
      Level::Ignored => {}
      Level::Note | Level::Warning => println!("{diagnostic}"),
      Level::Error | Level::FatalError => eprintln!("{diagnostic}"),
    }
  }
}

/// Drops everything, for hosts which only care about the counters
#[derive(Default)]
pub struct SilentConsumer;
impl DiagnosticConsumer for SilentConsumer {
  fn consume(&mut self, _diagnostic: &Diagnostic) {}
}

/// Stores diagnostics into a shared buffer, for tests
pub struct CollectingConsumer {
  collected: Rc<RefCell<Vec<Diagnostic>>>,
}
impl CollectingConsumer {
  pub fn new() -> (Self, Rc<RefCell<Vec<Diagnostic>>>) {
    let collected = Rc::new(RefCell::new(Vec::new()));
    (
      Self {
        collected: Rc::clone(&collected),
      },
      collected,
    )
  }
}
impl DiagnosticConsumer for CollectingConsumer {
  fn consume(&mut self, diagnostic: &Diagnostic) {
    self.collected.borrow_mut().push(diagnostic.clone());
  }
}

/// The per-run accumulator for diagnostics.
///
/// Applies the warning policies in a fixed order (ignore-all-warnings
/// demotes, then warnings-as-errors promotes), keeps the running counters
/// and the sticky error flag, and forwards to the consumer. Constructed once
/// per run and threaded explicitly - there is no global engine.
pub struct DiagnosticEngine {
  consumer: Option<Box<dyn DiagnosticConsumer>>,
  warning_count: usize,
  error_count: usize,
  ignore_all_warnings: bool,
  warnings_as_errors: bool,
  error_limit: Option<usize>,
  error_limit_reached: bool,
  error_occurred: bool,
}

impl Default for DiagnosticEngine {
  fn default() -> Self {
    Self {
      consumer: Some(Box::new(ConsoleConsumer)),
      warning_count: 0,
      error_count: 0,
      ignore_all_warnings: false,
      warnings_as_errors: false,
      error_limit: None,
      error_limit_reached: false,
      error_occurred: false,
    }
  }
}

impl DiagnosticEngine {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn silent() -> Self {
    Self::with_consumer(Box::new(SilentConsumer))
  }

  pub fn with_consumer(consumer: Box<dyn DiagnosticConsumer>) -> Self {
    Self {
      consumer: Some(consumer),
      ..Self::default()
    }
  }

  pub fn set_consumer(&mut self, consumer: Option<Box<dyn DiagnosticConsumer>>) {
    self.consumer = consumer;
  }

  pub fn set_ignore_all_warnings(&mut self, ignore: bool) {
    self.ignore_all_warnings = ignore;
  }

  pub fn set_warnings_as_errors(&mut self, promote: bool) {
    self.warnings_as_errors = promote;
  }

  pub fn set_error_limit(&mut self, limit: Option<usize>) {
    self.error_limit = limit;
  }

  pub fn report(&mut self, mut diagnostic: Diagnostic) {
    if diagnostic.level == Level::Warning {
      if self.ignore_all_warnings {
        diagnostic.level = Level::Ignored;
      } else if self.warnings_as_errors {
        diagnostic.level = Level::Error;
      }
    }

    match diagnostic.level {
      Level::Warning => self.warning_count += 1,
      Level::Error | Level::FatalError => {
        self.error_count += 1;
        self.error_occurred = true;
      }
      Level::Ignored | Level::Note => {}
    }

    if diagnostic.level == Level::Ignored {
      return;
    }
    if let Some(consumer) = &mut self.consumer {
      consumer.consume(&diagnostic);
    }

    if let Some(limit) = self.error_limit {
      if self.error_count >= limit && !self.error_limit_reached {
        self.error_limit_reached = true;
        let overflow =
          Diagnostic::fatal(diagnostic.location, format!("too many errors emitted ({limit})"))
            .with_flag("error-limit");
        self.error_count += 1;
        if let Some(consumer) = &mut self.consumer {
          consumer.consume(&overflow);
        }
      }
    }
  }

  /// Sticky once any error or fatal error has been reported
  pub fn has_error_occurred(&self) -> bool {
    self.error_occurred
  }

  /// True once the configured error limit has been hit
  pub fn error_limit_reached(&self) -> bool {
    self.error_limit_reached
  }

  pub fn warning_count(&self) -> usize {
    self.warning_count
  }

  pub fn error_count(&self) -> usize {
    self.error_count
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::rc::Rc;

  fn location() -> Location {
    Location {
      file: Rc::from("test.au3"),
      line: 2,
      column: 5,
    }
  }

  #[test]
  fn should_format_with_location_level_and_flag() {
    let diagnostic = Diagnostic::warning(location(), "something looks off")
      .with_flag("embedded-null")
      .with_note(location(), "first seen here");

    assert_eq!(
      diagnostic.to_string(),
      "test.au3:2:5: warning: something looks off [embedded-null]\n  test.au3:2:5: note: first seen here"
    );
  }

  #[test]
  fn should_count_warnings_and_errors() {
    let mut engine = DiagnosticEngine::silent();
    engine.report(Diagnostic::warning(location(), "w"));
    engine.report(Diagnostic::error(location(), "e"));
    engine.report(Diagnostic::note(location(), "n"));

    assert_eq!(engine.warning_count(), 1);
    assert_eq!(engine.error_count(), 1);
    assert!(engine.has_error_occurred());
  }

  #[test]
  fn ignore_all_warnings_wins_over_warnings_as_errors() {
    let mut engine = DiagnosticEngine::silent();
    engine.set_ignore_all_warnings(true);
    engine.set_warnings_as_errors(true);

    engine.report(Diagnostic::warning(location(), "w"));

    assert_eq!(engine.warning_count(), 0);
    assert_eq!(engine.error_count(), 0);
    assert!(!engine.has_error_occurred());
  }

  #[test]
  fn warnings_as_errors_promotes_and_sets_the_sticky_flag() {
    let (consumer, collected) = CollectingConsumer::new();
    let mut engine = DiagnosticEngine::with_consumer(Box::new(consumer));
    engine.set_warnings_as_errors(true);

    engine.report(Diagnostic::warning(location(), "w"));

    assert_eq!(engine.error_count(), 1);
    assert!(engine.has_error_occurred());
    assert_eq!(collected.borrow()[0].level, Level::Error);
  }

  #[test]
  fn error_limit_emits_a_single_fatal_overflow() {
    let (consumer, collected) = CollectingConsumer::new();
    let mut engine = DiagnosticEngine::with_consumer(Box::new(consumer));
    engine.set_error_limit(Some(2));

    engine.report(Diagnostic::error(location(), "one"));
    engine.report(Diagnostic::error(location(), "two"));
    engine.report(Diagnostic::error(location(), "three"));

    assert!(engine.error_limit_reached());
    let fatal_count = collected
      .borrow()
      .iter()
      .filter(|d| d.level == Level::FatalError)
      .count();
    assert_eq!(fatal_count, 1);
  }

  #[test]
  fn ignored_diagnostics_are_not_forwarded() {
    let (consumer, collected) = CollectingConsumer::new();
    let mut engine = DiagnosticEngine::with_consumer(Box::new(consumer));
    engine.set_ignore_all_warnings(true);

    engine.report(Diagnostic::warning(location(), "w"));

    assert!(collected.borrow().is_empty());
  }
}
