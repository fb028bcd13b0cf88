pub mod expression;
pub mod statement;

pub use expression::{Callee, Expr, Expression, Keyword};
pub use statement::{FunctionDefinition, IfCase, Parameter, Statement, Stmt, VariableScope};

use rustc_hash::FxHashMap;
use smartstring::alias::String as SmartString;

/// The root of a parsed program: top-level statements in program order plus
/// the function definitions, which live outside the statement list and are
/// looked up by name, case-insensitively.
#[derive(Debug, Default)]
pub struct Document {
  pub statements: Vec<Statement>,
  functions: FxHashMap<SmartString, FunctionDefinition>,
}

impl Document {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn add_statement(&mut self, statement: Statement) {
    self.statements.push(statement);
  }

  /// Registers a function definition. Returns false without replacing
  /// anything when a function of the same name (ignoring case) exists.
  pub fn define_function(&mut self, function: FunctionDefinition) -> bool {
    let key: SmartString = function.name.to_ascii_lowercase().into();
    if self.functions.contains_key(&key) {
      return false;
    }
    self.functions.insert(key, function);
    true
  }

  pub fn lookup_function(&self, name: &str) -> Option<&FunctionDefinition> {
    let key: SmartString = name.to_ascii_lowercase().into();
    self.functions.get(&key)
  }

  pub fn functions(&self) -> impl Iterator<Item = &FunctionDefinition> {
    self.functions.values()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::source::Location;
  use std::rc::Rc;

  fn definition(name: &str) -> FunctionDefinition {
    FunctionDefinition {
      name: name.into(),
      parameters: Vec::new(),
      body: Vec::new(),
      location: Location {
        file: Rc::from("test.au3"),
        line: 1,
        column: 1,
      },
    }
  }

  #[test]
  fn function_lookup_ignores_case() {
    let mut document = Document::new();
    assert!(document.define_function(definition("DoThing")));

    assert!(document.lookup_function("dothing").is_some());
    assert!(document.lookup_function("DOTHING").is_some());
    assert!(document.lookup_function("other").is_none());
  }

  #[test]
  fn duplicate_definitions_keep_the_first() {
    let mut document = Document::new();
    assert!(document.define_function(definition("f")));
    assert!(!document.define_function(definition("F")));
    assert_eq!(document.functions().count(), 1);
    assert_eq!(document.lookup_function("f").unwrap().name, "f");
  }
}
