use super::expression::{operators, Expression};
use crate::source::Location;
use smartstring::alias::String as SmartString;
use std::fmt;

#[derive(Clone, Debug)]
pub struct Statement {
  pub stmt: Stmt,
  pub location: Location,
}

macro_rules! statement {
    ($type:ident $struct:tt, $location:expr) => {
      Statement {
        stmt: Stmt::$type $struct,
        location: $location,
      }
    };
  }
pub(crate) use statement;

#[derive(Clone, Debug)]
pub enum Stmt {
  Expression {
    expression: Expression,
  },
  /// An `If`/`ElseIf`/`Else` chain. The first case is the `If` itself; the
  /// first case whose condition holds short-circuits the rest.
  If {
    cases: Vec<IfCase>,
    otherwise: Option<Vec<Statement>>,
  },
  While {
    condition: Expression,
    body: Vec<Statement>,
  },
  Exit {
    code: Option<Expression>,
  },
  Assignment {
    name: SmartString,
    scope: VariableScope,
    constant: bool,
    static_storage: bool,
    operator: operators::Assignment,
    /// Absent for a bare declaration, which binds the default value
    value: Option<Expression>,
  },
}

#[derive(Clone, Debug)]
pub struct IfCase {
  pub condition: Expression,
  pub body: Vec<Statement>,
}

/// Which scope an assignment binds into. `Auto` updates the nearest existing
/// binding, or creates one in the current scope.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum VariableScope {
  Auto,
  Local,
  Global,
}
impl fmt::Display for VariableScope {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Auto => write!(f, "Dim"),
      Self::Local => write!(f, "Local"),
      Self::Global => write!(f, "Global"),
    }
  }
}

/// A user-defined function. Owned by the `Document`, not a statement.
#[derive(Clone, Debug)]
pub struct FunctionDefinition {
  pub name: SmartString,
  pub parameters: Vec<Parameter>,
  pub body: Vec<Statement>,
  pub location: Location,
}

#[derive(Clone, Debug)]
pub struct Parameter {
  pub name: SmartString,
  pub constant: bool,
  pub by_ref: bool,
  pub default: Option<Expression>,
  pub location: Location,
}
