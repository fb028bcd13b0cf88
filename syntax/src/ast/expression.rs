use crate::source::Location;
use crate::tokens::TokenKind;
use smartstring::alias::String as SmartString;
use std::fmt;

#[derive(Clone, Debug)]
pub struct Expression {
  pub expr: Expr,
  pub location: Location,
}

macro_rules! expression {
    ($type:ident $struct:tt, $location:expr) => {
      Expression {
        expr: Expr::$type $struct,
        location: $location,
      }
    };
  }
pub(crate) use expression;

/// Every expression node kind. Children are owned exclusively through boxes;
/// the tree has no sharing and no cycles.
#[derive(Clone, Debug)]
pub enum Expr {
  Binary {
    operator: operators::Binary,
    left: Box<Expression>,
    right: Box<Expression>,
  },
  Unary {
    operator: operators::Unary,
    expression: Box<Expression>,
  },
  Ternary {
    condition: Box<Expression>,
    truthy: Box<Expression>,
    falsy: Box<Expression>,
  },
  Integer {
    value: i64,
  },
  Float {
    value: f64,
  },
  String {
    value: std::string::String,
  },
  Boolean {
    value: bool,
  },
  Keyword {
    keyword: Keyword,
  },
  Variable {
    name: SmartString,
  },
  Subscript {
    expression: Box<Expression>,
    index: Box<Expression>,
  },
  Call {
    callee: Callee,
    arguments: Vec<Expression>,
  },
  FunctionReference {
    name: SmartString,
  },
  Macro {
    kind: TokenKind,
  },
}

/// The `Default`/`Null` keyword values
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Keyword {
  Default,
  Null,
}
impl fmt::Display for Keyword {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Default => write!(f, "Default"),
      Self::Null => write!(f, "Null"),
    }
  }
}

/// What a call expression dispatches to: a built-in identified by its token
/// kind, or a user-defined function looked up by name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Callee {
  Builtin(TokenKind),
  User(SmartString),
}
impl fmt::Display for Callee {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Builtin(kind) => write!(f, "{kind:?}"),
      Self::User(name) => write!(f, "{name}"),
    }
  }
}

pub mod operators {
  use super::TokenKind;
  use std::fmt;

  #[derive(Copy, Clone, Debug, PartialEq, Eq)]
  pub enum Binary {
    Add,
    Subtract,
    Multiply,
    Divide,
    Raise,
    Concatenate,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Equal,
    NotEqual,
    StrictEqual,
    And,
    Or,
  }
  impl From<TokenKind> for Binary {
    fn from(kind: TokenKind) -> Self {
      match kind {
        TokenKind::Plus => Self::Add,
        TokenKind::Minus => Self::Subtract,
        TokenKind::Star => Self::Multiply,
        TokenKind::Slash => Self::Divide,
        TokenKind::Caret => Self::Raise,
        TokenKind::Ampersand => Self::Concatenate,
        TokenKind::Less => Self::Less,
        TokenKind::LessEqual => Self::LessEqual,
        TokenKind::Greater => Self::Greater,
        TokenKind::GreaterEqual => Self::GreaterEqual,
        TokenKind::Equal => Self::Equal,
        TokenKind::NotEqual => Self::NotEqual,
        TokenKind::EqualEqual => Self::StrictEqual,
        TokenKind::And => Self::And,
        TokenKind::Or => Self::Or,
        _ => unreachable!("not a binary operator token"),
      }
    }
  }
  impl fmt::Display for Binary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      match self {
        Self::Add => write!(f, "+"),
        Self::Subtract => write!(f, "-"),
        Self::Multiply => write!(f, "*"),
        Self::Divide => write!(f, "/"),
        Self::Raise => write!(f, "^"),
        Self::Concatenate => write!(f, "&"),
        Self::Less => write!(f, "<"),
        Self::LessEqual => write!(f, "<="),
        Self::Greater => write!(f, ">"),
        Self::GreaterEqual => write!(f, ">="),
        Self::Equal => write!(f, "="),
        Self::NotEqual => write!(f, "<>"),
        Self::StrictEqual => write!(f, "=="),
        Self::And => write!(f, "And"),
        Self::Or => write!(f, "Or"),
      }
    }
  }

  #[derive(Copy, Clone, Debug, PartialEq, Eq)]
  pub enum Unary {
    Not,
    Negate,
    Plus,
  }
  impl From<TokenKind> for Unary {
    fn from(kind: TokenKind) -> Self {
      match kind {
        TokenKind::Not => Self::Not,
        TokenKind::Minus => Self::Negate,
        TokenKind::Plus => Self::Plus,
        _ => unreachable!("not a unary operator token"),
      }
    }
  }
  impl fmt::Display for Unary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      match self {
        Self::Not => write!(f, "Not"),
        Self::Negate => write!(f, "-"),
        Self::Plus => write!(f, "+"),
      }
    }
  }

  /// Operators legal on the right of a variable in an assignment statement
  #[derive(Copy, Clone, Debug, PartialEq, Eq)]
  pub enum Assignment {
    Assign,
    Add,
    Subtract,
    Multiply,
    Divide,
    Concatenate,
  }
  impl Assignment {
    pub fn from_token(kind: TokenKind) -> Option<Self> {
      match kind {
        TokenKind::Equal => Some(Self::Assign),
        TokenKind::PlusEqual => Some(Self::Add),
        TokenKind::MinusEqual => Some(Self::Subtract),
        TokenKind::StarEqual => Some(Self::Multiply),
        TokenKind::SlashEqual => Some(Self::Divide),
        TokenKind::AmpersandEqual => Some(Self::Concatenate),
        _ => None,
      }
    }
  }
  impl fmt::Display for Assignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      match self {
        Self::Assign => write!(f, "="),
        Self::Add => write!(f, "+="),
        Self::Subtract => write!(f, "-="),
        Self::Multiply => write!(f, "*="),
        Self::Divide => write!(f, "/="),
        Self::Concatenate => write!(f, "&="),
      }
    }
  }
}
