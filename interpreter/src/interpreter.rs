use crate::{
  builtins,
  variant::{Numeric, Variant},
  vm::{BindError, VirtualMachine},
};
use aut_syntax::{
  ast::{
    expression::{operators, Callee, Expr, Expression},
    statement::{Statement, Stmt, VariableScope},
    Document,
  },
  diagnostics::{Diagnostic, DiagnosticEngine},
  source::Location,
  tokens::TokenKind,
};
use smartstring::alias::String as SmartString;
use std::{cmp::Ordering, rc::Rc};

/// Recursion guard for user function calls; hit it and the call yields the
/// default value with a diagnostic instead of blowing the host stack
const MAX_CALL_DEPTH: usize = 128;

/// Whether execution continues after a statement
enum Flow {
  Normal,
  Halt,
}

/// Walks a `Document`, driving the `VirtualMachine`.
///
/// One interpreter can run several documents in sequence against the same
/// machine state: set a document, run, set the next.
#[derive(Default)]
pub struct Interpreter {
  vm: VirtualMachine,
  document: Option<Rc<Document>>,
  current_function: Option<SmartString>,
  call_depth: usize,
}

impl Interpreter {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_vm(vm: VirtualMachine) -> Self {
    Self {
      vm,
      ..Self::default()
    }
  }

  pub fn vm(&self) -> &VirtualMachine {
    &self.vm
  }

  pub fn vm_mut(&mut self) -> &mut VirtualMachine {
    &mut self.vm
  }

  pub fn set_document(&mut self, document: Rc<Document>) {
    self.document = Some(document);
  }

  /// Runs the current document's top-level statements. Without a document
  /// this is a no-op.
  pub fn run(&mut self, diagnostics: &mut DiagnosticEngine) {
    let Some(document) = self.document.clone() else {
      return;
    };
    self.run_block(&document, &document.statements, diagnostics);
  }

  fn run_block(
    &mut self,
    document: &Document,
    statements: &[Statement],
    diagnostics: &mut DiagnosticEngine,
  ) -> Flow {
    for statement in statements {
      if !self.vm.begin_statement() {
        return Flow::Halt;
      }
      if let Flow::Halt = self.interpret_statement(document, statement, diagnostics) {
        return Flow::Halt;
      }
    }
    Flow::Normal
  }

  fn interpret_statement(
    &mut self,
    document: &Document,
    statement: &Statement,
    diagnostics: &mut DiagnosticEngine,
  ) -> Flow {
    match &statement.stmt {
      Stmt::Expression { expression } => {
        self.interpret_expression(document, expression, diagnostics);
        Flow::Normal
      }
      Stmt::If { cases, otherwise } => {
        for case in cases {
          if self
            .interpret_expression(document, &case.condition, diagnostics)
            .cast_boolean()
          {
            return self.run_block(document, &case.body, diagnostics);
          }
        }
        if let Some(otherwise) = otherwise {
          return self.run_block(document, otherwise, diagnostics);
        }
        Flow::Normal
      }
      Stmt::While { condition, body } => loop {
        if !self.vm.begin_statement() {
          return Flow::Halt;
        }
        if !self
          .interpret_expression(document, condition, diagnostics)
          .cast_boolean()
        {
          return Flow::Normal;
        }
        if let Flow::Halt = self.run_block(document, body, diagnostics) {
          return Flow::Halt;
        }
      },
      Stmt::Exit { code } => {
        let code = code
          .as_ref()
          .map(|expression| {
            self
              .interpret_expression(document, expression, diagnostics)
              .cast_int()
          })
          .unwrap_or(0);
        self.vm.set_exit_code(code);
        self.vm.request_halt();
        Flow::Halt
      }
      Stmt::Assignment {
        name,
        scope,
        constant,
        static_storage,
        operator,
        value,
      } => self.interpret_assignment(
        document,
        &statement.location,
        name,
        *scope,
        *constant,
        *static_storage,
        *operator,
        value.as_ref(),
        diagnostics,
      ),
    }
  }

  #[allow(clippy::too_many_arguments)]
  fn interpret_assignment(
    &mut self,
    document: &Document,
    location: &Location,
    name: &SmartString,
    scope: VariableScope,
    constant: bool,
    static_storage: bool,
    operator: operators::Assignment,
    value: Option<&Expression>,
    diagnostics: &mut DiagnosticEngine,
  ) -> Flow {
    let global = scope == VariableScope::Global;

    if static_storage {
      let key: SmartString = format!(
        "{}::{}",
        self.current_function.as_deref().unwrap_or(""),
        name.to_ascii_lowercase()
      )
      .into();

      // the initializer only runs the first time through
      let initial = match self.vm.static_value(&key) {
        Some(existing) => existing.clone(),
        None => {
          let initial = match value {
            Some(expression) => self.interpret_expression(document, expression, diagnostics),
            None => Variant::default(),
          };
          self.vm.store_static(&key, initial.clone());
          initial
        }
      };
      let result = self.vm.declare(name, global, constant, Some(key), initial);
      self.report_bind_error(result, name, location, diagnostics);
      return Flow::Normal;
    }

    let mut new_value = match value {
      Some(expression) => self.interpret_expression(document, expression, diagnostics),
      None => Variant::default(),
    };

    if operator != operators::Assignment::Assign {
      let current = self.vm.lookup(name).cloned().unwrap_or_default();
      new_value = match operator {
        operators::Assignment::Add => current.add(&new_value),
        operators::Assignment::Subtract => current.subtract(&new_value),
        operators::Assignment::Multiply => current.multiply(&new_value),
        operators::Assignment::Divide => current.divide(&new_value),
        operators::Assignment::Concatenate => current.concatenate(&new_value),
        operators::Assignment::Assign => unreachable!(),
      };
    }

    let result = match scope {
      VariableScope::Auto if !constant => self.vm.assign(name, new_value),
      _ => self.vm.declare(name, global, constant, None, new_value),
    };
    self.report_bind_error(result, name, location, diagnostics);
    Flow::Normal
  }

  fn report_bind_error(
    &mut self,
    result: Result<(), BindError>,
    name: &str,
    location: &Location,
    diagnostics: &mut DiagnosticEngine,
  ) {
    if result.is_err() {
      diagnostics.report(Diagnostic::error(
        location.clone(),
        format!("cannot assign to Const variable '${name}'"),
      ));
    }
  }

  fn interpret_expression(
    &mut self,
    document: &Document,
    expression: &Expression,
    diagnostics: &mut DiagnosticEngine,
  ) -> Variant {
    match &expression.expr {
      Expr::Integer { value } => Variant::Int64(*value),
      Expr::Float { value } => Variant::Double(*value),
      Expr::String { value } => Variant::from(value.as_str()),
      Expr::Boolean { value } => Variant::Boolean(*value),
      Expr::Keyword { keyword } => Variant::Keyword(*keyword),
      Expr::Variable { name } => match self.vm.lookup(name) {
        Some(value) => value.clone(),
        None => {
          diagnostics.report(Diagnostic::warning(
            expression.location.clone(),
            format!("variable '${name}' used before it was declared"),
          ));
          Variant::default()
        }
      },
      Expr::Macro { kind } => {
        if *kind == TokenKind::MacroScriptLineNumber {
          return Variant::from(i64::from(expression.location.line));
        }
        builtins::macro_value(&self.vm, *kind)
      }
      Expr::Unary {
        operator,
        expression: operand,
      } => {
        let value = self.interpret_expression(document, operand, diagnostics);
        match operator {
          operators::Unary::Not => Variant::Boolean(!value.cast_boolean()),
          operators::Unary::Negate => value.negate(),
          operators::Unary::Plus => match value.to_numeric() {
            Numeric::Int(value) => Variant::Int64(value),
            Numeric::Float(value) => Variant::Double(value),
          },
        }
      }
      Expr::Binary {
        operator,
        left,
        right,
      } => self.interpret_binary(document, *operator, left, right, diagnostics),
      Expr::Ternary {
        condition,
        truthy,
        falsy,
      } => {
        if self
          .interpret_expression(document, condition, diagnostics)
          .cast_boolean()
        {
          self.interpret_expression(document, truthy, diagnostics)
        } else {
          self.interpret_expression(document, falsy, diagnostics)
        }
      }
      Expr::Subscript {
        expression: array,
        index,
      } => {
        let value = self.interpret_expression(document, array, diagnostics);
        let position = self
          .interpret_expression(document, index, diagnostics)
          .cast_int();
        match value {
          Variant::Array(items) => {
            match usize::try_from(position).ok().and_then(|index| items.get(index).cloned()) {
              Some(item) => item,
              None => {
                diagnostics.report(Diagnostic::warning(
                  expression.location.clone(),
                  format!("array index {position} is out of bounds"),
                ));
                Variant::default()
              }
            }
          }
          other => {
            diagnostics.report(Diagnostic::warning(
              expression.location.clone(),
              format!("cannot subscript a {} value", other.type_name()),
            ));
            Variant::default()
          }
        }
      }
      Expr::FunctionReference { name } => Variant::Function(name.clone()),
      Expr::Call { callee, arguments } => {
        // arguments evaluate left to right before dispatch
        let values: Vec<Variant> = arguments
          .iter()
          .map(|argument| self.interpret_expression(document, argument, diagnostics))
          .collect();

        match callee {
          Callee::Builtin(kind) => match builtins::call(&mut self.vm, *kind, &values) {
            Some(value) => value,
            None => {
              let name = format!("{kind:?}");
              diagnostics.report(Diagnostic::warning(
                expression.location.clone(),
                format!(
                  "built-in function '{}' is not implemented",
                  name.trim_start_matches("Builtin")
                ),
              ));
              Variant::default()
            }
          },
          Callee::User(name) => self.call_user_function(
            document,
            name,
            arguments,
            &values,
            &expression.location,
            diagnostics,
          ),
        }
      }
    }
  }

  fn interpret_binary(
    &mut self,
    document: &Document,
    operator: operators::Binary,
    left: &Expression,
    right: &Expression,
    diagnostics: &mut DiagnosticEngine,
  ) -> Variant {
    use operators::Binary;

    // And/Or only evaluate the right side when the left leaves it open
    match operator {
      Binary::And => {
        if !self
          .interpret_expression(document, left, diagnostics)
          .cast_boolean()
        {
          return Variant::Boolean(false);
        }
        let right = self.interpret_expression(document, right, diagnostics);
        return Variant::Boolean(right.cast_boolean());
      }
      Binary::Or => {
        if self
          .interpret_expression(document, left, diagnostics)
          .cast_boolean()
        {
          return Variant::Boolean(true);
        }
        let right = self.interpret_expression(document, right, diagnostics);
        return Variant::Boolean(right.cast_boolean());
      }
      _ => {}
    }

    let left = self.interpret_expression(document, left, diagnostics);
    let right = self.interpret_expression(document, right, diagnostics);

    match operator {
      Binary::Add => left.add(&right),
      Binary::Subtract => left.subtract(&right),
      Binary::Multiply => left.multiply(&right),
      Binary::Divide => left.divide(&right),
      Binary::Raise => left.raise(&right),
      Binary::Concatenate => left.concatenate(&right),
      Binary::Less => Variant::Boolean(left.compare(&right) == Ordering::Less),
      Binary::LessEqual => Variant::Boolean(left.compare(&right) != Ordering::Greater),
      Binary::Greater => Variant::Boolean(left.compare(&right) == Ordering::Greater),
      Binary::GreaterEqual => Variant::Boolean(left.compare(&right) != Ordering::Less),
      Binary::Equal => Variant::Boolean(left.equals(&right, false)),
      Binary::NotEqual => Variant::Boolean(!left.equals(&right, false)),
      Binary::StrictEqual => Variant::Boolean(left.equals(&right, true)),
      Binary::And | Binary::Or => unreachable!("handled above"),
    }
  }

  fn call_user_function(
    &mut self,
    document: &Document,
    name: &str,
    argument_expressions: &[Expression],
    arguments: &[Variant],
    location: &Location,
    diagnostics: &mut DiagnosticEngine,
  ) -> Variant {
    let Some(function) = document.lookup_function(name) else {
      diagnostics.report(Diagnostic::warning(
        location.clone(),
        format!("call to unknown function '{name}'"),
      ));
      return Variant::default();
    };

    if self.call_depth >= MAX_CALL_DEPTH {
      diagnostics.report(Diagnostic::error(
        location.clone(),
        format!("call depth limit reached while calling '{name}'"),
      ));
      return Variant::default();
    }

    if arguments.len() > function.parameters.len() {
      diagnostics.report(Diagnostic::warning(
        location.clone(),
        format!(
          "'{name}' expects at most {} arguments but received {}",
          function.parameters.len(),
          arguments.len()
        ),
      ));
    }

    // missing arguments fall back to defaults, evaluated in the caller scope
    let mut bound = Vec::with_capacity(function.parameters.len());
    for (index, parameter) in function.parameters.iter().enumerate() {
      let value = if index < arguments.len() {
        arguments[index].clone()
      } else if let Some(default) = &parameter.default {
        self.interpret_expression(document, default, diagnostics)
      } else {
        diagnostics.report(Diagnostic::warning(
          location.clone(),
          format!("missing argument '${}' in call to '{name}'", parameter.name),
        ));
        Variant::default()
      };
      bound.push(value);
    }

    self.vm.push_scope();
    for (parameter, value) in function.parameters.iter().zip(&bound) {
      let result = self
        .vm
        .declare(&parameter.name, false, parameter.constant, None, value.clone());
      self.report_bind_error(result, &parameter.name, location, diagnostics);
    }

    let saved_function = self
      .current_function
      .replace(function.name.to_ascii_lowercase().into());
    self.call_depth += 1;
    self.run_block(document, &function.body, diagnostics);
    self.call_depth -= 1;
    self.current_function = saved_function;

    // ByRef parameters write back into plain-variable arguments
    let mut write_backs: Vec<(SmartString, Variant)> = Vec::new();
    for (index, parameter) in function.parameters.iter().enumerate() {
      if parameter.by_ref && index < argument_expressions.len() {
        if let Expr::Variable { name } = &argument_expressions[index].expr {
          if let Some(value) = self.vm.lookup(&parameter.name) {
            write_backs.push((name.clone(), value.clone()));
          }
        }
      }
    }
    self.vm.pop_scope();

    for (variable, value) in write_backs {
      let result = self.vm.assign(&variable, value);
      self.report_bind_error(result, &variable, location, diagnostics);
    }

    // the statement model has no Return, calls are for their side effects
    Variant::default()
  }
}
