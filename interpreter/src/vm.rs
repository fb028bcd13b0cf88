use crate::variant::Variant;
use rustc_hash::FxHashMap;
use smartstring::alias::String as SmartString;
use std::path::{Path, PathBuf};

#[derive(Debug, PartialEq, Eq)]
pub enum BindError {
  ConstantReassigned,
}

struct Slot {
  value: Variant,
  constant: bool,
  /// Set for `Static` locals; the value is written back to the static side
  /// table when the scope is popped
  static_key: Option<SmartString>,
}

/// One name-to-value binding frame. Names compare ignoring case, so keys are
/// stored lowercased.
#[derive(Default)]
pub struct Scope {
  variables: FxHashMap<SmartString, Slot>,
}

fn key_for(name: &str) -> SmartString {
  name.to_ascii_lowercase().into()
}

pub type ConsoleSink = Box<dyn FnMut(&str)>;

/// The mutable half of the runtime: the scope stack, the console sinks, the
/// halt flag and the `@error`/`@extended` registers.
///
/// The scope stack always holds the global scope at index 0; only function
/// calls push and pop frames on top of it. A variable reference sees the
/// innermost frame and the global frame, nothing in between.
pub struct VirtualMachine {
  scopes: Vec<Scope>,
  statics: FxHashMap<SmartString, Variant>,
  out_sink: ConsoleSink,
  error_sink: ConsoleSink,
  pre_statement: Option<Box<dyn FnMut() -> bool>>,
  halted: bool,
  exit_code: i64,
  error_register: i64,
  extended_register: i64,
  random_state: u64,
  script_path: Option<PathBuf>,
}

impl Default for VirtualMachine {
  fn default() -> Self {
    Self {
      scopes: vec![Scope::default()],
      statics: FxHashMap::default(),
      out_sink: Box::new(|text| print!("{text}")),
      error_sink: Box::new(|text| eprint!("{text}")),
      pre_statement: None,
      halted: false,
      exit_code: 0,
      error_register: 0,
      extended_register: 0,
      random_state: 0x9E37_79B9_7F4A_7C15,
      script_path: None,
    }
  }
}

impl VirtualMachine {
  pub fn new() -> Self {
    Self::default()
  }

  // Host hooks

  pub fn set_console_write(&mut self, sink: impl FnMut(&str) + 'static) {
    self.out_sink = Box::new(sink);
  }

  pub fn set_console_error(&mut self, sink: impl FnMut(&str) + 'static) {
    self.error_sink = Box::new(sink);
  }

  /// Invoked before every statement; returning false halts execution. Used
  /// by hosts to bound otherwise-unbounded scripts.
  pub fn set_pre_statement_callback(&mut self, callback: impl FnMut() -> bool + 'static) {
    self.pre_statement = Some(Box::new(callback));
  }

  pub fn console_write(&mut self, text: &str) {
    (self.out_sink)(text);
  }

  pub fn console_write_error(&mut self, text: &str) {
    (self.error_sink)(text);
  }

  pub fn set_script_path(&mut self, path: Option<PathBuf>) {
    self.script_path = path;
  }

  pub fn script_path(&self) -> Option<&Path> {
    self.script_path.as_deref()
  }

  // Execution bounding

  /// True when the next statement may run; consults the halt flag and the
  /// pre-statement callback
  pub fn begin_statement(&mut self) -> bool {
    if self.halted {
      return false;
    }
    if let Some(callback) = &mut self.pre_statement {
      if !callback() {
        self.halted = true;
        return false;
      }
    }
    true
  }

  pub fn request_halt(&mut self) {
    self.halted = true;
  }

  pub fn is_halted(&self) -> bool {
    self.halted
  }

  pub fn set_exit_code(&mut self, code: i64) {
    self.exit_code = code;
  }

  pub fn exit_code(&self) -> i64 {
    self.exit_code
  }

  // The @error / @extended registers

  pub fn set_error(&mut self, value: i64) {
    self.error_register = value;
  }

  pub fn error(&self) -> i64 {
    self.error_register
  }

  pub fn set_extended(&mut self, value: i64) {
    self.extended_register = value;
  }

  pub fn extended(&self) -> i64 {
    self.extended_register
  }

  /// xorshift64*, seedable and deterministic; good enough for the `Random`
  /// built-in without carrying a dependency
  pub fn next_random(&mut self) -> f64 {
    let mut x = self.random_state;
    x ^= x >> 12;
    x ^= x << 25;
    x ^= x >> 27;
    self.random_state = x;
    #[allow(clippy::cast_precision_loss)]
    let fraction = (x.wrapping_mul(0x2545_F491_4F6C_DD1D) >> 11) as f64;
    fraction / (1u64 << 53) as f64
  }

  pub fn seed_random(&mut self, seed: i64) {
    #[allow(clippy::cast_sign_loss)]
    let state = seed as u64;
    self.random_state = state | 1;
  }

  // Scopes

  pub fn push_scope(&mut self) {
    self.scopes.push(Scope::default());
  }

  /// Pops the innermost scope, persisting `Static` locals. The global scope
  /// is never popped.
  pub fn pop_scope(&mut self) {
    debug_assert!(self.scopes.len() > 1, "attempted to pop the global scope");
    if self.scopes.len() == 1 {
      return;
    }
    let scope = self.scopes.pop().expect("scope stack is never empty");
    for slot in scope.variables.into_values() {
      if let Some(key) = slot.static_key {
        self.statics.insert(key, slot.value);
      }
    }
  }

  pub fn scope_depth(&self) -> usize {
    self.scopes.len()
  }

  fn current_scope_index(&self) -> usize {
    self.scopes.len() - 1
  }

  /// Creates or replaces a binding in the chosen scope. Replacing a `Const`
  /// binding is rejected.
  pub fn declare(
    &mut self,
    name: &str,
    global: bool,
    constant: bool,
    static_key: Option<SmartString>,
    value: Variant,
  ) -> Result<(), BindError> {
    let index = if global { 0 } else { self.current_scope_index() };
    let key = key_for(name);

    let scope = &mut self.scopes[index];
    if let Some(existing) = scope.variables.get(&key) {
      if existing.constant {
        return Err(BindError::ConstantReassigned);
      }
    }
    scope.variables.insert(
      key,
      Slot {
        value,
        constant,
        static_key,
      },
    );
    Ok(())
  }

  /// Updates the nearest existing binding (innermost frame, then global), or
  /// creates one in the innermost frame
  pub fn assign(&mut self, name: &str, value: Variant) -> Result<(), BindError> {
    let key = key_for(name);
    let innermost = self.current_scope_index();

    if let Some(slot) = self.scopes[innermost].variables.get_mut(&key) {
      if slot.constant {
        return Err(BindError::ConstantReassigned);
      }
      slot.value = value;
      return Ok(());
    }

    if innermost > 0 {
      if let Some(slot) = self.scopes[0].variables.get_mut(&key) {
        if slot.constant {
          return Err(BindError::ConstantReassigned);
        }
        slot.value = value;
        return Ok(());
      }
    }

    self.scopes[innermost].variables.insert(
      key,
      Slot {
        value,
        constant: false,
        static_key: None,
      },
    );
    Ok(())
  }

  /// Resolves a variable: innermost frame first, then the global frame.
  /// Frames in between belong to other calls and are invisible.
  pub fn lookup(&self, name: &str) -> Option<&Variant> {
    let key = key_for(name);
    let innermost = self.current_scope_index();

    if let Some(slot) = self.scopes[innermost].variables.get(&key) {
      return Some(&slot.value);
    }
    if innermost > 0 {
      if let Some(slot) = self.scopes[0].variables.get(&key) {
        return Some(&slot.value);
      }
    }
    None
  }

  pub fn get_global(&self, name: &str) -> Option<Variant> {
    self.scopes[0]
      .variables
      .get(&key_for(name))
      .map(|slot| slot.value.clone())
  }

  pub fn static_value(&self, key: &str) -> Option<&Variant> {
    self.statics.get(&key_for(key))
  }

  pub fn store_static(&mut self, key: &str, value: Variant) {
    self.statics.insert(key_for(key), value);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::{cell::RefCell, rc::Rc};

  #[test]
  fn bindings_ignore_case() {
    let mut vm = VirtualMachine::new();
    vm.declare("Counter", false, false, None, Variant::from(1)).unwrap();

    assert_eq!(vm.lookup("counter"), Some(&Variant::from(1)));
    assert_eq!(vm.lookup("COUNTER"), Some(&Variant::from(1)));
    assert_eq!(vm.get_global("counter"), Some(Variant::from(1)));
  }

  #[test]
  fn constants_cannot_be_reassigned() {
    let mut vm = VirtualMachine::new();
    vm.declare("limit", false, true, None, Variant::from(10)).unwrap();

    assert_eq!(
      vm.assign("limit", Variant::from(11)),
      Err(BindError::ConstantReassigned)
    );
    assert_eq!(
      vm.declare("limit", false, false, None, Variant::from(11)),
      Err(BindError::ConstantReassigned)
    );
    assert_eq!(vm.lookup("limit"), Some(&Variant::from(10)));
  }

  #[test]
  fn function_scopes_shadow_and_restore() {
    let mut vm = VirtualMachine::new();
    vm.declare("x", false, false, None, Variant::from(1)).unwrap();

    vm.push_scope();
    vm.declare("x", false, false, None, Variant::from(2)).unwrap();
    assert_eq!(vm.lookup("x"), Some(&Variant::from(2)));
    vm.pop_scope();

    assert_eq!(vm.lookup("x"), Some(&Variant::from(1)));
  }

  #[test]
  fn intermediate_frames_are_invisible() {
    let mut vm = VirtualMachine::new();
    vm.push_scope();
    vm.declare("caller_local", false, false, None, Variant::from(1)).unwrap();
    vm.push_scope();

    assert_eq!(vm.lookup("caller_local"), None);

    vm.pop_scope();
    vm.pop_scope();
  }

  #[test]
  fn auto_assignment_updates_globals_from_inside_calls() {
    let mut vm = VirtualMachine::new();
    vm.declare("total", false, false, None, Variant::from(1)).unwrap();

    vm.push_scope();
    vm.assign("total", Variant::from(2)).unwrap();
    vm.pop_scope();

    assert_eq!(vm.get_global("total"), Some(Variant::from(2)));
  }

  #[test]
  fn statics_persist_across_scope_pops() {
    let mut vm = VirtualMachine::new();

    vm.push_scope();
    vm.declare("count", false, false, Some("f::count".into()), Variant::from(1))
      .unwrap();
    vm.assign("count", Variant::from(5)).unwrap();
    vm.pop_scope();

    assert_eq!(vm.static_value("f::count"), Some(&Variant::from(5)));
  }

  #[test]
  fn pre_statement_callback_can_halt() {
    let mut vm = VirtualMachine::new();
    let allowance = Rc::new(RefCell::new(2));
    let shared = Rc::clone(&allowance);
    vm.set_pre_statement_callback(move || {
      let mut remaining = shared.borrow_mut();
      if *remaining == 0 {
        false
      } else {
        *remaining -= 1;
        true
      }
    });

    assert!(vm.begin_statement());
    assert!(vm.begin_statement());
    assert!(!vm.begin_statement());
    assert!(vm.is_halted());
  }

  #[test]
  fn console_sinks_are_swappable() {
    let mut vm = VirtualMachine::new();
    let captured = Rc::new(RefCell::new(String::new()));
    let shared = Rc::clone(&captured);
    vm.set_console_write(move |text| shared.borrow_mut().push_str(text));

    vm.console_write("3");
    assert_eq!(*captured.borrow(), "3");
  }

  #[test]
  fn random_is_deterministic_for_a_seed() {
    let mut first = VirtualMachine::new();
    let mut second = VirtualMachine::new();
    first.seed_random(42);
    second.seed_random(42);

    let a = first.next_random();
    assert_eq!(a, second.next_random());
    assert!((0.0..1.0).contains(&a));
  }
}
