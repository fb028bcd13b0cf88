use aut_interpreter::Variant;
use aut_test::*;

aut_test!(plain_assignment
"
$x = 10
"
  x == 10
);

aut_test!(local_declaration_with_value
"
Local $greeting = 'hello'
"
  greeting == "hello"
);

aut_test!(bare_declaration_binds_the_default
"
Local $nothing
$empty = $nothing == ''
"
  empty == true
);

aut_test!(dim_is_the_default_scope
"
Dim $x = 4
"
  x == 4
);

aut_test!(compound_assignment_operators
"
$a = 10
$a += 5
$b = 10
$b -= 5
$c = 10
$c *= 5
$d = 10
$d /= 5
$e = 'ab'
$e &= 'cd'
"
  a == 15
  b == 5
  c == 50
  d == 2.0
  e == "abcd"
);

aut_test!(variable_names_ignore_case
"
$counter = 1
$COUNTER = $Counter + 1
"
  counter == 2
);

aut_test!(undefined_variable_reads_as_the_default
"
$copy = $nonexistent & 'done'
"
  copy == "done"
);

#[test]
fn undefined_variable_reads_surface_a_warning() {
  let run = run("$copy = $nonexistent\n");
  assert_eq!(run.warnings, 1);
}

#[test]
fn const_reassignment_is_a_runtime_error() {
  let run = run("Const $limit = 3\n$limit = 4\n");
  assert_eq!(run.errors, 1);
  assert_eq!(run.global("limit"), Variant::from(3));
}

aut_test!(keyword_values
"
$d = Default
$n = Null
$bool = $d == $n
"
  bool == false
);

aut_test!(booleans_and_strings
"
$t = True
$f = False
$joined = $t & $f
"
  t == true
  f == false
  joined == "TrueFalse"
);

aut_test!(exit_stops_top_level_execution
"
$before = 1
Exit 3
$after = 1
"
  before == 1
);

#[test]
fn exit_records_the_exit_code() {
  let run = run("Exit 3\n");
  assert_eq!(run.interpreter.vm().exit_code(), 3);
  assert!(run.interpreter.vm().is_halted());

  let run = run("Exit\n");
  assert_eq!(run.interpreter.vm().exit_code(), 0);
}
