use aut_test::*;

aut_test!(multiplication_binds_tighter_than_addition
"
$x = 1 + 2 * 3
"
  x == 7
);

aut_test!(parentheses_override_precedence
"
$x = (1 + 2) * 3
"
  x == 9
);

aut_test!(raise_is_right_associative
"
$x = 2 ^ 3 ^ 2
"
  x == 512.0
);

aut_test!(division_always_produces_a_double
"
$x = 1 / 2
$y = 4 / 2
"
  x == 0.5
  y == 2.0
);

aut_test!(concatenation_binds_looser_than_addition
"
$x = 'n = ' & 1 + 2
"
  x == "n = 3"
);

aut_test!(comparisons_bind_looser_than_concatenation
"
$x = 'a' & 'b' = 'AB'
"
  x == true
);

aut_test!(loose_equality_ignores_string_case
"
$loose = 'Hello' = 'hello'
$strict = 'Hello' == 'hello'
$same = 'Hello' == 'Hello'
"
  loose == true
  strict == false
  same == true
);

aut_test!(not_equal_follows_the_loose_rules
"
$x = 'Hello' <> 'hello'
$y = 1 <> 2
"
  x == false
  y == true
);

aut_test!(ordering_comparisons
"
$a = 2 < 10
$b = '2' < 10
$c = 'abc' < 'ABD'
$d = 3 >= 3
"
  a == true
  b == true
  c == true
  d == true
);

aut_test!(two_strings_compare_lexicographically
"
$x = '2' < '10'
"
  x == false
);

aut_test!(and_or_produce_booleans
"
$a = 1 And 'text'
$b = 0 Or ''
$c = 0 Or 5
"
  a == true
  b == false
  c == true
);

aut_test!(and_or_short_circuit
"
$called = 0
Func sideEffect()
  $called += 1
EndFunc

$a = 0 And sideEffect()
$b = 1 Or sideEffect()
"
  a == false
  b == true
  called == 0
);

aut_test!(not_and_unary_minus
"
$a = Not 1
$b = Not ''
$c = -3 + 1
$d = +'4'
"
  a == false
  b == true
  c == -2
  d == 4
);

aut_test!(ternary_selects_by_condition
"
$a = 1 > 2 ? 'yes' : 'no'
$b = 2 > 1 ? 'yes' : 'no'
"
  a == "no"
  b == "yes"
);

aut_test!(arithmetic_coerces_strings
"
$x = '2' + 3
$y = '2.5' * 2
"
  x == 5
  y == 5.0
);

aut_test!(integer_arithmetic_stays_integral
"
$x = 7 - 2
$y = 7.0 - 2
"
  x == 5
  y == 5.0
);
