use aut_test::*;

aut_test!(single_line_if_runs_once
"If 1 = 1 Then ConsoleWrite(\"yes\") EndIf"
  output == "yes"
);

aut_test!(single_line_if_false_runs_zero_times
"If 1 = 2 Then ConsoleWrite(\"yes\") EndIf"
  output == ""
);

aut_test!(block_if
"
$x = 0
If True Then
  $x = 10
EndIf
If False Then
  $x = 20
EndIf
"
  x == 10
);

aut_test!(if_else
"
If False Then
  $x = 10
Else
  $x = 5
EndIf
"
  x == 5
);

aut_test!(first_matching_case_wins
"
$trace = ''
If False Then
  $trace &= 'a'
ElseIf True Then
  $trace &= 'b'
ElseIf True Then
  $trace &= 'c'
Else
  $trace &= 'd'
EndIf
"
  trace == "b"
);

aut_test!(else_runs_when_no_case_matches
"
If 0 Then
  $x = 1
ElseIf '' Then
  $x = 2
Else
  $x = 3
EndIf
"
  x == 3
);

aut_test!(conditions_cast_to_boolean
"
$a = 0
$b = 0
If 'text' Then
  $a = 1
EndIf
If '0' Then
  $b = 1
EndIf
"
  a == 1
  b == 1
);

aut_test!(nested_if
"
$x = 0
If True Then
  If False Then
    $x = 1
  Else
    $x = 2
  EndIf
EndIf
"
  x == 2
);

aut_test!(missing_endif_is_a_parse_error
"
If True Then
  $x = 1
"
  ParseError
);

aut_test!(missing_then_is_a_parse_error
"
If True
  $x = 1
EndIf
"
  ParseError
);
