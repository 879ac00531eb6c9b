//! End-to-end behavior: compile → Interpreter::run against a recording host,
//! asserting on printed output, surface calls and raised errors.

mod common;

use common::{prints, run, run_err};
use tortuga_lang::RuntimeErrorKind;

// ─── Arithmetic & printing ───────────────────────────────────────────────────

#[test]
fn variable_arithmetic_prints_result() {
    let out = prints("int x = 2\nx = x * 3\nprint x");
    assert_eq!(out, vec!["6"]);
}

#[test]
fn integer_division_truncates() {
    assert_eq!(prints("print 3 / 2"), vec!["1"]);
}

#[test]
fn float_operand_promotes_division() {
    assert_eq!(prints("print 3 / 2.0"), vec!["1.5"]);
}

#[test]
fn precedence_mul_before_add() {
    assert_eq!(prints("print 2 + 3 * 4"), vec!["14"]);
}

#[test]
fn parentheses_group() {
    assert_eq!(prints("print (2 + 3) * 4"), vec!["20"]);
}

#[test]
fn power_operator() {
    assert_eq!(prints("print 2 ^ 10"), vec!["1024"]);
}

#[test]
fn unary_minus_in_expression() {
    assert_eq!(prints("print -5 + 3"), vec!["-2"]);
    assert_eq!(prints("int a = 8\nprint (a - 5)"), vec!["3"]);
}

#[test]
fn print_joins_arguments_with_comma() {
    assert_eq!(prints("print 1 2 \"x\""), vec!["1, 2, x"]);
}

#[test]
fn string_concatenation_and_compound_add() {
    let out = prints("string s = \"ab\"\ns += \"cd\"\ns += 3\nprint s");
    assert_eq!(out, vec!["abcd3"]);
}

#[test]
fn compound_assignment_operators() {
    let out = prints("int x = 10\nx += 5\nx -= 3\nx *= 4\nx /= 6\nx ^= 2\nprint x");
    // ((10+5-3)*4)/6 = 8, then 8^2
    assert_eq!(out, vec!["64"]);
}

#[test]
fn division_by_zero_fails() {
    let e = run_err("print 1 / 0");
    assert_eq!(e.kind, RuntimeErrorKind::InvalidOperation);
    assert_eq!(e.line, Some(0));
}

#[test]
fn char_literal_arithmetic() {
    assert_eq!(prints("char c = 'a'\nc += 1\nprint c"), vec!["b"]);
}

#[test]
fn boolean_join_operators() {
    assert_eq!(prints("boolean b = true\nb = b and false\nprint b"), vec!["false"]);
    assert_eq!(prints("print 1 < 2 or 2 < 1"), vec!["true"]);
    assert_eq!(prints("print 6 or 1"), vec!["7"]);
}

// ─── Control flow ────────────────────────────────────────────────────────────

#[test]
fn if_takes_first_branch() {
    let out = prints("if 1 < 2\nprint \"then\"\nelse\nprint \"else\"\nend if");
    assert_eq!(out, vec!["then"]);
}

#[test]
fn if_takes_else_branch() {
    let out = prints("if 2 < 1\nprint \"then\"\nelse\nprint \"else\"\nend if");
    assert_eq!(out, vec!["else"]);
}

#[test]
fn else_if_chain_runs_at_most_one_branch() {
    let src = "int x = 2\n\
               if x == 1\nprint \"one\"\n\
               else if x == 2\nprint \"two\"\n\
               else if x == 2\nprint \"again\"\n\
               else\nprint \"other\"\nend if";
    assert_eq!(prints(src), vec!["two"]);
}

#[test]
fn repeat_runs_exact_count() {
    assert_eq!(prints("repeat 3\nprint \"x\"\nend repeat").len(), 3);
}

#[test]
fn repeat_zero_and_negative_do_not_run() {
    assert!(prints("repeat 0\nprint \"x\"\nend repeat").is_empty());
    assert!(prints("int n = 0\nn -= 4\nrepeat n\nprint \"x\"\nend repeat").is_empty());
}

#[test]
fn while_counts_up() {
    let out = prints("int i = 0\nwhile i < 3\nprint i\ni += 1\nend while");
    assert_eq!(out, vec!["0", "1", "2"]);
}

#[test]
fn exit_while_breaks_out() {
    let src = "int i = 0\nwhile i < 100\ni += 1\nif i == 3\nexit while\nend if\nend while\nprint i";
    assert_eq!(prints(src), vec!["3"]);
}

#[test]
fn exit_repeat_breaks_out() {
    let out = prints("repeat 5\nprint \"once\"\nexit repeat\nend repeat");
    assert_eq!(out, vec!["once"]);
}

#[test]
fn nested_blocks_match_their_own_terminators() {
    let src = "int total = 0\n\
               repeat 2\n\
               repeat 3\n\
               total += 1\n\
               end repeat\n\
               end repeat\n\
               print total";
    assert_eq!(prints(src), vec!["6"]);
}

#[test]
fn stray_exit_signal_is_an_error_at_top_level() {
    let e = run_err("exit sub");
    assert!(e.message.contains("Exit Sub"));
}

#[test]
fn bare_exit_ends_the_run() {
    assert_eq!(prints("print 1\nexit\nprint 2"), vec!["1"]);
}

#[test]
fn missing_end_if_is_a_parse_error() {
    let e = tortuga_lang::compile("if 1 < 2\nprint 1").unwrap_err();
    assert!(e.message.contains("without matching"));
    assert_eq!(e.line, Some(0));
}

#[test]
fn else_without_if_is_a_parse_error() {
    let e = tortuga_lang::compile("print 1\nelse").unwrap_err();
    assert!(e.message.contains("Else without If"));
}

// ─── Subroutines & functions ─────────────────────────────────────────────────

#[test]
fn subroutine_invocation_with_argument() {
    let src = "sub double n\nprint n * 2\nend sub\ndouble 21";
    assert_eq!(prints(src), vec!["42"]);
}

#[test]
fn function_returns_via_named_slot() {
    let src = "function sq n\nsq = n * n\nend function\nprint [sq 5]";
    assert_eq!(prints(src), vec!["25"]);
}

#[test]
fn print_invokes_a_named_function_directly() {
    let src = "function sq n\nsq = n * n\nend function\nprint sq 5";
    assert_eq!(prints(src), vec!["25"]);
}

#[test]
fn recursive_function() {
    let src = "function fact n\n\
               fact = 1\n\
               if n > 1\n\
               fact = n * [fact n - 1]\n\
               end if\n\
               end function\n\
               print [fact 5]";
    assert_eq!(prints(src), vec!["120"]);
}

#[test]
fn wrong_arity_is_a_lookup_failure() {
    let e = run_err("sub once a\nprint a\nend sub\nonce 1 2");
    assert_eq!(e.kind, RuntimeErrorKind::LookupFailure);
}

#[test]
fn unknown_invocation_reports_name() {
    let e = run_err("nosuchthing 1");
    assert!(e.message.contains("nosuchthing"));
}

#[test]
fn subroutine_locals_do_not_leak_into_globals() {
    let e = run_err("sub s\nint hidden = 1\nend sub\ns\nprint hidden");
    assert_eq!(e.kind, RuntimeErrorKind::LookupFailure);
}

#[test]
fn globals_visible_inside_subroutines() {
    let src = "int g = 7\nsub show\nprint g\nend sub\nshow";
    assert_eq!(prints(src), vec!["7"]);
}

#[test]
fn exit_sub_leaves_the_body_early() {
    let src = "sub s\nprint 1\nexit sub\nprint 2\nend sub\ns\nprint 3";
    assert_eq!(prints(src), vec!["1", "3"]);
}

#[test]
fn declaring_a_sub_inside_a_sub_fails() {
    let e = tortuga_lang::compile("sub outer\nsub inner\nend sub\nend sub").unwrap_err();
    assert!(e.message.contains("inside"));
}

// ─── References ──────────────────────────────────────────────────────────────

#[test]
fn reference_binds_and_aliases() {
    let src = "int x = 1\nref r = x\nr = 5\nprint x";
    assert_eq!(prints(src), vec!["5"]);
}

#[test]
fn reference_argument_aliases_caller_variable() {
    let src = "sub bump r\nr += 1\nend sub\n\
               int x = 10\nref rx = x\nbump rx\nprint x";
    assert_eq!(prints(src), vec!["11"]);
}

#[test]
fn unbound_reference_read_fails() {
    let e = run_err("ref r\nprint r + 1");
    assert_eq!(e.kind, RuntimeErrorKind::InvalidOperation);
}

#[test]
fn unbound_reference_prints_as_empty() {
    assert_eq!(prints("ref r\nprint r"), vec!["empty reference"]);
}

// ─── Arrays ──────────────────────────────────────────────────────────────────

#[test]
fn array_declare_assign_read() {
    let src = "{int 3} xs\n{xs 0} = 7\n{xs 2} = 9\nprint {xs 0} + {xs 2}";
    assert_eq!(prints(src), vec!["16"]);
}

#[test]
fn array_elements_start_at_template_default() {
    assert_eq!(prints("{int 2} xs\nprint {xs 1}"), vec!["0"]);
}

#[test]
fn array_out_of_bounds_carries_location() {
    let e = run_err("{int 3} xs\nprint {xs 5}");
    assert_eq!(e.kind, RuntimeErrorKind::LookupFailure);
    assert_eq!(e.line, Some(1));
    let e = run_err("{int 3} xs\nint i = 0\ni -= 1\nprint {xs i}");
    assert_eq!(e.kind, RuntimeErrorKind::LookupFailure);
}

#[test]
fn two_dimensional_array() {
    let src = "{int 2 3} m\n{m 1 2} = 5\nprint {m 1 2} + {m 0 0}";
    assert_eq!(prints(src), vec!["5"]);
}

#[test]
fn array_length_native() {
    assert_eq!(prints("{float 4} xs\nprint [length xs]"), vec!["4"]);
}

#[test]
fn string_index_yields_char() {
    assert_eq!(prints("string s = \"abc\"\nprint {s 1}"), vec!["b"]);
}

#[test]
fn set_length_reports_not_implemented() {
    let e = run_err("{int 3} xs\nsetLength xs 5");
    assert!(e.message.contains("not yet implemented"));
}

#[test]
fn arrays_reject_comparison() {
    let e = run_err("{int 2} a\n{int 2} b\nprint a < b");
    assert_eq!(e.kind, RuntimeErrorKind::InvalidOperation);
}

// ─── Constants ───────────────────────────────────────────────────────────────

#[test]
fn named_constants_resolve() {
    let out = prints("print [round pi * 1000]");
    assert_eq!(out, vec!["3142"]);
}

#[test]
fn constants_reject_assignment() {
    let e = run_err("pi = 3");
    assert_eq!(e.kind, RuntimeErrorKind::InvalidOperation);
    let e = run_err("pi += 1");
    assert_eq!(e.kind, RuntimeErrorKind::InvalidOperation);
}

#[test]
fn true_false_are_boolean_constants() {
    assert_eq!(prints("if true\nprint \"yes\"\nend if"), vec!["yes"]);
    assert_eq!(prints("print false"), vec!["false"]);
}

// ─── Natives ─────────────────────────────────────────────────────────────────

#[test]
fn math_natives_inline() {
    assert_eq!(prints("print [max 3 9]"), vec!["9"]);
    assert_eq!(prints("print [min 3 9]"), vec!["3"]);
    assert_eq!(prints("print [sqrt 16]"), vec!["4.0"]);
    assert_eq!(prints("print [round 2.5]"), vec!["3"]);
    assert_eq!(prints("print [int 2.9]"), vec!["2"]);
}

#[test]
fn typename_native() {
    assert_eq!(prints("int x\nprint [typename x]"), vec!["int"]);
    assert_eq!(prints("print [typename \"s\"]"), vec!["string"]);
}

#[test]
fn is_numeric_native() {
    assert_eq!(prints("print [isNumeric \"42\"]"), vec!["true"]);
    assert_eq!(prints("print [isNumeric \"nope\"]"), vec!["false"]);
}

#[test]
fn to_char_array_native() {
    assert_eq!(prints("print [length [toCharArray \"abc\"]]"), vec!["3"]);
}

#[test]
fn surface_size_natives() {
    assert_eq!(prints("print [width] [height]"), vec!["400, 300"]);
}

#[test]
fn input_native_blocks_until_line() {
    let src = "print [input]";
    let program = common::compile(src);
    let mut interp = tortuga_lang::Interpreter::new(program);
    let host = common::TestHost::new();
    host.queue_input("hello");
    let mut h = host.clone();
    interp.run(&mut h).unwrap();
    assert_eq!(host.prints(), vec!["hello"]);
}

#[test]
fn string_cast_through_assignment() {
    assert_eq!(prints("int x\nx = \"42\"\nprint x"), vec!["42"]);
    let e = run_err("int x\nx = \"abc\"");
    assert_eq!(e.kind, RuntimeErrorKind::InvalidTypecast);
}

// ─── Surface commands ────────────────────────────────────────────────────────

#[test]
fn movement_commands_reach_the_surface() {
    let host = run("forward 100\nright 90\nfd 10\nrt 45\nlt 45\nbw 5");
    assert_eq!(
        host.calls(),
        vec!["forward 100", "right 90", "forward 10", "right 45", "left 45", "backward 5"]
    );
}

#[test]
fn pen_and_turtle_commands() {
    let host = run("penUp\npd\nhideTurtle\nst\npenColor 300 0 128");
    assert_eq!(
        host.calls(),
        vec!["penUp", "penDown", "showTurtle false", "showTurtle true", "penColor 255 0 128"]
    );
}

#[test]
fn matrix_and_position_commands() {
    let host = run("pushMatrix\ntranslate 5 6\npopMatrix\nresetMatrix\npushPosition\npopPosition");
    assert_eq!(
        host.calls(),
        vec!["pushMatrix", "translate 5 6", "popMatrix", "resetMatrix", "pushPosition", "popPosition"]
    );
}

#[test]
fn drawing_primitives() {
    let host = run("point 1 2\nline 0 0 10 10\ntriangle 0 0 5 0 0 5\nellipse 1 2 3 4");
    assert_eq!(
        host.calls(),
        vec!["point 1 2", "line 0 0 10 10", "triangle 0 0 5 0 0 5", "ellipse 1 2 3 4"]
    );
}

#[test]
fn polygon_requires_even_arguments() {
    let e = tortuga_lang::compile("polygon 1 2 3").unwrap_err();
    assert!(e.message.contains("even"));
    let host = run("polygon 0 0 10 0 10 10");
    assert_eq!(host.calls(), vec!["polygon [0.0, 10.0, 10.0] [0.0, 0.0, 10.0]"]);
}

#[test]
fn clear_defaults_to_black() {
    let host = run("clear");
    assert_eq!(host.calls(), vec!["clear 0 0 0"]);
    let host = run("clear 10 20 30");
    assert_eq!(host.calls(), vec!["clear 10 20 30"]);
}

#[test]
fn reset_also_clears_output() {
    let host = run("print 1\nreset");
    assert_eq!(host.calls(), vec!["reset"]);
    assert!(host.prints().is_empty());
    assert_eq!(host.state.lock().cleared_output, 1);
}

#[test]
fn expressions_as_command_arguments() {
    let host = run("int d = 20\nforward d * 2 + 10");
    assert_eq!(host.calls(), vec!["forward 50"]);
}

// ─── Source shape ────────────────────────────────────────────────────────────

#[test]
fn comments_and_blank_lines_ignored() {
    let out = prints("// a comment\nprint 1 // trailing\n\nprint 2");
    assert_eq!(out, vec!["1", "2"]);
}

#[test]
fn comment_marker_inside_string_is_content() {
    let out = prints("print \"http://example.com\" // trailing");
    assert_eq!(out, vec!["http://example.com"]);
}

#[test]
fn continuation_lines_join() {
    assert_eq!(prints("print 1 + _\n2"), vec!["3"]);
}

#[test]
fn keywords_are_case_insensitive() {
    let out = prints("INT x = 3\nRepeat 2\nPRINT X\nEnd Repeat");
    assert_eq!(out, vec!["3", "3"]);
}

#[test]
fn error_location_points_at_the_statement() {
    let e = run_err("print 1\nprint 2\nprint nosuchvar");
    assert_eq!(e.line, Some(2));
    assert_eq!(e.kind, RuntimeErrorKind::LookupFailure);
}
