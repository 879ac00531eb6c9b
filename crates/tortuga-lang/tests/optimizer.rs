//! Slot-resolution behavior: optimized (slot-indexed) and unoptimized
//! (by-name) execution must be observably identical, and block-scoped
//! declarations must restore the stack depth they found.

mod common;

use common::TestHost;
use tortuga_lang::{Interpreter, compile, compile_unoptimized};

fn outputs_of(program: tortuga_lang::Program) -> (Vec<String>, Vec<String>) {
    let mut interp = Interpreter::new(program);
    let host = TestHost::new();
    let mut h = host.clone();
    interp.run(&mut h).unwrap_or_else(|e| panic!("run failed: {e:?}"));
    (host.prints(), host.calls())
}

fn assert_equivalent(src: &str) {
    let optimized = outputs_of(compile(src).expect("compile"));
    let fallback = outputs_of(compile_unoptimized(src).expect("compile unoptimized"));
    assert_eq!(optimized, fallback, "optimized and by-name runs diverged for:\n{src}");
}

#[test]
fn globals_and_expressions_are_equivalent() {
    assert_equivalent(
        "int a = 2\n\
         int b = 3\n\
         int c = a * b + a\n\
         print a b c\n\
         forward a * 10",
    );
}

#[test]
fn block_locals_are_equivalent() {
    assert_equivalent(
        "int a = 1\n\
         if a < 2\n\
         int inner = 40\n\
         print inner + a\n\
         end if\n\
         print a",
    );
}

#[test]
fn loops_with_locals_are_equivalent() {
    assert_equivalent(
        "int total = 0\n\
         int i = 0\n\
         while i < 4\n\
         int step = i * 2\n\
         total += step\n\
         i += 1\n\
         end while\n\
         print total",
    );
}

#[test]
fn subroutine_bodies_are_equivalent() {
    assert_equivalent(
        "int g = 5\n\
         sub work n\n\
         int local = n * 2\n\
         print local + g\n\
         end sub\n\
         work 3\n\
         work 10",
    );
}

#[test]
fn function_results_are_equivalent() {
    assert_equivalent(
        "function twice n\n\
         twice = n + n\n\
         end function\n\
         int r = [twice 21]\n\
         print r",
    );
}

#[test]
fn outer_variable_is_readable_again_after_shadowing_block() {
    // popping the inner declaration must reveal the outer one to by-name
    // lookup, exactly as slot lookup sees it
    let src = "int x = 1\n\
               if 1 < 2\n\
               int x = 2\n\
               print x\n\
               end if\n\
               print x";
    assert_equivalent(src);
    let (prints, _) = outputs_of(compile(src).expect("compile"));
    assert_eq!(prints, vec!["2", "1"]);
}

#[test]
fn shadowing_resolves_to_the_nearest_declaration() {
    // the block-local x shadows the global until the block ends
    let src = "int x = 1\n\
               if 1 < 2\n\
               int x = 99\n\
               print x\n\
               end if\n\
               repeat 1\n\
               print 1\n\
               end repeat";
    let (prints, _) = outputs_of(compile(src).expect("compile"));
    assert_eq!(prints, vec!["99", "1"]);
}

// ─── Stack discipline ────────────────────────────────────────────────────────

#[test]
fn block_exit_restores_stack_depth() {
    let src = "int a = 1\n\
               if a == 1\n\
               int b = 2\n\
               int c = 3\n\
               print b + c\n\
               end if";
    let mut interp = Interpreter::new(compile(src).expect("compile"));
    let mut host = TestHost::new();
    interp.run(&mut host).unwrap();
    // only the top-level declaration survives
    assert_eq!(interp.global_depth(), 1);
}

#[test]
fn early_exit_still_pops_block_locals() {
    let src = "int a = 0\n\
               while a < 10\n\
               int b = a\n\
               a += 1\n\
               if a > 2\n\
               exit while\n\
               end if\n\
               end while";
    let mut interp = Interpreter::new(compile(src).expect("compile"));
    let mut host = TestHost::new();
    interp.run(&mut host).unwrap();
    assert_eq!(interp.global_depth(), 1);
}

#[test]
fn top_level_declarations_persist_for_callbacks() {
    let src = "int hits = 0\n\
               sub draw\n\
               hits += 1\n\
               print hits\n\
               end sub";
    let mut interp = Interpreter::new(compile(src).expect("compile"));
    let host = TestHost::new();
    let mut h = host.clone();
    interp.run(&mut h).unwrap();
    assert!(interp.has_callbacks());
    assert!(interp.invoke_callback(&mut h, "draw", &[]).unwrap());
    assert!(interp.invoke_callback(&mut h, "draw", &[]).unwrap());
    assert_eq!(host.prints(), vec!["1", "2"]);
}

#[test]
fn mouse_callback_receives_coordinates() {
    let src = "sub mouseclicked x y\nprint x + y\nend sub";
    let mut interp = Interpreter::new(compile(src).expect("compile"));
    let host = TestHost::new();
    let mut h = host.clone();
    interp.run(&mut h).unwrap();
    let args = [tortuga_lang::Variable::Int(30), tortuga_lang::Variable::Int(12)];
    assert!(interp.invoke_callback(&mut h, "mouseclicked", &args).unwrap());
    assert_eq!(host.prints(), vec!["42"]);
}

#[test]
fn absent_callback_reports_false() {
    let mut interp = Interpreter::new(compile("print 1").expect("compile"));
    let mut host = TestHost::new();
    interp.run(&mut host).unwrap();
    assert!(!interp.has_callbacks());
    assert!(!interp.invoke_callback(&mut host, "draw", &[]).unwrap());
}
