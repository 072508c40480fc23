//! End-to-end interpreter tests: compile + run real programs and check
//! what they print.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use pythowon_runtime::{ErrorKind, InterpretError, Vm};

#[derive(Clone, Default)]
struct Sink(Arc<Mutex<Vec<u8>>>);

impl Write for Sink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().expect("sink lock").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Sink {
    fn contents(&self) -> String {
        String::from_utf8(self.0.lock().expect("sink lock").clone()).expect("utf8 output")
    }
}

fn run(source: &str) -> String {
    let mut vm = Vm::new();
    let sink = Sink::default();
    vm.set_output(Box::new(sink.clone()));
    match vm.interpret(source) {
        Ok(()) => sink.contents(),
        Err(error) => panic!("program failed: {error}\nsource: {source}"),
    }
}

fn run_err(source: &str) -> InterpretError {
    let mut vm = Vm::new();
    vm.set_output(Box::new(Sink::default()));
    match vm.interpret(source) {
        Ok(()) => panic!("program unexpectedly succeeded: {source}"),
        Err(error) => error,
    }
}

#[test]
fn arithmetic_precedence() {
    assert_eq!(run("print 1 + 2 * 3;"), "7\n");
}

#[test]
fn shadowing_in_blocks() {
    assert_eq!(
        run("var a = 1; { var a = 2; print a; } print a;"),
        "2\n1\n"
    );
}

#[test]
fn string_replication() {
    assert_eq!(run("var s = \"ab\"; print s * 3;"), "ababab\n");
}

#[test]
fn recursive_fibonacci() {
    assert_eq!(
        run("def fib(n){ if (n < 2) return n; return fib(n-1) + fib(n-2); } print fib(10);"),
        "55\n"
    );
}

#[test]
fn undefined_variable_is_a_runtime_error() {
    match run_err("print undef;") {
        InterpretError::Runtime(error) => {
            assert_eq!(error.kind, ErrorKind::Value);
            assert!(error.to_string().contains("Undefined variable 'undef'"));
        }
        other => panic!("expected a runtime error, got {other:?}"),
    }
}

#[test]
fn integer_string_concatenation() {
    assert_eq!(run("var a; a = 1; a = a + \"!\"; print a;"), "1!\n");
}

#[test]
fn string_concatenation_coerces_both_sides() {
    assert_eq!(run("print \"n=\" + 42;"), "n=42\n");
    assert_eq!(run("print \"b=\" + true;"), "b=true\n");
    assert_eq!(run("print \"v=\" + none;"), "v=none\n");
}

#[test]
fn integer_and_double_arithmetic() {
    assert_eq!(run("print 7 - 3;"), "4\n");
    assert_eq!(run("print 2.5 + 1;"), "3.5\n");
    assert_eq!(run("print 10 / 4;"), "2.5\n");
    assert_eq!(run("print 7 % 3;"), "1\n");
    assert_eq!(run("print 1 << 4;"), "16\n");
    assert_eq!(run("print 256 >> 2;"), "64\n");
    assert_eq!(run("print -2.0;"), "-2\n");
}

#[test]
fn negating_an_integer_promotes_to_double() {
    // There is no signed integer; negation always produces a double.
    assert_eq!(run("print -5 + 0.5;"), "-4.5\n");
}

#[test]
fn comparisons_and_equality() {
    assert_eq!(run("print 1 < 2;"), "true\n");
    assert_eq!(run("print 2 <= 1;"), "false\n");
    assert_eq!(run("print 3 == 3.0;"), "true\n");
    assert_eq!(run("print 3 != 4;"), "true\n");
    assert_eq!(run("print \"a\" == \"a\";"), "true\n");
    assert_eq!(run("print \"a\" == \"b\";"), "false\n");
}

#[test]
fn truthiness_in_conditionals() {
    // Idiosyncratic rules: 0.0 is truthy, negatives are falsey, one-char
    // strings are falsey, the string "false" is falsey.
    assert_eq!(run("if (0.0) print \"y\"; else print \"n\";"), "y\n");
    assert_eq!(run("if (-1.0) print \"y\"; else print \"n\";"), "n\n");
    assert_eq!(run("if (0) print \"y\"; else print \"n\";"), "n\n");
    assert_eq!(run("if (\"false\") print \"y\"; else print \"n\";"), "n\n");
    assert_eq!(run("if (\"x\") print \"y\"; else print \"n\";"), "n\n");
    assert_eq!(run("if (\"ok\") print \"y\"; else print \"n\";"), "y\n");
    assert_eq!(run("print !none;"), "true\n");
}

#[test]
fn short_circuit_logic() {
    assert_eq!(run("print true and 1;"), "1\n");
    assert_eq!(run("print false and undef;"), "false\n");
    assert_eq!(run("print false or 2;"), "2\n");
    assert_eq!(run("print true or undef;"), "true\n");
}

#[test]
fn while_loop_counts() {
    assert_eq!(
        run("var i = 0; while (i < 3) { print i; i = i + 1; }"),
        "0\n1\n2\n"
    );
}

#[test]
fn for_loop_with_all_clauses() {
    assert_eq!(
        run("for (var i = 0; i < 3; i = i + 1) print i;"),
        "0\n1\n2\n"
    );
}

#[test]
fn for_loop_without_increment() {
    assert_eq!(
        run("for (var i = 0; i < 2;) { print i; i = i + 1; }"),
        "0\n1\n"
    );
}

#[test]
fn continue_skips_to_the_next_iteration() {
    assert_eq!(
        run("for (var i = 0; i < 5; i = i + 1) { if (i == 2) continue; print i; }"),
        "0\n1\n3\n4\n"
    );
}

#[test]
fn continue_in_while_reevaluates_the_condition() {
    assert_eq!(
        run("var i = 0; while (i < 4) { i = i + 1; if (i == 2) continue; print i; }"),
        "1\n3\n4\n"
    );
}

#[test]
fn switch_dispatches_on_equality() {
    let source = "
        var word = \"?\";
        switch (2) {
            case 1: word = \"one\";
            case 2: word = \"two\";
            case 3: word = \"three\";
        }
        print word;
    ";
    assert_eq!(run(source), "two\n");
}

#[test]
fn switch_falls_back_to_default() {
    let source = "
        switch (9) {
            case 1: print \"one\";
            default: print \"other\";
        }
    ";
    assert_eq!(run(source), "other\n");
}

#[test]
fn switch_leaves_nothing_behind() {
    // The dispatch value is discarded even when no case matches and there
    // is no default.
    assert_eq!(run("switch (5) { case 1: print 1; } print \"done\";"), "done\n");
}

#[test]
fn functions_return_values() {
    assert_eq!(
        run("def add(a, b) { return a + b; } print add(2, 3);"),
        "5\n"
    );
}

#[test]
fn function_without_return_yields_none() {
    assert_eq!(run("def nothing() { } print nothing();"), "none\n");
}

#[test]
fn default_parameters_fill_the_tail() {
    let source = "
        def greet(name, suffix = \"!\") { return name + suffix; }
        print greet(\"owo\");
        print greet(\"owo\", \"?\");
    ";
    assert_eq!(run(source), "owo!\nowo?\n");
}

#[test]
fn default_parameter_may_reference_earlier_parameters() {
    let source = "
        def pair(a, b = a * 2) { return a + b; }
        print pair(3);
        print pair(3, 10);
    ";
    assert_eq!(run(source), "9\n13\n");
}

#[test]
fn partial_default_argument_counts_are_rejected() {
    let source = "def f(a, b = 1, c = 2) { return a; } f(1, 2);";
    match run_err(source) {
        InterpretError::Runtime(error) => {
            assert_eq!(error.kind, ErrorKind::Argument);
            assert_eq!(error.message, "Expected 1 arguments but got 2.");
        }
        other => panic!("expected a runtime error, got {other:?}"),
    }
}

#[test]
fn globals_persist_across_interpret_calls() {
    let mut vm = Vm::new();
    let sink = Sink::default();
    vm.set_output(Box::new(sink.clone()));
    vm.interpret("var counter = 1;").expect("first line");
    vm.interpret("counter = counter + 1;").expect("second line");
    vm.interpret("print counter;").expect("third line");
    assert_eq!(sink.contents(), "2\n");
}

#[test]
fn functions_print_their_names() {
    assert_eq!(run("def f() { } print f;"), "<fn f>\n");
    assert_eq!(run("print clock;"), "<native fn>\n");
}

#[test]
fn string_escapes_render() {
    assert_eq!(run("print \"a\\tb\\nc\";"), "a\tb\nc\n");
}

#[test]
fn block_comments_are_ignored() {
    assert_eq!(run("#| nothing \n to see |# print 1; # trailing"), "1\n");
}

#[test]
fn compile_errors_come_back_as_a_batch() {
    let source = "var ;\nprint 1 +;\n";
    match run_err(source) {
        InterpretError::Compile(errors) => {
            assert_eq!(errors.0.len(), 2);
            let rendered = errors.to_string();
            assert!(rendered.contains("[line 1]"));
            assert!(rendered.contains("[line 2]"));
        }
        other => panic!("expected compile errors, got {other:?}"),
    }
}

#[test]
fn runtime_error_carries_a_traceback() {
    let source = "def inner() { return 1 % 0; }\ndef outer() { return inner(); }\nouter();";
    match run_err(source) {
        InterpretError::Runtime(error) => {
            let rendered = error.to_string();
            assert!(rendered.starts_with("ValueError: "));
            assert!(rendered.contains("[line 1] in inner()"));
            assert!(rendered.contains("[line 2] in outer()"));
            assert!(rendered.contains("in script"));
        }
        other => panic!("expected a runtime error, got {other:?}"),
    }
}

#[test]
fn division_follows_ieee() {
    assert_eq!(run("print 1 / 0;"), "inf\n");
    assert_eq!(run("print -1 / 0;"), "-inf\n");
}

#[test]
fn nested_scopes_release_their_locals() {
    let source = "
        var total = 0;
        {
            var a = 1;
            {
                var b = 2;
                total = a + b;
            }
        }
        print total;
    ";
    assert_eq!(run(source), "3\n");
}
