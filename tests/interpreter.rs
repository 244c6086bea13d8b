mod interpreter_tests {
    use std::cell::RefCell;
    use std::io::Write;
    use std::rc::Rc;

    use rox::error::LoxError;
    use rox::interpreter::Interpreter;
    use rox::parser::Parser;
    use rox::resolver::Resolver;
    use rox::scanner::Scanner;

    /// `print` sink the test keeps a handle on after the interpreter takes
    /// ownership of its clone.
    #[derive(Clone, Default)]
    struct SharedBuf(Rc<RefCell<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    /// Runs `source` through the full pipeline.  Compile errors fail the
    /// test; the result is the captured print output, or the runtime error.
    fn run(source: &str) -> Result<String, LoxError> {
        let (tokens, scan_errors) = Scanner::new(source.as_bytes()).scan_tokens();
        assert!(scan_errors.is_empty(), "scan errors in {:?}", source);

        let (statements, parse_errors) = Parser::new(tokens).parse();
        assert!(parse_errors.is_empty(), "parse errors: {:?}", parse_errors);

        let sink = SharedBuf::default();
        let mut interpreter = Interpreter::with_output(Box::new(sink.clone()));

        Resolver::new(&mut interpreter)
            .resolve(&statements)
            .unwrap_or_else(|errors| panic!("resolve errors: {:?}", errors));

        let result = interpreter.interpret(&statements);

        let output = String::from_utf8(sink.0.borrow().clone()).expect("utf-8 output");

        result.map(|()| output)
    }

    fn expect_output(source: &str, expected: &str) {
        assert_eq!(run(source).expect("program should succeed"), expected);
    }

    fn expect_runtime_error(source: &str, expected_message: &str) {
        match run(source) {
            Ok(output) => panic!("expected runtime error, got output {:?}", output),

            Err(e) => assert!(
                e.to_string().contains(expected_message),
                "expected message containing {:?}, got {:?}",
                expected_message,
                e.to_string()
            ),
        }
    }

    // ── arithmetic and stringification ──────────────────────────────────

    #[test]
    fn test_arithmetic() {
        expect_output("print 1 + 2;", "3\n");
        expect_output("print 2 * 3 + 4;", "10\n");
        expect_output("print 10 / 4;", "2.5\n");
        expect_output("print -(3 - 5);", "2\n");
    }

    #[test]
    fn test_number_formatting_drops_integral_fraction() {
        expect_output("print 3.0;", "3\n");
        expect_output("print 2.5;", "2.5\n");
        expect_output("print 0;", "0\n");
    }

    #[test]
    fn test_string_concatenation() {
        expect_output("print \"foo\" + \"bar\";", "foobar\n");
    }

    #[test]
    fn test_stringify_special_values() {
        expect_output("print nil;", "nil\n");
        expect_output("print true;", "true\n");
        expect_output("print false;", "false\n");
        expect_output("fun f() {} print f;", "<fn f>\n");
        expect_output("print clock;", "<native fn>\n");
        expect_output("class C {} print C;", "C\n");
        expect_output("class C {} print C();", "<C instance>\n");
    }

    // ── truthiness and equality ─────────────────────────────────────────

    #[test]
    fn test_truthiness_table() {
        // Only nil and false are falsey; 0 and "" are truthy.
        expect_output("print !nil;", "true\n");
        expect_output("print !false;", "true\n");
        expect_output("print !true;", "false\n");
        expect_output("print !0;", "false\n");
        expect_output("print !\"\";", "false\n");
        expect_output("print !!nil;", "false\n");
    }

    #[test]
    fn test_equality() {
        expect_output("print nil == nil;", "true\n");
        expect_output("print 1 == 1;", "true\n");
        expect_output("print 1 == 2;", "false\n");
        expect_output("print \"a\" == \"a\";", "true\n");
        expect_output("print 1 == \"1\";", "false\n");
        expect_output("print nil == false;", "false\n");
        expect_output("print 1 != 2;", "true\n");
    }

    #[test]
    fn test_equality_never_errors_on_mixed_types() {
        expect_output("print \"x\" == 3;", "false\n");
        expect_output("print clock == 3;", "false\n");
    }

    #[test]
    fn test_instance_equality_is_identity() {
        expect_output(
            "class C {} var a = C(); var b = C(); print a == a; print a == b;",
            "true\nfalse\n",
        );
    }

    // ── logical operators ───────────────────────────────────────────────

    #[test]
    fn test_logical_operators_return_operands() {
        expect_output("print \"hi\" or 2;", "hi\n");
        expect_output("print nil or \"yes\";", "yes\n");
        expect_output("print nil and 2;", "nil\n");
        expect_output("print 1 and 2;", "2\n");
        expect_output("print false or false;", "false\n");
    }

    #[test]
    fn test_logical_short_circuit_skips_rhs() {
        // The RHS would blow up at runtime if it were evaluated.
        expect_output("print false and missing;", "false\n");
        expect_output("print 1 or missing;", "1\n");
    }

    // ── variables, blocks, control flow ─────────────────────────────────

    #[test]
    fn test_block_scoping_and_shadowing() {
        expect_output("var a = 1; { var a = 2; print a; } print a;", "2\n1\n");
    }

    #[test]
    fn test_assignment_is_an_expression() {
        expect_output("var a = 1; print a = 2; print a;", "2\n2\n");
    }

    #[test]
    fn test_if_else() {
        expect_output("if (1 < 2) print \"yes\"; else print \"no\";", "yes\n");
        expect_output("if (nil) print \"yes\"; else print \"no\";", "no\n");
    }

    #[test]
    fn test_while_loop() {
        expect_output(
            "var i = 0; while (i < 3) { print i; i = i + 1; }",
            "0\n1\n2\n",
        );
    }

    #[test]
    fn test_for_loop() {
        expect_output("for (var i = 0; i < 3; i = i + 1) print i;", "0\n1\n2\n");
    }

    // ── functions, closures, returns ────────────────────────────────────

    #[test]
    fn test_function_call_and_return() {
        expect_output("fun add(a, b) { return a + b; } print add(1, 2);", "3\n");
    }

    #[test]
    fn test_missing_return_yields_nil() {
        expect_output("fun f() {} print f();", "nil\n");
        expect_output("fun g() { return; } print g();", "nil\n");
    }

    #[test]
    fn test_return_unwinds_nested_blocks() {
        expect_output(
            "fun f() { while (true) { if (true) { return \"out\"; } } } print f();",
            "out\n",
        );
    }

    #[test]
    fn test_closure_counter() {
        expect_output(
            "fun counter() { var i = 0; fun inc() { i = i + 1; print i; } return inc; } \
             var c = counter(); c(); c(); c();",
            "1\n2\n3\n",
        );
    }

    #[test]
    fn test_closures_share_captured_environment() {
        expect_output(
            "fun pair() { var n = 0; fun bump() { n = n + 1; } fun get() { return n; } \
             bump(); bump(); return get; } print pair()();",
            "2\n",
        );
    }

    #[test]
    fn test_static_scoping_ignores_later_shadow() {
        // The resolver pins `a` inside `show` to the global before the local
        // declaration exists.
        expect_output(
            "var a = \"global\"; { fun show() { print a; } show(); var a = \"local\"; show(); }",
            "global\nglobal\n",
        );
    }

    #[test]
    fn test_lambda_values() {
        expect_output("var f = fun (x) { return x + 1; }; print f(2);", "3\n");
        expect_output(
            "fun apply(f, v) { return f(v); } print apply(fun (n) { return n * n; }, 4);",
            "16\n",
        );
    }

    #[test]
    fn test_recursion() {
        expect_output(
            "fun fib(n) { if (n < 2) return n; return fib(n - 1) + fib(n - 2); } print fib(10);",
            "55\n",
        );
    }

    // ── classes ─────────────────────────────────────────────────────────

    #[test]
    fn test_fields_and_methods() {
        expect_output(
            "class C { m() { return 7; } } var c = C(); c.x = 1; print c.x; print c.m();",
            "1\n7\n",
        );
    }

    #[test]
    fn test_fields_shadow_methods() {
        expect_output(
            "class C { m() { return \"method\"; } } var c = C(); c.m = \"field\"; print c.m;",
            "field\n",
        );
    }

    #[test]
    fn test_initializer_binds_this() {
        expect_output("class C { init(x) { this.x = x; } } print C(7).x;", "7\n");
    }

    #[test]
    fn test_initializer_always_yields_instance() {
        // Bare `return;` in init, and direct re-invocation of init, both
        // produce the instance.
        expect_output(
            "class C { init() { this.x = 1; return; } } print C().x;",
            "1\n",
        );
        expect_output("class C { init() {} } var c = C(); print c.init();", "<C instance>\n");
    }

    #[test]
    fn test_method_binding_survives_extraction() {
        expect_output(
            "class C { init() { this.n = 3; } get() { return this.n; } } \
             var m = C().get; print m();",
            "3\n",
        );
    }

    #[test]
    fn test_this_in_callback() {
        expect_output(
            "class Thing { init() { this.label = \"box\"; } make() { fun show() { print this.label; } return show; } } \
             Thing().make()();",
            "box\n",
        );
    }

    #[test]
    fn test_inheritance_and_super() {
        expect_output(
            "class A { greet() { print \"hi\"; } } \
             class B < A { greet() { super.greet(); print \"bye\"; } } \
             B().greet();",
            "hi\nbye\n",
        );
    }

    #[test]
    fn test_inherited_method_lookup_walks_chain() {
        expect_output(
            "class A { m() { return 1; } } class B < A {} class C < B {} print C().m();",
            "1\n",
        );
    }

    #[test]
    fn test_super_skips_own_override() {
        expect_output(
            "class A { m() { return \"A\"; } } \
             class B < A { m() { return \"B\"; } test() { return super.m(); } } \
             class C < B {} print C().test();",
            "A\n",
        );
    }

    #[test]
    fn test_static_methods() {
        expect_output(
            "class Math { class square(n) { return n * n; } } print Math.square(3);",
            "9\n",
        );
    }

    #[test]
    fn test_static_methods_are_inherited() {
        expect_output(
            "class A { class make() { return 1; } } class B < A {} print B.make();",
            "1\n",
        );
    }

    // ── runtime errors ──────────────────────────────────────────────────

    #[test]
    fn test_divide_by_zero() {
        expect_runtime_error("print 1 / 0;", "Cannot divide by zero.");
    }

    #[test]
    fn test_operand_type_errors() {
        expect_runtime_error("print 1 + \"x\";", "Operands must be two numbers or two strings.");
        expect_runtime_error("print 1 < \"x\";", "Operands must be numbers.");
        expect_runtime_error("print -\"x\";", "must be a number.");
    }

    #[test]
    fn test_undefined_variable() {
        expect_runtime_error("print missing;", "Undefined variable 'missing'.");
        expect_runtime_error("missing = 1;", "Undefined variable 'missing'.");
    }

    #[test]
    fn test_call_errors() {
        expect_runtime_error("\"hi\"();", "Can only call functions and classes.");
        expect_runtime_error("fun f(a) {} f();", "Expected 1 arguments but got 0.");
        expect_runtime_error("fun f() {} f(1, 2);", "Expected 0 arguments but got 2.");
        expect_runtime_error(
            "class C { init(a) {} } C();",
            "Expected 1 arguments but got 0.",
        );
    }

    #[test]
    fn test_property_errors() {
        expect_runtime_error("print 3.x;", "Only instances have properties.");
        expect_runtime_error("var s = \"str\"; s.field = 1;", "Only instances have fields.");
        expect_runtime_error(
            "class C {} print C().missing;",
            "Undefined property 'missing'.",
        );
    }

    #[test]
    fn test_superclass_must_be_a_class() {
        expect_runtime_error("var NotAClass = 3; class C < NotAClass {}", "Superclass must be a class");
    }

    #[test]
    fn test_undefined_super_method() {
        expect_runtime_error(
            "class A {} class B < A { m() { super.missing(); } } B().m();",
            "Undefined property 'missing'.",
        );
    }

    #[test]
    fn test_runtime_error_reports_line() {
        let err = run("var a = 1;\nprint a + nil;").expect_err("should fail");

        assert!(err.to_string().contains("[line 2]"), "got {:?}", err.to_string());
    }

    #[test]
    fn test_output_before_error_is_kept_in_sink() {
        // The first statement prints; the second fails.
        let (tokens, _) = Scanner::new(b"print 1; print missing;").scan_tokens();
        let (statements, _) = Parser::new(tokens).parse();

        let sink = SharedBuf::default();
        let mut interpreter = Interpreter::with_output(Box::new(sink.clone()));

        Resolver::new(&mut interpreter).resolve(&statements).unwrap();

        assert!(interpreter.interpret(&statements).is_err());
        assert_eq!(String::from_utf8(sink.0.borrow().clone()).unwrap(), "1\n");
    }

    // ── native functions ────────────────────────────────────────────────

    #[test]
    fn test_clock_returns_a_number() {
        expect_output("print clock() >= 0;", "true\n");
        expect_runtime_error("clock(1);", "Expected 0 arguments but got 1.");
    }
}
