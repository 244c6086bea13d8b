mod resolver_tests {
    use rox::expr::Expr;
    use rox::interpreter::Interpreter;
    use rox::parser::Parser;
    use rox::resolver::Resolver;
    use rox::scanner::Scanner;
    use rox::stmt::Stmt;

    fn parse(source: &str) -> Vec<Stmt> {
        let (tokens, scan_errors) = Scanner::new(source.as_bytes()).scan_tokens();
        assert!(scan_errors.is_empty(), "scan errors in {:?}", source);

        let (statements, parse_errors) = Parser::new(tokens).parse();
        assert!(parse_errors.is_empty(), "parse errors: {:?}", parse_errors);

        statements
    }

    /// Resolves `source` against a fresh interpreter, returning the rendered
    /// error messages (empty when resolution succeeds).
    fn resolve_errors(source: &str) -> Vec<String> {
        let statements = parse(source);
        let mut interpreter = Interpreter::new();

        match Resolver::new(&mut interpreter).resolve(&statements) {
            Ok(()) => Vec::new(),
            Err(errors) => errors.iter().map(|e| e.to_string()).collect(),
        }
    }

    /// Resolves `source` and hands back the interpreter holding the depth
    /// side-table.
    fn resolve_into_interpreter(source: &str) -> (Vec<Stmt>, Interpreter) {
        let statements = parse(source);
        let mut interpreter = Interpreter::new();

        Resolver::new(&mut interpreter)
            .resolve(&statements)
            .expect("resolution should succeed");

        (statements, interpreter)
    }

    /// Collects `(name, id)` for every variable-referencing expression in
    /// the statements this suite uses.
    fn collect_var_ids(statements: &[Stmt], out: &mut Vec<(String, usize)>) {
        fn walk_expr(expr: &Expr, out: &mut Vec<(String, usize)>) {
            match expr {
                Expr::Variable { id, name } => out.push((name.lexeme.clone(), *id)),

                Expr::Assign { id, name, value } => {
                    out.push((name.lexeme.clone(), *id));
                    walk_expr(value, out);
                }

                Expr::This { id, .. } => out.push(("this".to_string(), *id)),

                Expr::Super { id, .. } => out.push(("super".to_string(), *id)),

                Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                    walk_expr(left, out);
                    walk_expr(right, out);
                }

                Expr::Unary { right, .. } => walk_expr(right, out),

                Expr::Grouping(inner) => walk_expr(inner, out),

                Expr::Call {
                    callee, arguments, ..
                } => {
                    walk_expr(callee, out);
                    for arg in arguments {
                        walk_expr(arg, out);
                    }
                }

                Expr::Get { object, .. } => walk_expr(object, out),

                Expr::Set { object, value, .. } => {
                    walk_expr(object, out);
                    walk_expr(value, out);
                }

                Expr::Function(decl) => collect_var_ids_inner(&decl.body, out),

                Expr::Literal(_) => {}
            }
        }

        fn collect_var_ids_inner(statements: &[Stmt], out: &mut Vec<(String, usize)>) {
            for stmt in statements {
                match stmt {
                    Stmt::Block(stmts) => collect_var_ids_inner(stmts, out),

                    Stmt::Expression(expr) | Stmt::Print(expr) => walk_expr(expr, out),

                    Stmt::Var {
                        initializer: Some(expr),
                        ..
                    } => walk_expr(expr, out),

                    Stmt::Var { .. } => {}

                    Stmt::Function(decl) => collect_var_ids_inner(&decl.body, out),

                    Stmt::Return {
                        value: Some(expr), ..
                    } => walk_expr(expr, out),

                    Stmt::Return { .. } => {}

                    Stmt::If {
                        condition,
                        then_branch,
                        else_branch,
                    } => {
                        walk_expr(condition, out);
                        collect_var_ids_inner(std::slice::from_ref(then_branch), out);
                        if let Some(eb) = else_branch {
                            collect_var_ids_inner(std::slice::from_ref(eb), out);
                        }
                    }

                    Stmt::While { condition, body } => {
                        walk_expr(condition, out);
                        collect_var_ids_inner(std::slice::from_ref(body), out);
                    }

                    Stmt::Class {
                        methods,
                        static_methods,
                        ..
                    } => {
                        for m in methods.iter().chain(static_methods.iter()) {
                            collect_var_ids_inner(&m.body, out);
                        }
                    }
                }
            }
        }

        collect_var_ids_inner(statements, out)
    }

    #[test]
    fn test_block_local_depth() {
        let (statements, interpreter) = resolve_into_interpreter("{ var a = 1; { print a; } }");

        let mut vars = Vec::new();
        collect_var_ids(&statements, &mut vars);

        assert_eq!(vars.len(), 1);
        let (name, id) = &vars[0];
        assert_eq!(name, "a");

        // One hop: from the inner block out to the one declaring `a`.
        assert_eq!(interpreter.depth_of(*id), Some(1));
    }

    #[test]
    fn test_same_scope_depth_zero() {
        let (statements, interpreter) = resolve_into_interpreter("{ var a = 1; print a; }");

        let mut vars = Vec::new();
        collect_var_ids(&statements, &mut vars);

        assert_eq!(interpreter.depth_of(vars[0].1), Some(0));
    }

    #[test]
    fn test_globals_are_not_recorded() {
        let (statements, interpreter) = resolve_into_interpreter("var a = 1; print a;");

        let mut vars = Vec::new();
        collect_var_ids(&statements, &mut vars);

        // Top-level `a` is a global: no side-table entry.
        assert_eq!(interpreter.depth_of(vars[0].1), None);
    }

    #[test]
    fn test_closure_capture_depth() {
        let source = "fun make() { var x = 1; fun get() { return x; } return get; }";
        let (statements, interpreter) = resolve_into_interpreter(source);

        let mut vars = Vec::new();
        collect_var_ids(&statements, &mut vars);

        let x_id = vars
            .iter()
            .find(|(name, _)| name == "x")
            .map(|(_, id)| *id)
            .expect("x reference");

        // `x` sits one function scope above `get`'s body.
        assert_eq!(interpreter.depth_of(x_id), Some(1));
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let source =
            "fun outer() { var a = 1; fun inner() { var b = a; return b; } return inner; }";
        let statements = parse(source);

        let mut first = Interpreter::new();
        Resolver::new(&mut first).resolve(&statements).unwrap();

        let mut second = Interpreter::new();
        Resolver::new(&mut second).resolve(&statements).unwrap();

        let mut vars = Vec::new();
        collect_var_ids(&statements, &mut vars);
        assert!(!vars.is_empty());

        for (name, id) in vars {
            assert_eq!(
                first.depth_of(id),
                second.depth_of(id),
                "depth mismatch for '{}'",
                name
            );
        }
    }

    #[test]
    fn test_read_in_own_initializer() {
        let errors = resolve_errors("{ var a = 1; { var a = a; } }");

        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("Cannot read local variable in its own initializer"));
    }

    #[test]
    fn test_duplicate_declaration_in_scope() {
        let errors = resolve_errors("{ var a = 1; var a = 2; }");

        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("Variable already declared in this scope"));
    }

    #[test]
    fn test_global_redeclaration_is_allowed() {
        assert!(resolve_errors("var a = 1; var a = 2;").is_empty());
    }

    #[test]
    fn test_return_outside_function() {
        let errors = resolve_errors("return 1;");

        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("'return' used outside of function"));
    }

    #[test]
    fn test_return_value_from_initializer() {
        let errors = resolve_errors("class C { init() { return 1; } }");

        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("Can't return a value from an initializer."));
    }

    #[test]
    fn test_bare_return_from_initializer_is_fine() {
        assert!(resolve_errors("class C { init() { return; } }").is_empty());
    }

    #[test]
    fn test_this_outside_class() {
        let errors = resolve_errors("print this;");

        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("Cannot use 'this' outside of a class"));
    }

    #[test]
    fn test_super_outside_class() {
        let errors = resolve_errors("fun f() { super.g(); }");

        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("Cannot use 'super' outside of a class."));
    }

    #[test]
    fn test_super_without_superclass() {
        let errors = resolve_errors("class C { m() { super.m(); } }");

        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("Cannot use 'super' in a class with no superclass."));
    }

    #[test]
    fn test_class_cannot_inherit_from_itself() {
        let errors = resolve_errors("class C < C { }");

        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("A class can't inherit from itself."));
    }

    #[test]
    fn test_errors_accumulate_in_one_pass() {
        let errors = resolve_errors("return 1; print this;");

        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_this_in_method_resolves() {
        assert!(resolve_errors("class C { m() { return this; } }").is_empty());
    }

    #[test]
    fn test_super_in_subclass_resolves() {
        assert!(resolve_errors("class A { m() {} } class B < A { m() { super.m(); } }").is_empty());
    }
}
