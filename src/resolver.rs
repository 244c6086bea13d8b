//! Static resolution pass for the Lox interpreter.
//!
//! This module performs a single AST walk to:
//! 1. **Build lexical scopes**: maintains a stack of `HashMap<String,bool>` tracking declared
//!    (false) and fully defined (true) names in each nested block or function.
//! 2. **Enforce static rules**: reports errors such as redeclaration in the same scope,
//!    reading a variable in its own initializer, invalid `return` outside functions,
//!    and illegal use of `this`/`super` outside of class methods.
//! 3. **Record binding distances**: for every variable occurrence (`Variable`, `Assign`,
//!    `This`, `Super`), calls back into the interpreter to note whether it is a local
//!    (and at what depth) or a global. This enables the runtime to perform O(1)
//!    lookups by climbing exactly the right number of environment frames.
//!
//! Errors are collected rather than thrown: one pass reports every static
//! error it can find, and the driver skips interpretation if any surfaced.
//!
//! # Usage
//!
//! After parsing, before interpretation, invoke:
//! ```ignore
//! let mut resolver = Resolver::new(&mut interpreter);
//! resolver.resolve(&statements)?;
//! ```
//! This ensures all variables, functions, and classes are properly bound, and enables fast
//! environment lookups during execution.

use std::collections::HashMap;
use std::rc::Rc;

use log::{debug, info};

use crate::error::LoxError;
use crate::expr::Expr;
use crate::interpreter::Interpreter;
use crate::stmt::{FunctionDecl, Stmt};
use crate::token::Token;

/// What kind of function body are we inside?  Used to validate `return`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum FunctionType {
    None,
    Function,
    Method,
    Initializer,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum ClassType {
    /// Not inside any class
    None,

    /// Inside a class declaration _without_ a superclass
    Class,

    /// Inside a class declaration _with_ a superclass
    Subclass,
}

/// Resolver: tracks scopes, enforces static rules, and *records* binding
/// distances (locals vs. globals) by calling back into the interpreter.
pub struct Resolver<'interp> {
    interpreter: &'interp mut Interpreter,
    scopes: Vec<HashMap<String, bool>>, // false=declared, true=defined
    errors: Vec<LoxError>,
    current_function: FunctionType,
    current_class: ClassType,
}

impl<'interp> Resolver<'interp> {
    /// Create a new resolver bound to the given interpreter.
    pub fn new(interpreter: &'interp mut Interpreter) -> Self {
        info!("Resolver instantiated");
        Resolver {
            interpreter,
            scopes: Vec::new(),
            errors: Vec::new(),
            current_function: FunctionType::None,
            current_class: ClassType::None,
        }
    }

    /// Walk all top‑level statements, accumulating every static error.
    pub fn resolve(&mut self, statements: &[Stmt]) -> Result<(), Vec<LoxError>> {
        info!(
            "Beginning resolve pass over {} statement(s)",
            statements.len()
        );

        for stmt in statements {
            self.resolve_stmt(stmt);
        }

        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(std::mem::take(&mut self.errors))
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Statement resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_stmt(&mut self, stmt: &Stmt) {
        debug!("Resolving stmt: {:?}", stmt);

        match stmt {
            Stmt::Class {
                name,
                superclass,
                methods,
                static_methods,
            } => self.resolve_class(name, superclass.as_ref(), methods, static_methods),

            Stmt::Block(statements) => {
                // 1. Push a new anonymous scope for `{ … }`
                self.begin_scope();

                for s in statements {
                    self.resolve_stmt(s);
                }

                // 2. Pop the block scope
                self.end_scope();
            }

            Stmt::Var { name, initializer } => {
                // 1. Declare the variable name (marked but not yet defined)
                self.declare(name);

                // 2. Resolve the initializer expression, if any
                if let Some(expr) = initializer {
                    self.resolve_expr(expr);
                }

                // 3. Define the variable so it's available in this scope
                self.define(name);
            }

            Stmt::Function(decl) => {
                // 1. Declare the function name (so it's visible inside its own body)
                self.declare(&decl.name);

                // 2. Define it immediately (allow recursion)
                self.define(&decl.name);

                // 3. Resolve parameters and body under a normal function context
                self.resolve_function(FunctionType::Function, decl);
            }

            Stmt::Expression(expr) | Stmt::Print(expr) => {
                self.resolve_expr(expr);
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(condition);
                self.resolve_stmt(then_branch);

                if let Some(eb) = else_branch.as_deref() {
                    self.resolve_stmt(eb);
                }
            }

            Stmt::While { condition, body } => {
                self.resolve_expr(condition);
                self.resolve_stmt(body);
            }

            Stmt::Return { keyword, value } => {
                // 1. Ensure we're inside a function or initializer
                if self.current_function == FunctionType::None {
                    self.error(keyword, "'return' used outside of function");
                }

                if let Some(expr) = value {
                    // 2. In an initializer, only bare `return;` is allowed
                    if self.current_function == FunctionType::Initializer {
                        self.error(keyword, "Can't return a value from an initializer.");
                    }

                    self.resolve_expr(expr);
                }
            }
        }
    }

    fn resolve_class(
        &mut self,
        name: &Token,
        superclass: Option<&Expr>,
        methods: &[Rc<FunctionDecl>],
        static_methods: &[Rc<FunctionDecl>],
    ) {
        // 1. Save and enter the class context
        let enclosing_class: ClassType = self.current_class;

        self.current_class = if superclass.is_some() {
            ClassType::Subclass
        } else {
            ClassType::Class
        };

        // 2. Declare & define the class name so methods can refer to it
        self.declare(name);
        self.define(name);

        // 3. Self‑inheritance guard, then resolve the superclass reference
        if let Some(super_expr) = superclass {
            if let Expr::Variable {
                name: super_name, ..
            } = super_expr
            {
                if super_name.lexeme == name.lexeme {
                    self.error(super_name, "A class can't inherit from itself.");
                }
            }

            self.resolve_expr(super_expr);
        }

        // 4. Static methods have neither `this` nor `super`: resolve them
        //    before those scopes open
        for static_method in static_methods {
            self.resolve_function(FunctionType::Function, static_method);
        }

        // 5. If there is a superclass, open a scope binding `super`
        if superclass.is_some() {
            self.begin_scope();
            self.scope_insert("super");
        }

        // 6. Open the implicit `this` scope for methods
        self.begin_scope();
        self.scope_insert("this");

        // 7. Resolve each method in its own function context
        for method in methods {
            let kind: FunctionType = if method.name.lexeme == "init" {
                FunctionType::Initializer
            } else {
                FunctionType::Method
            };

            self.resolve_function(kind, method);
        }

        // 8. Close the `this` scope
        self.end_scope();

        // 9. If we opened a `super` scope, close it now
        if superclass.is_some() {
            self.end_scope();
        }

        // 10. Restore the outer class context
        self.current_class = enclosing_class;
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Expression resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Literal(_) => {
                // Literals have no sub‑expressions
            }

            Expr::Grouping(inner) => {
                self.resolve_expr(inner);
            }

            Expr::Unary { right, .. } => {
                self.resolve_expr(right);
            }

            Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                self.resolve_expr(left);
                self.resolve_expr(right);
            }

            Expr::Variable { id, name } => {
                // 1. Prevent reading a variable in its own initializer
                if let Some(scope) = self.scopes.last() {
                    if scope.get(&name.lexeme) == Some(&false) {
                        self.error(name, "Cannot read local variable in its own initializer");
                    }
                }

                // 2. Bind this variable occurrence at its lexical depth
                self.resolve_local(*id, name);
            }

            Expr::Assign { id, name, value } => {
                // Resolve the right‑hand side first, then bind the assignment
                self.resolve_expr(value);
                self.resolve_local(*id, name);
            }

            Expr::Call {
                callee, arguments, ..
            } => {
                self.resolve_expr(callee);

                for arg in arguments {
                    self.resolve_expr(arg);
                }
            }

            Expr::Function(decl) => {
                // Anonymous functions resolve like named ones, minus the
                // enclosing-scope name binding
                self.resolve_function(FunctionType::Function, decl);
            }

            Expr::This { id, keyword } => {
                // 'this' only valid inside class methods
                if self.current_class == ClassType::None {
                    self.error(keyword, "Cannot use 'this' outside of a class");
                    return;
                }

                self.resolve_local(*id, keyword);
            }

            Expr::Get { object, .. } => {
                // Property names are looked up dynamically; only the object
                // expression resolves statically
                self.resolve_expr(object);
            }

            Expr::Set { object, value, .. } => {
                self.resolve_expr(value);
                self.resolve_expr(object);
            }

            Expr::Super { id, keyword, .. } => {
                // 1. Disallow outside any class
                if self.current_class == ClassType::None {
                    self.error(keyword, "Cannot use 'super' outside of a class.");
                    return;
                }

                // 2. Disallow in a class with no superclass
                if self.current_class != ClassType::Subclass {
                    self.error(keyword, "Cannot use 'super' in a class with no superclass.");
                    return;
                }

                // 3. Valid. Bind 'super' like a local variable.
                self.resolve_local(*id, keyword);
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Function helper
    // ─────────────────────────────────────────────────────────────────────────

    /// Enter a fresh scope for a function's parameters + body.
    ///
    /// `kind` distinguishes plain functions, methods and initializers.
    fn resolve_function(&mut self, kind: FunctionType, decl: &FunctionDecl) {
        // 1. Save the enclosing function context so we can restore it later.
        let enclosing: FunctionType = self.current_function;

        self.current_function = kind;

        // 2. Begin a new lexical scope for the function parameters & body.
        self.begin_scope();

        // 3. Declare and immediately define each parameter in this new scope.
        for param in &decl.params {
            self.declare(param);
            self.define(param);
        }

        // 4. Resolve each statement in the function body under the current context.
        for stmt in &decl.body {
            self.resolve_stmt(stmt);
        }

        // 5. End the function's parameter/body scope.
        self.end_scope();

        // 6. Restore the previous function context.
        self.current_function = enclosing;
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Scope management
    // ─────────────────────────────────────────────────────────────────────────

    #[inline]
    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    #[inline]
    fn end_scope(&mut self) {
        self.scopes.pop();
    }

    fn scope_insert(&mut self, name: &str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), true);
        }
    }

    fn declare(&mut self, name: &Token) {
        // 1. If in a local scope, ensure no duplicate declarations
        let duplicate: bool = self
            .scopes
            .last()
            .is_some_and(|scope| scope.contains_key(&name.lexeme));

        if duplicate {
            self.error(name, "Variable already declared in this scope");
            return;
        }

        // 2. Mark the name as declared but not yet defined
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.lexeme.clone(), false);
        }
    }

    fn define(&mut self, name: &Token) {
        // Mark the name as fully defined in the current scope
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.lexeme.clone(), true);
        }
    }

    fn error<S: Into<String>>(&mut self, token: &Token, msg: S) {
        self.errors.push(LoxError::resolve(token, msg));
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Binding‑distance helper
    // ─────────────────────────────────────────────────────────────────────────

    /// Record this variable occurrence as either:
    ///  - a local at depth `d`, or
    ///  - a global if not found in any scope.
    fn resolve_local(&mut self, id: usize, name: &Token) {
        // 1. Search each scope from innermost outward
        for (depth, scope) in self.scopes.iter().rev().enumerate() {
            if scope.contains_key(&name.lexeme) {
                debug!("Resolved '{}' at depth {}", name.lexeme, depth);

                // 2. Tell the interpreter about the local binding
                self.interpreter.note_local(id, depth);
                return;
            }
        }

        // 3. Not found in any scope → it's a global
        debug!("Resolved '{}' as global", name.lexeme);
    }
}
