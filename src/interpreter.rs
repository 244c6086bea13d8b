use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{self, Write};
use std::rc::Rc;

use log::{debug, info};

use crate::class::{LoxClass, LoxInstance};
use crate::environment::Environment;
use crate::error::LoxError;
use crate::expr::{Expr, ExprId, LiteralValue};
use crate::function::{clock_native, LoxFunction, NativeFunction};
use crate::stmt::{FunctionDecl, Stmt};
use crate::token::{Token, TokenType};
use crate::value::Value;

/// Non-local transfer out of the tree walk.  `Return` is control flow, not a
/// failure: it rides the `Err` channel so `?` propagates it through nested
/// statements, and only a function-call boundary catches it.
#[derive(Debug)]
pub enum Interrupt {
    Error(LoxError),
    Return(Value),
}

impl From<LoxError> for Interrupt {
    fn from(e: LoxError) -> Self {
        Interrupt::Error(e)
    }
}

type Evaluation = Result<Value, Interrupt>;
type Execution = Result<(), Interrupt>;

pub struct Interpreter {
    pub globals: Rc<RefCell<Environment>>,
    environment: Rc<RefCell<Environment>>,
    // Resolution side-table: expression id → scope hops to the binding.
    locals: HashMap<ExprId, usize>,
    output: Box<dyn Write>,
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_output(Box::new(io::stdout()))
    }

    /// The `print` sink is injected so tests can capture program output.
    pub fn with_output(output: Box<dyn Write>) -> Self {
        let globals: Rc<RefCell<Environment>> = Rc::new(RefCell::new(Environment::new()));

        globals.borrow_mut().define(
            "clock",
            Value::NativeFunction(NativeFunction {
                name: "clock".to_string(),
                arity: 0,
                func: clock_native,
            }),
        );

        Interpreter {
            environment: globals.clone(),
            globals,
            locals: HashMap::new(),
            output,
        }
    }

    /// Resolver callback: record the scope distance for a variable use.
    pub fn note_local(&mut self, id: ExprId, depth: usize) {
        debug!("Noting local: expr #{} at depth {}", id, depth);
        self.locals.insert(id, depth);
    }

    pub fn depth_of(&self, id: ExprId) -> Option<usize> {
        self.locals.get(&id).copied()
    }

    /// Top-level entry: executes statements until one fails.  A `Return`
    /// escaping to here would mean the resolver let a top-level `return`
    /// through; it is dropped rather than treated as a failure.
    pub fn interpret(&mut self, statements: &[Stmt]) -> Result<(), LoxError> {
        info!("Interpreting {} statement(s)", statements.len());

        for statement in statements {
            match self.execute(statement) {
                Ok(()) => {}

                Err(Interrupt::Error(e)) => return Err(e),

                Err(Interrupt::Return(_)) => return Ok(()),
            }
        }

        Ok(())
    }

    fn execute(&mut self, stmt: &Stmt) -> Execution {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;

                Ok(())
            }

            Stmt::Print(expr) => {
                let value: Value = self.evaluate(expr)?;

                writeln!(self.output, "{}", value).map_err(LoxError::from)?;

                Ok(())
            }

            Stmt::Var { name, initializer } => {
                let value: Value = if let Some(expr) = initializer {
                    self.evaluate(expr)?
                } else {
                    Value::Nil
                };

                self.environment.borrow_mut().define(&name.lexeme, value);

                Ok(())
            }

            Stmt::Block(statements) => {
                let environment: Environment =
                    Environment::with_enclosing(self.environment.clone());

                self.execute_block(statements, Rc::new(RefCell::new(environment)))
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)?;
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch)?;
                }

                Ok(())
            }

            Stmt::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    self.execute(body)?;
                }

                Ok(())
            }

            Stmt::Function(decl) => {
                let function: LoxFunction =
                    LoxFunction::new(decl.clone(), self.environment.clone(), false);

                self.environment
                    .borrow_mut()
                    .define(&decl.name.lexeme, Value::Function(function));

                Ok(())
            }

            Stmt::Return { value, .. } => {
                let value: Value = match value {
                    Some(expr) => self.evaluate(expr)?,

                    None => Value::Nil,
                };

                Err(Interrupt::Return(value))
            }

            Stmt::Class {
                name,
                superclass,
                methods,
                static_methods,
            } => self.execute_class(name, superclass.as_ref(), methods, static_methods),
        }
    }

    /// Runs `statements` with `environment` as the current scope.  The
    /// previous scope is restored on every exit path: normal completion,
    /// runtime error, and return unwinding.
    pub fn execute_block(
        &mut self,
        statements: &[Stmt],
        environment: Rc<RefCell<Environment>>,
    ) -> Execution {
        let previous: Rc<RefCell<Environment>> = self.environment.clone();

        self.environment = environment;

        for stmt in statements {
            match self.execute(stmt) {
                Ok(()) => {}

                Err(interrupt) => {
                    self.environment = previous;
                    return Err(interrupt);
                }
            }
        }

        self.environment = previous;

        Ok(())
    }

    /// Two-stage class definition: the name is declared first (as nil) so
    /// methods can refer to the class, then the finished class object is
    /// assigned over it.  Methods capture an environment that has `super`
    /// bound when the class has a superclass.
    fn execute_class(
        &mut self,
        name: &Token,
        superclass: Option<&Expr>,
        methods: &[Rc<FunctionDecl>],
        static_methods: &[Rc<FunctionDecl>],
    ) -> Execution {
        debug!("Executing class declaration '{}'", name.lexeme);

        let superclass_value: Option<Rc<LoxClass>> = match superclass {
            Some(expr) => match self.evaluate(expr)? {
                Value::Class(class) => Some(class),

                _ => {
                    let line: usize = match expr {
                        Expr::Variable { name, .. } => name.line,

                        _ => name.line,
                    };

                    return Err(LoxError::runtime(line, "Superclass must be a class").into());
                }
            },

            None => None,
        };

        self.environment
            .borrow_mut()
            .define(&name.lexeme, Value::Nil);

        // Methods close over an environment where `super` is in scope.
        let enclosing: Option<Rc<RefCell<Environment>>> = superclass_value.as_ref().map(|class| {
            let previous: Rc<RefCell<Environment>> = self.environment.clone();

            let mut super_env: Environment = Environment::with_enclosing(previous.clone());
            super_env.define("super", Value::Class(class.clone()));

            self.environment = Rc::new(RefCell::new(super_env));

            previous
        });

        let mut method_table: HashMap<String, LoxFunction> = HashMap::new();

        for method in methods {
            let is_initializer: bool = method.name.lexeme == "init";

            let function: LoxFunction =
                LoxFunction::new(method.clone(), self.environment.clone(), is_initializer);

            method_table.insert(method.name.lexeme.clone(), function);
        }

        // Static methods close over a fresh environment: no `this`, no
        // `super`; unresolved names inside them fall through to globals.
        let mut static_table: HashMap<String, LoxFunction> = HashMap::new();

        for static_method in static_methods {
            let function: LoxFunction = LoxFunction::new(
                static_method.clone(),
                Rc::new(RefCell::new(Environment::new())),
                false,
            );

            static_table.insert(static_method.name.lexeme.clone(), function);
        }

        let class: Rc<LoxClass> = Rc::new(LoxClass::new(
            name.lexeme.clone(),
            superclass_value,
            method_table,
            static_table,
        ));

        if let Some(previous) = enclosing {
            self.environment = previous;
        }

        self.environment
            .borrow_mut()
            .assign(&name.lexeme, Value::Class(class), name.line)?;

        Ok(())
    }

    pub fn evaluate(&mut self, expr: &Expr) -> Evaluation {
        match expr {
            Expr::Literal(literal) => Ok(self.evaluate_literal(literal)),

            Expr::Grouping(inner) => self.evaluate(inner),

            Expr::Unary { operator, right } => self.evaluate_unary(operator, right),

            Expr::Binary {
                left,
                operator,
                right,
            } => self.evaluate_binary(left, operator, right),

            Expr::Logical {
                left,
                operator,
                right,
            } => self.evaluate_logical(left, operator, right),

            Expr::Variable { id, name } => Ok(self.look_up_variable(*id, name)?),

            Expr::Assign { id, name, value } => {
                let value: Value = self.evaluate(value)?;

                match self.locals.get(id) {
                    Some(distance) => self.environment.borrow_mut().assign_at(
                        *distance,
                        &name.lexeme,
                        value.clone(),
                        name.line,
                    )?,

                    None => self
                        .globals
                        .borrow_mut()
                        .assign(&name.lexeme, value.clone(), name.line)?,
                }

                Ok(value)
            }

            Expr::Call {
                callee,
                paren,
                arguments,
            } => self.evaluate_call(callee, paren, arguments),

            Expr::Function(decl) => {
                let function: LoxFunction =
                    LoxFunction::new(decl.clone(), self.environment.clone(), false);

                Ok(Value::Function(function))
            }

            Expr::Get { object, name } => self.evaluate_get(object, name),

            Expr::Set {
                object,
                name,
                value,
            } => self.evaluate_set(object, name, value),

            Expr::This { id, keyword } => Ok(self.look_up_variable(*id, keyword)?),

            Expr::Super {
                id,
                keyword,
                method,
            } => self.evaluate_super(*id, keyword, method),
        }
    }

    fn evaluate_literal(&self, literal: &LiteralValue) -> Value {
        match literal {
            LiteralValue::Number(n) => Value::Number(*n),

            LiteralValue::Str(s) => Value::String(s.clone()),

            LiteralValue::True => Value::Bool(true),

            LiteralValue::False => Value::Bool(false),

            LiteralValue::Nil => Value::Nil,
        }
    }

    fn evaluate_unary(&mut self, operator: &Token, right: &Expr) -> Evaluation {
        let value: Value = self.evaluate(right)?;

        match operator.token_type {
            TokenType::MINUS => match value {
                Value::Number(n) => Ok(Value::Number(-n)),

                _ => Err(LoxError::runtime(
                    operator.line,
                    "Operand to unary expression must be a number.",
                )
                .into()),
            },

            TokenType::BANG => Ok(Value::Bool(!value.is_truthy())),

            _ => Err(LoxError::runtime(operator.line, "Invalid unary operator.").into()),
        }
    }

    fn evaluate_binary(&mut self, left: &Expr, operator: &Token, right: &Expr) -> Evaluation {
        let left_val: Value = self.evaluate(left)?;
        let right_val: Value = self.evaluate(right)?;

        match operator.token_type {
            TokenType::PLUS => match (left_val, right_val) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),

                (Value::String(a), Value::String(b)) => Ok(Value::String(a + &b)),

                _ => Err(LoxError::runtime(
                    operator.line,
                    "Operands must be two numbers or two strings.",
                )
                .into()),
            },

            TokenType::MINUS => match (left_val, right_val) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a - b)),

                _ => Err(LoxError::runtime(operator.line, "Operands must be numbers.").into()),
            },

            TokenType::STAR => match (left_val, right_val) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a * b)),

                _ => Err(LoxError::runtime(operator.line, "Operands must be numbers.").into()),
            },

            TokenType::SLASH => match (left_val, right_val) {
                (Value::Number(a), Value::Number(b)) => {
                    if b == 0.0 {
                        Err(LoxError::runtime(operator.line, "Cannot divide by zero.").into())
                    } else {
                        Ok(Value::Number(a / b))
                    }
                }

                _ => Err(LoxError::runtime(operator.line, "Operands must be numbers.").into()),
            },

            TokenType::EQUAL_EQUAL => Ok(Value::Bool(left_val == right_val)),

            TokenType::BANG_EQUAL => Ok(Value::Bool(left_val != right_val)),

            TokenType::LESS => match (left_val, right_val) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Bool(a < b)),

                _ => Err(LoxError::runtime(operator.line, "Operands must be numbers.").into()),
            },

            TokenType::LESS_EQUAL => match (left_val, right_val) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Bool(a <= b)),

                _ => Err(LoxError::runtime(operator.line, "Operands must be numbers.").into()),
            },

            TokenType::GREATER => match (left_val, right_val) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Bool(a > b)),

                _ => Err(LoxError::runtime(operator.line, "Operands must be numbers.").into()),
            },

            TokenType::GREATER_EQUAL => match (left_val, right_val) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Bool(a >= b)),

                _ => Err(LoxError::runtime(operator.line, "Operands must be numbers.").into()),
            },

            _ => Err(LoxError::runtime(operator.line, "Invalid binary operator.").into()),
        }
    }

    /// Short-circuit evaluation yielding one of the operands, never a
    /// coerced boolean.
    fn evaluate_logical(&mut self, left: &Expr, operator: &Token, right: &Expr) -> Evaluation {
        let left_val: Value = self.evaluate(left)?;

        if operator.token_type == TokenType::OR {
            if left_val.is_truthy() {
                return Ok(left_val);
            }
        } else if !left_val.is_truthy() {
            return Ok(left_val);
        }

        self.evaluate(right)
    }

    fn evaluate_call(&mut self, callee: &Expr, paren: &Token, arguments: &[Expr]) -> Evaluation {
        let callee_val: Value = self.evaluate(callee)?;

        let mut arg_values: Vec<Value> = Vec::with_capacity(arguments.len());

        for argument in arguments {
            arg_values.push(self.evaluate(argument)?);
        }

        match callee_val {
            Value::NativeFunction(native) => {
                self.check_arity(native.arity, arg_values.len(), paren)?;

                (native.func)(&arg_values)
                    .map_err(|msg| LoxError::runtime(paren.line, msg).into())
            }

            Value::Function(function) => {
                self.check_arity(function.arity(), arg_values.len(), paren)?;

                function.call(self, arg_values)
            }

            Value::Class(class) => {
                self.check_arity(class.arity(), arg_values.len(), paren)?;

                LoxClass::construct(&class, self, arg_values)
            }

            _ => Err(LoxError::runtime(paren.line, "Can only call functions and classes.").into()),
        }
    }

    fn check_arity(&self, expected: usize, got: usize, paren: &Token) -> Result<(), Interrupt> {
        if expected != got {
            return Err(LoxError::runtime(
                paren.line,
                format!("Expected {} arguments but got {}.", expected, got),
            )
            .into());
        }

        Ok(())
    }

    fn evaluate_get(&mut self, object: &Expr, name: &Token) -> Evaluation {
        let object_val: Value = self.evaluate(object)?;

        match object_val {
            Value::Instance(instance) => {
                let value: Value = instance.borrow().get(name, &instance)?;

                Ok(value)
            }

            // Static method access through the superclass chain; a missing
            // name reads as nil.
            Value::Class(class) => Ok(class
                .find_static_method(&name.lexeme)
                .map(Value::Function)
                .unwrap_or(Value::Nil)),

            _ => Err(LoxError::runtime(name.line, "Only instances have properties.").into()),
        }
    }

    fn evaluate_set(&mut self, object: &Expr, name: &Token, value: &Expr) -> Evaluation {
        let object_val: Value = self.evaluate(object)?;

        let instance: Rc<RefCell<LoxInstance>> = match object_val {
            Value::Instance(instance) => instance,

            _ => {
                return Err(LoxError::runtime(name.line, "Only instances have fields.").into());
            }
        };

        let value: Value = self.evaluate(value)?;

        instance.borrow_mut().set(name, value.clone());

        Ok(value)
    }

    /// `super` sits in its own environment one link outside the one holding
    /// `this`, so the receiver is found at `distance - 1`.
    fn evaluate_super(&mut self, id: ExprId, keyword: &Token, method: &Token) -> Evaluation {
        let distance: usize = match self.locals.get(&id) {
            Some(distance) => *distance,

            None => {
                return Err(
                    LoxError::runtime(keyword.line, "Cannot use 'super' here.").into(),
                );
            }
        };

        let superclass: Rc<LoxClass> =
            match self
                .environment
                .borrow()
                .get_at(distance, "super", keyword.line)?
            {
                Value::Class(class) => class,

                _ => {
                    return Err(
                        LoxError::runtime(keyword.line, "Superclass must be a class").into(),
                    );
                }
            };

        let object: Rc<RefCell<LoxInstance>> =
            match self
                .environment
                .borrow()
                .get_at(distance - 1, "this", keyword.line)?
            {
                Value::Instance(instance) => instance,

                _ => {
                    return Err(LoxError::runtime(
                        keyword.line,
                        "Cannot use 'super' outside of a method.",
                    )
                    .into());
                }
            };

        match superclass.find_method(&method.lexeme) {
            Some(found) => Ok(Value::Function(found.bind(object))),

            None => Err(LoxError::runtime(
                method.line,
                format!("Undefined property '{}'.", method.lexeme),
            )
            .into()),
        }
    }

    fn look_up_variable(&self, id: ExprId, name: &Token) -> Result<Value, LoxError> {
        match self.locals.get(&id) {
            Some(distance) => self
                .environment
                .borrow()
                .get_at(*distance, &name.lexeme, name.line),

            None => self.globals.borrow().get(&name.lexeme, name.line),
        }
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}
