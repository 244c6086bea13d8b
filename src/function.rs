use std::cell::RefCell;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use log::debug;

use crate::class::LoxInstance;
use crate::environment::Environment;
use crate::interpreter::{Interpreter, Interrupt};
use crate::stmt::FunctionDecl;
use crate::value::Value;

/// A user-defined function: shared declaration plus the environment that was
/// current at its definition site.  Binding a method produces a new
/// `LoxFunction` whose closure is a one-slot `this` environment wrapping the
/// original.
#[derive(Debug, Clone)]
pub struct LoxFunction {
    decl: Rc<FunctionDecl>,
    closure: Rc<RefCell<Environment>>,
    is_initializer: bool,
}

impl LoxFunction {
    pub fn new(
        decl: Rc<FunctionDecl>,
        closure: Rc<RefCell<Environment>>,
        is_initializer: bool,
    ) -> Self {
        LoxFunction {
            decl,
            closure,
            is_initializer,
        }
    }

    pub fn name(&self) -> &str {
        &self.decl.name.lexeme
    }

    pub fn arity(&self) -> usize {
        self.decl.params.len()
    }

    pub fn bind(&self, instance: Rc<RefCell<LoxInstance>>) -> LoxFunction {
        debug!("Binding method '{}' to instance", self.name());

        let mut environment: Environment = Environment::with_enclosing(self.closure.clone());
        environment.define("this", Value::Instance(instance));

        LoxFunction {
            decl: self.decl.clone(),
            closure: Rc::new(RefCell::new(environment)),
            is_initializer: self.is_initializer,
        }
    }

    /// Executes the body in a fresh environment enclosing the closure.  A
    /// `return` unwinds to exactly this frame; plain completion yields `nil`.
    /// Initializers always yield the bound `this`, whatever the body did.
    pub fn call(
        &self,
        interpreter: &mut Interpreter,
        arguments: Vec<Value>,
    ) -> Result<Value, Interrupt> {
        debug!("Calling <fn {}> with {} arg(s)", self.name(), arguments.len());

        let mut environment: Environment = Environment::with_enclosing(self.closure.clone());

        for (param, argument) in self.decl.params.iter().zip(arguments) {
            environment.define(&param.lexeme, argument);
        }

        let environment: Rc<RefCell<Environment>> = Rc::new(RefCell::new(environment));

        match interpreter.execute_block(&self.decl.body, environment) {
            Ok(()) => {}

            Err(Interrupt::Return(value)) => {
                if self.is_initializer {
                    return self.bound_this();
                }

                return Ok(value);
            }

            Err(interrupt) => return Err(interrupt),
        }

        if self.is_initializer {
            return self.bound_this();
        }

        Ok(Value::Nil)
    }

    fn bound_this(&self) -> Result<Value, Interrupt> {
        let this: Value = self
            .closure
            .borrow()
            .get_at(0, "this", self.decl.name.line)?;

        Ok(this)
    }
}

// Identity semantics: two function values are the same function only if they
// share both declaration and captured environment.
impl PartialEq for LoxFunction {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.decl, &other.decl) && Rc::ptr_eq(&self.closure, &other.closure)
    }
}

#[derive(Debug, Clone)]
pub struct NativeFunction {
    pub name: String,
    pub arity: usize,
    pub func: fn(&[Value]) -> Result<Value, String>,
}

impl PartialEq for NativeFunction {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.func == other.func
    }
}

/// Seconds since the Unix epoch, as a double.
pub fn clock_native(_args: &[Value]) -> Result<Value, String> {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| format!("Clock error: {}", e))?
        .as_secs_f64();

    Ok(Value::Number(timestamp))
}
