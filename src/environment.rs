use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use log::debug;

use crate::error::{LoxError, Result};
use crate::value::Value;

/// One lexical scope: a name→value map plus an optional link to the
/// enclosing scope.  Scopes are shared (`Rc<RefCell<_>>`) because closures
/// capture their defining environment by reference and keep it alive.
#[derive(Debug)]
pub struct Environment {
    values: HashMap<String, Value>,
    enclosing: Option<Rc<RefCell<Environment>>>,
}

impl Environment {
    pub fn new() -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: None,
        }
    }

    pub fn with_enclosing(enclosing: Rc<RefCell<Environment>>) -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        }
    }

    /// Unconditional insert.  No redeclaration check: top-level Lox allows
    /// `var a = 1; var a = 2;`.
    pub fn define(&mut self, name: &str, value: Value) {
        debug!("Defining '{}'", name);
        self.values.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str, line: usize) -> Result<Value> {
        if let Some(value) = self.values.get(name) {
            Ok(value.clone())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow().get(name, line)
        } else {
            Err(LoxError::runtime(
                line,
                format!("Undefined variable '{}'.", name),
            ))
        }
    }

    pub fn assign(&mut self, name: &str, value: Value, line: usize) -> Result<()> {
        if self.values.contains_key(name) {
            self.values.insert(name.to_string(), value);
            Ok(())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow_mut().assign(name, value, line)
        } else {
            Err(LoxError::runtime(
                line,
                format!("Undefined variable '{}'.", name),
            ))
        }
    }

    /// Reads `name` exactly `distance` links up the chain.  The resolver
    /// guarantees the binding exists there; a miss still surfaces as a
    /// runtime error rather than a panic.
    pub fn get_at(&self, distance: usize, name: &str, line: usize) -> Result<Value> {
        if distance == 0 {
            return match self.values.get(name) {
                Some(value) => Ok(value.clone()),

                None => Err(LoxError::runtime(
                    line,
                    format!("Undefined variable '{}'.", name),
                )),
            };
        }

        match &self.enclosing {
            Some(enclosing) => enclosing.borrow().get_at(distance - 1, name, line),

            None => Err(LoxError::runtime(
                line,
                format!("Undefined variable '{}'.", name),
            )),
        }
    }

    /// Writes `name` exactly `distance` links up the chain.
    pub fn assign_at(&mut self, distance: usize, name: &str, value: Value, line: usize) -> Result<()> {
        if distance == 0 {
            self.values.insert(name.to_string(), value);
            return Ok(());
        }

        match &self.enclosing {
            Some(enclosing) => enclosing.borrow_mut().assign_at(distance - 1, name, value, line),

            None => Err(LoxError::runtime(
                line,
                format!("Undefined variable '{}'.", name),
            )),
        }
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}
