use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use log::debug;

use crate::error::LoxError;
use crate::function::LoxFunction;
use crate::interpreter::{Interpreter, Interrupt};
use crate::token::Token;
use crate::value::Value;

/// Runtime class object: method tables plus an optional superclass link.
/// Instance methods are bound on lookup; static methods are served unbound.
#[derive(Debug)]
pub struct LoxClass {
    pub name: String,
    pub superclass: Option<Rc<LoxClass>>,
    methods: HashMap<String, LoxFunction>,
    static_methods: HashMap<String, LoxFunction>,
}

impl LoxClass {
    pub fn new(
        name: String,
        superclass: Option<Rc<LoxClass>>,
        methods: HashMap<String, LoxFunction>,
        static_methods: HashMap<String, LoxFunction>,
    ) -> Self {
        LoxClass {
            name,
            superclass,
            methods,
            static_methods,
        }
    }

    /// Instance-method lookup, walking the superclass chain.
    pub fn find_method(&self, name: &str) -> Option<LoxFunction> {
        if let Some(method) = self.methods.get(name) {
            return Some(method.clone());
        }

        if let Some(superclass) = &self.superclass {
            return superclass.find_method(name);
        }

        None
    }

    /// Static methods are inherited through ordinary property access, though
    /// never through `super`.
    pub fn find_static_method(&self, name: &str) -> Option<LoxFunction> {
        if let Some(method) = self.static_methods.get(name) {
            return Some(method.clone());
        }

        if let Some(superclass) = &self.superclass {
            return superclass.find_static_method(name);
        }

        None
    }

    /// A class's call arity is its initializer's, or zero without one.
    pub fn arity(&self) -> usize {
        match self.find_method("init") {
            Some(initializer) => initializer.arity(),

            None => 0,
        }
    }

    /// Constructs an instance: allocate, then run `init` bound to it if the
    /// class has one.  The initializer's result is discarded; the instance is
    /// always the value of the call.
    pub fn construct(
        class: &Rc<LoxClass>,
        interpreter: &mut Interpreter,
        arguments: Vec<Value>,
    ) -> Result<Value, Interrupt> {
        debug!("Constructing instance of {}", class.name);

        let instance: Rc<RefCell<LoxInstance>> =
            Rc::new(RefCell::new(LoxInstance::new(class.clone())));

        if let Some(initializer) = class.find_method("init") {
            initializer.bind(instance.clone()).call(interpreter, arguments)?;
        }

        Ok(Value::Instance(instance))
    }
}

/// An instance: a class link plus a mutable field map.  Fields are created on
/// first assignment; reads fall back to bound methods.
#[derive(Debug)]
pub struct LoxInstance {
    class: Rc<LoxClass>,
    fields: HashMap<String, Value>,
}

impl LoxInstance {
    pub fn new(class: Rc<LoxClass>) -> Self {
        LoxInstance {
            class,
            fields: HashMap::new(),
        }
    }

    pub fn class_name(&self) -> &str {
        &self.class.name
    }

    /// Property read: fields shadow methods.  `instance` is the same object
    /// `self` sits in; it is needed to bind a found method.
    pub fn get(&self, name: &Token, instance: &Rc<RefCell<LoxInstance>>) -> Result<Value, LoxError> {
        if let Some(value) = self.fields.get(&name.lexeme) {
            return Ok(value.clone());
        }

        if let Some(method) = self.class.find_method(&name.lexeme) {
            return Ok(Value::Function(method.bind(instance.clone())));
        }

        Err(LoxError::runtime(
            name.line,
            format!("Undefined property '{}'.", name.lexeme),
        ))
    }

    pub fn set(&mut self, name: &Token, value: Value) {
        self.fields.insert(name.lexeme.clone(), value);
    }
}
