use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::value::Value;

use super::error::RuntimeError;

/// One scope record in the chain. Children are created per loop
/// iteration and per macro call and never outlive the render.
#[derive(Debug, Default)]
pub struct Environment {
    variables: RefCell<HashMap<String, Value>>,
    parent: Option<Rc<Environment>>,
}

impl Environment {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn child(parent: &Rc<Environment>) -> Rc<Self> {
        Rc::new(Self {
            variables: RefCell::new(HashMap::new()),
            parent: Some(Rc::clone(parent)),
        })
    }

    /// Introduces a new binding in this exact scope. Used for the initial
    /// context and engine globals; redeclaring a name is an error.
    pub fn declare(&self, name: impl Into<String>, value: Value) -> Result<(), RuntimeError> {
        let name = name.into();
        let mut variables = self.variables.borrow_mut();
        if variables.contains_key(&name) {
            return Err(RuntimeError::redeclared(name));
        }
        variables.insert(name, value);
        Ok(())
    }

    /// `{% set %}` semantics: overwrite the nearest existing binding up
    /// the chain, or create one here if the name is new everywhere.
    pub fn assign(&self, name: &str, value: Value) {
        if !self.update(name, &value) {
            self.variables
                .borrow_mut()
                .insert(name.to_string(), value);
        }
    }

    fn update(&self, name: &str, value: &Value) -> bool {
        let mut variables = self.variables.borrow_mut();
        if variables.contains_key(name) {
            variables.insert(name.to_string(), value.clone());
            return true;
        }
        drop(variables);
        match &self.parent {
            Some(parent) => parent.update(name, value),
            None => false,
        }
    }

    /// Binds in this scope unconditionally, shadowing any outer binding.
    /// Used for loop variables and macro parameters.
    pub fn bind(&self, name: impl Into<String>, value: Value) {
        self.variables.borrow_mut().insert(name.into(), value);
    }

    pub fn lookup(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.variables.borrow().get(name) {
            return Some(value.clone());
        }
        self.parent.as_ref().and_then(|parent| parent.lookup(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.variables.borrow().contains_key(name)
            || self
                .parent
                .as_ref()
                .is_some_and(|parent| parent.contains(name))
    }
}
