use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::ast::{Scope, VarRef};
use crate::error::{Error, Result};
use crate::value::Value;

/// An associative array, shared by reference with function parameters
pub type ArrayRef = Rc<RefCell<HashMap<String, Value>>>;

pub fn new_array() -> ArrayRef {
    Rc::new(RefCell::new(HashMap::new()))
}

/// Storage for one variable. A name's kind is fixed by its first use.
#[derive(Debug, Clone, Default)]
pub enum Slot {
    /// Not used yet; may still become a scalar or an array
    #[default]
    Untyped,
    Scalar(Value),
    Array(ArrayRef),
}

/// Global variables plus the stack of function-local frames
#[derive(Debug, Default)]
pub struct Scopes {
    globals: HashMap<String, Slot>,
    frames: Vec<Vec<Slot>>,
}

impl Scopes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_frame(&mut self, frame: Vec<Slot>) {
        self.frames.push(frame);
    }

    pub fn pop_frame(&mut self) -> Vec<Slot> {
        self.frames.pop().unwrap_or_default()
    }

    fn slot(&self, var: &VarRef) -> Option<&Slot> {
        match var.scope {
            Scope::Global => self.globals.get(&var.name),
            Scope::Local(index) => self.frames.last().and_then(|frame| frame.get(index)),
            Scope::Special(_) => None,
        }
    }

    fn slot_mut(&mut self, var: &VarRef) -> Result<&mut Slot> {
        match var.scope {
            Scope::Global => Ok(self.globals.entry(var.name.clone()).or_default()),
            Scope::Local(index) => self
                .frames
                .last_mut()
                .and_then(|frame| frame.get_mut(index))
                .ok_or_else(|| Error::runtime(format!("no local variable {}", var.name))),
            Scope::Special(_) => Err(Error::runtime(format!("{} is not an array", var.name))),
        }
    }

    /// Scalar value of a variable; untouched variables are uninitialized
    pub fn get(&self, var: &VarRef) -> Result<Value> {
        match self.slot(var) {
            None | Some(Slot::Untyped) => Ok(Value::Uninitialized),
            Some(Slot::Scalar(value)) => Ok(value.clone()),
            Some(Slot::Array(_)) => Err(Error::runtime(format!(
                "can't use array {} in scalar context",
                var.name
            ))),
        }
    }

    pub fn set(&mut self, var: &VarRef, value: Value) -> Result<()> {
        let slot = self.slot_mut(var)?;
        if let Slot::Array(_) = slot {
            return Err(Error::runtime(format!(
                "can't assign to {}; it's an array name",
                var.name
            )));
        }
        *slot = Slot::Scalar(value);
        Ok(())
    }

    /// The array behind a variable, creating it on first use
    pub fn array(&mut self, var: &VarRef) -> Result<ArrayRef> {
        let slot = self.slot_mut(var)?;
        match slot {
            Slot::Array(array) => Ok(Rc::clone(array)),
            Slot::Untyped => {
                let array = new_array();
                *slot = Slot::Array(Rc::clone(&array));
                Ok(array)
            }
            Slot::Scalar(_) => Err(Error::runtime(format!(
                "can't use scalar {} as array",
                var.name
            ))),
        }
    }

    /// The array behind a variable if it is one, without creating it
    pub fn existing_array(&self, var: &VarRef) -> Option<ArrayRef> {
        match self.slot(var) {
            Some(Slot::Array(array)) => Some(Rc::clone(array)),
            _ => None,
        }
    }

    /// Binding for a bare variable passed as a function argument:
    /// arrays by reference, scalars by value, untyped stay untyped
    pub fn argument(&self, var: &VarRef) -> Slot {
        self.slot(var).cloned().unwrap_or_default()
    }

    /// An untyped variable passed to a function that used it as an array
    /// becomes that same array
    pub fn adopt_array(&mut self, var: &VarRef, array: ArrayRef) -> Result<()> {
        let slot = self.slot_mut(var)?;
        if let Slot::Untyped = slot {
            *slot = Slot::Array(array);
        }
        Ok(())
    }

    /// Install a global array, replacing whatever was there
    pub fn set_global_array(&mut self, name: &str, array: HashMap<String, Value>) {
        self.globals
            .insert(name.to_string(), Slot::Array(Rc::new(RefCell::new(array))));
    }

    pub fn set_global(&mut self, name: &str, value: Value) {
        self.globals.insert(name.to_string(), Slot::Scalar(value));
    }
}
