use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::runtime::object::ObjRef;

pub type ScopeRef = Rc<RefCell<Scope>>;

/// A lexical environment: name bindings plus an optional parent.
///
/// Scope chains terminate at the global scope. Block calls create a fresh
/// scope parented on the block's closure; dynamic objects carry an object
/// scope parented on their prototype's object scope.
#[derive(Debug)]
pub struct Scope {
    vars: HashMap<String, ObjRef>,
    parent: Option<ScopeRef>,
}

impl Scope {
    pub fn root() -> ScopeRef {
        Rc::new(RefCell::new(Scope {
            vars: HashMap::new(),
            parent: None,
        }))
    }

    pub fn child(parent: &ScopeRef) -> ScopeRef {
        Rc::new(RefCell::new(Scope {
            vars: HashMap::new(),
            parent: Some(Rc::clone(parent)),
        }))
    }

    /// Binds a name in this scope, replacing any existing binding here.
    pub fn define(&mut self, name: &str, value: ObjRef) {
        self.vars.insert(name.to_string(), value);
    }

    /// Removes a binding from this scope, if present. Lookups then fall
    /// through to the parent chain again.
    pub fn undefine(&mut self, name: &str) {
        self.vars.remove(name);
    }

    fn get(&self, name: &str) -> Option<ObjRef> {
        self.vars.get(name).cloned()
    }

    /// Walks the scope chain for a binding.
    pub fn lookup(scope: &ScopeRef, name: &str) -> Option<ObjRef> {
        let mut current = Rc::clone(scope);
        loop {
            if let Some(value) = current.borrow().get(name) {
                return Some(value);
            }
            let parent = current.borrow().parent.clone();
            match parent {
                Some(parent) => current = parent,
                None => return None,
            }
        }
    }

    /// Assigns to the nearest enclosing scope where the name is already
    /// bound. Returns false if no scope in the chain binds it.
    pub fn set(scope: &ScopeRef, name: &str, value: ObjRef) -> bool {
        let mut current = Rc::clone(scope);
        loop {
            if current.borrow().vars.contains_key(name) {
                current.borrow_mut().define(name, value);
                return true;
            }
            let parent = current.borrow().parent.clone();
            match parent {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    /// Drops all bindings and the parent link. Used at environment teardown
    /// to break reference cycles through closures.
    pub fn clear(&mut self) {
        self.vars.clear();
        self.parent = None;
    }
}
