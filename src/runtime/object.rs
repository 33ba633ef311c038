use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::bytecode::CodeBlock;
use crate::runtime::interpreter::Interpreter;
use crate::runtime::scope::{Scope, ScopeRef};

/// A shared, mutable object reference. Everything the interpreter touches is
/// one of these; absence is the `Nil` singleton, never a missing reference.
pub type ObjRef = Rc<RefCell<Object>>;

/// A host function bound to a selector. Primitives push their result (and
/// may push call frames) on the interpreter rather than returning a value.
pub type Primitive = fn(ObjRef, &mut Interpreter, &str, &[ObjRef]);

/// A runtime value: a tagged variant plus a prototype link.
///
/// Only the root `Object` prototype has no prototype of its own. Message
/// dispatch walks the chain: the receiver's own method and primitive tables
/// first (dynamic objects only), then the prototype, preserving the original
/// receiver so inherited behavior acts on the concrete object.
#[derive(Debug)]
pub struct Object {
    pub prototype: Option<ObjRef>,
    pub kind: ObjKind,
}

#[derive(Debug)]
pub enum ObjKind {
    Dynamic(DynamicObject),
    Number(f64),
    String(String),
    Block(BlockObject),
    Array(Vec<ObjRef>),
    Nil,
    Bool(bool),
}

/// A user-extensible object: named slots, methods, and host primitives.
#[derive(Debug)]
pub struct DynamicObject {
    /// The object scope. Its parent is the prototype's object scope, so
    /// inherited fields resolve through the chain.
    pub scope: ScopeRef,
    pub methods: HashMap<String, ObjRef>,
    pub primitives: HashMap<String, Primitive>,
    pub name: Option<String>,
}

impl DynamicObject {
    pub fn new(parent_scope: Option<&ScopeRef>, name: Option<String>) -> Self {
        let scope = match parent_scope {
            Some(parent) => Scope::child(parent),
            None => Scope::root(),
        };
        DynamicObject {
            scope,
            methods: HashMap::new(),
            primitives: HashMap::new(),
            name,
        }
    }

    /// Installs a method, replacing any existing entry for the selector.
    ///
    /// The name must be non-empty and the body a block; otherwise the
    /// definition is rejected and nothing changes.
    pub fn add_method(&mut self, name: &str, body: ObjRef) -> Result<(), String> {
        if name.is_empty() {
            return Err("cannot add a method without a name".to_string());
        }
        if !matches!(body.borrow().kind, ObjKind::Block(_)) {
            return Err(format!("the body of method '{}' must be a block", name));
        }

        self.methods.insert(name.to_string(), body);
        Ok(())
    }

    pub fn register_primitive(&mut self, selector: &str, method: Primitive) {
        self.primitives.insert(selector.to_string(), method);
    }
}

/// A first-class callable: compiled code, its captured closure scope, and
/// the parameter list cached off the code block.
#[derive(Debug)]
pub struct BlockObject {
    pub code: Rc<CodeBlock>,
    pub closure: ScopeRef,
    pub params: Vec<String>,
}

enum Handler {
    Method(ObjRef),
    Primitive(Primitive),
    Delegate(Option<ObjRef>),
}

impl Object {
    /// Dispatches a message on a receiver.
    ///
    /// Lookup order on each link of the prototype chain: user-defined
    /// method, then host primitive, then delegate to the prototype. The
    /// original receiver is carried along the walk, so a `copy` inherited
    /// from `Object` copies the concrete receiver. An exhausted chain is an
    /// unhandled message: a runtime error with `Nil` as the result.
    pub fn receive(this: &ObjRef, interp: &mut Interpreter, message: &str, args: Vec<ObjRef>) {
        let mut target = Rc::clone(this);

        loop {
            let handler = {
                let object = target.borrow();
                match &object.kind {
                    ObjKind::Dynamic(dynamic) => {
                        if let Some(method) = dynamic.methods.get(message) {
                            Handler::Method(Rc::clone(method))
                        } else if let Some(&primitive) = dynamic.primitives.get(message) {
                            Handler::Primitive(primitive)
                        } else {
                            Handler::Delegate(object.prototype.clone())
                        }
                    }
                    _ => Handler::Delegate(object.prototype.clone()),
                }
            };

            match handler {
                Handler::Method(method) => {
                    interp.call_method(Rc::clone(this), &method, args);
                    return;
                }
                Handler::Primitive(primitive) => {
                    primitive(Rc::clone(this), interp, message, &args);
                    return;
                }
                Handler::Delegate(Some(prototype)) => target = prototype,
                Handler::Delegate(None) => {
                    interp.unhandled_message(message, this);
                    return;
                }
            }
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self.kind {
            ObjKind::Number(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&str> {
        match &self.kind {
            ObjKind::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_block(&self) -> bool {
        matches!(self.kind, ObjKind::Block(_))
    }

    /// The object scope of a dynamic object.
    pub fn object_scope(&self) -> Option<ScopeRef> {
        match &self.kind {
            ObjKind::Dynamic(dynamic) => Some(Rc::clone(&dynamic.scope)),
            _ => None,
        }
    }

    /// A human-readable rendering, used by `toString`, `write`, and error
    /// messages.
    pub fn to_text(&self) -> String {
        match &self.kind {
            ObjKind::Number(n) => format_number(*n),
            ObjKind::String(s) => s.clone(),
            ObjKind::Bool(b) => b.to_string(),
            ObjKind::Nil => "nil".to_string(),
            ObjKind::Block(_) => "a block".to_string(),
            ObjKind::Array(elements) => {
                let mut text = String::from("[");
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        text.push_str(", ");
                    }
                    text.push_str(&element.borrow().to_text());
                }
                text.push(']');
                text
            }
            ObjKind::Dynamic(dynamic) => match &dynamic.name {
                Some(name) => name.clone(),
                None => "an object".to_string(),
            },
        }
    }

    /// Clears everything that can participate in a reference cycle: method
    /// tables, object scopes, closures, array elements, and the prototype
    /// link. Called for every live object at environment teardown.
    pub fn release(&mut self) {
        self.prototype = None;
        match &mut self.kind {
            ObjKind::Dynamic(dynamic) => {
                dynamic.methods.clear();
                dynamic.primitives.clear();
                dynamic.scope.borrow_mut().clear();
            }
            ObjKind::Block(block) => {
                block.closure.borrow_mut().clear();
            }
            ObjKind::Array(elements) => {
                elements.clear();
            }
            _ => {}
        }
    }
}

pub fn format_number(n: f64) -> String {
    if n.is_finite() && n == n.trunc() && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

impl std::fmt::Display for Object {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obj(kind: ObjKind) -> ObjRef {
        Rc::new(RefCell::new(Object {
            prototype: None,
            kind,
        }))
    }

    #[test]
    fn test_add_method_rejects_empty_name() {
        let mut dynamic = DynamicObject::new(None, None);
        let block = obj(ObjKind::Nil);
        assert!(dynamic.add_method("", block).is_err());
        assert!(dynamic.methods.is_empty());
    }

    #[test]
    fn test_add_method_rejects_non_block_body() {
        let mut dynamic = DynamicObject::new(None, None);
        let number = obj(ObjKind::Number(3.0));
        assert!(dynamic.add_method("speak", number).is_err());
        assert!(dynamic.methods.is_empty());
    }

    #[test]
    fn test_add_method_replaces_existing_entry() {
        let mut dynamic = DynamicObject::new(None, None);
        let first = obj(ObjKind::Block(BlockObject {
            code: Rc::new(CodeBlock::new(Vec::new())),
            closure: Scope::root(),
            params: Vec::new(),
        }));
        let second = obj(ObjKind::Block(BlockObject {
            code: Rc::new(CodeBlock::new(Vec::new())),
            closure: Scope::root(),
            params: Vec::new(),
        }));

        dynamic.add_method("speak", Rc::clone(&first)).unwrap();
        dynamic.add_method("speak", Rc::clone(&second)).unwrap();
        assert!(Rc::ptr_eq(&dynamic.methods["speak"], &second));
    }

    #[test]
    fn test_number_formatting() {
        assert_eq!(format_number(9.0), "9");
        assert_eq!(format_number(2.5), "2.5");
        assert_eq!(format_number(-3.0), "-3");
    }

    #[test]
    fn test_to_text() {
        assert_eq!(obj(ObjKind::Nil).borrow().to_text(), "nil");
        assert_eq!(obj(ObjKind::Bool(true)).borrow().to_text(), "true");
        assert_eq!(
            obj(ObjKind::String("abc".to_string())).borrow().to_text(),
            "abc"
        );

        let array = obj(ObjKind::Array(vec![
            obj(ObjKind::Number(1.0)),
            obj(ObjKind::Number(2.0)),
        ]));
        assert_eq!(array.borrow().to_text(), "[1, 2]");

        let named = obj(ObjKind::Dynamic(DynamicObject::new(
            None,
            Some("Point".to_string()),
        )));
        assert_eq!(named.borrow().to_text(), "Point");
    }
}
