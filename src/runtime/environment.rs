use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::{Rc, Weak};

use crate::ast::Expr;
use crate::bytecode::compile::Compiler;
use crate::bytecode::{BlockTable, CodeBlock, StringTable};
use crate::runtime::object::{BlockObject, DynamicObject, ObjKind, Object, ObjRef};
use crate::runtime::primitives;
use crate::runtime::scope::{Scope, ScopeRef};

/// The process-wide interpreter state: the string and block tables, the
/// global scope, the well-known objects, and the output/error sinks.
///
/// Every object is allocated through the environment, which keeps a weak
/// registry of them. Closures can capture scopes that bind them, so plain
/// reference counting alone would leak those cycles; dropping the
/// environment clears the internals of every surviving object, which breaks
/// every cycle an execution can form.
pub struct Environment {
    strings: StringTable,
    blocks: BlockTable,
    globals: ScopeRef,

    nil: ObjRef,
    truth: ObjRef,
    falsity: ObjRef,
    object_proto: ObjRef,
    number_proto: ObjRef,
    string_proto: ObjRef,
    block_proto: ObjRef,
    array_proto: ObjRef,
    ether: ObjRef,

    output: Box<dyn Write>,
    error_sink: Box<dyn Write>,

    arena: Vec<Weak<RefCell<Object>>>,
}

impl Environment {
    pub fn new() -> Environment {
        let mut arena: Vec<Weak<RefCell<Object>>> = Vec::new();

        let mut alloc = |object: Object| {
            let reference = Rc::new(RefCell::new(object));
            arena.push(Rc::downgrade(&reference));
            reference
        };

        let object_proto = alloc(Object {
            prototype: None,
            kind: ObjKind::Dynamic(DynamicObject::new(None, Some("Object".to_string()))),
        });
        let object_scope = object_proto.borrow().object_scope();

        let mut proto = |name: &str| {
            alloc(Object {
                prototype: Some(Rc::clone(&object_proto)),
                kind: ObjKind::Dynamic(DynamicObject::new(
                    object_scope.as_ref(),
                    Some(name.to_string()),
                )),
            })
        };

        let number_proto = proto("Number");
        let string_proto = proto("String");
        let block_proto = proto("Block");
        let array_proto = proto("Array");
        let ether = proto("Ether");

        let mut singleton = |kind: ObjKind| {
            alloc(Object {
                prototype: Some(Rc::clone(&object_proto)),
                kind,
            })
        };

        let nil = singleton(ObjKind::Nil);
        let truth = singleton(ObjKind::Bool(true));
        let falsity = singleton(ObjKind::Bool(false));

        let globals = Scope::root();
        {
            let mut scope = globals.borrow_mut();
            scope.define("Object", Rc::clone(&object_proto));
            scope.define("Number", Rc::clone(&number_proto));
            scope.define("String", Rc::clone(&string_proto));
            scope.define("Block", Rc::clone(&block_proto));
            scope.define("Array", Rc::clone(&array_proto));
            scope.define("Ether", Rc::clone(&ether));
            scope.define("nil", Rc::clone(&nil));
            scope.define("true", Rc::clone(&truth));
            scope.define("false", Rc::clone(&falsity));
        }

        let mut environment = Environment {
            strings: StringTable::new(),
            blocks: BlockTable::new(),
            globals,
            nil,
            truth,
            falsity,
            object_proto,
            number_proto,
            string_proto,
            block_proto,
            array_proto,
            ether,
            output: Box::new(io::stdout()),
            error_sink: Box::new(io::stdout()),
            arena,
        };

        primitives::install(&mut environment);
        environment
    }

    // Allocation. Everything goes through `alloc` so teardown can reach it.

    fn alloc(&mut self, object: Object) -> ObjRef {
        let reference = Rc::new(RefCell::new(object));
        self.arena.push(Rc::downgrade(&reference));
        reference
    }

    /// Creates a fresh dynamic object. Its object scope is parented on the
    /// prototype's object scope so inherited fields resolve.
    pub fn new_object(&mut self, prototype: Option<ObjRef>, name: Option<String>) -> ObjRef {
        let parent_scope = prototype.as_ref().and_then(|p| p.borrow().object_scope());
        let dynamic = DynamicObject::new(parent_scope.as_ref(), name);
        self.alloc(Object {
            prototype,
            kind: ObjKind::Dynamic(dynamic),
        })
    }

    pub fn new_number(&mut self, value: f64) -> ObjRef {
        let prototype = Some(Rc::clone(&self.number_proto));
        self.alloc(Object {
            prototype,
            kind: ObjKind::Number(value),
        })
    }

    pub fn new_string(&mut self, text: impl Into<String>) -> ObjRef {
        let prototype = Some(Rc::clone(&self.string_proto));
        self.alloc(Object {
            prototype,
            kind: ObjKind::String(text.into()),
        })
    }

    /// Creates a block object capturing the given scope as its closure.
    pub fn new_block(&mut self, code: Rc<CodeBlock>, closure: ScopeRef) -> ObjRef {
        let params = code.params.clone();
        let prototype = Some(Rc::clone(&self.block_proto));
        self.alloc(Object {
            prototype,
            kind: ObjKind::Block(BlockObject {
                code,
                closure,
                params,
            }),
        })
    }

    pub fn new_array(&mut self, elements: Vec<ObjRef>) -> ObjRef {
        let prototype = Some(Rc::clone(&self.array_proto));
        self.alloc(Object {
            prototype,
            kind: ObjKind::Array(elements),
        })
    }

    // Well-known objects

    pub fn nil(&self) -> ObjRef {
        Rc::clone(&self.nil)
    }

    pub fn truth(&self) -> ObjRef {
        Rc::clone(&self.truth)
    }

    pub fn falsity(&self) -> ObjRef {
        Rc::clone(&self.falsity)
    }

    pub fn make_bool(&self, value: bool) -> ObjRef {
        if value {
            self.truth()
        } else {
            self.falsity()
        }
    }

    pub fn object_proto(&self) -> ObjRef {
        Rc::clone(&self.object_proto)
    }

    pub fn number_proto(&self) -> ObjRef {
        Rc::clone(&self.number_proto)
    }

    pub fn string_proto(&self) -> ObjRef {
        Rc::clone(&self.string_proto)
    }

    pub fn block_proto(&self) -> ObjRef {
        Rc::clone(&self.block_proto)
    }

    pub fn array_proto(&self) -> ObjRef {
        Rc::clone(&self.array_proto)
    }

    pub fn ether(&self) -> ObjRef {
        Rc::clone(&self.ether)
    }

    pub fn globals(&self) -> ScopeRef {
        Rc::clone(&self.globals)
    }

    // Tables

    pub fn strings(&self) -> &StringTable {
        &self.strings
    }

    pub fn strings_mut(&mut self) -> &mut StringTable {
        &mut self.strings
    }

    pub fn blocks(&self) -> &BlockTable {
        &self.blocks
    }

    /// Compiles an expression against this environment's tables.
    pub fn compile(&mut self, expr: &Expr) -> Rc<CodeBlock> {
        let code = Compiler::new(&mut self.strings, &mut self.blocks).compile(expr);
        Rc::new(code)
    }

    // Sinks

    pub fn set_output(&mut self, output: Box<dyn Write>) {
        self.output = output;
    }

    pub fn set_error_sink(&mut self, sink: Box<dyn Write>) {
        self.error_sink = sink;
    }

    pub fn write_output(&mut self, text: &str) {
        let _ = self.output.write_all(text.as_bytes());
        let _ = self.output.flush();
    }

    /// Reports a runtime error to the error sink. Execution continues; the
    /// caller pushes `Nil` when the failure was per-message.
    pub fn runtime_error(&mut self, message: &str) {
        let _ = writeln!(self.error_sink, "Runtime error: {}", message);
        let _ = self.error_sink.flush();
    }
}

impl Default for Environment {
    fn default() -> Self {
        Environment::new()
    }
}

impl Drop for Environment {
    fn drop(&mut self) {
        // Break closure cycles so every object actually gets reclaimed.
        self.globals.borrow_mut().clear();
        for weak in self.arena.drain(..) {
            if let Some(object) = weak.upgrade() {
                if let Ok(mut object) = object.try_borrow_mut() {
                    object.release();
                }
            }
        }
    }
}

/// A `Write` sink over shared storage, for capturing interpreter output and
/// runtime errors in tests and embeddings.
#[derive(Clone, Default)]
pub struct SharedSink(Rc<RefCell<String>>);

impl SharedSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        self.0.borrow().clone()
    }
}

impl Write for SharedSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().push_str(&String::from_utf8_lossy(buf));
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bootstrap_globals() {
        let env = Environment::new();
        for name in [
            "Object", "Number", "String", "Block", "Array", "Ether", "nil", "true", "false",
        ] {
            assert!(
                Scope::lookup(&env.globals(), name).is_some(),
                "missing global {}",
                name
            );
        }
    }

    #[test]
    fn test_bool_singletons_are_shared() {
        let env = Environment::new();
        assert!(Rc::ptr_eq(&env.make_bool(true), &env.truth()));
        assert!(Rc::ptr_eq(&env.make_bool(false), &env.falsity()));
        assert!(!Rc::ptr_eq(&env.truth(), &env.falsity()));
    }

    #[test]
    fn test_prototypes_chain_to_object() {
        let env = Environment::new();
        let number = env.number_proto();
        let proto = number.borrow().prototype.clone().unwrap();
        assert!(Rc::ptr_eq(&proto, &env.object_proto()));
        assert!(env.object_proto().borrow().prototype.is_none());
    }

    #[test]
    fn test_object_scope_inherits_from_prototype() {
        let mut env = Environment::new();
        let parent = env.new_object(Some(env.object_proto()), None);
        let field = env.new_number(7.0);
        parent
            .borrow()
            .object_scope()
            .unwrap()
            .borrow_mut()
            .define("_x", field);

        let child = env.new_object(Some(parent), None);
        let scope = child.borrow().object_scope().unwrap();
        let found = Scope::lookup(&scope, "_x").unwrap();
        assert_eq!(found.borrow().as_number(), Some(7.0));
    }

    #[test]
    fn test_runtime_error_goes_to_sink_with_prefix() {
        let sink = SharedSink::new();
        let mut env = Environment::new();
        env.set_error_sink(Box::new(sink.clone()));

        env.runtime_error("something went sideways");
        assert_eq!(sink.contents(), "Runtime error: something went sideways\n");
    }

    #[test]
    fn test_teardown_breaks_closure_cycles() {
        let weak;
        {
            let mut env = Environment::new();
            let code = Rc::new(CodeBlock::new(Vec::new()));
            let scope = Scope::child(&env.globals());
            let block = env.new_block(code, Rc::clone(&scope));
            // The closure scope binds the block itself: a cycle.
            scope.borrow_mut().define("b", Rc::clone(&block));
            weak = Rc::downgrade(&block);

            drop(block);
            drop(scope);
            assert!(weak.upgrade().is_some(), "cycle should keep the block alive");
            drop(env);
        }
        assert!(weak.upgrade().is_none(), "teardown should break the cycle");
    }
}
