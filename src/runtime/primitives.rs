use std::rc::Rc;

use crate::ast::Expr;
use crate::lexer::Lexer;
use crate::parser::Parser;
use crate::runtime::environment::Environment;
use crate::runtime::interpreter::Interpreter;
use crate::runtime::object::{format_number, ObjKind, ObjRef, Primitive};
use crate::runtime::scope::Scope;

/// Registers the host primitives on the well-known objects. Called once
/// from `Environment::new`.
///
/// Primitives push their result on the interpreter's operand stack; the
/// ones that run user blocks push call frames instead and let the main loop
/// produce the value.
pub fn install(env: &mut Environment) {
    let object = env.object_proto();
    register(&object, "copy", object_copy);
    register(&object, "do ", object_do);
    register(&object, "==", object_eq);
    register(&object, "!=", object_ne);
    register(&object, "toString", object_to_string);
    register(&object, "method do ", object_method_do);

    let number = env.number_proto();
    register(&number, "+", number_add);
    register(&number, "-", number_sub);
    register(&number, "*", number_mul);
    register(&number, "/", number_div);
    register(&number, "%", number_rem);
    register(&number, "<", number_lt);
    register(&number, ">", number_gt);
    register(&number, "<=", number_le);
    register(&number, ">=", number_ge);
    register(&number, "==", number_eq);
    register(&number, "!=", number_ne);
    register(&number, "neg", number_neg);
    register(&number, "abs", number_abs);
    register(&number, "floor", number_floor);
    register(&number, "sqrt", number_sqrt);
    register(&number, "toString", number_to_string);

    let string = env.string_proto();
    register(&string, "+", string_add);
    register(&string, "length", string_length);
    register(&string, "at ", string_at);
    register(&string, "==", string_eq);
    register(&string, "!=", string_ne);
    register(&string, "toString", string_to_string);

    // `call` with every supported arity: "call", "call ", "call  ", ...
    let block = env.block_proto();
    for arity in 0..=10 {
        let mut selector = String::from("call");
        for _ in 0..arity {
            selector.push(' ');
        }
        register(&block, &selector, block_call);
    }

    let array = env.array_proto();
    register(&array, "new", array_new);
    for arity in 1..=10 {
        let mut selector = String::from("with");
        for _ in 0..arity {
            selector.push(' ');
        }
        register(&array, &selector, array_with);
    }
    register(&array, "length", array_length);
    register(&array, "at ", array_at);
    register(&array, "at put ", array_at_put);
    register(&array, "add ", array_add);

    let ether = env.ether();
    register(&ether, "while do ", ether_while_do);
    register(&ether, "if then ", ether_if_then);
    register(&ether, "if then else ", ether_if_then_else);
    register(&ether, "extend with ", ether_extend_with);
    register(&ether, "write ", ether_write);
    register(&ether, "writeLine ", ether_write_line);
    register(&ether, "load ", ether_load);
    register(&ether, "quit", ether_quit);
}

fn register(object: &ObjRef, selector: &str, primitive: Primitive) {
    if let ObjKind::Dynamic(dynamic) = &mut object.borrow_mut().kind {
        dynamic.register_primitive(selector, primitive);
    }
}

// Argument plumbing

fn this_number(this: &ObjRef, interp: &mut Interpreter, selector: &str) -> Option<f64> {
    let number = this.borrow().as_number();
    if number.is_none() {
        interp.runtime_error(&format!("'{}' requires a number receiver", selector));
        interp.push_nil();
    }
    number
}

fn arg_number(arg: &ObjRef, interp: &mut Interpreter, selector: &str) -> Option<f64> {
    let number = arg.borrow().as_number();
    if number.is_none() {
        interp.runtime_error(&format!("the argument to '{}' must be a number", selector));
        interp.push_nil();
    }
    number
}

fn this_string(this: &ObjRef, interp: &mut Interpreter, selector: &str) -> Option<String> {
    let string = this.borrow().as_string().map(str::to_string);
    if string.is_none() {
        interp.runtime_error(&format!("'{}' requires a string receiver", selector));
        interp.push_nil();
    }
    string
}

// Object

fn object_copy(this: ObjRef, interp: &mut Interpreter, _msg: &str, _args: &[ObjRef]) {
    // A fresh object delegating to the concrete receiver, wherever in the
    // prototype chain this primitive was found.
    let copy = interp.env_mut().new_object(Some(this), None);
    interp.push(copy);
}

fn object_do(this: ObjRef, interp: &mut Interpreter, _msg: &str, args: &[ObjRef]) {
    interp.call_method(this, &args[0], Vec::new());
}

fn object_eq(this: ObjRef, interp: &mut Interpreter, _msg: &str, args: &[ObjRef]) {
    interp.push_bool(Rc::ptr_eq(&this, &args[0]));
}

fn object_ne(this: ObjRef, interp: &mut Interpreter, _msg: &str, args: &[ObjRef]) {
    interp.push_bool(!Rc::ptr_eq(&this, &args[0]));
}

fn object_to_string(this: ObjRef, interp: &mut Interpreter, _msg: &str, _args: &[ObjRef]) {
    let text = this.borrow().to_text();
    interp.push_string(text);
}

fn object_method_do(this: ObjRef, interp: &mut Interpreter, _msg: &str, args: &[ObjRef]) {
    let name = match args[0].borrow().as_string() {
        Some(name) => name.to_string(),
        None => {
            interp.runtime_error("the method name must be a string");
            interp.push_nil();
            return;
        }
    };

    let result = match &mut this.borrow_mut().kind {
        ObjKind::Dynamic(dynamic) => dynamic.add_method(&name, Rc::clone(&args[1])),
        _ => Err("only plain objects can have methods".to_string()),
    };

    match result {
        Ok(()) => interp.push(this),
        Err(message) => {
            interp.runtime_error(&message);
            interp.push_nil();
        }
    }
}

// Number

fn number_add(this: ObjRef, interp: &mut Interpreter, msg: &str, args: &[ObjRef]) {
    let Some(a) = this_number(&this, interp, msg) else {
        return;
    };
    let Some(b) = arg_number(&args[0], interp, msg) else {
        return;
    };
    interp.push_number(a + b);
}

fn number_sub(this: ObjRef, interp: &mut Interpreter, msg: &str, args: &[ObjRef]) {
    let Some(a) = this_number(&this, interp, msg) else {
        return;
    };
    let Some(b) = arg_number(&args[0], interp, msg) else {
        return;
    };
    interp.push_number(a - b);
}

fn number_mul(this: ObjRef, interp: &mut Interpreter, msg: &str, args: &[ObjRef]) {
    let Some(a) = this_number(&this, interp, msg) else {
        return;
    };
    let Some(b) = arg_number(&args[0], interp, msg) else {
        return;
    };
    interp.push_number(a * b);
}

fn number_div(this: ObjRef, interp: &mut Interpreter, msg: &str, args: &[ObjRef]) {
    let Some(a) = this_number(&this, interp, msg) else {
        return;
    };
    let Some(b) = arg_number(&args[0], interp, msg) else {
        return;
    };
    interp.push_number(a / b);
}

fn number_rem(this: ObjRef, interp: &mut Interpreter, msg: &str, args: &[ObjRef]) {
    let Some(a) = this_number(&this, interp, msg) else {
        return;
    };
    let Some(b) = arg_number(&args[0], interp, msg) else {
        return;
    };
    interp.push_number(a % b);
}

fn number_lt(this: ObjRef, interp: &mut Interpreter, msg: &str, args: &[ObjRef]) {
    let Some(a) = this_number(&this, interp, msg) else {
        return;
    };
    let Some(b) = arg_number(&args[0], interp, msg) else {
        return;
    };
    interp.push_bool(a < b);
}

fn number_gt(this: ObjRef, interp: &mut Interpreter, msg: &str, args: &[ObjRef]) {
    let Some(a) = this_number(&this, interp, msg) else {
        return;
    };
    let Some(b) = arg_number(&args[0], interp, msg) else {
        return;
    };
    interp.push_bool(a > b);
}

fn number_le(this: ObjRef, interp: &mut Interpreter, msg: &str, args: &[ObjRef]) {
    let Some(a) = this_number(&this, interp, msg) else {
        return;
    };
    let Some(b) = arg_number(&args[0], interp, msg) else {
        return;
    };
    interp.push_bool(a <= b);
}

fn number_ge(this: ObjRef, interp: &mut Interpreter, msg: &str, args: &[ObjRef]) {
    let Some(a) = this_number(&this, interp, msg) else {
        return;
    };
    let Some(b) = arg_number(&args[0], interp, msg) else {
        return;
    };
    interp.push_bool(a >= b);
}

fn number_eq(this: ObjRef, interp: &mut Interpreter, msg: &str, args: &[ObjRef]) {
    let Some(a) = this_number(&this, interp, msg) else {
        return;
    };
    let b = args[0].borrow().as_number();
    interp.push_bool(b == Some(a));
}

fn number_ne(this: ObjRef, interp: &mut Interpreter, msg: &str, args: &[ObjRef]) {
    let Some(a) = this_number(&this, interp, msg) else {
        return;
    };
    let b = args[0].borrow().as_number();
    interp.push_bool(b != Some(a));
}

fn number_neg(this: ObjRef, interp: &mut Interpreter, msg: &str, _args: &[ObjRef]) {
    let Some(a) = this_number(&this, interp, msg) else {
        return;
    };
    interp.push_number(-a);
}

fn number_abs(this: ObjRef, interp: &mut Interpreter, msg: &str, _args: &[ObjRef]) {
    let Some(a) = this_number(&this, interp, msg) else {
        return;
    };
    interp.push_number(a.abs());
}

fn number_floor(this: ObjRef, interp: &mut Interpreter, msg: &str, _args: &[ObjRef]) {
    let Some(a) = this_number(&this, interp, msg) else {
        return;
    };
    interp.push_number(a.floor());
}

fn number_sqrt(this: ObjRef, interp: &mut Interpreter, msg: &str, _args: &[ObjRef]) {
    let Some(a) = this_number(&this, interp, msg) else {
        return;
    };
    interp.push_number(a.sqrt());
}

fn number_to_string(this: ObjRef, interp: &mut Interpreter, msg: &str, _args: &[ObjRef]) {
    let Some(a) = this_number(&this, interp, msg) else {
        return;
    };
    interp.push_string(format_number(a));
}

// String

fn string_add(this: ObjRef, interp: &mut Interpreter, msg: &str, args: &[ObjRef]) {
    let Some(a) = this_string(&this, interp, msg) else {
        return;
    };
    let b = args[0].borrow().to_text();
    interp.push_string(a + &b);
}

fn string_length(this: ObjRef, interp: &mut Interpreter, msg: &str, _args: &[ObjRef]) {
    let Some(a) = this_string(&this, interp, msg) else {
        return;
    };
    interp.push_number(a.chars().count() as f64);
}

fn string_at(this: ObjRef, interp: &mut Interpreter, msg: &str, args: &[ObjRef]) {
    let Some(a) = this_string(&this, interp, msg) else {
        return;
    };
    let Some(index) = arg_number(&args[0], interp, msg) else {
        return;
    };

    if index >= 0.0 {
        if let Some(ch) = a.chars().nth(index as usize) {
            interp.push_string(ch.to_string());
            return;
        }
    }
    // Out of bounds.
    interp.push_nil();
}

fn string_eq(this: ObjRef, interp: &mut Interpreter, msg: &str, args: &[ObjRef]) {
    let Some(a) = this_string(&this, interp, msg) else {
        return;
    };
    let equal = args[0].borrow().as_string() == Some(a.as_str());
    interp.push_bool(equal);
}

fn string_ne(this: ObjRef, interp: &mut Interpreter, msg: &str, args: &[ObjRef]) {
    let Some(a) = this_string(&this, interp, msg) else {
        return;
    };
    let equal = args[0].borrow().as_string() == Some(a.as_str());
    interp.push_bool(!equal);
}

fn string_to_string(this: ObjRef, interp: &mut Interpreter, _msg: &str, _args: &[ObjRef]) {
    interp.push(this);
}

// Block

fn block_call(this: ObjRef, interp: &mut Interpreter, _msg: &str, args: &[ObjRef]) {
    interp.call_block(&this, args.to_vec());
}

// Array

fn this_array(this: &ObjRef, interp: &mut Interpreter, selector: &str) -> Option<Vec<ObjRef>> {
    let elements = match &this.borrow().kind {
        ObjKind::Array(elements) => Some(elements.clone()),
        _ => None,
    };
    if elements.is_none() {
        interp.runtime_error(&format!("'{}' requires an array receiver", selector));
        interp.push_nil();
    }
    elements
}

fn array_new(_this: ObjRef, interp: &mut Interpreter, _msg: &str, _args: &[ObjRef]) {
    let array = interp.env_mut().new_array(Vec::new());
    interp.push(array);
}

fn array_with(_this: ObjRef, interp: &mut Interpreter, _msg: &str, args: &[ObjRef]) {
    let array = interp.env_mut().new_array(args.to_vec());
    interp.push(array);
}

fn array_length(this: ObjRef, interp: &mut Interpreter, msg: &str, _args: &[ObjRef]) {
    let Some(elements) = this_array(&this, interp, msg) else {
        return;
    };
    interp.push_number(elements.len() as f64);
}

fn array_at(this: ObjRef, interp: &mut Interpreter, msg: &str, args: &[ObjRef]) {
    let Some(elements) = this_array(&this, interp, msg) else {
        return;
    };
    let Some(index) = arg_number(&args[0], interp, msg) else {
        return;
    };

    if index >= 0.0 {
        if let Some(element) = elements.get(index as usize) {
            interp.push(Rc::clone(element));
            return;
        }
    }
    interp.push_nil();
}

fn array_at_put(this: ObjRef, interp: &mut Interpreter, msg: &str, args: &[ObjRef]) {
    let Some(index) = arg_number(&args[0], interp, msg) else {
        return;
    };

    let stored = match &mut this.borrow_mut().kind {
        ObjKind::Array(elements) => {
            let i = index as usize;
            if index >= 0.0 && i < elements.len() {
                elements[i] = Rc::clone(&args[1]);
                true
            } else {
                false
            }
        }
        _ => false,
    };

    if stored {
        interp.push(this);
    } else {
        interp.runtime_error("array index out of bounds");
        interp.push_nil();
    }
}

fn array_add(this: ObjRef, interp: &mut Interpreter, msg: &str, args: &[ObjRef]) {
    let added = match &mut this.borrow_mut().kind {
        ObjKind::Array(elements) => {
            elements.push(Rc::clone(&args[0]));
            true
        }
        _ => false,
    };

    if added {
        interp.push(this);
    } else {
        interp.runtime_error(&format!("'{}' requires an array receiver", msg));
        interp.push_nil();
    }
}

// Ether

fn ether_while_do(_this: ObjRef, interp: &mut Interpreter, _msg: &str, args: &[ObjRef]) {
    interp.while_loop(Rc::clone(&args[0]), Rc::clone(&args[1]));
}

fn ether_if_then(_this: ObjRef, interp: &mut Interpreter, _msg: &str, args: &[ObjRef]) {
    if Rc::ptr_eq(&args[0], &interp.env().truth()) {
        interp.call_block(&args[1], Vec::new());
    } else {
        interp.push_nil();
    }
}

fn ether_if_then_else(_this: ObjRef, interp: &mut Interpreter, _msg: &str, args: &[ObjRef]) {
    if Rc::ptr_eq(&args[0], &interp.env().truth()) {
        interp.call_block(&args[1], Vec::new());
    } else {
        interp.call_block(&args[2], Vec::new());
    }
}

/// `extend("Name") with(block)`: the lowering of a `def` statement. Looks
/// up the receiver by name, creating a plain object when the name is
/// unbound, then runs the block with the receiver as self.
fn ether_extend_with(_this: ObjRef, interp: &mut Interpreter, _msg: &str, args: &[ObjRef]) {
    let name = match args[0].borrow().as_string() {
        Some(name) => name.to_string(),
        None => {
            interp.runtime_error("the receiver name must be a string");
            interp.push_nil();
            return;
        }
    };

    let existing = if Expr::is_global(&name) {
        Scope::lookup(&interp.env().globals(), &name)
    } else {
        Scope::lookup(&interp.current_scope(), &name)
    };

    let receiver = match existing {
        Some(object) if !matches!(object.borrow().kind, ObjKind::Nil) => object,
        _ => {
            let prototype = interp.env().object_proto();
            let fresh = interp
                .env_mut()
                .new_object(Some(prototype), Some(name.clone()));
            let scope = if Expr::is_global(&name) {
                interp.env().globals()
            } else {
                interp.current_scope()
            };
            scope.borrow_mut().define(&name, Rc::clone(&fresh));
            fresh
        }
    };

    interp.call_method(receiver, &args[1], Vec::new());
}

fn ether_write(_this: ObjRef, interp: &mut Interpreter, _msg: &str, args: &[ObjRef]) {
    let text = args[0].borrow().to_text();
    interp.env_mut().write_output(&text);
    interp.push_nil();
}

fn ether_write_line(_this: ObjRef, interp: &mut Interpreter, _msg: &str, args: &[ObjRef]) {
    let text = args[0].borrow().to_text();
    interp.env_mut().write_output(&text);
    interp.env_mut().write_output("\n");
    interp.push_nil();
}

/// `load("path")`: reads, parses, and runs a source file at global scope.
/// The file's trailing value is discarded through the synthetic discard
/// block; the load expression itself evaluates to nil.
fn ether_load(_this: ObjRef, interp: &mut Interpreter, _msg: &str, args: &[ObjRef]) {
    let path = match args[0].borrow().as_string() {
        Some(path) => path.to_string(),
        None => {
            interp.runtime_error("the load path must be a string");
            interp.push_nil();
            return;
        }
    };

    let source = match std::fs::read_to_string(&path) {
        Ok(source) => source,
        Err(error) => {
            interp.runtime_error(&format!("cannot load \"{}\": {}", path, error));
            interp.push_nil();
            return;
        }
    };

    let tokens = match Lexer::new(&source).tokenize() {
        Ok(tokens) => tokens,
        Err(error) => {
            interp.runtime_error(&format!("cannot load \"{}\": {}", path, error));
            interp.push_nil();
            return;
        }
    };

    let mut parser = Parser::new(tokens);
    match parser.parse() {
        Some(expr) => {
            let code = interp.env_mut().compile(&expr);
            let globals = interp.env().globals();
            let nil = interp.env().nil();

            interp.push_nil();
            interp.discard_return();
            interp.call_code(code, globals, nil);
        }
        None => {
            for error in parser.errors() {
                interp.runtime_error(&format!("cannot load \"{}\": {}", path, error));
            }
            interp.push_nil();
        }
    }
}

fn ether_quit(_this: ObjRef, interp: &mut Interpreter, _msg: &str, _args: &[ObjRef]) {
    interp.push_nil();
    interp.stop();
}
