use std::rc::Rc;

use crate::ast::Expr;
use crate::bytecode::{CodeBlock, Op};
use crate::runtime::environment::Environment;
use crate::runtime::object::{ObjKind, ObjRef, Object};
use crate::runtime::scope::{Scope, ScopeRef};

/// One activation record: the running code, the next instruction address,
/// the lexical scope, and the receiver bound to `self`.
struct CallFrame {
    code: Rc<CodeBlock>,
    address: isize,
    scope: ScopeRef,
    self_obj: ObjRef,
}

/// The bytecode interpreter: a call stack of activation records and an
/// operand stack, executing against a shared environment.
///
/// The main loop fetches the top frame's next instruction, dispatches it,
/// then advances the address of the frame the instruction came from (if that
/// frame is still live). An opcode that pushes a callee therefore leaves the
/// callee starting at address 0, and the caller resumes past the call once
/// the callee's `END_BLOCK` pops it.
///
/// `while` is not compiled into user bytecode. `WhileLoop` pushes a frame
/// running a synthetic code block (`LOOP_1..LOOP_4, END_BLOCK`) that stages
/// the condition and body sends, so `while do ` stays overridable at
/// runtime.
pub struct Interpreter<'env> {
    env: &'env mut Environment,
    is_running: bool,
    call_stack: Vec<CallFrame>,
    operands: Vec<ObjRef>,
    loop_code: Rc<CodeBlock>,
    discard_code: Rc<CodeBlock>,
}

impl<'env> Interpreter<'env> {
    pub fn new(env: &'env mut Environment) -> Self {
        let mut loop_code = CodeBlock::new(Vec::new());
        loop_code.write(Op::Loop1);
        loop_code.write(Op::Loop2);
        loop_code.write(Op::Loop3);
        loop_code.write(Op::Loop4);
        loop_code.write(Op::EndBlock);

        let mut discard_code = CodeBlock::new(Vec::new());
        discard_code.write(Op::Pop);
        discard_code.write(Op::EndBlock);

        Interpreter {
            env,
            is_running: true,
            call_stack: Vec::new(),
            operands: Vec::new(),
            loop_code: Rc::new(loop_code),
            discard_code: Rc::new(discard_code),
        }
    }

    pub fn env(&self) -> &Environment {
        self.env
    }

    pub fn env_mut(&mut self) -> &mut Environment {
        self.env
    }

    /// Stops the interpreter at the next instruction boundary.
    pub fn stop(&mut self) {
        self.is_running = false;
    }

    pub fn is_running(&self) -> bool {
        self.is_running
    }

    /// Runs a code block to completion at global scope and returns the
    /// resulting value.
    pub fn execute(&mut self, code: Rc<CodeBlock>) -> ObjRef {
        let globals = self.env.globals();
        let nil = self.env.nil();
        self.call_code(code, globals, nil);

        while self.is_running && !self.call_stack.is_empty() {
            let fetched = self.call_stack.len() - 1;
            let op = {
                let frame = &self.call_stack[fetched];
                frame.code.code[frame.address as usize]
            };

            self.dispatch(op);

            // Advance the frame the instruction came from. If the
            // instruction popped it, there is nothing to advance; its caller
            // already points past the call.
            if fetched < self.call_stack.len() {
                self.call_stack[fetched].address += 1;
            }
        }

        self.operands.pop().unwrap_or_else(|| self.env.nil())
    }

    fn dispatch(&mut self, op: Op) {
        match op {
            Op::Nothing => {}

            Op::NumberLiteral(value) => {
                let number = self.env.new_number(value);
                self.push(number);
            }

            Op::StringLiteral(id) => {
                let text = self.env.strings().resolve(id).to_string();
                let string = self.env.new_string(text);
                self.push(string);
            }

            Op::BlockLiteral(id) => {
                // The block captures the scope it is created in.
                let code = self.env.blocks().get(id);
                let closure = self.current_scope();
                let block = self.env.new_block(code, closure);
                self.push(block);
            }

            Op::Pop => {
                self.pop();
            }

            // The def family peeks rather than pops so the defined value is
            // also the expression's value.
            Op::DefGlobal(id) => {
                let name = self.env.strings().resolve(id).to_string();
                let value = self.peek();
                self.env.globals().borrow_mut().define(&name, value);
            }

            Op::DefObject(id) => {
                let name = self.env.strings().resolve(id).to_string();
                let value = self.peek();
                let self_obj = self.current_self();

                // Fields go to the object scope, anything else is a method.
                // With no dynamic self (e.g. at top level) this is a no-op.
                let mut rejected = None;
                if let ObjKind::Dynamic(dynamic) = &mut self_obj.borrow_mut().kind {
                    if Expr::is_field(&name) {
                        dynamic.scope.borrow_mut().define(&name, value);
                    } else if let Err(message) = dynamic.add_method(&name, value) {
                        rejected = Some(message);
                    }
                }
                if let Some(message) = rejected {
                    self.runtime_error(&message);
                }
            }

            Op::DefLocal(id) => {
                let name = self.env.strings().resolve(id).to_string();
                let value = self.peek();
                self.current_scope().borrow_mut().define(&name, value);
            }

            Op::UndefLocal(id) => {
                let name = self.env.strings().resolve(id).to_string();
                self.current_scope().borrow_mut().undefine(&name);
            }

            Op::SetLocal(id) => {
                let name = self.env.strings().resolve(id).to_string();
                let value = self.peek();
                if !Scope::set(&self.current_scope(), &name, value) {
                    self.runtime_error(&format!("cannot assign to undefined name '{}'", name));
                }
            }

            Op::LoadGlobal(id) => {
                let name = self.env.strings().resolve(id).to_string();
                let value = Scope::lookup(&self.env.globals(), &name);
                let value = value.unwrap_or_else(|| self.env.nil());
                self.push(value);
            }

            Op::LoadObject(id) => {
                let name = self.env.strings().resolve(id).to_string();
                let self_obj = self.current_self();
                let scope = self_obj.borrow().object_scope();
                let value = scope
                    .and_then(|scope| Scope::lookup(&scope, &name))
                    .unwrap_or_else(|| self.env.nil());
                self.push(value);
            }

            Op::LoadLocal(id) => {
                let name = self.env.strings().resolve(id).to_string();
                if name == "self" {
                    let self_obj = self.current_self();
                    self.push(self_obj);
                } else {
                    let value = Scope::lookup(&self.current_scope(), &name)
                        .unwrap_or_else(|| self.env.nil());
                    self.push(value);
                }
            }

            Op::Message(arity, id) => {
                // Arguments were evaluated left to right, so popping yields
                // them reversed; restore source order before dispatch.
                let mut args = Vec::with_capacity(arity as usize);
                for _ in 0..arity {
                    args.push(self.pop());
                }
                args.reverse();

                let receiver = self.pop();
                let selector = self.env.strings().resolve(id).to_string();
                Object::receive(&receiver, self, &selector, args);
            }

            Op::Loop1 => {
                // Evaluate the condition, leaving the condition block itself
                // on the stack for the next iteration.
                let condition = self.peek();
                Object::receive(&condition, self, "call", Vec::new());
            }

            Op::Loop2 => {
                // Anything but the true singleton ends the loop.
                let result = self.pop();
                if !Rc::ptr_eq(&result, &self.env.truth()) {
                    self.pop(); // condition
                    self.pop(); // body
                    self.call_stack.pop();
                    self.push_nil();
                }
            }

            Op::Loop3 => {
                // The body sits just under the condition block.
                let body = self.operands[self.operands.len() - 2].clone();
                Object::receive(&body, self, "call", Vec::new());
            }

            Op::Loop4 => {
                // Discard the body's value and restart: the post-increment
                // lands the address back on LOOP_1.
                self.pop();
                let top = self.call_stack.len() - 1;
                self.call_stack[top].address = -1;
            }

            Op::EndBlock => {
                self.call_stack.pop();
            }
        }
    }

    // Operand stack. Underflow is an interpreter bug, not a user error.

    pub fn push(&mut self, object: ObjRef) {
        self.operands.push(object);
    }

    pub fn push_nil(&mut self) {
        let nil = self.env.nil();
        self.push(nil);
    }

    pub fn push_bool(&mut self, value: bool) {
        let object = self.env.make_bool(value);
        self.push(object);
    }

    pub fn push_number(&mut self, value: f64) {
        let object = self.env.new_number(value);
        self.push(object);
    }

    pub fn push_string(&mut self, text: impl Into<String>) {
        let object = self.env.new_string(text);
        self.push(object);
    }

    fn pop(&mut self) -> ObjRef {
        self.operands.pop().expect("operand stack underflow")
    }

    fn peek(&self) -> ObjRef {
        Rc::clone(self.operands.last().expect("operand stack underflow"))
    }

    fn current_frame(&self) -> &CallFrame {
        self.call_stack.last().expect("no active call frame")
    }

    pub fn current_scope(&self) -> ScopeRef {
        Rc::clone(&self.current_frame().scope)
    }

    pub fn current_self(&self) -> ObjRef {
        Rc::clone(&self.current_frame().self_obj)
    }

    /// Pushes a frame running `code` in the given scope and self.
    pub fn call_code(&mut self, code: Rc<CodeBlock>, scope: ScopeRef, self_obj: ObjRef) {
        self.call_stack.push(CallFrame {
            code,
            address: 0,
            scope,
            self_obj,
        });
    }

    /// Calls a block, keeping the current self.
    pub fn call_block(&mut self, block: &ObjRef, args: Vec<ObjRef>) {
        let self_obj = self.current_self();
        self.call_method(self_obj, block, args);
    }

    /// Calls a block with an explicit receiver bound to `self`.
    ///
    /// An argument-count mismatch is a runtime error: it is reported, `Nil`
    /// is pushed, and no frame is created.
    pub fn call_method(&mut self, self_obj: ObjRef, block: &ObjRef, args: Vec<ObjRef>) {
        let parts = {
            let object = block.borrow();
            match &object.kind {
                ObjKind::Block(b) => {
                    Some((Rc::clone(&b.code), Rc::clone(&b.closure), b.params.clone()))
                }
                _ => None,
            }
        };

        let (code, closure, params) = match parts {
            Some(parts) => parts,
            None => {
                self.runtime_error("only a block can be called");
                self.push_nil();
                return;
            }
        };

        if params.len() != args.len() {
            self.runtime_error(&format!(
                "Block expects {} arguments, but was passed {}.",
                params.len(),
                args.len()
            ));
            self.push_nil();
            return;
        }

        // A fresh scope on the block's closure, with the arguments bound in
        // source order.
        let scope = Scope::child(&closure);
        for (param, arg) in params.iter().zip(args) {
            scope.borrow_mut().define(param, arg);
        }

        self.call_code(code, scope, self_obj);
    }

    /// Begins a while loop: pushes the body and condition operands and a
    /// frame running the synthetic loop block, inheriting the current scope
    /// and self.
    pub fn while_loop(&mut self, condition: ObjRef, body: ObjRef) {
        self.push(body);
        self.push(condition);

        let scope = self.current_scope();
        let self_obj = self.current_self();
        let code = Rc::clone(&self.loop_code);
        self.call_code(code, scope, self_obj);
    }

    /// Pushes a frame that discards the value produced by whatever frame is
    /// pushed on top of it next.
    pub fn discard_return(&mut self) {
        let scope = self.current_scope();
        let self_obj = self.current_self();
        let code = Rc::clone(&self.discard_code);
        self.call_code(code, scope, self_obj);
    }

    pub fn runtime_error(&mut self, message: &str) {
        self.env.runtime_error(message);
    }

    /// The prototype chain was exhausted without a handler.
    pub fn unhandled_message(&mut self, selector: &str, receiver: &ObjRef) {
        let description = receiver.borrow().to_text();
        self.runtime_error(&format!("{} not handled by {}", selector, description));
        self.push_nil();
    }
}
