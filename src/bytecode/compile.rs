use crate::ast::{Define, Expr};
use crate::bytecode::ir::{BlockId, BlockTable, CodeBlock, StringTable};
use crate::bytecode::op::Op;

/// Lowers an expression tree to bytecode.
///
/// The lowering is deterministic and does no optimization. Nested block
/// literals are compiled into the block table and referenced by id; every
/// name and string literal goes through the string table.
///
/// Scope targeting follows the name's first character: `_name` addresses the
/// current self's object scope, `Name` the global scope, and anything else
/// the lexical scope chain.
pub struct Compiler<'a> {
    strings: &'a mut StringTable,
    blocks: &'a mut BlockTable,
}

impl<'a> Compiler<'a> {
    pub fn new(strings: &'a mut StringTable, blocks: &'a mut BlockTable) -> Self {
        Compiler { strings, blocks }
    }

    /// Compiles a top-level expression into a parameterless code block.
    pub fn compile(mut self, expr: &Expr) -> CodeBlock {
        let mut code = CodeBlock::new(Vec::new());
        self.compile_expr(expr, &mut code);
        code.write(Op::EndBlock);
        code
    }

    /// Compiles a block literal's body and interns it.
    fn compile_block(&mut self, params: &[String], body: &Expr) -> BlockId {
        let mut code = CodeBlock::new(params.to_vec());
        self.compile_expr(body, &mut code);
        code.write(Op::EndBlock);
        self.blocks.add(code)
    }

    fn compile_expr(&mut self, expr: &Expr, out: &mut CodeBlock) {
        match expr {
            Expr::Number(value) => {
                out.write(Op::NumberLiteral(*value));
            }

            Expr::String(text) => {
                let id = self.strings.intern(text);
                out.write(Op::StringLiteral(id));
            }

            Expr::Name(name) => {
                let id = self.strings.intern(name);
                let op = if Expr::is_field(name) {
                    Op::LoadObject(id)
                } else if Expr::is_global(name) {
                    Op::LoadGlobal(id)
                } else {
                    Op::LoadLocal(id)
                };
                out.write(op);
            }

            Expr::SelfRef => {
                let id = self.strings.intern("self");
                out.write(Op::LoadLocal(id));
            }

            Expr::Sequence(exprs) => {
                // Intermediate values are discarded; the last one is the
                // sequence's value.
                for (i, child) in exprs.iter().enumerate() {
                    if i > 0 {
                        out.write(Op::Pop);
                    }
                    self.compile_expr(child, out);
                }
            }

            Expr::Var { name, value } => {
                self.compile_expr(value, out);
                let id = self.strings.intern(name);
                let op = if Expr::is_field(name) {
                    Op::DefObject(id)
                } else if Expr::is_global(name) {
                    Op::DefGlobal(id)
                } else {
                    Op::DefLocal(id)
                };
                out.write(op);
            }

            Expr::Undefine(name) => {
                let id = self.strings.intern(name);
                out.write(Op::UndefLocal(id));
                // The statement still has to produce a value.
                let nil = self.strings.intern("nil");
                out.write(Op::LoadLocal(nil));
            }

            Expr::Set { name, value } => {
                self.compile_expr(value, out);
                let id = self.strings.intern(name);
                // Globals and fields have no set-vs-define distinction.
                let op = if Expr::is_field(name) {
                    Op::DefObject(id)
                } else if Expr::is_global(name) {
                    Op::DefGlobal(id)
                } else {
                    Op::SetLocal(id)
                };
                out.write(op);
            }

            Expr::Message {
                receiver,
                selector,
                args,
            } => {
                self.compile_expr(receiver, out);
                for arg in args {
                    self.compile_expr(arg, out);
                }
                let id = self.strings.intern(selector);
                out.write(Op::Message(args.len() as u8, id));
            }

            Expr::Block { params, body } => {
                let id = self.compile_block(params, body);
                out.write(Op::BlockLiteral(id));
            }

            Expr::Object { parent, defines } => {
                // `obj -> P { ... }` is P copy, then the defines block run
                // with the fresh object as self.
                self.compile_expr(parent, out);
                let copy = self.strings.intern("copy");
                out.write(Op::Message(0, copy));

                let block = self.compile_defines(defines);
                out.write(Op::BlockLiteral(block));
                let do_sel = self.strings.intern("do ");
                out.write(Op::Message(1, do_sel));
            }

            Expr::Def { receiver, defines } => {
                // `def R { ... }` extends R, creating it as a plain object
                // when the name is unbound: `Ether extend("R") with(block)`.
                let ether = self.strings.intern("Ether");
                out.write(Op::LoadGlobal(ether));
                let name = self.strings.intern(receiver);
                out.write(Op::StringLiteral(name));

                let block = self.compile_defines(defines);
                out.write(Op::BlockLiteral(block));
                let extend = self.strings.intern("extend with ");
                out.write(Op::Message(2, extend));
            }

            Expr::Array(elements) => {
                // An array literal is a constructor send to the Array
                // prototype: `Array new` or `Array with(…)`.
                let array = self.strings.intern("Array");
                out.write(Op::LoadGlobal(array));
                for element in elements {
                    self.compile_expr(element, out);
                }
                let selector = if elements.is_empty() {
                    "new".to_string()
                } else {
                    let mut s = String::from("with");
                    for _ in elements {
                        s.push(' ');
                    }
                    s
                };
                let id = self.strings.intern(&selector);
                out.write(Op::Message(elements.len() as u8, id));
            }

            Expr::Return(value) => {
                // Unwind the current frame, leaving the value on the operand
                // stack.
                self.compile_expr(value, out);
                out.write(Op::EndBlock);
            }
        }
    }

    /// Compiles a defines body into a parameterless block meant to run with
    /// the receiver as self. The block evaluates to self, so a `def`
    /// statement or object literal evaluates to its receiver.
    fn compile_defines(&mut self, defines: &[Define]) -> BlockId {
        let mut code = CodeBlock::new(Vec::new());

        for define in defines {
            self.compile_expr(&define.body, &mut code);
            let id = self.strings.intern(&define.name);
            code.write(Op::DefObject(id));
            code.write(Op::Pop);
        }

        let self_id = self.strings.intern("self");
        code.write(Op::LoadLocal(self_id));
        code.write(Op::EndBlock);

        self.blocks.add(code)
    }
}
