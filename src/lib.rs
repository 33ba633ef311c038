//!
//! Linnet: a small prototype-based, message-passing language.
//!
//! Source text is lexed into tokens, parsed into an expression tree,
//! lowered to bytecode, and run by a stack interpreter with an explicit
//! call stack. Objects delegate unhandled messages along a prototype
//! chain; blocks are first-class closures; the `while do ` loop is staged
//! through synthetic bytecode so it stays overridable from user code.
//!

/// Expression tree node definitions.
pub mod ast;
/// Bytecode: instructions, code blocks, interning tables, the compiler,
/// and a disassembler.
pub mod bytecode;
/// The hand-written lexer.
pub mod lexer;
/// The recursive-descent parser.
pub mod parser;
/// Parse error value type.
pub mod parser_error;
/// The object model, environment, interpreter, and host primitives.
pub mod runtime;
/// Token definitions consumed by the parser.
pub mod token;
