use crate::bytecode::ir::{BlockTable, CodeBlock, StringTable};
use crate::bytecode::op::Op;

/// Renders a compiled program as human-readable text: the top-level code
/// first, then every interned block.
pub fn disassemble(code: &CodeBlock, strings: &StringTable, blocks: &BlockTable) -> String {
    let mut out = String::new();
    write_code("main", code, strings, &mut out);

    for (i, block) in blocks.iter().enumerate() {
        let mut label = format!("block[{}]", i);
        if !block.params.is_empty() {
            label.push_str(" (");
            label.push_str(&block.params.join(" "));
            label.push(')');
        }
        write_code(&label, block, strings, &mut out);
    }

    out
}

fn write_code(label: &str, code: &CodeBlock, strings: &StringTable, out: &mut String) {
    out.push_str("== ");
    out.push_str(label);
    out.push_str(" ==\n");

    for (address, op) in code.code.iter().enumerate() {
        out.push_str(&format!("{:04}  {}\n", address, render_op(*op, strings)));
    }
    out.push('\n');
}

fn render_op(op: Op, strings: &StringTable) -> String {
    match op {
        Op::Nothing => "NOTHING".to_string(),
        Op::NumberLiteral(n) => format!("NUMBER_LITERAL  {}", n),
        Op::StringLiteral(id) => format!("STRING_LITERAL  {:?}", strings.resolve(id)),
        Op::BlockLiteral(id) => format!("BLOCK_LITERAL   block[{}]", id.as_u32()),
        Op::Pop => "POP".to_string(),
        Op::DefGlobal(id) => format!("DEF_GLOBAL      {}", strings.resolve(id)),
        Op::DefObject(id) => format!("DEF_OBJECT      {}", strings.resolve(id)),
        Op::DefLocal(id) => format!("DEF_LOCAL       {}", strings.resolve(id)),
        Op::UndefLocal(id) => format!("UNDEF_LOCAL     {}", strings.resolve(id)),
        Op::SetLocal(id) => format!("SET_LOCAL       {}", strings.resolve(id)),
        Op::LoadGlobal(id) => format!("LOAD_GLOBAL     {}", strings.resolve(id)),
        Op::LoadObject(id) => format!("LOAD_OBJECT     {}", strings.resolve(id)),
        Op::LoadLocal(id) => format!("LOAD_LOCAL      {}", strings.resolve(id)),
        Op::Message(arity, id) => {
            format!("MESSAGE_{}       {:?}", arity, strings.resolve(id))
        }
        Op::Loop1 => "LOOP_1".to_string(),
        Op::Loop2 => "LOOP_2".to_string(),
        Op::Loop3 => "LOOP_3".to_string(),
        Op::Loop4 => "LOOP_4".to_string(),
        Op::EndBlock => "END_BLOCK".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::compile::Compiler;
    use crate::lexer::Lexer;
    use crate::parser::Parser;

    fn disassemble_source(source: &str) -> String {
        let tokens = Lexer::new(source).tokenize().unwrap();
        let expr = Parser::new(tokens).parse().unwrap();

        let mut strings = StringTable::new();
        let mut blocks = BlockTable::new();
        let code = Compiler::new(&mut strings, &mut blocks).compile(&expr);
        disassemble(&code, &strings, &blocks)
    }

    #[test]
    fn test_renders_literals_and_names() {
        let text = disassemble_source(r#"var x = 1; write("hi")"#);
        assert!(text.contains("NUMBER_LITERAL  1"));
        assert!(text.contains("DEF_LOCAL       x"));
        assert!(text.contains("LOAD_GLOBAL     Ether"));
        assert!(text.contains("STRING_LITERAL  \"hi\""));
        assert!(text.contains("MESSAGE_1       \"write \""));
        assert!(text.contains("END_BLOCK"));
    }

    #[test]
    fn test_renders_nested_blocks_with_params() {
        let text = disassemble_source("var b = { x -> x + 1 }");
        assert!(text.contains("BLOCK_LITERAL   block[0]"));
        assert!(text.contains("== block[0] (x) =="));
    }
}
