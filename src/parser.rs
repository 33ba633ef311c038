use crate::ast::{Define, Expr};
use crate::lexer::{Span, Spanned};
use crate::parser_error::ParserError;
use crate::token::Token;

/// Recursive-descent parser for Linnet.
///
/// The parser consumes a stream of lexed `Spanned` tokens and produces a
/// single expression tree (a whole program is one expression sequence).
/// Message sends are disambiguated here:
///
/// - `a b` and `a.b` are unary sends (`b` to `a`),
/// - `a + b` is a binary-operator send (single precedence level,
///   left-associative),
/// - `x.foo(1) bar(2)` and `x foo(1) bar(2)` are keyword sends whose parts
///   concatenate into one mixfix selector (`foo bar `, one trailing space
///   per argument slot),
/// - a bare `name(args)` or `name { block }` at the start of a message is a
///   send to the implicit receiver `Ether`.
///
/// Errors are collected rather than returned early; `parse` reports a best
/// effort over the whole input and yields `None` if anything went wrong.
pub struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    /// Span of the most recently consumed token, for errors at end of input.
    last_span: Option<Span>,
    errors: Vec<ParserError>,
}

/// A message send carries at most this many arguments.
pub const MAX_MESSAGE_ARGS: usize = 10;

impl Parser {
    pub fn new(tokens: Vec<Spanned>) -> Self {
        Parser {
            tokens,
            pos: 0,
            last_span: None,
            errors: Vec::new(),
        }
    }

    /// Parses the whole token stream as one expression sequence.
    ///
    /// Returns `None` if any parse error occurred; the individual errors are
    /// available through [`errors`](Self::errors).
    pub fn parse(&mut self) -> Option<Expr> {
        let expr = self.expression();
        if !self.check(&Token::Eof) {
            self.error("parser ended unexpectedly before reaching end of input");
        }

        if self.errors.is_empty() {
            Some(expr)
        } else {
            None
        }
    }

    pub fn errors(&self) -> &[ParserError] {
        &self.errors
    }

    // Token plumbing

    fn current(&self) -> Option<&Spanned> {
        self.tokens.get(self.pos)
    }

    fn token_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset).map(|s| &s.token)
    }

    fn advance(&mut self) -> Option<&Spanned> {
        let token = self.tokens.get(self.pos);
        if let Some(s) = token {
            self.last_span = Some(s.span.clone());
        }
        self.pos += 1;
        token
    }

    fn check(&self, token: &Token) -> bool {
        self.token_at(0) == Some(token)
    }

    fn check_name(&self) -> bool {
        matches!(self.token_at(0), Some(Token::Name(_)))
    }

    /// True when the current token is a name and the next one is `after`.
    fn check_name_then(&self, after: &Token) -> bool {
        self.check_name() && self.token_at(1) == Some(after)
    }

    /// True when the current name opens a keyword send: `name(` or `name {`.
    fn check_keyword_start(&self) -> bool {
        self.check_name_then(&Token::LeftParen) || self.check_name_then(&Token::LeftBrace)
    }

    fn match_token(&mut self, token: &Token) -> bool {
        if self.check(token) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Consumes one or more statement separators (`;` or newline).
    fn match_separator(&mut self) -> bool {
        let mut matched = false;
        while self.match_token(&Token::Semicolon) {
            matched = true;
        }
        matched
    }

    fn expect(&mut self, token: &Token, message: &str) -> bool {
        if self.match_token(token) {
            true
        } else {
            self.error(message);
            false
        }
    }

    fn consume_name(&mut self, message: &str) -> String {
        match self.token_at(0) {
            Some(Token::Name(name)) => {
                let name = name.clone();
                self.advance();
                name
            }
            _ => {
                self.error(message);
                "ERROR".to_string()
            }
        }
    }

    /// Records a parse error at the most relevant location.
    fn error(&mut self, message: &str) {
        let (line, col) = if let Some(spanned) = self.current() {
            (spanned.span.line, spanned.span.col)
        } else if let Some(span) = &self.last_span {
            (span.line, span.col)
        } else {
            (1, 1)
        };

        self.errors.push(ParserError {
            message: message.to_string(),
            line,
            col,
        });
    }

    /// A placeholder returned after an error so parsing can continue and
    /// surface further problems.
    fn error_expr(&self) -> Expr {
        Expr::String("ERROR".to_string())
    }

    // Grammar rules

    /// `expression ::= sequence [ ";" ]`
    fn expression(&mut self) -> Expr {
        let expr = self.sequence();
        self.match_separator();
        expr
    }

    /// `sequence ::= statement { ";" statement } [ ";" ]`
    fn sequence(&mut self) -> Expr {
        // Leading separators (blank lines) are dropped.
        self.match_separator();

        let mut exprs = Vec::new();

        loop {
            exprs.push(self.statement());

            if !self.match_separator() {
                break;
            }

            // There may be a trailing separator after the last statement in a
            // block. If we ate it and now see a closer or the end of input,
            // stop here.
            if self.check(&Token::RightParen)
                || self.check(&Token::RightBracket)
                || self.check(&Token::RightBrace)
                || self.check(&Token::Eof)
            {
                break;
            }
        }

        // A sequence of one collapses to its single statement.
        if exprs.len() == 1 {
            exprs.pop().unwrap()
        } else {
            Expr::Sequence(exprs)
        }
    }

    /// `statement ::= def_stmt | named_obj | var_decl | return_stmt | assignment`
    fn statement(&mut self) -> Expr {
        if self.match_token(&Token::Def) {
            let receiver = self.consume_name("expect name after 'def'");
            self.expect(&Token::LeftBrace, "expect '{' after definition receiver");
            let defines = self.parse_defines();
            return Expr::Def { receiver, defines };
        }

        // Named object: sugar for `var NAME = <object literal>`.
        if self.check(&Token::Obj) && matches!(self.token_at(1), Some(Token::Name(_))) {
            self.advance(); // "obj"
            let name = self.consume_name("expect name after 'obj'");
            let object = self.object_literal();
            return Expr::Var {
                name,
                value: Box::new(object),
            };
        }

        if self.match_token(&Token::Var) {
            let name = self.consume_name("expect name after 'var'");
            self.expect(&Token::Eq, "expect '=' after variable name");

            if self.match_token(&Token::Undefined) {
                return Expr::Undefine(name);
            }

            let value = self.assignment();
            return Expr::Var {
                name,
                value: Box::new(value),
            };
        }

        if self.match_token(&Token::Return) {
            // A bare return before a separator or closer returns nil.
            let result = if self.check(&Token::Semicolon)
                || self.check(&Token::RightParen)
                || self.check(&Token::RightBrace)
                || self.check(&Token::RightBracket)
                || self.check(&Token::Eof)
            {
                Expr::Name("nil".to_string())
            } else {
                self.assignment()
            };
            return Expr::Return(Box::new(result));
        }

        self.assignment()
    }

    /// `assignment ::= NAME "=" assignment | operator_expr`
    fn assignment(&mut self) -> Expr {
        if self.check_name_then(&Token::Eq) {
            let name = self.consume_name("expect name");
            self.advance(); // "="
            let value = self.assignment();
            return Expr::Set {
                name,
                value: Box::new(value),
            };
        }

        self.operator()
    }

    /// `operator_expr ::= message { OPERATOR message }`
    ///
    /// All operators share a single precedence level and associate left, so
    /// `1 + 2 * 3` is `(1 + 2) * 3`.
    fn operator(&mut self) -> Expr {
        let mut object = self.message();

        while let Some(Token::Operator(op)) = self.token_at(0) {
            let op = op.clone();
            self.advance();
            let arg = self.message();
            object = Expr::Message {
                receiver: Box::new(object),
                selector: op,
                args: vec![arg],
            };
        }

        object
    }

    /// `message ::= ( ether_send | primary ) postfix*`
    fn message(&mut self) -> Expr {
        let mut object = if self.check_keyword_start() {
            // A bare `name(...)` or `name {...}` is a send to Ether.
            self.keyword_send(Expr::Name("Ether".to_string()))
        } else {
            self.primary()
        };

        loop {
            if self.match_token(&Token::Dot) {
                if self.check_keyword_start() {
                    object = self.keyword_send(object);
                } else {
                    let name = self.consume_name("expect message name after '.'");
                    object = Expr::Message {
                        receiver: Box::new(object),
                        selector: name,
                        args: Vec::new(),
                    };
                }
            } else if self.check_keyword_start() {
                object = self.keyword_send(object);
            } else if self.check_name() {
                // Juxtaposed unary send: `point x`, `Dog speak`.
                let name = self.consume_name("expect message name");
                object = Expr::Message {
                    receiver: Box::new(object),
                    selector: name,
                    args: Vec::new(),
                };
            } else {
                break;
            }
        }

        object
    }

    /// One or more `NAME (args)` / `NAME { block }` pairs, concatenated into
    /// a single mixfix selector with one trailing space per argument slot.
    fn keyword_send(&mut self, receiver: Expr) -> Expr {
        let mut selector = String::new();
        let mut args = Vec::new();

        loop {
            selector.push_str(&self.consume_name("expect message name"));

            if self.match_token(&Token::LeftBrace) {
                // A brace-enclosed block is a single argument.
                args.push(self.block_literal());
                selector.push(' ');
            } else {
                self.expect(&Token::LeftParen, "expect '(' after message name");

                loop {
                    args.push(self.assignment());
                    selector.push(' ');
                    if !self.match_token(&Token::Comma) {
                        break;
                    }
                }

                self.expect(&Token::RightParen, "expect ')' after argument");
            }

            if !self.check_keyword_start() {
                break;
            }
        }

        if args.len() > MAX_MESSAGE_ARGS {
            self.error("a message cannot have more than 10 arguments");
        }

        Expr::Message {
            receiver: Box::new(receiver),
            selector,
            args,
        }
    }

    /// `primary ::= NAME | NUMBER | STRING | "self" | "(" assignment ")"
    ///            | obj_literal | "[" elements "]" | "{" block "}"`
    fn primary(&mut self) -> Expr {
        match self.token_at(0) {
            Some(Token::Name(name)) => {
                let name = name.clone();
                self.advance();
                Expr::Name(name)
            }
            Some(Token::Number(value)) => {
                let value = *value;
                self.advance();
                Expr::Number(value)
            }
            Some(Token::String(text)) => {
                let text = text.clone();
                self.advance();
                Expr::String(text)
            }
            Some(Token::SelfTok) => {
                self.advance();
                Expr::SelfRef
            }
            Some(Token::LeftParen) => {
                self.advance();
                let expr = self.assignment();
                self.expect(&Token::RightParen, "expect closing ')'");
                expr
            }
            Some(Token::Obj) => {
                self.advance();
                self.object_literal()
            }
            Some(Token::LeftBracket) => {
                self.advance();
                self.array_literal()
            }
            Some(Token::LeftBrace) => {
                self.advance();
                self.block_literal()
            }
            _ => {
                self.error("unexpected token");
                self.error_expr()
            }
        }
    }

    /// The rest of an object literal, after the caller consumed `obj`.
    fn object_literal(&mut self) -> Expr {
        let parent = if self.match_token(&Token::Arrow) {
            self.primary()
        } else {
            Expr::Name("Object".to_string())
        };

        self.expect(&Token::LeftBrace, "expect '{' after 'obj'");

        let defines = if self.match_token(&Token::RightBrace) {
            Vec::new()
        } else {
            self.parse_defines()
        };

        Expr::Object {
            parent: Box::new(parent),
            defines,
        }
    }

    /// `"[" [ assignment { "," assignment } ] "]"`, with the `[` already consumed.
    fn array_literal(&mut self) -> Expr {
        let mut elements = Vec::new();

        if !self.check(&Token::RightBracket) {
            loop {
                elements.push(self.assignment());
                if !self.match_token(&Token::Comma) {
                    break;
                }
            }
        }

        self.expect(&Token::RightBracket, "expect closing ']'");

        if elements.len() > MAX_MESSAGE_ARGS {
            self.error("an array literal cannot have more than 10 elements");
        }

        Expr::Array(elements)
    }

    /// `block_body ::= [ NAME+ "->" ] expression`, with the `{` already consumed.
    fn block_literal(&mut self) -> Expr {
        let mut params = Vec::new();

        // A parameter list is a run of names followed by "->".
        let mut count = 0;
        while matches!(self.token_at(count), Some(Token::Name(_))) {
            count += 1;
        }

        if count > 0 && self.token_at(count) == Some(&Token::Arrow) {
            for _ in 0..count {
                params.push(self.consume_name("expect parameter name"));
            }
            self.advance(); // "->"
        }

        let body = self.expression();
        self.expect(&Token::RightBrace, "expect closing '}' after block");

        Expr::Block {
            params,
            body: Box::new(body),
        }
    }

    /// The body of a `def` statement or object literal, up to the closing
    /// brace. Entries are separated by `;` or newlines; blank lines around
    /// them are dropped.
    fn parse_defines(&mut self) -> Vec<Define> {
        let mut defines = Vec::new();

        loop {
            self.match_separator();
            if self.match_token(&Token::RightBrace) {
                break;
            }
            if self.check(&Token::Eof) {
                self.error("unexpected end of input in definition body");
                break;
            }

            let before = self.pos;
            self.parse_define(&mut defines);

            if self.match_token(&Token::RightBrace) {
                break;
            }
            if !self.match_separator() {
                self.error("definitions should be separated by newlines (or ';')");
                if self.pos == before {
                    // No progress; skip the offending token so we terminate.
                    self.advance();
                }
            }
        }

        defines
    }

    /// One defines entry: a field/accessor, a unary method, a mixfix method,
    /// or a binary-operator method.
    fn parse_define(&mut self, defines: &mut Vec<Define>) {
        if self.check_name_then(&Token::Eq) {
            // Field or accessor definition.
            let mut name = self.consume_name("expect name");
            self.advance(); // "="
            let body = self.assignment();

            // A field name like "_foo" defines just that slot. A plain name
            // like "foo" defines the slot "_foo" plus a zero-argument
            // accessor method "foo" that reads it.
            if !Expr::is_field(&name) {
                let field = format!("_{}", name);
                let accessor = Expr::Block {
                    params: Vec::new(),
                    body: Box::new(Expr::Name(field.clone())),
                };
                defines.push(Define {
                    is_method: true,
                    name,
                    body: accessor,
                });
                name = field;
            }

            defines.push(Define {
                is_method: false,
                name,
                body,
            });
        } else if self.check_name_then(&Token::LeftBrace) {
            // Unary method.
            let name = self.consume_name("expect method name");
            self.parse_define_body(defines, name, Vec::new());
        } else if self.check_name() {
            // Mixfix method: `at(i) put(v) { ... }`.
            let mut name = String::new();
            let mut params = Vec::new();

            while self.check_name() {
                name.push_str(&self.consume_name("expect method name"));
                self.expect(&Token::LeftParen, "expect '(' after method name");

                loop {
                    params.push(self.consume_name("expect parameter name after '('"));
                    name.push(' ');
                    if !self.match_token(&Token::Comma) {
                        break;
                    }
                }

                self.expect(&Token::RightParen, "expect ')' after parameter");
            }

            self.parse_define_body(defines, name, params);
        } else if let Some(Token::Operator(op)) = self.token_at(0) {
            // Binary-operator method with a single parameter.
            let name = op.clone();
            self.advance();
            let param = self.consume_name("expect parameter name after operator");
            self.parse_define_body(defines, name, vec![param]);
        } else {
            self.error("expect definition");
        }
    }

    fn parse_define_body(&mut self, defines: &mut Vec<Define>, name: String, params: Vec<String>) {
        self.expect(&Token::LeftBrace, "expect '{' to begin method body");
        let body = self.expression();
        self.expect(&Token::RightBrace, "expect '}' to close method body");

        defines.push(Define {
            is_method: true,
            name,
            body: Expr::Block {
                params,
                body: Box::new(body),
            },
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;

    fn parse(source: &str) -> Expr {
        let mut lexer = Lexer::new(source);
        let tokens = lexer.tokenize().unwrap();
        let mut parser = Parser::new(tokens);
        match parser.parse() {
            Some(expr) => expr,
            None => panic!("parse errors: {:?}", parser.errors()),
        }
    }

    fn parse_errors(source: &str) -> Vec<ParserError> {
        let mut lexer = Lexer::new(source);
        let tokens = lexer.tokenize().unwrap();
        let mut parser = Parser::new(tokens);
        assert!(parser.parse().is_none(), "expected a parse failure");
        parser.errors().to_vec()
    }

    fn unary(receiver: Expr, selector: &str) -> Expr {
        Expr::Message {
            receiver: Box::new(receiver),
            selector: selector.to_string(),
            args: Vec::new(),
        }
    }

    fn name(text: &str) -> Expr {
        Expr::Name(text.to_string())
    }

    #[test]
    fn test_unary_send_juxtaposed() {
        assert_eq!(parse("Dog speak"), unary(name("Dog"), "speak"));
    }

    #[test]
    fn test_unary_send_dotted() {
        assert_eq!(parse("a.b.c"), unary(unary(name("a"), "b"), "c"));
    }

    #[test]
    fn test_operator_on_unary_sends() {
        // `a b + c d` is a binary message between two unary sends.
        let expr = parse("a b + c d");
        assert_eq!(
            expr,
            Expr::Message {
                receiver: Box::new(unary(name("a"), "b")),
                selector: "+".to_string(),
                args: vec![unary(name("c"), "d")],
            }
        );
    }

    #[test]
    fn test_operators_left_associative() {
        let expr = parse("a + b + c");
        let inner = Expr::Message {
            receiver: Box::new(name("a")),
            selector: "+".to_string(),
            args: vec![name("b")],
        };
        assert_eq!(
            expr,
            Expr::Message {
                receiver: Box::new(inner),
                selector: "+".to_string(),
                args: vec![name("c")],
            }
        );
    }

    #[test]
    fn test_mixfix_selector_assembly() {
        let expr = parse("x.foo(1) bar(2)");
        assert_eq!(
            expr,
            Expr::Message {
                receiver: Box::new(name("x")),
                selector: "foo bar ".to_string(),
                args: vec![Expr::Number(1.0), Expr::Number(2.0)],
            }
        );
    }

    #[test]
    fn test_keyword_send_without_dot() {
        let expr = parse("b call(41)");
        assert_eq!(
            expr,
            Expr::Message {
                receiver: Box::new(name("b")),
                selector: "call ".to_string(),
                args: vec![Expr::Number(41.0)],
            }
        );
    }

    #[test]
    fn test_bare_keyword_send_goes_to_ether() {
        let expr = parse(r#"write("hi")"#);
        assert_eq!(
            expr,
            Expr::Message {
                receiver: Box::new(name("Ether")),
                selector: "write ".to_string(),
                args: vec![Expr::String("hi".to_string())],
            }
        );
    }

    #[test]
    fn test_block_arguments() {
        let expr = parse("while { a } do { b }");
        match expr {
            Expr::Message {
                receiver,
                selector,
                args,
            } => {
                assert_eq!(*receiver, name("Ether"));
                assert_eq!(selector, "while do ");
                assert_eq!(args.len(), 2);
                assert!(matches!(&args[0], Expr::Block { params, .. } if params.is_empty()));
                assert!(matches!(&args[1], Expr::Block { params, .. } if params.is_empty()));
            }
            other => panic!("expected a message, got {:?}", other),
        }
    }

    #[test]
    fn test_block_parameters() {
        let expr = parse("{ x y -> x }");
        assert_eq!(
            expr,
            Expr::Block {
                params: vec!["x".to_string(), "y".to_string()],
                body: Box::new(name("x")),
            }
        );
    }

    #[test]
    fn test_field_accessor_desugaring() {
        let expr = parse("def Point { x = 0 }");
        match expr {
            Expr::Def { receiver, defines } => {
                assert_eq!(receiver, "Point");
                assert_eq!(defines.len(), 2);

                // The accessor method comes first, then the field slot.
                assert!(defines[0].is_method);
                assert_eq!(defines[0].name, "x");
                assert_eq!(
                    defines[0].body,
                    Expr::Block {
                        params: Vec::new(),
                        body: Box::new(name("_x")),
                    }
                );

                assert!(!defines[1].is_method);
                assert_eq!(defines[1].name, "_x");
                assert_eq!(defines[1].body, Expr::Number(0.0));
            }
            other => panic!("expected a def, got {:?}", other),
        }
    }

    #[test]
    fn test_explicit_field_defines_only_the_slot() {
        let expr = parse("def Point { _x = 0 }");
        match expr {
            Expr::Def { defines, .. } => {
                assert_eq!(defines.len(), 1);
                assert!(!defines[0].is_method);
                assert_eq!(defines[0].name, "_x");
            }
            other => panic!("expected a def, got {:?}", other),
        }
    }

    #[test]
    fn test_mixfix_method_define() {
        let expr = parse("def Point { at(i) put(v) { v } }");
        match expr {
            Expr::Def { defines, .. } => {
                assert_eq!(defines.len(), 1);
                assert_eq!(defines[0].name, "at put ");
                assert!(matches!(
                    &defines[0].body,
                    Expr::Block { params, .. }
                        if params == &["i".to_string(), "v".to_string()]
                ));
            }
            other => panic!("expected a def, got {:?}", other),
        }
    }

    #[test]
    fn test_operator_method_define() {
        let expr = parse("def Point { + other { other } }");
        match expr {
            Expr::Def { defines, .. } => {
                assert_eq!(defines.len(), 1);
                assert_eq!(defines[0].name, "+");
                assert!(matches!(
                    &defines[0].body,
                    Expr::Block { params, .. } if params == &["other".to_string()]
                ));
            }
            other => panic!("expected a def, got {:?}", other),
        }
    }

    #[test]
    fn test_named_object_sugar() {
        let expr = parse("obj Dog -> Animal { }");
        match expr {
            Expr::Var { name: var, value } => {
                assert_eq!(var, "Dog");
                assert!(matches!(
                    *value,
                    Expr::Object { ref parent, ref defines }
                        if **parent == name("Animal") && defines.is_empty()
                ));
            }
            other => panic!("expected a var, got {:?}", other),
        }
    }

    #[test]
    fn test_object_parent_defaults_to_object() {
        let expr = parse("obj Dog { }");
        match expr {
            Expr::Var { value, .. } => {
                assert!(matches!(
                    *value,
                    Expr::Object { ref parent, .. } if **parent == name("Object")
                ));
            }
            other => panic!("expected a var, got {:?}", other),
        }
    }

    #[test]
    fn test_var_and_set() {
        assert_eq!(
            parse("var x = 1"),
            Expr::Var {
                name: "x".to_string(),
                value: Box::new(Expr::Number(1.0)),
            }
        );
        assert_eq!(
            parse("x = 1"),
            Expr::Set {
                name: "x".to_string(),
                value: Box::new(Expr::Number(1.0)),
            }
        );
    }

    #[test]
    fn test_var_undefined() {
        assert_eq!(parse("var x = undefined"), Expr::Undefine("x".to_string()));
    }

    #[test]
    fn test_bare_return_is_nil() {
        assert_eq!(parse("return;"), Expr::Return(Box::new(name("nil"))));
        assert_eq!(
            parse("{ return }"),
            Expr::Block {
                params: Vec::new(),
                body: Box::new(Expr::Return(Box::new(name("nil")))),
            }
        );
    }

    #[test]
    fn test_return_with_value() {
        assert_eq!(
            parse("return 1 + 2;"),
            Expr::Return(Box::new(Expr::Message {
                receiver: Box::new(Expr::Number(1.0)),
                selector: "+".to_string(),
                args: vec![Expr::Number(2.0)],
            }))
        );
    }

    #[test]
    fn test_sequence_and_collapse() {
        assert_eq!(parse("1"), Expr::Number(1.0));

        let expr = parse("1; 2; 3");
        assert!(matches!(expr, Expr::Sequence(ref exprs) if exprs.len() == 3));
    }

    #[test]
    fn test_repeated_separators_parse_identically() {
        let canonical = parse("1; 2");
        assert_eq!(parse("1;;;2"), canonical);
        assert_eq!(parse("\n\n1\n\n2\n\n"), canonical);
        assert_eq!(parse("1; 2;"), canonical);
    }

    #[test]
    fn test_trailing_separator_in_block() {
        let expr = parse("{ a; b; }");
        assert!(matches!(
            expr,
            Expr::Block { ref body, .. } if matches!(**body, Expr::Sequence(ref s) if s.len() == 2)
        ));
    }

    #[test]
    fn test_parenthesized_expression() {
        let expr = parse("(1 + 2) * 3");
        match expr {
            Expr::Message {
                receiver, selector, ..
            } => {
                assert_eq!(selector, "*");
                assert!(matches!(
                    *receiver,
                    Expr::Message { ref selector, .. } if selector == "+"
                ));
            }
            other => panic!("expected a message, got {:?}", other),
        }
    }

    #[test]
    fn test_array_literal() {
        assert_eq!(parse("[]"), Expr::Array(Vec::new()));
        assert_eq!(
            parse("[1, 2]"),
            Expr::Array(vec![Expr::Number(1.0), Expr::Number(2.0)])
        );
    }

    #[test]
    fn test_self_primary() {
        assert_eq!(parse("self"), Expr::SelfRef);
    }

    #[test]
    fn test_missing_var_name_reports_error() {
        let errors = parse_errors("var = 3");
        assert!(!errors.is_empty());
        assert!(errors[0].message.contains("expect name after 'var'"));
    }

    #[test]
    fn test_error_recovery_surfaces_multiple_errors() {
        // Both defines are malformed; the parser should report more than one
        // problem instead of stopping at the first.
        let errors = parse_errors("def A { = 1; = 2 }");
        assert!(errors.len() >= 2);
    }

    #[test]
    fn test_unclosed_block_reports_error() {
        let errors = parse_errors("{ 1 + 2");
        assert!(errors.iter().any(|e| e.message.contains("'}'")));
    }
}
