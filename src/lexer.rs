use crate::token::Token;

#[derive(Debug, Clone)]
pub struct Span {
    pub line: usize,
    pub col: usize,
}

#[derive(Debug, Clone)]
pub struct Spanned {
    pub token: Token,
    pub span: Span,
}

#[derive(Debug)]
pub struct LexerError {
    pub message: String,
    pub line: usize,
    pub col: usize,
}

impl std::fmt::Display for LexerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}: {}", self.line, self.col, self.message)
    }
}

/// Characters that make up operator tokens. Names are alphanumeric plus
/// underscore; everything an operator can be built from lives here.
const OPERATOR_CHARS: &str = "+-*/%<>=!&|~^?:";

pub struct Lexer {
    source: Vec<char>,
    pos: usize,
    line: usize,
    col: usize,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Lexer {
            source: source.chars().collect(),
            pos: 0,
            line: 1,
            col: 1,
        }
    }

    fn current(&self) -> Option<char> {
        self.source.get(self.pos).copied()
    }

    fn peek(&self) -> Option<char> {
        self.source.get(self.pos + 1).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.current();
        if ch == Some('\n') {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        self.pos += 1;
        ch
    }

    fn span(&self) -> Span {
        Span {
            line: self.line,
            col: self.col,
        }
    }

    fn error(&self, message: impl Into<String>) -> LexerError {
        LexerError {
            message: message.into(),
            line: self.line,
            col: self.col,
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.current() {
            if ch == ' ' || ch == '\t' || ch == '\r' {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn skip_line_comment(&mut self) {
        while let Some(ch) = self.current() {
            if ch == '\n' {
                break;
            }
            self.advance();
        }
    }

    fn read_string(&mut self) -> Result<Token, LexerError> {
        self.advance(); // opening quote

        let mut string = String::new();
        loop {
            match self.current() {
                Some('"') => {
                    self.advance();
                    return Ok(Token::String(string));
                }
                Some('\\') => {
                    self.advance();
                    match self.current() {
                        Some('n') => string.push('\n'),
                        Some('t') => string.push('\t'),
                        Some('r') => string.push('\r'),
                        Some('\\') => string.push('\\'),
                        Some('"') => string.push('"'),
                        Some('0') => string.push('\0'),
                        Some(ch) => {
                            return Err(self.error(format!("unknown escape sequence: \\{}", ch)));
                        }
                        None => {
                            return Err(self.error("unterminated string"));
                        }
                    }
                    self.advance();
                }
                Some(ch) => {
                    string.push(ch);
                    self.advance();
                }
                None => {
                    return Err(self.error("unterminated string"));
                }
            }
        }
    }

    fn read_number(&mut self) -> Result<Token, LexerError> {
        let mut text = String::new();
        while let Some(ch) = self.current() {
            if ch.is_ascii_digit() {
                text.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        // A fractional part needs a digit after the dot, otherwise the dot
        // belongs to a following unary message.
        if self.current() == Some('.') && self.peek().map(|c| c.is_ascii_digit()) == Some(true) {
            text.push('.');
            self.advance();
            while let Some(ch) = self.current() {
                if ch.is_ascii_digit() {
                    text.push(ch);
                    self.advance();
                } else {
                    break;
                }
            }
        }

        text.parse::<f64>()
            .map(Token::Number)
            .map_err(|_| self.error(format!("invalid number literal: {}", text)))
    }

    fn read_name(&mut self) -> Token {
        let mut text = String::new();
        while let Some(ch) = self.current() {
            if ch.is_ascii_alphanumeric() || ch == '_' {
                text.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        match text.as_str() {
            "def" => Token::Def,
            "obj" => Token::Obj,
            "var" => Token::Var,
            "return" => Token::Return,
            "self" => Token::SelfTok,
            "undefined" => Token::Undefined,
            _ => Token::Name(text),
        }
    }

    fn read_operator(&mut self) -> Token {
        let mut text = String::new();
        while let Some(ch) = self.current() {
            // A comment can start right after an operator: `1 +// note`.
            if ch == '/' && self.peek() == Some('/') {
                break;
            }
            if OPERATOR_CHARS.contains(ch) {
                text.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        match text.as_str() {
            "=" => Token::Eq,
            "->" => Token::Arrow,
            _ => Token::Operator(text),
        }
    }

    pub fn tokenize(&mut self) -> Result<Vec<Spanned>, LexerError> {
        let mut tokens = Vec::new();

        loop {
            self.skip_whitespace();

            let span = self.span();
            let ch = match self.current() {
                Some(ch) => ch,
                None => {
                    tokens.push(Spanned {
                        token: Token::Eof,
                        span,
                    });
                    return Ok(tokens);
                }
            };

            let token = match ch {
                '\n' => {
                    self.advance();
                    Token::Semicolon
                }
                ';' => {
                    self.advance();
                    Token::Semicolon
                }
                ',' => {
                    self.advance();
                    Token::Comma
                }
                '.' => {
                    self.advance();
                    Token::Dot
                }
                '(' => {
                    self.advance();
                    Token::LeftParen
                }
                ')' => {
                    self.advance();
                    Token::RightParen
                }
                '{' => {
                    self.advance();
                    Token::LeftBrace
                }
                '}' => {
                    self.advance();
                    Token::RightBrace
                }
                '[' => {
                    self.advance();
                    Token::LeftBracket
                }
                ']' => {
                    self.advance();
                    Token::RightBracket
                }
                '"' => self.read_string()?,
                '/' if self.peek() == Some('/') => {
                    self.skip_line_comment();
                    continue;
                }
                _ if ch.is_ascii_digit() => self.read_number()?,
                _ if ch.is_ascii_alphabetic() || ch == '_' => self.read_name(),
                _ if OPERATOR_CHARS.contains(ch) => self.read_operator(),
                _ => {
                    return Err(self.error(format!("unexpected character: {:?}", ch)));
                }
            };

            tokens.push(Spanned { token, span });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(source: &str) -> Vec<Token> {
        let mut lexer = Lexer::new(source);
        lexer
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|s| s.token)
            .collect()
    }

    #[test]
    fn test_names_and_numbers() {
        let tokens = lex("counter 42 3.5");
        assert_eq!(
            tokens,
            vec![
                Token::Name("counter".to_string()),
                Token::Number(42.0),
                Token::Number(3.5),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_keywords() {
        let tokens = lex("def obj var return self undefined");
        assert_eq!(
            tokens,
            vec![
                Token::Def,
                Token::Obj,
                Token::Var,
                Token::Return,
                Token::SelfTok,
                Token::Undefined,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_field_name() {
        let tokens = lex("_x");
        assert!(tokens[0].is_field_name());
        assert_eq!(tokens[0], Token::Name("_x".to_string()));
    }

    #[test]
    fn test_operators_vs_eq_and_arrow() {
        let tokens = lex("a = b -> c == d <= e");
        assert_eq!(
            tokens,
            vec![
                Token::Name("a".to_string()),
                Token::Eq,
                Token::Name("b".to_string()),
                Token::Arrow,
                Token::Name("c".to_string()),
                Token::Operator("==".to_string()),
                Token::Name("d".to_string()),
                Token::Operator("<=".to_string()),
                Token::Name("e".to_string()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_string_escapes() {
        let tokens = lex(r#""a\nb\"c""#);
        assert_eq!(tokens[0], Token::String("a\nb\"c".to_string()));
    }

    #[test]
    fn test_unterminated_string() {
        let mut lexer = Lexer::new("\"oops");
        assert!(lexer.tokenize().is_err());
    }

    #[test]
    fn test_newline_is_separator() {
        let tokens = lex("a\nb;c");
        assert_eq!(
            tokens,
            vec![
                Token::Name("a".to_string()),
                Token::Semicolon,
                Token::Name("b".to_string()),
                Token::Semicolon,
                Token::Name("c".to_string()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_line_comment_skipped() {
        let tokens = lex("a // the rest is ignored\nb");
        assert_eq!(
            tokens,
            vec![
                Token::Name("a".to_string()),
                Token::Semicolon,
                Token::Name("b".to_string()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_comment_directly_after_operator() {
        let tokens = lex("1 +// the rest\n2");
        assert_eq!(
            tokens,
            vec![
                Token::Number(1.0),
                Token::Operator("+".to_string()),
                Token::Semicolon,
                Token::Number(2.0),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_number_dot_message() {
        // "1.floor" is the number 1 followed by a unary send, not "1." as a
        // malformed float.
        let tokens = lex("1.floor");
        assert_eq!(
            tokens,
            vec![
                Token::Number(1.0),
                Token::Dot,
                Token::Name("floor".to_string()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_punctuation() {
        let tokens = lex("( ) { } [ ] , .");
        assert_eq!(
            tokens,
            vec![
                Token::LeftParen,
                Token::RightParen,
                Token::LeftBrace,
                Token::RightBrace,
                Token::LeftBracket,
                Token::RightBracket,
                Token::Comma,
                Token::Dot,
                Token::Eof,
            ]
        );
    }
}
