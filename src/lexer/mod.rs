use logos::Logos;
use crate::error::{MjResult, SourceLocation, Span, lexer_error};
use std::fmt;

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
#[logos(skip r"//[^\n]*")]
#[logos(skip r"/\*([^*]|\*+[^*/])*\*+/")]
pub enum Token {
    // 关键字
    #[token("class")]
    Class,
    #[token("public")]
    Public,
    #[token("static")]
    Static,
    #[token("void")]
    Void,
    #[token("main")]
    Main,
    #[token("String")]
    StringKw,
    #[token("extends")]
    Extends,
    #[token("return")]
    Return,
    #[token("int")]
    Int,
    #[token("boolean")]
    Boolean,
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("while")]
    While,
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("this")]
    This,
    #[token("new")]
    New,
    #[token("enum")]
    Enum,
    #[token("System.out.println")]
    Println,
    #[token(".length")]
    Length,

    // 字面量与标识符
    #[regex(r"[0-9]+", |lex| lex.slice().parse::<i32>().ok())]
    IntegerLiteral(i32),
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_string())]
    Identifier(String),

    // 运算符
    #[token("&&")]
    And,
    #[token("<")]
    Lt,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("**")]
    Power,
    #[token("*")]
    Star,
    #[token("!")]
    Bang,
    #[token("=")]
    Assign,

    // 分隔符
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(";")]
    Semicolon,
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,

    /// 输入结束标记，由 [`Lexer::tokenize`] 追加
    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Token::Class => "class",
            Token::Public => "public",
            Token::Static => "static",
            Token::Void => "void",
            Token::Main => "main",
            Token::StringKw => "String",
            Token::Extends => "extends",
            Token::Return => "return",
            Token::Int => "int",
            Token::Boolean => "boolean",
            Token::If => "if",
            Token::Else => "else",
            Token::While => "while",
            Token::True => "true",
            Token::False => "false",
            Token::This => "this",
            Token::New => "new",
            Token::Enum => "enum",
            Token::Println => "System.out.println",
            Token::Length => ".length",
            Token::IntegerLiteral(value) => return write!(f, "{}", value),
            Token::Identifier(name) => return write!(f, "identifier '{}'", name),
            Token::And => "&&",
            Token::Lt => "<",
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Power => "**",
            Token::Star => "*",
            Token::Bang => "!",
            Token::Assign => "=",
            Token::LParen => "(",
            Token::RParen => ")",
            Token::LBrace => "{",
            Token::RBrace => "}",
            Token::LBracket => "[",
            Token::RBracket => "]",
            Token::Semicolon => ";",
            Token::Comma => ",",
            Token::Dot => ".",
            Token::Eof => "end of file",
        };
        write!(f, "'{}'", text)
    }
}

#[derive(Debug, Clone)]
pub struct TokenWithLocation {
    pub token: Token,
    pub span: Span,
}

impl TokenWithLocation {
    pub fn loc(&self) -> SourceLocation {
        self.span.loc
    }
}

pub struct Lexer<'a> {
    source: &'a str,
    inner: logos::Lexer<'a, Token>,
    /// 每一行起始处的字节偏移
    line_starts: Vec<usize>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        let line_starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self {
            source,
            inner: Token::lexer(source),
            line_starts,
        }
    }

    /// 字节偏移转换为行列
    fn location(&self, offset: usize) -> SourceLocation {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next) => next - 1,
        };
        SourceLocation {
            line: line + 1,
            column: offset - self.line_starts[line] + 1,
        }
    }

    fn span(&self, range: std::ops::Range<usize>) -> Span {
        Span::new(range.start, range.end, self.location(range.start))
    }

    pub fn tokenize(&mut self) -> MjResult<Vec<TokenWithLocation>> {
        let mut tokens = Vec::new();

        while let Some(token_result) = self.inner.next() {
            let span = self.span(self.inner.span());
            match token_result {
                Ok(token) => tokens.push(TokenWithLocation { token, span }),
                Err(_) => {
                    let text = &self.source[span.start..span.end];
                    let message = if text.bytes().all(|b| b.is_ascii_digit()) {
                        format!("integer literal out of range: {}", text)
                    } else {
                        format!("Unexpected character: '{}'", text)
                    };
                    return Err(lexer_error(span, message));
                }
            }
        }

        let end = self.source.len();
        tokens.push(TokenWithLocation {
            token: Token::Eof,
            span: self.span(end..end),
        });

        log::debug!("lexed {} tokens", tokens.len());
        Ok(tokens)
    }
}

pub fn lex(source: &str) -> MjResult<Vec<TokenWithLocation>> {
    let mut lexer = Lexer::new(source);
    lexer.tokenize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        lex(source).unwrap().into_iter().map(|t| t.token).collect()
    }

    #[test]
    fn test_compound_tokens() {
        assert_eq!(
            kinds("System.out.println(a.length);"),
            vec![
                Token::Println,
                Token::LParen,
                Token::Identifier("a".into()),
                Token::Length,
                Token::RParen,
                Token::Semicolon,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_power_is_not_two_stars() {
        assert_eq!(
            kinds("2 ** 5 * 3"),
            vec![
                Token::IntegerLiteral(2),
                Token::Power,
                Token::IntegerLiteral(5),
                Token::Star,
                Token::IntegerLiteral(3),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_comments_keep_line_numbers() {
        let tokens = lex("/* a\n * b */\n// c\n  x").unwrap();
        assert_eq!(tokens[0].token, Token::Identifier("x".into()));
        assert_eq!(tokens[0].loc(), SourceLocation { line: 4, column: 3 });
    }

    #[test]
    fn test_unexpected_character() {
        let err = lex("int # x").unwrap_err();
        assert!(err.to_string().contains("line 1, column 5"));
    }

    #[test]
    fn test_integer_overflow() {
        let err = lex("99999999999").unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }
}
