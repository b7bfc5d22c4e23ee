use crate::ast::AssignOp;
use crate::error::SourceLocation;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Number(f64),
    /// String literal with escapes already processed
    String(String),
    /// Regex literal source, without the slashes
    Regex(String),
    Identifier(String),
    /// Identifier written directly before `(`, i.e. a call
    FuncName(String),

    // Keywords
    Begin,
    End,
    Function,
    If,
    Else,
    While,
    For,
    Do,
    In,
    Break,
    Continue,
    Next,
    Nextfile,
    Exit,
    Return,
    Delete,
    Getline,
    Print,
    Printf,

    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Caret,
    Increment,
    Decrement,

    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Equal,
    NotEqual,
    Match,
    NotMatch,
    And,
    Or,
    Not,

    Assign,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    PercentAssign,
    CaretAssign,

    Dollar,
    Question,
    Colon,
    /// `|`, for output pipes and `cmd | getline`
    Pipe,
    /// `>>`
    Append,

    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    LeftBracket,
    RightBracket,
    Semicolon,
    Comma,
    /// Newlines terminate statements, so they are tokens
    Newline,
    Eof,
}

/// Reserved words. Built-in function names are not here, the parser
/// recognizes those by name.
const KEYWORDS: &[(&str, TokenKind)] = &[
    ("BEGIN", TokenKind::Begin),
    ("END", TokenKind::End),
    ("function", TokenKind::Function),
    ("func", TokenKind::Function),
    ("if", TokenKind::If),
    ("else", TokenKind::Else),
    ("while", TokenKind::While),
    ("for", TokenKind::For),
    ("do", TokenKind::Do),
    ("in", TokenKind::In),
    ("break", TokenKind::Break),
    ("continue", TokenKind::Continue),
    ("next", TokenKind::Next),
    ("nextfile", TokenKind::Nextfile),
    ("exit", TokenKind::Exit),
    ("return", TokenKind::Return),
    ("delete", TokenKind::Delete),
    ("getline", TokenKind::Getline),
    ("print", TokenKind::Print),
    ("printf", TokenKind::Printf),
];

impl TokenKind {
    pub fn keyword(word: &str) -> Option<TokenKind> {
        KEYWORDS
            .iter()
            .find(|(name, _)| *name == word)
            .map(|(_, kind)| kind.clone())
    }

    pub fn can_start_expression(&self) -> bool {
        matches!(
            self,
            TokenKind::Number(_)
                | TokenKind::String(_)
                | TokenKind::Regex(_)
                | TokenKind::Identifier(_)
                | TokenKind::FuncName(_)
                | TokenKind::LeftParen
                | TokenKind::Dollar
                | TokenKind::Not
                | TokenKind::Plus
                | TokenKind::Minus
                | TokenKind::Increment
                | TokenKind::Decrement
                | TokenKind::Getline
        )
    }

    /// True if an operand can end with this token. A `/` after it is
    /// division; anywhere else `/` opens a regex literal.
    pub fn ends_operand(&self) -> bool {
        matches!(
            self,
            TokenKind::Number(_)
                | TokenKind::String(_)
                | TokenKind::Identifier(_)
                | TokenKind::RightParen
                | TokenKind::RightBracket
                | TokenKind::Dollar
                | TokenKind::Increment
                | TokenKind::Decrement
        )
    }

    /// Tokens after which a newline may be skipped without ending a statement
    pub fn allows_newline_after(&self) -> bool {
        matches!(
            self,
            TokenKind::Comma
                | TokenKind::LeftBrace
                | TokenKind::And
                | TokenKind::Or
                | TokenKind::Do
                | TokenKind::Else
        )
    }

    pub fn assign_op(&self) -> Option<AssignOp> {
        Some(match self {
            TokenKind::Assign => AssignOp::Assign,
            TokenKind::PlusAssign => AssignOp::AddAssign,
            TokenKind::MinusAssign => AssignOp::SubAssign,
            TokenKind::StarAssign => AssignOp::MulAssign,
            TokenKind::SlashAssign => AssignOp::DivAssign,
            TokenKind::PercentAssign => AssignOp::ModAssign,
            TokenKind::CaretAssign => AssignOp::PowAssign,
            _ => return None,
        })
    }
}

/// A token with its source text and location
#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub location: SourceLocation,
}

impl Token {
    pub fn new(kind: TokenKind, line: usize, column: usize) -> Self {
        Self {
            kind,
            text: String::new(),
            location: SourceLocation::new(line, column),
        }
    }

    pub fn line(&self) -> usize {
        self.location.line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_lookup() {
        assert_eq!(TokenKind::keyword("BEGIN"), Some(TokenKind::Begin));
        assert_eq!(TokenKind::keyword("func"), Some(TokenKind::Function));
        assert_eq!(TokenKind::keyword("begin"), None);
        assert_eq!(TokenKind::keyword("length"), None);
    }

    #[test]
    fn test_assign_op() {
        assert_eq!(TokenKind::CaretAssign.assign_op(), Some(AssignOp::PowAssign));
        assert_eq!(TokenKind::Equal.assign_op(), None);
    }
}
