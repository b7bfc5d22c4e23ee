mod tokens;

pub use tokens::{Token, TokenKind};

use crate::error::{Error, Result};

/// AWK lexer that tokenizes source code
pub struct Lexer<'a> {
    source: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    line: usize,
    column: usize,
    last_kind: Option<TokenKind>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
            line: 1,
            column: 1,
            last_kind: None,
        }
    }

    /// Tokenize the entire source, returning all tokens
    pub fn tokenize(&mut self) -> Result<Vec<Token>> {
        let estimated_tokens = self.source.len() / 4 + 1;
        let mut tokens = Vec::with_capacity(estimated_tokens.min(1024));

        loop {
            let token = self.next_token()?;
            let is_eof = matches!(token.kind, TokenKind::Eof);
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        Ok(tokens)
    }

    /// Get the next token from the source
    pub fn next_token(&mut self) -> Result<Token> {
        loop {
            self.skip_whitespace_and_comments();
            // A newline right after `,` `{` `&&` `||` `do` `else` never ends a statement
            let continues = self
                .last_kind
                .as_ref()
                .map(|k| k.allows_newline_after())
                .unwrap_or(false);
            if continues && self.peek_char_is('\n') {
                self.advance();
                continue;
            }
            break;
        }

        let (line, col) = (self.line, self.column);
        let start = self.offset();

        let Some((_pos, ch)) = self.peek_char() else {
            return Ok(Token::new(TokenKind::Eof, line, col));
        };

        let mut token = match ch {
            '\n' => {
                self.advance();
                Token::new(TokenKind::Newline, line, col)
            }

            '"' => self.scan_string()?,

            '/' if self.last_kind.as_ref().is_some_and(TokenKind::ends_operand) => {
                self.one_of(line, col, &[('=', TokenKind::SlashAssign)], TokenKind::Slash)
            }
            '/' => self.scan_regex()?,

            '.' if self.peek_second().is_some_and(|c| c.is_ascii_digit()) => self.scan_number()?,
            '0'..='9' => self.scan_number()?,

            'a'..='z' | 'A'..='Z' | '_' => self.scan_identifier()?,

            '+' => self.one_of(line, col, &[('+', TokenKind::Increment), ('=', TokenKind::PlusAssign)], TokenKind::Plus),
            '-' => self.one_of(line, col, &[('-', TokenKind::Decrement), ('=', TokenKind::MinusAssign)], TokenKind::Minus),
            // `**` and `**=` are common spellings of `^` and `^=`
            '*' if self.peek_second_is('*') => {
                self.advance();
                self.one_of(line, col, &[('=', TokenKind::CaretAssign)], TokenKind::Caret)
            }
            '*' => self.one_of(line, col, &[('=', TokenKind::StarAssign)], TokenKind::Star),
            '%' => self.one_of(line, col, &[('=', TokenKind::PercentAssign)], TokenKind::Percent),
            '^' => self.one_of(line, col, &[('=', TokenKind::CaretAssign)], TokenKind::Caret),
            '<' => self.one_of(line, col, &[('=', TokenKind::LessEqual)], TokenKind::Less),
            '>' => self.one_of(
                line,
                col,
                &[('=', TokenKind::GreaterEqual), ('>', TokenKind::Append)],
                TokenKind::Greater,
            ),
            '=' => self.one_of(line, col, &[('=', TokenKind::Equal)], TokenKind::Assign),
            '!' => self.one_of(
                line,
                col,
                &[('=', TokenKind::NotEqual), ('~', TokenKind::NotMatch)],
                TokenKind::Not,
            ),
            '~' => self.one_of(line, col, &[], TokenKind::Match),
            '&' => {
                self.advance();
                if self.peek_char_is('&') {
                    self.advance();
                    Token::new(TokenKind::And, line, col)
                } else {
                    return Err(Error::lexer("unexpected '&', did you mean '&&'?", line, col));
                }
            }
            '|' => self.one_of(line, col, &[('|', TokenKind::Or)], TokenKind::Pipe),
            '$' => self.one_of(line, col, &[], TokenKind::Dollar),
            '?' => self.one_of(line, col, &[], TokenKind::Question),
            ':' => self.one_of(line, col, &[], TokenKind::Colon),
            '(' => self.one_of(line, col, &[], TokenKind::LeftParen),
            ')' => self.one_of(line, col, &[], TokenKind::RightParen),
            '{' => self.one_of(line, col, &[], TokenKind::LeftBrace),
            '}' => self.one_of(line, col, &[], TokenKind::RightBrace),
            '[' => self.one_of(line, col, &[], TokenKind::LeftBracket),
            ']' => self.one_of(line, col, &[], TokenKind::RightBracket),
            ';' => self.one_of(line, col, &[], TokenKind::Semicolon),
            ',' => self.one_of(line, col, &[], TokenKind::Comma),

            _ => {
                return Err(Error::lexer(
                    format!("unexpected character '{}'", ch),
                    line,
                    col,
                ));
            }
        };

        let end = self.offset();
        token.text = self.source[start..end].to_string();
        self.last_kind = Some(token.kind.clone());
        Ok(token)
    }

    /// Consume the current character, then at most one of the listed
    /// follow-up characters, choosing the matching token kind
    fn one_of(
        &mut self,
        line: usize,
        col: usize,
        follow: &[(char, TokenKind)],
        single: TokenKind,
    ) -> Token {
        self.advance();
        for (ch, kind) in follow {
            if self.peek_char_is(*ch) {
                self.advance();
                return Token::new(kind.clone(), line, col);
            }
        }
        Token::new(single, line, col)
    }

    fn offset(&mut self) -> usize {
        self.chars
            .peek()
            .map(|(pos, _)| *pos)
            .unwrap_or(self.source.len())
    }

    fn peek_char(&mut self) -> Option<(usize, char)> {
        self.chars.peek().copied()
    }

    fn peek_char_is(&mut self, expected: char) -> bool {
        self.chars.peek().map(|(_, c)| *c == expected).unwrap_or(false)
    }

    /// Look one character past the current one
    fn peek_second(&self) -> Option<char> {
        self.chars.clone().nth(1).map(|(_, c)| c)
    }

    fn peek_second_is(&self, expected: char) -> bool {
        self.peek_second() == Some(expected)
    }

    fn advance(&mut self) -> Option<(usize, char)> {
        let result = self.chars.next();
        if let Some((_, ch)) = result {
            if ch == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        result
    }

    /// Consume characters while `keep` holds
    fn eat_while(&mut self, keep: impl Fn(char) -> bool) {
        while self.peek_char().is_some_and(|(_, c)| keep(c)) {
            self.advance();
        }
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek_char() {
                Some((_, ' ' | '\t' | '\r')) => {
                    self.advance();
                }
                Some((_, '\\')) => {
                    // Line continuation
                    let mut chars = self.chars.clone();
                    chars.next();
                    match chars.peek().map(|(_, c)| *c) {
                        Some('\n') => {
                            self.advance();
                            self.advance();
                        }
                        Some('\r') => {
                            chars.next();
                            if chars.peek().map(|(_, c)| *c == '\n').unwrap_or(false) {
                                self.advance();
                                self.advance();
                                self.advance();
                            } else {
                                break;
                            }
                        }
                        _ => break,
                    }
                }
                Some((_, '#')) => self.eat_while(|c| c != '\n'),
                _ => break,
            }
        }
    }

    fn scan_string(&mut self) -> Result<Token> {
        let (line, col) = (self.line, self.column);
        let unterminated = move || Error::lexer("unterminated string", line, col);
        self.advance();

        let mut value = String::new();
        loop {
            let (_, ch) = self.advance().ok_or_else(unterminated)?;
            match ch {
                '"' => break,
                '\n' => return Err(unterminated()),
                '\\' => {
                    let (_, escaped) = self.advance().ok_or_else(unterminated)?;
                    self.push_escape(&mut value, escaped);
                }
                _ => value.push(ch),
            }
        }

        Ok(Token::new(TokenKind::String(value), line, col))
    }

    /// Decode the character after a backslash in a string literal
    fn push_escape(&mut self, value: &mut String, escaped: char) {
        let decoded = match escaped {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            'b' => '\x08',
            'f' => '\x0C',
            'a' => '\x07',
            'v' => '\x0B',
            '\\' | '"' | '/' => escaped,
            // Escaped newline continues the literal
            '\n' => return,
            '0'..='7' => {
                let mut code = escaped as u32 - '0' as u32;
                for _ in 0..2 {
                    match self.peek_char() {
                        Some((_, c @ '0'..='7')) => {
                            code = code * 8 + (c as u32 - '0' as u32);
                            self.advance();
                        }
                        _ => break,
                    }
                }
                char::from_u32(code).unwrap_or('\u{FFFD}')
            }
            _ => {
                // Unknown escapes keep the backslash so regex strings survive
                value.push('\\');
                escaped
            }
        };
        value.push(decoded);
    }

    fn scan_regex(&mut self) -> Result<Token> {
        let (line, col) = (self.line, self.column);
        self.advance(); // opening slash

        let mut pattern = String::new();
        let mut in_bracket = false;

        loop {
            match self.advance() {
                // An unescaped slash inside a bracket expression does not end the regex
                Some((_, '/')) if !in_bracket => break,
                Some((_, '\\')) => match self.advance() {
                    Some((_, '/')) => pattern.push('/'),
                    Some((_, '\n')) => {
                        return Err(Error::lexer("unterminated regex (newline in regex)", line, col));
                    }
                    Some((_, ch)) => {
                        pattern.push('\\');
                        pattern.push(ch);
                    }
                    None => return Err(Error::lexer("unterminated regex", line, col)),
                },
                Some((_, '\n')) => {
                    return Err(Error::lexer("unterminated regex (newline in regex)", line, col));
                }
                Some((_, '[')) if !in_bracket => {
                    in_bracket = true;
                    pattern.push('[');
                    // `]` directly after `[` or `[^` is a literal member
                    if self.peek_char_is('^') {
                        self.advance();
                        pattern.push('^');
                    }
                    if self.peek_char_is(']') {
                        self.advance();
                        pattern.push(']');
                    }
                }
                Some((_, '[')) if in_bracket && self.peek_char_is(':') => {
                    // character class like [:alpha:] inside a bracket
                    pattern.push('[');
                    while let Some((_, c)) = self.advance() {
                        pattern.push(c);
                        if c == ']' || c == '\n' {
                            break;
                        }
                    }
                }
                Some((_, ']')) if in_bracket => {
                    in_bracket = false;
                    pattern.push(']');
                }
                Some((_, ch)) => pattern.push(ch),
                None => {
                    return Err(Error::lexer("unterminated regex", line, col));
                }
            }
        }

        Ok(Token::new(TokenKind::Regex(pattern), line, col))
    }

    fn scan_number(&mut self) -> Result<Token> {
        let (line, col) = (self.line, self.column);
        let start = self.offset();

        self.eat_while(|c| c.is_ascii_digit());
        if self.peek_char_is('.') {
            self.advance();
            self.eat_while(|c| c.is_ascii_digit());
        }

        // Exponent, only when digits actually follow (`1e` is 1 then `e`)
        if let Some((_, 'e' | 'E')) = self.peek_char() {
            let mut ahead = self.chars.clone().map(|(_, c)| c).skip(1).peekable();
            let signed = ahead.next_if(|&c| c == '+' || c == '-').is_some();
            if ahead.peek().is_some_and(char::is_ascii_digit) {
                self.advance();
                if signed {
                    self.advance();
                }
                self.eat_while(|c| c.is_ascii_digit());
            }
        }

        let source = self.source;
        let text = &source[start..self.offset()];
        let value: f64 = text
            .parse()
            .map_err(|_| Error::lexer(format!("malformed number {text:?}"), line, col))?;

        Ok(Token::new(TokenKind::Number(value), line, col))
    }

    fn scan_identifier(&mut self) -> Result<Token> {
        let (line, col) = (self.line, self.column);
        let start = self.offset();
        self.eat_while(|c| c.is_ascii_alphanumeric() || c == '_');
        let source = self.source;
        let word = &source[start..self.offset()];

        // A call needs `(` directly after the name, with no space
        let kind = TokenKind::keyword(word).unwrap_or_else(|| {
            if self.peek_char_is('(') {
                TokenKind::FuncName(word.to_string())
            } else {
                TokenKind::Identifier(word.to_string())
            }
        });

        Ok(Token::new(kind, line, col))
    }
}
