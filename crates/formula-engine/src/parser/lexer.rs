use formula_model::{column_index, row_index, ErrorCode, Number, Size};

/// One coordinate as written: index plus whether it carried a `$`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Line {
    pub index: u32,
    pub absolute: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Coord {
    pub x: Line,
    pub y: Line,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RefToken {
    /// `#REF!`
    Illegal,
    Cell(Coord),
    Area(Coord, Coord),
    Columns(Line, Line),
    Rows(Line, Line),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Number(Number),
    Text(String),
    Bool(bool),
    Error(ErrorCode),
    Reference(RefToken),
    /// A name directly followed by `(`; the parenthesis is its own token.
    Function(String),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    Amp,
    Percent,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    LParen,
    RParen,
    LBrace,
    RBrace,
    Comma,
    Semicolon,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct LexError;

/// Splits formula text (without the leading `=`) into tokens.
///
/// Coordinates outside a grid of size `max` are rejected.
pub(crate) fn lex(src: &str, max: Size) -> Result<Vec<Token>, LexError> {
    Lexer {
        src,
        chars: src.chars(),
        idx: 0,
        max,
        tokens: Vec::new(),
    }
    .lex()
}

struct Lexer<'a> {
    src: &'a str,
    chars: std::str::Chars<'a>,
    idx: usize,
    max: Size,
    tokens: Vec<Token>,
}

fn is_ident_start(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_'
}

fn is_ident_cont(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_' || ch == '.'
}

impl<'a> Lexer<'a> {
    fn lex(mut self) -> Result<Vec<Token>, LexError> {
        while let Some(ch) = self.peek_char() {
            if ch.is_whitespace() {
                self.bump();
                continue;
            }
            let token = match ch {
                '"' => self.lex_text()?,
                '#' => self.lex_error()?,
                '0'..='9' | '.' => match self.lex_rows()? {
                    Some(rows) => rows,
                    None => self.lex_number()?,
                },
                '$' => match self.lex_rows()? {
                    Some(rows) => rows,
                    None => self.lex_cells()?.ok_or(LexError)?,
                },
                c if is_ident_start(c) => self.lex_word()?,
                _ => {
                    self.bump();
                    self.lex_punct(ch)?
                }
            };
            self.tokens.push(token);
        }
        Ok(self.tokens)
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.chars.next()?;
        self.idx += ch.len_utf8();
        Some(ch)
    }

    fn rollback_to(&mut self, idx: usize) {
        self.idx = idx;
        self.chars = self.src[idx..].chars();
    }

    fn peek_char(&self) -> Option<char> {
        self.chars.clone().next()
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek_char() == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn take_while(&mut self, mut pred: impl FnMut(char) -> bool) -> &'a str {
        let start = self.idx;
        while let Some(ch) = self.peek_char() {
            if !pred(ch) {
                break;
            }
            self.bump();
        }
        &self.src[start..self.idx]
    }

    fn lex_punct(&mut self, ch: char) -> Result<Token, LexError> {
        Ok(match ch {
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Star,
            '/' => Token::Slash,
            '^' => Token::Caret,
            '&' => Token::Amp,
            '%' => Token::Percent,
            '=' => Token::Eq,
            '<' if self.eat('>') => Token::Ne,
            '<' if self.eat('=') => Token::Le,
            '<' => Token::Lt,
            '>' if self.eat('=') => Token::Ge,
            '>' => Token::Gt,
            '(' => Token::LParen,
            ')' => Token::RParen,
            '{' => Token::LBrace,
            '}' => Token::RBrace,
            ',' => Token::Comma,
            ';' => Token::Semicolon,
            _ => return Err(LexError),
        })
    }

    fn lex_text(&mut self) -> Result<Token, LexError> {
        self.bump();
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(LexError),
                Some('"') if self.eat('"') => out.push('"'),
                Some('"') => return Ok(Token::Text(out)),
                Some(ch) => out.push(ch),
            }
        }
    }

    fn lex_error(&mut self) -> Result<Token, LexError> {
        let rest = &self.src[self.idx..];
        let code = ErrorCode::ALL
            .into_iter()
            .filter(|code| {
                let text = code.as_code();
                rest.len() >= text.len()
                    && rest.is_char_boundary(text.len())
                    && rest[..text.len()].eq_ignore_ascii_case(text)
            })
            .max_by_key(|code| code.as_code().len())
            .ok_or(LexError)?;
        self.rollback_to(self.idx + code.as_code().len());
        Ok(match code {
            ErrorCode::InvalidReference => Token::Reference(RefToken::Illegal),
            other => Token::Error(other),
        })
    }

    fn lex_number(&mut self) -> Result<Token, LexError> {
        let start = self.idx;
        self.take_while(|c| c.is_ascii_digit());
        if self.eat('.') {
            self.take_while(|c| c.is_ascii_digit());
        }
        if matches!(self.peek_char(), Some('E' | 'e')) {
            let save = self.idx;
            self.bump();
            if matches!(self.peek_char(), Some('+' | '-')) {
                self.bump();
            }
            if self.take_while(|c| c.is_ascii_digit()).is_empty() {
                self.rollback_to(save);
            }
        }
        let text = &self.src[start..self.idx];
        if self.peek_char().is_some_and(is_ident_cont) {
            return Err(LexError);
        }
        Number::parse(text).map(Token::Number).ok_or(LexError)
    }

    fn column_part(&mut self) -> Result<Option<Line>, LexError> {
        let start = self.idx;
        let absolute = self.eat('$');
        let letters = self.take_while(|c| c.is_ascii_alphabetic());
        if letters.is_empty() {
            self.rollback_to(start);
            return Ok(None);
        }
        let index = column_index(letters).map_err(|_| LexError)?;
        if index >= self.max.width {
            return Err(LexError);
        }
        Ok(Some(Line { index, absolute }))
    }

    fn row_part(&mut self) -> Result<Option<Line>, LexError> {
        let start = self.idx;
        let absolute = self.eat('$');
        let digits = self.take_while(|c| c.is_ascii_digit());
        if digits.is_empty() {
            self.rollback_to(start);
            return Ok(None);
        }
        let index = row_index(digits).map_err(|_| LexError)?;
        if index >= self.max.height {
            return Err(LexError);
        }
        Ok(Some(Line { index, absolute }))
    }

    fn at_word_end(&self) -> bool {
        !self.peek_char().is_some_and(is_ident_cont)
    }

    /// `1:3`, `$2:$2`. Returns `None`, consuming nothing, when the text is not a row span.
    fn lex_rows(&mut self) -> Result<Option<Token>, LexError> {
        let start = self.idx;
        self.eat('$');
        let digits = self.take_while(|c| c.is_ascii_digit());
        let is_span = !digits.is_empty() && self.peek_char() == Some(':');
        self.rollback_to(start);
        if !is_span {
            return Ok(None);
        }
        let first = self.row_part()?.ok_or(LexError)?;
        self.eat(':');
        let last = self.row_part()?.ok_or(LexError)?;
        if !self.at_word_end() {
            return Err(LexError);
        }
        Ok(Some(Token::Reference(RefToken::Rows(first, last))))
    }

    /// `A1`, `$A$1:B2`, `A:C`. Returns `None`, consuming nothing, when the text does not
    /// start with a reference.
    fn lex_cells(&mut self) -> Result<Option<Token>, LexError> {
        let start = self.idx;
        let Some(x) = self.column_part()? else {
            return Ok(None);
        };
        match self.row_part()? {
            Some(y) => {
                if !self.at_word_end() {
                    self.rollback_to(start);
                    return Ok(None);
                }
                let first = Coord { x, y };
                if !self.eat(':') {
                    return Ok(Some(Token::Reference(RefToken::Cell(first))));
                }
                let x = self.column_part()?.ok_or(LexError)?;
                let y = self.row_part()?.ok_or(LexError)?;
                if !self.at_word_end() {
                    return Err(LexError);
                }
                Ok(Some(Token::Reference(RefToken::Area(first, Coord { x, y }))))
            }
            None if self.peek_char() == Some(':') => {
                self.bump();
                let last = self.column_part()?.ok_or(LexError)?;
                if !self.at_word_end() {
                    return Err(LexError);
                }
                Ok(Some(Token::Reference(RefToken::Columns(x, last))))
            }
            None => {
                self.rollback_to(start);
                Ok(None)
            }
        }
    }

    fn lex_word(&mut self) -> Result<Token, LexError> {
        let start = self.idx;
        let word = self.take_while(is_ident_cont);
        let after = self.idx;
        self.take_while(char::is_whitespace);
        if self.peek_char() == Some('(') {
            return Ok(Token::Function(word.to_string()));
        }
        self.rollback_to(after);
        if word.eq_ignore_ascii_case("TRUE") {
            return Ok(Token::Bool(true));
        }
        if word.eq_ignore_ascii_case("FALSE") {
            return Ok(Token::Bool(false));
        }
        self.rollback_to(start);
        self.lex_cells()?.ok_or(LexError)
    }
}
