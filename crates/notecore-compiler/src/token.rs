#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Num(i64),
    Ident(String),
    /// A `'single-quoted'` string literal; only the legacy front end uses it.
    Str(String),
    Dot,
    Comma,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    Eof,
}

/// A shared tokenizer for both surface syntaxes. Each front end drives it
/// at its own call sites; neither syntax needs context-sensitive lexing
/// beyond "is the current char part of a number/identifier".
pub struct Lexer {
    chars: Vec<char>,
    pos: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub pos: usize,
}

impl Lexer {
    pub fn new(source: &str) -> Lexer {
        Lexer {
            chars: source.chars().collect(),
            pos: 0,
        }
    }

    /// Tokenizes the whole input up front; both parsers work off a `Vec`
    /// with lookahead rather than a streaming iterator.
    pub fn tokenize(source: &str) -> Result<Vec<Spanned>, (usize, String)> {
        let mut lexer = Lexer::new(source);
        let mut tokens = Vec::new();
        loop {
            let spanned = lexer.next_token()?;
            let done = spanned.token == Token::Eof;
            tokens.push(spanned);
            if done {
                break;
            }
        }
        Ok(tokens)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn next_token(&mut self) -> Result<Spanned, (usize, String)> {
        self.skip_whitespace();
        let start = self.pos;
        let Some(c) = self.peek() else {
            return Ok(Spanned {
                token: Token::Eof,
                pos: start,
            });
        };
        let token = match c {
            '.' => {
                self.bump();
                Token::Dot
            }
            ',' => {
                self.bump();
                Token::Comma
            }
            '(' => {
                self.bump();
                Token::LParen
            }
            ')' => {
                self.bump();
                Token::RParen
            }
            '[' => {
                self.bump();
                Token::LBracket
            }
            ']' => {
                self.bump();
                Token::RBracket
            }
            '+' => {
                self.bump();
                Token::Plus
            }
            '-' => {
                self.bump();
                Token::Minus
            }
            '*' => {
                self.bump();
                Token::Star
            }
            '/' => {
                self.bump();
                Token::Slash
            }
            '^' => {
                self.bump();
                Token::Caret
            }
            '\'' => {
                self.bump();
                let mut s = String::new();
                loop {
                    match self.bump() {
                        Some('\'') => break,
                        Some(ch) => s.push(ch),
                        None => return Err((start, "unterminated string literal".to_string())),
                    }
                }
                Token::Str(s)
            }
            c if c.is_ascii_digit() => {
                let mut s = String::new();
                while matches!(self.peek(), Some(d) if d.is_ascii_digit()) {
                    s.push(self.bump().unwrap());
                }
                let n: i64 = s
                    .parse()
                    .map_err(|_| (start, format!("integer literal '{s}' out of range")))?;
                Token::Num(n)
            }
            c if c.is_alphabetic() || c == '_' || c == '$' => {
                let mut s = String::new();
                while matches!(self.peek(), Some(d) if d.is_alphanumeric() || d == '_' || d == '$')
                {
                    s.push(self.bump().unwrap());
                }
                Token::Ident(s)
            }
            other => return Err((start, format!("unexpected character '{other}'"))),
        };
        Ok(Spanned { token, pos: start })
    }
}

impl Spanned {
    pub fn is_eof(&self) -> bool {
        self.token == Token::Eof
    }
}

/// Peekable cursor over a pre-tokenized stream, shared by both parsers.
pub struct Cursor<'a> {
    tokens: &'a [Spanned],
    idx: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(tokens: &'a [Spanned]) -> Cursor<'a> {
        Cursor { tokens, idx: 0 }
    }

    pub fn peek(&self) -> &Token {
        &self.tokens[self.idx.min(self.tokens.len() - 1)].token
    }

    pub fn peek_at(&self, offset: usize) -> &Token {
        let i = (self.idx + offset).min(self.tokens.len() - 1);
        &self.tokens[i].token
    }

    pub fn pos(&self) -> usize {
        self.tokens[self.idx.min(self.tokens.len() - 1)].pos
    }

    pub fn advance(&mut self) -> Token {
        let t = self.tokens[self.idx.min(self.tokens.len() - 1)].token.clone();
        if self.idx < self.tokens.len() - 1 {
            self.idx += 1;
        }
        t
    }

    pub fn at_eof(&self) -> bool {
        matches!(self.peek(), Token::Eof)
    }
}
