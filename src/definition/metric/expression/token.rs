use std::iter::Peekable;
use std::str::Chars;

#[derive(Clone, Debug, PartialEq)]
pub(super) enum Token {
    Identifier(String),
    Number(f64),
    Operator(char),
    LeftParen,
    RightParen,
    Comma,
}

pub(super) struct Tokenizer<'a> {
    chars: Peekable<Chars<'a>>,
}

impl<'a> Tokenizer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, String> {
        let mut tokens = vec![];
        while let Some(token) = self.next_token()? {
            tokens.push(token);
        }
        Ok(tokens)
    }

    fn next_token(&mut self) -> Result<Option<Token>, String> {
        while self.chars.next_if(|c| c.is_whitespace()).is_some() {}

        let Some(&c) = self.chars.peek() else {
            return Ok(None);
        };

        let token = match c {
            '+' | '-' | '*' | '/' => {
                self.chars.next();
                Token::Operator(c)
            }
            '(' => {
                self.chars.next();
                Token::LeftParen
            }
            ')' => {
                self.chars.next();
                Token::RightParen
            }
            ',' => {
                self.chars.next();
                Token::Comma
            }
            '\'' | '`' => self.quoted(c)?,
            c if c.is_ascii_digit() || c == '.' => self.number()?,
            c if c.is_alphabetic() || c == '_' => self.identifier(),
            c => return Err(format!("unexpected character '{c}'")),
        };

        Ok(Some(token))
    }

    // Event names such as `L1-dcache-loads` contain dashes: a dash belongs to an
    // identifier when it is directly followed by another identifier character.
    fn identifier(&mut self) -> Token {
        let mut name = String::new();
        while let Some(&c) = self.chars.peek() {
            if c.is_alphanumeric() || c == '_' || c == '.' {
                name.push(c);
                self.chars.next();
            } else if c == '-' && self.dash_continues_identifier() {
                name.push(c);
                self.chars.next();
            } else {
                break;
            }
        }
        Token::Identifier(name)
    }

    fn dash_continues_identifier(&self) -> bool {
        let mut ahead = self.chars.clone();
        ahead.next();
        ahead
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || *c == '_')
    }

    fn quoted(&mut self, quote: char) -> Result<Token, String> {
        self.chars.next();
        let mut name = String::new();
        for c in self.chars.by_ref() {
            if c == quote {
                return Ok(Token::Identifier(name));
            }
            name.push(c);
        }
        Err(format!("unterminated identifier '{name}'"))
    }

    fn number(&mut self) -> Result<Token, String> {
        let mut literal = String::new();
        while let Some(c) = self.chars.next_if(|c| c.is_ascii_digit() || *c == '.') {
            literal.push(c);
        }
        if let Some(e) = self.chars.next_if(|c| *c == 'e' || *c == 'E') {
            literal.push(e);
            if let Some(sign) = self.chars.next_if(|c| *c == '+' || *c == '-') {
                literal.push(sign);
            }
            while let Some(c) = self.chars.next_if(|c| c.is_ascii_digit()) {
                literal.push(c);
            }
        }
        literal
            .parse()
            .map(Token::Number)
            .map_err(|_| format!("invalid number '{literal}'"))
    }
}
