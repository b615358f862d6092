use super::token::{Token, Tokenizer};
use super::{Expression, Function, Operator};
use crate::error::{Error, Result};

// expression := term (('+' | '-') term)*
// term       := factor (('*' | '/') factor)*
// factor     := number | identifier | identifier '(' arguments ')'
//             | '(' expression ')' | '-' factor
pub(super) fn parse(formula: &str) -> Result<Expression> {
    let malformed = |reason: String| Error::CannotParseMetricExpression {
        expression: formula.to_string(),
        reason,
    };

    let tokens = Tokenizer::new(formula).tokenize().map_err(malformed)?;
    let mut parser = Parser { tokens, pos: 0 };

    let expression = parser.expression().map_err(|e| match e {
        // Give syntax errors the whole formula as context.
        Error::CannotParseMetricExpression { reason, .. } => malformed(reason),
        e => e,
    })?;
    match parser.peek() {
        None => Ok(expression),
        Some(token) => Err(malformed(format!("unexpected token {token:?}"))),
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn expect(&mut self, expected: Token) -> Result<()> {
        match self.next() {
            Some(token) if token == expected => Ok(()),
            Some(token) => Err(syntax(format!("expected {expected:?}, found {token:?}"))),
            None => Err(syntax(format!("expected {expected:?}, found end of input"))),
        }
    }

    fn expression(&mut self) -> Result<Expression> {
        let mut lhs = self.term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Operator('+')) => Operator::Add,
                Some(Token::Operator('-')) => Operator::Subtract,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.term()?;
            lhs = Expression::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    fn term(&mut self) -> Result<Expression> {
        let mut lhs = self.factor()?;
        loop {
            let op = match self.peek() {
                Some(Token::Operator('*')) => Operator::Multiply,
                Some(Token::Operator('/')) => Operator::Divide,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.factor()?;
            lhs = Expression::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    fn factor(&mut self) -> Result<Expression> {
        match self.next() {
            Some(Token::Number(value)) => Ok(Expression::Constant(value)),
            Some(Token::Identifier(name)) => {
                if self.peek() == Some(&Token::LeftParen) {
                    self.pos += 1;
                    self.function(name)
                } else {
                    Ok(Expression::Identifier(name))
                }
            }
            Some(Token::LeftParen) => {
                let inner = self.expression()?;
                self.expect(Token::RightParen)?;
                Ok(inner)
            }
            Some(Token::Operator('-')) => {
                let operand = self.factor()?;
                Ok(Expression::Binary {
                    op: Operator::Subtract,
                    lhs: Box::new(Expression::Constant(0.0)),
                    rhs: Box::new(operand),
                })
            }
            Some(token) => Err(syntax(format!("unexpected token {token:?}"))),
            None => Err(syntax("unexpected end of input".to_string())),
        }
    }

    // The opening parenthesis is already consumed.
    fn function(&mut self, name: String) -> Result<Expression> {
        let mut args = vec![];
        if self.peek() == Some(&Token::RightParen) {
            self.pos += 1;
        } else {
            loop {
                args.push(self.expression()?);
                match self.next() {
                    Some(Token::Comma) => continue,
                    Some(Token::RightParen) => break,
                    Some(token) => {
                        return Err(syntax(format!("expected ',' or ')', found {token:?}")))
                    }
                    None => return Err(syntax("unclosed function call".to_string())),
                }
            }
        }

        let (func, valid, expected) = match name.to_ascii_lowercase().as_str() {
            "sum" => (Function::Sum, !args.is_empty(), "at least 1"),
            "dratio" => (Function::DRatio, args.len() == 2, "2"),
            _ => return Err(Error::UnknownFunction(name)),
        };
        if !valid {
            return Err(Error::UnexpectedFunctionArguments {
                name,
                expected: expected.to_string(),
                found: args.len(),
            });
        }

        Ok(Expression::Function { func, args })
    }
}

fn syntax(reason: String) -> Error {
    Error::CannotParseMetricExpression {
        expression: String::new(),
        reason,
    }
}
