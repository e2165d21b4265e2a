use super::lexer::{Token, TokenKind, tokenize};
use super::{BinaryOperator, Expr, FormulaError};

/// Parses an infix formula into an expression tree.
///
/// ```text
/// expr   := term (('+' | '-') term)*
/// term   := factor (('*' | '/') factor)*
/// factor := NUMBER | IDENT | '(' expr ')' | ('+' | '-') factor
/// ```
pub fn parse_expr(source: &str) -> Result<Expr, FormulaError> {
    let tokens = tokenize(source)?;
    if tokens.is_empty() {
        return Err(FormulaError::Empty);
    }

    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.expr()?;

    match parser.peek() {
        None => Ok(expr),
        Some(Token {
            kind: TokenKind::RParen,
            pos,
        }) => Err(FormulaError::UnmatchedParen { pos: *pos }),
        Some(token) => Err(FormulaError::UnexpectedToken {
            token: token.kind.to_string(),
            pos: token.pos,
        }),
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
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    /// Consumes the next token if it is one of `ops`
    fn take_operator(&mut self, ops: &[(TokenKind, BinaryOperator)]) -> Option<BinaryOperator> {
        let token = self.peek()?;
        let op = ops
            .iter()
            .find(|(kind, _)| *kind == token.kind)
            .map(|&(_, op)| op)?;
        self.pos += 1;
        Some(op)
    }

    fn expr(&mut self) -> Result<Expr, FormulaError> {
        const OPS: [(TokenKind, BinaryOperator); 2] = [
            (TokenKind::Plus, BinaryOperator::Add),
            (TokenKind::Minus, BinaryOperator::Subtract),
        ];
        let mut left = self.term()?;
        while let Some(op) = self.take_operator(&OPS) {
            let right = self.term()?;
            left = Expr::binary(op, left, right);
        }
        Ok(left)
    }

    fn term(&mut self) -> Result<Expr, FormulaError> {
        const OPS: [(TokenKind, BinaryOperator); 2] = [
            (TokenKind::Star, BinaryOperator::Multiply),
            (TokenKind::Slash, BinaryOperator::Divide),
        ];
        let mut left = self.factor()?;
        while let Some(op) = self.take_operator(&OPS) {
            let right = self.factor()?;
            left = Expr::binary(op, left, right);
        }
        Ok(left)
    }

    fn factor(&mut self) -> Result<Expr, FormulaError> {
        let token = self.next().ok_or(FormulaError::UnexpectedEnd)?;
        match token.kind {
            TokenKind::Number(value) => Ok(Expr::Literal(value)),
            TokenKind::Ident(name) => Ok(Expr::Variable(name)),
            TokenKind::Minus => Ok(Expr::Negate(Box::new(self.factor()?))),
            TokenKind::Plus => self.factor(),
            TokenKind::LParen => {
                let inner = self.expr()?;
                match self.next() {
                    Some(Token {
                        kind: TokenKind::RParen,
                        ..
                    }) => Ok(inner),
                    Some(other) => Err(FormulaError::UnexpectedToken {
                        token: other.kind.to_string(),
                        pos: other.pos,
                    }),
                    None => Err(FormulaError::UnclosedParen { pos: token.pos }),
                }
            }
            other => Err(FormulaError::UnexpectedToken {
                token: other.to_string(),
                pos: token.pos,
            }),
        }
    }
}
