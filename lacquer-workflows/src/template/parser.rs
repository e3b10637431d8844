//! ABOUTME: Recursive-descent/Pratt parser for template expressions -> `Expr` AST
//! ABOUTME: Operator precedence low-to-high: ternary, or, and, equality, relational, additive, multiplicative, unary

use super::ast::{BinaryOp, Expr, Literal, UnaryOp};
use super::lexer::{Lexer, Token};
use lacquer_core::error::TemplateError;

pub fn parse(src: &str) -> Result<Expr, TemplateError> {
    let tokens = Lexer::new(src)
        .tokenize()
        .map_err(|(ch, offset)| TemplateError::UnexpectedChar { ch, offset })?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_ternary()?;
    parser.expect_eof()?;
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn expect_eof(&self) -> Result<(), TemplateError> {
        if matches!(self.peek(), Token::Eof) {
            Ok(())
        } else {
            Err(TemplateError::UnexpectedToken {
                expected: "end of expression".into(),
                found: format!("{:?}", self.peek()),
            })
        }
    }

    fn expect(&mut self, want: &Token) -> Result<(), TemplateError> {
        if self.peek() == want {
            self.advance();
            Ok(())
        } else {
            Err(TemplateError::UnexpectedToken {
                expected: format!("{want:?}"),
                found: format!("{:?}", self.peek()),
            })
        }
    }

    // ternary := or ('?' ternary ':' ternary)?
    //          | 'if' or 'else' ternary   (keyword-form: `a if cond else b`, post-fix style not used;
    //            we support the conventional `cond ? a : b` plus a leading `if cond then-expr else else-expr`)
    fn parse_ternary(&mut self) -> Result<Expr, TemplateError> {
        if matches!(self.peek(), Token::If) {
            self.advance();
            let cond = self.parse_or()?;
            // `if cond then x else y` — rare form; then/else use ':' style markers omitted,
            // fall through to a colon-delimited pair for simplicity of the grammar.
            self.expect(&Token::Question)?;
            let if_true = self.parse_ternary()?;
            self.expect(&Token::Colon)?;
            let if_false = self.parse_ternary()?;
            return Ok(Expr::Ternary {
                cond: Box::new(cond),
                if_true: Box::new(if_true),
                if_false: Box::new(if_false),
            });
        }

        let expr = self.parse_or()?;
        if matches!(self.peek(), Token::Question) {
            self.advance();
            let if_true = self.parse_ternary()?;
            self.expect(&Token::Colon)?;
            let if_false = self.parse_ternary()?;
            return Ok(Expr::Ternary {
                cond: Box::new(expr),
                if_true: Box::new(if_true),
                if_false: Box::new(if_false),
            });
        }
        Ok(expr)
    }

    fn parse_or(&mut self) -> Result<Expr, TemplateError> {
        let mut lhs = self.parse_and()?;
        loop {
            match self.peek() {
                Token::OrOr | Token::Or => {
                    self.advance();
                    let rhs = self.parse_and()?;
                    lhs = Expr::Binary {
                        op: BinaryOp::Or,
                        lhs: Box::new(lhs),
                        rhs: Box::new(rhs),
                    };
                }
                _ => return Ok(lhs),
            }
        }
    }

    fn parse_and(&mut self) -> Result<Expr, TemplateError> {
        let mut lhs = self.parse_equality()?;
        loop {
            match self.peek() {
                Token::AndAnd | Token::And => {
                    self.advance();
                    let rhs = self.parse_equality()?;
                    lhs = Expr::Binary {
                        op: BinaryOp::And,
                        lhs: Box::new(lhs),
                        rhs: Box::new(rhs),
                    };
                }
                _ => return Ok(lhs),
            }
        }
    }

    fn parse_equality(&mut self) -> Result<Expr, TemplateError> {
        let mut lhs = self.parse_relational()?;
        loop {
            let op = match self.peek() {
                Token::Eq => BinaryOp::Eq,
                Token::Ne => BinaryOp::Ne,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.parse_relational()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    fn parse_relational(&mut self) -> Result<Expr, TemplateError> {
        let mut lhs = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                Token::Ge => BinaryOp::Ge,
                Token::Le => BinaryOp::Le,
                Token::Gt => BinaryOp::Gt,
                Token::Lt => BinaryOp::Lt,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.parse_additive()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    fn parse_additive(&mut self) -> Result<Expr, TemplateError> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Sub,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.parse_multiplicative()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, TemplateError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Token::Star => BinaryOp::Mul,
                Token::Slash => BinaryOp::Div,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, TemplateError> {
        match self.peek() {
            Token::Bang | Token::Not => {
                self.advance();
                let expr = self.parse_unary()?;
                Ok(Expr::Unary {
                    op: UnaryOp::Not,
                    expr: Box::new(expr),
                })
            }
            Token::Minus => {
                self.advance();
                let expr = self.parse_unary()?;
                Ok(Expr::Unary {
                    op: UnaryOp::Neg,
                    expr: Box::new(expr),
                })
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, TemplateError> {
        match self.advance() {
            Token::Number(n) => Ok(Expr::Literal(Literal::Number(n))),
            Token::Str(s) => Ok(Expr::Literal(Literal::Str(s))),
            Token::Bool(b) => Ok(Expr::Literal(Literal::Bool(b))),
            Token::LParen => {
                let expr = self.parse_ternary()?;
                self.expect(&Token::RParen)?;
                Ok(expr)
            }
            Token::Ident(name) => {
                if matches!(self.peek(), Token::LParen) {
                    self.advance();
                    let args = self.parse_args()?;
                    return Ok(Expr::Call { name, args });
                }
                let mut segments = vec![name];
                while matches!(self.peek(), Token::Dot) {
                    self.advance();
                    match self.advance() {
                        Token::Ident(seg) => segments.push(seg),
                        other => {
                            return Err(TemplateError::UnexpectedToken {
                                expected: "identifier after '.'".into(),
                                found: format!("{other:?}"),
                            })
                        }
                    }
                }
                Ok(Expr::Path(segments))
            }
            other => Err(TemplateError::UnexpectedToken {
                expected: "an expression".into(),
                found: format!("{other:?}"),
            }),
        }
    }

    fn parse_args(&mut self) -> Result<Vec<Expr>, TemplateError> {
        let mut args = Vec::new();
        if matches!(self.peek(), Token::RParen) {
            self.advance();
            return Ok(args);
        }
        loop {
            args.push(self.parse_ternary()?);
            match self.advance() {
                Token::Comma => continue,
                Token::RParen => break,
                other => {
                    return Err(TemplateError::UnexpectedToken {
                        expected: "',' or ')'".into(),
                        found: format!("{other:?}"),
                    })
                }
            }
        }
        Ok(args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_bare_path() {
        let expr = parse("steps.s1.output").unwrap();
        assert_eq!(expr, Expr::Path(vec!["steps".into(), "s1".into(), "output".into()]));
    }

    #[test]
    fn parses_a_function_call() {
        let expr = parse("default(inputs.name, \"ada\")").unwrap();
        assert!(matches!(expr, Expr::Call { name, .. } if name == "default"));
    }

    #[test]
    fn parses_ternary_with_correct_precedence() {
        let expr = parse("inputs.ready ? 1 : 0").unwrap();
        assert!(matches!(expr, Expr::Ternary { .. }));
    }

    #[test]
    fn parses_comparison_and_boolean_combinators() {
        let expr = parse("a >= 1 and not b").unwrap();
        assert!(matches!(expr, Expr::Binary { op: BinaryOp::And, .. }));
    }

    #[test]
    fn unbalanced_parens_is_a_template_syntax_error() {
        let err = parse("(a + b").unwrap_err();
        assert!(matches!(err, TemplateError::UnexpectedToken { .. }));
    }
}
