//! Built-in tools
//!
//! The arithmetic tool evaluates expressions with a small recursive-descent
//! parser that only understands numbers, parentheses and the operators
//! `+ - * / // % **`. Nothing else in the input is accepted.

use crate::tool;

#[tool]
/// Calculate a mathematical expression, e.g. "2 + 3 * 4"
pub fn calculate(
    /// A mathematical expression to evaluate
    expression: String,
) -> Result<f64, String> {
    evaluate_expression(&expression)
        .map_err(|e| format!("Cannot evaluate expression '{}': {}", expression, e))
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Number(f64),
    Plus,
    Minus,
    Star,
    Slash,
    FloorSlash,
    Percent,
    Power,
    LParen,
    RParen,
}

fn tokenize(input: &str) -> std::result::Result<Vec<Token>, String> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\n' => {
                i += 1;
            }
            '0'..='9' | '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let literal: String = chars[start..i].iter().collect();
                let value = literal
                    .parse::<f64>()
                    .map_err(|_| format!("invalid number '{}'", literal))?;
                tokens.push(Token::Number(value));
            }
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' => {
                if chars.get(i + 1) == Some(&'*') {
                    tokens.push(Token::Power);
                    i += 2;
                } else {
                    tokens.push(Token::Star);
                    i += 1;
                }
            }
            '/' => {
                if chars.get(i + 1) == Some(&'/') {
                    tokens.push(Token::FloorSlash);
                    i += 2;
                } else {
                    tokens.push(Token::Slash);
                    i += 1;
                }
            }
            '%' => {
                tokens.push(Token::Percent);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            other => return Err(format!("invalid character '{}'", other)),
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.peek();
        self.pos += 1;
        token
    }

    // expr := term (('+' | '-') term)*
    fn expr(&mut self) -> std::result::Result<f64, String> {
        let mut value = self.term()?;
        while let Some(op @ (Token::Plus | Token::Minus)) = self.peek() {
            self.advance();
            let rhs = self.term()?;
            value = if op == Token::Plus { value + rhs } else { value - rhs };
        }
        Ok(value)
    }

    // term := unary (('*' | '/' | '//' | '%') unary)*
    fn term(&mut self) -> std::result::Result<f64, String> {
        let mut value = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(op @ (Token::Star | Token::Slash | Token::FloorSlash | Token::Percent)) => op,
                _ => break,
            };
            self.advance();
            let rhs = self.unary()?;
            value = match op {
                Token::Star => value * rhs,
                _ if rhs == 0.0 => return Err("division by zero".to_string()),
                Token::Slash => value / rhs,
                Token::FloorSlash => (value / rhs).floor(),
                // Result takes the sign of the divisor
                _ => value - rhs * (value / rhs).floor(),
            };
        }
        Ok(value)
    }

    // unary := ('+' | '-') unary | power
    fn unary(&mut self) -> std::result::Result<f64, String> {
        match self.peek() {
            Some(Token::Plus) => {
                self.advance();
                self.unary()
            }
            Some(Token::Minus) => {
                self.advance();
                Ok(-self.unary()?)
            }
            _ => self.power(),
        }
    }

    // power := primary ('**' unary)?
    fn power(&mut self) -> std::result::Result<f64, String> {
        let base = self.primary()?;
        if self.peek() == Some(Token::Power) {
            self.advance();
            let exponent = self.unary()?;
            return Ok(base.powf(exponent));
        }
        Ok(base)
    }

    // primary := number | '(' expr ')'
    fn primary(&mut self) -> std::result::Result<f64, String> {
        match self.advance() {
            Some(Token::Number(value)) => Ok(value),
            Some(Token::LParen) => {
                let value = self.expr()?;
                match self.advance() {
                    Some(Token::RParen) => Ok(value),
                    _ => Err("missing closing parenthesis".to_string()),
                }
            }
            Some(token) => Err(format!("unexpected token {:?}", token)),
            None => Err("unexpected end of expression".to_string()),
        }
    }
}

/// Evaluate an arithmetic expression
pub fn evaluate_expression(input: &str) -> std::result::Result<f64, String> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err("empty expression".to_string());
    }

    let mut parser = Parser { tokens, pos: 0 };
    let value = parser.expr()?;

    if let Some(token) = parser.peek() {
        return Err(format!("unexpected token {:?}", token));
    }
    if !value.is_finite() {
        return Err("result is not a finite number".to_string());
    }

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{ParamType, Tool};
    use serde_json::json;

    #[test]
    fn test_operator_precedence() {
        assert_eq!(evaluate_expression("25*4+10").unwrap(), 110.0);
        assert_eq!(evaluate_expression("2 + 3 * 4").unwrap(), 14.0);
        assert_eq!(evaluate_expression("(2 + 3) * 4").unwrap(), 20.0);
        assert_eq!(evaluate_expression("10 - 4 - 3").unwrap(), 3.0);
        assert_eq!(evaluate_expression("7 / 2").unwrap(), 3.5);
        assert_eq!(evaluate_expression("7 // 2").unwrap(), 3.0);
        assert_eq!(evaluate_expression("-7 % 3").unwrap(), 2.0);
    }

    #[test]
    fn test_power_and_unary() {
        assert_eq!(evaluate_expression("2 ** 3 ** 2").unwrap(), 512.0);
        assert_eq!(evaluate_expression("-2 ** 2").unwrap(), -4.0);
        assert_eq!(evaluate_expression("2 ** -1").unwrap(), 0.5);
        assert_eq!(evaluate_expression("--3").unwrap(), 3.0);
    }

    #[test]
    fn test_rejects_invalid_input() {
        assert!(evaluate_expression("").is_err());
        assert!(evaluate_expression("1 / 0").is_err());
        assert!(evaluate_expression("(1 + 2").is_err());
        assert!(evaluate_expression("1 2").is_err());
        assert!(evaluate_expression("1..2").is_err());
        assert_eq!(
            evaluate_expression("__import__('os')").unwrap_err(),
            "invalid character '_'"
        );
    }

    #[test]
    fn test_calculate_tool() {
        let tool = calculate();
        assert_eq!(tool.name(), "calculate");

        let params = tool.parameters();
        assert_eq!(params.len(), 1);
        assert_eq!(params[0].param_type, Some(ParamType::String));
        assert!(!params[0].has_default);

        let mut args = serde_json::Map::new();
        args.insert("expression".to_string(), json!("15 * 8 - 10"));
        assert_eq!(tool.call(args).unwrap(), json!(110.0));

        let mut bad = serde_json::Map::new();
        bad.insert("expression".to_string(), json!("1 / 0"));
        assert!(tool.call(bad).is_err());
    }
}
