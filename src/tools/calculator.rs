//! Arithmetic expression tool.
//!
//! Supports `+ - * / % **`, parentheses, unary signs, the constants `PI`
//! and `E`, and the usual math functions. Names may carry a `Math.`
//! prefix (`Math.sqrt(16)`), which is what models tend to emit.

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::values::number_value;

use super::{failure, required_str, Parameter, ParameterKind, Tool, ToolError, CALCULATOR};

pub struct Calculator;

/// Deepest nesting of parentheses, signs and exponents accepted.
const MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Power,
    LParen,
    RParen,
    Comma,
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '0'..='9' | '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                if i < chars.len() && matches!(chars[i], 'e' | 'E') {
                    let mut j = i + 1;
                    if j < chars.len() && matches!(chars[j], '+' | '-') {
                        j += 1;
                    }
                    if j < chars.len() && chars[j].is_ascii_digit() {
                        i = j;
                        while i < chars.len() && chars[i].is_ascii_digit() {
                            i += 1;
                        }
                    }
                }
                let text: String = chars[start..i].iter().collect();
                let n = text
                    .parse::<f64>()
                    .map_err(|_| format!("Invalid number '{}'", text))?;
                tokens.push(Token::Number(n));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_ascii_alphanumeric() || chars[i] == '_' || chars[i] == '.')
                {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            '*' if chars.get(i + 1) == Some(&'*') => {
                tokens.push(Token::Power);
                i += 2;
            }
            '^' => {
                tokens.push(Token::Power);
                i += 1;
            }
            '+' | '-' | '*' | '/' | '%' | '(' | ')' | ',' => {
                tokens.push(match c {
                    '+' => Token::Plus,
                    '-' => Token::Minus,
                    '*' => Token::Star,
                    '/' => Token::Slash,
                    '%' => Token::Percent,
                    '(' => Token::LParen,
                    ')' => Token::RParen,
                    _ => Token::Comma,
                });
                i += 1;
            }
            other => return Err(format!("Unexpected character '{}'", other)),
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
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

    fn expect(&mut self, expected: Token) -> Result<(), String> {
        match self.next() {
            Some(token) if token == expected => Ok(()),
            Some(token) => Err(format!("Expected {:?}, found {:?}", expected, token)),
            None => Err(format!("Expected {:?}, found end of expression", expected)),
        }
    }

    // expr := term (('+' | '-') term)*
    fn expr(&mut self) -> Result<f64, String> {
        let mut value = self.term()?;
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.pos += 1;
                    value += self.term()?;
                }
                Some(Token::Minus) => {
                    self.pos += 1;
                    value -= self.term()?;
                }
                _ => return Ok(value),
            }
        }
    }

    // term := unary (('*' | '/' | '%') unary)*
    fn term(&mut self) -> Result<f64, String> {
        let mut value = self.unary()?;
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.pos += 1;
                    value *= self.unary()?;
                }
                Some(Token::Slash) => {
                    self.pos += 1;
                    value /= self.unary()?;
                }
                Some(Token::Percent) => {
                    self.pos += 1;
                    value %= self.unary()?;
                }
                _ => return Ok(value),
            }
        }
    }

    // Every nested construct passes through here, so this bounds recursion.
    fn unary(&mut self) -> Result<f64, String> {
        if self.depth >= MAX_DEPTH {
            return Err("Expression nested too deeply".to_string());
        }
        self.depth += 1;
        let value = self.signed();
        self.depth -= 1;
        value
    }

    // unary := ('+' | '-') unary | power
    fn signed(&mut self) -> Result<f64, String> {
        match self.peek() {
            Some(Token::Minus) => {
                self.pos += 1;
                Ok(-self.unary()?)
            }
            Some(Token::Plus) => {
                self.pos += 1;
                self.unary()
            }
            _ => self.power(),
        }
    }

    // power := primary ('**' unary)?   (right associative)
    fn power(&mut self) -> Result<f64, String> {
        let base = self.primary()?;
        if self.peek() == Some(&Token::Power) {
            self.pos += 1;
            let exponent = self.unary()?;
            return Ok(base.powf(exponent));
        }
        Ok(base)
    }

    fn primary(&mut self) -> Result<f64, String> {
        match self.next() {
            Some(Token::Number(n)) => Ok(n),
            Some(Token::LParen) => {
                let value = self.expr()?;
                self.expect(Token::RParen)?;
                Ok(value)
            }
            Some(Token::Ident(name)) => {
                let name = name.strip_prefix("Math.").unwrap_or(&name).to_string();
                if self.peek() == Some(&Token::LParen) {
                    self.pos += 1;
                    let args = self.arguments()?;
                    call_function(&name, &args)
                } else {
                    constant(&name)
                }
            }
            Some(token) => Err(format!("Unexpected token {:?}", token)),
            None => Err("Unexpected end of expression".to_string()),
        }
    }

    fn arguments(&mut self) -> Result<Vec<f64>, String> {
        let mut args = Vec::new();
        if self.peek() == Some(&Token::RParen) {
            self.pos += 1;
            return Ok(args);
        }
        loop {
            args.push(self.expr()?);
            match self.next() {
                Some(Token::Comma) => continue,
                Some(Token::RParen) => return Ok(args),
                _ => return Err("Expected ',' or ')' in function call".to_string()),
            }
        }
    }
}

fn constant(name: &str) -> Result<f64, String> {
    match name {
        "PI" => Ok(std::f64::consts::PI),
        "E" => Ok(std::f64::consts::E),
        other => Err(format!("Unknown identifier '{}'", other)),
    }
}

fn call_function(name: &str, args: &[f64]) -> Result<f64, String> {
    let unary = |f: fn(f64) -> f64| match args {
        [x] => Ok(f(*x)),
        _ => Err(format!("{} expects 1 argument, got {}", name, args.len())),
    };

    match name {
        "sqrt" => unary(f64::sqrt),
        "cbrt" => unary(f64::cbrt),
        "abs" => unary(f64::abs),
        "floor" => unary(f64::floor),
        "ceil" => unary(f64::ceil),
        // Halves round towards positive infinity.
        "round" => unary(|x| (x + 0.5).floor()),
        "trunc" => unary(f64::trunc),
        "sign" => unary(|x| if x == 0.0 || x.is_nan() { x } else { x.signum() }),
        "sin" => unary(f64::sin),
        "cos" => unary(f64::cos),
        "tan" => unary(f64::tan),
        "log" => unary(f64::ln),
        "log2" => unary(f64::log2),
        "log10" => unary(f64::log10),
        "exp" => unary(f64::exp),
        "pow" => match args {
            [base, exponent] => Ok(base.powf(*exponent)),
            _ => Err(format!("pow expects 2 arguments, got {}", args.len())),
        },
        "min" => Ok(args.iter().copied().fold(f64::INFINITY, f64::min)),
        "max" => Ok(args.iter().copied().fold(f64::NEG_INFINITY, f64::max)),
        "hypot" => Ok(args.iter().map(|x| x * x).sum::<f64>().sqrt()),
        other => Err(format!("Unknown function '{}'", other)),
    }
}

/// Evaluate an arithmetic expression.
pub fn evaluate_expression(expression: &str) -> Result<f64, String> {
    let tokens = tokenize(expression)?;
    if tokens.is_empty() {
        return Err("Empty expression".to_string());
    }

    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let value = parser.expr()?;
    if let Some(token) = parser.peek() {
        return Err(format!("Unexpected token {:?}", token));
    }
    Ok(value)
}

#[async_trait]
impl Tool for Calculator {
    fn name(&self) -> &str {
        CALCULATOR
    }

    fn description(&self) -> &str {
        "Perform mathematical calculations. Supports basic operations and functions."
    }

    fn parameters(&self) -> Vec<Parameter> {
        vec![Parameter::new(
            "expression",
            ParameterKind::String,
            "Mathematical expression to evaluate (e.g., '2 + 2', 'Math.sqrt(16)', 'Math.pow(2, 3)')",
        )
        .required()]
    }

    async fn execute(&self, args: Map<String, Value>) -> Result<Value, ToolError> {
        let expression = required_str(
            CALCULATOR,
            &args,
            "expression",
            "Provide the expression to evaluate.",
        )?;

        match evaluate_expression(expression) {
            Ok(result) => Ok(json!({
                "success": true,
                "expression": expression,
                "result": number_value(result),
            })),
            Err(e) => Ok(failure(e)),
        }
    }
}
