//! Arithmetic expressions typed into Equation atoms.
//!
//! Variables are the bare words of the text that are not math names. Each
//! becomes an input of the atom. Evaluation is a small recursive-descent
//! parser over `+ - * / % ^`, unary minus, parentheses, the constants
//! `pi` and `e`, and the usual numeric functions.

use molecad_core::GraphError;
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Words that never become inputs, compared case-insensitively
const RESERVED: &[&str] = &[
    "sin", "cos", "tan", "asin", "acos", "atan", "atan2", "sinh", "cosh", "tanh", "asinh",
    "acosh", "atanh", "sqrt", "cbrt", "exp", "log", "log10", "log2", "abs", "sign", "ceil",
    "floor", "round", "trunc", "min", "max", "mean", "median", "mode", "std", "var", "pi", "e",
    "i", "true", "false", "null", "undefined",
];

fn word_regex() -> &'static Regex {
    static WORDS: OnceLock<Regex> = OnceLock::new();
    WORDS.get_or_init(|| Regex::new(r"\b[a-zA-Z]+\b").expect("invalid variable regex"))
}

fn is_reserved(word: &str) -> bool {
    RESERVED.iter().any(|r| r.eq_ignore_ascii_case(word))
}

/// Variable names in order of first appearance
pub fn extract_variables(text: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for found in word_regex().find_iter(text) {
        let word = found.as_str();
        if !is_reserved(word) && !names.iter().any(|n| n == word) {
            names.push(word.to_string());
        }
    }
    names
}

/// Evaluate `text` with the given variable values
pub fn evaluate(text: &str, variables: &HashMap<String, f64>) -> Result<f64, GraphError> {
    let tokens = tokenize(text)?;
    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        variables,
    };
    let value = parser.expression()?;
    if let Some(token) = parser.peek() {
        return Err(equation_error(format!("Unexpected {}", token.describe())));
    }
    if value.is_nan() {
        return Err(equation_error("Result is not a number"));
    }
    Ok(value)
}

fn equation_error(reason: impl Into<String>) -> GraphError {
    GraphError::Equation {
        reason: reason.into(),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Op(char),
    Open,
    Close,
    Comma,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Number(n) => format!("number {}", n),
            Token::Ident(name) => format!("'{}'", name),
            Token::Op(c) => format!("'{}'", c),
            Token::Open => "'('".to_string(),
            Token::Close => "')'".to_string(),
            Token::Comma => "','".to_string(),
        }
    }
}

fn tokenize(text: &str) -> Result<Vec<Token>, GraphError> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let ch = chars[i];
        match ch {
            c if c.is_whitespace() => i += 1,
            '0'..='9' | '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                // exponent, only when followed by digits
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
                let literal: String = chars[start..i].iter().collect();
                let number = literal
                    .parse()
                    .map_err(|_| equation_error(format!("Invalid number '{}'", literal)))?;
                tokens.push(Token::Number(number));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            '+' | '-' | '*' | '/' | '%' | '^' => {
                tokens.push(Token::Op(ch));
                i += 1;
            }
            '(' => {
                tokens.push(Token::Open);
                i += 1;
            }
            ')' => {
                tokens.push(Token::Close);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            other => return Err(equation_error(format!("Unexpected character '{}'", other))),
        }
    }
    Ok(tokens)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    variables: &'a HashMap<String, f64>,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn expect(&mut self, wanted: Token) -> Result<(), GraphError> {
        match self.next() {
            Some(token) if token == wanted => Ok(()),
            Some(token) => Err(equation_error(format!(
                "Expected {} but found {}",
                wanted.describe(),
                token.describe()
            ))),
            None => Err(equation_error(format!(
                "Expected {} at end of equation",
                wanted.describe()
            ))),
        }
    }

    // expression := term (('+' | '-') term)*
    fn expression(&mut self) -> Result<f64, GraphError> {
        let mut value = self.term()?;
        while let Some(Token::Op(op @ ('+' | '-'))) = self.peek().cloned() {
            self.pos += 1;
            let rhs = self.term()?;
            value = if op == '+' { value + rhs } else { value - rhs };
        }
        Ok(value)
    }

    // term := unary (('*' | '/' | '%') unary)*
    fn term(&mut self) -> Result<f64, GraphError> {
        let mut value = self.unary()?;
        while let Some(Token::Op(op @ ('*' | '/' | '%'))) = self.peek().cloned() {
            self.pos += 1;
            let rhs = self.unary()?;
            value = match op {
                '*' => value * rhs,
                '/' => value / rhs,
                _ => value % rhs,
            };
        }
        Ok(value)
    }

    // unary := ('-' | '+') unary | power
    fn unary(&mut self) -> Result<f64, GraphError> {
        match self.peek() {
            Some(Token::Op('-')) => {
                self.pos += 1;
                Ok(-self.unary()?)
            }
            Some(Token::Op('+')) => {
                self.pos += 1;
                self.unary()
            }
            _ => self.power(),
        }
    }

    // power := primary ('^' unary)?   right associative
    fn power(&mut self) -> Result<f64, GraphError> {
        let base = self.primary()?;
        if let Some(Token::Op('^')) = self.peek() {
            self.pos += 1;
            let exponent = self.unary()?;
            return Ok(base.powf(exponent));
        }
        Ok(base)
    }

    fn primary(&mut self) -> Result<f64, GraphError> {
        match self.next() {
            Some(Token::Number(n)) => Ok(n),
            Some(Token::Open) => {
                let value = self.expression()?;
                self.expect(Token::Close)?;
                Ok(value)
            }
            Some(Token::Ident(name)) => {
                if let Some(Token::Open) = self.peek() {
                    self.pos += 1;
                    let args = self.arguments()?;
                    return call(&name, &args);
                }
                if let Some(value) = self.variables.get(&name) {
                    return Ok(*value);
                }
                match name.to_ascii_lowercase().as_str() {
                    "pi" => Ok(std::f64::consts::PI),
                    "e" => Ok(std::f64::consts::E),
                    "true" => Ok(1.0),
                    "false" => Ok(0.0),
                    _ => Err(equation_error(format!("Undefined symbol {}", name))),
                }
            }
            Some(token) => Err(equation_error(format!("Unexpected {}", token.describe()))),
            None => Err(equation_error("Unexpected end of equation")),
        }
    }

    fn arguments(&mut self) -> Result<Vec<f64>, GraphError> {
        let mut args = Vec::new();
        if let Some(Token::Close) = self.peek() {
            self.pos += 1;
            return Ok(args);
        }
        loop {
            args.push(self.expression()?);
            match self.next() {
                Some(Token::Comma) => continue,
                Some(Token::Close) => return Ok(args),
                Some(token) => {
                    return Err(equation_error(format!("Unexpected {}", token.describe())))
                }
                None => return Err(equation_error("Unclosed function call")),
            }
        }
    }
}

fn call(name: &str, args: &[f64]) -> Result<f64, GraphError> {
    let lower = name.to_ascii_lowercase();
    let unary = |f: fn(f64) -> f64| -> Result<f64, GraphError> {
        match args {
            [x] => Ok(f(*x)),
            _ => Err(equation_error(format!(
                "{} expects 1 argument, got {}",
                name,
                args.len()
            ))),
        }
    };
    match lower.as_str() {
        "sin" => unary(f64::sin),
        "cos" => unary(f64::cos),
        "tan" => unary(f64::tan),
        "asin" => unary(f64::asin),
        "acos" => unary(f64::acos),
        "atan" => unary(f64::atan),
        "sinh" => unary(f64::sinh),
        "cosh" => unary(f64::cosh),
        "tanh" => unary(f64::tanh),
        "asinh" => unary(f64::asinh),
        "acosh" => unary(f64::acosh),
        "atanh" => unary(f64::atanh),
        "sqrt" => unary(f64::sqrt),
        "cbrt" => unary(f64::cbrt),
        "exp" => unary(f64::exp),
        "log10" => unary(f64::log10),
        "log2" => unary(f64::log2),
        "abs" => unary(f64::abs),
        "ceil" => unary(f64::ceil),
        "floor" => unary(f64::floor),
        "round" => unary(f64::round),
        "trunc" => unary(f64::trunc),
        "sign" => unary(|x| if x == 0.0 { 0.0 } else { x.signum() }),
        "atan2" => match args {
            [y, x] => Ok(y.atan2(*x)),
            _ => Err(equation_error("atan2 expects 2 arguments")),
        },
        "log" => match args {
            [x] => Ok(x.ln()),
            [x, base] => Ok(x.ln() / base.ln()),
            _ => Err(equation_error("log expects 1 or 2 arguments")),
        },
        "min" | "max" | "mean" | "median" if args.is_empty() => Err(equation_error(format!(
            "{} expects at least 1 argument",
            name
        ))),
        "min" => Ok(args.iter().copied().fold(f64::INFINITY, f64::min)),
        "max" => Ok(args.iter().copied().fold(f64::NEG_INFINITY, f64::max)),
        "mean" => Ok(args.iter().sum::<f64>() / args.len() as f64),
        "median" => {
            let mut sorted = args.to_vec();
            sorted.sort_by(|a, b| a.total_cmp(b));
            let mid = sorted.len() / 2;
            Ok(if sorted.len() % 2 == 0 {
                (sorted[mid - 1] + sorted[mid]) / 2.0
            } else {
                sorted[mid]
            })
        }
        _ => Err(equation_error(format!("Undefined function {}", name))),
    }
}
