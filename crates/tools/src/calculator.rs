//! Arithmetic expression evaluator and the `calculator` tool.
//!
//! Grammar: decimal numbers, `+ - * /` and parentheses. There is no unary
//! minus and no implicit multiplication. Input is sanitized first: any
//! character outside digits, operators, `.`, parentheses and whitespace is
//! dropped.
//!
//! Evaluation is the classic two-stack shunting algorithm: operands on one
//! stack, pending operators on the other, reducing while the operator on top
//! binds at least as tightly as the incoming one.

use std::sync::OnceLock;

use cg_domain::error::Result;
use cg_domain::tool::ToolDefinition;
use regex::Regex;
use serde_json::{json, Value};

use crate::registry::{required_str, Tool};

fn token_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+\.?\d*|[+\-*/()])").expect("valid token regex"))
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    #[error("invalid expression")]
    Empty,
    #[error("expression starts with an operator")]
    LeadingOperator,
    #[error("consecutive operators")]
    ConsecutiveOperators,
    #[error("consecutive operands")]
    ConsecutiveOperands,
    #[error("unbalanced parentheses")]
    UnbalancedParentheses,
    #[error("empty parentheses")]
    EmptyParentheses,
    #[error("expression ends with an operator")]
    TrailingOperator,
    #[error("division by zero")]
    DivisionByZero,
    #[error("invalid number '{0}'")]
    InvalidNumber(String),
    #[error("malformed expression")]
    Malformed,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Op {
    Add,
    Sub,
    Mul,
    Div,
}

impl Op {
    fn precedence(self) -> u8 {
        match self {
            Op::Add | Op::Sub => 1,
            Op::Mul | Op::Div => 2,
        }
    }

    fn apply(self, a: f64, b: f64) -> std::result::Result<f64, EvalError> {
        match self {
            Op::Add => Ok(a + b),
            Op::Sub => Ok(a - b),
            Op::Mul => Ok(a * b),
            Op::Div if b == 0.0 => Err(EvalError::DivisionByZero),
            Op::Div => Ok(a / b),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Num(f64),
    Op(Op),
    LParen,
    RParen,
}

// ── tokenize / validate ────────────────────────────────────────────

fn tokenize(input: &str) -> std::result::Result<Vec<Token>, EvalError> {
    let sanitized: String = input
        .chars()
        .filter(|c| c.is_ascii_digit() || "+-*/.() \t\n".contains(*c))
        .collect();

    let tokens = token_regex()
        .find_iter(&sanitized)
        .map(|m| match m.as_str() {
            "+" => Ok(Token::Op(Op::Add)),
            "-" => Ok(Token::Op(Op::Sub)),
            "*" => Ok(Token::Op(Op::Mul)),
            "/" => Ok(Token::Op(Op::Div)),
            "(" => Ok(Token::LParen),
            ")" => Ok(Token::RParen),
            num => num
                .parse::<f64>()
                .map(Token::Num)
                .map_err(|_| EvalError::InvalidNumber(num.to_string())),
        })
        .collect::<std::result::Result<Vec<_>, _>>()?;

    if tokens.is_empty() {
        return Err(EvalError::Empty);
    }
    Ok(tokens)
}

fn validate(tokens: &[Token]) -> std::result::Result<(), EvalError> {
    let mut expect_operand = true;
    let mut depth: i32 = 0;
    let mut prev: Option<Token> = None;

    for &token in tokens {
        match token {
            Token::Op(_) => {
                if expect_operand {
                    return Err(match prev {
                        None | Some(Token::LParen) => EvalError::LeadingOperator,
                        _ => EvalError::ConsecutiveOperators,
                    });
                }
                expect_operand = true;
            }
            Token::LParen => {
                if !expect_operand {
                    return Err(EvalError::ConsecutiveOperands);
                }
                depth += 1;
            }
            Token::RParen => {
                depth -= 1;
                if depth < 0 {
                    return Err(EvalError::UnbalancedParentheses);
                }
                if expect_operand {
                    return Err(match prev {
                        Some(Token::LParen) => EvalError::EmptyParentheses,
                        _ => EvalError::TrailingOperator,
                    });
                }
            }
            Token::Num(_) => {
                if !expect_operand {
                    return Err(EvalError::ConsecutiveOperands);
                }
                expect_operand = false;
            }
        }
        prev = Some(token);
    }

    if depth != 0 {
        return Err(EvalError::UnbalancedParentheses);
    }
    if expect_operand {
        return Err(EvalError::TrailingOperator);
    }
    Ok(())
}

// ── evaluate ───────────────────────────────────────────────────────

#[derive(Debug)]
enum Pending {
    Op(Op),
    Group,
}

fn reduce_top(values: &mut Vec<f64>, op: Op) -> std::result::Result<(), EvalError> {
    let b = values.pop().ok_or(EvalError::Malformed)?;
    let a = values.pop().ok_or(EvalError::Malformed)?;
    values.push(op.apply(a, b)?);
    Ok(())
}

/// Evaluate an arithmetic expression.
pub fn evaluate(expression: &str) -> std::result::Result<f64, EvalError> {
    let tokens = tokenize(expression)?;
    validate(&tokens)?;

    let mut values: Vec<f64> = Vec::new();
    let mut pending: Vec<Pending> = Vec::new();

    for token in tokens {
        match token {
            Token::Num(n) => values.push(n),
            Token::LParen => pending.push(Pending::Group),
            Token::RParen => loop {
                match pending.pop() {
                    Some(Pending::Op(op)) => reduce_top(&mut values, op)?,
                    Some(Pending::Group) => break,
                    None => return Err(EvalError::UnbalancedParentheses),
                }
            },
            Token::Op(op) => {
                while let Some(Pending::Op(top)) = pending.last() {
                    if top.precedence() < op.precedence() {
                        break;
                    }
                    let top = *top;
                    pending.pop();
                    reduce_top(&mut values, top)?;
                }
                pending.push(Pending::Op(op));
            }
        }
    }

    while let Some(p) = pending.pop() {
        match p {
            Pending::Op(op) => reduce_top(&mut values, op)?,
            Pending::Group => return Err(EvalError::UnbalancedParentheses),
        }
    }

    match values.as_slice() {
        [result] => Ok(*result),
        _ => Err(EvalError::Malformed),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tool
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct CalculatorTool;

#[async_trait::async_trait]
impl Tool for CalculatorTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "calculator".into(),
            description: "Evaluate an arithmetic expression. Supports + - * / and parentheses."
                .into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "expression": {
                        "type": "string",
                        "description": "The expression to evaluate, e.g. '2 + 2' or '10 * 10'"
                    }
                },
                "required": ["expression"]
            }),
        }
    }

    async fn call(&self, args: Value) -> Result<String> {
        let expression = required_str("calculator", &args, "expression")?;
        Ok(match evaluate(expression) {
            Ok(value) => value.to_string(),
            Err(e) => {
                tracing::debug!(expression, error = %e, "calculator rejected expression");
                format!("Error while calculating: {e}")
            }
        })
    }
}
