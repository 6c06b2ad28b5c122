//! Step conditions
//!
//! Conditions are small boolean expressions such as:
//! - `$BRANCH == 'main'`
//! - `env.DEPLOY and build succeeded`
//! - `not (lint failed) || $FORCE`
//!
//! They are parsed and checked against the whole pipeline at build time,
//! then evaluated just before a step is dispatched.

use crate::core::{context::Environment, state::StepOutcome};
use std::collections::HashMap;
use thiserror::Error;

/// Errors found while parsing or checking a condition
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConditionError {
    #[error("step '{step_id}': condition syntax error at {position}: {message}")]
    SyntaxError {
        step_id: String,
        position: usize,
        message: String,
    },

    #[error("step '{step_id}': condition references undefined {kind} '{name}'")]
    UndefinedReference {
        step_id: String,
        kind: ReferenceKind,
        name: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    Variable,
    Step,
}

impl std::fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReferenceKind::Variable => f.write_str("variable"),
            ReferenceKind::Step => f.write_str("step"),
        }
    }
}

/// A value on either side of a comparison
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Env(String),
    Literal(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
}

/// Parsed condition expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    Bool(bool),
    /// A bare operand, tested for truthiness
    Truthy(Operand),
    Compare {
        left: Operand,
        op: CompareOp,
        right: Operand,
    },
    StepIs {
        step_id: String,
        outcome: StepOutcome,
    },
    Not(Box<Condition>),
    And(Box<Condition>, Box<Condition>),
    Or(Box<Condition>, Box<Condition>),
}

impl Condition {
    /// Parse a condition expression belonging to `step_id`
    pub fn parse(step_id: &str, source: &str) -> Result<Self, ConditionError> {
        let tokens = tokenize(source).map_err(|(position, message)| ConditionError::SyntaxError {
            step_id: step_id.to_string(),
            position,
            message,
        })?;

        let mut parser = Parser { tokens, pos: 0, end: source.len() };
        let condition = parser.parse_or().and_then(|c| match parser.peek() {
            None => Ok(c),
            Some((at, tok)) => Err((*at, format!("unexpected {}", tok.describe()))),
        });

        condition.map_err(|(position, message)| ConditionError::SyntaxError {
            step_id: step_id.to_string(),
            position,
            message,
        })
    }

    /// Verify every referenced variable and step exists
    pub fn check<F>(&self, step_id: &str, env: &Environment, step_exists: F) -> Result<(), ConditionError>
    where
        F: Fn(&str) -> bool + Copy,
    {
        let undefined = |kind, name: &str| ConditionError::UndefinedReference {
            step_id: step_id.to_string(),
            kind,
            name: name.to_string(),
        };
        let check_operand = |operand: &Operand| match operand {
            Operand::Env(name) if !env.contains(name) => Err(undefined(ReferenceKind::Variable, name)),
            _ => Ok(()),
        };

        match self {
            Condition::Bool(_) => Ok(()),
            Condition::Truthy(operand) => check_operand(operand),
            Condition::Compare { left, right, .. } => {
                check_operand(left)?;
                check_operand(right)
            }
            Condition::StepIs { step_id: target, .. } => {
                if step_exists(target) {
                    Ok(())
                } else {
                    Err(undefined(ReferenceKind::Step, target))
                }
            }
            Condition::Not(inner) => inner.check(step_id, env, step_exists),
            Condition::And(a, b) | Condition::Or(a, b) => {
                a.check(step_id, env, step_exists)?;
                b.check(step_id, env, step_exists)
            }
        }
    }

    /// Evaluate with short-circuiting `and`/`or`
    ///
    /// A step whose outcome is not recorded yet matches no outcome.
    pub fn evaluate(&self, env: &Environment, outcomes: &HashMap<String, StepOutcome>) -> bool {
        match self {
            Condition::Bool(b) => *b,
            Condition::Truthy(Operand::Env(name)) => is_truthy(env.get(name).unwrap_or("")),
            Condition::Truthy(Operand::Literal(value)) => !value.is_empty(),
            Condition::Compare { left, op, right } => {
                let equal = resolve(left, env) == resolve(right, env);
                match op {
                    CompareOp::Eq => equal,
                    CompareOp::Ne => !equal,
                }
            }
            Condition::StepIs { step_id, outcome } => outcomes.get(step_id) == Some(outcome),
            Condition::Not(inner) => !inner.evaluate(env, outcomes),
            Condition::And(a, b) => a.evaluate(env, outcomes) && b.evaluate(env, outcomes),
            Condition::Or(a, b) => a.evaluate(env, outcomes) || b.evaluate(env, outcomes),
        }
    }

    /// Step IDs this condition refers to
    pub fn referenced_steps(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_steps(&mut out);
        out
    }

    fn collect_steps<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Condition::StepIs { step_id, .. } => out.push(step_id),
            Condition::Not(inner) => inner.collect_steps(out),
            Condition::And(a, b) | Condition::Or(a, b) => {
                a.collect_steps(out);
                b.collect_steps(out);
            }
            _ => {}
        }
    }
}

fn resolve<'a>(operand: &'a Operand, env: &'a Environment) -> &'a str {
    match operand {
        Operand::Env(name) => env.get(name).unwrap_or(""),
        Operand::Literal(value) => value,
    }
}

/// Non-empty and not `false` or `0`
pub fn is_truthy(value: &str) -> bool {
    !value.is_empty() && value != "false" && value != "0"
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Var(String),
    Str(String),
    Eq,
    Ne,
    And,
    Or,
    Bang,
    LParen,
    RParen,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Word(w) => format!("'{}'", w),
            Token::Var(v) => format!("variable '{}'", v),
            Token::Str(_) => "string literal".to_string(),
            Token::Eq => "'=='".to_string(),
            Token::Ne => "'!='".to_string(),
            Token::And => "'&&'".to_string(),
            Token::Or => "'||'".to_string(),
            Token::Bang => "'!'".to_string(),
            Token::LParen => "'('".to_string(),
            Token::RParen => "')'".to_string(),
        }
    }
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.'
}

fn tokenize(source: &str) -> Result<Vec<(usize, Token)>, (usize, String)> {
    let mut tokens = Vec::new();
    let mut chars = source.char_indices().peekable();

    while let Some(&(at, c)) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' | ')' => {
                chars.next();
                tokens.push((at, if c == '(' { Token::LParen } else { Token::RParen }));
            }
            '=' | '!' | '&' | '|' => {
                chars.next();
                let next = chars.peek().map(|&(_, n)| n);
                let token = match (c, next) {
                    ('=', Some('=')) => Token::Eq,
                    ('!', Some('=')) => Token::Ne,
                    ('&', Some('&')) => Token::And,
                    ('|', Some('|')) => Token::Or,
                    ('!', _) => {
                        tokens.push((at, Token::Bang));
                        continue;
                    }
                    _ => return Err((at, format!("unexpected character '{}'", c))),
                };
                chars.next();
                tokens.push((at, token));
            }
            '\'' | '"' => {
                chars.next();
                let mut value = String::new();
                let mut closed = false;
                while let Some((_, ch)) = chars.next() {
                    match ch {
                        '\\' => match chars.next() {
                            Some((_, 'n')) => value.push('\n'),
                            Some((_, 't')) => value.push('\t'),
                            Some((_, other)) => value.push(other),
                            None => break,
                        },
                        ch if ch == c => {
                            closed = true;
                            break;
                        }
                        ch => value.push(ch),
                    }
                }
                if !closed {
                    return Err((at, "unterminated string literal".to_string()));
                }
                tokens.push((at, Token::Str(value)));
            }
            '$' => {
                chars.next();
                let name = take_word(&mut chars);
                if name.is_empty() {
                    return Err((at, "expected variable name after '$'".to_string()));
                }
                tokens.push((at, Token::Var(name)));
            }
            c if is_word_char(c) => {
                let word = take_word(&mut chars);
                let token = match word.strip_prefix("env.") {
                    Some("") => return Err((at, "expected variable name after 'env.'".to_string())),
                    Some(name) => Token::Var(name.to_string()),
                    None => Token::Word(word),
                };
                tokens.push((at, token));
            }
            other => return Err((at, format!("unexpected character '{}'", other))),
        }
    }

    Ok(tokens)
}

fn take_word(chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>) -> String {
    let mut word = String::new();
    while let Some(&(_, c)) = chars.peek() {
        if !is_word_char(c) {
            break;
        }
        word.push(c);
        chars.next();
    }
    word
}

type ParseResult<T> = Result<T, (usize, String)>;

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
    end: usize,
}

impl Parser {
    fn peek(&self) -> Option<&(usize, Token)> {
        self.tokens.get(self.pos)
    }

    fn peek_token(&self) -> Option<&Token> {
        self.peek().map(|(_, t)| t)
    }

    fn next(&mut self) -> ParseResult<(usize, Token)> {
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or_else(|| (self.end, "unexpected end of expression".to_string()))?;
        self.pos += 1;
        Ok(token)
    }

    /// Consume either the symbol or the keyword spelling of an operator
    fn eat(&mut self, symbol: Token, keyword: &str) -> bool {
        let matched = match self.peek_token() {
            Some(Token::Word(w)) => w == keyword,
            Some(token) => *token == symbol,
            None => false,
        };
        if matched {
            self.pos += 1;
        }
        matched
    }

    fn parse_or(&mut self) -> ParseResult<Condition> {
        let mut left = self.parse_and()?;
        loop {
            if self.eat(Token::Or, "or") {
                let right = self.parse_and()?;
                left = Condition::Or(Box::new(left), Box::new(right));
            } else {
                return Ok(left);
            }
        }
    }

    fn parse_and(&mut self) -> ParseResult<Condition> {
        let mut left = self.parse_unary()?;
        loop {
            if self.eat(Token::And, "and") {
                let right = self.parse_unary()?;
                left = Condition::And(Box::new(left), Box::new(right));
            } else {
                return Ok(left);
            }
        }
    }

    fn parse_unary(&mut self) -> ParseResult<Condition> {
        if self.eat(Token::Bang, "not") {
            let inner = self.parse_unary()?;
            return Ok(Condition::Not(Box::new(inner)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> ParseResult<Condition> {
        let (at, token) = self.next()?;
        match token {
            Token::LParen => {
                let inner = self.parse_or()?;
                match self.next()? {
                    (_, Token::RParen) => Ok(inner),
                    (at, other) => Err((at, format!("expected ')', found {}", other.describe()))),
                }
            }
            Token::Word(w) if w == "true" => Ok(Condition::Bool(true)),
            Token::Word(w) if w == "false" => Ok(Condition::Bool(false)),
            Token::Word(step_id) => {
                let outcome = match self.next()? {
                    (_, Token::Word(s)) if s == "succeeded" => StepOutcome::Success,
                    (_, Token::Word(s)) if s == "failed" => StepOutcome::Failed,
                    (_, Token::Word(s)) if s == "skipped" => StepOutcome::Skipped,
                    (at, other) => {
                        return Err((
                            at,
                            format!(
                                "expected 'succeeded', 'failed' or 'skipped' after step '{}', found {}",
                                step_id,
                                other.describe()
                            ),
                        ))
                    }
                };
                Ok(Condition::StepIs { step_id, outcome })
            }
            Token::Var(name) => self.finish_operand(Operand::Env(name)),
            Token::Str(value) => self.finish_operand(Operand::Literal(value)),
            other => Err((at, format!("unexpected {}", other.describe()))),
        }
    }

    fn finish_operand(&mut self, left: Operand) -> ParseResult<Condition> {
        let op = match self.peek_token() {
            Some(Token::Eq) => CompareOp::Eq,
            Some(Token::Ne) => CompareOp::Ne,
            _ => return Ok(Condition::Truthy(left)),
        };
        self.pos += 1;

        let right = match self.next()? {
            (_, Token::Var(name)) => Operand::Env(name),
            (_, Token::Str(value)) => Operand::Literal(value),
            (at, other) => return Err((at, format!("expected variable or string, found {}", other.describe()))),
        };
        Ok(Condition::Compare { left, op, right })
    }
}
