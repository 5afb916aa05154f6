//! `${...}` templates for prompt formats.
//!
//! # Grammar
//!
//! Expressions are deliberately small; nothing can call code:
//! - literals: `'text'`, `"text"`, numbers, `true`, `false`, `null`
//! - paths: `name`, `a.b`, `a[0]`, `a['key']`
//! - concatenation (or numeric addition): `a + ' ' + b`
//! - conditionals: `cond ? a : b`, with parentheses for grouping
//!
//! Unknown names evaluate to null and render as nothing. A `${` whose body
//! does not parse is left in the output verbatim.

use serde_json::Value;

use crate::memory::format_number;

/// Deepest grouping, indexing or member chain a template may use.
const MAX_NESTING: usize = 64;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Str(String),
    Num(f64),
    Ident(String),
    Dot,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Plus,
    Question,
    Colon,
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Literal(Value),
    Variable(String),
    Member(Box<Expr>, Box<Expr>),
    Concat(Vec<Expr>),
    Conditional(Box<Expr>, Box<Expr>, Box<Expr>),
}

/// Render every `${expr}` in `template` against `context`.
pub fn render_template(template: &str, context: &Value) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let body = &rest[start + 2..];

        // The first closing brace that ends a parseable expression wins, so
        // braces inside string literals work.
        let resolved = body
            .match_indices('}')
            .find_map(|(close, _)| parse(&body[..close]).map(|expr| (close, expr)));

        match resolved {
            Some((close, expr)) => {
                out.push_str(&render_value(&expr.eval(context)));
                rest = &body[close + 1..];
            }
            None => {
                out.push_str("${");
                rest = body;
            }
        }
    }

    out.push_str(rest);
    out
}

/// Text form of a value as it appears in rendered output.
pub fn render_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.as_f64().map(format_number).unwrap_or_default(),
        Value::String(s) => s.clone(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

impl Expr {
    fn eval(&self, context: &Value) -> Value {
        match self {
            Expr::Literal(value) => value.clone(),
            Expr::Variable(name) => context.get(name).cloned().unwrap_or(Value::Null),
            Expr::Member(object, key) => {
                let object = object.eval(context);
                let key = key.eval(context);
                lookup(&object, &key).unwrap_or(Value::Null)
            }
            Expr::Concat(parts) => {
                let mut values = parts.iter().map(|p| p.eval(context));
                let first = values.next().unwrap_or(Value::Null);
                values.fold(first, |acc, next| match (acc.as_f64(), next.as_f64()) {
                    (Some(a), Some(b)) if acc.is_number() && next.is_number() => {
                        serde_json::Number::from_f64(a + b)
                            .map(Value::Number)
                            .unwrap_or(Value::Null)
                    }
                    _ => Value::String(render_value(&acc) + &render_value(&next)),
                })
            }
            Expr::Conditional(cond, then, otherwise) => {
                if truthy(&cond.eval(context)) {
                    then.eval(context)
                } else {
                    otherwise.eval(context)
                }
            }
        }
    }
}

fn lookup(object: &Value, key: &Value) -> Option<Value> {
    match object {
        Value::Array(items) => {
            let index = match key {
                Value::Number(n) => n.as_u64().map(|n| n as usize),
                Value::String(s) => s.parse::<usize>().ok(),
                _ => None,
            }?;
            items.get(index).cloned()
        }
        Value::Object(map) => map.get(&render_value(key)).cloned(),
        Value::String(s) if render_value(key) == "length" => Some(Value::from(s.chars().count())),
        _ => None,
    }
}

fn parse(source: &str) -> Option<Expr> {
    let tokens = tokenize(source)?;
    if tokens.is_empty() {
        return None;
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let expr = parser.conditional()?;
    (parser.pos == parser.tokens.len()).then_some(expr)
}

fn tokenize(source: &str) -> Option<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = source.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '.' => {
                chars.next();
                tokens.push(Token::Dot);
            }
            '[' => {
                chars.next();
                tokens.push(Token::LBracket);
            }
            ']' => {
                chars.next();
                tokens.push(Token::RBracket);
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '+' => {
                chars.next();
                tokens.push(Token::Plus);
            }
            '?' => {
                chars.next();
                tokens.push(Token::Question);
            }
            ':' => {
                chars.next();
                tokens.push(Token::Colon);
            }
            '\'' | '"' => {
                let quote = c;
                chars.next();
                let mut text = String::new();
                loop {
                    match chars.next()? {
                        '\\' => match chars.next()? {
                            'n' => text.push('\n'),
                            't' => text.push('\t'),
                            other => text.push(other),
                        },
                        ch if ch == quote => break,
                        ch => text.push(ch),
                    }
                }
                tokens.push(Token::Str(text));
            }
            c if c.is_ascii_digit() => {
                let mut number = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        number.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Num(number.parse().ok()?));
            }
            c if c.is_alphabetic() || c == '_' || c == '$' => {
                let mut ident = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_alphanumeric() || d == '_' || d == '$' {
                        ident.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(ident));
            }
            _ => return None,
        }
    }

    Some(tokens)
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

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn conditional(&mut self) -> Option<Expr> {
        if self.depth >= MAX_NESTING {
            return None;
        }
        self.depth += 1;
        let expr = self.ternary();
        self.depth -= 1;
        expr
    }

    fn ternary(&mut self) -> Option<Expr> {
        let cond = self.concat()?;
        if !self.eat(&Token::Question) {
            return Some(cond);
        }
        let then = self.conditional()?;
        if !self.eat(&Token::Colon) {
            return None;
        }
        let otherwise = self.conditional()?;
        Some(Expr::Conditional(
            Box::new(cond),
            Box::new(then),
            Box::new(otherwise),
        ))
    }

    fn concat(&mut self) -> Option<Expr> {
        let mut parts = vec![self.postfix()?];
        while self.eat(&Token::Plus) {
            parts.push(self.postfix()?);
        }
        Some(if parts.len() == 1 {
            parts.remove(0)
        } else {
            Expr::Concat(parts)
        })
    }

    fn postfix(&mut self) -> Option<Expr> {
        let mut expr = self.primary()?;
        let mut chain = 0;
        loop {
            if matches!(self.peek(), Some(Token::Dot | Token::LBracket)) {
                chain += 1;
                if chain > MAX_NESTING {
                    return None;
                }
            }
            if self.eat(&Token::Dot) {
                let Some(Token::Ident(name)) = self.peek().cloned() else {
                    return None;
                };
                self.pos += 1;
                expr = Expr::Member(Box::new(expr), Box::new(Expr::Literal(Value::String(name))));
            } else if self.eat(&Token::LBracket) {
                let key = self.conditional()?;
                if !self.eat(&Token::RBracket) {
                    return None;
                }
                expr = Expr::Member(Box::new(expr), Box::new(key));
            } else {
                return Some(expr);
            }
        }
    }

    fn primary(&mut self) -> Option<Expr> {
        let token = self.peek().cloned()?;
        self.pos += 1;
        match token {
            Token::Str(text) => Some(Expr::Literal(Value::String(text))),
            Token::Num(n) => serde_json::Number::from_f64(n).map(|n| Expr::Literal(Value::Number(n))),
            Token::Ident(name) => Some(match name.as_str() {
                "true" => Expr::Literal(Value::Bool(true)),
                "false" => Expr::Literal(Value::Bool(false)),
                "null" | "undefined" => Expr::Literal(Value::Null),
                _ => Expr::Variable(name),
            }),
            Token::LParen => {
                let inner = self.conditional()?;
                self.eat(&Token::RParen).then_some(inner)
            }
            _ => None,
        }
    }
}
