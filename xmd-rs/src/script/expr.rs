//! XMD expression lexer and parser.
//!
//! Expressions appear on the right of `set`, in `if`/`while` conditions, as
//! call arguments, and as bare statement lines.  The parser is
//! precedence-climbing; each level handles one row of the table below.
//!
//! | Level          | Operators                                  |
//! |----------------|--------------------------------------------|
//! | lambda/assign  | `x => e`, `(a, b) => e`, `x = e`, `x += e` |
//! | ternary        | `c ? a : b` (right-associative)            |
//! | or             | `\|\|`, `or`                               |
//! | and            | `&&`, `and`                                |
//! | equality       | `==`, `!=`                                 |
//! | relational     | `<`, `<=`, `>`, `>=`                       |
//! | additive       | `+`, `-`                                   |
//! | multiplicative | `*`, `/`, `%`                              |
//! | unary          | `-`, `!`, `not`, `await`, `...`            |
//! | postfix        | `f(..)`, `.name`, `.m(..)`, `[i]`          |
//!
//! Inside conditions a single `=` is read as equality.

use super::ast::{AssignOp, AstNode, BinOp, Literal, Node, SourceLocation, UnaryOp};

/// Receivers whose dotted members are builtin functions rather than
/// variable properties (`Date.now`, `json.parse`, ...).
const NAMESPACES: &[&str] = &["Date", "json", "JSON", "yaml", "YAML", "Math"];

// ── Token ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    Str(String),
    Ident(String),
    /// `${name}` or `{{name}}`
    VarRef(String),

    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,

    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,

    Assign,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    PercentAssign,

    Question,
    Colon,
    Comma,
    Dot,
    DotDot,
    Ellipsis,
    Arrow,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    /// Unrecognised input character, reported by the parser.
    Unknown(char),
    Eof,
}

// ── Lexer ─────────────────────────────────────────────────────────────────────

struct Lexer<'a> {
    src: &'a str,
    pos: usize,
    /// Character column of `pos`, zero-based.
    col: usize,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Lexer { src, pos: 0, col: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek2(&self) -> Option<char> {
        self.rest().chars().nth(1)
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        self.col += 1;
        Some(ch)
    }

    fn eat(&mut self, ch: char) -> bool {
        if self.peek() == Some(ch) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.advance();
        }
    }

    fn read_number(&mut self, first: char) -> Token {
        let mut s = String::new();
        s.push(first);
        while let Some(c @ '0'..='9') = self.peek() {
            s.push(c);
            self.advance();
        }
        // `1..5` is a range, not a fraction.
        if self.peek() == Some('.') && matches!(self.peek2(), Some('0'..='9')) {
            s.push('.');
            self.advance();
            while let Some(c @ '0'..='9') = self.peek() {
                s.push(c);
                self.advance();
            }
        }
        if matches!(self.peek(), Some('e' | 'E'))
            && matches!(self.peek2(), Some('0'..='9' | '+' | '-'))
        {
            s.push('e');
            self.advance();
            if let Some(c @ ('+' | '-')) = self.peek() {
                s.push(c);
                self.advance();
            }
            while let Some(c @ '0'..='9') = self.peek() {
                s.push(c);
                self.advance();
            }
        }
        Token::Number(s.parse().unwrap_or(0.0))
    }

    fn read_string(&mut self, quote: char) -> Result<Token, String> {
        let mut s = String::new();
        loop {
            match self.advance() {
                None => return Err("unterminated string literal".into()),
                Some('\\') => match self.advance() {
                    Some('n') => s.push('\n'),
                    Some('t') => s.push('\t'),
                    Some('r') => s.push('\r'),
                    Some(c) => s.push(c),
                    None => return Err("unterminated string literal".into()),
                },
                Some(c) if c == quote => break,
                Some(c) => s.push(c),
            }
        }
        Ok(Token::Str(s))
    }

    fn read_ident(&mut self, first: char) -> Token {
        let mut s = String::new();
        s.push(first);
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                s.push(c);
                self.advance();
            } else {
                break;
            }
        }
        Token::Ident(s)
    }

    /// `{{ name }}` — called with the first `{` already consumed.
    fn read_brace_ref(&mut self) -> Option<Token> {
        let body = self.rest().strip_prefix('{')?;
        let end = body.find("}}")?;
        let inner = body[..end].trim();
        if inner.is_empty() || !is_ref_path(inner) {
            return None;
        }
        let consumed = 1 + end + 2;
        self.col += self.src[self.pos..self.pos + consumed].chars().count();
        self.pos += consumed;
        Some(Token::VarRef(inner.to_owned()))
    }

    /// `${name}` or `$name` — called with `$` consumed.
    fn read_dollar_ref(&mut self) -> Token {
        if self.eat('{') {
            let mut name = String::new();
            loop {
                match self.advance() {
                    None => return Token::Unknown('$'),
                    Some('}') => break,
                    Some(c) => name.push(c),
                }
            }
            return Token::VarRef(name.trim().to_owned());
        }
        match self.peek() {
            Some(c) if c.is_alphabetic() || c == '_' => {
                self.advance();
                match self.read_ident(c) {
                    Token::Ident(name) => Token::VarRef(name),
                    other => other,
                }
            }
            _ => Token::Unknown('$'),
        }
    }

    fn next_token(&mut self) -> Result<(Token, usize), String> {
        self.skip_ws();
        let col = self.col;
        let ch = match self.advance() {
            None => return Ok((Token::Eof, col)),
            Some(c) => c,
        };

        let tok = match ch {
            '0'..='9' => self.read_number(ch),
            '"' | '\'' | '`' => self.read_string(ch)?,
            c if c.is_alphabetic() || c == '_' => self.read_ident(c),
            '$' => self.read_dollar_ref(),
            '{' => match self.read_brace_ref() {
                Some(t) => t,
                None => Token::LBrace,
            },
            '}' => Token::RBrace,
            '+' => {
                if self.eat('=') {
                    Token::PlusAssign
                } else {
                    Token::Plus
                }
            }
            '-' => {
                if self.eat('=') {
                    Token::MinusAssign
                } else {
                    Token::Minus
                }
            }
            '*' => {
                if self.eat('=') {
                    Token::StarAssign
                } else {
                    Token::Star
                }
            }
            '/' => {
                if self.eat('=') {
                    Token::SlashAssign
                } else {
                    Token::Slash
                }
            }
            '%' => {
                if self.eat('=') {
                    Token::PercentAssign
                } else {
                    Token::Percent
                }
            }
            '!' => {
                if self.eat('=') {
                    Token::Ne
                } else {
                    Token::Bang
                }
            }
            '&' => {
                if self.eat('&') {
                    Token::And
                } else {
                    Token::Unknown('&')
                }
            }
            '|' => {
                if self.eat('|') {
                    Token::Or
                } else {
                    Token::Unknown('|')
                }
            }
            '<' => {
                if self.eat('=') {
                    Token::Le
                } else {
                    Token::Lt
                }
            }
            '>' => {
                if self.eat('=') {
                    Token::Ge
                } else {
                    Token::Gt
                }
            }
            '=' => {
                if self.eat('=') {
                    Token::Eq
                } else if self.eat('>') {
                    Token::Arrow
                } else {
                    Token::Assign
                }
            }
            '.' => {
                if self.eat('.') {
                    if self.eat('.') {
                        Token::Ellipsis
                    } else {
                        Token::DotDot
                    }
                } else {
                    Token::Dot
                }
            }
            '?' => Token::Question,
            ':' => Token::Colon,
            ',' => Token::Comma,
            '(' => Token::LParen,
            ')' => Token::RParen,
            '[' => Token::LBracket,
            ']' => Token::RBracket,
            c => Token::Unknown(c),
        };
        Ok((tok, col))
    }

    fn tokenize(mut self) -> Result<Vec<(Token, usize)>, String> {
        let mut tokens = Vec::new();
        loop {
            let t = self.next_token()?;
            let done = t.0 == Token::Eof;
            tokens.push(t);
            if done {
                break;
            }
        }
        Ok(tokens)
    }
}

/// `name`, `user.name`, `items[0]` — what `{{...}}` may contain.
pub fn is_ref_path(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '.' | '[' | ']'))
}

pub fn is_ident(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => chars.all(|c| c.is_alphanumeric() || c == '_'),
        _ => false,
    }
}

/// Split a source string into tokens, dropping positions.
pub fn tokenize(src: &str) -> Result<Vec<Token>, String> {
    Ok(Lexer::new(src)
        .tokenize()?
        .into_iter()
        .map(|(t, _)| t)
        .collect())
}

// ── Parser ────────────────────────────────────────────────────────────────────

/// Deepest nesting of brackets, prefix operators and ternaries accepted in
/// one expression.
const MAX_NESTING: usize = 64;

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
    origin: SourceLocation,
    /// `=` means `==` (conditions).
    cond_mode: bool,
    depth: usize,
}

impl Parser {
    fn new(tokens: Vec<(Token, usize)>, origin: &SourceLocation, cond_mode: bool) -> Self {
        Parser {
            tokens,
            pos: 0,
            origin: origin.clone(),
            cond_mode,
            depth: 0,
        }
    }

    /// Run one level of recursive descent under the nesting limit.
    fn nested(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<AstNode, String>,
    ) -> Result<AstNode, String> {
        if self.depth >= MAX_NESTING {
            return Err("expression nested too deeply".to_owned());
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn peek(&self) -> &Token {
        self.tokens.get(self.pos).map(|(t, _)| t).unwrap_or(&Token::Eof)
    }

    fn peek_at(&self, offset: usize) -> &Token {
        self.tokens
            .get(self.pos + offset)
            .map(|(t, _)| t)
            .unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) -> Token {
        let t = self
            .tokens
            .get(self.pos)
            .map(|(t, _)| t.clone())
            .unwrap_or(Token::Eof);
        self.pos += 1;
        t
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == expected {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token, what: &str) -> Result<(), String> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(format!("expected {what}, found {}", describe(self.peek())))
        }
    }

    fn eat_word(&mut self, word: &str) -> bool {
        if matches!(self.peek(), Token::Ident(w) if w == word) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Location of the current token.
    fn loc(&self) -> SourceLocation {
        let col = self.tokens.get(self.pos).map(|(_, c)| *c).unwrap_or(0);
        SourceLocation {
            line: self.origin.line,
            column: self.origin.column + col,
            filename: self.origin.filename.clone(),
        }
    }

    fn node(&self, node: Node, loc: SourceLocation) -> AstNode {
        AstNode::new(node, loc)
    }

    // ── Grammar ───────────────────────────────────────────────────────────────

    fn parse_expr(&mut self) -> Result<AstNode, String> {
        self.nested(Self::parse_lambda)
    }

    fn parse_lambda(&mut self) -> Result<AstNode, String> {
        if let Some(params) = self.lambda_params() {
            let loc = self.loc();
            let body = self.parse_expr()?;
            return Ok(self.node(
                Node::Lambda {
                    params,
                    body: body.boxed(),
                },
                loc,
            ));
        }
        self.parse_assign()
    }

    /// Consume `x =>` or `(a, b) =>` and return the parameter names.
    fn lambda_params(&mut self) -> Option<Vec<String>> {
        if let (Token::Ident(name), Token::Arrow) = (self.peek(), self.peek_at(1)) {
            let params = vec![name.clone()];
            self.pos += 2;
            return Some(params);
        }
        if self.peek() != &Token::LParen {
            return None;
        }
        let mut params = Vec::new();
        let mut i = 1;
        loop {
            match self.peek_at(i) {
                Token::RParen => break,
                Token::Ident(name) => {
                    params.push(name.clone());
                    i += 1;
                    match self.peek_at(i) {
                        Token::Comma => i += 1,
                        Token::RParen => break,
                        _ => return None,
                    }
                }
                _ => return None,
            }
        }
        if self.peek_at(i + 1) != &Token::Arrow {
            return None;
        }
        self.pos += i + 2;
        Some(params)
    }

    fn parse_assign(&mut self) -> Result<AstNode, String> {
        let loc = self.loc();
        // `set name = value` inside an expression.
        let skip = usize::from(matches!(self.peek(), Token::Ident(w) if w == "set")
            && matches!(self.peek_at(1), Token::Ident(_)));
        if let Token::Ident(name) = self.peek_at(skip).clone() {
            let op = match self.peek_at(skip + 1) {
                Token::Assign if !self.cond_mode || skip == 1 => Some(AssignOp::Set),
                Token::PlusAssign => Some(AssignOp::Add),
                Token::MinusAssign => Some(AssignOp::Sub),
                Token::StarAssign => Some(AssignOp::Mul),
                Token::SlashAssign => Some(AssignOp::Div),
                Token::PercentAssign => Some(AssignOp::Rem),
                _ => None,
            };
            if let Some(op) = op {
                self.pos += skip + 2;
                let saved = std::mem::replace(&mut self.cond_mode, false);
                let value = self.parse_expr();
                self.cond_mode = saved;
                return Ok(self.node(
                    Node::Assignment {
                        name,
                        op,
                        value: value?.boxed(),
                    },
                    loc,
                ));
            }
        }
        self.parse_ternary()
    }

    fn parse_ternary(&mut self) -> Result<AstNode, String> {
        let loc = self.loc();
        let cond = self.parse_or()?;
        if !self.eat(&Token::Question) {
            return Ok(cond);
        }
        let then_expr = self.nested(Self::parse_assign)?;
        self.expect(&Token::Colon, "':' in ternary")?;
        let else_expr = self.nested(Self::parse_assign)?;
        Ok(self.node(
            Node::Ternary {
                condition: cond.boxed(),
                then_expr: then_expr.boxed(),
                else_expr: else_expr.boxed(),
            },
            loc,
        ))
    }

    fn binary(&self, op: BinOp, left: AstNode, right: AstNode) -> AstNode {
        let loc = left.location.clone();
        self.node(
            Node::BinaryOp {
                op,
                left: left.boxed(),
                right: right.boxed(),
            },
            loc,
        )
    }

    fn parse_or(&mut self) -> Result<AstNode, String> {
        let mut lhs = self.parse_and()?;
        while self.eat(&Token::Or) || self.eat_word("or") {
            let rhs = self.parse_and()?;
            lhs = self.binary(BinOp::Or, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<AstNode, String> {
        let mut lhs = self.parse_equality()?;
        while self.eat(&Token::And) || self.eat_word("and") {
            let rhs = self.parse_equality()?;
            lhs = self.binary(BinOp::And, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> Result<AstNode, String> {
        let mut lhs = self.parse_relational()?;
        loop {
            let op = match self.peek() {
                Token::Eq => BinOp::Eq,
                Token::Assign if self.cond_mode => BinOp::Eq,
                Token::Ne => BinOp::Ne,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.parse_relational()?;
            lhs = self.binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_relational(&mut self) -> Result<AstNode, String> {
        let mut lhs = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                Token::Lt => BinOp::Lt,
                Token::Le => BinOp::Le,
                Token::Gt => BinOp::Gt,
                Token::Ge => BinOp::Ge,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.parse_additive()?;
            lhs = self.binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> Result<AstNode, String> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Token::Plus => BinOp::Add,
                Token::Minus => BinOp::Sub,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.parse_multiplicative()?;
            lhs = self.binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> Result<AstNode, String> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Token::Star => BinOp::Mul,
                Token::Slash => BinOp::Div,
                Token::Percent => BinOp::Rem,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.parse_unary()?;
            lhs = self.binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<AstNode, String> {
        let loc = self.loc();
        let op = match self.peek() {
            Token::Minus => UnaryOp::Neg,
            Token::Bang => UnaryOp::Not,
            Token::Ident(w) if w == "not" => UnaryOp::Not,
            Token::Ident(w) if w == "await" => {
                self.pos += 1;
                let inner = self.nested(Self::parse_unary)?;
                return Ok(self.node(Node::Await(inner.boxed()), loc));
            }
            Token::Ellipsis => {
                self.pos += 1;
                let inner = self.nested(Self::parse_unary)?;
                return Ok(self.node(Node::Spread(inner.boxed()), loc));
            }
            _ => return self.parse_postfix(),
        };
        self.pos += 1;
        let operand = self.nested(Self::parse_unary)?;
        Ok(self.node(
            Node::UnaryOp {
                op,
                operand: operand.boxed(),
            },
            loc,
        ))
    }

    fn parse_args(&mut self) -> Result<Vec<AstNode>, String> {
        let mut args = Vec::new();
        if self.eat(&Token::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.parse_expr()?);
            if self.eat(&Token::RParen) {
                return Ok(args);
            }
            self.expect(&Token::Comma, "',' or ')' in argument list")?;
        }
    }

    fn parse_postfix(&mut self) -> Result<AstNode, String> {
        let mut expr = self.parse_primary()?;
        loop {
            let loc = self.loc();
            match self.peek() {
                Token::Dot => {
                    self.pos += 1;
                    let member = match self.advance() {
                        Token::Ident(m) => m,
                        other => return Err(format!("expected name after '.', found {}", describe(&other))),
                    };
                    let args = if self.eat(&Token::LParen) {
                        Some(self.parse_args()?)
                    } else {
                        None
                    };
                    expr = member_node(expr, member, args, loc)?;
                }
                Token::LBracket => {
                    self.pos += 1;
                    let index = self.parse_expr()?;
                    self.expect(&Token::RBracket, "']'")?;
                    expr = self.node(
                        Node::ArrayAccess {
                            array: expr.boxed(),
                            index: index.boxed(),
                        },
                        loc,
                    );
                }
                Token::LParen => {
                    let name = match &expr.node {
                        Node::Identifier(name) => name.clone(),
                        _ => break,
                    };
                    self.pos += 1;
                    let args = self.parse_args()?;
                    expr = self.node(Node::FunctionCall { name, args }, expr.location.clone());
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<AstNode, String> {
        let loc = self.loc();
        let tok = self.advance();
        let node = match tok {
            Token::Number(n) => Node::Literal(Literal::Number(n)),
            Token::Str(s) => Node::Literal(Literal::String(s)),
            Token::VarRef(name) => Node::VariableRef(name),
            Token::Ident(name) => match name.as_str() {
                "true" => Node::Literal(Literal::Boolean(true)),
                "false" => Node::Literal(Literal::Boolean(false)),
                "null" => Node::Literal(Literal::Null),
                _ => Node::Identifier(name),
            },
            Token::LParen => {
                let inner = self.parse_expr()?;
                self.expect(&Token::RParen, "')'")?;
                return Ok(inner);
            }
            Token::LBracket => {
                let mut items = Vec::new();
                while !self.eat(&Token::RBracket) {
                    items.push(self.parse_expr()?);
                    if !self.eat(&Token::Comma) {
                        self.expect(&Token::RBracket, "']' after array elements")?;
                        break;
                    }
                }
                Node::ArrayLiteral(items)
            }
            Token::LBrace => {
                let mut pairs = Vec::new();
                while !self.eat(&Token::RBrace) {
                    let key = match self.advance() {
                        Token::Ident(k) | Token::Str(k) => k,
                        Token::Number(n) => crate::variable::format_number(n),
                        other => return Err(format!("expected object key, found {}", describe(&other))),
                    };
                    self.expect(&Token::Colon, "':' after object key")?;
                    pairs.push((key, self.parse_expr()?));
                    if !self.eat(&Token::Comma) {
                        self.expect(&Token::RBrace, "'}' after object entries")?;
                        break;
                    }
                }
                Node::ObjectLiteral(pairs)
            }
            other => return Err(format!("unexpected {}", describe(&other))),
        };
        Ok(self.node(node, loc))
    }
}

/// Build the node for `receiver.member` / `receiver.member(args)`.
fn member_node(
    receiver: AstNode,
    member: String,
    args: Option<Vec<AstNode>>,
    loc: SourceLocation,
) -> Result<AstNode, String> {
    let namespace = match &receiver.node {
        Node::Identifier(ns) => Some(ns.as_str()),
        _ => None,
    };

    if namespace == Some("File") {
        let mut args = args.unwrap_or_default();
        let arity = |n: usize, args: &Vec<AstNode>| {
            if args.len() == n {
                Ok(())
            } else {
                Err(format!("File.{member} expects {n} argument(s), got {}", args.len()))
            }
        };
        let node = match member.as_str() {
            "read" => {
                arity(1, &args)?;
                Node::FileRead(args.remove(0).boxed())
            }
            "exists" => {
                arity(1, &args)?;
                Node::FileExists(args.remove(0).boxed())
            }
            "delete" => {
                arity(1, &args)?;
                Node::FileDelete(args.remove(0).boxed())
            }
            "list" => {
                if args.is_empty() {
                    args.push(AstNode::string(".", loc.clone()));
                }
                arity(1, &args)?;
                Node::FileList(args.remove(0).boxed())
            }
            "write" => {
                arity(2, &args)?;
                let content = args.remove(1);
                let path = args.remove(0);
                Node::FileWrite {
                    path: path.boxed(),
                    content: content.boxed(),
                }
            }
            _ => Node::FunctionCall {
                name: format!("File.{member}"),
                args,
            },
        };
        return Ok(AstNode::new(node, loc));
    }

    if let Some(ns) = namespace.filter(|ns| NAMESPACES.contains(ns)) {
        let name = format!("{ns}.{member}");
        return Ok(AstNode::new(
            Node::FunctionCall {
                name,
                args: args.unwrap_or_default(),
            },
            loc,
        ));
    }

    let node = match args {
        Some(args) => Node::StringMethod {
            receiver: receiver.boxed(),
            method: member,
            args,
        },
        None => Node::ObjectAccess {
            object: receiver.boxed(),
            property: member,
        },
    };
    Ok(AstNode::new(node, loc))
}

fn describe(tok: &Token) -> String {
    match tok {
        Token::Eof => "end of input".into(),
        Token::Ident(s) => format!("'{s}'"),
        Token::Number(n) => format!("number {n}"),
        Token::Str(_) => "string".into(),
        Token::Unknown(c) => format!("'{c}'"),
        other => format!("{other:?}"),
    }
}

fn parse_with(src: &str, origin: &SourceLocation, cond_mode: bool) -> Result<AstNode, String> {
    let tokens = Lexer::new(src).tokenize()?;
    let mut parser = Parser::new(tokens, origin, cond_mode);
    let expr = parser.parse_expr()?;
    if parser.peek() != &Token::Eof {
        return Err(format!("unexpected {} after expression", describe(parser.peek())));
    }
    Ok(expr)
}

/// Parse a complete expression.  Trailing input is an error.
pub fn parse_expression(src: &str, origin: &SourceLocation) -> Result<AstNode, String> {
    parse_with(src, origin, false)
}

/// Parse an `if`/`while` condition, where `=` also means equality.
pub fn parse_condition(src: &str, origin: &SourceLocation) -> Result<AstNode, String> {
    parse_with(src, origin, true)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> AstNode {
        parse_expression(src, &SourceLocation::new(1, 1)).expect("parse failed")
    }

    fn parse_err(src: &str) -> String {
        parse_expression(src, &SourceLocation::new(1, 1)).unwrap_err()
    }

    #[test]
    fn tokens() {
        assert_eq!(
            tokenize("a += 1..3").unwrap(),
            vec![
                Token::Ident("a".into()),
                Token::PlusAssign,
                Token::Number(1.0),
                Token::DotDot,
                Token::Number(3.0),
                Token::Eof
            ]
        );
        assert_eq!(
            tokenize("${x} {{ user.name }}").unwrap(),
            vec![
                Token::VarRef("x".into()),
                Token::VarRef("user.name".into()),
                Token::Eof
            ]
        );
    }

    #[test]
    fn unicode_string_survives() {
        let n = parse("\"héllo ✓\"");
        assert_eq!(n.node, Node::Literal(Literal::String("héllo ✓".into())));
    }

    #[test]
    fn precedence() {
        let n = parse("2 + 3 * 4");
        let Node::BinaryOp { op, right, .. } = &n.node else {
            panic!("expected binary op");
        };
        assert_eq!(*op, BinOp::Add);
        assert!(matches!(right.node, Node::BinaryOp { op: BinOp::Mul, .. }));
    }

    #[test]
    fn word_operators() {
        let n = parse("a and not b or c");
        assert!(matches!(n.node, Node::BinaryOp { op: BinOp::Or, .. }));
    }

    #[test]
    fn ternary_with_assignment_branches() {
        let n = parse("x ? (set y = \"z\") : 0");
        let Node::Ternary { then_expr, .. } = &n.node else {
            panic!("expected ternary");
        };
        assert!(matches!(&then_expr.node, Node::Assignment { name, .. } if name == "y"));
    }

    #[test]
    fn compound_assignment() {
        let n = parse("count += 1");
        assert!(matches!(n.node, Node::Assignment { op: AssignOp::Add, .. }));
    }

    #[test]
    fn condition_mode_reads_single_equals() {
        let n = parse_condition("x = 5", &SourceLocation::new(1, 1)).unwrap();
        assert!(matches!(n.node, Node::BinaryOp { op: BinOp::Eq, .. }));
    }

    #[test]
    fn calls_and_members() {
        assert!(matches!(
            parse("greet(\"Bob\", 2)").node,
            Node::FunctionCall { ref name, ref args } if name == "greet" && args.len() == 2
        ));
        assert!(matches!(
            parse("name.upper()").node,
            Node::StringMethod { ref method, .. } if method == "upper"
        ));
        assert!(matches!(
            parse("user.name").node,
            Node::ObjectAccess { ref property, .. } if property == "name"
        ));
        assert!(matches!(
            parse("Date.now()").node,
            Node::FunctionCall { ref name, .. } if name == "Date.now"
        ));
        assert!(matches!(parse("items[0]").node, Node::ArrayAccess { .. }));
    }

    #[test]
    fn file_operations() {
        assert!(matches!(parse("File.read(\"a.txt\")").node, Node::FileRead(_)));
        assert!(matches!(parse("File.write(\"a\", \"b\")").node, Node::FileWrite { .. }));
        assert!(matches!(parse("File.list()").node, Node::FileList(_)));
        assert!(parse_err("File.write(\"a\")").contains("expects 2"));
    }

    #[test]
    fn literals() {
        assert!(matches!(parse("[1, 2, ...rest]").node, Node::ArrayLiteral(ref v) if v.len() == 3));
        assert!(matches!(
            parse("{name: \"Alice\", \"age\": 30}").node,
            Node::ObjectLiteral(ref p) if p.len() == 2 && p[1].0 == "age"
        ));
        assert!(matches!(parse("null").node, Node::Literal(Literal::Null)));
    }

    #[test]
    fn lambdas() {
        assert!(matches!(parse("x => x * 2").node, Node::Lambda { ref params, .. } if params.len() == 1));
        assert!(matches!(parse("(a, b) => a + b").node, Node::Lambda { ref params, .. } if params.len() == 2));
        assert!(matches!(parse("(a)").node, Node::Identifier(_)));
    }

    #[test]
    fn trailing_input_is_error() {
        assert!(parse_err("Hello world").contains("after expression"));
        assert!(parse_err("\"open").contains("unterminated"));
        assert!(parse_err("(1 + 2").contains("')'"));
    }

    #[test]
    fn deep_nesting_is_error() {
        let shallow = format!("{}1{}", "(".repeat(40), ")".repeat(40));
        assert_eq!(parse(&shallow).node, Node::Literal(Literal::Number(1.0)));

        let deep = format!("{}1{}", "(".repeat(3000), ")".repeat(3000));
        assert!(parse_err(&deep).contains("nested too deeply"));
        assert!(parse_err(&format!("{}[1]", "[".repeat(500))).contains("nested too deeply"));
        assert!(parse_err(&format!("{}x", "-".repeat(500))).contains("nested too deeply"));
        assert!(parse_err(&"a ? ".repeat(500)).contains("nested too deeply"));
    }

    #[test]
    fn columns_are_offset_from_origin() {
        let n = parse_expression("a + b", &SourceLocation::new(3, 5)).unwrap();
        let Node::BinaryOp { right, .. } = &n.node else {
            panic!("expected binary op");
        };
        assert_eq!(right.location.line, 3);
        assert_eq!(right.location.column, 9);
    }
}
