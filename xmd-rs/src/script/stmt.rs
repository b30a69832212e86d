//! XMD statement parser.
//!
//! A script is a sequence of logical lines.  Blank lines and `//` comments
//! are dropped; a line ending in `{` is joined with the following lines until
//! its braces balance.  A statement's body is written one of three ways:
//!
//! ```text
//! if x > 1 then print "big" else print "small"     inline
//! if x > 1 { print "big" } else { print "small" }  braces
//! if x > 1                                         indentation
//!     print "big"
//! else
//!     print "small"
//! ```
//!
//! Lines that are not statements and do not parse as an expression become
//! literal text.  Syntax errors never abort the parse: each is recorded as a
//! [`ParseError`] and the offending line, plus any block indented beneath it,
//! is skipped.

use std::sync::OnceLock;

use regex::Regex;

use super::ast::{AssignOp, AstNode, DestructurePattern, Node, SourceLocation};
use super::expr::{is_ident, parse_condition, parse_expression};
use crate::error::ParseError;

/// Words that start a statement and so can never be a `catch` variable.
const KEYWORDS: &[&str] = &[
    "if", "elif", "else", "while", "for", "loop", "break", "continue", "set", "function", "class",
    "return", "print", "try", "catch", "throw", "import", "destructure", "yield", "await",
];

// ── Lines ─────────────────────────────────────────────────────────────────────

/// One logical source line.
#[derive(Debug, Clone)]
struct Line {
    /// Trimmed text; may span several physical lines when braces were joined.
    text: String,
    indent: usize,
    line: usize,
    column: usize,
}

/// Leading whitespace width; a tab counts as four columns.
fn indent_width(raw: &str) -> usize {
    raw.chars()
        .take_while(|c| c.is_whitespace())
        .map(|c| if c == '\t' { 4 } else { 1 })
        .sum()
}

/// Split `src` into logical lines.  `first_line`/`first_column` place the
/// first character of `src` in the enclosing document.
fn split_lines(src: &str, first_line: usize, first_column: usize, split_semicolons: bool) -> Vec<Line> {
    let raw: Vec<&str> = src.lines().collect();
    let mut lines = Vec::new();
    let mut i = 0;
    while i < raw.len() {
        let physical = raw[i];
        let trimmed = physical.trim();
        let line_no = first_line + i;
        if trimmed.is_empty() || trimmed.starts_with("//") {
            i += 1;
            continue;
        }
        let indent = indent_width(physical);
        let column = if i == 0 { first_column + indent } else { indent + 1 };

        let mut text = trimmed.to_owned();
        if trimmed.ends_with('{') {
            let mut depth = brace_depth(trimmed);
            while depth > 0 && i + 1 < raw.len() {
                i += 1;
                text.push('\n');
                text.push_str(raw[i].trim_end());
                depth += brace_depth(raw[i]);
            }
        }

        if split_semicolons {
            for part in split_top_level(&text, ';') {
                let part = part.trim();
                if !part.is_empty() {
                    lines.push(Line {
                        text: part.to_owned(),
                        indent,
                        line: line_no,
                        column,
                    });
                }
            }
        } else {
            lines.push(Line {
                text,
                indent,
                line: line_no,
                column,
            });
        }
        i += 1;
    }
    lines
}

// ── Scanning helpers ──────────────────────────────────────────────────────────

/// Byte offsets and characters that sit outside quotes and at bracket depth
/// zero.  An opening bracket at depth zero is included; its contents are not.
fn top_level(s: &str) -> Vec<(usize, char)> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '(' | '[' | '{' => {
                if depth == 0 {
                    out.push((i, c));
                }
                depth += 1;
            }
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            _ if depth == 0 => out.push((i, c)),
            _ => {}
        }
    }
    out
}

/// Net `{`/`}` count outside quotes.
fn brace_depth(s: &str) -> i64 {
    let mut depth = 0i64;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for c in s.chars() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '{' => depth += 1,
            '}' => depth -= 1,
            _ => {}
        }
    }
    depth
}

/// Split on a separator character at the top level.
fn split_top_level(s: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    for (i, c) in top_level(s) {
        if c == sep {
            parts.push(&s[start..i]);
            start = i + c.len_utf8();
        }
    }
    parts.push(&s[start..]);
    parts
}

/// Split around the first top-level occurrence of `word` as a whole word.
fn split_word_at<'a>(s: &'a str, word: &str) -> Option<(&'a str, &'a str)> {
    for (i, _) in top_level(s) {
        if !s[i..].starts_with(word) {
            continue;
        }
        let before_ok = s[..i].ends_with(char::is_whitespace);
        let after = &s[i + word.len()..];
        let after_ok = after.is_empty() || after.starts_with(char::is_whitespace) || after.starts_with('{');
        if before_ok && after_ok {
            return Some((s[..i].trim_end(), after.trim_start()));
        }
    }
    None
}

/// `(header, inner, after)` for the first top-level `{ ... }` block in `s`.
/// `{{name}}` and `${name}` placeholders are not blocks.
fn split_brace_body(s: &str) -> Option<(&str, &str, &str)> {
    let open = top_level(s).into_iter().find_map(|(i, c)| {
        let is_block = c == '{' && !s[i + 1..].starts_with('{') && !s[..i].ends_with('$');
        is_block.then_some(i)
    })?;
    let close = matching_close(s, open)?;
    Some((s[..open].trim(), &s[open + 1..close], &s[close + 1..]))
}

/// Offset of the `}` matching the `{` at `open`.
fn matching_close(s: &str, open: usize) -> Option<usize> {
    let mut depth = 0i64;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, c) in s[open..].char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Leading identifier (the statement keyword) and the trimmed rest.
fn split_keyword(s: &str) -> (&str, &str) {
    let end = s
        .char_indices()
        .find(|(_, c)| !(c.is_alphanumeric() || *c == '_'))
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    (&s[..end], s[end..].trim_start())
}

/// First whitespace-delimited word and the trimmed rest.
fn split_first_word(s: &str) -> (&str, &str) {
    let s = s.trim_start();
    match s.find(char::is_whitespace) {
        Some(i) => (&s[..i], s[i..].trim_start()),
        None => (s, ""),
    }
}

/// Split on top-level whitespace, keeping quoted strings and brackets whole.
fn split_ws_args(s: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start: Option<usize> = None;
    let top: Vec<usize> = top_level(s)
        .into_iter()
        .filter(|(_, c)| c.is_whitespace())
        .map(|(i, _)| i)
        .collect();
    for (i, _) in s.char_indices() {
        let is_sep = top.binary_search(&i).is_ok();
        match (is_sep, start) {
            (true, Some(st)) => {
                parts.push(&s[st..i]);
                start = None;
            }
            (false, None) => start = Some(i),
            _ => {}
        }
    }
    if let Some(st) = start {
        parts.push(&s[st..]);
    }
    parts
}

fn unquote(s: &str) -> &str {
    let s = s.trim();
    for q in ['"', '\''] {
        if s.len() >= 2 && s.starts_with(q) && s.ends_with(q) {
            return &s[1..s.len() - 1];
        }
    }
    s
}

fn static_regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("static regex"))
}

fn for_indexed_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    static_regex(&RE, r"(?s)^([A-Za-z_]\w*)\s*,\s*([A-Za-z_]\w*)\s+in\s+(.+)$")
}

fn for_in_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    static_regex(&RE, r"(?s)^\(?\s*([A-Za-z_]\w*)\s+in\s+(.+?)\)?$")
}

fn loop_times_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    static_regex(&RE, r"(?s)^(.+?)\s+times\b\s*(.*)$")
}

fn set_assign_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    static_regex(&RE, r"(?s)^([A-Za-z_]\w*)\s*(\+=|-=|\*=|/=|%=|=)(.*)$")
}

fn assign_op(op: &str) -> AssignOp {
    match op {
        "+=" => AssignOp::Add,
        "-=" => AssignOp::Sub,
        "*=" => AssignOp::Mul,
        "/=" => AssignOp::Div,
        "%=" => AssignOp::Rem,
        _ => AssignOp::Set,
    }
}

// ── Parser ────────────────────────────────────────────────────────────────────

/// Statement parser over pre-split logical lines.
pub struct Parser {
    lines: Vec<Line>,
    pos: usize,
    filename: Option<String>,
    errors: Vec<ParseError>,
}

impl Parser {
    pub fn new(src: &str) -> Self {
        Parser::at(src, 1, 1)
    }

    /// Parser for source that starts at `line`/`column` of a larger document.
    pub fn at(src: &str, line: usize, column: usize) -> Self {
        Parser {
            lines: split_lines(src, line, column, false),
            pos: 0,
            filename: None,
            errors: Vec::new(),
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// Parse everything into a `Program` node.  Never fails; see
    /// [`Parser::errors`].
    pub fn parse_program(&mut self) -> AstNode {
        let loc = SourceLocation {
            line: self.lines.first().map(|l| l.line).unwrap_or(1),
            column: 1,
            filename: self.filename.clone(),
        };
        let stmts = self.parse_block(None);
        AstNode::new(Node::Program(stmts), loc)
    }

    pub fn has_error(&self) -> bool {
        !self.errors.is_empty()
    }

    /// The first recorded error, formatted with its position.
    pub fn error_message(&self) -> Option<String> {
        self.errors.first().map(ParseError::to_string)
    }

    pub fn errors(&self) -> &[ParseError] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<ParseError> {
        self.errors
    }

    // ── Plumbing ──────────────────────────────────────────────────────────────

    fn loc(&self, line: &Line) -> SourceLocation {
        SourceLocation {
            line: line.line,
            column: line.column,
            filename: self.filename.clone(),
        }
    }

    fn error(&mut self, line: &Line, message: impl Into<String>) {
        let err = ParseError::new(line.line, line.column, message);
        log::debug!("parse error: {err}");
        self.errors.push(err);
    }

    fn peek_line(&self) -> Option<&Line> {
        self.lines.get(self.pos)
    }

    /// Skip lines indented deeper than `indent`.
    fn skip_block(&mut self, indent: usize) {
        while self.peek_line().is_some_and(|l| l.indent > indent) {
            self.pos += 1;
        }
    }

    /// Parse statements while they are indented deeper than `parent`.
    fn parse_block(&mut self, parent: Option<usize>) -> Vec<AstNode> {
        let mut stmts = Vec::new();
        while let Some(line) = self.peek_line() {
            if parent.is_some_and(|p| line.indent <= p) {
                break;
            }
            let line = line.clone();
            self.pos += 1;
            match self.parse_statement(&line) {
                Ok(nodes) => stmts.extend(nodes),
                Err(msg) => {
                    self.error(&line, msg);
                    self.skip_block(line.indent);
                }
            }
        }
        stmts
    }

    /// Parse `inner` (the inside of a `{ ... }` body) with its own parser.
    fn sub_parse(&mut self, line: &Line, inner: &str) -> AstNode {
        let mut sub = Parser {
            lines: split_lines(inner, line.line, line.column, true),
            pos: 0,
            filename: self.filename.clone(),
            errors: Vec::new(),
        };
        let stmts = sub.parse_block(None);
        self.errors.append(&mut sub.errors);
        AstNode::block(stmts, self.loc(line))
    }

    /// A single statement written on the same line as its header.
    fn inline_block(&mut self, line: &Line, text: &str) -> Result<AstNode, String> {
        let inner = Line {
            text: text.trim().to_owned(),
            ..line.clone()
        };
        let nodes = self.parse_statement(&inner)?;
        Ok(AstNode::block(nodes, self.loc(line)))
    }

    /// Body following a header: `{ ... }`, an inline statement, or the
    /// indented lines below `line`.
    fn parse_body(&mut self, line: &Line, rest: &str) -> Result<AstNode, String> {
        let rest = rest.trim();
        if rest.is_empty() {
            let stmts = self.parse_block(Some(line.indent));
            return Ok(AstNode::block(stmts, self.loc(line)));
        }
        if rest.starts_with('{') {
            let (_, inner, after) =
                split_brace_body(rest).ok_or_else(|| "unterminated '{' block".to_owned())?;
            if !after.trim().is_empty() {
                return Err(format!("unexpected '{}' after block", after.trim()));
            }
            return Ok(self.sub_parse(line, inner));
        }
        self.inline_block(line, rest)
    }

    // ── Statements ────────────────────────────────────────────────────────────

    fn parse_statement(&mut self, line: &Line) -> Result<Vec<AstNode>, String> {
        let text = line.text.as_str();
        let (word, rest) = split_keyword(text);
        let loc = self.loc(line);
        let one = |node: Node| Ok(vec![AstNode::new(node, loc.clone())]);

        match word {
            "if" => Ok(vec![self.parse_if(line, rest)?]),
            "elif" | "else" | "catch" => Err(format!("'{word}' without a matching statement")),
            "while" => Ok(vec![self.parse_while(line, rest)?]),
            "for" => Ok(vec![self.parse_for(line, rest)?]),
            "loop" if loop_times_re().is_match(rest) => Ok(vec![self.parse_loop_times(line, rest)?]),
            "break" if rest.is_empty() => one(Node::Break),
            "continue" if rest.is_empty() => one(Node::Continue),
            "set" if !rest.is_empty() => self.parse_set(line, rest),
            "function" => Ok(vec![self.parse_function(line, rest)?]),
            "class" if !rest.is_empty() => Ok(vec![self.parse_class(line, rest)?]),
            "return" => {
                let value = if rest.is_empty() {
                    None
                } else {
                    Some(parse_expression(rest, &loc)?.boxed())
                };
                one(Node::Return(value))
            }
            "print" if !rest.starts_with('(') => {
                let arg = self.print_arg(rest, &loc);
                one(Node::FunctionCall {
                    name: "print".into(),
                    args: vec![arg],
                })
            }
            "try" => Ok(vec![self.parse_try(line, rest)?]),
            "throw" => {
                let value = self.print_arg(rest, &loc);
                one(Node::Throw(value.boxed()))
            }
            "import" if !rest.is_empty() => one(Node::Import(unquote(rest).to_owned())),
            "destructure" => one(parse_destructure(rest, &loc)?),
            "yield" => {
                let value = if rest.is_empty() {
                    None
                } else {
                    Some(parse_expression(rest, &loc)?.boxed())
                };
                one(Node::Yield(value))
            }
            _ => self.parse_simple(line).map(|n| vec![n]),
        }
    }

    /// Argument of `print`/`throw`: an expression, or the raw text as an
    /// interpolated string when it is not one.
    fn print_arg(&self, rest: &str, loc: &SourceLocation) -> AstNode {
        if rest.is_empty() {
            return AstNode::string("", loc.clone());
        }
        parse_expression(rest, loc).unwrap_or_else(|_| AstNode::string(rest, loc.clone()))
    }

    /// Expression statement or literal text.
    fn parse_simple(&mut self, line: &Line) -> Result<AstNode, String> {
        let text = line.text.as_str();
        let loc = self.loc(line);
        let text_node = || AstNode::new(Node::Text(format!("{text}\n")), loc.clone());

        let Some(first) = text.chars().next() else {
            return Ok(text_node());
        };
        if text.starts_with("${") || text.starts_with("{{") || matches!(first, '-' | '*' | '#' | '>') {
            return Ok(text_node());
        }

        // `File.write "out.txt" content` → `File.write("out.txt", content)`
        if text.starts_with("File.") {
            let (callee, args) = split_first_word(text);
            if !args.is_empty() && !callee.contains('(') {
                let call = format!("{callee}({})", split_ws_args(args).join(", "));
                return parse_expression(&call, &loc);
            }
        }

        let starts_expr = first.is_alphabetic()
            || first == '_'
            || first.is_ascii_digit()
            || matches!(first, '"' | '\'' | '`' | '(' | '[' | '!' | '$');
        if !starts_expr {
            return Ok(text_node());
        }
        match parse_expression(text, &loc) {
            Ok(node) => Ok(node),
            Err(msg) => {
                let strict = matches!(first, '"' | '\'' | '`' | '(' | '[')
                    || set_assign_re()
                        .captures(text)
                        .is_some_and(|c| !c[3].starts_with('='))
                    || split_keyword(text).1.starts_with('(');
                if strict {
                    Err(msg)
                } else {
                    Ok(text_node())
                }
            }
        }
    }

    // ── Conditionals ──────────────────────────────────────────────────────────

    fn parse_if(&mut self, line: &Line, rest: &str) -> Result<AstNode, String> {
        let loc = self.loc(line);
        let rest = rest.trim();

        if let Some((cond_src, after_then)) = split_word_at(rest, "then") {
            if split_brace_body(cond_src).is_none() {
                let (then_src, else_src) = match split_word_at(after_then, "else") {
                    Some((t, e)) => (t, Some(e)),
                    None => (after_then, None),
                };
                let condition = parse_condition(cond_src, &loc)?;
                let then_block = self.inline_block(line, then_src)?;
                let else_block = match else_src {
                    Some(e) => Some(self.parse_else_clause(line, &format!("else {e}"))?.boxed()),
                    None => None,
                };
                return Ok(AstNode::new(
                    Node::Conditional {
                        condition: condition.boxed(),
                        then_block: then_block.boxed(),
                        else_block,
                    },
                    loc,
                ));
            }
        }

        let (cond_src, then_block, tail) = match split_brace_body(rest) {
            Some((cond, inner, after)) => {
                let block = self.sub_parse(line, inner);
                (cond.to_owned(), block, after.trim().to_owned())
            }
            None => {
                let stmts = self.parse_block(Some(line.indent));
                let cond = rest.trim_end_matches(':').trim_end().to_owned();
                (cond, AstNode::block(stmts, loc.clone()), String::new())
            }
        };
        if cond_src.is_empty() {
            return Err("missing condition after 'if'".into());
        }
        let condition = parse_condition(&cond_src, &loc)?;

        let else_block = if tail.is_empty() {
            self.next_else(line)?
        } else {
            let (kw, _) = split_keyword(&tail);
            if kw != "else" && kw != "elif" {
                return Err(format!("unexpected '{tail}' after if block"));
            }
            Some(self.parse_else_clause(line, &tail)?)
        };

        Ok(AstNode::new(
            Node::Conditional {
                condition: condition.boxed(),
                then_block: then_block.boxed(),
                else_block: else_block.map(AstNode::boxed),
            },
            loc,
        ))
    }

    /// An `elif`/`else` line at the same indentation as `line`, if any.
    fn next_else(&mut self, line: &Line) -> Result<Option<AstNode>, String> {
        let Some(next) = self.peek_line() else {
            return Ok(None);
        };
        let (kw, _) = split_keyword(&next.text);
        if next.indent != line.indent || (kw != "else" && kw != "elif") {
            return Ok(None);
        }
        let next = next.clone();
        self.pos += 1;
        self.parse_else_clause(&next, &next.text).map(Some)
    }

    /// `elif cond ...`, `else if cond ...`, or `else <body>`.
    fn parse_else_clause(&mut self, line: &Line, clause: &str) -> Result<AstNode, String> {
        let (kw, rest) = split_keyword(clause);
        if kw == "elif" {
            return self.parse_if(line, rest);
        }
        let (kw2, rest2) = split_keyword(rest);
        if kw2 == "if" {
            return self.parse_if(line, rest2);
        }
        self.parse_body(line, rest)
    }

    // ── Loops ─────────────────────────────────────────────────────────────────

    fn parse_while(&mut self, line: &Line, rest: &str) -> Result<AstNode, String> {
        let loc = self.loc(line);
        let (cond_src, body) = match split_brace_body(rest) {
            Some((cond, inner, after)) if after.trim().is_empty() => {
                (cond.to_owned(), self.sub_parse(line, inner))
            }
            _ => {
                let cond = rest.trim().trim_end_matches(':').to_owned();
                (cond, self.parse_body(line, "")?)
            }
        };
        if cond_src.is_empty() {
            return Err("missing condition after 'while'".into());
        }
        let condition = parse_condition(&cond_src, &loc)?;
        Ok(AstNode::new(
            Node::WhileLoop {
                condition: condition.boxed(),
                body: body.boxed(),
            },
            loc,
        ))
    }

    fn parse_for(&mut self, line: &Line, rest: &str) -> Result<AstNode, String> {
        let loc = self.loc(line);
        let (header, braced) = match split_brace_body(rest) {
            Some((header, inner, after)) if after.trim().is_empty() => {
                (header.to_owned(), Some(self.sub_parse(line, inner)))
            }
            _ => (rest.trim().to_owned(), None),
        };

        if let Some(caps) = for_indexed_re().captures(&header) {
            let iterable = parse_expression(&caps[3], &loc)?;
            let body = match braced {
                Some(b) => b,
                None => self.parse_body(line, "")?,
            };
            return Ok(AstNode::new(
                Node::ForIndexed {
                    index_var: caps[1].to_owned(),
                    item_var: caps[2].to_owned(),
                    iterable: iterable.boxed(),
                    body: body.boxed(),
                },
                loc,
            ));
        }

        let caps = for_in_re()
            .captures(&header)
            .ok_or_else(|| format!("expected 'for <name> in <expr>', got 'for {header}'"))?;
        let variable = caps[1].to_owned();
        let source = caps[2].trim();

        // `a..b`, optionally followed by an inline body.
        let range_split = top_level(source)
            .into_iter()
            .find(|(i, c)| *c == '.' && source[*i..].starts_with(".."));
        if let Some((dots, _)) = range_split {
            let start = parse_expression(source[..dots].trim(), &loc)?;
            let (end_src, inline) = split_first_word(&source[dots + 2..]);
            let end = parse_expression(end_src, &loc)?;
            let body = match braced {
                Some(b) => b,
                None => self.parse_body(line, inline)?,
            };
            return Ok(AstNode::new(
                Node::ForRange {
                    variable,
                    start: start.boxed(),
                    end: end.boxed(),
                    body: body.boxed(),
                },
                loc,
            ));
        }

        let iterable = parse_expression(source, &loc)?;
        let body = match braced {
            Some(b) => b,
            None => self.parse_body(line, "")?,
        };
        Ok(AstNode::new(
            Node::Loop {
                variable,
                iterable: iterable.boxed(),
                body: body.boxed(),
            },
            loc,
        ))
    }

    fn parse_loop_times(&mut self, line: &Line, rest: &str) -> Result<AstNode, String> {
        let loc = self.loc(line);
        let caps = loop_times_re()
            .captures(rest)
            .ok_or_else(|| "expected 'loop <count> times'".to_owned())?;
        let count = parse_expression(&caps[1], &loc)?;
        let tail = caps[2].to_owned();
        let body = self.parse_body(line, &tail)?;
        Ok(AstNode::new(
            Node::LoopTimes {
                count: count.boxed(),
                body: body.boxed(),
            },
            loc,
        ))
    }

    // ── Assignment ────────────────────────────────────────────────────────────

    /// `set x = v`, `set x v`, `set a 1, b 2`, `set s 1, 2, 3`,
    /// `set user name "Alice", age 30`.
    fn parse_set(&mut self, line: &Line, rest: &str) -> Result<Vec<AstNode>, String> {
        let loc = self.loc(line);
        let assign = |name: &str, op: AssignOp, value: AstNode| {
            AstNode::new(
                Node::Assignment {
                    name: name.to_owned(),
                    op,
                    value: value.boxed(),
                },
                loc.clone(),
            )
        };

        if let Some(caps) = set_assign_re().captures(rest) {
            let value_src = caps[3].trim();
            if !value_src.starts_with('=') {
                let value = match parse_expression(value_src, &loc) {
                    Ok(v) => v,
                    Err(e) => list_literal(value_src, &loc).ok_or(e)?,
                };
                return Ok(vec![assign(&caps[1], assign_op(&caps[2]), value)]);
            }
        }

        let (name, value_src) = split_first_word(rest);
        if !is_ident(name) {
            return Err(format!("invalid variable name '{name}'"));
        }
        if value_src.is_empty() {
            return Ok(vec![assign(name, AssignOp::Set, AstNode::string("", loc.clone()))]);
        }

        let parts: Vec<&str> = split_top_level(value_src, ',').into_iter().map(str::trim).collect();
        if parts.len() == 1 {
            return Ok(vec![assign(name, AssignOp::Set, parse_expression(value_src, &loc)?)]);
        }

        // `name "Alice", age 30` — the first part is itself `key value`.
        if parse_expression(parts[0], &loc).is_err() {
            let mut pairs = Vec::new();
            for part in &parts {
                let (key, value) = key_value(part, &loc)?;
                pairs.push((key.to_owned(), value));
            }
            return Ok(vec![assign(name, AssignOp::Set, AstNode::new(Node::ObjectLiteral(pairs), loc.clone()))]);
        }

        // `a 1, b 2` — later parts name further variables.
        if parts[1..].iter().all(|p| parse_expression(p, &loc).is_err()) {
            let mut out = vec![assign(name, AssignOp::Set, parse_expression(parts[0], &loc)?)];
            for part in &parts[1..] {
                let (key, value) = key_value(part, &loc)?;
                out.push(assign(key, AssignOp::Set, value));
            }
            return Ok(out);
        }

        let value = list_literal(value_src, &loc)
            .ok_or_else(|| format!("cannot parse value list '{value_src}'"))?;
        Ok(vec![assign(name, AssignOp::Set, value)])
    }

    // ── Functions and classes ────────────────────────────────────────────────

    /// `name(p1, p2) body` or `name p1 p2 body`.  Returns the name, the
    /// parameters and the body block.
    fn parse_callable(&mut self, line: &Line, text: &str) -> Result<(String, Vec<String>, AstNode), String> {
        let (header, braced) = match split_brace_body(text) {
            Some((header, inner, after)) if after.trim().is_empty() => {
                (header.to_owned(), Some(self.sub_parse(line, inner)))
            }
            _ => (text.trim().to_owned(), None),
        };

        let (name, params, inline) = match header.find('(') {
            Some(open) => {
                let close = header[open..]
                    .find(')')
                    .map(|i| open + i)
                    .ok_or_else(|| format!("missing ')' in '{header}'"))?;
                let params: Vec<String> = header[open + 1..close]
                    .split(',')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(str::to_owned)
                    .collect();
                (
                    header[..open].trim().to_owned(),
                    params,
                    header[close + 1..].trim().to_owned(),
                )
            }
            None => {
                let mut words = header.split_whitespace().map(str::to_owned);
                let name = words.next().unwrap_or_default();
                (name, words.collect(), String::new())
            }
        };

        if !is_ident(&name) {
            return Err(format!("invalid function name '{name}'"));
        }
        if let Some(bad) = params.iter().find(|p| !is_ident(p)) {
            return Err(format!("invalid parameter name '{bad}' in '{name}'"));
        }
        let body = match braced {
            Some(b) => b,
            None => self.parse_body(line, &inline)?,
        };
        Ok((name, params, body))
    }

    fn parse_function(&mut self, line: &Line, rest: &str) -> Result<AstNode, String> {
        let loc = self.loc(line);
        if let Some(gen) = rest.strip_prefix('*') {
            let (name, params, _) = self.parse_callable(line, gen)?;
            return Ok(AstNode::new(Node::GeneratorDef { name, params }, loc));
        }
        let (name, params, body) = self.parse_callable(line, rest)?;
        Ok(AstNode::new(
            Node::FunctionDef {
                name,
                params,
                body: body.boxed(),
            },
            loc,
        ))
    }

    fn parse_class(&mut self, line: &Line, rest: &str) -> Result<AstNode, String> {
        let loc = self.loc(line);
        let (header, methods) = match split_brace_body(rest) {
            Some((header, inner, after)) if after.trim().is_empty() => {
                let mut sub = Parser {
                    lines: split_lines(inner, line.line, line.column, false),
                    pos: 0,
                    filename: self.filename.clone(),
                    errors: Vec::new(),
                };
                let methods = sub.parse_class_members(None);
                self.errors.append(&mut sub.errors);
                (header.to_owned(), methods)
            }
            _ => (rest.trim().to_owned(), self.parse_class_members(Some(line.indent))),
        };

        let (name, parent) = match split_word_at(&header, "extends") {
            Some((name, parent)) => (name.to_owned(), Some(parent.to_owned())),
            None => (header.clone(), None),
        };
        if !is_ident(&name) {
            return Err(format!("invalid class name '{name}'"));
        }
        if let Some(p) = parent.as_deref().filter(|p| !is_ident(p)) {
            return Err(format!("invalid parent class '{p}'"));
        }
        Ok(AstNode::new(Node::ClassDef { name, parent, methods }, loc))
    }

    fn parse_class_members(&mut self, parent: Option<usize>) -> Vec<AstNode> {
        let mut methods = Vec::new();
        let mut private_next = false;
        while let Some(line) = self.peek_line() {
            if parent.is_some_and(|p| line.indent <= p) {
                break;
            }
            let line = line.clone();
            self.pos += 1;

            let (kw, rest) = split_keyword(&line.text);
            if kw == "private" && rest.is_empty() {
                private_next = true;
                continue;
            }
            let (is_private, text) = if kw == "private" {
                (true, rest)
            } else {
                (private_next, line.text.as_str())
            };
            private_next = false;

            let text = text.to_owned();
            match self.parse_callable(&line, &text) {
                Ok((name, params, body)) => methods.push(AstNode::new(
                    Node::MethodDef {
                        is_constructor: name == "constructor",
                        name,
                        params,
                        body: body.boxed(),
                        is_private,
                    },
                    self.loc(&line),
                )),
                Err(msg) => {
                    self.error(&line, msg);
                    self.skip_block(line.indent);
                }
            }
        }
        methods
    }

    // ── Errors ────────────────────────────────────────────────────────────────

    fn parse_try(&mut self, line: &Line, rest: &str) -> Result<AstNode, String> {
        let loc = self.loc(line);
        let rest = rest.trim();

        let (try_block, catch_clause, catch_line) = if rest.starts_with('{') {
            let (_, inner, after) =
                split_brace_body(rest).ok_or_else(|| "unterminated '{' block".to_owned())?;
            let block = self.sub_parse(line, inner);
            let after = after.trim();
            if after.is_empty() {
                let (clause, catch_line) = self.next_catch(line)?;
                (block, clause, catch_line)
            } else {
                (block, after.to_owned(), line.clone())
            }
        } else if let Some((try_src, catch_src)) = split_word_at(rest, "catch") {
            let block = self.inline_block(line, try_src)?;
            (block, format!("catch {catch_src}"), line.clone())
        } else {
            let block = self.parse_body(line, rest)?;
            let (clause, catch_line) = self.next_catch(line)?;
            (block, clause, catch_line)
        };

        let (kw, clause) = split_keyword(&catch_clause);
        if kw != "catch" {
            return Err(format!("expected 'catch', found '{catch_clause}'"));
        }
        let (catch_var, body_src) = catch_binding(clause);
        let catch_block = self.parse_body(&catch_line, body_src)?;
        Ok(AstNode::new(
            Node::TryCatch {
                try_block: try_block.boxed(),
                catch_var: catch_var.map(str::to_owned),
                catch_block: catch_block.boxed(),
            },
            loc,
        ))
    }

    /// The `catch` line at the same indentation as `line`.
    fn next_catch(&mut self, line: &Line) -> Result<(String, Line), String> {
        match self.peek_line() {
            Some(next) if next.indent == line.indent && split_keyword(&next.text).0 == "catch" => {
                let next = next.clone();
                self.pos += 1;
                Ok((next.text.clone(), next))
            }
            _ => Err("'try' without 'catch'".into()),
        }
    }
}

/// Split the text after `catch` into the optional error variable and the
/// body source.
fn catch_binding(clause: &str) -> (Option<&str>, &str) {
    let clause = clause.trim();
    if let Some(inner) = clause.strip_prefix('(') {
        if let Some(close) = inner.find(')') {
            let var = inner[..close].trim();
            let var = (!var.is_empty()).then_some(var);
            return (var, inner[close + 1..].trim());
        }
    }
    if clause.starts_with('{') {
        return (None, clause);
    }
    let (word, rest) = split_first_word(clause);
    if is_ident(word) && !KEYWORDS.contains(&word) {
        return (Some(word), rest);
    }
    (None, clause)
}

/// `key value` inside a `set` list.
fn key_value<'a>(part: &'a str, loc: &SourceLocation) -> Result<(&'a str, AstNode), String> {
    let (key, value_src) = split_first_word(part);
    if !is_ident(key) || value_src.is_empty() {
        return Err(format!("expected 'name value', got '{part}'"));
    }
    Ok((key, parse_expression(value_src, loc)?))
}

/// `1, 2, 3` as an array literal, if every element parses.
fn list_literal(src: &str, loc: &SourceLocation) -> Option<AstNode> {
    let items: Result<Vec<AstNode>, String> = split_top_level(src, ',')
        .into_iter()
        .map(|p| parse_expression(p.trim(), loc))
        .collect();
    let items = items.ok()?;
    (items.len() > 1).then(|| AstNode::new(Node::ArrayLiteral(items), loc.clone()))
}

/// `destructure items first, second, ...rest` (array) or
/// `destructure user name username, age userage` (object).
fn parse_destructure(rest: &str, loc: &SourceLocation) -> Result<Node, String> {
    let (source_src, targets_src) = split_first_word(rest);
    if source_src.is_empty() || targets_src.is_empty() {
        return Err("expected 'destructure <source> <targets>'".into());
    }
    let source = parse_expression(source_src, loc)?;
    let targets: Vec<&str> = split_top_level(targets_src, ',')
        .into_iter()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect();

    let is_object = targets
        .iter()
        .all(|t| t.split_whitespace().count() == 2 && !t.starts_with("..."));
    let pattern = if is_object {
        let pairs = targets
            .iter()
            .map(|t| {
                let (key, target) = split_first_word(t);
                if is_ident(target) {
                    Ok((key.to_owned(), target.to_owned()))
                } else {
                    Err(format!("invalid destructure target '{target}'"))
                }
            })
            .collect::<Result<Vec<_>, String>>()?;
        DestructurePattern::Object(pairs)
    } else {
        let mut names = Vec::new();
        let mut rest_name = None;
        for t in targets {
            if let Some(r) = t.strip_prefix("...") {
                rest_name = Some(r.trim().to_owned());
            } else if is_ident(t) {
                names.push(t.to_owned());
            } else {
                return Err(format!("invalid destructure target '{t}'"));
            }
        }
        DestructurePattern::Array {
            names,
            rest: rest_name,
        }
    };
    Ok(Node::Destructure {
        source: source.boxed(),
        pattern,
    })
}

/// Parse a script.  Returns the program and every syntax error found.
pub fn parse_program(src: &str) -> (AstNode, Vec<ParseError>) {
    let mut parser = Parser::new(src);
    let program = parser.parse_program();
    (program, parser.into_errors())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
