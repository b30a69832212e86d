//! Document lexer.
//!
//! Splits a markdown document into coarse tokens.  Expression syntax inside
//! directives is left to the statement parser.
//!
//! | Kind           | Matches                                          |
//! |----------------|--------------------------------------------------|
//! | `Heading`      | a line starting with `#`, without its newline    |
//! | `VariableRef`  | `{{name}}` closed on the same line               |
//! | `XmdDirective` | `<!-- xmd: ... -->`, possibly multi-line         |
//! | `Text`         | everything else, including other HTML comments   |
//! | `Eof`          | end of input, returned forever after             |
//!
//! An unmatched `{{` makes the rest of its line `Text`; an unterminated
//! comment makes the rest of the document `Text`.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Text,
    Heading,
    VariableRef,
    XmdDirective,
    Eof,
}

/// One token and where it starts (1-based line and column).
///
/// `value` is the raw text for `Text`/`Heading`, the trimmed name for
/// `VariableRef`, and the script after `xmd:` for `XmdDirective`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub value: String,
    pub line: usize,
    pub column: usize,
}

pub struct Lexer<'a> {
    src: &'a str,
    pos: usize,
    line: usize,
    column: usize,
    peeked: Option<Token>,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Lexer {
            src,
            pos: 0,
            line: 1,
            column: 1,
            peeked: None,
        }
    }

    /// Byte offset of the next unread character.
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn line(&self) -> usize {
        self.line
    }

    pub fn column(&self) -> usize {
        self.column
    }

    /// The next token, without consuming it.
    pub fn peek_token(&mut self) -> &Token {
        let tok = match self.peeked.take() {
            Some(tok) => tok,
            None => self.scan(),
        };
        self.peeked.insert(tok)
    }

    pub fn next_token(&mut self) -> Token {
        match self.peeked.take() {
            Some(tok) => tok,
            None => self.scan(),
        }
    }

    // ── Scanning ──────────────────────────────────────────────────────────────

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    /// Consume `len` bytes, keeping line/column current.
    fn advance(&mut self, len: usize) -> &'a str {
        let taken = &self.src[self.pos..self.pos + len];
        for c in taken.chars() {
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        self.pos += len;
        taken
    }

    fn token(&mut self, kind: TokenKind, len: usize, value: impl FnOnce(&'a str) -> String) -> Token {
        let (line, column) = (self.line, self.column);
        let raw = self.advance(len);
        Token {
            kind,
            value: value(raw),
            line,
            column,
        }
    }

    fn scan(&mut self) -> Token {
        let rest = self.rest();
        if rest.is_empty() {
            return Token {
                kind: TokenKind::Eof,
                value: String::new(),
                line: self.line,
                column: self.column,
            };
        }

        if self.column == 1 && rest.starts_with('#') {
            let len = rest.find('\n').unwrap_or(rest.len());
            return self.token(TokenKind::Heading, len, str::to_owned);
        }

        if rest.starts_with("<!--") {
            return match rest[4..].find("-->") {
                Some(end) => {
                    let len = 4 + end + 3;
                    let body = rest[4..4 + end].trim_start();
                    match body.strip_prefix("xmd:") {
                        Some(script) => {
                            let script = script.trim_end().to_owned();
                            self.token(TokenKind::XmdDirective, len, |_| script)
                        }
                        None => self.token(TokenKind::Text, len, str::to_owned),
                    }
                }
                None => self.token(TokenKind::Text, rest.len(), str::to_owned),
            };
        }

        if rest.starts_with("{{") {
            let eol = rest.find('\n').unwrap_or(rest.len());
            return match rest[2..eol].find("}}") {
                Some(end) => self.token(TokenKind::VariableRef, 2 + end + 2, |raw| {
                    raw[2..raw.len() - 2].trim().to_owned()
                }),
                None => self.token(TokenKind::Text, eol, str::to_owned),
            };
        }

        let len = text_len(rest);
        self.token(TokenKind::Text, len, str::to_owned)
    }
}

/// Length of the plain-text run at the start of `rest`: up to the next
/// `{{`, `<!--`, or heading line.  Always at least one character.
fn text_len(rest: &str) -> usize {
    let mut prev = '\0';
    for (i, c) in rest.char_indices() {
        if i > 0 {
            let here = &rest[i..];
            if here.starts_with("{{") || here.starts_with("<!--") || (prev == '\n' && c == '#') {
                return i;
            }
        }
        prev = c;
    }
    rest.len()
}

impl Iterator for Lexer<'_> {
    type Item = Token;

    /// Tokens up to, not including, `Eof`.
    fn next(&mut self) -> Option<Token> {
        let tok = self.next_token();
        (tok.kind != TokenKind::Eof).then_some(tok)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<(TokenKind, String)> {
        Lexer::new(src).map(|t| (t.kind, t.value)).collect()
    }

    #[test]
    fn heading_then_text() {
        let toks = kinds("# Title\nbody text\n");
        assert_eq!(
            toks,
            vec![
                (TokenKind::Heading, "# Title".into()),
                (TokenKind::Text, "\nbody text\n".into()),
            ]
        );
    }

    #[test]
    fn hash_mid_line_is_text() {
        assert_eq!(kinds("issue #4"), vec![(TokenKind::Text, "issue #4".into())]);
    }

    #[test]
    fn variable_refs() {
        let toks = kinds("Hi {{ name }}!");
        assert_eq!(
            toks,
            vec![
                (TokenKind::Text, "Hi ".into()),
                (TokenKind::VariableRef, "name".into()),
                (TokenKind::Text, "!".into()),
            ]
        );
    }

    #[test]
    fn unmatched_braces_are_text_to_end_of_line() {
        let toks = kinds("a {{b\nc {{d}}");
        assert_eq!(
            toks,
            vec![
                (TokenKind::Text, "a ".into()),
                (TokenKind::Text, "{{b".into()),
                (TokenKind::Text, "\nc ".into()),
                (TokenKind::VariableRef, "d".into()),
            ]
        );
    }

    #[test]
    fn directives_and_plain_comments() {
        let toks = kinds("<!-- note -->x<!-- xmd:\nset a = 1\n-->");
        assert_eq!(toks[0], (TokenKind::Text, "<!-- note -->".into()));
        assert_eq!(toks[1], (TokenKind::Text, "x".into()));
        assert_eq!(toks[2], (TokenKind::XmdDirective, "\nset a = 1".into()));
        assert_eq!(toks.len(), 3);
    }

    #[test]
    fn unterminated_comment_is_text() {
        let toks = kinds("a<!-- xmd: set x = 1\nmore");
        assert_eq!(toks[1], (TokenKind::Text, "<!-- xmd: set x = 1\nmore".into()));
    }

    #[test]
    fn positions_track_lines_and_columns() {
        let mut lx = Lexer::new("ab\n{{x}}\n# H");
        let t = lx.next_token();
        assert_eq!((t.line, t.column), (1, 1));
        assert_eq!(t.value, "ab\n");
        let t = lx.next_token();
        assert_eq!((t.kind, t.line, t.column), (TokenKind::VariableRef, 2, 1));
        let t = lx.next_token();
        assert_eq!((t.kind, t.value.as_str()), (TokenKind::Text, "\n"));
        let t = lx.next_token();
        assert_eq!((t.kind, t.line, t.column), (TokenKind::Heading, 3, 1));
        assert_eq!(lx.next_token().kind, TokenKind::Eof);
        assert_eq!(lx.next_token().kind, TokenKind::Eof);
    }

    #[test]
    fn peek_does_not_advance() {
        let mut lx = Lexer::new("{{a}}b");
        assert_eq!(lx.peek_token().kind, TokenKind::VariableRef);
        assert_eq!(lx.peek_token().kind, TokenKind::VariableRef);
        assert_eq!(lx.next_token().value, "a");
        assert_eq!(lx.next_token().value, "b");
        assert_eq!(lx.position(), 6);
    }

    #[test]
    fn multibyte_columns() {
        let mut lx = Lexer::new("é{{x}}");
        lx.next_token();
        let t = lx.next_token();
        assert_eq!(t.column, 2);
    }
}
