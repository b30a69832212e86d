//! Markdown document processing.
//!
//! A document is lexed into text, headings, `{{name}}` references and
//! `<!-- xmd: ... -->` directives.  Each directive is parsed as a script and
//! all of them run, in document order, in one [`Evaluator`], so a variable
//! set in one directive is visible to the text and directives after it.
//! A directive is replaced by whatever it prints.

use std::fs;
use std::path::Path;

use crate::config::Config;
use crate::error::{ParseError, Result, XmdError};
use crate::lexer::{Lexer, TokenKind};
use crate::script::ast::{AstNode, Node, SourceLocation};
use crate::script::interp::Evaluator;
use crate::script::stmt::{self, Parser};

/// Build the program for a markdown document.  Syntax errors inside
/// directives are returned alongside; the affected lines are skipped.
pub fn parse_document(src: &str) -> (AstNode, Vec<ParseError>) {
    let mut nodes = Vec::new();
    let mut errors = Vec::new();

    for tok in Lexer::new(src) {
        let loc = SourceLocation::new(tok.line, tok.column);
        let node = match tok.kind {
            TokenKind::Text | TokenKind::Heading => Node::Text(tok.value),
            TokenKind::VariableRef => Node::VariableRef(tok.value),
            TokenKind::XmdDirective => {
                let mut parser = Parser::at(&tok.value, tok.line, tok.column);
                let program = parser.parse_program();
                errors.extend(parser.into_errors());
                match program.node {
                    Node::Program(stmts) => Node::Directive(stmts),
                    other => Node::Directive(vec![AstNode::new(other, program.location)]),
                }
            }
            TokenKind::Eof => break,
        };
        nodes.push(AstNode::new(node, loc));
    }

    (AstNode::new(Node::Program(nodes), SourceLocation::new(1, 1)), errors)
}

/// Runs documents and scripts against a shared evaluator.
pub struct Processor {
    evaluator: Evaluator,
}

impl Default for Processor {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl Processor {
    pub fn new(config: Config) -> Self {
        Processor {
            evaluator: Evaluator::with_config(config),
        }
    }

    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    pub fn evaluator_mut(&mut self) -> &mut Evaluator {
        &mut self.evaluator
    }

    /// Process a markdown document and return the rendered text.
    pub fn process(&mut self, src: &str) -> String {
        let (program, errors) = parse_document(src);
        self.run(&program, &errors)
    }

    /// Run `src` as a plain XMD script.
    pub fn run_script(&mut self, src: &str) -> String {
        let (program, errors) = stmt::parse_program(src);
        self.run(&program, &errors)
    }

    /// Process a file; relative paths inside it resolve against its directory.
    pub fn process_file(&mut self, path: &Path) -> Result<String> {
        let src = read_source(path)?;
        self.set_base_dir_from(path);
        Ok(self.process(&src))
    }

    /// Run a script file; relative paths inside it resolve against its
    /// directory.
    pub fn run_file(&mut self, path: &Path) -> Result<String> {
        let src = read_source(path)?;
        self.set_base_dir_from(path);
        Ok(self.run_script(&src))
    }

    fn set_base_dir_from(&mut self, path: &Path) {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            self.evaluator.set_base_dir(dir);
        }
    }

    fn run(&mut self, program: &AstNode, errors: &[ParseError]) -> String {
        for e in errors {
            log::warn!("syntax error at {e}");
        }
        self.evaluator.evaluate_program(program)
    }
}

/// Parse-check a document without running it.
pub fn validate(src: &str) -> Vec<ParseError> {
    parse_document(src).1
}

fn read_source(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| XmdError::Io {
        path: path.display().to_string(),
        source,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
