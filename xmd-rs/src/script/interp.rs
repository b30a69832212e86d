//! XMD tree-walking evaluator.
//!
//! The [`Evaluator`] owns the variable [`Store`], the user function table and
//! the output buffer, and executes parsed [`AstNode`] trees.
//!
//! Statements run through [`Evaluator::exec_stmt`], which returns a
//! [`ControlFlow`] signal for `break`/`continue`/`return`; expressions run
//! through [`Evaluator::evaluate`].  Errors propagate as [`EvalError`] until a
//! `try`/`catch`, a directive boundary, or [`Evaluator::evaluate_program`]
//! stops them.  `evaluate_program` never fails: it records the error in
//! [`Evaluator::has_error`]/[`Evaluator::error_message`] and returns whatever
//! output was produced before it.
//!
//! What each statement writes to the output:
//!
//! | Statement                       | Output                               |
//! |---------------------------------|--------------------------------------|
//! | document text                   | the text, interpolated               |
//! | `{{name}}`                      | the value, or the placeholder as-is  |
//! | `print(x)`                      | `x` and a newline                    |
//! | expression                      | its value and a newline, unless blank|
//! | bare unknown word               | the word and a newline               |
//! | assignment, definition, control | nothing                              |

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use super::{
    ast::{AssignOp, AstNode, BinOp, DestructurePattern, Literal, Node, SourceLocation, UnaryOp},
    builtins,
    expand,
    expr::{is_ref_path, parse_expression},
    stmt::Parser,
    value::AstValue,
};
use crate::config::Config;
use crate::error::EvalError;
use crate::store::{MemoryStore, Store};

/// Largest file `import` will read.
const MAX_IMPORT_SIZE: u64 = 1024 * 1024;

// ── ControlFlow ───────────────────────────────────────────────────────────────

/// Non-error control-flow signals that unwind out of a block.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlFlow {
    Break,
    Continue,
    Return(AstValue),
}

type Flow = Option<ControlFlow>;

/// What a loop does after one pass of its body.
enum Step {
    Next,
    Stop,
    Exit(ControlFlow),
}

// ── Functions ─────────────────────────────────────────────────────────────────

#[derive(Debug)]
enum Body {
    /// Statement block; the value comes from `return`.
    Block(AstNode),
    /// Lambda body; its value is the result.
    Expr(AstNode),
    /// `function*` definitions: registered but never run.
    Stub,
}

#[derive(Debug)]
struct Function {
    params: Vec<String>,
    body: Body,
    /// Owning class and privacy, for methods.
    class: Option<String>,
    is_private: bool,
}

// ── Evaluator ─────────────────────────────────────────────────────────────────

/// The XMD evaluator.  One instance per document run; see [`Evaluator::reset`].
pub struct Evaluator {
    variables: Box<dyn Store>,
    functions: HashMap<String, Rc<Function>>,
    /// Class name → parent class.
    classes: HashMap<String, Option<String>>,
    output: String,
    has_error: bool,
    error_message: Option<String>,
    config: Config,
    /// Directory relative file paths and imports resolve against.
    base_dir: Option<PathBuf>,
    /// Nested user function calls.
    depth: usize,
    /// Classes whose methods are currently running (innermost last).
    class_stack: Vec<String>,
    /// Files being imported (innermost last).
    imports: Vec<PathBuf>,
    /// Value of the most recent expression statement.
    last_value: AstValue,
    lambda_count: usize,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl Evaluator {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        Self::with_store(Box::new(MemoryStore::new()), config)
    }

    /// Evaluator over a caller-supplied variable store.
    pub fn with_store(variables: Box<dyn Store>, config: Config) -> Self {
        Evaluator {
            variables,
            functions: HashMap::new(),
            classes: HashMap::new(),
            output: String::new(),
            has_error: false,
            error_message: None,
            config,
            base_dir: None,
            depth: 0,
            class_stack: Vec::new(),
            imports: Vec::new(),
            last_value: AstValue::Null,
            lambda_count: 0,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Resolve `File.*` paths and imports relative to `dir`.
    pub fn set_base_dir(&mut self, dir: impl Into<PathBuf>) {
        self.base_dir = Some(dir.into());
    }

    pub fn set_variable(&mut self, name: &str, value: AstValue) -> bool {
        self.variables.set(name, value.to_variable())
    }

    pub fn variable(&self, name: &str) -> Option<AstValue> {
        self.variables.get(name).map(|v| AstValue::from_variable(&v))
    }

    pub fn store(&self) -> &dyn Store {
        self.variables.as_ref()
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn has_error(&self) -> bool {
        self.has_error
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn clear_error(&mut self) {
        self.has_error = false;
        self.error_message = None;
    }

    /// Forget all variables, functions, classes, output and error state.
    pub fn reset(&mut self) {
        self.variables.clear();
        self.functions.clear();
        self.classes.clear();
        self.output.clear();
        self.clear_error();
        self.depth = 0;
        self.class_stack.clear();
        self.imports.clear();
        self.last_value = AstValue::Null;
        self.lambda_count = 0;
    }

    fn record_error(&mut self, err: EvalError) {
        log::warn!("evaluation error: {err}");
        self.has_error = true;
        self.error_message = Some(err.0);
    }

    // ── Execution ─────────────────────────────────────────────────────────────

    /// Run a program and return the output it produced.  An uncaught error
    /// stops the program; see [`Evaluator::has_error`].  Error state left by
    /// an earlier run is cleared first.
    pub fn evaluate_program(&mut self, program: &AstNode) -> String {
        self.output.clear();
        self.clear_error();
        if let Err(e) = self.exec_block(program.statements()) {
            self.record_error(e);
        }
        std::mem::take(&mut self.output)
    }

    /// Execute statements in order, stopping at the first control signal.
    pub fn exec_block(&mut self, stmts: &[AstNode]) -> Result<Flow, EvalError> {
        for stmt in stmts {
            if let Some(cf) = self.exec_stmt(stmt)? {
                return Ok(Some(cf));
            }
        }
        Ok(None)
    }

    /// Execute one statement.
    pub fn exec_stmt(&mut self, node: &AstNode) -> Result<Flow, EvalError> {
        match &node.node {
            Node::Program(stmts) | Node::Block(stmts) => self.exec_block(stmts),

            // Control signals and errors both stop at the directive boundary.
            Node::Directive(stmts) => match self.exec_block(stmts) {
                Ok(flow) => {
                    if let Some(cf) = flow {
                        log::debug!("directive at {} ended with {cf:?}", node.location);
                    }
                    Ok(None)
                }
                Err(e) => {
                    log::debug!("directive at {} failed", node.location);
                    self.record_error(e);
                    Ok(None)
                }
            },

            Node::Text(text) => {
                let text = self.interpolate(text);
                self.emit(&text)?;
                Ok(None)
            }

            Node::VariableRef(path) => {
                let text = self
                    .resolve_placeholder(path)
                    .unwrap_or_else(|| format!("{{{{{path}}}}}"));
                self.emit(&text)?;
                Ok(None)
            }

            // A bare word: a zero-argument call if it names a function,
            // otherwise literal text.
            Node::Identifier(name) if !self.variables.has(name) => {
                if self.functions.contains_key(name) {
                    let value = self.call(name, Vec::new())?;
                    if !value.is_blank() {
                        self.emit(&format!("{value}\n"))?;
                    }
                    self.last_value = value;
                } else {
                    self.emit(&format!("{name}\n"))?;
                    self.last_value = AstValue::string(name.as_str());
                }
                Ok(None)
            }

            Node::Conditional {
                condition,
                then_block,
                else_block,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.exec_block(then_block.statements())
                } else if let Some(e) = else_block {
                    self.exec_block(e.statements())
                } else {
                    Ok(None)
                }
            }

            Node::Loop {
                variable,
                iterable,
                body,
            } => {
                let items = self.iterable(iterable)?;
                let mut n = 0;
                for item in items {
                    self.set_var(variable, item);
                    match self.loop_step(body, &mut n)? {
                        Step::Next => {}
                        Step::Stop => break,
                        Step::Exit(cf) => return Ok(Some(cf)),
                    }
                }
                Ok(None)
            }

            Node::ForIndexed {
                index_var,
                item_var,
                iterable,
                body,
            } => {
                let items = self.iterable(iterable)?;
                let mut n = 0;
                for (i, item) in items.into_iter().enumerate() {
                    self.set_var(index_var, AstValue::Number(i as f64));
                    self.set_var(item_var, item);
                    match self.loop_step(body, &mut n)? {
                        Step::Next => {}
                        Step::Stop => break,
                        Step::Exit(cf) => return Ok(Some(cf)),
                    }
                }
                Ok(None)
            }

            Node::ForRange {
                variable,
                start,
                end,
                body,
            } => {
                let start = self.eval_number(start, "Range start")?.floor() as i64;
                let end = self.eval_number(end, "Range end")?.floor() as i64;
                let step: i64 = if start <= end { 1 } else { -1 };
                let mut i = start;
                let mut n = 0;
                loop {
                    self.set_var(variable, AstValue::Number(i as f64));
                    match self.loop_step(body, &mut n)? {
                        Step::Next => {}
                        Step::Stop => break,
                        Step::Exit(cf) => return Ok(Some(cf)),
                    }
                    if i == end {
                        break;
                    }
                    i += step;
                }
                Ok(None)
            }

            Node::LoopTimes { count, body } => {
                let count = self.eval_number(count, "Loop count")?.floor().max(0.0) as u64;
                let mut n = 0;
                for _ in 0..count {
                    match self.loop_step(body, &mut n)? {
                        Step::Next => {}
                        Step::Stop => break,
                        Step::Exit(cf) => return Ok(Some(cf)),
                    }
                }
                Ok(None)
            }

            Node::WhileLoop { condition, body } => {
                let mut n = 0;
                while self.evaluate(condition)?.is_truthy() {
                    match self.loop_step(body, &mut n)? {
                        Step::Next => {}
                        Step::Stop => break,
                        Step::Exit(cf) => return Ok(Some(cf)),
                    }
                }
                Ok(None)
            }

            Node::Break => Ok(Some(ControlFlow::Break)),
            Node::Continue => Ok(Some(ControlFlow::Continue)),
            Node::Return(value) => {
                let v = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => AstValue::empty(),
                };
                Ok(Some(ControlFlow::Return(v)))
            }

            Node::TryCatch {
                try_block,
                catch_var,
                catch_block,
            } => match self.exec_block(try_block.statements()) {
                Ok(flow) => Ok(flow),
                Err(e) => {
                    log::debug!("caught at {}: {e}", node.location);
                    if let Some(var) = catch_var {
                        self.set_var(var, AstValue::String(e.0));
                    }
                    self.exec_block(catch_block.statements())
                }
            },

            Node::Throw(value) => {
                let message = self.evaluate(value)?.to_string();
                Err(EvalError::new(message))
            }

            Node::FunctionDef { name, params, body } => {
                self.define(name, params.clone(), Body::Block((**body).clone()), None, false);
                Ok(None)
            }

            Node::GeneratorDef { name, params } => {
                self.define(name, params.clone(), Body::Stub, None, false);
                Ok(None)
            }

            Node::MethodDef {
                name,
                params,
                body,
                is_private,
                ..
            } => {
                self.define(name, params.clone(), Body::Block((**body).clone()), None, *is_private);
                Ok(None)
            }

            Node::ClassDef { name, parent, methods } => {
                self.define_class(name, parent.as_deref(), methods);
                self.last_value = AstValue::Boolean(true);
                Ok(None)
            }

            Node::Import(path) => self.import(path),

            Node::Destructure { source, pattern } => {
                self.destructure(source, pattern)?;
                Ok(None)
            }

            // Side effects only.
            Node::Assignment { .. } | Node::FileWrite { .. } | Node::FileDelete(_) | Node::Lambda { .. } => {
                self.last_value = self.evaluate(node)?;
                Ok(None)
            }

            _ => {
                let value = self.evaluate(node)?;
                if !value.is_blank() {
                    let text = format!("{value}\n");
                    self.emit(&text)?;
                }
                self.last_value = value;
                Ok(None)
            }
        }
    }

    /// Run one loop iteration, enforcing the iteration limit.
    fn loop_step(&mut self, body: &AstNode, iterations: &mut usize) -> Result<Step, EvalError> {
        *iterations += 1;
        if *iterations > self.config.max_loop_iterations {
            return Err(EvalError::new(format!(
                "Loop exceeded maximum of {} iterations",
                self.config.max_loop_iterations
            )));
        }
        Ok(match self.exec_block(body.statements())? {
            None | Some(ControlFlow::Continue) => Step::Next,
            Some(ControlFlow::Break) => Step::Stop,
            Some(cf @ ControlFlow::Return(_)) => Step::Exit(cf),
        })
    }

    // ── Expressions ───────────────────────────────────────────────────────────

    /// Evaluate a node to a value.  Statement nodes run and yield the value
    /// of their last expression statement (or their `return` value).
    pub fn evaluate(&mut self, node: &AstNode) -> Result<AstValue, EvalError> {
        match &node.node {
            Node::Literal(lit) => Ok(match lit {
                Literal::String(s) => AstValue::String(self.interpolate(s)),
                Literal::Number(n) => AstValue::Number(*n),
                Literal::Boolean(b) => AstValue::Boolean(*b),
                Literal::Null => AstValue::Null,
            }),

            Node::Identifier(name) => Ok(self.variable(name).unwrap_or_else(AstValue::empty)),

            Node::VariableRef(path) => Ok(match self.lookup_path(path) {
                Some(v) => v,
                None => self
                    .resolve_placeholder(path)
                    .map(AstValue::String)
                    .unwrap_or_else(AstValue::empty),
            }),

            Node::ArrayLiteral(items) => Ok(AstValue::Array(self.eval_args(items)?)),

            Node::ObjectLiteral(pairs) => {
                let mut obj = AstValue::Object(Vec::with_capacity(pairs.len()));
                for (key, value) in pairs {
                    let v = self.evaluate(value)?;
                    obj.insert(key, v);
                }
                Ok(obj)
            }

            Node::ArrayAccess { array, index } => {
                let target = self.evaluate(array)?;
                let index = self.evaluate(index)?;
                index_into(&target, &index)
            }

            Node::ObjectAccess { object, property } => self.object_access(object, property),

            Node::BinaryOp { op, left, right } => match op {
                BinOp::And => {
                    if !self.evaluate(left)?.is_truthy() {
                        return Ok(AstValue::Boolean(false));
                    }
                    Ok(AstValue::Boolean(self.evaluate(right)?.is_truthy()))
                }
                BinOp::Or => {
                    if self.evaluate(left)?.is_truthy() {
                        return Ok(AstValue::Boolean(true));
                    }
                    Ok(AstValue::Boolean(self.evaluate(right)?.is_truthy()))
                }
                _ => {
                    let l = self.evaluate(left)?;
                    let r = self.evaluate(right)?;
                    binary(*op, &l, &r)
                }
            },

            Node::UnaryOp { op, operand } => {
                let v = self.evaluate(operand)?;
                match op {
                    UnaryOp::Neg => v.arith_neg(),
                    UnaryOp::Not => Ok(AstValue::Boolean(!v.is_truthy())),
                }
            }

            Node::Ternary {
                condition,
                then_expr,
                else_expr,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.evaluate(then_expr)
                } else {
                    self.evaluate(else_expr)
                }
            }

            Node::Assignment { name, op, value } => {
                if let (AssignOp::Set, Node::Lambda { params, body }) = (op, &value.node) {
                    self.define(name, params.clone(), Body::Expr((**body).clone()), None, false);
                    return Ok(AstValue::empty());
                }
                let rhs = self.evaluate(value)?;
                let result = match op {
                    AssignOp::Set => rhs,
                    _ => {
                        let current = self.variable(name).unwrap_or_else(|| match &rhs {
                            AstValue::String(_) => AstValue::empty(),
                            _ => AstValue::Number(0.0),
                        });
                        compound(*op, &current, &rhs)?
                    }
                };
                self.set_var(name, result.clone());
                Ok(result)
            }

            Node::FunctionCall { name, args } => {
                let args = self.eval_args(args)?;
                self.call(name, args)
            }

            Node::StringMethod {
                receiver,
                method,
                args,
            } => {
                if let Node::Identifier(class) = &receiver.node {
                    if !self.variables.has(class) {
                        if let Some((qualified, func)) = self.find_method(class, method) {
                            let args = self.eval_args(args)?;
                            return self.call_function(&qualified, func, args);
                        }
                    }
                }
                let recv = self.evaluate(receiver)?;
                let args = self.eval_args(args)?;
                builtins::call_method(&recv, method, args).map_err(EvalError::from)
            }

            Node::Lambda { params, body } => {
                self.lambda_count += 1;
                let name = format!("lambda#{}", self.lambda_count);
                self.define(&name, params.clone(), Body::Expr((**body).clone()), None, false);
                Ok(AstValue::String(name))
            }

            Node::Spread(inner) | Node::Await(inner) => self.evaluate(inner),

            Node::Yield(value) => match value {
                Some(v) => self.evaluate(v),
                None => Ok(AstValue::empty()),
            },

            Node::FileRead(path) => {
                let path = self.file_path("File.read", path)?;
                Ok(match fs::read_to_string(&path) {
                    Ok(s) => AstValue::String(s),
                    Err(e) => {
                        log::warn!("File.read {}: {e}", path.display());
                        AstValue::empty()
                    }
                })
            }

            Node::FileWrite { path, content } => {
                let path = self.file_path("File.write", path)?;
                let content = self.evaluate(content)?.to_string();
                Ok(AstValue::Boolean(match fs::write(&path, content) {
                    Ok(()) => true,
                    Err(e) => {
                        log::warn!("File.write {}: {e}", path.display());
                        false
                    }
                }))
            }

            Node::FileExists(path) => {
                let path = self.file_path("File.exists", path)?;
                Ok(AstValue::Boolean(path.exists()))
            }

            Node::FileDelete(path) => {
                let path = self.file_path("File.delete", path)?;
                Ok(AstValue::Boolean(match fs::remove_file(&path) {
                    Ok(()) => true,
                    Err(e) => {
                        log::warn!("File.delete {}: {e}", path.display());
                        false
                    }
                }))
            }

            Node::FileList(path) => {
                let path = self.file_path("File.list", path)?;
                Ok(AstValue::Array(list_dir(&path)))
            }

            Node::Program(_)
            | Node::Directive(_)
            | Node::Block(_)
            | Node::Text(_)
            | Node::Conditional { .. }
            | Node::Loop { .. }
            | Node::WhileLoop { .. }
            | Node::LoopTimes { .. }
            | Node::ForRange { .. }
            | Node::ForIndexed { .. }
            | Node::Break
            | Node::Continue
            | Node::Return(_)
            | Node::FunctionDef { .. }
            | Node::ClassDef { .. }
            | Node::MethodDef { .. }
            | Node::GeneratorDef { .. }
            | Node::TryCatch { .. }
            | Node::Throw(_)
            | Node::Import(_)
            | Node::Destructure { .. } => {
                self.last_value = AstValue::empty();
                Ok(match self.exec_stmt(node)? {
                    Some(ControlFlow::Return(v)) => v,
                    _ => std::mem::take(&mut self.last_value),
                })
            }
        }
    }

    fn eval_number(&mut self, node: &AstNode, what: &str) -> Result<f64, EvalError> {
        let v = self.evaluate(node)?;
        v.as_number()
            .ok_or_else(|| EvalError::new(format!("{what} must be a number, got {}", v.type_name())))
    }

    /// Evaluate arguments or array elements, expanding `...spread`.
    fn eval_args(&mut self, nodes: &[AstNode]) -> Result<Vec<AstValue>, EvalError> {
        let mut out = Vec::with_capacity(nodes.len());
        for node in nodes {
            match (&node.node, self.evaluate(node)?) {
                (Node::Spread(_), AstValue::Array(items)) => out.extend(items),
                (_, v) => out.push(v),
            }
        }
        Ok(out)
    }

    /// Values a `for` loop visits.
    fn iterable(&mut self, node: &AstNode) -> Result<Vec<AstValue>, EvalError> {
        if let Node::Identifier(name) = &node.node {
            if !self.variables.has(name) {
                return Err(EvalError::new(format!("Undefined variable '{name}' in for loop")));
            }
        }
        match self.evaluate(node)? {
            AstValue::Array(items) => Ok(items),
            AstValue::Object(pairs) => Ok(pairs.into_iter().map(|(k, _)| AstValue::String(k)).collect()),
            AstValue::String(s) => Ok(s.chars().map(|c| AstValue::String(c.to_string())).collect()),
            other => Err(EvalError::new(format!("Cannot iterate over {}", other.type_name()))),
        }
    }

    fn object_access(&mut self, object: &AstNode, property: &str) -> Result<AstValue, EvalError> {
        let (label, value) = match &object.node {
            Node::Identifier(name) => match self.variable(name) {
                Some(v) => (name.clone(), v),
                None => {
                    // `Class.method` without parentheses.
                    if let Some((qualified, func)) = self.find_method(name, property) {
                        return self.call_function(&qualified, func, Vec::new());
                    }
                    return Err(EvalError::new(format!("Object variable '{name}' not found")));
                }
            },
            Node::VariableRef(path) => {
                let v = self
                    .lookup_path(path)
                    .ok_or_else(|| EvalError::new(format!("Object variable '{path}' not found")))?;
                (path.clone(), v)
            }
            _ => (object.kind_name().to_owned(), self.evaluate(object)?),
        };
        match &value {
            AstValue::Object(_) => value.get(property).cloned().ok_or_else(|| {
                EvalError::new(format!("Property '{property}' not found in object '{label}'"))
            }),
            AstValue::Array(items) if property == "length" => Ok(AstValue::Number(items.len() as f64)),
            AstValue::String(s) if property == "length" => Ok(AstValue::Number(s.chars().count() as f64)),
            _ => Err(EvalError::new(format!("Variable '{label}' is not an object"))),
        }
    }

    // ── Variables and interpolation ───────────────────────────────────────────

    fn set_var(&mut self, name: &str, value: AstValue) {
        if !self.variables.set(name, value.to_variable()) {
            log::warn!("could not set variable '{name}'");
        }
    }

    /// Resolve `name`, `user.name`, `items[0]`, `matrix[1][2].x`.
    fn lookup_path(&self, path: &str) -> Option<AstValue> {
        let mut parts = path.split('.');
        let (name, indices) = split_indices(parts.next()?)?;
        let mut value = self.variable(name)?;
        for idx in indices {
            value = index_into(&value, &AstValue::string(idx)).ok()?;
        }
        for part in parts {
            let (key, indices) = split_indices(part)?;
            value = match (&value, key) {
                (AstValue::Object(_), _) => value.get(key)?.clone(),
                (AstValue::Array(items), "length") => AstValue::Number(items.len() as f64),
                (AstValue::String(s), "length") => AstValue::Number(s.chars().count() as f64),
                _ => return None,
            };
            for idx in indices {
                value = index_into(&value, &AstValue::string(idx)).ok()?;
            }
        }
        Some(value)
    }

    /// Text for the body of a `{{...}}` / `${...}` placeholder, or `None` to
    /// leave it as written.
    fn resolve_placeholder(&mut self, body: &str) -> Option<String> {
        if is_ref_path(body) {
            return self.lookup_path(body).map(|v| v.to_string());
        }
        let node = parse_expression(body, &SourceLocation::default()).ok()?;
        self.evaluate(&node).ok().map(|v| v.to_string())
    }

    fn interpolate(&mut self, src: &str) -> String {
        if !expand::has_placeholders(src) {
            return src.to_owned();
        }
        expand::interpolate(src, &mut |body| self.resolve_placeholder(body))
    }

    fn emit(&mut self, text: &str) -> Result<(), EvalError> {
        if self.output.len() + text.len() > self.config.max_output_size {
            return Err(EvalError::new(format!(
                "Output exceeds maximum size of {} bytes",
                self.config.max_output_size
            )));
        }
        self.output.push_str(text);
        Ok(())
    }

    // ── Functions and classes ─────────────────────────────────────────────────

    fn define(&mut self, name: &str, params: Vec<String>, body: Body, class: Option<String>, is_private: bool) {
        log::debug!("defining function '{name}'");
        let func = Function {
            params,
            body,
            class,
            is_private,
        };
        self.functions.insert(name.to_owned(), Rc::new(func));
    }

    fn define_class(&mut self, name: &str, parent: Option<&str>, methods: &[AstNode]) {
        for method in methods {
            if let Node::MethodDef {
                name: method_name,
                params,
                body,
                is_private,
                ..
            } = &method.node
            {
                self.define(
                    &format!("{name}.{method_name}"),
                    params.clone(),
                    Body::Block((**body).clone()),
                    Some(name.to_owned()),
                    *is_private,
                );
            }
        }
        self.classes.insert(name.to_owned(), parent.map(str::to_owned));
    }

    /// `class.method`, searching parent classes.
    fn find_method(&self, class: &str, method: &str) -> Option<(String, Rc<Function>)> {
        let mut current = Some(class.to_owned());
        // Bounded so an `extends` cycle cannot loop forever.
        for _ in 0..=self.classes.len() {
            let name = current?;
            let qualified = format!("{name}.{method}");
            if let Some(func) = self.functions.get(&qualified) {
                return Some((qualified, Rc::clone(func)));
            }
            current = self.classes.get(&name).cloned().flatten();
        }
        None
    }

    /// Call `name` with evaluated arguments.
    fn call(&mut self, name: &str, args: Vec<AstValue>) -> Result<AstValue, EvalError> {
        if name == "print" {
            let text: Vec<String> = args.iter().map(AstValue::to_string).collect();
            let text = format!("{}\n", text.join(" "));
            self.emit(&text)?;
            return Ok(AstValue::empty());
        }
        if builtins::is_builtin(name) {
            return builtins::call_builtin(name, args)
                .unwrap_or_else(|| Err(format!("Undefined function '{name}'")))
                .map_err(EvalError::from);
        }
        if let Some(func) = self.functions.get(name).cloned() {
            return self.call_function(name, func, args);
        }
        // A variable holding a lambda.
        if let Some(AstValue::String(target)) = self.variable(name) {
            if let Some(func) = self.functions.get(&target).cloned() {
                return self.call_function(&target, func, args);
            }
        }
        Err(EvalError::new(format!("Undefined function '{name}'")))
    }

    /// Bind parameters, run the body, then restore whatever the parameter
    /// names held before the call.
    fn call_function(&mut self, name: &str, func: Rc<Function>, args: Vec<AstValue>) -> Result<AstValue, EvalError> {
        if args.len() != func.params.len() {
            log::warn!(
                "{name}: expected {} argument(s), got {}",
                func.params.len(),
                args.len()
            );
            return Ok(AstValue::empty());
        }
        if let Some(class) = &func.class {
            if func.is_private && self.class_stack.last() != Some(class) {
                return Err(EvalError::new(format!("Method '{name}' is private")));
            }
        }
        if matches!(func.body, Body::Stub) {
            return Ok(AstValue::empty());
        }
        if self.depth >= self.config.max_recursion_depth {
            return Err(EvalError::new(format!(
                "Maximum recursion depth ({}) exceeded in '{name}'",
                self.config.max_recursion_depth
            )));
        }

        let saved: Vec<_> = func.params.iter().map(|p| self.variables.get(p)).collect();
        for (param, arg) in func.params.iter().zip(args) {
            self.set_var(param, arg);
        }

        self.depth += 1;
        if let Some(class) = &func.class {
            self.class_stack.push(class.clone());
        }
        let result = match &func.body {
            Body::Block(body) => self.exec_block(body.statements()).map(|flow| match flow {
                Some(ControlFlow::Return(v)) => v,
                _ => AstValue::empty(),
            }),
            Body::Expr(expr) => self.evaluate(expr),
            Body::Stub => Ok(AstValue::empty()),
        };
        if func.class.is_some() {
            self.class_stack.pop();
        }
        self.depth -= 1;

        for (param, old) in func.params.iter().zip(saved) {
            match old {
                Some(v) => {
                    self.variables.set(param, (*v).clone());
                }
                None => {
                    self.variables.remove(param);
                }
            }
        }
        result
    }

    // ── Destructuring ─────────────────────────────────────────────────────────

    fn destructure(&mut self, source: &AstNode, pattern: &DestructurePattern) -> Result<(), EvalError> {
        let value = self.evaluate(source)?;
        match (pattern, value) {
            (DestructurePattern::Array { names, rest }, AstValue::Array(items)) => {
                let mut items = items.into_iter();
                for name in names {
                    let v = items.next().unwrap_or(AstValue::Null);
                    self.set_var(name, v);
                }
                if let Some(rest) = rest {
                    self.set_var(rest, AstValue::Array(items.collect()));
                }
                Ok(())
            }
            (DestructurePattern::Object(pairs), obj @ AstValue::Object(_)) => {
                for (key, target) in pairs {
                    let v = obj.get(key).cloned().unwrap_or(AstValue::Null);
                    self.set_var(target, v);
                }
                Ok(())
            }
            (DestructurePattern::Array { .. }, other) => Err(EvalError::new(format!(
                "Cannot destructure {} as an array",
                other.type_name()
            ))),
            (DestructurePattern::Object(_), other) => Err(EvalError::new(format!(
                "Cannot destructure {} as an object",
                other.type_name()
            ))),
        }
    }

    // ── Files and imports ─────────────────────────────────────────────────────

    fn check_file_access(&self, op: &str) -> Result<(), EvalError> {
        if self.config.allow_file_access {
            Ok(())
        } else {
            Err(EvalError::new(format!("{op}: file access is disabled")))
        }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        match &self.base_dir {
            Some(dir) => dir.join(path),
            None => path.to_path_buf(),
        }
    }

    fn file_path(&mut self, op: &str, node: &AstNode) -> Result<PathBuf, EvalError> {
        self.check_file_access(op)?;
        let path = self.evaluate(node)?.to_string();
        if path.is_empty() {
            return Err(EvalError::new(format!("{op}: empty path")));
        }
        Ok(self.resolve(Path::new(&path)))
    }

    /// First existing `<dir>/<path>{.xmd,.xm,}` over the import search path.
    fn find_import(&self, path: &str) -> Option<PathBuf> {
        let candidates = [format!("{path}.xmd"), format!("{path}.xm"), path.to_owned()];
        let dirs: Vec<PathBuf> = if Path::new(path).is_absolute() {
            vec![PathBuf::new()]
        } else {
            self.config
                .import_paths
                .iter()
                .map(|dir| self.resolve(dir))
                .collect()
        };
        dirs.iter()
            .flat_map(|dir| candidates.iter().map(move |c| dir.join(c)))
            .find(|p| p.is_file())
    }

    /// Run another script file in this environment.
    fn import(&mut self, path: &str) -> Result<Flow, EvalError> {
        self.check_file_access("import")?;
        let file = self
            .find_import(path)
            .ok_or_else(|| EvalError::new(format!("Cannot find import '{path}'")))?;
        let key = fs::canonicalize(&file).unwrap_or_else(|_| file.clone());
        if self.imports.contains(&key) {
            return Err(EvalError::new(format!("Circular import of '{path}'")));
        }
        let size = fs::metadata(&file).map(|m| m.len()).unwrap_or(0);
        if size > MAX_IMPORT_SIZE {
            return Err(EvalError::new(format!(
                "Import '{path}' is larger than {MAX_IMPORT_SIZE} bytes"
            )));
        }
        let src = fs::read_to_string(&file)
            .map_err(|e| EvalError::new(format!("Cannot read import '{path}': {e}")))?;

        log::debug!("importing {}", file.display());
        let mut parser = Parser::new(&src).with_filename(file.display().to_string());
        let program = parser.parse_program();
        for err in parser.errors() {
            log::warn!("{}: {err}", file.display());
        }

        self.imports.push(key);
        let result = self.exec_block(program.statements());
        self.imports.pop();
        result.map(|_| None)
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn binary(op: BinOp, l: &AstValue, r: &AstValue) -> Result<AstValue, EvalError> {
    use std::cmp::Ordering::{Greater, Less};
    Ok(match op {
        BinOp::Add => l.arith_add(r)?,
        BinOp::Sub => l.arith_sub(r)?,
        BinOp::Mul => l.arith_mul(r)?,
        BinOp::Div => l.arith_div(r)?,
        BinOp::Rem => l.arith_rem(r)?,
        BinOp::Eq => AstValue::Boolean(l.loose_eq(r)),
        BinOp::Ne => AstValue::Boolean(!l.loose_eq(r)),
        BinOp::Lt => AstValue::Boolean(l.cmp_value(r)? == Less),
        BinOp::Le => AstValue::Boolean(l.cmp_value(r)? != Greater),
        BinOp::Gt => AstValue::Boolean(l.cmp_value(r)? == Greater),
        BinOp::Ge => AstValue::Boolean(l.cmp_value(r)? != Less),
        BinOp::And => AstValue::Boolean(l.is_truthy() && r.is_truthy()),
        BinOp::Or => AstValue::Boolean(l.is_truthy() || r.is_truthy()),
    })
}

fn compound(op: AssignOp, current: &AstValue, rhs: &AstValue) -> Result<AstValue, EvalError> {
    match op {
        AssignOp::Set => Ok(rhs.clone()),
        AssignOp::Add => current.arith_add(rhs),
        AssignOp::Sub => current.arith_sub(rhs),
        AssignOp::Mul => current.arith_mul(rhs),
        AssignOp::Div => current.arith_div(rhs),
        AssignOp::Rem => current.arith_rem(rhs),
    }
}

/// `target[index]` for arrays, strings and objects.
fn index_into(target: &AstValue, index: &AstValue) -> Result<AstValue, EvalError> {
    match target {
        AstValue::Array(items) => {
            let i = array_index(index, items.len())?;
            Ok(items[i].clone())
        }
        AstValue::String(s) => {
            let len = s.chars().count();
            let i = array_index(index, len)?;
            Ok(s.chars().nth(i).map(|c| AstValue::String(c.to_string())).unwrap_or_default())
        }
        AstValue::Object(_) => {
            let key = index.to_string();
            target
                .get(&key)
                .cloned()
                .ok_or_else(|| EvalError::new(format!("Property '{key}' not found in object")))
        }
        other => Err(EvalError::new(format!("Cannot index into {}", other.type_name()))),
    }
}

fn array_index(index: &AstValue, len: usize) -> Result<usize, EvalError> {
    let n = index
        .as_number()
        .ok_or_else(|| EvalError::new(format!("Array index must be a number, got {}", index.type_name())))?;
    if n < 0.0 || n.fract() != 0.0 || n as usize >= len {
        return Err(EvalError::new(format!(
            "Array index {} out of bounds (length {len})",
            crate::variable::format_number(n)
        )));
    }
    Ok(n as usize)
}

/// `items[0][1]` → `("items", ["0", "1"])`.
fn split_indices(part: &str) -> Option<(&str, Vec<&str>)> {
    let (name, mut rest) = match part.find('[') {
        Some(i) => (&part[..i], &part[i..]),
        None => (part, ""),
    };
    if name.is_empty() {
        return None;
    }
    let mut indices = Vec::new();
    while let Some(inner) = rest.strip_prefix('[') {
        let close = inner.find(']')?;
        indices.push(inner[..close].trim());
        rest = &inner[close + 1..];
    }
    rest.is_empty().then_some((name, indices))
}

fn list_dir(path: &Path) -> Vec<AstValue> {
    let entries = match fs::read_dir(path) {
        Ok(entries) => entries,
        Err(e) => {
            log::warn!("File.list {}: {e}", path.display());
            return Vec::new();
        }
    };
    let mut names: Vec<String> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names.into_iter().map(AstValue::String).collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::stmt::parse_program;

    fn run_with(ev: &mut Evaluator, src: &str) -> String {
        let (program, errors) = parse_program(src);
        assert!(errors.is_empty(), "parse errors: {errors:?}");
        ev.evaluate_program(&program)
    }

    fn run(src: &str) -> (String, Evaluator) {
        let mut ev = Evaluator::new();
        let out = run_with(&mut ev, src);
        (out, ev)
    }

    fn output(src: &str) -> String {
        let (out, ev) = run(src);
        assert!(!ev.has_error(), "unexpected error: {:?}", ev.error_message());
        out
    }

    fn num(ev: &Evaluator, name: &str) -> f64 {
        ev.variable(name).and_then(|v| v.as_number()).unwrap_or(f64::NAN)
    }

    #[test]
    fn print_concatenation() {
        assert_eq!(output("set name = \"World\"\nprint(\"Hello \" + name)"), "Hello World\n");
    }

    #[test]
    fn print_without_parens_interpolates() {
        assert_eq!(output("set name \"Ada\"\nprint Hello {{name}}!"), "Hello Ada!\n");
    }

    #[test]
    fn for_loop_accumulates() {
        let (_, ev) = run("set arr = [\"a\", \"b\", \"c\"]\nset result = \"\"\nfor item in arr { result += item }");
        assert_eq!(ev.variable("result"), Some(AstValue::string("abc")));
    }

    #[test]
    fn loop_times_counts() {
        let (_, ev) = run("set count = 0\nloop 3 times { count += 1 }");
        assert_eq!(num(&ev, "count"), 3.0);
    }

    #[test]
    fn range_is_inclusive_and_counts_down() {
        assert_eq!(output("for i in 1..5\n    print(i)"), "1\n2\n3\n4\n5\n");
        assert_eq!(output("for i in 3..1 print(i)"), "3\n2\n1\n");
    }

    #[test]
    fn empty_collection_runs_zero_times() {
        let (out, ev) = run("for x in [] { print(\"never\") }");
        assert_eq!(out, "");
        assert!(!ev.has_error());
        assert!(ev.variable("x").is_none());
    }

    #[test]
    fn undefined_collection_is_error() {
        let (_, ev) = run("for x in nothing_here { print(x) }");
        assert!(ev.has_error());
        assert!(ev.error_message().unwrap_or("").contains("nothing_here"));
    }

    #[test]
    fn break_is_consumed_by_loop() {
        let (out, ev) = run("set n = 0\nfor i in [1, 2, 3, 4, 5] { n += 1; if i == 3 { break } }\nprint(\"after\")");
        assert_eq!(num(&ev, "n"), 3.0);
        assert_eq!(out, "after\n");
    }

    #[test]
    fn continue_skips_rest_of_body() {
        assert_eq!(
            output("for i in 1..4\n    if i == 2\n        continue\n    print(i)"),
            "1\n3\n4\n"
        );
    }

    #[test]
    fn indexed_loop_and_object_keys() {
        assert_eq!(
            output("set items = [\"x\", \"y\"]\nfor i, item in items\n    print(i + \":\" + item)"),
            "0:x\n1:y\n"
        );
        assert_eq!(output("set o = {a: 1, b: 2}\nfor k in o { print(k) }"), "a\nb\n");
    }

    #[test]
    fn while_loop_and_iteration_guard() {
        let (_, ev) = run("set i = 0\nwhile i < 4 { i += 1 }");
        assert_eq!(num(&ev, "i"), 4.0);

        let mut cfg = Config::default();
        cfg.max_loop_iterations = 5;
        let mut ev = Evaluator::with_config(cfg);
        run_with(&mut ev, "set x = 0\nwhile true { x += 1 }");
        assert!(ev.has_error());
        assert!(ev.error_message().unwrap_or("").contains("maximum of 5"));
        assert_eq!(num(&ev, "x"), 5.0);
    }

    #[test]
    fn conditional_branches() {
        let src = "set x = 7\nif x > 10\n    print(\"big\")\nelif x > 5\n    print(\"mid\")\nelse\n    print(\"small\")";
        assert_eq!(output(src), "mid\n");
        assert_eq!(output("if \"\" then print(\"t\") else print(\"f\")"), "f\n");
    }

    #[test]
    fn ternary_skips_untaken_branch() {
        let (_, ev) = run("function bump() {\n  hits += 1\n  return 1\n}\nset r = true ? \"x\" : bump()");
        assert_eq!(ev.variable("r"), Some(AstValue::string("x")));
        assert!(ev.variable("hits").is_none());
    }

    #[test]
    fn try_catch_captures_and_clears() {
        let mut ev = Evaluator::new();
        let (program, _) = parse_program("try { throw \"boom\" } catch (e) { e }");
        let value = ev.evaluate(&program).unwrap();
        assert_eq!(value, AstValue::string("boom"));

        let (out, ev) = run("try { throw \"boom\" } catch (e) { print(\"caught \" + e) }\nprint(\"next\")");
        assert_eq!(out, "caught boom\nnext\n");
        assert!(!ev.has_error());
    }

    #[test]
    fn uncaught_error_stops_program_with_partial_output() {
        let (out, ev) = run("print(\"one\")\nthrow \"bad thing\"\nprint(\"two\")");
        assert_eq!(out, "one\n");
        assert!(ev.has_error());
        assert_eq!(ev.error_message(), Some("bad thing"));
    }

    #[test]
    fn directive_error_does_not_stop_document() {
        let loc = SourceLocation::new(1, 1);
        let (bad, _) = parse_program("throw \"inside\"");
        let doc = AstNode::new(
            Node::Program(vec![
                AstNode::new(Node::Directive(bad.statements().to_vec()), loc.clone()),
                AstNode::new(Node::Text("after".into()), loc),
            ]),
            SourceLocation::new(1, 1),
        );
        let mut ev = Evaluator::new();
        assert_eq!(ev.evaluate_program(&doc), "after");
        assert_eq!(ev.error_message(), Some("inside"));
    }

    #[test]
    fn functions_return_and_restore_params() {
        let src = "set name = \"outer\"\nfunction greet name\n    return \"Hello \" + name\nprint(greet(\"Bob\"))\nprint(name)";
        assert_eq!(output(src), "Hello Bob\nouter\n");
    }

    #[test]
    fn recursion_and_depth_limit() {
        let fact = "function fact(n) {\n  if n <= 1 { return 1 }\n  return n * fact(n - 1)\n}\nprint(fact(5))";
        assert_eq!(output(fact), "120\n");

        let mut cfg = Config::default();
        cfg.max_recursion_depth = 10;
        let mut ev = Evaluator::with_config(cfg);
        run_with(&mut ev, "function down(n) {\n  return down(n + 1)\n}\ndown(0)");
        assert!(ev.error_message().unwrap_or("").contains("recursion depth"));
    }

    #[test]
    fn arity_mismatch_yields_empty() {
        assert_eq!(output("function add(a, b) { return a + b }\nprint(\"[\" + add(1) + \"]\")"), "[]\n");
    }

    #[test]
    fn undefined_function_is_error() {
        let (_, ev) = run("nope(1)");
        assert!(ev.error_message().unwrap_or("").contains("Undefined function 'nope'"));
    }

    #[test]
    fn lambdas_are_callable() {
        assert_eq!(output("set double = x => x * 2\nprint(double(4))"), "8\n");
        assert_eq!(output("set add = (a, b) => a + b\nprint(add(2, 3))"), "5\n");
    }

    #[test]
    fn class_methods_and_privacy() {
        let src = "class Greeter\n    hello name\n        return \"Hi \" + Greeter.suffix(name)\n    private suffix s\n        return s + \"!\"\nprint(Greeter.hello(\"Bo\"))";
        assert_eq!(output(src), "Hi Bo!\n");

        let (_, ev) = run("class Vault\n    private secret\n        return 42\nVault.secret()");
        assert!(ev.error_message().unwrap_or("").contains("private"));
    }

    #[test]
    fn inherited_methods() {
        let src = "class Animal\n    speak\n        return \"...\"\nclass Dog extends Animal\n    wag\n        return \"wag\"\nprint(Dog.speak())";
        assert_eq!(output(src), "...\n");
    }

    #[test]
    fn object_access_and_errors() {
        assert_eq!(output("set user name \"Alice\", age 30\nprint(user.name)\nprint(user.age)"), "Alice\n30\n");
        let (_, ev) = run("print(missing.name)");
        assert_eq!(ev.error_message(), Some("Object variable 'missing' not found"));
        let (_, ev) = run("set n = 5\nprint(n.name)");
        assert_eq!(ev.error_message(), Some("Variable 'n' is not an object"));
        assert_eq!(output("set a = [1, 2, 3]\nprint(a.length)"), "3\n");
    }

    #[test]
    fn array_access_bounds() {
        assert_eq!(output("set a = [10, 20]\nprint(a[1])"), "20\n");
        let (_, ev) = run("set a = [10, 20]\nprint(a[2])");
        assert!(ev.error_message().unwrap_or("").contains("out of bounds"));
    }

    #[test]
    fn string_method_on_number_is_error() {
        let (_, ev) = run("set n = 5\nn.upper()");
        assert!(ev.has_error());
        assert!(ev.error_message().unwrap_or("").contains("requires a string"));
        assert_eq!(output("set s = \"a b\"\nprint(s.upper())\nprint(s.split().length)"), "A B\n2\n");
    }

    #[test]
    fn destructure_forms() {
        let (_, ev) = run("set items = [1, 2, 3, 4]\ndestructure items first, second, ...rest");
        assert_eq!(num(&ev, "first"), 1.0);
        assert_eq!(num(&ev, "second"), 2.0);
        assert_eq!(
            ev.variable("rest"),
            Some(AstValue::Array(vec![AstValue::Number(3.0), AstValue::Number(4.0)]))
        );

        let (_, ev) = run("set user name \"Al\", age 3\ndestructure user name n, email e");
        assert_eq!(ev.variable("n"), Some(AstValue::string("Al")));
        assert_eq!(ev.variable("e"), Some(AstValue::Null));
    }

    #[test]
    fn spread_in_arrays_and_calls() {
        assert_eq!(output("set a = [1, 2]\nset b = [0, ...a, 3]\nprint(b.length)"), "4\n");
        assert_eq!(output("set xs = [3, 9, 4]\nprint(max(...xs))"), "9\n");
    }

    #[test]
    fn text_and_placeholders() {
        assert_eq!(output("set who = \"you\"\nThanks, {{who}}."), "Thanks, you.\n");
        assert_eq!(output("Dear {{nobody}}."), "Dear {{nobody}}.\n");
        assert_eq!(output("Welcome"), "Welcome\n");
    }

    #[test]
    fn bare_word_calls_function() {
        assert_eq!(output("function hello() { return \"hi\" }\nhello"), "hi\n");
    }

    #[test]
    fn expression_statements_print_values() {
        assert_eq!(output("set x = 4\nx * 2"), "8\n");
        assert_eq!(output("set s = \"\"\ns"), "");
    }

    #[test]
    fn compound_on_undefined_starts_empty() {
        let (_, ev) = run("total += 5\nlabel += \"x\"");
        assert_eq!(num(&ev, "total"), 5.0);
        assert_eq!(ev.variable("label"), Some(AstValue::string("x")));
    }

    #[test]
    fn output_cap() {
        let mut cfg = Config::default();
        cfg.max_output_size = 8;
        let mut ev = Evaluator::with_config(cfg);
        let out = run_with(&mut ev, "print(\"1234\")\nprint(\"5678\")");
        assert_eq!(out, "1234\n");
        assert!(ev.error_message().unwrap_or("").contains("maximum size"));
    }

    #[test]
    fn generators_are_stubs() {
        assert_eq!(output("function* gen\n    yield 1\nprint(\"[\" + gen() + \"]\")"), "[]\n");
        let mut ev = Evaluator::new();
        let (program, _) = parse_program("yield 7");
        assert_eq!(ev.evaluate(&program).unwrap(), AstValue::Number(7.0));
    }

    #[test]
    fn json_round_trip() {
        assert_eq!(
            output("set o = json.parse(\"{\\\"a\\\": [1, 2]}\")\nprint(json.stringify(o))"),
            "{\"a\":[1,2]}\n"
        );
    }

    #[test]
    fn files_relative_to_base_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut ev = Evaluator::new();
        ev.set_base_dir(dir.path());
        let out = run_with(
            &mut ev,
            "File.write(\"note.txt\", \"hi\")\nprint(File.read(\"note.txt\"))\nprint(File.exists(\"note.txt\"))\nprint(File.list(\".\"))\nFile.delete(\"note.txt\")\nprint(File.exists(\"note.txt\"))",
        );
        assert!(!ev.has_error(), "{:?}", ev.error_message());
        assert_eq!(out, "hi\ntrue\n[note.txt]\nfalse\n");
    }

    #[test]
    fn file_access_can_be_disabled() {
        let mut cfg = Config::default();
        cfg.allow_file_access = false;
        let mut ev = Evaluator::with_config(cfg);
        run_with(&mut ev, "try { File.read(\"x\") } catch (e) { print(e) }");
        assert!(!ev.has_error());
        let mut ev2 = Evaluator::with_config(ev.config().clone());
        run_with(&mut ev2, "File.read(\"x\")");
        assert!(ev2.error_message().unwrap_or("").contains("disabled"));
    }

    #[test]
    fn import_shares_environment() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("lib.xmd"), "set greeting = \"hey\"\nfunction shout(s)\n    return s.upper()\n").unwrap();
        let mut ev = Evaluator::new();
        ev.set_base_dir(dir.path());
        let out = run_with(&mut ev, "import \"lib\"\nprint(shout(greeting))");
        assert!(!ev.has_error(), "{:?}", ev.error_message());
        assert_eq!(out, "HEY\n");
    }

    #[test]
    fn circular_import_is_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.xmd"), "import \"b\"\n").unwrap();
        fs::write(dir.path().join("b.xmd"), "import \"a\"\n").unwrap();
        let mut ev = Evaluator::new();
        ev.set_base_dir(dir.path());
        run_with(&mut ev, "import \"a\"");
        assert!(ev.error_message().unwrap_or("").contains("Circular import"));
    }

    #[test]
    fn reset_clears_everything() {
        let (_, mut ev) = run("set a = 1\nfunction f() { return 1 }\nthrow \"x\"");
        ev.reset();
        assert!(ev.variable("a").is_none());
        assert!(!ev.has_function("f"));
        assert!(!ev.has_error());
    }

    #[test]
    fn same_program_same_output() {
        let (program, _) = parse_program("set xs = [3, 1, 2]\nfor x in xs\n    print(x * 10)");
        let a = Evaluator::new().evaluate_program(&program);
        let b = Evaluator::new().evaluate_program(&program);
        assert_eq!(a, b);
    }
}
