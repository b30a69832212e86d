//! XMD scripting language.
//!
//! Scripts appear inside `<!-- xmd: ... -->` comments in a markdown document
//! or stand alone.  This module covers:
//!
//! - Statements: `set`, `if`/`elif`/`else`, `for`, `while`, `loop N times`,
//!   `function`, `class`, `try`/`catch`, `import`, `destructure`
//! - Expressions with arithmetic, comparison, logic, ternaries, lambdas and
//!   method calls
//! - `{{name}}` / `${name}` interpolation in text and string literals
//! - Built-in functions (string, math, `Date`, `json`, `yaml`) and `File.*`
//!
//! # Quick start
//!
//! ```rust
//! use xmd::script::{parse_program, Evaluator};
//!
//! let (program, errors) = parse_program("set x = 6\nprint(x * 7)");
//! assert!(errors.is_empty());
//! let mut ev = Evaluator::new();
//! assert_eq!(ev.evaluate_program(&program), "42\n");
//! ```

pub mod ast;
pub mod builtins;
pub mod expand;
pub mod expr;
pub mod interp;
pub mod stmt;
pub mod value;

// Re-exports for convenience.
pub use ast::{AstNode, Node, SourceLocation};
pub use interp::Evaluator;
pub use stmt::{parse_program, Parser};
pub use value::AstValue;
