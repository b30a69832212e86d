//! XMD: markdown documents with embedded scripting directives.
//!
//! ```rust
//! use xmd::processor::Processor;
//!
//! let mut p = Processor::default();
//! let out = p.process("<!-- xmd: set name = \"World\" -->Hello {{name}}!");
//! assert_eq!(out, "Hello World!");
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod lexer;
pub mod processor;
pub mod script;
pub mod store;
pub mod variable;

pub use config::Config;
pub use error::{EvalError, ParseError, XmdError};
pub use processor::Processor;
pub use script::{AstNode, AstValue, Evaluator};
