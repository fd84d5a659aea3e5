//! Render target language
//!
//! # Architecture
//!
//! ```text
//! target string
//!      │
//!      ▼
//! ┌─────────────┐
//! │    Lex      │  nom tokenizer, function names resolved to FUNC
//! └─────────────┘
//!      │
//!      ▼
//! ┌─────────────┐
//! │   Parse     │  recursive descent → Expr
//! └─────────────┘
//!      │
//!      ▼
//! ┌─────────────┐
//! │  Evaluate   │  parallel argument workers, storage fetch at leaves
//! └─────────────┘
//!      │
//!      ▼
//!  SeriesSlice per target
//! ```
//!
//! # Example
//!
//! ```rust
//! use kuba_graphite::query::{parse_target, Expr};
//!
//! let expr = parse_target("alias(a.b.c, \"label\")").unwrap();
//! assert!(matches!(expr, Expr::Func { ref name, .. } if name == "alias"));
//! ```

pub mod ast;
pub mod eval;
pub mod functions;
pub mod lexer;
pub mod parser;

pub use ast::Expr;
pub use eval::{eval_expr, eval_targets, EvalContext};
pub use parser::parse_target;
