//! Render target syntax tree
//!
//! A target such as `sumSeries(server{1,2}.load, scale(a.b, 2))` parses into
//! a tree of [`Expr`] nodes. Literals are only meaningful as function
//! arguments; every other node evaluates to a series slice.
//!
//! # Example
//!
//! ```rust
//! use kuba_graphite::query::{parse_target, Expr};
//!
//! let expr = parse_target("alias(a.b, \"AB\")").unwrap();
//! assert_eq!(
//!     expr,
//!     Expr::Func {
//!         name: "alias".to_string(),
//!         args: vec![
//!             Expr::SeriesList("a.b".to_string()),
//!             Expr::String("AB".to_string()),
//!         ],
//!     }
//! );
//! ```

use std::fmt;

// ============================================================================
// Expression Tree
// ============================================================================

/// One node of a parsed target
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// `true` / `false`
    Bool(bool),

    /// Numeric literal
    Number(f64),

    /// Quoted string, without quotes
    String(String),

    /// Metric path; a group evaluates to a comma-joined list of these
    SeriesList(String),

    /// `prefix{v1,v2}postfix`
    GroupSeries {
        /// Text before the brace group
        prefix: String,
        /// Alternatives inside the braces
        values: Vec<String>,
        /// Text after the brace group, may itself hold further groups
        postfix: String,
    },

    /// Function call; the name may be unknown until evaluation
    Func {
        /// Function name as written
        name: String,
        /// Arguments in call order
        args: Vec<Expr>,
    },
}

impl Expr {
    /// Bool, number and string nodes pass through evaluation untouched
    pub fn is_literal(&self) -> bool {
        matches!(self, Expr::Bool(_) | Expr::Number(_) | Expr::String(_))
    }

    /// The fetch name of a series node
    ///
    /// A group expands to `prefix+value+postfix` for each value, joined by
    /// `,`. Returns `None` for literals and function calls.
    pub fn series_name(&self) -> Option<String> {
        match self {
            Expr::SeriesList(name) => Some(name.clone()),
            Expr::GroupSeries {
                prefix,
                values,
                postfix,
            } => Some(
                values
                    .iter()
                    .map(|v| format!("{prefix}{v}{postfix}"))
                    .collect::<Vec<_>>()
                    .join(","),
            ),
            _ => None,
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Bool(b) => write!(f, "{b}"),
            Expr::Number(n) => write!(f, "{n}"),
            Expr::String(s) => write!(f, "{s:?}"),
            Expr::SeriesList(name) => f.write_str(name),
            Expr::GroupSeries {
                prefix,
                values,
                postfix,
            } => write!(f, "{prefix}{{{}}}{postfix}", values.join(",")),
            Expr::Func { name, args } => {
                write!(f, "{name}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str(")")
            }
        }
    }
}
