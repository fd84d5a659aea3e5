//! Target evaluation
//!
//! Targets are parsed up front, then evaluated concurrently. Inside a
//! function call every non-literal argument gets its own worker; results
//! come back in argument order and the first failure wins.

use super::ast::Expr;
use super::functions::{self, Arg, Call};
use super::parser::parse_target;
use crate::engine::fanout::fan_out;
use crate::engine::traits::SeriesReader;
use crate::error::{Error, Result};
use crate::series::SeriesSlice;
use crate::types::Timestamp;
use chrono::{DateTime, FixedOffset, Offset, Utc};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::sync::Arc;
use tracing::debug;

/// Request-scoped evaluation parameters
#[derive(Debug, Clone)]
pub struct EvalContext {
    /// Inclusive lower bound, unix seconds
    pub from: Timestamp,
    /// Inclusive upper bound, unix seconds
    pub until: Timestamp,
    /// Reference for relative time arguments
    pub now: DateTime<Utc>,
    /// Zone for absolute time arguments
    pub location: FixedOffset,
}

impl EvalContext {
    /// Context for `[from, until]` at the current time in UTC
    pub fn new(from: Timestamp, until: Timestamp) -> Self {
        Self {
            from,
            until,
            now: Utc::now(),
            location: Utc.fix(),
        }
    }

    /// Pin the reference time
    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    /// Use a different zone for absolute times
    pub fn with_location(mut self, location: FixedOffset) -> Self {
        self.location = location;
        self
    }
}

/// Evaluate every target, preserving input order
///
/// All targets are parsed before any fetch is issued, so a malformed
/// target never costs a storage round trip.
pub async fn eval_targets(
    reader: Arc<dyn SeriesReader>,
    targets: &[String],
    context: EvalContext,
) -> Result<Vec<SeriesSlice>> {
    let exprs = targets
        .iter()
        .map(|t| parse_target(t))
        .collect::<Result<Vec<_>>>()?;
    debug!(targets = exprs.len(), from = context.from, until = context.until, "evaluating");

    let context = Arc::new(context);
    let tasks: Vec<_> = exprs
        .into_iter()
        .map(|expr| eval_target(Arc::clone(&reader), Arc::clone(&context), expr))
        .collect();
    fan_out(tasks).await
}

fn eval_target(
    reader: Arc<dyn SeriesReader>,
    context: Arc<EvalContext>,
    expr: Expr,
) -> BoxFuture<'static, Result<SeriesSlice>> {
    if expr.is_literal() {
        let message = format!("target {expr} is a literal, not a series expression");
        return async move { Err(Error::argument("render", message)) }.boxed();
    }
    eval_expr(reader, context, expr)
}

/// Evaluate one non-literal expression
pub fn eval_expr(
    reader: Arc<dyn SeriesReader>,
    context: Arc<EvalContext>,
    expr: Expr,
) -> BoxFuture<'static, Result<SeriesSlice>> {
    async move {
        match expr {
            Expr::Func { name, args } => invoke(reader, context, name, args).await,
            other => match other.series_name() {
                Some(fetch_name) => reader.fetch(&fetch_name, context.from, context.until).await,
                None => Err(Error::General(format!("cannot evaluate {other}"))),
            },
        }
    }
    .boxed()
}

async fn invoke(
    reader: Arc<dyn SeriesReader>,
    context: Arc<EvalContext>,
    name: String,
    args: Vec<Expr>,
) -> Result<SeriesSlice> {
    let function =
        functions::lookup(&name).ok_or_else(|| Error::UnsupportedFunction(name.clone()))?;

    let mut slots: Vec<Option<Arg>> = Vec::with_capacity(args.len());
    let mut pending = Vec::new();
    for arg in args {
        match arg {
            Expr::Bool(b) => slots.push(Some(Arg::Bool(b))),
            Expr::Number(n) => slots.push(Some(Arg::Number(n))),
            Expr::String(s) => slots.push(Some(Arg::String(s))),
            series => {
                pending.push(eval_expr(Arc::clone(&reader), Arc::clone(&context), series));
                slots.push(None);
            }
        }
    }

    let mut resolved = fan_out(pending).await?.into_iter();
    let args = slots
        .into_iter()
        .map(|slot| match slot {
            Some(arg) => Ok(arg),
            None => resolved
                .next()
                .map(|slice| Arg::Series {
                    name: slice.formatted_name(),
                    slice,
                })
                .ok_or_else(|| Error::General(format!("{name}: missing evaluated argument"))),
        })
        .collect::<Result<Vec<_>>>()?;

    function(Call::new(&name, args, &context))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expand::expand_names;
    use crate::series::ValueSeries;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serves fixed series by name and counts fetches
    #[derive(Default)]
    struct FixedReader {
        series: HashMap<String, ValueSeries>,
        fetches: AtomicUsize,
    }

    impl FixedReader {
        fn with(mut self, name: &str, values: &[f64]) -> Self {
            self.series
                .insert(name.to_string(), ValueSeries::new(name, values.to_vec(), 60, 60));
            self
        }
    }

    #[async_trait]
    impl SeriesReader for FixedReader {
        async fn fetch(&self, name: &str, _from: Timestamp, _until: Timestamp) -> Result<SeriesSlice> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            let mut names = expand_names(name);
            names.sort();
            Ok(names
                .iter()
                .filter_map(|n| self.series.get(n).cloned())
                .collect())
        }
    }

    fn reader() -> Arc<FixedReader> {
        Arc::new(
            FixedReader::default()
                .with("a.x", &[1.0, 2.0, 3.0])
                .with("a.y", &[10.0, 20.0, 30.0]),
        )
    }

    async fn eval(reader: Arc<FixedReader>, targets: &[&str]) -> Result<Vec<SeriesSlice>> {
        let targets: Vec<String> = targets.iter().map(|t| t.to_string()).collect();
        eval_targets(reader, &targets, EvalContext::new(0, 600)).await
    }

    #[tokio::test]
    async fn test_plain_and_grouped_series() {
        let results = eval(reader(), &["a.x", "a.{x,y}"]).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].len(), 1);
        assert_eq!(results[1].len(), 2);
        assert_eq!(results[1].formatted_name(), "a.x,a.y");
    }

    #[tokio::test]
    async fn test_top_level_comma_list_is_a_parse_error() {
        let reader = reader();
        let err = eval(reader.clone(), &["a.x,a.y"]).await.unwrap_err();
        assert!(matches!(err, Error::Parser { column: 4, .. }));
        assert_eq!(reader.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_nested_functions() {
        let results = eval(reader(), &["scale(sumSeries(a.{x,y}), 2)"]).await.unwrap();
        let series = &results[0][0];
        assert_eq!(series.name(), "scale(sumSeries(a.x,a.y),2)");
        assert_eq!(series.values(), &[22.0, 44.0, 66.0]);
    }

    #[tokio::test]
    async fn test_arguments_keep_their_positions() {
        let results = eval(reader(), &["divideSeries(a.y, a.x)"]).await.unwrap();
        assert_eq!(results[0][0].values(), &[10.0, 10.0, 10.0]);

        let results = eval(reader(), &["alias(a.x, \"first\")"]).await.unwrap();
        assert_eq!(results[0][0].alias(), "first");
    }

    #[tokio::test]
    async fn test_unknown_function_skips_fetch() {
        let reader = reader();
        let err = eval(reader.clone(), &["nope(a.x)"]).await.unwrap_err();
        assert!(matches!(err, Error::UnsupportedFunction(ref n) if n == "nope"));
        assert_eq!(reader.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_parse_error_skips_every_fetch() {
        let reader = reader();
        let err = eval(reader.clone(), &["a.x", "alias("]).await.unwrap_err();
        assert!(matches!(err, Error::Parser { .. }));
        assert_eq!(reader.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_literal_target_is_rejected() {
        let err = eval(reader(), &["42"]).await.unwrap_err();
        assert!(err.is_client_error());
    }

    #[tokio::test]
    async fn test_argument_error_from_nested_call() {
        let err = eval(reader(), &["alias(a.x)"]).await.unwrap_err();
        assert!(matches!(err, Error::Argument { ref func_name, .. } if func_name == "alias"));
    }
}
