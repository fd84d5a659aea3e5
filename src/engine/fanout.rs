//! Indexed fan-out / fan-in
//!
//! Each future runs on its own task and sends exactly one `(index, result)`
//! into a channel sized to the task count. The driver reads that many
//! messages and places every result at its index, so output order matches
//! input order. The first error is returned immediately; tasks still running
//! are left detached and their results dropped.

use crate::error::{Error, Result};
use std::future::Future;
use tokio::sync::mpsc;

/// Run `tasks` concurrently and collect their results in input order
pub async fn fan_out<T, F>(tasks: Vec<F>) -> Result<Vec<T>>
where
    F: Future<Output = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    let count = tasks.len();
    if count == 0 {
        return Ok(Vec::new());
    }

    let (tx, mut rx) = mpsc::channel::<(usize, Result<T>)>(count);
    for (index, task) in tasks.into_iter().enumerate() {
        let tx = tx.clone();
        tokio::spawn(async move {
            let result = task.await;
            // the driver may already have returned on an earlier error
            let _ = tx.send((index, result)).await;
        });
    }
    drop(tx);

    let mut slots: Vec<Option<T>> = (0..count).map(|_| None).collect();
    for _ in 0..count {
        match rx.recv().await {
            Some((index, Ok(value))) => slots[index] = Some(value),
            Some((_, Err(e))) => return Err(e),
            // a worker panicked before sending
            None => break,
        }
    }

    slots
        .into_iter()
        .enumerate()
        .map(|(index, slot)| {
            slot.ok_or_else(|| Error::General(format!("worker {index} exited without a result")))
        })
        .collect()
}
