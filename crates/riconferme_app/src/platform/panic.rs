//! Turns a panic inside the run into an ordinary error, so the on-wiki log
//! is still flushed afterwards.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use anyhow::{anyhow, Result};
use futures_util::FutureExt;

pub async fn catch_panic<T, F>(work: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match AssertUnwindSafe(work).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => Err(anyhow!("panicked: {}", panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown cause")
}
