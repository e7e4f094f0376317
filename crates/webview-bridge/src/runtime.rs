//! Single-threaded async runtime glue
//!
//! All bridge logic runs on one thread: a tokio current-thread runtime
//! driving a [`LocalSet`]. Bridge state lives in `Rc`/`RefCell`, so every
//! task the bridge spawns is `!Send` and must go through [`spawn_local`].

use std::future::Future;
use tokio::runtime::{Builder, Runtime};
use tokio::task::{JoinHandle, LocalSet};

/// Build a current-thread runtime with timers enabled
pub fn new_runtime() -> std::io::Result<Runtime> {
    Builder::new_current_thread().enable_all().build()
}

/// Block the current thread on a future inside a fresh `LocalSet`
///
/// This is the usual entry point for an application hosting webviews:
///
/// ```no_run
/// webview_bridge::runtime::block_on(async {
///     // create webviews, bind functions, await evaluations
/// })
/// .unwrap();
/// ```
pub fn block_on<F>(future: F) -> std::io::Result<F::Output>
where
    F: Future,
{
    let runtime = new_runtime()?;
    let local_set = LocalSet::new();
    Ok(runtime.block_on(local_set.run_until(future)))
}

/// Spawn a `!Send` task on the current `LocalSet`
///
/// # Panics
/// Panics when called outside a `LocalSet` context (see [`block_on`]).
pub fn spawn_local<F>(future: F) -> JoinHandle<F::Output>
where
    F: Future + 'static,
    F::Output: 'static,
{
    tokio::task::spawn_local(future)
}
