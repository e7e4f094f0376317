//! Bidirectional call bridge
//!
//! [`WebView`] sits on top of a [`NativeWebView`] and runs two protocols
//! over its bind/return/eval primitives:
//!
//! - **Inbound** (page → host): one native binding, `__call`, receives
//!   `[method, ...args]`, dispatches to the [`FunctionTable`] and answers
//!   through `return_result`, with a per-call timeout.
//! - **Outbound** (host → page): [`WebView::evaluate`] injects a wrapped
//!   script and returns an [`Evaluation`] future, settled exactly once by
//!   the page reply, the timeout, or teardown.
//!
//! Teardown (`Destroy`, or `Closed` from the pump loop) fails every
//! pending evaluation with [`EvalError::Destroyed`].

pub mod functions;
pub mod protocol;

pub use functions::{BoundFunction, FunctionTable};
pub use protocol::{CallOutcome, CallRequest, ErrorDescriptor, Script, Thrown};

use crate::error::{EvalError, WebViewError, WebViewResult};
use crate::native::{LifecycleEvent, NativeWebView};
use crate::registry::{InstanceId, InstanceRegistry};
use crate::runtime;
use crate::surface::{InboundCall, NativeSurface, Size, WindowRef};
use futures_util::FutureExt;
use protocol::{CALL_BINDING, EVAL_REPLY};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use tokio::time::Instant;

/// Default timeout for inbound calls and outbound evaluations
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(60_000);

/// Construction options of a [`WebView`]
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeOptions {
    /// Enable the native developer tools
    pub debug: bool,
    /// Parent window to embed the surface into
    pub parent: Option<WindowRef>,
    /// Deadline for a bound function to settle, measured from dispatch
    pub call_timeout: Duration,
    /// Default deadline of [`WebView::evaluate`]
    pub eval_timeout: Duration,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            debug: false,
            parent: None,
            call_timeout: DEFAULT_TIMEOUT,
            eval_timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl BridgeOptions {
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_parent(mut self, parent: WindowRef) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn with_eval_timeout(mut self, timeout: Duration) -> Self {
        self.eval_timeout = timeout;
        self
    }
}

type EvalResult = Result<Value, EvalError>;

struct PendingEval {
    sender: oneshot::Sender<EvalResult>,
    timer: AbortHandle,
}

type Listener = Rc<dyn Fn(LifecycleEvent)>;

struct Shared<S: NativeSurface + 'static> {
    id: InstanceId,
    native: NativeWebView<S>,
    functions: FunctionTable,
    pending: RefCell<HashMap<String, PendingEval>>,
    listeners: RefCell<Vec<Listener>>,
    registry: InstanceRegistry,
    options: BridgeOptions,
}

/// A webview with a bidirectional call bridge
///
/// Dropping it destroys the native surface and fails pending evaluations.
pub struct WebView<S: NativeSurface + 'static> {
    shared: Rc<Shared<S>>,
}

impl<S: NativeSurface + 'static> WebView<S> {
    /// Build a webview over `surface` with default options
    pub fn new(surface: S, registry: &InstanceRegistry) -> Self {
        Self::with_options(surface, registry, BridgeOptions::default())
    }

    pub fn with_options(surface: S, registry: &InstanceRegistry, options: BridgeOptions) -> Self {
        let shared = Rc::new_cyclic(|weak: &Weak<Shared<S>>| {
            let native = NativeWebView::new(surface);
            let listener = weak.clone();
            native.subscribe(move |event| {
                if let Some(shared) = listener.upgrade() {
                    shared.on_native_event(event);
                }
            });

            let functions = FunctionTable::new();
            let replies = weak.clone();
            functions.insert(
                EVAL_REPLY,
                BoundFunction::from_fn(move |args| {
                    if let Some(shared) = replies.upgrade() {
                        shared.accept_reply(args);
                    }
                    Ok(Value::Null)
                }),
            );

            Shared {
                id: InstanceId::next(),
                native,
                functions,
                pending: RefCell::new(HashMap::new()),
                listeners: RefCell::new(Vec::new()),
                registry: registry.clone(),
                options,
            }
        });

        Self { shared }
    }

    pub fn id(&self) -> InstanceId {
        self.shared.id
    }

    /// The underlying handle lifecycle manager
    pub fn native(&self) -> &NativeWebView<S> {
        &self.shared.native
    }

    pub fn options(&self) -> &BridgeOptions {
        &self.shared.options
    }

    pub fn is_created(&self) -> bool {
        self.shared.native.is_created()
    }

    /// Register a lifecycle listener (`Create`, `Closed`, `Destroy`)
    pub fn on<F>(&self, listener: F)
    where
        F: Fn(LifecycleEvent) + 'static,
    {
        self.shared.listeners.borrow_mut().push(Rc::new(listener));
    }

    /// Create the native surface, bind the call dispatcher and start pumping
    ///
    /// A no-op when already created.
    ///
    /// # Panics
    /// Panics when called outside a `LocalSet` (see [`runtime::block_on`]).
    pub fn create(&self) -> WebViewResult<()> {
        if self.shared.native.is_created() {
            return Ok(());
        }

        let options = &self.shared.options;
        self.shared.native.create(options.debug, options.parent)?;

        let dispatcher = Rc::downgrade(&self.shared);
        self.shared.native.bind(
            CALL_BINDING,
            move |call| {
                if let Some(shared) = dispatcher.upgrade() {
                    shared.dispatch(call);
                }
            },
            None,
        )?;

        self.shared.native.run_non_blocking()?;
        Ok(())
    }

    /// Destroy the native surface; a no-op when not created
    pub fn destroy(&self) {
        self.shared.native.destroy(true);
    }

    pub fn set_title(&self, title: &str) -> WebViewResult<()> {
        self.shared.native.set_title(title)
    }

    pub fn set_size(&self, size: Size) -> WebViewResult<()> {
        self.shared.native.set_size(size)
    }

    pub fn set_html(&self, html: &str) -> WebViewResult<()> {
        self.shared.native.set_html(html)
    }

    pub fn set_url(&self, url: &str) -> WebViewResult<()> {
        self.shared.native.navigate(url)
    }

    /// Register script run on every page load
    pub fn inject_script(&self, js: &str) -> WebViewResult<()> {
        self.shared.native.inject_script(js)
    }

    /// Expose a typed host function to page script
    ///
    /// ```ignore
    /// webview.bind("greet", |(name,): (String,)| Ok::<_, Thrown>(format!("hi {}", name)));
    /// ```
    pub fn bind<A, R, E, F>(&self, name: &str, function: F)
    where
        A: DeserializeOwned + 'static,
        R: Serialize + 'static,
        E: Into<Thrown> + 'static,
        F: Fn(A) -> Result<R, E> + 'static,
    {
        self.bind_function(name, BoundFunction::typed(function));
    }

    /// Expose a typed async host function to page script
    pub fn bind_async<A, R, E, F, Fut>(&self, name: &str, function: F)
    where
        A: DeserializeOwned + 'static,
        R: Serialize + 'static,
        E: Into<Thrown> + 'static,
        F: Fn(A) -> Fut + 'static,
        Fut: Future<Output = Result<R, E>> + 'static,
    {
        self.bind_function(name, BoundFunction::typed_async(function));
    }

    /// Expose a prepared [`BoundFunction`]
    ///
    /// The reply channel name `__evalReply` is reserved and left untouched.
    pub fn bind_function(&self, name: &str, function: BoundFunction) {
        if name == EVAL_REPLY {
            tracing::warn!(name, "refusing to replace reserved bound function");
            return;
        }
        self.shared.functions.insert(name, function);
    }

    /// Remove a host function; `false` if it was not bound
    pub fn unbind(&self, name: &str) -> bool {
        name != EVAL_REPLY && self.shared.functions.remove(name).is_some()
    }

    pub fn is_bound(&self, name: &str) -> bool {
        self.shared.functions.contains(name)
    }

    /// Number of evaluations still waiting for a reply
    pub fn pending_evaluations(&self) -> usize {
        self.shared.pending.borrow().len()
    }

    /// Evaluate script in the page with the default timeout
    pub fn evaluate(&self, script: impl Into<Script>) -> WebViewResult<Evaluation> {
        self.evaluate_with_timeout(script, self.shared.options.eval_timeout)
    }

    /// Evaluate script in the page
    ///
    /// Fails immediately with [`WebViewError::HandleAbsent`] when the
    /// webview is not created. Otherwise the returned future resolves to the
    /// script's value, or fails with a script error, [`EvalError::Timeout`]
    /// or [`EvalError::Destroyed`].
    ///
    /// # Panics
    /// Panics when called outside a `LocalSet` (see [`runtime::block_on`]).
    pub fn evaluate_with_timeout(
        &self,
        script: impl Into<Script>,
        timeout: Duration,
    ) -> WebViewResult<Evaluation> {
        if !self.shared.native.is_created() {
            return Err(WebViewError::HandleAbsent);
        }

        let script = script.into();
        let request_id = protocol::request_id();
        let (sender, receiver) = oneshot::channel();

        let expiry = Rc::downgrade(&self.shared);
        let expiring_id = request_id.clone();
        let timer = runtime::spawn_local(async move {
            tokio::time::sleep(timeout).await;
            if let Some(shared) = expiry.upgrade() {
                if shared.settle(&expiring_id, Err(EvalError::Timeout)) {
                    tracing::debug!(request_id = %expiring_id, "evaluation timed out");
                }
            }
        })
        .abort_handle();

        self.shared
            .pending
            .borrow_mut()
            .insert(request_id.clone(), PendingEval { sender, timer });

        let source = protocol::wrap_evaluation(&script, &request_id);
        if let Err(err) = self.shared.native.evaluate_script(&source) {
            let entry = self.shared.pending.borrow_mut().remove(&request_id);
            if let Some(entry) = entry {
                entry.timer.abort();
            }
            return Err(err);
        }

        Ok(Evaluation {
            request_id,
            receiver,
        })
    }

    /// Evaluate script and decode its value
    pub fn evaluate_as<T>(
        &self,
        script: impl Into<Script>,
    ) -> WebViewResult<impl Future<Output = Result<T, EvalError>>>
    where
        T: DeserializeOwned,
    {
        let evaluation = self.evaluate(script)?;
        Ok(async move {
            let value = evaluation.await?;
            serde_json::from_value(value).map_err(|e| EvalError::Decode(e.to_string()))
        })
    }
}

impl<S: NativeSurface + 'static> Shared<S> {
    fn emit(&self, event: LifecycleEvent) {
        let listeners: Vec<Listener> = self.listeners.borrow().clone();
        for listener in listeners {
            listener(event);
        }
    }

    fn on_native_event(&self, event: LifecycleEvent) {
        match event {
            LifecycleEvent::Create => {
                self.registry.insert(self.id);
                tracing::debug!(instance = %self.id, "webview created");
                self.emit(LifecycleEvent::Create);
            }
            LifecycleEvent::Closed => {
                self.emit(LifecycleEvent::Closed);
                self.teardown();
            }
            LifecycleEvent::Destroy => {
                self.emit(LifecycleEvent::Destroy);
                self.teardown();
            }
        }
    }

    /// Fail every pending evaluation and leave the registry
    fn teardown(&self) {
        let pending: Vec<(String, PendingEval)> = self.pending.borrow_mut().drain().collect();
        if !pending.is_empty() {
            tracing::debug!(instance = %self.id, count = pending.len(), "failing pending evaluations");
        }
        for (_, entry) in pending {
            entry.timer.abort();
            let _ = entry.sender.send(Err(EvalError::Destroyed));
        }
        self.registry.remove(self.id);
    }

    /// Settle one pending evaluation; `false` if it was already settled
    fn settle(&self, request_id: &str, outcome: EvalResult) -> bool {
        let entry = self.pending.borrow_mut().remove(request_id);
        match entry {
            Some(entry) => {
                entry.timer.abort();
                let _ = entry.sender.send(outcome);
                true
            }
            None => false,
        }
    }

    /// Handle `__evalReply(requestId, error, result)`
    fn accept_reply(&self, args: Vec<Value>) {
        let mut args = args.into_iter();
        let Some(Value::String(request_id)) = args.next() else {
            tracing::warn!("evaluation reply without a request id");
            return;
        };
        let error = args.next().unwrap_or(Value::Null);
        let result = args.next().unwrap_or(Value::Null);

        let outcome = if protocol::is_truthy(&error) {
            Err(EvalError::Script(ErrorDescriptor::from_value(&error)))
        } else {
            Ok(result)
        };

        if !self.settle(&request_id, outcome) {
            tracing::debug!(%request_id, "ignoring reply for settled evaluation");
        }
    }

    /// Run one inbound call and deliver its outcome
    fn dispatch(&self, call: InboundCall) {
        let InboundCall { seq, request, .. } = call;
        let deadline = Instant::now() + self.options.call_timeout;
        let target = protocol::decode_request(&request)
            .map(|request| (self.functions.get(&request.method), request));
        let native = self.native.clone();

        runtime::spawn_local(async move {
            let outcome = match target {
                Err(thrown) => Err(thrown),
                Ok((None, request)) => {
                    tracing::debug!(method = %request.method, "call to unbound function");
                    Err(ErrorDescriptor::reference_error(&request.method).into())
                }
                Ok((Some(function), request)) => invoke(function, request.args, deadline).await,
            };

            let (status, payload) = protocol::encode_outcome(outcome);
            if native.return_result(&seq, status, &payload).is_err() {
                tracing::debug!(%seq, "dropping call result for destroyed webview");
            }
        });
    }
}

/// Invoke a bound function, converting panics and timeouts into failures
async fn invoke(function: BoundFunction, args: Vec<Value>, deadline: Instant) -> CallOutcome {
    let call = AssertUnwindSafe(function.invoke(args)).catch_unwind();
    match tokio::time::timeout_at(deadline, call).await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(panic)) => {
            let message = if let Some(s) = panic.downcast_ref::<&str>() {
                s.to_string()
            } else if let Some(s) = panic.downcast_ref::<String>() {
                s.clone()
            } else {
                "Unknown error in bound method".to_string()
            };
            Err(ErrorDescriptor::error(message).into())
        }
        Err(_) => Err(ErrorDescriptor::timeout().into()),
    }
}

impl<S: NativeSurface + 'static> fmt::Debug for WebView<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebView")
            .field("id", &self.shared.id)
            .field("native", &self.shared.native)
            .field("functions", &self.shared.functions)
            .field("pending", &self.shared.pending.borrow().len())
            .finish()
    }
}

impl<S: NativeSurface + 'static> Drop for Shared<S> {
    fn drop(&mut self) {
        self.native.destroy(true);
        self.teardown();
    }
}

/// Outcome of one outbound evaluation
///
/// Resolves exactly once. Dropping it does not cancel the evaluation; the
/// entry is still cleared by its reply, timeout or teardown.
#[derive(Debug)]
pub struct Evaluation {
    request_id: String,
    receiver: oneshot::Receiver<EvalResult>,
}

impl Evaluation {
    /// Correlation id embedded in the injected script
    pub fn request_id(&self) -> &str {
        &self.request_id
    }
}

impl Future for Evaluation {
    type Output = EvalResult;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        Pin::new(&mut this.receiver)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(EvalError::Destroyed)))
    }
}
