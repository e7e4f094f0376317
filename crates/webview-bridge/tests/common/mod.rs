//! Shared test utilities
//!
//! [`MockSurface`] is an in-memory [`NativeSurface`]: it records every call,
//! keeps bound callbacks, and delivers queued inbound calls on `pump`, the
//! way a real page would deliver them from the native message loop.

#![allow(dead_code)]

use serde_json::{json, Value};
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::rc::Rc;
use std::time::Duration;
use webview_bridge::{
    InboundCall, NativeCallback, NativeSurface, RawHandle, ReturnStatus, Size, WindowRef,
};

/// Reply a mock page gives to one evaluated script
pub type EvalResponder = Rc<dyn Fn(&str) -> Option<Result<Value, Value>>>;

/// Token handed out by [`MockSurface::bind`]
#[derive(Debug, PartialEq, Eq)]
pub struct MockToken(pub u64);

/// One `return_result` delivered by the bridge
#[derive(Debug, Clone, PartialEq)]
pub struct Returned {
    pub seq: String,
    pub status: ReturnStatus,
    pub result: String,
}

impl Returned {
    /// Decoded result payload
    pub fn payload(&self) -> Value {
        serde_json::from_str(&self.result).expect("result payload is JSON")
    }
}

#[derive(Default)]
struct MockState {
    next_handle: Cell<usize>,
    next_token: Cell<u64>,
    next_seq: Cell<u64>,
    fail_create: Cell<bool>,
    open: Cell<bool>,
    pumps: Cell<usize>,
    log: RefCell<Vec<String>>,
    bindings: RefCell<HashMap<String, (NativeCallback, Option<RawHandle>)>>,
    live_tokens: RefCell<Vec<u64>>,
    released: RefCell<Vec<u64>>,
    returned: RefCell<Vec<Returned>>,
    evaluated: RefCell<Vec<String>>,
    inbound: RefCell<VecDeque<(String, InboundCall)>>,
    responder: RefCell<Option<EvalResponder>>,
}

/// In-memory native surface
///
/// Clones share state, so a test keeps one clone for inspection while the
/// webview owns another.
#[derive(Clone, Default)]
pub struct MockSurface {
    state: Rc<MockState>,
}

impl MockSurface {
    pub fn new() -> Self {
        let surface = Self::default();
        surface.state.next_handle.set(0x1000);
        surface
    }

    /// Make the next `create` return no handle
    pub fn fail_create(&self) {
        self.state.fail_create.set(true);
    }

    /// Report the surface closed on the next pump step
    pub fn close(&self) {
        self.state.open.set(false);
    }

    /// Answer evaluated scripts the way a page would
    pub fn respond_to_evaluations<F>(&self, responder: F)
    where
        F: Fn(&str) -> Option<Result<Value, Value>> + 'static,
    {
        *self.state.responder.borrow_mut() = Some(Rc::new(responder));
    }

    /// Queue a page-side call on `binding`; delivered on the next pump step
    pub fn queue_call(&self, binding: &str, request: &str) -> String {
        let seq = self.state.next_seq.get() + 1;
        self.state.next_seq.set(seq);
        let seq = seq.to_string();
        self.state.inbound.borrow_mut().push_back((
            binding.to_string(),
            InboundCall {
                seq: seq.clone(),
                request: request.to_string(),
                arg: None,
            },
        ));
        seq
    }

    /// Queue a page-side call of the bridge binding
    pub fn call(&self, request: Value) -> String {
        self.queue_call("__call", &request.to_string())
    }

    /// Invoke a bound callback right away, outside the pump
    pub fn invoke(&self, binding: &str, request: &str) -> bool {
        let callback = self.state.bindings.borrow().get(binding).cloned();
        match callback {
            Some((callback, arg)) => {
                callback(InboundCall {
                    seq: "direct".to_string(),
                    request: request.to_string(),
                    arg,
                });
                true
            }
            None => false,
        }
    }

    /// Queue an evaluation reply
    pub fn reply(&self, request_id: &str, outcome: Result<Value, Value>) {
        let request = match outcome {
            Ok(value) => json!(["__evalReply", request_id, null, value]),
            Err(error) => json!(["__evalReply", request_id, error]),
        };
        self.call(request);
    }

    pub fn log(&self) -> Vec<String> {
        self.state.log.borrow().clone()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.state.log.borrow().iter().filter(|e| *e == entry).count()
    }

    pub fn pumps(&self) -> usize {
        self.state.pumps.get()
    }

    pub fn bound(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state.bindings.borrow().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn live_tokens(&self) -> usize {
        self.state.live_tokens.borrow().len()
    }

    pub fn released(&self) -> Vec<u64> {
        self.state.released.borrow().clone()
    }

    pub fn returned(&self) -> Vec<Returned> {
        self.state.returned.borrow().clone()
    }

    /// Result delivered for `seq`, if any
    pub fn returned_for(&self, seq: &str) -> Option<Returned> {
        self.state
            .returned
            .borrow()
            .iter()
            .find(|r| r.seq == seq)
            .cloned()
    }

    pub fn evaluated(&self) -> Vec<String> {
        self.state.evaluated.borrow().clone()
    }

    fn record(&self, entry: impl Into<String>) {
        self.state.log.borrow_mut().push(entry.into());
    }
}

/// Request id embedded in a wrapped evaluation script
pub fn request_id_of(script: &str) -> Option<String> {
    let marker = r#"__call("__evalReply", ""#;
    let start = script.find(marker)? + marker.len();
    let end = script[start..].find('"')?;
    Some(script[start..start + end].to_string())
}

impl NativeSurface for MockSurface {
    type Token = MockToken;

    fn create(&self, debug: bool, _parent: Option<WindowRef>) -> Option<RawHandle> {
        self.record(format!("create:{}", debug));
        if self.state.fail_create.get() {
            return None;
        }
        let address = self.state.next_handle.get();
        self.state.next_handle.set(address + 0x10);
        self.state.open.set(true);
        RawHandle::from_raw(address)
    }

    fn terminate(&self, _handle: RawHandle) {
        self.record("terminate");
    }

    fn destroy(&self, _handle: RawHandle) {
        self.record("destroy");
        self.state.bindings.borrow_mut().clear();
        self.state.open.set(false);
    }

    fn run(&self, _handle: RawHandle) {
        self.record("run");
    }

    fn pump(&self, _handle: RawHandle, _block: bool) -> bool {
        self.state.pumps.set(self.state.pumps.get() + 1);

        let next = self.state.inbound.borrow_mut().pop_front();
        if let Some((binding, call)) = next {
            let callback = self.state.bindings.borrow().get(&binding).cloned();
            if let Some((callback, arg)) = callback {
                callback(InboundCall { arg, ..call });
            }
        }
        self.state.open.get()
    }

    fn window(&self, handle: RawHandle) -> Option<WindowRef> {
        RawHandle::from_raw(handle.address() + 1)
    }

    fn set_title(&self, _handle: RawHandle, title: &str) {
        self.record(format!("set_title:{}", title));
    }

    fn set_size(&self, _handle: RawHandle, size: Size) {
        self.record(format!(
            "set_size:{}x{}:{}",
            size.width,
            size.height,
            size.hint.code()
        ));
    }

    fn navigate(&self, _handle: RawHandle, url: &str) {
        self.record(format!("navigate:{}", url));
    }

    fn set_html(&self, _handle: RawHandle, html: &str) {
        self.record(format!("set_html:{}", html));
    }

    fn inject_script(&self, _handle: RawHandle, js: &str) {
        self.record(format!("init:{}", js));
    }

    fn evaluate_script(&self, _handle: RawHandle, js: &str) {
        self.record("eval");
        self.state.evaluated.borrow_mut().push(js.to_string());

        let responder = self.state.responder.borrow().clone();
        if let (Some(responder), Some(id)) = (responder, request_id_of(js)) {
            if let Some(outcome) = responder(js) {
                self.reply(&id, outcome);
            }
        }
    }

    fn bind(
        &self,
        _handle: RawHandle,
        name: &str,
        callback: NativeCallback,
        arg: Option<RawHandle>,
    ) -> MockToken {
        self.record(format!("bind:{}", name));
        self.state
            .bindings
            .borrow_mut()
            .insert(name.to_string(), (callback, arg));

        let token = self.state.next_token.get() + 1;
        self.state.next_token.set(token);
        self.state.live_tokens.borrow_mut().push(token);
        MockToken(token)
    }

    fn unbind(&self, _handle: RawHandle, name: &str) {
        self.record(format!("unbind:{}", name));
        self.state.bindings.borrow_mut().remove(name);
    }

    fn release(&self, token: MockToken) {
        self.state.live_tokens.borrow_mut().retain(|t| *t != token.0);
        self.state.released.borrow_mut().push(token.0);
    }

    fn return_result(&self, _handle: RawHandle, seq: &str, status: ReturnStatus, result: &str) {
        self.state.returned.borrow_mut().push(Returned {
            seq: seq.to_string(),
            status,
            result: result.to_string(),
        });
    }
}

/// Run a future inside a `LocalSet` on the current test runtime
pub async fn local<F: Future>(future: F) -> F::Output {
    tokio::task::LocalSet::new().run_until(future).await
}

/// Yield until `condition` holds; panics after one second
pub async fn wait_until<F: Fn() -> bool>(condition: F) {
    let result = tokio::time::timeout(Duration::from_secs(1), async {
        while !condition() {
            tokio::task::yield_now().await;
        }
    })
    .await;
    assert!(result.is_ok(), "condition not reached within one second");
}

/// Let spawned local tasks run for a few scheduling rounds
pub async fn settle() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}
