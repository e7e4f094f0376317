//! Handle lifecycle manager
//!
//! [`NativeWebView`] owns the native handle of one surface and the registry
//! of native callback tokens bound to it. It guarantees that:
//! - every operation except `create` fails with
//!   [`WebViewError::HandleAbsent`] while no handle exists
//! - no callback token outlives the handle it was bound to
//! - the non-blocking pump loop stops as soon as the handle is gone
//!
//! Lifecycle events (`Create`, `Closed`, `Destroy`) are delivered
//! synchronously to subscribers, after the state change is complete.

use crate::error::{WebViewError, WebViewResult};
use crate::runtime;
use crate::surface::{InboundCall, NativeSurface, RawHandle, ReturnStatus, Size, WindowRef};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use tokio::task::JoinHandle;

/// Phase transition of a webview instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    /// A native handle was created
    Create,
    /// The surface reported it was closed by the user or the platform
    Closed,
    /// The native handle was destroyed
    Destroy,
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleEvent::Create => write!(f, "create"),
            LifecycleEvent::Closed => write!(f, "closed"),
            LifecycleEvent::Destroy => write!(f, "destroy"),
        }
    }
}

type Listener = Rc<dyn Fn(LifecycleEvent)>;

struct Inner<S: NativeSurface> {
    surface: S,
    handle: Cell<Option<RawHandle>>,
    /// Bumped on every create and destroy; a pump task stops once it changes
    generation: Cell<u64>,
    callbacks: RefCell<HashMap<String, S::Token>>,
    listeners: RefCell<Vec<Listener>>,
}

/// Owner of one native webview handle
///
/// Cloning is cheap and yields another reference to the same handle; the
/// pump task holds one such clone.
pub struct NativeWebView<S: NativeSurface> {
    inner: Rc<Inner<S>>,
}

impl<S: NativeSurface> Clone for NativeWebView<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<S: NativeSurface + 'static> NativeWebView<S> {
    pub fn new(surface: S) -> Self {
        Self {
            inner: Rc::new(Inner {
                surface,
                handle: Cell::new(None),
                generation: Cell::new(0),
                callbacks: RefCell::new(HashMap::new()),
                listeners: RefCell::new(Vec::new()),
            }),
        }
    }

    /// The underlying surface implementation
    pub fn surface(&self) -> &S {
        &self.inner.surface
    }

    /// Current native handle, `None` before `create` and after `destroy`
    pub fn handle(&self) -> Option<RawHandle> {
        self.inner.handle.get()
    }

    pub fn is_created(&self) -> bool {
        self.handle().is_some()
    }

    /// Names currently bound on the native handle
    pub fn bound_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.callbacks.borrow().keys().cloned().collect();
        names.sort();
        names
    }

    fn require_handle(&self) -> WebViewResult<RawHandle> {
        self.inner.handle.get().ok_or(WebViewError::HandleAbsent)
    }

    fn bump_generation(&self) {
        self.inner.generation.set(self.inner.generation.get() + 1);
    }

    /// Register a lifecycle listener
    pub fn subscribe<F>(&self, listener: F)
    where
        F: Fn(LifecycleEvent) + 'static,
    {
        self.inner.listeners.borrow_mut().push(Rc::new(listener));
    }

    fn emit(&self, event: LifecycleEvent) {
        // Listeners may subscribe or call back into this webview.
        let listeners: Vec<Listener> = self.inner.listeners.borrow().clone();
        for listener in listeners {
            listener(event);
        }
    }

    /// Create the native handle; a no-op when one already exists
    pub fn create(&self, debug: bool, parent: Option<WindowRef>) -> WebViewResult<()> {
        if self.inner.handle.get().is_some() {
            return Ok(());
        }

        let handle = self
            .inner
            .surface
            .create(debug, parent)
            .ok_or(WebViewError::Creation)?;
        self.inner.handle.set(Some(handle));
        self.bump_generation();
        let devtools = debug;
        tracing::debug!(?handle, devtools, "native webview created");

        self.emit(LifecycleEvent::Create);
        Ok(())
    }

    /// Unbind and release every callback, then destroy the native handle
    ///
    /// A no-op when no handle exists. `Destroy` is emitted (when `emit` is
    /// set) only after cleanup, so listeners observe an absent handle.
    pub fn destroy(&self, emit: bool) {
        let Some(handle) = self.inner.handle.get() else {
            return;
        };

        let callbacks: Vec<(String, S::Token)> =
            self.inner.callbacks.borrow_mut().drain().collect();
        for (name, token) in callbacks {
            self.inner.surface.unbind(handle, &name);
            self.inner.surface.release(token);
        }

        self.inner.surface.terminate(handle);
        self.inner.surface.destroy(handle);
        self.inner.handle.set(None);
        self.bump_generation();
        tracing::debug!(?handle, "native webview destroyed");

        if emit {
            self.emit(LifecycleEvent::Destroy);
        }
    }

    /// Hand control to the native main loop until the surface closes
    ///
    /// Mutually exclusive with [`run_non_blocking`](Self::run_non_blocking).
    pub fn run(&self) -> WebViewResult<()> {
        let handle = self.require_handle()?;
        self.inner.surface.run(handle);
        self.destroy(true);
        Ok(())
    }

    /// Native top-level window hosting the webview
    pub fn window(&self) -> WebViewResult<Option<WindowRef>> {
        let handle = self.require_handle()?;
        Ok(self.inner.surface.window(handle))
    }

    pub fn set_title(&self, title: &str) -> WebViewResult<()> {
        let handle = self.require_handle()?;
        self.inner.surface.set_title(handle, title);
        Ok(())
    }

    pub fn set_size(&self, size: Size) -> WebViewResult<()> {
        let handle = self.require_handle()?;
        self.inner.surface.set_size(handle, size);
        Ok(())
    }

    pub fn navigate(&self, url: &str) -> WebViewResult<()> {
        let handle = self.require_handle()?;
        self.inner.surface.navigate(handle, url);
        Ok(())
    }

    pub fn set_html(&self, html: &str) -> WebViewResult<()> {
        let handle = self.require_handle()?;
        self.inner.surface.set_html(handle, html);
        Ok(())
    }

    /// Script run on every page load
    pub fn inject_script(&self, js: &str) -> WebViewResult<()> {
        let handle = self.require_handle()?;
        self.inner.surface.inject_script(handle, js);
        Ok(())
    }

    /// Script run in the current page right away
    pub fn evaluate_script(&self, js: &str) -> WebViewResult<()> {
        let handle = self.require_handle()?;
        self.inner.surface.evaluate_script(handle, js);
        Ok(())
    }

    /// Bind `name` to a native callback
    ///
    /// A previous binding under the same name is unbound and its token
    /// released before the new one is registered. Names that are empty or
    /// contain a NUL byte are rejected with [`WebViewError::InvalidBindingName`].
    pub fn bind<F>(&self, name: &str, callback: F, arg: Option<RawHandle>) -> WebViewResult<()>
    where
        F: Fn(InboundCall) + 'static,
    {
        let handle = self.require_handle()?;
        if name.is_empty() || name.contains('\0') {
            return Err(WebViewError::InvalidBindingName(name.to_string()));
        }

        let previous = self.inner.callbacks.borrow_mut().remove(name);
        if let Some(token) = previous {
            self.inner.surface.unbind(handle, name);
            self.inner.surface.release(token);
        }

        let token = self
            .inner
            .surface
            .bind(handle, name, Rc::new(callback), arg);
        self.inner
            .callbacks
            .borrow_mut()
            .insert(name.to_string(), token);
        tracing::debug!(name, "native binding registered");
        Ok(())
    }

    /// Remove the binding `name`; a no-op when it is not bound
    pub fn unbind(&self, name: &str) -> WebViewResult<()> {
        let handle = self.require_handle()?;

        let token = self.inner.callbacks.borrow_mut().remove(name);
        if let Some(token) = token {
            self.inner.surface.unbind(handle, name);
            self.inner.surface.release(token);
            tracing::debug!(name, "native binding removed");
        }
        Ok(())
    }

    /// Deliver the outcome of the inbound call `seq`
    pub fn return_result(&self, seq: &str, status: ReturnStatus, result: &str) -> WebViewResult<()> {
        let handle = self.require_handle()?;
        self.inner.surface.return_result(handle, seq, status, result);
        Ok(())
    }

    /// Advance the native message loop one step
    pub fn pump(&self, block: bool) -> WebViewResult<bool> {
        let handle = self.require_handle()?;
        Ok(self.inner.surface.pump(handle, block))
    }

    /// Drive the surface cooperatively from a local task
    ///
    /// Each scheduling quantum performs one non-blocking pump step and then
    /// yields. When the surface reports it is closed the task emits
    /// `Closed` and destroys the handle without emitting `Destroy`. When the
    /// handle is destroyed out-of-band the task simply stops, even if a new
    /// handle was created before its next step.
    ///
    /// # Panics
    /// Panics when called outside a `LocalSet` (see [`runtime::block_on`]).
    pub fn run_non_blocking(&self) -> WebViewResult<JoinHandle<()>> {
        self.require_handle()?;

        let webview = self.clone();
        let generation = self.inner.generation.get();
        Ok(runtime::spawn_local(async move {
            loop {
                if webview.inner.generation.get() != generation {
                    break;
                }
                match webview.pump(false) {
                    Ok(true) => tokio::task::yield_now().await,
                    Ok(false) => {
                        tracing::debug!("native surface closed");
                        webview.emit(LifecycleEvent::Closed);
                        webview.destroy(false);
                        break;
                    }
                    Err(_) => break,
                }
            }
        }))
    }
}

impl<S: NativeSurface> fmt::Debug for NativeWebView<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeWebView")
            .field("handle", &self.inner.handle.get())
            .field("callbacks", &self.inner.callbacks.borrow().len())
            .finish()
    }
}
