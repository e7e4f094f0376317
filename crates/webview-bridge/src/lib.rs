//! Webview Bridge - bidirectional RPC between host code and a web page
//!
//! This library provides:
//! - A handle lifecycle manager over a native webview surface
//! - Page → host calls dispatched to bound Rust functions
//! - Host → page script evaluation returning futures
//! - An explicitly owned registry of live instances
//! - A backend over the C `webview` shared library
//!
//! Everything runs on one thread inside a tokio `LocalSet`; see [`runtime`].

/// Webview bridge version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Public API modules
pub mod bridge;
pub mod error;
pub mod ffi;
pub mod native;
pub mod registry;
pub mod runtime;
pub mod surface;

// Re-export commonly used types
pub use bridge::{
    BoundFunction, BridgeOptions, CallOutcome, ErrorDescriptor, Evaluation, Script, Thrown,
    WebView, DEFAULT_TIMEOUT,
};
pub use error::{EvalError, WebViewError, WebViewResult};
pub use ffi::{LibraryResolver, LoadError, WebviewLibrary};
pub use native::{LifecycleEvent, NativeWebView};
pub use registry::{InstanceId, InstanceRegistry};
pub use surface::{
    InboundCall, NativeCallback, NativeSurface, RawHandle, ReturnStatus, Size, SizeHint,
    WindowRef,
};
