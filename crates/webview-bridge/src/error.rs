//! Error types for the webview bridge

use crate::bridge::protocol::ErrorDescriptor;
use thiserror::Error;

/// Result type for operations on a webview handle
pub type WebViewResult<T> = Result<T, WebViewError>;

/// Errors raised synchronously by handle and bridge operations
#[derive(Debug, Error, Clone, PartialEq)]
pub enum WebViewError {
    /// Operation needs a live native handle but the webview is not created
    /// (or was already destroyed).
    #[error("WebView handle is null")]
    HandleAbsent,

    /// The native layer returned no handle from `create`.
    #[error("Failed to create native webview handle")]
    Creation,

    /// A binding name the native layer cannot represent.
    #[error("Invalid binding name {0:?}")]
    InvalidBindingName(String),
}

/// Failure outcomes of an outbound evaluation
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EvalError {
    /// No reply arrived before the evaluation timeout.
    #[error("Timeout")]
    Timeout,

    /// The webview was destroyed while the evaluation was pending.
    #[error("WebView destroyed")]
    Destroyed,

    /// The page-side script rejected.
    #[error("{}: {}", .0.name, .0.message)]
    Script(ErrorDescriptor),

    /// The reply value could not be decoded into the requested type.
    #[error("Failed to decode evaluation result: {0}")]
    Decode(String),
}

impl EvalError {
    /// Page-side error descriptor, if the script itself rejected
    pub fn descriptor(&self) -> Option<&ErrorDescriptor> {
        match self {
            EvalError::Script(descriptor) => Some(descriptor),
            _ => None,
        }
    }
}
