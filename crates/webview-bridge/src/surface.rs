//! Native surface capability contract
//!
//! A [`NativeSurface`] is the platform collaborator that owns the real
//! rendering widget. The bridge never talks to a platform API directly; it
//! only calls through this trait, which keeps the lifecycle manager and the
//! call bridge testable against an in-memory surface.
//!
//! The operation set mirrors the C `webview` API:
//! - lifecycle: `create`, `terminate`, `destroy`, `run`, `pump`
//! - content: `navigate`, `set_html`, `set_title`, `set_size`
//! - scripting: `inject_script` (page load), `evaluate_script` (immediate)
//! - dispatch: `bind`, `unbind`, `release`, `return_result`

use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;

/// Opaque reference to one native object (a webview or a window)
///
/// Stored as an address so it can be copied freely; it is never
/// dereferenced outside the surface implementation that produced it.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawHandle(usize);

impl RawHandle {
    /// Wrap a native pointer, `None` when null
    pub fn from_ptr<T>(ptr: *mut T) -> Option<Self> {
        Self::from_raw(ptr as usize)
    }

    /// Wrap a raw address, `None` when zero
    pub const fn from_raw(address: usize) -> Option<Self> {
        if address == 0 {
            None
        } else {
            Some(Self(address))
        }
    }

    /// Raw address of the handle
    pub const fn address(self) -> usize {
        self.0
    }

    /// Native pointer of the handle
    pub fn as_ptr<T>(self) -> *mut T {
        self.0 as *mut T
    }
}

impl fmt::Debug for RawHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RawHandle({:#x})", self.0)
    }
}

/// Reference to a native top-level window
pub type WindowRef = RawHandle;

/// Size constraint applied by `set_size`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(i32)]
pub enum SizeHint {
    /// Width and height are the default size
    #[default]
    None = 0,
    /// Width and height are minimum bounds
    Min = 1,
    /// Width and height are maximum bounds
    Max = 2,
    /// Window size can not be changed by the user
    Fixed = 3,
}

impl SizeHint {
    /// Native integer code
    pub const fn code(self) -> i32 {
        self as i32
    }
}

/// Requested surface size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
    pub width: i32,
    pub height: i32,
    #[serde(default)]
    pub hint: SizeHint,
}

impl Size {
    pub fn new(width: i32, height: i32, hint: SizeHint) -> Self {
        Self {
            width,
            height,
            hint,
        }
    }
}

/// Status reported with a call result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ReturnStatus {
    Success = 0,
    Failure = 1,
}

impl ReturnStatus {
    /// Native integer code (0 = success, nonzero = failure)
    pub const fn code(self) -> i32 {
        self as i32
    }
}

/// One inbound call delivered by the native surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundCall {
    /// Native correlation id, echoed back through `return_result`
    pub seq: String,
    /// Serialized request payload (a JSON array)
    pub request: String,
    /// User argument supplied when the name was bound
    pub arg: Option<RawHandle>,
}

/// Host callback invoked for every inbound call on a bound name
pub type NativeCallback = Rc<dyn Fn(InboundCall)>;

/// Capability object implemented by a platform backend
///
/// All methods take an already-validated handle; the lifecycle manager
/// guarantees no method except `create` is called without one.
pub trait NativeSurface {
    /// Native-callable token produced by `bind`. The surface keeps the
    /// callback reachable until the token is passed to `release`.
    type Token;

    /// Create a new native webview, `None` on failure
    fn create(&self, debug: bool, parent: Option<WindowRef>) -> Option<RawHandle>;

    /// Stop the native main loop
    fn terminate(&self, handle: RawHandle);

    /// Release all native resources of the handle
    fn destroy(&self, handle: RawHandle);

    /// Run the native main loop until the surface is closed
    fn run(&self, handle: RawHandle);

    /// Advance the native message loop one step; `true` while still open
    fn pump(&self, handle: RawHandle, block: bool) -> bool;

    /// Native top-level window of the webview
    fn window(&self, handle: RawHandle) -> Option<WindowRef>;

    fn set_title(&self, handle: RawHandle, title: &str);

    fn set_size(&self, handle: RawHandle, size: Size);

    fn navigate(&self, handle: RawHandle, url: &str);

    fn set_html(&self, handle: RawHandle, html: &str);

    /// Register script to run on every page load, before `window.onload`
    fn inject_script(&self, handle: RawHandle, js: &str);

    /// Run script in the current page immediately
    fn evaluate_script(&self, handle: RawHandle, js: &str);

    /// Expose `name` to page script; calls are delivered to `callback`
    fn bind(
        &self,
        handle: RawHandle,
        name: &str,
        callback: NativeCallback,
        arg: Option<RawHandle>,
    ) -> Self::Token;

    /// Remove the page-side function `name`
    fn unbind(&self, handle: RawHandle, name: &str);

    /// Free a token returned by `bind`
    fn release(&self, token: Self::Token);

    /// Settle the page-side promise of the inbound call `seq`
    fn return_result(&self, handle: RawHandle, seq: &str, status: ReturnStatus, result: &str);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_handle_rejects_null() {
        assert!(RawHandle::from_raw(0).is_none());
        assert!(RawHandle::from_ptr(std::ptr::null_mut::<u8>()).is_none());
        assert_eq!(RawHandle::from_raw(0x10).map(RawHandle::address), Some(0x10));
    }

    #[test]
    fn test_size_hint_codes() {
        assert_eq!(SizeHint::None.code(), 0);
        assert_eq!(SizeHint::Min.code(), 1);
        assert_eq!(SizeHint::Max.code(), 2);
        assert_eq!(SizeHint::Fixed.code(), 3);
        assert_eq!(ReturnStatus::Failure.code(), 1);
    }
}
