//! Shared-library backend
//!
//! Loads the C `webview` library at runtime via `libloading` and exposes it
//! as a [`NativeSurface`](crate::surface::NativeSurface).
//!
//! # Safety
//!
//! All unsafe code of the crate lives in this module behind safe wrappers.

pub mod library;
pub mod loader;
pub mod marshal;

pub use library::{BindingToken, WebviewLibrary};
pub use loader::{platform_library_name, LibraryResolver, LoadError, WEBVIEW_PATH_ENV};
pub use marshal::MarshalError;
