//! [`NativeSurface`] backed by the C `webview` library
//!
//! Every symbol is resolved when the library is loaded, so a missing export
//! fails early with [`LoadError::SymbolNotFound`] instead of at first use.
//!
//! # Safety
//!
//! The library runs native code in this process. Handles passed to the
//! surface methods must come from `create` on the same library; the
//! lifecycle manager upholds this.

use crate::ffi::loader::{LibraryResolver, LoadError};
use crate::ffi::marshal::{from_c_str, to_c_string};
use crate::surface::{
    InboundCall, NativeCallback, NativeSurface, RawHandle, ReturnStatus, Size, WindowRef,
};
use libloading::Library;
use std::ffi::CString;
use std::fmt;
use std::os::raw::{c_char, c_int, c_void};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::rc::Rc;

type WebviewPtr = *mut c_void;
type BindFn = unsafe extern "C" fn(*const c_char, *const c_char, *mut c_void);

/// Resolved entry points of the library
#[derive(Clone, Copy)]
struct Api {
    create: unsafe extern "C" fn(c_int, *mut c_void) -> WebviewPtr,
    destroy: unsafe extern "C" fn(WebviewPtr),
    run: unsafe extern "C" fn(WebviewPtr),
    terminate: unsafe extern "C" fn(WebviewPtr),
    get_window: unsafe extern "C" fn(WebviewPtr) -> *mut c_void,
    set_title: unsafe extern "C" fn(WebviewPtr, *const c_char),
    set_size: unsafe extern "C" fn(WebviewPtr, c_int, c_int, c_int),
    navigate: unsafe extern "C" fn(WebviewPtr, *const c_char),
    set_html: unsafe extern "C" fn(WebviewPtr, *const c_char),
    init: unsafe extern "C" fn(WebviewPtr, *const c_char),
    eval: unsafe extern "C" fn(WebviewPtr, *const c_char),
    bind: unsafe extern "C" fn(WebviewPtr, *const c_char, BindFn, *mut c_void),
    unbind: unsafe extern "C" fn(WebviewPtr, *const c_char),
    pump_msgloop: unsafe extern "C" fn(WebviewPtr, c_int) -> c_int,
    return_result: unsafe extern "C" fn(WebviewPtr, *const c_char, c_int, *const c_char),
}

/// Copy one function pointer out of the library
///
/// # Safety
///
/// `T` must match the symbol's real signature.
unsafe fn symbol<T: Copy>(library: &Library, path: &Path, name: &str) -> Result<T, LoadError> {
    library
        .get::<T>(name.as_bytes())
        .map(|symbol| *symbol)
        .map_err(|_| LoadError::SymbolNotFound {
            library: path.display().to_string(),
            symbol: name.to_string(),
        })
}

impl Api {
    unsafe fn resolve(library: &Library, path: &Path) -> Result<Self, LoadError> {
        Ok(Self {
            create: symbol(library, path, "webview_create")?,
            destroy: symbol(library, path, "webview_destroy")?,
            run: symbol(library, path, "webview_run")?,
            terminate: symbol(library, path, "webview_terminate")?,
            get_window: symbol(library, path, "webview_get_window")?,
            set_title: symbol(library, path, "webview_set_title")?,
            set_size: symbol(library, path, "webview_set_size")?,
            navigate: symbol(library, path, "webview_navigate")?,
            set_html: symbol(library, path, "webview_set_html")?,
            init: symbol(library, path, "webview_init")?,
            eval: symbol(library, path, "webview_eval")?,
            bind: symbol(library, path, "webview_bind")?,
            unbind: symbol(library, path, "webview_unbind")?,
            pump_msgloop: symbol(library, path, "webview_pump_msgloop")?,
            return_result: symbol(library, path, "webview_return")?,
        })
    }
}

/// Heap state behind one native binding
struct BindingContext {
    name: String,
    callback: NativeCallback,
    arg: Option<RawHandle>,
}

/// Token returned by [`WebviewLibrary::bind`]
///
/// Owns the binding context until passed to `release`. Dropping a token
/// without releasing it leaks the context, which keeps a late native call
/// from reading freed memory.
pub struct BindingToken {
    context: *mut BindingContext,
}

impl fmt::Debug for BindingToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BindingToken({:p})", self.context)
    }
}

/// Entry point the library calls for every bound function invocation
unsafe extern "C" fn binding_trampoline(seq: *const c_char, req: *const c_char, arg: *mut c_void) {
    if arg.is_null() {
        return;
    }
    let context = &*(arg as *const BindingContext);
    let callback = Rc::clone(&context.callback);
    let call = InboundCall {
        seq: from_c_str(seq),
        request: from_c_str(req),
        arg: context.arg,
    };

    // Unwinding into C is undefined behavior.
    if catch_unwind(AssertUnwindSafe(|| callback(call))).is_err() {
        tracing::error!("bound callback panicked");
    }
}

/// A loaded `webview` library
pub struct WebviewLibrary {
    api: Api,
    path: PathBuf,
    _library: Library,
}

impl WebviewLibrary {
    /// Resolve and load the library
    pub fn open(resolver: &LibraryResolver) -> Result<Self, LoadError> {
        let path = resolver.resolve()?;
        Self::load(&path)
    }

    /// Load the library at `path`
    ///
    /// Loading runs the library's initialization code; the caller must trust
    /// the file.
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let library = unsafe {
            Library::new(path).map_err(|e| LoadError::LoadFailed {
                library: path.display().to_string(),
                message: e.to_string(),
            })?
        };
        let api = unsafe { Api::resolve(&library, path)? };
        tracing::info!(path = %path.display(), "loaded webview library");

        Ok(Self {
            api,
            path: path.to_path_buf(),
            _library: library,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Marshal `value` and run `f` with it, skipping `f` on interior NUL
    fn with_c_string(&self, value: &str, what: &'static str, f: impl FnOnce(&CString)) {
        match to_c_string(value, what) {
            Ok(c) => f(&c),
            Err(e) => tracing::warn!(error = %e, "skipping native call"),
        }
    }
}

impl fmt::Debug for WebviewLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebviewLibrary")
            .field("path", &self.path)
            .finish()
    }
}

impl NativeSurface for WebviewLibrary {
    type Token = BindingToken;

    fn create(&self, debug: bool, parent: Option<WindowRef>) -> Option<RawHandle> {
        let parent = parent.map_or(std::ptr::null_mut(), RawHandle::as_ptr::<c_void>);
        let handle = unsafe { (self.api.create)(c_int::from(debug), parent) };
        RawHandle::from_ptr(handle)
    }

    fn terminate(&self, handle: RawHandle) {
        unsafe { (self.api.terminate)(handle.as_ptr()) }
    }

    fn destroy(&self, handle: RawHandle) {
        unsafe { (self.api.destroy)(handle.as_ptr()) }
    }

    fn run(&self, handle: RawHandle) {
        unsafe { (self.api.run)(handle.as_ptr()) }
    }

    fn pump(&self, handle: RawHandle, block: bool) -> bool {
        unsafe { (self.api.pump_msgloop)(handle.as_ptr(), c_int::from(block)) != 0 }
    }

    fn window(&self, handle: RawHandle) -> Option<WindowRef> {
        RawHandle::from_ptr(unsafe { (self.api.get_window)(handle.as_ptr()) })
    }

    fn set_title(&self, handle: RawHandle, title: &str) {
        self.with_c_string(title, "title", |title| unsafe {
            (self.api.set_title)(handle.as_ptr(), title.as_ptr())
        });
    }

    fn set_size(&self, handle: RawHandle, size: Size) {
        unsafe {
            (self.api.set_size)(handle.as_ptr(), size.width, size.height, size.hint.code())
        }
    }

    fn navigate(&self, handle: RawHandle, url: &str) {
        self.with_c_string(url, "url", |url| unsafe {
            (self.api.navigate)(handle.as_ptr(), url.as_ptr())
        });
    }

    fn set_html(&self, handle: RawHandle, html: &str) {
        self.with_c_string(html, "html", |html| unsafe {
            (self.api.set_html)(handle.as_ptr(), html.as_ptr())
        });
    }

    fn inject_script(&self, handle: RawHandle, js: &str) {
        self.with_c_string(js, "script", |js| unsafe {
            (self.api.init)(handle.as_ptr(), js.as_ptr())
        });
    }

    fn evaluate_script(&self, handle: RawHandle, js: &str) {
        self.with_c_string(js, "script", |js| unsafe {
            (self.api.eval)(handle.as_ptr(), js.as_ptr())
        });
    }

    fn bind(
        &self,
        handle: RawHandle,
        name: &str,
        callback: NativeCallback,
        arg: Option<RawHandle>,
    ) -> BindingToken {
        let context = Box::into_raw(Box::new(BindingContext {
            name: name.to_string(),
            callback,
            arg,
        }));

        self.with_c_string(name, "binding name", |name| unsafe {
            (self.api.bind)(
                handle.as_ptr(),
                name.as_ptr(),
                binding_trampoline,
                context as *mut c_void,
            )
        });

        BindingToken { context }
    }

    fn unbind(&self, handle: RawHandle, name: &str) {
        self.with_c_string(name, "binding name", |name| unsafe {
            (self.api.unbind)(handle.as_ptr(), name.as_ptr())
        });
    }

    fn release(&self, token: BindingToken) {
        if token.context.is_null() {
            return;
        }
        let context = unsafe { Box::from_raw(token.context) };
        tracing::trace!(name = %context.name, "released binding context");
    }

    fn return_result(&self, handle: RawHandle, seq: &str, status: ReturnStatus, result: &str) {
        let (Ok(seq), Ok(result)) = (to_c_string(seq, "seq"), to_c_string(result, "result")) else {
            tracing::warn!(%seq, "skipping call result with interior NUL");
            return;
        };
        unsafe {
            (self.api.return_result)(handle.as_ptr(), seq.as_ptr(), status.code(), result.as_ptr())
        }
    }
}
