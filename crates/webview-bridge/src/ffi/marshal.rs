//! String marshaling across the C boundary
//!
//! Outbound strings become NUL-terminated UTF-8. Inbound pointers are read
//! lossily; a null pointer reads as the empty string.

use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use thiserror::Error;

/// Marshal error types
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MarshalError {
    /// String contains a NUL byte and cannot cross as a C string
    #[error("{what} contains an interior NUL byte at {position}")]
    InteriorNul { what: &'static str, position: usize },
}

/// Convert a Rust string into a C string
pub fn to_c_string(value: &str, what: &'static str) -> Result<CString, MarshalError> {
    CString::new(value).map_err(|e| MarshalError::InteriorNul {
        what,
        position: e.nul_position(),
    })
}

/// Read a C string, `""` for null
///
/// # Safety
///
/// A non-null `ptr` must point to a NUL-terminated string that stays valid
/// for the duration of the call.
pub unsafe fn from_c_str(ptr: *const c_char) -> String {
    if ptr.is_null() {
        return String::new();
    }
    CStr::from_ptr(ptr).to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_through_c_string() {
        let c = to_c_string("hi bob", "title").unwrap();
        assert_eq!(unsafe { from_c_str(c.as_ptr()) }, "hi bob");
    }

    #[test]
    fn test_interior_nul_is_rejected() {
        let err = to_c_string("a\0b", "title").unwrap_err();
        assert_eq!(
            err,
            MarshalError::InteriorNul {
                what: "title",
                position: 1
            }
        );
        assert_eq!(err.to_string(), "title contains an interior NUL byte at 1");
    }

    #[test]
    fn test_null_reads_as_empty() {
        assert_eq!(unsafe { from_c_str(std::ptr::null()) }, "");
    }
}
