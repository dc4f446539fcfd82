//! C string marshalling at the host boundary

use std::ffi::{CStr, CString, c_char};

use crate::error::{BridgeError, Result};

/// Copy a host-owned C string into an owned `String`
///
/// # Safety
///
/// `ptr` must be null or point to a NUL-terminated string that stays valid for
/// the duration of this call.
pub unsafe fn copy_in(ptr: *const c_char, name: &'static str) -> Result<String> {
    if ptr.is_null() {
        return Err(BridgeError::NullArgument(name));
    }

    let raw = unsafe { CStr::from_ptr(ptr) };
    raw.to_str()
        .map(str::to_owned)
        .map_err(|_| BridgeError::InvalidUtf8(name))
}

/// Like [`copy_in`] but rejects empty strings
///
/// # Safety
///
/// Same as [`copy_in`].
pub unsafe fn copy_in_non_empty(ptr: *const c_char, name: &'static str) -> Result<String> {
    let value = unsafe { copy_in(ptr, name) }?;
    if value.is_empty() {
        return Err(BridgeError::EmptyArgument(name));
    }
    Ok(value)
}

/// Copy an optional host string; null and invalid input become empty
///
/// Invalid UTF-8 is logged.
///
/// # Safety
///
/// Same as [`copy_in`].
pub unsafe fn copy_in_or_empty(ptr: *const c_char, name: &'static str) -> String {
    if ptr.is_null() {
        return String::new();
    }
    unsafe { copy_in(ptr, name) }.unwrap_or_else(|err| {
        log::warn!("{err}");
        String::new()
    })
}

/// Build a C string for a callback argument
///
/// Interior NUL bytes would truncate the string on the host side, so they are
/// stripped.
pub fn to_c_string(value: &str) -> CString {
    match CString::new(value) {
        Ok(c_string) => c_string,
        Err(err) => {
            let mut bytes = err.into_vec();
            bytes.retain(|&b| b != 0);
            CString::new(bytes).unwrap_or_default()
        }
    }
}
