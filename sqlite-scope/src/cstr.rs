///
/// Conversions from NUL-terminated strings owned by SQLite.
///
/// SQLite hands out `const char*` pointers that stay valid only until the
/// next call on the same object, so everything is copied into an owned
/// `String` immediately.
///

use std::ffi::{c_char, CStr};

pub(crate) fn optional_text(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    let text = unsafe { CStr::from_ptr(ptr) };
    Some(text.to_string_lossy().into_owned())
}

pub(crate) fn text_or_empty(ptr: *const c_char) -> String {
    optional_text(ptr).unwrap_or_default()
}
