//! FFI bindings for Vigil Core
//!
//! C-compatible functions for driving a scoring session from a host shell
//! (mobile app, web runtime). All functions use null-terminated C strings
//! and return allocated memory that must be freed by the caller using
//! `vigil_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use chrono::Utc;

use crate::encoder::ReportEncoder;
use crate::schema::{CaptureAdapter, CaptureFrame, CaptureRecord};
use crate::session::CombinedSession;

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Helper to convert a C string to a Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Helper to convert a Rust string to a C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// Opaque handle to a scoring session
pub struct VigilSessionHandle {
    session: CombinedSession,
    encoder: ReportEncoder,
}

// ============================================================================
// Session Lifecycle
// ============================================================================

/// Create a new scoring session for the given capture device.
///
/// # Safety
/// - `device_id` must be a valid null-terminated C string.
/// - Returns a pointer that must be freed with `vigil_session_free`.
/// - Returns NULL on error; call `vigil_last_error` for details.
#[no_mangle]
pub unsafe extern "C" fn vigil_session_new(device_id: *const c_char) -> *mut VigilSessionHandle {
    clear_last_error();

    let device = match cstr_to_string(device_id) {
        Some(s) => s,
        None => {
            set_last_error("Invalid device_id string pointer");
            return ptr::null_mut();
        }
    };

    let handle = Box::new(VigilSessionHandle {
        session: CombinedSession::new(&device, Utc::now()),
        encoder: ReportEncoder::new(),
    });
    Box::into_raw(handle)
}

/// Free a scoring session.
///
/// # Safety
/// - `session` must be a valid pointer returned by `vigil_session_new` or
///   `vigil_session_restore`.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn vigil_session_free(session: *mut VigilSessionHandle) {
    if !session.is_null() {
        drop(Box::from_raw(session));
    }
}

// ============================================================================
// Frame Processing
// ============================================================================

/// Process one capture record (vigil.capture.v1 JSON) and return the
/// evaluation as JSON.
///
/// # Safety
/// - `session` must be a valid session pointer.
/// - `record_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with
///   `vigil_free_string`.
/// - Returns NULL on error (including device-error records); call
///   `vigil_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn vigil_session_process(
    session: *mut VigilSessionHandle,
    record_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if session.is_null() {
        set_last_error("Null session pointer");
        return ptr::null_mut();
    }
    let handle = &mut *session;

    let json = match cstr_to_string(record_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid record JSON string pointer");
            return ptr::null_mut();
        }
    };

    let record: CaptureRecord = match serde_json::from_str(&json) {
        Ok(r) => r,
        Err(e) => {
            set_last_error(&format!("Failed to parse capture record: {}", e));
            return ptr::null_mut();
        }
    };

    if let Err(e) = record.validate() {
        set_last_error(&e.to_string());
        return ptr::null_mut();
    }

    let frame = match CaptureAdapter::to_frame(&record) {
        Ok(f) => f,
        Err(e) => {
            set_last_error(&e.to_string());
            return ptr::null_mut();
        }
    };

    let encoded = match frame {
        CaptureFrame::Face(frame) => handle
            .session
            .process_face_frame(&frame)
            .and_then(|e| serde_json::to_string(&e).map_err(Into::into)),
        CaptureFrame::Audio(frame) => handle
            .session
            .process_audio_frame(&frame)
            .and_then(|e| serde_json::to_string(&e).map_err(Into::into)),
    };

    match encoded {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Encode the session's latest state into a report payload (JSON).
///
/// # Safety
/// - `session` must be a valid session pointer.
/// - Returns a newly allocated string that must be freed with
///   `vigil_free_string`.
/// - Returns NULL on error; call `vigil_last_error` for details.
#[no_mangle]
pub unsafe extern "C" fn vigil_session_report(session: *mut VigilSessionHandle) -> *mut c_char {
    clear_last_error();

    if session.is_null() {
        set_last_error("Null session pointer");
        return ptr::null_mut();
    }
    let handle = &*session;

    match handle.encoder.encode_to_json(&handle.session) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Discard all session state and start fresh under the same session id.
///
/// # Safety
/// - `session` must be a valid session pointer.
#[no_mangle]
pub unsafe extern "C" fn vigil_session_reset(session: *mut VigilSessionHandle) {
    if !session.is_null() {
        (*session).session.reset();
    }
}

// ============================================================================
// Persistence
// ============================================================================

/// Serialize the session state to JSON for persistence.
///
/// # Safety
/// - `session` must be a valid session pointer.
/// - Returns a newly allocated string that must be freed with
///   `vigil_free_string`.
/// - Returns NULL on error; call `vigil_last_error` for details.
#[no_mangle]
pub unsafe extern "C" fn vigil_session_snapshot(session: *mut VigilSessionHandle) -> *mut c_char {
    clear_last_error();

    if session.is_null() {
        set_last_error("Null session pointer");
        return ptr::null_mut();
    }

    match (*session).session.snapshot() {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Restore a session from a snapshot produced by `vigil_session_snapshot`.
///
/// # Safety
/// - `snapshot_json` must be a valid null-terminated C string.
/// - Returns a pointer that must be freed with `vigil_session_free`.
/// - Returns NULL on error; call `vigil_last_error` for details.
#[no_mangle]
pub unsafe extern "C" fn vigil_session_restore(
    snapshot_json: *const c_char,
) -> *mut VigilSessionHandle {
    clear_last_error();

    let json = match cstr_to_string(snapshot_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid snapshot string pointer");
            return ptr::null_mut();
        }
    };

    match CombinedSession::from_snapshot(&json) {
        Ok(session) => Box::into_raw(Box::new(VigilSessionHandle {
            session,
            encoder: ReportEncoder::new(),
        })),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by Vigil functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a Vigil function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn vigil_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next Vigil function call on
///   this thread. Do NOT free it.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn vigil_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the Vigil library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn vigil_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}
