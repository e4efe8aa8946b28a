// libjpeg error manager that turns fatal engine errors into Rust errors
//
// libjpeg expects error_exit never to return. Instead of longjmp we unwind
// out of the C frames (mozjpeg-sys is built with "C-unwind" ABI) and catch
// the unwind at the call boundary in `guarded`.

use std::any::Any;
use std::ffi::{CStr, c_char};
use std::panic::{self, AssertUnwindSafe};

use mozjpeg_sys::{jpeg_common_struct, jpeg_error_mgr, jpeg_std_error};

use crate::error::JpegError;

/// Unwind payload raised by [`unwind_error_exit`].
struct EngineFailure(String);

/// Create an error manager whose `error_exit` unwinds instead of exiting.
///
/// The returned box must outlive the codec struct that points at it.
pub(crate) fn unwinding_error_mgr() -> Box<jpeg_error_mgr> {
    unsafe {
        let mut err: Box<jpeg_error_mgr> = Box::new(std::mem::zeroed());
        jpeg_std_error(&mut *err);
        err.error_exit = Some(unwind_error_exit);
        err.output_message = Some(log_message);
        err
    }
}

/// Look up the message template for the engine's current message code.
fn message_text(cinfo: &jpeg_common_struct) -> String {
    unsafe {
        let Some(err) = cinfo.err.as_ref() else {
            return "unknown engine error".to_string();
        };
        let code = err.msg_code;
        let table = err.jpeg_message_table;
        if !table.is_null() && code > 0 && code <= err.last_jpeg_message {
            let text = *table.add(code as usize);
            if !text.is_null() {
                return CStr::from_ptr(text as *const c_char)
                    .to_string_lossy()
                    .into_owned();
            }
        }
        format!("message code {code}")
    }
}

unsafe extern "C-unwind" fn unwind_error_exit(cinfo: &mut jpeg_common_struct) {
    let msg = message_text(cinfo);
    // resume_unwind skips the panic hook
    panic::resume_unwind(Box::new(EngineFailure(msg)))
}

unsafe extern "C-unwind" fn log_message(cinfo: &mut jpeg_common_struct) {
    tracing::warn!("codec engine: {}", message_text(cinfo));
}

fn payload_text(payload: Box<dyn Any + Send>) -> String {
    match payload.downcast::<EngineFailure>() {
        Ok(failure) => failure.0,
        Err(payload) => match payload.downcast::<String>() {
            Ok(s) => *s,
            Err(payload) => payload
                .downcast_ref::<&str>()
                .map_or_else(|| "engine panicked".to_string(), |s| s.to_string()),
        },
    }
}

/// Run an engine call, converting an `error_exit` unwind into an error.
pub(crate) fn guarded<T>(what: &str, f: impl FnOnce() -> T) -> crate::error::Result<T> {
    panic::catch_unwind(AssertUnwindSafe(f))
        .map_err(|payload| JpegError::engine(format!("{what}: {}", payload_text(payload))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guarded_passes_value_through() {
        assert_eq!(guarded("noop", || 7).unwrap(), 7);
    }

    #[test]
    fn test_guarded_maps_engine_failure() {
        let result: crate::error::Result<()> = guarded("read header", || {
            panic::resume_unwind(Box::new(EngineFailure("Not a JPEG file".to_string())))
        });
        let msg = result.unwrap_err().to_string();
        assert!(msg.contains("read header"), "got: {msg}");
        assert!(msg.contains("Not a JPEG file"), "got: {msg}");
    }
}
