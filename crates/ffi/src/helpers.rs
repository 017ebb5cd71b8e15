use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::sync::{RwLockReadGuard, RwLockWriteGuard};

use class_core::BmiClass;

use crate::error::{with_last_error_mut, ClassErrorCode, ClassFfiError, DefaultClassFfiError};
use crate::instance::ClassBmiInstance;

/// Set the thread-local error message and code.
pub(crate) fn set_last_error(error: &impl ClassFfiError) {
    with_last_error_mut(|(cstring, code)| {
        *cstring = CString::new(error.msg()).ok();
        *code = error.code();
    });
}

/// Record `error` and return its code.
#[inline]
pub(crate) fn track_error(error: &impl ClassFfiError) -> ClassErrorCode {
    set_last_error(error);
    error.code()
}

/// Record the error of a failed result, or clear the last error on success.
pub(crate) fn track_result<T, E>(result: Result<T, E>) -> Result<T, ClassErrorCode>
where
    E: ClassFfiError,
{
    match result {
        Ok(value) => {
            clear_last_error();
            Ok(value)
        }
        Err(error) => Err(track_error(&error)),
    }
}

/// Run an FFI body and collapse its result into the code returned across the
/// boundary, recording the error on failure.
pub(crate) fn handle_ffi_result_error<F>(func: F) -> ClassErrorCode
where
    F: FnOnce() -> Result<(), DefaultClassFfiError>,
{
    match track_result(func()) {
        Ok(()) => ClassErrorCode::Ok,
        Err(code) => code,
    }
}

/// Clear the thread-local error message and code.
pub(crate) fn clear_last_error() {
    with_last_error_mut(|(cstring, code)| {
        *cstring = None;
        *code = ClassErrorCode::Ok;
    });
}

/// Borrow an instance from a raw pointer.
///
/// # Safety
/// `ptr` must be null or a live pointer returned by `class_bmi_new`.
pub(crate) unsafe fn instance_from_ptr<'a>(
    ptr: *const ClassBmiInstance,
) -> Result<&'a ClassBmiInstance, DefaultClassFfiError> {
    unsafe { ptr.as_ref() }.ok_or_else(|| DefaultClassFfiError::null_pointer("instance"))
}

/// Borrow a C string argument as UTF-8.
///
/// # Safety
/// `ptr` must be null or point to a NUL-terminated string that outlives `'a`.
pub(crate) unsafe fn str_from_ptr<'a>(
    ptr: *const c_char,
    param_name: &str,
) -> Result<&'a str, DefaultClassFfiError> {
    if ptr.is_null() {
        return Err(DefaultClassFfiError::null_pointer(param_name));
    }
    unsafe { CStr::from_ptr(ptr) }
        .to_str()
        .map_err(|_| DefaultClassFfiError::invalid_string(param_name))
}

/// Write `value` through an out-pointer.
///
/// # Safety
/// `out` must be null or valid for writes.
pub(crate) unsafe fn write_out<T>(
    out: *mut T,
    param_name: &str,
    value: T,
) -> Result<(), DefaultClassFfiError> {
    if out.is_null() {
        return Err(DefaultClassFfiError::null_pointer(param_name));
    }
    unsafe {
        *out = value;
    }
    Ok(())
}

/// Run `func` with shared access to the wrapped model.
pub(crate) fn with_bmi<F, T>(instance: &ClassBmiInstance, func: F) -> Result<T, DefaultClassFfiError>
where
    F: FnOnce(&BmiClass) -> T,
{
    let bmi: RwLockReadGuard<'_, BmiClass> = instance
        .bmi
        .read()
        .map_err(|_| DefaultClassFfiError::lock_poisoned("RwLock"))?;
    Ok(func(&bmi))
}

/// Run `func` with exclusive access to the wrapped model.
pub(crate) fn with_bmi_mut<F, T>(
    instance: &ClassBmiInstance,
    func: F,
) -> Result<T, DefaultClassFfiError>
where
    F: FnOnce(&mut BmiClass) -> T,
{
    let mut bmi: RwLockWriteGuard<'_, BmiClass> = instance
        .bmi
        .write()
        .map_err(|_| DefaultClassFfiError::lock_poisoned("RwLock"))?;
    Ok(func(&mut bmi))
}
