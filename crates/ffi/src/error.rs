use std::cell::RefCell;
use std::ffi::CString;
use std::os::raw::c_char;
use std::ptr;

use class_core::ClassError;

/// Common interface for errors crossing the FFI boundary.
///
/// - `code()` is returned to the caller
/// - `msg()` is stored for `class_get_last_error`
pub(crate) trait ClassFfiError {
    fn code(&self) -> ClassErrorCode;

    fn msg(&self) -> &str;
}

/// Error code plus message for everything the C API can report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DefaultClassFfiError {
    code: ClassErrorCode,
    msg: String,
}

impl DefaultClassFfiError {
    /// A required pointer argument (`param_name`) was null.
    pub fn null_pointer(param_name: &str) -> Self {
        Self {
            code: ClassErrorCode::NullPointer,
            msg: format!("Parameter '{param_name}' cannot be null"),
        }
    }

    /// A string argument could not be decoded as UTF-8.
    pub fn invalid_string(param_name: &str) -> Self {
        Self {
            code: ClassErrorCode::InvalidString,
            msg: format!("Parameter '{param_name}' is not valid UTF-8"),
        }
    }

    /// The model lock was poisoned by a panicking writer.
    pub fn lock_poisoned(lock_name: &str) -> Self {
        Self {
            code: ClassErrorCode::LockPoisoned,
            msg: format!("{lock_name} guarding the model is poisoned"),
        }
    }
}

impl From<ClassError> for DefaultClassFfiError {
    fn from(error: ClassError) -> Self {
        let code = match error {
            ClassError::Configuration { .. } | ClassError::Parse(_) | ClassError::Io(_) => {
                ClassErrorCode::InvalidConfiguration
            }
            ClassError::Domain(_) => ClassErrorCode::DomainError,
            ClassError::UnknownVariable(_) => ClassErrorCode::UnknownVariable,
        };
        Self {
            code,
            msg: error.to_string(),
        }
    }
}

impl ClassFfiError for DefaultClassFfiError {
    fn code(&self) -> ClassErrorCode {
        self.code
    }

    fn msg(&self) -> &str {
        &self.msg
    }
}

/// Status returned by every fallible C function; zero means success.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassErrorCode {
    /// Success.
    Ok = 0,

    /// A required pointer argument was null.
    NullPointer = 1,

    /// A string argument is not valid UTF-8.
    InvalidString = 2,

    /// Configuration could not be parsed or is out of domain.
    InvalidConfiguration = 3,

    /// A time step hit an undefined operation (vanishing jump, collapsed layer).
    DomainError = 4,

    /// Variable name outside the output set.
    UnknownVariable = 5,

    /// A panic while holding the model lock left it poisoned.
    LockPoisoned = 6,
}

impl From<DefaultClassFfiError> for ClassErrorCode {
    fn from(error: DefaultClassFfiError) -> Self {
        error.code
    }
}

thread_local! {
    /// Most recent FFI error on this thread (C string, error code).
    /// The CString is owned here so the pointer handed out stays valid.
    static LAST_ERROR: RefCell<(Option<CString>, ClassErrorCode)> = const { RefCell::new((None, ClassErrorCode::Ok)) };
}

/// Read this thread's last error.
pub(crate) fn with_last_error<F, R>(f: F) -> R
where
    F: FnOnce(&(Option<CString>, ClassErrorCode)) -> R,
{
    LAST_ERROR.with_borrow(f)
}

/// Replace or clear this thread's last error.
pub(crate) fn with_last_error_mut<F, R>(f: F) -> R
where
    F: FnOnce(&mut (Option<CString>, ClassErrorCode)) -> R,
{
    LAST_ERROR.with_borrow_mut(f)
}

/// Message of the last failed call on this thread, or null after a success.
///
/// The string is owned by the library and stays valid until the next call
/// on the same thread. Callers must not free it.
///
/// ```c
/// ClassBmiInstance* model = NULL;
/// if (class_bmi_new("{\"initialState\": {\"h_0\": 0}}", &model) != Ok) {
///     fprintf(stderr, "%s\n", class_get_last_error());
/// }
/// ```
#[no_mangle]
pub extern "C" fn class_get_last_error() -> *const c_char {
    with_last_error(|(cstring, _code)| cstring.as_ref().map_or(ptr::null(), |cs| cs.as_ptr()))
}

/// Code of the last call on this thread.
#[no_mangle]
pub extern "C" fn class_get_last_error_code() -> ClassErrorCode {
    with_last_error(|(_cstring, code)| *code)
}
