use std::os::raw::c_char;
use std::ptr;
use std::sync::RwLock;

use class_core::{BmiClass, Config};
use tracing::debug;

use crate::error::{ClassErrorCode, DefaultClassFfiError};
use crate::helpers::{str_from_ptr, track_error, track_result};

/// Opaque handle to one mixed-layer model behind the BMI adapter.
///
/// # Thread Safety
/// The model is protected by an `RwLock`: queries take a read lock and
/// `class_bmi_update` takes a write lock, so one handle may be shared between
/// threads. Error state is per thread.
pub struct ClassBmiInstance {
    pub(crate) bmi: RwLock<BmiClass>,
}

impl ClassBmiInstance {
    /// Build an instance from a JSON configuration document.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` for malformed JSON, unknown keys or
    /// out-of-domain values.
    pub(crate) fn from_json(config_json: &str) -> Result<Box<Self>, DefaultClassFfiError> {
        let config = Config::from_json_str(config_json)?;
        let bmi = BmiClass::new(config)?;
        Ok(Box::new(Self::from_bmi(bmi)))
    }

    fn from_bmi(bmi: BmiClass) -> Self {
        debug!(
            "Created BMI instance: dt={}s, runtime={}s",
            bmi.model().time_step(),
            bmi.model().end_time()
        );
        Self {
            bmi: RwLock::new(bmi),
        }
    }
}

/// Hand `result` to the caller through `out_instance`, nulling it on error.
unsafe fn publish(
    result: Result<Box<ClassBmiInstance>, DefaultClassFfiError>,
    out_instance: *mut *mut ClassBmiInstance,
) -> ClassErrorCode {
    match track_result(result) {
        Ok(instance) => {
            unsafe {
                *out_instance = Box::into_raw(instance);
            }
            ClassErrorCode::Ok
        }
        Err(code) => {
            unsafe {
                // Set to null on error (per documentation contract)
                *out_instance = ptr::null_mut();
            }
            code
        }
    }
}

/// Creates a model from a JSON configuration string.
///
/// The document uses the sections `initialState`, `timeControl` and
/// `mixedLayer`; omitted fields take their defaults.
///
/// # Returns
/// - `Ok` with `*out_instance` set to a new handle
/// - `NullPointer` if `config_json` or `out_instance` is null
/// - `InvalidString` if `config_json` is not UTF-8
/// - `InvalidConfiguration` if the document is malformed or out of domain
///
/// On error `*out_instance` is set to null (when `out_instance` itself is not null).
///
/// # Safety
/// `config_json` must be a NUL-terminated string and `out_instance` must be
/// valid for writes.
///
/// Example:
/// ```c
/// ClassBmiInstance* model = NULL;
/// if (class_bmi_new("{\"timeControl\": {\"runtime\": 3600}}", &model) != Ok) {
///     fprintf(stderr, "Failed to create model: %s\n", class_get_last_error());
///     return;
/// }
/// // ... use model ...
/// class_bmi_destroy(model);
/// ```
#[no_mangle]
pub unsafe extern "C" fn class_bmi_new(
    config_json: *const c_char,
    out_instance: *mut *mut ClassBmiInstance,
) -> ClassErrorCode {
    if out_instance.is_null() {
        return track_error(&DefaultClassFfiError::null_pointer("out_instance"));
    }
    let result = unsafe { str_from_ptr(config_json, "config_json") }
        .and_then(ClassBmiInstance::from_json);
    unsafe { publish(result, out_instance) }
}

/// Creates a model from the default configuration.
///
/// # Safety
/// `out_instance` must be valid for writes.
#[no_mangle]
pub unsafe extern "C" fn class_bmi_new_default(
    out_instance: *mut *mut ClassBmiInstance,
) -> ClassErrorCode {
    if out_instance.is_null() {
        return track_error(&DefaultClassFfiError::null_pointer("out_instance"));
    }
    let instance = Box::new(ClassBmiInstance::from_bmi(BmiClass::default()));
    unsafe { publish(Ok(instance), out_instance) }
}

/// Destroys a handle previously created by `class_bmi_new` or
/// `class_bmi_new_default`. A null pointer is a no-op.
///
/// # Safety
/// - The pointer MUST have been created by one of the constructors above.
/// - The pointer MUST NOT be used again afterwards.
#[no_mangle]
pub unsafe extern "C" fn class_bmi_destroy(ptr: *mut ClassBmiInstance) {
    if ptr.is_null() {
        return;
    }

    // SAFETY: the pointer came from `Box::into_raw` in `publish` and is
    // dropped exactly once here.
    unsafe {
        drop(Box::from_raw(ptr));
    }
    debug!("Destroyed BMI instance");
}
