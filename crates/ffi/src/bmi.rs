use std::os::raw::c_char;

use class_core::{BmiClass, BmiLight};

use crate::error::ClassErrorCode;
use crate::helpers::{
    handle_ffi_result_error, instance_from_ptr, str_from_ptr, with_bmi, with_bmi_mut, write_out,
};
use crate::instance::ClassBmiInstance;

/// Advance the model by one time step.
///
/// Thread-safe: acquires the `RwLock` write lock.
///
/// # Returns
/// - `Ok` on success
/// - `NullPointer` if `ptr` is null
/// - `DomainError` if the step is undefined; the model state is unchanged
///
/// # Safety
/// `ptr` must be null or a live handle from `class_bmi_new`.
#[no_mangle]
pub unsafe extern "C" fn class_bmi_update(ptr: *const ClassBmiInstance) -> ClassErrorCode {
    handle_ffi_result_error(|| {
        let instance = unsafe { instance_from_ptr(ptr) }?;
        with_bmi_mut(instance, BmiClass::update)??;
        Ok(())
    })
}

/// Read the current value of an output variable (`h`, `theta`, `dtheta`, `q`, `dq`).
///
/// # Returns
/// - `Ok` with `*out_value` set
/// - `NullPointer` if any pointer is null
/// - `InvalidString` if `name` is not UTF-8
/// - `UnknownVariable` if `name` is not in the output set
///
/// # Safety
/// `ptr` must be a live handle, `name` a NUL-terminated string and
/// `out_value` valid for writes.
#[no_mangle]
pub unsafe extern "C" fn class_bmi_get_value(
    ptr: *const ClassBmiInstance,
    name: *const c_char,
    out_value: *mut f64,
) -> ClassErrorCode {
    handle_ffi_result_error(|| {
        let instance = unsafe { instance_from_ptr(ptr) }?;
        let name = unsafe { str_from_ptr(name, "name") }?;
        let value = with_bmi(instance, |bmi| bmi.get_value(name))??;
        unsafe { write_out(out_value, "out_value", value) }
    })
}

/// Current model time in seconds.
///
/// # Safety
/// `ptr` must be a live handle and `out_time` valid for writes.
#[no_mangle]
pub unsafe extern "C" fn class_bmi_get_current_time(
    ptr: *const ClassBmiInstance,
    out_time: *mut f64,
) -> ClassErrorCode {
    handle_ffi_result_error(|| {
        let instance = unsafe { instance_from_ptr(ptr) }?;
        let time = with_bmi(instance, BmiClass::get_current_time)?;
        unsafe { write_out(out_time, "out_time", time) }
    })
}

/// End time (configured runtime) in seconds.
///
/// # Safety
/// `ptr` must be a live handle and `out_time` valid for writes.
#[no_mangle]
pub unsafe extern "C" fn class_bmi_get_end_time(
    ptr: *const ClassBmiInstance,
    out_time: *mut f64,
) -> ClassErrorCode {
    handle_ffi_result_error(|| {
        let instance = unsafe { instance_from_ptr(ptr) }?;
        let time = with_bmi(instance, BmiClass::get_end_time)?;
        unsafe { write_out(out_time, "out_time", time) }
    })
}

/// Time step in seconds.
///
/// # Safety
/// `ptr` must be a live handle and `out_dt` valid for writes.
#[no_mangle]
pub unsafe extern "C" fn class_bmi_get_time_step(
    ptr: *const ClassBmiInstance,
    out_dt: *mut f64,
) -> ClassErrorCode {
    handle_ffi_result_error(|| {
        let instance = unsafe { instance_from_ptr(ptr) }?;
        let dt = with_bmi(instance, BmiClass::get_time_step)?;
        unsafe { write_out(out_dt, "out_dt", dt) }
    })
}

/// Number of output variables (always 5).
///
/// # Safety
/// `ptr` must be a live handle and `out_count` valid for writes.
#[no_mangle]
pub unsafe extern "C" fn class_bmi_get_output_item_count(
    ptr: *const ClassBmiInstance,
    out_count: *mut usize,
) -> ClassErrorCode {
    handle_ffi_result_error(|| {
        let instance = unsafe { instance_from_ptr(ptr) }?;
        let count = with_bmi(instance, BmiClass::get_output_item_count)?;
        unsafe { write_out(out_count, "out_count", count) }
    })
}
