//! C ABI for the CLASS mixed-layer model.
//!
//! Every fallible function returns a [`ClassErrorCode`]; on failure the
//! message is available from `class_get_last_error` on the same thread.
//! Models are opaque [`ClassBmiInstance`] handles created with
//! `class_bmi_new` and released with `class_bmi_destroy`.

mod bmi;
mod error;
mod helpers;
mod instance;

pub use bmi::{
    class_bmi_get_current_time, class_bmi_get_end_time, class_bmi_get_output_item_count,
    class_bmi_get_time_step, class_bmi_get_value, class_bmi_update,
};
pub use error::{class_get_last_error, class_get_last_error_code, ClassErrorCode};
pub use instance::{class_bmi_destroy, class_bmi_new, class_bmi_new_default, ClassBmiInstance};
