mod controller;
mod field;
mod model;
mod submit;


pub use controller::{
    FieldKey, FormController, FormError, FormId, FormOptions, FormResult, FormSnapshot,
    RequireChange, SubmitState,
};
pub use field::Field;
pub use inputform_derive::FormModel;
pub use model::{FieldLens, FormModel};
pub use submit::{
    ApiError, CaptchaError, CaptchaProvider, INVALID_PROPERTIES, Issue, Rejection, SubmitAction,
    SubmitFailure, SubmitOutcome,
};
