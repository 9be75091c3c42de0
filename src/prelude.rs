pub use crate::form::{
    ApiError, CaptchaError, CaptchaProvider, Field, FieldKey, FieldLens, FormController,
    FormError, FormModel, FormOptions, FormResult, Rejection, RequireChange, SubmitOutcome,
};
pub use crate::{I18nManager, Locale, Translator};
