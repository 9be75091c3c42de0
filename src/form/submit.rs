use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError};

use futures::future::BoxFuture;
use serde::Deserialize;
use serde_json::Value;

use super::controller::{
    FieldKey, FormController, FormError, FormResult, SubmitState, known_field_errors,
    transition_submit_state, write_lock,
};
use super::model::FormModel;

/// Error code the API uses for per-field validation failures.
pub const INVALID_PROPERTIES: &str = "invalid_properties";

pub type SubmitAction<T> = Arc<
    dyn Fn(T, FormController<T>) -> BoxFuture<'static, Result<(), Rejection>> + Send + Sync,
>;

/// One machine-readable error with its interpolation data.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Issue {
    pub error: String,
    #[serde(default)]
    pub details: Value,
}

/// JSON error body returned by the API: `{"error": "...", "details": ...}`.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct ApiError {
    pub error: String,
    #[serde(default)]
    pub details: Value,
}

impl ApiError {
    pub fn new(error: impl Into<String>, details: Value) -> Self {
        Self {
            error: error.into(),
            details,
        }
    }
}

/// Why a submit action failed.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum Rejection {
    #[error("api error `{}`", .0.error)]
    Api(ApiError),
    #[error("{0}")]
    Message(String),
}

/// Transport and decoding failures convert through `?`; any other error type
/// goes through [`Rejection::other`].
impl Rejection {
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }

    pub fn other(error: impl std::error::Error) -> Self {
        Self::Message(error.to_string())
    }
}

impl From<ApiError> for Rejection {
    fn from(error: ApiError) -> Self {
        Self::Api(error)
    }
}

impl From<std::io::Error> for Rejection {
    fn from(error: std::io::Error) -> Self {
        Self::other(error)
    }
}

impl From<serde_json::Error> for Rejection {
    fn from(error: serde_json::Error) -> Self {
        Self::other(error)
    }
}

/// A classified rejection. Field names are still the server's strings here.
#[derive(Clone, Debug, PartialEq)]
pub enum SubmitFailure {
    FieldErrors(BTreeMap<String, Vec<Issue>>),
    FormError(Issue),
    RawError(String),
}

impl SubmitFailure {
    pub fn classify(rejection: Rejection) -> Self {
        match rejection {
            Rejection::Api(ApiError { error, details }) if error == INVALID_PROPERTIES => {
                match serde_json::from_value::<BTreeMap<String, Vec<Issue>>>(details.clone()) {
                    Ok(properties) => Self::FieldErrors(properties),
                    Err(parse_error) => {
                        tracing::debug!(
                            %parse_error,
                            "invalid_properties details are not a field map"
                        );
                        Self::FormError(Issue { error, details })
                    }
                }
            }
            Rejection::Api(ApiError { error, details }) => {
                Self::FormError(Issue { error, details })
            }
            Rejection::Message(message) => Self::RawError(message),
        }
    }
}

/// Result of one [`FormController::submit`] call; mirrors what was stored on the form.
#[derive(Clone, Debug, PartialEq)]
pub struct SubmitOutcome<T> {
    pub errors: Vec<String>,
    pub field_errors: BTreeMap<FieldKey, Vec<String>>,
    pub fields: T,
}

impl<T> SubmitOutcome<T> {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty() && self.field_errors.is_empty()
    }
}

#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error("captcha challenge failed: {0}")]
pub struct CaptchaError(pub String);

/// Source of just-in-time captcha tokens.
pub trait CaptchaProvider: Send + Sync + 'static {
    fn response(&self) -> BoxFuture<'_, Result<String, CaptchaError>>;

    /// Invalidates the token handed out by the last [`response`](Self::response).
    fn reset(&self);
}

impl<T> FormController<T>
where
    T: FormModel,
{
    /// Runs the submit action and records its outcome on the form.
    ///
    /// Failures of the action are classified and returned inside the
    /// [`SubmitOutcome`]; `Err` is reserved for engine errors such as an
    /// overlapping submit.
    pub async fn submit(&self) -> FormResult<SubmitOutcome<T>> {
        let form_id = {
            let mut state = write_lock(&self.state, "preparing submit")?;
            if state.submit_state == SubmitState::Submitting {
                return Err(FormError::AlreadySubmitting);
            }
            transition_submit_state(&mut state, SubmitState::Submitting);
            state.submit_count = state.submit_count.saturating_add(1);
            state.id
        };
        tracing::debug!(form = %form_id, "submit started");

        let result = self.run_submit().await;

        if self.options.with_captcha {
            if let Some(captcha) = &self.captcha {
                captcha.reset();
            }
        }

        // Idle is restored even when the lock was poisoned mid-submit.
        transition_submit_state(
            &mut *self.state.write().unwrap_or_else(PoisonError::into_inner),
            SubmitState::Idle,
        );
        match &result {
            Ok(outcome) => {
                tracing::debug!(form = %form_id, success = outcome.is_success(), "submit finished");
            }
            Err(error) => {
                tracing::warn!(form = %form_id, %error, "submit aborted");
            }
        }
        result
    }

    async fn run_submit(&self) -> FormResult<SubmitOutcome<T>> {
        let token = if self.options.with_captcha {
            self.captcha_response().await
        } else {
            Ok(String::new())
        };

        let values = {
            let mut state = write_lock(&self.state, "storing captcha token")?;
            state.captcha_token = token.as_ref().cloned().unwrap_or_default();
            state.model.clone()
        };

        let result = match token {
            Ok(_) => (self.on_submit)(values.clone(), self.clone())
                .await
                .map_err(SubmitFailure::classify),
            Err(error) => Err(SubmitFailure::RawError(error.to_string())),
        };

        match result {
            Ok(()) => {
                let mut state = write_lock(&self.state, "applying submit success")?;
                state.clear_errors();
                state.initial_model = values.clone();
                Ok(SubmitOutcome {
                    errors: Vec::new(),
                    field_errors: BTreeMap::new(),
                    fields: values,
                })
            }
            Err(failure) => {
                tracing::debug!(?failure, "submit rejected");
                let (errors, field_errors) = self.translate_failure(failure);
                let mut state = write_lock(&self.state, "applying submit failure")?;
                state.form_errors = errors.clone();
                state.field_errors = field_errors.clone();
                Ok(SubmitOutcome {
                    errors,
                    field_errors,
                    fields: values,
                })
            }
        }
    }

    async fn captcha_response(&self) -> Result<String, CaptchaError> {
        match &self.captcha {
            Some(captcha) => captcha.response().await,
            None => {
                tracing::warn!("captcha required but no provider attached, using an empty token");
                Ok(String::new())
            }
        }
    }

    fn translate_failure(
        &self,
        failure: SubmitFailure,
    ) -> (Vec<String>, BTreeMap<FieldKey, Vec<String>>) {
        match failure {
            SubmitFailure::FieldErrors(properties) => {
                let translated = properties.into_iter().map(|(name, issues)| {
                    let messages = issues
                        .iter()
                        .map(|issue| self.translate_issue(issue))
                        .collect::<Vec<_>>();
                    (name, messages)
                });
                let field_errors = known_field_errors::<T, _, _>(translated);
                if field_errors.is_empty() {
                    // Nothing to attach to a field; the rejection still has to surface.
                    let issue = Issue {
                        error: INVALID_PROPERTIES.into(),
                        details: Value::Null,
                    };
                    return (vec![self.translate_issue(&issue)], BTreeMap::new());
                }
                (Vec::new(), field_errors)
            }
            SubmitFailure::FormError(issue) => {
                (vec![self.translate_issue(&issue)], BTreeMap::new())
            }
            SubmitFailure::RawError(message) => (vec![message], BTreeMap::new()),
        }
    }

    fn translate_issue(&self, issue: &Issue) -> String {
        self.translator
            .translate(&format!("errors.{}", issue.error), &issue.details)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn invalid_properties_with_field_map_classifies_as_field_errors() {
        let body: ApiError = serde_json::from_value(json!({
            "error": "invalid_properties",
            "details": {
                "email": [{ "error": "taken", "details": {} }],
                "password": [
                    { "error": "too_short", "details": { "min": 8 } },
                    { "error": "required" }
                ]
            }
        }))
        .expect("api error body parses");

        let SubmitFailure::FieldErrors(properties) = SubmitFailure::classify(body.into()) else {
            panic!("expected field errors");
        };
        assert_eq!(properties["email"], vec![Issue {
            error: "taken".into(),
            details: json!({}),
        }]);
        assert_eq!(properties["password"].len(), 2);
        assert_eq!(properties["password"][1].details, Value::Null);
    }

    #[test]
    fn malformed_invalid_properties_degrades_to_form_error() {
        let rejection = Rejection::from(ApiError::new(INVALID_PROPERTIES, json!("oops")));
        assert_eq!(
            SubmitFailure::classify(rejection),
            SubmitFailure::FormError(Issue {
                error: INVALID_PROPERTIES.into(),
                details: json!("oops"),
            })
        );
    }

    #[test]
    fn other_api_codes_classify_as_form_error() {
        let rejection = Rejection::from(ApiError::new("rate_limited", json!({})));
        assert!(matches!(
            SubmitFailure::classify(rejection),
            SubmitFailure::FormError(Issue { ref error, .. }) if error == "rate_limited"
        ));
    }

    #[test]
    fn plain_errors_keep_their_message() {
        let io = std::io::Error::other("network down");
        assert_eq!(
            SubmitFailure::classify(Rejection::other(io)),
            SubmitFailure::RawError("network down".into())
        );
        assert_eq!(Rejection::message("boom").to_string(), "boom");
    }

    #[test]
    fn transport_and_decode_errors_convert_with_question_mark() {
        fn decode(body: &str) -> Result<ApiError, Rejection> {
            Ok(serde_json::from_str(body)?)
        }
        fn read() -> Result<(), Rejection> {
            Err::<(), _>(std::io::Error::other("connection reset"))?;
            Ok(())
        }

        assert!(matches!(decode("{"), Err(Rejection::Message(_))));
        assert_eq!(
            decode(r#"{"error":"taken"}"#).expect("decodes"),
            ApiError::new("taken", Value::Null)
        );
        assert_eq!(read(), Err(Rejection::message("connection reset")));
    }
}
