use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use futures::FutureExt;

use super::model::{FieldLens, FormModel};
use super::submit::{CaptchaProvider, Rejection, SubmitAction};
use crate::i18n::{I18nManager, Translator};

static FORM_ID_ALLOCATOR: AtomicU64 = AtomicU64::new(1);

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct FormId(pub u64);

impl FormId {
    pub fn next() -> Self {
        Self(FORM_ID_ALLOCATOR.fetch_add(1, Ordering::SeqCst))
    }
}

impl Display for FormId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "form-{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct FieldKey(&'static str);

impl FieldKey {
    pub const fn new(value: &'static str) -> Self {
        Self(value)
    }

    pub const fn as_str(self) -> &'static str {
        self.0
    }
}

impl Display for FieldKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SubmitState {
    Idle,
    Submitting,
}

/// Which edits must exist before [`FormController::can_submit`] reports true.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub enum RequireChange {
    #[default]
    Never,
    AnyField,
    Fields(Vec<FieldKey>),
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct FormOptions {
    pub require_change: RequireChange,
    pub with_captcha: bool,
    /// Field ids are the bare field names instead of being prefixed with the form id.
    pub with_global_id: bool,
}

#[derive(Clone, Debug)]
pub struct FormSnapshot<T> {
    pub model: T,
    pub initial_model: T,
    pub submit_state: SubmitState,
    pub submit_count: u32,
    pub changes: Vec<FieldKey>,
    pub can_submit: bool,
    pub captcha_token: String,
    pub form_errors: Vec<String>,
    pub field_errors: BTreeMap<FieldKey, Vec<String>>,
}

impl<T> FormSnapshot<T> {
    pub fn is_dirty(&self) -> bool {
        !self.changes.is_empty()
    }

    pub fn submitting(&self) -> bool {
        self.submit_state == SubmitState::Submitting
    }
}

#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum FormError {
    #[error("form state lock poisoned while {0}")]
    StatePoisoned(&'static str),
    #[error("form submit is already in progress")]
    AlreadySubmitting,
}

pub type FormResult<T> = Result<T, FormError>;

pub(super) struct FormState<T> {
    pub(super) id: FormId,
    pub(super) initial_model: T,
    pub(super) model: T,
    pub(super) submit_state: SubmitState,
    pub(super) submit_count: u32,
    pub(super) captcha_token: String,
    pub(super) form_errors: Vec<String>,
    pub(super) field_errors: BTreeMap<FieldKey, Vec<String>>,
}

impl<T: FormModel> FormState<T> {
    pub(super) fn changes(&self) -> Vec<FieldKey> {
        self.model.changed_fields(&self.initial_model)
    }

    pub(super) fn clear_errors(&mut self) {
        self.form_errors.clear();
        self.field_errors.clear();
    }
}

/// Shared handle to one form's state.
///
/// Clones observe and mutate the same form. The submit action receives a
/// clone so it can read the captcha token or inspect the form mid-flight.
#[derive(Clone)]
pub struct FormController<T>
where
    T: FormModel,
{
    pub(super) options: Arc<FormOptions>,
    pub(super) state: Arc<RwLock<FormState<T>>>,
    pub(super) on_submit: SubmitAction<T>,
    pub(super) translator: Arc<dyn Translator>,
    pub(super) captcha: Option<Arc<dyn CaptchaProvider>>,
}

impl<T> FormController<T>
where
    T: FormModel,
{
    pub fn new<F, Fut>(initial: T, options: FormOptions, on_submit: F) -> Self
    where
        F: Fn(T, FormController<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), Rejection>> + Send + 'static,
    {
        let on_submit: SubmitAction<T> =
            Arc::new(move |values: T, form: FormController<T>| on_submit(values, form).boxed());
        Self {
            options: Arc::new(options),
            state: Arc::new(RwLock::new(FormState {
                id: FormId::next(),
                initial_model: initial.clone(),
                model: initial,
                submit_state: SubmitState::Idle,
                submit_count: 0,
                captcha_token: String::new(),
                form_errors: Vec::new(),
                field_errors: BTreeMap::new(),
            })),
            on_submit,
            translator: Arc::new(I18nManager::default()),
            captcha: None,
        }
    }

    pub fn with_translator(mut self, translator: impl Translator) -> Self {
        self.translator = Arc::new(translator);
        self
    }

    pub fn with_captcha_provider(mut self, provider: impl CaptchaProvider) -> Self {
        self.captcha = Some(Arc::new(provider));
        self
    }

    pub fn options(&self) -> &FormOptions {
        &self.options
    }

    pub fn form_id(&self) -> FormResult<FormId> {
        Ok(read_lock(&self.state, "reading form id")?.id)
    }

    /// Element id for a field, suitable for pairing a label with its control.
    pub fn field_id(&self, key: FieldKey) -> FormResult<String> {
        if self.options.with_global_id {
            return Ok(key.as_str().to_string());
        }
        Ok(format!("{}-{key}", self.form_id()?))
    }

    pub fn submitting(&self) -> FormResult<bool> {
        Ok(read_lock(&self.state, "reading submit state")?.submit_state == SubmitState::Submitting)
    }

    pub fn captcha_token(&self) -> FormResult<String> {
        Ok(read_lock(&self.state, "reading captcha token")?
            .captcha_token
            .clone())
    }

    pub fn form_errors(&self) -> FormResult<Vec<String>> {
        Ok(read_lock(&self.state, "reading form errors")?
            .form_errors
            .clone())
    }

    pub fn field_errors<L>(&self, lens: L) -> FormResult<Vec<String>>
    where
        L: FieldLens<T>,
    {
        Ok(read_lock(&self.state, "reading field errors")?
            .field_errors
            .get(&lens.key())
            .cloned()
            .unwrap_or_default())
    }

    pub fn changes(&self) -> FormResult<Vec<FieldKey>> {
        Ok(read_lock(&self.state, "reading changed fields")?.changes())
    }

    pub fn can_submit(&self) -> FormResult<bool> {
        let state = read_lock(&self.state, "reading submit gate")?;
        Ok(self.submit_allowed(&state))
    }

    /// Replaces the baseline and the values with `new_values`, or restores the
    /// values to the current baseline when `None`.
    pub fn reset(&self, new_values: Option<T>) -> FormResult<()> {
        let mut state = write_lock(&self.state, "resetting form")?;
        if let Some(values) = new_values {
            state.initial_model = values.clone();
            state.model = values;
        } else {
            state.model = state.initial_model.clone();
        }
        state.clear_errors();
        transition_submit_state(&mut state, SubmitState::Idle);
        Ok(())
    }

    pub fn clear_errors(&self) -> FormResult<()> {
        write_lock(&self.state, "clearing form errors")?.clear_errors();
        Ok(())
    }

    /// Names that `T` does not declare are dropped.
    pub fn set_field_errors<I, K>(&self, errors: I) -> FormResult<()>
    where
        I: IntoIterator<Item = (K, Vec<String>)>,
        K: AsRef<str>,
    {
        let errors = known_field_errors::<T, _, _>(errors);
        write_lock(&self.state, "writing field errors")?.field_errors = errors;
        Ok(())
    }

    pub fn set_submitting(&self, submitting: bool) -> FormResult<()> {
        let next = if submitting {
            SubmitState::Submitting
        } else {
            SubmitState::Idle
        };
        let mut state = write_lock(&self.state, "setting submit state")?;
        transition_submit_state(&mut state, next);
        Ok(())
    }

    pub fn snapshot(&self) -> FormResult<FormSnapshot<T>> {
        let state = read_lock(&self.state, "creating form snapshot")?;
        Ok(FormSnapshot {
            model: state.model.clone(),
            initial_model: state.initial_model.clone(),
            submit_state: state.submit_state,
            submit_count: state.submit_count,
            changes: state.changes(),
            can_submit: self.submit_allowed(&state),
            captcha_token: state.captcha_token.clone(),
            form_errors: state.form_errors.clone(),
            field_errors: state.field_errors.clone(),
        })
    }

    pub(super) fn submit_allowed(&self, state: &FormState<T>) -> bool {
        if state.submit_state == SubmitState::Submitting {
            return false;
        }
        match &self.options.require_change {
            RequireChange::Never => true,
            RequireChange::AnyField => !state.changes().is_empty(),
            RequireChange::Fields(required) => {
                let changes = state.changes();
                required.iter().all(|key| changes.contains(key))
            }
        }
    }
}

pub(super) fn known_field_errors<T, I, K>(errors: I) -> BTreeMap<FieldKey, Vec<String>>
where
    T: FormModel,
    I: IntoIterator<Item = (K, Vec<String>)>,
    K: AsRef<str>,
{
    let mut known = BTreeMap::new();
    for (name, messages) in errors {
        let name = name.as_ref();
        match T::field_keys().iter().find(|key| key.as_str() == name) {
            Some(key) => {
                known.insert(*key, messages);
            }
            None => tracing::warn!(field = name, "dropping errors for undeclared form field"),
        }
    }
    known
}

pub(super) fn transition_submit_state<T>(state: &mut FormState<T>, next: SubmitState) {
    if state.submit_state != next {
        tracing::trace!(
            form = %state.id,
            from = ?state.submit_state,
            to = ?next,
            "submit state transition"
        );
        state.submit_state = next;
    }
}

pub(super) fn read_lock<'a, T>(
    lock: &'a RwLock<T>,
    context: &'static str,
) -> FormResult<RwLockReadGuard<'a, T>> {
    lock.read().map_err(|_| FormError::StatePoisoned(context))
}

pub(super) fn write_lock<'a, T>(
    lock: &'a RwLock<T>,
    context: &'static str,
) -> FormResult<RwLockWriteGuard<'a, T>> {
    lock.write().map_err(|_| FormError::StatePoisoned(context))
}
