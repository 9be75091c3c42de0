use super::controller::{FieldKey, FormController, FormResult, SubmitState, read_lock};
use super::model::{FieldLens, FormModel};

/// Everything a renderer needs to bind one input to the form.
///
/// Re-derived from the form state on every [`FormController::field`] call;
/// holding one does not track later changes.
#[derive(Clone)]
pub struct Field<T, L>
where
    T: FormModel,
    L: FieldLens<T>,
{
    pub name: FieldKey,
    pub id: String,
    pub value: L::Value,
    pub changed: bool,
    pub disabled: bool,
    pub errors: Vec<String>,
    controller: FormController<T>,
    lens: L,
}

impl<T, L> Field<T, L>
where
    T: FormModel,
    L: FieldLens<T>,
{
    pub fn label_for(&self) -> &str {
        &self.id
    }

    pub fn first_error(&self) -> Option<&str> {
        self.errors.first().map(String::as_str)
    }

    pub fn set(&self, value: L::Value) -> FormResult<()> {
        self.controller.set(self.lens, value)
    }
}

impl<T> FormController<T>
where
    T: FormModel,
{
    pub fn field<L>(&self, lens: L) -> FormResult<Field<T, L>>
    where
        L: FieldLens<T>,
    {
        let key = lens.key();
        let id = self.field_id(key)?;
        let state = read_lock(&self.state, "reading field accessor")?;
        let value = lens.get(&state.model).clone();
        let changed = &value != lens.get(&state.initial_model);
        Ok(Field {
            name: key,
            id,
            value,
            changed,
            disabled: state.submit_state == SubmitState::Submitting,
            errors: state.field_errors.get(&key).cloned().unwrap_or_default(),
            controller: self.clone(),
            lens,
        })
    }
}
