use super::controller::{FieldKey, FormController, FormResult, read_lock, write_lock};

pub trait FieldLens<T>: Copy + Send + Sync + 'static {
    type Value: Clone + PartialEq + Send + Sync + 'static;

    fn key(self) -> FieldKey;
    fn get<'a>(self, model: &'a T) -> &'a Self::Value;
    fn set(self, model: &mut T, value: Self::Value);
}

/// A struct whose named fields are the fields of a form.
///
/// Usually derived with `#[derive(FormModel)]`, which also generates one
/// [`FieldLens`] per field.
pub trait FormModel: Clone + Send + Sync + 'static {
    type Fields;

    fn fields() -> Self::Fields;

    /// Every field key, in declaration order.
    fn field_keys() -> &'static [FieldKey];

    /// Keys of the fields whose value differs from `baseline`, in declaration order.
    fn changed_fields(&self, baseline: &Self) -> Vec<FieldKey>;
}

impl<T> FormController<T>
where
    T: FormModel,
{
    /// Replaces one field's value. Allowed while a submit is in flight.
    pub fn set<L>(&self, lens: L, value: L::Value) -> FormResult<()>
    where
        L: FieldLens<T>,
    {
        let mut state = write_lock(&self.state, "writing form model")?;
        lens.set(&mut state.model, value);
        Ok(())
    }

    pub fn value<L>(&self, lens: L) -> FormResult<L::Value>
    where
        L: FieldLens<T>,
    {
        Ok(lens.get(&read_lock(&self.state, "reading field value")?.model).clone())
    }

    pub fn is_changed<L>(&self, lens: L) -> FormResult<bool>
    where
        L: FieldLens<T>,
    {
        let state = read_lock(&self.state, "reading field change state")?;
        Ok(lens.get(&state.model) != lens.get(&state.initial_model))
    }

    pub fn reset_field<L>(&self, lens: L) -> FormResult<()>
    where
        L: FieldLens<T>,
    {
        let mut state = write_lock(&self.state, "resetting field")?;
        let initial_value = lens.get(&state.initial_model).clone();
        lens.set(&mut state.model, initial_value);
        state.field_errors.remove(&lens.key());
        Ok(())
    }
}
