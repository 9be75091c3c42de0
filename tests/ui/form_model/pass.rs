use inputform::form::{FieldLens, FormModel};

#[derive(Clone, inputform::form::FormModel)]
struct DemoForm {
    email: String,
    languages: Vec<String>,
}

fn main() {
    let fields = DemoForm::fields();
    let lens = fields.email();
    let baseline = DemoForm {
        email: "a@example.com".to_string(),
        languages: vec!["en".to_string()],
    };
    let mut model = baseline.clone();
    lens.set(&mut model, "b@example.com".to_string());
    assert_eq!(lens.key().as_str(), "email");
    assert_eq!(lens.get(&model), "b@example.com");
    assert_eq!(model.changed_fields(&baseline), vec![lens.key()]);
    assert_eq!(DemoForm::field_keys().len(), 2);
}
