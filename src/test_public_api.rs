use crate::prelude::*;
use futures::executor::block_on;
use futures::future;

#[derive(Clone, Debug, PartialEq, crate::form::FormModel)]
struct LoginForm {
    email: String,
    password: String,
}

#[test]
fn prelude_covers_a_complete_form_round_trip() {
    let fields = LoginForm::fields();
    let form = FormController::new(
        LoginForm {
            email: String::new(),
            password: String::new(),
        },
        FormOptions {
            require_change: RequireChange::Fields(vec![
                fields.email().key(),
                fields.password().key(),
            ]),
            with_captcha: false,
            with_global_id: true,
        },
        |values: LoginForm, _form: FormController<LoginForm>| {
            future::ready(if values.password == "hunter2" {
                Ok(())
            } else {
                Err(Rejection::from(ApiError::new(
                    "invalid_credentials",
                    serde_json::json!({}),
                )))
            })
        },
    )
    .with_translator(I18nManager::with_locale(Locale::Tag("en-US".into())));

    form.set(fields.email(), "ada@example.com".into()).expect("set email");
    form.set(fields.password(), "wrong".into()).expect("set password");
    assert!(form.can_submit().expect("can submit"));

    let outcome = block_on(form.submit()).expect("submit");
    assert_eq!(
        outcome.errors,
        vec!["The email or password you entered is incorrect.".to_string()]
    );

    form.set(fields.password(), "hunter2".into()).expect("set password");
    assert!(block_on(form.submit()).expect("submit").is_success());
    assert!(!form.can_submit().expect("can submit"));
    assert_eq!(form.field(fields.email()).expect("field").label_for(), "email");
}

#[test]
fn form_errors_render_human_messages() {
    assert_eq!(
        FormError::AlreadySubmitting.to_string(),
        "form submit is already in progress"
    );
    assert_eq!(
        FormError::StatePoisoned("resetting form").to_string(),
        "form state lock poisoned while resetting form"
    );
    assert_eq!(
        CaptchaError("expired".into()).to_string(),
        "captcha challenge failed: expired"
    );
}
