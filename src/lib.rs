pub mod form;
mod i18n;
pub mod prelude;

#[cfg(test)]
mod test_public_api;

pub use i18n::{I18nManager, Locale, Translator};
