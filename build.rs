use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;
use std::{env, fs};

const DEFAULT_LOCALE: &str = "en-US";

fn main() {
    println!("cargo:rerun-if-changed=locales");

    let manifest_dir = env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR is set by cargo");
    let out_dir = env::var("OUT_DIR").expect("OUT_DIR is set by cargo");
    let locales_dir = Path::new(&manifest_dir).join("locales");

    let mut locales = BTreeMap::<String, BTreeMap<String, String>>::new();
    if locales_dir.is_dir() {
        let entries = fs::read_dir(&locales_dir).expect("locales directory must be readable");
        for entry in entries {
            let path = entry.expect("locale entry must be readable").path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("toml") {
                continue;
            }
            println!("cargo:rerun-if-changed={}", path.display());

            let Some(tag) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            let source = fs::read_to_string(&path)
                .unwrap_or_else(|error| panic!("failed to read {}: {error}", path.display()));
            let table = source
                .parse::<toml::Table>()
                .unwrap_or_else(|error| panic!("failed to parse {}: {error}", path.display()));

            let mut entries = BTreeMap::new();
            flatten("", &table, &mut entries);
            locales.insert(tag.to_string(), entries);
        }
    }

    let mut generated = String::new();
    writeln!(generated, "pub const DEFAULT_LOCALE: &str = {DEFAULT_LOCALE:?};").ok();
    writeln!(generated, "pub static LOCALES: &[(&str, &[(&str, &str)])] = &[").ok();
    for (tag, entries) in &locales {
        writeln!(generated, "    ({tag:?}, &[").ok();
        for (key, value) in entries {
            writeln!(generated, "        ({key:?}, {value:?}),").ok();
        }
        writeln!(generated, "    ]),").ok();
    }
    writeln!(generated, "];").ok();

    fs::write(
        Path::new(&out_dir).join("inputform_i18n_generated.rs"),
        generated,
    )
    .expect("generated i18n catalog must be writable");
}

fn flatten(prefix: &str, table: &toml::Table, out: &mut BTreeMap<String, String>) {
    for (key, value) in table {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            toml::Value::Table(nested) => flatten(&path, nested, out),
            toml::Value::String(text) => {
                out.insert(path, text.clone());
            }
            other => {
                out.insert(path, other.to_string());
            }
        }
    }
}
