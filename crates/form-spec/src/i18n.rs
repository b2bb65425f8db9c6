use std::collections::BTreeMap;

use handlebars::Handlebars;
use once_cell::sync::Lazy;
use serde_json::Value;
use tracing::debug;

/// Message lookup supplied by the host.
pub trait Translate {
    fn translate(&self, key: &str) -> Option<String>;
}

/// Translator that never resolves anything; literal fallbacks always win.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTranslator;

impl Translate for NoopTranslator {
    fn translate(&self, _key: &str) -> Option<String> {
        None
    }
}

/// Flat key → message catalogue.
///
/// Nested message documents are flattened into dotted keys, so
/// `{"form": {"name": "Name"}}` answers `form.name`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    entries: BTreeMap<String, String>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_value(messages: &Value) -> Self {
        let mut catalog = Self::new();
        flatten_into(&mut catalog.entries, String::new(), messages);
        catalog
    }

    pub fn insert(&mut self, key: impl Into<String>, message: impl Into<String>) {
        self.entries.insert(key.into(), message.into());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Translate for Catalog {
    fn translate(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }
}

fn flatten_into(entries: &mut BTreeMap<String, String>, prefix: String, value: &Value) {
    match value {
        Value::Object(map) => {
            for (key, nested) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", prefix, key)
                };
                flatten_into(entries, path, nested);
            }
        }
        Value::String(text) if !prefix.is_empty() => {
            entries.insert(prefix, text.clone());
        }
        _ => {}
    }
}

/// Resolves display text: the key at the root namespace, then the key under
/// `namespace`, then the literal `fallback`.
pub fn resolve_text(
    translator: &dyn Translate,
    key: Option<&str>,
    namespace: Option<&str>,
    fallback: Option<&str>,
) -> Option<String> {
    if let Some(key) = key.filter(|key| !key.is_empty()) {
        if let Some(text) = translator.translate(key) {
            return Some(text);
        }
        if let Some(namespace) = namespace.filter(|namespace| !namespace.is_empty())
            && let Some(text) = translator.translate(&format!("{}.{}", namespace, key))
        {
            return Some(text);
        }
        debug!(key, namespace, "translation key unresolved; using fallback");
    }
    fallback.map(str::to_string)
}

static TEMPLATES: Lazy<Handlebars<'static>> = Lazy::new(|| {
    let mut registry = Handlebars::new();
    registry.register_escape_fn(handlebars::no_escape);
    registry
});

/// Renders `{{name}}` placeholders in a message from `args`.
pub fn interpolate(template: &str, args: &Value) -> String {
    if !template.contains("{{") {
        return template.to_string();
    }
    match TEMPLATES.render_template(template, args) {
        Ok(text) => text,
        Err(err) => {
            debug!(%err, template, "message interpolation failed; using raw template");
            template.to_string()
        }
    }
}
