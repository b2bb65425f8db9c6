//! Closed table of renderable widgets keyed by component name.
//!
//! Configurations arrive from a backend and may name components this build
//! does not implement, so lookups never fail hard: [`get`] answers `None`
//! and callers render an inline placeholder for that one field.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::Serialize;
use serde_json::{Map, Value, json};
use tracing::warn;

use crate::error::FormError;

/// Every widget this build can render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum WidgetKind {
    Input,
    EmailInput,
    PhoneInput,
    PasswordInput,
    Textarea,
    Select,
    RadioGroup,
    Combobox,
    Checkbox,
    Switch,
    Slider,
    DatePicker,
    DateRangePicker,
    ToggleGroup,
    InputOtp,
    IdVerification,
    Heading,
    Paragraph,
    Alert,
    Separator,
    Button,
    Link,
}

/// Value family of a widget; decides the schema base type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldFamily {
    Text,
    Choice,
    Boolean,
    Numeric,
    Date,
    DateRange,
    ToggleGroup,
    IdentityVerification,
    Display,
    Action,
}

impl FieldFamily {
    /// Display and action widgets carry no form value.
    pub fn binds_value(self) -> bool {
        !matches!(self, FieldFamily::Display | FieldFamily::Action)
    }
}

/// Registry entry describing one widget.
#[derive(Debug, Clone)]
pub struct Widget {
    pub name: &'static str,
    pub kind: WidgetKind,
    pub family: FieldFamily,
    defaults: Map<String, Value>,
}

impl Widget {
    fn new(name: &'static str, kind: WidgetKind, family: FieldFamily) -> Self {
        Self {
            name,
            kind,
            family,
            defaults: Map::new(),
        }
    }

    fn with_defaults(mut self, defaults: Value) -> Self {
        if let Value::Object(map) = defaults {
            self.defaults = map;
        }
        self
    }

    pub fn binds_value(&self) -> bool {
        self.family.binds_value()
    }

    /// Props merged underneath whatever the backend supplies.
    pub fn default_props(&self) -> &Map<String, Value> {
        &self.defaults
    }
}

static REGISTRY: Lazy<HashMap<&'static str, Widget>> = Lazy::new(|| {
    use FieldFamily as F;
    use WidgetKind as K;

    let widgets = vec![
        Widget::new("Input", K::Input, F::Text),
        Widget::new("EmailInput", K::EmailInput, F::Text).with_defaults(json!({
            "inputType": "email",
            "validations": [{ "type": "email" }]
        })),
        Widget::new("PhoneInput", K::PhoneInput, F::Text).with_defaults(json!({
            "inputType": "tel",
            "validations": [{ "type": "regex", "value": "^\\+?[0-9 ()-]{6,20}$" }]
        })),
        Widget::new("PasswordInput", K::PasswordInput, F::Text)
            .with_defaults(json!({ "inputType": "password" })),
        Widget::new("Textarea", K::Textarea, F::Text).with_defaults(json!({ "rows": 4 })),
        Widget::new("Select", K::Select, F::Choice),
        Widget::new("RadioGroup", K::RadioGroup, F::Choice),
        Widget::new("Combobox", K::Combobox, F::Choice),
        Widget::new("Checkbox", K::Checkbox, F::Boolean),
        Widget::new("Switch", K::Switch, F::Boolean),
        Widget::new("Slider", K::Slider, F::Numeric)
            .with_defaults(json!({ "min": 0, "max": 100, "step": 1 })),
        Widget::new("DatePicker", K::DatePicker, F::Date),
        Widget::new("DateRangePicker", K::DateRangePicker, F::DateRange),
        Widget::new("ToggleGroup", K::ToggleGroup, F::ToggleGroup)
            .with_defaults(json!({ "type": "single" })),
        Widget::new("InputOTP", K::InputOtp, F::Text).with_defaults(json!({ "maxLength": 6 })),
        Widget::new("IdVerification", K::IdVerification, F::IdentityVerification),
        Widget::new("Heading", K::Heading, F::Display).with_defaults(json!({ "level": 2 })),
        Widget::new("Paragraph", K::Paragraph, F::Display),
        Widget::new("Alert", K::Alert, F::Display).with_defaults(json!({ "variant": "default" })),
        Widget::new("Separator", K::Separator, F::Display),
        Widget::new("Button", K::Button, F::Action),
        Widget::new("Link", K::Link, F::Action),
    ];

    widgets
        .into_iter()
        .map(|widget| (widget.name, widget))
        .collect()
});

pub fn is_registered(name: &str) -> bool {
    REGISTRY.contains_key(name)
}

/// Looks a widget up by component name; unknown names log and return `None`.
pub fn get(name: &str) -> Option<&'static Widget> {
    let widget = REGISTRY.get(name);
    if widget.is_none() {
        warn!(component = name, "component is not registered");
    }
    widget
}

/// Like [`get`], but yields a typed error for unknown names.
pub fn resolve(name: &str) -> Result<&'static Widget, FormError> {
    get(name).ok_or_else(|| FormError::UnknownComponent(name.to_string()))
}

/// Registered component names in sorted order.
pub fn names() -> Vec<&'static str> {
    let mut names = REGISTRY.keys().copied().collect::<Vec<_>>();
    names.sort_unstable();
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_component_returns_none() {
        assert!(get("DoesNotExist").is_none());
        assert!(!is_registered("DoesNotExist"));
        assert!(matches!(
            resolve("DoesNotExist"),
            Err(FormError::UnknownComponent(name)) if name == "DoesNotExist"
        ));
    }

    #[test]
    fn known_components_resolve_to_their_family() {
        let slider = get("Slider").expect("slider");
        assert_eq!(slider.kind, WidgetKind::Slider);
        assert_eq!(slider.family, FieldFamily::Numeric);
        assert!(slider.binds_value());
        assert!(!get("Heading").expect("heading").binds_value());
        assert_eq!(get("InputOTP").expect("otp").kind, WidgetKind::InputOtp);
    }

    #[test]
    fn names_are_sorted_and_complete() {
        let names = names();
        assert_eq!(names.len(), 22);
        assert!(names.windows(2).all(|pair| pair[0] <= pair[1]));
    }
}
