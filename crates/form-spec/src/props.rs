use serde_json::{Map, Value};

/// Merges registry defaults with backend-supplied props.
///
/// Backend values replace defaults key by key, except `validations`, where
/// both arrays are kept with the defaults first.
pub fn merge_props(defaults: &Map<String, Value>, backend: &Map<String, Value>) -> Map<String, Value> {
    let mut merged = defaults.clone();
    for (key, value) in backend {
        if key == "validations"
            && let Some(Value::Array(base)) = merged.get("validations")
            && let Value::Array(extra) = value
        {
            let mut combined = base.clone();
            combined.extend(extra.iter().cloned());
            merged.insert(key.clone(), Value::Array(combined));
            continue;
        }
        merged.insert(key.clone(), value.clone());
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn backend_scalars_override_defaults() {
        let merged = merge_props(
            &map(json!({ "min": 0, "max": 100, "step": 1 })),
            &map(json!({ "max": 10 })),
        );
        assert_eq!(merged["min"], 0);
        assert_eq!(merged["max"], 10);
        assert_eq!(merged["step"], 1);
    }

    #[test]
    fn validations_concatenate_defaults_first() {
        let merged = merge_props(
            &map(json!({ "validations": [{ "type": "email" }] })),
            &map(json!({ "validations": [{ "type": "required" }], "label": "Email" })),
        );
        assert_eq!(
            merged["validations"],
            json!([{ "type": "email" }, { "type": "required" }])
        );
        assert_eq!(merged["label"], "Email");
    }

    #[test]
    fn backend_validations_apply_without_defaults() {
        let merged = merge_props(
            &Map::new(),
            &map(json!({ "validations": [{ "type": "required" }] })),
        );
        assert_eq!(merged["validations"], json!([{ "type": "required" }]));
    }
}
