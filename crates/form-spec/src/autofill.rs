//! Mapping of identity-verification results into form data.
//!
//! The verification flow itself runs outside the engine; all the engine sees
//! is the finished result, turned into a plain patch by [`map`].

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::schema::{coerce_date, format_date};

/// Field that carries the verification marker inside form data.
pub const VERIFICATION_FIELD: &str = "idVerification";

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedPerson {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nationality: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_until: Option<String>,
}

/// Finished result handed over by the external verification flow.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub person: Option<VerifiedPerson>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<VerifiedDocument>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision_time: Option<String>,
}

/// Approved results with a session id are the only ones worth applying.
pub fn is_valid(result: &VerificationResult) -> bool {
    result.status.eq_ignore_ascii_case("approved")
        && result
            .session_id
            .as_deref()
            .is_some_and(|session| !session.trim().is_empty())
}

/// Converts a result into a form-data patch; absent values are omitted.
pub fn map(result: &VerificationResult) -> Map<String, Value> {
    let mut patch = Map::new();
    let mut put = |key: &str, value: Option<&String>| {
        if let Some(value) = value.filter(|value| !value.trim().is_empty()) {
            patch.insert(key.to_string(), Value::String(value.trim().to_string()));
        }
    };

    if let Some(person) = &result.person {
        put("firstName", person.first_name.as_ref());
        put("lastName", person.last_name.as_ref());
        put("nationality", person.nationality.as_ref());
        put("gender", person.gender.as_ref());
        put("address", person.address.as_ref());
        let birth = person.date_of_birth.as_ref().map(|raw| normalize_date(raw));
        put("dateOfBirth", birth.as_ref());
    }
    if let Some(document) = &result.document {
        put("documentNumber", document.number.as_ref());
        put("documentType", document.kind.as_ref());
        put("documentCountry", document.country.as_ref());
        let expiry = document.valid_until.as_ref().map(|raw| normalize_date(raw));
        put("documentExpiry", expiry.as_ref());
    }

    if let Some(person) = &result.person {
        let full_name = [person.first_name.as_deref(), person.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if !full_name.is_empty() {
            patch.insert("fullName".into(), Value::String(full_name));
        }
    }

    let mut marker = Map::new();
    marker.insert("completed".into(), json!(is_valid(result)));
    if let Some(session) = &result.session_id {
        marker.insert("sessionId".into(), json!(session));
    }
    if let Some(timestamp) = &result.decision_time {
        marker.insert("timestamp".into(), json!(timestamp));
    }
    patch.insert(VERIFICATION_FIELD.into(), Value::Object(marker));

    patch
}

fn normalize_date(raw: &str) -> String {
    coerce_date(&Value::String(raw.to_string()))
        .map(format_date)
        .unwrap_or_else(|| raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approved() -> VerificationResult {
        serde_json::from_value(json!({
            "status": "approved",
            "sessionId": "sess-1",
            "decisionTime": "2024-05-01T10:00:00Z",
            "person": {
                "firstName": "Jane",
                "lastName": " Doe ",
                "dateOfBirth": "1990-02-03T00:00:00Z",
                "nationality": "NL"
            },
            "document": { "number": "X123", "type": "PASSPORT", "validUntil": "2030-01-01" }
        }))
        .expect("result")
    }

    #[test]
    fn approved_result_maps_person_and_document() {
        let result = approved();
        assert!(is_valid(&result));
        let patch = map(&result);
        assert_eq!(patch["firstName"], "Jane");
        assert_eq!(patch["lastName"], "Doe");
        assert_eq!(patch["fullName"], "Jane Doe");
        assert_eq!(patch["dateOfBirth"], "1990-02-03");
        assert_eq!(patch["documentType"], "PASSPORT");
        assert_eq!(patch["documentExpiry"], "2030-01-01");
        assert!(!patch.contains_key("gender"));
        assert_eq!(
            patch[VERIFICATION_FIELD],
            json!({ "completed": true, "sessionId": "sess-1", "timestamp": "2024-05-01T10:00:00Z" })
        );
    }

    #[test]
    fn declined_or_sessionless_results_are_invalid() {
        let mut result = approved();
        result.status = "declined".into();
        assert!(!is_valid(&result));
        assert_eq!(map(&result)[VERIFICATION_FIELD]["completed"], false);

        let mut result = approved();
        result.session_id = Some("  ".into());
        assert!(!is_valid(&result));
    }
}
