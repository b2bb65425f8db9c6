use std::sync::Arc;

use serde_json::{Value, json};

use form_spec::{
    FileStorage, FormOptions, FormSpec, FormStorage, MemoryStorage, MultiStepForm, StepSpec,
};

fn persisted_spec() -> FormSpec {
    let mut spec = FormSpec::new(vec![StepSpec {
        id: "only".into(),
        title: "Only".into(),
        description: None,
        fields: Vec::new(),
    }]);
    spec.persist_data = true;
    spec
}

fn stored(storage: &dyn FormStorage, key: &str) -> Value {
    let raw = storage.get(key).expect("get").expect("entry present");
    serde_json::from_str(&raw).expect("stored json")
}

#[test]
fn verification_sessions_are_never_persisted() {
    let storage = Arc::new(MemoryStorage::new());
    let mut form = MultiStepForm::builder(persisted_spec())
        .storage(storage.clone())
        .build()
        .expect("form");

    form.update_step_data(
        json!({
            "idVerification": { "sessionId": "X", "completed": true },
            "fullName": "A"
        })
        .as_object()
        .cloned()
        .expect("patch"),
    );

    assert_eq!(stored(&*storage, "multi-step-form-data"), json!({ "fullName": "A" }));
    assert_eq!(form.form_data()["idVerification"]["sessionId"], "X");
}

#[test]
fn host_patterns_replace_the_defaults() {
    let storage = Arc::new(MemoryStorage::new());
    let mut form = MultiStepForm::builder(persisted_spec())
        .storage(storage.clone())
        .options(FormOptions {
            sensitive_patterns: vec!["selfie*".into()],
            ..FormOptions::default()
        })
        .build()
        .expect("form");

    form.update_field("selfieCheck", json!({ "sessionId": "S" }));
    form.update_field("kycResult", json!({ "sessionId": "K" }));

    assert_eq!(
        stored(&*storage, "multi-step-form-data"),
        json!({ "kycResult": { "sessionId": "K" } })
    );
}

#[test]
fn forms_without_persistence_only_save_on_request() {
    let storage = Arc::new(MemoryStorage::new());
    let mut spec = persisted_spec();
    spec.persist_data = false;
    let mut form = MultiStepForm::builder(spec)
        .storage(storage.clone())
        .build()
        .expect("form");

    form.update_field("fullName", json!("A"));
    assert_eq!(storage.get("multi-step-form-data").expect("get"), None);

    form.save_form_data().expect("manual save");
    assert_eq!(stored(&*storage, "multi-step-form-data"), json!({ "fullName": "A" }));
}

#[test]
fn file_storage_restores_progress_across_instances() {
    let dir = tempfile::tempdir().expect("temp dir");
    let storage = Arc::new(FileStorage::new(dir.path()));

    let mut first = MultiStepForm::builder(persisted_spec())
        .storage(storage.clone())
        .build()
        .expect("form");
    first.update_field("email", json!("ada@example.com"));

    let second = MultiStepForm::builder(persisted_spec())
        .storage(storage)
        .build()
        .expect("form");
    assert_eq!(second.form_data()["email"], "ada@example.com");
}

#[test]
fn corrupt_entries_are_reported_on_manual_load() {
    let storage = Arc::new(MemoryStorage::new());
    storage.set("multi-step-form-data", "not json").expect("set");

    let mut form = MultiStepForm::builder(persisted_spec())
        .storage(storage)
        .build()
        .expect("construction tolerates corrupt entries");
    assert!(form.form_data().is_empty());
    assert!(form.load_form_data().is_err());
}
