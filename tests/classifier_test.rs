//! Classifier behaviour against a mocked generate endpoint.

use httpmock::prelude::*;
use serde_json::json;
use std::time::Duration;
use timesheet_agent::classifier::{
    build_prompt, BlockingClassifier, Category, Classifier, ClassifierClient, ClassifierConfig,
    ClassifierError,
};

fn config_for(server: &MockServer) -> ClassifierConfig {
    ClassifierConfig {
        endpoint: server.url("/api/generate"),
        timeout: Duration::from_secs(2),
        ..ClassifierConfig::default()
    }
}

#[test]
fn test_sends_model_prompt_and_no_streaming() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST).path("/api/generate").json_body(json!({
            "model": "gemma3:4b",
            "prompt": build_prompt("Lecture 3 - Linear Algebra.pdf"),
            "stream": false
        }));
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!({ "model": "gemma3:4b", "response": "study", "done": true }));
    });

    let classifier = BlockingClassifier::new(config_for(&server)).unwrap();
    assert_eq!(
        classifier.classify("Lecture 3 - Linear Algebra.pdf"),
        Category::Study
    );
    mock.assert();
}

#[test]
fn test_response_is_trimmed() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/api/generate");
        then.status(200)
            .json_body(json!({ "response": "  Work\n", "done": true }));
    });

    let classifier = BlockingClassifier::new(config_for(&server)).unwrap();
    assert_eq!(classifier.classify("Quarterly report.xlsx"), Category::Work);
}

#[test]
fn test_out_of_set_label_kept_verbatim() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/api/generate");
        then.status(200).json_body(json!({ "response": "Gaming" }));
    });

    let classifier = BlockingClassifier::new(config_for(&server)).unwrap();
    let category = classifier.classify("Steam");
    assert_eq!(category, Category::Other("Gaming".to_string()));
    assert!(!category.is_error());
}

#[test]
fn test_out_of_set_label_coerced_when_enabled() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/api/generate");
        then.status(200).json_body(json!({ "response": "Gaming" }));
    });

    let config = ClassifierConfig {
        coerce_unknown_categories: true,
        ..config_for(&server)
    };
    let classifier = BlockingClassifier::new(config).unwrap();
    assert_eq!(
        classifier.classify("Steam").as_stored(),
        "unclassified".to_string()
    );
}

#[test]
fn test_server_error_becomes_error_category() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/api/generate");
        then.status(500).body("model not loaded");
    });

    let classifier = BlockingClassifier::new(config_for(&server)).unwrap();
    match classifier.classify("Editor") {
        Category::Error(cause) => {
            assert!(cause.contains("500"));
            assert!(cause.contains("model not loaded"));
        }
        other => panic!("expected error category, got {other:?}"),
    }
}

#[test]
fn test_malformed_body_becomes_error_category() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/api/generate");
        then.status(200).body("<html>not json</html>");
    });

    let classifier = BlockingClassifier::new(config_for(&server)).unwrap();
    let category = classifier.classify("Editor");
    assert!(category.is_error());
    assert!(category.as_stored().starts_with("error: malformed response"));
}

#[test]
fn test_missing_response_field_is_an_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/api/generate");
        then.status(200).json_body(json!({ "done": true }));
    });

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let client = ClassifierClient::new(config_for(&server)).unwrap();
    let err = runtime.block_on(client.request_label("Editor")).unwrap_err();
    assert!(matches!(err, ClassifierError::Malformed(_)));
}

#[test]
fn test_empty_answer_is_an_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/api/generate");
        then.status(200).json_body(json!({ "response": "  \n" }));
    });

    let classifier = BlockingClassifier::new(config_for(&server)).unwrap();
    assert!(classifier.classify("Editor").is_error());
}

#[test]
fn test_slow_service_times_out() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/api/generate");
        then.status(200)
            .delay(Duration::from_secs(3))
            .json_body(json!({ "response": "work" }));
    });

    let config = ClassifierConfig {
        timeout: Duration::from_millis(300),
        ..config_for(&server)
    };
    let classifier = BlockingClassifier::new(config).unwrap();
    assert_eq!(
        classifier.classify("Editor"),
        Category::Error("classification timed out".to_string())
    );
}
