#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Manifest policy tests for the Drinkingames client.
//!
//! These tests parse `Cargo.toml` and fail when the crate's lint policy,
//! feature layout or demo targets drift from what the project relies on.
//! All checks are synchronous filesystem reads.

use std::path::PathBuf;

use toml::Value;

fn project_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}

fn manifest() -> Value {
    let path = project_root().join("Cargo.toml");
    let text = std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("Failed to read '{}': {e}", path.display()));
    toml::from_str(&text).expect("Cargo.toml must be valid TOML")
}

fn string_list(value: &Value) -> Vec<&str> {
    value
        .as_array()
        .expect("expected an array")
        .iter()
        .map(|v| v.as_str().expect("expected a string"))
        .collect()
}

#[test]
fn panicking_shortcuts_are_denied() {
    let manifest = manifest();
    let clippy = &manifest["lints"]["clippy"];
    for lint in [
        "unwrap_used",
        "expect_used",
        "panic",
        "todo",
        "unimplemented",
        "indexing_slicing",
    ] {
        assert_eq!(
            clippy.get(lint).and_then(Value::as_str),
            Some("deny"),
            "clippy::{lint} must be denied in Cargo.toml"
        );
    }
}

#[test]
fn websocket_transport_is_default_and_pulls_in_the_runtime() {
    let manifest = manifest();
    let features = &manifest["features"];
    assert_eq!(string_list(&features["default"]), ["transport-websocket"]);

    let websocket = string_list(&features["transport-websocket"]);
    assert!(websocket.contains(&"tokio-runtime"));
    assert!(websocket.contains(&"dep:tokio-tungstenite"));

    let runtime = string_list(&features["tokio-runtime"]);
    assert!(runtime.contains(&"tokio/rt"));
    assert!(runtime.contains(&"tokio/time"));
}

#[test]
fn websocket_dependencies_are_optional() {
    let manifest = manifest();
    let deps = &manifest["dependencies"];
    for dep in ["tokio-tungstenite", "futures-util"] {
        assert_eq!(
            deps[dep].get("optional").and_then(Value::as_bool),
            Some(true),
            "{dep} must stay behind the transport-websocket feature"
        );
    }
}

#[test]
fn msrv_is_declared() {
    let manifest = manifest();
    let msrv = manifest["package"]["rust-version"]
        .as_str()
        .expect("Cargo.toml must declare a rust-version");
    assert_eq!(msrv.split('.').count(), 3, "rust-version must be MAJOR.MINOR.PATCH");
}

#[test]
fn demo_targets_exist() {
    let manifest = manifest();
    let demos = manifest["example"].as_array().expect("demo targets");
    assert!(!demos.is_empty());
    for demo in demos {
        let path = demo["path"].as_str().expect("demo path");
        assert!(
            project_root().join(path).is_file(),
            "demo target '{path}' does not exist"
        );
        assert!(
            demo.get("required-features").is_some(),
            "demo '{path}' must declare its required features"
        );
    }
}

fn rust_sources(dir: &std::path::Path, out: &mut Vec<String>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            rust_sources(&path, out);
        } else if path.extension().is_some_and(|ext| ext == "rs") {
            out.push(std::fs::read_to_string(&path).unwrap());
        }
    }
}

#[test]
fn every_dev_dependency_is_used() {
    let manifest = manifest();
    let dev = manifest["dev-dependencies"]
        .as_table()
        .expect("[dev-dependencies] must be a table");

    let mut sources = Vec::new();
    for dir in ["src", "tests", "demos"] {
        rust_sources(&project_root().join(dir), &mut sources);
    }

    for name in dev.keys() {
        let ident = name.replace('-', "_");
        assert!(
            sources.iter().any(|text| text.contains(&format!("{ident}::"))),
            "dev-dependency {name} is not referenced by any source, test or demo"
        );
    }
}
