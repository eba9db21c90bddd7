//! Integration tests for soma_presets organ operations

use serde_json::{json, Value};
use soma_presets::builtins;
use soma_presets::organ::{Organ, PresetOrgan, Response, Stimulus};
use soma_presets::PresetConfig;
use std::collections::HashMap;
use tempfile::TempDir;

const WARM_SIDECAR: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<x:xmpmeta xmlns:x="adobe:ns:meta/" x:xmptk="Adobe XMP Core 7.0">
 <rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#">
  <rdf:Description rdf:about=""
    xmlns:crs="http://ns.adobe.com/camera-raw-settings/1.0/"
    crs:Version="15.0"
    crs:ProcessVersion="11.0"
    crs:Temperature="4726"
    crs:Tint="-2"
    crs:Exposure2012="50"
    crs:Contrast2012="-25"
    crs:Clarity2012="15"
    crs:HasSettings="True"/>
 </rdf:RDF>
</x:xmpmeta>"#;

/// Helper to create a test stimulus
fn create_stimulus(op: &str, input: Value) -> Stimulus {
    Stimulus {
        op: op.to_string(),
        input,
        context: HashMap::new(),
    }
}

async fn call(organ: &PresetOrgan, op: &str, input: Value) -> Response {
    organ.stimulate(create_stimulus(op, input)).await.unwrap()
}

fn organ() -> PresetOrgan {
    PresetOrgan::open(PresetConfig::default()).unwrap()
}

async fn upload(organ: &PresetOrgan, name: &str, camera_models: &[&str]) -> String {
    let response = call(
        organ,
        "preset.ingest_sidecar",
        json!({
            "content": WARM_SIDECAR,
            "name": name,
            "camera_models": camera_models,
            "original_filename": format!("{}.xmp", name),
        }),
    )
    .await;
    assert!(response.ok, "upload failed: {}", response.output);
    response.output["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_presets_capabilities() {
    let organ = organ();

    let response = call(&organ, "presets.capabilities", json!({})).await;

    assert!(response.ok);
    assert_eq!(response.output["name"], "soma_presets");
    let functions = response.output["functions"].as_array().unwrap();
    assert_eq!(functions.len(), 10);
}

#[tokio::test]
async fn test_organ_describe() {
    let card = organ().describe();

    assert_eq!(card.division, "media");
    assert!(card.execution_modes.contains(&"server".to_string()));
    assert!(card.author.is_some());
    assert!(card
        .functions
        .iter()
        .all(|f| f.name == "presets.capabilities" || f.input_schema.is_some()));
}

#[tokio::test]
async fn test_ingest_sidecar_converts_scenario() {
    let organ = organ();

    let response = call(
        &organ,
        "preset.ingest_sidecar",
        json!({"content": WARM_SIDECAR, "name": "Warm Look", "original_filename": "warm.xmp"}),
    )
    .await;
    assert!(response.ok);

    let preset = &response.output["record"]["preset"];
    assert_eq!(preset["name"], "Warm Look");
    assert_eq!(preset["schema_version"], "1.0");
    assert_eq!(preset["raw_params"]["white_balance"]["mode"], "custom");
    assert_eq!(preset["raw_params"]["white_balance"]["temperature_kelvin"], 4726);
    assert_eq!(preset["raw_params"]["white_balance"]["tint"], -2);
    assert_eq!(preset["raw_params"]["output_bps"], 16);
    assert_eq!(preset["raw_params"]["output_color"], 2);
    assert_eq!(preset["raw_params"]["no_auto_bright"], true);
    assert_eq!(preset["tone_adjustments"]["exposure"], 0.5);
    assert_eq!(preset["tone_adjustments"]["contrast"], -0.25);
    assert_eq!(preset["tone_adjustments"]["clarity"], 0.15);
    assert_eq!(preset["upload_info"]["original_filename"], "warm.xmp");
    assert_eq!(response.output["record"]["source_kind"], "uploaded");

    let id = response.output["id"].as_str().unwrap();
    assert!(id.starts_with("up-"));
    let fetched = call(&organ, "preset.get", json!({"id": id})).await;
    assert_eq!(fetched.output["preset"]["name"], "Warm Look");
}

#[tokio::test]
async fn test_convert_does_not_store() {
    let organ = organ();

    let response = call(&organ, "preset.convert", json!({"content": WARM_SIDECAR})).await;
    assert!(response.ok);
    assert!(response.output["preset"]["name"]
        .as_str()
        .unwrap()
        .starts_with("Preset Lightroom - "));
    assert!(response.output["diagnostics"].as_array().is_some());

    let uploaded = call(&organ, "preset.list", json!({"source_kind": "uploaded"})).await;
    assert_eq!(uploaded.output["count"], 0);
}

#[tokio::test]
async fn test_sidecar_without_vendor_data() {
    let organ = organ();

    let response = call(
        &organ,
        "preset.ingest_sidecar",
        json!({"content": "<x:xmpmeta xmlns:x=\"adobe:ns:meta/\"/>", "name": "Empty"}),
    )
    .await;
    assert!(!response.ok);
    assert_eq!(response.output["error"], "NoVendorData");

    let malformed = call(
        &organ,
        "preset.ingest_sidecar",
        json!({"content": "<x:xmpmeta", "name": "Broken"}),
    )
    .await;
    assert_eq!(malformed.output["error"], "MalformedInput");
}

#[tokio::test]
async fn test_duplicate_name_rejected() {
    let organ = organ();
    upload(&organ, "Moody", &[]).await;

    let second = call(
        &organ,
        "preset.ingest_sidecar",
        json!({"content": WARM_SIDECAR, "name": "Moody"}),
    )
    .await;
    assert!(!second.ok);
    assert_eq!(second.output["error"], "DuplicateName");

    let listed = call(&organ, "preset.list", json!({"source_kind": "uploaded"})).await;
    let moody = listed.output["presets"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|p| p["name"] == "Moody")
        .count();
    assert_eq!(moody, 1);
}

#[tokio::test]
async fn test_builtin_mapping_beats_uploaded_match() {
    let organ = organ();
    upload(&organ, "R5 Uploaded", &["Canon EOS R5"]).await;

    let response = call(
        &organ,
        "preset.select",
        json!({"camera_make": "Canon", "camera_model": "EOS R5"}),
    )
    .await;

    assert!(response.ok);
    assert_eq!(response.output["stage"], "builtin_mapping");
    assert_eq!(response.output["record"]["id"], builtins::CANON_EOS_R);
}

#[tokio::test]
async fn test_uploaded_match_then_default() {
    let organ = organ();
    let leica = upload(&organ, "Leica Street", &["Leica Q2"]).await;

    let matched = call(
        &organ,
        "preset.select",
        json!({"camera_make": "LEICA", "camera_model": "Q2"}),
    )
    .await;
    assert_eq!(matched.output["stage"], "uploaded_match");
    assert_eq!(matched.output["record"]["id"], leica.as_str());

    let query = json!({"camera_make": "Hasselblad", "camera_model": "X2D"});
    let nothing = call(&organ, "preset.select", query.clone()).await;
    assert!(nothing.ok);
    assert_eq!(nothing.output["stage"], "not_found");
    assert_eq!(nothing.output["found"], false);

    call(&organ, "preset.set_default", json!({"id": builtins::PORTRAIT})).await;
    let fallback = call(&organ, "preset.select", query).await;
    assert_eq!(fallback.output["stage"], "default");
    assert_eq!(fallback.output["record"]["id"], builtins::PORTRAIT);
}

#[tokio::test]
async fn test_select_is_idempotent() {
    let organ = organ();
    upload(&organ, "Fuji Film", &["Fujifilm X100V"]).await;
    let query = json!({"camera_make": "FUJIFILM", "camera_model": "X100V"});

    let first = call(&organ, "preset.select", query.clone()).await;
    let second = call(&organ, "preset.select", query).await;

    assert_eq!(first.output, second.output);
}

#[tokio::test]
async fn test_set_default_swaps() {
    let organ = organ();
    let a = upload(&organ, "A", &[]).await;
    let b = upload(&organ, "B", &[]).await;

    assert!(call(&organ, "preset.set_default", json!({"id": a})).await.ok);
    assert!(call(&organ, "preset.set_default", json!({"id": b})).await.ok);

    let listed = call(&organ, "preset.list", json!({})).await;
    let defaults: Vec<&Value> = listed.output["presets"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|p| p["is_default"] == true)
        .collect();
    assert_eq!(defaults.len(), 1);
    assert_eq!(defaults[0]["id"], b.as_str());

    let missing = call(&organ, "preset.set_default", json!({"id": "up-missing"})).await;
    assert_eq!(missing.output["error"], "NotFound");
}

#[tokio::test]
async fn test_validate_missing_raw_params() {
    let organ = organ();

    let response = call(
        &organ,
        "preset.validate",
        json!({"preset": {"name": "Half", "tone_adjustments": {"exposure": 0.2}}}),
    )
    .await;

    assert!(response.ok);
    assert_eq!(response.output["valid"], false);
    assert_eq!(response.output["accepted"], false);
    assert_eq!(response.output["missing_fields"], json!(["raw_params"]));

    let stored = call(
        &organ,
        "preset.ingest_json",
        json!({"preset": {"name": "Half", "tone_adjustments": {"exposure": 0.2}}}),
    )
    .await;
    assert_eq!(stored.output["error"], "StructuralInvalid");
}

#[tokio::test]
async fn test_out_of_range_exposure_warns_but_stores() {
    let organ = organ();
    let converted = call(
        &organ,
        "preset.convert",
        json!({"content": WARM_SIDECAR, "name": "Bright"}),
    )
    .await;
    let mut document = converted.output["preset"].clone();
    document["tone_adjustments"]["exposure"] = json!(3.5);

    let response = call(&organ, "preset.ingest_json", json!({"preset": document})).await;

    assert!(response.ok);
    let warned = response.output["diagnostics"]
        .as_array()
        .unwrap()
        .iter()
        .any(|d| d["check"] == "tone_range" && d["status"] == "warning");
    assert!(warned);
}

#[tokio::test]
async fn test_builtins_are_immutable() {
    let organ = organ();

    let response = call(&organ, "preset.delete", json!({"id": builtins::NIKON_Z})).await;

    assert!(!response.ok);
    assert_eq!(response.output["error"], "BuiltinImmutable");
}

#[tokio::test]
async fn test_delete_uploaded() {
    let organ = organ();
    let id = upload(&organ, "Short Lived", &[]).await;

    let deleted = call(&organ, "preset.delete", json!({"id": id})).await;
    assert!(deleted.ok);
    assert_eq!(deleted.output["name"], "Short Lived");

    let gone = call(&organ, "preset.get", json!({"id": id})).await;
    assert_eq!(gone.output["error"], "NotFound");
}

#[tokio::test]
async fn test_unsupported_operation() {
    let organ = organ();

    let response = call(&organ, "invalid.operation", json!({})).await;

    assert!(!response.ok);
    assert!(response.output["error"].as_str().unwrap().contains("Unsupported"));
}

#[tokio::test]
async fn test_missing_required_input() {
    let organ = organ();

    let response = call(&organ, "preset.ingest_sidecar", json!({"name": "No Content"})).await;

    assert!(!response.ok);
    assert_eq!(response.output["error"], "InvalidInput");
}

#[tokio::test]
async fn test_metrics_after_operations() {
    let organ = organ();
    upload(&organ, "Counted", &[]).await;
    call(&organ, "preset.select", json!({"camera_make": "Sony", "camera_model": "ILCE-7M4"})).await;
    call(&organ, "preset.delete", json!({"id": builtins::SONY_ALPHA})).await;

    let response = call(&organ, "metrics", json!({})).await;

    assert!(response.ok);
    assert_eq!(response.output["operations"]["ingest_sidecar"], 1);
    assert_eq!(response.output["operations"]["select"], 1);
    assert_eq!(response.output["selection"]["builtin_mapping"], 1);
    assert_eq!(response.output["failed_requests"], 1);
}

#[tokio::test]
async fn test_store_survives_restart() {
    let dir = TempDir::new().unwrap();
    let config = PresetConfig {
        store_dir: Some(dir.path().to_path_buf()),
        ..PresetConfig::default()
    };

    let id = {
        let organ = PresetOrgan::open(config.clone()).unwrap();
        let id = upload(&organ, "Persistent", &["Leica M11"]).await;
        call(&organ, "preset.set_default", json!({"id": id})).await;
        id
    };

    let reopened = PresetOrgan::open(config).unwrap();
    let fetched = call(&reopened, "preset.get", json!({"id": id})).await;
    assert!(fetched.ok);
    assert_eq!(fetched.output["is_default"], true);

    let all = call(&reopened, "preset.list", json!({})).await;
    assert_eq!(all.output["count"], 8);
}
