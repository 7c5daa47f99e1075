use std::fs;
use std::path::{Path, PathBuf};

use presence_merge::config::{BlacklistConfig, DedupRules};
use presence_merge::dedup::dedup;
use presence_merge::ingest::Batch;
use presence_merge::{FinalRecord, MergeError, Pipeline, ScrapedRecord, WarningKind};

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn copy_dir(from: &Path, to: &Path) {
    fs::create_dir_all(to).unwrap();
    for entry in fs::read_dir(from).unwrap() {
        let entry = entry.unwrap();
        let target = to.join(entry.file_name());
        if entry.file_type().unwrap().is_dir() {
            copy_dir(&entry.path(), &target);
        } else {
            fs::copy(entry.path(), &target).unwrap();
        }
    }
}

/// Fixture tree copied into a scratch dir so outputs never land in the repo.
fn staged() -> (tempfile::TempDir, Pipeline) {
    let dir = tempfile::tempdir().unwrap();
    copy_dir(&fixtures_dir(), dir.path());
    let pipeline = Pipeline::from_config_file(&dir.path().join("pipeline.toml")).unwrap();
    (dir, pipeline)
}

fn read_final(pipeline: &Pipeline) -> Vec<FinalRecord> {
    let content = fs::read_to_string(&pipeline.paths().final_output).unwrap();
    serde_json::from_str(&content).unwrap()
}

// -------------------------------------------------------------------------
// Full run
// -------------------------------------------------------------------------

#[test]
fn full_run_produces_one_record_per_entity() {
    let (_dir, pipeline) = staged();
    let report = pipeline.run_all().unwrap();

    assert_eq!(report.config_name, "fixture");
    let outputs: Vec<_> = report.stages.iter().map(|s| s.output).collect();
    // merged, patched (+1 derived), extraction entries, final records
    assert_eq!(outputs, vec![7, 8, 12, 7]);
    assert_eq!(report.stages[0].input, 11);

    let records = read_final(&pipeline);
    let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(
        ids,
        vec![
            "acme",
            "acme_manual_ws_acme-labs_io",
            "beta",
            "s_li_Delta_0",
            "s_ws_Delta_0",
            "BIT_Epsilon",
            "gamma",
        ]
    );

    let acme = &records[0];
    assert_eq!(acme.name, "Acme");
    assert_eq!(acme.reasons.iter().collect::<Vec<_>>(), vec!["h", "b"]);
    assert_eq!(acme.ws.as_deref(), Some("acme.com"));
    assert_eq!(acme.li.as_deref(), Some("acme"));
    assert_eq!(acme.fb.as_deref(), Some("acmeco"));
    assert_eq!(acme.tw.as_deref(), Some("acme"));
    assert_eq!(acme.stock_symbol.as_deref(), Some("ACM"));
    assert_eq!(acme.alternatives.as_ref().unwrap()[0]["n"], "Open Alternative");

    let beta = &records[2];
    assert_eq!(beta.name, "Beta Systems");
    assert_eq!(beta.li.as_deref(), Some("beta-systems"));
    assert_eq!(beta.tw.as_deref(), Some("betasys"));
    assert!(beta.reasons.contains("h"));

    // generic twitter path never becomes a selector
    let gamma = records.iter().find(|r| r.id == "gamma").unwrap();
    assert_eq!(gamma.tw, None);
    assert_eq!(gamma.ws.as_deref(), Some("gamma.dev"));
}

#[test]
fn blacklist_and_known_duplicates_never_reach_output() {
    let (_dir, pipeline) = staged();
    pipeline.run_all().unwrap();

    let merged: Vec<ScrapedRecord> =
        serde_json::from_str(&fs::read_to_string(&pipeline.paths().merged).unwrap()).unwrap();
    assert!(merged.iter().all(|r| r.id != "corvid" && r.id != "shared-1"));
    // second-batch record merged into the first-seen one
    let acme = merged.iter().find(|r| r.id == "acme").unwrap();
    assert_eq!(acme.description.as_deref(), Some("Second source"));
    assert!(merged.iter().all(|r| r.id != "acme-2"));
}

#[test]
fn extraction_collision_is_a_warning_not_an_error() {
    let (_dir, pipeline) = staged();
    let report = pipeline.run_all().unwrap();

    let summary = report.warning_summary();
    assert_eq!(summary.get(&WarningKind::DuplicateKeyCollision), Some(&1));
    let collision = report
        .warnings()
        .find(|w| w.kind == WarningKind::DuplicateKeyCollision)
        .unwrap();
    assert_eq!(collision.entity, "Omega");
}

#[test]
fn rerun_is_byte_identical() {
    let (_dir, pipeline) = staged();
    pipeline.run_all().unwrap();
    let merged = fs::read(&pipeline.paths().merged).unwrap();
    let final_output = fs::read(&pipeline.paths().final_output).unwrap();

    pipeline.run_all().unwrap();
    assert_eq!(fs::read(&pipeline.paths().merged).unwrap(), merged);
    assert_eq!(fs::read(&pipeline.paths().final_output).unwrap(), final_output);
}

#[test]
fn merged_output_does_not_collapse_further() {
    let (_dir, pipeline) = staged();
    pipeline.merge().unwrap();
    let merged: Vec<ScrapedRecord> =
        serde_json::from_str(&fs::read_to_string(&pipeline.paths().merged).unwrap()).unwrap();

    let blacklist = BlacklistConfig::default();
    let again = dedup(
        &[Batch {
            source: "merged".into(),
            records: merged.clone(),
        }],
        &DedupRules {
            blacklist: &blacklist,
            known_duplicates: &[],
        },
    );
    assert_eq!(again.records, merged);
    assert!(again.warnings.is_empty());
}

// -------------------------------------------------------------------------
// Fatal errors
// -------------------------------------------------------------------------

#[test]
fn bad_override_key_halts_before_patch_output() {
    let (dir, pipeline) = staged();
    fs::write(
        dir.path().join("overrides.json"),
        r#"{"version": 1, "overrides": {"Acme": {"foo": "bar"}}}"#,
    )
    .unwrap();

    let err = pipeline.run_all().unwrap_err();
    assert!(matches!(err, MergeError::AmbiguousOverrideKey { ref key, .. } if key == "foo"));
    assert!(pipeline.paths().merged.exists());
    assert!(!pipeline.paths().patched.exists());
    assert!(!pipeline.paths().final_output.exists());
}

#[test]
fn malformed_batch_fails_the_run() {
    let (dir, pipeline) = staged();
    fs::write(
        dir.path().join("batches/batch_0003.json"),
        r#"[{"id": "x", "reasons": ["h"]}]"#,
    )
    .unwrap();

    let err = pipeline.run_all().unwrap_err();
    assert!(matches!(err, MergeError::SchemaViolation { .. }));
    assert!(!pipeline.paths().merged.exists());
}

#[test]
fn unknown_reason_tag_fails_the_run() {
    let (dir, pipeline) = staged();
    fs::write(
        dir.path().join("batches/batch_0003.json"),
        r#"[{"id": "x", "name": "Xeno", "reasons": ["hq"], "ws": "xeno.io"}]"#,
    )
    .unwrap();

    let err = pipeline.run_all().unwrap_err();
    match err {
        MergeError::SchemaViolation { file, message } => {
            assert_eq!(file, "batch_0003.json");
            assert!(message.contains("'hq'"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!pipeline.paths().merged.exists());
}

#[test]
fn stray_network_file_fails_assembly() {
    let (_dir, pipeline) = staged();
    pipeline.merge().unwrap();
    pipeline.patch().unwrap();
    pipeline.extract().unwrap();
    fs::write(pipeline.paths().networks.join("mastodon.json"), "[]").unwrap();

    let err = pipeline.assemble().unwrap_err();
    assert!(matches!(err, MergeError::UnknownExtractionFileMapping { .. }));
    assert!(!pipeline.paths().final_output.exists());
}
