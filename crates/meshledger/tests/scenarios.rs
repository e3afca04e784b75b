//! End-to-end runs over small, fixed configurations.

use meshledger::rollup::hyper_merkle;
use meshledger::LedgerError;
use meshledger_core::{chain_step, sha256_hex, CapsuleId, MeshDef, Sha256Hash, GENESIS};
use meshledger_store::layout::INTERMESH_DOT;
use meshledger_testkit::RunFixture;
use serde_json::Value;

fn str_at<'a>(value: &'a Value, pointer: &str) -> &'a str {
    value
        .pointer(pointer)
        .and_then(Value::as_str)
        .unwrap_or_else(|| panic!("{pointer} missing"))
}

fn segment_ids(fixture: &RunFixture, mesh: &str) -> Vec<CapsuleId> {
    let state = fixture.read_json(&format!("{mesh}_chain_state.json"));
    state["segments"]
        .as_array()
        .unwrap()
        .iter()
        .map(|link| CapsuleId::parse(link["cid"].as_str().unwrap()).unwrap())
        .collect()
}

fn body_sha(fixture: &RunFixture, id: &CapsuleId) -> String {
    sha256_hex(&fixture.read(&format!("{id}.json")))
}

#[test]
fn test_single_segment_writes_three_ledger_lines() {
    let fixture = RunFixture::solo(1, 1);
    let summary = fixture.run().unwrap();
    assert!(summary.ok);
    assert!(summary.failed.is_empty());
    assert_eq!(summary.meshes.len(), 1);
    assert_eq!(summary.meshes[0].segments, 1);

    let lines = fixture.ledger_lines();
    let events: Vec<_> = lines.iter().map(|l| l["event"].as_str().unwrap()).collect();
    assert_eq!(events, ["segment", "super", "hyper"]);
    assert_eq!(lines[0]["mesh"], "solo");
    assert_eq!(lines[2]["mesh"], "hypermeta");

    assert_eq!(lines[0]["prev"], GENESIS);
    assert_eq!(lines[1]["prev"], lines[0]["sha256"]);
    assert_eq!(lines[2]["prev"], lines[1]["sha256"]);

    let ids = segment_ids(&fixture, "solo");
    assert_eq!(ids.len(), 1);
    assert!(ids[0].as_str().starts_with("IMESH-SOLO-SEG1-"));
    assert_eq!(lines[0]["capsule_id"], ids[0].as_str());
    assert_eq!(lines[0]["sha256"], body_sha(&fixture, &ids[0]).as_str());

    let capsule = fixture.read_json(&format!("{}.json", ids[0]));
    assert_eq!(str_at(&capsule, "/provenance/prev_sha256"), GENESIS);
    assert_eq!(str_at(&capsule, "/provenance/chain_prev"), GENESIS);
    assert_eq!(str_at(&capsule, "/ts"), "2026-01-14T12:00:00Z");

    let report = fixture.verifier(true).verify_run("ledger_main.jsonl").unwrap();
    assert!(report.ok, "{:?}", report.errors);
    assert_eq!(report.ledger_lines, 3);
    assert_eq!(report.attestations, 3);
    assert_eq!(report.capsules, 3);
}

#[test]
fn test_two_segments_follow_chain_formula() {
    let fixture = RunFixture::solo(2, 3);
    fixture.run().unwrap();

    let ids = segment_ids(&fixture, "solo");
    assert_eq!(ids.len(), 2);
    let sha1 = body_sha(&fixture, &ids[0]);
    let sha2 = body_sha(&fixture, &ids[1]);
    let step1 = chain_step(GENESIS, &sha1);
    let step2 = chain_step(&step1, &sha2);

    let second = fixture.read_json(&format!("{}.json", ids[1]));
    assert_eq!(str_at(&second, "/provenance/prev_sha256"), sha1);
    assert_eq!(str_at(&second, "/provenance/chain_prev"), step1);

    let state = fixture.read_json("solo_chain_state.json");
    assert_eq!(state["last"], step2.as_str());
    assert_eq!(state["segments"][0]["chain"], step1.as_str());

    let lines = fixture.ledger_lines();
    assert_eq!(lines[1]["chain"], step2.as_str());
    assert_eq!(lines[1]["seg"], 2);

    let sidecar = fixture.read_json(&format!("{}.sig.json", ids[1]));
    assert_eq!(sidecar["sha256"], sha2.as_str());
}

#[test]
fn test_hyper_keeps_declared_mesh_order() {
    let fixture = RunFixture::builtin(&["drip", "pulse", "weave"], 2, 2);
    let summary = fixture.run().unwrap();
    assert!(summary.ok, "{:?}", summary.failed);

    let hyper = summary.hyper.as_ref().unwrap();
    assert_eq!(hyper.count, 3);
    let capsule = fixture.read_json(&format!("{}.json", hyper.capsule_id));
    let meshes: Vec<_> = capsule["payload"]["meshes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["mesh"].as_str().unwrap())
        .collect();
    assert_eq!(meshes, ["drip", "pulse", "weave"]);

    let roots: Vec<&str> = ["drip", "pulse", "weave"]
        .iter()
        .map(|m| summary.supers[*m].as_str())
        .collect();
    assert_eq!(hyper.hyper_merkle, hyper_merkle(&roots));
    assert_eq!(str_at(&capsule, "/provenance/hyper_merkle"), hyper.hyper_merkle);

    let dot = String::from_utf8(fixture.read(INTERMESH_DOT)).unwrap();
    assert!(dot.contains("drip"));
    assert!(dot.contains("weave"));

    let report = fixture.verifier(true).verify_run("ledger_main.jsonl").unwrap();
    assert!(report.ok, "{:?}", report.errors);
}

#[test]
fn test_rerun_is_byte_identical() {
    let first = RunFixture::builtin(&["drip", "weave"], 2, 3)
        .with_monetize(true)
        .with_outdir("first");
    let mut second = RunFixture::builtin(&["drip", "weave"], 2, 3).with_monetize(true);
    second.config.outdir = first.dir.path().join("second");

    let a = first.run().unwrap();
    let b = second.run().unwrap();
    assert_eq!(a, b);

    let files = first.files();
    assert_eq!(files, second.files());
    for file in &files {
        assert_eq!(first.read(file), second.read(file), "{file} differs");
    }
}

#[test]
fn test_corrupted_first_capsule_breaks_the_next_link() {
    let fixture = RunFixture::solo(2, 1);
    fixture.run().unwrap();

    let ids = segment_ids(&fixture, "solo");
    let first = format!("{}.json", ids[0]);
    let body = String::from_utf8(fixture.read(&first)).unwrap();
    let tampered = body.replace("2026-01-14T12:00:00Z", "2026-01-14T12:00:01Z");
    assert_ne!(body, tampered);
    std::fs::write(fixture.path(&first), tampered).unwrap();

    let report = fixture.verifier(false).verify_run("ledger_main.jsonl").unwrap();
    assert!(!report.ok);

    let body_break = report.errors.iter().any(|e| {
        matches!(e, meshledger::IntegrityError::BodyHashMismatch { path, .. } if path.ends_with(&first))
    });
    let second = format!("{}.json", ids[1]);
    let chain_break = report.errors.iter().any(|e| {
        matches!(e, meshledger::IntegrityError::ChainBreak { path, field, .. }
            if path.ends_with(&second) && field == "prev_sha256")
    });
    assert!(body_break, "{:?}", report.errors);
    assert!(chain_break, "{:?}", report.errors);
}

#[test]
fn test_odd_mesh_count_pairs_last_root_with_itself() {
    let fixture = RunFixture::builtin(&["drip", "pulse", "weave"], 1, 1);
    let summary = fixture.run().unwrap();

    let leaves: Vec<Sha256Hash> = ["drip", "pulse", "weave"]
        .iter()
        .map(|m| Sha256Hash::hash(summary.supers[*m].as_bytes()))
        .collect();
    let left = Sha256Hash::hash_pair(&leaves[0], &leaves[1]);
    let right = Sha256Hash::hash_pair(&leaves[2], &leaves[2]);
    assert_eq!(
        summary.hyper.unwrap().hyper_merkle,
        Sha256Hash::hash_pair(&left, &right).to_hex()
    );
}

#[test]
fn test_unplannable_mesh_is_skipped() {
    let cyclic = MeshDef::single("loop", "a")
        .with_edges("a", &["b"])
        .with_edges("b", &["a"]);
    let fixture = RunFixture::new(vec![cyclic, MeshDef::single("solo", "solo")], 1, 1);
    let summary = fixture.run().unwrap();

    assert!(!summary.ok);
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].mesh, "loop");
    assert_eq!(summary.failed[0].kind, "PlannerError");
    assert_eq!(summary.hyper.unwrap().count, 1);
    assert!(!fixture.path("loop_chain_state.json").exists());

    let report = fixture.verifier(true).verify_run("ledger_main.jsonl").unwrap();
    assert!(report.ok, "{:?}", report.errors);
}

#[test]
fn test_reserved_mesh_name_writes_nothing() {
    let fixture = RunFixture::new(vec![MeshDef::single("hypermeta", "x")], 1, 1);
    let err = fixture.run().unwrap_err();
    assert!(matches!(err, LedgerError::Config(_)));
    assert_eq!(err.kind(), "ConfigError");
    assert!(!fixture.outdir().exists());
}

#[test]
fn test_parallel_run_matches_sequential_roots() {
    let sequential = RunFixture::builtin(&["drip", "pulse", "weave"], 2, 2).with_outdir("seq");
    let mut parallel = RunFixture::builtin(&["drip", "pulse", "weave"], 2, 2).with_parallel(true);
    parallel.config.outdir = sequential.dir.path().join("par");

    let a = sequential.run().unwrap();
    let b = parallel.run().unwrap();
    assert_eq!(a.supers, b.supers);
    assert_eq!(a.hyper.unwrap().hyper_merkle, b.hyper.unwrap().hyper_merkle);

    let report = parallel.verifier(true).verify_run("ledger_main.jsonl").unwrap();
    assert!(report.ok, "{:?}", report.errors);
}

#[test]
fn test_monetized_run_reports_totals() {
    let fixture = RunFixture::builtin(&["drip", "pulse", "weave"], 1, 4).with_monetize(true);
    let summary = fixture.run().unwrap();
    let totals = summary.totals.unwrap();
    assert!(totals.cost > 0.0);

    let exec = fixture.read_json("pulse_seg_1_exec.json");
    assert_eq!(exec["cycles"][0]["monetization"]["model"], "auction");

    let unmonetized = RunFixture::solo(1, 1).run().unwrap();
    assert!(unmonetized.totals.is_none());
}

#[test]
fn test_failed_attestation_write_halts_only_that_mesh() {
    let fixture = RunFixture::new(
        vec![MeshDef::single("halt", "halt"), MeshDef::single("solo", "solo")],
        2,
        1,
    );
    std::fs::create_dir_all(fixture.path("halt_ledger_attest.sig.jsonl")).unwrap();

    let summary = fixture.run().unwrap();
    assert!(!summary.ok);
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].mesh, "halt");
    assert_eq!(summary.failed[0].kind, "IOError");
    assert_eq!(summary.hyper.as_ref().unwrap().count, 1);
    assert!(!summary.supers.contains_key("halt"));

    let state = fixture.read_json("halt_chain_state.json");
    assert_eq!(state["segments"].as_array().unwrap().len(), 0);
    assert_eq!(state["last"], GENESIS);

    let lines = fixture.ledger_lines();
    assert!(lines.iter().all(|l| l["mesh"] != "halt"));
    let events: Vec<_> = lines.iter().map(|l| l["event"].as_str().unwrap()).collect();
    assert_eq!(events, ["segment", "segment", "super", "hyper"]);

    let report = fixture.verifier(true).verify_run("ledger_main.jsonl").unwrap();
    assert!(report.ok, "{:?}", report.errors);
}

#[test]
fn test_failed_heartbeat_write_leaves_no_ledger_line() {
    let fixture = RunFixture::solo(2, 1);
    std::fs::create_dir_all(fixture.path("solo_heartbeats.jsonl")).unwrap();

    let summary = fixture.run().unwrap();
    assert!(!summary.ok);
    assert_eq!(summary.failed[0].kind, "IOError");
    assert!(summary.hyper.is_none());

    let state = fixture.read_json("solo_chain_state.json");
    assert_eq!(state["segments"].as_array().unwrap().len(), 0);
    assert!(!fixture.path("ledger_main.jsonl").exists());
    assert!(!fixture.path("solo_ledger_attest.sig.jsonl").exists());
}

#[test]
fn test_auction_without_bidders_fails_every_cycle() {
    let fixture =
        RunFixture::new(vec![MeshDef::single("pulse", "pulse")], 1, 3).with_monetize(true);
    let summary = fixture.run().unwrap();
    assert!(summary.failed.is_empty());
    assert_eq!(summary.meshes[0].ok_segments, 0);

    let exec = fixture.read_json("pulse_seg_1_exec.json");
    let cycles = exec["cycles"].as_array().unwrap();
    assert_eq!(cycles.len(), 3);
    for cycle in cycles {
        assert_eq!(cycle["ok"], false);
        assert!(cycle["monetization_error"]
            .as_str()
            .unwrap()
            .contains("no bidders"));
    }
    assert_eq!(fixture.read_json("pulse_seg_1_sla.json")["ok"], false);
    assert_eq!(summary.totals.unwrap().revenue, 0.0);
}

#[test]
fn test_second_run_into_same_outdir_is_refused() {
    let fixture = RunFixture::solo(2, 1);
    fixture.run().unwrap();
    let before = fixture.files();

    let mut again = fixture.config.clone();
    again.rng_seed = "other".into();
    let err = meshledger::run(again).unwrap_err();
    assert!(matches!(err, LedgerError::Config(_)));
    assert_eq!(fixture.files(), before);

    let report = fixture.verifier(true).verify_run("ledger_main.jsonl").unwrap();
    assert!(report.ok, "{:?}", report.errors);
}

#[test]
fn test_leftover_chain_state_is_refused() {
    let fixture = RunFixture::solo(1, 1);
    std::fs::create_dir_all(fixture.outdir()).unwrap();
    std::fs::write(fixture.path("solo_chain_state.json"), b"{}").unwrap();

    let err = fixture.run().unwrap_err();
    assert_eq!(err.kind(), "ConfigError");
    assert!(!fixture.path("ledger_main.jsonl").exists());
}
