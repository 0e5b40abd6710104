// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs)]

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write as _;

fn block_file(dir: &tempfile::TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    let mut f = std::fs::File::create(&path).expect("create temp file");
    f.write_all(content.as_bytes()).expect("write temp file");
    path
}

#[test]
fn run_replays_blocks_and_dumps_state() {
    let dir = tempfile::tempdir().expect("tempdir");
    let blocks = block_file(
        &dir,
        "blocks.json",
        r#"[
            {"block": {"height": 1, "timestamp": 1, "hash": "aa"},
             "moves": [{"name": "domob", "move": {"nc": [{"faction": "r"}]},
                        "out": {"HEXdev7Qv3q2MZz1CFoUXk": 0.01}}]},
            {"block": {"height": 2, "timestamp": 2, "hash": "bb"}, "moves": []}
        ]"#,
    );

    Command::cargo_bin("hexar")
        .expect("binary")
        .args(["run", "--validate"])
        .arg(&blocks)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"height\": 2"))
        .stdout(predicate::str::contains("\"domob\""));
}

#[test]
fn malformed_blocks_fail_loudly() {
    let dir = tempfile::tempdir().expect("tempdir");
    let blocks = block_file(&dir, "bad.json", r#"{"block": {"height": 1}}"#);

    Command::cargo_bin("hexar")
        .expect("binary")
        .arg("run")
        .arg(&blocks)
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing block hash"));
}

#[test]
fn pending_previews_moves() {
    let dir = tempfile::tempdir().expect("tempdir");
    let moves = block_file(
        &dir,
        "moves.json",
        r#"[{"name": "domob", "move": {"nc": [{"faction": "r"}]}}]"#,
    );

    Command::cargo_bin("hexar")
        .expect("binary")
        .arg("pending")
        .arg(&moves)
        .assert()
        .success()
        .stdout(predicate::str::contains("newcharacters"));
}
