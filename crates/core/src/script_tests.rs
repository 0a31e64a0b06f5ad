// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn filesystem_script_exposes_uri() {
    let s = Script::filesystem("file:///scripts/hello.rhai");
    assert_eq!(s.uri(), "file:///scripts/hello.rhai");
    assert!(!s.needs_build_env());
}

#[test]
fn repo_script_with_build_env_flag() {
    let s = Script::Repo {
        uri: "git://example/obs-scripts".into(),
        revision: Some("abc123".into()),
        branch: Some("main".into()),
        build_env: true,
    };
    assert!(s.needs_build_env());
}

#[test]
fn serde_round_trip() {
    let s = Script::filesystem("file:///a.rhai");
    let json = serde_json::to_string(&s).expect("serialize");
    let back: Script = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(s, back);
}
