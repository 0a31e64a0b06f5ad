// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn keyword_str_extracts_subarray_id() {
    let mut kwargs = HashMap::new();
    kwargs.insert("subarray_id".to_string(), serde_json::json!(1));
    let capture = ArgCapture::new("init", 100).with_keyword(kwargs);
    // subarray_id is a number here, not a string — keyword_str should return None
    assert_eq!(capture.keyword_str("subarray_id"), None);

    let mut kwargs = HashMap::new();
    kwargs.insert("subarray_id".to_string(), serde_json::json!("1"));
    let capture = ArgCapture::new("init", 100).with_keyword(kwargs);
    assert_eq!(capture.keyword_str("subarray_id"), Some("1"));
}

#[test]
fn missing_keyword_is_none() {
    let capture = ArgCapture::new("init", 0);
    assert_eq!(capture.keyword_str("nope"), None);
}

#[test]
fn positional_args_preserved() {
    let capture = ArgCapture::new("main", 0).with_positional(vec![serde_json::json!("boom")]);
    assert_eq!(capture.positional_args, vec![serde_json::json!("boom")]);
}
