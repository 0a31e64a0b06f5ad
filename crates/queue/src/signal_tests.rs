// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn shutdown_flag_starts_clear() {
    let flag = ShutdownFlag::new();
    assert!(!flag.is_set());
    flag.set();
    assert!(flag.is_set());
}

#[test]
fn clone_shares_the_same_flag() {
    let flag = ShutdownFlag::new();
    let clone = flag.clone();
    clone.set();
    assert!(flag.is_set());
}
