// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

/// Proptest strategies for core state machine types.
pub mod strategies {
    use crate::state::ProcedureState;
    use proptest::prelude::*;

    pub fn arb_state() -> impl Strategy<Value = ProcedureState> {
        prop_oneof![
            Just(ProcedureState::Unknown),
            Just(ProcedureState::Creating),
            Just(ProcedureState::Idle),
            Just(ProcedureState::Loading),
            Just(ProcedureState::Ready),
            Just(ProcedureState::Running),
            Just(ProcedureState::Complete),
            Just(ProcedureState::Stopped),
            Just(ProcedureState::Failed),
        ]
    }

    /// A sequence of states reachable by walking legal transitions from `Creating`.
    pub fn arb_legal_path() -> impl Strategy<Value = Vec<ProcedureState>> {
        use ProcedureState::*;
        prop_oneof![
            Just(vec![Creating, Idle, Loading, Idle, Ready, Running, Complete]),
            Just(vec![Creating, Idle, Loading, Idle, Ready, Running, Failed]),
            Just(vec![Creating, Idle, Loading, Failed]),
            Just(vec![Creating, Idle, Loading, Idle, Ready, Stopped]),
            Just(vec![Creating, Idle, Running, Ready]),
        ]
    }
}
