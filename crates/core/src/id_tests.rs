// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn uuid_idgen_produces_unique_ids() {
    let id_gen = UuidIdGen;
    let a = id_gen.next();
    let b = id_gen.next();
    assert_ne!(a, b);
}

#[test]
fn sequential_idgen_counts_up() {
    let id_gen = SequentialIdGen::new("run");
    assert_eq!(id_gen.next(), "run-1");
    assert_eq!(id_gen.next(), "run-2");
}

#[test]
fn sequential_clones_share_the_counter() {
    let id_gen = SequentialIdGen::new("run");
    assert_eq!(id_gen.next(), "run-1");
    let clone = id_gen.clone();
    assert_eq!(clone.next(), "run-2");
    assert_eq!(id_gen.next(), "run-3");
}

#[test]
fn default_prefix_is_id() {
    assert_eq!(SequentialIdGen::default().next(), "id-1");
}
