//! Property-based tests using proptest
//!
//! These tests check result-set window arithmetic, in-memory slicing and id
//! filtering, and version ordering against randomized inputs. Nothing here
//! touches the network: remote sets are only sliced, never materialized.

use proptest::prelude::*;
use rmine::{ApiVersion, Auth, Params, Redmine, ResultSet};
use serde_json::{json, Value};

fn client() -> Redmine {
    Redmine::new("http://127.0.0.1:9", Auth::Anonymous).expect("static url parses")
}

fn remote_projects() -> ResultSet {
    client()
        .manager("project")
        .and_then(|m| m.all(Params::new()))
        .expect("project supports all")
}

fn local_projects(count: usize) -> ResultSet {
    let raw: Vec<Value> = (0..count)
        .map(|id| json!({"id": id, "identifier": format!("p{}", id)}))
        .collect();
    client()
        .manager("project")
        .and_then(|m| m.to_resource_set(raw))
        .expect("plain objects convert")
}

fn ids(set: &ResultSet) -> Vec<i64> {
    tokio_test::block_on(async {
        set.iter()
            .await
            .expect("local sets never fetch")
            .filter_map(|r| r.int_attr("id"))
            .collect()
    })
}

/// Generate a (start, stop) pair with start <= stop
fn arb_range() -> impl Strategy<Value = (usize, usize)> {
    (0usize..500, 0usize..500).prop_map(|(a, b)| (a.min(b), a.max(b)))
}

/// Generate a (start, stop) pair with start < stop
fn arb_nonempty_range() -> impl Strategy<Value = (usize, usize)> {
    (0usize..500, 1usize..500).prop_map(|(start, len)| (start, start + len))
}

proptest! {
    /// slice(a..b) on a fresh collection asks for offset a, limit b - a
    #[test]
    fn slice_window_is_offset_and_length((start, stop) in arb_range()) {
        let sliced = remote_projects().slice(start..stop);
        prop_assert_eq!(sliced.offset(), start);
        prop_assert_eq!(sliced.limit(), stop - start);
    }

    /// Nested slices stay inside the parent window
    #[test]
    fn nested_slice_stays_within_parent(
        (start, stop) in arb_nonempty_range(),
        (inner_start, inner_stop) in arb_range()
    ) {
        let parent = remote_projects().slice(start..stop);
        let child = parent.slice(inner_start..inner_stop);

        prop_assert_eq!(child.offset(), start + inner_start);
        prop_assert!(child.limit() <= parent.limit());
        prop_assert!(child.offset() + child.limit() <= parent.offset() + parent.limit()
            || child.limit() == 0);
    }

    /// Open-ended slices keep the remaining window of a bounded parent
    #[test]
    fn open_slice_keeps_remaining_window((start, stop) in arb_range(), skip in 0usize..600) {
        let parent = remote_projects().slice(start..stop);
        let child = parent.slice(skip..);
        prop_assert_eq!(child.limit(), parent.limit().saturating_sub(skip));
    }

    /// Slicing a materialized set matches slicing the underlying items
    #[test]
    fn local_slice_matches_vec_slice(count in 0usize..60, (start, stop) in arb_range()) {
        let set = local_projects(count);
        let expected: Vec<i64> = (0..count as i64).collect();
        let end = stop.min(count);
        let begin = start.min(end);

        let sliced = set.slice(start..stop);
        prop_assert!(sliced.is_materialized());
        prop_assert_eq!(ids(&sliced), expected[begin..end].to_vec());
    }

    /// Id filtering keeps the set's order and drops unknown ids
    #[test]
    fn filter_preserves_order(
        count in 0usize..40,
        wanted in prop::collection::vec(0i64..60, 0..20)
    ) {
        let set = local_projects(count);
        let filtered = tokio_test::block_on(set.filter(&json!(wanted))).unwrap();

        let expected: Vec<i64> = (0..count as i64).filter(|id| wanted.contains(id)).collect();
        prop_assert_eq!(ids(&filtered), expected);
    }

    /// Version ordering agrees with component-wise ordering, zero padded
    #[test]
    fn version_ordering_is_componentwise(
        a in prop::collection::vec(0u32..20, 1..4),
        b in prop::collection::vec(0u32..20, 1..4)
    ) {
        let len = a.len().max(b.len());
        let pad = |v: &[u32]| {
            let mut v = v.to_vec();
            v.resize(len, 0);
            v
        };
        prop_assert_eq!(
            ApiVersion::new(&a).cmp(&ApiVersion::new(&b)),
            pad(&a).cmp(&pad(&b))
        );
    }

    /// Trailing zeros never change a version
    #[test]
    fn trailing_zeros_are_equal(parts in prop::collection::vec(0u32..50, 1..4), zeros in 1usize..3) {
        let mut padded = parts.clone();
        padded.extend(std::iter::repeat(0).take(zeros));
        prop_assert_eq!(ApiVersion::new(&parts), ApiVersion::new(&padded));
    }
}

/// Tests for version parsing
mod version_parse_tests {
    use super::*;

    proptest! {
        /// Dotted numbers always parse
        #[test]
        fn dotted_numbers_parse(parts in prop::collection::vec(0u32..1000, 1..5)) {
            let text = parts.iter().map(u32::to_string).collect::<Vec<_>>().join(".");
            let parsed: ApiVersion = text.parse().unwrap();
            prop_assert_eq!(parsed, ApiVersion::new(&parts));
        }

        /// Anything with a non-numeric component is rejected
        #[test]
        fn non_numeric_is_rejected(prefix in "[0-9]{1,3}", junk in "[a-z]{1,5}") {
            let text = format!("{}.{}", prefix, junk);
            prop_assert!(text.parse::<ApiVersion>().is_err());
        }
    }
}
