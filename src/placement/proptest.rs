//! Property-Based Tests for Placement
//!
//! 1. **Determinism**: the same snapshot and object always map to the same copies
//! 2. **Order Independence**: node list order does not affect placement
//! 3. **Zone Distinctness**: no two copies share a failure zone
//! 4. **Prefix Stability**: resolving fewer copies yields a prefix of more copies

#![cfg(test)]

use proptest::prelude::*;

use super::ring::PlacementTable;
use crate::domain::{Node, NodeId, ObjectId};

// =============================================================================
// Property Strategies
// =============================================================================

/// Between 3 and 12 nodes on distinct ports, spread over up to 5 zones.
fn nodes_strategy() -> impl Strategy<Value = Vec<Node>> {
    prop::collection::btree_set(1000u16..60000, 3..12).prop_flat_map(|ports| {
        let n = ports.len();
        (Just(ports), prop::collection::vec(0u32..5, n), prop::collection::vec(1u16..32, n))
    })
    .prop_map(|(ports, zones, vnodes)| {
        ports
            .into_iter()
            .zip(zones)
            .zip(vnodes)
            .map(|((port, zone), nr)| {
                Node::new(NodeId::new(format!("10.1.0.1:{port}").parse().unwrap()), zone)
                    .with_vnodes(nr)
            })
            .collect()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_resolve_is_deterministic_and_order_independent(
        nodes in nodes_strategy(),
        raw_oid in any::<u64>(),
        copies in 1usize..4,
    ) {
        let forward = PlacementTable::build(nodes.clone())?;
        let mut reversed_nodes = nodes;
        reversed_nodes.reverse();
        let reversed = PlacementTable::build(reversed_nodes)?;
        prop_assume!(copies <= forward.nr_zones());

        let oid = ObjectId::new(raw_oid);
        let a = forward.resolve(oid, copies)?;
        let b = forward.resolve(oid, copies)?;
        let c = reversed.resolve(oid, copies)?;

        prop_assert_eq!(&a, &b);
        prop_assert_eq!(&a, &c);
    }

    #[test]
    fn prop_copies_land_in_distinct_zones(
        nodes in nodes_strategy(),
        raw_oid in any::<u64>(),
    ) {
        let table = PlacementTable::build(nodes)?;
        let copies = table.nr_zones();
        let entries = table.resolve(ObjectId::new(raw_oid), copies)?;

        prop_assert_eq!(entries.len(), copies);
        let mut zones: Vec<u32> = entries.iter().map(|e| e.node.zone).collect();
        zones.sort_unstable();
        zones.dedup();
        prop_assert_eq!(zones.len(), copies);
    }

    #[test]
    fn prop_fewer_copies_is_prefix(
        nodes in nodes_strategy(),
        raw_oid in any::<u64>(),
    ) {
        let table = PlacementTable::build(nodes)?;
        let oid = ObjectId::new(raw_oid);
        let all = table.resolve(oid, table.nr_zones())?;
        for copies in 1..=table.nr_zones() {
            let some = table.resolve(oid, copies)?;
            prop_assert_eq!(&some[..], &all[..copies]);
        }
    }
}
