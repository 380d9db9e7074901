//! Gateway Scenario Tests
//!
//! Drives the façade against scripted collaborators:
//! - Write fan-out: send failures, readiness order, poll timeouts
//! - Read path: local-first, randomized remote fallback
//! - Policy gates: read-only objects, object cache

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use proptest::prelude::*;
use tokio::time::Instant;

use replica_gateway::adapters::{
    EpochTracker, LeaseEvent, NodeScript, PeerScript, RecordingCache, ScriptedLease, ScriptedPeers,
    ScriptedStore,
};
use replica_gateway::domain::{
    flags, Node, NodeId, ObjectId, Opcode, Request, RequestHeader, ResultCode, PEER_PROTO_VER,
};
use replica_gateway::gateway::{Gateway, GatewayConfig};
use replica_gateway::placement::{ClusterView, PlacementTable};
use replica_gateway::MAX_COPIES;

const EPOCH: u32 = 4;

fn node(port: u16) -> NodeId {
    NodeId::new(SocketAddr::from(([127, 0, 0, 1], port)))
}

/// A node outside the cluster; every copy is remote to it.
fn client() -> NodeId {
    node(9999)
}

fn cluster(n: u16) -> ClusterView {
    let nodes = (0..n).map(|i| Node::new(node(7000 + i), i as u32));
    ClusterView::new(EPOCH, PlacementTable::build(nodes).unwrap())
}

/// Copy holders of `oid` in placement order.
fn targets(view: &ClusterView, oid: ObjectId, copies: usize) -> Vec<NodeId> {
    view.resolve(oid, copies, MAX_COPIES)
        .unwrap()
        .iter()
        .map(|e| *e.node_id())
        .collect()
}

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

struct Harness {
    view: Arc<ClusterView>,
    lease: Arc<ScriptedLease>,
    peers: Arc<ScriptedPeers>,
    store: Arc<ScriptedStore>,
    epochs: Arc<EpochTracker>,
    gateway: Gateway<ScriptedLease>,
}

impl Harness {
    fn new(local: NodeId) -> Self {
        Self::build(local, ScriptedStore::succeeding(Bytes::new()), cluster(3), GatewayConfig::default())
    }

    fn build(local: NodeId, store: ScriptedStore, view: ClusterView, config: GatewayConfig) -> Self {
        let view = Arc::new(view);
        let lease = Arc::new(ScriptedLease::new());
        let peers = Arc::new(ScriptedPeers::new());
        let store = Arc::new(store);
        let epochs = Arc::new(EpochTracker::new(EPOCH));
        let gateway = Gateway::new(
            local,
            store.clone(),
            peers.clone(),
            lease.clone(),
            epochs.clone(),
        )
        .with_config(config)
        .unwrap();

        Self {
            view,
            lease,
            peers,
            store,
            epochs,
            gateway,
        }
    }

    fn targets(&self, oid: ObjectId) -> Vec<NodeId> {
        targets(&self.view, oid, 3)
    }

    fn request(&self, opcode: Opcode, oid: ObjectId, copies: u8) -> Request {
        let header = RequestHeader::new(opcode, oid, EPOCH).with_copies(copies);
        Request::new(header, self.view.clone())
    }

    fn write_request(&self, oid: ObjectId) -> Request {
        self.request(Opcode::WriteObj, oid, 3)
            .with_data(Bytes::from_static(b"payload"))
            .unwrap()
    }
}

// =============================================================================
// Write fan-out
// =============================================================================

mod write_fan_out {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_all_copies_succeed_in_any_ready_order() {
        let h = Harness::new(client());
        let oid = ObjectId::data(1, 0);
        let t = h.targets(oid);
        h.lease.script(t[0], NodeScript::ok().ready_after(ms(20)));
        h.lease.script(t[1], NodeScript::ok().ready_after(ms(30)));
        h.lease.script(t[2], NodeScript::ok().ready_after(ms(10)));

        let mut req = h.write_request(oid);
        let code = h.gateway.write(&mut req).await;

        assert_eq!(code, ResultCode::Success);
        assert_eq!(h.lease.sends(), t);
        assert_eq!(h.lease.releases(), vec![t[2], t[0], t[1]]);
        assert!(h.lease.invalidations().is_empty());

        let snap = h.gateway.metrics().snapshot();
        assert_eq!(snap.forwards_sent, 3);
        assert_eq!(snap.lease_releases, 3);
        assert_eq!(snap.lease_invalidations, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_failure_stops_issuing() {
        let h = Harness::new(client());
        let oid = ObjectId::data(1, 1);
        let t = h.targets(oid);
        h.lease.script(t[1], NodeScript::ok().fail_send());

        let mut req = h.write_request(oid);
        let code = h.gateway.write(&mut req).await;

        assert_eq!(code, ResultCode::NetworkError);
        assert_eq!(h.lease.sends(), vec![t[0]]);
        assert_eq!(h.lease.invalidations(), vec![t[1]]);
        assert_eq!(h.lease.purges(), vec![t[1]]);
        assert_eq!(h.lease.releases(), vec![t[0]]);
        assert!(!h
            .lease
            .events()
            .contains(&LeaseEvent::Acquire(t[2])));
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_failure_can_continue_to_later_copies() {
        let config = GatewayConfig {
            continue_on_send_failure: true,
            ..Default::default()
        };
        let h = Harness::build(
            client(),
            ScriptedStore::succeeding(Bytes::new()),
            cluster(3),
            config,
        );
        let oid = ObjectId::data(1, 1);
        let t = h.targets(oid);
        h.lease.script(t[1], NodeScript::ok().fail_send());

        let mut req = h.write_request(oid);
        let code = h.gateway.write(&mut req).await;

        assert_eq!(code, ResultCode::NetworkError);
        assert_eq!(h.lease.sends(), vec![t[0], t[2]]);
        assert_eq!(h.lease.invalidations(), vec![t[1]]);
        assert_eq!(h.lease.releases(), vec![t[0], t[2]]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_failure_stops_before_any_send() {
        let h = Harness::new(client());
        let oid = ObjectId::data(1, 2);
        let t = h.targets(oid);
        h.lease.script(t[0], NodeScript::ok().fail_acquire());

        let mut req = h.write_request(oid);
        assert_eq!(h.gateway.write(&mut req).await, ResultCode::NetworkError);
        assert_eq!(h.lease.events(), vec![LeaseEvent::Acquire(t[0])]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_completed_failure_wins() {
        let h = Harness::new(client());
        let oid = ObjectId::data(1, 3);
        let t = h.targets(oid);
        h.lease.script(
            t[1],
            NodeScript::ok().ready_after(ms(10)).respond(ResultCode::NoSpace),
        );
        h.lease.script(
            t[2],
            NodeScript::ok().ready_after(ms(5)).respond(ResultCode::Io),
        );

        let mut req = h.write_request(oid);
        let code = h.gateway.write(&mut req).await;

        assert_eq!(code, ResultCode::Io);
        // Logical failures leave the connection healthy.
        assert_eq!(h.lease.releases().len(), 3);
        assert!(h.lease.invalidations().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_error_outranks_remote_errors() {
        let config = GatewayConfig {
            continue_on_send_failure: true,
            ..Default::default()
        };
        let h = Harness::build(
            client(),
            ScriptedStore::succeeding(Bytes::new()),
            cluster(3),
            config,
        );
        let oid = ObjectId::data(1, 4);
        let t = h.targets(oid);
        h.lease.script(t[0], NodeScript::ok().respond(ResultCode::NoSpace));
        h.lease.script(t[1], NodeScript::ok().fail_send());

        let mut req = h.write_request(oid);
        assert_eq!(h.gateway.write(&mut req).await, ResultCode::NetworkError);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hangup_invalidates_only_that_forward() {
        let h = Harness::new(client());
        let oid = ObjectId::data(1, 5);
        let t = h.targets(oid);
        h.lease.script(t[1], NodeScript::ok().hangup());

        let mut req = h.write_request(oid);
        let code = h.gateway.write(&mut req).await;

        assert_eq!(code, ResultCode::NetworkError);
        assert_eq!(h.lease.invalidations(), vec![t[1]]);
        assert_eq!(h.lease.releases(), vec![t[0], t[2]]);
        assert!(h.lease.purges().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_response_read_failure_invalidates() {
        let h = Harness::new(client());
        let oid = ObjectId::data(1, 6);
        let t = h.targets(oid);
        h.lease.script(t[0], NodeScript::ok().fail_read());

        let mut req = h.write_request(oid);
        assert_eq!(h.gateway.write(&mut req).await, ResultCode::NetworkError);
        assert_eq!(h.lease.invalidations(), vec![t[0]]);
        assert_eq!(h.lease.releases(), vec![t[1], t[2]]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stray_response_payload_is_drained() {
        let h = Harness::new(client());
        let oid = ObjectId::data(1, 7);
        let t = h.targets(oid);
        h.lease.script(
            t[2],
            NodeScript::ok().with_payload(Bytes::from_static(b"junk")),
        );

        let mut req = h.write_request(oid);
        assert_eq!(h.gateway.write(&mut req).await, ResultCode::Success);
        assert_eq!(h.lease.releases().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_timeout_invalidates_every_outstanding_forward() {
        let config = GatewayConfig {
            poll_timeout: Duration::from_secs(1),
            max_retry_count: 2,
            ..Default::default()
        };
        let h = Harness::build(
            client(),
            ScriptedStore::succeeding(Bytes::new()),
            cluster(3),
            config,
        );
        let oid = ObjectId::data(2, 0);
        let t = h.targets(oid);
        for n in &t {
            h.lease.script(*n, NodeScript::ok().never_ready());
        }

        let start = Instant::now();
        let mut req = h.write_request(oid);
        let code = h.gateway.write(&mut req).await;

        assert_eq!(code, ResultCode::NetworkError);
        assert_eq!(h.lease.invalidations(), t);
        assert!(h.lease.releases().is_empty());
        assert_eq!(h.gateway.metrics().snapshot().poll_timeouts, 3);
        assert!(start.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_timeout_is_fatal_once_epoch_moves() {
        let config = GatewayConfig {
            poll_timeout: Duration::from_secs(1),
            ..Default::default()
        };
        let h = Harness::build(
            client(),
            ScriptedStore::succeeding(Bytes::new()),
            cluster(3),
            config,
        );
        let oid = ObjectId::data(2, 1);
        let t = h.targets(oid);
        h.lease.script(t[0], NodeScript::ok().never_ready());
        h.epochs.advance();

        let mut req = h.write_request(oid);
        assert_eq!(h.gateway.write(&mut req).await, ResultCode::NetworkError);
        assert_eq!(h.gateway.metrics().snapshot().poll_timeouts, 1);
        assert_eq!(h.lease.invalidations(), vec![t[0]]);
        assert_eq!(h.lease.releases(), vec![t[1], t[2]]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_copy_within_retry_budget_succeeds() {
        let config = GatewayConfig {
            poll_timeout: Duration::from_secs(1),
            max_retry_count: 5,
            ..Default::default()
        };
        let h = Harness::build(
            client(),
            ScriptedStore::succeeding(Bytes::new()),
            cluster(3),
            config,
        );
        let oid = ObjectId::data(2, 2);
        let t = h.targets(oid);
        h.lease
            .script(t[0], NodeScript::ok().ready_after(Duration::from_millis(2500)));

        let mut req = h.write_request(oid);
        assert_eq!(h.gateway.write(&mut req).await, ResultCode::Success);
        assert_eq!(h.gateway.metrics().snapshot().poll_timeouts, 2);
        assert_eq!(h.lease.releases(), vec![t[1], t[2], t[0]]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_outcomes_give_same_result() {
        let h = Harness::new(client());
        let oid = ObjectId::data(3, 0);
        let t = h.targets(oid);
        h.lease.script(t[0], NodeScript::ok().ready_after(ms(3)));
        h.lease.script(t[1], NodeScript::ok().respond(ResultCode::NoSpace));
        h.lease.script(t[2], NodeScript::ok().hangup());

        let mut codes = Vec::new();
        let mut histories = Vec::new();
        for _ in 0..3 {
            h.lease.clear_events();
            let mut req = h.write_request(oid);
            codes.push(h.gateway.write(&mut req).await);
            histories.push(h.lease.events());
        }

        assert!(codes.iter().all(|c| *c == codes[0]));
        assert!(histories.iter().all(|e| *e == histories[0]));
        assert_eq!(codes[0], ResultCode::NoSpace);
    }

    #[tokio::test(start_paused = true)]
    async fn test_local_copy_is_served_without_network() {
        let view = cluster(3);
        let oid = ObjectId::data(3, 1);
        let t = targets(&view, oid, 3);
        let h = Harness::build(
            t[1],
            ScriptedStore::succeeding(Bytes::new()),
            view,
            GatewayConfig::default(),
        );

        let mut req = h.write_request(oid);
        assert_eq!(h.gateway.write(&mut req).await, ResultCode::Success);
        assert_eq!(h.lease.sends(), vec![t[0], t[2]]);

        let calls = h.store.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].opcode, Opcode::WritePeer);
        assert_eq!(calls[0].proto_ver, PEER_PROTO_VER);
    }

    #[tokio::test(start_paused = true)]
    async fn test_local_copy_failure_is_reported() {
        let view = cluster(3);
        let oid = ObjectId::data(3, 2);
        let t = targets(&view, oid, 3);
        let h = Harness::build(
            t[0],
            ScriptedStore::failing(ResultCode::NoSpace),
            view,
            GatewayConfig::default(),
        );

        let mut req = h.write_request(oid);
        assert_eq!(h.gateway.write(&mut req).await, ResultCode::NoSpace);
        // Remote forwards are still drained.
        assert_eq!(h.lease.releases().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_and_create_forward_to_every_copy() {
        let h = Harness::new(client());
        let oid = ObjectId::data(3, 3);
        let t = h.targets(oid);

        let mut req = h
            .request(Opcode::CreateAndWriteObj, oid, 3)
            .with_data(Bytes::from_static(b"new"))
            .unwrap();
        assert_eq!(h.gateway.create_and_write(&mut req).await, ResultCode::Success);
        assert_eq!(h.lease.sends(), t);

        h.lease.clear_events();
        let req = h.request(Opcode::RemoveObj, oid, 3);
        assert_eq!(h.gateway.remove(&req).await, ResultCode::Success);
        assert_eq!(h.lease.sends(), t);
    }
}

// =============================================================================
// Placement gates
// =============================================================================

mod placement_gates {
    use super::*;

    #[tokio::test]
    async fn test_readonly_object_makes_no_network_calls() {
        let h = Harness::build(
            client(),
            ScriptedStore::succeeding(Bytes::new()),
            cluster(3).with_snapshot(5),
            GatewayConfig::default(),
        );
        let oid = ObjectId::data(5, 0);

        let mut req = h.write_request(oid);
        assert_eq!(h.gateway.write(&mut req).await, ResultCode::ReadOnly);

        let mut req = h
            .request(Opcode::CreateAndWriteObj, oid, 3)
            .with_data(Bytes::from_static(b"x"))
            .unwrap();
        assert_eq!(h.gateway.create_and_write(&mut req).await, ResultCode::ReadOnly);

        assert!(h.lease.events().is_empty());
        assert!(h.peers.calls().is_empty());
        assert!(h.store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_too_many_copies_for_zones() {
        let h = Harness::new(client());
        let mut req = h.request(Opcode::WriteObj, ObjectId::data(1, 0), 4);
        assert_eq!(
            h.gateway.write(&mut req).await,
            ResultCode::InsufficientCopies
        );

        let mut req = h.request(Opcode::ReadObj, ObjectId::data(1, 0), 32);
        assert_eq!(h.gateway.read(&mut req).await, ResultCode::InvalidParams);
        assert!(h.lease.events().is_empty());
    }

    #[tokio::test]
    async fn test_node_without_vnodes_is_not_a_copy_holder() {
        let lonely = ClusterView::new(
            EPOCH,
            PlacementTable::build(vec![Node::new(node(7000), 0).with_vnodes(0)]).unwrap(),
        );
        let h = Harness::build(
            client(),
            ScriptedStore::succeeding(Bytes::new()),
            lonely,
            GatewayConfig::default(),
        );

        let mut req = h.request(Opcode::ReadObj, ObjectId::data(1, 0), 1);
        assert_eq!(h.gateway.read(&mut req).await, ResultCode::InsufficientCopies);
        let mut req = h.request(Opcode::WriteObj, ObjectId::data(1, 0), 1);
        assert_eq!(h.gateway.write(&mut req).await, ResultCode::InsufficientCopies);
        assert!(h.peers.calls().is_empty());
        assert!(h.lease.events().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_copy_count_from_vdi_then_default() {
        let h = Harness::build(
            client(),
            ScriptedStore::succeeding(Bytes::new()),
            cluster(3).with_vdi_copies(8, 2),
            GatewayConfig::default(),
        );

        let mut req = h.request(Opcode::WriteObj, ObjectId::data(8, 0), 0);
        assert_eq!(h.gateway.write(&mut req).await, ResultCode::Success);
        assert_eq!(h.lease.sends().len(), 2);

        h.lease.clear_events();
        let mut req = h.request(Opcode::WriteObj, ObjectId::data(9, 0), 0);
        assert_eq!(h.gateway.write(&mut req).await, ResultCode::Success);
        assert_eq!(h.lease.sends().len(), 3);
    }

    #[tokio::test]
    async fn test_unknown_opcode_rejected() {
        let h = Harness::new(client());
        let mut req = h.request(Opcode::Other(0x30), ObjectId::data(1, 0), 3);
        assert_eq!(h.gateway.handle(&mut req).await, ResultCode::InvalidParams);
        assert!(h.lease.events().is_empty());
    }
}

// =============================================================================
// Read path
// =============================================================================

mod read_path {
    use super::*;

    #[tokio::test]
    async fn test_local_hit_makes_no_remote_calls() {
        let view = cluster(3);
        let oid = ObjectId::data(4, 0);
        let t = targets(&view, oid, 3);
        let h = Harness::build(
            t[1],
            ScriptedStore::succeeding(Bytes::from_static(b"local")),
            view,
            GatewayConfig::default(),
        );

        let mut req = h.request(Opcode::ReadObj, oid, 3);
        assert_eq!(h.gateway.read(&mut req).await, ResultCode::Success);
        assert_eq!(&req.response_data[..], b"local");
        assert!(h.peers.calls().is_empty());

        let calls = h.store.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].opcode, Opcode::ReadPeer);
        assert_eq!(h.gateway.metrics().snapshot().local_read_hits, 1);
    }

    #[tokio::test]
    async fn test_local_failure_falls_back_to_remote() {
        let view = cluster(3);
        let oid = ObjectId::data(4, 1);
        let t = targets(&view, oid, 3);
        let h = Harness::build(
            t[0],
            ScriptedStore::failing(ResultCode::Io),
            view,
            GatewayConfig::default(),
        );
        h.peers.script(t[1], PeerScript::Fail);
        h.peers.script(
            t[2],
            PeerScript::Reply(ResultCode::Success, Bytes::from_static(b"remote")),
        );

        let mut req = h.request(Opcode::ReadObj, oid, 3);
        assert_eq!(h.gateway.read(&mut req).await, ResultCode::Success);
        assert_eq!(&req.response_data[..], b"remote");
        assert_eq!(req.response.result, ResultCode::Success);
        assert!(!h.peers.calls().contains(&t[0]));
    }

    /// The local pass ends at the first local failure; remaining attempts
    /// all go over the network.
    #[tokio::test]
    async fn test_local_pass_tries_only_once() {
        let view = cluster(3);
        let oid = ObjectId::data(4, 2);
        let t = targets(&view, oid, 3);
        let h = Harness::build(
            t[2],
            ScriptedStore::failing(ResultCode::Io),
            view,
            GatewayConfig::default(),
        );
        h.peers
            .script(t[0], PeerScript::Reply(ResultCode::NoObject, Bytes::new()));
        h.peers
            .script(t[1], PeerScript::Reply(ResultCode::NoObject, Bytes::new()));

        let mut req = h.request(Opcode::ReadObj, oid, 3);
        assert_eq!(h.gateway.read(&mut req).await, ResultCode::NoObject);
        assert_eq!(h.store.calls().len(), 1);
        assert_eq!(h.peers.calls().len(), 2);
        assert!(req.response_data.is_empty());
    }

    #[tokio::test]
    async fn test_remote_scan_is_a_rotation_of_placement() {
        let h = Harness::new(client());
        let oid = ObjectId::data(4, 3);
        let t = h.targets(oid);

        let mut req = h.request(Opcode::ReadObj, oid, 3);
        assert_eq!(h.gateway.read(&mut req).await, ResultCode::NetworkError);

        let calls = h.peers.calls();
        assert_eq!(calls.len(), 3);
        let start = t.iter().position(|n| *n == calls[0]).unwrap();
        for (i, n) in calls.iter().enumerate() {
            assert_eq!(*n, t[(start + i) % 3]);
        }
        assert_eq!(h.gateway.metrics().snapshot().read_failures, 1);
    }

    #[tokio::test]
    async fn test_remote_success_stops_scan() {
        let h = Harness::new(client());
        let oid = ObjectId::data(4, 4);
        for n in h.targets(oid) {
            h.peers.script(
                n,
                PeerScript::Reply(ResultCode::Success, Bytes::from_static(b"copy")),
            );
        }

        let mut req = h.request(Opcode::ReadObj, oid, 3);
        assert_eq!(h.gateway.read(&mut req).await, ResultCode::Success);
        assert_eq!(h.peers.calls().len(), 1);
        assert_eq!(&req.response_data[..], b"copy");
    }
}

// =============================================================================
// Object cache
// =============================================================================

mod object_cache {
    use super::*;

    fn cached(h: Harness) -> (Harness, Arc<RecordingCache>) {
        let cache = Arc::new(RecordingCache::new(ResultCode::Success));
        let Harness {
            view,
            lease,
            peers,
            store,
            epochs,
            gateway,
        } = h;
        let gateway = gateway.with_cache(cache.clone());
        (
            Harness {
                view,
                lease,
                peers,
                store,
                epochs,
                gateway,
            },
            cache,
        )
    }

    #[tokio::test]
    async fn test_cacheable_requests_are_delegated() {
        let (h, cache) = cached(Harness::new(client()));
        let oid = ObjectId::data(6, 0);

        let mut req = h.request(Opcode::ReadObj, oid, 3);
        req.header.flags |= flags::CMD_CACHE;
        assert_eq!(h.gateway.read(&mut req).await, ResultCode::Success);

        let mut req = h.write_request(oid);
        req.header.flags |= flags::CMD_CACHE;
        assert_eq!(h.gateway.write(&mut req).await, ResultCode::Success);

        assert_eq!(cache.calls(), 2);
        assert!(h.lease.events().is_empty());
        assert!(h.peers.calls().is_empty());
        assert_eq!(h.gateway.metrics().snapshot().cache_delegations, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bypassed_requests_reach_replicas() {
        let (h, cache) = cached(Harness::new(client()));
        let oid = ObjectId::data(6, 1);

        // Direct I/O
        let mut req = h.write_request(oid);
        req.header.flags |= flags::CMD_CACHE | flags::CMD_DIRECT;
        assert_eq!(h.gateway.write(&mut req).await, ResultCode::Success);

        // Locally issued
        let mut req = h.write_request(oid).local();
        req.header.flags |= flags::CMD_CACHE;
        assert_eq!(h.gateway.write(&mut req).await, ResultCode::Success);

        // Remove never consults the cache
        let mut req = h.request(Opcode::RemoveObj, oid, 3);
        req.header.flags |= flags::CMD_CACHE;
        assert_eq!(h.gateway.remove(&req).await, ResultCode::Success);

        assert_eq!(cache.calls(), 0);
        assert_eq!(h.lease.sends().len(), 9);
    }
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    /// Completions are handled in readiness order, every forward is
    /// released exactly once, and the set drains to empty.
    #[test]
    fn prop_drain_follows_readiness(delays in prop::collection::vec(1u64..50, 3)) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .start_paused(true)
            .build()
            .unwrap();

        let (code, releases, sends, t) = rt.block_on(async {
            let h = Harness::new(client());
            let oid = ObjectId::data(7, 0);
            let t = h.targets(oid);
            for (n, d) in t.iter().zip(&delays) {
                h.lease.script(*n, NodeScript::ok().ready_after(ms(*d)));
            }
            let mut req = h.write_request(oid);
            let code = h.gateway.write(&mut req).await;
            (code, h.lease.releases(), h.lease.sends(), t)
        });

        let mut order: Vec<usize> = (0..3).collect();
        order.sort_by_key(|&i| (delays[i], i));
        let expected: Vec<NodeId> = order.iter().map(|&i| t[i]).collect();

        prop_assert_eq!(code, ResultCode::Success);
        prop_assert_eq!(sends, t);
        prop_assert_eq!(releases, expected);
    }
}
