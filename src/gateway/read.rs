//! Read Path
//!
//! Local copy first; then remote copies round-robin from a random start so
//! that reads spread over all replicas instead of hammering the first one.

use bytes::Bytes;
use rand::Rng;
use tracing::{debug, warn};

use super::Gateway;
use crate::domain::{ConnectionLease, Request, ResultCode};

impl<L: ConnectionLease> Gateway<L> {
    pub(super) async fn read_replicas(&self, req: &mut Request) -> ResultCode {
        let copies = req.copy_number(self.config.default_copies);
        let targets = match req.view.resolve(req.oid(), copies, self.config.max_copies) {
            Ok(targets) => targets,
            Err(e) => {
                warn!(copies, error = %e, "Cannot place object");
                self.metrics.record_read_failure();
                return e.result_code();
            }
        };
        let header = req.header.to_peer();
        let mut result = ResultCode::Success;

        // Only the first local copy is tried. A local failure points at this
        // node's store, not at placement.
        if targets.iter().any(|t| t.is_local(&self.local)) {
            let reply = self.store.serve_local(&header, Bytes::new()).await;
            if reply.result().is_success() {
                self.metrics.record_local_read_hit();
                req.set_response(reply);
                return ResultCode::Success;
            }
            result = reply.result();
            warn!(result = %result, "Local read failed, trying remote copies");
        }

        let n = targets.len();
        if n == 0 {
            warn!(copies, "Placement returned no copies");
            self.metrics.record_read_failure();
            return ResultCode::InsufficientCopies;
        }
        let start = rand::thread_rng().gen_range(0..n);
        for i in 0..n {
            let target = &targets[(start + i) % n];
            if target.is_local(&self.local) {
                continue;
            }
            let node = target.node_id();
            self.metrics.record_remote_read();
            match self.peers.send_and_receive(node, &header, Bytes::new()).await {
                Ok(reply) if reply.result().is_success() => {
                    debug!(node = %node, "Remote read served");
                    req.set_response(reply);
                    return ResultCode::Success;
                }
                Ok(reply) => {
                    result = reply.result();
                    warn!(node = %node, result = %result, "Remote copy refused read");
                }
                Err(e) => {
                    result = e.result_code();
                    warn!(node = %node, error = %e, "Remote read failed");
                }
            }
        }

        if !result.is_success() {
            self.metrics.record_read_failure();
        }
        result
    }
}
