//! Write Fan-out Path
//!
//! Sends a write-class request to every copy in placement order, then
//! drains the outstanding forwards one readiness event at a time. The drain
//! always runs to empty: a failure on one copy never cancels the others.

use std::future::Future;
use std::task::Poll;

use futures::future::poll_fn;
use tokio::time::timeout;
use tracing::{debug, error, warn};

use super::forward_set::{ForwardEntry, ForwardSet};
use super::Gateway;
use crate::domain::{ConnectionLease, Outcome, PeerConnection, Readiness, Request, ResultCode};
use crate::net::{IoRetry, RetryBudget};

impl<L: ConnectionLease> Gateway<L> {
    /// Fan `req` out to all of its copies and wait for every issued forward.
    pub(super) async fn forward_request(&self, req: &Request) -> ResultCode {
        let copies = req.copy_number(self.config.default_copies);
        let targets = match req.view.resolve(req.oid(), copies, self.config.max_copies) {
            Ok(targets) => targets,
            Err(e) => {
                warn!(copies, error = %e, "Cannot place object");
                return e.result_code();
            }
        };

        let header = req.header.to_peer();
        let io = self.io_retry(req);
        let mut outcome = Outcome::new();
        let mut set = ForwardSet::with_capacity(targets.len());
        let mut serve_local = false;

        for target in &targets {
            let node = *target.node_id();
            if node == self.local {
                serve_local = true;
                continue;
            }

            let mut conn = match self.lease.acquire(&node).await {
                Ok(conn) => conn,
                Err(e) => {
                    error!(node = %node, error = %e, "Failed to connect to copy holder");
                    self.metrics.record_forward_failure();
                    outcome.record(ResultCode::NetworkError);
                    if self.config.continue_on_send_failure {
                        continue;
                    }
                    break;
                }
            };

            conn.queue_request(&header, &req.data);
            if let Err(e) = io.flush(&node, &mut conn).await {
                error!(node = %node, error = %e, "Failed to send forward");
                self.metrics.record_forward_failure();
                self.invalidate(&node, conn);
                self.lease.invalidate_all_for_node(&node);
                outcome.record(ResultCode::NetworkError);
                if self.config.continue_on_send_failure {
                    continue;
                }
                break;
            }

            if let Err(ForwardEntry { node, conn }) = set.push(node, conn) {
                error!(node = %node, error = %set.full_error(), "Forward not tracked");
                self.invalidate(&node, conn);
                outcome.record(ResultCode::NetworkError);
                break;
            }
            self.metrics.record_forward_sent();
            debug!(node = %node, outstanding = set.len(), "Forward issued");
        }

        if serve_local {
            let reply = self.store.serve_local(&header, req.data.clone()).await;
            if !reply.result().is_success() {
                warn!(result = %reply.result(), "Local copy failed");
                outcome.record(reply.result());
            }
        }

        self.wait_forwards(&mut set, req, &mut outcome).await;
        outcome.code()
    }

    /// Drain `set` to empty, recording each failure into `outcome`.
    pub(super) async fn wait_forwards(
        &self,
        set: &mut ForwardSet<L::Conn>,
        req: &Request,
        outcome: &mut Outcome,
    ) {
        let io = self.io_retry(req);
        let mut budget = RetryBudget::new(self.config.max_retry_count);

        while !set.is_empty() {
            let polled = timeout(self.config.poll_timeout, first_ready(set)).await;
            let (pos, readiness) = match polled {
                Ok(ready) => ready,
                Err(_) => {
                    self.metrics.record_poll_timeout();
                    if budget.take(self.epochs.as_ref(), req.epoch()) {
                        warn!(
                            outstanding = set.len(),
                            remaining = budget.remaining(),
                            "Poll timed out, retrying"
                        );
                        continue;
                    }
                    error!(
                        outstanding = ?set.nodes(),
                        "Poll timed out, giving up on outstanding forwards"
                    );
                    for ForwardEntry { node, conn } in set.drain() {
                        self.metrics.record_forward_failure();
                        self.invalidate(&node, conn);
                    }
                    outcome.record(ResultCode::NetworkError);
                    return;
                }
            };

            let ForwardEntry { node, mut conn } = set.remove(pos);
            if !readiness.is_readable() {
                error!(node = %node, ?readiness, "Forward connection broken");
                self.metrics.record_forward_failure();
                self.invalidate(&node, conn);
                outcome.record(ResultCode::NetworkError);
                continue;
            }

            let rsp = match io.read_response(&node, &mut conn).await {
                Ok(rsp) => rsp,
                Err(e) => {
                    error!(node = %node, error = %e, "Failed to read forward response");
                    self.metrics.record_forward_failure();
                    self.invalidate(&node, conn);
                    outcome.record(ResultCode::NetworkError);
                    continue;
                }
            };

            if rsp.data_length > 0 {
                // Write-class replies carry no payload; discard any so the
                // connection goes back clean.
                let len = rsp.data_length as usize;
                if let Err(e) = io.read_payload(&node, &mut conn, len).await {
                    error!(node = %node, error = %e, "Failed to read forward payload");
                    self.metrics.record_forward_failure();
                    self.invalidate(&node, conn);
                    outcome.record(ResultCode::NetworkError);
                    continue;
                }
            }

            if !rsp.result.is_success() {
                warn!(node = %node, result = %rsp.result, "Copy holder reported failure");
                self.metrics.record_forward_failure();
                outcome.record(rsp.result);
            }
            self.release(&node, conn);
        }
    }

    fn io_retry(&self, req: &Request) -> IoRetry<'_> {
        IoRetry::new(
            self.config.io_timeout,
            self.config.max_retry_count,
            self.epochs.as_ref(),
            req.epoch(),
        )
    }
}

/// Wait until any outstanding connection shows an event and return the
/// lowest such position.
async fn first_ready<C: PeerConnection>(set: &ForwardSet<C>) -> (usize, Readiness) {
    let mut waits: Vec<_> = set.iter().map(|entry| entry.conn.ready()).collect();
    poll_fn(|cx| {
        for (pos, wait) in waits.iter_mut().enumerate() {
            if let Poll::Ready(readiness) = wait.as_mut().poll(cx) {
                return Poll::Ready((pos, readiness));
            }
        }
        Poll::Pending
    })
    .await
}
