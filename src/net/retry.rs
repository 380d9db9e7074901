//! Epoch-gated retry of timed-out I/O.
//!
//! A timeout is retried only while the cluster epoch still equals the
//! request's epoch and budget remains: if a NIC is down the epoch never
//! moves, so the budget is what stops the wait.

use std::time::Duration;

use bytes::Bytes;
use tokio::time::timeout;
use tracing::warn;

use crate::domain::{Epoch, EpochPolicy, NodeId, PeerConnection, ResponseHeader};
use crate::error::{Error, Result};

/// Countdown of retries for one operation.
#[derive(Debug, Clone, Copy)]
pub struct RetryBudget {
    remaining: u32,
}

impl RetryBudget {
    pub fn new(max_retries: u32) -> Self {
        Self {
            remaining: max_retries,
        }
    }

    /// Spend one retry if `epoch` is still current and budget remains.
    pub fn take(&mut self, epochs: &dyn EpochPolicy, epoch: Epoch) -> bool {
        if self.remaining > 0 && epochs.need_retry(epoch) {
            self.remaining -= 1;
            true
        } else {
            false
        }
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }
}

/// Retry policy for the cancellation-safe operations of a [`PeerConnection`].
pub struct IoRetry<'a> {
    pub timeout: Duration,
    pub max_retries: u32,
    pub epochs: &'a dyn EpochPolicy,
    pub epoch: Epoch,
}

macro_rules! retry_on_timeout {
    ($self:ident, $node:expr, $operation:literal, $io:expr) => {{
        let mut budget = RetryBudget::new($self.max_retries);
        loop {
            match timeout($self.timeout, $io).await {
                Ok(result) => break result,
                Err(_) if budget.take($self.epochs, $self.epoch) => {
                    warn!(
                        node = %$node,
                        operation = $operation,
                        remaining = budget.remaining(),
                        "I/O timed out, retrying"
                    );
                }
                Err(_) => {
                    break Err(Error::Timeout {
                        node: *$node,
                        operation: $operation,
                    })
                }
            }
        }
    }};
}

impl<'a> IoRetry<'a> {
    pub fn new(
        timeout: Duration,
        max_retries: u32,
        epochs: &'a dyn EpochPolicy,
        epoch: Epoch,
    ) -> Self {
        Self {
            timeout,
            max_retries,
            epochs,
            epoch,
        }
    }

    /// Write out everything queued on `conn`.
    pub async fn flush<C>(&self, node: &NodeId, conn: &mut C) -> Result<()>
    where
        C: PeerConnection + ?Sized,
    {
        retry_on_timeout!(self, node, "send", conn.flush())
    }

    /// Read one response header from `conn`.
    pub async fn read_response<C>(&self, node: &NodeId, conn: &mut C) -> Result<ResponseHeader>
    where
        C: PeerConnection + ?Sized,
    {
        retry_on_timeout!(self, node, "read response", conn.read_response())
    }

    /// Read `len` payload bytes from `conn`.
    pub async fn read_payload<C>(&self, node: &NodeId, conn: &mut C, len: usize) -> Result<Bytes>
    where
        C: PeerConnection + ?Sized,
    {
        retry_on_timeout!(self, node, "read payload", conn.read_payload(len))
    }
}
