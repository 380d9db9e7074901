//! Object cache adapters.

use async_trait::async_trait;

use crate::domain::{ObjectCache, Request, ResultCode};

/// Cache that is never enabled; every request goes to the replicas.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledObjectCache;

#[async_trait]
impl ObjectCache for DisabledObjectCache {
    fn is_enabled(&self) -> bool {
        false
    }

    async fn handle(&self, _req: &mut Request) -> ResultCode {
        ResultCode::SystemError
    }
}
