//! In-memory local object store.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use tracing::debug;

use crate::domain::{
    LocalStore, ObjectId, Opcode, PeerReply, RequestHeader, ResponseHeader, ResultCode,
};
use crate::MAX_PAYLOAD_SIZE;

/// Local store statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub objects: u64,
    pub reads: u64,
    pub writes: u64,
    pub removes: u64,
}

/// [`LocalStore`] keeping objects in a concurrent map.
///
/// Executes the peer opcodes only; gateway opcodes never reach a store.
#[derive(Debug, Default)]
pub struct InMemoryLocalStore {
    objects: DashMap<ObjectId, Vec<u8>>,
    reads: AtomicU64,
    writes: AtomicU64,
    removes: AtomicU64,
}

impl InMemoryLocalStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, oid: ObjectId) -> bool {
        self.objects.contains_key(&oid)
    }

    /// Copy of an object's bytes.
    pub fn get(&self, oid: ObjectId) -> Option<Bytes> {
        self.objects.get(&oid).map(|v| Bytes::copy_from_slice(&v))
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            objects: self.objects.len() as u64,
            reads: self.reads.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            removes: self.removes.load(Ordering::Relaxed),
        }
    }

    fn read(&self, header: &RequestHeader) -> PeerReply {
        self.reads.fetch_add(1, Ordering::Relaxed);
        let Some(object) = self.objects.get(&header.oid) else {
            return PeerReply::status(header, ResultCode::NoObject);
        };

        let start = (header.offset as usize).min(object.len());
        let end = match header.data_length {
            0 => object.len(),
            len => (start + len as usize).min(object.len()),
        };
        let data = Bytes::copy_from_slice(&object[start..end]);

        let mut rsp = ResponseHeader::for_request(header, ResultCode::Success);
        rsp.data_length = data.len() as u32;
        PeerReply::new(rsp, data)
    }

    fn write(&self, header: &RequestHeader, data: &[u8], create: bool) -> PeerReply {
        self.writes.fetch_add(1, Ordering::Relaxed);
        let end = match (header.offset as usize).checked_add(data.len()) {
            Some(end) if end <= MAX_PAYLOAD_SIZE => end,
            _ => return PeerReply::status(header, ResultCode::InvalidParams),
        };
        let mut object = match self.objects.get_mut(&header.oid) {
            Some(object) => object,
            None if create => self.objects.entry(header.oid).or_default(),
            None => return PeerReply::status(header, ResultCode::NoObject),
        };

        let offset = header.offset as usize;
        if object.len() < end {
            object.resize(end, 0);
        }
        object[offset..end].copy_from_slice(data);
        debug!(oid = %header.oid, offset, len = data.len(), "Stored object bytes");
        PeerReply::status(header, ResultCode::Success)
    }

    fn remove(&self, header: &RequestHeader) -> PeerReply {
        self.removes.fetch_add(1, Ordering::Relaxed);
        match self.objects.remove(&header.oid) {
            Some(_) => PeerReply::status(header, ResultCode::Success),
            None => PeerReply::status(header, ResultCode::NoObject),
        }
    }
}

#[async_trait]
impl LocalStore for InMemoryLocalStore {
    async fn serve_local(&self, header: &RequestHeader, data: Bytes) -> PeerReply {
        match header.opcode {
            Opcode::ReadPeer => self.read(header),
            Opcode::WritePeer => self.write(header, &data, false),
            Opcode::CreateAndWritePeer => self.write(header, &data, true),
            Opcode::RemovePeer => self.remove(header),
            _ => PeerReply::status(header, ResultCode::InvalidParams),
        }
    }
}
