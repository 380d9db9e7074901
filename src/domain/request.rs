//! Request and response envelopes handled by the gateway.

use std::sync::Arc;

use bytes::Bytes;

use super::result::ResultCode;
use super::types::{Epoch, ObjectId};
use crate::error::{Error, Result};
use crate::placement::ClusterView;

/// Protocol version spoken between gateway and clients.
pub const PROTO_VER: u8 = 0x02;

/// Protocol version spoken between peers.
pub const PEER_PROTO_VER: u8 = 0x09;

// =============================================================================
// Opcodes
// =============================================================================

/// Operation named by a request header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    CreateAndWriteObj,
    ReadObj,
    WriteObj,
    RemoveObj,
    CreateAndWritePeer,
    ReadPeer,
    WritePeer,
    RemovePeer,
    Other(u8),
}

impl Opcode {
    pub fn from_u8(raw: u8) -> Self {
        match raw {
            0x01 => Opcode::CreateAndWriteObj,
            0x02 => Opcode::ReadObj,
            0x03 => Opcode::WriteObj,
            0x04 => Opcode::RemoveObj,
            0xA4 => Opcode::CreateAndWritePeer,
            0xA5 => Opcode::ReadPeer,
            0xA6 => Opcode::WritePeer,
            0xA7 => Opcode::RemovePeer,
            other => Opcode::Other(other),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            Opcode::CreateAndWriteObj => 0x01,
            Opcode::ReadObj => 0x02,
            Opcode::WriteObj => 0x03,
            Opcode::RemoveObj => 0x04,
            Opcode::CreateAndWritePeer => 0xA4,
            Opcode::ReadPeer => 0xA5,
            Opcode::WritePeer => 0xA6,
            Opcode::RemovePeer => 0xA7,
            Opcode::Other(raw) => *raw,
        }
    }

    /// The opcode a peer executes on behalf of this gateway opcode.
    pub fn to_peer(self) -> Self {
        match self {
            Opcode::CreateAndWriteObj => Opcode::CreateAndWritePeer,
            Opcode::ReadObj => Opcode::ReadPeer,
            Opcode::WriteObj => Opcode::WritePeer,
            Opcode::RemoveObj => Opcode::RemovePeer,
            other => other,
        }
    }

    /// True for operations that carry a payload to the replicas.
    pub fn carries_payload(&self) -> bool {
        matches!(
            self,
            Opcode::CreateAndWriteObj
                | Opcode::WriteObj
                | Opcode::CreateAndWritePeer
                | Opcode::WritePeer
        )
    }
}

/// Request header flag bits.
pub mod flags {
    /// Request carries a payload
    pub const CMD_WRITE: u16 = 0x01;
    /// Copy-on-write from `cow_oid`
    pub const CMD_COW: u16 = 0x02;
    /// Request may be served by the object cache
    pub const CMD_CACHE: u16 = 0x04;
    /// Skip the object cache and go straight to replicas
    pub const CMD_DIRECT: u16 = 0x08;
}

// =============================================================================
// Headers
// =============================================================================

/// Fixed-size request header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHeader {
    pub proto_ver: u8,
    pub opcode: Opcode,
    pub flags: u16,
    pub epoch: Epoch,
    pub id: u32,
    pub data_length: u32,
    pub oid: ObjectId,
    pub cow_oid: ObjectId,
    /// Requested copy count, 0 for "derive from object class"
    pub copies: u8,
    pub copy_policy: u8,
    pub tgt_epoch: Epoch,
    pub offset: u64,
}

impl RequestHeader {
    pub fn new(opcode: Opcode, oid: ObjectId, epoch: Epoch) -> Self {
        Self {
            proto_ver: PROTO_VER,
            opcode,
            flags: 0,
            epoch,
            id: 0,
            data_length: 0,
            oid,
            cow_oid: ObjectId::new(0),
            copies: 0,
            copy_policy: 0,
            tgt_epoch: epoch,
            offset: 0,
        }
    }

    pub fn with_flags(mut self, flags: u16) -> Self {
        self.flags |= flags;
        self
    }

    pub fn with_copies(mut self, copies: u8) -> Self {
        self.copies = copies;
        self
    }

    pub fn with_range(mut self, offset: u64, length: u32) -> Self {
        self.offset = offset;
        self.data_length = length;
        self
    }

    pub fn has_flag(&self, flag: u16) -> bool {
        self.flags & flag != 0
    }

    /// Copy of this header addressed to a peer.
    pub fn to_peer(&self) -> Self {
        let mut fwd = self.clone();
        fwd.opcode = self.opcode.to_peer();
        fwd.proto_ver = PEER_PROTO_VER;
        fwd
    }
}

/// Fixed-size response header.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResponseHeader {
    pub proto_ver: u8,
    pub opcode: u8,
    pub flags: u16,
    pub epoch: Epoch,
    pub id: u32,
    pub data_length: u32,
    pub result: ResultCode,
    pub copies: u8,
    pub offset: u64,
}

impl ResponseHeader {
    /// Response to `req` carrying `result` and no payload.
    pub fn for_request(req: &RequestHeader, result: ResultCode) -> Self {
        Self {
            proto_ver: req.proto_ver,
            opcode: req.opcode.as_u8(),
            flags: req.flags,
            epoch: req.epoch,
            id: req.id,
            data_length: 0,
            result,
            copies: req.copies,
            offset: req.offset,
        }
    }
}

// =============================================================================
// Request / Reply
// =============================================================================

/// Reply from the local store or a remote peer.
#[derive(Debug, Clone, Default)]
pub struct PeerReply {
    pub header: ResponseHeader,
    pub data: Bytes,
}

impl PeerReply {
    pub fn new(header: ResponseHeader, data: Bytes) -> Self {
        Self { header, data }
    }

    /// Payload-less reply to `req`.
    pub fn status(req: &RequestHeader, result: ResultCode) -> Self {
        Self::new(ResponseHeader::for_request(req, result), Bytes::new())
    }

    pub fn result(&self) -> ResultCode {
        self.header.result
    }
}

/// An inbound operation on its way through the gateway.
///
/// The gateway only writes `response` and `response_data`, and only when a
/// read succeeds or a collaborator handles the request.
#[derive(Debug, Clone)]
pub struct Request {
    pub header: RequestHeader,
    /// Payload for write-class operations
    pub data: Bytes,
    pub response: ResponseHeader,
    pub response_data: Bytes,
    /// Issued by this node rather than received from a client
    pub local: bool,
    /// Placement snapshot this request is resolved against
    pub view: Arc<ClusterView>,
}

impl Request {
    pub fn new(header: RequestHeader, view: Arc<ClusterView>) -> Self {
        Self {
            header,
            data: Bytes::new(),
            response: ResponseHeader::default(),
            response_data: Bytes::new(),
            local: false,
            view,
        }
    }

    /// Attach a write payload; sets `data_length` and the write flag.
    pub fn with_data(mut self, data: Bytes) -> Result<Self> {
        self.header.data_length = data_length(data.len())?;
        self.header.flags |= flags::CMD_WRITE;
        self.data = data;
        Ok(self)
    }

    pub fn local(mut self) -> Self {
        self.local = true;
        self
    }

    pub fn oid(&self) -> ObjectId {
        self.header.oid
    }

    pub fn epoch(&self) -> Epoch {
        self.header.epoch
    }

    /// Number of replicas this request addresses.
    ///
    /// The header's count wins; otherwise the VDI's count from the view,
    /// otherwise `default_copies`.
    pub fn copy_number(&self, default_copies: u8) -> usize {
        if self.header.copies != 0 {
            return self.header.copies as usize;
        }
        self.view
            .vdi_copies(self.header.oid.vid())
            .unwrap_or(default_copies) as usize
    }

    /// Store a successful reply into the response buffer.
    pub fn set_response(&mut self, reply: PeerReply) {
        self.response = reply.header;
        self.response_data = reply.data;
    }
}

fn data_length(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| Error::PayloadTooLarge {
        len,
        max: u32::MAX as usize,
    })
}
