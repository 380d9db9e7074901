//! Fixed-size header codec.
//!
//! Both headers are 48 bytes, little-endian.
//!
//! ```text
//! request:  ver:1 op:1 flags:2 epoch:4 id:4 len:4 | oid:8 cow_oid:8
//!           copies:1 policy:1 rsv:2 tgt_epoch:4 offset:8
//! response: ver:1 op:1 flags:2 epoch:4 id:4 len:4 | result:4
//!           copies:1 rsv:3 offset:8 rsv:16
//! ```

use bytes::{Buf, BufMut};

use crate::domain::{ObjectId, Opcode, RequestHeader, ResponseHeader, ResultCode};
use crate::error::{Error, Result};

pub const REQUEST_HEADER_SIZE: usize = 48;
pub const RESPONSE_HEADER_SIZE: usize = 48;

impl RequestHeader {
    pub fn encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_u8(self.proto_ver);
        buf.put_u8(self.opcode.as_u8());
        buf.put_u16_le(self.flags);
        buf.put_u32_le(self.epoch);
        buf.put_u32_le(self.id);
        buf.put_u32_le(self.data_length);
        buf.put_u64_le(self.oid.raw());
        buf.put_u64_le(self.cow_oid.raw());
        buf.put_u8(self.copies);
        buf.put_u8(self.copy_policy);
        buf.put_u16_le(0);
        buf.put_u32_le(self.tgt_epoch);
        buf.put_u64_le(self.offset);
    }

    pub fn decode<B: Buf>(buf: &mut B) -> Result<Self> {
        if buf.remaining() < REQUEST_HEADER_SIZE {
            return Err(Error::Codec(format!(
                "request header needs {} bytes, have {}",
                REQUEST_HEADER_SIZE,
                buf.remaining()
            )));
        }
        let proto_ver = buf.get_u8();
        let opcode = Opcode::from_u8(buf.get_u8());
        let flags = buf.get_u16_le();
        let epoch = buf.get_u32_le();
        let id = buf.get_u32_le();
        let data_length = buf.get_u32_le();
        let oid = ObjectId::new(buf.get_u64_le());
        let cow_oid = ObjectId::new(buf.get_u64_le());
        let copies = buf.get_u8();
        let copy_policy = buf.get_u8();
        buf.advance(2);
        let tgt_epoch = buf.get_u32_le();
        let offset = buf.get_u64_le();

        Ok(Self {
            proto_ver,
            opcode,
            flags,
            epoch,
            id,
            data_length,
            oid,
            cow_oid,
            copies,
            copy_policy,
            tgt_epoch,
            offset,
        })
    }
}

impl ResponseHeader {
    pub fn encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_u8(self.proto_ver);
        buf.put_u8(self.opcode);
        buf.put_u16_le(self.flags);
        buf.put_u32_le(self.epoch);
        buf.put_u32_le(self.id);
        buf.put_u32_le(self.data_length);
        buf.put_u32_le(self.result.as_u32());
        buf.put_u8(self.copies);
        buf.put_bytes(0, 3);
        buf.put_u64_le(self.offset);
        buf.put_bytes(0, 16);
    }

    pub fn decode<B: Buf>(buf: &mut B) -> Result<Self> {
        if buf.remaining() < RESPONSE_HEADER_SIZE {
            return Err(Error::Codec(format!(
                "response header needs {} bytes, have {}",
                RESPONSE_HEADER_SIZE,
                buf.remaining()
            )));
        }
        let proto_ver = buf.get_u8();
        let opcode = buf.get_u8();
        let flags = buf.get_u16_le();
        let epoch = buf.get_u32_le();
        let id = buf.get_u32_le();
        let data_length = buf.get_u32_le();
        let result = ResultCode::from_u32(buf.get_u32_le());
        let copies = buf.get_u8();
        buf.advance(3);
        let offset = buf.get_u64_le();
        buf.advance(16);

        Ok(Self {
            proto_ver,
            opcode,
            flags,
            epoch,
            id,
            data_length,
            result,
            copies,
            offset,
        })
    }
}
