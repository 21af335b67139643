//! Encoding/decoding of wire records into byte buffers.
//!
//! Only the header plus the bytes of the active arm are ever written to the
//! wire, mirroring the original design of sending `sizeof(sn) +
//! sizeof(type) + sizeof(active body arm)` bytes rather than the full
//! union. Decoding goes the other way: read the header, switch on `op`,
//! and reinterpret the remaining bytes as the matching arm.

use arrayvec::ArrayVec;
use dataview::{DataView, Pod, PodMethods as _};

use crate::wire::{
    CopyArgs, CopyResult, CreateArgs, CreateResult, LookupArgs, LookupResult, MkdirArgs,
    MkdirResult, OpCode, PingArgs, PingResult, ReadArgs, ReadResult, ReaddirArgs, ReaddirResult,
    RequestHeader, ResponseHeader, WriteArgs, WriteResult, MAX_REQUEST_WIRE_SIZE,
    MAX_RESPONSE_WIRE_SIZE,
};

/// A decode/encode buffer sized to the largest possible request.
pub type RequestBuf = ArrayVec<u8, MAX_REQUEST_WIRE_SIZE>;
/// A decode/encode buffer sized to the largest possible response.
pub type ResponseBuf = ArrayVec<u8, MAX_RESPONSE_WIRE_SIZE>;

/// Errors from parsing a byte buffer received off the wire.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("datagram too short: got {got} bytes, need at least {need}")]
    TooShort { got: usize, need: usize },
    #[error("unrecognized operation code {0}")]
    UnknownOpCode(u32),
}

/// The ergonomic, typed view of a request: a header plus the payload for
/// whichever operation `op` names.
#[derive(Debug, Clone, Copy)]
pub enum SnfsRequestBody {
    Ping(PingArgs),
    Lookup(LookupArgs),
    Read(ReadArgs),
    Write(WriteArgs),
    Create(CreateArgs),
    Mkdir(MkdirArgs),
    Readdir(ReaddirArgs),
    Copy(CopyArgs),
}

impl SnfsRequestBody {
    #[must_use]
    pub const fn op(&self) -> OpCode {
        match self {
            Self::Ping(_) => OpCode::Ping,
            Self::Lookup(_) => OpCode::Lookup,
            Self::Read(_) => OpCode::Read,
            Self::Write(_) => OpCode::Write,
            Self::Create(_) => OpCode::Create,
            Self::Mkdir(_) => OpCode::Mkdir,
            Self::Readdir(_) => OpCode::Readdir,
            Self::Copy(_) => OpCode::Copy,
        }
    }

    fn write_args(&self, buf: &mut RequestBuf) {
        match self {
            Self::Ping(a) => buf.try_extend_from_slice(a.as_bytes()).unwrap(),
            Self::Lookup(a) => buf.try_extend_from_slice(a.as_bytes()).unwrap(),
            Self::Read(a) => buf.try_extend_from_slice(a.as_bytes()).unwrap(),
            Self::Write(a) => buf.try_extend_from_slice(a.as_bytes()).unwrap(),
            Self::Create(a) => buf.try_extend_from_slice(a.as_bytes()).unwrap(),
            Self::Mkdir(a) => buf.try_extend_from_slice(a.as_bytes()).unwrap(),
            Self::Readdir(a) => buf.try_extend_from_slice(a.as_bytes()).unwrap(),
            Self::Copy(a) => buf.try_extend_from_slice(a.as_bytes()).unwrap(),
        }
    }
}

/// A full request: serial number, the fan-out flag, and the typed body.
#[derive(Debug, Clone, Copy)]
pub struct SnfsRequest {
    pub sn: u32,
    pub to_all_servers: bool,
    pub body: SnfsRequestBody,
}

impl SnfsRequest {
    #[must_use]
    pub fn encode(&self) -> RequestBuf {
        let header = RequestHeader {
            sn: self.sn,
            op: self.body.op() as u32,
            to_all_servers: u32::from(self.to_all_servers),
        };
        let mut buf = RequestBuf::new();
        buf.try_extend_from_slice(header.as_bytes()).unwrap();
        self.body.write_args(&mut buf);
        buf
    }

    /// Decodes a request from the bytes of a received datagram.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] if the datagram is too short for its header
    /// or declared operation, or if the operation code is not recognized.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let header = read::<RequestHeader>(bytes, 0)?;
        let op = OpCode::from_repr(header.op).ok_or(DecodeError::UnknownOpCode(header.op))?;
        let rest = &bytes[size_of::<RequestHeader>()..];
        let body = match op {
            OpCode::Ping => SnfsRequestBody::Ping(*read::<PingArgs>(rest, 0)?),
            OpCode::Lookup => SnfsRequestBody::Lookup(*read::<LookupArgs>(rest, 0)?),
            OpCode::Read => SnfsRequestBody::Read(*read::<ReadArgs>(rest, 0)?),
            OpCode::Write => SnfsRequestBody::Write(*read::<WriteArgs>(rest, 0)?),
            OpCode::Create => SnfsRequestBody::Create(*read::<CreateArgs>(rest, 0)?),
            OpCode::Mkdir => SnfsRequestBody::Mkdir(*read::<MkdirArgs>(rest, 0)?),
            OpCode::Readdir => SnfsRequestBody::Readdir(*read::<ReaddirArgs>(rest, 0)?),
            OpCode::Copy => SnfsRequestBody::Copy(*read::<CopyArgs>(rest, 0)?),
        };
        Ok(Self {
            sn: header.sn,
            to_all_servers: header.to_all_servers != 0,
            body,
        })
    }
}

/// The ergonomic, typed view of a response payload.
#[derive(Debug, Clone, Copy)]
pub enum SnfsResponseBody {
    Ping(PingResult),
    Lookup(LookupResult),
    Read(ReadResult),
    Write(WriteResult),
    Create(CreateResult),
    Mkdir(MkdirResult),
    Readdir(ReaddirResult),
    Copy(CopyResult),
}

impl SnfsResponseBody {
    fn write_result(&self, buf: &mut ResponseBuf) {
        match self {
            Self::Ping(r) => buf.try_extend_from_slice(r.as_bytes()).unwrap(),
            Self::Lookup(r) => buf.try_extend_from_slice(r.as_bytes()).unwrap(),
            Self::Read(r) => buf.try_extend_from_slice(r.as_bytes()).unwrap(),
            Self::Write(r) => buf.try_extend_from_slice(r.as_bytes()).unwrap(),
            Self::Create(r) => buf.try_extend_from_slice(r.as_bytes()).unwrap(),
            Self::Mkdir(r) => buf.try_extend_from_slice(r.as_bytes()).unwrap(),
            Self::Readdir(r) => buf.try_extend_from_slice(r.as_bytes()).unwrap(),
            Self::Copy(r) => buf.try_extend_from_slice(r.as_bytes()).unwrap(),
        }
    }
}

/// A full response: echoed serial number, status code, and the typed body
/// (meaningful only when `status` is [`crate::SnfsError::Ok`]).
#[derive(Debug, Clone, Copy)]
pub struct SnfsResponse {
    pub sn: u32,
    pub status: crate::SnfsError,
    pub body: SnfsResponseBody,
}

impl SnfsResponse {
    #[must_use]
    pub fn encode(&self) -> ResponseBuf {
        let header = ResponseHeader {
            sn: self.sn,
            status: self.status.raw(),
        };
        let mut buf = ResponseBuf::new();
        buf.try_extend_from_slice(header.as_bytes()).unwrap();
        self.body.write_result(&mut buf);
        buf
    }

    /// Decodes a response from the bytes of a received datagram, given the
    /// operation that was requested (the response carries no op code of its
    /// own; the client already knows which call it made).
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] if the datagram is too short for its header
    /// or declared operation.
    pub fn decode(bytes: &[u8], op: OpCode) -> Result<Self, DecodeError> {
        let header = read::<ResponseHeader>(bytes, 0)?;
        let rest = &bytes[size_of::<ResponseHeader>()..];
        let body = match op {
            OpCode::Ping => SnfsResponseBody::Ping(*read::<PingResult>(rest, 0)?),
            OpCode::Lookup => SnfsResponseBody::Lookup(*read::<LookupResult>(rest, 0)?),
            OpCode::Read => SnfsResponseBody::Read(*read::<ReadResult>(rest, 0)?),
            OpCode::Write => SnfsResponseBody::Write(*read::<WriteResult>(rest, 0)?),
            OpCode::Create => SnfsResponseBody::Create(*read::<CreateResult>(rest, 0)?),
            OpCode::Mkdir => SnfsResponseBody::Mkdir(*read::<MkdirResult>(rest, 0)?),
            OpCode::Readdir => SnfsResponseBody::Readdir(*read::<ReaddirResult>(rest, 0)?),
            OpCode::Copy => SnfsResponseBody::Copy(*read::<CopyResult>(rest, 0)?),
        };
        Ok(Self {
            sn: header.sn,
            status: crate::SnfsError::from_raw(header.status),
            body,
        })
    }
}

fn read<T: Pod>(bytes: &[u8], offset: usize) -> Result<&T, DecodeError> {
    let need = offset + size_of::<T>();
    if bytes.len() < need {
        return Err(DecodeError::TooShort {
            got: bytes.len(),
            need,
        });
    }
    Ok(DataView::from(bytes).get(offset))
}

#[cfg(test)]
mod tests {
    use super::{SnfsRequest, SnfsRequestBody, SnfsResponse, SnfsResponseBody};
    use crate::{
        wire::{OpCode, PingArgs, PingResult},
        SnfsError,
    };

    #[test]
    fn request_round_trips() {
        let mut msg = [0_u8; super::super::wire::MAX_PING_MSG_SIZE];
        msg[..5].copy_from_slice(b"hello");
        let req = SnfsRequest {
            sn: 42,
            to_all_servers: false,
            body: SnfsRequestBody::Ping(PingArgs { msg }),
        };
        let encoded = req.encode();
        let decoded = SnfsRequest::decode(&encoded).unwrap();
        assert_eq!(decoded.sn, 42);
        assert!(!decoded.to_all_servers);
        match decoded.body {
            SnfsRequestBody::Ping(args) => assert_eq!(args.msg, msg),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn response_round_trips() {
        let mut msg = [0_u8; super::super::wire::MAX_PING_MSG_SIZE];
        msg[..2].copy_from_slice(b"ok");
        let res = SnfsResponse {
            sn: 7,
            status: SnfsError::Ok,
            body: SnfsResponseBody::Ping(PingResult { msg }),
        };
        let encoded = res.encode();
        let decoded = SnfsResponse::decode(&encoded, OpCode::Ping).unwrap();
        assert_eq!(decoded.sn, 7);
        assert_eq!(decoded.status, SnfsError::Ok);
    }

    #[test]
    fn truncated_datagram_is_rejected() {
        assert!(SnfsRequest::decode(&[0, 1, 2]).is_err());
    }
}
