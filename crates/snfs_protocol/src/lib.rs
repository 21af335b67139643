//! Wire protocol: fixed-layout request/response records and the small
//! error vocabulary that crosses the network.

mod codec;
mod error;
mod wire;

pub use codec::{
    DecodeError, RequestBuf, ResponseBuf, SnfsRequest, SnfsRequestBody, SnfsResponse,
    SnfsResponseBody,
};
pub use error::SnfsError;
pub use wire::{
    CopyArgs, CopyResult, CreateArgs, CreateResult, LookupArgs, LookupResult, MkdirArgs,
    MkdirResult, OpCode, PingArgs, PingResult, ReadArgs, ReadResult, ReaddirArgs, ReaddirEntry,
    ReaddirResult, RequestHeader, ResponseHeader, WriteArgs, WriteResult, MAX_PATH_NAME_SIZE,
    MAX_PING_MSG_SIZE, MAX_READDIR_ENTRIES, MAX_READ_DATA, MAX_REQUEST_WIRE_SIZE,
    MAX_RESPONSE_WIRE_SIZE, MAX_WRITE_DATA,
};
