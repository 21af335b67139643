//! Library surface of the server binary: the file-system engine and the
//! datagram request dispatcher built on top of it.

pub mod dispatch;
pub mod engine;
