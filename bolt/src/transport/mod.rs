//! Framed transport: the byte-level plumbing below the connection state
//! machine (spec.md §4.2). `chunk`/`buffer` are storage, `framing` is the
//! Bolt wire chunking scheme, `handshake` is the version negotiation that
//! runs once per socket before any PackStream message crosses it.

pub(crate) mod buffer;
pub(crate) mod chunk;
pub mod framing;
pub mod handshake;

use std::io::{Read, Write};
use std::net::TcpStream;

pub use buffer::Buffer;

/// Anything a connection can read Bolt chunks from and write them to. A
/// plain `TcpStream` satisfies this directly; a TLS stream wrapping one
/// would too, the way the teacher's `net::channel::Channel` stays generic
/// over its underlying socket type.
pub trait Transport: Read + Write + Send {}

impl<T: Read + Write + Send> Transport for T {}

/// Opens a blocking TCP connection and applies the socket options the
/// config layer exposes (spec.md §6, `SocketOptions`). TLS wrapping is left
/// to the caller: `Transport` only asks for `Read + Write + Send`, so a
/// `native-tls`/`rustls` stream can be substituted without this module
/// needing to know about it.
pub fn connect_tcp(address: &std::net::SocketAddr, connect_timeout: std::time::Duration) -> crate::error::Result<TcpStream> {
    let stream = TcpStream::connect_timeout(address, connect_timeout)?;
    stream.set_nodelay(true)?;
    Ok(stream)
}
