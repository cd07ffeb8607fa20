//! Line framing for session messages.
//!
//! One message per newline-terminated JSON record. A length guard caps
//! lines to prevent unbounded allocation from a misbehaving peer.

use std::io;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

use super::messages::NetMessage;

/// Maximum allowed line size (1MB) to prevent unbounded allocation.
pub const MAX_LINE_SIZE: usize = 1024 * 1024;

/// Write one message as a newline-terminated JSON record.
///
/// The line and its newline are sent in a single write so a reader never
/// observes a torn record.
///
/// # Errors
///
/// Propagates I/O failures; an oversized or unencodable message is
/// reported as `InvalidData`.
pub async fn write_message<W>(writer: &mut W, msg: &NetMessage) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut line = msg
        .encode()
        .map_err(|error| io::Error::new(io::ErrorKind::InvalidData, error))?;
    if line.len() > MAX_LINE_SIZE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("message size {} exceeds maximum of {MAX_LINE_SIZE} bytes", line.len()),
        ));
    }
    line.push('\n');
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await
}

/// Read the next line from the stream.
///
/// Returns `Ok(None)` on a clean EOF. The caller decodes the line itself
/// so that a malformed record can be dropped without treating the stream
/// as dead.
///
/// # Errors
///
/// Propagates I/O failures; a line exceeding [`MAX_LINE_SIZE`] is an
/// `InvalidData` stream fault.
pub async fn read_line<R>(reader: &mut BufReader<R>) -> io::Result<Option<String>>
where
    R: AsyncRead + Unpin,
{
    let mut line: Vec<u8> = Vec::new();
    loop {
        let buf = reader.fill_buf().await?;
        if buf.is_empty() {
            return if line.is_empty() {
                Ok(None)
            } else {
                Err(io::ErrorKind::UnexpectedEof.into())
            };
        }
        if let Some(pos) = buf.iter().position(|&b| b == b'\n') {
            line.extend_from_slice(&buf[..pos]);
            reader.consume(pos + 1);
            if line.len() > MAX_LINE_SIZE {
                return Err(oversized());
            }
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            return String::from_utf8(line)
                .map(Some)
                .map_err(|error| io::Error::new(io::ErrorKind::InvalidData, error));
        }
        let len = buf.len();
        line.extend_from_slice(buf);
        reader.consume(len);
        if line.len() > MAX_LINE_SIZE {
            return Err(oversized());
        }
    }
}

fn oversized() -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidData,
        format!("line exceeds maximum of {MAX_LINE_SIZE} bytes"),
    )
}
