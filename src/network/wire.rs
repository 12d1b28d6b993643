//! Binary wire protocol for handoff connections.
//!
//! Every message is a length-framed tag + payload:
//!
//! ```text
//! ┌──────────────┬─────────┬──────────────────┐
//! │ len: u32 BE  │ tag: u8 │ payload: len - 1 │
//! └──────────────┴─────────┴──────────────────┘
//! ```
//!
//! | tag     | direction         | payload                         |
//! |---------|-------------------|---------------------------------|
//! | OLDSYNC | sender → receiver | data-module name bytes          |
//! | OLDSYNC | receiver → sender | literal `"sync"`                |
//! | INIT    | sender → receiver | 160-bit big-endian partition id |
//! | OBJ     | sender → receiver | module-encoded item bytes       |
//! | SYNC    | sender → receiver | literal `"sync"`                |
//! | SYNC    | receiver → sender | literal `"sync"`                |
//!
//! The OLDSYNC tag doubles as handshake carrier and acknowledgment so that
//! peers speaking the original protocol revision still complete a basic
//! sync exchange. It is kept purely as a historical wire-format constant.

use crate::error::NetworkError;
use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Handshake / legacy sync message.
pub const OLDSYNC: u8 = 0;
/// Target partition declaration.
pub const INIT: u8 = 1;
/// One data item.
pub const OBJ: u8 = 2;
/// Keep-alive and final sync.
pub const SYNC: u8 = 3;

/// Acknowledgment body sent by the receiver for sync exchanges.
pub const SYNC_ACK: &[u8] = b"sync";

/// Bytes of framing overhead per message (length prefix + tag).
pub const FRAME_OVERHEAD: usize = 5;

/// Bound on frames the sender accepts back from the receiver. Replies are
/// tiny acknowledgments; anything bigger is a protocol violation.
pub const MAX_REPLY_LEN: usize = 64 * 1024;

/// Bound on frames a receiver accepts from a sender.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// A decoded wire message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Message tag.
    pub tag: u8,
    /// Message payload.
    pub payload: Bytes,
}

impl Frame {
    /// Check that this frame is a sync acknowledgment with the given tag.
    pub fn is_ack(&self, tag: u8) -> bool {
        self.tag == tag && self.payload.as_ref() == SYNC_ACK
    }
}

/// Total wire size of a frame carrying `payload_len` payload bytes.
pub fn frame_len(payload_len: usize) -> u64 {
    (FRAME_OVERHEAD + payload_len) as u64
}

/// Write one framed message.
pub async fn write_frame<W>(
    writer: &mut W,
    tag: u8,
    payload: &[u8],
) -> std::result::Result<(), NetworkError>
where
    W: AsyncWrite + Unpin,
{
    let len = (payload.len() + 1) as u32;
    let mut buf = Vec::with_capacity(FRAME_OVERHEAD + payload.len());
    buf.extend_from_slice(&len.to_be_bytes());
    buf.push(tag);
    buf.extend_from_slice(payload);

    writer.write_all(&buf).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one framed message.
///
/// Returns `Ok(None)` when the peer closed the connection cleanly at a frame
/// boundary; an EOF inside a frame is an I/O error.
pub async fn read_frame<R>(
    reader: &mut R,
    max_len: usize,
) -> std::result::Result<Option<Frame>, NetworkError>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(NetworkError::Io(e)),
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    if len == 0 {
        return Err(NetworkError::Protocol("zero-length frame".to_string()));
    }
    if len > max_len {
        return Err(NetworkError::FrameTooLarge { len, max: max_len });
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;

    let tag = body[0];
    let payload = Bytes::from(body).slice(1..);
    Ok(Some(Frame { tag, payload }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_frame_roundtrip() {
        let (mut client, mut server) = tokio::io::duplex(1024);

        write_frame(&mut client, OBJ, b"payload").await.unwrap();
        let frame = read_frame(&mut server, MAX_FRAME_LEN).await.unwrap().unwrap();

        assert_eq!(frame.tag, OBJ);
        assert_eq!(frame.payload.as_ref(), b"payload");
    }

    #[tokio::test]
    async fn test_frame_layout() {
        let (mut client, mut server) = tokio::io::duplex(64);

        write_frame(&mut client, SYNC, SYNC_ACK).await.unwrap();

        let mut raw = [0u8; 9];
        server.read_exact(&mut raw).await.unwrap();
        assert_eq!(&raw[..4], &5u32.to_be_bytes());
        assert_eq!(raw[4], SYNC);
        assert_eq!(&raw[5..], SYNC_ACK);
    }

    #[tokio::test]
    async fn test_clean_close_is_none() {
        let (client, mut server) = tokio::io::duplex(64);
        drop(client);

        let result = read_frame(&mut server, MAX_REPLY_LEN).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected() {
        let (mut client, mut server) = tokio::io::duplex(64);
        client
            .write_all(&(MAX_REPLY_LEN as u32 + 1).to_be_bytes())
            .await
            .unwrap();

        let err = read_frame(&mut server, MAX_REPLY_LEN).await.unwrap_err();
        assert!(matches!(err, NetworkError::FrameTooLarge { .. }));
    }

    #[test]
    fn test_is_ack() {
        let frame = Frame {
            tag: OLDSYNC,
            payload: Bytes::from_static(SYNC_ACK),
        };
        assert!(frame.is_ack(OLDSYNC));
        assert!(!frame.is_ack(SYNC));
    }
}
