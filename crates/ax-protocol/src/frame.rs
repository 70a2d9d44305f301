//! Length-prefixed IPC framing.
//!
//! Wire format: a 4-byte big-endian length prefix followed by a UTF-8 JSON
//! body. Oversized frames are rejected without reading the body — the
//! declared length is attacker-controlled and must never drive an
//! allocation before the cap is checked.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use ax_domain::error::{Error, Result};

/// Default max frame size: 10 MiB, per the wire protocol's cap.
pub const MAX_FRAME_BYTES: u32 = 10 * 1024 * 1024;

/// Read one length-prefixed frame. Returns `Ok(None)` on clean EOF before
/// any bytes of the next frame arrive. Returns `Err` and the caller should
/// close the connection if the declared length exceeds `max_frame_bytes` —
/// no attempt is made to read or skip the oversized body.
pub async fn read_frame<R: AsyncRead + Unpin>(
    reader: &mut R,
    max_frame_bytes: u32,
) -> Result<Option<Vec<u8>>> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(Error::Io(e)),
    }

    let len = u32::from_be_bytes(len_buf);
    if len > max_frame_bytes {
        return Err(Error::Ipc(format!(
            "frame length {len} exceeds max {max_frame_bytes}; closing connection"
        )));
    }

    let mut body = vec![0u8; len as usize];
    reader.read_exact(&mut body).await.map_err(Error::Io)?;
    Ok(Some(body))
}

/// Write one length-prefixed frame.
pub async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, body: &[u8]) -> Result<()> {
    let len = u32::try_from(body.len())
        .map_err(|_| Error::Ipc("frame body exceeds u32 length prefix range".into()))?;
    writer.write_all(&len.to_be_bytes()).await.map_err(Error::Io)?;
    writer.write_all(body).await.map_err(Error::Io)?;
    writer.flush().await.map_err(Error::Io)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn write_then_read_roundtrips() {
        let mut buf = Vec::new();
        write_frame(&mut buf, b"hello").await.unwrap();

        let mut cursor = Cursor::new(buf);
        let frame = read_frame(&mut cursor, MAX_FRAME_BYTES).await.unwrap();
        assert_eq!(frame.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn clean_eof_returns_none() {
        let mut cursor = Cursor::new(Vec::<u8>::new());
        let frame = read_frame(&mut cursor, MAX_FRAME_BYTES).await.unwrap();
        assert!(frame.is_none());
    }

    #[tokio::test]
    async fn oversized_length_prefix_errors_without_reading_body() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&(MAX_FRAME_BYTES + 1).to_be_bytes());
        // No body bytes at all — if the reader tried to allocate and read
        // the declared length it would hang on read_exact; erroring before
        // that means this test completes immediately.
        let mut cursor = Cursor::new(buf);
        let result = read_frame(&mut cursor, MAX_FRAME_BYTES).await;
        assert!(result.is_err());
    }
}
