//! Length-prefixed framing for [`Packet`]s on a byte stream.
//!
//! Format: `[u32 little-endian length][u8 protocol version][bincode payload]`,
//! where the length covers the version byte and the payload.

use crate::{FrameError, Packet, MAX_FRAME_SIZE, PROTOCOL_VERSION};
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Encodes a packet into a complete frame, length prefix included.
pub fn encode_frame(packet: &Packet) -> Result<Vec<u8>, FrameError> {
    let payload = bincode::serialize(packet).map_err(FrameError::Encode)?;
    let len = payload.len() + 1;
    if len > MAX_FRAME_SIZE {
        return Err(FrameError::FrameTooLarge(len, MAX_FRAME_SIZE));
    }

    let mut frame = Vec::with_capacity(4 + len);
    frame.extend_from_slice(&(len as u32).to_le_bytes());
    frame.push(PROTOCOL_VERSION);
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Decodes the body of a frame (everything after the length prefix).
pub fn decode_body(body: &[u8]) -> Result<Packet, FrameError> {
    let (&version, payload) = body
        .split_first()
        .ok_or_else(|| FrameError::Decode(Box::new(bincode::ErrorKind::Custom("empty frame".into()))))?;
    if version != PROTOCOL_VERSION {
        return Err(FrameError::UnsupportedVersion(version));
    }
    bincode::deserialize(payload).map_err(FrameError::Decode)
}

/// Reads the next packet from the stream.
///
/// Yields [`FrameError::EndOfStream`] when the peer closes the stream, and
/// [`FrameError::Decode`] when a complete frame holds a malformed payload. In
/// the latter case the stream stays aligned and the next call reads the
/// following frame.
pub async fn read_packet<R: AsyncRead + Unpin>(stream: &mut R) -> Result<Packet, FrameError> {
    let mut len_buf = [0u8; 4];
    read_exact_or_eos(stream, &mut len_buf).await?;

    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_FRAME_SIZE {
        return Err(FrameError::FrameTooLarge(len, MAX_FRAME_SIZE));
    }

    let mut body = vec![0u8; len];
    read_exact_or_eos(stream, &mut body).await?;
    decode_body(&body)
}

/// Writes one packet and flushes the stream.
pub async fn write_packet<W: AsyncWrite + Unpin>(
    stream: &mut W,
    packet: &Packet,
) -> Result<(), FrameError> {
    let frame = encode_frame(packet)?;
    stream.write_all(&frame).await?;
    stream.flush().await?;
    Ok(())
}

async fn read_exact_or_eos<R: AsyncRead + Unpin>(
    stream: &mut R,
    buf: &mut [u8],
) -> Result<(), FrameError> {
    match stream.read_exact(buf).await {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(FrameError::EndOfStream),
        Err(e) => Err(FrameError::Io(e)),
    }
}
