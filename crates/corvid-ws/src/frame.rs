use tokio::io::{AsyncReadExt, AsyncWriteExt};

use corvid_core::{CorvidError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Text,
    Binary,
    Close,
    Ping,
    Pong,
    Other(u8),
}

impl Opcode {
    fn from_byte(b: u8) -> Self {
        match b {
            0x1 => Opcode::Text,
            0x2 => Opcode::Binary,
            0x8 => Opcode::Close,
            0x9 => Opcode::Ping,
            0xA => Opcode::Pong,
            other => Opcode::Other(other),
        }
    }

    fn to_byte(self) -> u8 {
        match self {
            Opcode::Text => 0x1,
            Opcode::Binary => 0x2,
            Opcode::Close => 0x8,
            Opcode::Ping => 0x9,
            Opcode::Pong => 0xA,
            Opcode::Other(b) => b,
        }
    }
}

#[derive(Debug)]
pub struct Frame {
    pub fin: bool,
    pub opcode: Opcode,
    pub payload: Vec<u8>,
}

/// Read one frame off `reader`. Fragmentation is not reassembled — a
/// non-final frame is handed back as-is, treated as final by callers, which
/// matches every payload this system actually produces.
pub async fn read_frame<R: tokio::io::AsyncRead + Unpin>(reader: &mut R) -> Result<Frame> {
    let mut hdr = [0u8; 2];
    reader
        .read_exact(&mut hdr)
        .await
        .map_err(|e| CorvidError::Transport(e.to_string()))?;

    let fin = hdr[0] & 0x80 != 0;
    let opcode = Opcode::from_byte(hdr[0] & 0x0F);
    let masked = hdr[1] & 0x80 != 0;
    let mut payload_len = (hdr[1] & 0x7F) as u64;

    if payload_len == 126 {
        let mut ext = [0u8; 2];
        reader
            .read_exact(&mut ext)
            .await
            .map_err(|e| CorvidError::Transport(e.to_string()))?;
        payload_len = u16::from_be_bytes(ext) as u64;
    } else if payload_len == 127 {
        let mut ext = [0u8; 8];
        reader
            .read_exact(&mut ext)
            .await
            .map_err(|e| CorvidError::Transport(e.to_string()))?;
        payload_len = u64::from_be_bytes(ext);
    }

    let mask = if masked {
        let mut m = [0u8; 4];
        reader
            .read_exact(&mut m)
            .await
            .map_err(|e| CorvidError::Transport(e.to_string()))?;
        Some(m)
    } else {
        None
    };

    let mut payload = vec![0u8; payload_len as usize];
    reader
        .read_exact(&mut payload)
        .await
        .map_err(|e| CorvidError::Transport(e.to_string()))?;

    if let Some(mask) = mask {
        for (i, byte) in payload.iter_mut().enumerate() {
            *byte ^= mask[i % 4];
        }
    }

    Ok(Frame { fin, opcode, payload })
}

/// Write one unmasked server frame. Server frames are never masked per RFC 6455.
pub async fn write_frame<W: tokio::io::AsyncWrite + Unpin>(
    writer: &mut W,
    opcode: Opcode,
    payload: &[u8],
) -> Result<()> {
    let mut header = Vec::with_capacity(10);
    header.push(0x80 | opcode.to_byte());

    let len = payload.len();
    if len < 126 {
        header.push(len as u8);
    } else if len < 65536 {
        header.push(126);
        header.extend_from_slice(&(len as u16).to_be_bytes());
    } else {
        header.push(127);
        header.extend_from_slice(&(len as u64).to_be_bytes());
    }

    writer
        .write_all(&header)
        .await
        .map_err(|e| CorvidError::Transport(e.to_string()))?;
    if !payload.is_empty() {
        writer
            .write_all(payload)
            .await
            .map_err(|e| CorvidError::Transport(e.to_string()))?;
    }
    Ok(())
}

pub async fn write_text<W: tokio::io::AsyncWrite + Unpin>(writer: &mut W, text: &str) -> Result<()> {
    write_frame(writer, Opcode::Text, text.as_bytes()).await
}

pub async fn write_close<W: tokio::io::AsyncWrite + Unpin>(writer: &mut W) -> Result<()> {
    write_frame(writer, Opcode::Close, &[]).await
}

pub async fn write_pong<W: tokio::io::AsyncWrite + Unpin>(writer: &mut W, payload: &[u8]) -> Result<()> {
    write_frame(writer, Opcode::Pong, payload).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn mask_payload(payload: &[u8], mask: [u8; 4]) -> Vec<u8> {
        payload
            .iter()
            .enumerate()
            .map(|(i, b)| b ^ mask[i % 4])
            .collect()
    }

    #[tokio::test]
    async fn reads_small_masked_text_frame() {
        let mask = [1, 2, 3, 4];
        let payload = b"hello".to_vec();
        let masked = mask_payload(&payload, mask);

        let mut raw = vec![0x81, 0x80 | payload.len() as u8];
        raw.extend_from_slice(&mask);
        raw.extend_from_slice(&masked);

        let mut cursor = Cursor::new(raw);
        let frame = read_frame(&mut cursor).await.unwrap();
        assert_eq!(frame.opcode, Opcode::Text);
        assert_eq!(frame.payload, payload);
    }

    #[tokio::test]
    async fn reads_medium_length_frame_with_16bit_length() {
        let mask = [9, 9, 9, 9];
        let payload = vec![b'a'; 300];
        let masked = mask_payload(&payload, mask);

        let mut raw = vec![0x82, 0x80 | 126];
        raw.extend_from_slice(&(300u16).to_be_bytes());
        raw.extend_from_slice(&mask);
        raw.extend_from_slice(&masked);

        let mut cursor = Cursor::new(raw);
        let frame = read_frame(&mut cursor).await.unwrap();
        assert_eq!(frame.opcode, Opcode::Binary);
        assert_eq!(frame.payload.len(), 300);
    }

    #[tokio::test]
    async fn write_frame_never_sets_mask_bit() {
        let mut buf = Vec::new();
        write_text(&mut buf, "hi").await.unwrap();
        assert_eq!(buf[0], 0x80 | 0x1);
        assert_eq!(buf[1] & 0x80, 0);
    }

    #[tokio::test]
    async fn roundtrips_through_write_then_read_unmasked() {
        let mut buf = Vec::new();
        write_text(&mut buf, "roundtrip").await.unwrap();
        let mut cursor = Cursor::new(buf);
        let frame = read_frame(&mut cursor).await.unwrap();
        assert_eq!(frame.payload, b"roundtrip");
    }
}
