use bytes::Buf;
use bytes::Bytes;
use bytes::BytesMut;
use tokio::io::AsyncRead;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWrite;
use tokio::io::AsyncWriteExt;

use crate::magic::{self, MessageMagic, MAX_PAYLOAD_LEN};
use crate::scramble::Scrambler;

/// One reassembled frame: the command id and the unscrambled payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: u16,
    pub payload: Bytes,
}

/// A reassembled frame whose payload is still scrambled.
///
/// Produced by [`FrameReader::read_raw`] so the caller can apply whatever
/// key is current at arrival time; the per-client key may have been
/// re-armed while the read was pending.
#[derive(Debug)]
pub struct RawFrame {
    pub command: u16,
    payload: BytesMut,
}

impl RawFrame {
    pub fn unscramble(mut self, scrambler: &Scrambler) -> Frame {
        scrambler.apply(&mut self.payload);
        Frame {
            command: self.command,
            payload: self.payload.freeze(),
        }
    }
}

#[derive(Debug)]
pub enum FrameError {
    /// The header word is not a valid magic, or it claims a payload longer
    /// than the protocol allows.
    Framing(u32),
    /// The peer closed the connection in the middle of a frame.
    Truncated { need: usize, got: usize },
    Io(std::io::Error),
}

impl std::fmt::Display for FrameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameError::Framing(value) => write!(f, "malformed frame header: 0x{value:08X}"),
            FrameError::Truncated { need, got } => {
                write!(f, "connection closed mid-frame: need {need}, got {got}")
            }
            FrameError::Io(e) => write!(f, "frame io error: {e}"),
        }
    }
}

impl std::error::Error for FrameError {}

impl From<std::io::Error> for FrameError {
    fn from(e: std::io::Error) -> Self {
        FrameError::Io(e)
    }
}

#[derive(Debug)]
pub struct FrameReader<R> {
    inner: R,
    buf: BytesMut,
}

impl<R> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(8 * 1024),
        }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    /// Read one frame, unscrambling the payload with the given key state.
    ///
    /// Returns:
    /// - `Ok(Some(frame))` for a frame,
    /// - `Ok(None)` on clean EOF between frames.
    pub async fn read_frame(&mut self, scrambler: &Scrambler) -> Result<Option<Frame>, FrameError> {
        Ok(self.read_raw().await?.map(|raw| raw.unscramble(scrambler)))
    }

    /// Read one frame, leaving the payload scrambled.
    pub async fn read_raw(&mut self) -> Result<Option<RawFrame>, FrameError> {
        loop {
            if self.buf.len() >= 4 {
                let word =
                    u32::from_le_bytes([self.buf[0], self.buf[1], self.buf[2], self.buf[3]]);
                let magic = magic::decode_magic(word).ok_or(FrameError::Framing(word))?;
                if magic.length > MAX_PAYLOAD_LEN {
                    return Err(FrameError::Framing(word));
                }

                let len = usize::from(magic.length);
                if self.buf.len() >= 4 + len {
                    self.buf.advance(4);
                    let payload = self.buf.split_to(len);
                    return Ok(Some(RawFrame {
                        command: magic.id,
                        payload,
                    }));
                }
            }

            let n = self.inner.read_buf(&mut self.buf).await?;
            if n == 0 {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                let need = if self.buf.len() >= 4 {
                    let word =
                        u32::from_le_bytes([self.buf[0], self.buf[1], self.buf[2], self.buf[3]]);
                    magic::decode_magic(word)
                        .map(|m| 4 + usize::from(m.length))
                        .unwrap_or(4)
                } else {
                    4
                };
                return Err(FrameError::Truncated {
                    need,
                    got: self.buf.len(),
                });
            }
        }
    }
}

#[derive(Debug)]
pub struct FrameWriter<W> {
    inner: W,
    scratch: BytesMut,
}

impl<W> FrameWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            scratch: BytesMut::with_capacity(8 * 1024),
        }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    /// Frame and write one message, scrambling the payload with the given
    /// key state.
    pub async fn write_frame(
        &mut self,
        command: u16,
        payload: &[u8],
        scrambler: &Scrambler,
    ) -> Result<(), FrameError> {
        if payload.len() > usize::from(MAX_PAYLOAD_LEN) {
            return Err(FrameError::Framing(payload.len() as u32));
        }

        let magic = magic::encode_magic(MessageMagic {
            id: command,
            length: payload.len() as u16,
        });

        self.scratch.clear();
        self.scratch.extend_from_slice(&magic.to_le_bytes());
        let body_start = self.scratch.len();
        self.scratch.extend_from_slice(payload);
        scrambler.apply(&mut self.scratch[body_start..]);

        self.inner.write_all(&self.scratch).await?;
        Ok(())
    }

    pub async fn flush(&mut self) -> Result<(), FrameError> {
        self.inner.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_frame() {
        let (a, b) = tokio::io::duplex(256);
        tokio::spawn(async move {
            let mut fw = FrameWriter::new(b);
            fw.write_frame(29, b"hello race", &Scrambler::new())
                .await
                .unwrap();
            fw.flush().await.unwrap();
        });

        let mut fr = FrameReader::new(a);
        let f = fr.read_frame(&Scrambler::new()).await.unwrap().unwrap();
        assert_eq!(f.command, 29);
        assert_eq!(&f.payload[..], b"hello race");
    }

    #[tokio::test]
    async fn empty_payload_is_a_valid_frame() {
        let (a, b) = tokio::io::duplex(64);
        tokio::spawn(async move {
            let mut fw = FrameWriter::new(b);
            fw.write_frame(7, b"", &Scrambler::new()).await.unwrap();
        });

        let mut fr = FrameReader::new(a);
        let f = fr.read_frame(&Scrambler::new()).await.unwrap().unwrap();
        assert_eq!(f.command, 7);
        assert!(f.payload.is_empty());
    }

    #[tokio::test]
    async fn rejects_oversized_payload_on_write() {
        let (_a, b) = tokio::io::duplex(64);
        let mut fw = FrameWriter::new(b);
        let payload = vec![0u8; usize::from(MAX_PAYLOAD_LEN) + 1];
        let err = fw
            .write_frame(1, &payload, &Scrambler::new())
            .await
            .unwrap_err();
        assert!(matches!(err, FrameError::Framing(_)));
    }

    #[tokio::test]
    async fn accepts_max_payload() {
        let (a, b) = tokio::io::duplex(16 * 1024);
        let payload = vec![0xA5u8; usize::from(MAX_PAYLOAD_LEN)];
        let expected = payload.clone();
        tokio::spawn(async move {
            let mut fw = FrameWriter::new(b);
            fw.write_frame(1, &payload, &Scrambler::new()).await.unwrap();
        });

        let mut fr = FrameReader::new(a);
        let f = fr.read_frame(&Scrambler::new()).await.unwrap().unwrap();
        assert_eq!(&f.payload[..], &expected[..]);
    }

    #[tokio::test]
    async fn bogus_header_is_a_framing_error() {
        let (a, mut b) = tokio::io::duplex(64);
        tokio::spawn(async move {
            use tokio::io::AsyncWriteExt;
            // Bit 15 of the low half is clear.
            b.write_all(&0x0000_0001u32.to_le_bytes()).await.unwrap();
        });

        let mut fr = FrameReader::new(a);
        let err = fr.read_frame(&Scrambler::new()).await.unwrap_err();
        assert!(matches!(err, FrameError::Framing(_)));
    }

    #[tokio::test]
    async fn eof_mid_frame_is_truncated() {
        let (a, mut b) = tokio::io::duplex(64);
        tokio::spawn(async move {
            use tokio::io::AsyncWriteExt;
            let magic = magic::encode_magic(MessageMagic { id: 1, length: 16 });
            b.write_all(&magic.to_le_bytes()).await.unwrap();
            b.write_all(&[0u8; 4]).await.unwrap();
            // Drop the stream with 12 bytes still owed.
        });

        let mut fr = FrameReader::new(a);
        let err = fr.read_frame(&Scrambler::new()).await.unwrap_err();
        assert!(matches!(err, FrameError::Truncated { need: 20, got: 8 }));
    }

    #[tokio::test]
    async fn scrambled_payload_differs_on_the_wire() {
        use tokio::io::AsyncReadExt;

        let (mut a, b) = tokio::io::duplex(64);
        let mut fw = FrameWriter::new(b);
        fw.write_frame(1, b"\0\0\0\0", &Scrambler::new()).await.unwrap();
        drop(fw);

        let mut raw = Vec::new();
        a.read_to_end(&mut raw).await.unwrap();
        assert_eq!(&raw[4..], &[0xCB, 0x91, 0x01, 0xA2]);
    }
}
