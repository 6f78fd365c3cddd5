// Copyright 2025 jonefeewang@gmail.com
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::{AppError, AppResult};

/// Returns true once the first `n` bytes of `buf` hold a complete frame,
/// i.e. a `\n`.
pub fn frame_ready(buf: &[u8], n: usize) -> bool {
    let n = n.min(buf.len());
    buf[..n].contains(&b'\n')
}

/// Reads newline terminated frames from one half of a stream.
///
/// One read cycle yields one frame: whatever follows the first `\n` in the
/// buffer is dropped together with it. The server answers every line with
/// exactly one line, so a read never legitimately carries two frames.
#[derive(Debug)]
pub struct FrameReader<R> {
    reader: R,
    buffer: BytesMut,
    max_frame_size: usize,
    /// Set after an oversized frame until the end of that line is consumed.
    discarding: bool,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(reader: R, max_frame_size: usize) -> FrameReader<R> {
        FrameReader {
            reader,
            buffer: BytesMut::with_capacity(max_frame_size),
            max_frame_size,
            discarding: false,
        }
    }

    /// Reads until a complete frame is buffered and returns it without its newline.
    ///
    /// A buffer that fills up to `max_frame_size` without a newline is dropped
    /// and reported as [`AppError::FrameTooLarge`]; the rest of that line, up to
    /// and including its newline, is skipped and the reader stays usable.
    /// End of stream is [`AppError::ConnectionClosed`].
    ///
    /// Cancel safe: partially received bytes stay in the buffer.
    pub async fn read_frame(&mut self) -> AppResult<BytesMut> {
        loop {
            if let Some(frame) = self.take_frame()? {
                return Ok(frame);
            }
            // never read past the frame limit
            let room = self.max_frame_size - self.buffer.len();
            let mut limited = (&mut self.reader).take(room as u64);
            if 0 == limited.read_buf(&mut self.buffer).await? {
                return Err(AppError::ConnectionClosed);
            }
        }
    }

    fn take_frame(&mut self) -> AppResult<Option<BytesMut>> {
        if self.discarding {
            // still inside a rejected line, skip through its newline
            match self.buffer.iter().position(|b| *b == b'\n') {
                Some(pos) => {
                    self.buffer.advance(pos + 1);
                    self.discarding = false;
                }
                None => {
                    self.buffer.clear();
                    return Ok(None);
                }
            }
        }
        if frame_ready(&self.buffer, self.buffer.len()) {
            let pos = self
                .buffer
                .iter()
                .position(|b| *b == b'\n')
                .unwrap_or(self.buffer.len());
            let frame = self.buffer.split_to(pos);
            // newline and any trailing bytes of this read cycle
            self.buffer.clear();
            return Ok(Some(frame));
        }
        if self.buffer.len() >= self.max_frame_size {
            let len = self.buffer.remaining();
            self.buffer.clear();
            self.discarding = true;
            return Err(AppError::FrameTooLarge(len));
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::AsyncWriteExt;

    use super::*;

    #[test]
    fn frame_ready_only_counts_received_bytes() {
        let buf = b"num 5\n";
        for n in 0..buf.len() {
            assert!(!frame_ready(buf, n));
        }
        assert!(frame_ready(buf, buf.len()));
        assert!(frame_ready(buf, 100));
    }

    #[tokio::test]
    async fn split_frame_is_reassembled() {
        let (mut client, server) = tokio::io::duplex(64);
        let mut reader = FrameReader::new(server, 1024);

        client.write_all(b"num ").await.unwrap();
        let pending =
            tokio::time::timeout(std::time::Duration::from_millis(20), reader.read_frame()).await;
        assert!(pending.is_err());

        client.write_all(b"42\n").await.unwrap();
        let frame = reader.read_frame().await.unwrap();
        assert_eq!(&frame[..], b"num 42");
    }

    #[tokio::test]
    async fn trailing_bytes_are_discarded() {
        let (mut client, server) = tokio::io::duplex(64);
        let mut reader = FrameReader::new(server, 1024);

        client.write_all(b"login ok\nnum 1\n").await.unwrap();
        assert_eq!(&reader.read_frame().await.unwrap()[..], b"login ok");

        client.write_all(b"num 2\n").await.unwrap();
        assert_eq!(&reader.read_frame().await.unwrap()[..], b"num 2");
    }

    #[tokio::test]
    async fn eof_is_connection_closed() {
        let (client, server) = tokio::io::duplex(64);
        let mut reader = FrameReader::new(server, 1024);
        drop(client);
        assert!(matches!(
            reader.read_frame().await,
            Err(AppError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn oversized_frame_is_rejected_then_reader_recovers() {
        let (mut client, server) = tokio::io::duplex(4096);
        let mut reader = FrameReader::new(server, 16);

        client.write_all(&[b'x'; 16]).await.unwrap();
        assert!(matches!(
            reader.read_frame().await,
            Err(AppError::FrameTooLarge(16))
        ));

        // the tail of the rejected line never surfaces as a frame of its own
        client.write_all(b"num client_list_stopped\n").await.unwrap();
        client.write_all(b"num 3\n").await.unwrap();
        assert_eq!(&reader.read_frame().await.unwrap()[..], b"num 3");
    }

    #[tokio::test]
    async fn long_tail_of_rejected_line_spans_reads() {
        let (mut client, server) = tokio::io::duplex(4096);
        let mut reader = FrameReader::new(server, 16);

        client.write_all(&[b'x'; 40]).await.unwrap();
        client.write_all(b"\nlogin ok\n").await.unwrap();
        assert!(matches!(
            reader.read_frame().await,
            Err(AppError::FrameTooLarge(16))
        ));
        assert_eq!(&reader.read_frame().await.unwrap()[..], b"login ok");
    }
}
