//! Byte transport between the host and the inverter.
//!
//! The [`Transport`] trait is the seam between the protocol client and the line
//! it talks over. [`StreamTransport`] implements it for any blocking
//! `Read + Write` stream; the serial implementation lives in
//! [`crate::serial`].

use crate::protocol::{DISCOVER_PROBE_CAP, Error, ReplyLength, Result};
use std::io::{ErrorKind, Read, Write};

/// Sends requests and receives replies of a known (or discovered) length.
pub trait Transport {
    /// Writes `bytes` in a single write call.
    fn send(&mut self, bytes: &[u8]) -> Result<()>;

    /// Reads a reply of `expected` length.
    fn receive(&mut self, expected: ReplyLength) -> Result<Vec<u8>>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        (**self).send(bytes)
    }

    fn receive(&mut self, expected: ReplyLength) -> Result<Vec<u8>> {
        (**self).receive(expected)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        (**self).send(bytes)
    }

    fn receive(&mut self, expected: ReplyLength) -> Result<Vec<u8>> {
        (**self).receive(expected)
    }
}

/// Writes `bytes` with one `write` call and fails if not all of them were accepted.
pub fn write_once<W: Write + ?Sized>(writer: &mut W, bytes: &[u8]) -> Result<()> {
    let written = match writer.write(bytes) {
        Ok(written) => written,
        Err(error) if is_timeout(&error) => 0,
        Err(error) => return Err(error.into()),
    };
    if written != bytes.len() {
        return Err(Error::WriteMismatch {
            expected: bytes.len(),
            written,
        });
    }
    writer.flush()?;
    Ok(())
}

/// Reads a reply from `reader`.
///
/// Reading stops when the buffer is full, the stream ends or the reader's
/// timeout elapses. For [`ReplyLength::Exact`] anything but the full length is a
/// [`Error::ReadMismatch`]; for [`ReplyLength::Discover`] the bytes read up to
/// [`DISCOVER_PROBE_CAP`] are the reply, and an empty reply is a mismatch.
pub fn read_reply<R: Read + ?Sized>(reader: &mut R, expected: ReplyLength) -> Result<Vec<u8>> {
    let capacity = match expected {
        ReplyLength::Exact(length) => length,
        ReplyLength::Discover => DISCOVER_PROBE_CAP,
    };
    let mut buffer = vec![0u8; capacity];
    let mut received = 0;
    while received < capacity {
        match reader.read(&mut buffer[received..]) {
            Ok(0) => break,
            Ok(count) => received += count,
            Err(error) if error.kind() == ErrorKind::Interrupted => continue,
            Err(error) if is_timeout(&error) => break,
            Err(error) => return Err(error.into()),
        }
    }
    buffer.truncate(received);

    match expected {
        ReplyLength::Exact(length) if received != length => {
            Err(Error::ReadMismatch { expected, received })
        }
        ReplyLength::Discover if received == 0 => Err(Error::ReadMismatch { expected, received }),
        ReplyLength::Discover => {
            log::debug!("Discovered reply length: {received}");
            Ok(buffer)
        }
        ReplyLength::Exact(_) => Ok(buffer),
    }
}

fn is_timeout(error: &std::io::Error) -> bool {
    matches!(error.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock)
}

/// [`Transport`] over any blocking stream whose reads time out on their own.
#[derive(Debug)]
pub struct StreamTransport<S> {
    stream: S,
}

impl<S: Read + Write> StreamTransport<S> {
    pub fn new(stream: S) -> Self {
        Self { stream }
    }

    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    pub fn into_inner(self) -> S {
        self.stream
    }
}

impl<S: Read + Write> Transport for StreamTransport<S> {
    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        write_once(&mut self.stream, bytes)
    }

    fn receive(&mut self, expected: ReplyLength) -> Result<Vec<u8>> {
        read_reply(&mut self.stream, expected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::collections::VecDeque;
    use std::io;

    /// Stream that hands out scripted read chunks and accepts a limited number of bytes per write.
    #[derive(Default)]
    struct ScriptedStream {
        reads: VecDeque<io::Result<Vec<u8>>>,
        write_limit: Option<usize>,
        written: Vec<u8>,
    }

    impl Read for ScriptedStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.reads.pop_front() {
                Some(Ok(chunk)) => {
                    let count = chunk.len().min(buf.len());
                    buf[..count].copy_from_slice(&chunk[..count]);
                    Ok(count)
                }
                Some(Err(error)) => Err(error),
                None => Err(io::Error::new(ErrorKind::TimedOut, "timed out")),
            }
        }
    }

    impl Write for ScriptedStream {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let count = self.write_limit.unwrap_or(buf.len()).min(buf.len());
            self.written.extend_from_slice(&buf[..count]);
            Ok(count)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn send_writes_everything() {
        let mut transport = StreamTransport::new(ScriptedStream::default());
        transport.send(&[0x0A, 0x03]).unwrap();
        assert_eq!(transport.get_ref().written, [0x0A, 0x03]);
    }

    #[test]
    fn short_write_is_a_mismatch() {
        let stream = ScriptedStream {
            write_limit: Some(3),
            ..Default::default()
        };
        let mut transport = StreamTransport::new(stream);
        assert_matches!(
            transport.send(&[1, 2, 3, 4, 5, 6, 7, 8]),
            Err(Error::WriteMismatch {
                expected: 8,
                written: 3
            })
        );
    }

    #[test]
    fn exact_read_collects_chunks() {
        let stream = ScriptedStream {
            reads: VecDeque::from([Ok(vec![1, 2]), Ok(vec![3]), Ok(vec![4, 5])]),
            ..Default::default()
        };
        let mut transport = StreamTransport::new(stream);
        assert_eq!(transport.receive(ReplyLength::Exact(5)).unwrap(), [1, 2, 3, 4, 5]);
    }

    #[test]
    fn exact_read_times_out_short() {
        let stream = ScriptedStream {
            reads: VecDeque::from([Ok(vec![1, 2, 3])]),
            ..Default::default()
        };
        let mut transport = StreamTransport::new(stream);
        assert_matches!(
            transport.receive(ReplyLength::Exact(19)),
            Err(Error::ReadMismatch {
                expected: ReplyLength::Exact(19),
                received: 3
            })
        );
    }

    #[test]
    fn exact_read_stops_at_end_of_stream() {
        let mut reader: &[u8] = &[1, 2];
        assert_matches!(
            read_reply(&mut reader, ReplyLength::Exact(4)),
            Err(Error::ReadMismatch { received: 2, .. })
        );
    }

    #[test]
    fn exact_read_ignores_surplus() {
        let mut reader: &[u8] = &[1, 2, 3, 4, 5, 6];
        assert_eq!(read_reply(&mut reader, ReplyLength::Exact(4)).unwrap(), [1, 2, 3, 4]);
    }

    #[test]
    fn discover_uses_actual_length() {
        let stream = ScriptedStream {
            reads: VecDeque::from([Ok(vec![0x0A, 0x10, 0x7D]), Ok(vec![0x01, 0x00, 0x01, 0xAA, 0xBB])]),
            ..Default::default()
        };
        let mut transport = StreamTransport::new(stream);
        let reply = transport.receive(ReplyLength::Discover).unwrap();
        assert_eq!(reply.len(), 8);
    }

    #[test]
    fn discover_is_capped() {
        let stream = ScriptedStream {
            reads: VecDeque::from([Ok(vec![0x55; 150])]),
            ..Default::default()
        };
        let mut transport = StreamTransport::new(stream);
        assert_eq!(
            transport.receive(ReplyLength::Discover).unwrap().len(),
            DISCOVER_PROBE_CAP
        );
    }

    #[test]
    fn discover_without_reply_fails() {
        let mut transport = StreamTransport::new(ScriptedStream::default());
        assert_matches!(
            transport.receive(ReplyLength::Discover),
            Err(Error::ReadMismatch {
                expected: ReplyLength::Discover,
                received: 0
            })
        );
    }

    #[test]
    fn other_io_errors_propagate() {
        let stream = ScriptedStream {
            reads: VecDeque::from([Err(io::Error::new(ErrorKind::BrokenPipe, "gone"))]),
            ..Default::default()
        };
        let mut transport = StreamTransport::new(stream);
        assert_matches!(transport.receive(ReplyLength::Exact(2)), Err(Error::Io(..)));
    }
}
