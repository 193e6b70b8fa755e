//! Length-Prefixed Frames
//!
//! Message boundaries over the anonymous pipes that connect the supervisor
//! and a measurement worker.

use rkyv::ser::serializers::AllocSerializer;
use rkyv::validation::validators::DefaultValidator;
use rkyv::{Archive, CheckBytes, Deserialize, Infallible, Serialize};
use std::io::{BufReader, BufWriter, Read, Write};
use thiserror::Error;

/// Largest accepted frame (64 MB); outcomes carry the target's full
/// stdout/stderr.
pub const MAX_FRAME_SIZE: usize = 64 * 1024 * 1024;

/// Errors raised while encoding or decoding frames
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Frame too large: {size} bytes (max {max} bytes)")]
    FrameTooLarge { size: usize, max: usize },

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("End of stream")]
    EndOfStream,
}

/// Write one message.
///
/// ```text
/// +----------------+------------------+
/// | length (4 LE)  | rkyv payload     |
/// +----------------+------------------+
/// ```
pub fn write_frame<W, T>(writer: &mut BufWriter<W>, message: &T) -> Result<(), FrameError>
where
    W: Write,
    T: Serialize<AllocSerializer<1024>>,
{
    let bytes =
        rkyv::to_bytes::<_, 1024>(message).map_err(|e| FrameError::Serialization(e.to_string()))?;

    let len = bytes.len();
    if len > MAX_FRAME_SIZE {
        return Err(FrameError::FrameTooLarge {
            size: len,
            max: MAX_FRAME_SIZE,
        });
    }

    writer.write_all(&(len as u32).to_le_bytes())?;
    writer.write_all(&bytes)?;
    // The peer blocks on this frame; never leave it sitting in the buffer.
    writer.flush()?;

    Ok(())
}

/// Read one message. A clean EOF before the length prefix is `EndOfStream`.
pub fn read_frame<R, T>(reader: &mut BufReader<R>) -> Result<T, FrameError>
where
    R: Read,
    T: Archive,
    T::Archived: for<'a> CheckBytes<DefaultValidator<'a>> + Deserialize<T, Infallible>,
{
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(FrameError::EndOfStream);
        }
        Err(e) => return Err(FrameError::Io(e)),
    }

    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_FRAME_SIZE {
        return Err(FrameError::FrameTooLarge {
            size: len,
            max: MAX_FRAME_SIZE,
        });
    }
    if len == 0 {
        return Err(FrameError::InvalidFrame("zero-length frame".to_string()));
    }

    let mut buf = rkyv::AlignedVec::with_capacity(len);
    buf.resize(len, 0);
    reader.read_exact(&mut buf).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            FrameError::InvalidFrame(format!("truncated frame: expected {} bytes", len))
        } else {
            FrameError::Io(e)
        }
    })?;

    let archived = rkyv::check_archived_root::<T>(&buf)
        .map_err(|e| FrameError::Deserialization(e.to_string()))?;

    let value: T = archived
        .deserialize(&mut Infallible)
        .expect("infallible deserialization");

    Ok(value)
}

/// Buffered frame sender
pub struct FrameWriter<W: Write> {
    writer: BufWriter<W>,
}

impl<W: Write> FrameWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: BufWriter::with_capacity(64 * 1024, writer),
        }
    }

    pub fn write<T>(&mut self, message: &T) -> Result<(), FrameError>
    where
        T: Serialize<AllocSerializer<1024>>,
    {
        write_frame(&mut self.writer, message)
    }
}

/// Buffered frame receiver
pub struct FrameReader<R: Read> {
    reader: BufReader<R>,
}

impl<R: Read> FrameReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::with_capacity(64 * 1024, reader),
        }
    }

    pub fn read<T>(&mut self) -> Result<T, FrameError>
    where
        T: Archive,
        T::Archived: for<'a> CheckBytes<DefaultValidator<'a>> + Deserialize<T, Infallible>,
    {
        read_frame(&mut self.reader)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EnvVar, MeasureRequest, RawOutcome, SupervisorCommand, WorkerMessage};
    use std::io::Cursor;

    fn request() -> MeasureRequest {
        MeasureRequest {
            argv: vec!["./queen".to_string(), "8".to_string()],
            workdir: "/tmp/bench".to_string(),
            env: vec![EnvVar {
                key: "LD_LIBRARY_PATH".to_string(),
                value: "/tmp/bench/lib".to_string(),
            }],
        }
    }

    #[test]
    fn test_command_survives_pipe() {
        let mut buffer = Vec::new();
        {
            let mut writer = FrameWriter::new(&mut buffer);
            writer.write(&SupervisorCommand::Measure(request())).unwrap();
        }

        let mut reader = FrameReader::new(Cursor::new(buffer));
        let SupervisorCommand::Measure(req) = reader.read::<SupervisorCommand>().unwrap();
        assert_eq!(req.argv, vec!["./queen", "8"]);
        assert_eq!(req.env[0].key, "LD_LIBRARY_PATH");
    }

    #[test]
    fn test_hello_then_outcome() {
        let outcome = RawOutcome {
            exit_code: Some(0),
            signal: None,
            stdout: "NQUEENS_METRICS n=8 solutions=92 nodes=2057\n".to_string(),
            stderr: String::new(),
            elapsed_seconds: 0.25,
            peak_rss_kb: 4096,
        };

        let mut buffer = Vec::new();
        {
            let mut writer = FrameWriter::new(&mut buffer);
            writer
                .write(&WorkerMessage::Hello(Default::default()))
                .unwrap();
            writer.write(&WorkerMessage::Outcome(outcome)).unwrap();
        }

        let mut reader = FrameReader::new(Cursor::new(buffer));
        assert!(matches!(
            reader.read::<WorkerMessage>().unwrap(),
            WorkerMessage::Hello(_)
        ));
        match reader.read::<WorkerMessage>().unwrap() {
            WorkerMessage::Outcome(got) => {
                assert_eq!(got.peak_rss_kb, 4096);
                assert_eq!(got.elapsed_seconds, 0.25);
                assert!(got.stdout.contains("solutions=92"));
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_empty_pipe_is_end_of_stream() {
        let mut reader = FrameReader::new(Cursor::new(Vec::<u8>::new()));
        let result: Result<WorkerMessage, _> = reader.read();
        assert!(matches!(result, Err(FrameError::EndOfStream)));
    }

    #[test]
    fn test_truncated_payload_is_invalid() {
        let mut buffer = Vec::new();
        {
            let mut writer = FrameWriter::new(&mut buffer);
            writer.write(&SupervisorCommand::Measure(request())).unwrap();
        }
        buffer.truncate(buffer.len() - 1);

        let mut reader = FrameReader::new(Cursor::new(buffer));
        let result: Result<SupervisorCommand, _> = reader.read();
        assert!(matches!(result, Err(FrameError::InvalidFrame(_))));
    }

    #[test]
    fn test_oversized_prefix_rejected() {
        let buffer = ((MAX_FRAME_SIZE + 1) as u32).to_le_bytes().to_vec();
        let mut reader = FrameReader::new(Cursor::new(buffer));
        let result: Result<WorkerMessage, _> = reader.read();
        assert!(matches!(result, Err(FrameError::FrameTooLarge { .. })));
    }
}
