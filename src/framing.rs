use std::io::ErrorKind;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::{debug, error};

pub const DELIMITER: u8 = b'\n';

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("frame is not valid UTF-8")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
}

/// Splits a byte stream into `\n`-terminated text frames.
///
/// Bytes past the first delimiter stay buffered for the next call. A closed
/// or reset stream ends the sequence with `Ok(None)`; a partial record left
/// without a delimiter at that point is dropped.
pub struct LineReader<R> {
    reader: BufReader<R>,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            reader: BufReader::new(inner),
            buf: Vec::new(),
        }
    }

    pub async fn next_frame(&mut self) -> Result<Option<String>, FrameError> {
        self.buf.clear();
        match self.reader.read_until(DELIMITER, &mut self.buf).await {
            Ok(0) => Ok(None),
            Ok(_) => {
                if self.buf.pop() != Some(DELIMITER) {
                    debug!("Dropping {} bytes of unterminated frame", self.buf.len() + 1);
                    return Ok(None);
                }
                let frame = String::from_utf8(std::mem::take(&mut self.buf))?;
                Ok(Some(frame))
            }
            Err(e) if is_hangup(e.kind()) => {
                debug!("Peer hung up: {}", e);
                Ok(None)
            }
            Err(e) => {
                error!("Read error: {}", e);
                Ok(None)
            }
        }
    }
}

fn is_hangup(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe
            | ErrorKind::UnexpectedEof
    )
}
