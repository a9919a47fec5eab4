use std::io::{self, Read};
use std::time::{Duration, Instant};

/// Everything the generator needs from the bus: plain writes, queries and
/// binary block writes.
pub trait ScpiDevice {
    /// Send a command that produces no response.
    fn write(&mut self, command: &str) -> Result<(), InstrumentError>;

    /// Send a command and return the trimmed response line.
    fn query(&mut self, command: &str) -> Result<String, InstrumentError>;

    /// Send `prefix` followed by `payload` framed as an IEEE-488.2 definite length block.
    fn write_binary(&mut self, prefix: &str, payload: &[u8]) -> Result<(), InstrumentError>;
}

impl<D: ScpiDevice + ?Sized> ScpiDevice for Box<D> {
    fn write(&mut self, command: &str) -> Result<(), InstrumentError> {
        (**self).write(command)
    }

    fn query(&mut self, command: &str) -> Result<String, InstrumentError> {
        (**self).query(command)
    }

    fn write_binary(&mut self, prefix: &str, payload: &[u8]) -> Result<(), InstrumentError> {
        (**self).write_binary(prefix, payload)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InstrumentError {
    #[error("Serial port error: {0}")]
    SerialPort(#[from] serialport::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Timeout after {timeout:?} waiting for a response to '{command}'")]
    Timeout { command: String, timeout: Duration },

    #[error("UTF-8 conversion error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("Invalid VISA resource string '{0}'")]
    InvalidResource(String),

    #[error("Resource '{0}' needs a bus this crate does not drive")]
    Unsupported(String),
}

/// Line terminator appended to every command.
pub const TERMINATOR: u8 = b'\n';

/// Build the full byte frame for a binary block write:
/// `prefix #<digits><length><payload>\n`.
pub fn ieee_block(prefix: &str, payload: &[u8]) -> Vec<u8> {
    let length = payload.len().to_string();
    let header = format!("{}#{}{}", prefix, length.len(), length);

    let mut frame = Vec::with_capacity(header.len() + payload.len() + 1);
    frame.extend_from_slice(header.as_bytes());
    frame.extend_from_slice(payload);
    frame.push(TERMINATOR);
    frame
}

/// Frame a textual command for the wire.
pub fn command_frame(command: &str) -> Vec<u8> {
    let mut frame = Vec::with_capacity(command.len() + 1);
    frame.extend_from_slice(command.as_bytes());
    frame.push(TERMINATOR);
    frame
}

/// Read bytes until the terminator and return the trimmed line.
///
/// The reader is expected to have its own short read timeout; timed out reads are
/// retried until `timeout` has passed since the call.
pub fn read_response<R: Read + ?Sized>(
    reader: &mut R,
    command: &str,
    timeout: Duration,
) -> Result<String, InstrumentError> {
    let mut response = Vec::new();
    let now = Instant::now();

    loop {
        let mut byte = [0u8; 1];
        match reader.read(&mut byte) {
            Ok(0) => {
                return Err(InstrumentError::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("connection closed while waiting for a response to '{command}'"),
                )));
            }
            Ok(_) => {
                if byte[0] == TERMINATOR {
                    break;
                }
                response.push(byte[0]);
            }
            Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => {
                if now.elapsed() >= timeout {
                    return Err(InstrumentError::Timeout {
                        command: command.to_string(),
                        timeout,
                    });
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }

    let response_str = String::from_utf8(response)?;
    Ok(response_str.trim().to_string())
}
