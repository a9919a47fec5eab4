use redis::Commands;
use std::fmt;
use std::path::PathBuf;

use crate::generator::{check_level, Channel, WaveformType};

/// A command string fetched from the remote store, parsed.
///
/// Accepted forms, tokens split on whitespace:
///
/// ```text
/// upload [<target>] <csv_path>
/// set [<target>] <waveform_type> <frequency_hz> <amplitude_v>
/// stop
/// ```
///
/// The optional `<target>` token is ignored; the channel always comes from the
/// session that dispatches the command.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteCommand {
    Upload {
        channel: Channel,
        path: PathBuf,
    },
    Set {
        channel: Channel,
        waveform_type: WaveformType,
        frequency_hz: f64,
        amplitude_v: f64,
    },
    Stop {
        channel: Channel,
    },
    Unknown {
        verb: String,
    },
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CommandParseError {
    #[error("Empty command")]
    Empty,

    #[error("'{verb}' takes {usage}, got {found} argument(s)")]
    WrongArgumentCount {
        verb: &'static str,
        usage: &'static str,
        found: usize,
    },

    #[error("{name} '{value}' is not a number")]
    InvalidNumber { name: &'static str, value: String },

    #[error("{name} must be a finite, non-negative number, got '{value}'")]
    OutOfRange { name: &'static str, value: String },

    #[error("No command stored under key '{0}'")]
    MissingKey(String),
}

impl RemoteCommand {
    pub fn parse(line: &str, channel: Channel) -> Result<Self, CommandParseError> {
        let mut tokens = line.split_whitespace();
        let verb = tokens.next().ok_or(CommandParseError::Empty)?;
        let args: Vec<&str> = tokens.collect();

        match verb {
            "upload" => {
                let path = match args.as_slice() {
                    [path] | [_, path] => *path,
                    _ => {
                        return Err(CommandParseError::WrongArgumentCount {
                            verb: "upload",
                            usage: "[<target>] <csv_path>",
                            found: args.len(),
                        })
                    }
                };
                Ok(RemoteCommand::Upload {
                    channel,
                    path: PathBuf::from(path),
                })
            }
            "set" => {
                let (waveform_type, frequency, amplitude) = match args.as_slice() {
                    [t, f, a] | [_, t, f, a] => (*t, *f, *a),
                    _ => {
                        return Err(CommandParseError::WrongArgumentCount {
                            verb: "set",
                            usage: "[<target>] <waveform_type> <frequency_hz> <amplitude_v>",
                            found: args.len(),
                        })
                    }
                };
                Ok(RemoteCommand::Set {
                    channel,
                    waveform_type: WaveformType::from(waveform_type),
                    frequency_hz: parse_level("Frequency", frequency)?,
                    amplitude_v: parse_level("Amplitude", amplitude)?,
                })
            }
            "stop" => Ok(RemoteCommand::Stop { channel }),
            other => Ok(RemoteCommand::Unknown {
                verb: other.to_string(),
            }),
        }
    }
}

fn parse_level(name: &'static str, value: &str) -> Result<f64, CommandParseError> {
    let level = value
        .parse::<f64>()
        .map_err(|_| CommandParseError::InvalidNumber {
            name,
            value: value.to_string(),
        })?;
    check_level(name, level).map_err(|_| CommandParseError::OutOfRange {
        name,
        value: value.to_string(),
    })?;
    Ok(level)
}

impl fmt::Display for RemoteCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteCommand::Upload { channel, path } => {
                write!(f, "upload C{} {}", channel, path.display())
            }
            RemoteCommand::Set {
                channel,
                waveform_type,
                frequency_hz,
                amplitude_v,
            } => write!(f, "set C{channel} {waveform_type} {frequency_hz} {amplitude_v}"),
            RemoteCommand::Stop { .. } => write!(f, "stop"),
            RemoteCommand::Unknown { verb } => write!(f, "{verb}"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

/// Key/value store carrying command strings from other processes.
pub trait CommandStore {
    fn get(&mut self, key: &str) -> Result<Option<String>, StoreError>;

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
}

pub struct RedisStore {
    connection: redis::Connection,
}

impl RedisStore {
    /// Connect to `url`, e.g. `redis://localhost:6379/`.
    pub fn connect(url: &str) -> Result<Self, StoreError> {
        log::debug!("Connecting to Redis at {}", url);
        let client = redis::Client::open(url)?;
        let connection = client.get_connection()?;
        Ok(Self { connection })
    }
}

impl CommandStore for RedisStore {
    fn get(&mut self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.connection.get(key)?)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.connection.set::<_, _, ()>(key, value)?;
        Ok(())
    }
}
