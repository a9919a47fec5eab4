//! # wavegen-rs
//!
//! A Rust library for driving SCPI arbitrary waveform generators (Siglent SDG style
//! command set) from CSV sample files, from the command line and from a Redis
//! command channel.
//!
//! ## Features
//!
//! - **Transcoding**: CSV sample tables to flat little-endian `f32` payloads
//! - **Basic wave setup**: wave type, frequency, amplitude, phase, offset and output per channel
//! - **Arbitrary waveform upload**: `WVDT` block transfer and selection by name
//! - **Remote commands**: `upload`, `set` and `stop` strings fetched from Redis
//! - **Transports**: raw LAN sockets and serial ports, addressed with VISA resource strings
//! - **Preview**: `polars` DataFrames of the selected basic wave for plotting
//!
//! ## Examples
//!
//! ### Setting up a basic wave
//!
//! ```rust,no_run
//! use wavegen_rs::{AppConfig, Channel, Connector, WaveformGenerator, WaveformType};
//!
//! let config = AppConfig::default();
//! let device = Connector::connect("TCPIP::192.168.1.100::INSTR", &config.instrument)?;
//! let mut generator = WaveformGenerator::new(device);
//!
//! generator.set_waveform_type(Channel::One, &WaveformType::Sine)?;
//! generator.set_frequency(Channel::One, 1000.0)?;
//! generator.start_waveform(Channel::One)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ### Uploading a CSV waveform
//!
//! ```rust,no_run
//! use std::path::Path;
//! use wavegen_rs::{AppConfig, Channel, Connector, WaveformGenerator};
//!
//! let config = AppConfig::default();
//! let device = Connector::connect("TCPIP::192.168.1.100::INSTR", &config.instrument)?;
//! let mut generator = WaveformGenerator::new(device);
//!
//! // Uploaded as "stairs", then generated on channel 2 at 1 kHz, 2 Vpp
//! generator.upload_and_generate(Channel::Two, Path::new("stairs.csv"), 1000.0, 2.0, 0.0, 0.0)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ### Transcoding only
//!
//! ```rust,no_run
//! use std::path::Path;
//!
//! let summary = wavegen_rs::transcoder::encode(Path::new("stairs.csv"))?;
//! println!("{} samples in {}", summary.samples, summary.binary_path.display());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ### Remote commands
//!
//! ```rust,no_run
//! use wavegen_rs::{load_config, Connector, RedisStore, Session};
//!
//! let config = load_config(None)?;
//! let device = Connector::connect(&config.instrument.resource, &config.instrument)?;
//! let store = RedisStore::connect(&config.redis_url())?;
//!
//! let mut session = Session::new(device, config.waveform.clone()).with_store(Box::new(store));
//! session.execute_remote(&config.redis.key)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod connector;
pub mod generator;
pub mod instrument;
pub mod preview;
pub mod remote;
pub mod serial_instrument;
pub mod session;
pub mod tcp_instrument;
pub mod transcoder;

// Re-export the main types for convenience
pub use config::{load_config, AppConfig, InstrumentConfig, RedisConfig};

pub use connector::{ConnectionKind, Connector, Resource};

pub use generator::{
    Channel, GeneratorError, ParameterError, WaveformGenerator, WaveformParameters, WaveformType,
    UPLOAD_CHANNEL,
};

pub use instrument::{InstrumentError, ScpiDevice};

pub use remote::{CommandParseError, CommandStore, RedisStore, RemoteCommand, StoreError};

pub use serial_instrument::{available_serial_resources, SerialInstrument};

pub use session::{Session, SessionError};

pub use tcp_instrument::TcpInstrument;

pub use transcoder::{EncodeSummary, TranscodeError};
