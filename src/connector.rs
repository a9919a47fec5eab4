use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::config::InstrumentConfig;
use crate::instrument::{InstrumentError, ScpiDevice};
use crate::serial_instrument::SerialInstrument;
use crate::tcp_instrument::TcpInstrument;

/// Bus selection offered by the connection form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionKind {
    Lan,
    Gpib,
}

impl ConnectionKind {
    /// VISA resource string for `address` on this bus.
    pub fn resource_string(&self, address: &str) -> String {
        match self {
            ConnectionKind::Lan => format!("TCPIP::{address}::INSTR"),
            ConnectionKind::Gpib => format!("GPIB::{address}::INSTR"),
        }
    }
}

impl FromStr for ConnectionKind {
    type Err = InstrumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "LAN" | "TCPIP" => Ok(ConnectionKind::Lan),
            "GPIB" => Ok(ConnectionKind::Gpib),
            _ => Err(InstrumentError::InvalidResource(format!(
                "unknown connection type '{s}', expected LAN or GPIB"
            ))),
        }
    }
}

/// A parsed VISA resource string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resource {
    Tcp { host: String, port: Option<u16> },
    Serial { port: String },
    Gpib { address: String },
}

impl FromStr for Resource {
    type Err = InstrumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InstrumentError::InvalidResource(s.to_string());
        let parts: Vec<&str> = s.trim().split("::").collect();
        let interface = parts.first().ok_or_else(invalid)?.to_ascii_uppercase();

        if interface.starts_with("TCPIP") {
            // TCPIP[n]::host[::port]::INSTR or TCPIP[n]::host::port::SOCKET
            let host = parts.get(1).filter(|h| !h.is_empty()).ok_or_else(invalid)?;
            let port = match parts.len() {
                3 => None,
                4 => Some(parts[2].parse::<u16>().map_err(|_| invalid())?),
                _ => return Err(invalid()),
            };
            let suffix = parts[parts.len() - 1].to_ascii_uppercase();
            if suffix != "INSTR" && suffix != "SOCKET" {
                return Err(invalid());
            }
            return Ok(Resource::Tcp {
                host: (*host).to_string(),
                port,
            });
        }

        if let Some(port) = parts[0].strip_prefix("ASRL").or_else(|| parts[0].strip_prefix("asrl")) {
            if port.is_empty() || parts.len() != 2 {
                return Err(invalid());
            }
            // Numbered ports only exist on Windows (ASRL3 is COM3), elsewhere
            // the resource carries the device path
            let numbered = port.chars().all(|c| c.is_ascii_digit());
            let port = match (numbered, cfg!(windows)) {
                (true, true) => format!("COM{port}"),
                (true, false) => {
                    return Err(InstrumentError::InvalidResource(format!(
                        "{s} (numbered serial ports are Windows only, use ASRL<device path>::INSTR)"
                    )))
                }
                (false, _) => port.to_string(),
            };
            return Ok(Resource::Serial { port });
        }

        if interface.starts_with("GPIB") {
            let address = parts.get(1).ok_or_else(invalid)?;
            return Ok(Resource::Gpib {
                address: (*address).to_string(),
            });
        }

        Err(invalid())
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Tcp { host, port: None } => write!(f, "TCPIP::{host}::INSTR"),
            Resource::Tcp {
                host,
                port: Some(port),
            } => write!(f, "TCPIP::{host}::{port}::SOCKET"),
            Resource::Serial { port } => {
                let number = port
                    .strip_prefix("COM")
                    .filter(|n| cfg!(windows) && !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()));
                write!(f, "ASRL{}::INSTR", number.unwrap_or(port))
            }
            Resource::Gpib { address } => write!(f, "GPIB::{address}::INSTR"),
        }
    }
}

pub struct Connector;

impl Connector {
    /// Open the instrument named by `resource` and log its identification.
    pub fn connect(
        resource: &str,
        config: &InstrumentConfig,
    ) -> Result<Box<dyn ScpiDevice>, InstrumentError> {
        let timeout = Duration::from_millis(config.timeout_ms);
        let mut device: Box<dyn ScpiDevice> = match resource.parse::<Resource>()? {
            Resource::Tcp { host, port } => Box::new(TcpInstrument::connect(
                &host,
                port.unwrap_or(config.default_port),
                timeout,
            )?),
            Resource::Serial { port } => {
                Box::new(SerialInstrument::open(&port, config.baud_rate, timeout)?)
            }
            Resource::Gpib { .. } => {
                return Err(InstrumentError::Unsupported(resource.to_string()));
            }
        };

        let idn = device.query("*IDN?")?;
        log::info!("Instrument ID: {}", idn);
        log::debug!("Connected to device at {}", resource);
        Ok(device)
    }
}
