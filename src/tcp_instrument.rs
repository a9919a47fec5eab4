use std::io::Write;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use crate::instrument::{command_frame, ieee_block, read_response, InstrumentError, ScpiDevice};

/// A SCPI instrument reached over a raw LAN socket.
#[derive(Debug)]
pub struct TcpInstrument {
    stream: TcpStream,
    address: String,
    timeout: Duration,
}

impl TcpInstrument {
    pub fn connect(host: &str, port: u16, timeout: Duration) -> Result<Self, InstrumentError> {
        let address = format!("{host}:{port}");
        log::debug!("Connecting to {}", address);

        let socket_addr = address.to_socket_addrs()?.next().ok_or_else(|| {
            InstrumentError::InvalidResource(format!("cannot resolve {address}"))
        })?;
        let stream = TcpStream::connect_timeout(&socket_addr, timeout)?;
        stream.set_read_timeout(Some(Duration::from_millis(10)))?;
        stream.set_nodelay(true)?;

        Ok(Self {
            stream,
            address,
            timeout,
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

impl ScpiDevice for TcpInstrument {
    fn write(&mut self, command: &str) -> Result<(), InstrumentError> {
        self.stream.write_all(&command_frame(command))?;
        Ok(())
    }

    fn query(&mut self, command: &str) -> Result<String, InstrumentError> {
        self.stream.write_all(&command_frame(command))?;
        read_response(&mut self.stream, command, self.timeout)
    }

    fn write_binary(&mut self, prefix: &str, payload: &[u8]) -> Result<(), InstrumentError> {
        self.stream.write_all(&ieee_block(prefix, payload))?;
        self.stream.flush()?;
        Ok(())
    }
}
