use serialport::SerialPort;
use std::io::Write;
use std::time::Duration;

use crate::instrument::{command_frame, ieee_block, read_response, InstrumentError, ScpiDevice};

/// A SCPI instrument behind a serial port (VISA `ASRL` resources).
pub struct SerialInstrument {
    serial: Box<dyn SerialPort>,
    port: String,
    timeout: Duration,
}

impl std::fmt::Debug for SerialInstrument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialInstrument")
            .field("port", &self.port)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl SerialInstrument {
    /// Open `port` and discard anything left in its buffers.
    pub fn open(port: &str, baud_rate: u32, timeout: Duration) -> Result<Self, InstrumentError> {
        log::debug!("Opening serial port {} at {} baud", port, baud_rate);
        let serial = serialport::new(port, baud_rate)
            .timeout(Duration::from_millis(10))
            .open()?;

        let mut instrument = Self {
            serial,
            port: port.to_string(),
            timeout,
        };

        instrument.flush()?;
        Ok(instrument)
    }

    pub fn port(&self) -> &str {
        &self.port
    }

    fn flush(&mut self) -> Result<(), InstrumentError> {
        self.serial.clear(serialport::ClearBuffer::All)?;
        Ok(())
    }
}

impl ScpiDevice for SerialInstrument {
    fn write(&mut self, command: &str) -> Result<(), InstrumentError> {
        self.serial.write_all(&command_frame(command))?;
        Ok(())
    }

    fn query(&mut self, command: &str) -> Result<String, InstrumentError> {
        self.flush()?;
        self.serial.write_all(&command_frame(command))?;
        read_response(&mut self.serial, command, self.timeout)
    }

    fn write_binary(&mut self, prefix: &str, payload: &[u8]) -> Result<(), InstrumentError> {
        self.serial.write_all(&ieee_block(prefix, payload))?;
        self.serial.flush()?;
        Ok(())
    }
}

/// List serial ports as VISA `ASRL` resource strings.
pub fn available_serial_resources() -> Result<Vec<String>, InstrumentError> {
    let ports = serialport::available_ports()?;
    Ok(ports
        .into_iter()
        .map(|port| format!("ASRL{}::INSTR", port.port_name))
        .collect())
}
