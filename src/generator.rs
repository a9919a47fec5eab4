use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::instrument::{InstrumentError, ScpiDevice};
use crate::transcoder::{self, TranscodeError};

/// Channel every binary waveform upload is addressed to.
///
/// The upload step does not follow the requested channel; the waveform is then
/// selected by name on the requested channel.
pub const UPLOAD_CHANNEL: Channel = Channel::One;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Channel {
    One,
    Two,
}

impl Channel {
    pub fn number(&self) -> u8 {
        match self {
            Channel::One => 1,
            Channel::Two => 2,
        }
    }
}

impl TryFrom<u8> for Channel {
    type Error = ParameterError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Channel::One),
            2 => Ok(Channel::Two),
            n => Err(ParameterError::InvalidChannel(n)),
        }
    }
}

impl From<Channel> for u8 {
    fn from(channel: Channel) -> Self {
        channel.number()
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// Basic wave type as sent with `BSWV WVTP`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum WaveformType {
    Sine,
    Square,
    Ramp,
    Pulse,
    Noise,
    Dc,
    Arb,
    /// Anything else the operator typed, sent verbatim.
    Other(String),
}

impl WaveformType {
    pub fn as_scpi(&self) -> &str {
        match self {
            WaveformType::Sine => "SINE",
            WaveformType::Square => "SQUARE",
            WaveformType::Ramp => "RAMP",
            WaveformType::Pulse => "PULSE",
            WaveformType::Noise => "NOISE",
            WaveformType::Dc => "DC",
            WaveformType::Arb => "ARB",
            WaveformType::Other(s) => s,
        }
    }
}

impl From<&str> for WaveformType {
    fn from(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "sine" => WaveformType::Sine,
            "square" => WaveformType::Square,
            "ramp" => WaveformType::Ramp,
            "pulse" => WaveformType::Pulse,
            "noise" => WaveformType::Noise,
            "dc" => WaveformType::Dc,
            "arb" => WaveformType::Arb,
            _ => WaveformType::Other(s.to_string()),
        }
    }
}

impl From<String> for WaveformType {
    fn from(s: String) -> Self {
        WaveformType::from(s.as_str())
    }
}

impl From<WaveformType> for String {
    fn from(waveform_type: WaveformType) -> Self {
        match waveform_type {
            WaveformType::Other(s) => s,
            known => known.as_scpi().to_ascii_lowercase(),
        }
    }
}

impl FromStr for WaveformType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(WaveformType::from(s))
    }
}

impl fmt::Display for WaveformType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_scpi())
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ParameterError {
    #[error("Channel {0} does not exist, the generator has channels 1 and 2")]
    InvalidChannel(u8),

    #[error("{name} must be a finite number, got {value}")]
    NotFinite { name: &'static str, value: f64 },

    #[error("{name} must not be negative, got {value}")]
    Negative { name: &'static str, value: f64 },

    #[error("Phase must be in [0, 360) degrees, got {0}")]
    PhaseOutOfRange(f64),
}

/// Frequency and amplitude must be finite and not negative.
pub fn check_level(name: &'static str, value: f64) -> Result<(), ParameterError> {
    if !value.is_finite() {
        return Err(ParameterError::NotFinite { name, value });
    }
    if value < 0.0 {
        return Err(ParameterError::Negative { name, value });
    }
    Ok(())
}

/// The settings of one channel as entered on the form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaveformParameters {
    pub channel: Channel,
    pub waveform_type: WaveformType,
    pub frequency_hz: f64,
    pub amplitude_v: f64,
    pub phase_deg: f64,
    pub offset_v: f64,
}

impl Default for WaveformParameters {
    fn default() -> Self {
        Self {
            channel: Channel::One,
            waveform_type: WaveformType::Sine,
            frequency_hz: 1000.0,
            amplitude_v: 1.0,
            phase_deg: 0.0,
            offset_v: 0.0,
        }
    }
}

impl WaveformParameters {
    pub fn validate(&self) -> Result<(), ParameterError> {
        for (name, value) in [
            ("Frequency", self.frequency_hz),
            ("Amplitude", self.amplitude_v),
            ("Phase", self.phase_deg),
            ("Offset", self.offset_v),
        ] {
            if !value.is_finite() {
                return Err(ParameterError::NotFinite { name, value });
            }
        }
        check_level("Frequency", self.frequency_hz)?;
        check_level("Amplitude", self.amplitude_v)?;
        if !(0.0..360.0).contains(&self.phase_deg) {
            return Err(ParameterError::PhaseOutOfRange(self.phase_deg));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    #[error("Device error: {0}")]
    Device(#[from] InstrumentError),

    #[error("Transcoding failed: {0}")]
    Transcode(#[from] TranscodeError),

    #[error("Invalid parameters: {0}")]
    Parameters(#[from] ParameterError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Command layer over one open device handle.
#[derive(Debug)]
pub struct WaveformGenerator<D: ScpiDevice> {
    device: D,
}

impl<D: ScpiDevice> WaveformGenerator<D> {
    pub fn new(device: D) -> Self {
        Self { device }
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn into_device(self) -> D {
        self.device
    }

    pub fn send_command(&mut self, command: &str) -> Result<(), GeneratorError> {
        log::debug!("Sending command: {}", command);
        self.device.write(command)?;
        Ok(())
    }

    pub fn query_command(&mut self, command: &str) -> Result<String, GeneratorError> {
        log::debug!("Querying command: {}", command);
        Ok(self.device.query(command)?)
    }

    /// `*IDN?`
    pub fn identify(&mut self) -> Result<String, GeneratorError> {
        self.query_command("*IDN?")
    }

    pub fn set_waveform_type(
        &mut self,
        channel: Channel,
        waveform_type: &WaveformType,
    ) -> Result<(), GeneratorError> {
        self.send_command(&format!("C{channel}:BSWV WVTP,{waveform_type}"))
    }

    pub fn set_frequency(&mut self, channel: Channel, frequency_hz: f64) -> Result<(), GeneratorError> {
        self.send_command(&format!("C{channel}:BSWV FRQ,{frequency_hz}"))
    }

    pub fn set_amplitude(&mut self, channel: Channel, amplitude_v: f64) -> Result<(), GeneratorError> {
        self.send_command(&format!("C{channel}:BSWV AMP,{amplitude_v}"))
    }

    pub fn set_phase(&mut self, channel: Channel, phase_deg: f64) -> Result<(), GeneratorError> {
        self.send_command(&format!("C{channel}:BSWV PHSE,{phase_deg}"))
    }

    pub fn set_offset(&mut self, channel: Channel, offset_v: f64) -> Result<(), GeneratorError> {
        self.send_command(&format!("C{channel}:BSWV OFST,{offset_v}"))
    }

    /// Turn the channel output on.
    pub fn start_waveform(&mut self, channel: Channel) -> Result<(), GeneratorError> {
        self.send_command(&format!("C{channel}:OUTP ON"))
    }

    /// Turn the channel output off.
    pub fn stop_waveform(&mut self, channel: Channel) -> Result<(), GeneratorError> {
        self.send_command(&format!("C{channel}:OUTP OFF"))
    }

    pub fn set_arbitrary_waveform_by_name(
        &mut self,
        channel: Channel,
        name: &str,
    ) -> Result<(), GeneratorError> {
        self.send_command(&format!("C{channel}:ARWV NAME,{name}"))
    }

    pub fn query_arbitrary_waveform(&mut self, channel: Channel) -> Result<String, GeneratorError> {
        self.query_command(&format!("C{channel}:ARWV?"))
    }

    /// Apply every basic wave setting of `params` and enable the output.
    pub fn apply(&mut self, params: &WaveformParameters) -> Result<(), GeneratorError> {
        params.validate()?;
        let channel = params.channel;
        self.set_waveform_type(channel, &params.waveform_type)?;
        self.set_frequency(channel, params.frequency_hz)?;
        self.set_amplitude(channel, params.amplitude_v)?;
        self.set_phase(channel, params.phase_deg)?;
        self.set_offset(channel, params.offset_v)?;
        self.start_waveform(channel)
    }

    /// Store the payload in `bin_path` on the device, named after the file's base name.
    ///
    /// Always addressed to [`UPLOAD_CHANNEL`].
    pub fn save_binary_waveform_to_device(&mut self, bin_path: &Path) -> Result<String, GeneratorError> {
        let waveform_name = transcoder::waveform_name(bin_path);
        let data = std::fs::read(bin_path)?;
        let prefix = format!("C{UPLOAD_CHANNEL}:WVDT WVNM,{waveform_name},WAVEDATA,");

        log::debug!("Writing {} byte waveform block: {}", data.len(), prefix);
        self.device.write_binary(&prefix, &data)?;
        log::info!(
            "Binary waveform {} saved to device as {}",
            bin_path.display(),
            waveform_name
        );
        Ok(waveform_name)
    }

    /// Transcode `csv_path`, upload it and start generating it on `channel`.
    ///
    /// Sequence: binary upload (channel 1) → `ARWV NAME` → frequency → amplitude →
    /// phase → offset → output on. The first failing step aborts the rest and
    /// nothing already sent is undone.
    pub fn upload_and_generate(
        &mut self,
        channel: Channel,
        csv_path: &Path,
        frequency_hz: f64,
        amplitude_v: f64,
        phase_deg: f64,
        offset_v: f64,
    ) -> Result<PathBuf, GeneratorError> {
        WaveformParameters {
            channel,
            waveform_type: WaveformType::Arb,
            frequency_hz,
            amplitude_v,
            phase_deg,
            offset_v,
        }
        .validate()?;

        let summary = transcoder::encode(csv_path)?;

        if channel != UPLOAD_CHANNEL {
            log::warn!(
                "Waveform data is uploaded through channel {} although channel {} was requested",
                UPLOAD_CHANNEL,
                channel
            );
        }
        self.save_binary_waveform_to_device(&summary.binary_path)?;

        self.set_arbitrary_waveform_by_name(channel, &transcoder::waveform_name(csv_path))?;
        self.set_frequency(channel, frequency_hz)?;
        self.set_amplitude(channel, amplitude_v)?;
        self.set_phase(channel, phase_deg)?;
        self.set_offset(channel, offset_v)?;
        self.start_waveform(channel)?;

        log::info!(
            "Waveform from {} is now being generated on channel {}",
            csv_path.display(),
            channel
        );
        Ok(summary.binary_path)
    }
}
