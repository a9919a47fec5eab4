use std::path::{Path, PathBuf};

use crate::generator::{
    check_level, Channel, GeneratorError, WaveformGenerator, WaveformParameters,
};
use crate::instrument::ScpiDevice;
use crate::remote::{CommandParseError, CommandStore, RemoteCommand, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Generator(#[from] GeneratorError),

    #[error("Malformed command: {0}")]
    MalformedCommand(#[from] CommandParseError),

    #[error("Command store error: {0}")]
    Store(#[from] StoreError),

    #[error("No such file: '{0}'")]
    FileNotFound(PathBuf),

    #[error("No command store is connected")]
    NoStore,
}

/// One live connection: the generator, an optional command store and the
/// current form values.
pub struct Session<D: ScpiDevice> {
    generator: WaveformGenerator<D>,
    store: Option<Box<dyn CommandStore>>,
    form: WaveformParameters,
}

impl<D: ScpiDevice + std::fmt::Debug> std::fmt::Debug for Session<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("generator", &self.generator)
            .field("form", &self.form)
            .field("store", &self.store.is_some())
            .finish()
    }
}

impl<D: ScpiDevice> Session<D> {
    pub fn new(device: D, form: WaveformParameters) -> Self {
        Self {
            generator: WaveformGenerator::new(device),
            store: None,
            form,
        }
    }

    pub fn with_store(mut self, store: Box<dyn CommandStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn channel(&self) -> Channel {
        self.form.channel
    }

    pub fn form(&self) -> &WaveformParameters {
        &self.form
    }

    pub fn form_mut(&mut self) -> &mut WaveformParameters {
        &mut self.form
    }

    pub fn generator(&self) -> &WaveformGenerator<D> {
        &self.generator
    }

    pub fn generator_mut(&mut self) -> &mut WaveformGenerator<D> {
        &mut self.generator
    }

    /// Send the whole form to the device and enable the output.
    pub fn apply_form(&mut self) -> Result<(), SessionError> {
        self.generator.apply(&self.form)?;
        Ok(())
    }

    /// Upload `csv_path` and generate it with the form's frequency, amplitude, phase and offset.
    pub fn upload_with_form(&mut self, csv_path: &Path) -> Result<PathBuf, SessionError> {
        self.upload_on(self.form.channel, csv_path)
    }

    fn upload_on(&mut self, channel: Channel, csv_path: &Path) -> Result<PathBuf, SessionError> {
        let form = &self.form;
        Ok(self.generator.upload_and_generate(
            channel,
            csv_path,
            form.frequency_hz,
            form.amplitude_v,
            form.phase_deg,
            form.offset_v,
        )?)
    }

    /// Parse `line` and run it against the session's channel.
    pub fn dispatch(&mut self, line: &str) -> Result<RemoteCommand, SessionError> {
        let command = RemoteCommand::parse(line, self.channel())?;
        self.execute(&command)?;
        Ok(command)
    }

    pub fn execute(&mut self, command: &RemoteCommand) -> Result<(), SessionError> {
        log::debug!("Executing remote command: {}", command);
        match command {
            RemoteCommand::Upload { channel, path } => {
                if !path.is_file() {
                    return Err(SessionError::FileNotFound(path.clone()));
                }
                self.upload_on(*channel, path)?;
            }
            RemoteCommand::Set {
                channel,
                waveform_type,
                frequency_hz,
                amplitude_v,
            } => {
                check_level("Frequency", *frequency_hz).map_err(GeneratorError::from)?;
                check_level("Amplitude", *amplitude_v).map_err(GeneratorError::from)?;
                self.generator.set_waveform_type(*channel, waveform_type)?;
                self.generator.set_frequency(*channel, *frequency_hz)?;
                self.generator.set_amplitude(*channel, *amplitude_v)?;
                self.generator.start_waveform(*channel)?;
            }
            RemoteCommand::Stop { channel } => {
                self.generator.stop_waveform(*channel)?;
            }
            RemoteCommand::Unknown { verb } => {
                log::warn!("Unknown command '{}', nothing sent", verb);
            }
        }
        Ok(())
    }

    /// Fetch the command stored under `key` and dispatch it.
    pub fn execute_remote(&mut self, key: &str) -> Result<RemoteCommand, SessionError> {
        let line = self.get_command(key)?;
        self.dispatch(&line)
    }

    pub fn get_command(&mut self, key: &str) -> Result<String, SessionError> {
        let store = self.store.as_mut().ok_or(SessionError::NoStore)?;
        let line = store
            .get(key)?
            .ok_or_else(|| CommandParseError::MissingKey(key.to_string()))?;
        log::debug!("Fetched command '{}' from key '{}'", line, key);
        Ok(line)
    }

    pub fn set_command(&mut self, key: &str, value: &str) -> Result<(), SessionError> {
        let store = self.store.as_mut().ok_or(SessionError::NoStore)?;
        store.set(key, value)?;
        Ok(())
    }
}
