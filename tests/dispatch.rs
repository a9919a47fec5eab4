// Command ordering against a recording device double.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};

use wavegen_rs::transcoder;
use wavegen_rs::{
    Channel, CommandParseError, CommandStore, GeneratorError, InstrumentError, ParameterError,
    RemoteCommand, ScpiDevice, Session, SessionError, StoreError, TranscodeError,
    WaveformGenerator, WaveformParameters, WaveformType,
};

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Write(String),
    Query(String),
    Binary { prefix: String, payload: Vec<u8> },
}

/// Shares its log so the test can inspect it after the session took ownership.
#[derive(Debug, Clone, Default)]
struct RecordingDevice {
    calls: Rc<RefCell<Vec<Call>>>,
    fail_on: Option<&'static str>,
}

impl RecordingDevice {
    fn writes(&self) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|call| match call {
                Call::Write(command) => Some(command.clone()),
                _ => None,
            })
            .collect()
    }
}

impl ScpiDevice for RecordingDevice {
    fn write(&mut self, command: &str) -> Result<(), InstrumentError> {
        if self.fail_on.is_some_and(|f| command.contains(f)) {
            return Err(InstrumentError::Io(std::io::Error::other("bus fault")));
        }
        self.calls.borrow_mut().push(Call::Write(command.to_string()));
        Ok(())
    }

    fn query(&mut self, command: &str) -> Result<String, InstrumentError> {
        self.calls.borrow_mut().push(Call::Query(command.to_string()));
        Ok("Siglent Technologies,SDG2042X,SDG00001,2.01".to_string())
    }

    fn write_binary(&mut self, prefix: &str, payload: &[u8]) -> Result<(), InstrumentError> {
        self.calls.borrow_mut().push(Call::Binary {
            prefix: prefix.to_string(),
            payload: payload.to_vec(),
        });
        Ok(())
    }
}

#[derive(Default)]
struct MemoryStore {
    values: HashMap<String, String>,
}

impl CommandStore for MemoryStore {
    fn get(&mut self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

static COUNTER: AtomicUsize = AtomicUsize::new(0);

fn scratch_csv(stem: &str, contents: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "wavegen-dispatch-{}-{}",
        std::process::id(),
        COUNTER.fetch_add(1, Ordering::SeqCst)
    ));
    fs::create_dir_all(&dir).unwrap();
    let path = dir.join(format!("{stem}.csv"));
    fs::write(&path, contents).unwrap();
    path
}

fn form(channel: Channel) -> WaveformParameters {
    WaveformParameters {
        channel,
        waveform_type: WaveformType::Sine,
        frequency_hz: 2000.0,
        amplitude_v: 1.5,
        phase_deg: 30.0,
        offset_v: -0.2,
    }
}

fn le_bytes(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

#[test]
fn upload_and_generate_issues_fixed_sequence() {
    let csv_path = scratch_csv("staircase", "level\n0\n0.5\n1\n");
    let device = RecordingDevice::default();
    let mut generator = WaveformGenerator::new(device.clone());

    let bin_path = generator
        .upload_and_generate(Channel::Two, &csv_path, 1000.0, 2.5, 90.0, 0.5)
        .unwrap();
    assert_eq!(bin_path, csv_path.with_extension("bin"));

    let calls = device.calls.borrow().clone();
    assert_eq!(
        calls,
        vec![
            Call::Binary {
                prefix: "C1:WVDT WVNM,staircase,WAVEDATA,".to_string(),
                payload: le_bytes(&[0.0, 0.5, 1.0]),
            },
            Call::Write("C2:ARWV NAME,staircase".to_string()),
            Call::Write("C2:BSWV FRQ,1000".to_string()),
            Call::Write("C2:BSWV AMP,2.5".to_string()),
            Call::Write("C2:BSWV PHSE,90".to_string()),
            Call::Write("C2:BSWV OFST,0.5".to_string()),
            Call::Write("C2:OUTP ON".to_string()),
        ]
    );
}

#[test]
fn upload_always_goes_through_channel_one() {
    let csv_path = scratch_csv("ch1_only", "v\n1\n");
    let device = RecordingDevice::default();
    let mut generator = WaveformGenerator::new(device.clone());
    generator
        .upload_and_generate(Channel::Two, &csv_path, 1.0, 1.0, 0.0, 0.0)
        .unwrap();

    let calls = device.calls.borrow();
    match &calls[0] {
        Call::Binary { prefix, .. } => assert!(prefix.starts_with("C1:WVDT")),
        other => unreachable!("first call should be the upload, got {other:?}"),
    }
}

#[test]
fn upload_with_missing_csv_sends_nothing() {
    let device = RecordingDevice::default();
    let mut generator = WaveformGenerator::new(device.clone());
    let result = generator.upload_and_generate(
        Channel::One,
        Path::new("/nonexistent/wave.csv"),
        1.0,
        1.0,
        0.0,
        0.0,
    );

    assert!(matches!(
        result,
        Err(GeneratorError::Transcode(TranscodeError::NotFound(_)))
    ));
    assert!(device.calls.borrow().is_empty());
}

#[test]
fn upload_with_bad_row_sends_nothing_and_keeps_partial_payload() {
    let csv_path = scratch_csv("bad", "v\n1\nx\n");
    let device = RecordingDevice::default();
    let mut generator = WaveformGenerator::new(device.clone());
    let result = generator.upload_and_generate(Channel::One, &csv_path, 1.0, 1.0, 0.0, 0.0);

    assert!(matches!(
        result,
        Err(GeneratorError::Transcode(TranscodeError::Conversion { row: 3, .. }))
    ));
    assert!(device.calls.borrow().is_empty());
    assert_eq!(
        transcoder::decode(&transcoder::binary_path_for(&csv_path)).unwrap(),
        vec![1.0]
    );
}

#[test]
fn failing_step_aborts_the_rest_without_rollback() {
    let csv_path = scratch_csv("halfway", "v\n1\n2\n");
    let device = RecordingDevice {
        fail_on: Some("PHSE"),
        ..RecordingDevice::default()
    };
    let mut generator = WaveformGenerator::new(device.clone());
    let result = generator.upload_and_generate(Channel::One, &csv_path, 10.0, 1.0, 45.0, 0.0);

    assert!(matches!(result, Err(GeneratorError::Device(_))));
    assert_eq!(
        device.writes(),
        vec!["C1:ARWV NAME,halfway", "C1:BSWV FRQ,10", "C1:BSWV AMP,1"]
    );
}

#[test]
fn dispatch_stop_disables_configured_channel_once() {
    let device = RecordingDevice::default();
    let mut session = Session::new(device.clone(), form(Channel::Two));

    let command = session.dispatch("stop").unwrap();
    assert_eq!(
        command,
        RemoteCommand::Stop {
            channel: Channel::Two
        }
    );
    assert_eq!(
        *device.calls.borrow(),
        vec![Call::Write("C2:OUTP OFF".to_string())]
    );
}

#[test]
fn dispatch_set_skips_phase_and_offset() {
    let device = RecordingDevice::default();
    let mut session = Session::new(device.clone(), form(Channel::One));

    session.dispatch("set X 1000 2.5").unwrap();
    assert_eq!(
        device.writes(),
        vec![
            "C1:BSWV WVTP,X",
            "C1:BSWV FRQ,1000",
            "C1:BSWV AMP,2.5",
            "C1:OUTP ON",
        ]
    );
}

#[test]
fn dispatch_set_with_target_token() {
    let device = RecordingDevice::default();
    let mut session = Session::new(device.clone(), form(Channel::Two));

    session.dispatch("set C1 square 250 0.8").unwrap();
    assert_eq!(
        device.writes(),
        vec![
            "C2:BSWV WVTP,SQUARE",
            "C2:BSWV FRQ,250",
            "C2:BSWV AMP,0.8",
            "C2:OUTP ON",
        ]
    );
}

#[test]
fn dispatch_upload_uses_form_settings() {
    let csv_path = scratch_csv("remote_wave", "a,b\n1,2\n");
    let device = RecordingDevice::default();
    let mut session = Session::new(device.clone(), form(Channel::One));

    session
        .dispatch(&format!("upload C1 {}", csv_path.display()))
        .unwrap();

    assert_eq!(
        device.writes(),
        vec![
            "C1:ARWV NAME,remote_wave",
            "C1:BSWV FRQ,2000",
            "C1:BSWV AMP,1.5",
            "C1:BSWV PHSE,30",
            "C1:BSWV OFST,-0.2",
            "C1:OUTP ON",
        ]
    );
}

#[test]
fn execute_upload_honours_command_channel() {
    let csv_path = scratch_csv("second_channel", "v\n0.25\n");
    let device = RecordingDevice::default();
    let mut session = Session::new(device.clone(), form(Channel::One));

    session
        .execute(&RemoteCommand::Upload {
            channel: Channel::Two,
            path: csv_path,
        })
        .unwrap();

    let calls = device.calls.borrow();
    match &calls[0] {
        Call::Binary { prefix, .. } => {
            assert_eq!(prefix, "C1:WVDT WVNM,second_channel,WAVEDATA,")
        }
        other => unreachable!("first call should be the upload, got {other:?}"),
    }
    drop(calls);
    assert_eq!(
        device.writes(),
        vec![
            "C2:ARWV NAME,second_channel",
            "C2:BSWV FRQ,2000",
            "C2:BSWV AMP,1.5",
            "C2:BSWV PHSE,30",
            "C2:BSWV OFST,-0.2",
            "C2:OUTP ON",
        ]
    );
}

#[test]
fn dispatch_set_rejects_non_finite_and_negative_levels() {
    let device = RecordingDevice::default();
    let mut session = Session::new(device.clone(), form(Channel::One));

    assert!(matches!(
        session.dispatch("set sine NaN -3"),
        Err(SessionError::MalformedCommand(CommandParseError::OutOfRange {
            name: "Frequency",
            ..
        }))
    ));
    assert!(matches!(
        session.dispatch("set sine 1000 -3"),
        Err(SessionError::MalformedCommand(CommandParseError::OutOfRange {
            name: "Amplitude",
            ..
        }))
    ));
    assert!(device.calls.borrow().is_empty());
}

#[test]
fn execute_set_checks_levels_of_constructed_command() {
    let device = RecordingDevice::default();
    let mut session = Session::new(device.clone(), form(Channel::One));

    let result = session.execute(&RemoteCommand::Set {
        channel: Channel::One,
        waveform_type: WaveformType::Sine,
        frequency_hz: f64::INFINITY,
        amplitude_v: 1.0,
    });
    assert!(matches!(
        result,
        Err(SessionError::Generator(GeneratorError::Parameters(
            ParameterError::NotFinite { name: "Frequency", .. }
        )))
    ));
    assert!(device.calls.borrow().is_empty());
}

#[test]
fn upload_with_negative_amplitude_sends_nothing() {
    let csv_path = scratch_csv("negative", "v\n1\n");
    let device = RecordingDevice::default();
    let mut generator = WaveformGenerator::new(device.clone());
    let result = generator.upload_and_generate(Channel::One, &csv_path, 1000.0, -3.0, 0.0, 0.0);

    assert!(matches!(
        result,
        Err(GeneratorError::Parameters(ParameterError::Negative {
            name: "Amplitude",
            ..
        }))
    ));
    assert!(device.calls.borrow().is_empty());
    assert!(!transcoder::binary_path_for(&csv_path).exists());
}

#[test]
fn session_debug_shows_form_and_store() {
    let session = Session::new(RecordingDevice::default(), form(Channel::Two))
        .with_store(Box::new(MemoryStore::default()));
    let text = format!("{session:?}");

    assert!(text.starts_with("Session {"));
    assert!(text.contains("channel: Two"));
    assert!(text.contains("store: true"));
}

#[test]
fn dispatch_upload_missing_file() {
    let device = RecordingDevice::default();
    let mut session = Session::new(device.clone(), form(Channel::One));

    let result = session.dispatch("upload C1 /nonexistent/remote.csv");
    assert!(matches!(result, Err(SessionError::FileNotFound(_))));
    assert!(device.calls.borrow().is_empty());
}

#[test]
fn dispatch_unknown_verb_is_noop() {
    let device = RecordingDevice::default();
    let mut session = Session::new(device.clone(), form(Channel::One));

    let command = session.dispatch("reboot now").unwrap();
    assert_eq!(
        command,
        RemoteCommand::Unknown {
            verb: "reboot".to_string()
        }
    );
    assert!(device.calls.borrow().is_empty());
}

#[test]
fn dispatch_malformed_is_typed_error() {
    let device = RecordingDevice::default();
    let mut session = Session::new(device.clone(), form(Channel::One));

    assert!(matches!(
        session.dispatch("set sine"),
        Err(SessionError::MalformedCommand(
            CommandParseError::WrongArgumentCount { .. }
        ))
    ));
    assert!(matches!(
        session.dispatch(""),
        Err(SessionError::MalformedCommand(CommandParseError::Empty))
    ));
    assert!(device.calls.borrow().is_empty());
}

#[test]
fn remote_command_round_trip_through_store() {
    let device = RecordingDevice::default();
    let mut session = Session::new(device.clone(), form(Channel::One))
        .with_store(Box::new(MemoryStore::default()));

    session.set_command("waveform_command", "stop").unwrap();
    let command = session.execute_remote("waveform_command").unwrap();

    assert_eq!(
        command,
        RemoteCommand::Stop {
            channel: Channel::One
        }
    );
    assert_eq!(device.writes(), vec!["C1:OUTP OFF"]);
}

#[test]
fn remote_absent_key_is_malformed_and_silent() {
    let device = RecordingDevice::default();
    let mut session = Session::new(device.clone(), form(Channel::One))
        .with_store(Box::new(MemoryStore::default()));

    let result = session.execute_remote("missing");
    assert!(matches!(
        result,
        Err(SessionError::MalformedCommand(CommandParseError::MissingKey(key))) if key == "missing"
    ));
    assert!(device.calls.borrow().is_empty());
}

#[test]
fn remote_without_store() {
    let mut session = Session::new(RecordingDevice::default(), form(Channel::One));
    assert!(matches!(
        session.execute_remote("k"),
        Err(SessionError::NoStore)
    ));
}

#[test]
fn apply_form_sends_everything() {
    let device = RecordingDevice::default();
    let mut session = Session::new(device.clone(), form(Channel::Two));
    session.form_mut().waveform_type = WaveformType::Pulse;
    session.apply_form().unwrap();

    assert_eq!(
        device.writes(),
        vec![
            "C2:BSWV WVTP,PULSE",
            "C2:BSWV FRQ,2000",
            "C2:BSWV AMP,1.5",
            "C2:BSWV PHSE,30",
            "C2:BSWV OFST,-0.2",
            "C2:OUTP ON",
        ]
    );
}
