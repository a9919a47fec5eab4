// Command line front end for the waveform generator.
//
// Mirrors the configuration form: manual basic wave setup, CSV upload, and
// remote commands fetched from Redis.

use clap::{Parser, Subcommand};
use std::fs::File;
use std::path::PathBuf;

use wavegen_rs::preview::{self, DEFAULT_POINTS};
use wavegen_rs::transcoder;
use wavegen_rs::{
    available_serial_resources, load_config, AppConfig, Channel, CommandStore, ConnectionKind,
    Connector, RedisStore, ScpiDevice, Session, WaveformType,
};

#[derive(Parser)]
#[command(name = "wavegen")]
#[command(version)]
#[command(about = "Configure a SCPI arbitrary waveform generator")]
#[command(long_about = "Set up basic waves, upload CSV waveforms and run remote commands stored in Redis on a SCPI arbitrary waveform generator.")]
struct Args {
    /// Configuration file (defaults to ./wavegen.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// VISA resource string, overrides the configuration
    #[arg(short, long, global = true)]
    resource: Option<String>,

    /// Connection type used together with --address (LAN or GPIB)
    #[arg(long, global = true, requires = "address")]
    connection: Option<ConnectionKind>,

    /// Instrument address used together with --connection
    #[arg(long, global = true, requires = "connection")]
    address: Option<String>,

    /// Output channel
    #[arg(long, global = true, value_parser = clap::value_parser!(u8).range(1..=2))]
    channel: Option<u8>,

    /// Enable verbose logging
    #[arg(short, long, global = true, help = "Show debug information and every SCPI command")]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args)]
struct FormArgs {
    /// Waveform type (sine, square, ramp, pulse, noise, dc, arb or a raw SCPI token)
    #[arg(short = 't', long = "type")]
    waveform_type: Option<WaveformType>,

    /// Frequency in Hz
    #[arg(short, long)]
    frequency: Option<f64>,

    /// Amplitude in V
    #[arg(short, long)]
    amplitude: Option<f64>,

    /// Phase in degrees
    #[arg(short, long)]
    phase: Option<f64>,

    /// Offset in V
    #[arg(short, long, allow_negative_numbers = true)]
    offset: Option<f64>,
}

#[derive(Subcommand)]
enum Command {
    /// List serial ports as VISA resources
    List,
    /// Print the instrument identification
    Idn,
    /// Convert a CSV file into a binary waveform payload
    Encode {
        csv: PathBuf,
        /// Output path (defaults to the CSV path with a .bin extension)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the samples stored in a binary payload
    Decode {
        bin: PathBuf,
        /// Print at most this many samples
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
    /// Apply the basic wave settings and enable the output
    Set {
        #[command(flatten)]
        form: FormArgs,
    },
    /// Upload a CSV waveform and generate it
    Upload {
        csv: PathBuf,
        #[command(flatten)]
        form: FormArgs,
    },
    /// Disable the output
    Stop,
    /// Show the arbitrary waveform selected on the channel
    QueryArb,
    /// Fetch a command from Redis and run it
    Remote {
        /// Redis key (defaults to the configured key)
        key: Option<String>,
    },
    /// Store a command in Redis for a later `remote`
    Push {
        /// Command words, e.g. `set C1 sine 1000 2`
        #[arg(required = true, num_args = 1.., allow_hyphen_values = true)]
        command: Vec<String>,
        /// Redis key (defaults to the configured key)
        #[arg(short, long)]
        key: Option<String>,
    },
    /// Render the preview of a basic wave
    Preview {
        #[command(flatten)]
        form: FormArgs,
        /// Number of points over one second
        #[arg(long, default_value_t = DEFAULT_POINTS)]
        points: usize,
        /// Write the samples as CSV instead of printing a summary
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

impl FormArgs {
    fn apply_to(self, config: &mut AppConfig) {
        let form = &mut config.waveform;
        if let Some(t) = self.waveform_type {
            form.waveform_type = t;
        }
        if let Some(f) = self.frequency {
            form.frequency_hz = f;
        }
        if let Some(a) = self.amplitude {
            form.amplitude_v = a;
        }
        if let Some(p) = self.phase {
            form.phase_deg = p;
        }
        if let Some(o) = self.offset {
            form.offset_v = o;
        }
    }
}

fn connect(
    resource: Option<&str>,
    config: &AppConfig,
) -> Result<Box<dyn ScpiDevice>, Box<dyn std::error::Error>> {
    let resource = resource.unwrap_or(&config.instrument.resource);
    Ok(Connector::connect(resource, &config.instrument)?)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    if args.verbose {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Debug)
            .init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }

    let mut config = load_config(args.config.as_deref())?;
    if let Some(channel) = args.channel {
        config.waveform.channel = Channel::try_from(channel)?;
    }
    let resource = match (&args.connection, &args.address) {
        (Some(kind), Some(address)) => Some(kind.resource_string(address)),
        _ => args.resource.clone(),
    };

    match args.command {
        Command::List => {
            let resources = available_serial_resources()?;
            if resources.is_empty() {
                println!("No serial resources found");
            }
            for resource in resources {
                println!("{resource}");
            }
        }
        Command::Idn => {
            let device = connect(resource.as_deref(), &config)?;
            let mut session = Session::new(device, config.waveform.clone());
            println!("{}", session.generator_mut().identify()?);
        }
        Command::Encode { csv, output } => {
            let output = output.unwrap_or_else(|| transcoder::binary_path_for(&csv));
            let summary = transcoder::encode_to(&csv, &output)?;
            println!(
                "{} -> {} ({} rows, {} samples, waveform name '{}')",
                csv.display(),
                summary.binary_path.display(),
                summary.rows,
                summary.samples,
                transcoder::waveform_name(&csv)
            );
        }
        Command::Decode { bin, limit } => {
            let samples = transcoder::decode(&bin)?;
            println!("{} samples", samples.len());
            for (i, sample) in samples.iter().take(limit).enumerate() {
                println!("{i:>6}  {sample}");
            }
        }
        Command::Set { form } => {
            form.apply_to(&mut config);
            let device = connect(resource.as_deref(), &config)?;
            let mut session = Session::new(device, config.waveform.clone());
            session.apply_form()?;
        }
        Command::Upload { csv, form } => {
            form.apply_to(&mut config);
            let device = connect(resource.as_deref(), &config)?;
            let mut session = Session::new(device, config.waveform.clone());
            session.upload_with_form(&csv)?;
        }
        Command::Stop => {
            let device = connect(resource.as_deref(), &config)?;
            let mut session = Session::new(device, config.waveform.clone());
            let channel = session.channel();
            session.generator_mut().stop_waveform(channel)?;
        }
        Command::QueryArb => {
            let device = connect(resource.as_deref(), &config)?;
            let mut session = Session::new(device, config.waveform.clone());
            let channel = session.channel();
            println!("{}", session.generator_mut().query_arbitrary_waveform(channel)?);
        }
        Command::Remote { key } => {
            let key = key.unwrap_or_else(|| config.redis.key.clone());
            let store = RedisStore::connect(&config.redis_url())?;
            let device = connect(resource.as_deref(), &config)?;
            let mut session =
                Session::new(device, config.waveform.clone()).with_store(Box::new(store));
            let command = session.execute_remote(&key)?;
            log::info!("Executed remote command: {}", command);
        }
        Command::Push { command, key } => {
            let key = key.unwrap_or_else(|| config.redis.key.clone());
            let mut store = RedisStore::connect(&config.redis_url())?;
            let line = command.join(" ");
            store.set(&key, &line)?;
            println!("Stored '{line}' under '{key}'");
        }
        Command::Preview {
            form,
            points,
            output,
        } => {
            form.apply_to(&mut config);
            let params = &config.waveform;
            let mut df = preview::render(&params.waveform_type, params.frequency_hz, points)?;
            match output {
                Some(path) => {
                    preview::write_csv(&mut df, File::create(&path)?)?;
                    println!("Wrote {} preview points to {}", df.height(), path.display());
                }
                None => {
                    println!("Waveform: {}", params.waveform_type);
                    println!("{df}");
                }
            }
        }
    }

    Ok(())
}
