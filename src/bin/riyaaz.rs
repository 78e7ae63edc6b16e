//! Riyaaz CLI - practice drone and taal from the command line

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use clap::{Args, Parser, Subcommand};
use tracing::info;

use riyaaz::{
    parse_note, AssetFetcher, AssetManifest, Engine, EngineConfig, FileFetcher, OutputMode, SynthError, Taal,
    TanpuraString,
};

#[derive(Parser)]
#[command(name = "riyaaz")]
#[command(about = "Tanpura and tabla accompaniment for practice", long_about = None)]
struct Cli {
    /// Engine settings (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Asset manifest (TOML) listing tanpura, tabla and harmonium recordings
    #[arg(short, long, global = true)]
    manifest: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play on the default output device
    Play(Session),
    /// Render to a WAV file instead of the speakers
    Render {
        #[command(flatten)]
        session: Session,

        /// Output WAV file path
        output: PathBuf,

        /// Sample rate in Hz
        #[arg(long, default_value = "44100")]
        sample_rate: u32,
    },
    /// List the built-in taals
    Taals,
}

#[derive(Args)]
struct Session {
    /// Tonic (Sa) as a note name, e.g. C#3
    #[arg(short, long, default_value = "C3")]
    sa: String,

    /// Drone string emphasised with Sa
    #[arg(long, default_value = "sa")]
    string: String,

    /// Taal to play, or none for drone only
    #[arg(short, long)]
    taal: Option<String>,

    /// Tempo in BPM
    #[arg(short = 'b', long, default_value = "120")]
    tempo: f32,

    /// Master volume in [0, 1]
    #[arg(short, long)]
    volume: Option<f32>,

    /// Seconds to play
    #[arg(short, long, default_value = "10.0")]
    duration: f32,

    /// Skip the tanpura
    #[arg(long)]
    no_tanpura: bool,

    /// Synthesize even when recordings are available
    #[arg(long)]
    synth: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let base = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };

    match cli.command {
        Commands::Taals => {
            for taal in Taal::library() {
                let labels: Vec<&str> = taal.beats().iter().map(|b| b.label.as_str()).collect();
                println!("{:<14} {:>2}  {}", taal.name(), taal.len(), labels.join(" "));
            }
        }
        Commands::Play(session) => {
            let mut engine = build_engine(base, cli.manifest.as_ref())?;
            start_session(&mut engine, &session)?;
            thread::sleep(Duration::from_secs_f32(session.duration.max(0.0)));
            engine.stop_all();
        }
        Commands::Render { session, output, sample_rate } => {
            let config = EngineConfig { output: OutputMode::Offline, sample_rate, ..base };
            let mut engine = build_engine(config, cli.manifest.as_ref())?;
            start_session(&mut engine, &session)?;
            render_to_wav(&mut engine, &output, sample_rate, session.duration)?;
            engine.stop_all();
            info!("Wrote {}", output.display());
        }
    }

    Ok(())
}

fn build_engine(config: EngineConfig, manifest: Option<&PathBuf>) -> Result<Engine, SynthError> {
    let Some(path) = manifest else {
        return Engine::new(config);
    };
    let manifest = AssetManifest::load(path)?;
    let fetcher: Arc<dyn AssetFetcher> = Arc::new(FileFetcher::new(&manifest.root));
    let mut engine = Engine::new(config)?.with_fetcher(fetcher);
    engine.load_manifest(&manifest);
    Ok(engine)
}

fn start_session(engine: &mut Engine, session: &Session) -> Result<(), SynthError> {
    if let Some(volume) = session.volume {
        engine.set_volume(volume);
    }
    engine.init()?;

    if !session.no_tanpura {
        let sa = parse_note(&session.sa)?;
        let string: TanpuraString = session.string.parse()?;
        info!("Tanpura {} on Sa = {} ({:.2} Hz)", string, session.sa, sa);
        engine.start_tanpura(sa, string)?;
    }

    if let Some(name) = &session.taal {
        let taal = Taal::builtin(name)
            .ok_or_else(|| SynthError::ParseError(format!("Unknown taal: {name}")))?;
        info!("{} at {} BPM", taal, session.tempo);
        let labels: Vec<String> = taal.beats().iter().map(|b| b.label.clone()).collect();
        engine.start_tabla(&taal, session.tempo, !session.synth, move |beat| {
            info!("[{:>2}] {}", beat + 1, labels[beat]);
        })?;
    }
    Ok(())
}

/// Render in short blocks paced to the wall clock so scheduled beats land where they would live.
fn render_to_wav(engine: &mut Engine, output: &Path, sample_rate: u32, seconds: f32) -> Result<(), Box<dyn std::error::Error>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(output, spec)?;

    let block = (sample_rate / 50).max(1) as usize; // 20 ms
    let total = (seconds.max(0.0) * sample_rate as f32) as usize;
    let mut buffer = vec![0.0_f32; block];
    let start = Instant::now();
    let mut written = 0;

    while written < total {
        let n = block.min(total - written);
        engine.render(&mut buffer[..n])?;
        for sample in &buffer[..n] {
            writer.write_sample((sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)?;
        }
        written += n;

        let due = Duration::from_secs_f64(written as f64 / sample_rate as f64);
        if let Some(wait) = due.checked_sub(start.elapsed()) {
            thread::sleep(wait);
        }
    }

    writer.finalize()?;
    Ok(())
}
