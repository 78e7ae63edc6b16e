//  _______  _________            _______   _______   _______
// (  ____ ) \__   __/ |\     /| (  ___  ) (  ___  ) / ___   )
// | (    )|    ) (    ( \   / ) | (   ) | | (   ) | \/   )  |
// | (____)|    | |     \ (_) /  | (___) | | (___) |     /   )
// |     __)    | |      \   /   |  ___  | |  ___  |    /   /
// | (\ (       | |       ) (    | (   ) | | (   ) |   /   /
// | ) \ \__ ___) (___    | |    | )   ( | | )   ( |  (   (__/\
// |/   \__/ \_______/    \_/    |/     \| |/     \|  \_______/

pub mod error;
pub mod param;
pub mod waveform;
pub mod effects;
pub mod instrument;
pub mod graph;
pub mod context;
pub mod config;
pub mod assets;
pub mod tabla;
pub mod taal;
pub mod scheduler;
pub mod tanpura;
pub mod harmonium;
pub mod engine;
pub mod utils;

pub use error::SynthError;
pub use param::Param;
pub use waveform::{Oscillator, WaveformType};
pub use effects::{BiquadFilter, FilterType, WaveShaper, jivari_curve};
pub use instrument::{Instrument, InstrumentSource, SampleData};
pub use graph::{BufferPlayer, Graph, Source, Voice, VoiceId};
pub use context::{AudioContext, ContextState};
pub use config::{AssetManifest, EngineConfig, OutputMode};
pub use assets::{AssetFetcher, FileFetcher, SampleBank};
pub use tabla::Bol;
pub use taal::{Beat, Taal, beat_interval};
pub use scheduler::Scheduler;
pub use tanpura::TanpuraString;
pub use harmonium::Swara;
pub use engine::Engine;
pub use utils::{fine_tune, parse_note};
