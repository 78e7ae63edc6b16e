use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use tracing::{debug, info, warn};

use crate::assets::{self, AssetFetcher, FileFetcher, SampleBank};
use crate::config::{AssetManifest, EngineConfig};
use crate::context::{AudioContext, ContextState};
use crate::effects::jivari_curve;
use crate::error::SynthError;
use crate::graph::{self, BufferPlayer, Graph, Source, Voice, VoiceId};
use crate::harmonium;
use crate::instrument::{Instrument, InstrumentSource, SampleData};
use crate::param::Param;
use crate::scheduler::Scheduler;
use crate::tabla::{self, Bol};
use crate::taal::{beat_interval, Taal};
use crate::tanpura::{self, DroneSettings, TanpuraString};

/// Time constant of the master volume glide, in seconds.
const VOLUME_TIME_CONSTANT: f64 = 0.1;

/// Master volume readable from the scheduler thread.
#[derive(Debug, Clone)]
struct SharedVolume(Arc<AtomicU32>);

impl SharedVolume {
    fn new(volume: f32) -> Self {
        SharedVolume(Arc::new(AtomicU32::new(volume.to_bits())))
    }

    fn get(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    fn set(&self, volume: f32) {
        self.0.store(volume.to_bits(), Ordering::Relaxed);
    }
}

/// Everything created together with the audio context.
struct Runtime {
    context: AudioContext,
    jivari: Arc<[f32]>,
    noise: SampleData,
}

struct ActiveDrone {
    id: VoiceId,
    level: f32,
    string: TanpuraString,
    frequency: f32,
}

struct TablaSession {
    scheduler: Scheduler,
    loop_voice: Option<VoiceId>,
    taal: String,
    tempo: f32,
}

pub struct Engine {
    config: EngineConfig,
    runtime: Option<Runtime>,
    fetcher: Arc<dyn AssetFetcher>,
    samples: SampleBank,
    volume: SharedVolume,
    tanpura: Option<ActiveDrone>,
    tabla: Option<TablaSession>,
}

impl Engine {
    /// Build an engine without touching the audio device. The context is
    /// created on first use.
    pub fn new(config: EngineConfig) -> Result<Self, SynthError> {
        config.validate()?;
        Ok(Engine {
            volume: SharedVolume::new(config.master_volume),
            config,
            runtime: None,
            fetcher: Arc::new(FileFetcher::default()),
            samples: SampleBank::default(),
            tanpura: None,
            tabla: None,
        })
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn AssetFetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn samples(&self) -> &SampleBank {
        &self.samples
    }

    /// Create the audio context if needed and make sure it is running.
    pub fn init(&mut self) -> Result<(), SynthError> {
        if self.runtime.is_none() {
            let context = AudioContext::open(&self.config)?;
            let sample_rate = context.sample_rate();
            info!("Audio context ready at {} Hz", sample_rate);
            self.runtime = Some(Runtime {
                context,
                jivari: jivari_curve(),
                noise: tabla::noise_buffer(sample_rate as u32),
            });
        }
        if let Some(rt) = self.runtime.as_mut() {
            if rt.context.state() == ContextState::Suspended {
                rt.context.resume()?;
            }
        }
        Ok(())
    }

    fn runtime(&mut self) -> Result<&Runtime, SynthError> {
        self.init()?;
        self.runtime
            .as_ref()
            .ok_or_else(|| SynthError::AudioError("Audio context unavailable".to_string()))
    }

    fn graph_handle(&mut self) -> Result<Arc<Mutex<Graph>>, SynthError> {
        Ok(Arc::clone(self.runtime()?.context.graph()))
    }

    /// The shared render graph, once the context exists.
    pub fn graph(&self) -> Option<&Arc<Mutex<Graph>>> {
        self.runtime.as_ref().map(|rt| rt.context.graph())
    }

    pub fn current_time(&self) -> f64 {
        self.runtime.as_ref().map_or(0.0, |rt| rt.context.current_time())
    }

    pub fn suspend(&mut self) -> Result<(), SynthError> {
        match self.runtime.as_mut() {
            Some(rt) => rt.context.suspend(),
            None => Ok(()),
        }
    }

    pub fn resume(&mut self) -> Result<(), SynthError> {
        self.init()
    }

    /// Pull mono audio from an offline engine.
    pub fn render(&mut self, out: &mut [f32]) -> Result<(), SynthError> {
        self.runtime()?.context.render(out)
    }

    // Loading

    pub fn load_tanpura_samples(&mut self, sa_url: &str, pa_url: &str) {
        let fetcher = self.fetcher.as_ref();
        let (sa, pa) = thread::scope(|s| {
            let sa = s.spawn(|| assets::fetch_and_decode(fetcher, sa_url));
            let pa = s.spawn(|| assets::fetch_and_decode(fetcher, pa_url));
            (sa.join().ok().flatten(), pa.join().ok().flatten())
        });
        info!(
            "Tanpura samples loaded (Sa: {}, Pa: {})",
            if sa.is_some() { "ok" } else { "missing" },
            if pa.is_some() { "ok" } else { "missing" }
        );
        self.samples.tanpura_sa = sa;
        self.samples.tanpura_pa = pa;
    }

    /// Load one loop per taal. Names are matched case-insensitively later.
    pub fn load_tabla_loops<I, K, V>(&mut self, loops: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let requests: Vec<(String, String)> = loops
            .into_iter()
            .map(|(name, url)| (name.as_ref().to_lowercase(), url.as_ref().to_string()))
            .collect();
        for (name, loaded) in self.fetch_all(&requests) {
            match loaded {
                Some(data) => {
                    self.samples.tabla_loops.insert(name, data);
                }
                None => {
                    self.samples.tabla_loops.remove(&name);
                }
            }
        }
        info!("{} tabla loops available", self.samples.tabla_loops.len());
    }

    pub fn load_harmonium_samples<I, K, V>(&mut self, notes: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let requests: Vec<(String, String)> = notes
            .into_iter()
            .map(|(note, url)| (note.as_ref().to_string(), url.as_ref().to_string()))
            .collect();
        for (note, loaded) in self.fetch_all(&requests) {
            match loaded {
                Some(data) => {
                    self.samples.harmonium.insert(note, data);
                }
                None => {
                    self.samples.harmonium.remove(&note);
                }
            }
        }
        info!("{} harmonium samples available", self.samples.harmonium.len());
    }

    pub fn load_manifest(&mut self, manifest: &AssetManifest) {
        if let Some(tanpura) = &manifest.tanpura {
            self.load_tanpura_samples(&tanpura.sa, &tanpura.pa);
        }
        self.load_tabla_loops(&manifest.tabla);
        self.load_harmonium_samples(&manifest.harmonium);
    }

    fn fetch_all(&self, requests: &[(String, String)]) -> Vec<(String, Option<SampleData>)> {
        let fetcher = self.fetcher.as_ref();
        thread::scope(|s| {
            let handles: Vec<_> = requests
                .iter()
                .map(|(key, url)| (key, s.spawn(move || assets::fetch_and_decode(fetcher, url))))
                .collect();
            handles
                .into_iter()
                .map(|(key, handle)| (key.clone(), handle.join().ok().flatten()))
                .collect()
        })
    }

    // Volume

    pub fn volume(&self) -> f32 {
        self.volume.get()
    }

    /// Set the master volume, gliding the sustained voices to it.
    pub fn set_volume(&mut self, volume: f32) {
        if volume.is_nan() {
            warn!("Ignoring NaN volume");
            return;
        }
        let volume = volume.clamp(0.0, 1.0);
        self.volume.set(volume);

        let Some(rt) = self.runtime.as_ref() else {
            return;
        };
        let mut graph = graph::lock(rt.context.graph());
        let now = graph.current_time();

        let mut retune = |id: VoiceId, level: f32| {
            if let Some(voice) = graph.voice_mut(id) {
                voice.gain
                    .cancel_and_hold_at_time(now)
                    .set_target_at_time(volume * level, now, VOLUME_TIME_CONSTANT);
            }
        };
        if let Some(drone) = &self.tanpura {
            retune(drone.id, drone.level);
        }
        if let Some(id) = self.tabla.as_ref().and_then(|s| s.loop_voice) {
            retune(id, 1.0);
        }
        debug!("Master volume set to {:.2}", volume);
    }

    // Instruments

    pub fn start_tanpura(&mut self, base_freq: f32, string: TanpuraString) -> Result<(), SynthError> {
        let graph = self.graph_handle()?;
        let jivari = match self.runtime.as_ref() {
            Some(rt) if self.config.jivari => Some(Arc::clone(&rt.jivari)),
            _ => None,
        };
        let buffer = match string {
            TanpuraString::Sa => self.samples.tanpura_sa.as_ref(),
            TanpuraString::Pa => self.samples.tanpura_pa.as_ref(),
        };
        let source = InstrumentSource::from_buffer(buffer);
        let settings = DroneSettings {
            reference_hz: self.config.tanpura_reference_hz,
            jivari: jivari.as_ref(),
        };

        let now = graph::lock(&graph).current_time();
        let drone = tanpura::drone(string, base_freq, source, now, self.volume(), &settings)?;

        self.stop_instrument(Instrument::Tanpura);
        let sampled = drone.voice.buffer().is_some();
        let id = graph::lock(&graph).add(drone.voice);
        self.tanpura = Some(ActiveDrone { id, level: drone.level, string, frequency: base_freq });
        debug!(
            "Tanpura {} at {:.2} Hz ({})",
            string,
            base_freq,
            if sampled { "sample" } else { "synthesized" }
        );
        Ok(())
    }

    /// Strike a single bol now.
    pub fn play_bol(&mut self, bol: Bol) -> Result<(), SynthError> {
        let volume = self.volume();
        let rt = self.runtime()?;
        let mut graph = graph::lock(rt.context.graph());
        let now = graph.current_time();
        let sample_rate = graph.sample_rate();
        for voice in tabla::strike(bol, now, volume, &rt.noise, sample_rate) {
            graph.add(voice);
        }
        Ok(())
    }

    /// Start a taal cycle. `on_beat` receives the beat index on the scheduler thread.
    pub fn start_tabla<F>(&mut self, taal: &Taal, tempo: f32, use_samples: bool, mut on_beat: F) -> Result<(), SynthError>
    where
        F: FnMut(usize) + Send + 'static,
    {
        let interval = beat_interval(tempo)?;
        if taal.is_empty() {
            return Err(SynthError::ParseError(format!("Taal '{}' has no beats", taal.name())));
        }

        let graph = self.graph_handle()?;
        let noise = self.runtime()?.noise.clone();

        let loop_buffer = if use_samples { self.samples.tabla_loop(&taal.loop_key()) } else { None };
        let loop_voice = match InstrumentSource::from_buffer(loop_buffer) {
            InstrumentSource::Sample(data) => {
                let rate = tempo / self.config.tabla_reference_bpm;
                let now = graph::lock(&graph).current_time();
                Some(
                    Voice::new(Source::Buffer(BufferPlayer::new(data, rate, true)), now)
                        .with_gain(Param::new(self.volume())),
                )
            }
            InstrumentSource::Synthesized => None,
        };
        let synthesize = loop_voice.is_none();
        let cycle = taal.clone();
        let volume = self.volume.clone();
        let tick_graph = Arc::clone(&graph);

        self.stop_instrument(Instrument::Tabla);
        let loop_voice = loop_voice.map(|voice| graph::lock(&graph).add(voice));

        let scheduler = Scheduler::start(interval, move |n| {
            let beat = (n % cycle.len() as u64) as usize;
            let bol = cycle.bol_at(beat);
            if synthesize && !bol.is_rest() {
                let mut g = graph::lock(&tick_graph);
                let now = g.current_time();
                let sample_rate = g.sample_rate();
                for voice in tabla::strike(bol, now, volume.get(), &noise, sample_rate) {
                    g.add(voice);
                }
            }
            on_beat(beat);
        });

        let scheduler = match scheduler {
            Ok(scheduler) => scheduler,
            Err(e) => {
                if let Some(id) = loop_voice {
                    graph::lock(&graph).remove(id);
                }
                return Err(e);
            }
        };

        debug!(
            "Tabla {} at {} BPM ({})",
            taal.name(),
            tempo,
            if synthesize { "synthesized" } else { "loop" }
        );
        self.tabla = Some(TablaSession {
            scheduler,
            loop_voice,
            taal: taal.name().to_string(),
            tempo,
        });
        Ok(())
    }

    /// Press a harmonium key. Notes overlap freely and end on their own.
    pub fn play_harmonium_key(&mut self, note: &str, freq: f32, use_samples: bool) -> Result<VoiceId, SynthError> {
        let graph = self.graph_handle()?;
        let buffer = if use_samples { self.samples.harmonium_note(note) } else { None };
        let source = InstrumentSource::from_buffer(buffer);

        let mut g = graph::lock(&graph);
        let voice = harmonium::key_voice(freq, source, g.current_time(), self.volume(), g.sample_rate())?;
        Ok(g.add(voice))
    }

    /// Fetch, decode and play a file once at the master volume.
    pub fn play_file(&mut self, url: &str) -> Result<Option<VoiceId>, SynthError> {
        let graph = self.graph_handle()?;
        let Some(data) = assets::fetch_and_decode(self.fetcher.as_ref(), url) else {
            return Ok(None);
        };
        let mut g = graph::lock(&graph);
        let now = g.current_time();
        let voice = Voice::new(Source::Buffer(BufferPlayer::new(data, 1.0, false)), now)
            .with_gain(Param::new(self.volume()));
        Ok(Some(g.add(voice)))
    }

    pub fn stop_instrument(&mut self, kind: Instrument) {
        match kind {
            Instrument::Tanpura => {
                if let Some(drone) = self.tanpura.take() {
                    self.remove_voice(drone.id);
                    debug!("Tanpura {} at {:.2} Hz stopped", drone.string, drone.frequency);
                }
            }
            Instrument::Tabla => {
                if let Some(mut session) = self.tabla.take() {
                    // No tick may run once the loop is gone
                    session.scheduler.cancel();
                    if let Some(id) = session.loop_voice {
                        self.remove_voice(id);
                    }
                    debug!("Tabla {} at {} BPM stopped", session.taal, session.tempo);
                }
            }
            Instrument::Harmonium => {}
        }
    }

    pub fn stop_all(&mut self) {
        self.stop_instrument(Instrument::Tabla);
        self.stop_instrument(Instrument::Tanpura);
    }

    pub fn is_active(&self, kind: Instrument) -> bool {
        match kind {
            Instrument::Tanpura => self.tanpura.is_some(),
            Instrument::Tabla => self.tabla.is_some(),
            Instrument::Harmonium => false,
        }
    }

    fn remove_voice(&self, id: VoiceId) {
        if let Some(rt) = self.runtime.as_ref() {
            graph::lock(rt.context.graph()).remove(id);
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.stop_all();
    }
}
