use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SizedSample, Stream, StreamConfig};
use tracing::{debug, error, info};

use crate::config::{EngineConfig, OutputMode};
use crate::error::SynthError;
use crate::graph::{self, Graph};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    Running,
    Suspended,
}

/// Owns the render graph and, in device mode, the cpal stream pulling from it.
pub struct AudioContext {
    graph: Arc<Mutex<Graph>>,
    stream: Option<Stream>,
    state: ContextState,
}

impl AudioContext {
    pub fn open(config: &EngineConfig) -> Result<Self, SynthError> {
        match config.output {
            OutputMode::Device => Self::open_device(),
            OutputMode::Offline => Ok(Self::offline(config.sample_rate)),
        }
    }

    /// A context with no device. Time only advances through `render`.
    pub fn offline(sample_rate: u32) -> Self {
        debug!("Offline audio context at {} Hz", sample_rate);
        AudioContext {
            graph: Arc::new(Mutex::new(Graph::new(sample_rate as f32))),
            stream: None,
            state: ContextState::Running,
        }
    }

    fn open_device() -> Result<Self, SynthError> {
        let host = cpal::default_host();
        let device = host.default_output_device()
            .ok_or_else(|| SynthError::AudioError("No output device found".to_string()))?;
        let supported = device.default_output_config()
            .map_err(|e| SynthError::AudioError(e.to_string()))?;

        let sample_format = supported.sample_format();
        let config: StreamConfig = supported.into();
        let sample_rate = config.sample_rate.0;
        let channels = config.channels as usize;
        let graph = Arc::new(Mutex::new(Graph::new(sample_rate as f32)));

        let stream = match sample_format {
            cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config, Arc::clone(&graph)),
            cpal::SampleFormat::I16 => build_stream::<i16>(&device, &config, Arc::clone(&graph)),
            cpal::SampleFormat::U16 => build_stream::<u16>(&device, &config, Arc::clone(&graph)),
            other => {
                return Err(SynthError::AudioError(format!("Unsupported sample format: {other:?}")));
            }
        }?;

        stream.play().map_err(|e| SynthError::AudioError(e.to_string()))?;
        info!("Audio stream started at {} Hz, {} channels", sample_rate, channels);

        Ok(AudioContext {
            graph,
            stream: Some(stream),
            state: ContextState::Running,
        })
    }

    pub fn graph(&self) -> &Arc<Mutex<Graph>> {
        &self.graph
    }

    pub fn sample_rate(&self) -> f32 {
        graph::lock(&self.graph).sample_rate()
    }

    pub fn current_time(&self) -> f64 {
        graph::lock(&self.graph).current_time()
    }

    pub fn is_offline(&self) -> bool {
        self.stream.is_none()
    }

    pub fn state(&self) -> ContextState {
        self.state
    }

    pub fn resume(&mut self) -> Result<(), SynthError> {
        if self.state == ContextState::Running {
            return Ok(());
        }
        if let Some(stream) = &self.stream {
            stream.play().map_err(|e| SynthError::AudioError(e.to_string()))?;
        }
        self.state = ContextState::Running;
        debug!("Audio context resumed");
        Ok(())
    }

    pub fn suspend(&mut self) -> Result<(), SynthError> {
        if self.state == ContextState::Suspended {
            return Ok(());
        }
        if let Some(stream) = &self.stream {
            stream.pause().map_err(|e| SynthError::AudioError(e.to_string()))?;
        }
        self.state = ContextState::Suspended;
        debug!("Audio context suspended");
        Ok(())
    }

    /// Pull mono frames from an offline context. A suspended context renders silence
    /// without advancing the clock.
    pub fn render(&self, out: &mut [f32]) -> Result<(), SynthError> {
        if !self.is_offline() {
            return Err(SynthError::AudioError("Cannot pull audio from a device context".to_string()));
        }
        if self.state == ContextState::Suspended {
            out.fill(0.0);
            return Ok(());
        }
        graph::lock(&self.graph).render(out, 1);
        Ok(())
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    graph: Arc<Mutex<Graph>>,
) -> Result<Stream, SynthError>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = config.channels as usize;
    let mut scratch: Vec<f32> = Vec::new();

    device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            scratch.resize(data.len(), 0.0);
            graph::lock(&graph).render(&mut scratch, channels);
            for (out, sample) in data.iter_mut().zip(scratch.iter()) {
                *out = <T as Sample>::from_sample(*sample);
            }
        },
        |err| error!("Audio stream error: {}", err),
        None,
    )
    .map_err(|e| SynthError::AudioError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Source, Voice};
    use crate::waveform::{Oscillator, WaveformType};

    #[test]
    fn offline_clock_advances_only_when_rendering() {
        let ctx = AudioContext::offline(1000);
        assert!(ctx.is_offline());
        assert_eq!(ctx.current_time(), 0.0);
        let mut out = vec![0.0; 500];
        ctx.render(&mut out).expect("offline render");
        assert!((ctx.current_time() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn suspended_context_renders_silence() {
        let mut ctx = AudioContext::offline(1000);
        graph::lock(ctx.graph())
            .add(Voice::new(Source::Oscillators(vec![Oscillator::new(WaveformType::Square, 10.0)]), 0.0));
        ctx.suspend().expect("suspend");
        assert_eq!(ctx.state(), ContextState::Suspended);

        let mut out = vec![1.0; 100];
        ctx.render(&mut out).expect("render");
        assert!(out.iter().all(|s| *s == 0.0));
        assert_eq!(ctx.current_time(), 0.0);

        ctx.resume().expect("resume");
        ctx.render(&mut out).expect("render");
        assert!(out.iter().any(|s| *s != 0.0));
    }
}
