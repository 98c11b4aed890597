use std::thread;
use std::time::Duration;

use cpal::{
    FromSample, SizedSample,
    traits::{DeviceTrait, HostTrait, StreamTrait},
};
use stepline_transport::{AudioDevice, DEFAULT_CHANNELS, SampleFrame};

/// Seconds of audio buffered between the mixer and the sound card.
const BUFFER_SECONDS: f32 = 0.25;
const MAX_WAIT: Duration = Duration::from_secs(1);
const WAIT_STEP: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// The callback ran out of mixed audio and padded this many frames
    /// with silence.
    Underrun(usize),
}

/// Keeps the output stream alive. The stream is tied to the thread that
/// opened it, so this handle stays with the caller while the paired
/// [`OutputDevice`] can move into the mixer.
pub struct AudioEngineHandle {
    pub status: rtrb::Consumer<Status>,
    pub sample_rate: u32,
    _stream: cpal::Stream,
}

/// Mixer-side end of the sound card connection.
pub struct OutputDevice {
    samples: rtrb::Producer<f32>,
}

impl OutputDevice {
    pub fn new(samples: rtrb::Producer<f32>) -> Self {
        Self { samples }
    }

    /// Buffer for `sample_rate` with a matching output device.
    pub fn with_ring(sample_rate: u32) -> (Self, rtrb::Consumer<f32>) {
        let capacity = (sample_rate as f32 * BUFFER_SECONDS) as usize * DEFAULT_CHANNELS;
        let (producer, consumer) = rtrb::RingBuffer::new(capacity.max(DEFAULT_CHANNELS));
        (Self::new(producer), consumer)
    }
}

impl AudioDevice for OutputDevice {
    fn name(&self) -> &str {
        "output"
    }

    /// Blocks until the callback has made room, which paces the mixer to
    /// the sound card. Gives up after a second so a stalled stream cannot
    /// hang the caller.
    fn write_frames(&mut self, frames: &[SampleFrame]) {
        let mut waited = Duration::ZERO;
        let mut pending = frames;

        while !pending.is_empty() {
            let room = self.samples.slots() / DEFAULT_CHANNELS;
            if room == 0 {
                if waited >= MAX_WAIT || self.samples.is_abandoned() {
                    log::warn!("output stalled, dropping {} frames", pending.len());
                    return;
                }
                thread::sleep(WAIT_STEP);
                waited += WAIT_STEP;
                continue;
            }

            let count = room.min(pending.len());
            for frame in &pending[..count] {
                for &sample in frame {
                    // room was checked above, a failed push cannot happen
                    let _ = self.samples.push(sample);
                }
            }
            pending = &pending[count..];
        }
    }
}

/// Open the default output device. Returns the stream handle and the
/// device the mixer should write into.
pub fn start() -> anyhow::Result<(AudioEngineHandle, OutputDevice)> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| anyhow::anyhow!("no output device found"))?;

    let config = device.default_output_config()?;
    let sample_rate = config.sample_rate().0;

    let (output, consumer) = OutputDevice::with_ring(sample_rate);
    let (status_tx, status_rx) = rtrb::RingBuffer::<Status>::new(64);

    let stream = match config.sample_format() {
        cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config.into(), consumer, status_tx)?,
        cpal::SampleFormat::I16 => build_stream::<i16>(&device, &config.into(), consumer, status_tx)?,
        sample_format => anyhow::bail!("unsupported sample format '{sample_format}'"),
    };

    stream.play()?;
    log::info!("audio output started at {sample_rate} Hz");

    Ok((
        AudioEngineHandle {
            status: status_rx,
            sample_rate,
            _stream: stream,
        },
        output,
    ))
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut samples: rtrb::Consumer<f32>,
    mut status_tx: rtrb::Producer<Status>,
) -> anyhow::Result<cpal::Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let output_channels = config.channels as usize;

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            let missing = fill_output(data, output_channels, &mut samples);
            if missing > 0 {
                let _ = status_tx.push(Status::Underrun(missing));
            }
        },
        |err| log::warn!("stream error: {err}"),
        None,
    )?;

    Ok(stream)
}

/// Copy stereo frames from the ring into an interleaved device buffer with
/// `output_channels` channels. Returns the number of frames padded with
/// silence.
fn fill_output<T>(data: &mut [T], output_channels: usize, samples: &mut rtrb::Consumer<f32>) -> usize
where
    T: SizedSample + FromSample<f32>,
{
    let mut missing = 0;
    for frame in data.chunks_mut(output_channels.max(1)) {
        if samples.slots() < DEFAULT_CHANNELS {
            frame.fill(T::from_sample(0.0));
            missing += 1;
            continue;
        }

        let mut bus = [0.0f32; DEFAULT_CHANNELS];
        for sample in &mut bus {
            *sample = samples.pop().unwrap_or(0.0);
        }

        if frame.len() == 1 {
            frame[0] = T::from_sample((bus[0] + bus[1]) * 0.5);
        } else {
            for (ch, out) in frame.iter_mut().enumerate() {
                let value = if ch < DEFAULT_CHANNELS { bus[ch] } else { 0.0 };
                *out = T::from_sample(value);
            }
        }
    }
    missing
}
