//! Sample rate conversion using rubato.

use rubato::{FftFixedIn, Resampler};
use stemix_core::{Error, Result};
use tracing::debug;

use crate::pcm::AudioBuffer;

/// Input frames handed to the FFT resampler per call.
const CHUNK_SIZE: usize = 1024;

/// FFT sub-chunks per chunk.
const SUB_CHUNKS: usize = 2;

/// Convert a whole decoded stem to `output_rate`.
///
/// The resampler's latency is trimmed and the result is cut to the exact
/// expected length, so stems of equal duration stay sample-aligned.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn resample(buffer: &AudioBuffer, output_rate: u32) -> Result<AudioBuffer> {
    let input_rate = buffer.sample_rate();
    if input_rate == output_rate {
        return Ok(buffer.clone());
    }

    let channels = usize::from(buffer.channels());
    let mut resampler = FftFixedIn::<f32>::new(
        input_rate as usize,
        output_rate as usize,
        CHUNK_SIZE,
        SUB_CHUNKS,
        channels,
    )
    .map_err(|e| Error::AudioOutput(format!("Failed to create resampler: {e}")))?;

    let input = deinterleave(buffer.samples(), channels);
    let expected =
        (buffer.frames() as f64 * f64::from(output_rate) / f64::from(input_rate)).round() as usize;
    let delay = resampler.output_delay();

    let mut output: Vec<Vec<f32>> = vec![Vec::with_capacity(expected + delay + CHUNK_SIZE); channels];
    let mut read_pos = 0;

    // Zero padding past the end flushes the resampler's internal delay
    while output[0].len() < expected + delay {
        let needed = resampler.input_frames_next();
        let chunk: Vec<Vec<f32>> = input
            .iter()
            .map(|plane| {
                let mut chunk = Vec::with_capacity(needed);
                if read_pos < plane.len() {
                    let end = (read_pos + needed).min(plane.len());
                    chunk.extend_from_slice(&plane[read_pos..end]);
                }
                chunk.resize(needed, 0.0);
                chunk
            })
            .collect();
        read_pos += needed;

        let resampled = resampler
            .process(&chunk, None)
            .map_err(|e| Error::AudioOutput(format!("Resample failed: {e}")))?;
        for (plane, block) in output.iter_mut().zip(resampled) {
            plane.extend_from_slice(&block);
        }
    }

    debug!(
        "Resampled {} frames at {}Hz to {} frames at {}Hz",
        buffer.frames(),
        input_rate,
        expected,
        output_rate
    );

    #[allow(clippy::cast_possible_truncation)]
    AudioBuffer::new(
        output_rate,
        channels as u16,
        interleave(&output, delay, expected),
    )
}

fn deinterleave(samples: &[f32], channels: usize) -> Vec<Vec<f32>> {
    let frames = samples.len() / channels;
    let mut planes = vec![Vec::with_capacity(frames); channels];
    for frame in samples.chunks_exact(channels) {
        for (plane, sample) in planes.iter_mut().zip(frame) {
            plane.push(*sample);
        }
    }
    planes
}

fn interleave(planes: &[Vec<f32>], skip: usize, frames: usize) -> Vec<f32> {
    let mut output = Vec::with_capacity(frames * planes.len());
    for frame in skip..skip + frames {
        for plane in planes {
            output.push(plane.get(frame).copied().unwrap_or(0.0));
        }
    }
    output
}
