//! Concurrent, all-or-nothing loading of a stem set.

use std::sync::Arc;

use stemix_core::{AudioFormat, Error, Result, StemSet, StemSource};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::decode::decode_buffer;
use crate::pcm::AudioBuffer;
use crate::resample::resample;

/// One decoded stem, ready to be wired into the graph.
#[derive(Debug, Clone)]
pub struct LoadedStem {
    pub name: String,
    pub buffer: AudioBuffer,
}

/// Every stem of a set, in set order.
#[derive(Debug, Clone)]
pub struct LoadedStems {
    pub stems: Vec<LoadedStem>,
    /// Length of the longest stem in seconds.
    pub duration: f64,
}

/// Fetches and decodes stems in parallel.
#[derive(Clone)]
pub struct TrackLoader {
    source: Arc<dyn StemSource>,
    output_rate: u32,
    length_tolerance: f64,
}

impl TrackLoader {
    pub fn new(source: Arc<dyn StemSource>, output_rate: u32, length_tolerance: f64) -> Self {
        Self {
            source,
            output_rate,
            length_tolerance,
        }
    }

    pub const fn output_rate(&self) -> u32 {
        self.output_rate
    }

    /// Load every stem of `stems`.
    ///
    /// Stems are fetched and decoded concurrently. The first failure aborts
    /// the stems still in flight and is returned wrapped with the failing
    /// stem's name.
    pub async fn load(&self, stems: &StemSet) -> Result<LoadedStems> {
        if stems.is_empty() {
            return Err(Error::InvalidArgument("stem set is empty".to_string()));
        }

        info!("Loading {} stems", stems.len());
        let mut tasks = JoinSet::new();
        for (index, (name, locator)) in stems.iter().enumerate() {
            let source = Arc::clone(&self.source);
            let name = name.to_string();
            let locator = locator.to_string();
            let output_rate = self.output_rate;
            tasks.spawn(async move {
                let buffer = load_stem(source.as_ref(), &name, &locator, output_rate)
                    .await
                    .map_err(|e| Error::for_stem(&name, e))?;
                Ok::<_, Error>((index, name, buffer))
            });
        }

        let mut slots: Vec<Option<LoadedStem>> = (0..stems.len()).map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            let (index, name, buffer) = joined.map_err(|e| {
                if e.is_cancelled() {
                    Error::Cancelled
                } else {
                    Error::Internal(format!("Stem task failed: {e}"))
                }
            })??;
            slots[index] = Some(LoadedStem { name, buffer });
        }

        let stems: Vec<LoadedStem> = slots.into_iter().flatten().collect();
        let duration = self.check_lengths(&stems);
        Ok(LoadedStems { stems, duration })
    }

    /// Longest stem length, warning when stems disagree.
    fn check_lengths(&self, stems: &[LoadedStem]) -> f64 {
        let lengths = stems.iter().map(|s| s.buffer.duration());
        let longest = lengths.clone().fold(0.0, f64::max);
        let shortest = lengths.fold(f64::INFINITY, f64::min);

        if longest - shortest > self.length_tolerance {
            warn!(
                "Stem lengths differ by {:.3}s ({:.3}s to {:.3}s), shorter stems end in silence",
                longest - shortest,
                shortest,
                longest
            );
        }
        longest
    }
}

async fn load_stem(
    source: &dyn StemSource,
    name: &str,
    locator: &str,
    output_rate: u32,
) -> Result<AudioBuffer> {
    debug!("Fetching stem '{name}' from {locator}");
    let payload = source.fetch(locator).await?;

    let format = payload
        .mime_type
        .as_deref()
        .map(AudioFormat::from_mime)
        .filter(|f| *f != AudioFormat::Unknown)
        .unwrap_or_else(|| AudioFormat::from_locator(locator));

    // Decoding is CPU-bound
    let buffer = tokio::task::spawn_blocking(move || {
        let decoded = decode_buffer(payload.data, format)?;
        resample(&decoded, output_rate)
    })
    .await
    .map_err(|e| Error::Internal(format!("Decode task failed: {e}")))??;

    debug!("Stem '{name}' ready: {:.2}s", buffer.duration());
    Ok(buffer)
}
