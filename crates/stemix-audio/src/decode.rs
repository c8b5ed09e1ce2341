//! Audio decoding using symphonia.

use std::io::Cursor;

use bytes::Bytes;
use stemix_core::{AudioFormat, Error, Result};
use symphonia::core::{
    audio::SampleBuffer,
    codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL},
    errors::Error as SymphoniaError,
    formats::{FormatOptions, FormatReader},
    io::{MediaSourceStream, MediaSourceStreamOptions},
    meta::MetadataOptions,
    probe::Hint,
};
use tracing::{debug, warn};

use crate::pcm::AudioBuffer;

/// Audio decoder wrapping symphonia.
pub struct AudioDecoder {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    sample_rate: u32,
    channels: u16,
}

impl AudioDecoder {
    /// Create a new decoder from an encoded byte buffer.
    pub fn from_bytes(data: Bytes, format_hint: AudioFormat) -> Result<Self> {
        let cursor = Cursor::new(data);
        let mss = MediaSourceStream::new(Box::new(cursor), MediaSourceStreamOptions::default());

        let mut hint = Hint::new();
        if let Some(ext) = format_hint.extension() {
            hint.with_extension(ext);
        }

        let format_opts = FormatOptions {
            enable_gapless: true,
            ..Default::default()
        };
        let metadata_opts = MetadataOptions::default();

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &format_opts, &metadata_opts)
            .map_err(|e| Error::AudioDecode(format!("Failed to probe format: {e}")))?;

        let format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| Error::AudioDecode("No audio tracks found".to_string()))?;

        let track_id = track.id;
        let sample_rate = track.codec_params.sample_rate.unwrap_or(48000);
        #[allow(clippy::cast_possible_truncation)]
        let channels = track.codec_params.channels.map_or(2, |c| c.count() as u16);

        debug!(
            "Audio track: id={}, sample_rate={}, channels={}",
            track_id, sample_rate, channels
        );

        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| Error::AudioDecode(format!("Failed to create decoder: {e}")))?;

        Ok(Self {
            format,
            decoder,
            track_id,
            sample_rate,
            channels,
        })
    }

    pub const fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub const fn channels(&self) -> u16 {
        self.channels
    }

    /// Decode the next packet into interleaved f32 samples.
    ///
    /// Returns `Ok(None)` at the end of the stream. The reported sample rate
    /// and channel count follow the decoded signal, which for some codecs is
    /// only known after the first packet.
    pub fn decode_next(&mut self) -> Result<Option<Vec<f32>>> {
        loop {
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return Ok(None);
                }
                Err(SymphoniaError::ResetRequired) => return Ok(None),
                Err(e) => {
                    return Err(Error::AudioDecode(format!("Failed to read packet: {e}")));
                }
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            match self.decoder.decode(&packet) {
                Ok(decoded) => {
                    let spec = *decoded.spec();
                    self.sample_rate = spec.rate;
                    #[allow(clippy::cast_possible_truncation)]
                    {
                        self.channels = spec.channels.count() as u16;
                    }

                    let mut samples = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                    samples.copy_interleaved_ref(decoded);
                    return Ok(Some(samples.samples().to_vec()));
                }
                Err(SymphoniaError::DecodeError(e)) => {
                    // Corrupt frames are skipped, the rest of the stem is still usable
                    warn!("Decode error (skipping): {e}");
                }
                Err(e) => {
                    return Err(Error::AudioDecode(format!("Decode failed: {e}")));
                }
            }
        }
    }

    /// Decode the whole stream into one buffer.
    pub fn decode_all(mut self) -> Result<AudioBuffer> {
        let mut samples = Vec::new();
        while let Some(chunk) = self.decode_next()? {
            samples.extend_from_slice(&chunk);
        }

        if samples.is_empty() {
            return Err(Error::AudioDecode("Stream contains no audio".to_string()));
        }

        AudioBuffer::new(self.sample_rate, self.channels, samples)
    }
}

/// Decode an encoded stem payload into PCM.
pub fn decode_buffer(data: Bytes, format_hint: AudioFormat) -> Result<AudioBuffer> {
    let size = data.len();
    let buffer = AudioDecoder::from_bytes(data, format_hint)?.decode_all()?;
    debug!(
        "Decoded {} bytes into {:.2}s ({} Hz, {} channels)",
        size,
        buffer.duration(),
        buffer.sample_rate(),
        buffer.channels()
    );
    Ok(buffer)
}
