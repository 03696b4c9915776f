// AudioBuffer - raw little-endian PCM captured for one chant
//
// Samples are kept as the bytes the microphone produced, together with the
// sample rate and width needed to interpret them.

use std::path::Path;

use anyhow::{anyhow, Context, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    pub data: Vec<u8>,
    pub sample_rate: u32,
    /// Bytes per sample (1-4)
    pub sample_width: u16,
}

impl AudioBuffer {
    pub fn new(data: Vec<u8>, sample_rate: u32, sample_width: u16) -> Self {
        Self {
            data,
            sample_rate,
            sample_width,
        }
    }

    pub fn from_i16_samples(samples: &[i16], sample_rate: u32) -> Self {
        let data = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        Self::new(data, sample_rate, 2)
    }

    /// Load a mono WAV file, keeping integer samples at their native width.
    ///
    /// Float files are rescaled to 16-bit.
    pub fn from_wav(path: &Path) -> Result<Self> {
        let mut reader =
            hound::WavReader::open(path).with_context(|| format!("opening {}", path.display()))?;
        let spec = reader.spec();
        if spec.channels != 1 {
            return Err(anyhow!(
                "Recording {} must be mono (found {} channels)",
                path.display(),
                spec.channels
            ));
        }

        match spec.sample_format {
            hound::SampleFormat::Float => {
                let samples = reader
                    .samples::<f32>()
                    .map(|sample| {
                        sample
                            .map(|v| (v.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
                            .map_err(|err| anyhow!(err))
                    })
                    .collect::<Result<Vec<i16>>>()?;
                Ok(Self::from_i16_samples(&samples, spec.sample_rate))
            }
            hound::SampleFormat::Int => {
                let width = match spec.bits_per_sample {
                    8 => 1usize,
                    16 => 2,
                    24 => 3,
                    32 => 4,
                    other => {
                        return Err(anyhow!(
                            "Unsupported bits per sample {} in {}",
                            other,
                            path.display()
                        ))
                    }
                };
                let mut data = Vec::with_capacity(reader.len() as usize * width);
                for sample in reader.samples::<i32>() {
                    let value = sample.map_err(|err| anyhow!(err))?;
                    data.extend_from_slice(&value.to_le_bytes()[..width]);
                }
                Ok(Self::new(data, spec.sample_rate, width as u16))
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Seconds of audio, or `None` when rate or width cannot describe PCM.
    pub fn duration_secs(&self) -> Option<f64> {
        if self.sample_rate == 0 || !(1..=4).contains(&self.sample_width) {
            return None;
        }
        Some(self.data.len() as f64 / (self.sample_rate as f64 * self.sample_width as f64))
    }

    /// Signed samples decoded from little-endian bytes.
    ///
    /// A trailing partial sample is ignored; unsupported widths yield nothing.
    pub fn samples(&self) -> impl Iterator<Item = i32> + '_ {
        let width = self.sample_width as usize;
        let valid = (1..=4).contains(&width);
        let chunk = if valid { width } else { 1 };
        self.data
            .chunks_exact(chunk)
            .take_while(move |_| valid)
            .map(move |bytes| decode_sample(bytes))
    }
}

fn decode_sample(bytes: &[u8]) -> i32 {
    match bytes.len() {
        1 => bytes[0] as i8 as i32,
        2 => i16::from_le_bytes([bytes[0], bytes[1]]) as i32,
        3 => {
            // sign-extend 24-bit
            let raw = i32::from_le_bytes([0, bytes[0], bytes[1], bytes[2]]);
            raw >> 8
        }
        _ => i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn decodes_each_width() {
        assert_eq!(decode_sample(&[0xff]), -1);
        assert_eq!(decode_sample(&(-300i16).to_le_bytes()), -300);
        assert_eq!(decode_sample(&[0x00, 0x00, 0x80]), -8_388_608);
        assert_eq!(decode_sample(&[0x01, 0x00, 0x00]), 1);
        assert_eq!(decode_sample(&(-70_000i32).to_le_bytes()), -70_000);
    }

    #[test]
    fn unsupported_width_has_no_samples_or_duration() {
        let buffer = AudioBuffer::new(vec![1, 2, 3, 4, 5, 6], 8000, 6);
        assert_eq!(buffer.samples().count(), 0);
        assert_eq!(buffer.duration_secs(), None);
    }

    #[test]
    fn partial_trailing_sample_is_ignored() {
        let buffer = AudioBuffer::new(vec![1, 0, 2, 0, 9], 8000, 2);
        assert_eq!(buffer.samples().collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn reads_mono_wav() {
        let path = env::temp_dir().join(format!("wellness_buffer_{}.wav", std::process::id()));
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 16000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for i in 0..1600 {
            writer
                .write_sample(if i % 2 == 0 { 500i16 } else { -500 })
                .unwrap();
        }
        writer.finalize().unwrap();

        let buffer = AudioBuffer::from_wav(&path).unwrap();
        assert_eq!(buffer.sample_rate, 16000);
        assert_eq!(buffer.sample_width, 2);
        assert_eq!(buffer.duration_secs(), Some(0.1));
        assert_eq!(buffer.samples().take(2).collect::<Vec<_>>(), vec![500, -500]);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn rejects_stereo_wav() {
        let path = env::temp_dir().join(format!("wellness_stereo_{}.wav", std::process::id()));
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        writer.write_sample(0i16).unwrap();
        writer.write_sample(0i16).unwrap();
        writer.finalize().unwrap();

        assert!(AudioBuffer::from_wav(&path).is_err());
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(AudioBuffer::from_wav(Path::new("/nonexistent/chant.wav")).is_err());
    }
}
