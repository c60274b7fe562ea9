//! WAV helpers shared by the daemon and its client.

use std::path::Path;

use crate::speech::SAMPLE_RATE;

/// Write mono f32 samples as 16-bit PCM at the service rate.
pub fn write_wav_file(path: &Path, samples: &[f32]) -> Result<(), hound::Error> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)?;
    for sample in samples {
        let sample_i16 = (sample * i16::MAX as f32) as i16;
        writer.write_sample(sample_i16)?;
    }
    writer.finalize()
}

/// Read a WAV file into mono f32 samples at the service rate. Multi-channel
/// audio is averaged down; other sample rates are linearly resampled.
pub fn read_wav_file(path: &Path) -> Result<Vec<f32>, String> {
    let mut reader = hound::WavReader::open(path).map_err(|e| e.to_string())?;
    let spec = reader.spec();

    let interleaved: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
        (hound::SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .map(|s| s.map(|sample| sample as f32 / i16::MAX as f32))
            .collect::<Result<_, _>>()
            .map_err(|e| e.to_string())?,
        (hound::SampleFormat::Float, 32) => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(|e| e.to_string())?,
        (_, bits) => {
            return Err(format!(
                "unsupported WAV format ({} bits); expected 16-bit PCM or 32-bit float",
                bits
            ))
        }
    };

    let channels = spec.channels.max(1) as usize;
    let mono = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks(channels)
            .map(|frame| frame.iter().copied().sum::<f32>() / frame.len() as f32)
            .collect()
    };

    if spec.sample_rate == SAMPLE_RATE {
        Ok(mono)
    } else {
        Ok(resample_linear(&mono, spec.sample_rate, SAMPLE_RATE))
    }
}

fn resample_linear(samples: &[f32], in_rate: u32, out_rate: u32) -> Vec<f32> {
    if samples.is_empty() || in_rate == 0 || out_rate == 0 || in_rate == out_rate {
        return samples.to_vec();
    }

    let ratio = out_rate as f64 / in_rate as f64;
    let out_len = ((samples.len() as f64) * ratio).round().max(1.0) as usize;
    let mut out = Vec::with_capacity(out_len);

    for idx in 0..out_len {
        let src = idx as f64 / ratio;
        let left = src.floor() as usize;
        let right = (left + 1).min(samples.len() - 1);
        let frac = (src - left as f64) as f32;
        out.push(samples[left] + (samples[right] - samples[left]) * frac);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_then_read_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("probe.wav");
        let samples = vec![0.0_f32, 0.25, -0.5, 0.9];

        write_wav_file(&path, &samples).unwrap();
        let loaded = read_wav_file(&path).unwrap();

        assert_eq!(loaded.len(), samples.len());
        for (got, want) in loaded.iter().zip(&samples) {
            assert!((got - want).abs() < 1e-3, "got {} want {}", got, want);
        }
    }

    #[test]
    fn test_stereo_is_averaged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: SAMPLE_RATE,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for (left, right) in [(8000_i16, 16000_i16), (-4000, 4000)] {
            writer.write_sample(left).unwrap();
            writer.write_sample(right).unwrap();
        }
        writer.finalize().unwrap();

        let loaded = read_wav_file(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        let expected = (8000.0 + 16000.0) / 2.0 / i16::MAX as f32;
        assert!((loaded[0] - expected).abs() < 1e-3);
        assert!(loaded[1].abs() < 1e-3);
    }

    #[test]
    fn test_resample_halves_length() {
        let samples: Vec<f32> = (0..3200).map(|i| (i as f32 / 3200.0).sin()).collect();
        let out = resample_linear(&samples, 2 * SAMPLE_RATE, SAMPLE_RATE);
        assert_eq!(out.len(), samples.len() / 2);
    }

    #[test]
    fn test_resample_same_rate_is_identity() {
        let samples = vec![0.1_f32, 0.2, 0.3];
        assert_eq!(resample_linear(&samples, SAMPLE_RATE, SAMPLE_RATE), samples);
    }
}
