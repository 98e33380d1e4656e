use crate::error::AssessmentFailure;
use std::io::Cursor;

/// Header facts about an uploaded WAV recording
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavInfo {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    pub duration_ms: u64,
}

/// Read the WAV header without decoding samples.
pub fn inspect_wav(audio: &[u8]) -> Result<WavInfo, AssessmentFailure> {
    if audio.is_empty() {
        return Err(AssessmentFailure::InvalidAudio("empty recording".to_string()));
    }

    let reader = hound::WavReader::new(Cursor::new(audio))
        .map_err(|e| AssessmentFailure::InvalidAudio(format!("not a readable WAV file: {e}")))?;
    let spec = reader.spec();

    if spec.sample_rate == 0 {
        return Err(AssessmentFailure::InvalidAudio("sample rate is zero".to_string()));
    }

    // `duration()` is frames per channel
    let frames = u64::from(reader.duration());
    let duration_ms = frames.saturating_mul(1000) / u64::from(spec.sample_rate);

    Ok(WavInfo {
        sample_rate: spec.sample_rate,
        channels: spec.channels,
        bits_per_sample: spec.bits_per_sample,
        duration_ms,
    })
}

#[cfg(test)]
pub(crate) fn silent_wav(sample_rate: u32, millis: u32) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for _ in 0..(sample_rate / 1000 * millis) {
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}
