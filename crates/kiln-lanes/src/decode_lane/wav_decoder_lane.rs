// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Implements a decoder lane for `.wav` audio files.

use super::{DecoderLane, LaneError};
use kiln_core::asset::{DecodedResource, DecodedSound};
use std::io::Cursor;

/// Decodes WAV data into normalized `f32` samples.
#[derive(Debug, Clone, Copy, Default)]
pub struct WavDecoderLane;

impl DecoderLane for WavDecoderLane {
    fn name(&self) -> &'static str {
        "WavDecoder"
    }

    fn decode(&self, bytes: &[u8]) -> Result<DecodedResource, LaneError> {
        let mut reader = hound::WavReader::new(Cursor::new(bytes))?;
        let spec = reader.spec();

        let samples = match spec.sample_format {
            hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<Vec<_>, _>>()?,
            hound::SampleFormat::Int => {
                let max_value = (1i64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|sample| sample.map(|s| s as f32 / max_value))
                    .collect::<Result<Vec<_>, _>>()?
            }
        };

        Ok(DecodedResource::Sound(DecodedSound {
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            samples,
        }))
    }
}
