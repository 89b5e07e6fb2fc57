// Copyright 2025 coScene
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

/// SigMF vocabulary for capture datasets
///
/// A dataset is a `.sigmf-data` file of raw little-endian samples and a
/// `.sigmf-meta` JSON document. The metadata document has three sections:
///
/// - `global`: acquisition parameters shared by every sample in the file
/// - `captures`: capture segments (one per dataset here, starting at sample 0)
/// - `annotations`: ordered per-symbol records
///
/// Only the `core:` keys this recorder emits are modelled.
use bytes::{BufMut, Bytes, BytesMut};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{RecorderError, Result};

pub const DATA_EXTENSION: &str = "sigmf-data";
pub const META_EXTENSION: &str = "sigmf-meta";

/// On-disk sample encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SampleEncoding {
    #[serde(rename = "cf32_le")]
    Cf32Le,
    #[serde(rename = "rf32_le")]
    Rf32Le,
    #[serde(rename = "ci16_le")]
    Ci16Le,
    #[serde(rename = "ri16_le")]
    Ri16Le,
}

impl SampleEncoding {
    /// Resolve the encoding for a configured item width and sample type.
    ///
    /// 8-byte items are always complex float and 4-byte items are always
    /// real float; only the 2-byte width looks at `complex`.
    pub fn from_item(item_size: usize, complex: bool) -> Result<Self> {
        match (item_size, complex) {
            (8, _) => Ok(SampleEncoding::Cf32Le),
            (4, _) => Ok(SampleEncoding::Rf32Le),
            (2, true) => Ok(SampleEncoding::Ci16Le),
            (2, false) => Ok(SampleEncoding::Ri16Le),
            _ => Err(RecorderError::UnsupportedEncoding { item_size, complex }),
        }
    }

    /// Width in bytes of one stream element
    pub fn item_size(self) -> usize {
        match self {
            SampleEncoding::Cf32Le => 8,
            SampleEncoding::Rf32Le => 4,
            SampleEncoding::Ci16Le | SampleEncoding::Ri16Le => 2,
        }
    }

    pub fn datatype(self) -> &'static str {
        match self {
            SampleEncoding::Cf32Le => "cf32_le",
            SampleEncoding::Rf32Le => "rf32_le",
            SampleEncoding::Ci16Le => "ci16_le",
            SampleEncoding::Ri16Le => "ri16_le",
        }
    }

    pub fn is_complex(self) -> bool {
        matches!(self, SampleEncoding::Cf32Le | SampleEncoding::Ci16Le)
    }
}

/// Encode complex float samples as interleaved little-endian I/Q pairs
pub fn cf32_bytes(samples: &[(f32, f32)]) -> Bytes {
    let mut buf = BytesMut::with_capacity(samples.len() * 8);
    for &(i, q) in samples {
        buf.put_f32_le(i);
        buf.put_f32_le(q);
    }
    buf.freeze()
}

pub fn rf32_bytes(samples: &[f32]) -> Bytes {
    let mut buf = BytesMut::with_capacity(samples.len() * 4);
    for &s in samples {
        buf.put_f32_le(s);
    }
    buf.freeze()
}

pub fn ri16_bytes(samples: &[i16]) -> Bytes {
    let mut buf = BytesMut::with_capacity(samples.len() * 2);
    for &s in samples {
        buf.put_i16_le(s);
    }
    buf.freeze()
}

/// ISO-8601 UTC timestamp in the form SigMF expects (`...Z`)
pub fn format_datetime(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Fixed acquisition parameters shared by every dataset of a capture run
#[derive(Debug, Clone, PartialEq)]
pub struct AcquisitionParams {
    pub encoding: SampleEncoding,
    pub sample_rate: f64,
    pub frequency: f64,
    pub description: String,
    pub author: String,
    pub hw: String,
    pub version: String,
}

impl AcquisitionParams {
    pub fn global_info(&self, dataset: String, comment: Option<String>) -> GlobalInfo {
        GlobalInfo {
            datatype: self.encoding,
            sample_rate: self.sample_rate,
            description: self.description.clone(),
            author: self.author.clone(),
            dataset,
            hw: self.hw.clone(),
            version: self.version.clone(),
            comment,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalInfo {
    #[serde(rename = "core:datatype")]
    pub datatype: SampleEncoding,
    #[serde(rename = "core:sample_rate")]
    pub sample_rate: f64,
    #[serde(rename = "core:description")]
    pub description: String,
    #[serde(rename = "core:author")]
    pub author: String,
    #[serde(rename = "core:dataset")]
    pub dataset: String,
    #[serde(rename = "core:hw")]
    pub hw: String,
    #[serde(rename = "core:version")]
    pub version: String,
    #[serde(
        rename = "core:comment",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureSegment {
    #[serde(rename = "core:sample_start")]
    pub sample_start: u64,
    #[serde(rename = "core:frequency")]
    pub frequency: f64,
    #[serde(rename = "core:datetime")]
    pub datetime: String,
}

/// One symbol annotation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    /// Cumulative sample offset of the first sample of the symbol
    #[serde(rename = "core:sample_start")]
    pub sample_start: u64,
    #[serde(rename = "core:sample_count")]
    pub sample_count: u64,
    #[serde(rename = "core:frequency")]
    pub frequency: f64,
    #[serde(rename = "core:datetime")]
    pub datetime: String,
    #[serde(rename = "core:comment")]
    pub comment: String,
}

/// The full `.sigmf-meta` document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataDocument {
    pub global: GlobalInfo,
    #[serde(default)]
    pub captures: Vec<CaptureSegment>,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
}

impl MetadataDocument {
    pub fn to_json_pretty(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
    }

    pub fn from_slice(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }

    pub fn symbol_comment(total_symbols: u64) -> String {
        format!("Total number of symbols: {}", total_symbols)
    }
}
