//! OMV (mobile virtual operator) markers
//!
//! Liquidation files issued for a virtual operator carry its 3-digit code as
//! the third-from-last segment, right before the date and time segments.

use serde::Serialize;

/// Distance of the marker segment from the end of the segment list
pub const OMV_OFFSET_FROM_END: usize = 3;

/// Recognized OMV codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum OmvMarker {
    #[serde(rename = "210")]
    Omv210,
    #[serde(rename = "212")]
    Omv212,
    #[serde(rename = "216")]
    Omv216,
    #[serde(rename = "236")]
    Omv236,
    #[serde(rename = "242")]
    Omv242,
    #[serde(rename = "250")]
    Omv250,
    #[serde(rename = "253")]
    Omv253,
}

impl OmvMarker {
    pub const ALL: [OmvMarker; 7] = [
        OmvMarker::Omv210,
        OmvMarker::Omv212,
        OmvMarker::Omv216,
        OmvMarker::Omv236,
        OmvMarker::Omv242,
        OmvMarker::Omv250,
        OmvMarker::Omv253,
    ];

    /// Match a single segment against the closed set of codes
    pub fn from_segment(segment: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|marker| marker.code() == segment)
    }

    /// Look for a marker at its fixed position in a segment list
    pub fn detect(segments: &[&str]) -> Option<Self> {
        segments
            .len()
            .checked_sub(OMV_OFFSET_FROM_END)
            .and_then(|idx| segments.get(idx))
            .and_then(|segment| Self::from_segment(segment))
    }

    pub fn code(&self) -> &'static str {
        match self {
            OmvMarker::Omv210 => "210",
            OmvMarker::Omv212 => "212",
            OmvMarker::Omv216 => "216",
            OmvMarker::Omv236 => "236",
            OmvMarker::Omv242 => "242",
            OmvMarker::Omv250 => "250",
            OmvMarker::Omv253 => "253",
        }
    }

    /// Component label used when reporting the marker, e.g. `OMV_236`
    pub fn component(&self) -> String {
        format!("OMV_{}", self.code())
    }
}

impl std::fmt::Display for OmvMarker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}
