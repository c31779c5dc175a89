//! JSON query-parameter messages objects and space servers send to
//! update a live query (§4.3 "wire query parameters"). Distinct from
//! the binary CSEG wire protocol in `sirikata_messaging` — proximity
//! queries travel as small JSON blobs over the object<->space session
//! stream.

use crate::types::{SolidAngle, NO_UPDATE_MAX_RESULTS};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueryParamsMessage {
    /// Degrees. Absent means "every object" (`SolidAngle::MAX`); `0.0`
    /// means "leave the previously registered angle unchanged".
    #[serde(default)]
    pub angle: Option<f32>,
    /// Absent means "no limit"; `NO_UPDATE_MAX_RESULTS` means "leave
    /// the previously registered value unchanged".
    #[serde(default)]
    pub max_results: Option<u32>,
}

/// What a `QueryParamsMessage` resolves to once the wire sentinels are
/// interpreted.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AngleUpdate {
    NoChange,
    Set(SolidAngle),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MaxResultsUpdate {
    NoChange,
    Set(Option<u32>),
}

impl QueryParamsMessage {
    pub fn angle_update(&self) -> AngleUpdate {
        match self.angle {
            None => AngleUpdate::Set(SolidAngle::MAX),
            Some(degrees) if degrees == 0.0 => AngleUpdate::NoChange,
            Some(degrees) => AngleUpdate::Set(SolidAngle(degrees.to_radians())),
        }
    }

    pub fn max_results_update(&self) -> MaxResultsUpdate {
        match self.max_results {
            Some(v) if v == NO_UPDATE_MAX_RESULTS => MaxResultsUpdate::NoChange,
            other => MaxResultsUpdate::Set(other),
        }
    }

    pub fn parse(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }

    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_angle_means_everything_visible() {
        let msg = QueryParamsMessage::parse(br#"{"max_results": 5}"#).unwrap();
        assert_eq!(msg.angle_update(), AngleUpdate::Set(SolidAngle::MAX));
        assert_eq!(msg.max_results_update(), MaxResultsUpdate::Set(Some(5)));
    }

    #[test]
    fn zero_angle_means_no_change() {
        let msg = QueryParamsMessage::parse(br#"{"angle": 0.0}"#).unwrap();
        assert_eq!(msg.angle_update(), AngleUpdate::NoChange);
    }

    #[test]
    fn sentinel_max_results_means_no_change() {
        let msg = QueryParamsMessage::parse(
            format!(r#"{{"angle": 5.0, "max_results": {NO_UPDATE_MAX_RESULTS}}}"#).as_bytes(),
        )
        .unwrap();
        assert_eq!(msg.max_results_update(), MaxResultsUpdate::NoChange);
        assert_eq!(msg.angle_update(), AngleUpdate::Set(SolidAngle(5.0f32.to_radians())));
    }
}
