//! Remote ID "Basic ID" JSON, as emitted by ESP32 / BT receivers.
//!
//! Every numeric field is a JSON number; units are implied by the field name.
use serde::{Deserialize, Serialize};

use super::{DialectOptions, TelemMsg};
use crate::{clock::Stamp, sample::SyntheticSample, Error, TGResult};

pub const PROTOCOL_VERSION: &str = "F3411.22";
pub const UA_TYPE_MULTIROTOR: &str = "Helicopter (or Multirotor)";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasicIdMessage {
    pub index: u64,
    pub runtime: u64,
    #[serde(rename = "Basic ID")]
    pub basic_id: BasicId,
    #[serde(rename = "Location/Vector Message")]
    pub location: LocationVector,
    #[serde(rename = "Self-ID Message")]
    pub self_id: SelfId,
    #[serde(rename = "System Message")]
    pub system: SystemMessage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasicId {
    pub protocol_version: String,
    pub id_type: String,
    pub ua_type: String,
    pub id: String,
    #[serde(rename = "MAC")]
    pub mac: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rssi: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationVector {
    pub latitude: f64,
    pub longitude: f64,
    pub speed: f64,
    pub vert_speed: f64,
    pub geodetic_altitude: f64,
    pub height_agl: f64,
    pub direction: f64,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelfId {
    pub text: String,
    pub text_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemMessage {
    pub latitude: f64,
    pub longitude: f64,
    pub home_lat: f64,
    pub home_lon: f64,
}

fn self_id_text(id: &str) -> String {
    format!("UAV {id} operational")
}

impl TelemMsg for BasicIdMessage {
    fn from_sample(sample: &SyntheticSample, stamp: &Stamp, opts: &DialectOptions) -> Self {
        let timestamp = stamp.time();
        // Receivers report an all-zero block while the drone has no GPS fix.
        let (location, system) = if sample.has_fix {
            (
                LocationVector {
                    latitude: sample.latitude,
                    longitude: sample.longitude,
                    speed: sample.speed_mps,
                    vert_speed: sample.vertical_speed_mps,
                    geodetic_altitude: sample.altitude_m,
                    height_agl: sample.height_agl_m,
                    direction: sample.direction_deg,
                    timestamp,
                },
                SystemMessage {
                    latitude: sample.pilot.0,
                    longitude: sample.pilot.1,
                    home_lat: sample.home.0,
                    home_lon: sample.home.1,
                },
            )
        } else {
            (
                LocationVector {
                    latitude: 0.0,
                    longitude: 0.0,
                    speed: 0.0,
                    vert_speed: 0.0,
                    geodetic_altitude: 0.0,
                    height_agl: 0.0,
                    direction: 0.0,
                    timestamp,
                },
                SystemMessage {
                    latitude: 0.0,
                    longitude: 0.0,
                    home_lat: 0.0,
                    home_lon: 0.0,
                },
            )
        };
        let msg = BasicIdMessage {
            index: stamp.index,
            runtime: stamp.runtime_secs,
            basic_id: BasicId {
                protocol_version: PROTOCOL_VERSION.to_string(),
                id_type: sample.id_type.as_str().to_string(),
                ua_type: UA_TYPE_MULTIROTOR.to_string(),
                id: sample.drone.serial.clone(),
                mac: sample.drone.mac.clone(),
                rssi: sample.rssi,
            },
            location,
            self_id: SelfId {
                text: self_id_text(&sample.drone.serial),
                text_type: "Text Description".to_string(),
            },
            system,
        };
        match &opts.identity {
            Some(id) => msg.with_identity(id),
            None => msg,
        }
    }

    fn with_identity(mut self, identity: &str) -> Self {
        self.basic_id.id = identity.to_string();
        self.self_id.text = self_id_text(identity);
        self
    }

    fn to_bytes(&self) -> TGResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| Error::Encode(e.to_string()))
    }
}
