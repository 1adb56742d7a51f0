//! Cursor-on-Target events: one for the drone itself, one for the sensor host.
//!
//! Everything goes through the quick-xml serde serializer, so ids and free text are escaped and
//! the output is always well-formed.
use serde::{Deserialize, Serialize};

use super::{DialectOptions, TelemMsg};
use crate::{clock::Stamp, sample::SyntheticSample, Error, TGResult};

pub const COT_VERSION: &str = "2.0";
pub const HOW_MACHINE_GPS: &str = "m-g";
pub const STATUS_TYPE: &str = "b-m-p-s-m";
/// CoT "unknown" circular / linear error.
const UNKNOWN_ERROR_M: f64 = 9_999_999.0;
const MIB: u64 = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "event")]
pub struct Cot<D> {
    #[serde(rename = "@version")]
    pub version: String,
    #[serde(rename = "@uid")]
    pub uid: String,
    #[serde(rename = "@type")]
    pub cot_type: String,
    #[serde(rename = "@time")]
    pub time: String,
    #[serde(rename = "@start")]
    pub start: String,
    #[serde(rename = "@stale")]
    pub stale: String,
    #[serde(rename = "@how")]
    pub how: String,
    pub point: Point,
    pub detail: D,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    #[serde(rename = "@lat")]
    pub lat: f64,
    #[serde(rename = "@lon")]
    pub lon: f64,
    #[serde(rename = "@hae")]
    pub hae: f64,
    #[serde(rename = "@ce")]
    pub ce: f64,
    #[serde(rename = "@le")]
    pub le: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    #[serde(rename = "@callsign")]
    pub callsign: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrecisionLocation {
    #[serde(rename = "@geopointsrc")]
    pub geopointsrc: String,
    #[serde(rename = "@altsrc")]
    pub altsrc: String,
}

//  ____
// |  _ \ _ __ ___  _ __   ___
// | | | | '__/ _ \| '_ \ / _ \
// | |_| | | | (_) | | | |  __/
// |____/|_|  \___/|_| |_|\___|

pub type DroneEvent = Cot<DroneDetail>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DroneDetail {
    pub contact: Contact,
    #[serde(rename = "BasicID")]
    pub basic_id: BasicIdElem,
    #[serde(rename = "LocationVector")]
    pub location_vector: LocationVectorElem,
    #[serde(rename = "SelfID")]
    pub self_id: SelfIdElem,
    #[serde(rename = "System")]
    pub system: SystemElem,
    pub remarks: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasicIdElem {
    #[serde(rename = "DeviceID")]
    pub device_id: String,
    #[serde(rename = "Type")]
    pub id_type: String,
    #[serde(rename = "MAC")]
    pub mac: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationVectorElem {
    #[serde(rename = "Speed")]
    pub speed: f64,
    #[serde(rename = "VerticalSpeed")]
    pub vertical_speed: f64,
    #[serde(rename = "Altitude")]
    pub altitude: f64,
    #[serde(rename = "Height")]
    pub height: f64,
    #[serde(rename = "Direction")]
    pub direction: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelfIdElem {
    #[serde(rename = "Description")]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemElem {
    #[serde(rename = "PilotLocation")]
    pub pilot_location: LatLonElem,
    #[serde(rename = "HomeLocation")]
    pub home_location: LatLonElem,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatLonElem {
    pub lat: f64,
    pub lon: f64,
}

fn drone_description(id: &str) -> String {
    format!("Test Drone {id}")
}

fn drone_remarks(mac: &str, rssi: Option<i32>, description: &str) -> String {
    let rssi = rssi.map_or_else(|| "n/a".to_string(), |r| format!("{r}dBm"));
    format!("MAC: {mac}, RSSI: {rssi}, Self-ID: {description}")
}

impl TelemMsg for DroneEvent {
    fn from_sample(sample: &SyntheticSample, stamp: &Stamp, opts: &DialectOptions) -> Self {
        let callsign = &sample.drone.callsign;
        let description = drone_description(callsign);
        let time = stamp.time();
        let cot = Cot {
            version: COT_VERSION.to_string(),
            uid: format!("drone-{callsign}"),
            cot_type: sample.cot_type.clone(),
            start: time.clone(),
            time,
            stale: stamp.stale(opts.telemetry_stale_minutes),
            how: HOW_MACHINE_GPS.to_string(),
            point: Point {
                lat: sample.latitude,
                lon: sample.longitude,
                hae: sample.altitude_m,
                ce: UNKNOWN_ERROR_M,
                le: UNKNOWN_ERROR_M,
            },
            detail: DroneDetail {
                contact: Contact {
                    callsign: callsign.clone(),
                },
                basic_id: BasicIdElem {
                    device_id: callsign.clone(),
                    id_type: sample.id_type.as_str().to_string(),
                    mac: sample.drone.mac.clone(),
                },
                location_vector: LocationVectorElem {
                    speed: sample.speed_mps,
                    vertical_speed: sample.vertical_speed_mps,
                    altitude: sample.altitude_m,
                    height: sample.height_agl_m,
                    direction: sample.direction_deg,
                },
                remarks: drone_remarks(&sample.drone.mac, sample.rssi, &description),
                self_id: SelfIdElem { description },
                system: SystemElem {
                    pilot_location: LatLonElem {
                        lat: sample.pilot.0,
                        lon: sample.pilot.1,
                    },
                    home_location: LatLonElem {
                        lat: sample.home.0,
                        lon: sample.home.1,
                    },
                },
            },
        };
        match &opts.identity {
            Some(id) => cot.with_identity(id),
            None => cot,
        }
    }

    fn with_identity(mut self, identity: &str) -> Self {
        let description = drone_description(identity);
        self.uid = format!("drone-{identity}");
        self.detail.contact.callsign = identity.to_string();
        self.detail.basic_id.device_id = identity.to_string();
        self.detail.remarks = self
            .detail
            .remarks
            .replace(&self.detail.self_id.description, &description);
        self.detail.self_id.description = description;
        self
    }

    fn to_bytes(&self) -> TGResult<Vec<u8>> {
        to_xml(self)
    }
}

//  ____  _        _
// / ___|| |_ __ _| |_ _   _ ___
// \___ \| __/ _` | __| | | / __|
//  ___) | || (_| | |_| |_| \__ \
// |____/ \__\__,_|\__|\__,_|___/

pub type StatusEvent = Cot<StatusDetail>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusDetail {
    pub contact: Contact,
    pub precisionlocation: PrecisionLocation,
    pub remarks: String,
}

impl TelemMsg for StatusEvent {
    fn from_sample(sample: &SyntheticSample, stamp: &Stamp, opts: &DialectOptions) -> Self {
        let host = &sample.host;
        let time = stamp.time();
        let remarks = format!(
            "CPU Usage: {}%, Memory Total: {} MB, Memory Available: {} MB, \
             Disk Total: {} MB, Disk Used: {} MB, Temperature: {}°C, Uptime: {} seconds",
            host.cpu_percent,
            host.memory.total / MIB,
            host.memory.free / MIB,
            host.disk.total / MIB,
            host.disk.used / MIB,
            host.temperature_c,
            stamp.runtime_secs,
        );
        let cot = Cot {
            version: COT_VERSION.to_string(),
            uid: host.serial_number.clone(),
            cot_type: STATUS_TYPE.to_string(),
            start: time.clone(),
            time,
            stale: stamp.stale(opts.status_stale_minutes),
            how: HOW_MACHINE_GPS.to_string(),
            point: Point {
                lat: host.gps.0,
                lon: host.gps.1,
                hae: host.gps_altitude_m,
                ce: 35.0,
                le: 999_999.0,
            },
            detail: StatusDetail {
                contact: Contact {
                    callsign: host.serial_number.clone(),
                },
                precisionlocation: PrecisionLocation {
                    geopointsrc: "gps".to_string(),
                    altsrc: "gps".to_string(),
                },
                remarks,
            },
        };
        match &opts.host_identity {
            Some(id) => cot.with_identity(id),
            None => cot,
        }
    }

    fn with_identity(mut self, identity: &str) -> Self {
        self.uid = identity.to_string();
        self.detail.contact.callsign = identity.to_string();
        self
    }

    fn to_bytes(&self) -> TGResult<Vec<u8>> {
        to_xml(self)
    }
}

fn to_xml<T: Serialize>(value: &T) -> TGResult<Vec<u8>> {
    quick_xml::se::to_string(value)
        .map(String::into_bytes)
        .map_err(|e| Error::Encode(e.to_string()))
}
