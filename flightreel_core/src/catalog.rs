//! Stream catalog: which message types exist, which are required, and how
//! optional fields are projected into the shared namespace.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Field names referenced outside the loader.
pub mod fields {
    pub const TIMESTAMP: &str = "timestamp";

    pub const ROLL: &str = "Roll";
    pub const DES_ROLL: &str = "DesRoll";
    pub const PITCH: &str = "Pitch";
    pub const DES_PITCH: &str = "DesPitch";
    pub const YAW: &str = "Yaw";
    pub const DES_YAW: &str = "DesYaw";
    pub const GYR_X: &str = "GyrX";
    pub const GYR_Y: &str = "GyrY";
    pub const GYR_Z: &str = "GyrZ";

    pub const RCIN_ROLL: &str = "RCIN_C1_Roll";
    pub const RCIN_PITCH: &str = "RCIN_C2_Pitch";

    pub const POS_LAT: &str = "POS_Lat";
    pub const POS_LNG: &str = "POS_Lng";
    pub const POS_ALT_AMSL: &str = "POS_Alt_AMSL";
    pub const POS_REL_HOME_AGL: &str = "POS_RelHomeAlt_AGL";
    pub const POS_REL_ORIGIN_AGL: &str = "POS_RelOriginAlt_AGL";

    pub const GPS_LAT: &str = "GPS_Lat";
    pub const GPS_LNG: &str = "GPS_Lng";
    pub const GPS_ALT_AMSL: &str = "GPS_Alt_AMSL";
    pub const GPS_SPEED: &str = "GPS_Spd_Ground";

    pub const AIRSPEED: &str = "ARSP_Airspeed";
    pub const XKF5_HAGL: &str = "XKF5_HAGL";
    pub const RFND_DIST_AGL: &str = "RFND_Dist_AGL";
    pub const BARO_ALT: &str = "BARO_Alt_Raw";
    pub const TERR_HEIGHT_AGL: &str = "TERR_CHeight_AGL";
    pub const BAT_VOLT: &str = "BAT_Volt";
    pub const BAT_CURR: &str = "BAT_Curr";

    pub const PIDR_P: &str = "PIDR_P";
    pub const PIDR_I: &str = "PIDR_I";
    pub const PIDR_D: &str = "PIDR_D";
    pub const PIDR_FF: &str = "PIDR_FF";
    pub const PIDP_P: &str = "PIDP_P";
    pub const PIDP_I: &str = "PIDP_I";
    pub const PIDP_D: &str = "PIDP_D";
    pub const PIDP_FF: &str = "PIDP_FF";

    pub const MODE_NUM: &str = "MODE_Num";
    pub const MSG_TEXT: &str = "MSG_Text";

    pub const OF_FLOW_X: &str = "OF_FlowX";
    pub const OF_FLOW_Y: &str = "OF_FlowY";
    pub const OF_BODY_X: &str = "OF_BodyX";
    pub const OF_BODY_Y: &str = "OF_BodyY";
    pub const OF_QUAL: &str = "OF_Qual";

    /// Derived great-circle distance from the first valid position fix.
    pub const DIST_FROM_REF: &str = "DIST_FromRef_m";
}

/// Telemetry message types understood by the loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StreamId {
    /// Attitude (reference timeline)
    Att,
    /// Inertial rates
    Imu,
    /// Pilot input channels
    Rcin,
    /// Fused position
    Pos,
    /// Raw GPS
    Gps,
    /// Airspeed sensor
    Arsp,
    /// EKF height above ground
    Xkf5,
    /// Rangefinder
    Rfnd,
    /// Barometer
    Baro,
    /// Terrain database height
    Terr,
    /// Battery monitor
    Bat,
    /// Roll rate PID terms
    Pidr,
    /// Pitch rate PID terms
    Pidp,
    /// Flight mode changes
    Mode,
    /// Free-text messages
    Msg,
    /// Optical flow
    Of,
}

const ATT_FIELDS: &[&str] = &[
    fields::ROLL,
    fields::DES_ROLL,
    fields::PITCH,
    fields::DES_PITCH,
    fields::YAW,
    fields::DES_YAW,
];
const IMU_FIELDS: &[&str] = &[fields::GYR_X, fields::GYR_Y, fields::GYR_Z];

const RCIN_MAP: &[(&str, &str)] = &[("C1", fields::RCIN_ROLL), ("C2", fields::RCIN_PITCH)];
const POS_MAP: &[(&str, &str)] = &[
    ("Lat", fields::POS_LAT),
    ("Lng", fields::POS_LNG),
    ("Alt", fields::POS_ALT_AMSL),
    ("RelHomeAlt", fields::POS_REL_HOME_AGL),
    ("RelOriginAlt", fields::POS_REL_ORIGIN_AGL),
];
const GPS_MAP: &[(&str, &str)] = &[
    ("Lat", fields::GPS_LAT),
    ("Lng", fields::GPS_LNG),
    ("Alt", fields::GPS_ALT_AMSL),
    ("Spd", fields::GPS_SPEED),
];
const ARSP_MAP: &[(&str, &str)] = &[("Airspeed", fields::AIRSPEED)];
const XKF5_MAP: &[(&str, &str)] = &[("HAGL", fields::XKF5_HAGL)];
const RFND_MAP: &[(&str, &str)] = &[("Dist", fields::RFND_DIST_AGL)];
const BARO_MAP: &[(&str, &str)] = &[("Alt", fields::BARO_ALT)];
const TERR_MAP: &[(&str, &str)] = &[("CHeight", fields::TERR_HEIGHT_AGL)];
const BAT_MAP: &[(&str, &str)] = &[("Volt", fields::BAT_VOLT), ("Curr", fields::BAT_CURR)];
const PIDR_MAP: &[(&str, &str)] = &[
    ("P", fields::PIDR_P),
    ("I", fields::PIDR_I),
    ("D", fields::PIDR_D),
    ("FF", fields::PIDR_FF),
];
const PIDP_MAP: &[(&str, &str)] = &[
    ("P", fields::PIDP_P),
    ("I", fields::PIDP_I),
    ("D", fields::PIDP_D),
    ("FF", fields::PIDP_FF),
];
const MODE_MAP: &[(&str, &str)] = &[("ModeNum", fields::MODE_NUM)];
const MSG_MAP: &[(&str, &str)] = &[("Message", fields::MSG_TEXT)];
const OF_MAP: &[(&str, &str)] = &[
    ("flowX", fields::OF_FLOW_X),
    ("flowY", fields::OF_FLOW_Y),
    ("bodyX", fields::OF_BODY_X),
    ("bodyY", fields::OF_BODY_Y),
    ("Qual", fields::OF_QUAL),
];

impl StreamId {
    /// All streams, required first, then optional in merge order.
    pub fn all() -> Vec<StreamId> {
        let mut all = Self::required().to_vec();
        all.extend(Self::optional());
        all
    }

    /// Required streams; the first one is the reference timeline.
    pub fn required() -> [StreamId; 2] {
        [StreamId::Att, StreamId::Imu]
    }

    /// Optional streams in the fixed order they are merged.
    pub fn optional() -> Vec<StreamId> {
        vec![
            StreamId::Rcin,
            StreamId::Pos,
            StreamId::Gps,
            StreamId::Arsp,
            StreamId::Xkf5,
            StreamId::Rfnd,
            StreamId::Baro,
            StreamId::Terr,
            StreamId::Bat,
            StreamId::Pidr,
            StreamId::Pidp,
            StreamId::Mode,
            StreamId::Msg,
            StreamId::Of,
        ]
    }

    /// Message type code as it appears in log exports (e.g. `ATT`).
    pub fn code(&self) -> &'static str {
        match self {
            StreamId::Att => "ATT",
            StreamId::Imu => "IMU",
            StreamId::Rcin => "RCIN",
            StreamId::Pos => "POS",
            StreamId::Gps => "GPS",
            StreamId::Arsp => "ARSP",
            StreamId::Xkf5 => "XKF5",
            StreamId::Rfnd => "RFND",
            StreamId::Baro => "BARO",
            StreamId::Terr => "TERR",
            StreamId::Bat => "BAT",
            StreamId::Pidr => "PIDR",
            StreamId::Pidp => "PIDP",
            StreamId::Mode => "MODE",
            StreamId::Msg => "MSG",
            StreamId::Of => "OF",
        }
    }

    /// Whether the run fails without this stream.
    pub fn is_required(&self) -> bool {
        matches!(self, StreamId::Att | StreamId::Imu)
    }

    /// Default projection for this stream.
    pub fn default_selection(&self) -> FieldSelection {
        match self {
            StreamId::Att => FieldSelection::required(ATT_FIELDS),
            StreamId::Imu => FieldSelection::required(IMU_FIELDS),
            StreamId::Rcin => FieldSelection::optional(RCIN_MAP),
            StreamId::Pos => FieldSelection::optional(POS_MAP),
            StreamId::Gps => FieldSelection::optional(GPS_MAP),
            StreamId::Arsp => FieldSelection::optional(ARSP_MAP),
            StreamId::Xkf5 => FieldSelection::optional(XKF5_MAP),
            StreamId::Rfnd => FieldSelection::optional(RFND_MAP),
            StreamId::Baro => FieldSelection::optional(BARO_MAP),
            StreamId::Terr => FieldSelection::optional(TERR_MAP),
            StreamId::Bat => FieldSelection::optional(BAT_MAP),
            StreamId::Pidr => FieldSelection::optional(PIDR_MAP),
            StreamId::Pidp => FieldSelection::optional(PIDP_MAP),
            StreamId::Mode => FieldSelection::optional(MODE_MAP),
            StreamId::Msg => FieldSelection::optional(MSG_MAP),
            StreamId::Of => FieldSelection::optional(OF_MAP),
        }
    }

    /// Namespaced latitude/longitude fields, for streams that carry a fix.
    pub fn lat_lon_fields(&self) -> Option<(&'static str, &'static str)> {
        match self {
            StreamId::Pos => Some((fields::POS_LAT, fields::POS_LNG)),
            StreamId::Gps => Some((fields::GPS_LAT, fields::GPS_LNG)),
            _ => None,
        }
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for StreamId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StreamId::all()
            .into_iter()
            .find(|id| id.code().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown stream type: {}", s))
    }
}

/// Which columns of a stream CSV are kept, and under which names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldSelection {
    /// Every listed column must be present; kept under its own name.
    Required(Vec<String>),

    /// Source column -> namespaced name; absent columns are skipped.
    Optional(Vec<(String, String)>),
}

impl FieldSelection {
    /// Builds a required-field selection.
    pub fn required(names: &[&str]) -> Self {
        Self::Required(names.iter().map(|n| n.to_string()).collect())
    }

    /// Builds an optional rename map.
    pub fn optional(map: &[(&str, &str)]) -> Self {
        Self::Optional(
            map.iter()
                .map(|(src, dst)| (src.to_string(), dst.to_string()))
                .collect(),
        )
    }

    /// Output field names in projection order.
    pub fn output_names(&self) -> Vec<String> {
        match self {
            FieldSelection::Required(names) => names.clone(),
            FieldSelection::Optional(map) => map.iter().map(|(_, dst)| dst.clone()).collect(),
        }
    }
}
