//! Figure builder: turns one frame's causal window into a renderer-agnostic
//! description of the multi-panel figure.
//!
//! Building is pure. The same task and display config always yield the same
//! [`FigureSpec`], and nothing here touches the clock, the filesystem or any
//! shared state.

use flightreel_core::catalog::fields;
use flightreel_core::{AlignedRecord, AlignedTable, FrameTask, ReelError, ReelResult, StreamId, Timestamp};
use flightreel_env::FrameSize;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default output width in pixels.
pub const DEFAULT_WIDTH: u32 = 720;

/// Default output height in pixels.
pub const DEFAULT_HEIGHT: u32 = 1280;

/// Plot catalog, in the fixed order panels are stacked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PlotKey {
    RollAtt,
    RollCtrl,
    PitchAtt,
    PitchCtrl,
    YawAtt,
    AltAmsl,
    AltAgl,
    Speed,
    Battery,
    RollPid,
    PitchPid,
    OpticalFlow,
    Distance,
}

impl PlotKey {
    pub const ALL: [PlotKey; 13] = [
        PlotKey::RollAtt,
        PlotKey::RollCtrl,
        PlotKey::PitchAtt,
        PlotKey::PitchCtrl,
        PlotKey::YawAtt,
        PlotKey::AltAmsl,
        PlotKey::AltAgl,
        PlotKey::Speed,
        PlotKey::Battery,
        PlotKey::RollPid,
        PlotKey::PitchPid,
        PlotKey::OpticalFlow,
        PlotKey::Distance,
    ];

    /// Command-line key.
    pub fn key(self) -> &'static str {
        match self {
            PlotKey::RollAtt => "roll_att",
            PlotKey::RollCtrl => "roll_ctrl",
            PlotKey::PitchAtt => "pitch_att",
            PlotKey::PitchCtrl => "pitch_ctrl",
            PlotKey::YawAtt => "yaw_att",
            PlotKey::AltAmsl => "alt_amsl",
            PlotKey::AltAgl => "alt_agl",
            PlotKey::Speed => "speed",
            PlotKey::Battery => "battery",
            PlotKey::RollPid => "roll_pid",
            PlotKey::PitchPid => "pitch_pid",
            PlotKey::OpticalFlow => "optical_flow",
            PlotKey::Distance => "distance",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            PlotKey::RollAtt => "Roll Attitude",
            PlotKey::RollCtrl => "Roll Control",
            PlotKey::PitchAtt => "Pitch Attitude",
            PlotKey::PitchCtrl => "Pitch Control",
            PlotKey::YawAtt => "Yaw Attitude",
            PlotKey::AltAmsl => "Altitude AMSL",
            PlotKey::AltAgl => "Altitude AGL",
            PlotKey::Speed => "Speed",
            PlotKey::Battery => "Battery Voltage & Current",
            PlotKey::RollPid => "Roll Rate PID",
            PlotKey::PitchPid => "Pitch Rate PID",
            PlotKey::OpticalFlow => "Optical Flow",
            PlotKey::Distance => "Distance From Start",
        }
    }

    /// Word used in the "No ... data" placeholder.
    fn subject(self) -> &'static str {
        match self {
            PlotKey::RollAtt => "Roll",
            PlotKey::RollCtrl => "Roll rate",
            PlotKey::PitchAtt => "Pitch",
            PlotKey::PitchCtrl => "Pitch rate",
            PlotKey::YawAtt => "Yaw",
            PlotKey::AltAmsl => "AMSL",
            PlotKey::AltAgl => "AGL",
            PlotKey::Speed => "Speed",
            PlotKey::Battery => "Battery",
            PlotKey::RollPid => "Roll PID",
            PlotKey::PitchPid => "Pitch PID",
            PlotKey::OpticalFlow => "Optical Flow",
            PlotKey::Distance => "Distance",
        }
    }
}

impl fmt::Display for PlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for PlotKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PlotKey::ALL
            .iter()
            .copied()
            .find(|k| k.key() == s.trim())
            .ok_or_else(|| {
                let keys: Vec<&str> = PlotKey::ALL.iter().map(|k| k.key()).collect();
                format!("unknown plot '{}', expected one of: {}", s, keys.join(", "))
            })
    }
}

/// Everything about the figure that is not data.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayConfig {
    pub size: FrameSize,
    pub plots: Vec<PlotKey>,
    /// Speed overlay line, drawn when positive
    pub stall_speed: Option<f64>,
    /// Shown before the clock in the frame title
    pub log_id: String,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            size: FrameSize::new(DEFAULT_WIDTH, DEFAULT_HEIGHT),
            plots: PlotKey::ALL.to_vec(),
            stall_speed: None,
            log_id: "flight".to_string(),
        }
    }
}

impl DisplayConfig {
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.size = FrameSize::new(width, height);
        self
    }

    pub fn with_plots(mut self, plots: Vec<PlotKey>) -> Self {
        self.plots = plots;
        self
    }

    pub fn with_stall_speed(mut self, stall_speed: Option<f64>) -> Self {
        self.stall_speed = stall_speed;
        self
    }

    pub fn with_log_id(mut self, log_id: impl Into<String>) -> Self {
        self.log_id = log_id.into();
        self
    }

    pub fn validate(&self) -> ReelResult<()> {
        self.size.validate()?;
        if self.plots.is_empty() {
            return Err(ReelError::configuration("no plots selected"));
        }
        if let Some(v) = self.stall_speed {
            if !v.is_finite() {
                return Err(ReelError::configuration("stall speed must be a finite number"));
            }
        }
        Ok(())
    }

    /// Selected plots in catalog order, without duplicates.
    pub fn selected_plots(&self) -> Vec<PlotKey> {
        PlotKey::ALL
            .iter()
            .copied()
            .filter(|k| self.plots.contains(k))
            .collect()
    }
}

/// An sRGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const BLUE: Rgb = Rgb(0, 0, 255);
    pub const RED: Rgb = Rgb(255, 0, 0);
    pub const GREEN: Rgb = Rgb(0, 128, 0);
    pub const GREY: Rgb = Rgb(128, 128, 128);
    pub const PURPLE: Rgb = Rgb(128, 0, 128);
    pub const ORANGE: Rgb = Rgb(255, 165, 0);
    pub const BROWN: Rgb = Rgb(165, 42, 42);
    pub const CYAN: Rgb = Rgb(0, 170, 170);
    pub const MAGENTA: Rgb = Rgb(255, 0, 255);
    pub const LIME: Rgb = Rgb(50, 205, 50);
    pub const GOLD: Rgb = Rgb(218, 165, 32);
    pub const TEAL: Rgb = Rgb(0, 128, 128);
    pub const NAVY: Rgb = Rgb(0, 0, 128);
    pub const FIREBRICK: Rgb = Rgb(178, 34, 34);
    pub const BLACK: Rgb = Rgb(0, 0, 0);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LineStyle {
    Solid,
    Dashed,
}

/// One line in a panel. `x` is seconds relative to the frame instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesSpec {
    pub label: String,
    pub abbr: String,
    pub points: Vec<(f64, f64)>,
    /// Newest non-null value in the window
    pub current: Option<f64>,
    pub color: Rgb,
    pub style: LineStyle,
    /// Plotted against the panel's right-hand axis
    pub secondary: bool,
}

impl SeriesSpec {
    /// Text drawn beside the plot, e.g. `12.34 Act`.
    pub fn value_label(&self) -> Option<String> {
        self.current.map(|v| format!("{:.2} {}", v, self.abbr))
    }
}

/// Horizontal reference line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    pub label: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelSpec {
    pub key: PlotKey,
    pub title: String,
    pub y_label: String,
    pub series: Vec<SeriesSpec>,
    /// Shown instead of data when no series has points
    pub placeholder: Option<String>,
    pub threshold: Option<Threshold>,
}

impl PanelSpec {
    pub fn has_data(&self) -> bool {
        self.series.iter().any(|s| !s.points.is_empty())
    }

    pub fn has_secondary(&self) -> bool {
        self.series.iter().any(|s| s.secondary && !s.points.is_empty())
    }
}

/// Complete description of one frame image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FigureSpec {
    pub index: usize,
    pub title: String,
    /// Latest flight mode / message in the window
    pub status: Option<String>,
    pub size: FrameSize,
    /// Visible x-range in seconds relative to the instant
    pub x_range: (f64, f64),
    pub panels: Vec<PanelSpec>,
}

/// Read-only view over one task's window.
struct WindowView<'a> {
    table: &'a AlignedTable,
    records: &'a [AlignedRecord],
    instant: Timestamp,
}

impl<'a> WindowView<'a> {
    fn new(task: &'a FrameTask) -> Self {
        Self {
            table: &task.table,
            records: task.records(),
            instant: task.instant,
        }
    }

    fn points(&self, field: &str) -> Vec<(f64, f64)> {
        let Some(col) = self.table.field_index(field) else {
            return Vec::new();
        };
        self.records
            .iter()
            .filter_map(|r| {
                let y = r.get(col)?.as_f64()?;
                y.is_finite().then(|| (r.timestamp.seconds_since(self.instant), y))
            })
            .collect()
    }

    fn latest_text(&self, field: &str) -> Option<String> {
        let col = self.table.field_index(field)?;
        self.records.iter().rev().find_map(|r| match r.get(col)? {
            flightreel_core::FieldValue::Text(s) => Some(s.clone()),
            flightreel_core::FieldValue::Number(v) => Some(format!("{}", v)),
        })
    }

    fn loaded(&self, stream: StreamId) -> bool {
        self.table.has_stream(stream)
    }
}

/// Accumulates the series of one panel.
struct PanelBuilder<'v, 'a> {
    view: &'v WindowView<'a>,
    panel: PanelSpec,
}

impl<'v, 'a> PanelBuilder<'v, 'a> {
    fn new(view: &'v WindowView<'a>, key: PlotKey, y_label: &str) -> Self {
        Self {
            view,
            panel: PanelSpec {
                key,
                title: key.title().to_string(),
                y_label: y_label.to_string(),
                series: Vec::new(),
                placeholder: None,
                threshold: None,
            },
        }
    }

    /// Adds `field` if the window has values for it. Returns whether it did.
    fn line(&mut self, field: &str, label: &str, abbr: &str, color: Rgb, style: LineStyle) -> bool {
        self.push(field, label, abbr, color, style, false)
    }

    fn push(&mut self, field: &str, label: &str, abbr: &str, color: Rgb, style: LineStyle, secondary: bool) -> bool {
        let points = self.view.points(field);
        if points.is_empty() {
            return false;
        }
        let current = points.last().map(|&(_, y)| y);
        self.panel.series.push(SeriesSpec {
            label: label.to_string(),
            abbr: abbr.to_string(),
            points,
            current,
            color,
            style,
            secondary,
        });
        true
    }

    fn finish(mut self) -> PanelSpec {
        if !self.panel.has_data() && self.panel.placeholder.is_none() {
            self.panel.placeholder = Some(format!("No {} data", self.panel.key.subject()));
        }
        self.panel
    }
}

/// Builds the figure for one frame.
pub fn build_figure(task: &FrameTask, display: &DisplayConfig) -> FigureSpec {
    let view = WindowView::new(task);
    let panels = display
        .selected_plots()
        .into_iter()
        .map(|key| build_panel(&view, key, display))
        .collect();

    FigureSpec {
        index: task.index,
        title: format!("{} # {}", display.log_id, task.instant.clock_label()),
        status: status_line(&view),
        size: display.size,
        x_range: (-task.window_secs, 0.0),
        panels,
    }
}

fn status_line(view: &WindowView<'_>) -> Option<String> {
    let mode = view.latest_text(fields::MODE_NUM).map(|m| format!("Mode {}", m));
    let msg = view.latest_text(fields::MSG_TEXT);
    match (mode, msg) {
        (Some(m), Some(t)) => Some(format!("{} | {}", m, t)),
        (Some(m), None) => Some(m),
        (None, Some(t)) => Some(t),
        (None, None) => None,
    }
}

fn build_panel(view: &WindowView<'_>, key: PlotKey, display: &DisplayConfig) -> PanelSpec {
    use LineStyle::{Dashed, Solid};

    match key {
        PlotKey::RollAtt | PlotKey::PitchAtt | PlotKey::YawAtt => {
            let (actual, desired, unit) = match key {
                PlotKey::RollAtt => (fields::ROLL, fields::DES_ROLL, "Roll (deg)"),
                PlotKey::PitchAtt => (fields::PITCH, fields::DES_PITCH, "Pitch (deg)"),
                _ => (fields::YAW, fields::DES_YAW, "Yaw (deg)"),
            };
            let mut b = PanelBuilder::new(view, key, unit);
            b.line(actual, "Actual", "Act", Rgb::BLUE, Solid);
            b.line(desired, "Desired", "Des", Rgb::RED, Dashed);
            b.finish()
        }
        PlotKey::RollCtrl | PlotKey::PitchCtrl => {
            let (rate, input, name, label) = match key {
                PlotKey::RollCtrl => (fields::GYR_X, fields::RCIN_ROLL, "Roll", "Roll Rate"),
                _ => (fields::GYR_Y, fields::RCIN_PITCH, "Pitch", "Pitch Rate"),
            };
            let mut b = PanelBuilder::new(view, key, "Rate (deg/s)");
            b.line(rate, label, "Rate", Rgb::GREEN, Solid);
            let with_input = view.loaded(StreamId::Rcin) && b.line(input, "Pilot In", "In", Rgb::GREY, Dashed);
            if with_input {
                b.panel.title = format!("{} Ctrl (Rate vs Input)", name);
                b.panel.y_label = "Rate/Input".to_string();
            } else {
                b.panel.title = format!("{} Ctrl (Rate)", name);
            }
            b.finish()
        }
        PlotKey::AltAmsl => {
            let mut b = PanelBuilder::new(view, key, "Alt AMSL (m)");
            b.line(fields::POS_ALT_AMSL, "Fused", "Fused", Rgb::PURPLE, Solid);
            b.line(fields::GPS_ALT_AMSL, "GPS", "GPS", Rgb::ORANGE, Dashed);
            b.line(fields::BARO_ALT, "Baro", "Baro", Rgb::BROWN, Dashed);
            b.finish()
        }
        PlotKey::AltAgl => {
            let mut b = PanelBuilder::new(view, key, "Alt AGL (m)");
            b.line(fields::XKF5_HAGL, "Est HAGL", "Est", Rgb::CYAN, Solid);
            // Relative-to-home wins over relative-to-origin when both exist.
            if view.table.has_field(fields::POS_REL_HOME_AGL) {
                b.line(fields::POS_REL_HOME_AGL, "Rel Home", "Home", Rgb::MAGENTA, Dashed);
            } else {
                b.line(fields::POS_REL_ORIGIN_AGL, "Rel Origin", "Origin", Rgb::MAGENTA, Dashed);
            }
            b.line(fields::RFND_DIST_AGL, "Rangefinder", "Rngfnd", Rgb::LIME, Dashed);
            b.line(fields::TERR_HEIGHT_AGL, "Terrain DB", "TerrDB", Rgb::GOLD, Dashed);
            b.finish()
        }
        PlotKey::Speed => {
            let mut b = PanelBuilder::new(view, key, "Speed (m/s)");
            b.line(fields::AIRSPEED, "Airspeed", "ASPD", Rgb::TEAL, Solid);
            b.line(fields::GPS_SPEED, "Ground Spd", "GSPD", Rgb::NAVY, Dashed);
            if b.panel.has_data() {
                if let Some(stall) = display.stall_speed.filter(|v| *v > 0.0) {
                    b.panel.threshold = Some(Threshold {
                        label: format!("{:.1} Stall", stall),
                        value: stall,
                    });
                }
            }
            b.finish()
        }
        PlotKey::Battery => {
            let mut b = PanelBuilder::new(view, key, "Volt (V) Curr (A)");
            if view.loaded(StreamId::Bat) {
                b.push(fields::BAT_VOLT, "Voltage", "V", Rgb::GOLD, Solid, false);
                b.push(fields::BAT_CURR, "Current", "A", Rgb::FIREBRICK, Solid, true);
                if !b.panel.has_data() {
                    b.panel.placeholder = Some("No Battery data in window".to_string());
                }
            } else {
                b.panel.placeholder = Some("No Battery data loaded".to_string());
            }
            b.finish()
        }
        PlotKey::RollPid | PlotKey::PitchPid => {
            let terms = match key {
                PlotKey::RollPid => [fields::PIDR_P, fields::PIDR_I, fields::PIDR_D, fields::PIDR_FF],
                _ => [fields::PIDP_P, fields::PIDP_I, fields::PIDP_D, fields::PIDP_FF],
            };
            let mut b = PanelBuilder::new(view, key, "PID output");
            let styles = [
                ("P", Rgb::BLUE, Solid),
                ("I", Rgb::GREEN, Solid),
                ("D", Rgb::RED, Solid),
                ("FF", Rgb::GREY, Dashed),
            ];
            for (field, (name, color, style)) in terms.iter().zip(styles) {
                b.line(field, name, name, color, style);
            }
            b.finish()
        }
        PlotKey::OpticalFlow => {
            let mut b = PanelBuilder::new(view, key, "Rate (rad/s)");
            b.line(fields::OF_FLOW_X, "Flow X", "FlowX", Rgb::BLUE, Solid);
            b.line(fields::OF_FLOW_Y, "Flow Y", "FlowY", Rgb::RED, Solid);
            b.line(fields::OF_BODY_X, "Body X", "BodyX", Rgb::BLUE, Dashed);
            b.line(fields::OF_BODY_Y, "Body Y", "BodyY", Rgb::RED, Dashed);
            b.finish()
        }
        PlotKey::Distance => {
            let mut b = PanelBuilder::new(view, key, "Distance (m)");
            b.line(fields::DIST_FROM_REF, "From start", "m", Rgb::PURPLE, Solid);
            b.finish()
        }
    }
}
