use serde::{Deserialize, Serialize};

mod fixture_library;

pub use fixture_library::{FixtureLibrary, FixtureProfile};

pub type FixtureId = usize;
pub type UniverseId = u8;

/// Number of addressable channels in a single DMX universe.
pub const UNIVERSE_SIZE: usize = 512;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Fixture {
    pub id: FixtureId,
    pub name: String,
    pub profile: FixtureProfile,
    pub channels: Vec<Channel>,
    pub universe: UniverseId,
    /// 1-based DMX start address.
    pub start_address: u16,
    pub pan_tilt_limits: PanTiltLimits,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FixtureType {
    MovingHead,
    PAR,
    LEDBar,
    Wash,
    Pinspot,
    Smoke,
    Dimmer,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub name: String,
    pub channel_type: ChannelType,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelType {
    Dimmer,
    Color,
    Gobo,
    Red,
    Green,
    Blue,
    White,
    Amber,
    UV,
    Strobe,
    Pan,
    Tilt,
    Other(String),
}

impl ChannelType {
    /// Channels that the grand master treats as light output.
    pub fn is_intensity(&self) -> bool {
        matches!(
            self,
            ChannelType::Dimmer
                | ChannelType::Red
                | ChannelType::Green
                | ChannelType::Blue
                | ChannelType::White
                | ChannelType::Amber
                | ChannelType::UV
        )
    }
}

impl std::fmt::Display for ChannelType {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ChannelType::Dimmer => write!(f, "Dimmer"),
            ChannelType::Color => write!(f, "Color"),
            ChannelType::Gobo => write!(f, "Gobo"),
            ChannelType::Red => write!(f, "Red"),
            ChannelType::Green => write!(f, "Green"),
            ChannelType::Blue => write!(f, "Blue"),
            ChannelType::White => write!(f, "White"),
            ChannelType::Amber => write!(f, "Amber"),
            ChannelType::UV => write!(f, "UV"),
            ChannelType::Strobe => write!(f, "Strobe"),
            ChannelType::Pan => write!(f, "Pan"),
            ChannelType::Tilt => write!(f, "Tilt"),
            ChannelType::Other(s) => write!(f, "Other({})", s),
        }
    }
}

/// Converts a fractional level to an 8-bit DMX value.
///
/// Rounds half up and clamps to 0-255. NaN maps to 0 so a broken calculation
/// can never produce a full-on channel.
pub fn to_dmx(value: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    (value + 0.5).floor().clamp(0.0, 255.0) as u8
}

fn percent_to_dmx(percent: f64) -> u8 {
    to_dmx(percent * 255.0 / 100.0)
}

/// Usable travel of a single movement axis, in percent of the full DMX range.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AxisRange {
    min: f64,
    max: f64,
}

impl AxisRange {
    pub fn new(min: f64, max: f64) -> Self {
        let min = if min.is_finite() { min.clamp(0.0, 100.0) } else { 0.0 };
        let max = if max.is_finite() { max.clamp(0.0, 100.0) } else { 100.0 };
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    pub fn full() -> Self {
        Self {
            min: 0.0,
            max: 100.0,
        }
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn min_dmx(&self) -> u8 {
        percent_to_dmx(self.min)
    }

    pub fn max_dmx(&self) -> u8 {
        percent_to_dmx(self.max)
    }

    /// Maps a normalized position (0.0 to 1.0) onto this axis. Positions outside
    /// the unit range are clamped, never wrapped.
    pub fn to_dmx(&self, position: f64) -> u8 {
        let position = if position.is_nan() {
            0.5
        } else {
            position.clamp(0.0, 1.0)
        };
        let percent = self.min + (self.max - self.min) * position;
        percent_to_dmx(percent)
    }
}

impl Default for AxisRange {
    fn default() -> Self {
        Self::full()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PanTiltLimits {
    pub pan: AxisRange,
    pub tilt: AxisRange,
}

impl Fixture {
    pub fn new(
        id: FixtureId,
        name: &str,
        profile: FixtureProfile,
        universe: UniverseId,
        start_address: u16,
    ) -> Self {
        Fixture {
            id,
            name: name.to_string(),
            channels: profile.channel_layout.clone(),
            profile,
            universe,
            start_address,
            pan_tilt_limits: PanTiltLimits::default(),
        }
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Absolute DMX address (1-based) of the channel at `index`.
    pub fn address_of(&self, index: usize) -> Option<u16> {
        if index >= self.channels.len() {
            return None;
        }
        Some(self.start_address + index as u16)
    }

    /// Last address occupied by this fixture.
    pub fn end_address(&self) -> u16 {
        (self.start_address + self.channels.len() as u16).saturating_sub(1)
    }

    /// True when every channel of the fixture lands inside a single universe.
    pub fn fits_universe(&self) -> bool {
        self.start_address >= 1
            && self.start_address as usize + self.channels.len() - 1 <= UNIVERSE_SIZE
    }

    pub fn channel_index(&self, channel_type: &ChannelType) -> Option<usize> {
        self.channels
            .iter()
            .position(|c| &c.channel_type == channel_type)
    }

    pub fn pan_channel(&self) -> Option<usize> {
        self.channel_index(&ChannelType::Pan)
    }

    pub fn tilt_channel(&self) -> Option<usize> {
        self.channel_index(&ChannelType::Tilt)
    }

    pub fn has_pan_tilt(&self) -> bool {
        self.pan_channel().is_some() || self.tilt_channel().is_some()
    }

    pub fn set_pan_tilt_limits(&mut self, pan: AxisRange, tilt: AxisRange) {
        self.pan_tilt_limits = PanTiltLimits { pan, tilt };
    }

    pub fn clear_pan_tilt_limits(&mut self) {
        self.pan_tilt_limits = PanTiltLimits::default();
    }
}

#[macro_export]
macro_rules! channel_layout {
    ($(($name:expr, $type:expr)),* $(,)?) => {
        vec![
            $(
                $crate::Channel {
                    name: $name.to_string(),
                    channel_type: $type,
                },
            )*
        ]
    };
}
