use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{channel_layout, Channel, ChannelType, FixtureType};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FixtureProfile {
    pub id: String,
    pub fixture_type: FixtureType,
    pub manufacturer: String,
    pub model: String,
    pub channel_layout: Vec<Channel>,
}

impl std::fmt::Display for FixtureProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.manufacturer, self.model)
    }
}

#[derive(Default)]
pub struct FixtureLibrary {
    pub profiles: HashMap<String, FixtureProfile>,
}

impl FixtureLibrary {
    pub fn new() -> Self {
        let mut library = FixtureLibrary {
            profiles: HashMap::new(),
        };

        library.add(
            "shehds-rgbw-par",
            FixtureType::PAR,
            "Shehds",
            "LED Flat PAR 12x3W RGBW",
            channel_layout![
                ("Dimmer", ChannelType::Dimmer),
                ("Red", ChannelType::Red),
                ("Green", ChannelType::Green),
                ("Blue", ChannelType::Blue),
                ("White", ChannelType::White),
                ("Strobe", ChannelType::Strobe),
                ("Program", ChannelType::Other("Program".to_string())),
                ("Function", ChannelType::Other("Function".to_string())),
            ],
        );

        library.add(
            "shehds-led-spot-60w",
            FixtureType::MovingHead,
            "Shehds",
            "LED Spot 60W Lighting",
            channel_layout![
                ("Pan", ChannelType::Pan),
                ("Tilt", ChannelType::Tilt),
                ("Color", ChannelType::Color),
                ("Gobo", ChannelType::Gobo),
                ("Strobe", ChannelType::Strobe),
                ("Dimmer", ChannelType::Dimmer),
                ("Speed", ChannelType::Other("Speed".to_string())),
                ("Auto", ChannelType::Other("Auto".to_string())),
                ("Reset", ChannelType::Other("Reset".to_string())),
            ],
        );

        library.add(
            "shehds-led-wash-7x18w-rgbwa-uv",
            FixtureType::Wash,
            "Shehds",
            "LED Wash 7x18W RGBWA+UV",
            channel_layout![
                ("Pan", ChannelType::Pan),
                ("Tilt", ChannelType::Tilt),
                ("Dimmer", ChannelType::Dimmer),
                ("Red", ChannelType::Red),
                ("Green", ChannelType::Green),
                ("Blue", ChannelType::Blue),
                ("White", ChannelType::White),
                ("Amber", ChannelType::Amber),
                ("UV", ChannelType::UV),
                // XY speed on most units of this type
                ("Function", ChannelType::Other("Function".to_string())),
            ],
        );

        library.add(
            "shehds-mini-led-pinspot-10w",
            FixtureType::Pinspot,
            "Shehds",
            "Mini LED Pinspot 10W",
            channel_layout![
                ("Dimmer", ChannelType::Dimmer),
                ("Red", ChannelType::Red),
                ("Green", ChannelType::Green),
                ("Blue", ChannelType::Blue),
                ("White", ChannelType::White),
                ("Strobe", ChannelType::Strobe),
                // 0-50: no effect
                // 51-100: color selection mode
                // 101-150: Jump mode
                // 151-200: Gradient mode
                // 201-250: Automatic mode
                // 251-255: Voice control mode
                ("Function", ChannelType::Other("Function".to_string())),
                ("Speed", ChannelType::Other("FunctionSpeed".to_string())),
            ],
        );

        library.add(
            "dl-geyser-1000-led-smoke-machine-1000w-3x9w-rgb",
            FixtureType::Smoke,
            "DL Geyser",
            "DL Geyser 1000 LED Smoke Machine",
            channel_layout![
                ("Smoke", ChannelType::Other("Smoke".to_string())),
                ("Red", ChannelType::Red),
                ("Green", ChannelType::Green),
                ("Blue", ChannelType::Blue),
                ("Strobe", ChannelType::Strobe),
                // 0-50: Off, 51-100: Jump, 101-200: Gradient, 201-255: Color Strobe
                ("Effect", ChannelType::Other("Function".to_string())),
                ("Speed", ChannelType::Other("FunctionSpeed".to_string())),
            ],
        );

        library.add(
            "generic-dimmer",
            FixtureType::Dimmer,
            "Generic",
            "Dimmer",
            channel_layout![("Dimmer", ChannelType::Dimmer)],
        );

        library.add(
            "generic-rgb",
            FixtureType::PAR,
            "Generic",
            "RGB",
            channel_layout![
                ("Red", ChannelType::Red),
                ("Green", ChannelType::Green),
                ("Blue", ChannelType::Blue),
            ],
        );

        library
    }

    fn add(
        &mut self,
        id: &str,
        fixture_type: FixtureType,
        manufacturer: &str,
        model: &str,
        channel_layout: Vec<Channel>,
    ) {
        self.profiles.insert(
            id.to_string(),
            FixtureProfile {
                id: id.to_string(),
                fixture_type,
                manufacturer: manufacturer.to_string(),
                model: model.to_string(),
                channel_layout,
            },
        );
    }

    pub fn get(&self, id: &str) -> Option<&FixtureProfile> {
        self.profiles.get(id)
    }

    /// Profiles as (id, display name) pairs, sorted by id.
    pub fn list(&self) -> Vec<(String, String)> {
        let mut list: Vec<_> = self
            .profiles
            .values()
            .map(|p| (p.id.clone(), p.to_string()))
            .collect();
        list.sort();
        list
    }
}
