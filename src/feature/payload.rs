use derive_builder::Builder;
use palette::Srgb;
use serde::{Deserialize, Serialize};

/// RGB triple as sent on the wire, `[r, g, b]`
pub type Rgb = [u8; 3];

/// Desired visual state of one or more segments.
///
/// Every field is optional and an absent field is left unchanged on the
/// controller, which is not the same as sending `0`. Field names match the
/// controller's segment object, with the longer names accepted as aliases.
#[derive(Builder, Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[builder(setter(into, strip_option), default)]
pub struct CommandPayload {
    #[serde(rename = "fx", alias = "effect", skip_serializing_if = "Option::is_none")]
    pub effect: Option<u16>,

    #[serde(rename = "pal", alias = "palette", skip_serializing_if = "Option::is_none")]
    pub palette: Option<u16>,

    #[serde(rename = "sx", alias = "speed", skip_serializing_if = "Option::is_none")]
    pub speed: Option<u8>,

    #[serde(rename = "ix", alias = "intensity", skip_serializing_if = "Option::is_none")]
    pub intensity: Option<u8>,

    #[serde(rename = "col", alias = "colors", skip_serializing_if = "Option::is_none")]
    pub colors: Option<Vec<Rgb>>,
}

impl CommandPayload {
    /// Solid effect showing a single primary color
    pub fn solid_color(color: Rgb) -> CommandPayload {
        CommandPayload {
            effect: Some(0),
            colors: Some(vec![color]),
            ..Default::default()
        }
    }
}

/// Parses a strict `#RRGGBB` hex color.
pub fn parse_hex_color(s: &str) -> Option<Rgb> {
    let hex = s.strip_prefix('#')?;
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }

    let color: Srgb<u8> = s.parse().ok()?;
    let (r, g, b) = color.into_components();

    Some([r, g, b])
}
