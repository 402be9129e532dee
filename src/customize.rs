//! Customization configuration and its mapping to material properties.
//!
//! The customization form owns this data; the viewer only reads it. Style
//! selectors (hair, clothing, facial hair, accessories) are accepted but have
//! no realized 3D geometry yet, so only the color fields map to material
//! properties. The mapping is an explicit transform, not dispatch over field
//! names, so unmapped fields stay auditable.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// An sRGB color, components in 0.0..=1.0.
///
/// Serialized as a `#rrggbb` hex string to match what color pickers produce.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// As an RGBA array with the given alpha, for uniform upload.
    pub fn to_array(self, alpha: f32) -> [f32; 4] {
        [self.r, self.g, self.b, alpha]
    }
}

impl FromStr for Rgb {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.strip_prefix('#').unwrap_or(s);
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(format!("expected #rrggbb color, got {s:?}"));
        }
        let value =
            u32::from_str_radix(hex, 16).map_err(|_| format!("expected #rrggbb color, got {s:?}"))?;
        Ok(Self {
            r: ((value >> 16) & 0xff) as f32 / 255.0,
            g: ((value >> 8) & 0xff) as f32 / 255.0,
            b: (value & 0xff) as f32 / 255.0,
        })
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let to_byte = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        write!(
            f,
            "#{:02x}{:02x}{:02x}",
            to_byte(self.r),
            to_byte(self.g),
            to_byte(self.b)
        )
    }
}

impl Serialize for Rgb {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Rgb {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Neutral defaults used when the form omits a color field.
pub const DEFAULT_SKIN_TONE: Rgb = Rgb::new(0xf5 as f32 / 255.0, 0xd1 as f32 / 255.0, 0xb8 as f32 / 255.0);
pub const DEFAULT_EYE_COLOR: Rgb = Rgb::new(0x2b as f32 / 255.0, 0x6c as f32 / 255.0, 0xb0 as f32 / 255.0);

/// Hair style selector
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HairStyle {
    None,
    #[default]
    Short,
    Long,
    Curly,
    Straight,
}

/// Clothing style selector
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClothingStyle {
    #[default]
    Shirt,
    Jacket,
    Hoodie,
    Pants,
    Shorts,
    Skirt,
}

/// Facial hair style selector
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacialHairStyle {
    #[default]
    None,
    Beard,
    Moustache,
}

/// Accessory style selector
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessoryStyle {
    #[default]
    None,
    Glasses,
    Earrings,
    Hat,
}

/// The full customization form state. Unknown JSON fields are ignored and
/// missing fields fall back to defaults, so any subset may be sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Customization {
    pub hair: HairStyle,
    pub clothing: ClothingStyle,
    pub facial_hair: FacialHairStyle,
    pub accessory: AccessoryStyle,
    pub skin_tone: Rgb,
    pub eye_color: Rgb,
}

impl Default for Customization {
    fn default() -> Self {
        Self {
            hair: HairStyle::default(),
            clothing: ClothingStyle::default(),
            facial_hair: FacialHairStyle::default(),
            accessory: AccessoryStyle::default(),
            skin_tone: DEFAULT_SKIN_TONE,
            eye_color: DEFAULT_EYE_COLOR,
        }
    }
}

/// The realized visual mapping of a customization: everything that actually
/// reaches the avatar material.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaterialParams {
    pub skin: Rgb,
    pub eye: Rgb,
}

impl Default for MaterialParams {
    fn default() -> Self {
        Self {
            skin: DEFAULT_SKIN_TONE,
            eye: DEFAULT_EYE_COLOR,
        }
    }
}

impl Customization {
    /// Map the form state to material properties.
    ///
    /// Only `skin_tone` and `eye_color` have a realized representation;
    /// style selectors are intentionally absent from the output.
    pub fn material_params(&self) -> MaterialParams {
        MaterialParams {
            skin: self.skin_tone,
            eye: self.eye_color,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgb_parse_roundtrip() {
        let c: Rgb = "#f5d1b8".parse().unwrap();
        assert!((c.r - 245.0 / 255.0).abs() < 1e-6);
        assert!((c.g - 209.0 / 255.0).abs() < 1e-6);
        assert!((c.b - 184.0 / 255.0).abs() < 1e-6);
        assert_eq!(c.to_string(), "#f5d1b8");
    }

    #[test]
    fn test_rgb_parse_rejects_garbage() {
        assert!("not-a-color".parse::<Rgb>().is_err());
        assert!("#fff".parse::<Rgb>().is_err());
        assert!("#gggggg".parse::<Rgb>().is_err());
    }

    #[test]
    fn test_defaults_match_neutral_palette() {
        let c = Customization::default();
        assert_eq!(c.skin_tone.to_string(), "#f5d1b8");
        assert_eq!(c.eye_color.to_string(), "#2b6cb0");
        assert_eq!(c.hair, HairStyle::Short);
        assert_eq!(c.clothing, ClothingStyle::Shirt);
    }

    #[test]
    fn test_style_only_change_produces_no_material_diff() {
        let base = Customization::default();
        let mut styled = base.clone();
        styled.hair = HairStyle::Curly;
        styled.clothing = ClothingStyle::Hoodie;
        styled.facial_hair = FacialHairStyle::Beard;
        styled.accessory = AccessoryStyle::Glasses;

        assert_eq!(base.material_params(), styled.material_params());
    }

    #[test]
    fn test_skin_change_touches_only_skin() {
        let base = Customization::default();
        let mut changed = base.clone();
        changed.skin_tone = "#804020".parse().unwrap();

        let before = base.material_params();
        let after = changed.material_params();
        assert_ne!(before.skin, after.skin);
        assert_eq!(before.eye, after.eye);
    }

    #[test]
    fn test_json_ignores_unknown_and_misses_fallback() {
        let json = r##"{"skinTone":"#ffffff","futureField":42}"##;
        let c: Customization = serde_json::from_str(json).unwrap();
        assert_eq!(c.skin_tone, Rgb::new(1.0, 1.0, 1.0));
        // omitted fields fall back to defaults
        assert_eq!(c.eye_color, DEFAULT_EYE_COLOR);
        assert_eq!(c.hair, HairStyle::Short);
    }

    #[test]
    fn test_json_style_values() {
        let json = r#"{"hair":"long","clothing":"skirt","facialHair":"moustache","accessory":"hat"}"#;
        let c: Customization = serde_json::from_str(json).unwrap();
        assert_eq!(c.hair, HairStyle::Long);
        assert_eq!(c.clothing, ClothingStyle::Skirt);
        assert_eq!(c.facial_hair, FacialHairStyle::Moustache);
        assert_eq!(c.accessory, AccessoryStyle::Hat);
    }
}
