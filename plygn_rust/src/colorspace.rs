use anyhow::{bail, Error, Result};
use palette::{FromColor, Hsl, Hsv, Srgb};
use std::fmt;
use std::str::FromStr;

/// Space in which unique colors are clustered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ColorSpace {
    #[default]
    Rgb,
    Hsv,
    Hsl,
}

impl FromStr for ColorSpace {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "rgb" => Ok(Self::Rgb),
            "hsv" => Ok(Self::Hsv),
            "hsl" | "hls" => Ok(Self::Hsl),
            other => bail!("unsupported color space '{}' (expected rgb, hsv or hsl)", other),
        }
    }
}

impl fmt::Display for ColorSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Rgb => "RGB",
            Self::Hsv => "HSV",
            Self::Hsl => "HSL",
        };
        f.write_str(name)
    }
}

#[inline]
fn to_srgb(c: [u8; 3]) -> Srgb<f32> {
    Srgb::new(c[0], c[1], c[2]).into_format()
}

// Hue is embedded on a circle scaled by saturation, so 0° and 360° land on the
// same point. Channels are rescaled to 0..=255 to keep the axes comparable with RGB.
#[inline]
fn cylinder(hue_radians: f32, saturation: f32, third: f32) -> [f64; 3] {
    let s = saturation as f64 * 255.0;
    let h = hue_radians as f64;
    [s * h.sin(), s * h.cos(), third as f64 * 255.0]
}

impl ColorSpace {
    /// Map an 8-bit RGB color to clustering coordinates.
    pub fn project(self, c: [u8; 3]) -> [f64; 3] {
        match self {
            Self::Rgb => [c[0] as f64, c[1] as f64, c[2] as f64],
            Self::Hsv => {
                let hsv = Hsv::from_color(to_srgb(c));
                cylinder(hsv.hue.into_radians(), hsv.saturation, hsv.value)
            }
            Self::Hsl => {
                let hsl = Hsl::from_color(to_srgb(c));
                cylinder(hsl.hue.into_radians(), hsl.saturation, hsl.lightness)
            }
        }
    }

    pub fn project_all(self, colors: &[[u8; 3]]) -> Vec<[f64; 3]> {
        colors.iter().map(|&c| self.project(c)).collect()
    }
}
