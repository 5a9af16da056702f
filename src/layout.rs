use std::collections::HashMap;

use crate::error::{CertError, Result};

pub const POSITION_RANGE: (f32, f32) = (0.0, 500.0);
pub const FONT_SIZE_RANGE: (f32, f32) = (8.0, 30.0);

pub const DEFAULT_X: f32 = 100.0;
pub const DEFAULT_Y: f32 = 150.0;
pub const DEFAULT_FONT_SIZE: f32 = 12.0;
pub const DEFAULT_COLOR: &str = "#000000";

/// Form key prefix for the certificate number controls.
pub const NUMBER_KEY: &str = "number";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FontFamily {
    #[default]
    Helv,
    Times,
    Courier,
    Helvetica,
    Arial,
}

impl FontFamily {
    pub const ALL: [FontFamily; 5] = [
        FontFamily::Helv,
        FontFamily::Times,
        FontFamily::Courier,
        FontFamily::Helvetica,
        FontFamily::Arial,
    ];

    pub fn id(self) -> &'static str {
        match self {
            FontFamily::Helv => "helv",
            FontFamily::Times => "times",
            FontFamily::Courier => "courier",
            FontFamily::Helvetica => "helvetica",
            FontFamily::Arial => "arial",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|f| f.id() == value)
            .ok_or_else(|| CertError::InvalidLayout(format!("unknown font '{}'", value)))
    }

    /// Base-14 PostScript name for the regular or bold face.
    pub fn base_font(self, bold: bool) -> &'static str {
        match (self, bold) {
            (FontFamily::Times, false) => "Times-Roman",
            (FontFamily::Times, true) => "Times-Bold",
            (FontFamily::Courier, false) => "Courier",
            (FontFamily::Courier, true) => "Courier-Bold",
            (_, false) => "Helvetica",
            (_, true) => "Helvetica-Bold",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const BLACK: Color = Color { r: 0.0, g: 0.0, b: 0.0 };

    pub fn from_hex(hex: &str) -> Result<Self> {
        let digits = hex.trim().trim_start_matches('#');
        let expanded: String = match digits.len() {
            3 => digits.chars().flat_map(|c| [c, c]).collect(),
            6 => digits.to_string(),
            _ => return Err(CertError::InvalidLayout(format!("invalid color '{}'", hex))),
        };

        let channel = |i: usize| {
            expanded
                .get(i..i + 2)
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .map(|v| v as f32 / 255.0)
                .ok_or_else(|| CertError::InvalidLayout(format!("invalid color '{}'", hex)))
        };

        Ok(Self {
            r: channel(0)?,
            g: channel(2)?,
            b: channel(4)?,
        })
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::BLACK
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    pub font: FontFamily,
    pub size: f32,
    pub color: Color,
    pub bold: bool,
}

impl TextStyle {
    pub fn base_font(&self) -> &'static str {
        self.font.base_font(self.bold)
    }
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font: FontFamily::default(),
            size: DEFAULT_FONT_SIZE,
            color: Color::BLACK,
            bold: false,
        }
    }
}

/// Baseline origin of one text field, measured from the top-left page corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub x: f32,
    pub y: f32,
    pub style: TextStyle,
}

impl Default for Placement {
    fn default() -> Self {
        Self {
            x: DEFAULT_X,
            y: DEFAULT_Y,
            style: TextStyle::default(),
        }
    }
}

impl Placement {
    fn from_fields(prefix: &str, fields: &HashMap<String, String>) -> Result<Self> {
        let value = |key: &str| {
            fields
                .get(&format!("{}.{}", prefix, key))
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
        };

        let number = |key: &str, default: f32, (min, max): (f32, f32)| -> Result<f32> {
            let parsed = match value(key) {
                Some(raw) => raw.parse::<f32>().map_err(|_| {
                    CertError::InvalidLayout(format!("{} {}: '{}' is not a number", prefix, key, raw))
                })?,
                None => default,
            };
            if !(min..=max).contains(&parsed) {
                return Err(CertError::InvalidLayout(format!(
                    "{} {} must be between {} and {}",
                    prefix, key, min, max
                )));
            }
            Ok(parsed)
        };

        let font = match value("font") {
            Some(raw) => FontFamily::parse(raw)?,
            None => FontFamily::default(),
        };
        let color = Color::from_hex(value("color").unwrap_or(DEFAULT_COLOR))?;
        let bold = matches!(value("bold"), Some("on" | "true" | "1" | "yes"));

        Ok(Self {
            x: number("x", DEFAULT_X, POSITION_RANGE)?,
            y: number("y", DEFAULT_Y, POSITION_RANGE)?,
            style: TextStyle {
                font,
                size: number("size", DEFAULT_FONT_SIZE, FONT_SIZE_RANGE)?,
                color,
                bold,
            },
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CertificateLayout {
    pub number: Placement,
    pub attributes: Vec<(String, Placement)>,
}

impl CertificateLayout {
    /// Builds the layout from flat form fields such as `number.x` or `Nama.color`.
    pub fn from_fields(fields: &HashMap<String, String>, selected: &[String]) -> Result<Self> {
        let number = Placement::from_fields(NUMBER_KEY, fields)?;
        let attributes = selected
            .iter()
            .map(|name| {
                if name == NUMBER_KEY {
                    return Err(CertError::InvalidLayout(format!(
                        "'{}' is reserved for the certificate number",
                        name
                    )));
                }
                Ok((name.clone(), Placement::from_fields(name, fields)?))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { number, attributes })
    }

    pub fn attribute_names(&self) -> Vec<&str> {
        self.attributes.iter().map(|(name, _)| name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn hex_colors_parse_to_fractions() {
        let c = Color::from_hex("#FF8000").unwrap();
        assert_eq!(c.r, 1.0);
        assert!((c.g - 128.0 / 255.0).abs() < 1e-6);
        assert_eq!(c.b, 0.0);

        assert_eq!(Color::from_hex("fff").unwrap(), Color { r: 1.0, g: 1.0, b: 1.0 });
        assert!(Color::from_hex("#12345").is_err());
        assert!(Color::from_hex("#GG0000").is_err());
    }

    #[test]
    fn bold_selects_bold_base_font() {
        assert_eq!(FontFamily::Helv.base_font(false), "Helvetica");
        assert_eq!(FontFamily::Arial.base_font(true), "Helvetica-Bold");
        assert_eq!(FontFamily::Times.base_font(true), "Times-Bold");
        assert_eq!(FontFamily::Courier.base_font(false), "Courier");
        assert!(FontFamily::parse("comic").is_err());
        assert_eq!(FontFamily::parse(" Times ").unwrap(), FontFamily::Times);
    }

    #[test]
    fn missing_fields_fall_back_to_form_defaults() {
        let layout = CertificateLayout::from_fields(&HashMap::new(), &["Nama".to_string()]).unwrap();
        assert_eq!(layout.number, Placement::default());
        assert_eq!(layout.attributes.len(), 1);
        assert_eq!(layout.attributes[0].1.x, DEFAULT_X);
        assert_eq!(layout.attributes[0].1.style.size, DEFAULT_FONT_SIZE);
    }

    #[test]
    fn layout_reads_number_and_attribute_fields_in_selection_order() {
        let form = fields(&[
            ("number.x", "420"),
            ("number.y", "60"),
            ("number.size", "10"),
            ("number.font", "courier"),
            ("number.bold", "on"),
            ("NIP.x", "200"),
            ("NIP.color", "#0000ff"),
            ("Nama.y", "300"),
            ("Nama.font", "times"),
        ]);
        let selected = vec!["NIP".to_string(), "Nama".to_string()];
        let layout = CertificateLayout::from_fields(&form, &selected).unwrap();

        assert_eq!(layout.number.x, 420.0);
        assert_eq!(layout.number.style.base_font(), "Courier-Bold");
        assert_eq!(layout.attribute_names(), vec!["NIP", "Nama"]);
        assert_eq!(layout.attributes[0].1.style.color.b, 1.0);
        assert_eq!(layout.attributes[1].1.y, 300.0);
        assert!(!layout.attributes[1].1.style.bold);
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let too_far = fields(&[("number.x", "501")]);
        assert!(CertificateLayout::from_fields(&too_far, &[]).is_err());

        let too_small = fields(&[("Nama.size", "4")]);
        assert!(CertificateLayout::from_fields(&too_small, &["Nama".to_string()]).is_err());

        let garbage = fields(&[("number.y", "abc")]);
        assert!(matches!(
            CertificateLayout::from_fields(&garbage, &[]),
            Err(CertError::InvalidLayout(_))
        ));
    }

    #[test]
    fn attribute_cannot_reuse_the_number_controls() {
        let form = fields(&[("number.x", "10")]);
        assert!(matches!(
            CertificateLayout::from_fields(&form, &[NUMBER_KEY.to_string()]),
            Err(CertError::InvalidLayout(_))
        ));
    }
}
