//! Hex color parsing for appearance settings

/// RGBA color parsed from a hex string
///
/// Accepts `RRGGBB` (opaque) and `AARRGGBB`, with or without a leading `#`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HexColor {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    pub alpha: u8,
}

impl HexColor {
    pub fn parse(input: &str) -> Option<Self> {
        let hex = input.trim().trim_start_matches('#');
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let value = u32::from_str_radix(hex, 16).ok()?;
        match hex.len() {
            6 => Some(Self::from_argb32(0xFF00_0000 | value)),
            8 => Some(Self::from_argb32(value)),
            _ => None,
        }
    }

    pub fn from_argb32(argb: u32) -> Self {
        Self {
            alpha: (argb >> 24) as u8,
            red: (argb >> 16) as u8,
            green: (argb >> 8) as u8,
            blue: argb as u8,
        }
    }

    pub fn to_skia(&self) -> tiny_skia::Color {
        tiny_skia::Color::from_rgba8(self.red, self.green, self.blue, self.alpha)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rgb_is_opaque() {
        let color = HexColor::parse("#336699").unwrap();
        assert_eq!(color, HexColor { red: 0x33, green: 0x66, blue: 0x99, alpha: 0xFF });
    }

    #[test]
    fn test_parse_argb() {
        let color = HexColor::parse("80FF0000").unwrap();
        assert_eq!(color.alpha, 0x80);
        assert_eq!(color.red, 0xFF);
        assert_eq!((color.green, color.blue), (0, 0));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(HexColor::parse("invalid"), None);
        assert_eq!(HexColor::parse("#12345"), None);
        assert_eq!(HexColor::parse("+12345"), None);
        assert_eq!(HexColor::parse(""), None);
    }
}
