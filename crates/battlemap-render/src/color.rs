//! CSS hex colours as stored on elements.

use crate::renderer::{RenderResult, RendererError};
use peniko::Color;

/// Straight-alpha RGBA bytes.
pub type Rgba = [u8; 4];

/// Parse `#rgb`, `#rgba`, `#rrggbb` or `#rrggbbaa`.
pub fn parse_hex(value: &str) -> RenderResult<Rgba> {
    let invalid = || RendererError::InvalidColor(value.to_string());
    let hex = value.trim().strip_prefix('#').ok_or_else(invalid)?;
    if !hex.is_ascii() {
        return Err(invalid());
    }

    let nibble = |i: usize| u8::from_str_radix(&hex[i..=i], 16).map(|n| n * 17);
    let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16);

    let rgba = match hex.len() {
        3 => [nibble(0), nibble(1), nibble(2), Ok(255)],
        4 => [nibble(0), nibble(1), nibble(2), nibble(3)],
        6 => [byte(0), byte(2), byte(4), Ok(255)],
        8 => [byte(0), byte(2), byte(4), byte(6)],
        _ => return Err(invalid()),
    };

    let mut out = [0u8; 4];
    for (slot, channel) in out.iter_mut().zip(rgba) {
        *slot = channel.map_err(|_| invalid())?;
    }
    Ok(out)
}

/// Same colour with alpha multiplied by `factor`.
pub fn fade(rgba: Rgba, factor: f64) -> Rgba {
    let [r, g, b, a] = rgba;
    [r, g, b, (a as f64 * factor.clamp(0.0, 1.0)).round() as u8]
}

pub fn to_color(rgba: Rgba) -> Color {
    let [r, g, b, a] = rgba;
    Color::from_rgba8(r, g, b, a)
}
