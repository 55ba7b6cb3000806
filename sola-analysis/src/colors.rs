//! Color literals for the editor's color picker.
//!
//! Hex (`#rgb`, `#rrggbb`, `#rrggbbaa`) and functional (`rgb()`, `rgba()`, `hsl()`,
//! `hsla()`) spellings are found anywhere in the text. CSS color names only count when
//! they make up a whole string literal, so `"red"` is a color and `$red` is not.

use crate::edits::SolaTextEdit;
use lsp_types::Color;
use regex::{Captures, Regex};
use sola_syntax::{Position, Range};
use std::sync::OnceLock;

#[derive(Debug, Clone, PartialEq)]
pub struct SolaColorInfo {
    pub range: Range,
    pub color: Color,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolaColorPresentation {
    pub label: String,
    pub edit: SolaTextEdit,
}

const NAMED_COLORS: &[(&str, (u8, u8, u8))] = &[
    ("aqua", (0, 255, 255)),
    ("black", (0, 0, 0)),
    ("blue", (0, 0, 255)),
    ("brown", (165, 42, 42)),
    ("coral", (255, 127, 80)),
    ("crimson", (220, 20, 60)),
    ("cyan", (0, 255, 255)),
    ("darkblue", (0, 0, 139)),
    ("darkgray", (169, 169, 169)),
    ("darkgreen", (0, 100, 0)),
    ("darkred", (139, 0, 0)),
    ("fuchsia", (255, 0, 255)),
    ("gold", (255, 215, 0)),
    ("gray", (128, 128, 128)),
    ("green", (0, 128, 0)),
    ("grey", (128, 128, 128)),
    ("indigo", (75, 0, 130)),
    ("ivory", (255, 255, 240)),
    ("khaki", (240, 230, 140)),
    ("lavender", (230, 230, 250)),
    ("lightblue", (173, 216, 230)),
    ("lightgray", (211, 211, 211)),
    ("lightgreen", (144, 238, 144)),
    ("lime", (0, 255, 0)),
    ("magenta", (255, 0, 255)),
    ("maroon", (128, 0, 0)),
    ("navy", (0, 0, 128)),
    ("olive", (128, 128, 0)),
    ("orange", (255, 165, 0)),
    ("orchid", (218, 112, 214)),
    ("pink", (255, 192, 203)),
    ("plum", (221, 160, 221)),
    ("purple", (128, 0, 128)),
    ("rebeccapurple", (102, 51, 153)),
    ("red", (255, 0, 0)),
    ("salmon", (250, 128, 114)),
    ("silver", (192, 192, 192)),
    ("skyblue", (135, 206, 235)),
    ("steelblue", (70, 130, 180)),
    ("tan", (210, 180, 140)),
    ("teal", (0, 128, 128)),
    ("tomato", (255, 99, 71)),
    ("turquoise", (64, 224, 208)),
    ("violet", (238, 130, 238)),
    ("white", (255, 255, 255)),
    ("yellow", (255, 255, 0)),
];

struct Patterns {
    hex: Regex,
    rgb: Regex,
    hsl: Regex,
    string: Regex,
}

fn patterns() -> Option<&'static Patterns> {
    static PATTERNS: OnceLock<Option<Patterns>> = OnceLock::new();
    PATTERNS
        .get_or_init(|| {
            Some(Patterns {
                hex: Regex::new(r"#([0-9a-fA-F]{8}|[0-9a-fA-F]{6}|[0-9a-fA-F]{3})\b").ok()?,
                rgb: Regex::new(
                    r"rgba?\(\s*(\d{1,3})\s*,\s*(\d{1,3})\s*,\s*(\d{1,3})\s*(?:,\s*(\d*\.?\d+)\s*)?\)",
                )
                .ok()?,
                hsl: Regex::new(
                    r"hsla?\(\s*(\d{1,3})\s*,\s*(\d{1,3})%\s*,\s*(\d{1,3})%\s*(?:,\s*(\d*\.?\d+)\s*)?\)",
                )
                .ok()?,
                string: Regex::new(r#""([A-Za-z]+)"|'([A-Za-z]+)'"#).ok()?,
            })
        })
        .as_ref()
}

fn rgba(red: u8, green: u8, blue: u8, alpha: f32) -> Color {
    Color {
        red: f32::from(red) / 255.0,
        green: f32::from(green) / 255.0,
        blue: f32::from(blue) / 255.0,
        alpha: alpha.clamp(0.0, 1.0),
    }
}

pub fn named_color(name: &str) -> Option<Color> {
    let lower = name.to_ascii_lowercase();
    NAMED_COLORS
        .iter()
        .find(|(candidate, _)| *candidate == lower)
        .map(|(_, (r, g, b))| rgba(*r, *g, *b, 1.0))
}

/// Parses the digits of a hex color, without the `#`.
pub fn parse_hex(digits: &str) -> Option<Color> {
    let channel = |s: &str| u8::from_str_radix(s, 16).ok();
    match digits.len() {
        3 => {
            let mut expanded = String::with_capacity(6);
            for c in digits.chars() {
                expanded.push(c);
                expanded.push(c);
            }
            parse_hex(&expanded)
        }
        6 => Some(rgba(
            channel(&digits[0..2])?,
            channel(&digits[2..4])?,
            channel(&digits[4..6])?,
            1.0,
        )),
        8 => {
            let mut color = parse_hex(&digits[..6])?;
            color.alpha = f32::from(channel(&digits[6..8])?) / 255.0;
            Some(color)
        }
        _ => None,
    }
}

fn byte(captures: &Captures<'_>, group: usize) -> Option<u8> {
    captures.get(group)?.as_str().parse().ok()
}

fn alpha(captures: &Captures<'_>, group: usize) -> Option<f32> {
    match captures.get(group) {
        Some(found) => found.as_str().parse::<f32>().ok().filter(|a| (0.0..=1.0).contains(a)),
        None => Some(1.0),
    }
}

fn parse_rgb(captures: &Captures<'_>) -> Option<Color> {
    Some(rgba(
        byte(captures, 1)?,
        byte(captures, 2)?,
        byte(captures, 3)?,
        alpha(captures, 4)?,
    ))
}

fn parse_hsl(captures: &Captures<'_>) -> Option<Color> {
    let hue: u16 = captures.get(1)?.as_str().parse().ok()?;
    let saturation: u8 = byte(captures, 2)?;
    let lightness: u8 = byte(captures, 3)?;
    if hue > 360 || saturation > 100 || lightness > 100 {
        return None;
    }
    let (red, green, blue) = hsl_to_rgb(
        f32::from(hue),
        f32::from(saturation) / 100.0,
        f32::from(lightness) / 100.0,
    );
    Some(Color {
        red,
        green,
        blue,
        alpha: alpha(captures, 4)?,
    })
}

fn hsl_to_rgb(hue: f32, saturation: f32, lightness: f32) -> (f32, f32, f32) {
    let chroma = (1.0 - (2.0 * lightness - 1.0).abs()) * saturation;
    let sector = (hue % 360.0) / 60.0;
    let x = chroma * (1.0 - (sector % 2.0 - 1.0).abs());
    let (r, g, b) = match sector as u32 {
        0 => (chroma, x, 0.0),
        1 => (x, chroma, 0.0),
        2 => (0.0, chroma, x),
        3 => (0.0, x, chroma),
        4 => (x, 0.0, chroma),
        _ => (chroma, 0.0, x),
    };
    let m = lightness - chroma / 2.0;
    (r + m, g + m, b + m)
}

/// Hue in degrees, saturation and lightness in percent.
fn rgb_to_hsl(color: &Color) -> (u32, u32, u32) {
    let (r, g, b) = (color.red, color.green, color.blue);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let lightness = (max + min) / 2.0;
    let delta = max - min;
    if delta.abs() < f32::EPSILON {
        return (0, 0, (lightness * 100.0).round() as u32);
    }
    let saturation = delta / (1.0 - (2.0 * lightness - 1.0).abs());
    let hue = if max == r {
        60.0 * (((g - b) / delta).rem_euclid(6.0))
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };
    (
        hue.round() as u32 % 360,
        (saturation * 100.0).round() as u32,
        (lightness * 100.0).round() as u32,
    )
}

fn line_range(line_no: u32, line: &str, start: usize, end: usize) -> Range {
    let start_col = line[..start].chars().count() as u32 + 1;
    let end_col = start_col + line[start..end].chars().count() as u32;
    Range::new(Position::new(line_no, start_col), Position::new(line_no, end_col))
}

pub fn document_colors(text: &str) -> Vec<SolaColorInfo> {
    let Some(patterns) = patterns() else {
        return Vec::new();
    };
    let mut colors = Vec::new();
    for (idx, line) in text.split('\n').enumerate() {
        let line_no = idx as u32 + 1;
        let mut push = |start: usize, end: usize, color: Option<Color>| {
            if let Some(color) = color {
                colors.push(SolaColorInfo {
                    range: line_range(line_no, line, start, end),
                    color,
                });
            }
        };
        for captures in patterns.hex.captures_iter(line) {
            if let (Some(whole), Some(digits)) = (captures.get(0), captures.get(1)) {
                push(whole.start(), whole.end(), parse_hex(digits.as_str()));
            }
        }
        for captures in patterns.rgb.captures_iter(line) {
            if let Some(whole) = captures.get(0) {
                push(whole.start(), whole.end(), parse_rgb(&captures));
            }
        }
        for captures in patterns.hsl.captures_iter(line) {
            if let Some(whole) = captures.get(0) {
                push(whole.start(), whole.end(), parse_hsl(&captures));
            }
        }
        for captures in patterns.string.captures_iter(line) {
            if let Some(name) = captures.get(1).or_else(|| captures.get(2)) {
                push(name.start(), name.end(), named_color(name.as_str()));
            }
        }
    }
    colors.sort_by_key(|info| info.range.start);
    colors
}

fn channel(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

fn format_alpha(alpha: f32) -> String {
    let text = format!("{alpha:.2}");
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// The hex, `rgb` and `hsl` spellings of `color`, each replacing `range`.
pub fn color_presentations(color: &Color, range: Range) -> Vec<SolaColorPresentation> {
    let (r, g, b) = (channel(color.red), channel(color.green), channel(color.blue));
    let opaque = color.alpha >= 1.0;
    let (h, s, l) = rgb_to_hsl(color);

    let hex = if opaque {
        format!("#{r:02x}{g:02x}{b:02x}")
    } else {
        format!("#{r:02x}{g:02x}{b:02x}{:02x}", channel(color.alpha))
    };
    let rgb = if opaque {
        format!("rgb({r}, {g}, {b})")
    } else {
        format!("rgba({r}, {g}, {b}, {})", format_alpha(color.alpha))
    };
    let hsl = if opaque {
        format!("hsl({h}, {s}%, {l}%)")
    } else {
        format!("hsla({h}, {s}%, {l}%, {})", format_alpha(color.alpha))
    };

    [hex, rgb, hsl]
        .into_iter()
        .map(|label| SolaColorPresentation {
            edit: SolaTextEdit::replace(range, label.clone()),
            label,
        })
        .collect()
}
