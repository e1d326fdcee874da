//! Maps emulator colors to the tokens `CharacterCell` carries: either a
//! named CSS class the SVG template's stylesheet defines, or an explicit
//! `#RRGGBB` literal for colors outside the 16-color ANSI palette.
//!
//! Named colors are left as tokens rather than resolved to hex here, since
//! the template (not this crate) owns the palette; only the 216-color cube
//! and 24-step grayscale ramp have no template class to fall back on, so
//! those are rendered as hex.

use alacritty_terminal::vte::ansi::{Color, NamedColor};

pub(crate) fn color_token(color: Color) -> String {
    match color {
        Color::Named(named) => named_token(named).to_owned(),
        Color::Indexed(index) => indexed_token(index),
        Color::Spec(rgb) => format!("#{:02x}{:02x}{:02x}", rgb.r, rgb.g, rgb.b),
    }
}

fn named_token(named: NamedColor) -> &'static str {
    use NamedColor::*;
    match named {
        Black => "black",
        Red => "red",
        Green => "green",
        Yellow => "yellow",
        Blue => "blue",
        Magenta => "magenta",
        Cyan => "cyan",
        White => "white",
        BrightBlack => "bright-black",
        BrightRed => "bright-red",
        BrightGreen => "bright-green",
        BrightYellow => "bright-yellow",
        BrightBlue => "bright-blue",
        BrightMagenta => "bright-magenta",
        BrightCyan => "bright-cyan",
        BrightWhite => "bright-white",
        Foreground => "foreground",
        Background => "background",
        Cursor => "cursor",
        DimBlack => "dim-black",
        DimRed => "dim-red",
        DimGreen => "dim-green",
        DimYellow => "dim-yellow",
        DimBlue => "dim-blue",
        DimMagenta => "dim-magenta",
        DimCyan => "dim-cyan",
        DimWhite => "dim-white",
        BrightForeground => "bright-foreground",
        DimForeground => "dim-foreground",
    }
}

const NAMED_BY_INDEX: [NamedColor; 16] = [
    NamedColor::Black,
    NamedColor::Red,
    NamedColor::Green,
    NamedColor::Yellow,
    NamedColor::Blue,
    NamedColor::Magenta,
    NamedColor::Cyan,
    NamedColor::White,
    NamedColor::BrightBlack,
    NamedColor::BrightRed,
    NamedColor::BrightGreen,
    NamedColor::BrightYellow,
    NamedColor::BrightBlue,
    NamedColor::BrightMagenta,
    NamedColor::BrightCyan,
    NamedColor::BrightWhite,
];

fn indexed_token(index: u8) -> String {
    if (index as usize) < 16 {
        return named_token(NAMED_BY_INDEX[index as usize]).to_owned();
    }

    let (r, g, b) = indexed_rgb(index);
    format!("#{r:02x}{g:02x}{b:02x}")
}

/// 216-color cube (16..=231) and 24-step grayscale ramp (232..=255).
/// Adapted from: https://github.com/alacritty/alacritty/blob/da554e41f3a91ed6cc5db66b23bf65c58529db83/alacritty/src/display/color.rs#L91-L139
fn indexed_rgb(index: u8) -> (u8, u8, u8) {
    let index = index as u32;
    if index < 232 {
        let cube = index - 16;
        let r = cube / 36;
        let g = (cube / 6) % 6;
        let b = cube % 6;
        let scale = |c: u32| if c == 0 { 0 } else { (c * 40 + 55) as u8 };
        (scale(r), scale(g), scale(b))
    } else {
        let value = ((index - 232) * 10 + 8) as u8;
        (value, value, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alacritty_terminal::vte::ansi::Rgb;

    #[test]
    fn named_colors_map_to_tokens() {
        assert_eq!(color_token(Color::Named(NamedColor::Foreground)), "foreground");
        assert_eq!(color_token(Color::Named(NamedColor::Background)), "background");
        assert_eq!(color_token(Color::Named(NamedColor::Red)), "red");
    }

    #[test]
    fn indexed_low_colors_map_to_named_tokens() {
        assert_eq!(color_token(Color::Indexed(1)), "red");
        assert_eq!(color_token(Color::Indexed(9)), "bright-red");
    }

    #[test]
    fn indexed_cube_color_is_hex() {
        // index 16 is the cube's (0,0,0) corner, pure black.
        assert_eq!(color_token(Color::Indexed(16)), "#000000");
        // index 231 is the cube's (5,5,5) corner, pure white.
        assert_eq!(color_token(Color::Indexed(231)), "#ffffff");
    }

    #[test]
    fn indexed_gray_ramp_is_hex() {
        assert_eq!(color_token(Color::Indexed(232)), "#080808");
        assert_eq!(color_token(Color::Indexed(255)), "#eeeeee");
    }

    #[test]
    fn spec_rgb_is_hex() {
        let rgb = Rgb { r: 18, g: 52, b: 86 };
        assert_eq!(color_token(Color::Spec(rgb)), "#123456");
    }
}
