//! `#` color escapes and their translation to ANSI at the descriptor edge.
//!
//! Game text carries `#` escapes (`#R` red, `#n` reset, `#xNNN` xterm-256,
//! `#tRRGGBB` truecolor). Translation happens once, in the output pipeline,
//! against the capabilities the client negotiated: truecolor clients get
//! 24-bit SGR, 256-color clients get a downmixed palette index, plain ANSI
//! clients get the nearest basic color, and everyone else gets the escapes
//! stripped. `##` always yields a literal `#` and `#-` a literal `~`.

use crate::utf8;

/// What the client can render, decided during capability detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorMode {
    /// Strip all color.
    #[default]
    None,
    /// Basic 8/16-color SGR.
    Ansi,
    /// xterm-256 palette.
    Xterm256,
    /// 24-bit SGR.
    TrueColor,
}

/// Basic SGR code for a single-letter color escape, bright flag included.
/// Returns `None` for letters that are not color codes.
fn basic_code(c: char) -> Option<(u8, bool)> {
    match c {
        'r' => Some((31, false)),
        'g' => Some((32, false)),
        'y' => Some((33, false)),
        'b' => Some((34, false)),
        'p' => Some((35, false)),
        'c' => Some((36, false)),
        'w' => Some((37, false)),
        'R' => Some((31, true)),
        'G' => Some((32, true)),
        'Y' => Some((33, true)),
        'B' => Some((34, true)),
        'P' => Some((35, true)),
        'C' => Some((36, true)),
        'W' => Some((37, true)),
        'L' => Some((37, true)),
        '0' => Some((30, true)),
        '1' => Some((31, false)),
        '2' => Some((32, false)),
        '3' => Some((33, false)),
        '4' => Some((34, false)),
        '5' => Some((35, false)),
        '6' => Some((36, false)),
        '7' => Some((37, false)),
        _ => None,
    }
}

/// Nearest xterm-256 palette index for an RGB triple: the 6x6x6 cube for
/// colored values, the grey ramp when the channels agree.
pub fn xterm_from_rgb(r: u8, g: u8, b: u8) -> u8 {
    if r == g && g == b {
        if r < 8 {
            return 16;
        }
        if r > 248 {
            return 231;
        }
        return 232 + ((r as u16 - 8) / 10) as u8;
    }
    let scale = |v: u8| -> u16 {
        if v < 48 {
            0
        } else if v < 115 {
            1
        } else {
            ((v as u16 - 35) / 40).min(5)
        }
    };
    (16 + 36 * scale(r) + 6 * scale(g) + scale(b)) as u8
}

/// Nearest basic SGR color for an xterm-256 index.
fn basic_from_256(idx: u8) -> (u8, bool) {
    match idx {
        0..=7 => (30 + idx, false),
        8..=15 => (30 + idx - 8, true),
        232..=243 => (30, true),
        244..=255 => (37, false),
        _ => {
            // Pull the cube entry apart and pick the dominant channel mix.
            let v = idx - 16;
            let r = v / 36;
            let g = (v % 36) / 6;
            let b = v % 6;
            let bright = r + g + b >= 8;
            let code = match (r >= g, g >= b, r >= b) {
                (true, true, true) if r == g && g == b => 37,
                (true, true, _) if r > g => 31,
                (true, true, _) => 33,
                (false, true, _) => 32,
                (_, false, false) => 34,
                (true, false, true) => 35,
                _ => 36,
            };
            (code, bright)
        }
    }
}

fn push_sgr(out: &mut String, code: u8, bright: bool) {
    if bright {
        out.push_str(&format!("\x1b[1;{}m", code));
    } else {
        out.push_str(&format!("\x1b[0;{}m", code));
    }
}

/// Translate `#` escapes in `input` for a client in `mode`.
pub fn render(input: &str, mode: ColorMode) -> String {
    let mut out = String::with_capacity(input.len() + 16);
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '#' {
            out.push(c);
            continue;
        }
        let Some(&code) = chars.peek() else {
            out.push('#');
            break;
        };
        match code {
            '#' => {
                chars.next();
                out.push('#');
            }
            '-' => {
                chars.next();
                out.push('~');
            }
            'n' => {
                chars.next();
                if mode != ColorMode::None {
                    out.push_str("\x1b[0m");
                }
            }
            'x' => {
                chars.next();
                let mut digits = String::new();
                for _ in 0..3 {
                    match chars.peek() {
                        Some(d) if d.is_ascii_digit() => {
                            digits.push(*d);
                            chars.next();
                        }
                        _ => break,
                    }
                }
                if digits.len() != 3 {
                    continue; // malformed escape, swallow
                }
                let idx = digits.parse::<u16>().unwrap_or(0).min(255) as u8;
                match mode {
                    ColorMode::None => {}
                    ColorMode::Ansi => {
                        let (code, bright) = basic_from_256(idx);
                        push_sgr(&mut out, code, bright);
                    }
                    _ => out.push_str(&format!("\x1b[38;5;{}m", idx)),
                }
            }
            't' => {
                chars.next();
                let mut hex = String::new();
                for _ in 0..6 {
                    match chars.peek() {
                        Some(d) if d.is_ascii_hexdigit() => {
                            hex.push(*d);
                            chars.next();
                        }
                        _ => break,
                    }
                }
                if hex.len() != 6 {
                    continue;
                }
                let r = u8::from_str_radix(&hex[0..2], 16).unwrap_or(0);
                let g = u8::from_str_radix(&hex[2..4], 16).unwrap_or(0);
                let b = u8::from_str_radix(&hex[4..6], 16).unwrap_or(0);
                match mode {
                    ColorMode::None => {}
                    ColorMode::Ansi => {
                        let (code, bright) = basic_from_256(xterm_from_rgb(r, g, b));
                        push_sgr(&mut out, code, bright);
                    }
                    ColorMode::Xterm256 => {
                        out.push_str(&format!("\x1b[38;5;{}m", xterm_from_rgb(r, g, b)))
                    }
                    ColorMode::TrueColor => {
                        out.push_str(&format!("\x1b[38;2;{};{};{}m", r, g, b))
                    }
                }
            }
            other => {
                if let Some((code, bright)) = basic_code(other) {
                    chars.next();
                    if mode != ColorMode::None {
                        push_sgr(&mut out, code, bright);
                    }
                } else {
                    // Not an escape we know; keep the text as typed.
                    out.push('#');
                }
            }
        }
    }
    out
}

/// Visible column width of `s`: color escapes contribute nothing, East
/// Asian Wide codepoints count double.
pub fn display_width(s: &str) -> usize {
    let mut width = 0;
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '#' {
            width += utf8::char_width(c as u32);
            continue;
        }
        match chars.next() {
            Some('#') => width += 1,
            Some('-') => width += 1,
            Some('x') => {
                for _ in 0..3 {
                    if chars.peek().is_some_and(|d| d.is_ascii_digit()) {
                        chars.next();
                    }
                }
            }
            Some('t') => {
                for _ in 0..6 {
                    if chars.peek().is_some_and(|d| d.is_ascii_hexdigit()) {
                        chars.next();
                    }
                }
            }
            Some(other) if basic_code(other).is_some() || other == 'n' => {}
            Some(other) => {
                width += 1 + utf8::char_width(other as u32);
            }
            None => width += 1,
        }
    }
    width
}
