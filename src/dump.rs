//! Hex + ASCII memory dumps for inspection. Never part of execution.

use std::fmt::Write;

const ROW: u32 = 16;

/// Formats `start..=end` as rows of 16 bytes. `peek` returns `None` for
/// addresses with nothing mapped, which print as `--`.
///
/// ```text
/// 0200  a9 ff 8d 00 80 00 -- -- ...  |......          |
/// ```
pub fn hexdump<F>(start: u16, end: u16, mut peek: F) -> String
where
    F: FnMut(u16) -> Option<u8>,
{
    let mut out = String::new();
    if end < start {
        return out;
    }

    let first_row = start as u32 & !(ROW - 1);
    for row in (first_row..=end as u32).step_by(ROW as usize) {
        let mut hex = String::new();
        let mut ascii = String::new();

        for addr in row..row + ROW {
            let byte = if addr < start as u32 || addr > end as u32 {
                None
            } else {
                Some(peek(addr as u16))
            };

            match byte {
                Some(Some(b)) => {
                    let _ = write!(hex, " {b:02x}");
                    ascii.push(if b.is_ascii_graphic() || b == b' ' {
                        b as char
                    } else {
                        '.'
                    });
                }
                Some(None) => {
                    hex.push_str(" --");
                    ascii.push('.');
                }
                None => {
                    hex.push_str("   ");
                    ascii.push(' ');
                }
            }
        }

        let _ = writeln!(out, "{row:04x} {hex}  |{ascii}|");
    }

    out
}
