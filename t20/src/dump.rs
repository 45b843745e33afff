use std::fmt::Write;

/// Classic 16 bytes per row hex dump with an ASCII column.
///
/// ```text
/// 0000: 00 01 02 03 04 05 06 07  08 09 0a 0b 0c 0d 0e 0f  ................
/// ```
pub fn hex_dump(data: &[u8]) -> String {
    let mut out = String::new();

    for (row, chunk) in data.chunks(16).enumerate() {
        let _ = write!(out, "{:04x}: ", row * 16);

        for i in 0..16 {
            match chunk.get(i) {
                Some(b) => {
                    let _ = write!(out, "{:02x}", b);
                }
                None => out.push_str("  "),
            }
            out.push_str(if (i + 1) % 8 == 0 { "  " } else { " " });
        }

        out.extend(chunk.iter().map(|&b| {
            if b.is_ascii_graphic() || b == b' ' {
                b as char
            } else {
                '.'
            }
        }));
        out.push('\n');
    }

    out
}
