//! Rewrites locomotive configuration from the handheld dialect to the
//! central-station file dialect.
//!
//! Handheld units answer a `lokinfo` request with a `lok` section whose
//! fields are indented by arbitrary depth. The central-station roster file
//! (`lokomotive.cs2`) uses single-space indentation, numbers its function
//! blocks and spells a few keys differently:
//!
//! | Handheld     | Central station                     |
//! |--------------|-------------------------------------|
//! | `.fkt`       | `.funktionen` + `..nr=<n>`          |
//! | `.fkt2`      | `.funktionen_2` + `..nr=<n>`        |
//! | `.typ2`      | `.typ`                              |
//! | `.dauer2`    | `.dauer`                            |
//! | `.wert2`     | `.wert`                             |
//! | `.name=...`  | dropped (name comes from the header)|
//!
//! The rewrite is a single forward pass over the bytes.
//!
//! # Example
//!
//! ```rust
//! use rs_trainbridge::dialect::transform_loco;
//!
//! let ms2 = "lok\n .name=BR 86\n .fkt\n  ..typ=1\n";
//! let cs2 = transform_loco("BR 86", ms2).unwrap();
//! assert_eq!(
//!     cs2,
//!     "lokomotive\n .name=BR 86\n .icon=loco\n .funktionen\n ..nr=0\n ..typ=1\n"
//! );
//! ```

extern crate alloc;
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use crate::error::BridgeError;

/// Preamble written once at the top of a roster file.
pub const ROSTER_HEADER: &str = "[lokomotive]\nversion\n .minor=3\nsession\n .id=1\n";

const LOK_MARKER: &str = "lok\n";

/// Key renames that only drop a trailing character.
const RENAMES: [(&[u8], &[u8]); 3] = [
    (b".typ2", b".typ"),
    (b".dauer2", b".dauer"),
    (b".wert2", b".wert"),
];

/// Transform one locomotive's handheld configuration text.
///
/// Fails with [`BridgeError::MissingLokSection`] when the text has no
/// `lok` section.
pub fn transform_loco(name: &str, ms2: &str) -> Result<String, BridgeError> {
    let start = ms2.find(LOK_MARKER).ok_or(BridgeError::MissingLokSection)? + LOK_MARKER.len();
    let src = ms2.as_bytes();
    // Bytes after the last newline are an incomplete line and are dropped.
    let end = match ms2.rfind('\n') {
        Some(last) if last >= start => last,
        _ => src.len(),
    };

    let mut out: Vec<u8> = Vec::with_capacity(ms2.len() + name.len() + 32);
    out.extend_from_slice(b"lokomotive\n .name=");
    out.extend_from_slice(name.as_bytes());
    out.extend_from_slice(b"\n .icon=loco\n ");

    let mut function_number: u32 = 0;
    let mut new_line = true;
    let mut i = start;
    let mut terminated = false;

    while i < end {
        let c = src[i];
        match c {
            b' ' if new_line => {}
            b'\r' => {}
            b'\n' => {
                new_line = true;
                out.extend_from_slice(b"\n ");
            }
            b'.' => {
                new_line = false;
                let rest = &src[i..];
                if let Some(len) = function_block(rest, b".fkt") {
                    push_function(&mut out, b".funktionen", &mut function_number);
                    i += len;
                    continue;
                } else if let Some(len) = function_block(rest, b".fkt2") {
                    push_function(&mut out, b".funktionen_2", &mut function_number);
                    i += len;
                    continue;
                } else if let Some((from, to)) =
                    RENAMES.iter().find(|(from, _)| rest.starts_with(from))
                {
                    out.extend_from_slice(to);
                    i += from.len();
                    continue;
                } else if rest.starts_with(b".name=") && (i == 0 || src[i - 1] != b'.') {
                    // Skip the whole line including its newline.
                    match src[i..].iter().position(|&b| b == b'\n') {
                        Some(pos) if i + pos < end => {
                            i += pos + 1;
                            new_line = true;
                            continue;
                        }
                        _ => {
                            if out.ends_with(b"\n ") {
                                out.pop();
                            } else {
                                out.push(b'\n');
                            }
                            terminated = true;
                            break;
                        }
                    }
                } else {
                    out.push(c);
                }
            }
            _ => {
                new_line = false;
                out.push(c);
            }
        }
        i += 1;
    }

    if !terminated {
        out.push(b'\n');
    }

    // Only ASCII was inserted or skipped, so the output stays valid UTF-8.
    Ok(match String::from_utf8(out) {
        Ok(text) => text,
        Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
    })
}

/// Length of `key` when it is a whole-line function block marker.
///
/// The line break itself is not consumed.
fn function_block(rest: &[u8], key: &[u8]) -> Option<usize> {
    if !rest.starts_with(key) {
        return None;
    }
    match rest.get(key.len()) {
        Some(b'\n') | Some(b'\r') => Some(key.len()),
        _ => None,
    }
}

fn push_function(out: &mut Vec<u8>, key: &[u8], number: &mut u32) {
    out.extend_from_slice(key);
    out.extend_from_slice(format!("\n ..nr={number}").as_bytes());
    *number += 1;
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEAD: &str = "lokomotive\n .name=Foo\n .icon=loco\n ";

    #[test]
    fn missing_lok_section() {
        assert_eq!(
            transform_loco("Foo", "[lokliste]\n .name=Foo\n"),
            Err(BridgeError::MissingLokSection)
        );
    }

    #[test]
    fn name_field_dropped() {
        let out = transform_loco("Foo", "lok\n .name=Foo\n .uid=0x4006\n").unwrap();
        assert_eq!(out, "lokomotive\n .name=Foo\n .icon=loco\n .uid=0x4006\n");
        assert_eq!(out.matches(".name=").count(), 1);
    }

    #[test]
    fn sub_field_name_kept() {
        let out = transform_loco("Foo", "lok\n .fkt\n  ..name=Horn\n").unwrap();
        assert!(out.contains(" ..name=Horn\n"));
    }

    #[test]
    fn functions_numbered_sequentially() {
        let ms2 = "lok\n .fkt\n  ..typ=1\n .fkt\n  ..typ=2\n .fkt2\n  ..typ2=3\n";
        let out = transform_loco("Foo", ms2).unwrap();
        let expected = [
            HEAD,
            ".funktionen\n ..nr=0\n ..typ=1\n",
            " .funktionen\n ..nr=1\n ..typ=2\n",
            " .funktionen_2\n ..nr=2\n ..typ=3\n",
        ]
        .concat();
        assert_eq!(out, expected);
    }

    #[test]
    fn suffix_renames_exact() {
        let ms2 = "lok\n .fkt2\n  ..typ2=7\n  ..dauer2=5\n  ..wert2=1\n";
        let out = transform_loco("Foo", ms2).unwrap();
        assert!(out.contains(" ..typ=7\n"));
        assert!(out.contains(" ..dauer=5\n"));
        assert!(out.contains(" ..wert=1\n"));
        assert!(!out.contains("typ2"));
        assert!(!out.contains("dauer2"));
        assert!(!out.contains("wert2"));
    }

    #[test]
    fn fkt_prefix_not_a_block() {
        let out = transform_loco("Foo", "lok\n .fktx=1\n").unwrap();
        assert!(out.contains(".fktx=1"));
        assert!(!out.contains("funktionen"));
    }

    #[test]
    fn indentation_collapsed_and_cr_stripped() {
        let out = transform_loco("Foo", "lok\n     .adresse=0x6\r\n\t.x=1\r\n").unwrap();
        assert_eq!(out, [HEAD, ".adresse=0x6\n \t.x=1\n"].concat());
    }

    #[test]
    fn inner_spaces_preserved() {
        let out = transform_loco("Foo", "lok\n .bild=BR 86 blau\n").unwrap();
        assert!(out.contains(".bild=BR 86 blau\n"));
    }

    #[test]
    fn trailing_partial_line_dropped() {
        let out = transform_loco("Foo", "lok\n .uid=1\n .partial").unwrap();
        assert_eq!(out, [HEAD, ".uid=1\n"].concat());
    }

    #[test]
    fn name_on_last_line() {
        let out = transform_loco("Foo", "lok\n .uid=1\n .name=Foo\n").unwrap();
        assert_eq!(out, [HEAD, ".uid=1\n"].concat());
    }

    #[test]
    fn content_before_lok_ignored() {
        let out = transform_loco("Foo", "[lokomotive]\nlok\n .uid=1\n").unwrap();
        assert_eq!(out, [HEAD, ".uid=1\n"].concat());
    }

    #[test]
    fn function_numbers_past_nine() {
        let ms2 = ["lok\n", &" .fkt\n  ..typ=1\n".repeat(12)].concat();
        let out = transform_loco("Foo", &ms2).unwrap();
        assert!(out.contains(" ..nr=9\n"));
        assert!(out.contains(" ..nr=10\n"));
        assert!(out.ends_with(".funktionen\n ..nr=11\n ..typ=1\n"));
    }
}
