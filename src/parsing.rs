//! Field lookup in CS2-style configuration text.
//!
//! Configuration text retrieved from the bus is a flat sequence of section
//! markers and indented `.key=value` lines:
//!
//! ```text
//! [lokliste]
//! lok
//!  .name=BR 86
//!  .adresse=0x4006
//! ```
//!
//! These helpers find values by key without building a tree; the roster
//! protocol only ever needs a handful of fields.

extern crate alloc;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

/// Find `key` at or after byte offset `from` and return its value.
///
/// The value runs to the end of the line (a trailing `\r` is dropped).
/// Returns the value and the offset just past it, for continued scanning.
///
/// # Example
///
/// ```rust
/// use rs_trainbridge::parsing::get_parameter;
///
/// let text = " .name=A\n .name=B\n";
/// let (first, next) = get_parameter(text, ".name=", 0).unwrap();
/// assert_eq!(first, "A");
/// let (second, _) = get_parameter(text, ".name=", next).unwrap();
/// assert_eq!(second, "B");
/// ```
pub fn get_parameter<'a>(text: &'a str, key: &str, from: usize) -> Option<(&'a str, usize)> {
    let rest = text.get(from..)?;
    let start = from + rest.find(key)? + key.len();
    let end = text[start..]
        .find('\n')
        .map(|i| start + i)
        .unwrap_or(text.len());
    let value = text[start..end].trim_end_matches('\r');
    Some((value, end))
}

/// Parse a numeric field such as `.wert=12` or `.wert=0x0c`.
pub fn get_number(text: &str, key: &str) -> Option<u16> {
    let (value, _) = get_parameter(text, key, 0)?;
    let value = value.trim();
    if let Some(hex) = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        u16::from_str_radix(hex, 16).ok()
    } else {
        value.parse().ok()
    }
}

/// Collect every non-empty `.name=` value in order of appearance.
pub fn extract_names(text: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut from = 0;
    while let Some((value, next)) = get_parameter(text, ".name=", from) {
        if !value.is_empty() {
            names.push(value.to_string());
        }
        from = next;
    }
    names
}

/// Top-level section tag (`[name]`) at the start of the text, if any.
pub fn section_tag(text: &str) -> Option<&str> {
    let rest = text.trim_start().strip_prefix('[')?;
    let end = rest.find(']')?;
    Some(&rest[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameter_basic() {
        let text = "lok\n .uid=0x4006\n .name=BR 86\n";
        assert_eq!(get_parameter(text, ".name=", 0).map(|(v, _)| v), Some("BR 86"));
        assert_eq!(get_parameter(text, ".uid=", 0).map(|(v, _)| v), Some("0x4006"));
    }

    #[test]
    fn parameter_missing() {
        assert_eq!(get_parameter("lok\n .uid=1\n", ".name=", 0), None);
    }

    #[test]
    fn parameter_out_of_range_offset() {
        assert_eq!(get_parameter("abc", ".name=", 10), None);
    }

    #[test]
    fn parameter_without_trailing_newline() {
        assert_eq!(get_parameter(".name=Last", ".name=", 0).map(|(v, _)| v), Some("Last"));
    }

    #[test]
    fn parameter_strips_carriage_return() {
        assert_eq!(get_parameter(".name=Dos\r\n", ".name=", 0).map(|(v, _)| v), Some("Dos"));
    }

    #[test]
    fn number_decimal_and_hex() {
        assert_eq!(get_number("[lokliste]\n .wert=12\n", ".wert="), Some(12));
        assert_eq!(get_number(" .wert=0x0c\n", ".wert="), Some(12));
        assert_eq!(get_number(" .wert=abc\n", ".wert="), None);
        assert_eq!(get_number(" .name=x\n", ".wert="), None);
    }

    #[test]
    fn names_in_order() {
        let text = "[lokliste]\nlok\n .name=Loco1\nlok\n .name=\nlok\n .name=Loco2\n";
        assert_eq!(extract_names(text), ["Loco1", "Loco2"]);
    }

    #[test]
    fn names_empty() {
        assert!(extract_names("[lokliste]\n").is_empty());
    }

    #[test]
    fn section_tags() {
        assert_eq!(section_tag("[lokliste]\nlok\n"), Some("lokliste"));
        assert_eq!(section_tag("\n[lokomotive]\n"), Some("lokomotive"));
        assert_eq!(section_tag("lok\n"), None);
    }
}
