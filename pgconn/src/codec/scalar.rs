//! Text-format encode/decode helpers for scalar OIDs.
//!
//! The wire distinguishes text and binary format per value; this driver
//! binds parameters and requests results in text format uniformly (see
//! `DESIGN.md`), so only one direction of each conversion is needed.

/// Parse the COPY/simple-query text representation of `bool`: `t`/`f`.
pub fn parse_bool(text: &str) -> Result<bool, String> {
    match text {
        "t" => Ok(true),
        "f" => Ok(false),
        other => Err(format!("invalid boolean text representation {other:?}")),
    }
}

/// Encode `bool` the same way the server prints it back: `t`/`f`.
pub fn encode_bool(value: bool) -> &'static str {
    if value { "t" } else { "f" }
}

/// Parse `bytea`'s `\x`-prefixed hex text representation.
///
/// <https://www.postgresql.org/docs/current/datatype-binary.html#id-1.5.7.12.9>
pub fn parse_bytea_hex(text: &str) -> Result<Vec<u8>, String> {
    let hex = text.strip_prefix("\\x").ok_or_else(|| "bytea text missing \\x prefix".to_string())?;
    if hex.len() % 2 != 0 {
        return Err("bytea hex string has odd length".into());
    }
    let mut out = Vec::with_capacity(hex.len() / 2);
    let bytes = hex.as_bytes();
    for chunk in bytes.chunks(2) {
        let hi = (chunk[0] as char).to_digit(16).ok_or_else(|| "invalid bytea hex digit".to_string())?;
        let lo = (chunk[1] as char).to_digit(16).ok_or_else(|| "invalid bytea hex digit".to_string())?;
        out.push((hi as u8) << 4 | lo as u8);
    }
    Ok(out)
}

/// Parse `bytea`'s older escape-format text representation: printable
/// bytes pass through verbatim except `\\` (a literal backslash) and
/// `\ddd` (an octal byte value), the form pre-9.0 servers (and any server
/// with `bytea_output = escape`) use.
///
/// <https://www.postgresql.org/docs/current/datatype-binary.html#id-1.5.7.12.10>
pub fn parse_bytea_escape(text: &str) -> Result<Vec<u8>, String> {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'\\' {
            out.push(bytes[i]);
            i += 1;
            continue;
        }
        match bytes.get(i + 1) {
            Some(b'\\') => {
                out.push(b'\\');
                i += 2;
            }
            Some(_) if i + 3 < bytes.len() && bytes[i + 1..i + 4].iter().all(u8::is_ascii_digit) => {
                let octal = std::str::from_utf8(&bytes[i + 1..i + 4]).unwrap();
                let value = u8::from_str_radix(octal, 8).map_err(|_| "invalid bytea octal escape".to_string())?;
                out.push(value);
                i += 4;
            }
            _ => return Err("invalid bytea escape sequence".into()),
        }
    }
    Ok(out)
}

/// Parse either `bytea` text representation: hex (`\x...`, the modern
/// default) or the older backslash-escape form.
pub fn parse_bytea(text: &str) -> Result<Vec<u8>, String> {
    if text.starts_with("\\x") { parse_bytea_hex(text) } else { parse_bytea_escape(text) }
}

/// Encode raw bytes as `bytea`'s `\x`-prefixed hex text representation.
pub fn encode_bytea_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(2 + bytes.len() * 2);
    out.push_str("\\x");
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

/// Trivial passthrough used for types whose text encoding is just
/// `ToString`/`Display` (integers, floats).
pub fn encode_text(value: impl std::fmt::Display) -> String {
    value.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_legacy_escape_bytea() {
        assert_eq!(parse_bytea_escape(r"ab\\c\001"), Ok(vec![b'a', b'b', b'\\', b'c', 1u8]));
    }

    #[test]
    fn decodes_hex_and_escape_through_dispatcher() {
        assert_eq!(parse_bytea("\\x4142"), Ok(vec![b'A', b'B']));
        assert_eq!(parse_bytea("AB"), Ok(vec![b'A', b'B']));
    }

    #[test]
    fn rejects_truncated_octal_escape() {
        assert!(parse_bytea_escape(r"\01").is_err());
    }
}
