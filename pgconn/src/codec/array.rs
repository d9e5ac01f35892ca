//! Text-format codec for one-dimensional PostgreSQL arrays.
//!
//! Wire representation: `{elem,elem,...}`, with each element optionally
//! double-quoted. An element is quoted iff it is empty, is `NULL`
//! case-sensitively, or contains `,`, `{`, `}`, `"`, `\`, or whitespace;
//! quoted elements escape `"` and `\` with a backslash.

/// Split an array's text representation into its (already-unquoted,
/// NULL-mapped) elements.
pub fn decode_elements(text: &str) -> Result<Vec<Option<String>>, String> {
    let text = text.trim();
    let inner = text
        .strip_prefix('{')
        .and_then(|t| t.strip_suffix('}'))
        .ok_or_else(|| "array text missing braces".to_string())?;

    if inner.is_empty() {
        return Ok(Vec::new());
    }

    let mut elements = Vec::new();
    let mut chars = inner.chars().peekable();

    loop {
        let mut element = String::new();
        let mut quoted = false;
        let mut saw_quotes = false;

        if chars.peek() == Some(&'"') {
            quoted = true;
            saw_quotes = true;
            chars.next();
        }

        if quoted {
            loop {
                match chars.next() {
                    Some('\\') => match chars.next() {
                        Some(c) => element.push(c),
                        None => return Err("array text ends mid-escape".into()),
                    },
                    Some('"') => break,
                    Some(c) => element.push(c),
                    None => return Err("unterminated quoted array element".into()),
                }
            }
        } else {
            while let Some(&c) = chars.peek() {
                if c == ',' || c == '}' {
                    break;
                }
                element.push(c);
                chars.next();
            }
        }

        elements.push(if !saw_quotes && element == "NULL" { None } else { Some(element) });

        match chars.next() {
            Some(',') => continue,
            None => break,
            Some(other) => return Err(format!("unexpected character {other:?} in array text")),
        }
    }

    Ok(elements)
}

/// Render elements (already individually text-encoded) back into `{...}`,
/// quoting where the element requires it and mapping `None` to `NULL`.
pub fn encode_elements<'a>(elements: impl IntoIterator<Item = Option<&'a str>>) -> String {
    let mut out = String::from("{");
    for (i, element) in elements.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        match element {
            None => out.push_str("NULL"),
            Some(value) => {
                if needs_quoting(value) {
                    out.push('"');
                    for c in value.chars() {
                        if c == '"' || c == '\\' {
                            out.push('\\');
                        }
                        out.push(c);
                    }
                    out.push('"');
                } else {
                    out.push_str(value);
                }
            }
        }
    }
    out.push('}');
    out
}

fn needs_quoting(value: &str) -> bool {
    value.is_empty()
        || value == "NULL"
        || value.contains(['{', '}', ',', '"', '\\'])
        || value.chars().any(char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_simple_array() {
        let elements = decode_elements("{1,2,3}").unwrap();
        assert_eq!(elements, vec![Some("1".into()), Some("2".into()), Some("3".into())]);
    }

    #[test]
    fn decodes_null_and_quoted_elements() {
        let elements = decode_elements(r#"{NULL,"has,comma","with \"quote\""}"#).unwrap();
        assert_eq!(
            elements,
            vec![None, Some("has,comma".into()), Some(r#"with "quote""#.into())],
        );
    }

    #[test]
    fn encode_round_trips_through_decode() {
        let encoded = encode_elements([None, Some("has,comma"), Some("plain")]);
        let decoded = decode_elements(&encoded).unwrap();
        assert_eq!(decoded, vec![None, Some("has,comma".into()), Some("plain".into())]);
    }

    #[test]
    fn empty_array() {
        assert_eq!(decode_elements("{}").unwrap(), Vec::<Option<String>>::new());
    }
}
