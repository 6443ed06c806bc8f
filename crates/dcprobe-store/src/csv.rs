//! Minimal CSV row encoding for the result log.

pub const DELIMITER: char = ',';
const QUOTE: char = '"';

/// Quote a single field if it contains the delimiter, a quote, or a line break.
pub fn quote_field(value: &str) -> String {
    let needs_quoting = value.contains(DELIMITER)
        || value.contains(QUOTE)
        || value.contains('\n')
        || value.contains('\r');

    if needs_quoting {
        let escaped = value.replace(QUOTE, "\"\"");
        format!("{QUOTE}{escaped}{QUOTE}")
    } else {
        value.to_string()
    }
}

/// Encode fields as one line, without the trailing newline.
pub fn encode_row<S: AsRef<str>>(fields: &[S]) -> String {
    fields
        .iter()
        .map(|f| quote_field(f.as_ref()))
        .collect::<Vec<_>>()
        .join(&DELIMITER.to_string())
}

/// Split one line into fields, honouring quotes and doubled quotes.
/// Returns `None` on an unclosed quote or stray text after a closing quote.
pub fn parse_line(line: &str) -> Option<Vec<String>> {
    let mut fields = Vec::new();
    let mut chars = line.chars().peekable();

    loop {
        if chars.peek() == Some(&QUOTE) {
            chars.next();
            let mut field = String::new();
            let mut closed = false;
            while let Some(c) = chars.next() {
                if c == QUOTE {
                    if chars.peek() == Some(&QUOTE) {
                        chars.next();
                        field.push(QUOTE);
                    } else {
                        closed = true;
                        break;
                    }
                } else {
                    field.push(c);
                }
            }
            if !closed {
                return None;
            }
            fields.push(field);
            match chars.next() {
                Some(DELIMITER) => {}
                None => return Some(fields),
                _ => return None,
            }
        } else {
            let mut field = String::new();
            loop {
                match chars.next() {
                    Some(DELIMITER) => break,
                    Some(c) => field.push(c),
                    None => {
                        fields.push(field);
                        return Some(fields);
                    }
                }
            }
            fields.push(field);
        }
    }
}
