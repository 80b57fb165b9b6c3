// src/parse/split.rs

/// Split one logical CSV line into raw fields.
///
/// Commas outside quotes end a field. A `""` pair inside a quoted section is a
/// literal quote; any other `"` toggles quoting and is dropped from the output.
/// Everything else, embedded newlines included, is kept verbatim.
pub fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut cur = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' => {
                if in_quotes && chars.peek() == Some(&'"') {
                    cur.push('"');
                    chars.next();
                } else {
                    in_quotes = !in_quotes;
                }
            }
            ',' if !in_quotes => fields.push(std::mem::take(&mut cur)),
            _ => cur.push(ch),
        }
    }
    fields.push(cur);
    fields
}
