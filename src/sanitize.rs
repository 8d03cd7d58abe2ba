//! Restricts free-text query parameters to safe character sets.

const MAX_CODE_LEN: usize = 8;

const DENYLIST: &[char] = &[
    '"', '\'', '`', ';', '\\', '(', ')', '[', ']', '{', '}', '*', '?', '&', '|', '$', '!', '%',
    '#', '@', '=', '+', ',', '.', '~', '^', ' ',
];

/// Cleans a single network code such as `GE` or `_ALL`.
///
/// Returns `None` for empty input, input longer than eight characters, or anything
/// that looks like markup.
pub fn clean_code(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() || value.chars().count() > MAX_CODE_LEN {
        return None;
    }
    if value.contains(['<', '>']) {
        return None;
    }

    let cleaned: String = value
        .chars()
        .filter(|c| !c.is_control() && !DENYLIST.contains(c))
        .map(|c| match c {
            '/' | ':' => '_',
            c => c,
        })
        .collect::<String>()
        .to_uppercase();

    (!cleaned.is_empty()).then_some(cleaned)
}

/// Splits a comma separated DCID list, e.g. `"ge, ro"` into `["GE", "RO"]`.
pub fn clean_dcid_list(text: &str) -> Vec<String> {
    text.split(',')
        .map(|piece| {
            piece
                .chars()
                .filter(char::is_ascii_alphanumeric)
                .collect::<String>()
                .to_ascii_uppercase()
        })
        .filter(|dcid| !dcid.is_empty())
        .collect()
}
