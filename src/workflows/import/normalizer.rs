pub(crate) fn normalize_space(value: &str) -> String {
    let cleaned = value.replace(['\u{feff}', '\u{200b}'], "");
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub(crate) fn normalize_email(value: &str) -> String {
    value.trim().to_ascii_lowercase()
}
