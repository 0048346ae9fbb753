use std::path::Path;

const RECEIPT_PREFIX: &str = "receipt_";
const RECEIPT_SUFFIX: &str = ".json";

/// A ref tag doubles as a file name component, so it must not be able to
/// name a directory, climb out of the store, or hide itself.
pub fn is_safe_component(tag: &str) -> bool {
    !tag.is_empty()
        && !tag.starts_with('.')
        && tag
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// Replace anything outside `[A-Za-z0-9_-]` with `_`.
pub fn sanitize_token(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

/// `receipt_<ref_tag>.json`
pub fn receipt_file_name(ref_tag: &str) -> String {
    format!("{RECEIPT_PREFIX}{ref_tag}{RECEIPT_SUFFIX}")
}

/// Inverse of [`receipt_file_name`]; `None` for anything that is not a receipt file.
pub fn ref_tag_from_file_name(path: &Path) -> Option<&str> {
    path.file_name()?
        .to_str()?
        .strip_prefix(RECEIPT_PREFIX)?
        .strip_suffix(RECEIPT_SUFFIX)
        .filter(|tag| !tag.is_empty())
}
