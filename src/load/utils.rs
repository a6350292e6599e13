use std::path::Path;
use unicode_general_category::{get_general_category, GeneralCategory};

/// Characters that render as nothing but break equality: format characters
/// (zero-width space and joiners, BOM, soft hyphen, direction marks and
/// embeddings) and non-whitespace controls.
fn is_invisible(c: char) -> bool {
    get_general_category(c) == GeneralCategory::Format || (c.is_control() && !c.is_whitespace())
}

/// Strip invisible characters, turn non-breaking spaces into plain spaces,
/// then trim. Used for both headers and categorical values.
pub fn clean_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if is_invisible(c) {
            continue;
        }
        match c {
            '\u{00A0}' | '\u{202F}' | '\u{2007}' => out.push(' '),
            _ => out.push(c),
        }
    }
    let trimmed = out.trim();
    if trimmed.len() == out.len() {
        out
    } else {
        trimmed.to_string()
    }
}

/// Lowercased file extension, `"unknown"` if absent.
pub fn file_kind(path: &Path) -> String {
    path.extension()
        .and_then(|os_str| os_str.to_str())
        .map(|s| s.to_lowercase())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_zero_width_and_bom() {
        assert_eq!(clean_text("\u{FEFF}Stage"), "Stage");
        assert_eq!(clean_text("Com\u{200B}pany name"), "Company name");
        assert_eq!(clean_text("  Source\u{2060} "), "Source");
    }

    #[test]
    fn strips_direction_marks_and_isolates() {
        assert_eq!(clean_text("Stage\u{200E}"), "Stage");
        assert_eq!(clean_text("\u{200F}Source"), "Source");
        assert_eq!(clean_text("\u{202A}Ann\u{202C}"), "Ann");
        assert_eq!(clean_text("\u{2066}Web\u{2069}"), "Web");
        assert_eq!(clean_text("Ac\u{00AD}me"), "Acme");
    }

    #[test]
    fn non_breaking_space_becomes_space() {
        assert_eq!(clean_text("Date\u{00A0}modified\u{00A0}"), "Date modified");
    }

    #[test]
    fn keeps_inner_text_untouched() {
        assert_eq!(clean_text("Acme, Inc."), "Acme, Inc.");
        assert_eq!(clean_text(""), "");
    }

    #[test]
    fn file_kind_is_lowercase() {
        assert_eq!(file_kind(Path::new("deals.XLSX")), "xlsx");
        assert_eq!(file_kind(Path::new("deals")), "unknown");
    }
}
