use regex::Regex;
use std::sync::OnceLock;

const PAGE_FOOTER_PATTERN: &str = r"Page \d+ of \d+";

/// Control, format, private-use and unassigned code points, plus every
/// separator other than the ASCII space.
const UNPRINTABLE_PATTERN: &str = r"[\p{C}\p{Z}--\x20]";

fn page_footer() -> &'static Regex {
    static PAGE_FOOTER: OnceLock<Regex> = OnceLock::new();
    PAGE_FOOTER.get_or_init(|| {
        Regex::new(PAGE_FOOTER_PATTERN).expect("page footer pattern is valid")
    })
}

fn unprintable() -> &'static Regex {
    static UNPRINTABLE: OnceLock<Regex> = OnceLock::new();
    UNPRINTABLE.get_or_init(|| {
        Regex::new(UNPRINTABLE_PATTERN).expect("unprintable pattern is valid")
    })
}

/// Unicode whitespace, plus the ASCII file, group, record and unit
/// separators (U+001C..U+001F).
fn is_space(character: char) -> bool {
    character.is_whitespace() || matches!(character, '\u{1c}'..='\u{1f}')
}

pub fn normalize_whitespace(text: &str) -> String {
    text.split(is_space)
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalizes raw extracted text.
///
/// Whitespace runs collapse first, then `Page N of M` footers are removed.
/// The space on either side of a removed footer is kept, so the result can
/// contain a double space; it is not collapsed a second time. Last, every
/// unprintable character is dropped: controls, format characters such as
/// U+200B and U+00AD, private-use and unassigned code points.
pub fn clean(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let collapsed = normalize_whitespace(text);
    let without_footers = page_footer().replace_all(&collapsed, "");

    unprintable().replace_all(&without_footers, "").into_owned()
}
