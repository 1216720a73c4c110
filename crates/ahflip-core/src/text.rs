//! Text normalization for item names and chat lines.

/// Remove `§x` formatting codes.
pub fn strip_color_codes(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars();
    while let Some(c) = chars.next() {
        if c == '§' {
            chars.next();
            continue;
        }
        out.push(c);
    }
    out
}

/// Normalize an item name so a purchase chat line can be matched against
/// the notified flip.
///
/// Strips colour codes, a leading stack count (`"64x "`), star glyphs and
/// any other non-ASCII decoration, then collapses whitespace.
pub fn strip_item_name(input: &str) -> String {
    let plain = strip_color_codes(input);
    let ascii: String = plain
        .chars()
        .map(|c| if c.is_ascii() { c } else { ' ' })
        .collect();

    let mut words = ascii.split_whitespace().peekable();
    if let Some(first) = words.peek() {
        let is_count = first
            .strip_suffix('x')
            .map(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
            .unwrap_or(false);
        if is_count {
            words.next();
        }
    }

    words.collect::<Vec<_>>().join(" ")
}

/// Cosmetic items are skin-like and usually skipped or never relisted.
pub fn is_cosmetic(item_name: &str) -> bool {
    item_name.contains("Skin") || item_name.contains('✦')
}
