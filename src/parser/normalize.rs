//! Whitespace and invisible-character cleanup for extracted text.

/// Zero-width and blank code points that carry no text.
const INVISIBLE_CHARS: &[char] = &[
    '\u{200B}', // zero-width space
    '\u{200C}', // zero-width non-joiner
    '\u{200D}', // zero-width joiner
    '\u{FEFF}', // byte-order mark / zero-width no-break space
    '\u{2800}', // braille pattern blank
];

/// HTML entities that survive into plain-text parts, and their replacement.
const ENTITY_REPLACEMENTS: &[(&str, &str)] = &[("&zwnj;", ""), ("&nbsp;", " ")];

/// Collapse whitespace and strip invisible characters.
///
/// Removes zero-width code points and the `&zwnj;` entity, turns `&nbsp;`
/// into a space, collapses every whitespace run into one space and trims
/// the ends. `normalize(normalize(x)) == normalize(x)` for every input.
pub fn normalize(text: &str) -> String {
    let mut cleaned: String = text.chars().filter(|c| !INVISIBLE_CHARS.contains(c)).collect();

    // A removal can join the halves of another entity ("&nb&zwnj;sp;"), so
    // repeat until nothing changes. Every replacement shortens the string.
    loop {
        let mut next = cleaned.clone();
        for (entity, replacement) in ENTITY_REPLACEMENTS {
            next = next.replace(entity, replacement);
        }
        if next == cleaned {
            break;
        }
        cleaned = next;
    }

    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}
