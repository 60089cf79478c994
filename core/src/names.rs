//! Login name policy: structural checks plus a confusable-skeleton pass
//! so two names that render alike cannot both exist.

use rand::Rng;

/// Names nobody may register.
pub const RESERVED_NAMES: [&str; 8] = [
    "all", "self", "none", "someone", "something", "you", "immortal", "system",
];

pub const MIN_NAME_LEN: usize = 3;
pub const MAX_NAME_LEN: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameError {
    TooShort,
    TooLong,
    Reserved,
    NonLetter,
    /// Entirely `i`/`l`-confusable glyphs ("Illlili" style).
    AllConfusable,
    /// Skeleton collides with an existing name.
    Homograph,
}

/// Map a codepoint to its confusable-skeleton representative. Covers the
/// Latin/Cyrillic/Greek lookalikes that actually show up in login
/// attempts; anything unmapped lowers to itself.
fn skeleton_char(c: char) -> char {
    match c {
        'l' | 'I' | 'i' | '1' | '|' | '\u{0456}' | '\u{0131}' => 'i',
        '0' | '\u{043E}' | '\u{03BF}' | '\u{041E}' | '\u{039F}' => 'o',
        '\u{0430}' | '\u{03B1}' => 'a',
        '\u{0435}' | '\u{0451}' => 'e',
        '\u{0440}' | '\u{03C1}' => 'p',
        '\u{0441}' | '\u{03F2}' => 'c',
        '\u{0445}' | '\u{03C7}' => 'x',
        '\u{0443}' | '\u{03C5}' => 'y',
        '\u{043A}' | '\u{03BA}' => 'k',
        '\u{0442}' | '\u{03C4}' => 't',
        '\u{043C}' => 'm',
        '\u{043D}' | '\u{03B7}' => 'h',
        '\u{0432}' | '\u{03B2}' => 'b',
        other => other.to_lowercase().next().unwrap_or(other),
    }
}

/// Lower a name to its confusable skeleton for collision checks.
pub fn skeleton(name: &str) -> String {
    name.chars().map(skeleton_char).collect()
}

/// Validate a proposed login name. `taken_skeletons` yields the
/// skeletons of names already in use (players and mob keywords).
pub fn check_name<'a, I>(name: &str, taken_skeletons: I) -> Result<(), NameError>
where
    I: IntoIterator<Item = &'a str>,
{
    let len = name.chars().count();
    if len < MIN_NAME_LEN {
        return Err(NameError::TooShort);
    }
    if len > MAX_NAME_LEN {
        return Err(NameError::TooLong);
    }
    if !name.chars().all(char::is_alphabetic) {
        return Err(NameError::NonLetter);
    }

    let lowered = name.to_lowercase();
    if RESERVED_NAMES.contains(&lowered.as_str()) {
        return Err(NameError::Reserved);
    }

    if name
        .chars()
        .all(|c| matches!(c.to_ascii_lowercase(), 'i' | 'l'))
    {
        return Err(NameError::AllConfusable);
    }

    let mine = skeleton(name);
    for taken in taken_skeletons {
        if taken == mine {
            return Err(NameError::Homograph);
        }
    }

    Ok(())
}

const SYL1: [&str; 24] = [
    "thi", "ar", "an", "un", "ish", "ur", "esh", "dur", "lon", "lan", "gar", "dau", "zir", "sol",
    "mid", "tol", "nim", "sar", "phe", "cos", "mul", "har", "tar", "rel",
];
const SYL2: [&str; 9] = [
    "tar", "tur", "kar", "kur", "kan", "tan", "gar", "gur", "run",
];
const SYL3: [&str; 5] = ["a", "e", "i", "o", "u"];

/// Suggest a pronounceable name, offered when a player's choice is
/// rejected.
pub fn suggest_name() -> String {
    let mut rng = rand::thread_rng();

    let mut name = String::new();
    name.push_str(SYL1[rng.gen_range(0..SYL1.len())]);
    if let Some(first) = name.chars().next() {
        name.replace_range(0..1, &first.to_uppercase().to_string());
    }
    name.push_str(SYL2[rng.gen_range(0..SYL2.len())]);
    if rng.gen_range(0..2) == 1 {
        name.push_str(SYL3[rng.gen_range(0..SYL3.len())]);
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_bounds() {
        assert_eq!(check_name("Al", []), Err(NameError::TooShort));
        assert_eq!(
            check_name("Abcdefghijklm", []),
            Err(NameError::TooLong)
        );
        assert!(check_name("Bob", []).is_ok());
    }

    #[test]
    fn rejects_non_letters() {
        assert_eq!(check_name("B0b", []), Err(NameError::NonLetter));
        assert_eq!(check_name("Bo b", []), Err(NameError::NonLetter));
    }

    #[test]
    fn rejects_reserved() {
        assert_eq!(check_name("Self", []), Err(NameError::Reserved));
        assert_eq!(check_name("ALL", []), Err(NameError::Reserved));
    }

    #[test]
    fn rejects_confusable_soup() {
        assert_eq!(check_name("Illli", []), Err(NameError::AllConfusable));
        assert_eq!(check_name("lil", []), Err(NameError::AllConfusable));
    }

    #[test]
    fn homograph_collision() {
        let bob = skeleton("Bob");
        // Cyrillic о in the middle skeletonizes to the same string.
        let spoof = "B\u{043E}b";
        assert_eq!(skeleton(spoof), bob);
        assert_eq!(
            check_name(spoof, [bob.as_str()]),
            Err(NameError::Homograph)
        );
        // A genuinely distinct name passes the same check.
        assert!(check_name("Alice", [bob.as_str()]).is_ok());
    }

    #[test]
    fn suggestions_are_valid_names() {
        for _ in 0..64 {
            let name = suggest_name();
            assert!(
                check_name(&name, []).is_ok(),
                "suggested name {name:?} failed its own policy"
            );
        }
    }
}
