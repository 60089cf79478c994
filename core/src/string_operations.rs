//! Small string helpers used across the command and persistence paths.

/// Uppercase the first character, lowercase the rest. Player and file
/// names are stored in this canonical form.
pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => {
            first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
        }
        None => String::new(),
    }
}

/// Case-insensitive "is `prefix` a prefix of `full`". An empty prefix
/// never matches; typing nothing should not select the first command.
pub fn str_prefix(prefix: &str, full: &str) -> bool {
    if prefix.is_empty() || prefix.len() > full.len() {
        return false;
    }
    full.chars()
        .zip(prefix.chars())
        .all(|(f, p)| f.to_ascii_lowercase() == p.to_ascii_lowercase())
}

/// Split the first word off `input`, honoring single and double quotes,
/// and return `(word, rest)` with `rest` left-trimmed.
pub fn one_argument(input: &str) -> (String, &str) {
    let input = input.trim_start();
    if input.is_empty() {
        return (String::new(), "");
    }

    let mut chars = input.char_indices();
    let (quote, start) = match input.chars().next() {
        Some(q @ ('\'' | '"')) => {
            chars.next();
            (Some(q), q.len_utf8())
        }
        _ => (None, 0),
    };

    for (i, c) in chars {
        let done = match quote {
            Some(q) => c == q,
            None => c.is_whitespace(),
        };
        if done {
            let word = input[start..i].to_string();
            return (word, input[i + c.len_utf8()..].trim_start());
        }
    }
    (input[start..].to_string(), "")
}

/// Keyword-list match: every word of `name` must prefix-match some word
/// of `namelist`. This is the lookup used for "get sword", where the
/// object's name field is a list like "long rusty sword".
pub fn is_name(name: &str, namelist: &str) -> bool {
    let mut rest = name.trim();
    if rest.is_empty() {
        return false;
    }
    while !rest.is_empty() {
        let (word, remainder) = one_argument(rest);
        rest = remainder;
        if word.is_empty() {
            break;
        }
        let matched = namelist
            .split_whitespace()
            .any(|candidate| str_prefix(&word, candidate));
        if !matched {
            return false;
        }
    }
    true
}

/// Replace `~` with `-`. Tildes were the legacy flat-file terminator and
/// are still rejected from player-supplied strings that reach storage.
pub fn smash_tilde(s: &str) -> String {
    s.replace('~', "-")
}

pub fn is_number(s: &str) -> bool {
    let s = s.strip_prefix(['+', '-']).unwrap_or(s);
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capitalize_canonical_form() {
        assert_eq!(capitalize("bOB"), "Bob");
        assert_eq!(capitalize("alice"), "Alice");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn str_prefix_matching() {
        assert!(str_prefix("n", "north"));
        assert!(str_prefix("NoR", "north"));
        assert!(!str_prefix("north", "n"));
        assert!(!str_prefix("", "north"));
        assert!(!str_prefix("x", "north"));
    }

    #[test]
    fn one_argument_splits_words() {
        assert_eq!(one_argument("get sword"), ("get".to_string(), "sword"));
        assert_eq!(one_argument("  look   "), ("look".to_string(), ""));
        assert_eq!(one_argument(""), (String::new(), ""));
    }

    #[test]
    fn one_argument_honors_quotes() {
        let (word, rest) = one_argument("'long sword' bag");
        assert_eq!(word, "long sword");
        assert_eq!(rest, "bag");
        let (word, rest) = one_argument("\"a b\"");
        assert_eq!(word, "a b");
        assert_eq!(rest, "");
    }

    #[test]
    fn is_name_prefix_per_word() {
        assert!(is_name("sword", "long rusty sword"));
        assert!(is_name("ru sw", "long rusty sword"));
        assert!(!is_name("axe", "long rusty sword"));
        assert!(!is_name("", "long rusty sword"));
    }

    #[test]
    fn smash_tilde_replaces() {
        assert_eq!(smash_tilde("a~b~"), "a-b-");
    }

    #[test]
    fn is_number_accepts_signs() {
        assert!(is_number("42"));
        assert!(is_number("-7"));
        assert!(!is_number(""));
        assert!(!is_number("4x"));
        assert!(!is_number("-"));
    }
}
