//! URL slug derivation for course titles.

/// Derive a lowercase, hyphen-separated slug from a title.
///
/// Only ASCII letters and digits survive; every other run of characters
/// collapses into a single `-`, and leading/trailing separators are dropped.
/// Common Latin accents are folded to their base letter first.
pub fn slugify(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    let mut pending_dash = false;

    for ch in title.chars().flat_map(fold_char) {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    out
}

fn fold_char(ch: char) -> impl Iterator<Item = char> {
    let folded: &'static str = match ch {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'À' | 'Á' | 'Â' | 'Ã' | 'Ä' | 'Å' => "a",
        'ç' | 'Ç' => "c",
        'è' | 'é' | 'ê' | 'ë' | 'È' | 'É' | 'Ê' | 'Ë' => "e",
        'ì' | 'í' | 'î' | 'ï' | 'Ì' | 'Í' | 'Î' | 'Ï' => "i",
        'ñ' | 'Ñ' => "n",
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ö' => "o",
        'ù' | 'ú' | 'û' | 'ü' | 'Ù' | 'Ú' | 'Û' | 'Ü' => "u",
        'ß' => "ss",
        '&' => " and ",
        _ => "",
    };

    let passthrough = if folded.is_empty() { Some(ch) } else { None };
    folded.chars().chain(passthrough)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn lowercases_and_hyphenates() {
        assert_eq!(slugify("Intro to Rust"), "intro-to-rust");
    }

    #[test]
    fn collapses_punctuation_and_trims() {
        assert_eq!(slugify("  Rust: The  Hard Parts!! "), "rust-the-hard-parts");
    }

    #[test]
    fn folds_accents_and_ampersand() {
        assert_eq!(slugify("Café & Crème"), "cafe-and-creme");
    }

    #[test]
    fn empty_title_gives_empty_slug() {
        assert_eq!(slugify("!!!"), "");
    }

    proptest! {
        #[test]
        fn slug_is_always_url_safe(title in ".{0,64}") {
            let slug = slugify(&title);
            prop_assert!(slug.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
            prop_assert!(!slug.starts_with('-'));
            prop_assert!(!slug.ends_with('-'));
            prop_assert!(!slug.contains("--"));
        }
    }
}
