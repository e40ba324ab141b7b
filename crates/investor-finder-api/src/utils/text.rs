/// Case-sensitive keyword test against already-lowercased text. Keywords of
/// three characters or fewer ("ai", "vc", "ml") must stand alone as words so
/// that "said" or "invc" do not match.
pub fn contains_keyword(lowered: &str, keyword: &str) -> bool {
    if keyword.chars().count() > 3 {
        return lowered.contains(keyword);
    }
    lowered.match_indices(keyword).any(|(idx, m)| {
        is_boundary(lowered[..idx].chars().next_back())
            && is_boundary(lowered[idx + m.len()..].chars().next())
    })
}

fn is_boundary(c: Option<char>) -> bool {
    c.map_or(true, |c| !c.is_alphanumeric())
}

/// "jane-doe-123" style slugs become "Jane Doe 123".
pub fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// At most `max` characters, cut on a char boundary.
pub fn clip(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_keywords_need_word_boundaries() {
        assert!(contains_keyword("looking for ai investors", "ai"));
        assert!(contains_keyword("ai/ml startup", "ml"));
        assert!(!contains_keyword("she said hello", "ai"));
        assert!(!contains_keyword("domain expertise", "ai"));
    }

    #[test]
    fn test_long_keywords_match_substrings() {
        assert!(contains_keyword("healthcare startups", "health"));
        assert!(contains_keyword("we do e-commerce", "e-commerce"));
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("jane doe"), "Jane Doe");
        assert_eq!(title_case("MARY  o'neil"), "Mary O'neil");
    }

    #[test]
    fn test_clip() {
        assert_eq!(clip("ñandú", 3), "ñan");
    }
}
