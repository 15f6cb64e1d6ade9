use crate::parsers::text;

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_normalize_whitespace_in_segment() {
        assert_eq!(
            text::normalize_whitespace_in_segment("Hello   world!"),
            "Hello world!"
        );
        assert_eq!(
            text::normalize_whitespace_in_segment("  Trim  me  "),
            "Trim me"
        );
        assert_eq!(
            text::normalize_whitespace_in_segment("Tabs\tand\nnewlines"),
            "Tabs and newlines"
        );
        assert_eq!(text::normalize_whitespace_in_segment(""), "");
        assert_eq!(text::normalize_whitespace_in_segment("   "), "");
    }

    #[test]
    fn test_join_fragments_drops_blank_pieces() {
        let fragments = ["  Hello ", "\n\n", "world", "   ", " again  "];
        assert_eq!(text::join_fragments(fragments), "Hello world again");
    }

    #[test]
    fn test_join_fragments_empty_input() {
        assert_eq!(text::join_fragments(Vec::<&str>::new()), "");
        assert_eq!(text::join_fragments([" ", "\t"]), "");
    }
}
