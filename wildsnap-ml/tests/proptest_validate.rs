//! Property-based tests for header validation and label handling.

use proptest::prelude::*;

use wildsnap_ml::fetch::parse_lines;
use wildsnap_ml::labels::{LabelOrigin, LabelSet, LabelSetName, strip_background};
use wildsnap_ml::validate::{HEADER_LEN, MIN_HEADER_LEN, inspect_header};
use wildsnap_ml::SignatureMatch;

// --- Header inspection ---

proptest! {
    #[test]
    fn tfl3_anywhere_in_window_is_full_match(
        prefix in proptest::collection::vec(any::<u8>(), 0..=4),
        tail in proptest::collection::vec(any::<u8>(), 0..64),
    ) {
        let mut bytes = prefix;
        bytes.extend_from_slice(b"TFL3");
        bytes.extend(tail);
        let verdict = inspect_header(&bytes);
        prop_assert_eq!(verdict.matched_signature, SignatureMatch::Full);
        prop_assert!(verdict.looks_valid);
    }

    #[test]
    fn tfl_without_3_in_window_is_partial_match(
        prefix in proptest::collection::vec(any::<u8>(), 0..=4),
        next in any::<u8>().prop_filter("not the TFL3 version byte", |b| *b != b'3'),
        tail in proptest::collection::vec(any::<u8>(), 0..64),
    ) {
        let mut bytes = prefix;
        bytes.extend_from_slice(b"TFL");
        bytes.push(next);
        bytes.extend(tail);
        let verdict = inspect_header(&bytes);
        prop_assume!(!verdict.raw_header_hex.contains("54464c33"));
        prop_assert_eq!(verdict.matched_signature, SignatureMatch::Partial);
        prop_assert!(verdict.looks_valid);
    }

    #[test]
    fn misaligned_tfl_nibbles_are_partial_match(
        lead in 0u8..16,
        fill in proptest::collection::vec(any::<u8>(), 4..=4),
    ) {
        // Bytes x5 44 64 cy spell "?54464c?" in hex, off the byte boundary.
        let mut bytes = vec![lead << 4 | 0x5, 0x44, 0x64, 0xC0];
        bytes.extend(fill);
        let verdict = inspect_header(&bytes);
        prop_assume!(!verdict.raw_header_hex.contains("54464c33"));
        prop_assert_eq!(verdict.matched_signature, SignatureMatch::Partial);
    }

    #[test]
    fn short_files_are_never_valid(bytes in proptest::collection::vec(any::<u8>(), 0..MIN_HEADER_LEN)) {
        let verdict = inspect_header(&bytes);
        prop_assert!(!verdict.looks_valid);
        prop_assert!(verdict.too_small());
        prop_assert_eq!(verdict.bytes_read, bytes.len());
    }

    #[test]
    fn only_the_header_window_is_read(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
        let verdict = inspect_header(&bytes);
        prop_assert_eq!(verdict.bytes_read, bytes.len().min(HEADER_LEN));
        prop_assert_eq!(verdict.raw_header_hex.len(), verdict.bytes_read * 2);
        prop_assert!(verdict.raw_header_hex.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn bytes_past_the_window_never_change_the_verdict(
        header in proptest::collection::vec(any::<u8>(), HEADER_LEN..=HEADER_LEN),
        tail in proptest::collection::vec(any::<u8>(), 0..64),
    ) {
        let mut long = header.clone();
        long.extend(tail);
        prop_assert_eq!(inspect_header(&header), inspect_header(&long));
    }

    #[test]
    fn valid_iff_signature_matched(bytes in proptest::collection::vec(any::<u8>(), 0..16)) {
        let verdict = inspect_header(&bytes);
        prop_assert_eq!(verdict.looks_valid, verdict.matched_signature != SignatureMatch::None);
        prop_assert_eq!(verdict.advisory().is_some(), !verdict.looks_valid && !verdict.too_small());
    }
}

// --- Label files ---

proptest! {
    #[test]
    fn written_line_count_matches_label_count(
        labels in proptest::collection::vec("[a-z][a-z ]{0,15}", 0..50),
    ) {
        let set = LabelSet {
            name: LabelSetName::Imagenet,
            labels,
            origin: LabelOrigin::Remote,
        };
        let contents = set.to_file_contents();
        prop_assert!(!contents.ends_with('\n'));
        prop_assert_eq!(contents.lines().count(), set.count());
    }

    #[test]
    fn parse_lines_has_no_trailing_blank(text in "[a-z\\n ]{0,80}") {
        let lines = parse_lines(&text);
        prop_assert!(lines.last().is_none_or(|l| !l.trim().is_empty()));
    }

    #[test]
    fn strip_background_removes_at_most_one_leading_entry(
        rest in proptest::collection::vec("[a-z]{1,8}", 0..20),
    ) {
        let mut with_bg = vec!["background".to_string()];
        with_bg.extend(rest.clone());
        prop_assert_eq!(strip_background(with_bg), rest.clone());
        prop_assert_eq!(strip_background(rest.clone()), rest);
    }
}
