use pg4n_core::{
    continuation_variants, find_fresh_prompt, inject, is_return_keypress, last_statement,
};
use proptest::prelude::*;

proptest! {
    #[test]
    fn text_without_prompt_is_never_changed(text in "[a-zA-Z0-9 |()+,.-]{0,80}") {
        prop_assert_eq!(inject(text.as_bytes(), "Test"), text.as_bytes().to_vec());
    }

    #[test]
    fn injection_keeps_the_chunk_around_the_message(
        rows in "[a-z0-9 |-]{0,40}",
        db in "[a-z][a-z0-9_.-]{0,12}",
        message in "[A-Za-z ]{1,30}",
    ) {
        let prompt = format!("\x1b[?2004h{db}=# ");
        let chunk = format!("{rows}\r\n{prompt}");
        let out = inject(chunk.as_bytes(), &message);

        let expected = format!("{rows}\r\n\r\n{message}\r\n\r\n{prompt}");
        prop_assert_eq!(String::from_utf8_lossy(&out), expected);
    }

    #[test]
    fn bare_prompt_gets_the_message_in_front(
        db in "[a-z][a-z0-9_.-]{0,12}",
        message in "[A-Za-z ]{1,30}",
    ) {
        let chunk = format!("\x1b[?2004h{db}=> ");
        let out = inject(chunk.as_bytes(), &message);

        let expected = format!("{message}\r\n{chunk}");
        prop_assert_eq!(String::from_utf8_lossy(&out), expected);
    }

    #[test]
    fn continuation_prompts_are_never_fresh(
        db in "[a-z][a-z0-9_.-]{0,12}",
        variant in prop::sample::select(continuation_variants()),
    ) {
        let chunk = format!("\r\n{db}{variant} ");
        prop_assert!(find_fresh_prompt(chunk.as_bytes()).is_none());
    }

    #[test]
    fn matchers_accept_any_bytes(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
        let _ = find_fresh_prompt(&bytes);
        let _ = is_return_keypress(&bytes);
        let _ = last_statement(&String::from_utf8_lossy(&bytes));
    }
}

#[test]
fn every_continuation_variant_is_distinct() {
    let mut variants = continuation_variants();
    let count = variants.len();
    variants.sort();
    variants.dedup();
    assert_eq!(variants.len(), count);
    assert_eq!(count, 48);
}
