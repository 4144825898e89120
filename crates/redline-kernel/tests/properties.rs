//! Property tests over the sanitizer and the action resolver.

use std::collections::BTreeMap;

use proptest::prelude::*;
use redline_kernel::{resolve, sanitize, sanitize_text, TRUNCATION_SUFFIX_LEN};

fn arb_tone() -> impl Strategy<Value = &'static str> {
    prop_oneof![
        Just("professional"),
        Just("casual"),
        Just("academic"),
        Just("creative"),
        Just("technical"),
    ]
}

fn arb_text() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z0-9 .,!?\n\t]{1,200}")
        .unwrap()
        .prop_filter("needs a non-whitespace char", |s| !s.trim().is_empty())
}

proptest! {
    #[test]
    fn sanitized_output_is_bounded_and_control_free(
        text in any::<String>(),
        max_length in 0usize..64,
    ) {
        let out = sanitize(Some(text.as_str()), max_length);
        prop_assert!(out.chars().count() <= max_length + TRUNCATION_SUFFIX_LEN);
        prop_assert!(!out.chars().any(char::is_control));
    }

    #[test]
    fn sanitizing_a_short_clean_value_is_a_no_op(
        text in any::<String>(),
        max_length in 1usize..256,
    ) {
        let once = sanitize_text(&text, max_length);
        if once.chars().count() <= max_length {
            prop_assert_eq!(sanitize_text(&once, max_length), once);
        }
    }

    #[test]
    fn rephrase_requires_exactly_one_style(
        text in arb_text(),
        tone in prop::option::of(arb_tone()),
        with_custom in any::<bool>(),
    ) {
        let mut parameters = BTreeMap::new();
        if let Some(tone) = tone {
            parameters.insert("tone".to_string(), tone.to_string());
        }
        if with_custom {
            parameters.insert(
                "custom_prompt".to_string(),
                "Make this sound like a pirate: {selected_text}".to_string(),
            );
        }

        let result = resolve(&text, "rephrase", &parameters);
        let style_count = usize::from(tone.is_some()) + usize::from(with_custom);
        if style_count == 1 {
            prop_assert!(result.is_ok());
        } else {
            let err = result.unwrap_err();
            prop_assert_eq!(err.field.as_deref(), Some("parameters"));
        }
    }

    #[test]
    fn custom_prompt_without_placeholder_is_rejected(
        text in arb_text(),
        prompt in prop::string::string_regex("[a-zA-Z :,]{1,100}").unwrap(),
    ) {
        let parameters =
            BTreeMap::from([("custom_prompt".to_string(), prompt)]);
        let err = resolve(&text, "rephrase", &parameters).unwrap_err();
        prop_assert_eq!(err.field.as_deref(), Some("custom_prompt"));
    }

    #[test]
    fn grammar_fix_embeds_the_text_verbatim(text in arb_text()) {
        let instruction = resolve(&text, "grammar_fix", &BTreeMap::new()).unwrap();
        prop_assert!(instruction.as_str().contains(&text));
        prop_assert!(instruction.template().is_none());
    }
}
