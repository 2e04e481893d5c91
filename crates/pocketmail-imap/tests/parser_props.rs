//! Robustness properties of the response parsers.

#![allow(clippy::unwrap_used)]

use pocketmail_imap::command::write_quoted;
use pocketmail_imap::parser::{
    Value, parse_fetch_response, parse_list_response, parse_value,
};
use proptest::prelude::*;

proptest! {
    #[test]
    fn parsers_never_panic(input in prop::collection::vec(any::<u8>(), 0..256)) {
        let _ = parse_value(&input);
        let _ = parse_fetch_response(&input);
        let _ = parse_list_response(&input);
    }

    #[test]
    fn fetch_prefix_with_garbage_never_panics(tail in prop::collection::vec(any::<u8>(), 0..128)) {
        let mut input = b"* 1 FETCH (".to_vec();
        input.extend_from_slice(&tail);
        let _ = parse_fetch_response(&input);
    }

    #[test]
    fn quoted_strings_survive_escaping(text in "[ -~]{0,40}") {
        let mut quoted = String::new();
        write_quoted(&mut quoted, &text);
        prop_assert_eq!(parse_value(quoted.as_bytes()).unwrap(), Value::Quoted(text));
    }

    #[test]
    fn list_names_survive_quoting(name in "[ -~]{1,40}") {
        let mut line = String::from("* LIST (\\HasNoChildren) \"/\" ");
        write_quoted(&mut line, &name);
        let entry = parse_list_response(line.as_bytes()).unwrap().unwrap();
        prop_assert_eq!(entry.name, name);
    }
}
