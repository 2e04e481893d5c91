//! IMAP response parsers.
//!
//! - [`value`]: recursive-descent parser for the nested data format
//! - [`parse_fetch_response`]: strict `* <n> FETCH (...)` grammar
//! - [`parse_envelope`] and [`part_from_body_structure`]: mapping onto the
//!   `pocketmail-mime` message model
//! - [`parse_list_response`], [`parse_status_response`], [`parse_select`]
//!   and [`parse_mailbox_event`] for the remaining untagged data
//!
//! # Example
//!
//! ```
//! use pocketmail_imap::parser::parse_list_response;
//!
//! let entry = parse_list_response(br#"* LIST (\HasChildren) "/" "Work""#)
//!     .unwrap()
//!     .unwrap();
//! assert!(entry.has_children);
//! assert_eq!(entry.name, "Work");
//! ```

mod body_structure;
mod envelope;
mod fetch;
mod list;
mod status;
pub mod value;

pub use body_structure::{decode_section, part_from_body_structure};
pub use envelope::parse_envelope;
pub use fetch::{FetchResponse, parse_fetch_response};
pub use list::parse_list_response;
pub use status::{parse_capabilities, parse_mailbox_event, parse_select, parse_status_response};
pub use value::{Value, ValueParser, parse_value};
