//! Request semantics of the writing service, free of any transport.
//!
//! [`resolve`] turns a selected text plus action parameters into the single
//! instruction handed to the generation provider, [`validate_feedback`] does
//! the same gatekeeping for feedback, and [`sanitize`] is the only way a
//! value should reach a log record.

pub mod error;
pub mod feedback;
pub mod resolve;
pub mod sanitize;

pub use error::{ErrorKind, ServiceError, UNKNOWN_ERROR_CODE, UNKNOWN_ERROR_MESSAGE};
pub use feedback::{browser_info, validate_feedback, BrowserInfo, FeedbackType, ValidFeedback};
pub use resolve::{
    resolve, Action, RephraseStyle, ResolvedInstruction, Tone, MAX_CUSTOM_PROMPT_CHARS,
    MAX_SELECTED_TEXT_CHARS,
};
pub use sanitize::{content_hash, sanitize, sanitize_text, NULL_SENTINEL, TRUNCATION_SUFFIX_LEN};
