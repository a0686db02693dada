//! Inbound middleware.
//!
//! Outermost first: [`correlate`] tags the request and opens its span,
//! [`observe`] times it, [`render_errors`] gives every error a JSON body,
//! then panic catching, the timeout and the body limit run.

pub mod correlation;
pub mod errors;
pub mod observe;

pub use correlation::correlate;
pub use errors::{handle_panic, not_found, render_errors};
pub use observe::observe;
