//! IMAP command handlers for the fake server.
//!
//! One module per command the retrieval flow issues: LOGIN,
//! SELECT/EXAMINE, UID SEARCH, UID FETCH and LOGOUT.

mod login;

pub use login::handle_login;
pub use logout::handle_logout;
pub use select::{Selection, handle_select};
pub use uid_fetch::handle_uid_fetch;
pub use uid_search::handle_uid_search;
