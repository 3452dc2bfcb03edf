//! Bridge to the line-oriented lookup service.
//!
//! One upstream connection is shared by every client handler. A query and
//! its full reply form one exclusive session on that connection:
//!
//! ```text
//!   acquire lock → write "<query>\n" → read lines until blank/EOF → release
//! ```
//!
//! Waiters queue on a FIFO-fair lock, so at most one query is ever in
//! flight against the lookup service.

pub mod page;
pub mod record;
pub mod upstream;

pub use record::{parse_record, LookupRecord};
pub use upstream::{LookupError, LookupSession, Upstream};
