//! HTTP/1.0 request handling.
//!
//! # Architecture
//!
//! - **`connection`**: Per-connection state machine driving one request
//! - **`parser`**: Request line parsing and header discarding
//! - **`request`**: Parsed request line and target helpers
//! - **`response`**: Status code registry and error pages
//! - **`writer`**: Ordered, flush-then-close response output
//! - **`static_files`**: Maps request paths onto the web root
//!
//! # Connection State Machine
//!
//! ```text
//!        ┌────────────────────┐
//!        │ ReadingRequestLine │ ← One line, bounded length
//!        └─────────┬──────────┘
//!                  ▼
//!        ┌────────────────────┐
//!        │   ReadingHeaders   │ ← Discarded up to the blank line
//!        └─────────┬──────────┘
//!                  ▼
//!        ┌────────────────────┐
//!        │     Classified     │ ← Lookup, static file or error
//!        └─────────┬──────────┘
//!                  ▼
//!        ┌────────────────────┐
//!        │     Responding     │
//!        └─────────┬──────────┘
//!                  ▼
//!        ┌────────────────────┐
//!        │       Closed       │ ← Reached on every path
//!        └────────────────────┘
//! ```
//!
//! There is no keep-alive: the end of the body is signalled by closing
//! the connection.

pub mod connection;
pub mod parser;
pub mod request;
pub mod response;
pub mod static_files;
pub mod writer;
