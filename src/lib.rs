//! Lantern - static file server with an mdb-lookup gateway
//!
//! Serves files from a web root over HTTP/1.0 and renders queries against
//! a line-oriented lookup service as HTML.

pub mod config;
pub mod http;
pub mod lookup;
pub mod server;
