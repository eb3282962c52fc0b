//! MCP (Model Context Protocol) server surface.
//!
//! Centra speaks JSON-RPC 2.0 over newline-delimited JSON on stdin/stdout.
//! [`protocol`] holds the wire types; [`server`] holds the read/dispatch/
//! write loop.

pub mod protocol;
pub mod server;

pub use server::McpServer;
