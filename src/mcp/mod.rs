//! Tool-calling protocol transport.

mod server;

pub use server::StdioServer;
