//! Transports: JSON-RPC requests over stdio, live updates over TCP

pub mod stdio;
pub mod tcp;
