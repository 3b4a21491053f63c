//! Infrastructure for the Session context.

pub mod local_network;
