pub(crate) mod chat;
pub(crate) mod send;
pub(crate) mod server;
