//! Socket abstractions that let the connection core run against either real `mio` sockets or an
//! in-memory stand-in during tests.

pub mod tcp_listener;
pub mod tcp_stream;

pub use tcp_listener::TcpListener;
pub use tcp_stream::TcpStream;
