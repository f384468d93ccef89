pub mod connection;

pub use connection::StreamState;
