pub mod clock_sync;
pub mod connection;
pub mod transport;
