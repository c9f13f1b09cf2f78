//! 릴레이 서버 핸들러 모듈

pub mod connection;
pub mod room;
pub mod signaling;

pub use connection::*;
pub use room::*;
pub use signaling::*;
