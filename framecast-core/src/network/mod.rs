pub mod connection;
pub mod receiver;
pub mod sender;

pub use connection::ConnectionInfo;
pub use receiver::FrameReceiver;
pub use sender::StreamSender;
