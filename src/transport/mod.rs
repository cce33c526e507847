pub mod traits;
pub mod websocket;

pub use traits::{FrameSink, FrameSource, TransportConnector};
pub use websocket::{WsConnector, WsSink, WsSource};
