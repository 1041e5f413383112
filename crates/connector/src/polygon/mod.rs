pub mod connector;
pub mod websocket;

pub use connector::PolygonConnector;
pub use websocket::{PolygonWebSocket, PolygonWsError, POLYGON_CRYPTO_WS_URL};
