// esp/mod.rs — ESP-IDF implementations of the board traits

mod nvs;
pub use nvs::*;

mod wifi;
pub use wifi::*;

mod http;
pub use http::*;

mod board;
pub use board::*;

// EOF
