pub mod adalight;

pub use adalight::{AdaLight, TransportError, list_ports};
