pub mod http;
pub mod messaging;
pub mod publishing;
pub mod shared;
