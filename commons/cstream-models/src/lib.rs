pub mod consistency;
pub mod error;
pub mod mutation;

pub use consistency::*;
pub use error::*;
pub use mutation::*;
