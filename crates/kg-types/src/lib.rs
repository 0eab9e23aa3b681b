pub mod node;
pub mod errors;

pub use node::*;
pub use errors::*;
