pub mod deserialise;
pub mod serialise;
pub mod types;

pub use deserialise::{ConsumableBuffer, Error as DeserialiseError};
pub use serialise::{Error as SerialiseError, WritableBuffer};
pub use types::*;
