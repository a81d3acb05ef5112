pub mod error;
pub mod pii;

pub use error::StoreError;
pub use pii::Masked;
