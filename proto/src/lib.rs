//! Wire formats shared by the JS5 probe client, the reset monitor, and the status endpoint

pub mod js5;
pub mod status;

pub use js5::{Revision, Status};
pub use status::ResetRecord;
