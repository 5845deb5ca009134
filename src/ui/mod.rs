pub mod icons;
pub mod status;

pub use status::{OutputMode, StatusUI};
