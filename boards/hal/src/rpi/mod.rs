#[cfg(feature = "rpizero")]
pub mod rpizero;
