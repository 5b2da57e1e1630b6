//! Terminal user interface bits for the operator.

mod device_selector;
mod error;

pub use device_selector::{device_selector, SelectorInput};
pub use error::GuiError;
