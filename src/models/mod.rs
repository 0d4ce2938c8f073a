pub mod alert;
pub mod event;
pub mod incident;

pub use alert::*;
pub use event::*;
pub use incident::*;
