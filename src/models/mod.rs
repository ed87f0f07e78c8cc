pub mod heads;
pub mod page;
pub mod paper;

pub use heads::*;
pub use page::*;
pub use paper::*;
