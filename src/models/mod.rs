pub mod error;
pub mod forms;
pub mod health;
pub mod page;
pub mod wrapped_doc;

pub use error::*;
pub use forms::*;
pub use health::*;
pub use page::*;
pub use wrapped_doc::*;
