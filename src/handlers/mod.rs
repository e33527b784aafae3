pub mod accounts;
pub mod health;
pub mod pages;

pub use accounts::*;
pub use health::*;
pub use pages::*;
