pub mod merchant;
pub mod intent;
pub mod transaction;

pub use intent::*;
pub use merchant::*;
pub use transaction::*;