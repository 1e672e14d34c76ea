pub mod store;
pub mod types;

pub use store::UserStore;
pub use types::{Role, UserRecord, UserRow, UserRowUpdate, UserTable};
