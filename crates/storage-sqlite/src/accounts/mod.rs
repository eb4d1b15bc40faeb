mod model;
mod repository;

pub use model::{LinkedAccountDB, TokenChangesetDB};
pub use repository::AccountRepository;
