pub mod history;
pub mod store;

pub use history::{Revision, SnippetHistory};
pub use store::{LoadReport, SnippetStore};
