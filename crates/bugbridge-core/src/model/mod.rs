//! Issue model: users, comments, the field cache, and the issue entity.

pub mod comment;
pub mod field;
pub mod issue;
pub mod user;

pub use comment::Comment;
pub use field::{Field, Slot};
pub use issue::{Issue, IssueFields, IssueUpdate, Related, Relation, RelationUpdate};
pub use user::User;
