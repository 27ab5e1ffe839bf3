//! Domain models for Tally.
//!
//! # Core Concepts
//!
//! - [`Todo`]: The central record. Owns its tags, notes, and mentions.
//! - [`Tag`]: Shared vocabulary, created on first use by any todo and never
//!   deleted, even when unreferenced.
//! - [`Note`]: Immutable comment attached to a todo.
//! - [`User`]: Read-only from this crate's perspective; owned by the
//!   auth/user-directory collaborator.
//!
//! Mentions are derived data: the set of users resolvable from the todo's
//! current description, recomputed wholesale on every description change.
//! On the wire they appear as the mentioned [`User`] records inlined into
//! [`DetailedTodo`].

mod id;
mod note;
mod query;
mod tag;
mod todo;
mod user;

pub use id::*;
pub use note::*;
pub use query::*;
pub use tag::*;
pub use todo::*;
pub use user::*;
