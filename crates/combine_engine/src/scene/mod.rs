//! # Scene
//!
//! Scene objects, their renderable geometry, and the graph that owns them.

pub mod graph;
pub mod object;
pub mod renderable;

pub use graph::{ObjectHandle, ObjectId, SceneGraph};
pub use object::SceneObject;
pub use renderable::Renderable;
