//! Engine-side plumbing that is independent of any rendering backend:
//! project directory management and the window collaborator contract.

pub mod project;
pub mod window;

pub use project::{Project, ProjectError};
pub use window::{WindowEvent, WindowSurface};
