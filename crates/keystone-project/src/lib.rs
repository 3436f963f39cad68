//! Keystone project graph manager.
//!
//! Discovers project configuration roots on disk, links nested projects into
//! a hierarchy, assigns every file a stable UID, and evicts and reloads whole
//! project components when one of their config dependencies changes.
//!
//! # Example
//!
//! ```ignore
//! use keystone_project::{Collaborators, ProjectManager};
//!
//! let manager = ProjectManager::new(config, collaborators);
//! manager.init().await?;
//!
//! if let Some(project) = manager.find_project(&path, false).await? {
//!     let uid = manager.get_uid(&path, false)?;
//!     println!("{} belongs to {} as {}", path.display(), project.name(), uid);
//! }
//! ```

pub mod dependencies;
pub mod discovery;
pub mod eviction;
pub mod graph;
pub mod identity;
pub mod locks;
pub mod manager;
pub mod manifests;
pub mod notify;
pub mod registry;

pub use dependencies::DependencyIndex;
pub use graph::{NewProject, ProjectGraph};
pub use identity::CategorizedPaths;
pub use locks::PathLocker;
pub use manager::{Collaborators, ProjectConfigSource, ProjectManager};
pub use registry::PathRegistry;
