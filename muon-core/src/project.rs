//! Project directory management.
//!
//! A project is a directory holding a `project.toml` manifest and a fixed set
//! of asset subdirectories. Creation initialises the directory structure,
//! loading reads an existing manifest back.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace};

const PROJECT_FILE_NAME: &str = "project.toml";
const ASSET_SUBDIRECTORIES: [&str; 5] = ["images", "models", "scenes", "scripts", "shaders"];

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("failed to create directory: {0}")]
    FailedToCreateDirectory(PathBuf),
    #[error("path is not a directory: {0}")]
    PathIsNotDirectory(PathBuf),
    #[error("directory is not empty: {0}")]
    DirectoryIsNotEmpty(PathBuf),
    #[error("failed to open project file: {0}")]
    FailedToOpenProjectFile(PathBuf),
    #[error("project file does not exist: {0}")]
    ProjectFileDoesNotExist(PathBuf),
    #[error("malformed project file: {0}")]
    MalformedProjectFile(String),
}

pub type Result<T, E = ProjectError> = std::result::Result<T, E>;

#[derive(Debug, Serialize, Deserialize)]
struct ProjectManifest {
    name: String,
}

#[derive(Debug)]
pub struct Project {
    name: String,
    directory: PathBuf,
    project_file: PathBuf,
}

impl Project {
    /// Initialises a new project at `directory`.
    ///
    /// The directory is created if it does not exist; an existing directory
    /// must be empty. The asset subdirectories are created alongside the
    /// manifest.
    pub fn create(name: impl Into<String>, directory: impl Into<PathBuf>) -> Result<Self> {
        let name = name.into();
        let directory = directory.into();

        if !directory.exists() {
            trace!("creating project directory at {}", directory.display());
            fs::create_dir_all(&directory)
                .map_err(|_| ProjectError::FailedToCreateDirectory(directory.clone()))?;
        }

        if !directory.is_dir() {
            return Err(ProjectError::PathIsNotDirectory(directory));
        }

        let mut entries = fs::read_dir(&directory)
            .map_err(|_| ProjectError::PathIsNotDirectory(directory.clone()))?;
        if entries.next().is_some() {
            return Err(ProjectError::DirectoryIsNotEmpty(directory));
        }

        for subdirectory in ASSET_SUBDIRECTORIES {
            let path = directory.join(subdirectory);
            trace!("creating project subdirectory {}", path.display());
            fs::create_dir_all(&path).map_err(|_| ProjectError::FailedToCreateDirectory(path.clone()))?;
        }

        let project = Self {
            project_file: directory.join(PROJECT_FILE_NAME),
            name,
            directory,
        };
        project.save()?;

        debug!("created project `{}` at {}", project.name, project.directory.display());
        Ok(project)
    }

    /// Loads a project from an existing `project.toml`.
    pub fn load(project_file: impl Into<PathBuf>) -> Result<Self> {
        let project_file = project_file.into();
        if !project_file.exists() {
            return Err(ProjectError::ProjectFileDoesNotExist(project_file));
        }

        let contents = fs::read_to_string(&project_file)
            .map_err(|_| ProjectError::FailedToOpenProjectFile(project_file.clone()))?;
        let manifest: ProjectManifest = toml::from_str(&contents)
            .map_err(|err| ProjectError::MalformedProjectFile(err.to_string()))?;

        let directory = project_file
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| ProjectError::PathIsNotDirectory(project_file.clone()))?;

        debug!("loaded project `{}` from {}", manifest.name, project_file.display());
        Ok(Self {
            name: manifest.name,
            directory,
            project_file,
        })
    }

    /// Writes the manifest back to disk.
    pub fn save(&self) -> Result<()> {
        let manifest = ProjectManifest {
            name: self.name.clone(),
        };
        let contents = toml::to_string_pretty(&manifest)
            .map_err(|err| ProjectError::MalformedProjectFile(err.to_string()))?;
        fs::write(&self.project_file, contents)
            .map_err(|_| ProjectError::FailedToOpenProjectFile(self.project_file.clone()))?;

        trace!("saved project file to {}", self.project_file.display());
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn images_directory(&self) -> PathBuf {
        self.directory.join("images")
    }

    pub fn models_directory(&self) -> PathBuf {
        self.directory.join("models")
    }

    pub fn scenes_directory(&self) -> PathBuf {
        self.directory.join("scenes")
    }

    pub fn scripts_directory(&self) -> PathBuf {
        self.directory.join("scripts")
    }

    pub fn shaders_directory(&self) -> PathBuf {
        self.directory.join("shaders")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_initialises_directory_structure() {
        let root = tempfile::tempdir().unwrap();
        let directory = root.path().join("demo");

        let project = Project::create("demo", &directory).unwrap();

        assert_eq!(project.name(), "demo");
        assert!(directory.join(PROJECT_FILE_NAME).is_file());
        for subdirectory in ASSET_SUBDIRECTORIES {
            assert!(directory.join(subdirectory).is_dir(), "{subdirectory} missing");
        }
    }

    #[test]
    fn create_rejects_non_empty_directory() {
        let root = tempfile::tempdir().unwrap();
        fs::write(root.path().join("occupant"), b"data").unwrap();

        let result = Project::create("demo", root.path());
        assert!(matches!(result, Err(ProjectError::DirectoryIsNotEmpty(_))));
    }

    #[test]
    fn create_rejects_file_path() {
        let root = tempfile::tempdir().unwrap();
        let file = root.path().join("not-a-directory");
        fs::write(&file, b"data").unwrap();

        let result = Project::create("demo", &file);
        assert!(matches!(result, Err(ProjectError::PathIsNotDirectory(_))));
    }

    #[test]
    fn load_round_trips_created_project() {
        let root = tempfile::tempdir().unwrap();
        let directory = root.path().join("demo");
        Project::create("demo", &directory).unwrap();

        let loaded = Project::load(directory.join(PROJECT_FILE_NAME)).unwrap();
        assert_eq!(loaded.name(), "demo");
        assert_eq!(loaded.directory(), directory);
    }

    #[test]
    fn load_requires_existing_manifest() {
        let root = tempfile::tempdir().unwrap();
        let result = Project::load(root.path().join(PROJECT_FILE_NAME));
        assert!(matches!(result, Err(ProjectError::ProjectFileDoesNotExist(_))));
    }

    #[test]
    fn load_rejects_malformed_manifest() {
        let root = tempfile::tempdir().unwrap();
        let file = root.path().join(PROJECT_FILE_NAME);
        fs::write(&file, "name = [not valid").unwrap();

        let result = Project::load(&file);
        assert!(matches!(result, Err(ProjectError::MalformedProjectFile(_))));
    }
}
