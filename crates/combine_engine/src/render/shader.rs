//! Named shader handles
//!
//! The scene keeps a list of these so scripts and maps can refer to a
//! program by name. Compilation happens in the renderer; a handle only
//! knows where its sources live and, once loaded, their text.

use std::path::PathBuf;

use super::RenderError;

/// Scene-side shader handle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Shader {
    /// Program name used by `use_shader`
    pub name: String,
    /// Vertex stage source file
    pub vertex_path: PathBuf,
    /// Fragment stage source file
    pub fragment_path: PathBuf,
    /// Optional geometry stage source file
    pub geometry_path: Option<PathBuf>,
    /// Vertex stage source, once loaded
    pub vertex_source: String,
    /// Fragment stage source, once loaded
    pub fragment_source: String,
    /// Geometry stage source, once loaded
    pub geometry_source: Option<String>,
    loaded: bool,
}

impl Shader {
    /// Create an unloaded handle
    pub fn new(
        name: impl Into<String>,
        vertex_path: impl Into<PathBuf>,
        fragment_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            vertex_path: vertex_path.into(),
            fragment_path: fragment_path.into(),
            ..Self::default()
        }
    }

    /// Add a geometry stage
    pub fn with_geometry(mut self, geometry_path: impl Into<PathBuf>) -> Self {
        self.geometry_path = Some(geometry_path.into());
        self
    }

    /// Read every stage from disk
    pub fn load_from_file(&mut self) -> Result<(), RenderError> {
        let read = |path: &PathBuf| {
            std::fs::read_to_string(path).map_err(|e| {
                RenderError::ShaderSource(format!("{}: {}", path.display(), e))
            })
        };

        let vertex = read(&self.vertex_path)?;
        let fragment = read(&self.fragment_path)?;
        let geometry = self.geometry_path.as_ref().map(read).transpose()?;

        self.vertex_source = vertex;
        self.fragment_source = fragment;
        self.geometry_source = geometry;
        self.loaded = true;
        log::debug!("Loaded shader sources for '{}'", self.name);
        Ok(())
    }

    /// Whether the sources have been read
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let vs = dir.path().join("basic.vert");
        let fs = dir.path().join("basic.frag");
        std::fs::write(&vs, "void main() {}").unwrap();
        std::fs::write(&fs, "void main() { }").unwrap();

        let mut shader = Shader::new("basic", &vs, &fs);
        assert!(!shader.is_loaded());
        shader.load_from_file().unwrap();
        assert!(shader.is_loaded());
        assert_eq!(shader.vertex_source, "void main() {}");
        assert!(shader.geometry_source.is_none());
    }

    #[test]
    fn test_missing_file_leaves_unloaded() {
        let mut shader = Shader::new("missing", "/nonexistent/a.vert", "/nonexistent/a.frag");
        assert!(matches!(shader.load_from_file(), Err(RenderError::ShaderSource(_))));
        assert!(!shader.is_loaded());
    }
}
