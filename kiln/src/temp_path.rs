use std::path::PathBuf;

/// Returns a randomly named path inside the system temporary directory.
pub fn tmp_path(prefix: &str, extension: &str) -> PathBuf {
    use rand::distributions::{Alphanumeric, DistString};

    const LEN: usize = 16;

    let mut name = String::with_capacity(prefix.len() + LEN + extension.len());
    name.push_str(prefix);
    Alphanumeric.append_string(&mut rand::thread_rng(), &mut name, LEN);
    name.push_str(extension);
    std::env::temp_dir().join(name)
}

/// A temporary file that is removed when dropped.
pub struct TempFile(PathBuf);

impl TempFile {
    pub fn new(prefix: &str, extension: &str) -> Self {
        Self(tmp_path(prefix, extension))
    }

    pub fn path(&self) -> &std::path::Path {
        &self.0
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tmp_paths_are_unique() {
        let a = tmp_path("kiln-", ".json");
        let b = tmp_path("kiln-", ".json");
        assert_ne!(a, b);
        assert!(a.starts_with(std::env::temp_dir()));
        assert!(a.to_string_lossy().ends_with(".json"));
    }

    #[test]
    fn temp_file_is_removed_on_drop() {
        let path = {
            let file = TempFile::new("kiln-", ".txt");
            std::fs::write(file.path(), "x").unwrap();
            assert!(file.path().exists());
            file.path().to_owned()
        };
        assert!(!path.exists());
    }
}
