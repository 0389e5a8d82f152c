use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// File extensions treated as images (compared case-insensitively).
pub const SUPPORTED_EXTENSIONS: [&str; 7] = ["jpg", "jpeg", "png", "bmp", "tiff", "tif", "gif"];

pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
}

/// List image files in `directory`, sorted by path.
///
/// Only the top level is scanned unless `recursive` is set. Entries under
/// `exclude` are skipped so an output folder nested inside the dataset is
/// never fed back into the run. Symlinks to files are listed; symlinked
/// directories are not descended.
pub fn discover_images(directory: &Path, recursive: bool, exclude: Option<&Path>) -> Vec<PathBuf> {
    let max_depth = if recursive { usize::MAX } else { 1 };

    let mut images: Vec<PathBuf> = WalkDir::new(directory)
        .min_depth(1)
        .max_depth(max_depth)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| exclude.map_or(true, |ex| entry.path() != ex))
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                tracing::warn!(error = %err, "skipping unreadable directory entry");
                None
            }
        })
        .filter(|entry| is_file_or_file_link(entry) && is_supported_image(entry.path()))
        .map(|entry| entry.into_path())
        .collect();

    images.sort();
    images
}

fn is_file_or_file_link(entry: &walkdir::DirEntry) -> bool {
    let file_type = entry.file_type();
    file_type.is_file() || (file_type.is_symlink() && entry.path().is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use tempfile::tempdir;

    #[test]
    fn test_is_supported_image() {
        assert!(is_supported_image(Path::new("a/photo.JPG")));
        assert!(is_supported_image(Path::new("scan.tif")));
        assert!(is_supported_image(Path::new("anim.gif")));
        assert!(!is_supported_image(Path::new("notes.txt")));
        assert!(!is_supported_image(Path::new("README")));
        assert!(!is_supported_image(Path::new("photo.webp")));
    }

    #[test]
    fn test_discover_top_level_only() {
        let dir = tempdir().unwrap();
        File::create(dir.path().join("b.png")).unwrap();
        File::create(dir.path().join("a.jpg")).unwrap();
        File::create(dir.path().join("document.txt")).unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        File::create(dir.path().join("sub/c.jpeg")).unwrap();
        // A directory with an image-like name is not a file.
        fs::create_dir(dir.path().join("folder.png")).unwrap();

        let images = discover_images(dir.path(), false, None);
        let names: Vec<_> = images
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["a.jpg", "b.png"]);
    }

    #[test]
    fn test_discover_recursive_excludes_output() {
        let dir = tempdir().unwrap();
        File::create(dir.path().join("a.jpg")).unwrap();
        fs::create_dir_all(dir.path().join("trip/day1")).unwrap();
        File::create(dir.path().join("trip/day1/b.png")).unwrap();
        fs::create_dir(dir.path().join("matches")).unwrap();
        File::create(dir.path().join("matches/a.jpg")).unwrap();

        let output = dir.path().join("matches");
        let images = discover_images(dir.path(), true, Some(&output));
        assert_eq!(
            images,
            vec![dir.path().join("a.jpg"), dir.path().join("trip/day1/b.png")]
        );
    }

    #[test]
    fn test_discover_empty() {
        let dir = tempdir().unwrap();
        assert!(discover_images(dir.path(), true, None).is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_discover_follows_file_links_only() {
        use std::os::unix::fs::symlink;

        let elsewhere = tempdir().unwrap();
        File::create(elsewhere.path().join("real.jpg")).unwrap();
        fs::create_dir(elsewhere.path().join("album")).unwrap();
        File::create(elsewhere.path().join("album/inner.png")).unwrap();

        let dir = tempdir().unwrap();
        File::create(dir.path().join("a.jpg")).unwrap();
        symlink(elsewhere.path().join("real.jpg"), dir.path().join("linked.jpg")).unwrap();
        symlink(elsewhere.path().join("gone.jpg"), dir.path().join("dangling.jpg")).unwrap();
        symlink(elsewhere.path().join("album"), dir.path().join("album")).unwrap();

        let images = discover_images(dir.path(), true, None);
        assert_eq!(images, vec![dir.path().join("a.jpg"), dir.path().join("linked.jpg")]);
    }
}
