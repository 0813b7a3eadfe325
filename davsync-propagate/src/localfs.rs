use std::fs;
use std::io::Read;
use std::path::Path;

/// Removes a directory tree including hidden entries. Directory symlinks are
/// unlinked, not followed. A failing entry marks the whole removal failed
/// but the walk keeps going, so as much as possible is cleaned up.
pub fn remove_recursively(path: &Path) -> bool {
    let entries = match fs::read_dir(path) {
        Ok(entries) => entries,
        Err(_) => return false,
    };
    let mut success = true;
    for entry in entries {
        let Ok(entry) = entry else {
            success = false;
            continue;
        };
        let child = entry.path();
        let is_real_dir = entry
            .file_type()
            .map(|kind| kind.is_dir() && !kind.is_symlink())
            .unwrap_or(false);
        let ok = if is_real_dir {
            remove_recursively(&child)
        } else {
            fs::remove_file(&child).is_ok()
        };
        if !ok {
            success = false;
        }
    }
    if success {
        success = fs::remove_dir(path).is_ok();
    }
    success
}

const COMPARE_BUFFER: usize = 16 * 1024;

/// Byte-wise content comparison. A file that cannot be opened compares as
/// different, which makes the conflict branch preserve the local copy.
pub fn file_equals(left: &Path, right: &Path) -> bool {
    let (Ok(mut f1), Ok(mut f2)) = (fs::File::open(left), fs::File::open(right)) else {
        tracing::debug!(?left, ?right, "file_equals: failed to open");
        return false;
    };
    match (f1.metadata(), f2.metadata()) {
        (Ok(m1), Ok(m2)) if m1.len() == m2.len() => {}
        _ => return false,
    }
    let mut buffer1 = [0u8; COMPARE_BUFFER];
    let mut buffer2 = [0u8; COMPARE_BUFFER];
    loop {
        let Ok(read1) = f1.read(&mut buffer1) else {
            return false;
        };
        let Ok(read2) = f2.read(&mut buffer2) else {
            return false;
        };
        if read1 != read2 {
            // files of equal size should produce equal-sized reads
            return false;
        }
        if read1 == 0 {
            return true;
        }
        if buffer1[..read1] != buffer2[..read2] {
            return false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn removes_nested_tree_with_hidden_entries() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("victim");
        fs::create_dir_all(root.join("sub/deeper")).unwrap();
        fs::write(root.join("a.txt"), b"a").unwrap();
        fs::write(root.join(".hidden"), b"h").unwrap();
        fs::write(root.join("sub/deeper/b.txt"), b"b").unwrap();

        assert!(remove_recursively(&root));
        assert!(!root.exists());
    }

    #[cfg(unix)]
    #[test]
    fn does_not_follow_directory_symlinks() {
        let dir = tempdir().unwrap();
        let outside = dir.path().join("outside");
        fs::create_dir(&outside).unwrap();
        fs::write(outside.join("keep.txt"), b"k").unwrap();

        let root = dir.path().join("victim");
        fs::create_dir(&root).unwrap();
        std::os::unix::fs::symlink(&outside, root.join("link")).unwrap();

        assert!(remove_recursively(&root));
        assert!(!root.exists());
        assert!(outside.join("keep.txt").exists());
    }

    #[test]
    fn equal_files_compare_equal() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        fs::write(&a, b"same content").unwrap();
        fs::write(&b, b"same content").unwrap();
        assert!(file_equals(&a, &b));
    }

    #[test]
    fn different_content_or_size_compares_unequal() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        fs::write(&a, b"same content").unwrap();
        fs::write(&b, b"other content").unwrap();
        assert!(!file_equals(&a, &b));

        fs::write(&b, b"longer content than a").unwrap();
        assert!(!file_equals(&a, &b));
    }

    #[test]
    fn missing_file_compares_unequal() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a");
        fs::write(&a, b"x").unwrap();
        assert!(!file_equals(&a, &dir.path().join("missing")));
    }
}
