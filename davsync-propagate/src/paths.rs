use std::path::{Path, PathBuf};

use time::format_description::FormatItem;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

/// Maps a forward-slash sync-root-relative path under the local root.
pub fn local_path_for(local_root: &Path, file: &str) -> PathBuf {
    let mut out = local_root.to_path_buf();
    for part in file.split('/').filter(|part| !part.is_empty()) {
        out.push(part);
    }
    out
}

/// Temp-file name for a download: `.<basename>.~<8 hex>` in the item's own
/// directory, so the final rename never crosses a filesystem.
pub fn tmp_file_name(file: &str) -> String {
    tmp_file_name_with(file, rand::random::<u32>())
}

fn tmp_file_name_with(file: &str, suffix: u32) -> String {
    let (dir, name) = match file.rsplit_once('/') {
        Some((dir, name)) => (format!("{dir}/"), name),
        None => (String::new(), file),
    };
    format!("{dir}.{name}.~{suffix:08x}")
}

const CONFLICT_STAMP: &[FormatItem<'static>] =
    format_description!("[year][month][day]-[hour][minute][second]");

/// Conflict-backup name: `_conflict-<yyyyMMdd-hhmmss>` inserted before the
/// extension, where the extension dot must come after the last `/` (so
/// `foo/.hidden` and `foo.bar/file` get the suffix at the end). The stamp is
/// the modtime of the version being overwritten, rendered in `offset`.
pub fn conflict_file_name(file: &str, modtime: i64, offset: UtcOffset) -> String {
    let stamp = OffsetDateTime::from_unix_timestamp(modtime)
        .map(|instant| instant.to_offset(offset))
        .ok()
        .and_then(|instant| instant.format(CONFLICT_STAMP).ok())
        .unwrap_or_else(|| modtime.to_string());
    let slash = file.rfind('/').map(|at| at + 1).unwrap_or(0);
    let dot = match file.rfind('.') {
        Some(at) if at > slash => at,
        _ => file.len(),
    };
    format!("{}_conflict-{}{}", &file[..dot], stamp, &file[dot..])
}

/// The offset conflict stamps are rendered in: the local zone when it can be
/// determined, UTC otherwise.
pub fn conflict_stamp_offset() -> UtcOffset {
    UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_path_joins_forward_slash_components() {
        let mapped = local_path_for(Path::new("/sync"), "Docs/A.txt");
        assert_eq!(mapped, PathBuf::from("/sync/Docs/A.txt"));
        let root_level = local_path_for(Path::new("/sync"), "/A.txt");
        assert_eq!(root_level, PathBuf::from("/sync/A.txt"));
    }

    #[test]
    fn tmp_name_is_hidden_and_suffixed_in_the_same_directory() {
        assert_eq!(
            tmp_file_name_with("Docs/A.txt", 0xdeadbeef),
            "Docs/.A.txt.~deadbeef"
        );
        assert_eq!(tmp_file_name_with("A.txt", 0x1), ".A.txt.~00000001");
    }

    #[test]
    fn conflict_name_goes_before_the_extension() {
        assert_eq!(
            conflict_file_name("Docs/doc.txt", 1_700_000_000, UtcOffset::UTC),
            "Docs/doc_conflict-20231114-221320.txt"
        );
    }

    #[test]
    fn conflict_name_without_extension_appends_the_suffix() {
        assert_eq!(
            conflict_file_name("Docs/README", 1_700_000_000, UtcOffset::UTC),
            "Docs/README_conflict-20231114-221320"
        );
    }

    #[test]
    fn dotfiles_and_dotted_directories_keep_the_suffix_at_the_end() {
        assert_eq!(
            conflict_file_name("foo/.hidden", 1_700_000_000, UtcOffset::UTC),
            "foo/.hidden_conflict-20231114-221320"
        );
        assert_eq!(
            conflict_file_name("foo.bar/file", 1_700_000_000, UtcOffset::UTC),
            "foo.bar/file_conflict-20231114-221320"
        );
    }
}
