use std::path::Path;

use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{Row, SqlitePool};
use thiserror::Error;

use crate::item::SyncItem;

#[derive(Debug, Error)]
pub enum JournalError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("invalid file kind: {0}")]
    InvalidKind(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    File,
    Directory,
}

impl FileKind {
    fn as_str(&self) -> &'static str {
        match self {
            FileKind::File => "file",
            FileKind::Directory => "dir",
        }
    }

    fn parse(value: &str) -> Result<Self, JournalError> {
        match value {
            "file" => Ok(FileKind::File),
            "dir" => Ok(FileKind::Directory),
            other => Err(JournalError::InvalidKind(other.to_string())),
        }
    }
}

/// One journal row per synchronized path: the local stat fields plus the
/// server's version token and stable id. After a successful job exactly one
/// record exists at the item's post-rename path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub path: String,
    pub inode: i64,
    pub uid: i64,
    pub gid: i64,
    pub mode: i64,
    pub modtime: i64,
    pub kind: FileKind,
    pub etag: String,
    pub file_id: String,
}

impl FileRecord {
    /// Builds the record from the item plus a stat of the local file. A
    /// failed stat leaves the identity fields zeroed; the etag and file id
    /// still get journaled.
    pub fn from_item(item: &SyncItem, local_path: &Path) -> Self {
        let mut record = Self {
            path: item.file.clone(),
            inode: 0,
            uid: 0,
            gid: 0,
            mode: 0,
            modtime: item.modtime,
            kind: if item.is_directory {
                FileKind::Directory
            } else {
                FileKind::File
            },
            etag: item.etag.clone(),
            file_id: item.file_id.clone(),
        };
        #[cfg(unix)]
        if let Ok(meta) = std::fs::metadata(local_path) {
            use std::os::unix::fs::MetadataExt;
            record.inode = meta.ino() as i64;
            record.uid = meta.uid() as i64;
            record.gid = meta.gid() as i64;
            record.mode = meta.mode() as i64;
        }
        #[cfg(not(unix))]
        let _ = local_path;
        record
    }
}

/// Resumable-upload checkpoint. Retained only while the transfer is
/// resumable; deleted on success or when the source modtime moves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadInfo {
    pub valid: bool,
    /// Next chunk index to resume from, 0-based.
    pub chunk: u32,
    /// Matches the chunk URL suffix of the interrupted transfer.
    pub transfer_id: u64,
    pub modtime: i64,
}

/// Resumable-download checkpoint. While valid, the file at `tmpfile` holds a
/// prefix of the body corresponding to `etag`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadInfo {
    pub valid: bool,
    pub etag: String,
    /// Sync-root-relative temp path, dot-prefixed with a `.~HEX` suffix.
    pub tmpfile: String,
}

pub struct Journal {
    pool: SqlitePool,
}

impl Journal {
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn open(db_path: &Path) -> Result<Self, JournalError> {
        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options).await?;
        let journal = Self { pool };
        journal.init().await?;
        Ok(journal)
    }

    pub async fn init(&self) -> Result<(), JournalError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS metadata (
                path TEXT PRIMARY KEY,
                inode INTEGER NOT NULL DEFAULT 0,
                uid INTEGER NOT NULL DEFAULT 0,
                gid INTEGER NOT NULL DEFAULT 0,
                mode INTEGER NOT NULL DEFAULT 0,
                modtime INTEGER NOT NULL DEFAULT 0,
                kind TEXT NOT NULL,
                etag TEXT NOT NULL DEFAULT '',
                file_id TEXT NOT NULL DEFAULT ''
            )",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS upload_info (
                path TEXT PRIMARY KEY,
                chunk INTEGER NOT NULL,
                transfer_id INTEGER NOT NULL,
                modtime INTEGER NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS download_info (
                path TEXT PRIMARY KEY,
                etag TEXT NOT NULL,
                tmpfile TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_upload_info(&self, path: &str) -> Result<Option<UploadInfo>, JournalError> {
        let row = sqlx::query("SELECT chunk, transfer_id, modtime FROM upload_info WHERE path = ?1")
            .bind(path)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(UploadInfo {
            valid: true,
            chunk: row.try_get::<i64, _>("chunk")? as u32,
            transfer_id: row.try_get::<i64, _>("transfer_id")? as u64,
            modtime: row.try_get("modtime")?,
        }))
    }

    /// Persists the checkpoint; an invalid info clears it instead.
    pub async fn set_upload_info(&self, path: &str, info: &UploadInfo) -> Result<(), JournalError> {
        if !info.valid {
            return self.clear_upload_info(path).await;
        }
        sqlx::query(
            "INSERT INTO upload_info (path, chunk, transfer_id, modtime)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(path) DO UPDATE SET
                chunk = excluded.chunk,
                transfer_id = excluded.transfer_id,
                modtime = excluded.modtime",
        )
        .bind(path)
        .bind(info.chunk as i64)
        .bind(info.transfer_id as i64)
        .bind(info.modtime)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn clear_upload_info(&self, path: &str) -> Result<(), JournalError> {
        sqlx::query("DELETE FROM upload_info WHERE path = ?1")
            .bind(path)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn get_download_info(&self, path: &str) -> Result<Option<DownloadInfo>, JournalError> {
        let row = sqlx::query("SELECT etag, tmpfile FROM download_info WHERE path = ?1")
            .bind(path)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(DownloadInfo {
            valid: true,
            etag: row.try_get("etag")?,
            tmpfile: row.try_get("tmpfile")?,
        }))
    }

    pub async fn set_download_info(
        &self,
        path: &str,
        info: &DownloadInfo,
    ) -> Result<(), JournalError> {
        if !info.valid {
            return self.clear_download_info(path).await;
        }
        sqlx::query(
            "INSERT INTO download_info (path, etag, tmpfile)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(path) DO UPDATE SET
                etag = excluded.etag,
                tmpfile = excluded.tmpfile",
        )
        .bind(path)
        .bind(&info.etag)
        .bind(&info.tmpfile)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn clear_download_info(&self, path: &str) -> Result<(), JournalError> {
        sqlx::query("DELETE FROM download_info WHERE path = ?1")
            .bind(path)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_file_record(&self, record: &FileRecord) -> Result<(), JournalError> {
        sqlx::query(
            "INSERT INTO metadata (path, inode, uid, gid, mode, modtime, kind, etag, file_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(path) DO UPDATE SET
                inode = excluded.inode,
                uid = excluded.uid,
                gid = excluded.gid,
                mode = excluded.mode,
                modtime = excluded.modtime,
                kind = excluded.kind,
                etag = excluded.etag,
                file_id = excluded.file_id",
        )
        .bind(&record.path)
        .bind(record.inode)
        .bind(record.uid)
        .bind(record.gid)
        .bind(record.mode)
        .bind(record.modtime)
        .bind(record.kind.as_str())
        .bind(&record.etag)
        .bind(&record.file_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_file_record(&self, path: &str) -> Result<Option<FileRecord>, JournalError> {
        let row = sqlx::query(
            "SELECT path, inode, uid, gid, mode, modtime, kind, etag, file_id
             FROM metadata WHERE path = ?1",
        )
        .bind(path)
        .fetch_optional(&self.pool)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let kind: String = row.try_get("kind")?;
        Ok(Some(FileRecord {
            path: row.try_get("path")?,
            inode: row.try_get("inode")?,
            uid: row.try_get("uid")?,
            gid: row.try_get("gid")?,
            mode: row.try_get("mode")?,
            modtime: row.try_get("modtime")?,
            kind: FileKind::parse(&kind)?,
            etag: row.try_get("etag")?,
            file_id: row.try_get("file_id")?,
        }))
    }

    /// Deletes the record at `path`; for a directory the whole journaled
    /// subtree goes with it.
    pub async fn delete_file_record(
        &self,
        path: &str,
        is_directory: bool,
    ) -> Result<(), JournalError> {
        sqlx::query("DELETE FROM metadata WHERE path = ?1")
            .bind(path)
            .execute(&self.pool)
            .await?;
        if is_directory {
            sqlx::query("DELETE FROM metadata WHERE path LIKE ?1")
                .bind(format!("{}/%", path.trim_end_matches('/')))
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn journal() -> Journal {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        let journal = Journal::from_pool(pool);
        journal.init().await.unwrap();
        journal
    }

    fn record(path: &str, kind: FileKind) -> FileRecord {
        FileRecord {
            path: path.into(),
            inode: 7,
            uid: 1000,
            gid: 1000,
            mode: 0o644,
            modtime: 1_700_000_000,
            kind,
            etag: "5afabc".into(),
            file_id: "fid1".into(),
        }
    }

    #[tokio::test]
    async fn upload_info_roundtrips_and_invalid_clears() {
        let journal = journal().await;
        let info = UploadInfo {
            valid: true,
            chunk: 3,
            transfer_id: 42,
            modtime: 1_700_000_000,
        };
        journal.set_upload_info("a.bin", &info).await.unwrap();
        assert_eq!(journal.get_upload_info("a.bin").await.unwrap(), Some(info));

        journal
            .set_upload_info(
                "a.bin",
                &UploadInfo {
                    valid: false,
                    chunk: 0,
                    transfer_id: 0,
                    modtime: 0,
                },
            )
            .await
            .unwrap();
        assert_eq!(journal.get_upload_info("a.bin").await.unwrap(), None);
    }

    #[tokio::test]
    async fn download_info_roundtrips() {
        let journal = journal().await;
        let info = DownloadInfo {
            valid: true,
            etag: "5afabc".into(),
            tmpfile: "Docs/.A.txt.~00c0ffee".into(),
        };
        journal.set_download_info("Docs/A.txt", &info).await.unwrap();
        assert_eq!(
            journal.get_download_info("Docs/A.txt").await.unwrap(),
            Some(info)
        );
        journal.clear_download_info("Docs/A.txt").await.unwrap();
        assert_eq!(journal.get_download_info("Docs/A.txt").await.unwrap(), None);
    }

    #[tokio::test]
    async fn file_records_upsert_by_path() {
        let journal = journal().await;
        journal
            .set_file_record(&record("Docs/A.txt", FileKind::File))
            .await
            .unwrap();
        let mut updated = record("Docs/A.txt", FileKind::File);
        updated.etag = "newer".into();
        journal.set_file_record(&updated).await.unwrap();

        let loaded = journal
            .get_file_record("Docs/A.txt")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.etag, "newer");
    }

    #[tokio::test]
    async fn directory_delete_takes_the_subtree() {
        let journal = journal().await;
        journal
            .set_file_record(&record("Docs", FileKind::Directory))
            .await
            .unwrap();
        journal
            .set_file_record(&record("Docs/A.txt", FileKind::File))
            .await
            .unwrap();
        journal
            .set_file_record(&record("Docs2", FileKind::Directory))
            .await
            .unwrap();

        journal.delete_file_record("Docs", true).await.unwrap();

        assert!(journal.get_file_record("Docs").await.unwrap().is_none());
        assert!(journal.get_file_record("Docs/A.txt").await.unwrap().is_none());
        assert!(journal.get_file_record("Docs2").await.unwrap().is_some());
    }
}
