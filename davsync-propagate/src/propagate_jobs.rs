impl Propagator {
    async fn local_remove(&self, item: &mut SyncItem) -> Status {
        let target = paths::local_path_for(&self.local_root, &item.file);
        if item.is_directory {
            if target.is_dir() && !localfs::remove_recursively(&target) {
                return Status::NormalError(format!(
                    "could not remove directory {}",
                    target.display()
                ));
            }
        } else {
            match tokio::fs::remove_file(&target).await {
                Ok(()) => {}
                // already gone locally is fine
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => return Status::NormalError(err.to_string()),
            }
        }
        if let Err(err) = self
            .journal
            .delete_file_record(&item.original_file, false)
            .await
        {
            return Status::NormalError(err.to_string());
        }
        Status::Success
    }

    async fn local_mkdir(&self, item: &SyncItem) -> Status {
        let target = paths::local_path_for(&self.local_root, &item.file);
        if let Err(err) = tokio::fs::create_dir_all(&target).await {
            return Status::NormalError(format!(
                "could not create directory {}: {err}",
                target.display()
            ));
        }
        Status::Success
    }

    async fn local_rename(&self, item: &mut SyncItem) -> Status {
        if item.file != item.rename_target {
            let from = paths::local_path_for(&self.local_root, &item.file);
            let to = paths::local_path_for(&self.local_root, &item.rename_target);
            debug!(from = %from.display(), to = %to.display(), "local rename");
            if let Err(err) = tokio::fs::rename(&from, &to).await {
                return Status::NormalError(err.to_string());
            }
        }
        // nothing downstream may process this item again
        item.instruction = Instruction::Deleted;
        if let Err(err) = self
            .journal
            .delete_file_record(&item.original_file, false)
            .await
        {
            return Status::NormalError(err.to_string());
        }
        let local = paths::local_path_for(&self.local_root, &item.rename_target);
        let mut record = FileRecord::from_item(item, &local);
        record.path = item.rename_target.clone();
        if let Err(err) = self.journal.set_file_record(&record).await {
            return Status::NormalError(err.to_string());
        }
        self.events
            .progress(ProgressKind::EndDownload, &item.file, 0, item.size);
        Status::Success
    }

    async fn remote_remove(&self, item: &SyncItem) -> Status {
        debug!(file = %item.file, "DELETE");
        match self.client.delete(&item.file).await {
            // 404 means it is already deleted
            Ok(code) => match classify_http(code, Some(StatusCode::NOT_FOUND)) {
                Status::Success => {}
                status => return status,
            },
            Err(err) => return classify_dav_error(&err),
        }
        if let Err(err) = self
            .journal
            .delete_file_record(&item.original_file, item.is_directory)
            .await
        {
            return Status::NormalError(err.to_string());
        }
        Status::Success
    }

    async fn remote_mkdir(&self, item: &SyncItem) -> Status {
        debug!(file = %item.file, "MKCOL");
        match self.client.mkcol(&item.file).await {
            // 405 means the collection already exists
            Ok(code) => classify_http(code, Some(StatusCode::METHOD_NOT_ALLOWED)),
            Err(err) => classify_dav_error(&err),
        }
    }

    async fn remote_rename(&self, item: &mut SyncItem) -> Status {
        if item.file == item.rename_target {
            if !item.is_directory {
                // the parent was renamed already, so only the new ETag is
                // missing; the server also dropped the mtime in the move
                let path = item.rename_target.clone();
                self.update_mtime_and_etag(item, &path).await;
            }
        } else if item.file == "Shared" {
            // the toplevel share folder must never be renamed; undo locally
            let renamed = paths::local_path_for(&self.local_root, &item.rename_target);
            let original = paths::local_path_for(&self.local_root, "Shared");
            return if tokio::fs::rename(&renamed, &original).await.is_ok() {
                Status::NormalError(
                    "This folder must not be renamed. It is renamed back to its original name."
                        .into(),
                )
            } else {
                Status::NormalError(
                    "This folder must not be renamed. Please name it back to Shared.".into(),
                )
            };
        } else {
            debug!(from = %item.file, to = %item.rename_target, "MOVE");
            match self.client.move_to(&item.file, &item.rename_target).await {
                Ok(code) => match classify_http(code, None) {
                    Status::Success => {}
                    status => return status,
                },
                Err(err) => return classify_dav_error(&err),
            }
            let path = item.rename_target.clone();
            self.update_mtime_and_etag(item, &path).await;
        }
        if let Err(err) = self
            .journal
            .delete_file_record(&item.original_file, false)
            .await
        {
            return Status::NormalError(err.to_string());
        }
        let local = paths::local_path_for(&self.local_root, &item.rename_target);
        let mut record = FileRecord::from_item(item, &local);
        record.path = item.rename_target.clone();
        if let Err(err) = self.journal.set_file_record(&record).await {
            return Status::NormalError(err.to_string());
        }
        Status::Success
    }

    /// PROPPATCH the desired mtime onto the resource, then HEAD the ETag and
    /// FileId back. Neither failure fails the surrounding job.
    async fn update_mtime_and_etag(&self, item: &mut SyncItem, remote_path: &str) {
        match self.client.proppatch_mtime(remote_path, item.modtime).await {
            Ok(code) if code.is_success() => {}
            Ok(code) => warn!(file = %remote_path, %code, "PROPPATCH of modified date failed"),
            Err(err) => warn!(file = %remote_path, %err, "PROPPATCH of modified date failed"),
        }
        match self.client.head(remote_path).await {
            Ok(meta) if meta.status.is_success() => {
                if let Some(etag) = meta.etag {
                    item.etag = etag;
                }
                match meta.file_id {
                    Some(fid) if item.file_id.is_empty() => {
                        debug!(file = %remote_path, file_id = %fid, "file id was empty, adopting");
                        item.file_id = fid;
                    }
                    Some(fid) if fid != item.file_id => {
                        warn!(file = %remote_path, old = %item.file_id, new = %fid, "file id changed");
                    }
                    _ => {}
                }
            }
            Ok(meta) => warn!(file = %remote_path, status = %meta.status, "HEAD for ETag failed"),
            Err(err) => warn!(file = %remote_path, %err, "HEAD for ETag failed"),
        }
    }

    async fn fetch_file_id(&self, item: &mut SyncItem) {
        debug!(file = %item.file, "querying file id");
        match self.client.head(&item.file).await {
            Ok(meta) => {
                if let Some(fid) = meta.file_id {
                    item.file_id = fid;
                }
            }
            Err(err) => warn!(file = %item.file, %err, "HEAD for file id failed"),
        }
    }
}
