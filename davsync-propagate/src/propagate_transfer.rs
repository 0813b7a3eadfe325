impl Propagator {
    /// Chunked PUT with resume. The source file must hold still for the
    /// whole transfer; when it moves, the upload restarts from scratch,
    /// bounded by its own retry budget. Transient chunk failures consume the
    /// separate general attempt budget.
    async fn upload_file(&self, item: &mut SyncItem) -> Status {
        self.events
            .progress(ProgressKind::StartUpload, &item.file, 0, item.size);
        let local = paths::local_path_for(&self.local_root, &item.file);
        let mut attempts = 0u32;
        let mut source_changes = 0u32;
        loop {
            let meta = match tokio::fs::metadata(&local).await {
                Ok(meta) => meta,
                Err(err) => return Status::NormalError(err.to_string()),
            };
            let size = meta.len();
            let stat_modtime = unix_mtime(&meta);
            let chunk_count = size.div_ceil(self.config.chunk_size).max(1) as u32;
            let mut transfer_id = now_unix() as u64;
            let mut start_chunk = 0u32;

            match self.journal.get_upload_info(&item.file).await {
                Ok(Some(info)) if info.valid && info.modtime == item.modtime => {
                    debug!(
                        file = %item.file,
                        chunk = info.chunk,
                        transfer_id = info.transfer_id,
                        "resuming chunked upload"
                    );
                    start_chunk = info.chunk.min(chunk_count.saturating_sub(1));
                    transfer_id = info.transfer_id;
                }
                Ok(_) => {}
                Err(err) => return Status::NormalError(err.to_string()),
            }

            let mut file = match tokio::fs::File::open(&local).await {
                Ok(file) => file,
                Err(err) => return Status::NormalError(err.to_string()),
            };

            let mut limiter = Limiter::new();
            let mut sent = start_chunk as u64 * self.config.chunk_size;
            let mut last: Option<ChunkOutcome> = None;
            let mut source_changed = false;
            let mut transient: Option<Status> = None;

            for chunk in start_chunk..chunk_count {
                if self.abort.is_cancelled() {
                    return Status::NormalError("Aborted by user".into());
                }
                match tokio::fs::metadata(&local).await {
                    Ok(now) if now.len() == size && unix_mtime(&now) == stat_modtime => {}
                    _ => {
                        source_changed = true;
                        break;
                    }
                }
                let offset = chunk as u64 * self.config.chunk_size;
                let len = self.config.chunk_size.min(size - offset) as usize;
                let body = match read_chunk(&mut file, offset, len).await {
                    Ok(body) => body,
                    Err(err) => return Status::NormalError(err.to_string()),
                };
                let outcome = match self
                    .client
                    .put_chunk(
                        &item.file,
                        transfer_id,
                        chunk,
                        chunk_count,
                        body,
                        item.usable_etag(),
                        item.modtime,
                    )
                    .await
                {
                    Ok(outcome) => outcome,
                    Err(err) => match classify_dav_error(&err) {
                        Status::SoftError(message) => {
                            transient = Some(Status::SoftError(message));
                            break;
                        }
                        status => return status,
                    },
                };
                match classify_http(outcome.status, None) {
                    Status::Success => {}
                    Status::SoftError(message) => {
                        transient = Some(Status::SoftError(message));
                        break;
                    }
                    status => return status,
                }
                sent += len as u64;
                self.events
                    .progress(ProgressKind::Context, &item.file, sent, size);
                limiter.throttle(sent, self.config.upload_limit).await;
                if chunk_count > 1 {
                    // checkpoint must be durable before the next chunk goes out
                    let info = UploadInfo {
                        valid: true,
                        chunk: chunk + 1,
                        transfer_id,
                        modtime: item.modtime,
                    };
                    if let Err(err) = self.journal.set_upload_info(&item.file, &info).await {
                        return Status::NormalError(err.to_string());
                    }
                }
                last = Some(outcome);
            }

            if source_changed {
                if source_changes < MAX_SOURCE_CHANGE_RETRIES {
                    source_changes += 1;
                    warn!(
                        file = %item.file,
                        attempt = source_changes,
                        "source file changed during upload, retrying in two seconds"
                    );
                    tokio::time::sleep(SOURCE_CHANGE_WAIT).await;
                    continue;
                }
                return Status::NormalError(format!(
                    "local file {} kept changing during upload",
                    item.file
                ));
            }
            if let Some(status) = transient {
                attempts += 1;
                if attempts < MAX_UPLOAD_ATTEMPTS {
                    debug!(file = %item.file, attempts, "transient chunk failure, retrying upload");
                    continue;
                }
                return status;
            }

            let Some(final_chunk) = last else {
                return Status::NormalError(format!(
                    "upload of {} produced no transfer result",
                    item.file
                ));
            };

            if final_chunk.mtime_accepted {
                if let Some(etag) = final_chunk.etag.clone() {
                    item.etag = etag;
                }
            } else {
                let path = item.file.clone();
                self.update_mtime_and_etag(item, &path).await;
            }
            match final_chunk.file_id.clone() {
                Some(fid) => {
                    if !item.file_id.is_empty() && item.file_id != fid {
                        warn!(file = %item.file, old = %item.file_id, new = %fid, "file id changed");
                    }
                    item.file_id = fid;
                }
                None if item.file_id.is_empty() => self.fetch_file_id(item).await,
                None => {}
            }

            let record = FileRecord::from_item(item, &local);
            if let Err(err) = self.journal.set_file_record(&record).await {
                return Status::NormalError(err.to_string());
            }
            if let Err(err) = self.journal.clear_upload_info(&item.file).await {
                return Status::NormalError(err.to_string());
            }
            self.events
                .progress(ProgressKind::EndUpload, &item.file, 0, item.size);
            return Status::Success;
        }
    }

    /// GET with range resume, optional gzip, conflict preservation, and an
    /// atomic rename over the target.
    async fn download_file(&self, item: &mut SyncItem) -> Status {
        self.events
            .progress(ProgressKind::StartDownload, &item.file, 0, item.size);

        let mut tmp_name: Option<String> = None;
        match self.journal.get_download_info(&item.file).await {
            Ok(Some(info)) if info.valid => {
                if info.etag == item.etag {
                    tmp_name = Some(info.tmpfile);
                } else {
                    // the server moved on; the partial body is useless now
                    debug!(file = %item.file, "etag changed, discarding stale partial download");
                    let stale = paths::local_path_for(&self.local_root, &info.tmpfile);
                    let _ = tokio::fs::remove_file(&stale).await;
                    if let Err(err) = self.journal.clear_download_info(&item.file).await {
                        return Status::NormalError(err.to_string());
                    }
                }
            }
            Ok(_) => {}
            Err(err) => return Status::NormalError(err.to_string()),
        }
        let tmp_name = tmp_name.unwrap_or_else(|| paths::tmp_file_name(&item.file));
        let tmp_path = paths::local_path_for(&self.local_root, &tmp_name);

        if let Err(err) = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&tmp_path)
        {
            return Status::NormalError(err.to_string());
        }
        let info = DownloadInfo {
            valid: true,
            etag: item.etag.clone(),
            tmpfile: tmp_name.clone(),
        };
        if let Err(err) = self.journal.set_download_info(&item.file, &info).await {
            return Status::NormalError(err.to_string());
        }

        let mut retries = 0u32;
        let response_etag = loop {
            match self.download_attempt(item, &tmp_path).await {
                FetchOutcome::Done(etag) => break etag,
                FetchOutcome::RetryTimeout(message) => {
                    retries += 1;
                    if retries < MAX_DOWNLOAD_TIMEOUT_RETRIES {
                        debug!(file = %item.file, retries, "download timed out, retrying");
                        continue;
                    }
                    self.discard_empty_tmpfile(&item.file, &tmp_path).await;
                    return Status::FatalError(message);
                }
                FetchOutcome::Failed(status) => {
                    self.discard_empty_tmpfile(&item.file, &tmp_path).await;
                    return status;
                }
            }
        };
        if let Some(etag) = response_etag {
            item.etag = etag;
        }

        let local = paths::local_path_for(&self.local_root, &item.file);
        let is_conflict =
            item.instruction == Instruction::Conflict && !localfs::file_equals(&local, &tmp_path);
        if is_conflict {
            let backup = paths::conflict_file_name(
                &item.file,
                item.modtime,
                paths::conflict_stamp_offset(),
            );
            let backup_path = paths::local_path_for(&self.local_root, &backup);
            debug!(file = %item.file, backup = %backup, "preserving conflicting local copy");
            if let Err(err) = tokio::fs::rename(&local, &backup_path).await {
                // keep the local file rather than overwrite it
                return Status::NormalError(err.to_string());
            }
        }
        if let Err(err) = tokio::fs::rename(&tmp_path, &local).await {
            return Status::NormalError(err.to_string());
        }
        if let Err(err) = filetime::set_file_mtime(
            &local,
            filetime::FileTime::from_unix_time(item.modtime, 0),
        ) {
            warn!(file = %item.file, %err, "failed to set modification time");
        }
        let record = FileRecord::from_item(item, &local);
        if let Err(err) = self.journal.set_file_record(&record).await {
            return Status::NormalError(err.to_string());
        }
        if let Err(err) = self.journal.clear_download_info(&item.file).await {
            return Status::NormalError(err.to_string());
        }
        self.events
            .progress(ProgressKind::EndDownload, &item.file, 0, item.size);
        if is_conflict {
            Status::Conflict
        } else {
            Status::Success
        }
    }

    async fn download_attempt(&self, item: &SyncItem, tmp_path: &Path) -> FetchOutcome {
        let offset = std::fs::metadata(tmp_path).map(|m| m.len()).unwrap_or(0);
        let resume_from = (offset > 0).then_some(offset);
        if let Some(offset) = resume_from {
            debug!(file = %item.file, offset, "retry with range");
        }
        let response = match self.client.get(&item.file, resume_from).await {
            Ok(response) => response,
            Err(err) => {
                if let DavError::Request(inner) = &err
                    && inner.is_timeout()
                {
                    return FetchOutcome::RetryTimeout(inner.to_string());
                }
                return FetchOutcome::Failed(classify_dav_error(&err));
            }
        };
        match classify_http(response.status(), None) {
            Status::Success => {}
            status => return FetchOutcome::Failed(status),
        }
        let etag = etag_from_headers(response.headers());
        let gzipped = response
            .headers()
            .get("content-encoding")
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.eq_ignore_ascii_case("gzip"));
        let file = match std::fs::OpenOptions::new().append(true).open(tmp_path) {
            Ok(file) => file,
            Err(err) => return FetchOutcome::Failed(Status::NormalError(err.to_string())),
        };
        let mut sink = if gzipped {
            debug!(file = %item.file, "response is gzip encoded");
            BodySink::Gzip(GzDecoder::new(file))
        } else {
            BodySink::Plain(file)
        };
        let mut stream = response.bytes_stream();
        let mut received = offset;
        let mut limiter = Limiter::new();
        while let Some(next) = stream.next().await {
            if self.abort.is_cancelled() {
                return FetchOutcome::Failed(Status::NormalError("Aborted by user".into()));
            }
            let bytes = match next {
                Ok(bytes) => bytes,
                Err(err) => {
                    if err.is_timeout() {
                        return FetchOutcome::RetryTimeout(err.to_string());
                    }
                    return FetchOutcome::Failed(classify_transport(&err));
                }
            };
            if let Err(err) = sink.write(&bytes) {
                return FetchOutcome::Failed(Status::NormalError(err.to_string()));
            }
            received += bytes.len() as u64;
            self.events
                .progress(ProgressKind::Context, &item.file, received, item.size);
            limiter.throttle(received, self.config.download_limit).await;
        }
        if let Err(err) = sink.finish() {
            return FetchOutcome::Failed(Status::NormalError(err.to_string()));
        }
        FetchOutcome::Done(etag)
    }

    /// A failed download keeps a non-empty temp file for resume but never an
    /// empty one.
    async fn discard_empty_tmpfile(&self, file: &str, tmp_path: &Path) {
        let empty = std::fs::metadata(tmp_path)
            .map(|meta| meta.len() == 0)
            .unwrap_or(false);
        if empty {
            let _ = std::fs::remove_file(tmp_path);
            if let Err(err) = self.journal.clear_download_info(file).await {
                warn!(file, %err, "failed to clear download journal entry");
            }
        }
    }
}
