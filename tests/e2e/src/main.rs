fn main() {
    println!("Run `cargo test -p chunkup-e2e` to execute the end-to-end tests.");
}

#[cfg(test)]
mod wire {
    use std::fs;
    use std::path::PathBuf;

    use chunkup_protocol::{MergeRequest, StatusResponse, VerifyRequest, VerifyResponse};
    use serde::Serialize;
    use serde::de::DeserializeOwned;

    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    fn load_fixture(name: &str) -> serde_json::Value {
        let path = fixtures_dir().join(name);
        let data = fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()));
        serde_json::from_str(&data)
            .unwrap_or_else(|e| panic!("failed to parse fixture {}: {e}", path.display()))
    }

    /// Decodes the fixture as `T` and checks that encoding gives it back.
    fn assert_wire<T: DeserializeOwned + Serialize>(name: &str) -> T {
        let fixture = load_fixture(name);
        let decoded: T = serde_json::from_value(fixture.clone())
            .unwrap_or_else(|e| panic!("fixture {name} does not decode: {e}"));
        assert_eq!(serde_json::to_value(&decoded).unwrap(), fixture, "{name}");
        decoded
    }

    #[test]
    fn verify_request() {
        let req: VerifyRequest = assert_wire("verify_request.json");
        assert_eq!(req.filename, "holiday.mov");
    }

    #[test]
    fn verify_responses() {
        let resume: VerifyResponse = assert_wire("verify_response_resume.json");
        assert!(resume.should_upload);
        assert_eq!(resume.uploaded_list.map(|l| l.len()), Some(2));

        let complete: VerifyResponse = assert_wire("verify_response_complete.json");
        assert_eq!(complete, VerifyResponse::complete());
    }

    #[test]
    fn merge_request_without_file_size() {
        let req: MergeRequest = assert_wire("merge_request.json");
        assert_eq!(req.size, 5 * 1024 * 1024);
        assert_eq!(req.file_size, None);
    }

    #[test]
    fn status_responses() {
        let merged: StatusResponse = assert_wire("merge_response.json");
        assert!(merged.is_ok());
        let deleted: StatusResponse = assert_wire("delete_response.json");
        assert_eq!(deleted.message, chunkup_protocol::DELETE_SUCCESS);
    }
}

#[cfg(test)]
mod flows {
    use std::path::{Path, PathBuf};
    use std::sync::Arc;
    use std::time::Duration;

    use chunkup_client::{
        ChunkUpload, ClientConfig, HttpTransport, PipelineOptions, ProgressFn, TransferController,
        TransportFuture, UploadPlan, UploadTransport, upload_file,
    };
    use chunkup_protocol::{
        ChunkReply, DEFAULT_CHUNK_SIZE, DeleteRequest, MergeRequest, StatusResponse, VerifyRequest,
        VerifyResponse, parse_chunk_ordinal,
    };
    use chunkup_server::{ServerConfig, UploadServer};
    use chunkup_store::{ChunkStore, StorageLayout};
    use chunkup_transfer::{file_fingerprint, partition};
    use tempfile::TempDir;
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    const MIB: usize = 1024 * 1024;

    struct Harness {
        server: Arc<UploadServer>,
        handle: JoinHandle<()>,
        base_url: String,
        root: TempDir,
        files: TempDir,
    }

    impl Harness {
        async fn start() -> Self {
            let root = TempDir::new().unwrap();
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            let server = UploadServer::new(
                ServerConfig {
                    listen_addr: addr,
                    max_body_bytes: DEFAULT_CHUNK_SIZE + MIB,
                },
                ChunkStore::new(StorageLayout::new(root.path())),
            );
            let serving = Arc::clone(&server);
            let handle = tokio::spawn(async move { serving.serve(listener).await.unwrap() });
            Self {
                server,
                handle,
                base_url: format!("http://{addr}"),
                root,
                files: TempDir::new().unwrap(),
            }
        }

        fn controller(&self) -> TransferController<HttpTransport> {
            TransferController::new(HttpTransport::new(&self.base_url).unwrap(), self.config())
        }

        fn config(&self) -> ClientConfig {
            ClientConfig {
                base_url: self.base_url.clone(),
                ..ClientConfig::default()
            }
        }

        /// Writes a file of `len` patterned bytes.
        fn file(&self, name: &str, len: usize) -> PathBuf {
            let path = self.files.path().join(name);
            let data: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
            std::fs::write(&path, data).unwrap();
            path
        }

        fn staging_dir(&self, fingerprint: &str) -> PathBuf {
            self.root.path().join(format!("strike_{fingerprint}"))
        }

        fn spool_files(&self) -> usize {
            match std::fs::read_dir(self.root.path().join(".incoming")) {
                Ok(entries) => entries
                    .filter_map(Result::ok)
                    .filter(|e| e.path().extension().is_some_and(|ext| ext == "part"))
                    .count(),
                Err(_) => 0,
            }
        }

        async fn stop(self) {
            self.server.shutdown();
            self.handle.await.unwrap();
        }
    }

    fn merge_options() -> PipelineOptions {
        PipelineOptions {
            merge: true,
            ..PipelineOptions::default()
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn twelve_mib_file_round_trips() {
        let harness = Harness::start().await;
        let path = harness.file("holiday.mov", 12 * MIB);
        let controller = harness.controller();

        let outcome = upload_file(&controller, &path, merge_options()).await.unwrap();

        let report = outcome.report.as_ref().unwrap();
        assert_eq!(report.transferred(), 3);
        assert!(outcome.merged);

        let fingerprint = file_fingerprint(&path).unwrap();
        assert_eq!(outcome.fingerprint(), fingerprint);
        let artifact = harness.root.path().join(format!("{fingerprint}.mov"));
        assert_eq!(std::fs::read(&artifact).unwrap(), std::fs::read(&path).unwrap());
        assert!(!harness.staging_dir(&fingerprint).exists());
        assert_eq!(harness.spool_files(), 0);

        harness.stop().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn reupload_of_merged_file_transfers_nothing() {
        let harness = Harness::start().await;
        let path = harness.file("notes.txt", 3 * MIB);
        let controller = harness.controller();
        upload_file(&controller, &path, merge_options()).await.unwrap();

        let again = upload_file(&controller, &path, merge_options()).await.unwrap();

        assert!(!again.verify.should_upload);
        assert!(again.report.is_none());
        assert!(!again.merged);
        harness.stop().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn interrupted_upload_resumes_missing_chunks() {
        let harness = Harness::start().await;
        let path = harness.file("disk.img", 11 * MIB);
        let controller = harness.controller();

        let first = upload_file(&controller, &path, PipelineOptions::default())
            .await
            .unwrap();
        assert_eq!(first.report.as_ref().unwrap().transferred(), 3);
        let fingerprint = first.fingerprint().to_string();
        std::fs::remove_file(harness.staging_dir(&fingerprint).join(format!("{fingerprint}-1")))
            .unwrap();

        let second = upload_file(&controller, &path, merge_options()).await.unwrap();

        assert_eq!(second.verify.resumable_chunk_ids.len(), 2);
        let report = second.report.unwrap();
        assert_eq!(report.skipped(), 2);
        assert_eq!(report.transferred(), 1);
        assert!(second.merged);
        let artifact = harness.root.path().join(format!("{fingerprint}.img"));
        assert_eq!(std::fs::read(artifact).unwrap(), std::fs::read(&path).unwrap());
        harness.stop().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn merge_of_incomplete_upload_is_refused() {
        let harness = Harness::start().await;
        let path = harness.file("disk.img", 11 * MIB);
        let controller = harness.controller();
        let first = upload_file(&controller, &path, PipelineOptions::default())
            .await
            .unwrap();
        let fingerprint = first.fingerprint().to_string();
        std::fs::remove_file(harness.staging_dir(&fingerprint).join(format!("{fingerprint}-2")))
            .unwrap();

        let err = controller
            .merge(&fingerprint, "disk.img", DEFAULT_CHUNK_SIZE as u64, Some(11 * MIB as u64))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), chunkup_protocol::ErrorKind::Merge);
        assert!(!harness.root.path().join(format!("{fingerprint}.img")).exists());
        harness.stop().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn delete_then_verify_starts_fresh() {
        let harness = Harness::start().await;
        let path = harness.file("clip.mp4", 2 * MIB);
        let controller = harness.controller();
        let outcome = upload_file(&controller, &path, merge_options()).await.unwrap();
        let fingerprint = outcome.fingerprint().to_string();

        controller.delete().await.unwrap();

        let verify = controller.verify("clip.mp4", &fingerprint).await.unwrap();
        assert!(verify.should_upload);
        assert!(verify.resumable_chunk_ids.is_empty());
        assert!(!harness.root.path().join(format!("{fingerprint}.mp4")).exists());
        harness.stop().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn delete_without_context_purges_everything() {
        let harness = Harness::start().await;
        let a = harness.file("a.bin", 1024);
        let b = harness.file("b.bin", 2048);
        upload_file(&harness.controller(), &a, merge_options()).await.unwrap();
        upload_file(&harness.controller(), &b, PipelineOptions::default())
            .await
            .unwrap();

        harness.controller().delete().await.unwrap();

        let remaining: Vec<_> = std::fs::read_dir(harness.root.path())
            .unwrap()
            .filter_map(Result::ok)
            .map(|e| e.file_name())
            .filter(|name| name != ".incoming")
            .collect();
        assert!(remaining.is_empty(), "left behind: {remaining:?}");
        harness.stop().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn empty_file_merges_to_empty_artifact() {
        let harness = Harness::start().await;
        let path = harness.file("empty.log", 0);
        let controller = harness.controller();

        let outcome = upload_file(&controller, &path, merge_options()).await.unwrap();

        assert!(outcome.merged);
        let artifact = harness
            .root
            .path()
            .join(format!("{}.log", outcome.fingerprint()));
        assert_eq!(std::fs::read(artifact).unwrap(), b"");
        harness.stop().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn substitute_fingerprint_is_honoured() {
        let harness = Harness::start().await;
        let path = harness.file("report.pdf", 1000);
        let controller = harness.controller();

        let options = PipelineOptions {
            fingerprint: Some("report.pdf".into()),
            merge: true,
        };
        upload_file(&controller, &path, options).await.unwrap();

        assert!(harness.root.path().join("report.pdf.pdf").exists());
        harness.stop().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn concurrent_uploads_of_same_file_agree() {
        let harness = Harness::start().await;
        let path = harness.file("shared.bin", 7 * MIB);
        let first = harness.controller();
        let second = harness.controller();

        let (a, b) = tokio::join!(
            upload_file(&first, &path, merge_options()),
            upload_file(&second, &path, merge_options()),
        );
        let a = a.unwrap();
        b.unwrap();

        let artifact = harness.root.path().join(format!("{}.bin", a.fingerprint()));
        assert_eq!(std::fs::read(artifact).unwrap(), std::fs::read(&path).unwrap());
        harness.stop().await;
    }

    /// Lets chunk 0 through and holds every other chunk back.
    struct StallingTransport {
        inner: HttpTransport,
    }

    impl UploadTransport for StallingTransport {
        fn verify(&self, req: VerifyRequest) -> TransportFuture<'_, VerifyResponse> {
            self.inner.verify(req)
        }

        fn send_chunk(&self, chunk: ChunkUpload, progress: ProgressFn) -> TransportFuture<'_, ChunkReply> {
            Box::pin(async move {
                if parse_chunk_ordinal(&chunk.chunk_id).unwrap() != 0 {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                }
                self.inner.send_chunk(chunk, progress).await
            })
        }

        fn merge(&self, req: MergeRequest) -> TransportFuture<'_, StatusResponse> {
            self.inner.merge(req)
        }

        fn delete(&self, req: Option<DeleteRequest>) -> TransportFuture<'_, StatusResponse> {
            self.inner.delete(req)
        }
    }

    async fn wait_for(mut condition: impl FnMut() -> bool) {
        for _ in 0..400 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached in time");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn reset_mid_upload_leaves_one_chunk_and_no_spool() {
        let harness = Harness::start().await;
        let path = harness.file("big.bin", 12 * MIB);
        let fingerprint = file_fingerprint(&path).unwrap();
        let transport = StallingTransport {
            inner: HttpTransport::new(&harness.base_url).unwrap(),
        };
        let controller = Arc::new(TransferController::new(transport, harness.config()));

        let plan = UploadPlan {
            path: path.clone(),
            filename: "big.bin".into(),
            fingerprint: fingerprint.clone(),
            ranges: partition(12 * MIB as u64, DEFAULT_CHUNK_SIZE as u64).unwrap(),
        };
        let runner = Arc::clone(&controller);
        let upload = tokio::spawn(async move { runner.upload(&plan, &[]).await });

        let staged = harness.staging_dir(&fingerprint);
        wait_for(|| staged.join(format!("{fingerprint}-0")).exists()).await;
        wait_for(|| controller.in_flight() == 2).await;

        controller.reset();
        let report = upload.await.unwrap().unwrap();

        assert_eq!(report.transferred(), 1);
        assert_eq!(report.cancelled(), 2);
        assert_eq!(count_files(&staged), 1);
        assert_eq!(harness.spool_files(), 0);
        assert!(controller.progress().is_empty());
        harness.stop().await;
    }

    fn count_files(dir: &Path) -> usize {
        std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn dropped_connection_mid_body_leaves_nothing_staged() {
        use tokio::io::AsyncWriteExt;
        use tokio::net::TcpStream;

        let harness = Harness::start().await;
        let boundary = "chunkup-boundary";
        let mut head = String::new();
        for (name, value) in [("hash", "fp-0"), ("fileHash", "fp"), ("filename", "cut.bin")] {
            head.push_str(&format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            ));
        }
        head.push_str(&format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"chunk\"; filename=\"blob\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n"
        ));
        let declared = head.len() + MIB + format!("\r\n--{boundary}--\r\n").len();
        let addr = harness.base_url.trim_start_matches("http://");

        let mut stream = TcpStream::connect(addr).await.unwrap();
        let request = format!(
            "POST / HTTP/1.1\r\nHost: {addr}\r\n\
             Content-Type: multipart/form-data; boundary={boundary}\r\n\
             Content-Length: {declared}\r\n\r\n{head}"
        );
        stream.write_all(request.as_bytes()).await.unwrap();
        stream.write_all(&vec![7u8; 300 * 1024]).await.unwrap();
        stream.flush().await.unwrap();

        wait_for(|| harness.spool_files() == 1).await;
        drop(stream);
        wait_for(|| harness.spool_files() == 0).await;

        assert!(!harness.staging_dir("fp").exists());
        harness.stop().await;
    }
}
