mod common;

use std::sync::Arc;
use std::time::Duration;

use common::Fixture;
use dog_upload::{
    ChunkPart, ChunkPosition, ChunkSave, ChunkSessionId, ChunkStore, DiskChunkStore, HandlerKind,
    UploadError, UploadResponse,
};
use proptest::prelude::*;

fn part(session: &str, position: ChunkPosition) -> ChunkPart {
    ChunkPart {
        session: ChunkSessionId::derive(&[session]),
        position,
        original_name: "movie.mp4".to_string(),
        content_type: Some("video/mp4".to_string()),
    }
}

#[tokio::test]
async fn dropzone_chunks_are_zero_based() {
    let fx = Fixture::new();
    let uploader = fx.uploader(fx.config());

    let chunk = |index: &str, content: &[u8]| {
        fx.request("/media/clip.mov")
            .with_param("dzuuid", "8c1c-44")
            .with_param("dzchunkindex", index)
            .with_param("dztotalchunkcount", "3")
            .with_file("file", fx.file("clip.mov", content))
    };

    let r1 = uploader.handle(chunk("0", b"aa"), "file").await.unwrap();
    let r2 = uploader.handle(chunk("1", b"bb"), "file").await.unwrap();
    let r3 = uploader.handle(chunk("2", b"cc"), "file").await.unwrap();

    assert!(matches!(r1, UploadResponse::Progress { done, .. } if (done - 100.0 / 3.0).abs() < 1e-9));
    assert!(matches!(r2, UploadResponse::Progress { done, .. } if (done - 200.0 / 3.0).abs() < 1e-9));
    assert!(r3.is_complete());
    assert_eq!(fx.store.get("media/clip.mov").await.unwrap().as_ref(), b"aabbcc");
    assert!(fx.leftover_files().is_empty());
}

#[tokio::test]
async fn content_range_upload_completes_on_last_byte() {
    let fx = Fixture::new();
    let uploader = fx.uploader(fx.config());

    let chunk = |range: &str, content: &[u8]| {
        fx.request("/backups/db.dump")
            .with_header("Content-Range", range)
            .with_file("file", fx.file("db.dump", content))
    };

    let r1 = uploader
        .handle(chunk("bytes 0-3/10", b"0123"), "file")
        .await
        .unwrap();
    assert_eq!(r1, UploadResponse::Progress { done: 40.0, status: true });

    let r2 = uploader
        .handle(chunk("bytes 4-9/10", b"456789"), "file")
        .await
        .unwrap();
    assert!(r2.is_complete());
    assert_eq!(fx.store.get("backups/db.dump").await.unwrap().as_ref(), b"0123456789");
}

#[tokio::test]
async fn content_range_size_mismatch_is_invalid() {
    let fx = Fixture::new();
    let uploader = fx.uploader(fx.config());

    let request = fx
        .request("/backups/db.dump")
        .with_header("content-range", "bytes 0-9/20")
        .with_file("file", fx.file("db.dump", b"short"));
    let err = uploader.handle(request, "file").await.unwrap_err();
    assert!(matches!(err, UploadError::InvalidChunk { .. }));
}

#[tokio::test]
async fn plupload_style_chunks() {
    let fx = Fixture::new();
    let uploader = fx.uploader(fx.config());

    let chunk = |index: &str, content: &[u8]| {
        fx.request("/x/notes.md")
            .with_param("chunk", index)
            .with_param("chunks", "2")
            .with_param("name", "notes.md")
            .with_file("file", fx.file("blob", content))
    };

    assert!(!uploader.handle(chunk("0", b"# "), "file").await.unwrap().is_complete());
    assert!(uploader.handle(chunk("1", b"hi"), "file").await.unwrap().is_complete());
    assert_eq!(fx.store.get("x/notes.md").await.unwrap().as_ref(), b"# hi");
}

#[tokio::test]
async fn out_of_range_chunk_number_is_invalid() {
    let fx = Fixture::new();
    let uploader = fx.uploader(fx.config());

    let request = fx
        .request("/docs/a.bin")
        .with_param("resumableChunkNumber", "3")
        .with_param("resumableTotalChunks", "2")
        .with_param("resumableIdentifier", "a")
        .with_file("file", fx.file("blob", b"x"));
    let err = uploader.handle(request, "file").await.unwrap_err();
    assert!(matches!(err, UploadError::InvalidChunk { .. }));
    assert!(fx.leftover_files().is_empty());
}

#[tokio::test]
async fn sessions_are_scoped_by_caller_session() {
    let fx = Fixture::new();
    let uploader = fx.uploader(fx.config());

    let chunk = |session: &str, number: &str| {
        fx.request("/docs/a.bin")
            .with_session(session)
            .with_param("resumableChunkNumber", number)
            .with_param("resumableTotalChunks", "2")
            .with_param("resumableIdentifier", "same-id")
            .with_param("resumableFilename", "a.bin")
            .with_file("file", fx.file("blob", b"x"))
    };

    uploader.handle(chunk("alice", "1"), "file").await.unwrap();
    // bob's second chunk must not complete alice's session
    let response = uploader.handle(chunk("bob", "2"), "file").await.unwrap();
    assert_eq!(response, UploadResponse::Progress { done: 50.0, status: true });
}

#[tokio::test]
async fn unscoped_chunk_is_rejected() {
    let fx = Fixture::new();
    let uploader = fx.uploader(fx.config());

    let request = dog_upload::UploadRequest::new(fx.manager())
        .with_file_path("/docs/a.bin")
        .with_param("dzuuid", "shared-id")
        .with_param("dzchunkindex", "0")
        .with_param("dztotalchunkcount", "2")
        .with_file("file", fx.file("a.bin", b"x"));

    let err = uploader.handle(request, "file").await.unwrap_err();
    assert!(matches!(err, UploadError::InvalidChunk { .. }));
    assert!(fx.leftover_files().is_empty());
    assert!(fx.recorded_events().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_last_chunks_complete_once() {
    let fx = Fixture::new();
    let store = Arc::new(DiskChunkStore::new(fx.chunks.path()));

    store
        .save_chunk(
            part("race", ChunkPosition::Indexed { number: 1, total: 2 }),
            fx.file("blob", b"one"),
        )
        .await
        .unwrap();

    let mut tasks = Vec::new();
    for _ in 0..4 {
        let store = Arc::clone(&store);
        let file = fx.file("blob", b"two");
        tasks.push(tokio::spawn(async move {
            store
                .save_chunk(part("race", ChunkPosition::Indexed { number: 2, total: 2 }), file)
                .await
        }));
    }

    let mut finished = Vec::new();
    for task in tasks {
        if let ChunkSave::Finished(file) = task.await.unwrap().unwrap() {
            finished.push(file);
        }
    }

    assert_eq!(finished.len(), 1);
    assert_eq!(std::fs::read(finished[0].real_path()).unwrap(), b"onetwo");
}

#[test]
fn handler_detection_order() {
    let fx = Fixture::new();
    let base = || fx.request("/x");

    assert_eq!(HandlerKind::from_request(&base()), HandlerKind::Single);
    assert_eq!(
        HandlerKind::from_request(&base().with_param("resumableChunkNumber", "1").with_param("dzuuid", "u")),
        HandlerKind::Resumable
    );
    assert_eq!(
        HandlerKind::from_request(&base().with_param("dzuuid", "u")),
        HandlerKind::Dropzone
    );
    assert_eq!(
        HandlerKind::from_request(&base().with_header("Content-Range", "bytes 0-1/2")),
        HandlerKind::ContentRange
    );
    assert_eq!(
        HandlerKind::from_request(&base().with_param("chunk", "0").with_param("chunks", "2")),
        HandlerKind::ChunksInRequest
    );
    assert_eq!(
        HandlerKind::from_request(&base().with_param("chunk", "0")),
        HandlerKind::Single
    );
}

#[tokio::test]
async fn resent_chunk_does_not_advance_progress() {
    let fx = Fixture::new();
    let store = DiskChunkStore::new(fx.chunks.path());
    let position = ChunkPosition::Indexed { number: 1, total: 3 };

    let first = store
        .save_chunk(part("s", position), fx.file("blob", b"one"))
        .await
        .unwrap();
    let again = store
        .save_chunk(part("s", position), fx.file("blob", b"one"))
        .await
        .unwrap();

    assert_eq!(first.handler().unwrap().received, 1);
    assert_eq!(again.handler().unwrap().received, 1);
}

#[tokio::test]
async fn changing_total_mid_session_is_rejected() {
    let fx = Fixture::new();
    let store = DiskChunkStore::new(fx.chunks.path());

    store
        .save_chunk(
            part("s", ChunkPosition::Indexed { number: 1, total: 3 }),
            fx.file("blob", b"one"),
        )
        .await
        .unwrap();
    let err = store
        .save_chunk(
            part("s", ChunkPosition::Indexed { number: 2, total: 4 }),
            fx.file("blob", b"two"),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, UploadError::InvalidChunk { .. }));
}

#[tokio::test]
async fn assembled_file_keeps_session_metadata() {
    let fx = Fixture::new();
    let store = DiskChunkStore::new(fx.chunks.path());

    let save = store
        .save_chunk(
            part("meta", ChunkPosition::Indexed { number: 1, total: 1 }),
            fx.file("blob", b"only"),
        )
        .await
        .unwrap();

    let file = save.file().unwrap();
    assert_eq!(file.client_original_name(), "movie.mp4");
    assert_eq!(file.content_type(), Some("video/mp4"));
    assert_eq!(file.size(), 4);
    assert_eq!(std::fs::read(file.real_path()).unwrap(), b"only");
}

#[tokio::test]
async fn clear_expired_removes_stale_sessions_only() {
    let fx = Fixture::new();
    let store = DiskChunkStore::new(fx.chunks.path());

    store
        .save_chunk(
            part("stale", ChunkPosition::Indexed { number: 1, total: 2 }),
            fx.file("blob", b"one"),
        )
        .await
        .unwrap();

    assert_eq!(store.clear_expired(Duration::from_secs(3600)).await.unwrap(), 0);

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(store.clear_expired(Duration::from_millis(1)).await.unwrap(), 1);
    assert!(fx.leftover_files().is_empty());
}

#[tokio::test]
async fn clear_expired_on_missing_root_is_noop() {
    let store = DiskChunkStore::new("/nonexistent/dog-upload/chunks");
    assert_eq!(store.clear_expired(Duration::from_secs(1)).await.unwrap(), 0);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Deliver chunks in any order, with retries; progress never decreases and
    /// only the request completing the file is finished.
    #[test]
    fn progress_is_monotonic(
        total in 1u32..8,
        order in proptest::collection::vec(0usize..64, 1..24),
    ) {
        tokio_test::block_on(async move {
            let fx = Fixture::new();
            let store = DiskChunkStore::new(fx.chunks.path());

            // every chunk at least once, preceded by arbitrary retries
            let mut sequence: Vec<u32> = order.iter().map(|i| (*i as u32 % total) + 1).collect();
            sequence.extend(1..=total);

            let mut last = 0.0f64;
            let mut finished = 0;
            for number in sequence {
                let save = store
                    .save_chunk(
                        part("prop", ChunkPosition::Indexed { number, total }),
                        fx.file("blob", &number.to_be_bytes()),
                    )
                    .await
                    .unwrap();

                // exactly one of file / progress is present
                prop_assert_eq!(save.file().is_some(), save.handler().is_none());

                match save {
                    ChunkSave::InProgress(progress) => {
                        let pct = progress.percentage_done();
                        prop_assert!(pct >= last);
                        prop_assert!(pct < 100.0);
                        last = pct;
                    }
                    ChunkSave::Finished(file) => {
                        finished += 1;
                        prop_assert_eq!(file.size(), u64::from(total) * 4);
                        last = 0.0;
                    }
                }
            }
            prop_assert!(finished >= 1);
            Ok(())
        })?;
    }
}
