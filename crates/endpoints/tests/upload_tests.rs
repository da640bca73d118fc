//! Tests for the uploader queue and upload state machine.

use std::path::PathBuf;

use endpoints::{Method, UploadState, Uploader};
use url::Url;

fn target() -> Url {
    Url::parse("https://api.example.com/files").unwrap()
}

#[tokio::test]
async fn submitting_the_same_resource_twice_returns_the_same_upload() {
    let uploader: Uploader<PathBuf> = Uploader::new();
    let path = PathBuf::from("/tmp/photo.jpg");

    let first = uploader
        .upload(path.clone(), target(), Method::Post, None, false)
        .expect("enqueue failed");
    let second = uploader
        .upload(path, target(), Method::Post, None, false)
        .expect("enqueue failed");

    assert_eq!(first.id(), second.id());
    assert_eq!(uploader.snapshot().len(), 1);
}

#[tokio::test]
async fn distinct_resources_get_distinct_entries() {
    let uploader: Uploader<PathBuf> = Uploader::new();

    let first = uploader
        .upload(PathBuf::from("/tmp/a.bin"), target(), Method::Post, None, false)
        .expect("enqueue failed");
    let second = uploader
        .upload(PathBuf::from("/tmp/b.bin"), target(), Method::Post, None, false)
        .expect("enqueue failed");

    assert_ne!(first.id(), second.id());
    assert_eq!(uploader.snapshot().len(), 2);
}

#[tokio::test]
async fn cancel_moves_an_unstarted_upload_to_cancelled() {
    let uploader: Uploader<PathBuf> = Uploader::new();
    let info = uploader
        .upload(PathBuf::from("/tmp/a.bin"), target(), Method::Post, None, false)
        .expect("enqueue failed");

    info.cancel();
    assert!(matches!(info.state(), UploadState::Cancelled));

    // The terminal state is replayed once, then the stream ends.
    let mut states = info.state_stream();
    assert!(matches!(states.next().await, Some(UploadState::Cancelled)));
    assert!(states.next().await.is_none());
}

#[tokio::test]
async fn cancel_on_a_terminal_upload_is_a_no_op() {
    let uploader: Uploader<PathBuf> = Uploader::new();
    let info = uploader
        .upload(PathBuf::from("/tmp/a.bin"), target(), Method::Post, None, false)
        .expect("enqueue failed");

    info.cancel();
    info.cancel();

    let mut states = info.state_stream();
    assert!(matches!(states.next().await, Some(UploadState::Cancelled)));
    assert!(states.next().await.is_none());
}

#[tokio::test]
async fn upload_after_a_terminal_state_is_a_no_op() {
    let uploader: Uploader<PathBuf> = Uploader::new();
    let info = uploader
        .upload(PathBuf::from("/tmp/a.bin"), target(), Method::Post, None, false)
        .expect("enqueue failed");

    info.cancel();
    info.upload();

    assert!(matches!(info.state(), UploadState::Cancelled));
}

#[tokio::test]
async fn clean_queue_removes_terminal_entries() {
    let uploader: Uploader<PathBuf> = Uploader::new();
    let cancelled = uploader
        .upload(PathBuf::from("/tmp/a.bin"), target(), Method::Post, None, false)
        .expect("enqueue failed");
    let live = uploader
        .upload(PathBuf::from("/tmp/b.bin"), target(), Method::Post, None, false)
        .expect("enqueue failed");

    cancelled.cancel();
    uploader.clean_queue();

    let snapshot = uploader.snapshot();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].id(), live.id());
}

#[tokio::test]
async fn cancel_all_cancels_and_prunes_everything() {
    let uploader: Uploader<PathBuf> = Uploader::new();
    let first = uploader
        .upload(PathBuf::from("/tmp/a.bin"), target(), Method::Post, None, false)
        .expect("enqueue failed");
    let second = uploader
        .upload(PathBuf::from("/tmp/b.bin"), target(), Method::Post, None, false)
        .expect("enqueue failed");

    uploader.cancel_all();

    assert!(matches!(first.state(), UploadState::Cancelled));
    assert!(matches!(second.state(), UploadState::Cancelled));
    assert!(uploader.snapshot().is_empty());
}

#[tokio::test]
async fn terminal_entries_are_pruned_automatically() {
    let uploader: Uploader<PathBuf> = Uploader::new();
    let info = uploader
        .upload(PathBuf::from("/tmp/a.bin"), target(), Method::Post, None, false)
        .expect("enqueue failed");

    info.cancel();

    // The watcher task prunes asynchronously.
    let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(1);
    while !uploader.snapshot().is_empty() {
        assert!(tokio::time::Instant::now() < deadline, "entry was never pruned");
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn active_uploads_observes_queue_mutations() {
    let uploader: Uploader<PathBuf> = Uploader::new();
    let mut queue = uploader.active_uploads();
    assert!(queue.borrow().is_empty());

    let info = uploader
        .upload(PathBuf::from("/tmp/a.bin"), target(), Method::Post, None, false)
        .expect("enqueue failed");

    queue.changed().await.expect("queue channel closed");
    assert_eq!(queue.borrow().len(), 1);

    info.cancel();
    uploader.clean_queue();

    // Cancelled entries never reappear in later snapshots.
    let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(1);
    while !queue.borrow_and_update().is_empty() {
        assert!(tokio::time::Instant::now() < deadline, "entry was never pruned");
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert!(uploader.snapshot().is_empty());
}

// Integration tests with wiremock
#[cfg(feature = "integration-tests")]
mod integration_tests {
    use super::*;

    use std::io::Write;
    use std::time::Duration;

    use bytes::Bytes;
    use endpoints::UploadError;
    use tempfile::NamedTempFile;
    use tokio::time::timeout;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn temp_file(content: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        file.write_all(content).expect("Failed to write temp file");
        file.flush().expect("Failed to flush temp file");
        file
    }

    async fn collect_states(info: &endpoints::UploadInfo<PathBuf>) -> Vec<UploadState> {
        let mut states = info.state_stream();
        let mut collected = Vec::new();
        let result = timeout(Duration::from_secs(5), async {
            while let Some(state) = states.next().await {
                collected.push(state);
            }
        })
        .await;
        assert!(result.is_ok(), "state stream never terminated");
        collected
    }

    #[tokio::test]
    async fn successful_upload_emits_waiting_progress_completed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/files"))
            .respond_with(ResponseTemplate::new(201))
            .mount(&server)
            .await;

        let file = temp_file(b"Hello, World!");
        let uploader: Uploader<PathBuf> = Uploader::new();
        let info = uploader
            .upload(
                file.path().to_path_buf(),
                format!("{}/files", server.uri()).parse().unwrap(),
                Method::Post,
                None,
                false,
            )
            .expect("enqueue failed");

        let states = collect_states(&info);
        info.upload();
        let states = states.await;

        assert!(matches!(states.first(), Some(UploadState::Waiting)));
        assert!(matches!(states.last(), Some(UploadState::Completed)));

        let fractions: Vec<f64> = states
            .iter()
            .filter_map(|state| match state {
                UploadState::InProgress(p) => Some(p.fraction_completed),
                _ => None,
            })
            .collect();
        assert!(!fractions.is_empty(), "no progress was reported");
        assert!(fractions.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(*fractions.last().unwrap(), 1.0);
    }

    #[tokio::test]
    async fn server_rejection_carries_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/files"))
            .respond_with(ResponseTemplate::new(422).set_body_string("too large"))
            .mount(&server)
            .await;

        let file = temp_file(b"payload");
        let uploader: Uploader<PathBuf> = Uploader::new();
        let info = uploader
            .upload(
                file.path().to_path_buf(),
                format!("{}/files", server.uri()).parse().unwrap(),
                Method::Post,
                None,
                true,
            )
            .expect("enqueue failed");

        let states = collect_states(&info).await;
        match states.last() {
            Some(UploadState::Failed(UploadError::Server { status, body })) => {
                assert_eq!(*status, 422);
                assert_eq!(body, &Bytes::from_static(b"too large"));
            }
            other => panic!("expected server failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn duplicate_submission_starts_exactly_one_transfer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/files"))
            .respond_with(ResponseTemplate::new(201).set_delay(Duration::from_millis(250)))
            .expect(1)
            .mount(&server)
            .await;

        let file = temp_file(b"payload");
        let uploader: Uploader<PathBuf> = Uploader::new();
        let url: Url = format!("{}/files", server.uri()).parse().unwrap();

        let first = uploader
            .upload(file.path().to_path_buf(), url.clone(), Method::Post, None, true)
            .expect("enqueue failed");
        let second = uploader
            .upload(file.path().to_path_buf(), url, Method::Post, None, true)
            .expect("enqueue failed");

        assert_eq!(first.id(), second.id());

        let states = collect_states(&first).await;
        assert!(matches!(states.last(), Some(UploadState::Completed)));

        // MockServer verifies the expected call count on drop.
    }

    #[tokio::test]
    async fn completed_uploads_leave_the_queue() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/files"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let file = temp_file(b"payload");
        let uploader: Uploader<PathBuf> = Uploader::new();
        let info = uploader
            .upload(
                file.path().to_path_buf(),
                format!("{}/files", server.uri()).parse().unwrap(),
                Method::Post,
                None,
                true,
            )
            .expect("enqueue failed");

        let states = collect_states(&info).await;
        assert!(matches!(states.last(), Some(UploadState::Completed)));

        let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
        while !uploader.snapshot().is_empty() {
            assert!(
                tokio::time::Instant::now() < deadline,
                "completed entry was never pruned"
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test]
    async fn cancelling_an_in_flight_upload_wins_the_race() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/files"))
            .respond_with(ResponseTemplate::new(201).set_delay(Duration::from_secs(10)))
            .mount(&server)
            .await;

        let file = temp_file(b"payload");
        let uploader: Uploader<PathBuf> = Uploader::new();
        let info = uploader
            .upload(
                file.path().to_path_buf(),
                format!("{}/files", server.uri()).parse().unwrap(),
                Method::Post,
                None,
                true,
            )
            .expect("enqueue failed");

        tokio::time::sleep(Duration::from_millis(100)).await;
        info.cancel();

        let states = collect_states(&info).await;
        assert!(matches!(states.last(), Some(UploadState::Cancelled)));
        assert!(matches!(info.state(), UploadState::Cancelled));
    }
}
