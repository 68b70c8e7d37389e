mod common;

use bytes::Bytes;
use common::{names, InMemoryDrive};
use core_drive::{
    EntityKind, FileTransfer, RemoteHierarchy, StagedUpload, TransferFailure, ROOT_FOLDER_ID,
    UNKNOWN_FILE_NAME,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;

const LIMIT: u64 = 16 * 1024 * 1024;

fn services(drive: &Arc<InMemoryDrive>) -> (RemoteHierarchy, FileTransfer) {
    (
        RemoteHierarchy::new(drive.clone()),
        FileTransfer::new(drive.clone(), LIMIT),
    )
}

#[tokio::test]
async fn test_uploaded_file_appears_in_listing() {
    let drive = Arc::new(InMemoryDrive::new());
    let (hierarchy, transfer) = services(&drive);

    let id = transfer
        .upload(Bytes::from_static(b"hello"), "root", "test.txt")
        .await
        .unwrap();

    let children = hierarchy.list_children("root", 50).await.unwrap();
    let uploaded = children.iter().find(|e| e.id == id).unwrap();
    assert_eq!(uploaded.name, "test.txt");
    assert_eq!(uploaded.kind, EntityKind::File);
}

#[tokio::test]
async fn test_staged_upload_is_sent_and_removed() {
    let drive = Arc::new(InMemoryDrive::new());
    let (hierarchy, transfer) = services(&drive);
    let dir = tempfile::tempdir().unwrap();

    let mut staged = StagedUpload::create_in(dir.path(), "notes/../test.txt", LIMIT).unwrap();
    staged.write_chunk(b"staged content").unwrap();
    let staged_path = staged.path().to_path_buf();

    let id = transfer.upload_staged(staged, ROOT_FOLDER_ID).await.unwrap();

    assert!(!staged_path.exists());
    assert_eq!(&transfer.download(&id).await.unwrap()[..], b"staged content");
    assert_eq!(
        names(&hierarchy.list_children("root", 50).await.unwrap()),
        vec!["test.txt"]
    );
}

#[tokio::test]
async fn test_staged_file_is_removed_when_upload_fails() {
    let drive = Arc::new(InMemoryDrive::new());
    let transfer = FileTransfer::new(drive, 4);
    let dir = tempfile::tempdir().unwrap();

    // Staging allows more than the transfer ceiling, so the upload itself fails.
    let mut staged = StagedUpload::create_in(dir.path(), "big.bin", LIMIT).unwrap();
    staged.write_chunk(b"too many bytes").unwrap();
    let staged_path = staged.path().to_path_buf();

    let err = transfer.upload_staged(staged, "root").await.unwrap_err();

    assert_eq!(err.transfer_failure(), Some(TransferFailure::TooLarge));
    assert!(!staged_path.exists());
}

#[tokio::test]
async fn test_upload_rejects_unusable_name() {
    let drive = Arc::new(InMemoryDrive::new());
    let (_, transfer) = services(&drive);

    let err = transfer
        .upload(Bytes::from_static(b"x"), "root", "../")
        .await
        .unwrap_err();

    assert_eq!(err.transfer_failure(), Some(TransferFailure::InvalidName));
}

#[tokio::test]
async fn test_download_returns_content_and_name() {
    let drive = Arc::new(InMemoryDrive::new());
    drive.add_file("doc", "report.pdf", &["root"], b"%PDF-1.7");
    let (_, transfer) = services(&drive);

    assert_eq!(&transfer.download("doc").await.unwrap()[..], b"%PDF-1.7");
    assert_eq!(transfer.resolve_entity_name("doc").await, "report.pdf");
}

#[tokio::test]
async fn test_download_failures_are_transfer_errors() {
    let drive = Arc::new(InMemoryDrive::new());
    drive.add_folder("folder", "Folder", &["root"]);
    drive.add_file("big", "big.bin", &["root"], &[0u8; 8]);
    let transfer = FileTransfer::new(drive, 4);

    let missing = transfer.download("nope").await.unwrap_err();
    assert_eq!(missing.transfer_failure(), Some(TransferFailure::NotFound));

    let folder = transfer.download("folder").await.unwrap_err();
    assert_eq!(folder.transfer_failure(), Some(TransferFailure::IsFolder));

    let big = transfer.download("big").await.unwrap_err();
    assert_eq!(big.transfer_failure(), Some(TransferFailure::TooLarge));
}

#[tokio::test]
async fn test_unsized_download_stops_reading_at_the_ceiling() {
    let drive = Arc::new(InMemoryDrive::new());
    drive.add_unsized_file("blob", "blob.bin", &["root"], &[7u8; 64]);
    let transfer = FileTransfer::new(drive.clone(), 10);

    let error = transfer.download("blob").await.unwrap_err();

    assert_eq!(error.transfer_failure(), Some(TransferFailure::TooLarge));
    // Two chunks fit under the ceiling; the third crosses it.
    assert_eq!(drive.chunks_served.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_unsized_download_within_ceiling_is_reassembled() {
    let drive = Arc::new(InMemoryDrive::new());
    drive.add_unsized_file("notes", "notes.txt", &["root"], b"chunked body text");
    let (_, transfer) = services(&drive);

    let content = transfer.download("notes").await.unwrap();

    assert_eq!(&content[..], b"chunked body text");
    assert!(drive.chunks_served.load(Ordering::SeqCst) > 1);
}

#[tokio::test]
async fn test_unknown_entity_name_degrades() {
    let drive = Arc::new(InMemoryDrive::new());
    let (_, transfer) = services(&drive);

    assert_eq!(transfer.resolve_entity_name("nope").await, UNKNOWN_FILE_NAME);
}

#[tokio::test]
async fn test_delete_removes_entity_and_second_delete_fails() {
    let drive = Arc::new(InMemoryDrive::new());
    drive.add_folder("docs", "Docs", &["root"]);
    drive.add_file("doc", "report.pdf", &["docs"], b"x");
    let (hierarchy, transfer) = services(&drive);

    assert_eq!(transfer.resolve_parent("doc").await.unwrap(), "docs");
    transfer.delete("doc").await.unwrap();

    let children = hierarchy.list_children("docs", 50).await.unwrap();
    assert!(children.iter().all(|e| e.id != "doc"));
    assert!(!drive.contains("doc"));

    let err = transfer.delete("doc").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_parent_defaults_to_root() {
    let drive = Arc::new(InMemoryDrive::new());
    drive.add_file("orphan", "orphan.txt", &[], b"");
    let (_, transfer) = services(&drive);

    assert_eq!(transfer.resolve_parent("orphan").await.unwrap(), ROOT_FOLDER_ID);
    assert!(transfer.resolve_parent("missing").await.is_err());
}
