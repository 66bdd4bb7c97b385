fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use stowage_protocol::constants::{CANCEL, COMPLETED, NEXT, UPLOAD_COMPLETED};
    use stowage_protocol::{ClientText, ServerFrame, StatusMessage, UploadHeader};
    use stowage_storage::{FileRecord, MultipartSession, ObjectInfo, UploadState};

    /// Returns the path to the fixtures directory.
    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    /// Loads a fixture JSON file and returns it as a `serde_json::Value`.
    fn load_fixture(name: &str) -> serde_json::Value {
        let path = fixtures_dir().join(name);
        let data = fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()));
        serde_json::from_str(&data)
            .unwrap_or_else(|e| panic!("failed to parse fixture {}: {e}", path.display()))
    }

    /// Deserializes a fixture, re-serializes it and compares the JSON
    /// values (key order independent).
    fn roundtrip_test<T>(name: &str) -> T
    where
        T: serde::de::DeserializeOwned + serde::Serialize,
    {
        let fixture = load_fixture(name);
        let parsed: T = serde_json::from_value(fixture.clone())
            .unwrap_or_else(|e| panic!("failed to deserialize {name}: {e}"));
        let reserialized = serde_json::to_value(&parsed)
            .unwrap_or_else(|e| panic!("failed to re-serialize {name}: {e}"));

        assert_eq!(
            fixture, reserialized,
            "roundtrip mismatch for {name}:\n  fixture: {fixture}\n  rust:    {reserialized}"
        );
        parsed
    }

    // --- Server status messages ---

    #[test]
    fn fixture_status_ready() {
        let status: StatusMessage = roundtrip_test("status_ready.json");
        assert_eq!(status, StatusMessage::ready());
    }

    #[test]
    fn fixture_status_rejection() {
        let status: StatusMessage = roundtrip_test("status_rejection.json");
        assert_eq!(status.code, Some(400));
        assert_eq!(status.part, None);
    }

    #[test]
    fn fixture_status_cancel() {
        let status: StatusMessage = roundtrip_test("status_cancel.json");
        assert_eq!(status, StatusMessage::new(400, "Upload canceled"));
    }

    #[test]
    fn fixture_status_progress() {
        let status: StatusMessage = roundtrip_test("status_progress.json");
        assert_eq!(status, StatusMessage::progress(3));
        assert_eq!(status.code, None);
    }

    #[test]
    fn fixture_status_success() {
        let status: StatusMessage = roundtrip_test("status_success.json");
        assert_eq!(status.code, Some(200));
    }

    #[test]
    fn encoded_status_matches_fixture() {
        let encoded = StatusMessage::progress(3).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&encoded).unwrap();
        assert_eq!(value, load_fixture("status_progress.json"));
    }

    // --- Client messages ---

    #[test]
    fn fixture_upload_header() {
        let header: UploadHeader = roundtrip_test("upload_header.json");
        assert_eq!(header.filename, "b.bin");
        assert_eq!(header.size, 12 * 1024 * 1024);
    }

    #[test]
    fn fixture_upload_header_capitalized() {
        let raw = fs::read_to_string(fixtures_dir().join("upload_header_capitalized.json")).unwrap();
        let header = UploadHeader::parse(&raw).unwrap();
        assert_eq!(header.filename, "report.pdf");
        assert_eq!(header.size, 4096);

        // Always written back with lowercase keys.
        let value = serde_json::to_value(&header).unwrap();
        assert_eq!(value, serde_json::json!({"filename": "report.pdf", "size": 4096}));
    }

    #[test]
    fn literal_frames() {
        assert_eq!(ServerFrame::Next.to_text().unwrap(), NEXT);
        assert_eq!(ServerFrame::UploadCompleted.to_text().unwrap(), UPLOAD_COMPLETED);
        assert_eq!(ServerFrame::Completed.to_text().unwrap(), COMPLETED);
        assert_eq!(ClientText::classify(CANCEL), ClientText::Cancel);
    }

    // --- Storage types ---

    #[test]
    fn fixture_file_record() {
        let record: FileRecord = roundtrip_test("file_record.json");
        assert_eq!(record.id, 7);
        assert_eq!(record.upload_status, UploadState::Completed);
    }

    #[test]
    fn fixture_multipart_session() {
        let session: MultipartSession = roundtrip_test("multipart_session.json");
        assert_eq!(session.key, "b.bin");
    }

    #[test]
    fn fixture_object_info() {
        let info: ObjectInfo = roundtrip_test("object_info.json");
        assert!(info.etag.ends_with("-3"));
    }
}
