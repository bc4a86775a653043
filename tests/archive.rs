mod common;

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use common::{TestEntry, ZipBuilder, crx_wrap};
use tailzip::zip::CompressionMethod;
use tailzip::{
    Archive, ByteStream, EntryKind, Error, MemorySource, OpenOptions, Source, SourceOptions,
};

/// Records every range requested from the wrapped source.
struct RecordingSource {
    inner: MemorySource,
    requests: Mutex<Vec<(u64, Option<u64>)>>,
}

impl RecordingSource {
    fn new(data: Vec<u8>) -> Self {
        Self {
            inner: MemorySource::new(data),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn take_requests(&self) -> Vec<(u64, Option<u64>)> {
        std::mem::take(&mut *self.requests.lock().unwrap())
    }
}

#[async_trait]
impl Source for RecordingSource {
    fn size(&self) -> u64 {
        self.inner.size()
    }

    async fn stream(&self, offset: u64, length: Option<u64>) -> tailzip::Result<ByteStream> {
        self.requests.lock().unwrap().push((offset, length));
        self.inner.stream(offset, length).await
    }
}

fn sample() -> ZipBuilder {
    ZipBuilder::new()
        .stored("readme.txt", b"hello from the archive\n")
        .entry(TestEntry::deflated(
            "src/lib.rs",
            "pub fn answer() -> u32 { 42 }\n".repeat(40),
        ))
        .entry(TestEntry::stored("src/", b""))
        .entry(TestEntry::stored("empty.txt", b"").comment("nothing here"))
}

#[tokio::test]
async fn test_lists_every_directory_record() {
    let data = sample().comment("release build").build();
    let archive = Archive::open_buffer(data, OpenOptions::default())
        .await
        .unwrap();

    let names: Vec<&str> = archive.files().iter().map(|e| e.path.as_str()).collect();
    assert_eq!(names, ["readme.txt", "src/lib.rs", "src/", "empty.txt"]);
    assert_eq!(archive.files().len() as u64, archive.directory().total_records());
    assert!(!archive.directory().is_zip64());
    assert_eq!(archive.comment(), "release build");
    assert!(archive.container_header().is_none());

    let lib = archive.entry("src/lib.rs").unwrap();
    assert_eq!(lib.compression_method, CompressionMethod::Deflate);
    assert_eq!(lib.uncompressed_size, 30 * 40);
    assert!(lib.compressed_size < lib.uncompressed_size);
    let modified = lib.last_modified.unwrap();
    assert_eq!(modified.year(), 2021);
    assert_eq!(modified.month(), time::Month::March);
    assert_eq!(modified.day(), 14);
    assert_eq!((modified.hour(), modified.minute(), modified.second()), (15, 9, 26));

    assert_eq!(archive.entry("empty.txt").unwrap().comment_text(), "nothing here");
}

#[tokio::test]
async fn test_classifies_files_and_directories() {
    let data = ZipBuilder::new()
        .stored("a.txt", b"")
        .stored("a/", b"")
        .stored("b\\", b"")
        .stored("c/d.txt", b"data")
        .build();
    let archive = Archive::open_buffer(data, OpenOptions::default())
        .await
        .unwrap();

    let kinds: Vec<EntryKind> = archive.files().iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        [
            EntryKind::File,
            EntryKind::Directory,
            EntryKind::Directory,
            EntryKind::File
        ]
    );
}

#[tokio::test]
async fn test_zip64_trailer_matches_standard_listing() {
    let standard = Archive::open_buffer(sample().build(), OpenOptions::default())
        .await
        .unwrap();
    let zip64 = Archive::open_buffer(sample().zip64().build(), OpenOptions::default())
        .await
        .unwrap();

    assert!(zip64.directory().is_zip64());
    assert_eq!(standard.files().len(), zip64.files().len());
    for (a, b) in standard.files().iter().zip(zip64.files()) {
        assert_eq!(a.path, b.path);
        assert_eq!(a.kind, b.kind);
        assert_eq!(a.crc32, b.crc32);
        assert_eq!(a.compressed_size, b.compressed_size);
        assert_eq!(a.uncompressed_size, b.uncompressed_size);
        assert_eq!(a.local_header_offset, b.local_header_offset);
    }

    let lib = zip64.entry("src/lib.rs").unwrap();
    let body = lib.buffer(None).await.unwrap();
    assert_eq!(body, "pub fn answer() -> u32 { 42 }\n".repeat(40).as_bytes());
}

#[tokio::test]
async fn test_container_header_shifts_every_offset() {
    let zip = sample().build();
    let key = b"public-key-bytes";
    let signature = b"sig";
    let crx = crx_wrap(&zip, key, signature);
    let bias = (16 + key.len() + signature.len()) as u64;

    let plain = Archive::open_buffer(zip, OpenOptions::default())
        .await
        .unwrap();
    let wrapped = Archive::open_buffer(crx, OpenOptions::default().container_header(true))
        .await
        .unwrap();

    let header = wrapped.container_header().unwrap();
    assert_eq!(header.version, 2);
    assert_eq!(header.public_key, key);
    assert_eq!(header.signature, signature);
    assert_eq!(header.size, bias);

    assert_eq!(wrapped.directory_offset(), plain.directory_offset() + bias);
    for (a, b) in plain.files().iter().zip(wrapped.files()) {
        assert_eq!(b.local_header_offset, a.local_header_offset + bias);
    }

    let readme = wrapped.entry("readme.txt").unwrap();
    assert_eq!(readme.buffer(None).await.unwrap(), b"hello from the archive\n");
}

#[tokio::test]
async fn test_container_header_with_zip64_trailer() {
    let crx = crx_wrap(&sample().zip64().build(), b"k", b"s");
    let archive = Archive::open_buffer(crx, OpenOptions::default().container_header(true))
        .await
        .unwrap();

    assert!(archive.directory().is_zip64());
    let lib = archive.entry("src/lib.rs").unwrap();
    assert_eq!(lib.buffer(None).await.unwrap().len(), 30 * 40);
}

#[tokio::test]
async fn test_multi_volume_translation() {
    let zip = sample().build();
    // One separator byte per volume boundary in front of the logical stream.
    let mut physical = vec![0xEE; 3];
    physical.extend_from_slice(&zip);
    let options = SourceOptions::multi_volume(physical.len() as u64, 3);

    let source = Arc::new(MemorySource::new(physical).with_options(options));
    let archive = Archive::open(source, OpenOptions::default()).await.unwrap();

    assert_eq!(archive.files().len(), 4);
    let readme = archive.entry("readme.txt").unwrap();
    assert_eq!(readme.buffer(None).await.unwrap(), b"hello from the archive\n");
}

#[tokio::test]
async fn test_non_archive_is_malformed() {
    let err = Archive::open_buffer(vec![0u8; 200], OpenOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::MalformedSignature {
            record: "end of central directory",
            ..
        }
    ));
}

#[tokio::test]
async fn test_long_comment_needs_wider_window() {
    let data = sample().comment(&"x".repeat(200)).build();

    let err = Archive::open_buffer(data.clone(), OpenOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::MalformedSignature { .. }));

    let archive = Archive::open_buffer(data, OpenOptions::default().tail_window_size(300))
        .await
        .unwrap();
    assert_eq!(archive.comment().len(), 200);
}

#[tokio::test]
async fn test_raw_name_bytes_are_preserved() {
    let data = ZipBuilder::new()
        .entry(TestEntry::stored([0x80, b'x'], b"legacy").raw_name())
        .build();
    let archive = Archive::open_buffer(data, OpenOptions::default())
        .await
        .unwrap();

    let entry = &archive.files()[0];
    assert!(!entry.is_unicode);
    assert_eq!(entry.raw_path, [0x80, b'x']);
    assert_eq!(entry.path, "\u{FFFD}x");
    assert_eq!(entry.buffer(None).await.unwrap(), b"legacy");
}

#[tokio::test]
async fn test_signature_bytes_in_last_name_are_not_the_trailer() {
    let data = ZipBuilder::new()
        .stored("x", b"1")
        .stored("dataPK\x05\x06.bin", b"2")
        .build();
    let archive = Archive::open_buffer(data, OpenOptions::default())
        .await
        .unwrap();

    let names: Vec<&str> = archive.files().iter().map(|e| e.path.as_str()).collect();
    assert_eq!(names, ["x", "dataPK\x05\x06.bin"]);
    assert_eq!(archive.files()[0].buffer(None).await.unwrap(), b"1");
    assert_eq!(archive.files()[1].buffer(None).await.unwrap(), b"2");
}

#[tokio::test]
async fn test_overflowing_zip64_directory_offset_is_desync() {
    let mut zip = ZipBuilder::new().stored("a.txt", b"a").zip64().build();
    let record = zip
        .windows(4)
        .position(|w| w == b"PK\x06\x06")
        .unwrap();
    zip[record + 48..record + 56].copy_from_slice(&u64::MAX.to_le_bytes());

    let crx = crx_wrap(&zip, b"key", b"sig");
    let err = Archive::open_buffer(crx, OpenOptions::default().container_header(true))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::StructuralDesync {
            context: "central directory offset",
            ..
        }
    ));
}

#[tokio::test]
async fn test_every_read_is_a_bounded_range() {
    let source = Arc::new(RecordingSource::new(sample().comment("bounded").build()));
    let archive = Archive::open(source.clone(), OpenOptions::default())
        .await
        .unwrap();
    let opening = source.take_requests();
    assert!(!opening.is_empty());
    assert!(opening.iter().all(|(_, length)| length.is_some()));

    let lib = archive.entry("src/lib.rs").unwrap();
    lib.buffer(None).await.unwrap();
    let header = lib.local_header_offset;
    assert_eq!(
        source.take_requests(),
        [
            (header, Some(30)),
            (header + 30, Some("src/lib.rs".len() as u64 + lib.compressed_size)),
        ]
    );
}
