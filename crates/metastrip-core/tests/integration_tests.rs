//! Integration tests for metastrip-core.
//!
//! These tests run complete clean and audit workflows against archives
//! written to a real filesystem.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::fs;
use std::path::Path;
use std::path::PathBuf;

use metastrip_core::BackupPolicy;
use metastrip_core::Capabilities;
use metastrip_core::MetaValue;
use metastrip_core::Resolution;
use metastrip_core::Resolver;
use metastrip_core::RewriteReport;
use metastrip_core::Strip;
use metastrip_core::StripError;
use metastrip_core::StripMethod;
use metastrip_core::StripOptions;
use metastrip_core::UnreadableReason;
use metastrip_core::cleaned_path;
use metastrip_core::formats::compression::TarCompression;
use metastrip_core::test_utils;
use metastrip_core::test_utils::TarTestBuilder;
use metastrip_core::test_utils::ZipTestBuilder;
use tempfile::TempDir;

const ICC_SEGMENT: &[u8] = b"ICC_PROFILE\0\x01\x01 fake profile";

fn resolver() -> Resolver {
    Resolver::with_capabilities(&Capabilities {
        pdf: cfg!(feature = "pdf"),
        extended_audio: true,
        exiftool: false,
    })
}

fn write(dir: &Path, name: &str, data: &[u8]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, data).unwrap();
    path
}

fn listing(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

fn owned_tar() -> Vec<u8> {
    TarTestBuilder::new()
        .owner(1000, 1000, "alice", "alice")
        .mtime(1_600_000_000)
        .add_file("photo.png", &test_utils::png_with_text(&[("Author", "alice")]))
        .add_file("notes.txt", b"meet at noon")
        .build()
}

#[test]
fn test_tar_in_place_neutralizes_headers() {
    let temp = TempDir::new().unwrap();
    let path = write(temp.path(), "archive.tar", &owned_tar());
    let resolver = resolver();

    let stripper = resolver
        .create_stripper(&path, StripOptions::default())
        .unwrap();
    assert!(!stripper.is_clean().unwrap());

    let report = stripper.clean(StripMethod::Normal).unwrap();
    assert_eq!(report.output, path);
    assert_eq!(
        report.members,
        Some(RewriteReport {
            stripped: 1,
            passed_through: 0,
            dropped: 1,
            skipped: 0,
        })
    );
    assert!(!cleaned_path(&path).exists());
    assert_eq!(listing(temp.path()), vec!["archive.tar"]);

    let headers = test_utils::read_tar_headers(&fs::read(&path).unwrap(), TarCompression::None);
    assert_eq!(headers.len(), 1);
    let photo = &headers[0];
    assert_eq!(photo.name, "photo.png");
    assert_eq!((photo.uid, photo.gid, photo.mtime), (0, 0, 0));
    assert!(photo.uname.is_empty());
    assert!(photo.gname.is_empty());
    assert!(!contains(&photo.data, b"alice"));

    let again = resolver
        .create_stripper(&path, StripOptions::default())
        .unwrap();
    assert!(again.is_clean().unwrap());
}

#[test]
fn test_pass_through_keeps_unsupported_members() {
    let temp = TempDir::new().unwrap();
    let path = write(temp.path(), "archive.tar", &owned_tar());
    let resolver = resolver();
    let options = StripOptions::default().with_pass_through(true);

    let report = resolver
        .create_stripper(&path, options)
        .unwrap()
        .clean(StripMethod::Normal)
        .unwrap();
    let members = report.members.unwrap();
    assert_eq!(members.stripped, 1);
    assert_eq!(members.passed_through, 1);
    assert_eq!(members.dropped, 0);

    let headers = test_utils::read_tar_headers(&fs::read(&path).unwrap(), TarCompression::None);
    let notes = headers.iter().find(|h| h.name == "notes.txt").unwrap();
    assert_eq!(notes.data, b"meet at noon");
    assert_eq!(notes.uid, 0);
    assert!(notes.uname.is_empty());
}

#[test]
fn test_cleaning_twice_is_byte_identical() {
    let temp = TempDir::new().unwrap();
    let tar = TarTestBuilder::new()
        .owner(501, 20, "bob", "staff")
        .mtime(1_234_567_890)
        .add_file("a.png", &test_utils::png_with_text(&[("Comment", "first")]))
        .add_file_with_mode("tool.mp3", &test_utils::mp3_with_tags(&[("TIT2", "Song")], None), 0o755)
        .build();
    let path = write(temp.path(), "bundle.tar.gz", &test_utils::gzip(&tar));
    let resolver = resolver();

    resolver
        .create_stripper(&path, StripOptions::default())
        .unwrap()
        .clean(StripMethod::Normal)
        .unwrap();
    let first = fs::read(&path).unwrap();

    resolver
        .create_stripper(&path, StripOptions::default())
        .unwrap()
        .clean(StripMethod::Normal)
        .unwrap();
    let second = fs::read(&path).unwrap();

    assert_eq!(first, second);
    let headers = test_utils::read_tar_headers(&second, TarCompression::Gzip);
    let tool = headers.iter().find(|h| h.name == "tool.mp3").unwrap();
    assert_eq!(tool.mode, 0o755);
}

#[test]
fn test_nested_containers_are_stripped_recursively() {
    let temp = TempDir::new().unwrap();
    let inner = ZipTestBuilder::new()
        .modified(2021, 6, 1, 12, 0, 0)
        .add_file("deep.png", &test_utils::png_with_text(&[("Author", "alice")]))
        .build();
    let outer = TarTestBuilder::new()
        .owner(1000, 1000, "alice", "alice")
        .add_file("inner.zip", &inner)
        .build();
    let path = write(temp.path(), "outer.tar", &outer);
    let resolver = resolver();

    let stripper = resolver
        .create_stripper(&path, StripOptions::default())
        .unwrap();
    let meta = stripper.get_meta().unwrap();
    let Some(MetaValue::Nested(fields)) = meta.get("inner.zip") else {
        panic!("expected nested fields for inner.zip, got {meta:?}");
    };
    assert_eq!(fields.get("uid"), Some(&"1000".into()));
    let Some(MetaValue::Nested(deep)) = fields.get("deep.png") else {
        panic!("expected nested fields for deep.png, got {fields:?}");
    };
    assert_eq!(deep.get("Author"), Some(&"alice".into()));
    assert_eq!(deep.get("modified"), Some(&"2021-06-01 12:00:00".into()));

    stripper.clean(StripMethod::Normal).unwrap();

    let headers = test_utils::read_tar_headers(&fs::read(&path).unwrap(), TarCompression::None);
    assert_eq!(headers.len(), 1);
    let entries = test_utils::read_zip_entries(&headers[0].data);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].0, "deep.png");
    assert!(!contains(&entries[0].1, b"alice"));

    assert!(
        resolver
            .create_stripper(&path, StripOptions::default())
            .unwrap()
            .is_clean()
            .unwrap()
    );
    assert_eq!(listing(temp.path()), vec!["outer.tar"]);
}

#[test]
fn test_method_reaches_members() {
    let temp = TempDir::new().unwrap();
    let jpeg = test_utils::jpeg_with_segments(&[(0xE1, b"Exif\0\0MM\0\x2a"), (0xE2, ICC_SEGMENT)]);
    let zip = ZipTestBuilder::new().add_file("shot.jpg", &jpeg).build();
    let resolver = resolver();

    let normal = write(temp.path(), "normal.zip", &zip);
    resolver
        .create_stripper(&normal, StripOptions::default())
        .unwrap()
        .clean(StripMethod::Normal)
        .unwrap();
    let entries = test_utils::read_zip_entries(&fs::read(&normal).unwrap());
    assert!(contains(&entries[0].1, b"ICC_PROFILE"));
    assert!(!contains(&entries[0].1, b"Exif"));

    let ugly = write(temp.path(), "ugly.zip", &zip);
    resolver
        .create_stripper(&ugly, StripOptions::default())
        .unwrap()
        .clean(StripMethod::Ugly)
        .unwrap();
    let entries = test_utils::read_zip_entries(&fs::read(&ugly).unwrap());
    assert!(!contains(&entries[0].1, b"ICC_PROFILE"));
    assert!(!contains(&entries[0].1, b"Exif"));
}

#[test]
fn test_empty_zip_with_comment() {
    let temp = TempDir::new().unwrap();
    let zip = ZipTestBuilder::new().comment("made by alice").build();
    let path = write(temp.path(), "empty.zip", &zip);
    let resolver = resolver();

    let stripper = resolver
        .create_stripper(&path, StripOptions::default())
        .unwrap();
    assert!(!stripper.is_clean().unwrap());
    let meta = stripper.get_meta().unwrap();
    let Some(MetaValue::Nested(container)) = meta.get("empty.zip") else {
        panic!("expected container comment, got {meta:?}");
    };
    assert_eq!(container.get("comment"), Some(&"made by alice".into()));

    let report = stripper.clean(StripMethod::Normal).unwrap();
    assert_eq!(report.members, Some(RewriteReport::default()));

    let cleaned = fs::read(&path).unwrap();
    assert!(test_utils::read_zip_comment(&cleaned).is_empty());
    assert!(test_utils::read_zip_entries(&cleaned).is_empty());
    assert!(
        resolver
            .create_stripper(&path, StripOptions::default())
            .unwrap()
            .is_clean()
            .unwrap()
    );
}

#[test]
fn test_keep_policy_leaves_original() {
    let temp = TempDir::new().unwrap();
    let data = owned_tar();
    let path = write(temp.path(), "archive.tar", &data);
    let options = StripOptions::default().with_backup(BackupPolicy::Keep);
    let resolver = resolver();

    let report = resolver
        .create_stripper(&path, options)
        .unwrap()
        .clean(StripMethod::Normal)
        .unwrap();

    assert_eq!(report.output, cleaned_path(&path));
    assert_eq!(fs::read(&path).unwrap(), data);
    assert_eq!(
        listing(temp.path()),
        vec!["archive.tar", "archive.tar.cleaned"]
    );
}

#[test]
fn test_opendocument_drops_meta_xml() {
    let temp = TempDir::new().unwrap();
    let odt = ZipTestBuilder::new()
        .add_file("mimetype", b"application/vnd.oasis.opendocument.text")
        .add_file("content.xml", b"<office:document-content/>")
        .add_file("meta.xml", b"<meta:initial-creator>alice</meta:initial-creator>")
        .build();
    let path = write(temp.path(), "letter.odt", &odt);
    let resolver = resolver();

    let stripper = resolver
        .create_stripper(&path, StripOptions::default())
        .unwrap();
    assert_eq!(stripper.mimetype(), "application/opendocument");
    assert!(!stripper.is_clean().unwrap());

    let report = stripper.clean(StripMethod::Normal).unwrap();
    let members = report.members.unwrap();
    assert_eq!(members.dropped, 1);
    assert_eq!(members.passed_through, 2);

    let names: Vec<String> = test_utils::read_zip_entries(&fs::read(&path).unwrap())
        .into_iter()
        .map(|(name, _)| name)
        .collect();
    assert_eq!(names, vec!["mimetype", "content.xml"]);
}

#[test]
fn test_links_are_skipped() {
    let temp = TempDir::new().unwrap();
    let tar = TarTestBuilder::new()
        .add_directory("pics/")
        .add_file("pics/a.png", &test_utils::png_with_text(&[]))
        .add_symlink("pics/latest.png", "a.png")
        .add_hardlink("pics/copy.png", "pics/a.png")
        .build();
    let path = write(temp.path(), "pics.tar", &tar);
    let resolver = resolver();

    let report = resolver
        .create_stripper(&path, StripOptions::default())
        .unwrap()
        .clean(StripMethod::Normal)
        .unwrap();
    let members = report.members.unwrap();
    assert_eq!(members.stripped, 1);
    assert_eq!(members.skipped, 2);

    let headers = test_utils::read_tar_headers(&fs::read(&path).unwrap(), TarCompression::None);
    let names: Vec<&str> = headers.iter().map(|h| h.name.as_str()).collect();
    assert_eq!(names, vec!["pics/a.png"]);
    assert_eq!(listing(temp.path()), vec!["pics.tar"]);
}

#[test]
fn test_failed_rewrite_leaves_no_trace() {
    let temp = TempDir::new().unwrap();
    let mut tar = TarTestBuilder::new()
        .add_file("big.png", &[7u8; 4096])
        .build();
    tar.truncate(1200);
    let path = write(temp.path(), "broken.tar", &tar);
    let resolver = resolver();

    let result = resolver
        .create_stripper(&path, StripOptions::default())
        .unwrap()
        .clean(StripMethod::Normal);
    assert!(result.is_err());
    assert_eq!(fs::read(&path).unwrap(), tar);
    assert_eq!(listing(temp.path()), vec!["broken.tar"]);
}

#[test]
fn test_failed_rewrite_spares_existing_cleaned_file() {
    let temp = TempDir::new().unwrap();
    let mut tar = TarTestBuilder::new()
        .add_file("big.png", &[7u8; 4096])
        .build();
    tar.truncate(1200);
    let path = write(temp.path(), "broken.tar", &tar);
    let bystander = write(temp.path(), "broken.tar.cleaned", b"keep me");

    let result = resolver()
        .create_stripper(&path, StripOptions::default())
        .unwrap()
        .clean(StripMethod::Normal);
    assert!(result.is_err());
    assert_eq!(fs::read(&bystander).unwrap(), b"keep me");
    assert_eq!(listing(temp.path()), vec!["broken.tar", "broken.tar.cleaned"]);
}

#[test]
fn test_leaf_formats_end_to_end() {
    let temp = TempDir::new().unwrap();
    let fixtures = [
        (
            "image.png",
            test_utils::png_with_text(&[("Software", "editor 3")]),
        ),
        (
            "image.jpg",
            test_utils::jpeg_with_segments(&[(0xFE, b"shot by alice")]),
        ),
        (
            "song.mp3",
            test_utils::mp3_with_tags(&[("TPE1", "alice")], Some("Old title")),
        ),
        (
            "song.flac",
            test_utils::flac_with_comments(&[("ARTIST", "alice")]),
        ),
        (
            "linux.torrent",
            test_utils::torrent_with_extras(&[("comment", "ripped by alice")]),
        ),
    ];
    let resolver = resolver();

    for (name, data) in fixtures {
        let path = write(temp.path(), name, &data);
        let stripper = resolver
            .create_stripper(&path, StripOptions::default())
            .unwrap();
        assert!(!stripper.is_clean().unwrap(), "{name} should be dirty");
        assert!(!stripper.get_meta().unwrap().is_empty(), "{name} meta");

        let report = stripper.clean(StripMethod::Normal).unwrap();
        assert_eq!(report.output, path);
        assert!(report.members.is_none());

        let stripper = resolver
            .create_stripper(&path, StripOptions::default())
            .unwrap();
        assert!(stripper.is_clean().unwrap(), "{name} should be clean");
        assert!(!contains(&fs::read(&path).unwrap(), b"alice"), "{name}");
    }
}

#[cfg(feature = "pdf")]
#[test]
fn test_pdf_in_zip() {
    let temp = TempDir::new().unwrap();
    let pdf = test_utils::pdf_with_info(&[("Author", "alice")]);
    let zip = ZipTestBuilder::new().add_file("paper.pdf", &pdf).build();
    let path = write(temp.path(), "papers.zip", &zip);
    let resolver = resolver();

    let report = resolver
        .create_stripper(&path, StripOptions::default())
        .unwrap()
        .clean(StripMethod::Normal)
        .unwrap();
    assert_eq!(report.members.unwrap().stripped, 1);

    let entries = test_utils::read_zip_entries(&fs::read(&path).unwrap());
    assert!(!contains(&entries[0].1, b"alice"));
}

#[test]
fn test_unreadable_and_unsupported_inputs() {
    let temp = TempDir::new().unwrap();
    let resolver = resolver();

    match resolver.resolve(&temp.path().join("missing.png"), StripOptions::default()) {
        Resolution::Unknown(StripError::UnreadableInput { reason, .. }) => {
            assert_eq!(reason, UnreadableReason::NotFound);
        }
        other => panic!("expected unreadable input, got {other:?}"),
    }

    let empty = write(temp.path(), "empty.png", b"");
    let err = resolver
        .create_stripper(&empty, StripOptions::default())
        .unwrap_err();
    assert!(matches!(
        err,
        StripError::UnreadableInput {
            reason: UnreadableReason::Empty,
            ..
        }
    ));

    let text = write(temp.path(), "notes.txt", b"plain words");
    let err = resolver
        .create_stripper(&text, StripOptions::default())
        .unwrap_err();
    assert!(err.is_unsupported());
    assert!(!err.is_fatal());
}

#[test]
fn test_dirty_member_makes_container_dirty() {
    let temp = TempDir::new().unwrap();
    let tar = TarTestBuilder::new()
        .add_file("clean.png", &test_utils::png_with_text(&[]))
        .add_file("dirty.png", &test_utils::png_with_text(&[("Author", "alice")]))
        .build();
    let path = write(temp.path(), "mixed.tar", &tar);

    let resolver = resolver();
    let stripper = resolver
        .create_stripper(&path, StripOptions::default())
        .unwrap();
    assert!(!stripper.is_clean().unwrap());
    assert_eq!(listing(temp.path()), vec!["mixed.tar"]);
}

#[test]
fn test_zip_owner_extra_field_is_dirty() {
    let temp = TempDir::new().unwrap();
    let zip = ZipTestBuilder::new()
        .add_file_with_extra(
            "image.png",
            &test_utils::png_with_text(&[]),
            0x7875,
            &test_utils::unix_owner_extra(1000, 1000),
        )
        .build();
    let path = write(temp.path(), "photos.zip", &zip);

    let resolver = resolver();
    let stripper = resolver
        .create_stripper(&path, StripOptions::default())
        .unwrap();
    assert!(!stripper.is_clean().unwrap());
    let meta = stripper.get_meta().unwrap();
    let MetaValue::Nested(fields) = &meta["image.png"] else {
        panic!("expected nested member metadata, got {meta:?}");
    };
    assert_eq!(fields.get("unix owner"), Some(&"uid=1000 gid=1000".into()));

    stripper.clean(StripMethod::Normal).unwrap();
    let stripper = resolver
        .create_stripper(&path, StripOptions::default())
        .unwrap();
    assert!(stripper.is_clean().unwrap());
    assert!(stripper.get_meta().unwrap().is_empty());
}

#[test]
fn test_tar_pax_owner_is_dirty() {
    let temp = TempDir::new().unwrap();
    let tar = TarTestBuilder::new()
        .add_pax_extensions(&[("mtime", "1700000000"), ("uname", "alice")])
        .add_file("image.png", &test_utils::png_with_text(&[]))
        .build();
    let path = write(temp.path(), "photos.tar", &tar);

    let resolver = resolver();
    let stripper = resolver
        .create_stripper(&path, StripOptions::default())
        .unwrap();
    assert!(!stripper.is_clean().unwrap());
    let meta = stripper.get_meta().unwrap();
    let MetaValue::Nested(fields) = &meta["image.png"] else {
        panic!("expected nested member metadata, got {meta:?}");
    };
    assert_eq!(fields.get("uname"), Some(&"alice".into()));
    assert_eq!(fields.get("mtime"), Some(&"1700000000".into()));

    stripper.clean(StripMethod::Normal).unwrap();
    let stripper = resolver
        .create_stripper(&path, StripOptions::default())
        .unwrap();
    assert!(stripper.is_clean().unwrap());
    assert!(stripper.get_meta().unwrap().is_empty());
}

#[test]
fn test_member_metadata_is_listed() {
    let temp = TempDir::new().unwrap();
    let tar = TarTestBuilder::new()
        .add_file("clean.png", &test_utils::png_with_text(&[]))
        .add_file("dirty.png", &test_utils::png_with_text(&[("Author", "alice")]))
        .build();
    let path = write(temp.path(), "mixed.tar", &tar);

    let resolver = resolver();
    let stripper = resolver
        .create_stripper(&path, StripOptions::default())
        .unwrap();
    let meta = stripper.get_meta().unwrap();
    assert!(!meta.contains_key("clean.png"));
    let MetaValue::Nested(fields) = &meta["dirty.png"] else {
        panic!("expected nested member metadata, got {meta:?}");
    };
    assert_eq!(fields.get("Author"), Some(&"alice".into()));
    assert_eq!(listing(temp.path()), vec!["mixed.tar"]);
}
