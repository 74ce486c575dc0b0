use std::path::Path;

use nbtpath::{write_named_compound, Compound, RegionError, RegionFile, Value};
use tempfile::tempdir;

fn chunk_doc(label: &str) -> Vec<u8> {
    let mut root = Compound::default();
    root.insert("Label".to_string(), Value::String(label.to_string()))
        .unwrap();
    let mut bytes = Vec::new();
    write_named_compound(&mut bytes, "", &root).unwrap();
    bytes
}

fn make_region(path: &Path, coords: &[(i32, i32)]) {
    let mut region = RegionFile::create(path).unwrap();
    for &(x, z) in coords {
        region
            .write_chunk(x, z, chunk_doc(&format!("c{x}.{z}")))
            .unwrap();
    }
    region.save().unwrap();
}

#[test]
fn test_write_save_read_round_trip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("r.0.0.mca");
    make_region(&path, &[(0, 0), (5, 7)]);

    let region = RegionFile::open(&path).unwrap();
    assert!(region.has_chunk(0, 0));
    assert!(region.has_chunk(5, 7));
    assert!(!region.has_chunk(1, 1));
    assert_eq!(region.chunk_coords(), vec![(0, 0), (5, 7)]);

    assert_eq!(region.read_chunk(0, 0).unwrap(), chunk_doc("c0.0"));
    assert_eq!(region.read_chunk(5, 7).unwrap(), chunk_doc("c5.7"));
}

#[test]
fn test_missing_chunk_read_is_an_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("r.0.0.mca");
    make_region(&path, &[(0, 0)]);

    let region = RegionFile::open(&path).unwrap();
    match region.read_chunk(3, 3) {
        Err(RegionError::MissingChunk { x: 3, z: 3 }) => {}
        other => panic!("expected MissingChunk, got {other:?}"),
    }
}

#[test]
fn test_coordinates_out_of_range_are_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("r.0.0.mca");
    let mut region = RegionFile::create(&path).unwrap();

    assert!(!region.has_chunk(32, 0));
    match region.write_chunk(-1, 0, Vec::new()) {
        Err(RegionError::CoordOutOfRange { x: -1, z: 0 }) => {}
        other => panic!("expected CoordOutOfRange, got {other:?}"),
    }
}

#[test]
fn test_delete_is_deferred_until_save() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("r.0.0.mca");
    make_region(&path, &[(0, 0), (1, 0)]);

    let mut region = RegionFile::open(&path).unwrap();
    region.queue_delete(0, 0).unwrap();

    // The handle sees the deletion immediately.
    assert!(!region.has_chunk(0, 0));
    assert!(region.read_chunk(0, 0).is_err());

    // The file does not, until save.
    let on_disk = RegionFile::open(&path).unwrap();
    assert!(on_disk.has_chunk(0, 0));

    region.save().unwrap();
    let on_disk = RegionFile::open(&path).unwrap();
    assert!(!on_disk.has_chunk(0, 0));
    // The untouched chunk survives compaction byte-for-byte.
    assert_eq!(on_disk.read_chunk(1, 0).unwrap(), chunk_doc("c1.0"));
}

#[test]
fn test_compaction_applies_pending_writes_and_deletes_once() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("r.0.0.mca");
    make_region(&path, &[(0, 0), (1, 0), (2, 0)]);

    let mut region = RegionFile::open(&path).unwrap();
    region.write_chunk(1, 0, chunk_doc("rewritten")).unwrap();
    region.queue_delete(2, 0).unwrap();
    assert!(region.has_pending());
    region.save().unwrap();
    assert!(!region.has_pending());

    let on_disk = RegionFile::open(&path).unwrap();
    assert_eq!(on_disk.chunk_coords(), vec![(0, 0), (1, 0)]);
    assert_eq!(on_disk.read_chunk(0, 0).unwrap(), chunk_doc("c0.0"));
    assert_eq!(on_disk.read_chunk(1, 0).unwrap(), chunk_doc("rewritten"));
}

#[test]
fn test_write_then_delete_cancels_the_write() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("r.0.0.mca");
    let mut region = RegionFile::create(&path).unwrap();

    region.write_chunk(4, 4, chunk_doc("ephemeral")).unwrap();
    assert!(region.has_chunk(4, 4));
    region.queue_delete(4, 4).unwrap();
    assert!(!region.has_chunk(4, 4));

    region.save().unwrap();
    let on_disk = RegionFile::open(&path).unwrap();
    assert!(on_disk.chunk_coords().is_empty());
}

#[test]
fn test_region_coordinates_parse_from_file_name() {
    let dir = tempdir().unwrap();

    let path = dir.path().join("r.1.-2.mca");
    let region = RegionFile::create(&path).unwrap();
    assert_eq!(region.region_coords(), Some((1, -2)));

    let path = dir.path().join("oddly-named.mca");
    let region = RegionFile::create(&path).unwrap();
    assert_eq!(region.region_coords(), None);
}
