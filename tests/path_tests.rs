use std::fs;
use std::path::{Path, PathBuf};

use nbtpath::{
    encode_compound_document, Compound, Compression, Matcher, NodeTree, PathError, PathQuery,
    Visited,
};
use tempfile::tempdir;

fn nested_root() -> Compound {
    let mut b1 = Compound::default();
    b1.insert("C".to_string(), nbtpath::Value::Int(1)).unwrap();
    let mut b2 = Compound::default();
    b2.insert("C".to_string(), nbtpath::Value::Int(2)).unwrap();
    b2.insert("D".to_string(), nbtpath::Value::Int(3)).unwrap();

    let mut root = Compound::default();
    root.insert("B1".to_string(), nbtpath::Value::Compound(b1))
        .unwrap();
    root.insert("B2".to_string(), nbtpath::Value::Compound(b2))
        .unwrap();
    root
}

fn write_nbt_file(dir: &Path, name: &str, root: &Compound) -> PathBuf {
    let path = dir.join(name);
    let bytes = encode_compound_document("root", root, Compression::Gzip).unwrap();
    fs::write(&path, bytes).unwrap();
    path
}

#[test]
fn test_pattern_splits_into_root_and_matchers() {
    let dir = tempdir().unwrap();
    let path = write_nbt_file(dir.path(), "a.dat", &nested_root());

    let query = PathQuery::parse(&format!("{}/*/C", path.display())).unwrap();
    assert_eq!(query.root(), path);
    assert_eq!(
        query.matchers(),
        [Matcher::Any, Matcher::Literal("C".to_string())]
    );
}

#[test]
fn test_unresolvable_root_is_rejected() {
    match PathQuery::parse("no/such/file.dat/Tag") {
        Err(PathError::UnresolvedRoot(_)) => {}
        other => panic!("expected UnresolvedRoot, got {other:?}"),
    }
    match PathQuery::parse("") {
        Err(PathError::EmptyPattern) => {}
        other => panic!("expected EmptyPattern, got {other:?}"),
    }
}

#[test]
fn test_wildcard_yields_matches_in_expansion_order() {
    let dir = tempdir().unwrap();
    let path = write_nbt_file(dir.path(), "a.dat", &nested_root());

    let query = PathQuery::parse(&format!("{}/*/C", path.display())).unwrap();
    let mut tree = NodeTree::new();
    let matched: Vec<_> = query
        .enumerate(&mut tree)
        .unwrap()
        .map(|item| match item {
            Visited::Matched(id) => id,
            Visited::Unreadable(id, e) => panic!("unreadable {id:?}: {e}"),
        })
        .collect();

    // Exactly two nodes named C, in the order their parents were expanded.
    assert_eq!(matched.len(), 2);
    for id in &matched {
        assert_eq!(tree.segment(*id), "C");
    }
    assert_eq!(
        tree.node_path(matched[0]),
        format!("{}/B1/C", path.display())
    );
    assert_eq!(
        tree.node_path(matched[1]),
        format!("{}/B2/C", path.display())
    );
}

#[test]
fn test_literal_segments_prune_the_walk() {
    let dir = tempdir().unwrap();
    let path = write_nbt_file(dir.path(), "a.dat", &nested_root());

    let query = PathQuery::parse(&format!("{}/*/D", path.display())).unwrap();
    let mut tree = NodeTree::new();
    let matched: Vec<_> = query.enumerate(&mut tree).unwrap().collect();
    assert_eq!(matched.len(), 1);

    // B1 was expanded during the walk; its scalar child C never was.
    let query = PathQuery::parse(&format!("{}/B1", path.display())).unwrap();
    let mut tree = NodeTree::new();
    let matched: Vec<_> = query.enumerate(&mut tree).unwrap().collect();
    assert_eq!(matched.len(), 1);
    if let Visited::Matched(id) = matched[0] {
        // The matched node itself is yielded unexpanded.
        assert!(!tree.is_expanded(id));
    }
}

#[test]
fn test_pattern_with_no_tag_segments_yields_the_root() {
    let dir = tempdir().unwrap();
    let path = write_nbt_file(dir.path(), "a.dat", &nested_root());

    let query = PathQuery::parse(&path.display().to_string()).unwrap();
    let mut tree = NodeTree::new();
    let matched: Vec<_> = query.enumerate(&mut tree).unwrap().collect();
    assert_eq!(matched.len(), 1);
}

#[test]
fn test_enumeration_descends_through_directories() {
    let dir = tempdir().unwrap();
    write_nbt_file(dir.path(), "a.dat", &nested_root());
    write_nbt_file(dir.path(), "b.dat", &nested_root());

    let query = PathQuery::parse(&format!("{}/*/B2/D", dir.path().display())).unwrap();
    let mut tree = NodeTree::new();
    let matched: Vec<_> = query.enumerate(&mut tree).unwrap().collect();
    assert_eq!(matched.len(), 2);
}
