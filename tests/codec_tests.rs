use nbtpath::{
    decode_document, encode_compound_document, read_named_value, write_named_compound, CodecError,
    Compound, Compression, List, Tag, Value,
};

fn sample_root() -> Compound {
    let mut inventory = List::default();
    inventory.push(Value::String("sword".to_string())).unwrap();
    inventory.push(Value::String("träger".to_string())).unwrap();

    let mut pos = Compound::default();
    pos.insert("x".to_string(), Value::Double(1.5)).unwrap();
    pos.insert("y".to_string(), Value::Double(-64.0)).unwrap();

    let mut root = Compound::default();
    root.insert("Name".to_string(), Value::String("alpha".to_string()))
        .unwrap();
    root.insert("Health".to_string(), Value::Short(20)).unwrap();
    root.insert("Seed".to_string(), Value::Long(-7)).unwrap();
    root.insert("Inventory".to_string(), Value::List(inventory))
        .unwrap();
    root.insert("Pos".to_string(), Value::Compound(pos)).unwrap();
    root.insert("Bits".to_string(), Value::ByteArray(vec![-1, 0, 1]))
        .unwrap();
    root.insert("Heights".to_string(), Value::IntArray(vec![1, -2, 3]))
        .unwrap();
    root
}

#[test]
fn test_document_round_trip_uncompressed() {
    let root = sample_root();
    let bytes = encode_compound_document("Level", &root, Compression::Uncompressed).unwrap();

    let (name, value) = read_named_value(&mut &bytes[..]).unwrap();
    assert_eq!(name, "Level");
    assert_eq!(value, Value::Compound(root));
}

#[test]
fn test_document_round_trip_through_compression() {
    let root = sample_root();
    for compression in [Compression::Gzip, Compression::Zlib, Compression::Uncompressed] {
        let bytes = encode_compound_document("Level", &root, compression).unwrap();
        let (sniffed, name, value) = decode_document(&bytes).unwrap();
        assert_eq!(sniffed, compression);
        assert_eq!(name, "Level");
        assert_eq!(value, Value::Compound(root.clone()));
    }
}

#[test]
fn test_truncated_input_reports_end_of_file() {
    let root = sample_root();
    let bytes = encode_compound_document("Level", &root, Compression::Uncompressed).unwrap();

    let truncated = &bytes[..bytes.len() / 2];
    match read_named_value(&mut &truncated[..]) {
        Err(CodecError::EndOfFile) => {}
        other => panic!("expected EndOfFile, got {other:?}"),
    }
}

#[test]
fn test_invalid_tag_byte_is_rejected() {
    // Kind byte 13 is out of range.
    let bytes = [13u8, 0, 0];
    match read_named_value(&mut &bytes[..]) {
        Err(CodecError::InvalidTagType(13)) => {}
        other => panic!("expected InvalidTagType, got {other:?}"),
    }
}

#[test]
fn test_empty_list_keeps_end_element_kind() {
    let mut root = Compound::default();
    root.insert("Empty".to_string(), Value::List(List::default()))
        .unwrap();
    let mut bytes = Vec::new();
    write_named_compound(&mut bytes, "", &root).unwrap();

    let (_, value) = read_named_value(&mut &bytes[..]).unwrap();
    let Value::Compound(parsed) = value else {
        panic!("expected a compound root");
    };
    let Some(Value::List(list)) = parsed.get("Empty") else {
        panic!("expected a list member");
    };
    assert_eq!(list.elem_tag(), Tag::End);
    assert!(list.is_empty());
}

#[test]
fn test_scalar_parse_respects_kind() {
    assert_eq!(Value::parse_as(Tag::Byte, "300"), None);
    assert_eq!(Value::parse_as(Tag::Int, "300"), Some(Value::Int(300)));
    assert_eq!(
        Value::parse_as(Tag::String, "300"),
        Some(Value::String("300".to_string()))
    );
    assert_eq!(Value::parse_as(Tag::Compound, "300"), None);
}
