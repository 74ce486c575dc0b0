use nbtpath::Tag;

#[test]
fn test_tag_kinds_round_trip_through_bytes() {
    for byte in 0..=12u8 {
        let tag = Tag::from_u8(byte).unwrap();
        assert_eq!(tag as u8, byte);
    }
    assert_eq!(Tag::from_u8(13), None);
    assert_eq!(Tag::from_u8(255), None);
}

#[test]
fn test_tag_kind_predicates() {
    assert!(Tag::Int.is_primitive());
    assert!(Tag::Double.is_primitive());
    assert!(!Tag::String.is_primitive());

    assert!(Tag::ByteArray.is_array());
    assert!(Tag::LongArray.is_array());
    assert!(!Tag::List.is_array());

    assert!(Tag::List.is_composite());
    assert!(Tag::Compound.is_composite());
    assert!(!Tag::End.is_composite());
}

#[test]
fn test_tag_display_names() {
    assert_eq!(Tag::Compound.to_string(), "TAG_Compound");
    assert_eq!(Tag::ByteArray.name(), "TAG_Byte_Array");
}
