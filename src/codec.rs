//! Big-endian NBT wire codec over [`std::io::Read`] and [`std::io::Write`].
//!
//! A document is one named tag: a kind byte, a length-prefixed MUTF-8 name,
//! and the payload. [`read_named_value`] and [`write_named_value`] handle
//! raw documents (region chunk payloads); [`decode_document`] and
//! [`encode_compound_document`] add the gzip/zlib wrapping used by
//! standalone NBT files.

use std::io::{ErrorKind, Read, Write};

use flate2::read::{GzDecoder, ZlibDecoder};
use flate2::write::{GzEncoder, ZlibEncoder};
use zerocopy::byteorder::{BigEndian, F32, F64, I16, I32, I64, U16};

use crate::{CodecError, Compound, List, Tag, Value};

/// Recursion bound for hostile input; vanilla data stays far below this.
const MAX_DEPTH: usize = 512;

/// Outer compression of a stored NBT document.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Compression {
    Uncompressed,
    Gzip,
    Zlib,
}

impl Compression {
    /// Region chunk records identify their scheme with one byte.
    pub const fn from_scheme(scheme: u8) -> Option<Self> {
        match scheme {
            1 => Some(Self::Gzip),
            2 => Some(Self::Zlib),
            3 => Some(Self::Uncompressed),
            _ => None,
        }
    }

    pub const fn scheme(self) -> u8 {
        match self {
            Self::Gzip => 1,
            Self::Zlib => 2,
            Self::Uncompressed => 3,
        }
    }

    /// Guess the compression of a stored document from its magic bytes.
    pub fn sniff(data: &[u8]) -> Self {
        match data {
            [0x1f, 0x8b, ..] => Self::Gzip,
            [0x78, ..] => Self::Zlib,
            _ => Self::Uncompressed,
        }
    }
}

/// Read one named tag (a full document) from `reader`.
pub fn read_named_value(reader: &mut impl Read) -> Result<(String, Value), CodecError> {
    let tag = read_tag(reader)?;
    if tag == Tag::End {
        return Err(CodecError::InvalidTagType(Tag::End as u8));
    }
    let name = read_string(reader)?;
    let value = read_payload(reader, tag, 0)?;
    Ok((name, value))
}

/// Write one named tag (a full document) to `writer`.
pub fn write_named_value(
    writer: &mut impl Write,
    name: &str,
    value: &Value,
) -> Result<(), CodecError> {
    writer.write_all(&[value.tag() as u8])?;
    write_string(writer, name)?;
    write_payload(writer, value)
}

/// Document form of [`write_named_value`] for a compound root.
pub fn write_named_compound(
    writer: &mut impl Write,
    name: &str,
    root: &Compound,
) -> Result<(), CodecError> {
    writer.write_all(&[Tag::Compound as u8])?;
    write_string(writer, name)?;
    write_compound_payload(writer, root)
}

/// Sniff the compression of `data`, decompress, and parse the document.
pub fn decode_document(data: &[u8]) -> Result<(Compression, String, Value), CodecError> {
    let compression = Compression::sniff(data);
    let (name, value) = match compression {
        Compression::Uncompressed => read_named_value(&mut &data[..])?,
        Compression::Gzip => read_named_value(&mut GzDecoder::new(data))?,
        Compression::Zlib => read_named_value(&mut ZlibDecoder::new(data))?,
    };
    Ok((compression, name, value))
}

/// Serialize a compound-rooted document with the given outer compression.
pub fn encode_compound_document(
    name: &str,
    root: &Compound,
    compression: Compression,
) -> Result<Vec<u8>, CodecError> {
    match compression {
        Compression::Uncompressed => {
            let mut buf = Vec::new();
            write_named_compound(&mut buf, name, root)?;
            Ok(buf)
        }
        Compression::Gzip => {
            let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
            write_named_compound(&mut encoder, name, root)?;
            encoder.finish().map_err(CodecError::Io)
        }
        Compression::Zlib => {
            let mut encoder = ZlibEncoder::new(Vec::new(), flate2::Compression::default());
            write_named_compound(&mut encoder, name, root)?;
            encoder.finish().map_err(CodecError::Io)
        }
    }
}

fn read_exact<const N: usize>(reader: &mut impl Read) -> Result<[u8; N], CodecError> {
    let mut buf = [0u8; N];
    reader.read_exact(&mut buf).map_err(|e| {
        if e.kind() == ErrorKind::UnexpectedEof {
            CodecError::EndOfFile
        } else {
            CodecError::Io(e)
        }
    })?;
    Ok(buf)
}

fn read_tag(reader: &mut impl Read) -> Result<Tag, CodecError> {
    let [byte] = read_exact::<1>(reader)?;
    Tag::from_u8(byte).ok_or(CodecError::InvalidTagType(byte))
}

fn read_i16(reader: &mut impl Read) -> Result<i16, CodecError> {
    Ok(I16::<BigEndian>::from_bytes(read_exact(reader)?).get())
}

fn read_i32(reader: &mut impl Read) -> Result<i32, CodecError> {
    Ok(I32::<BigEndian>::from_bytes(read_exact(reader)?).get())
}

fn read_i64(reader: &mut impl Read) -> Result<i64, CodecError> {
    Ok(I64::<BigEndian>::from_bytes(read_exact(reader)?).get())
}

fn read_len(reader: &mut impl Read) -> Result<usize, CodecError> {
    let len = read_i32(reader)?;
    usize::try_from(len).map_err(|_| CodecError::InvalidListLength(len))
}

fn read_string(reader: &mut impl Read) -> Result<String, CodecError> {
    let len = U16::<BigEndian>::from_bytes(read_exact(reader)?).get();
    let mut buf = vec![0u8; len as usize];
    reader.read_exact(&mut buf).map_err(|e| {
        if e.kind() == ErrorKind::UnexpectedEof {
            CodecError::EndOfFile
        } else {
            CodecError::Io(e)
        }
    })?;
    Ok(simd_cesu8::mutf8::decode_lossy(&buf).into_owned())
}

fn read_payload(reader: &mut impl Read, tag: Tag, depth: usize) -> Result<Value, CodecError> {
    if depth > MAX_DEPTH {
        return Err(CodecError::DepthLimit(MAX_DEPTH));
    }
    match tag {
        Tag::End => Err(CodecError::InvalidTagType(Tag::End as u8)),
        Tag::Byte => {
            let [byte] = read_exact::<1>(reader)?;
            Ok(Value::Byte(byte as i8))
        }
        Tag::Short => Ok(Value::Short(read_i16(reader)?)),
        Tag::Int => Ok(Value::Int(read_i32(reader)?)),
        Tag::Long => Ok(Value::Long(read_i64(reader)?)),
        Tag::Float => Ok(Value::Float(
            F32::<BigEndian>::from_bytes(read_exact(reader)?).get(),
        )),
        Tag::Double => Ok(Value::Double(
            F64::<BigEndian>::from_bytes(read_exact(reader)?).get(),
        )),
        Tag::ByteArray => {
            let len = read_len(reader)?;
            let mut buf = vec![0u8; len];
            reader.read_exact(&mut buf).map_err(|e| {
                if e.kind() == ErrorKind::UnexpectedEof {
                    CodecError::EndOfFile
                } else {
                    CodecError::Io(e)
                }
            })?;
            Ok(Value::ByteArray(buf.into_iter().map(|b| b as i8).collect()))
        }
        Tag::String => Ok(Value::String(read_string(reader)?)),
        Tag::List => {
            let elem = read_tag(reader)?;
            let len = read_len(reader)?;
            if elem == Tag::End && len > 0 {
                return Err(CodecError::InvalidTagType(Tag::End as u8));
            }
            let mut list = List::new(elem);
            for _ in 0..len {
                let value = read_payload(reader, elem, depth + 1)?;
                // Kind mismatch is impossible: every element parses as `elem`.
                let _ = list.push(value);
            }
            Ok(Value::List(list))
        }
        Tag::Compound => {
            let mut compound = Compound::default();
            loop {
                let member = read_tag(reader)?;
                if member == Tag::End {
                    break;
                }
                let name = read_string(reader)?;
                let value = read_payload(reader, member, depth + 1)?;
                // Last-wins on a duplicate name, matching lenient parsers.
                if compound.contains(&name) {
                    compound.remove(&name);
                }
                let _ = compound.insert(name, value);
            }
            Ok(Value::Compound(compound))
        }
        Tag::IntArray => {
            let len = read_len(reader)?;
            let mut values = Vec::with_capacity(len.min(1 << 16));
            for _ in 0..len {
                values.push(read_i32(reader)?);
            }
            Ok(Value::IntArray(values))
        }
        Tag::LongArray => {
            let len = read_len(reader)?;
            let mut values = Vec::with_capacity(len.min(1 << 16));
            for _ in 0..len {
                values.push(read_i64(reader)?);
            }
            Ok(Value::LongArray(values))
        }
    }
}

fn write_string(writer: &mut impl Write, value: &str) -> Result<(), CodecError> {
    let encoded = simd_cesu8::mutf8::encode(value);
    let len = u16::try_from(encoded.len())
        .map_err(|_| CodecError::Io(ErrorKind::InvalidInput.into()))?;
    writer.write_all(&U16::<BigEndian>::new(len).to_bytes())?;
    writer.write_all(&encoded)?;
    Ok(())
}

fn write_compound_payload(writer: &mut impl Write, compound: &Compound) -> Result<(), CodecError> {
    for (name, value) in compound.iter() {
        writer.write_all(&[value.tag() as u8])?;
        write_string(writer, name)?;
        write_payload(writer, value)?;
    }
    writer.write_all(&[Tag::End as u8])?;
    Ok(())
}

fn write_payload(writer: &mut impl Write, value: &Value) -> Result<(), CodecError> {
    match value {
        Value::Byte(v) => writer.write_all(&[*v as u8])?,
        Value::Short(v) => writer.write_all(&I16::<BigEndian>::new(*v).to_bytes())?,
        Value::Int(v) => writer.write_all(&I32::<BigEndian>::new(*v).to_bytes())?,
        Value::Long(v) => writer.write_all(&I64::<BigEndian>::new(*v).to_bytes())?,
        Value::Float(v) => writer.write_all(&F32::<BigEndian>::new(*v).to_bytes())?,
        Value::Double(v) => writer.write_all(&F64::<BigEndian>::new(*v).to_bytes())?,
        Value::ByteArray(v) => {
            write_array_len(writer, v.len())?;
            for byte in v {
                writer.write_all(&[*byte as u8])?;
            }
        }
        Value::String(v) => write_string(writer, v)?,
        Value::List(v) => {
            writer.write_all(&[v.elem_tag() as u8])?;
            write_array_len(writer, v.len())?;
            for item in v.iter() {
                write_payload(writer, item)?;
            }
        }
        Value::Compound(v) => write_compound_payload(writer, v)?,
        Value::IntArray(v) => {
            write_array_len(writer, v.len())?;
            for item in v {
                writer.write_all(&I32::<BigEndian>::new(*item).to_bytes())?;
            }
        }
        Value::LongArray(v) => {
            write_array_len(writer, v.len())?;
            for item in v {
                writer.write_all(&I64::<BigEndian>::new(*item).to_bytes())?;
            }
        }
    }
    Ok(())
}

fn write_array_len(writer: &mut impl Write, len: usize) -> Result<(), CodecError> {
    let len = i32::try_from(len).map_err(|_| CodecError::Io(ErrorKind::InvalidInput.into()))?;
    writer.write_all(&I32::<BigEndian>::new(len).to_bytes())?;
    Ok(())
}
