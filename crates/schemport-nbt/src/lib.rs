use byteorder::{ByteOrder, ReadBytesExt, WriteBytesExt};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{self, Read, Write};

/// Maximum compound/list nesting accepted from untrusted input. Deeper trees
/// are rejected rather than risking a stack overflow during recursion.
pub const MAX_NESTING_DEPTH: usize = 512;

/// Cap on speculative pre-allocation for length-prefixed payloads. Reads past
/// this still work; the vector just grows as elements actually arrive, so a
/// forged length cannot reserve gigabytes up front.
const PREALLOC_CAP: usize = 64 * 1024;

fn invalid_data<E: Into<Box<dyn std::error::Error + Send + Sync>>>(err: E) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, err)
}

fn checked_len(length: i32) -> io::Result<usize> {
    usize::try_from(length).map_err(|_| invalid_data(format!("negative length: {}", length)))
}

/// True if the buffer starts with the gzip magic bytes.
pub fn is_gzip(bytes: &[u8]) -> bool {
    bytes.len() >= 2 && bytes[0] == 0x1F && bytes[1] == 0x8B
}

/// Insertion-ordered string-keyed map of child tags. NBT semantically permits
/// any key order, but the structure formats are inspected by humans and other
/// tools, so writing preserves the order keys were inserted in.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Compound {
    entries: Vec<(String, Tag)>,
}

impl Compound {
    pub fn new() -> Self {
        Compound { entries: Vec::new() }
    }

    /// Inserts a tag, replacing any existing entry with the same name in
    /// place (the original position is kept).
    pub fn insert(&mut self, name: impl Into<String>, tag: Tag) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = tag,
            None => self.entries.push((name, tag)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Tag> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, tag)| tag)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, Tag)> {
        self.entries.iter()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Tag {
    End,
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    ByteArray(Vec<i8>),
    String(String),
    List(Vec<Tag>),
    Compound(Compound),
    IntArray(Vec<i32>),
    LongArray(Vec<i64>),
}

impl Tag {
    pub fn get_type_id(&self) -> u8 {
        match self {
            Tag::End => 0,
            Tag::Byte(_) => 1,
            Tag::Short(_) => 2,
            Tag::Int(_) => 3,
            Tag::Long(_) => 4,
            Tag::Float(_) => 5,
            Tag::Double(_) => 6,
            Tag::ByteArray(_) => 7,
            Tag::String(_) => 8,
            Tag::List(_) => 9,
            Tag::Compound(_) => 10,
            Tag::IntArray(_) => 11,
            Tag::LongArray(_) => 12,
        }
    }

    /// Reads one named tag in byte order `E`. Java-edition formats use
    /// `BigEndian`, Bedrock uses `LittleEndian`.
    pub fn read<R: Read, E: ByteOrder>(reader: &mut R) -> io::Result<(String, Tag)> {
        Self::read_named::<R, E>(reader, 0)
    }

    fn read_named<R: Read, E: ByteOrder>(reader: &mut R, depth: usize) -> io::Result<(String, Tag)> {
        let type_id = reader.read_u8()?;
        if type_id == 0 {
            return Ok(("".to_owned(), Tag::End));
        }

        let name = Self::read_string::<R, E>(reader)?;
        let tag = Self::read_payload::<R, E>(reader, type_id, depth)?;
        Ok((name, tag))
    }

    fn read_string<R: Read, E: ByteOrder>(reader: &mut R) -> io::Result<String> {
        let length = reader.read_u16::<E>()?;
        let mut bytes = vec![0u8; length as usize];
        reader.read_exact(&mut bytes)?;
        String::from_utf8(bytes).map_err(invalid_data)
    }

    fn read_payload<R: Read, E: ByteOrder>(
        reader: &mut R,
        type_id: u8,
        depth: usize,
    ) -> io::Result<Tag> {
        if depth > MAX_NESTING_DEPTH {
            return Err(invalid_data("NBT nesting too deep"));
        }

        match type_id {
            0 => Ok(Tag::End),
            1 => Ok(Tag::Byte(reader.read_i8()?)),
            2 => Ok(Tag::Short(reader.read_i16::<E>()?)),
            3 => Ok(Tag::Int(reader.read_i32::<E>()?)),
            4 => Ok(Tag::Long(reader.read_i64::<E>()?)),
            5 => Ok(Tag::Float(reader.read_f32::<E>()?)),
            6 => Ok(Tag::Double(reader.read_f64::<E>()?)),
            7 => {
                let length = checked_len(reader.read_i32::<E>()?)?;
                let mut bytes = Vec::with_capacity(length.min(PREALLOC_CAP));
                for _ in 0..length {
                    bytes.push(reader.read_i8()?);
                }
                Ok(Tag::ByteArray(bytes))
            }
            8 => Self::read_string::<R, E>(reader).map(Tag::String),
            9 => {
                let list_type = reader.read_u8()?;
                let length = checked_len(reader.read_i32::<E>()?)?;
                if list_type == 0 && length > 0 {
                    return Err(invalid_data("non-empty list of TAG_End"));
                }
                let mut list = Vec::with_capacity(length.min(PREALLOC_CAP));
                for _ in 0..length {
                    list.push(Self::read_payload::<R, E>(reader, list_type, depth + 1)?);
                }
                Ok(Tag::List(list))
            }
            10 => {
                let mut compound = Compound::new();
                loop {
                    let (name, tag) = Self::read_named::<R, E>(reader, depth + 1)?;
                    if let Tag::End = tag {
                        break;
                    }
                    compound.insert(name, tag);
                }
                Ok(Tag::Compound(compound))
            }
            11 => {
                let length = checked_len(reader.read_i32::<E>()?)?;
                let mut ints = Vec::with_capacity(length.min(PREALLOC_CAP));
                for _ in 0..length {
                    ints.push(reader.read_i32::<E>()?);
                }
                Ok(Tag::IntArray(ints))
            }
            12 => {
                let length = checked_len(reader.read_i32::<E>()?)?;
                let mut longs = Vec::with_capacity(length.min(PREALLOC_CAP));
                for _ in 0..length {
                    longs.push(reader.read_i64::<E>()?);
                }
                Ok(Tag::LongArray(longs))
            }
            _ => Err(invalid_data(format!("invalid tag type: {}", type_id))),
        }
    }

    /// Writes this tag with a name header in byte order `E`.
    pub fn write<W: Write, E: ByteOrder>(&self, writer: &mut W, name: &str) -> io::Result<()> {
        writer.write_u8(self.get_type_id())?;

        if !matches!(self, Tag::End) {
            Self::write_string::<W, E>(writer, name)?;
        }

        self.write_payload::<W, E>(writer)
    }

    fn write_string<W: Write, E: ByteOrder>(writer: &mut W, value: &str) -> io::Result<()> {
        let bytes = value.as_bytes();
        if bytes.len() > u16::MAX as usize {
            return Err(invalid_data("string too long for NBT"));
        }
        writer.write_u16::<E>(bytes.len() as u16)?;
        writer.write_all(bytes)
    }

    fn write_payload<W: Write, E: ByteOrder>(&self, writer: &mut W) -> io::Result<()> {
        match self {
            Tag::End => Ok(()),
            Tag::Byte(v) => writer.write_i8(*v),
            Tag::Short(v) => writer.write_i16::<E>(*v),
            Tag::Int(v) => writer.write_i32::<E>(*v),
            Tag::Long(v) => writer.write_i64::<E>(*v),
            Tag::Float(v) => writer.write_f32::<E>(*v),
            Tag::Double(v) => writer.write_f64::<E>(*v),
            Tag::ByteArray(v) => {
                writer.write_i32::<E>(v.len() as i32)?;
                for &b in v {
                    writer.write_i8(b)?;
                }
                Ok(())
            }
            Tag::String(v) => Self::write_string::<W, E>(writer, v),
            Tag::List(v) => {
                if v.is_empty() {
                    writer.write_u8(0)?; // TAG_End for empty lists
                } else {
                    writer.write_u8(v[0].get_type_id())?;
                }
                writer.write_i32::<E>(v.len() as i32)?;
                for tag in v {
                    tag.write_payload::<W, E>(writer)?;
                }
                Ok(())
            }
            Tag::Compound(v) => {
                for (name, tag) in v.iter() {
                    tag.write::<W, E>(writer, name)?;
                }
                Tag::End.write::<W, E>(writer, "")?;
                Ok(())
            }
            Tag::IntArray(v) => {
                writer.write_i32::<E>(v.len() as i32)?;
                for &i in v {
                    writer.write_i32::<E>(i)?;
                }
                Ok(())
            }
            Tag::LongArray(v) => {
                writer.write_i32::<E>(v.len() as i32)?;
                for &l in v {
                    writer.write_i64::<E>(l)?;
                }
                Ok(())
            }
        }
    }

    pub fn as_compound(&self) -> Option<&Compound> {
        match self {
            Tag::Compound(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&Vec<Tag>> {
        match self {
            Tag::List(list) => Some(list),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Tag::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Tag::Long(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Tag::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_i16(&self) -> Option<i16> {
        match self {
            Tag::Short(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_i8(&self) -> Option<i8> {
        match self {
            Tag::Byte(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_byte_array(&self) -> Option<&[i8]> {
        match self {
            Tag::ByteArray(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_int_array(&self) -> Option<&[i32]> {
        match self {
            Tag::IntArray(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_long_array(&self) -> Option<&[i64]> {
        match self {
            Tag::LongArray(v) => Some(v),
            _ => None,
        }
    }
}

/// A complete NBT document: one named root tag, optionally gzip-wrapped.
pub struct NbtFile {
    pub root: Tag,
    pub name: String,
}

impl NbtFile {
    pub fn new(name: impl Into<String>, root: Tag) -> Self {
        NbtFile {
            root,
            name: name.into(),
        }
    }

    pub fn read<R: Read, E: ByteOrder>(reader: &mut R) -> io::Result<Self> {
        let (name, root) = Tag::read::<R, E>(reader)?;
        Ok(NbtFile { root, name })
    }

    pub fn write<W: Write, E: ByteOrder>(&self, writer: &mut W) -> io::Result<()> {
        self.root.write::<W, E>(writer, &self.name)
    }

    pub fn read_gzip<R: Read, E: ByteOrder>(reader: &mut R) -> io::Result<Self> {
        let mut decoder = GzDecoder::new(reader);
        Self::read::<_, E>(&mut decoder)
    }

    pub fn write_gzip<W: Write, E: ByteOrder>(&self, writer: &mut W) -> io::Result<()> {
        let mut encoder = GzEncoder::new(writer, Compression::default());
        self.write::<_, E>(&mut encoder)?;
        encoder.finish()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use byteorder::{BigEndian, LittleEndian};
    use std::io::Cursor;

    #[test]
    fn test_tag_type_ids() {
        assert_eq!(Tag::End.get_type_id(), 0);
        assert_eq!(Tag::Byte(0).get_type_id(), 1);
        assert_eq!(Tag::Short(0).get_type_id(), 2);
        assert_eq!(Tag::Int(0).get_type_id(), 3);
        assert_eq!(Tag::Long(0).get_type_id(), 4);
        assert_eq!(Tag::Float(0.0).get_type_id(), 5);
        assert_eq!(Tag::Double(0.0).get_type_id(), 6);
        assert_eq!(Tag::ByteArray(vec![]).get_type_id(), 7);
        assert_eq!(Tag::String("".to_string()).get_type_id(), 8);
        assert_eq!(Tag::List(vec![]).get_type_id(), 9);
        assert_eq!(Tag::Compound(Compound::new()).get_type_id(), 10);
        assert_eq!(Tag::IntArray(vec![]).get_type_id(), 11);
        assert_eq!(Tag::LongArray(vec![]).get_type_id(), 12);
    }

    #[test]
    fn test_tag_read_write_both_endians() {
        let test_cases = vec![
            (Tag::Byte(42), "byte"),
            (Tag::Short(1234), "short"),
            (Tag::Int(12345678), "int"),
            (Tag::Long(123456789012), "long"),
            (Tag::Float(3.14), "float"),
            (Tag::Double(3.14159), "double"),
            (Tag::ByteArray(vec![1, 2, 3]), "bytearray"),
            (Tag::String("Hello, World!".to_string()), "string"),
            (
                Tag::List(vec![Tag::Int(1), Tag::Int(2), Tag::Int(3)]),
                "list",
            ),
            (Tag::IntArray(vec![1, 2, 3]), "intarray"),
            (Tag::LongArray(vec![1, 2, 3]), "longarray"),
        ];

        for (tag, name) in test_cases {
            let mut be = Vec::new();
            tag.write::<_, BigEndian>(&mut be, name).unwrap();
            let (read_name, read_tag) = Tag::read::<_, BigEndian>(&mut Cursor::new(&be)).unwrap();
            assert_eq!(read_name, name);
            assert_eq!(read_tag, tag);

            let mut le = Vec::new();
            tag.write::<_, LittleEndian>(&mut le, name).unwrap();
            let (read_name, read_tag) = Tag::read::<_, LittleEndian>(&mut Cursor::new(&le)).unwrap();
            assert_eq!(read_name, name);
            assert_eq!(read_tag, tag);
        }
    }

    #[test]
    fn test_endianness_changes_the_bytes() {
        let mut be = Vec::new();
        Tag::Int(1).write::<_, BigEndian>(&mut be, "n").unwrap();
        let mut le = Vec::new();
        Tag::Int(1).write::<_, LittleEndian>(&mut le, "n").unwrap();
        assert_ne!(be, le);
    }

    #[test]
    fn test_compound_preserves_insertion_order() {
        let mut compound = Compound::new();
        compound.insert("zebra", Tag::Int(1));
        compound.insert("apple", Tag::Int(2));
        compound.insert("mango", Tag::Int(3));
        compound.insert("apple", Tag::Int(4)); // replace keeps position

        let tag = Tag::Compound(compound);
        let mut buffer = Vec::new();
        tag.write::<_, BigEndian>(&mut buffer, "root").unwrap();

        let (_, read_tag) = Tag::read::<_, BigEndian>(&mut Cursor::new(&buffer)).unwrap();
        let keys: Vec<&str> = read_tag
            .as_compound()
            .unwrap()
            .iter()
            .map(|(k, _)| k.as_str())
            .collect();
        assert_eq!(keys, vec!["zebra", "apple", "mango"]);
        assert_eq!(read_tag.as_compound().unwrap().get("apple"), Some(&Tag::Int(4)));
    }

    #[test]
    fn test_invalid_tag_type() {
        let buffer = vec![255u8, 0, 1, b'x', 0];
        let result = Tag::read::<_, BigEndian>(&mut Cursor::new(&buffer));
        assert_matches!(result, Err(e) if e.kind() == io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_truncated_buffer_errors() {
        let mut buffer = Vec::new();
        Tag::Int(7).write::<_, BigEndian>(&mut buffer, "n").unwrap();
        buffer.truncate(buffer.len() - 2);
        let result = Tag::read::<_, BigEndian>(&mut Cursor::new(&buffer));
        assert_matches!(result, Err(e) if e.kind() == io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_forged_array_length_does_not_allocate() {
        // Claims an i32::MAX-long int array with no payload behind it.
        let mut buffer = vec![11u8, 0, 1, b'a'];
        buffer.extend_from_slice(&i32::MAX.to_be_bytes());
        assert!(Tag::read::<_, BigEndian>(&mut Cursor::new(&buffer)).is_err());
    }

    #[test]
    fn test_negative_array_length_errors() {
        let mut buffer = vec![7u8, 0, 1, b'a'];
        buffer.extend_from_slice(&(-1i32).to_be_bytes());
        let result = Tag::read::<_, BigEndian>(&mut Cursor::new(&buffer));
        assert_matches!(result, Err(e) if e.kind() == io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_negative_list_length_errors() {
        // List of ints claiming -1 entries.
        let mut buffer = vec![9u8, 0, 1, b'a', 3];
        buffer.extend_from_slice(&(-1i32).to_be_bytes());
        let result = Tag::read::<_, BigEndian>(&mut Cursor::new(&buffer));
        assert_matches!(result, Err(e) if e.kind() == io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_nesting_depth_limit() {
        let mut tag = Tag::Compound(Compound::new());
        for _ in 0..(MAX_NESTING_DEPTH + 8) {
            let mut outer = Compound::new();
            outer.insert("c", tag);
            tag = Tag::Compound(outer);
        }

        let mut buffer = Vec::new();
        tag.write::<_, BigEndian>(&mut buffer, "root").unwrap();
        assert!(Tag::read::<_, BigEndian>(&mut Cursor::new(&buffer)).is_err());
    }

    #[test]
    fn test_empty_list() {
        let tag = Tag::List(vec![]);
        let mut buffer = Vec::new();
        tag.write::<_, BigEndian>(&mut buffer, "empty").unwrap();

        let (name, read_tag) = Tag::read::<_, BigEndian>(&mut Cursor::new(&buffer)).unwrap();
        assert_eq!(name, "empty");
        assert_eq!(read_tag, tag);
    }

    #[test]
    fn test_nbt_file_gzip_round_trip() {
        let mut compound = Compound::new();
        compound.insert("name", Tag::String("Test".to_string()));
        compound.insert("value", Tag::Int(42));
        let original = NbtFile::new("test", Tag::Compound(compound));

        let mut plain = Vec::new();
        original.write::<_, BigEndian>(&mut plain).unwrap();
        let read = NbtFile::read::<_, BigEndian>(&mut Cursor::new(&plain)).unwrap();
        assert_eq!(read.name, original.name);
        assert_eq!(read.root, original.root);

        let mut gz = Vec::new();
        original.write_gzip::<_, BigEndian>(&mut gz).unwrap();
        assert!(is_gzip(&gz));
        let read = NbtFile::read_gzip::<_, BigEndian>(&mut Cursor::new(&gz)).unwrap();
        assert_eq!(read.name, original.name);
        assert_eq!(read.root, original.root);
    }
}
