//! Node wire format
//!
//! Encoding and decoding of [`Node`]s for stream-oriented backends.
//!
//! ## Wire Format
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │ Header: six big-endian u32s (24 bytes)                    │
//! │ ┌─────────┬────────┬────────────┬───────┬───────┬───────┐ │
//! │ │ChildCap │DataCap │AncestorCap │#Child │#Data  │#Anc   │ │
//! │ └─────────┴────────┴────────────┴───────┴───────┴───────┘ │
//! ├───────────────────────────────────────────────────────────┤
//! │ Children: #Child length-prefixed byte arrays              │
//! │ ┌──────────────┬──────────────┐                           │
//! │ │ Len (4, BE)  │    Bytes     │  ... repeated             │
//! │ └──────────────┴──────────────┘                           │
//! ├───────────────────────────────────────────────────────────┤
//! │ Data:      #Data  length-prefixed byte arrays             │
//! ├───────────────────────────────────────────────────────────┤
//! │ Ancestors: #Anc   length-prefixed byte arrays             │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! Any short read is a fatal format error, as is a negative length or count.
//! Key encoding is delegated to the caller so backends choose their own key
//! representation.

use std::io::{Read, Write};

use crate::error::{CanopyError, Result};

use super::Node;

/// Header size: six 4-byte integers
const HEADER_SIZE: usize = 4 * 6;

/// Write a node to a stream.
///
/// `encode_user` and `encode_store` turn keys into raw bytes; each encoded
/// key is written with a 4-byte big-endian length prefix.
pub fn write_node<K, SK, W>(
    writer: &mut W,
    node: &Node<K, SK>,
    encode_user: impl Fn(&K) -> Result<Vec<u8>>,
    encode_store: impl Fn(&SK) -> Result<Vec<u8>>,
) -> Result<()>
where
    W: Write,
{
    let mut header = [0u8; HEADER_SIZE];
    write_header_field(&mut header, 0, node.child_cap())?;
    write_header_field(&mut header, 1, node.data_cap())?;
    write_header_field(&mut header, 2, node.ancestor_cap())?;
    write_header_field(&mut header, 3, node.children().len())?;
    write_header_field(&mut header, 4, node.data().len())?;
    write_header_field(&mut header, 5, node.ancestors().len())?;
    writer.write_all(&header)?;

    for key in node.children() {
        write_length_value(writer, &encode_store(key)?)?;
    }
    for key in node.data() {
        write_length_value(writer, &encode_user(key)?)?;
    }
    for key in node.ancestors() {
        write_length_value(writer, &encode_store(key)?)?;
    }

    Ok(())
}

/// Read a node from a stream.
///
/// The inverse of [`write_node`]; `decode_user` and `decode_store` rebuild
/// keys from the length-prefixed byte arrays.
pub fn read_node<K, SK, R>(
    reader: &mut R,
    decode_user: impl Fn(&[u8]) -> Result<K>,
    decode_store: impl Fn(&[u8]) -> Result<SK>,
) -> Result<Node<K, SK>>
where
    R: Read,
{
    let mut header = [0u8; HEADER_SIZE];
    must_read(reader, &mut header)?;

    let child_cap = read_header_field(&header, 0)?;
    let data_cap = read_header_field(&header, 1)?;
    let ancestor_cap = read_header_field(&header, 2)?;
    let child_count = read_header_field(&header, 3)?;
    let data_count = read_header_field(&header, 4)?;
    let ancestor_count = read_header_field(&header, 5)?;

    let mut node = Node::new(child_cap, data_cap, ancestor_cap);

    for _ in 0..child_count {
        let bytes = must_read_length_value(reader)?;
        node.children_mut().push(decode_store(&bytes)?);
    }
    for _ in 0..data_count {
        let bytes = must_read_length_value(reader)?;
        node.data_mut().push(decode_user(&bytes)?);
    }
    for _ in 0..ancestor_count {
        let bytes = must_read_length_value(reader)?;
        node.ancestors_mut().push(decode_store(&bytes)?);
    }

    Ok(node)
}

// =============================================================================
// Framing Helpers
// =============================================================================

fn write_header_field(header: &mut [u8; HEADER_SIZE], slot: usize, value: usize) -> Result<()> {
    let value = i32::try_from(value)
        .map_err(|_| CanopyError::Codec(format!("header field {} too large: {}", slot, value)))?;
    header[slot * 4..slot * 4 + 4].copy_from_slice(&value.to_be_bytes());
    Ok(())
}

fn read_header_field(header: &[u8; HEADER_SIZE], slot: usize) -> Result<usize> {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&header[slot * 4..slot * 4 + 4]);
    let value = i32::from_be_bytes(buf);
    if value < 0 {
        return Err(CanopyError::Codec(format!(
            "header field {} is negative: {}",
            slot, value
        )));
    }
    Ok(value as usize)
}

/// Write a 4-byte big-endian length followed by the bytes themselves.
fn write_length_value<W: Write>(writer: &mut W, bytes: &[u8]) -> Result<()> {
    let len = i32::try_from(bytes.len())
        .map_err(|_| CanopyError::Codec(format!("encoded key too large: {} bytes", bytes.len())))?;
    writer.write_all(&len.to_be_bytes())?;
    writer.write_all(bytes)?;
    Ok(())
}

/// Read a 4-byte big-endian length and then that many bytes.
fn must_read_length_value<R: Read>(reader: &mut R) -> Result<Vec<u8>> {
    let mut len_buf = [0u8; 4];
    must_read(reader, &mut len_buf)?;
    let len = i32::from_be_bytes(len_buf);
    if len < 0 {
        return Err(CanopyError::Codec(format!(
            "encoded length was negative: {}",
            len
        )));
    }
    let mut bytes = vec![0u8; len as usize];
    must_read(reader, &mut bytes)?;
    Ok(bytes)
}

/// Fill the buffer completely or fail; a short read is a format error.
fn must_read<R: Read>(reader: &mut R, buffer: &mut [u8]) -> Result<()> {
    reader.read_exact(buffer).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            CanopyError::Codec(format!(
                "stream ended before {} bytes could be read",
                buffer.len()
            ))
        } else {
            CanopyError::Io(e)
        }
    })
}
