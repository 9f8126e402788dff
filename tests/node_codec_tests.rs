//! Tests for the binary node wire format
//!
//! These tests verify:
//! - The exact header and length-prefix layout
//! - Round-tripping through the codec
//! - Fatal handling of short reads and negative lengths

use canopykv::node::{read_node, write_node};
use canopykv::{CanopyError, Node};

// =============================================================================
// Helper Functions
// =============================================================================

fn encode_str(s: &String) -> canopykv::Result<Vec<u8>> {
    Ok(s.as_bytes().to_vec())
}

fn decode_str(bytes: &[u8]) -> canopykv::Result<String> {
    String::from_utf8(bytes.to_vec()).map_err(|e| CanopyError::Codec(e.to_string()))
}

fn sample_node() -> Node<String, String> {
    let mut node = Node::new(4, 3, 1);
    node.children_mut().push("ab".to_string());
    node.data_mut().push("x".to_string());
    node.data_mut().push("yz".to_string());
    node
}

fn encode(node: &Node<String, String>) -> Vec<u8> {
    let mut buffer = Vec::new();
    write_node(&mut buffer, node, encode_str, encode_str).unwrap();
    buffer
}

// =============================================================================
// Layout
// =============================================================================

#[test]
fn test_header_is_six_big_endian_u32s() {
    let buffer = encode(&sample_node());

    // Capacities: child 4, data 3, ancestor 1. Counts: 1 child, 2 data,
    // 0 ancestors.
    let expected_header = [
        0, 0, 0, 4, // child capacity
        0, 0, 0, 3, // data capacity
        0, 0, 0, 1, // ancestor capacity
        0, 0, 0, 1, // child count
        0, 0, 0, 2, // data count
        0, 0, 0, 0, // ancestor count
    ];
    assert_eq!(&buffer[..24], &expected_header[..]);
}

#[test]
fn test_entries_are_length_prefixed_in_section_order() {
    let buffer = encode(&sample_node());

    // Children first, then data; each entry is a 4-byte big-endian length
    // and the raw bytes.
    let expected_body = [
        0, 0, 0, 2, b'a', b'b', // child "ab"
        0, 0, 0, 1, b'x', // data "x"
        0, 0, 0, 2, b'y', b'z', // data "yz"
    ];
    assert_eq!(&buffer[24..], &expected_body[..]);
    assert_eq!(buffer.len(), 24 + 6 + 5 + 6);
}

#[test]
fn test_round_trip() {
    let node = sample_node();
    let buffer = encode(&node);

    let mut reader = buffer.as_slice();
    let decoded: Node<String, String> = read_node(&mut reader, decode_str, decode_str).unwrap();

    assert_eq!(decoded, node);
    assert_eq!(decoded.data_cap(), 3);
    assert_eq!(decoded.child_cap(), 4);
    assert_eq!(decoded.ancestor_cap(), 1);
}

// =============================================================================
// Failure Modes
// =============================================================================

#[test]
fn test_truncated_header_is_a_codec_error() {
    let buffer = encode(&sample_node());

    let mut short = &buffer[..10];
    let err = read_node::<String, String, _>(&mut short, decode_str, decode_str)
        .err()
        .expect("short header must fail");
    assert!(matches!(err, CanopyError::Codec(_)));
}

#[test]
fn test_truncated_entry_is_a_codec_error() {
    let buffer = encode(&sample_node());

    // Cut inside the final entry's bytes.
    let cut = buffer.len() - 1;
    let mut short = &buffer[..cut];
    let err = read_node::<String, String, _>(&mut short, decode_str, decode_str)
        .err()
        .expect("short entry must fail");
    assert!(matches!(err, CanopyError::Codec(_)));
}

#[test]
fn test_negative_length_prefix_is_a_codec_error() {
    let mut buffer = encode(&sample_node());

    // Overwrite the first child's length prefix with -1.
    buffer[24..28].copy_from_slice(&(-1i32).to_be_bytes());

    let mut reader = buffer.as_slice();
    let err = read_node::<String, String, _>(&mut reader, decode_str, decode_str)
        .err()
        .expect("negative length must fail");
    assert!(matches!(err, CanopyError::Codec(_)));
}

#[test]
fn test_negative_count_is_a_codec_error() {
    let mut buffer = encode(&sample_node());

    // Overwrite the data count with -2.
    buffer[16..20].copy_from_slice(&(-2i32).to_be_bytes());

    let mut reader = buffer.as_slice();
    let err = read_node::<String, String, _>(&mut reader, decode_str, decode_str)
        .err()
        .expect("negative count must fail");
    assert!(matches!(err, CanopyError::Codec(_)));
}
