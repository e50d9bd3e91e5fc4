//! Tests for streaming a tree to records and rebuilding it

use std::collections::BTreeMap;
use std::io::Read;
use std::thread;

use rowtree::config::Settings;
use rowtree::stream::CodecError;
use rowtree::util::testing;
use rowtree::{JsonCodec, NodeId, Order, StreamError, Tree};
use rstest::rstest;
use serde::{ser, Deserialize, Serialize, Serializer};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Listing {
    some_data: String,
    other_data: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Payload {
    Listing(Listing),
    Labels(BTreeMap<String, String>),
    Nested { listing: Listing, extra: String },
    Text(String),
    Number(i64),
}

/// Serializes only while `fail` is false.
#[derive(Debug, Clone, Deserialize)]
struct Flaky {
    fail: bool,
}

impl Serialize for Flaky {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.fail {
            return Err(ser::Error::custom("payload refuses to serialize"));
        }
        serializer.serialize_bool(self.fail)
    }
}

fn sample() -> Tree<Payload> {
    testing::init_test_setup();
    let mut tree = Tree::new();
    tree.add(
        1,
        0,
        Payload::Listing(Listing {
            some_data: "valuable data".into(),
            other_data: (1..=8).collect(),
        }),
    );
    tree.add(
        2,
        1,
        Payload::Labels(BTreeMap::from([
            ("us".to_string(), "good".to_string()),
            ("them".to_string(), "bad".to_string()),
        ])),
    );
    tree.add(
        3,
        2,
        Payload::Nested {
            listing: Listing {
                some_data: "first".into(),
                other_data: vec![1],
            },
            extra: "second".into(),
        },
    );
    tree.add(4, 1, Payload::Text("Plain ol' data".into()));
    tree.add(5, 4, Payload::Number(1234));
    tree
}

fn round_trip(
    tree: &Tree<Payload>,
    order: Order,
    codec: JsonCodec<Payload>,
    capacity: usize,
) -> (Tree<Payload>, usize) {
    thread::scope(|s| {
        let (reader, done) = tree.serialize_buffered(s, order, codec, capacity);
        let rebuilt = Tree::deserialize(reader, &codec).expect("deserialize");
        let written = done.wait().expect("serialize");
        (rebuilt, written)
    })
}

fn assert_same(rebuilt: &Tree<Payload>, original: &Tree<Payload>) {
    assert_eq!(rebuilt.keys(Order::BreadthFirst), original.keys(Order::BreadthFirst));
    assert_eq!(rebuilt.keys(Order::DepthFirst), original.keys(Order::DepthFirst));
    for node in original.bfs() {
        let copy = rebuilt.find(node.id()).expect("node rebuilt");
        assert_eq!(copy.data(), node.data());
        assert_eq!(copy.parent_id(), node.parent_id());
    }
}

#[rstest]
#[case::breadth_first_json_lines(Order::BreadthFirst, JsonCodec::json_lines())]
#[case::depth_first_json_lines(Order::DepthFirst, JsonCodec::json_lines())]
#[case::breadth_first_length_delimited(Order::BreadthFirst, JsonCodec::length_delimited())]
#[case::depth_first_length_delimited(Order::DepthFirst, JsonCodec::length_delimited())]
fn given_tree_when_round_tripping_then_rebuilds_same_shape(
    #[case] order: Order,
    #[case] codec: JsonCodec<Payload>,
) {
    let tree = sample();
    let (rebuilt, written) = round_trip(&tree, order, codec, 0);
    assert_eq!(written, 5);
    assert_eq!(rebuilt.keys(Order::BreadthFirst), vec![1, 2, 4, 3, 5]);
    assert_eq!(rebuilt.keys(Order::DepthFirst), vec![1, 2, 3, 4, 5]);
    assert_same(&rebuilt, &tree);
}

#[rstest]
#[case::breadth_first(Order::BreadthFirst)]
#[case::depth_first(Order::DepthFirst)]
fn given_empty_tree_when_round_tripping_then_rebuilds_empty_tree(#[case] order: Order) {
    let tree: Tree<Payload> = Tree::new();
    let (rebuilt, written) = round_trip(&tree, order, JsonCodec::json_lines(), 0);
    assert_eq!(written, 0);
    assert!(rebuilt.is_empty());
}

#[test]
fn given_settings_when_round_tripping_then_uses_configured_stream() {
    let settings = Settings::from_toml_str(
        r#"
[stream]
order = "depth-first"
framing = "length-delimited"
channel_capacity = 4
"#,
    )
    .expect("parse settings");
    let tree = sample();
    let stream = &settings.stream;
    let (rebuilt, written) = round_trip(&tree, stream.order, stream.codec(), stream.channel_capacity);
    assert_eq!(written, 5);
    assert_same(&rebuilt, &tree);
}

#[test]
fn given_tree_when_writing_records_then_emits_one_line_per_node_in_order() {
    let tree = sample();
    let mut out = Vec::new();
    let written = tree
        .write_records(Order::DepthFirst, &JsonCodec::json_lines(), &mut out)
        .expect("write records");
    assert_eq!(written, 5);

    let text = String::from_utf8(out).unwrap();
    let ids: Vec<NodeId> = text
        .lines()
        .map(|line| serde_json::from_str::<serde_json::Value>(line).unwrap())
        .map(|value| value["id"].as_u64().unwrap())
        .collect();
    assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    assert!(text.lines().next().unwrap().contains("\"parentID\":0"));
}

#[test]
fn given_records_out_of_order_when_deserializing_then_add_reassembles_tree() {
    testing::init_test_setup();
    let mut chain = Tree::new();
    for id in 1..=5u64 {
        chain.add(id, id - 1, Payload::Number(id as i64));
    }
    let mut out = Vec::new();
    chain
        .write_records(Order::DepthFirst, &JsonCodec::json_lines(), &mut out)
        .unwrap();
    let text = String::from_utf8(out).unwrap();
    let reversed: String = text.lines().rev().map(|line| format!("{line}\n")).collect();

    let rebuilt =
        Tree::deserialize(reversed.as_bytes(), &JsonCodec::<Payload>::json_lines()).unwrap();

    assert_eq!(rebuilt.root().unwrap().id(), 1);
    assert_eq!(rebuilt.keys(Order::DepthFirst), vec![1, 2, 3, 4, 5]);
}

#[test]
fn given_unserializable_payload_when_serializing_then_completion_reports_error() {
    testing::init_test_setup();
    let mut tree = Tree::new();
    tree.add(1, 0, Flaky { fail: false });
    tree.add(2, 1, Flaky { fail: true });
    tree.add(3, 1, Flaky { fail: false });

    let (bytes, outcome) = thread::scope(|s| {
        let (mut reader, done) =
            tree.serialize(s, Order::BreadthFirst, JsonCodec::<Flaky>::json_lines());
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes).expect("read stream");
        (bytes, done.wait())
    });

    match outcome {
        Err(StreamError::Encode {
            id,
            source: CodecError::Json(_),
        }) => assert_eq!(id, 2),
        other => panic!("expected encode error, got {other:?}"),
    }
    // The record before the failure was already delivered.
    let text = String::from_utf8(bytes).unwrap();
    assert_eq!(text.lines().count(), 1);
    assert!(text.starts_with("{\"id\":1,"));
}

#[test]
fn given_malformed_record_when_deserializing_then_returns_wrapped_error() {
    testing::init_test_setup();
    let input = "{\"id\":1,\"parentID\":0,\"data\":{\"Text\":\"a\"}}\nnot json\n";
    let result = Tree::deserialize(input.as_bytes(), &JsonCodec::<Payload>::json_lines());
    match result {
        Err(StreamError::Decode { record, source }) => {
            assert_eq!(record, 1);
            assert!(matches!(source, CodecError::Json(_)));
        }
        other => panic!("expected decode error, got {:?}", other.map(|t| t.len())),
    }
}

#[test]
fn given_truncated_frame_when_deserializing_then_returns_wrapped_error() {
    let tree = sample();
    let codec = JsonCodec::<Payload>::length_delimited();
    let mut out = Vec::new();
    tree.write_records(Order::BreadthFirst, &codec, &mut out).unwrap();
    out.truncate(out.len() - 3);

    let result = Tree::deserialize(out.as_slice(), &codec);
    assert!(matches!(
        result,
        Err(StreamError::Decode {
            record: 4,
            source: CodecError::Truncated
        })
    ));
}

#[test]
fn given_reader_dropped_early_when_serializing_then_producer_stops() {
    testing::init_test_setup();
    let mut tree = Tree::new();
    tree.add(1, 0, Payload::Number(1));
    for id in 2..=100u64 {
        tree.add(id, 1, Payload::Number(id as i64));
    }

    let outcome = thread::scope(|s| {
        let (mut reader, done) =
            tree.serialize(s, Order::BreadthFirst, JsonCodec::<Payload>::json_lines());
        let mut first = [0u8; 8];
        reader.read_exact(&mut first).expect("first bytes");
        drop(reader);
        done.wait()
    });

    match outcome {
        Err(StreamError::Cancelled { written }) => assert!(written < 100),
        other => panic!("expected cancellation, got {other:?}"),
    }
}

#[test]
fn given_finished_run_when_polling_then_wait_returns_same_outcome() {
    let tree = sample();

    let (polled, waited) = thread::scope(|s| {
        let (mut reader, mut done) =
            tree.serialize(s, Order::BreadthFirst, JsonCodec::<Payload>::json_lines());
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes).expect("read stream");
        let polled = loop {
            match done.try_wait() {
                Some(outcome) => break outcome.as_ref().ok().copied(),
                None => thread::yield_now(),
            }
        };
        (polled, done.wait())
    });

    assert_eq!(polled, Some(5));
    assert_eq!(waited.expect("serialize"), 5);
}

#[test]
fn given_empty_buffer_when_reading_then_returns_zero_without_consuming() {
    let tree = sample();

    let (empty_read, bytes, written) = thread::scope(|s| {
        let (mut reader, done) =
            tree.serialize(s, Order::DepthFirst, JsonCodec::<Payload>::json_lines());
        let empty_read = reader.read(&mut []).expect("empty read");
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes).expect("read stream");
        (empty_read, bytes, done.wait())
    });

    assert_eq!(empty_read, 0);
    assert_eq!(written.expect("serialize"), 5);
    assert_eq!(String::from_utf8(bytes).unwrap().lines().count(), 5);
}

#[test]
fn given_unbounded_record_limit_when_deserializing_then_keeps_records() {
    testing::init_test_setup();
    let codec = JsonCodec::<u32>::json_lines().with_max_record_bytes(usize::MAX);
    let input = "{\"id\":1,\"parentID\":0,\"data\":7}\n{\"id\":2,\"parentID\":1,\"data\":8}\n";

    let tree = Tree::deserialize(input.as_bytes(), &codec).expect("deserialize");

    assert_eq!(tree.keys(Order::BreadthFirst), vec![1, 2]);
    assert_eq!(tree.find(2).map(|n| *n.data()), Some(8));
}
