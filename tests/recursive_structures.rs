//! Exercises the record layer's pointer-field machinery end to end:
//! recursive `Box`-linked records, registry-mediated decode of a record
//! pointer field when the caller has no static type in hand, and the
//! buffer's user-context slot used to thread back-pointers through an
//! otherwise acyclic wire format (§9's doubly-linked-list design note).

use gob_codec::record::{self, FieldKind, FieldSpec};
use gob_codec::{value, Buffer, Registry, TypeSpec};

const NODE_TYPE: i64 = 30;

#[derive(Debug, Default, Clone, PartialEq)]
struct Node {
    value: i64,
    next: Option<Box<Node>>,
}

fn node_fields() -> Vec<FieldSpec<Node>> {
    vec![
        FieldSpec::new(
            FieldKind::Int,
            |n: &Node| n.value != 0,
            |buf, n: &Node| value::write_tagged_int(buf, n.value),
            |buf, n: &mut Node| {
                n.value = value::read_tagged_int(buf)?;
                Ok(())
            },
            |n: &mut Node| n.value = 0,
        ),
        FieldSpec::new(
            FieldKind::RecordPtr,
            |n: &Node| n.next.is_some(),
            |buf, n: &Node| {
                let next = n.next.as_deref().unwrap();
                record::encode_embedded(buf, NODE_TYPE, next, &node_fields())
            },
            |buf, n: &mut Node| {
                let child = record::decode_embedded(buf, &node_fields())?;
                n.next = Some(Box::new(child));
                Ok(())
            },
            |n: &mut Node| n.next = None,
        ),
    ]
}

#[test]
fn recursive_pointer_chain_roundtrips() {
    let list = Node {
        value: 1,
        next: Some(Box::new(Node {
            value: 2,
            next: Some(Box::new(Node { value: 3, next: None })),
        })),
    };

    let mut buf = Buffer::init(64);
    record::encode_record(&mut buf, NODE_TYPE, &list, &node_fields()).unwrap();
    buf.reset();
    let (typeid, decoded) = record::decode_record(&mut buf, &node_fields()).unwrap();
    assert_eq!(typeid, NODE_TYPE);
    assert_eq!(decoded, list);
}

#[test]
fn absent_pointer_field_is_skipped_not_written_as_null_record() {
    // A `None` `next` is absent per the ordinary field-delta rule (e),
    // not an explicit null sentinel the way `codecs::encode_optional_record`
    // writes one -- the two strategies for "no record here" coexist,
    // since `Node::next`'s presence carries no extra meaning beyond the
    // field itself being set.
    let mut buf = Buffer::init(16);
    let leaf = Node { value: 9, next: None };
    record::encode_fields(&mut buf, &leaf, &node_fields()).unwrap();
    // field 1 delta 1, int tag + zigzag(9), terminator -- no second field.
    assert_eq!(buf.filled(), &[0x01, 0x04, 0x12, 0x00]);
}

#[test]
fn record_pointer_decodes_via_registry_when_type_is_not_statically_known() {
    let mut reg = Registry::with_capacity(1);
    reg.register(TypeSpec::new::<Node>(
        NODE_TYPE,
        std::mem::size_of::<Node>(),
        |buf, n: &Node| record::encode_fields(buf, n, &node_fields()),
        |buf| record::decode_fields(buf, &node_fields()),
    ));

    let mut buf = Buffer::init(64);
    let leaf = Node { value: 7, next: None };
    record::encode_embedded(&mut buf, NODE_TYPE, &leaf, &node_fields()).unwrap();
    buf.reset();

    let decoded = record::decode_record_ptr_via_registry::<Node>(&mut buf, &reg).unwrap();
    assert_eq!(*decoded, leaf);
}

/// An in-memory arena entry mirroring one decoded `Node`, plus a `prev`
/// link the wire format never carries -- the chain is acyclic on the
/// wire (§9 calls this out explicitly).
#[derive(Debug, Default, Clone, PartialEq)]
struct ArenaEntry {
    value: i64,
    next: Option<usize>,
    prev: Option<usize>,
}

/// Recursively flattens a decoded `Box`-chain into the arena accumulating
/// in the buffer's user-context slot, returning the new entry's index.
fn flatten_into_arena(buf: &mut Buffer, node: &Node) -> usize {
    if buf.context::<Vec<ArenaEntry>>().is_none() {
        buf.set_context(Vec::<ArenaEntry>::new());
    }

    let next_index = node.next.as_deref().map(|child| flatten_into_arena(buf, child));

    let arena = buf.context_mut::<Vec<ArenaEntry>>().unwrap();
    arena.push(ArenaEntry { value: node.value, next: next_index, prev: None });
    arena.len() - 1
}

#[test]
fn context_slot_threads_back_pointers_through_an_acyclic_wire_chain() {
    let list = Node {
        value: 1,
        next: Some(Box::new(Node {
            value: 2,
            next: Some(Box::new(Node { value: 3, next: None })),
        })),
    };

    let mut buf = Buffer::init(64);
    record::encode_record(&mut buf, NODE_TYPE, &list, &node_fields()).unwrap();
    buf.reset();
    let (_typeid, decoded) = record::decode_record(&mut buf, &node_fields()).unwrap();

    // flatten_into_arena recurses tail-first, so the root (value 1) lands
    // at the last index rather than 0.
    let root_index = flatten_into_arena(&mut buf, &decoded);
    let mut arena = buf.context_mut::<Vec<ArenaEntry>>().unwrap().clone();

    // Thread `prev` now that every `next` is a stable arena index -- the
    // post-processing step the wire format itself cannot express.
    for i in 0..arena.len() {
        if let Some(next) = arena[i].next {
            arena[next].prev = Some(i);
        }
    }

    assert_eq!(arena[root_index].value, 1);
    assert_eq!(arena[root_index].prev, None);

    let middle = arena[root_index].next.unwrap();
    assert_eq!(arena[middle].value, 2);
    assert_eq!(arena[middle].prev, Some(root_index));

    let tail = arena[middle].next.unwrap();
    assert_eq!(arena[tail].value, 3);
    assert_eq!(arena[tail].prev, Some(middle));
    assert_eq!(arena[tail].next, None);
}
