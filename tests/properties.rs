//! Property-based tests for the quantified behaviors of the codec:
//! varint/zigzag/double roundtrips, record structural equality up to
//! default substitution, the single-terminator invariant, and
//! underflow-deficit accuracy on truncated prefixes.

use gob_codec::{record, value, Buffer, Error, FieldKind, FieldSpec};
use quickcheck::{quickcheck, QuickCheck, TestResult};

fn uvarint_roundtrips(v: u64) -> bool {
    let mut buf = Buffer::init(0);
    let n = buf.write_uvarint(v).unwrap();
    buf.reset();
    let decoded = buf.read_uvarint().unwrap();
    decoded == v && (1..=9).contains(&n)
}

fn zigzag_roundtrips(v: i64) -> bool {
    let mut buf = Buffer::init(0);
    buf.write_varint_signed(v).unwrap();
    buf.reset();
    buf.read_varint_signed().unwrap() == v
}

fn double_roundtrips(v: f64) -> TestResult {
    if v.is_nan() {
        return TestResult::discard();
    }
    let mut buf = Buffer::init(0);
    value::write_value_float(&mut buf, v).unwrap();
    buf.reset();
    let back = value::read_value_float(&mut buf).unwrap();
    TestResult::from_bool(back.to_bits() == v.to_bits())
}

#[test]
fn p1_varint_roundtrip() {
    quickcheck(uvarint_roundtrips as fn(u64) -> bool);
}

#[test]
fn p2_zigzag_roundtrip() {
    quickcheck(zigzag_roundtrips as fn(i64) -> bool);
}

#[test]
fn p3_double_bitwise_roundtrip() {
    QuickCheck::new()
        .tests(2000)
        .max_tests(20000)
        .quickcheck(double_roundtrips as fn(f64) -> TestResult);
}

#[derive(Debug, Default, Clone, PartialEq)]
struct Widget {
    count: i64,
    label: String,
}

fn widget_fields() -> Vec<FieldSpec<Widget>> {
    vec![
        FieldSpec::new(
            FieldKind::Int,
            |w: &Widget| w.count != 0,
            |buf, w: &Widget| value::write_tagged_int(buf, w.count),
            |buf, w: &mut Widget| {
                w.count = value::read_tagged_int(buf)?;
                Ok(())
            },
            |w: &mut Widget| w.count = 0,
        ),
        FieldSpec::new(
            FieldKind::Str,
            |w: &Widget| !w.label.is_empty(),
            |buf, w: &Widget| value::write_tagged_string(buf, &w.label),
            |buf, w: &mut Widget| {
                w.label = value::read_tagged_string(buf)?;
                Ok(())
            },
            |w: &mut Widget| w.label.clear(),
        ),
    ]
}

fn record_roundtrips_up_to_defaults(count: i64, label: String) -> bool {
    let fields = widget_fields();
    let widget = Widget { count, label };

    let mut buf = Buffer::init(0);
    record::encode_record(&mut buf, 99, &widget, &fields).unwrap();
    buf.reset();
    let (_typeid, decoded) = record::decode_record(&mut buf, &fields).unwrap();

    let expected = Widget {
        count: widget.count,
        label: widget.label.clone(),
    };
    decoded == expected
}

#[test]
fn p4_record_roundtrip_up_to_default_substitution() {
    QuickCheck::new()
        .tests(1000)
        .quickcheck(record_roundtrips_up_to_defaults as fn(i64, String) -> bool);
}

fn single_terminator(count: i64, label: String) -> bool {
    let fields = widget_fields();
    let widget = Widget { count, label };
    let mut buf = Buffer::init(0);
    record::encode_record(&mut buf, 99, &widget, &fields).unwrap();
    let bytes = buf.filled();
    bytes.last() == Some(&0) && bytes.iter().filter(|&&b| b == 0).count() == 1
}

#[test]
fn p5_single_terminator_even_with_zero_valued_payload_bytes() {
    // A label byte can itself be 0 (e.g. embedded NUL) without being
    // mistaken for the record terminator, since it falls inside a
    // length-prefixed region rather than the bare offset stream.
    QuickCheck::new()
        .tests(500)
        .quickcheck(single_terminator as fn(i64, String) -> bool);
}

// decode_uvarint can't know the full frame length until it has read the
// first byte, so an empty prefix always reports a deficit of 1; any
// other truncated prefix (the length byte present, payload short)
// reports the full frame length rather than the remaining shortfall.
fn underflow_deficit_is_exact(v: u64) -> bool {
    let mut buf = [0u8; 9];
    let total = gob_codec::varint::encode_uvarint(&mut buf, v).unwrap();

    for cut in 0..total {
        let expected = if cut == 0 { 1 } else { total };
        match gob_codec::varint::decode_uvarint(&buf[..cut]) {
            Err(Error::Underflow { needed }) if needed == expected => {}
            _ => return false,
        }
    }
    gob_codec::varint::decode_uvarint(&buf[..total]).is_ok()
}

#[test]
fn p6_underflow_reports_required_deficit() {
    quickcheck(underflow_deficit_is_exact as fn(u64) -> bool);
}
