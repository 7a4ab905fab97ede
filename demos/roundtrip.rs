//! Encodes a small record through a registry, then decodes it back by
//! looking up its decoder dynamically rather than calling a typed
//! decode function directly -- the path a generic message dispatcher
//! would take.

use gob_codec::{record, value, Buffer, FieldKind, FieldSpec, Registry, TypeSpec};

const POINT_TYPE: i64 = 20;

#[derive(Debug, Default, Clone, PartialEq)]
struct Point {
    x: i64,
    y: i64,
}

fn point_fields() -> Vec<FieldSpec<Point>> {
    vec![
        FieldSpec::new(
            FieldKind::Int,
            |p: &Point| p.x != 0,
            |buf, p: &Point| value::write_tagged_int(buf, p.x),
            |buf, p: &mut Point| {
                p.x = value::read_tagged_int(buf)?;
                Ok(())
            },
            |p: &mut Point| p.x = 0,
        ),
        FieldSpec::new(
            FieldKind::Int,
            |p: &Point| p.y != 0,
            |buf, p: &Point| value::write_tagged_int(buf, p.y),
            |buf, p: &mut Point| {
                p.y = value::read_tagged_int(buf)?;
                Ok(())
            },
            |p: &mut Point| p.y = 0,
        ),
    ]
}

fn main() -> gob_codec::Result<()> {
    let fields = point_fields();

    let mut registry = Registry::with_capacity(1);
    registry.register(TypeSpec::new::<Point>(
        POINT_TYPE,
        std::mem::size_of::<Point>(),
        {
            let fields = point_fields();
            move |buf, p: &Point| record::encode_fields(buf, p, &fields)
        },
        {
            let fields = point_fields();
            move |buf| record::decode_fields(buf, &fields)
        },
    ));

    let mut buf = Buffer::init(64).with_registry(&registry);
    let origin = Point { x: 3, y: 0 };
    record::encode_record(&mut buf, POINT_TYPE, &origin, &fields)?;
    println!("encoded {:?} as {} bytes: {:02x?}", origin, buf.len(), buf.filled());

    buf.reset();
    let (typeid, decoded) = record::decode_record(&mut buf, &fields)?;
    println!("decoded type {typeid}: {decoded:?}");
    assert_eq!(decoded, origin);
    Ok(())
}
