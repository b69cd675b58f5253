// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(missing_docs, clippy::unwrap_used, clippy::expect_used)]
use echo_wire::io::{from_bytes, from_graph_bytes, to_bytes, to_graph_bytes, write_delimited_to};
use echo_wire::{
    ByteOutput, CodecError, DelimitedSource, Format, ObjectRef, Pipe, PipeSchema, PipeState,
    WireError,
};
use echo_wire_dry_tests::{
    register_fixtures, Address, Circle, EndCall, Node, Person, RecordingSource, ShapeGroup, Square,
    TreeNode, WireBuilder,
};

const CLEAN: EndCall = EndCall {
    had_input: true,
    cleanup_only: false,
};

const FAILED: EndCall = EndCall {
    had_input: true,
    cleanup_only: true,
};

fn person() -> Person {
    Person {
        id: 3,
        name: "Grace".into(),
        email: Some("grace@example.com".into()),
        tags: vec!["cobol".into()],
        address: Some(Address {
            street: "1 Navy Way".into(),
            city: "Arlington".into(),
            zip: 22201,
        }),
        ..Person::default()
    }
}

#[test]
fn one_session_per_message_even_with_nested_records() {
    let bytes = to_bytes(&person(), Format::Protobuf).unwrap();
    let schema = PipeSchema::of::<Person>().unwrap();
    let mut pipe = Pipe::new(RecordingSource::new(bytes));
    assert_eq!(pipe.state(), PipeState::Idle);

    let mut output = ByteOutput::new(Format::Grouped);
    pipe.write_to(&mut output, &schema).unwrap();

    assert_eq!(pipe.state(), PipeState::Idle);
    assert_eq!(pipe.source().begins(), 1);
    assert_eq!(pipe.source().ends(), [CLEAN]);
    assert_eq!(from_bytes::<Person>(output.as_slice()).unwrap(), person());
    assert_eq!(
        output.as_slice(),
        &to_bytes(&person(), Format::Grouped).unwrap()[..]
    );
}

#[test]
fn empty_message_still_ends_the_session() {
    let schema = PipeSchema::of::<Person>().unwrap();
    let mut pipe = Pipe::new(RecordingSource::new(Vec::<u8>::new()));
    let mut output = ByteOutput::new(Format::Protobuf);
    pipe.write_to(&mut output, &schema).unwrap();

    assert!(output.is_empty());
    assert_eq!(pipe.source().begins(), 1);
    assert_eq!(
        pipe.source().ends(),
        [EndCall {
            had_input: false,
            cleanup_only: true,
        }]
    );
}

#[test]
fn transfer_failure_runs_cleanup_once_and_returns_the_error() {
    let bytes = WireBuilder::new()
        .varint(1, 5)
        .raw(&[0x12, 0x05, b'a'])
        .build();
    let schema = PipeSchema::of::<Person>().unwrap();
    let mut pipe = Pipe::new(RecordingSource::new(bytes));
    let mut output = ByteOutput::new(Format::Protobuf);

    let err = pipe.write_to(&mut output, &schema).unwrap_err();
    assert!(matches!(err, CodecError::Wire(WireError::Truncated)));
    assert_eq!(pipe.state(), PipeState::Idle);
    assert_eq!(pipe.source().ends(), [FAILED]);
}

#[test]
fn failure_inside_a_nested_record_uses_the_outer_session() {
    let bytes = WireBuilder::new()
        .varint(1, 5)
        .nested(7, |b| b.string(1, "street").varint(3, u64::MAX).raw(&[0x12]))
        .build();
    let schema = PipeSchema::of::<Person>().unwrap();
    let mut pipe = Pipe::new(RecordingSource::new(bytes));
    let mut output = ByteOutput::new(Format::Grouped);

    assert!(pipe.write_to(&mut output, &schema).is_err());
    assert_eq!(pipe.source().begins(), 1);
    assert_eq!(pipe.source().ends(), [FAILED]);
}

#[test]
fn begin_failure_skips_end() {
    let schema = PipeSchema::of::<Person>().unwrap();
    let mut pipe = Pipe::new(RecordingSource::new(vec![0x08u8, 0x01]).failing_begin());
    let mut output = ByteOutput::new(Format::Protobuf);

    let err = pipe.write_to(&mut output, &schema).unwrap_err();
    assert!(matches!(err, CodecError::ResourceCleanup(_)));
    assert_eq!(pipe.state(), PipeState::Idle);
    assert_eq!(pipe.source().begins(), 1);
    assert!(pipe.source().ends().is_empty());
}

#[test]
fn cleanup_failure_after_success_is_reported() {
    let bytes = to_bytes(&person(), Format::Protobuf).unwrap();
    let schema = PipeSchema::of::<Person>().unwrap();
    let mut pipe = Pipe::new(RecordingSource::new(bytes).failing_end());
    let mut output = ByteOutput::new(Format::Protobuf);

    let err = pipe.write_to(&mut output, &schema).unwrap_err();
    assert!(matches!(err, CodecError::ResourceCleanup(_)));
    assert_eq!(pipe.state(), PipeState::Idle);
    assert_eq!(pipe.source().ends(), [CLEAN]);
}

#[test]
fn transfer_error_wins_over_cleanup_error() {
    let bytes = WireBuilder::new().raw(&[0x12, 0x05, b'a']).build();
    let schema = PipeSchema::of::<Person>().unwrap();
    let mut source = RecordingSource::new(bytes).failing_end();
    let mut output = ByteOutput::new(Format::Protobuf);

    // Borrowing the source keeps it inspectable after the pipe is gone.
    let err = Pipe::new(&mut source)
        .write_to(&mut output, &schema)
        .unwrap_err();
    assert!(matches!(err, CodecError::Wire(WireError::Truncated)));
    assert_eq!(source.ends(), [FAILED]);
}

#[test]
fn pipe_is_reusable_across_sessions() {
    let first = to_bytes(&person(), Format::Protobuf).unwrap();
    let schema = PipeSchema::of::<Person>().unwrap();
    let mut source = RecordingSource::new(first);
    let mut pipe = Pipe::new(&mut source);
    for _ in 0..3 {
        let mut output = ByteOutput::new(Format::Grouped);
        pipe.write_to(&mut output, &schema).unwrap();
        assert_eq!(pipe.state(), PipeState::Idle);
    }
    assert_eq!(source.begins(), 3);
    assert_eq!(source.ends(), [CLEAN, CLEAN, CLEAN]);
}

#[test]
fn unknown_fields_are_dropped_in_transit() {
    let mut bytes = to_bytes(&person(), Format::Protobuf).unwrap().to_vec();
    bytes.extend_from_slice(&WireBuilder::new().string(50, "extra").varint(51, 1).build());
    let schema = PipeSchema::of::<Person>().unwrap();
    let mut pipe = Pipe::new(RecordingSource::new(bytes));
    let mut output = ByteOutput::new(Format::Protobuf);
    pipe.write_to(&mut output, &schema).unwrap();
    assert_eq!(
        output.as_slice(),
        &to_bytes(&person(), Format::Protobuf).unwrap()[..]
    );
}

#[test]
fn polymorphic_values_are_piped_by_discriminator() {
    register_fixtures().unwrap();
    let group = ShapeGroup {
        name: "pair".into(),
        shapes: vec![
            ObjectRef::new(Circle { radius: 2.0 }),
            ObjectRef::new(Square::default()),
        ],
        primary: None,
    };
    let schema = PipeSchema::named("fixtures.ShapeGroup").unwrap();
    let mut pipe = Pipe::new(RecordingSource::new(
        to_bytes(&group, Format::Grouped).unwrap(),
    ));
    let mut output = ByteOutput::new(Format::Protobuf);
    pipe.write_to(&mut output, &schema).unwrap();
    assert_eq!(from_bytes::<ShapeGroup>(output.as_slice()).unwrap(), group);
}

#[test]
fn references_are_copied_verbatim() {
    register_fixtures().unwrap();
    let shared = ObjectRef::new(Circle { radius: 4.0 });
    let group = ShapeGroup {
        shapes: vec![shared.clone(), shared.clone()],
        primary: Some(shared),
        ..ShapeGroup::default()
    };
    let schema = PipeSchema::of::<ShapeGroup>().unwrap();
    let mut pipe = Pipe::new(RecordingSource::new(
        to_graph_bytes(&group, Format::Protobuf).unwrap(),
    ));
    let mut output = ByteOutput::new(Format::Grouped);
    pipe.write_to(&mut output, &schema).unwrap();

    assert_eq!(
        output.as_slice(),
        &to_graph_bytes(&group, Format::Grouped).unwrap()[..]
    );
    let decoded: ShapeGroup = from_graph_bytes(output.as_slice()).unwrap();
    assert!(decoded.shapes[0].ptr_eq(&decoded.shapes[1]));
}

#[test]
fn pipe_schema_is_a_pass_through_view() {
    register_fixtures().unwrap();
    let schema = PipeSchema::named("fixtures.Person").unwrap();
    assert!(schema.is_initialized());
    assert_eq!(schema.message_name(), "Person");
    assert_eq!(schema.message_full_name(), "fixtures.Person");
    assert_eq!(schema.field_number("email").unwrap(), 3);
    assert_eq!(schema.field_name(7).unwrap(), "address");
    assert!(matches!(
        PipeSchema::named("fixtures.Nothing"),
        Err(CodecError::UnknownType(_))
    ));
}

#[test]
fn delimited_source_serves_one_message_per_session() {
    let people = [person(), Person::default(), Person { id: 8, ..person() }];
    let mut stream = Vec::new();
    for p in &people {
        write_delimited_to(&mut stream, p, Format::Protobuf).unwrap();
    }
    let schema = PipeSchema::of::<Person>().unwrap();
    let mut pipe = Pipe::new(DelimitedSource::new(&stream[..]));

    for expected in &people {
        let mut output = ByteOutput::new(Format::Grouped);
        pipe.write_to(&mut output, &schema).unwrap();
        assert_eq!(&from_bytes::<Person>(output.as_slice()).unwrap(), expected);
    }
    let mut output = ByteOutput::new(Format::Grouped);
    pipe.write_to(&mut output, &schema).unwrap();
    assert!(output.is_empty());
    assert_eq!(pipe.source().completed(), 3);
}

#[test]
fn deep_records_pipe_byte_identically_within_a_format() {
    let chain = TreeNode::chain(64);
    let schema = PipeSchema::of::<TreeNode>().unwrap();
    for format in [Format::Protobuf, Format::Grouped] {
        let bytes = to_bytes(&chain, format).unwrap();
        let mut pipe = Pipe::new(RecordingSource::new(bytes.clone()));
        let mut output = ByteOutput::new(format);
        pipe.write_to(&mut output, &schema).unwrap();
        assert_eq!(output.as_slice(), &bytes[..]);
        assert_eq!(pipe.source().ends(), [CLEAN]);
    }
}

#[test]
fn nested_polymorphic_values_pipe_byte_identically_within_a_format() {
    register_fixtures().unwrap();
    let root = Node::shared("root");
    let leaf = Node::shared("leaf");
    Node::link(&root, &Node::shared("middle"));
    Node::link(&root, &leaf);
    Node::link(&leaf, &ObjectRef::new(Circle { radius: 0.25 }));
    let group = ShapeGroup {
        name: "nested".into(),
        shapes: vec![root, ObjectRef::new(Square::default())],
        primary: Some(leaf),
    };
    let schema = PipeSchema::of::<ShapeGroup>().unwrap();
    for format in [Format::Protobuf, Format::Grouped] {
        for bytes in [
            to_bytes(&group, format).unwrap(),
            to_graph_bytes(&group, format).unwrap(),
        ] {
            let mut pipe = Pipe::new(RecordingSource::new(bytes.clone()));
            let mut output = ByteOutput::new(format);
            pipe.write_to(&mut output, &schema).unwrap();
            assert_eq!(output.as_slice(), &bytes[..]);
        }
    }
}
