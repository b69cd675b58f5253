// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(missing_docs, clippy::unwrap_used, clippy::expect_used, clippy::panic)]
use std::sync::Arc;

use echo_wire::io::{from_bytes, to_bytes};
use echo_wire::{
    registry, ByteInput, ByteOutput, CodecConfig, CodecError, FieldFactory, FieldKey, FieldType,
    Format, ObjectRef, RuntimeSchema, Schema, StrategyKind, WireError,
};
use echo_wire_dry_tests::fixtures::{
    DuplicateName, DuplicateTag, Impostor, IndexTag, Opaque, ReservedTag, Secret, Vault,
    WithOpaque, ZeroTag,
};
use echo_wire_dry_tests::{register_fixtures, Address, Circle, Color, Person, TreeNode};

const PERSON_FIELDS: [(u32, &str); 8] = [
    (1, "id"),
    (2, "name"),
    (3, "email"),
    (4, "color"),
    (5, "tags"),
    (6, "scores"),
    (7, "address"),
    (8, "notes"),
];

#[test]
fn field_lookups_are_bidirectional() {
    let schema = RuntimeSchema::<Person>::get().unwrap();
    for (number, name) in PERSON_FIELDS {
        assert_eq!(schema.field_name(number).unwrap(), name);
        assert_eq!(schema.field_number(name).unwrap(), number);
        assert_eq!(
            schema.field_name(schema.field_number(name).unwrap()).unwrap(),
            name
        );
    }
    assert_eq!(schema.message_name(), "Person");
    assert_eq!(schema.message_full_name(), "fixtures.Person");
}

#[test]
fn fields_are_kept_in_ascending_tag_order() {
    let schema = RuntimeSchema::<Person>::get().unwrap();
    let numbers: Vec<u32> = schema.fields().iter().map(|field| field.number()).collect();
    assert_eq!(numbers, [1, 2, 3, 4, 5, 6, 7, 8]);
}

#[test]
fn unknown_lookups_name_the_message_and_key() {
    let schema = RuntimeSchema::<Person>::get().unwrap();
    match schema.field_name(99).unwrap_err() {
        CodecError::UnknownField { message, field } => {
            assert_eq!(message, "fixtures.Person");
            assert_eq!(field, FieldKey::Number(99));
        }
        other => panic!("unexpected error: {other}"),
    }
    match schema.field_number("nickname").unwrap_err() {
        CodecError::UnknownField { field, .. } => {
            assert_eq!(field, FieldKey::Name("nickname".into()));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn fields_report_their_shape() {
    let schema = RuntimeSchema::<Person>::get().unwrap();
    let tags = schema.field_by_name("tags").unwrap();
    assert!(tags.is_repeated());
    assert_eq!(tags.field_type(), FieldType::String);

    let email = schema.field(3).unwrap();
    assert!(email.is_required());
    assert!(!email.is_repeated());

    assert_eq!(schema.field(4).unwrap().field_type(), FieldType::Enum);
    assert_eq!(schema.field(6).unwrap().field_type(), FieldType::SInt32);
    assert_eq!(schema.field(7).unwrap().field_type(), FieldType::Message);
    assert_eq!(schema.field(8).unwrap().group_filter(), 2);
    assert_eq!(schema.field(1).unwrap().group_filter(), 0);
}

#[test]
fn required_fields_gate_initialization() {
    let schema = RuntimeSchema::<Person>::get().unwrap();
    let mut person = schema.new_message();
    assert!(!schema.is_initialized(&person));
    person.email = Some("a@b.c".into());
    assert!(schema.is_initialized(&person));
}

#[test]
fn schemas_are_cached_per_type() {
    let first = RuntimeSchema::<Address>::get().unwrap();
    let second = RuntimeSchema::<Address>::get().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn invalid_descriptions_fail_to_build() {
    let reasons = [
        RuntimeSchema::<DuplicateTag>::build().unwrap_err(),
        RuntimeSchema::<ZeroTag>::build().unwrap_err(),
        RuntimeSchema::<DuplicateName>::build().unwrap_err(),
        RuntimeSchema::<ReservedTag>::build().unwrap_err(),
        RuntimeSchema::<IndexTag>::build().unwrap_err(),
    ];
    let names = [
        "fixtures.DuplicateTag",
        "fixtures.ZeroTag",
        "fixtures.DuplicateName",
        "fixtures.ReservedTag",
        "fixtures.IndexTag",
    ];
    for (err, expected) in reasons.into_iter().zip(names) {
        match err {
            CodecError::InvalidSchema { message, .. } => assert_eq!(message, expected),
            other => panic!("unexpected error: {other}"),
        }
    }
    // Failures are not cached.
    assert!(RuntimeSchema::<DuplicateTag>::get().is_err());
    assert!(RuntimeSchema::<DuplicateTag>::get().is_err());
}

#[test]
fn unmappable_fields_are_dropped() {
    let schema = RuntimeSchema::<WithOpaque>::get().unwrap();
    assert_eq!(schema.fields().len(), 1);
    assert!(schema.field(2).is_none());

    let bytes = to_bytes(
        &WithOpaque {
            id: 5,
            opaque: Opaque(9),
        },
        Format::Protobuf,
    )
    .unwrap();
    let decoded: WithOpaque = from_bytes(&bytes).unwrap();
    assert_eq!(decoded.id, 5);
    assert_eq!(decoded.opaque, Opaque::default());
}

#[test]
fn classification_follows_the_fixed_order() {
    let config = CodecConfig {
        excluded_types: ["fixtures.Secret", "fixtures.Color", "String"]
            .into_iter()
            .map(String::from)
            .collect(),
        ..CodecConfig::default()
    };
    let factory = FieldFactory::new(&config);
    // Enums and inline scalars are classified before the exclusion policy.
    assert_eq!(factory.classify::<Color>(), Some(StrategyKind::Enum));
    assert_eq!(factory.classify::<String>(), Some(StrategyKind::Inline));
    assert_eq!(factory.classify::<Secret>(), None);
    assert_eq!(factory.classify::<Opaque>(), None);
    assert_eq!(factory.classify::<Address>(), Some(StrategyKind::NestedRecord));
    assert_eq!(factory.classify::<ObjectRef>(), Some(StrategyKind::Polymorphic));

    let defaults = CodecConfig::default();
    let permissive = FieldFactory::new(&defaults);
    assert_eq!(permissive.classify::<Secret>(), Some(StrategyKind::NestedRecord));
}

#[test]
fn excluded_record_fields_are_dropped_from_the_schema() {
    let config = CodecConfig {
        excluded_types: std::iter::once("fixtures.Secret".to_owned()).collect(),
        ..CodecConfig::default()
    };
    let schema = RuntimeSchema::<Vault>::build_with(&config).unwrap();
    let numbers: Vec<u32> = schema.fields().iter().map(|field| field.number()).collect();
    assert_eq!(numbers, [1, 3]);

    let full = RuntimeSchema::<Vault>::build_with(&CodecConfig::default()).unwrap();
    assert_eq!(full.fields().len(), 3);
}

#[test]
fn group_filter_restricts_writes_and_merges() {
    let schema = RuntimeSchema::<Person>::get().unwrap();
    let person = Person {
        id: 9,
        email: Some("x@y.z".into()),
        notes: "private".into(),
        ..Person::default()
    };

    let mut output = ByteOutput::new(Format::Protobuf);
    schema.write_filtered(&mut output, &person, 1).unwrap();
    let without_notes: Person = from_bytes(output.as_slice()).unwrap();
    assert_eq!(without_notes.notes, "");
    assert_eq!(without_notes.id, 9);

    let group_two = schema.filtered(2);
    let mut output = ByteOutput::new(Format::Protobuf);
    group_two.write_to(&mut output, &person).unwrap();
    let with_notes: Person = from_bytes(output.as_slice()).unwrap();
    assert_eq!(with_notes, person);

    // The group-1 view skips the notes field when merging.
    let group_one = schema.filtered(1);
    assert!(group_one.field_number("notes").is_err());
    let full = to_bytes(&person, Format::Protobuf).unwrap();
    let mut merged = Person::default();
    group_one
        .merge_from(&mut ByteInput::new(full), &mut merged)
        .unwrap();
    assert_eq!(merged.notes, "");
    assert_eq!(merged.email, person.email);
}

#[test]
fn self_referential_records_round_trip() {
    let tree = TreeNode {
        value: 1,
        children: vec![TreeNode::chain(5), TreeNode::default(), TreeNode::chain(2)],
    };
    for format in [Format::Protobuf, Format::Grouped] {
        let bytes = to_bytes(&tree, format).unwrap();
        assert_eq!(from_bytes::<TreeNode>(&bytes).unwrap(), tree);
    }
}

#[test]
fn nesting_beyond_the_depth_limit_fails_both_ways() {
    let schema = RuntimeSchema::<TreeNode>::get().unwrap();
    let deep = TreeNode::chain(10);

    let mut shallow_output = ByteOutput::new(Format::Protobuf).with_max_depth(5);
    assert!(matches!(
        schema.write_to(&mut shallow_output, &deep),
        Err(CodecError::DepthLimitExceeded(5))
    ));

    let bytes = to_bytes(&deep, Format::Protobuf).unwrap();
    let mut input = ByteInput::new(bytes.clone()).with_limits(5, 1 << 20);
    let mut decoded = TreeNode::default();
    assert!(matches!(
        schema.merge_from(&mut input, &mut decoded),
        Err(CodecError::DepthLimitExceeded(5))
    ));

    let mut input = ByteInput::new(bytes).with_limits(20, 1 << 20);
    let mut decoded = TreeNode::default();
    schema.merge_from(&mut input, &mut decoded).unwrap();
    assert_eq!(decoded, deep);
}

#[test]
fn oversized_payloads_fail_the_length_limit() {
    let schema = RuntimeSchema::<Person>::get().unwrap();
    let person = Person {
        name: "much longer than four".into(),
        ..Person::default()
    };
    let bytes = to_bytes(&person, Format::Protobuf).unwrap();
    let mut input = ByteInput::new(bytes).with_limits(10, 4);
    let mut decoded = Person::default();
    assert!(matches!(
        schema.merge_from(&mut input, &mut decoded),
        Err(CodecError::Wire(WireError::LengthTooLarge { max: 4, .. }))
    ));
}

#[test]
fn registry_resolves_discriminators() {
    register_fixtures().unwrap();
    assert!(registry::contains("fixtures.Circle"));
    let circle = registry::lookup("fixtures.Circle").unwrap();
    assert_eq!(circle.message_name(), "Circle");
    assert_eq!(circle.field_number("radius").unwrap(), 1);
    assert!(matches!(
        registry::lookup("fixtures.Hexagon"),
        Err(CodecError::UnknownType(name)) if name == "fixtures.Hexagon"
    ));
}

#[test]
fn registering_twice_is_idempotent_but_clashing_names_fail() {
    registry::register::<Circle>().unwrap();
    registry::register::<Circle>().unwrap();
    assert!(matches!(
        registry::register::<Impostor>(),
        Err(CodecError::DuplicateType(name)) if name == "fixtures.Circle"
    ));
    // The original owner of the name is untouched.
    assert_eq!(
        registry::lookup("fixtures.Circle").unwrap().message_name(),
        "Circle"
    );
}

#[test]
fn a_type_shadowed_by_another_discriminator_cannot_be_written() {
    registry::register::<Circle>().unwrap();
    assert!(matches!(
        RuntimeSchema::<Impostor>::get(),
        Err(CodecError::DuplicateType(name)) if name == "fixtures.Circle"
    ));
    let holder = echo_wire_dry_tests::ShapeGroup {
        shapes: vec![ObjectRef::new(Impostor { id: 3 })],
        ..Default::default()
    };
    assert!(matches!(
        to_bytes(&holder, Format::Protobuf),
        Err(CodecError::DuplicateType(_))
    ));
    // The failed build left nothing behind.
    register_fixtures().unwrap();
    assert_eq!(
        registry::lookup("fixtures.Circle").unwrap().message_name(),
        "Circle"
    );
}
