// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Sample records covering every field strategy.
//!
//! Polymorphic decoding needs the concrete types registered; call
//! [`register_fixtures`] before decoding anything holding an [`ObjectRef`].

use bytes::Bytes;
use echo_wire::{
    registry, Element, ElementKind, FieldSet, Fixed32, Fixed64, Message, ObjectRef, ProtoEnum,
    Result, SFixed32, SFixed64, SInt32, SInt64,
};

/// Closed enum encoded by number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Color {
    /// Number 0.
    #[default]
    Red,
    /// Number 1.
    Green,
    /// Number 2.
    Blue,
}

impl ProtoEnum for Color {
    const NAME: &'static str = "fixtures.Color";

    fn number(&self) -> i32 {
        match self {
            Self::Red => 0,
            Self::Green => 1,
            Self::Blue => 2,
        }
    }

    fn from_number(number: i32) -> Option<Self> {
        match number {
            0 => Some(Self::Red),
            1 => Some(Self::Green),
            2 => Some(Self::Blue),
            _ => None,
        }
    }
}

impl Element for Color {
    const TYPE_NAME: &'static str = "fixtures.Color";

    fn kind() -> ElementKind<Self> {
        ElementKind::enumeration()
    }
}

/// Nested record with a statically known schema.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Address {
    /// Tag 1.
    pub street: String,
    /// Tag 2.
    pub city: String,
    /// Tag 3.
    pub zip: u32,
}

impl Message for Address {
    const NAME: &'static str = "Address";
    const FULL_NAME: &'static str = "fixtures.Address";

    fn describe(fields: &mut FieldSet<Self>) {
        fields
            .field(1, "street", |a| &a.street, |a| &mut a.street)
            .field(2, "city", |a| &a.city, |a| &mut a.city)
            .field(3, "zip", |a| &a.zip, |a| &mut a.zip);
    }
}

/// Record mixing singular, optional, required, repeated and grouped fields.
///
/// `email` is required for initialization; `notes` only takes part in group-2
/// passes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Person {
    /// Tag 1.
    pub id: u64,
    /// Tag 2.
    pub name: String,
    /// Tag 3, required.
    pub email: Option<String>,
    /// Tag 4.
    pub color: Color,
    /// Tag 5.
    pub tags: Vec<String>,
    /// Tag 6, zig-zag encoded.
    pub scores: Vec<SInt32>,
    /// Tag 7.
    pub address: Option<Address>,
    /// Tag 8, group 2 only.
    pub notes: String,
}

impl Message for Person {
    const NAME: &'static str = "Person";
    const FULL_NAME: &'static str = "fixtures.Person";

    fn describe(fields: &mut FieldSet<Self>) {
        fields
            .field(1, "id", |p| &p.id, |p| &mut p.id)
            .field(2, "name", |p| &p.name, |p| &mut p.name)
            .optional(3, "email", |p| &p.email, |p| &mut p.email)
            .required()
            .field(4, "color", |p| &p.color, |p| &mut p.color)
            .repeated(5, "tags", |p| &p.tags, |p| &mut p.tags)
            .repeated(6, "scores", |p| &p.scores, |p| &mut p.scores)
            .optional(7, "address", |p| &p.address, |p| &mut p.address)
            .field(8, "notes", |p| &p.notes, |p| &mut p.notes)
            .group(2);
    }
}

/// One field of every inline scalar type, plus repeated scalars.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Everything {
    /// Tag 1.
    pub int32: i32,
    /// Tag 2.
    pub uint32: u32,
    /// Tag 3.
    pub int64: i64,
    /// Tag 4.
    pub uint64: u64,
    /// Tag 5.
    pub sint32: SInt32,
    /// Tag 6.
    pub sint64: SInt64,
    /// Tag 7.
    pub fixed32: Fixed32,
    /// Tag 8.
    pub fixed64: Fixed64,
    /// Tag 9.
    pub sfixed32: SFixed32,
    /// Tag 10.
    pub sfixed64: SFixed64,
    /// Tag 11.
    pub float: f32,
    /// Tag 12.
    pub double: f64,
    /// Tag 13.
    pub flag: bool,
    /// Tag 14.
    pub text: String,
    /// Tag 15.
    pub blob: Vec<u8>,
    /// Tag 16.
    pub shared: Bytes,
    /// Tag 17.
    pub color: Color,
    /// Tag 18.
    pub numbers: Vec<i32>,
    /// Tag 19.
    pub colors: Vec<Color>,
    /// Tag 20.
    pub maybe: Option<i64>,
}

impl Message for Everything {
    const NAME: &'static str = "Everything";
    const FULL_NAME: &'static str = "fixtures.Everything";

    fn describe(fields: &mut FieldSet<Self>) {
        fields
            .field(1, "int32", |e| &e.int32, |e| &mut e.int32)
            .field(2, "uint32", |e| &e.uint32, |e| &mut e.uint32)
            .field(3, "int64", |e| &e.int64, |e| &mut e.int64)
            .field(4, "uint64", |e| &e.uint64, |e| &mut e.uint64)
            .field(5, "sint32", |e| &e.sint32, |e| &mut e.sint32)
            .field(6, "sint64", |e| &e.sint64, |e| &mut e.sint64)
            .field(7, "fixed32", |e| &e.fixed32, |e| &mut e.fixed32)
            .field(8, "fixed64", |e| &e.fixed64, |e| &mut e.fixed64)
            .field(9, "sfixed32", |e| &e.sfixed32, |e| &mut e.sfixed32)
            .field(10, "sfixed64", |e| &e.sfixed64, |e| &mut e.sfixed64)
            .field(11, "float", |e| &e.float, |e| &mut e.float)
            .field(12, "double", |e| &e.double, |e| &mut e.double)
            .field(13, "flag", |e| &e.flag, |e| &mut e.flag)
            .field(14, "text", |e| &e.text, |e| &mut e.text)
            .field(15, "blob", |e| &e.blob, |e| &mut e.blob)
            .field(16, "shared", |e| &e.shared, |e| &mut e.shared)
            .field(17, "color", |e| &e.color, |e| &mut e.color)
            .repeated(18, "numbers", |e| &e.numbers, |e| &mut e.numbers)
            .repeated(19, "colors", |e| &e.colors, |e| &mut e.colors)
            .optional(20, "maybe", |e| &e.maybe, |e| &mut e.maybe);
    }
}

/// Polymorphic shape.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Circle {
    /// Tag 1.
    pub radius: f64,
}

impl Message for Circle {
    const NAME: &'static str = "Circle";
    const FULL_NAME: &'static str = "fixtures.Circle";

    fn describe(fields: &mut FieldSet<Self>) {
        fields.field(1, "radius", |c| &c.radius, |c| &mut c.radius);
    }
}

/// Polymorphic shape.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Square {
    /// Tag 1.
    pub side: f64,
    /// Tag 2.
    pub color: Color,
}

impl Message for Square {
    const NAME: &'static str = "Square";
    const FULL_NAME: &'static str = "fixtures.Square";

    fn describe(fields: &mut FieldSet<Self>) {
        fields
            .field(1, "side", |s| &s.side, |s| &mut s.side)
            .field(2, "color", |s| &s.color, |s| &mut s.color);
    }
}

/// Record holding polymorphic values, singly and in a collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShapeGroup {
    /// Tag 1.
    pub name: String,
    /// Tag 2.
    pub shapes: Vec<ObjectRef>,
    /// Tag 3.
    pub primary: Option<ObjectRef>,
}

impl Message for ShapeGroup {
    const NAME: &'static str = "ShapeGroup";
    const FULL_NAME: &'static str = "fixtures.ShapeGroup";

    fn describe(fields: &mut FieldSet<Self>) {
        fields
            .field(1, "name", |g| &g.name, |g| &mut g.name)
            .repeated(2, "shapes", |g| &g.shapes, |g| &mut g.shapes)
            .optional(3, "primary", |g| &g.primary, |g| &mut g.primary);
    }
}

/// Graph vertex; `links` may point back at the node itself or its ancestors.
///
/// Derived equality recurses through `links`, so only compare acyclic nodes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Node {
    /// Tag 1.
    pub label: String,
    /// Tag 2.
    pub links: Vec<ObjectRef>,
}

impl Node {
    /// A node with no links, wrapped in a fresh handle.
    pub fn shared(label: &str) -> ObjectRef {
        ObjectRef::new(Self {
            label: label.to_owned(),
            links: Vec::new(),
        })
    }

    /// Appends `to` to the links of the node behind `from`; `false` if `from` is not a node.
    pub fn link(from: &ObjectRef, to: &ObjectRef) -> bool {
        from.with_mut(|node: &mut Self| node.links.push(to.clone()))
            .is_some()
    }
}

impl Message for Node {
    const NAME: &'static str = "Node";
    const FULL_NAME: &'static str = "fixtures.Node";

    fn describe(fields: &mut FieldSet<Self>) {
        fields
            .field(1, "label", |n| &n.label, |n| &mut n.label)
            .repeated(2, "links", |n| &n.links, |n| &mut n.links);
    }
}

/// Self-referential record with a static schema.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeNode {
    /// Tag 1.
    pub value: i32,
    /// Tag 2.
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    /// A chain `depth` records deep.
    pub fn chain(depth: usize) -> Self {
        let mut node = Self::default();
        for value in (1..depth).rev() {
            node = Self {
                value: i32::try_from(value).unwrap_or(i32::MAX),
                children: vec![node],
            };
        }
        node
    }

    /// Records in the tree, root included.
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(Self::count).sum::<usize>()
    }
}

impl Message for TreeNode {
    const NAME: &'static str = "TreeNode";
    const FULL_NAME: &'static str = "fixtures.TreeNode";

    fn describe(fields: &mut FieldSet<Self>) {
        fields
            .field(1, "value", |t| &t.value, |t| &mut t.value)
            .repeated(2, "children", |t| &t.children, |t| &mut t.children);
    }
}

/// Element type the codec cannot map.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Opaque(pub u8);

impl Element for Opaque {
    const TYPE_NAME: &'static str = "fixtures.Opaque";

    fn kind() -> ElementKind<Self> {
        ElementKind::Unsupported
    }
}

/// Record whose `opaque` field is dropped from its schema.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WithOpaque {
    /// Tag 1.
    pub id: u32,
    /// Tag 2, unmappable.
    pub opaque: Opaque,
}

impl Message for WithOpaque {
    const NAME: &'static str = "WithOpaque";
    const FULL_NAME: &'static str = "fixtures.WithOpaque";

    fn describe(fields: &mut FieldSet<Self>) {
        fields
            .field(1, "id", |w| &w.id, |w| &mut w.id)
            .field(2, "opaque", |w| &w.opaque, |w| &mut w.opaque);
    }
}

/// Record type named in exclusion-policy tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Secret {
    /// Tag 1.
    pub token: String,
}

impl Message for Secret {
    const NAME: &'static str = "Secret";
    const FULL_NAME: &'static str = "fixtures.Secret";

    fn describe(fields: &mut FieldSet<Self>) {
        fields.field(1, "token", |s| &s.token, |s| &mut s.token);
    }
}

/// Record holding a [`Secret`] and an enum, for exclusion-policy tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Vault {
    /// Tag 1.
    pub id: u32,
    /// Tag 2.
    pub secret: Option<Secret>,
    /// Tag 3.
    pub color: Color,
}

impl Message for Vault {
    const NAME: &'static str = "Vault";
    const FULL_NAME: &'static str = "fixtures.Vault";

    fn describe(fields: &mut FieldSet<Self>) {
        fields
            .field(1, "id", |v| &v.id, |v| &mut v.id)
            .optional(2, "secret", |v| &v.secret, |v| &mut v.secret)
            .field(3, "color", |v| &v.color, |v| &mut v.color);
    }
}

/// Shares [`Circle`]'s discriminator; registering both must fail.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Impostor {
    /// Tag 1.
    pub id: u32,
}

impl Message for Impostor {
    const NAME: &'static str = "Impostor";
    const FULL_NAME: &'static str = "fixtures.Circle";

    fn describe(fields: &mut FieldSet<Self>) {
        fields.field(1, "id", |i| &i.id, |i| &mut i.id);
    }
}

macro_rules! invalid_record {
    ($(#[$doc:meta])* $name:ident, $full:literal, |$fields:ident| $body:expr) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Default, PartialEq, Eq)]
        pub struct $name {
            /// First field.
            pub a: u32,
            /// Second field.
            pub b: u32,
        }

        impl Message for $name {
            const NAME: &'static str = stringify!($name);
            const FULL_NAME: &'static str = $full;

            fn describe($fields: &mut FieldSet<Self>) {
                $body;
            }
        }
    };
}

invalid_record!(
    /// Declares tag 1 twice.
    DuplicateTag, "fixtures.DuplicateTag", |fields| fields
        .field(1, "a", |r| &r.a, |r| &mut r.a)
        .field(1, "b", |r| &r.b, |r| &mut r.b)
);
invalid_record!(
    /// Declares tag 0.
    ZeroTag, "fixtures.ZeroTag", |fields| fields
        .field(0, "a", |r| &r.a, |r| &mut r.a)
);
invalid_record!(
    /// Declares the name `a` twice.
    DuplicateName, "fixtures.DuplicateName", |fields| fields
        .field(1, "a", |r| &r.a, |r| &mut r.a)
        .field(2, "a", |r| &r.b, |r| &mut r.b)
);
invalid_record!(
    /// Declares the discriminator tag.
    ReservedTag, "fixtures.ReservedTag", |fields| fields
        .field(127, "a", |r| &r.a, |r| &mut r.a)
);
invalid_record!(
    /// Declares the graph index tag.
    IndexTag, "fixtures.IndexTag", |fields| fields
        .field(1, "a", |r| &r.a, |r| &mut r.a)
        .field(126, "b", |r| &r.b, |r| &mut r.b)
);

/// Registers every fixture that may appear behind an [`ObjectRef`].
pub fn register_fixtures() -> Result<()> {
    registry::register::<Circle>()?;
    registry::register::<Square>()?;
    registry::register::<ShapeGroup>()?;
    registry::register::<Node>()?;
    registry::register::<Person>()?;
    registry::register::<Address>()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn color_numbers_round_trip() {
        for color in [Color::Red, Color::Green, Color::Blue] {
            assert_eq!(Color::from_number(color.number()), Some(color));
        }
        assert_eq!(Color::from_number(3), None);
    }

    #[test]
    fn chain_has_requested_depth() {
        let chain = TreeNode::chain(4);
        assert_eq!(chain.count(), 4);
        assert_eq!(chain.value, 1);
        assert!(TreeNode::chain(1).children.is_empty());
    }

    #[test]
    fn link_only_applies_to_nodes() {
        let a = Node::shared("a");
        let circle = ObjectRef::new(Circle { radius: 1.0 });
        assert!(Node::link(&a, &circle));
        assert!(!Node::link(&circle, &a));
        let links = a.with(|node: &Node| node.links.len()).expect("a is a node");
        assert_eq!(links, 1);
    }
}
