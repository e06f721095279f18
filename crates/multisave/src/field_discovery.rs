//! Structured field discovery.
//!
//! A field declared `#[save]` is eligible on its own. When that field is a
//! structure (directly, as a list element, or as a map value) the structure
//! type is marked and every field inside it becomes eligible, recursively.
//! Map keys are never expanded.
//!
//! Marks are keyed by structure type name and live for one save or load
//! operation, so re-discovering the same type is a no-op and self-referential
//! types terminate.

use std::collections::HashSet;

use crate::field_table::FieldSet;
use crate::field_value::{FieldDescriptor, FieldKind, FieldValue, StructType, StructValue};

#[derive(Debug, Default)]
pub struct FieldMarks {
    marked: HashSet<&'static str>,
}

impl FieldMarks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark every structure reachable from the eligible fields of `table`.
    pub fn discover(&mut self, table: &'static [FieldDescriptor]) {
        for desc in table.iter().filter(|d| d.save) {
            self.mark_kind(&desc.kind);
        }
    }

    /// Run discovery for a live object.
    pub fn discover_object<F: FieldSet + ?Sized>(&mut self, object: &F) {
        self.discover(object.field_table());
    }

    pub fn is_marked(&self, type_name: &str) -> bool {
        self.marked.contains(type_name)
    }

    pub fn len(&self) -> usize {
        self.marked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.marked.is_empty()
    }

    fn mark_kind(&mut self, kind: &FieldKind) {
        match kind {
            FieldKind::Scalar(_) => {}
            FieldKind::Struct(ty) => self.mark_struct(*ty),
            FieldKind::List(element) => self.mark_kind(element),
            FieldKind::Map(_, value) => self.mark_kind(value),
        }
    }

    fn mark_struct(&mut self, ty: StructType) {
        if !self.marked.insert(ty.name()) {
            return;
        }
        for desc in ty.fields() {
            self.mark_kind(&desc.kind);
        }
    }

    /// Eligibility of a field declared inside structure `owner`.
    fn sub_eligible(&self, owner: StructType, desc: &FieldDescriptor) -> bool {
        desc.save || self.is_marked(owner.name())
    }

    /// Strip everything not eligible from `value`, following `kind`.
    pub fn filter(&self, kind: &FieldKind, value: FieldValue) -> FieldValue {
        match (kind, value) {
            (FieldKind::Struct(ty), FieldValue::Struct(s)) => {
                FieldValue::Struct(self.filter_struct(*ty, s))
            }
            (FieldKind::List(element), FieldValue::List(items)) => FieldValue::List(
                items
                    .into_iter()
                    .map(|item| self.filter(element, item))
                    .collect(),
            ),
            (FieldKind::Map(_, value_kind), FieldValue::Map(pairs)) => FieldValue::Map(
                pairs
                    .into_iter()
                    .map(|(k, v)| (k, self.filter(value_kind, v)))
                    .collect(),
            ),
            (_, other) => other,
        }
    }

    fn filter_struct(&self, ty: StructType, value: StructValue) -> StructValue {
        let fields = ty.fields();
        let entries = value
            .into_entries()
            .into_iter()
            .filter_map(|(name, v)| {
                let desc = fields.iter().find(|d| d.name == name)?;
                self.sub_eligible(ty, desc)
                    .then(|| (name, self.filter(&desc.kind, v)))
            })
            .collect();
        StructValue::from_entries(entries)
    }

    /// Merge a saved value into the current one.
    ///
    /// Structures keep their current entries and take the eligible saved
    /// ones on top, so fields that were never persisted keep their live
    /// value. Lists, maps and scalars are replaced wholesale.
    pub fn merge(
        &self,
        kind: &FieldKind,
        current: Option<FieldValue>,
        saved: FieldValue,
    ) -> FieldValue {
        match (kind, current, saved) {
            (FieldKind::Struct(ty), Some(FieldValue::Struct(mut live)), FieldValue::Struct(s)) => {
                let fields = ty.fields();
                for (name, v) in s.into_entries() {
                    let Some(desc) = fields.iter().find(|d| d.name == name) else {
                        continue;
                    };
                    if !self.sub_eligible(*ty, desc) {
                        continue;
                    }
                    let merged = self.merge(&desc.kind, live.get(&name).cloned(), v);
                    live.insert(&name, merged);
                }
                FieldValue::Struct(live)
            }
            (_, _, saved) => self.filter(kind, saved),
        }
    }
}

/// Read every eligible top-level field of `object`, filtered.
pub fn capture_fields<F: FieldSet + ?Sized>(object: &F, marks: &FieldMarks) -> Vec<(String, FieldValue)> {
    object
        .field_table()
        .iter()
        .filter(|d| d.save)
        .filter_map(|desc| {
            let value = object.get_field(desc.name)?;
            Some((desc.name.to_string(), marks.filter(&desc.kind, value)))
        })
        .collect()
}

/// Write saved entries back into `object`.
///
/// Entries for fields that no longer exist, or are no longer eligible, are
/// skipped. Returns the number of fields written.
pub fn apply_fields<F: FieldSet + ?Sized>(
    object: &mut F,
    marks: &FieldMarks,
    entries: Vec<(String, FieldValue)>,
) -> usize {
    let table = object.field_table();
    let mut applied = 0;
    for (name, saved) in entries {
        let Some(desc) = table.iter().find(|d| d.name == name && d.save) else {
            continue;
        };
        let current = match desc.kind {
            FieldKind::Struct(_) => object.get_field(desc.name),
            _ => None,
        };
        let value = marks.merge(&desc.kind, current, saved);
        if object.set_field(desc.name, value) {
            applied += 1;
        }
    }
    applied
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field_table::FieldTable;
    use crate::field_value::SaveValue;
    use crate::SaveFields;
    use std::collections::HashMap;

    #[derive(SaveFields, Default, Debug, Clone, PartialEq)]
    struct Stats {
        hp: u32,
        mana: u32,
    }

    #[derive(SaveFields, Default, Debug, Clone, PartialEq)]
    struct Node {
        label: String,
        children: Vec<Node>,
    }

    #[derive(SaveFields, Default, Debug, Clone, PartialEq)]
    struct Key {
        id: u32,
    }

    #[derive(SaveFields, Default, Debug, Clone, PartialEq)]
    struct Hero {
        #[save]
        level: u32,
        #[save]
        stats: Stats,
        #[save]
        tree: Node,
        #[save]
        by_name: HashMap<String, Stats>,
        scratch: u32,
        unsaved_stats: Key,
    }

    #[test]
    fn test_discovery_marks_structs_wholesale() {
        let mut marks = FieldMarks::new();
        marks.discover(Hero::table());
        assert!(marks.is_marked(Stats::TYPE_NAME));
        assert!(marks.is_marked(Node::TYPE_NAME));
        assert!(!marks.is_marked(Key::TYPE_NAME));
    }

    #[test]
    fn test_discovery_is_idempotent_and_terminates_on_self_reference() {
        let mut marks = FieldMarks::new();
        marks.discover(Node::table());
        assert!(marks.is_empty(), "Node has no #[save] fields of its own");

        marks.discover(Hero::table());
        let after_first = marks.len();
        marks.discover(Hero::table());
        marks.discover(Hero::table());
        assert_eq!(marks.len(), after_first);
    }

    #[test]
    fn test_map_keys_not_expanded() {
        #[derive(SaveFields, Default, Debug, Clone, PartialEq, Eq, Hash)]
        struct Tag {
            code: u32,
        }

        #[derive(SaveFields, Default)]
        struct Keyed {
            #[save]
            lookup: Vec<HashMap<u32, Key>>,
            #[save]
            by_tag: HashMap<Tag, u8>,
        }

        let mut marks = FieldMarks::new();
        marks.discover(Keyed::table());
        assert!(marks.is_marked(Key::TYPE_NAME));
        assert!(!marks.is_marked(Tag::TYPE_NAME));
        assert_eq!(marks.len(), 1);
    }

    #[test]
    fn test_capture_skips_ineligible_top_level_fields() {
        let hero = Hero {
            level: 3,
            scratch: 99,
            ..Default::default()
        };
        let mut marks = FieldMarks::new();
        marks.discover_object(&hero);
        let captured = capture_fields(&hero, &marks);
        let names: Vec<&str> = captured.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["level", "stats", "tree", "by_name"]);
    }

    #[test]
    fn test_unmarked_struct_subfields_are_filtered() {
        // Without discovery the structure is not marked, so none of its
        // undeclared subfields survive the filter.
        let marks = FieldMarks::new();
        let stats = Stats { hp: 5, mana: 6 };
        let filtered = marks.filter(&Stats::kind(), stats.to_value());
        assert_eq!(filtered, FieldValue::Struct(StructValue::default()));
    }

    #[test]
    fn test_capture_then_apply_restores_nested_values() {
        let mut source = Hero {
            level: 7,
            stats: Stats { hp: 40, mana: 12 },
            tree: Node {
                label: "root".into(),
                children: vec![Node {
                    label: "leaf".into(),
                    children: vec![],
                }],
            },
            scratch: 1,
            ..Default::default()
        };
        source
            .by_name
            .insert("ally".into(), Stats { hp: 1, mana: 2 });

        let mut marks = FieldMarks::new();
        marks.discover_object(&source);
        let captured = capture_fields(&source, &marks);

        let mut target = Hero {
            scratch: 55,
            ..Default::default()
        };
        let applied = apply_fields(&mut target, &marks, captured);
        assert_eq!(applied, 4);
        assert_eq!(target.level, 7);
        assert_eq!(target.stats, source.stats);
        assert_eq!(target.tree, source.tree);
        assert_eq!(target.by_name, source.by_name);
        assert_eq!(target.scratch, 55, "ineligible field keeps its live value");
    }

    #[test]
    fn test_deep_self_referential_tree_survives_codec() {
        use crate::field_codec::{decode_fields, encode_fields};

        let mut tree = Node {
            label: "leaf".into(),
            children: vec![],
        };
        for depth in 0..40 {
            tree = Node {
                label: format!("level_{depth}"),
                children: vec![tree],
            };
        }
        let source = Hero {
            tree,
            ..Default::default()
        };

        let mut marks = FieldMarks::new();
        marks.discover_object(&source);
        let bytes = encode_fields(&capture_fields(&source, &marks));
        let decoded = decode_fields(&bytes).unwrap();

        let mut target = Hero::default();
        apply_fields(&mut target, &marks, decoded);
        assert_eq!(target.tree, source.tree);
    }

    #[test]
    fn test_apply_ignores_unknown_and_mistyped_entries() {
        let mut marks = FieldMarks::new();
        let mut hero = Hero::default();
        marks.discover_object(&hero);
        let applied = apply_fields(
            &mut hero,
            &marks,
            vec![
                ("removed_field".into(), FieldValue::Int(1)),
                ("level".into(), FieldValue::Text("nope".into())),
                ("scratch".into(), FieldValue::UInt(9)),
            ],
        );
        assert_eq!(applied, 0);
        assert_eq!(hero.scratch, 0);
    }
}
