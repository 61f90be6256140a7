use crate::error::InputError;

/// A single name/value dimension attached to a timer or to the whole request.
///
/// Both parts are strings: the embedding layer coerces scalar values to
/// strings before they reach this type, and rejects non-scalar values
/// outright.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tag {
    name: String,
    value: String,
}

impl Tag {
    /// Creates a new `Tag`.
    ///
    /// # Errors
    ///
    /// Returns an error if the tag name is empty.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Result<Self, InputError> {
        let name = name.into();
        if name.is_empty() {
            return Err(InputError::EmptyTagName);
        }

        Ok(Tag { name, value: value.into() })
    }

    /// Returns the tag name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the tag value.
    pub fn value(&self) -> &str {
        &self.value
    }
}

/// An ordered collection of tags with unique names.
///
/// Insertion order is preserved for iteration, but equality for aggregation
/// purposes is decided by [`canonical`][Self::canonical], which is order
/// independent.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TagSet {
    tags: Vec<Tag>,
}

impl TagSet {
    /// Creates an empty `TagSet`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a `TagSet` from name/value pairs.
    ///
    /// Later pairs replace earlier pairs with the same name.
    ///
    /// # Errors
    ///
    /// Returns an error if any pair has an empty name.
    pub fn from_pairs<N, V, I>(pairs: I) -> Result<Self, InputError>
    where
        N: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (N, V)>,
    {
        let mut tags = TagSet::new();
        for (name, value) in pairs {
            tags.insert(Tag::new(name, value)?);
        }
        Ok(tags)
    }

    /// Inserts a tag, replacing the value of an existing tag with the same
    /// name.
    pub fn insert(&mut self, tag: Tag) {
        match self.tags.iter_mut().find(|t| t.name == tag.name) {
            Some(existing) => existing.value = tag.value,
            None => self.tags.push(tag),
        }
    }

    /// Upserts every tag from `other` into `self`.
    pub fn merge(&mut self, other: TagSet) {
        for tag in other.tags {
            self.insert(tag);
        }
    }

    /// Returns the value for `name`, if present.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.tags.iter().find(|t| t.name == name).map(|t| t.value.as_str())
    }

    /// Returns the number of tags.
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    /// Returns `true` if there are no tags.
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Iterates over the tags in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Tag> {
        self.tags.iter()
    }

    /// Returns the canonical byte string for this tag set, or `None` if the
    /// set is empty.
    ///
    /// Tags are sorted by name (plain byte-wise comparison, no locale
    /// awareness) and rendered as `name=>value,` for each tag. Two tag sets
    /// describe the same measurement if and only if their canonical strings
    /// are byte-identical. The canonical string is only ever used as an
    /// aggregation key; it is never transmitted.
    pub fn canonical(&self) -> Option<Vec<u8>> {
        if self.tags.is_empty() {
            return None;
        }

        let mut sorted: Vec<&Tag> = self.tags.iter().collect();
        sorted.sort_by(|a, b| a.name.cmp(&b.name));

        let mut buf = Vec::with_capacity(self.tags.len() * 16);
        for tag in sorted {
            buf.extend_from_slice(tag.name.as_bytes());
            buf.extend_from_slice(b"=>");
            buf.extend_from_slice(tag.value.as_bytes());
            buf.push(b',');
        }
        Some(buf)
    }

    /// Returns a copy of this tag set with tags in canonical (name) order.
    pub(crate) fn sorted(&self) -> TagSet {
        let mut tags = self.tags.clone();
        tags.sort_by(|a, b| a.name.cmp(&b.name));
        TagSet { tags }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::{Tag, TagSet};
    use crate::error::InputError;

    fn pairs(input: &[(&str, &str)]) -> TagSet {
        TagSet::from_pairs(input.iter().copied()).unwrap()
    }

    #[test]
    fn canonical_renders_sorted_pairs() {
        let tags = pairs(&[("b", "2"), ("a", "1")]);
        assert_eq!(tags.canonical().unwrap(), b"a=>1,b=>2,".to_vec());
    }

    #[test]
    fn canonical_is_order_independent() {
        let forward = pairs(&[("a", "1"), ("b", "2")]);
        let reverse = pairs(&[("b", "2"), ("a", "1")]);
        assert_eq!(forward.canonical(), reverse.canonical());
    }

    #[test]
    fn canonical_of_empty_set_is_none() {
        assert_eq!(TagSet::new().canonical(), None);
    }

    #[test]
    fn empty_name_rejected() {
        assert_eq!(Tag::new("", "value").unwrap_err(), InputError::EmptyTagName);
    }

    #[test]
    fn insert_replaces_existing_name() {
        let mut tags = pairs(&[("group", "mysql")]);
        tags.insert(Tag::new("group", "pgsql").unwrap());

        assert_eq!(tags.len(), 1);
        assert_eq!(tags.get("group"), Some("pgsql"));
    }

    #[test]
    fn merge_upserts_pairs() {
        let mut tags = pairs(&[("group", "mysql"), ("server", "db1")]);
        tags.merge(pairs(&[("server", "db2"), ("op", "select")]));

        assert_eq!(tags.len(), 3);
        assert_eq!(tags.get("server"), Some("db2"));
        assert_eq!(tags.get("op"), Some("select"));
    }

    fn arb_entries() -> impl Strategy<Value = (Vec<(String, String)>, Vec<(String, String)>)> {
        proptest::collection::hash_map("[a-z]{1,8}", "[a-z0-9]{0,8}", 1..6)
            .prop_map(|m| m.into_iter().collect::<Vec<_>>())
            .prop_flat_map(|entries| (Just(entries.clone()), Just(entries).prop_shuffle()))
    }

    proptest! {
        #[test]
        fn canonical_ignores_insertion_order((entries, shuffled) in arb_entries()) {
            let forward = TagSet::from_pairs(entries).unwrap();
            let permuted = TagSet::from_pairs(shuffled).unwrap();

            prop_assert_eq!(forward.canonical(), permuted.canonical());
        }
    }
}
