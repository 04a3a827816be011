//! String interning for identifiers (variable, function, struct, namespace names).
//!
//! Grounded on the teacher's `intern.rs`: identifiers that get compared and hashed
//! repeatedly during evaluation (variable lookups, member names, namespace paths)
//! are interned once into an `Interns` table and referred to by the cheap, `Copy`
//! `StringId` afterward rather than passed around as owned `String`s.

use ahash::AHashMap;

/// A handle into an `Interns` table.
///
/// `Copy` and cheap to hash/compare; the backing string is only reachable through
/// the `Interns` that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct StringId(u32);

impl StringId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Owns the backing storage for every interned string produced during a run.
#[derive(Debug, Default)]
pub struct Interns {
    strings: Vec<Box<str>>,
    lookup: AHashMap<Box<str>, StringId>,
}

impl Interns {
    pub fn new() -> Self {
        Self::default()
    }

    /// Interns `s`, returning the existing id if already known.
    pub fn intern(&mut self, s: &str) -> StringId {
        if let Some(&id) = self.lookup.get(s) {
            return id;
        }
        let id = StringId(self.strings.len().try_into().expect("too many interned strings"));
        let boxed: Box<str> = s.into();
        self.strings.push(boxed.clone());
        self.lookup.insert(boxed, id);
        id
    }

    /// Resolves an id back to its string slice.
    ///
    /// Panics if `id` was not produced by this table - an `Internal` engine bug,
    /// never a user-facing condition.
    #[inline]
    pub fn resolve(&self, id: StringId) -> &str {
        &self.strings[id.index()]
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_dedupes() {
        let mut interns = Interns::new();
        let a = interns.intern("foo");
        let b = interns.intern("foo");
        let c = interns.intern("bar");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(interns.resolve(a), "foo");
        assert_eq!(interns.resolve(c), "bar");
    }
}
