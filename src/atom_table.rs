//! Interned atoms.

use std::fmt;
use std::mem;

use fxhash::FxBuildHasher;
use indexmap::IndexSet;
use lazy_static::lazy_static;
use parking_lot::RwLock;

/// An interned atom name.
///
/// Atoms are process-wide: the same name always yields the same `Atom`, in
/// every engine instance and on every thread. Interned names are never freed.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Atom {
    index: u32,
}

const_assert!(mem::size_of::<Atom>() == 4);

type AtomSet = IndexSet<&'static str, FxBuildHasher>;

lazy_static! {
    static ref ATOM_TABLE: RwLock<AtomSet> = RwLock::new(AtomSet::default());
}

impl Atom {
    /// Interns `name`, returning its atom.
    pub fn intern(name: &str) -> Self {
        if let Some(index) = ATOM_TABLE.read().get_index_of(name) {
            return Atom {
                index: index as u32,
            };
        }

        let mut table = ATOM_TABLE.write();

        // another thread may have won the race between the two locks.
        if let Some(index) = table.get_index_of(name) {
            return Atom {
                index: index as u32,
            };
        }

        let name: &'static str = Box::leak(name.to_owned().into_boxed_str());
        let (index, _) = table.insert_full(name);

        Atom {
            index: index as u32,
        }
    }

    /// The name this atom was interned from.
    #[inline]
    pub fn as_str(self) -> &'static str {
        ATOM_TABLE
            .read()
            .get_index(self.index as usize)
            .copied()
            .unwrap_or("")
    }

    /// True if the atom names a single character.
    #[inline]
    pub fn is_char(self) -> bool {
        is_char!(self.as_str())
    }

    /// The character of a one-character atom.
    pub fn as_char(self) -> Option<char> {
        let mut chars = self.as_str().chars();

        match (chars.next(), chars.next()) {
            (Some(c), None) => Some(c),
            _ => None,
        }
    }

    pub(crate) fn char_atom(c: char) -> Self {
        let mut buf = [0u8; 4];
        Atom::intern(c.encode_utf8(&mut buf))
    }

    /// The name rendered with quotes where Prolog syntax requires them.
    pub fn quoted(self) -> String {
        quote_atom(self.as_str())
    }
}

impl From<&str> for Atom {
    #[inline]
    fn from(name: &str) -> Self {
        Atom::intern(name)
    }
}

impl From<bool> for Atom {
    #[inline]
    fn from(value: bool) -> Self {
        if value {
            atom!("true")
        } else {
            atom!("false")
        }
    }
}

impl fmt::Debug for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "atom!({:?})", self.as_str())
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn is_solo(name: &str) -> bool {
    matches!(name, "[]" | "!" | ";" | "{}" | ",")
}

fn is_symbol_char(c: char) -> bool {
    "+-*/\\^<>=~:.?@#&$".contains(c)
}

pub(crate) fn quote_atom(name: &str) -> String {
    let mut chars = name.chars();

    let needs_quotes = match chars.next() {
        None => true,
        Some(c) if c.is_lowercase() => !chars.all(|c| c.is_alphanumeric() || c == '_'),
        Some(_) if is_solo(name) => name == ",",
        Some(c) if is_symbol_char(c) => name == "." || !chars.all(is_symbol_char),
        Some(_) => true,
    };

    if !needs_quotes {
        return name.to_owned();
    }

    let mut quoted = String::with_capacity(name.len() + 2);
    quoted.push('\'');

    for c in name.chars() {
        match c {
            '\'' => quoted.push_str("\\'"),
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            '\t' => quoted.push_str("\\t"),
            c => quoted.push(c),
        }
    }

    quoted.push('\'');
    quoted
}
