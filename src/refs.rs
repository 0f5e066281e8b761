//! Append-only Referenztabellen.
//!
//! Eine Decoding-Session hält drei dieser Arenen: Klassendefinitionen,
//! Objekt-Rückreferenzen und Typnamen. Indizes werden in strikter
//! Stream-Reihenfolge vergeben und nie wiederverwendet; ein fehlgeschlagener
//! Decode verwirft die Tabellen einfach.

use crate::{Error, Result};

#[derive(Debug)]
pub(crate) struct RefTable<T> {
    name: &'static str,
    entries: Vec<T>,
}

impl<T> RefTable<T> {
    pub fn new(name: &'static str) -> Self {
        RefTable { name, entries: Vec::new() }
    }

    /// Hängt einen Eintrag an und vergibt den nächsten Index.
    pub fn add(&mut self, entry: T) {
        self.entries.push(entry);
    }

    /// Schlägt einen vom Draht gelesenen Index nach. Negative und
    /// außerhalb liegende Indizes schlagen mit `InvalidReference` fehl.
    pub fn get(&self, index: i32) -> Result<&T> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.entries.get(i))
            .ok_or(Error::InvalidReference {
                table: self.name,
                index: i64::from(index),
                len: self.entries.len(),
            })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_assigned_in_insertion_order() {
        let mut table = RefTable::new("test");
        table.add("a");
        table.add("b");
        assert_eq!(table.len(), 2);
        assert_eq!(*table.get(0).unwrap(), "a");
        assert_eq!(*table.get(1).unwrap(), "b");
    }

    #[test]
    fn out_of_range_index_fails_with_table_name() {
        let mut table = RefTable::new("class definition");
        table.add(());
        assert_eq!(
            table.get(1).unwrap_err(),
            Error::InvalidReference { table: "class definition", index: 1, len: 1 }
        );
    }

    #[test]
    fn negative_index_fails() {
        let table: RefTable<u8> = RefTable::new("object");
        assert_eq!(
            table.get(-1).unwrap_err(),
            Error::InvalidReference { table: "object", index: -1, len: 0 }
        );
    }
}
