////////////////////////////////////////////////////////////////////////////////
// This file is part of "Ad Astra", an embeddable scripting programming       //
// language platform.                                                         //
//                                                                            //
// This work is proprietary software with source-available code.              //
//                                                                            //
// To copy, use, distribute, or contribute to this work, you must agree to    //
// the terms of the General License Agreement:                                //
//                                                                            //
// https://github.com/Eliah-Lakhin/ad-astra/blob/master/EULA.md               //
//                                                                            //
// The agreement grants a Basic Commercial License, allowing you to use       //
// this work in non-commercial and limited commercial products with a total   //
// gross revenue cap. To remove this commercial limit for one of your         //
// products, you must acquire a Full Commercial License.                      //
//                                                                            //
// If you contribute to the source code, documentation, or related materials, //
// you must grant me an exclusive license to these contributions.             //
// Contributions are governed by the "Contributions" section of the General   //
// License Agreement.                                                         //
//                                                                            //
// Copying the work in parts is strictly forbidden, except as permitted       //
// under the General License Agreement.                                       //
//                                                                            //
// If you do not or cannot agree to the terms of this Agreement,              //
// do not use this work.                                                      //
//                                                                            //
// This work is provided "as is", without any warranties, express or implied, //
// except where such disclaimers are legally invalid.                         //
//                                                                            //
// Copyright (c) 2024 Ilya Lakhin (Илья Александрович Лахин).                 //
// All rights reserved.                                                       //
////////////////////////////////////////////////////////////////////////////////

use std::{
    fmt::{Debug, Formatter},
    sync::{Arc, OnceLock, RwLock, Weak},
};

use ahash::AHashMap;
use compact_str::CompactString;
use log::{debug, trace};

use crate::{
    library::build_root,
    report::SYMBOLS_LOG,
    semantics::{ReduceError, ReduceResult},
    symbols::{SymbolDefinition, SymbolEntry},
    sync::{read, write},
    tree::Expr,
};

static ROOT: OnceLock<SymbolTable> = OnceLock::new();

/// A scoped dictionary of dispatchable symbols.
///
/// Each table has a fixed list of ancestor tables. The table itself
/// together with its ancestors forms the [chain](Self::chain) that the
/// chain-wide lookups walk in order: the table first, then the ancestors
/// in the order of the parents, with the shared [Root](Self::root) table
/// at the end.
///
/// The chain is computed once when the table is created. Entries added to
/// the ancestors later are visible through the chain, but the set of
/// ancestors never changes.
///
/// Cloning a table clones a shared reference to it.
#[derive(Clone)]
pub struct SymbolTable(Arc<TableData>);

struct TableData {
    parents: Vec<SymbolTable>,
    ancestors: Vec<SymbolTable>,
    module: bool,
    entries: RwLock<AHashMap<SymbolEntry, SymbolDefinition>>,
}

impl Debug for SymbolTable {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("SymbolTable")
            .field("entries", &self.len())
            .field("ancestors", &self.0.ancestors.len())
            .field("module", &self.0.module)
            .field("read_only", &self.is_read_only())
            .finish()
    }
}

impl SymbolTable {
    /// Returns the shared Root table with the built-in symbols.
    ///
    /// The Root is built by [build_root] on the first access. Once the Root
    /// exists, it is read-only, and every new table created without parents
    /// receives the Root as its only parent.
    #[inline(always)]
    pub fn root() -> &'static SymbolTable {
        ROOT.get_or_init(|| {
            debug!(target: SYMBOLS_LOG, "Building Root symbol table.");

            build_root()
        })
    }

    /// Returns true if the Root table has been built already.
    #[inline(always)]
    pub fn root_exists() -> bool {
        ROOT.get().is_some()
    }

    /// Creates a new table with the specified parents.
    ///
    /// If the parents list is empty and the Root already exists, the Root
    /// becomes the only parent.
    pub fn new(parents: Vec<SymbolTable>) -> Self {
        Self::with_flags(parents, false)
    }

    /// Creates a new module table.
    ///
    /// A module table owns the `$here` entry that reduces to a
    /// [Module](crate::tree::ExprKind::Module) expression referring to the
    /// table itself. Such an expression acts as a namespace: call sites with
    /// the module receiver are resolved in the module table.
    pub fn module(parents: Vec<SymbolTable>) -> Self {
        let table = Self::with_flags(parents, true);

        let this = Arc::downgrade(&table.0);

        let _ = write(&table.0.entries).insert(SymbolEntry::here(), here_definition(this));

        table
    }

    /// Creates a child table of this table.
    #[inline(always)]
    pub fn child(&self) -> Self {
        Self::new(vec![self.clone()])
    }

    /// Returns true if this table is the module table.
    #[inline(always)]
    pub fn is_module(&self) -> bool {
        self.0.module
    }

    /// Returns true if the table cannot be modified.
    ///
    /// A table is read-only if it has no parents and the Root exists. In
    /// particular, the Root itself is read-only once it is built.
    #[inline(always)]
    pub fn is_read_only(&self) -> bool {
        self.0.parents.is_empty() && Self::root_exists()
    }

    /// The direct parents of this table.
    #[inline(always)]
    pub fn parents(&self) -> &[SymbolTable] {
        &self.0.parents
    }

    /// Returns this table followed by all of its ancestors in the lookup
    /// order.
    pub fn chain(&self) -> Vec<SymbolTable> {
        let mut chain = Vec::with_capacity(self.0.ancestors.len() + 1);

        chain.push(self.clone());
        chain.extend(self.0.ancestors.iter().cloned());

        chain
    }

    /// Returns true if both handles refer to the same table.
    #[inline(always)]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Adds the symbol to this table, replacing the previous definition of
    /// the same entry.
    ///
    /// Fails with the InvalidOperation error if the table is read-only.
    #[inline(always)]
    pub fn add(&self, entry: SymbolEntry, definition: SymbolDefinition) -> ReduceResult<()> {
        let _ = self.insert(entry, definition)?;

        Ok(())
    }

    /// Sets the definition of the entry, and returns the previous
    /// definition of the entry in this table if any.
    pub fn insert(
        &self,
        entry: SymbolEntry,
        definition: SymbolDefinition,
    ) -> ReduceResult<Option<SymbolDefinition>> {
        self.check_writable("add a symbol to")?;

        trace!(target: SYMBOLS_LOG, "Adding symbol '{entry}'.");

        Ok(write(&self.0.entries).insert(entry, definition))
    }

    /// Removes the entry from this table, and returns its definition.
    pub fn remove(&self, entry: &SymbolEntry) -> ReduceResult<Option<SymbolDefinition>> {
        self.check_writable("remove a symbol from")?;

        Ok(write(&self.0.entries).remove(entry))
    }

    /// Returns the definition of the entry from this table only.
    ///
    /// Fails with the KeyNotFound error if this table does not contain the
    /// entry. The ancestors are not searched.
    pub fn get(&self, entry: &SymbolEntry) -> ReduceResult<SymbolDefinition> {
        match read(&self.0.entries).get(entry) {
            Some(definition) => Ok(definition.clone()),

            None => Err(ReduceError::KeyNotFound {
                entry: entry.clone(),
            }),
        }
    }

    /// Returns true if this table contains the entry. The ancestors are not
    /// searched.
    #[inline(always)]
    pub fn contains_key(&self, entry: &SymbolEntry) -> bool {
        read(&self.0.entries).contains_key(entry)
    }

    /// Returns true if any table of the chain contains the entry.
    #[inline(always)]
    pub fn exists_key(&self, entry: &SymbolEntry) -> bool {
        self.walk().any(|table| table.contains_key(entry))
    }

    /// Looks up the exact entry in the chain, and returns the definition
    /// from the first table that contains the entry.
    ///
    /// Fails with the SymbolNotFound error if no table in the chain contains
    /// the entry.
    pub fn resolve(&self, entry: &SymbolEntry) -> ReduceResult<SymbolDefinition> {
        match self.try_resolve(entry) {
            Some(definition) => Ok(definition),

            None => Err(ReduceError::SymbolNotFound {
                entry: entry.clone(),
            }),
        }
    }

    /// Looks up the exact entry in the chain, and returns None if no table
    /// contains the entry.
    pub fn try_resolve(&self, entry: &SymbolEntry) -> Option<SymbolDefinition> {
        for table in self.walk() {
            if let Some(definition) = read(&table.0.entries).get(entry) {
                return Some(definition.clone());
            }
        }

        None
    }

    /// Finds the best matching symbol in this table only.
    ///
    /// A local entry is a candidate if its name equals the query name, its
    /// kind [covers](crate::symbols::DispatchKind::covers) the query kind,
    /// and its target type matches the query target type: either both are
    /// absent, or the query type converts to the entry type (see
    /// [dispatch_distance](crate::runtime::TypeMeta::dispatch_distance)).
    ///
    /// The candidate with the lowest type distance wins. Among candidates
    /// with equal distances, an entry of the exact kind wins over a
    /// wildcard entry. If the best candidates are still indistinguishable,
    /// the function fails with the AmbiguousMatch error.
    pub fn match_entry(&self, query: &SymbolEntry) -> ReduceResult<Option<SymbolDefinition>> {
        let entries = read(&self.0.entries);

        let mut candidates = Vec::new();

        for (entry, definition) in entries.iter() {
            if entry.name() != query.name() || !entry.kind().covers(query.kind()) {
                continue;
            }

            let distance = match (entry.target(), query.target()) {
                (None, None) => 0,

                (Some(target), Some(actual)) => match target.dispatch_distance(actual) {
                    Some(distance) => distance,
                    None => continue,
                },

                _ => continue,
            };

            let rank = (distance, entry.kind().is_wildcard());

            candidates.push((rank, entry, definition));
        }

        candidates.sort_by_key(|(rank, _, _)| *rank);

        let mut candidates = candidates.into_iter();

        let Some((best, entry, definition)) = candidates.next() else {
            return Ok(None);
        };

        let ties = candidates.filter(|(rank, _, _)| *rank == best).count();

        if ties > 0 {
            return Err(ReduceError::AmbiguousMatch {
                subject: CompactString::from(query.to_string()),
                candidates: ties + 1,
            });
        }

        trace!(target: SYMBOLS_LOG, "Symbol '{query}' matches '{entry}'.");

        Ok(Some(definition.clone()))
    }

    /// Finds the best matching symbol in the chain.
    ///
    /// Each table of the chain is asked for its local
    /// [match](Self::match_entry) in order, and the first found match wins
    /// even if a farther table has a closer match.
    pub fn resolve_match(&self, query: &SymbolEntry) -> ReduceResult<Option<SymbolDefinition>> {
        for table in self.walk() {
            if let Some(definition) = table.match_entry(query)? {
                return Ok(Some(definition));
            }
        }

        Ok(None)
    }

    /// The number of entries in this table.
    #[inline(always)]
    pub fn len(&self) -> usize {
        read(&self.0.entries).len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the entries of this table.
    pub fn entries(&self) -> Vec<(SymbolEntry, SymbolDefinition)> {
        read(&self.0.entries)
            .iter()
            .map(|(entry, definition)| (entry.clone(), definition.clone()))
            .collect()
    }

    /// Returns the distinct names of the non-special entries visible
    /// through the chain.
    pub fn visible_names(&self) -> Vec<CompactString> {
        let mut names = Vec::<CompactString>::new();

        for table in self.walk() {
            for entry in read(&table.0.entries).keys() {
                if entry.is_special() || names.iter().any(|name| name.as_str() == entry.name()) {
                    continue;
                }

                names.push(CompactString::new(entry.name()));
            }
        }

        names
    }

    fn with_flags(mut parents: Vec<SymbolTable>, module: bool) -> Self {
        let root = ROOT.get();

        if parents.is_empty() {
            if let Some(root) = root {
                parents.push(root.clone());
            }
        }

        let mut ancestors = Vec::<SymbolTable>::new();

        for parent in &parents {
            for table in parent.walk() {
                if !ancestors.iter().any(|known| known.ptr_eq(table)) {
                    ancestors.push(table.clone());
                }
            }
        }

        if let Some(root) = root {
            if let Some(position) = ancestors.iter().position(|table| table.ptr_eq(root)) {
                let root = ancestors.remove(position);

                ancestors.push(root);
            }
        }

        Self(Arc::new(TableData {
            parents,
            ancestors,
            module,
            entries: RwLock::new(AHashMap::new()),
        }))
    }

    #[inline(always)]
    fn walk(&self) -> impl Iterator<Item = &SymbolTable> {
        std::iter::once(self).chain(self.0.ancestors.iter())
    }

    #[inline(always)]
    fn check_writable(&self, operation: &'static str) -> ReduceResult<()> {
        if self.is_read_only() {
            return Err(ReduceError::InvalidOperation { operation });
        }

        Ok(())
    }
}

fn here_definition(table: Weak<TableData>) -> SymbolDefinition {
    SymbolDefinition::new(move |_, _, _| match table.upgrade() {
        Some(data) => Ok(Expr::module(SymbolTable(data))),

        None => Err(ReduceError::InvalidOperation {
            operation: "refer to a dropped module",
        }),
    })
}

#[cfg(test)]
mod tests {
    use semver::Version;

    use crate::{
        runtime::{Domain, TypeMeta},
        semantics::ReduceError,
        symbols::{DispatchKind, SymbolDefinition, SymbolEntry, SymbolTable},
        tree::{Expr, ExprKind},
    };

    // Tables without parents become read-only once the Root exists, so the
    // Root is built before any test table.
    fn table() -> SymbolTable {
        let _ = SymbolTable::root();

        SymbolTable::new(Vec::new())
    }

    fn constant(value: i32) -> SymbolDefinition {
        SymbolDefinition::literal(Expr::constant(value))
    }

    fn evaluate(definition: &SymbolDefinition, table: &SymbolTable) -> i32 {
        let result = definition.invoke(&Expr::ident("test"), table, None).unwrap();

        match result.kind() {
            ExprKind::Constant(node) => node.value.as_i32().unwrap(),
            _ => panic!("unexpected result {result}"),
        }
    }

    #[test]
    fn test_chain_order() {
        let p1 = table();
        let p2 = table();
        let shared = p1.child();
        let left = SymbolTable::new(vec![shared.clone(), p2.clone()]);
        let table = SymbolTable::new(vec![left.clone(), p2.clone()]);

        let chain = table.chain();

        assert!(chain[0].ptr_eq(&table));
        assert!(chain[1].ptr_eq(&left));
        assert!(chain[2].ptr_eq(&shared));
        assert!(chain[3].ptr_eq(&p1));
        assert!(chain[4].ptr_eq(&p2));
        assert!(chain.last().unwrap().ptr_eq(SymbolTable::root()));
        assert_eq!(chain.len(), 6);

        let entry = SymbolEntry::global(DispatchKind::MEMBER, "late");

        p2.add(entry.clone(), constant(1)).unwrap();

        assert!(table.exists_key(&entry));
        assert!(!table.contains_key(&entry));
        assert_eq!(table.chain().len(), 6);
    }

    #[test]
    fn test_read_only_root() {
        let root = SymbolTable::root();

        assert!(root.is_read_only());
        assert!(matches!(
            root.add(SymbolEntry::global(DispatchKind::METHOD, "f"), constant(1)),
            Err(ReduceError::InvalidOperation { .. }),
        ));

        let child = SymbolTable::new(Vec::new());

        assert!(!child.is_read_only());
        assert!(child.parents()[0].ptr_eq(root));
        assert!(child.add(SymbolEntry::global(DispatchKind::METHOD, "f"), constant(1)).is_ok());
    }

    #[test]
    fn test_exact_resolution() {
        let parent = table();
        let child = parent.child();

        let entry = SymbolEntry::global(DispatchKind::MEMBER, "x");

        parent.add(entry.clone(), constant(1)).unwrap();

        assert!(matches!(child.get(&entry), Err(ReduceError::KeyNotFound { .. })));
        assert_eq!(evaluate(&child.resolve(&entry).unwrap(), &child), 1);

        child.add(entry.clone(), constant(2)).unwrap();

        assert_eq!(evaluate(&child.resolve(&entry).unwrap(), &child), 2);
        assert_eq!(evaluate(&child.get(&entry).unwrap(), &child), 2);

        let entries = child.entries();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0, entry);
        assert_eq!(evaluate(&entries[0].1, &child), 2);

        let _ = child.remove(&entry).unwrap();

        assert!(child.entries().is_empty());
        assert_eq!(parent.entries().len(), 1);

        assert_eq!(evaluate(&child.resolve(&entry).unwrap(), &child), 1);

        let absent = SymbolEntry::global(DispatchKind::MEMBER, "absent");

        assert!(child.try_resolve(&absent).is_none());
        assert!(matches!(
            child.resolve(&absent),
            Err(ReduceError::SymbolNotFound { .. }),
        ));
    }

    #[test]
    fn test_fuzzy_resolution() {
        let assembly = Domain::get().define_assembly("table_tests", Version::new(1, 0, 0));

        let base = assembly.build_type("Base").build();
        let derived = assembly.build_type("Derived").base(base).build();
        let leaf = assembly.build_type("Leaf").base(derived).build();

        let table = self::table();

        table
            .add(SymbolEntry::new(DispatchKind::METHOD, Some(base), "f"), constant(1))
            .unwrap();

        let query = SymbolEntry::new(DispatchKind::METHOD, Some(derived), "f");

        assert!(matches!(table.resolve(&query), Err(ReduceError::SymbolNotFound { .. })));
        assert_eq!(evaluate(&table.resolve_match(&query).unwrap().unwrap(), &table), 1);

        table
            .add(SymbolEntry::new(DispatchKind::METHOD, Some(derived), "f"), constant(2))
            .unwrap();
        table
            .add(
                SymbolEntry::new(DispatchKind::METHOD, Some(TypeMeta::object()), "f"),
                constant(3),
            )
            .unwrap();

        let matched = |actual| {
            let query = SymbolEntry::new(DispatchKind::METHOD, Some(actual), "f");

            evaluate(&table.match_entry(&query).unwrap().unwrap(), &table)
        };

        assert_eq!(matched(leaf), 2);
        assert_eq!(matched(derived), 2);
        assert_eq!(matched(base), 1);
        assert_eq!(matched(TypeMeta::string()), 3);

        let member = SymbolEntry::new(DispatchKind::MEMBER, Some(derived), "f");

        assert!(table.match_entry(&member).unwrap().is_none());

        let global = SymbolEntry::global(DispatchKind::METHOD, "f");

        assert!(table.match_entry(&global).unwrap().is_none());
    }

    #[test]
    fn test_chain_order_dominates_distance() {
        let assembly = Domain::get().define_assembly("table_tests", Version::new(1, 0, 0));

        let animal = assembly.build_type("Animal").build();
        let cat = assembly.build_type("Cat").base(animal).build();

        let parent = table();
        let child = parent.child();

        parent
            .add(SymbolEntry::new(DispatchKind::METHOD, Some(cat), "speak"), constant(1))
            .unwrap();
        child
            .add(SymbolEntry::new(DispatchKind::METHOD, Some(animal), "speak"), constant(2))
            .unwrap();

        let query = SymbolEntry::new(DispatchKind::METHOD, Some(cat), "speak");

        assert_eq!(evaluate(&child.resolve_match(&query).unwrap().unwrap(), &child), 2);
    }

    #[test]
    fn test_static_wrapper_matching() {
        let table = self::table();

        table
            .add(
                SymbolEntry::new(DispatchKind::METHOD, Some(TypeMeta::object()), "describe"),
                constant(1),
            )
            .unwrap();

        let on_type = SymbolEntry::on_type(DispatchKind::METHOD, TypeMeta::string(), "describe");

        assert!(table.match_entry(&on_type).unwrap().is_none());

        table
            .add(
                SymbolEntry::on_type(DispatchKind::METHOD, TypeMeta::object(), "describe"),
                constant(2),
            )
            .unwrap();

        assert_eq!(evaluate(&table.match_entry(&on_type).unwrap().unwrap(), &table), 2);
    }

    #[test]
    fn test_wildcard_and_ambiguity() {
        let table = self::table();

        table
            .add(SymbolEntry::global(DispatchKind::NONE, "g"), constant(1))
            .unwrap();

        let method = SymbolEntry::global(DispatchKind::METHOD, "g");

        assert_eq!(evaluate(&table.match_entry(&method).unwrap().unwrap(), &table), 1);

        table.add(method.clone(), constant(2)).unwrap();

        assert_eq!(evaluate(&table.match_entry(&method).unwrap().unwrap(), &table), 2);

        table
            .add(
                SymbolEntry::global(DispatchKind::METHOD | DispatchKind::MEMBER, "g"),
                constant(3),
            )
            .unwrap();

        assert!(matches!(
            table.match_entry(&method),
            Err(ReduceError::AmbiguousMatch { candidates: 2, .. }),
        ));
    }

    #[test]
    fn test_module_here() {
        let module = SymbolTable::module(Vec::new());

        assert!(module.is_module());

        let here = module.resolve(&SymbolEntry::here()).unwrap();
        let result = here.invoke(&Expr::ident("$here"), &module, None).unwrap();

        match result.kind() {
            ExprKind::Module(node) => assert!(node.table.ptr_eq(&module)),
            _ => panic!("unexpected result {result}"),
        }
    }
}
