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
    fmt::{Debug, Display, Formatter},
    hash::{Hash, Hasher},
};

use compact_str::CompactString;

use crate::{runtime::TypeMeta, symbols::DispatchKind};

/// The name of the fallback handler entry.
pub const MISSING_NAME: &str = "$missing";

/// The name of the entry that refers a module table to itself.
pub const HERE_NAME: &str = "$here";

/// A key of the symbol table: a dispatch kind, an optional receiver type,
/// and a name.
///
/// An entry without the target type is a global symbol that answers
/// lookups without a receiver.
///
/// Two entries are equal if their names, their target types, and the
/// target bits of their kinds are equal. The kind bits outside of the
/// [target mask](DispatchKind::TARGET_MASK) do not take part in the
/// comparison.
#[derive(Clone)]
pub struct SymbolEntry {
    kind: DispatchKind,
    target: Option<&'static TypeMeta>,
    name: CompactString,
}

impl PartialEq for SymbolEntry {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.kind.target() == other.kind.target()
            && self.target == other.target
            && self.name == other.name
    }
}

impl Eq for SymbolEntry {}

impl Hash for SymbolEntry {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind.target().hash(state);
        self.target.map(TypeMeta::index).hash(state);
        self.name.hash(state);
    }
}

impl Debug for SymbolEntry {
    #[inline(always)]
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, formatter)
    }
}

impl Display for SymbolEntry {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self.target {
            Some(target) => formatter.write_fmt(format_args!("{} {target}.{}", self.kind, self.name)),
            None => formatter.write_fmt(format_args!("{} {}", self.kind, self.name)),
        }
    }
}

impl SymbolEntry {
    #[inline(always)]
    pub fn new(
        kind: DispatchKind,
        target: Option<&'static TypeMeta>,
        name: impl Into<CompactString>,
    ) -> Self {
        Self {
            kind,
            target,
            name: name.into(),
        }
    }

    /// Creates a global entry without the target type.
    #[inline(always)]
    pub fn global(kind: DispatchKind, name: impl Into<CompactString>) -> Self {
        Self::new(kind, None, name)
    }

    /// Creates an entry whose target is the type itself rather than the
    /// values of the type: the key of static members and constructors.
    #[inline(always)]
    pub fn on_type(kind: DispatchKind, target: &'static TypeMeta, name: impl Into<CompactString>) -> Self {
        Self::new(kind, Some(TypeMeta::static_of(target)), name)
    }

    /// The key of the fallback handler that the dispatch engine invokes when
    /// a call site does not resolve otherwise.
    #[inline(always)]
    pub fn missing() -> Self {
        Self::global(DispatchKind::NONE, MISSING_NAME)
    }

    /// The key under which a module table refers to itself.
    #[inline(always)]
    pub fn here() -> Self {
        Self::global(DispatchKind::NONE, HERE_NAME)
    }

    #[inline(always)]
    pub fn kind(&self) -> DispatchKind {
        self.kind
    }

    #[inline(always)]
    pub fn target(&self) -> Option<&'static TypeMeta> {
        self.target
    }

    #[inline(always)]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true if this entry is the key of a special entry, such as
    /// the [missing](Self::missing) handler.
    #[inline(always)]
    pub fn is_special(&self) -> bool {
        self.name.starts_with('$')
    }
}

#[cfg(test)]
mod tests {
    use ahash::AHashSet;

    use crate::{
        runtime::TypeMeta,
        symbols::{DispatchKind, SymbolEntry},
    };

    #[test]
    fn test_entry_equality_ignores_modifiers() {
        let plain = SymbolEntry::new(DispatchKind::METHOD, Some(TypeMeta::string()), "Trim");
        let extended = SymbolEntry::new(
            DispatchKind::METHOD | DispatchKind::EXTENSION,
            Some(TypeMeta::string()),
            "Trim",
        );

        assert_eq!(plain, extended);

        let mut set = AHashSet::new();

        assert!(set.insert(plain.clone()));
        assert!(!set.insert(extended));

        assert_ne!(plain, SymbolEntry::new(DispatchKind::MEMBER, Some(TypeMeta::string()), "Trim"));
        assert_ne!(plain, SymbolEntry::global(DispatchKind::METHOD, "Trim"));
        assert_ne!(plain, SymbolEntry::new(DispatchKind::METHOD, Some(TypeMeta::object()), "Trim"));
    }

    #[test]
    fn test_entry_display() {
        assert_eq!(
            SymbolEntry::new(DispatchKind::METHOD, Some(TypeMeta::int32()), "+").to_string(),
            "Method Int32.+",
        );

        assert_eq!(SymbolEntry::missing().to_string(), "Any $missing");
        assert!(SymbolEntry::here().is_special());

        assert_eq!(
            SymbolEntry::on_type(DispatchKind::CONSTRUCTOR, TypeMeta::string(), "new").target(),
            Some(TypeMeta::static_of(TypeMeta::string())),
        );
    }
}
