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
    ops::BitOr,
};

use serde::{Deserialize, Serialize};

/// A coarse category of a symbol lookup: member access, method call, or
/// constructor call.
///
/// The kind is a set of flags. The bits inside the
/// [TARGET_MASK](Self::TARGET_MASK) describe the dispatch target, and take
/// part in the [SymbolEntry](crate::symbols::SymbolEntry) equality. The
/// bits outside of the mask are lookup modifiers.
///
/// A symbol registered with the [NONE](Self::NONE) kind is a wildcard that
/// matches lookups of any kind.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct DispatchKind(u8);

impl Debug for DispatchKind {
    #[inline(always)]
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, formatter)
    }
}

impl Display for DispatchKind {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        if self.target().0 == 0 {
            formatter.write_str("Any")?;
        }

        let mut first = self.target().0 != 0;

        for (flag, name) in [
            (Self::MEMBER, "Member"),
            (Self::METHOD, "Method"),
            (Self::CONSTRUCTOR, "Constructor"),
            (Self::EXTENSION, "Extension"),
        ] {
            if !self.contains(flag) {
                continue;
            }

            if !first {
                formatter.write_str("|")?;
            }

            formatter.write_str(name)?;

            first = false;
        }

        Ok(())
    }
}

impl BitOr for DispatchKind {
    type Output = Self;

    #[inline(always)]
    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

impl DispatchKind {
    pub const NONE: Self = Self(0);
    pub const MEMBER: Self = Self(0x01);
    pub const METHOD: Self = Self(0x02);
    pub const CONSTRUCTOR: Self = Self(0x04);

    /// The bits that describe the dispatch target.
    pub const TARGET_MASK: Self = Self(0x0F);

    /// Allows the reflection fallback to resolve a method call through a
    /// static method whose first parameter accepts the receiver.
    pub const EXTENSION: Self = Self(0x10);

    #[inline(always)]
    pub const fn bits(self) -> u8 {
        self.0
    }

    #[inline(always)]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    /// Returns the target bits of this kind.
    #[inline(always)]
    pub const fn target(self) -> Self {
        Self(self.0 & Self::TARGET_MASK.0)
    }

    /// Returns true if all bits of the `other` kind are set in this kind.
    #[inline(always)]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }

    /// Returns true if this kind has no target bits, and therefore matches
    /// lookups of any kind.
    #[inline(always)]
    pub const fn is_wildcard(self) -> bool {
        self.target().0 == 0
    }

    /// Returns true if a symbol registered with this kind answers a lookup
    /// of the `query` kind: this kind is a wildcard, or its target bits are
    /// a superset of the query target bits.
    #[inline(always)]
    pub const fn covers(self, query: Self) -> bool {
        let own = self.target().0;
        let query = query.target().0;

        own == 0 || own & query == query
    }
}

#[cfg(test)]
mod tests {
    use crate::symbols::DispatchKind;

    #[test]
    fn test_dispatch_kind_covering() {
        assert!(DispatchKind::NONE.covers(DispatchKind::METHOD));
        assert!(DispatchKind::METHOD.covers(DispatchKind::METHOD));
        assert!(!DispatchKind::METHOD.covers(DispatchKind::MEMBER));

        let both = DispatchKind::MEMBER | DispatchKind::METHOD;

        assert!(both.covers(DispatchKind::MEMBER));
        assert!(both.covers(DispatchKind::METHOD));
        assert!(!DispatchKind::MEMBER.covers(both));

        let extension = DispatchKind::METHOD | DispatchKind::EXTENSION;

        assert_eq!(extension.target(), DispatchKind::METHOD);
        assert!(DispatchKind::METHOD.covers(extension));
        assert!(extension.contains(DispatchKind::EXTENSION));
    }

    #[test]
    fn test_dispatch_kind_display() {
        assert_eq!(DispatchKind::NONE.to_string(), "Any");
        assert_eq!(DispatchKind::METHOD.to_string(), "Method");
        assert_eq!(
            (DispatchKind::MEMBER | DispatchKind::METHOD).to_string(),
            "Member|Method",
        );
        assert_eq!(
            (DispatchKind::NONE | DispatchKind::EXTENSION).to_string(),
            "Any|Extension",
        );
    }
}
