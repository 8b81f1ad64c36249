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
    cmp::Ordering,
    fmt::{Debug, Display, Formatter},
};

use compact_str::CompactString;
use strsim::normalized_damerau_levenshtein;

const EPSILON: f32 = 0.0001;

/// A similarity score of two names in percents with fractional precision.
///
/// "100%" means that the names are equal, and "0%" means that they are
/// completely distinct. The unresolved call site errors use this score to
/// pick the visible names that the author probably meant.
#[repr(transparent)]
#[derive(Clone, Copy)]
pub struct Closeness(f32);

impl Debug for Closeness {
    #[inline(always)]
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, formatter)
    }
}

impl Display for Closeness {
    #[inline(always)]
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_fmt(format_args!("{}%", self.percents()))
    }
}

impl PartialEq for Closeness {
    #[inline(always)]
    fn eq(&self, other: &Self) -> bool {
        self.normalized().eq(&other.normalized())
    }
}

impl Eq for Closeness {}

impl PartialOrd for Closeness {
    #[inline(always)]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Closeness {
    #[inline]
    fn cmp(&self, other: &Self) -> Ordering {
        self.normalized().cmp(&other.normalized())
    }
}

impl Default for Closeness {
    #[inline(always)]
    fn default() -> Self {
        Self::zero()
    }
}

impl Closeness {
    #[inline(always)]
    pub const fn zero() -> Self {
        Self(0.0)
    }

    #[inline(always)]
    pub const fn half() -> Self {
        Self(0.5)
    }

    #[inline(always)]
    pub const fn one() -> Self {
        Self(1.0)
    }

    /// Estimates the similarity of the `name` to the `pattern`.
    #[inline]
    pub fn of(name: &str, pattern: &str) -> Self {
        let closeness = normalized_damerau_levenshtein(pattern, name);

        Self((closeness as f32 / EPSILON) as usize as f32 * EPSILON)
    }

    /// The underlying percentage rounded to the nearest integer.
    #[inline(always)]
    pub fn percents(self) -> u16 {
        ((self.0 * 1000.0).round() / 10.0) as u16
    }

    #[inline(always)]
    fn normalized(self) -> u32 {
        (self.0 / EPSILON) as u32
    }
}

/// Returns up to `limit` names from the `candidates` that are at least
/// `threshold` close to the `pattern`, the closest first.
pub(crate) fn suggest(
    pattern: &str,
    candidates: impl IntoIterator<Item = CompactString>,
    limit: usize,
    threshold: Closeness,
) -> Vec<CompactString> {
    let mut scored = candidates
        .into_iter()
        .filter(|candidate| candidate.as_str() != pattern)
        .map(|candidate| (Closeness::of(&candidate, pattern), candidate))
        .filter(|(closeness, _)| *closeness >= threshold)
        .collect::<Vec<_>>();

    scored.sort_by(|(a, a_name), (b, b_name)| b.cmp(a).then_with(|| a_name.cmp(b_name)));

    scored
        .into_iter()
        .take(limit)
        .map(|(_, candidate)| candidate)
        .collect()
}

#[cfg(test)]
mod tests {
    use compact_str::CompactString;

    use crate::semantics::closeness::{suggest, Closeness};

    #[test]
    fn test_closeness() {
        assert_eq!(Closeness::of("foo", "foo"), Closeness::one());
        assert_eq!(Closeness::of("foo", "aaa"), Closeness::zero());
        assert!(Closeness::of("lenght", "length") > Closeness::half());
    }

    #[test]
    fn test_suggestions() {
        let names = ["length", "lens", "width", "Length"].map(CompactString::new);

        let suggestions = suggest("lenght", names, 2, Closeness::half());

        assert_eq!(suggestions, vec![CompactString::new("length"), CompactString::new("Length")]);
    }
}
