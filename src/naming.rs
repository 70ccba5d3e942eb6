//! Slugs and sequential photo titles.
//!
//! Every gallery and photo has a URL-friendly slug derived from its title.
//! Bulk imports name photos `"{prefix} {n}"`; [`TitleSequence`] hands out
//! the next `n` whose slug is free both in the catalog and within the
//! current import run.
//!
//! ## Examples
//! - `"Summer Trip"` → `summer-trip`
//! - `"Trip 12"` → `trip-12`
//! - `"Café — Paris!"` → `cafe-paris`

use std::collections::HashSet;

/// Deterministic URL slug for a title.
pub fn slugify(title: &str) -> String {
    slug::slugify(title)
}

/// Photo title for sequence number `n`.
pub fn sequence_title(prefix: &str, n: u32) -> String {
    format!("{prefix} {n}")
}

/// A title handed out by [`TitleSequence::claim`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequencedTitle {
    pub number: u32,
    pub title: String,
    pub slug: String,
}

/// Monotonic title counter for one import run.
///
/// The counter never goes backwards and never hands out a slug twice, so
/// two entries that would naively get the same title receive strictly
/// increasing numbers.
#[derive(Debug)]
pub struct TitleSequence {
    prefix: String,
    next: u32,
    claimed: HashSet<String>,
}

impl TitleSequence {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            next: 1,
            claimed: HashSet::new(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The number the next probe will start from.
    pub fn next_number(&self) -> u32 {
        self.next
    }

    /// Whether this run already handed out `slug`.
    pub fn is_claimed(&self, slug: &str) -> bool {
        self.claimed.contains(slug)
    }

    /// Find the next free title, probing at most `max_probes` numbers.
    ///
    /// `taken` reports whether a slug already exists outside this run.
    /// Returns `Ok(None)` when every probed slug was taken.
    pub fn claim<E>(
        &mut self,
        max_probes: usize,
        mut taken: impl FnMut(&str) -> Result<bool, E>,
    ) -> Result<Option<SequencedTitle>, E> {
        for _ in 0..max_probes {
            let number = self.next;
            self.next += 1;

            let title = sequence_title(&self.prefix, number);
            let slug = slugify(&title);
            if self.claimed.contains(&slug) || taken(&slug)? {
                continue;
            }

            self.claimed.insert(slug.clone());
            return Ok(Some(SequencedTitle {
                number,
                title,
                slug,
            }));
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    fn free(_: &str) -> Result<bool, Infallible> {
        Ok(false)
    }

    #[test]
    fn slugify_lowercases_and_dashes() {
        assert_eq!(slugify("Summer Trip"), "summer-trip");
        assert_eq!(slugify("Trip 12"), "trip-12");
    }

    #[test]
    fn slugify_strips_punctuation_and_accents() {
        assert_eq!(slugify("Café — Paris!"), "cafe-paris");
    }

    #[test]
    fn slugify_punctuation_only_is_empty() {
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn sequence_title_joins_with_space() {
        assert_eq!(sequence_title("Trip", 3), "Trip 3");
    }

    #[test]
    fn claim_starts_at_one() {
        let mut seq = TitleSequence::new("Trip");
        let t = seq.claim(10, free).unwrap().unwrap();
        assert_eq!(t.number, 1);
        assert_eq!(t.title, "Trip 1");
        assert_eq!(t.slug, "trip-1");
    }

    #[test]
    fn consecutive_claims_strictly_increase() {
        let mut seq = TitleSequence::new("Trip");
        let a = seq.claim(10, free).unwrap().unwrap();
        let b = seq.claim(10, free).unwrap().unwrap();
        assert!(b.number > a.number);
        assert_ne!(a.slug, b.slug);
    }

    #[test]
    fn claim_skips_slugs_taken_in_catalog() {
        let existing = ["trip-1", "trip-2", "trip-4"];
        let mut seq = TitleSequence::new("Trip");
        let taken = |slug: &str| -> Result<bool, Infallible> { Ok(existing.contains(&slug)) };

        let a = seq.claim(10, taken).unwrap().unwrap();
        let b = seq.claim(10, taken).unwrap().unwrap();
        assert_eq!(a.title, "Trip 3");
        assert_eq!(b.title, "Trip 5");
    }

    #[test]
    fn claimed_slugs_are_remembered_for_the_run() {
        let mut seq = TitleSequence::new("Trip");
        let a = seq.claim(10, free).unwrap().unwrap();
        assert!(seq.is_claimed(&a.slug));
        assert!(!seq.is_claimed("trip-2"));
    }

    #[test]
    fn claim_gives_up_after_max_probes() {
        let mut seq = TitleSequence::new("Trip");
        let result = seq
            .claim(3, |_| -> Result<bool, Infallible> { Ok(true) })
            .unwrap();
        assert_eq!(result, None);
        assert_eq!(seq.next_number(), 4);
    }

    #[test]
    fn claim_propagates_lookup_error() {
        let mut seq = TitleSequence::new("Trip");
        let result = seq.claim(3, |_| Err("store down"));
        assert_eq!(result, Err("store down"));
    }
}
