//! Pieces a picker has to fetch for the identified kit.

/// One line of the kit list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchItem {
    /// Piece reference.
    pub reference: String,
    /// Units requested.
    pub quantity: u32,
    /// Units still to pick.
    pub remaining: u32,
}

impl FetchItem {
    /// Whether every unit was picked.
    pub fn is_complete(&self) -> bool {
        self.remaining == 0
    }
}

/// Result of picking one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The reference is not on the list, or already complete.
    NotListed,
    /// One unit picked; more remain for this reference.
    Picked {
        /// Units still to pick.
        remaining: u32,
    },
    /// The reference is now complete.
    Completed,
}

/// Kit list with optional ordering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchList {
    items: Vec<FetchItem>,
    ordered: bool,
}

impl FetchList {
    /// Build from `(reference, quantity)` pairs; repeated references are merged.
    ///
    /// Zero quantities are dropped.
    pub fn new<I, S>(pieces: I) -> Self
    where
        I: IntoIterator<Item = (S, u32)>,
        S: Into<String>,
    {
        let mut items: Vec<FetchItem> = Vec::new();
        for (reference, quantity) in pieces {
            let reference = reference.into();
            if quantity == 0 || reference.is_empty() {
                continue;
            }
            match items.iter_mut().find(|i| i.reference == reference) {
                Some(existing) => {
                    existing.quantity = existing.quantity.saturating_add(quantity);
                    existing.remaining = existing.remaining.saturating_add(quantity);
                }
                None => items.push(FetchItem {
                    reference,
                    quantity,
                    remaining: quantity,
                }),
            }
        }
        Self {
            items,
            ordered: false,
        }
    }

    /// Items in list order.
    pub fn items(&self) -> &[FetchItem] {
        &self.items
    }

    /// Whether pieces must be fetched in list order.
    pub fn is_ordered(&self) -> bool {
        self.ordered
    }

    /// Switch between ordered and unordered fetching.
    pub fn set_ordered(&mut self, ordered: bool) {
        self.ordered = ordered;
    }

    /// Whether `reference` still has units to pick.
    pub fn is_pending(&self, reference: &str) -> bool {
        self.items
            .iter()
            .any(|i| i.reference == reference && !i.is_complete())
    }

    /// First reference with units left, in ordered mode.
    pub fn next_reference(&self) -> Option<&str> {
        if !self.ordered {
            return None;
        }
        self.items
            .iter()
            .find(|i| !i.is_complete())
            .map(|i| i.reference.as_str())
    }

    /// Whether an object holding `reference` should be shown.
    pub fn should_show(&self, reference: &str) -> bool {
        match self.next_reference() {
            Some(next) => next == reference,
            None => !self.ordered && self.is_pending(reference),
        }
    }

    /// Pick one unit of `reference`.
    ///
    /// In ordered mode only the next reference can be picked.
    pub fn fetch(&mut self, reference: &str) -> FetchOutcome {
        if self.ordered && self.next_reference() != Some(reference) {
            return FetchOutcome::NotListed;
        }
        let Some(item) = self
            .items
            .iter_mut()
            .find(|i| i.reference == reference && !i.is_complete())
        else {
            return FetchOutcome::NotListed;
        };
        item.remaining -= 1;
        if item.is_complete() {
            FetchOutcome::Completed
        } else {
            FetchOutcome::Picked {
                remaining: item.remaining,
            }
        }
    }

    /// `(completed items, total items)`.
    pub fn progress(&self) -> (usize, usize) {
        let done = self.items.iter().filter(|i| i.is_complete()).count();
        (done, self.items.len())
    }

    /// Whether every item is complete; an empty list is never complete.
    pub fn is_complete(&self) -> bool {
        !self.items.is_empty() && self.items.iter().all(FetchItem::is_complete)
    }

    /// Whether there is nothing on the list.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merges_duplicates_and_drops_zero() {
        let list = FetchList::new([("REF1", 2), ("REF2", 0), ("REF1", 1)]);
        assert_eq!(list.items().len(), 1);
        assert_eq!(list.items()[0].quantity, 3);
    }

    #[test]
    fn merged_quantities_saturate() {
        let list = FetchList::new([("REF1", u32::MAX), ("REF1", 5)]);
        assert_eq!(list.items()[0].quantity, u32::MAX);
        assert_eq!(list.items()[0].remaining, u32::MAX);
    }

    #[test]
    fn unordered_picks_any_pending() {
        let mut list = FetchList::new([("A", 2), ("B", 1)]);
        assert!(list.should_show("A") && list.should_show("B"));
        assert_eq!(list.fetch("B"), FetchOutcome::Completed);
        assert_eq!(list.fetch("B"), FetchOutcome::NotListed);
        assert_eq!(list.fetch("A"), FetchOutcome::Picked { remaining: 1 });
        assert_eq!(list.progress(), (1, 2));
        assert_eq!(list.fetch("A"), FetchOutcome::Completed);
        assert!(list.is_complete());
        assert_eq!(list.fetch("C"), FetchOutcome::NotListed);
    }

    #[test]
    fn ordered_only_accepts_next() {
        let mut list = FetchList::new([("A", 1), ("B", 1)]);
        list.set_ordered(true);
        assert_eq!(list.next_reference(), Some("A"));
        assert!(!list.should_show("B"));
        assert_eq!(list.fetch("B"), FetchOutcome::NotListed);
        assert_eq!(list.fetch("A"), FetchOutcome::Completed);
        assert_eq!(list.next_reference(), Some("B"));
        assert!(list.should_show("B"));
        assert!(!list.should_show("A"));
    }

    #[test]
    fn empty_list_is_not_complete() {
        assert!(!FetchList::default().is_complete());
    }
}
