use crate::network::Timestamp;

/// A journey option: leave the source at `departure`, reach the target at `arrival`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Label {
    pub departure: Timestamp,
    pub arrival: Timestamp,
}

impl Label {
    pub fn new(departure: Timestamp, arrival: Timestamp) -> Self {
        Label { departure, arrival }
    }

    // Leaving no earlier and arriving no later is at least as good.
    fn dominates(&self, other: &Label) -> bool {
        self.departure >= other.departure && self.arrival <= other.arrival
    }
}

/// Non-dominated (departure, arrival) pairs, stored by decreasing departure.
///
/// Because no entry dominates another, arrivals are strictly decreasing too,
/// so the front is a staircase that can be searched by either coordinate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParetoFront {
    labels: Vec<Label>,
}

impl ParetoFront {
    pub const fn new() -> Self {
        ParetoFront { labels: Vec::new() }
    }

    /// Adds the pair unless an existing entry dominates (or equals) it, and
    /// evicts the entries it dominates. Returns true if the front was modified.
    /// Pairs may be offered in any order.
    pub fn offer(&mut self, departure: Timestamp, arrival: Timestamp) -> bool {
        let new_label = Label::new(departure, arrival);

        // Entries departing no earlier than the new one form a prefix; the last
        // of them has the earliest arrival of that prefix.
        let later = self.labels.partition_point(|label| label.departure >= departure);
        if later > 0 && self.labels[later - 1].dominates(&new_label) {
            return false;
        }

        // The dominated entries are contiguous: departing no later, arriving no earlier.
        let start = self.labels.partition_point(|label| label.departure > departure);
        let end = start + self.labels[start..].partition_point(|label| label.arrival >= arrival);
        debug_assert!(self.labels[start..end].iter().all(|label| new_label.dominates(label)));
        self.labels.splice(start..end, [new_label]);
        true
    }

    pub fn len(&self) -> usize { self.labels.len() }

    pub fn size(&self) -> usize { self.len() }

    pub fn is_empty(&self) -> bool { self.labels.is_empty() }

    /// Entries by decreasing departure.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Label> + ExactSizeIterator {
        self.labels.iter()
    }

    pub fn for_each<F: FnMut(&Label)>(&self, visitor: F) {
        self.labels.iter().for_each(visitor)
    }

    pub fn as_slice(&self) -> &[Label] { &self.labels }

    /// Earliest arrival over the entries departing at or after `departure`.
    pub fn best_arrival_from(&self, departure: Timestamp) -> Option<Timestamp> {
        let later = self.labels.partition_point(|label| label.departure >= departure);
        later.checked_sub(1).map(|last| self.labels[last].arrival)
    }
}

impl<'a> IntoIterator for &'a ParetoFront {
    type Item = &'a Label;
    type IntoIter = std::slice::Iter<'a, Label>;

    fn into_iter(self) -> Self::IntoIter {
        self.labels.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(front: &ParetoFront) -> Vec<(Timestamp, Timestamp)> {
        front.iter().map(|label| (label.departure, label.arrival)).collect()
    }

    fn assert_staircase(front: &ParetoFront) {
        for window in front.as_slice().windows(2) {
            assert!(window[0].departure > window[1].departure);
            assert!(window[0].arrival > window[1].arrival);
        }
    }

    #[test]
    fn accepts_sweep_order() {
        let mut front = ParetoFront::new();
        assert!(front.offer(150, 230));
        assert!(front.offer(100, 200));
        assert!(!front.offer(0, 200));
        assert_eq!(pairs(&front), vec![(150, 230), (100, 200)]);
        assert_eq!(front.size(), 2);
    }

    #[test]
    fn rejects_dominated_and_equal_pairs() {
        let mut front = ParetoFront::new();
        front.offer(100, 200);
        assert!(!front.offer(100, 200));
        assert!(!front.offer(90, 200));
        assert!(!front.offer(100, 250));
        assert_eq!(front.len(), 1);
    }

    #[test]
    fn evicts_dominated_entries_in_any_order() {
        let mut front = ParetoFront::new();
        front.offer(100, 200);
        front.offer(50, 180);
        front.offer(120, 260);
        // Departs later than (100, 200) and (50, 180) while arriving no later than either.
        assert!(front.offer(110, 180));
        assert_eq!(pairs(&front), vec![(120, 260), (110, 180)]);
        assert!(front.offer(130, 260));
        assert_eq!(pairs(&front), vec![(130, 260), (110, 180)]);
        assert_staircase(&front);
    }

    #[test]
    fn random_offers_keep_staircase() {
        fastrand::seed(11);
        let mut front = ParetoFront::new();
        let offers: Vec<_> = (0..500).map(|_| (fastrand::i32(0..1000), fastrand::i32(0..1000))).collect();
        for &(departure, arrival) in &offers {
            front.offer(departure, arrival);
            assert_staircase(&front);
        }
        // Every offer is dominated by something that survived.
        for &(departure, arrival) in &offers {
            assert!(front.iter().any(|label| label.dominates(&Label::new(departure, arrival))));
        }
    }

    #[test]
    fn best_arrival_from_reads_the_staircase() {
        let mut front = ParetoFront::new();
        front.offer(150, 230);
        front.offer(100, 200);
        assert_eq!(front.best_arrival_from(160), None);
        assert_eq!(front.best_arrival_from(150), Some(230));
        assert_eq!(front.best_arrival_from(120), Some(230));
        assert_eq!(front.best_arrival_from(0), Some(200));
    }

    #[test]
    fn for_each_is_restartable() {
        let mut front = ParetoFront::new();
        front.offer(150, 230);
        front.offer(100, 200);
        let mut first = Vec::new();
        front.for_each(|label| first.push(*label));
        let mut second = Vec::new();
        front.for_each(|label| second.push(*label));
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }
}
