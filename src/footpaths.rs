//! Walking connections between stops.
//!
//! Direct transfers are stored as given. Everything else is covered by hub
//! labels: every stop knows the hubs it can walk to ("in-hubs") and the hubs
//! it can be reached from ("out-hubs"), and the walking time from `u` to `v`
//! is bounded by the best `in(u, h) + out(h, v)` over their shared hubs. This
//! avoids storing all pairs of stops.

use crate::network::{ConsistencyError, HubIndex, Network, StopIndex, Timestamp, Transfer};

/// One hub label: `stop -> hub` for in-hubs, `hub -> stop` for out-hubs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HubEntry {
    pub stop: StopIndex,
    pub hub: HubIndex,
    pub access_time: Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct HubLink {
    pub hub: HubIndex,
    pub duration: Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct StopLink {
    pub stop: StopIndex,
    pub duration: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FootpathHubIndex {
    num_hubs: usize,
    transfers: Vec<Transfer>,
    transfer_offsets: Vec<usize>,
    // Per stop, sorted by hub.
    in_hubs: Vec<HubLink>,
    in_offsets: Vec<usize>,
    out_hubs: Vec<HubLink>,
    out_offsets: Vec<usize>,
    // Per hub: the stops it reaches, i.e. `out_hubs` transposed.
    hub_stops: Vec<StopLink>,
    hub_offsets: Vec<usize>,
}

// Groups `(key, item)` pairs into offsets plus a flat array, items sorted within a key.
fn group_by_key<T: Ord + Copy>(num_keys: usize, mut items: Vec<(usize, T)>) -> (Vec<usize>, Vec<T>) {
    items.sort_unstable();
    let mut offsets = Vec::with_capacity(num_keys + 1);
    let mut start = 0;
    for key in 0..num_keys {
        offsets.push(start);
        start += items[start..].partition_point(|&(k, _)| k <= key);
    }
    offsets.push(start);
    (offsets, items.into_iter().map(|(_, item)| item).collect())
}

fn ungroup<'a, T: Copy + 'a>(offsets: &'a [usize], items: &'a [T]) -> impl Iterator<Item = (usize, T)> + 'a {
    offsets
        .windows(2)
        .enumerate()
        .flat_map(move |(key, window)| items[window[0]..window[1]].iter().map(move |&item| (key, item)))
}

impl FootpathHubIndex {
    /// Builds the index from the network's direct transfers and the two hub tables.
    pub fn new(network: &Network, in_hubs: &[HubEntry], out_hubs: &[HubEntry]) -> Result<Self, ConsistencyError> {
        let num_stops = network.num_stops();
        for entry in in_hubs.iter().chain(out_hubs) {
            if entry.stop as usize >= num_stops {
                return Err(ConsistencyError::StopOutOfRange { stop: entry.stop, num_stops });
            }
            if entry.access_time < 0 {
                return Err(ConsistencyError::NegativeDuration {
                    from: entry.stop,
                    to: entry.stop,
                    duration: entry.access_time,
                });
            }
        }
        let num_hubs = in_hubs.iter().chain(out_hubs).map(|entry| entry.hub as usize + 1).max().unwrap_or(0);
        let transfers = network.transfers.clone();

        Ok(Self::assemble(num_stops, num_hubs, transfers, in_hubs.to_vec(), out_hubs.to_vec()))
    }

    /// An index with direct transfers only.
    pub fn empty(network: &Network) -> Self {
        Self::assemble(network.num_stops(), 0, network.transfers.clone(), Vec::new(), Vec::new())
    }

    fn assemble(
        num_stops: usize,
        num_hubs: usize,
        transfers: Vec<Transfer>,
        in_hubs: Vec<HubEntry>,
        out_hubs: Vec<HubEntry>,
    ) -> Self {
        let index_links = |entries: &[HubEntry]| {
            let (offsets, links): (Vec<usize>, Vec<HubLink>) = group_by_key(
                num_stops,
                entries
                    .iter()
                    .map(|entry| (entry.stop as usize, HubLink { hub: entry.hub, duration: entry.access_time }))
                    .collect(),
            );
            // Duplicate labels keep their shortest duration, which sorts first.
            let mut compacted_offsets = Vec::with_capacity(offsets.len());
            let mut compacted = Vec::with_capacity(links.len());
            for window in offsets.windows(2) {
                compacted_offsets.push(compacted.len());
                let slice = &links[window[0]..window[1]];
                for (i, link) in slice.iter().enumerate() {
                    if i == 0 || slice[i - 1].hub != link.hub {
                        compacted.push(*link);
                    }
                }
            }
            compacted_offsets.push(compacted.len());
            (compacted_offsets, compacted)
        };
        let (in_offsets, in_links) = index_links(&in_hubs);
        let (out_offsets, out_links) = index_links(&out_hubs);

        let (hub_offsets, hub_stops) = group_by_key(
            num_hubs,
            ungroup(&out_offsets, &out_links)
                .map(|(stop, link)| (link.hub as usize, StopLink { stop: stop as StopIndex, duration: link.duration }))
                .collect(),
        );
        let (transfer_offsets, transfers) = group_by_key(
            num_stops,
            transfers.into_iter().map(|transfer| (transfer.from as usize, transfer)).collect(),
        );

        Self {
            num_hubs,
            transfers,
            transfer_offsets,
            in_hubs: in_links,
            in_offsets,
            out_hubs: out_links,
            out_offsets,
            hub_stops,
            hub_offsets,
        }
    }

    /// The same walking graph with every edge pointing the other way, for use
    /// with [`Network::reverse`].
    pub fn reverse(&self) -> Self {
        let num_stops = self.num_stops();
        let transfers = self
            .transfers
            .iter()
            .map(|transfer| Transfer { from: transfer.to, to: transfer.from, duration: transfer.duration })
            .collect();
        let entries = |offsets: &[usize], links: &[HubLink]| {
            ungroup(offsets, links)
                .map(|(stop, link)| HubEntry { stop: stop as StopIndex, hub: link.hub, access_time: link.duration })
                .collect::<Vec<_>>()
        };
        Self::assemble(
            num_stops,
            self.num_hubs,
            transfers,
            entries(&self.out_offsets, &self.out_hubs),
            entries(&self.in_offsets, &self.in_hubs),
        )
    }

    pub fn num_stops(&self) -> usize { self.transfer_offsets.len() - 1 }

    pub fn num_hubs(&self) -> usize { self.num_hubs }

    pub fn transfers_from(&self, stop: StopIndex) -> &[Transfer] {
        let stop = stop as usize;
        &self.transfers[self.transfer_offsets[stop]..self.transfer_offsets[stop + 1]]
    }

    /// Hubs reachable on foot from `stop`.
    pub fn hubs_from(&self, stop: StopIndex) -> &[HubLink] {
        let stop = stop as usize;
        &self.in_hubs[self.in_offsets[stop]..self.in_offsets[stop + 1]]
    }

    /// Hubs from which `stop` can be reached on foot.
    pub fn hubs_to(&self, stop: StopIndex) -> &[HubLink] {
        let stop = stop as usize;
        &self.out_hubs[self.out_offsets[stop]..self.out_offsets[stop + 1]]
    }

    /// Stops reachable on foot from `hub`.
    pub fn stops_from_hub(&self, hub: HubIndex) -> &[StopLink] {
        let hub = hub as usize;
        &self.hub_stops[self.hub_offsets[hub]..self.hub_offsets[hub + 1]]
    }

    /// Shortest known walking time from `from` to `to`, `None` if unreachable.
    pub fn transfer_time(&self, from: StopIndex, to: StopIndex) -> Option<Timestamp> {
        if from == to {
            return Some(0);
        }

        let direct = self
            .transfers_from(from)
            .iter()
            .filter(|transfer| transfer.to == to)
            .map(|transfer| transfer.duration)
            .min();

        // Both label lists are sorted by hub, so a merge finds the shared ones.
        let (from_hubs, to_hubs) = (self.hubs_from(from), self.hubs_to(to));
        let (mut i, mut j) = (0, 0);
        let mut via_hub: Option<Timestamp> = None;
        while i < from_hubs.len() && j < to_hubs.len() {
            match from_hubs[i].hub.cmp(&to_hubs[j].hub) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    let duration = from_hubs[i].duration.saturating_add(to_hubs[j].duration);
                    via_hub = Some(via_hub.map_or(duration, |best| best.min(duration)));
                    i += 1;
                    j += 1;
                }
            }
        }

        match (direct, via_hub) {
            (Some(direct), Some(via_hub)) => Some(direct.min(via_hub)),
            (direct, via_hub) => direct.or(via_hub),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::StopTime;
    use crate::TimetableBuilder;

    fn network() -> Network {
        let mut builder = TimetableBuilder::new();
        for id in ["A", "B", "C", "D"] {
            builder.add_stop(id, None);
        }
        builder.add_trip("t", vec![(0, StopTime::new(0, 0)), (1, StopTime::new(10, 10))]);
        builder.add_transfer(0, 1, 500);
        builder.build().unwrap()
    }

    fn entry(stop: StopIndex, hub: HubIndex, access_time: Timestamp) -> HubEntry {
        HubEntry { stop, hub, access_time }
    }

    fn index() -> FootpathHubIndex {
        let in_hubs = [entry(0, 0, 100), entry(0, 1, 40), entry(2, 1, 10), entry(0, 1, 70)];
        let out_hubs = [entry(1, 0, 50), entry(1, 1, 300), entry(3, 1, 20)];
        FootpathHubIndex::new(&network(), &in_hubs, &out_hubs).unwrap()
    }

    #[test]
    fn composes_hub_labels() {
        let index = index();
        assert_eq!(index.num_hubs(), 2);
        // Via hub 0: 100 + 50, beats the direct 500 and hub 1 (40 + 300).
        assert_eq!(index.transfer_time(0, 1), Some(150));
        assert_eq!(index.transfer_time(0, 3), Some(60));
        assert_eq!(index.transfer_time(2, 3), Some(30));
        assert_eq!(index.transfer_time(2, 2), Some(0));
    }

    #[test]
    fn unreachable_without_shared_hub() {
        let index = index();
        assert_eq!(index.transfer_time(1, 0), None);
        assert_eq!(index.transfer_time(3, 2), None);
    }

    #[test]
    fn duplicate_labels_keep_the_shortest() {
        let index = index();
        assert_eq!(index.hubs_from(0), &[HubLink { hub: 0, duration: 100 }, HubLink { hub: 1, duration: 40 }]);
        assert_eq!(
            index.stops_from_hub(1),
            &[StopLink { stop: 1, duration: 300 }, StopLink { stop: 3, duration: 20 }]
        );
    }

    #[test]
    fn reverse_flips_every_walk() {
        let index = index();
        let reversed = index.reverse();
        for from in 0..4 {
            for to in 0..4 {
                assert_eq!(reversed.transfer_time(to, from), index.transfer_time(from, to));
            }
        }
        assert_eq!(reversed.reverse(), index);
    }

    #[test]
    fn empty_index_uses_direct_transfers() {
        let index = FootpathHubIndex::empty(&network());
        assert_eq!(index.transfer_time(0, 1), Some(500));
        assert_eq!(index.transfer_time(1, 0), None);
    }

    #[test]
    fn rejects_unknown_stops() {
        let result = FootpathHubIndex::new(&network(), &[entry(9, 0, 1)], &[]);
        assert!(matches!(result, Err(ConsistencyError::StopOutOfRange { stop: 9, .. })));
    }
}
