use itertools::Itertools;

use crate::{ephemeris::Ephemeris, prelude::GpsTime};

/// Reference time bucket size (s): frames whose time of clock quantizes
/// to the same bucket are considered re-broadcasts of one epoch.
const TIME_QUANTIZATION_S: f64 = 10.0;

fn time_tag(t: &GpsTime) -> i64 {
    ((t.serialized() + 0.5 * TIME_QUANTIZATION_S) / TIME_QUANTIZATION_S).floor() as i64
}

#[derive(Debug, Clone)]
struct Entry {
    eph: Ephemeris,
    priority: i32,
    t_tag: i64,
}

impl Entry {
    fn new(eph: Ephemeris, priority: i32) -> Self {
        let t_tag = time_tag(&eph.base_time());
        Self {
            eph,
            priority,
            t_tag,
        }
    }
}

/// Iteration order over an [EphemerisHistory]
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub enum IterationOrder {
    /// All frames, highest priority first within a time bucket
    #[default]
    All,
    /// All frames, lowest priority first within a time bucket
    AllInverted,
    /// One frame per time bucket, the highest priority one
    NoRedundant,
}

/// Time ordered, priority aware storage of the broadcast [Ephemeris]
/// history of one satellite. Within a time bucket, frames are kept in
/// descending priority order. The current selection survives additions
/// and merges unless a strictly better frame is promoted.
#[derive(Debug, Clone, Default)]
pub struct EphemerisHistory {
    entries: Vec<Entry>,
    selected: Option<usize>,
}

impl EphemerisHistory {
    /// Currently selected frame, if any
    pub fn current(&self) -> Option<&Ephemeris> {
        self.selected.map(|idx| &self.entries[idx].eph)
    }

    /// Number of stored frames
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registers a new frame, assumed the latest received.
    ///
    /// When an equivalent frame is already stored, its priority is raised
    /// by `priority_delta` and it bubbles to the priority matching spot of
    /// its time bucket; `priority_delta` 0 replaces the stored frame
    /// content instead.
    pub fn add(&mut self, eph: Ephemeris, priority_delta: i32) {
        let tag = time_tag(&eph.base_time());
        let lo = self.entries.partition_point(|e| e.t_tag < tag);
        let hi = self.entries.partition_point(|e| e.t_tag <= tag);

        if let Some(pos) = (lo..hi).find(|&i| self.entries[i].eph.is_equivalent(&eph)) {
            if priority_delta == 0 {
                // replace with the newer reading
                self.entries[pos].eph = eph;
                return;
            }

            self.entries[pos].priority += priority_delta;
            let priority = self.entries[pos].priority;

            let mut new_pos = pos;
            if priority_delta > 0 {
                // raised: moves ahead of same-or-lower priorities
                while new_pos > lo && self.entries[new_pos - 1].priority <= priority {
                    self.entries.swap(new_pos - 1, new_pos);
                    new_pos -= 1;
                }
            } else {
                // lowered: moves behind strictly higher priorities
                while new_pos + 1 < hi && self.entries[new_pos + 1].priority > priority {
                    self.entries.swap(new_pos, new_pos + 1);
                    new_pos += 1;
                }
            }

            if let Some(sel) = self.selected {
                self.selected = Some(if sel == pos {
                    new_pos
                } else if (new_pos..pos).contains(&sel) {
                    sel + 1
                } else if (pos + 1..=new_pos).contains(&sel) {
                    sel - 1
                } else {
                    sel
                });
            }
            return;
        }

        // not registered yet: insert within its bucket, ahead of
        // same-or-lower priorities
        let insert_at = (lo..hi)
            .find(|&i| self.entries[i].priority <= priority_delta)
            .unwrap_or(hi);

        self.entries.insert(insert_at, Entry::new(eph, priority_delta));

        // the selection keeps designating the same frame
        if let Some(sel) = self.selected {
            if insert_at <= sel {
                self.selected = Some(sel + 1);
            }
        }
    }

    /// Selects the best frame for `target_time`: valid, highest priority,
    /// smallest age since first valid transmission. Search starts from the
    /// current selection and walks in the direction of the target.
    /// Returns true when the selection changed.
    pub fn select(&mut self, target_time: &GpsTime) -> bool {
        let mut changed = false;

        let (mut best_delta, mut best_tag, range) = match self.selected {
            Some(idx) => {
                let entry = &self.entries[idx];
                let delta = entry.eph.period_from_first_valid_transmission(target_time);
                if delta >= 0.0 {
                    // find newer
                    (delta, entry.t_tag, idx + 1..self.entries.len())
                } else {
                    // find older (rare, slow)
                    (-delta, entry.t_tag, 0..idx)
                }
            },
            None => (f64::INFINITY, i64::MIN, 0..self.entries.len()),
        };

        for i in range {
            let entry = &self.entries[i];
            // within a bucket the first hit carries the highest priority
            if changed && entry.t_tag == best_tag {
                continue;
            }
            if !entry.eph.is_valid(target_time) {
                continue;
            }
            let delta = entry
                .eph
                .period_from_first_valid_transmission(target_time)
                .abs();
            if best_delta > delta {
                changed = true;
                best_tag = entry.t_tag;
                best_delta = delta;
                self.selected = Some(i);
            }
        }

        changed
    }

    /// Iterates stored frames in the requested [IterationOrder]
    pub fn each<F: FnMut(&Ephemeris)>(&self, order: IterationOrder, mut f: F) {
        match order {
            IterationOrder::All => {
                for entry in &self.entries {
                    f(&entry.eph);
                }
            },
            IterationOrder::AllInverted => {
                for (_, bucket) in &self.entries.iter().chunk_by(|e| e.t_tag) {
                    let bucket = bucket.collect::<Vec<_>>();
                    for entry in bucket.into_iter().rev() {
                        f(&entry.eph);
                    }
                }
            },
            IterationOrder::NoRedundant => {
                let mut last_tag = None;
                for entry in &self.entries {
                    if last_tag == Some(entry.t_tag) {
                        continue;
                    }
                    f(&entry.eph);
                    last_tag = Some(entry.t_tag);
                }
            },
        }
    }

    /// Merges `rhs` into self, deterministically preserving time order and
    /// either side priorities. On equivalent frames of one bucket, the
    /// `keep_original` side wins. The selection follows the original side,
    /// offset by frames of the other side landing before it.
    pub fn merge(&mut self, rhs: &Self, keep_original: bool) {
        let mut merged = Vec::with_capacity(self.entries.len() + rhs.entries.len());
        let mut new_selected = self.selected;

        // counts down original-side entries left before the selected one
        let mut remaining = self.selected.map_or(-1, |sel| sel as isize);

        let (mut i, mut j) = (0, 0);
        while i < self.entries.len() && j < rhs.entries.len() {
            let (a, b) = (&self.entries[i], &rhs.entries[j]);

            let use_original = if a.t_tag == b.t_tag {
                if a.eph.is_equivalent(&b.eph) {
                    merged.push(if keep_original { a.clone() } else { b.clone() });
                    i += 1;
                    j += 1;
                    remaining -= 1;
                    continue;
                }
                a.priority >= b.priority
            } else {
                a.t_tag < b.t_tag
            };

            if use_original {
                merged.push(a.clone());
                i += 1;
                remaining -= 1;
            } else {
                merged.push(b.clone());
                j += 1;
                if remaining >= 0 {
                    if let Some(sel) = new_selected.as_mut() {
                        *sel += 1;
                    }
                }
            }
        }

        merged.extend(self.entries[i..].iter().cloned());
        merged.extend(rhs.entries[j..].iter().cloned());

        self.entries = merged;
        self.selected = new_selected;
    }
}
