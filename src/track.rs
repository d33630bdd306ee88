//! Track buffer (C6): an ordered, append-only sequence of decoded points.

use crate::constants::TRACK_INITIAL_CAPACITY;
use crate::records::TrackPoint;

/// Owns the decoded points of one completed download. Growth is `Vec`'s
/// ordinary doubling reallocation, seeded with the source's initial
/// capacity of 16384 points.
#[derive(Debug, Default)]
pub struct Track {
    points: Vec<TrackPoint>,
}

impl Track {
    pub fn new() -> Self {
        Self {
            points: Vec::with_capacity(TRACK_INITIAL_CAPACITY),
        }
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self {
            points: Vec::with_capacity(cap),
        }
    }

    pub fn push(&mut self, pt: TrackPoint) {
        self.points.push(pt);
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrackPoint> {
        self.points.iter()
    }

    pub fn as_slice(&self) -> &[TrackPoint] {
        &self.points
    }
}

impl FromIterator<TrackPoint> for Track {
    fn from_iter<I: IntoIterator<Item = TrackPoint>>(iter: I) -> Self {
        Self {
            points: iter.into_iter().collect(),
        }
    }
}
