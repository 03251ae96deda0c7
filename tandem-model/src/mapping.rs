/// Position map for a single replaced range: `old_size` positions starting at
/// `start` became `new_size` positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StepMap {
    start: usize,
    old_size: usize,
    new_size: usize,
}

impl StepMap {
    pub fn new(start: usize, old_size: usize, new_size: usize) -> Self {
        Self {
            start,
            old_size,
            new_size,
        }
    }

    /// Map for a step that changed no positions (mark steps)
    pub fn identity() -> Self {
        Self::default()
    }

    /// Map `pos` through the change. `assoc` picks the side a position on
    /// the edge of an insertion sticks to: negative stays before it, positive
    /// moves after it.
    pub fn map(&self, pos: usize, assoc: i32) -> usize {
        let end = self.start + self.old_size;
        if pos < self.start {
            return pos;
        }
        if pos > end {
            return pos + self.new_size - self.old_size;
        }
        let side = if self.old_size == 0 {
            assoc
        } else if pos == self.start {
            -1
        } else if pos == end {
            1
        } else {
            assoc
        };
        if side < 0 {
            self.start
        } else {
            self.start + self.new_size
        }
    }
}

/// Sequence of step maps, applied in order
#[derive(Debug, Clone, Default)]
pub struct Mapping {
    maps: Vec<StepMap>,
}

impl Mapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, map: StepMap) {
        self.maps.push(map);
    }

    pub fn maps(&self) -> &[StepMap] {
        &self.maps
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    pub fn map(&self, pos: usize) -> usize {
        self.map_assoc(pos, 1)
    }

    pub fn map_assoc(&self, pos: usize, assoc: i32) -> usize {
        self.maps.iter().fold(pos, |pos, map| map.map(pos, assoc))
    }

    /// Maps added after the first `from` ones
    pub fn slice(&self, from: usize) -> Mapping {
        Mapping {
            maps: self.maps.get(from..).unwrap_or_default().to_vec(),
        }
    }
}
