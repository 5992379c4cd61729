use tunnelforge_terminal::cells_to_text;
use tunnelforge_types::BufferSnapshot;

/// Remembers the styled text of the last painted grid.
#[derive(Debug, Default)]
pub struct ContentChangeDetector {
    last: Option<String>,
}

impl ContentChangeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `snapshot` and report whether it differs visibly from the
    /// previous one. The first observation only primes the detector.
    pub fn observe(&mut self, snapshot: &BufferSnapshot) -> bool {
        let text = cells_to_text(&snapshot.cells);
        match &self.last {
            None => {
                self.last = Some(text);
                false
            }
            Some(previous) if *previous == text => false,
            Some(_) => {
                self.last = Some(text);
                true
            }
        }
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}
