//! Connected component labeling using run-length encoding and union-find.

use crate::config::Connectivity;
use crate::segmentation::Mask;

// ============================================================================
// Run-Length Encoding
// ============================================================================

/// A horizontal run of foreground pixels.
#[derive(Debug, Clone, Copy)]
struct Run {
    start: u32, // inclusive
    end: u32,   // exclusive
    label: u32,
}

impl Run {
    /// Search window for overlapping runs in the previous row (end exclusive).
    #[inline]
    fn search_window(&self, connectivity: Connectivity) -> (u32, u32) {
        match connectivity {
            Connectivity::Four => (self.start, self.end),
            Connectivity::Eight => (self.start.saturating_sub(1), self.end + 1),
        }
    }
}

#[inline]
fn runs_connected(prev: &Run, curr: &Run, connectivity: Connectivity) -> bool {
    match connectivity {
        Connectivity::Four => prev.start < curr.end && prev.end > curr.start,
        Connectivity::Eight => prev.start < curr.end + 1 && prev.end + 1 > curr.start,
    }
}

fn extract_runs_from_row(row: &[bool], runs: &mut Vec<Run>) {
    let mut x = 0;
    while x < row.len() {
        if !row[x] {
            x += 1;
            continue;
        }
        let start = x;
        while x < row.len() && row[x] {
            x += 1;
        }
        runs.push(Run {
            start: start as u32,
            end: x as u32,
            label: 0,
        });
    }
}

// ============================================================================
// LabelMap
// ============================================================================

/// Label of every pixel: 0 for background, `1..=num_labels` for components.
///
/// Labels are assigned in raster order of each component's first pixel.
#[derive(Debug)]
pub struct LabelMap {
    labels: Vec<u32>,
    width: usize,
    height: usize,
    num_labels: usize,
}

impl LabelMap {
    pub fn from_mask(mask: &Mask, connectivity: Connectivity) -> Self {
        let width = mask.width();
        let height = mask.height();
        let mut labels = vec![0u32; width * height];

        let mut uf = UnionFind::new();
        let mut prev_runs: Vec<Run> = Vec::with_capacity(width / 4);
        let mut curr_runs: Vec<Run> = Vec::with_capacity(width / 4);

        for y in 0..height {
            curr_runs.clear();
            extract_runs_from_row(mask.row(y), &mut curr_runs);

            if curr_runs.is_empty() {
                prev_runs.clear();
                continue;
            }

            let mut prev_idx = 0;
            for run in &mut curr_runs {
                let (search_start, search_end) = run.search_window(connectivity);

                while prev_idx < prev_runs.len() && prev_runs[prev_idx].end <= search_start {
                    prev_idx += 1;
                }

                let mut assigned_label = None;
                let mut check_idx = prev_idx;
                while check_idx < prev_runs.len() && prev_runs[check_idx].start < search_end {
                    let prev_run = &prev_runs[check_idx];
                    if runs_connected(prev_run, run, connectivity) {
                        match assigned_label {
                            Some(label) if label != prev_run.label => {
                                uf.union(label, prev_run.label);
                            }
                            None => assigned_label = Some(prev_run.label),
                            _ => {}
                        }
                    }
                    check_idx += 1;
                }

                run.label = assigned_label.unwrap_or_else(|| uf.make_set());

                let row_start = y * width;
                for x in run.start..run.end {
                    labels[row_start + x as usize] = run.label;
                }
            }

            std::mem::swap(&mut prev_runs, &mut curr_runs);
        }

        let num_labels = uf.flatten_labels(&mut labels);

        Self {
            labels,
            width,
            height,
            num_labels,
        }
    }

    #[inline]
    pub fn num_labels(&self) -> usize {
        self.num_labels
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn labels(&self) -> &[u32] {
        &self.labels
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> u32 {
        self.labels[y * self.width + x]
    }

    /// Label at signed coordinates; outside the frame reads as background.
    #[inline]
    pub fn get_signed(&self, x: i32, y: i32) -> u32 {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            return 0;
        }
        self.get(x as usize, y as usize)
    }
}

impl std::ops::Index<usize> for LabelMap {
    type Output = u32;

    #[inline]
    fn index(&self, idx: usize) -> &Self::Output {
        &self.labels[idx]
    }
}

// ============================================================================
// Union-Find
// ============================================================================

struct UnionFind {
    parent: Vec<u32>,
}

impl UnionFind {
    fn new() -> Self {
        Self { parent: Vec::new() }
    }

    /// Create a new set and return its label (labels start at 1).
    fn make_set(&mut self) -> u32 {
        let label = self.parent.len() as u32 + 1;
        self.parent.push(label);
        label
    }

    /// Find root with path compression.
    fn find(&mut self, label: u32) -> u32 {
        let mut root = label;
        while self.parent[(root - 1) as usize] != root {
            root = self.parent[(root - 1) as usize];
        }
        let mut current = label;
        while current != root {
            let next = self.parent[(current - 1) as usize];
            self.parent[(current - 1) as usize] = root;
            current = next;
        }
        root
    }

    /// Union two sets (smaller root wins).
    fn union(&mut self, a: u32, b: u32) {
        let root_a = self.find(a);
        let root_b = self.find(b);
        if root_a != root_b {
            let (smaller, larger) = if root_a < root_b {
                (root_a, root_b)
            } else {
                (root_b, root_a)
            };
            self.parent[(larger - 1) as usize] = smaller;
        }
    }

    /// Flatten labels to sequential 1..n and apply to buffer.
    fn flatten_labels(&mut self, labels: &mut [u32]) -> usize {
        if self.parent.is_empty() {
            return 0;
        }

        // Roots are always the smallest label of their set, so numbering roots
        // in label order keeps components in raster order of first appearance.
        let mut label_map = vec![0u32; self.parent.len() + 1];
        let mut num_labels = 0u32;
        for label in 1..=self.parent.len() as u32 {
            let root = self.find(label);
            if root == label {
                num_labels += 1;
                label_map[label as usize] = num_labels;
            } else {
                label_map[label as usize] = label_map[root as usize];
            }
        }

        for l in labels.iter_mut() {
            if *l != 0 {
                *l = label_map[*l as usize];
            }
        }

        num_labels as usize
    }
}
