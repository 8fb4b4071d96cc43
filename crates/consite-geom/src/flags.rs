/// Configuration options that control the behaviour of [`PlanarKernel`](crate::PlanarKernel).
#[derive(Debug, Clone)]
pub struct KernelConfig {
    /// Parts whose area falls at or below this value are treated as slivers
    /// and dropped during explosion and repair.
    pub min_part_area: f64,
    /// Minimum number of coordinates (closing coordinate included) for a
    /// ring to be considered well formed.
    pub min_ring_coords: usize,
    /// Angular step, in radians, of round buffer joins and caps. Chords sit
    /// inside the true arc, so a buffer at distance `d` falls short by about
    /// `d * arc_step² / 8`. Must be positive.
    pub arc_step: f64,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            min_part_area: 1e-9,
            min_ring_coords: 4,
            arc_step: 0.01,
        }
    }
}
