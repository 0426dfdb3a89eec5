use glam::Vec2;
use log::info;
use random::Random;
use shaders::JitterSample;

use crate::Extent;

/// Index of sample `s` of pixel `(x, y)` in a jitter table.
pub fn sample_index(extent: Extent, samples_per_pixel: u32, x: u32, y: u32, s: u32) -> usize {
    ((y as usize * extent.width as usize) + x as usize) * samples_per_pixel as usize + s as usize
}

/// Generates `width * height * samples_per_pixel` jitter offsets, each uniform within half a
/// pixel's world-space extent on both axes.
pub fn generate_samples(
    extent: Extent,
    samples_per_pixel: u32,
    pixel_extent: Vec2,
) -> Vec<JitterSample> {
    let count = extent.pixel_count() * samples_per_pixel as usize;
    to_jitter(Random::offsets_in_rect(count, pixel_extent * 0.5))
}

/// Like [`generate_samples`], reproducible for a given `seed`.
pub fn generate_seeded_samples(
    seed: u64,
    extent: Extent,
    samples_per_pixel: u32,
    pixel_extent: Vec2,
) -> Vec<JitterSample> {
    let count = extent.pixel_count() * samples_per_pixel as usize;
    to_jitter(Random::seeded_offsets_in_rect(seed, count, pixel_extent * 0.5))
}

fn to_jitter(offsets: Vec<Vec2>) -> Vec<JitterSample> {
    offsets
        .into_iter()
        .map(|offset| JitterSample {
            dx: offset.x,
            dy: offset.y,
        })
        .collect()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct SampleKey {
    extent: Extent,
    samples_per_pixel: u32,
    pixel_extent: [u32; 2],
}

impl SampleKey {
    fn new(extent: Extent, samples_per_pixel: u32, pixel_extent: Vec2) -> Self {
        Self {
            extent,
            samples_per_pixel,
            pixel_extent: [pixel_extent.x.to_bits(), pixel_extent.y.to_bits()],
        }
    }
}

/// Owns the host copy of the jitter table and regenerates it only when its inputs change.
pub struct SampleSource {
    seed: Option<u64>,
    key: Option<SampleKey>,
    table: Vec<JitterSample>,
    generations: u64,
}

impl SampleSource {
    /// With a seed, every regeneration for the same inputs yields the same table.
    pub fn new(seed: Option<u64>) -> Self {
        Self {
            seed,
            key: None,
            table: vec![],
            generations: 0,
        }
    }

    /// Returns the table for the given inputs, generating it if they differ from the cached one.
    pub fn table(
        &mut self,
        extent: Extent,
        samples_per_pixel: u32,
        pixel_extent: Vec2,
    ) -> &[JitterSample] {
        let key = SampleKey::new(extent, samples_per_pixel, pixel_extent);

        if self.key != Some(key) {
            self.table = match self.seed {
                Some(seed) => {
                    generate_seeded_samples(seed, extent, samples_per_pixel, pixel_extent)
                }
                None => generate_samples(extent, samples_per_pixel, pixel_extent),
            };
            self.key = Some(key);
            self.generations += 1;

            info!(
                "Generated {} jitter samples for {}x{} at {samples_per_pixel} spp",
                self.table.len(),
                extent.width,
                extent.height
            );
        }

        &self.table
    }

    /// Number of times a table has been generated.
    pub fn generations(&self) -> u64 {
        self.generations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_and_bounds() {
        let extent = Extent::new(7, 5);
        let pixel_extent = Vec2::new(0.1, 0.2);
        let samples = generate_samples(extent, 3, pixel_extent);

        assert_eq!(samples.len(), 7 * 5 * 3);
        for s in samples {
            assert!(s.dx.abs() <= 0.05, "{s:?}");
            assert!(s.dy.abs() <= 0.1, "{s:?}");
        }
    }

    #[test]
    fn sample_index_is_pixel_major() {
        let extent = Extent::new(4, 3);
        assert_eq!(sample_index(extent, 2, 0, 0, 0), 0);
        assert_eq!(sample_index(extent, 2, 0, 0, 1), 1);
        assert_eq!(sample_index(extent, 2, 1, 0, 0), 2);
        assert_eq!(sample_index(extent, 2, 0, 1, 0), 8);
        assert_eq!(sample_index(extent, 2, 3, 2, 1), 23);
    }

    #[test]
    fn table_is_cached_until_inputs_change() {
        let mut source = SampleSource::new(Some(1));
        let pixel_extent = Vec2::splat(0.01);

        let first = source.table(Extent::new(8, 8), 2, pixel_extent).to_vec();
        let again = source.table(Extent::new(8, 8), 2, pixel_extent).to_vec();
        assert_eq!(first, again);
        assert_eq!(source.generations(), 1);

        source.table(Extent::new(8, 8), 4, pixel_extent);
        assert_eq!(source.generations(), 2);

        source.table(Extent::new(16, 8), 4, pixel_extent);
        assert_eq!(source.generations(), 3);
        assert_eq!(source.table(Extent::new(16, 8), 4, pixel_extent).len(), 512);
    }

    #[test]
    fn seeded_tables_are_reproducible() {
        let pixel_extent = Vec2::splat(0.25);
        let a = SampleSource::new(Some(42))
            .table(Extent::new(4, 4), 4, pixel_extent)
            .to_vec();
        let b = SampleSource::new(Some(42))
            .table(Extent::new(4, 4), 4, pixel_extent)
            .to_vec();
        assert_eq!(a, b);
    }

    #[test]
    fn seeded_source_does_not_reseed_shared_generator() {
        Random::seed(9);
        let expected: [u32; 2] = [Random::sample(), Random::sample()];

        Random::seed(9);
        let first = Random::sample::<u32>();
        SampleSource::new(Some(42)).table(Extent::new(4, 4), 4, Vec2::splat(0.25));
        let second = Random::sample::<u32>();

        assert_eq!([first, second], expected);
    }
}
