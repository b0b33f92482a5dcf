use std::f64::consts::PI;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
const BASELINE: f64 = 50.0;
const AMPLITUDE: f64 = 20.0;
const FREQUENCY_HZ: f64 = 0.1;
const JITTER: f64 = 1.0;
/// Test-mode signal: a slow sine per (slot, channel) with its own phase, plus jitter.
pub struct SyntheticGenerator {
    phases: Vec<Vec<f64>>,
    rng: StdRng,
}
impl SyntheticGenerator {
    pub fn new(port_count: usize, channel_count: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let phases: Vec<Vec<f64>> = (0..port_count)
            .map(|_| {
                (0..channel_count)
                    .map(|_| rng.gen_range(0.0..2.0 * PI))
                    .collect::<Vec<f64>>()
            })
            .collect();
        Self { phases, rng }
    }
    pub fn phase(&self, slot: usize, channel: usize) -> f64 {
        self.phases
            .get(slot)
            .and_then(|p| p.get(channel))
            .copied()
            .unwrap_or_default()
    }
    pub fn sample(&mut self, slot: usize, channel: usize, elapsed: f64) -> f64 {
        let phase = self.phase(slot, channel);
        let jitter = self.rng.gen_range(-JITTER..JITTER);
        BASELINE + AMPLITUDE * (2.0 * PI * FREQUENCY_HZ * elapsed + phase).sin() + jitter
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn same_seed_gives_same_signal() {
        let mut a = SyntheticGenerator::new(2, 3, 7);
        let mut b = SyntheticGenerator::new(2, 3, 7);
        for i in 0..20 {
            let t = i as f64 * 0.01;
            assert_eq!(a.sample(1, 2, t), b.sample(1, 2, t));
        }
    }
    #[test]
    fn samples_stay_within_envelope() {
        let mut g = SyntheticGenerator::new(1, 6, 1);
        for i in 0..500 {
            let v = g.sample(0, i % 6, i as f64 * 0.37);
            assert!(v >= BASELINE - AMPLITUDE - JITTER && v <= BASELINE + AMPLITUDE + JITTER);
        }
        assert_ne!(g.phase(0, 0), g.phase(0, 1));
        assert_eq!(g.phase(9, 9), 0.0);
    }
}
