use std::f64::consts::PI;

/// A source of uniform draws in `[0, 1)`.
///
/// The projection engine only ever asks for uniforms; normal samples are
/// built from them with Box-Muller, so tests can drive the engine with a
/// fixed or counting source.
pub trait UniformSource {
    fn next_uniform(&mut self) -> f64;
}

impl<S: UniformSource + ?Sized> UniformSource for &mut S {
    fn next_uniform(&mut self) -> f64 {
        (**self).next_uniform()
    }
}

/// Draws from `(0, 1)`: a zero draw is discarded and redrawn.
pub fn open_unit<S: UniformSource + ?Sized>(source: &mut S) -> f64 {
    loop {
        let u = source.next_uniform();
        if u > 0.0 {
            return u;
        }
    }
}

pub fn standard_normal<S: UniformSource + ?Sized>(source: &mut S) -> f64 {
    let u = open_unit(source);
    let v = open_unit(source);
    (-2.0 * u.ln()).sqrt() * (2.0 * PI * v).cos()
}

pub fn sample_normal<S: UniformSource + ?Sized>(source: &mut S, mean: f64, stdev: f64) -> f64 {
    mean + stdev * standard_normal(source)
}

pub(crate) fn derive_seed(base_seed: u64, path_id: u64) -> u64 {
    let mixed = base_seed ^ path_id.rotate_left(32) ^ path_id;
    splitmix64(mixed)
}

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

/// xorshift64* generator, one per simulated path.
#[derive(Debug, Clone)]
pub struct PathRng {
    state: u64,
}

impl PathRng {
    pub fn new(seed: u64) -> Self {
        let state = if seed == 0 {
            0xA5A5_A5A5_A5A5_A5A5
        } else {
            seed
        };
        Self { state }
    }

    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545F4914F6CDD1D)
    }
}

impl UniformSource for PathRng {
    fn next_uniform(&mut self) -> f64 {
        const DENOM: f64 = (1_u64 << 53) as f64;
        let v = self.next_u64() >> 11;
        (v as f64) / DENOM
    }
}

/// Adapts any `rand` generator, e.g. `StdRng::seed_from_u64`.
#[derive(Debug, Clone)]
pub struct RandSource<R>(pub R);

impl<R: rand::RngCore> UniformSource for RandSource<R> {
    fn next_uniform(&mut self) -> f64 {
        rand::Rng::random::<f64>(&mut self.0)
    }
}
