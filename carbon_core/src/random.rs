//! A source of random numbers, swappable between a hosted test build and an
//! embedded target build. The arp VM's `RAND`/`FIND_RANDOM_NOTE` opcodes and
//! song-mode random-scene advance both need one.
//!
//! Grounded on the reference firmware's `MachineResources`, which splits the
//! same way between `target_release` (an RNG peripheral) and `host_testing`
//! (`rand::random()`).

#[cfg(feature = "target_release")]
use rand_core::RngCore;

#[cfg(feature = "host_testing")]
use rand::Rng;

/// A source of bounded random numbers for the arp VM and song-mode logic.
pub trait RandomSource {
    /// A random value in `0..bound`. `bound == 0` always returns 0.
    fn random_below(&mut self, bound: u32) -> u32;
}

#[cfg(feature = "target_release")]
pub struct HardwareRandom<R: RngCore> {
    rng: R,
}

#[cfg(feature = "target_release")]
impl<R: RngCore> HardwareRandom<R> {
    pub fn new(rng: R) -> Self {
        HardwareRandom { rng }
    }
}

#[cfg(feature = "target_release")]
impl<R: RngCore> RandomSource for HardwareRandom<R> {
    fn random_below(&mut self, bound: u32) -> u32 {
        if bound == 0 {
            return 0;
        }
        self.rng.next_u32() % bound
    }
}

#[cfg(feature = "host_testing")]
#[derive(Default)]
pub struct HostRandom;

#[cfg(feature = "host_testing")]
impl RandomSource for HostRandom {
    fn random_below(&mut self, bound: u32) -> u32 {
        if bound == 0 {
            return 0;
        }
        rand::thread_rng().gen_range(0..bound)
    }
}

/// A deterministic source for tests that need reproducible "random" sequences.
pub struct FixedSequence<'a> {
    values: &'a [u32],
    pos: usize,
}

impl<'a> FixedSequence<'a> {
    pub fn new(values: &'a [u32]) -> Self {
        FixedSequence { values, pos: 0 }
    }
}

impl<'a> RandomSource for FixedSequence<'a> {
    fn random_below(&mut self, bound: u32) -> u32 {
        if bound == 0 || self.values.is_empty() {
            return 0;
        }
        let v = self.values[self.pos % self.values.len()];
        self.pos += 1;
        v % bound
    }
}
