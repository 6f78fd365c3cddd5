// Copyright 2025 jonefeewang@gmail.com
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Values sent to the server are drawn from `0..NUMBER_RANGE`.
pub const NUMBER_RANGE: u32 = 1024;

/// Pseudo-random source owned by a single connection.
#[derive(Debug, Clone)]
pub struct NumberGenerator {
    rng: StdRng,
}

impl NumberGenerator {
    pub fn from_entropy() -> Self {
        NumberGenerator {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        NumberGenerator {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Uniform in `[0, 1024)`, independent of previous values.
    pub fn next_value(&mut self) -> u32 {
        self.rng.gen_range(0..NUMBER_RANGE)
    }
}
