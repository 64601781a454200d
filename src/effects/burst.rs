use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{VdcrptError, VdcrptResult};

/// Bytes at the start of a buffer that bursts never touch (container headers).
pub const HEADER_GUARD: usize = 32;

/// Parameters for [`burst_bytes`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BurstParams {
    /// Number of bursts.
    pub iterations: usize,
    /// Length in bytes of each repeated slice.
    pub burst_size: usize,
    /// Minimum consecutive occurrences of a burst slice (inclusive).
    pub min_repeat: usize,
    /// Maximum consecutive occurrences of a burst slice (inclusive).
    pub max_repeat: usize,
}

impl Default for BurstParams {
    fn default() -> Self {
        Self {
            iterations: 20,
            burst_size: 5000,
            min_repeat: 10,
            max_repeat: 20,
        }
    }
}

impl BurstParams {
    pub fn validate(&self) -> VdcrptResult<()> {
        if self.burst_size == 0 {
            return Err(VdcrptError::argument("burst_size must be non-zero"));
        }
        if self.min_repeat == 0 {
            return Err(VdcrptError::argument("min_repeat must be at least 1"));
        }
        if self.min_repeat > self.max_repeat {
            return Err(VdcrptError::argument(format!(
                "min_repeat ({}) must not exceed max_repeat ({})",
                self.min_repeat, self.max_repeat
            )));
        }
        Ok(())
    }

    /// Whether a buffer of `len` bytes leaves room to place a burst.
    pub fn fits(&self, len: usize) -> bool {
        len > HEADER_GUARD + self.burst_size
    }
}

/// Duplicates pseudo-random byte ranges of `data`.
///
/// Each burst copies the `burst_size` bytes at a random position so that they
/// appear between `min_repeat` and `max_repeat` times back to back. Positions
/// are drawn independently in `[HEADER_GUARD, len - burst_size)` and may
/// coincide or overlap; later bursts see the region at its original offset,
/// so overlapping bursts compound.
pub fn burst_bytes<R: Rng + ?Sized>(
    data: &[u8],
    params: &BurstParams,
    rng: &mut R,
) -> VdcrptResult<Vec<u8>> {
    params.validate()?;
    let positions = pick_positions(data.len(), params, rng)?;

    let repeats = positions
        .iter()
        .map(|_| {
            if params.min_repeat == params.max_repeat {
                params.min_repeat
            } else {
                rng.gen_range(params.min_repeat..=params.max_repeat)
            }
        })
        .collect::<Vec<_>>();

    let grown = repeats
        .iter()
        .try_fold(data.len(), |len, r| {
            (r - 1)
                .checked_mul(params.burst_size)
                .and_then(|extra| len.checked_add(extra))
        })
        .ok_or_else(|| {
            VdcrptError::argument(format!(
                "bursts of {} bytes repeated up to {} times overflow the output size",
                params.burst_size, params.max_repeat
            ))
        })?;
    let mut out = Vec::new();
    out.try_reserve_exact(grown).map_err(|e| {
        VdcrptError::argument(format!("cannot allocate {grown} bytes of burst output: {e}"))
    })?;

    let mut cut = 0;
    for (&pos, &repeat) in positions.iter().zip(&repeats) {
        out.extend_from_slice(&data[cut..pos]);
        let slice = &data[pos..pos + params.burst_size];
        // The copy starting at `cut = pos` below supplies the last occurrence.
        for _ in 1..repeat {
            out.extend_from_slice(slice);
        }
        cut = pos;
    }
    out.extend_from_slice(&data[cut..]);

    Ok(out)
}

/// Sorted burst positions, each in `[HEADER_GUARD, len - burst_size)`.
pub(crate) fn pick_positions<R: Rng + ?Sized>(
    len: usize,
    params: &BurstParams,
    rng: &mut R,
) -> VdcrptResult<Vec<usize>> {
    if !params.fits(len) {
        return Err(VdcrptError::argument(format!(
            "buffer of {len} bytes is too small for bursts of {} bytes (need more than {})",
            params.burst_size,
            HEADER_GUARD + params.burst_size
        )));
    }

    let mut positions = (0..params.iterations)
        .map(|_| rng.gen_range(HEADER_GUARD..len - params.burst_size))
        .collect::<Vec<_>>();
    positions.sort_unstable();
    Ok(positions)
}
