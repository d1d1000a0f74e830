//! Closed-loop intensity law with a non-regressing high-water mark.

use fes_protocol::GainCoefficient;

/// Inputs of one closed-loop evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LawInputs {
    pub weight_total: u16,
    pub residual_weight: u16,
    pub mese: u16,
    pub mese_max: u16,
    pub gain: GainCoefficient,
}

/// `raw = MESE + gain * (weight - residual)`, saturated into `[MESE, MESE_max]`,
/// then never lower than anything already produced in this sojourn.
#[derive(Debug, Clone, Default)]
pub struct ClosedLoopLaw {
    high_water: u16,
}

impl ClosedLoopLaw {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget the high-water mark; called on every ClosedLoop entry.
    pub fn reset(&mut self) {
        self.high_water = 0;
    }

    pub fn high_water(&self) -> u16 {
        self.high_water
    }

    /// Output range. When the ceiling sits below the floor the ceiling wins.
    pub fn bounds(mese: u16, mese_max: u16) -> (u16, u16) {
        (mese.min(mese_max), mese_max)
    }

    pub fn resolve(&mut self, inp: &LawInputs) -> u16 {
        if inp.mese_max == 0 {
            self.high_water = 0;
            return 0;
        }
        let (lo, hi) = Self::bounds(inp.mese, inp.mese_max);
        let control_weight = i32::from(inp.weight_total) - i32::from(inp.residual_weight);
        let raw = i32::from(inp.mese) + (inp.gain.as_fraction() * control_weight as f32) as i32;
        let saturated = raw.clamp(i32::from(lo), i32::from(hi)) as u16;
        let resolved = self.high_water.clamp(lo, hi).max(saturated);
        self.high_water = resolved;
        resolved
    }
}
