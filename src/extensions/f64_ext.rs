/// Unit conversions for the raw figures the gateway reports.
pub trait UnitConversions {
    /// Returns the value in kilo-units by treating `self` as the value in base units (Wh → kWh).
    fn to_kilo(self) -> Self;

    /// Returns the value in base units by treating `self` as the value in milli-units (mW → W).
    fn from_milli(self) -> Self;
}

impl UnitConversions for f64 {
    fn to_kilo(self) -> f64 {
        self / 1000.0
    }

    fn from_milli(self) -> f64 {
        self / 1000.0
    }
}

/// Picks the first finite candidate, falling back to `cached` when none of them is.
pub fn prefer_finite<I>(candidates: I, cached: f64) -> f64
where
    I: IntoIterator<Item = Option<f64>>,
{
    candidates.into_iter().flatten().find(|value| value.is_finite()).unwrap_or(cached)
}

/// Like [`prefer_finite`] but for optional fields, `None` when nothing finite is available.
pub fn prefer_finite_opt<I>(candidates: I, cached: Option<f64>) -> Option<f64>
where
    I: IntoIterator<Item = Option<f64>>,
{
    candidates
        .into_iter()
        .flatten()
        .find(|value| value.is_finite())
        .or(cached.filter(|value| value.is_finite()))
}
