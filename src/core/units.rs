/// Converts gpm × °F into Btu/h for water: 8.33 lb/gal × 60 min/h × 1 Btu/(lb·°F), rounded.
pub const WATER_BTU_PER_GPM_DEG_F: f64 = 500.;
pub const HOURS_PER_DAY: u32 = 24;
pub const MONTHS_PER_YEAR: u32 = 12;
pub const DAYS_PER_YEAR: u32 = 365;
pub const HOURS_PER_YEAR: usize = (DAYS_PER_YEAR * HOURS_PER_DAY) as usize;

/// Heat carried by a water flow across a temperature difference, in Btu/h.
///
/// Arguments:
/// * `flow` - volumetric flow, in gpm
/// * `delta_t` - temperature difference, in °F
pub fn heat_rate_btu_per_hour(flow: f64, delta_t: f64) -> f64 {
    flow * delta_t * WATER_BTU_PER_GPM_DEG_F
}
