//! Flat key-value context handed to the external protocol generator.

use std::collections::BTreeMap;
use std::path::Path;

use crate::dose::DoseReport;
use crate::uptake::UptakeFit;

/// File name of the exported context
pub const REPORT_FILE: &str = "report.toml";

pub type Context = BTreeMap<String, String>;

fn with_error(value: f64, error: Option<f64>) -> String {
    match error {
        Some(e) => format!("{value:.5} ± {e:.5}"),
        None    => format!("{value:.5}"),
    }
}

pub fn context(fit: &UptakeFit, dose: &DoseReport) -> Context {
    let r = &fit.rates;
    let [e_t, e_b, e_tt] = fit.stderr;
    let mut context: Context = [
        ("k_t"         , with_error(r.k_t, e_t)),
        ("k_B"         , with_error(r.k_B, e_b)),
        ("k_T"         , with_error(r.k_T, e_tt)),
        ("chi_square"  , format!("{:.3e}", fit.chi_square)),
        ("tiac"        , format!("{:.3}", dose.tiac)),
        ("tiac_numeric", format!("{:.3}", dose.tiac_numeric)),
        ("f_proklad"   , format!("{:.3}", dose.fit_fraction_deviation)),
        ("t_eff"       , format!("{:.3}", dose.effective_half_life)),
        ("mass"        , format!("{:.3}", dose.organ_mass)),
        ("e"           , format!("{:.3}", dose.dose_factor)),
        ("dose"        , format!("{:.3}", dose.absorbed_dose)),
        ("activity"    , format!("{:.3}", dose.administered_activity)),
        ("spect_ratio" , format!("{:.3}", dose.spect_ratio)),
    ].into_iter().map(|(k, v)| (k.to_string(), v)).collect();
    for required in &dose.required {
        context.insert(format!("activity_{}", required.dose), format!("{:.3}", required.activity));
    }
    context
}

pub fn write(context: &Context, path: &Path) -> std::io::Result<()> {
    let text = toml::to_string(context)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    std::fs::write(path, text)
}
