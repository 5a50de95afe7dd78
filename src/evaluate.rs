//! The complete evaluation of one study, driven by a configuration file.

use std::path::PathBuf;

use crate::acquisition::Projection;
use crate::config::Config;
use crate::decay::administered_activity;
use crate::deadtime::AUDIT_FILE;
use crate::dose::DoseReport;
use crate::error::{Error, Result};
use crate::plot::GRAPH_FILE;
use crate::report::{self, Context, REPORT_FILE};
use crate::session::{Session, TimeActivity};
use crate::uptake::UptakeFit;

pub struct Evaluation {
    pub session: Session,
    pub samples: TimeActivity,
    pub fit: UptakeFit,
    pub dose: DoseReport,
    pub context: Context,
    /// Files written to the output directory
    pub outputs: Vec<PathBuf>,
}

/// Run every step from loading the acquisitions to writing the report,
/// announcing each step to `step` before it starts.
pub fn evaluate(config: &Config, mut step: impl FnMut(&str)) -> Result<Evaluation> {
    let out = &config.output;
    std::fs::create_dir_all(out).map_err(|source| Error::Io { path: out.clone(), source })?;
    let mut outputs = vec![];

    step("Loading acquisitions");
    let mut session = Session::load(&config.acquisitions, config.dead_time.table()?, config.calibration.factors()?)?;

    step("Correcting dead time");
    let audit = out.join(AUDIT_FILE);
    session.correct_dead_time(&audit)?;
    outputs.push(audit);

    step("Aligning acquisitions");
    for projection in Projection::BOTH {
        session.align(projection, config.reference, config.sigma)?;
    }

    step("Applying regions of interest");
    for (projection, polygon) in [(Projection::Anterior, &config.roi.anterior), (Projection::Posterior, &config.roi.posterior)] {
        if polygon.is_empty() { continue }
        let overlays = session.segment(projection, config.reference, polygon)?;
        let path = out.join(format!("roi_{projection}.png"));
        overlays[config.reference].save(&path)?;
        outputs.push(path);
    }

    step("Quantifying uptake");
    let activity = &config.activity;
    let administered = administered_activity(&activity.value.as_text(), &activity.measured_at, &activity.administered_at)?;
    log::info!("Administered activity: {administered:.2} MBq");
    let samples = session.time_activity(config.correction, administered, &activity.administered_at)?.clone();

    step("Fitting uptake model");
    let fit = session.fit(None)?.clone();

    step("Computing dose");
    let dose = session.dose(config.volume, config.spect_uptake, config.reference)?;

    step("Writing outputs");
    let graph = out.join(GRAPH_FILE);
    session.plot(&graph, config.region, units::hr_(config.plot_extension()), config.spect_uptake, config.reference)?;
    outputs.push(graph);

    let context = report::context(&fit, &dose);
    let path = out.join(REPORT_FILE);
    report::write(&context, &path).map_err(|source| Error::Io { path: path.clone(), source })?;
    outputs.push(path);

    Ok(Evaluation { session, samples, fit, dose, context, outputs })
}

