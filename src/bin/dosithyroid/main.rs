mod cli;
mod progress;

fn main() -> BoxErr<()> {
    let args = Cli::parse();
    let _logger = Logger::try_with_env_or_str(&args.log_level)?
        .log_to_stderr()
        .start()?;

    match args.command {
        Command::Evaluate { config } => run_evaluation(&config),
        Command::Activity { value, measured_at, administered_at } => {
            let activity = administered_activity(&value, &measured_at, &administered_at)?;
            println!("Administered activity at {administered_at}: {activity:.3} MBq");
            Ok(())
        }
        Command::Preview { stack, window, vertices, out } => {
            let acquisition = Acquisition::load(io::stack::read(&stack)?)?;
            let window: Window = window.parse()?;
            if vertices.is_empty() {
                acquisition.display(window).save(&out)?;
            } else {
                let mask = polygon_mask(acquisition.shape(), &vertices);
                let counts = roi::masked_sum(&acquisition[window], &mask);
                println!("{window}: {} counts in ROI", group_digits(counts.round()));
                acquisition.roi_overlay(window.projection(), &vertices).save(&out)?;
            }
            println!("Wrote {}", out.display());
            Ok(())
        }
    }
}

fn run_evaluation(config_path: &Path) -> BoxErr<()> {
    let config = read_config_file(config_path)?;
    println!("Evaluating {} acquisitions; writing results to {}",
             config.acquisitions.len(), config.output.display());

    let mut progress = Progress::new();
    let evaluation = evaluate(&config, |step| progress.step(step));
    progress.done();
    let Evaluation { samples, fit, dose, outputs, .. } = evaluation?;

    println!("\n{:>10} {:>12}", "time (h)", "uptake (%)");
    for (t, u) in samples.hours.iter().zip(&samples.uptake) {
        println!("{t:>10.2} {:>12.3}", 100.0 * u);
    }

    println!("\nFit ({} evaluations, χ² = {:.3e}):", group_digits(fit.evaluations), fit.chi_square);
    let names = ["k_t", "k_B", "k_T"];
    let values = [fit.rates.k_t, fit.rates.k_B, fit.rates.k_T];
    for ((name, value), error) in names.iter().zip(values).zip(fit.stderr) {
        match error {
            Some(e) => println!("  {name} = {value:.5} ± {e:.5} 1/h"),
            None    => println!("  {name} = {value:.5} 1/h"),
        }
    }

    println!("\n{:>10} {:>10} {:>10} {:>10} {:>10} {:>10}", "TIAC (d)", "F (%)", "T_eff (d)", "E", "mass (g)", "dose (Gy)");
    println!("{:>10.3} {:>10.3} {:>10.3} {:>10.3} {:>10.3} {:>10.3}",
             dose.tiac, dose.fit_fraction_deviation, dose.effective_half_life,
             dose.dose_factor, dose.organ_mass, dose.absorbed_dose);

    println!("\n{:>10} {:>14}", "dose (Gy)", "activity (MBq)");
    for r in &dose.required {
        println!("{:>10} {:>14.3}", r.dose, r.activity);
    }

    println!();
    for path in outputs { println!("Wrote {}", path.display()) }
    Ok(())
}

// ----- Imports -----------------------------------------------------------------------------------------
use std::path::Path;
use clap::Parser;
use flexi_logger::Logger;
use cli::{Cli, Command};
use progress::Progress;
use dosithyroid::{
    BoxErr,
    Acquisition, Window,
    config::read_config_file,
    decay::administered_activity,
    evaluate::{evaluate, Evaluation},
    io,
    roi::{self, polygon_mask},
    utils::group_digits,
};
