//! The operator's front end: connect to the ramp, then run trials until the
//! operator quits.

use clap::Parser;
use log::{error, info, warn};
use tribometer::{
    args::TribometerArgs,
    capture::parse_angle,
    config::ExperimentConfig,
    error::TrialError,
    gui::device_selector,
    handshake::{establish, open_serial},
    link::Link,
    physics::PhysicsPipeline,
    report_sink::{read_trial_from_path, write_csv_to_path, ReportNames},
    rig::{log_summary, Rig},
    sim_device::SimulatedRamp,
    transport::{SerialTransport, Transport},
};

use std::{
    error::Error,
    io::{self, Write},
    path::Path,
    process::ExitCode,
};

// Example:
// RUST_LOG=info cargo run -- --port /dev/ttyACM0 --mass 0.2 --out-dir runs

fn main() -> ExitCode {
    env_logger::init();
    let args = TribometerArgs::parse();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &TribometerArgs) -> Result<(), Box<dyn Error>> {
    let config = load_config(args)?;

    if let Some(path) = &args.replay {
        return replay(path, &config, &args.out_dir);
    }

    if args.simulate {
        let link = Link::new(SimulatedRamp::new().noise(0.3), config.link.poll_interval());
        let link = establish(link, config.link.handshake_timeout())?;
        return operator_loop(Rig::new(link, config), &args.out_dir);
    }

    let port = match &args.port {
        Some(port) => port.clone(),
        None => match device_selector(SerialTransport::available_ports()?)? {
            Some(path) => path.to_string_lossy().into_owned(),
            None => {
                info!("No serial port selected");
                return Ok(());
            }
        },
    };

    let link = open_serial(&port, &config.link)?;
    operator_loop(Rig::new(link, config), &args.out_dir)
}

fn load_config(args: &TribometerArgs) -> Result<ExperimentConfig, Box<dyn Error>> {
    let mut config = match &args.config {
        Some(path) => ExperimentConfig::from_path(path)?,
        None => ExperimentConfig::default(),
    };
    if let Some(mass_kg) = args.mass_kg {
        config.physics.mass_kg = mass_kg;
    }
    if let Some(baud_rate) = args.baud_rate {
        config.link.baud_rate = baud_rate;
    }
    config.validate()?;
    Ok(config)
}

fn prompt(text: &str) -> io::Result<Option<String>> {
    print!("{}", text);
    io::stdout().flush()?;
    let mut line = String::new();
    if io::stdin().read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line))
}

fn operator_loop<T: Transport>(mut rig: Rig<T>, out_dir: &Path) -> Result<(), Box<dyn Error>> {
    loop {
        let Some(choice) = prompt("\n[Enter] New trial | [S] Quit: ")? else {
            break;
        };
        if choice.trim().eq_ignore_ascii_case("s") {
            break;
        }

        let Some(input) = prompt("Ramp angle (degrees): ")? else {
            break;
        };
        let angle_deg = match parse_angle(&input) {
            Ok(angle) => angle,
            Err(e) => {
                warn!("{}", e);
                continue;
            }
        };

        let completed = match rig.run_trial(angle_deg) {
            Ok(completed) => completed,
            Err(TrialError::InsufficientData { .. }) => continue,
            Err(e) => {
                warn!("Trial aborted: {}", e);
                continue;
            }
        };

        if let Err(e) = rig.save(&completed, out_dir) {
            error!("Could not save the trial: {}", e);
        }
    }

    info!("Closing the link");
    drop(rig.into_link());
    Ok(())
}

fn replay(path: &Path, config: &ExperimentConfig, out_dir: &Path) -> Result<(), Box<dyn Error>> {
    let trial = read_trial_from_path(path)?;
    info!("Replaying {} samples at {}°", trial.samples.len(), trial.angle_deg);

    let result = PhysicsPipeline::new(config.physics.clone()).process(&trial)?;
    log_summary(&result);

    let names = ReportNames::new(result.angle_deg, result.mass_kg, &config.surface);
    let csv_path = names.csv_in(out_dir);
    write_csv_to_path(&result, &csv_path)?;
    info!("Detailed data saved to {}", csv_path.display());
    Ok(())
}
