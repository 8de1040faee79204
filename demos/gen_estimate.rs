//! Generate an estimate report from a synthetic recording for validation testing

use synheart_pulse::report::ReportEncoder;
use synheart_pulse::synthetic::SyntheticPulse;
use synheart_pulse::PulseMonitor;

fn main() {
    let pulse = SyntheticPulse {
        bpm: 72.0,
        jitter: 5.0,
        ..SyntheticPulse::default()
    };

    let mut monitor = PulseMonitor::new();
    for sample in pulse.samples() {
        if let Err(e) = monitor.add_sample(sample) {
            eprintln!("Error: {e:?}");
            return;
        }
    }

    match ReportEncoder::new().encode_to_json(&monitor) {
        Ok(report) => print!("{report}"),
        Err(e) => eprintln!("Error: {e:?}"),
    }
}
