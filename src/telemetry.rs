use std::io::{self, Write};

use log::info;
use serde::{Deserialize, Serialize};

use crate::monitor::pipeline::EpochOutcome;

/// Wire form of the line-oriented telemetry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TelemetryFormat {
    /// `>Label:value` lines for plotting tools.
    Teleplot,
    /// Fixed-decimal lines for a human watching the console. Per-sample
    /// values are omitted; only epoch results are printed.
    Human,
}

/// Renders pipeline output as telemetry lines.
///
/// Raw and smoothed magnitudes go out every sample, classification and band
/// results once per epoch. In teleplot form the last dominant frequency is
/// repeated with every sample so the plot holds its value between epochs.
pub struct Reporter<W: Write> {
    out: W,
    format: TelemetryFormat,
    peak_mode: bool,
    last_dominant_hz: f32,
}

impl<W: Write> Reporter<W> {
    pub fn new(out: W, format: TelemetryFormat, peak_mode: bool) -> Self {
        Self {
            out,
            format,
            peak_mode,
            last_dominant_hz: 0.0,
        }
    }

    pub fn sample(&mut self, raw_accel: f32, smoothed_accel: f32) -> io::Result<()> {
        match self.format {
            TelemetryFormat::Teleplot => {
                writeln!(self.out, ">Raw_Acc:{raw_accel:.2}")?;
                writeln!(self.out, ">Filtered_Acc:{smoothed_accel:.2}")?;
                if self.peak_mode {
                    writeln!(self.out, ">Freq_Hz:{:.2}", self.last_dominant_hz)?;
                }
                Ok(())
            }
            TelemetryFormat::Human => Ok(()),
        }
    }

    pub fn epoch(&mut self, outcome: &EpochOutcome) -> io::Result<()> {
        match outcome {
            EpochOutcome::Peak { dominant_hz, .. } => {
                // absent dominant frequency is reported as zero on the wire
                self.last_dominant_hz = dominant_hz.unwrap_or(0.0);
                match self.format {
                    TelemetryFormat::Teleplot => {
                        writeln!(self.out, ">Freq_Hz:{:.2}", self.last_dominant_hz)
                    }
                    TelemetryFormat::Human => match dominant_hz {
                        Some(hz) => writeln!(self.out, "Dominant={hz:.2} Hz"),
                        None => writeln!(self.out, "Dominant=none"),
                    },
                }
            }
            EpochOutcome::Classified(state) => match self.format {
                TelemetryFormat::Teleplot => {
                    writeln!(self.out, ">Tremor:{:.3}", state.tremor_power)?;
                    writeln!(self.out, ">Dysk:{:.3}", state.dyskinesia_power)?;
                    writeln!(self.out, ">Walk:{:.3}", state.walk_power)?;
                    writeln!(self.out, ">Fog:{:.3}", state.fog_power)?;
                    writeln!(self.out, ">FogRatio:{:.3}", state.freeze_ratio)?;
                    writeln!(self.out, ">FreezeFlag:{}", state.freeze as u8)?;
                    writeln!(self.out, ">TremorFlag:{}", state.tremor as u8)?;
                    writeln!(self.out, ">DyskFlag:{}", state.dyskinesia as u8)
                }
                TelemetryFormat::Human => {
                    writeln!(
                        self.out,
                        "Tremor={:.3}  Dysk={:.3}  FogRatio={:.3}  Walk={:.3}",
                        state.tremor_power,
                        state.dyskinesia_power,
                        state.freeze_ratio,
                        state.walk_power
                    )?;
                    writeln!(
                        self.out,
                        "Freeze={}  Tremor?={}  Dysk?={}",
                        state.freeze as u8, state.tremor as u8, state.dyskinesia as u8
                    )
                }
            },
            EpochOutcome::Invalidated { epoch } => match self.format {
                TelemetryFormat::Teleplot => writeln!(self.out, ">EpochValid:0"),
                TelemetryFormat::Human => {
                    writeln!(self.out, "epoch {epoch}: invalidated, classification skipped")
                }
            },
        }
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

/// Three binary symptom indicators, set once per epoch and held until the
/// next epoch recomputes them.
pub trait IndicatorSink {
    fn set(&mut self, tremor: bool, dyskinesia: bool, freeze: bool);
}

/// Logs indicator transitions instead of driving real outputs.
#[derive(Default)]
pub struct LogIndicators {
    last: Option<(bool, bool, bool)>,
}

impl IndicatorSink for LogIndicators {
    fn set(&mut self, tremor: bool, dyskinesia: bool, freeze: bool) {
        let state = (tremor, dyskinesia, freeze);
        if self.last != Some(state) {
            info!("indicators: tremor={tremor} dyskinesia={dyskinesia} freeze={freeze}");
        }
        self.last = Some(state);
    }
}

/// Records every indicator update, for tests.
#[derive(Default)]
pub struct RecordingIndicators {
    pub states: Vec<(bool, bool, bool)>,
}

impl IndicatorSink for RecordingIndicators {
    fn set(&mut self, tremor: bool, dyskinesia: bool, freeze: bool) {
        self.states.push((tremor, dyskinesia, freeze));
    }
}
