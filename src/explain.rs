//! Explanation Renderer
//!
//! Turns a circuit profile and the winner's stats into short, ordered
//! template sentences. No wording is generated beyond the templates below.

use std::collections::BTreeMap;

use crate::models::{CircuitProfile, DriverStat, FusionResult};

const HIGH_QUALIFYING_IMPORTANCE: f64 = 0.7;
const HARD_OVERTAKING: f64 = 0.35;
const HIGH_SAFETY_CAR_RISK: f64 = 0.4;

const TRANSPARENCY_NOTE: &str = "Note: This prediction is based on recent race form and circuit \
     dynamics. Constructor performance and driver experience were incorporated to reduce \
     small-sample bias and improve realism.";

pub struct ExplanationRenderer;

impl ExplanationRenderer {
    /// Sentences explaining `result`; empty when there is no winner
    ///
    /// Without a circuit profile only the driver sentences and the note are
    /// rendered.
    pub fn render(
        circuit: Option<&CircuitProfile>,
        drivers: &BTreeMap<String, DriverStat>,
        result: &FusionResult,
    ) -> Vec<String> {
        let Some(winner) = result.winner.as_deref() else {
            return Vec::new();
        };
        let mut lines = Vec::new();

        if let Some(circuit) = circuit {
            Self::circuit_lines(circuit, &mut lines);
        }

        let name = display_name(winner);
        if let Some(stat) = drivers.get(winner) {
            lines.push(format!(
                "{} showed strong recent form (form_score={}) with low DNF risk ({}).",
                name, stat.form_score, stat.dnf_risk
            ));
            if stat.qualifying_delta < 0.0 {
                lines.push(format!(
                    "{} tends to gain positions during races, which is valuable on this circuit.",
                    name
                ));
            }
        }

        lines.push(TRANSPARENCY_NOTE.to_string());
        lines
    }

    fn circuit_lines(circuit: &CircuitProfile, lines: &mut Vec<String>) {
        if circuit.qualifying_importance > HIGH_QUALIFYING_IMPORTANCE {
            lines.push(format!(
                "The circuit places high importance on qualifying (score={}), favoring drivers \
                 who convert grid position efficiently.",
                circuit.qualifying_importance
            ));
        }
        if circuit.overtaking_difficulty < HARD_OVERTAKING {
            lines.push(
                "Overtaking is relatively difficult on this circuit, which rewards consistency \
                 and clean race execution."
                    .to_string(),
            );
        }
        if circuit.safety_car_risk > HIGH_SAFETY_CAR_RISK {
            lines.push(
                "Higher safety car risk introduces race variability, penalizing drivers with \
                 high DNF risk."
                    .to_string(),
            );
        }
    }
}

/// `max_verstappen` -> `Max Verstappen`
pub fn display_name(id: &str) -> String {
    id.split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
