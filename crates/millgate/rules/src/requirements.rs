//! Conditional-stage requirement resolution.
//!
//! The decision tables mirror the plant's testing regulations: a fixed
//! grade allow-list for extended chemical testing, a (shape, size-band)
//! lookup for nondestructive testing, and size thresholds that force
//! extended chemical testing regardless of grade.

use millgate_types::RequirementFlags;
use serde::{Deserialize, Serialize};

// ── Decision tables ──────────────────────────────────────────────────

/// Grades whose chemistry must always be re-verified in the laboratory.
const EXTENDED_CHEMICAL_GRADES: [&str; 6] = [
    "12X18H10T",
    "08X18H10T",
    "10X17H13M2T",
    "03X17H14M3",
    "20X13",
    "40X13",
];

/// Round stock thicker than this forces extended chemical testing.
const ROUND_CHEMICAL_THRESHOLD_MM: u32 = 200;
/// Plate thicker than this forces extended chemical testing.
const PLATE_CHEMICAL_THRESHOLD_MM: u32 = 50;

/// A size band mapping to the grades that need nondestructive testing
/// inside it. `grades: None` means every grade qualifies. Bands are
/// half-open (`min <= v < max`); the last band of each shape is unbounded.
struct Band {
    min_mm: u32,
    max_mm: Option<u32>,
    grades: Option<&'static [&'static str]>,
}

const ROUND_BANDS: [Band; 3] = [
    Band {
        min_mm: 50,
        max_mm: Some(100),
        grades: Some(&["40X", "20X13", "12X18H10T"]),
    },
    Band {
        min_mm: 100,
        max_mm: Some(200),
        grades: Some(&["40X", "20X13", "12X18H10T", "09Г2С"]),
    },
    Band {
        min_mm: 200,
        max_mm: None,
        grades: None,
    },
];

const PLATE_BANDS: [Band; 3] = [
    Band {
        min_mm: 10,
        max_mm: Some(20),
        grades: Some(&["40X", "20X13"]),
    },
    Band {
        min_mm: 20,
        max_mm: Some(50),
        grades: Some(&["40X", "20X13", "12X18H10T"]),
    },
    Band {
        min_mm: 50,
        max_mm: None,
        grades: None,
    },
];

// ── Size parsing ─────────────────────────────────────────────────────

/// A material size designation parsed into a typed shape.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum SizeSpec {
    /// Round stock: `⌀150`, `d40`, `диаметр 75`.
    Round { diameter_mm: u32 },
    /// Plate: `лист 20мм`, `10x1000x2000`.
    Plate { thickness_mm: u32 },
    /// No marker matched, or a marker without a number. A valid terminal
    /// parse state, never an error.
    Unrecognized,
}

impl SizeSpec {
    /// Parse a free-form size designation.
    ///
    /// Round markers win over plate markers, so `d10x100` is round stock.
    pub fn parse(raw: &str) -> SizeSpec {
        let size = raw.trim().to_lowercase();

        if size.contains('⌀') || size.starts_with('d') || size.contains("диаметр") {
            if let Some(diameter_mm) = first_number(&size) {
                return SizeSpec::Round { diameter_mm };
            }
        } else if size.contains("лист") || size.contains('x') {
            if let Some(thickness_mm) = first_number(&size) {
                return SizeSpec::Plate { thickness_mm };
            }
        }

        SizeSpec::Unrecognized
    }
}

impl std::fmt::Display for SizeSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SizeSpec::Round { diameter_mm } => write!(f, "round ⌀{}mm", diameter_mm),
            SizeSpec::Plate { thickness_mm } => write!(f, "plate {}mm", thickness_mm),
            SizeSpec::Unrecognized => write!(f, "unrecognized size"),
        }
    }
}

/// First contiguous run of ASCII digits, if it fits a `u32`.
fn first_number(s: &str) -> Option<u32> {
    let digits: String = s
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

// ── Resolution ───────────────────────────────────────────────────────

/// Outcome of requirement resolution for one batch.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RequirementDecision {
    /// Which conditional stages apply.
    pub flags: RequirementFlags,
    /// One human-readable reason per positive decision, in decision order.
    pub reasons: Vec<String>,
    /// How the size designation parsed.
    pub size: SizeSpec,
}

/// Decide which conditional stages a batch must pass.
///
/// Pure and deterministic; never fails. Grades match case-insensitively.
pub fn resolve(grade: &str, size: &str) -> RequirementDecision {
    let size_spec = SizeSpec::parse(size);
    let grade = grade.trim();
    let grade_upper = grade.to_uppercase();
    let mut reasons = Vec::new();

    let mut extended_chemical = EXTENDED_CHEMICAL_GRADES
        .iter()
        .any(|g| g.to_uppercase() == grade_upper);
    if extended_chemical {
        reasons.push(format!(
            "grade {} is on the extended chemical testing list",
            grade
        ));
    }

    match size_spec {
        SizeSpec::Round { diameter_mm } if diameter_mm > ROUND_CHEMICAL_THRESHOLD_MM => {
            extended_chemical = true;
            reasons.push(format!(
                "diameter {}mm exceeds {}mm and requires extended chemical testing",
                diameter_mm, ROUND_CHEMICAL_THRESHOLD_MM
            ));
        }
        SizeSpec::Plate { thickness_mm } if thickness_mm > PLATE_CHEMICAL_THRESHOLD_MM => {
            extended_chemical = true;
            reasons.push(format!(
                "plate thickness {}mm exceeds {}mm and requires extended chemical testing",
                thickness_mm, PLATE_CHEMICAL_THRESHOLD_MM
            ));
        }
        _ => {}
    }

    let nondestructive = match size_spec {
        SizeSpec::Round { diameter_mm } => band_requires(&ROUND_BANDS, diameter_mm, &grade_upper),
        SizeSpec::Plate { thickness_mm } => band_requires(&PLATE_BANDS, thickness_mm, &grade_upper),
        SizeSpec::Unrecognized => false,
    };
    if nondestructive {
        reasons.push(format!(
            "{} with grade {} falls in a nondestructive testing band",
            size_spec, grade
        ));
    }

    RequirementDecision {
        flags: RequirementFlags {
            extended_chemical,
            nondestructive,
        },
        reasons,
        size: size_spec,
    }
}

fn band_requires(bands: &[Band], value_mm: u32, grade_upper: &str) -> bool {
    for band in bands {
        let in_band =
            value_mm >= band.min_mm && band.max_mm.map_or(true, |max| value_mm < max);
        if !in_band {
            continue;
        }
        return match band.grades {
            None => true,
            Some(grades) => grades.iter().any(|g| g.to_uppercase() == grade_upper),
        };
    }
    false
}
