//! The fixed pipeline topology and its two gateways.
//!
//! The stage graph is compiled in: six stages in a fixed order, two of
//! them conditional. Gateways advance automatically from the requirement
//! flags frozen at process start; they never wait on a human and never
//! re-resolve requirements.

use millgate_types::{RequirementFlags, Stage};

/// Where the pipeline goes after a stage completes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NextStep {
    /// Enter this stage next.
    Stage(Stage),
    /// The pipeline is finished.
    Done,
}

/// Gateway after QC inspection: does extended chemical testing apply?
fn chemical_gateway(flags: RequirementFlags) -> bool {
    flags.extended_chemical
}

/// Gateway before production prep: does nondestructive testing apply?
fn nondestructive_gateway(flags: RequirementFlags) -> bool {
    flags.nondestructive
}

/// The stage entered after `completed`, given the frozen requirement
/// flags of the process.
pub fn next_step(completed: Stage, flags: RequirementFlags) -> NextStep {
    match completed {
        Stage::Intake => NextStep::Stage(Stage::QcInspection),
        Stage::QcInspection => {
            if chemical_gateway(flags) {
                NextStep::Stage(Stage::ChemicalTesting)
            } else if nondestructive_gateway(flags) {
                NextStep::Stage(Stage::NondestructiveTesting)
            } else {
                NextStep::Stage(Stage::ProductionPrep)
            }
        }
        Stage::ChemicalTesting => {
            if nondestructive_gateway(flags) {
                NextStep::Stage(Stage::NondestructiveTesting)
            } else {
                NextStep::Stage(Stage::ProductionPrep)
            }
        }
        Stage::NondestructiveTesting => NextStep::Stage(Stage::ProductionPrep),
        Stage::ProductionPrep => NextStep::Stage(Stage::Approval),
        Stage::Approval => NextStep::Done,
    }
}

/// The full ordered stage plan for a process with these flags.
pub fn planned_stages(flags: RequirementFlags) -> Vec<Stage> {
    let mut plan = vec![Stage::Intake];
    let mut current = Stage::Intake;
    while let NextStep::Stage(next) = next_step(current, flags) {
        plan.push(next);
        current = next;
    }
    plan
}

/// Completed-stage ratio (0-100) once `completed` is done. Display only.
pub fn progress_after(completed: Stage, flags: RequirementFlags) -> u8 {
    let plan = planned_stages(flags);
    let done = plan
        .iter()
        .position(|stage| *stage == completed)
        .map(|index| index + 1)
        .unwrap_or(0);
    ((done * 100) / plan.len()) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flags(extended_chemical: bool, nondestructive: bool) -> RequirementFlags {
        RequirementFlags {
            extended_chemical,
            nondestructive,
        }
    }

    #[test]
    fn base_plan_has_four_stages() {
        assert_eq!(
            planned_stages(flags(false, false)),
            vec![
                Stage::Intake,
                Stage::QcInspection,
                Stage::ProductionPrep,
                Stage::Approval,
            ]
        );
    }

    #[test]
    fn chemical_only_plan_inserts_one_stage() {
        assert_eq!(
            planned_stages(flags(true, false)),
            vec![
                Stage::Intake,
                Stage::QcInspection,
                Stage::ChemicalTesting,
                Stage::ProductionPrep,
                Stage::Approval,
            ]
        );
    }

    #[test]
    fn nondestructive_only_plan_skips_chemical() {
        assert_eq!(
            planned_stages(flags(false, true)),
            vec![
                Stage::Intake,
                Stage::QcInspection,
                Stage::NondestructiveTesting,
                Stage::ProductionPrep,
                Stage::Approval,
            ]
        );
    }

    #[test]
    fn full_plan_orders_chemical_before_nondestructive() {
        assert_eq!(
            planned_stages(flags(true, true)),
            vec![
                Stage::Intake,
                Stage::QcInspection,
                Stage::ChemicalTesting,
                Stage::NondestructiveTesting,
                Stage::ProductionPrep,
                Stage::Approval,
            ]
        );
    }

    #[test]
    fn approval_is_the_last_stage() {
        for f in [
            flags(false, false),
            flags(true, false),
            flags(false, true),
            flags(true, true),
        ] {
            assert_eq!(next_step(Stage::Approval, f), NextStep::Done);
        }
    }

    #[test]
    fn progress_is_strictly_increasing_over_the_plan() {
        let f = flags(true, true);
        let mut last = 0;
        for stage in planned_stages(f) {
            let progress = progress_after(stage, f);
            assert!(progress > last);
            last = progress;
        }
        assert_eq!(last, 100);
    }

    #[test]
    fn progress_of_foreign_stage_is_zero() {
        // Chemical testing is not in the no-flags plan.
        assert_eq!(progress_after(Stage::ChemicalTesting, flags(false, false)), 0);
    }
}
