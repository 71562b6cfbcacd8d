use serde::Serialize;

use crate::dumps::{FrameDumps, Sampled};

#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub name: &'static str,
    pub passed: bool,
    pub failures: Vec<String>,
}

impl CheckResult {
    fn from_failures(name: &'static str, failures: Vec<String>) -> Self {
        Self {
            name,
            passed: failures.is_empty(),
            failures,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct VerifyReport {
    pub frame: u32,
    pub machines: u32,
    pub checks: Vec<CheckResult>,
}

impl VerifyReport {
    pub fn passed(&self) -> bool {
        self.checks.iter().all(|check| check.passed)
    }
}

pub fn verify(dumps: &FrameDumps, frame: u32) -> VerifyReport {
    VerifyReport {
        frame,
        machines: dumps.machines.len() as u32,
        checks: vec![
            merge_all_matches_feedback(dumps),
            merge_matches_decoded(dumps),
            merged_reconstructs_feedback(dumps),
            minus_one_matches(dumps),
        ],
    }
}

/// Every machine received exactly the merged-all image.
fn merge_all_matches_feedback(dumps: &FrameDumps) -> CheckResult {
    let failures = dumps
        .machines
        .iter()
        .filter(|machine| !machine.feedback.is_same(&dumps.merge_all))
        .map(|machine| format!("machine {} feedback differs from merge-all", machine.machine_id))
        .collect();
    CheckResult::from_failures("merge-all-vs-feedback", failures)
}

/// The merger's view of each machine equals what that machine decoded.
fn merge_matches_decoded(dumps: &FrameDumps) -> CheckResult {
    let failures = dumps
        .machines
        .iter()
        .filter_map(|machine| match dumps.merge.get(machine.machine_id as usize) {
            Some(merge) if merge.is_same(&machine.decoded) => None,
            Some(_) => Some(format!(
                "machine {} decoded image differs from merger input",
                machine.machine_id
            )),
            None => Some(format!("no merge dump for machine {}", machine.machine_id)),
        })
        .collect();
    CheckResult::from_failures("merge-vs-decoded", failures)
}

fn combine<'a>(parts: impl IntoIterator<Item = &'a Sampled>, width: u32, height: u32) -> Result<Sampled, String> {
    let mut acc = Sampled::zero(width, height);
    for part in parts {
        acc.merge(part).map_err(|err| err.to_string())?;
    }
    Ok(acc)
}

fn frame_size(dumps: &FrameDumps) -> (u32, u32) {
    let beauty = &dumps.merge_all.beauty;
    (beauty.width(), beauty.height())
}

/// Re-merging every machine's contribution yields the feedback image.
fn merged_reconstructs_feedback(dumps: &FrameDumps) -> CheckResult {
    let (width, height) = frame_size(dumps);
    let combined = match combine(dumps.machines.iter().map(|m| &m.merged), width, height) {
        Ok(combined) => combined,
        Err(err) => {
            return CheckResult::from_failures(
                "merged-reconstructs-feedback",
                vec![format!("combining merged images failed: {err}")],
            )
        }
    };
    let failures = dumps
        .machines
        .iter()
        .filter(|machine| !machine.feedback.is_same(&combined))
        .map(|machine| {
            format!(
                "machine {} feedback differs from recombined merge",
                machine.machine_id
            )
        })
        .collect();
    CheckResult::from_failures("merged-reconstructs-feedback", failures)
}

/// Merging all machines but one reproduces that machine's minus-one image.
fn minus_one_matches(dumps: &FrameDumps) -> CheckResult {
    let (width, height) = frame_size(dumps);
    let mut failures = Vec::new();
    for machine in &dumps.machines {
        let others = dumps
            .machines
            .iter()
            .filter(|other| other.machine_id != machine.machine_id)
            .map(|other| &other.merged);
        match combine(others, width, height) {
            Ok(expected) if expected.is_same(&machine.minus_one) => {}
            Ok(_) => failures.push(format!(
                "machine {} minus-one differs from merge of the others",
                machine.machine_id
            )),
            Err(err) => failures.push(format!(
                "machine {} minus-one merge failed: {err}",
                machine.machine_id
            )),
        }
    }
    CheckResult::from_failures("minus-one", failures)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dumps::MachineDumps;
    use fbcore::RgbImage;

    fn flat(color: [f32; 3], count: f32) -> Sampled {
        Sampled {
            beauty: RgbImage::from_fn(2, 2, |_, _| color),
            num_sample: RgbImage::from_fn(2, 2, |_, _| [count; 3]),
        }
    }

    // Two machines: one contributes (1,0,0) x1, the other (0,0,1) x3.
    fn consistent() -> FrameDumps {
        let a = flat([1.0, 0.0, 0.0], 1.0);
        let b = flat([0.0, 0.0, 1.0], 3.0);
        let all = flat([0.25, 0.0, 0.75], 4.0);
        FrameDumps {
            merge_all: all.clone(),
            merge: vec![a.clone(), b.clone()],
            machines: vec![
                MachineDumps {
                    machine_id: 0,
                    feedback: all.clone(),
                    decoded: a.clone(),
                    merged: a.clone(),
                    minus_one: b.clone(),
                },
                MachineDumps {
                    machine_id: 1,
                    feedback: all,
                    decoded: b.clone(),
                    merged: b,
                    minus_one: a,
                },
            ],
        }
    }

    #[test]
    fn consistent_dumps_pass_every_check() {
        let report = verify(&consistent(), 0);
        assert!(report.passed(), "{report:?}");
        assert_eq!(report.checks.len(), 4);
    }

    #[test]
    fn corrupted_feedback_fails_two_checks() {
        let mut dumps = consistent();
        dumps.machines[1].feedback.beauty.set_pixel(1, 1, [0.3, 0.0, 0.75]);
        let report = verify(&dumps, 0);
        assert!(!report.passed());
        let failed: Vec<_> = report
            .checks
            .iter()
            .filter(|c| !c.passed)
            .map(|c| c.name)
            .collect();
        assert_eq!(failed, vec!["merge-all-vs-feedback", "merged-reconstructs-feedback"]);
    }

    #[test]
    fn wrong_minus_one_is_reported_per_machine() {
        let mut dumps = consistent();
        dumps.machines[0].minus_one = flat([0.0, 0.0, 1.0], 2.0);
        let report = verify(&dumps, 0);
        let minus_one = &report.checks[3];
        assert!(!minus_one.passed);
        assert_eq!(minus_one.failures.len(), 1);
        assert!(minus_one.failures[0].starts_with("machine 0"));
    }

    #[test]
    fn size_mismatch_is_a_failure_not_a_panic() {
        let mut dumps = consistent();
        dumps.machines[1].merged = Sampled::zero(3, 3);
        let report = verify(&dumps, 0);
        assert!(!report.checks[2].passed);
        assert!(report.checks[2].failures[0].contains("combining merged images failed"));
    }

    #[test]
    fn report_serializes() {
        let json = serde_json::to_value(verify(&consistent(), 5)).unwrap();
        assert_eq!(json["frame"], 5);
        assert_eq!(json["checks"][0]["name"], "merge-all-vs-feedback");
        assert_eq!(json["checks"][0]["passed"], true);
    }
}
