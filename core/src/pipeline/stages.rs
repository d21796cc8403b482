//! The stage table: one row per pipeline step with its declared failure
//! policy, so the failure contract is auditable in one place.

/// What a stage-level failure does to the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagePolicy {
    /// Failure terminates the run in the failed state immediately.
    Fatal,
    /// Failure is absorbed: the stage writes its documented empty/default
    /// artifact, a warning is recorded, and the pipeline proceeds.
    BestEffort,
}

#[derive(Debug, Clone, Copy)]
pub struct StageDef {
    pub step: u8,
    pub label: &'static str,
    pub policy: StagePolicy,
}

/// The ten ordered stages every run walks through.
pub const STAGES: [StageDef; 10] = [
    StageDef {
        step: 1,
        label: "dependency check",
        policy: StagePolicy::Fatal,
    },
    StageDef {
        step: 2,
        label: "target acquisition",
        policy: StagePolicy::BestEffort,
    },
    StageDef {
        step: 3,
        label: "liveness resolution",
        policy: StagePolicy::BestEffort,
    },
    StageDef {
        step: 4,
        label: "service probing",
        policy: StagePolicy::BestEffort,
    },
    StageDef {
        step: 5,
        label: "port discovery",
        policy: StagePolicy::BestEffort,
    },
    StageDef {
        step: 6,
        label: "technology aggregation",
        policy: StagePolicy::BestEffort,
    },
    StageDef {
        step: 7,
        label: "visual capture",
        policy: StagePolicy::BestEffort,
    },
    StageDef {
        step: 8,
        label: "vulnerability assessment",
        policy: StagePolicy::BestEffort,
    },
    StageDef {
        step: 9,
        label: "summary aggregation",
        policy: StagePolicy::BestEffort,
    },
    StageDef {
        step: 10,
        label: "report synthesis",
        policy: StagePolicy::BestEffort,
    },
];
