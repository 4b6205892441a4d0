// Integration tests over the built-in scenarios
use deadlock_core::scenarios::{self, Scenario};
use deadlock_core::{
    CycleAlgorithm, CycleDetector, DeadlockAnalyzer, ProcessId, RecoveryManager, SafetyAnalyzer,
    VictimPolicy, WaitGraphBuilder,
};

fn pids(raw: &[u64]) -> Vec<ProcessId> {
    raw.iter().copied().map(ProcessId).collect()
}

#[test]
fn test_dining_philosophers_four() {
    let snap = scenarios::dining_philosophers(4);

    let wfg = WaitGraphBuilder::build(&snap);
    let cycles = CycleDetector::find_cycles(&wfg);
    assert_eq!(cycles.len(), 1);
    assert_eq!(cycles[0].iter().copied().collect::<Vec<_>>(), pids(&[0, 1, 2, 3]));

    let result = SafetyAnalyzer::is_safe(&snap);
    assert!(!result.safe);
    assert!(result.safe_sequence.is_empty());
}

#[test]
fn test_dining_philosophers_dfs_agrees() {
    let snap = scenarios::dining_philosophers(6);
    let wfg = WaitGraphBuilder::build(&snap);

    let scc = CycleDetector::detect(&wfg, CycleAlgorithm::Scc);
    let dfs = CycleDetector::detect(&wfg, CycleAlgorithm::Dfs);
    assert_eq!(scc, dfs);
    assert_eq!(scc[0].len(), 6);
}

#[test]
fn test_reader_writer_mutual_wait() {
    let snap = scenarios::reader_writer();
    let wfg = WaitGraphBuilder::build(&snap);

    assert!(wfg.has_edge(ProcessId(1), ProcessId(2)));
    assert!(wfg.has_edge(ProcessId(2), ProcessId(1)));
    let cycles = CycleDetector::find_cycles(&wfg);
    assert_eq!(cycles.len(), 1);
    assert_eq!(cycles[0].len(), 2);

    // One DB1 unit is free, so the writer can finish and release DB2.
    let result = SafetyAnalyzer::is_safe(&snap);
    assert!(result.safe);
    assert_eq!(result.safe_sequence, pids(&[2, 1]));
}

#[test]
fn test_no_deadlock_is_safe() {
    let snap = scenarios::no_deadlock();
    let result = SafetyAnalyzer::is_safe(&snap);

    assert!(result.safe);
    assert_eq!(result.safe_sequence, pids(&[0, 1, 2]));
    assert!(SafetyAnalyzer::verify_sequence(&snap, &result.safe_sequence));
    assert_eq!(result.final_available["R1"], 5);
    assert_eq!(result.final_available["R2"], 3);
}

#[test]
fn test_banker_unsafe_and_producer_consumer() {
    assert!(!SafetyAnalyzer::is_safe(&scenarios::banker_unsafe()).safe);

    let snap = scenarios::producer_consumer();
    assert!(!SafetyAnalyzer::is_safe(&snap).safe);
    let cycles = CycleDetector::find_cycles(&WaitGraphBuilder::build(&snap));
    assert_eq!(cycles.len(), 1);
    assert_eq!(cycles[0].iter().copied().collect::<Vec<_>>(), pids(&[1, 2]));
}

#[test]
fn test_recovery_breaks_every_ring() {
    for scenario in [
        Scenario::DiningPhilosophers { philosophers: 5 },
        Scenario::CircularWait { processes: 7 },
        Scenario::ProducerConsumer,
        Scenario::ReaderWriter,
    ] {
        let snap = scenario.build();
        let cycles = CycleDetector::find_cycles(&WaitGraphBuilder::build(&snap));
        let victims = RecoveryManager::choose_victims(&cycles, VictimPolicy::MinImpact);
        assert!(!victims.is_empty(), "{}", scenario);

        let next = RecoveryManager::apply_preemption(&snap, &victims);
        let remaining = CycleDetector::find_cycles(&WaitGraphBuilder::build(&next));
        assert!(remaining.is_empty(), "{} still deadlocked", scenario);
    }
}

#[test]
fn test_philosophers_safe_after_recovery() {
    let analyzer = DeadlockAnalyzer::default();
    let report = analyzer.recover(&scenarios::dining_philosophers(4)).unwrap();
    assert!(report.resolved);

    let prediction = analyzer.predict(&report.new_snapshot).unwrap();
    assert!(prediction.safe);
    assert_eq!(prediction.safe_sequence, pids(&[0, 3, 2, 1]));
}

#[test]
fn test_scenario_metadata() {
    let keys: Vec<&str> = Scenario::ALL.iter().map(|s| s.info().key).collect();
    assert_eq!(
        keys,
        vec![
            "dining_philosophers",
            "reader_writer",
            "circular_wait",
            "banker_unsafe",
            "no_deadlock",
            "producer_consumer",
        ]
    );
}
