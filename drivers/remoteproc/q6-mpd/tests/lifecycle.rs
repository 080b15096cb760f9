mod sim;

use mdt_image::build::MdtBuilder;
use q6_mpd::descriptor::{MPD_WCNSS_PAS_ID, WCNSS_PAS_ID, WCSS_CRASH_REASON};
use q6_mpd::signals::{InboundLine, PANIC_DELAY};
use q6_mpd::{CrashInfo, Lifecycle, PdState, RprocError, SsrEvent, TimeoutError, Timeouts};
use sim::{Call, Endpoint, Rig, SPAWN_BIT, STOP_BIT};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

const FW: &str = "ath11k/IPQ5018/q6_fw.mdt";
const PD_FW: &str = "ath11k/IPQ5018/q6_pd_fw.mdt";
const AHB: &str = "qcom,ipq5018-wcss-ahb-mpd";
const PCIE: &str = "qcom,ipq5018-wcss-pcie-mpd";

fn image() -> Vec<u8> {
    MdtBuilder::new()
        .segment(0x4B00_1000, &[0x10; 16], 16)
        .pd_segment(1, 0x4B04_0000, &[0x41; 16], 0x20)
        .pd_segment(2, 0x4B05_0000, &[0x42; 16], 16)
        .build()
        .mdt
}

/// An ipq5018 root that reports ready on reset and acknowledges stops.
fn running_root(rig: &Rig) -> Endpoint {
    rig.firmware.insert(FW, image());
    rig.firmware.insert(PD_FW, image());
    let root = rig.root(&[FW], 10);
    rig.auto_ready(&root);
    rig.auto_stop(&root);
    root
}

/// A user PD that acknowledges spawn and stop requests.
fn cooperative_pd(rig: &Rig, name: &str, root: &Endpoint, irq_base: u32) -> Endpoint {
    let pd = rig.dependent(name, AHB, PD_FW, root.id, irq_base);
    rig.auto_spawn(&pd);
    rig.auto_stop(&pd);
    pd
}

#[test]
fn root_boot_and_shutdown() {
    let rig = Rig::new();
    let root = running_root(&rig);

    assert_eq!(rig.registry.boot(root.id).unwrap(), Lifecycle::Running);
    assert!(rig.registry.is_running(root.id).unwrap());
    assert_eq!(rig.clock.enabled(), 1);

    rig.registry.shutdown(root.id).unwrap();
    assert_eq!(rig.registry.lifecycle(root.id).unwrap(), Lifecycle::Offline);
    assert!(!rig.registry.is_running(root.id).unwrap());
    assert_eq!(rig.clock.enabled(), 0);
    assert_eq!(rig.secure.count("pas_shutdown"), 1);
    // The root is never asked to stop through its doorbell.
    assert_eq!(root.word.raised(STOP_BIT), 0);

    let events: Vec<_> = rig.notes.events().into_iter().map(|(s, e, _)| (s, e)).collect();
    let q6 = String::from("q6wcss");
    assert_eq!(
        events,
        vec![
            (q6.clone(), SsrEvent::BeforePowerup),
            (q6.clone(), SsrEvent::AfterPowerup),
            (q6.clone(), SsrEvent::BeforeShutdown),
            (q6, SsrEvent::AfterShutdown),
        ]
    );
}

#[test]
fn root_start_timeout_is_reported_without_rollback() {
    let rig = Rig::new();
    rig.firmware.insert(FW, image());
    let root = rig.root(&[FW], 10);

    let err = rig.registry.boot(root.id).unwrap_err();
    assert!(matches!(err, RprocError::Timeout(TimeoutError::Start { .. })));
    assert_eq!(rig.registry.lifecycle(root.id).unwrap(), Lifecycle::Offline);
    assert_eq!(rig.registry.power_count(root.id).unwrap(), 0);
    assert_eq!(rig.secure.count("pas_shutdown"), 0);
}

#[test]
fn refused_reset_releases_the_clock() {
    let rig = Rig::new();
    let root = running_root(&rig);
    rig.secure.refuse("auth_and_reset");

    let err = rig.registry.boot(root.id).unwrap_err();
    assert!(matches!(err, RprocError::Secure(ref e) if e.call == "auth_and_reset"));
    assert_eq!(rig.clock.enabled(), 0);

    rig.secure.allow("auth_and_reset");
    assert_eq!(rig.registry.boot(root.id).unwrap(), Lifecycle::Running);
    assert_eq!(rig.clock.enabled(), 1);
}

#[test]
fn failed_clock_stops_the_boot_before_reset() {
    let rig = Rig::new();
    let root = running_root(&rig);
    rig.clock.fail.store(true);

    assert!(matches!(
        rig.registry.boot(root.id),
        Err(RprocError::Clock(_))
    ));
    assert_eq!(rig.secure.count("auth_and_reset"), 0);
}

#[test]
fn refused_root_shutdown_keeps_it_running() {
    let rig = Rig::new();
    let root = running_root(&rig);
    rig.registry.boot(root.id).unwrap();
    rig.secure.refuse("pas_shutdown");

    assert!(matches!(
        rig.registry.shutdown(root.id),
        Err(RprocError::Secure(_))
    ));
    assert_eq!(rig.registry.power_count(root.id).unwrap(), 1);
    assert_eq!(rig.registry.lifecycle(root.id).unwrap(), Lifecycle::Running);
    assert_eq!(rig.clock.enabled(), 1);
}

#[test]
fn unmatched_shutdown_is_ignored() {
    let rig = Rig::new();
    let root = running_root(&rig);
    rig.registry.shutdown(root.id).unwrap();
    assert!(rig.secure.calls().is_empty());
}

#[test]
fn dependent_boots_its_root_first() {
    let rig = Rig::new();
    let root = running_root(&rig);
    let pd = cooperative_pd(&rig, "pd-1", &root, 20);

    assert_eq!(rig.registry.boot(pd.id).unwrap(), Lifecycle::Running);

    assert_eq!(rig.registry.lifecycle(root.id).unwrap(), Lifecycle::Running);
    assert_eq!(rig.registry.power_count(root.id).unwrap(), 1);
    assert!(rig.registry.is_running(pd.id).unwrap());
    assert_eq!(rig.registry.pd_state(pd.id).unwrap(), PdState::Normal);

    // The root image already carried the PD segments.
    assert_eq!(rig.secure.count("pd_segment_load"), 0);
    let calls = rig.secure.calls();
    let reset = calls
        .iter()
        .position(|c| *c == Call::AuthAndReset(MPD_WCNSS_PAS_ID))
        .unwrap();
    let radio = calls
        .iter()
        .position(|c| *c == Call::RadioUp(MPD_WCNSS_PAS_ID))
        .unwrap();
    assert!(reset < radio);
    assert_eq!(pd.word.history(), vec![(1 << SPAWN_BIT, 1 << SPAWN_BIT), (1 << SPAWN_BIT, 0)]);
}

#[test]
fn dependent_stop_always_releases_its_root() {
    let rig = Rig::new();
    let root = running_root(&rig);
    let pd = cooperative_pd(&rig, "pd-1", &root, 20);
    rig.registry.boot(pd.id).unwrap();

    rig.registry.shutdown(pd.id).unwrap();

    assert_eq!(pd.word.raised(STOP_BIT), 1);
    assert_eq!(rig.secure.count("int_radio_powerdown"), 1);
    assert_eq!(rig.secure.count("pas_shutdown"), 1);
    assert_eq!(rig.registry.lifecycle(root.id).unwrap(), Lifecycle::Offline);
    assert_eq!(rig.registry.lifecycle(pd.id).unwrap(), Lifecycle::Offline);
    assert_eq!(rig.registry.pd_state(pd.id).unwrap(), PdState::Shutdown);
}

#[test]
fn dependent_stop_timeout_still_releases_its_root() {
    let rig = Rig::new();
    let root = running_root(&rig);
    let pd = rig.dependent("pd-1", AHB, PD_FW, root.id, 20);
    rig.auto_spawn(&pd);
    rig.registry.boot(pd.id).unwrap();

    let err = rig.registry.shutdown(pd.id).unwrap_err();

    assert!(matches!(err, RprocError::Timeout(TimeoutError::Stop { .. })));
    assert_eq!(pd.word.value() & (1 << STOP_BIT), 0);
    assert_eq!(rig.secure.count("int_radio_powerdown"), 1);
    assert_eq!(rig.registry.power_count(root.id).unwrap(), 0);
    assert_eq!(rig.registry.lifecycle(root.id).unwrap(), Lifecycle::Offline);
    assert_eq!(rig.registry.pd_state(pd.id).unwrap(), PdState::Shutdown);
}

#[test]
fn spawn_timeout_releases_the_root() {
    let rig = Rig::new();
    let root = running_root(&rig);
    let pd = rig.dependent("pd-1", PCIE, PD_FW, root.id, 20);

    let err = rig.registry.boot(pd.id).unwrap_err();

    assert!(matches!(err, RprocError::Timeout(TimeoutError::Spawn { .. })));
    assert!(!rig.registry.is_running(pd.id).unwrap());
    assert_eq!(pd.word.value(), 0);
    assert_eq!(rig.registry.power_count(pd.id).unwrap(), 0);
    assert_eq!(rig.registry.power_count(root.id).unwrap(), 0);
    assert_eq!(rig.secure.count("pas_shutdown"), 1);
    // The PCIe flavour has no secure radio power control.
    assert_eq!(rig.secure.count("int_radio_powerup"), 0);
}

#[test]
fn shared_root_stays_up_until_the_last_dependent_stops() {
    let rig = Rig::new();
    let root = running_root(&rig);
    let pd1 = cooperative_pd(&rig, "pd-1", &root, 20);
    let pd2 = cooperative_pd(&rig, "pd-2", &root, 30);

    rig.registry.boot(pd1.id).unwrap();
    rig.registry.boot(pd2.id).unwrap();
    assert_eq!(rig.registry.power_count(root.id).unwrap(), 2);
    assert_eq!(rig.secure.count("auth_and_reset"), 1);

    rig.registry.shutdown(pd1.id).unwrap();
    assert_eq!(rig.registry.lifecycle(root.id).unwrap(), Lifecycle::Running);
    assert_eq!(rig.secure.count("pas_shutdown"), 0);
    assert_eq!(rig.registry.pd_state(pd1.id).unwrap(), PdState::Shutdown);

    // Restarting pd-1 alone reloads only its own segments.
    rig.secure.clear();
    rig.registry.boot(pd1.id).unwrap();
    let segments: Vec<_> = rig
        .secure
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            Call::PdSegment {
                asid, paddr, data, ..
            } => Some((asid, paddr, data)),
            _ => None,
        })
        .collect();
    let mut expected = vec![0x41; 16];
    expected.resize(0x20, 0);
    assert_eq!(segments, vec![(1, 0x4B04_0000, expected)]);
    assert_eq!(rig.secure.count("auth_and_reset"), 0);
    assert_eq!(rig.registry.pd_state(pd1.id).unwrap(), PdState::Normal);

    rig.registry.shutdown(pd1.id).unwrap();
    rig.registry.shutdown(pd2.id).unwrap();
    assert_eq!(rig.registry.lifecycle(root.id).unwrap(), Lifecycle::Offline);
    assert_eq!(rig.secure.count("pas_shutdown"), 1);
}

#[test]
fn root_restart_brings_stopped_dependents_back() {
    let rig = Rig::new();
    let root = running_root(&rig);
    let pd = cooperative_pd(&rig, "pd-1", &root, 20);
    rig.registry.boot(pd.id).unwrap();
    rig.registry.shutdown(pd.id).unwrap();
    assert_eq!(rig.registry.pd_state(pd.id).unwrap(), PdState::Shutdown);

    rig.registry.boot(pd.id).unwrap();

    assert_eq!(rig.secure.count("auth_and_reset"), 2);
    assert_eq!(rig.secure.count("pd_segment_load"), 0);
    assert_eq!(rig.registry.pd_state(pd.id).unwrap(), PdState::Normal);
}

#[test]
fn plain_dependent_reloads_the_full_image() {
    let rig = Rig::new();
    rig.firmware.insert(FW, image());
    let node = q6_mpd::DomainNode::new("q6v5_wcss", "qcom,ipq9574-q6-mpd")
        .firmware(FW)
        .memory_region(rig.reserved());
    let lines = Arc::new(sim::Lines::all(10));
    let root = rig
        .registry
        .probe(
            node.interrupts(lines)
                .smem_states(Arc::new(StopBit::default())),
        )
        .unwrap();
    let ready = Arc::clone(&rig.irqs);
    rig.secure
        .on("auth_and_reset", Arc::new(move || ready.fire(11)));

    let pd1 = rig.dependent("pd-1", "qcom,ipq9574-wcss-ahb-mpd", FW, root, 20);
    let pd2 = rig.dependent("pd-2", "qcom,ipq9574-wcss-ahb-mpd", FW, root, 30);
    rig.registry.boot(pd1.id).unwrap();
    rig.registry.boot(pd2.id).unwrap();
    assert!(rig.registry.is_running(pd1.id).unwrap());
    assert_eq!(rig.registry.lifecycle(pd1.id).unwrap(), Lifecycle::Running);

    rig.registry.shutdown(pd1.id).unwrap();
    assert!(!rig.registry.is_running(pd1.id).unwrap());
    rig.secure.clear();
    rig.registry.boot(pd1.id).unwrap();

    let calls = rig.secure.calls();
    assert!(matches!(calls[0], Call::InitImage { pas: WCNSS_PAS_ID, .. }));
    assert_eq!(calls.len(), 1);
}

#[test]
fn fatal_interrupt_records_the_crash_reason() {
    let rig = Rig::new();
    let root = running_root(&rig);
    rig.registry.boot(root.id).unwrap();
    rig.smem
        .set(WCSS_CRASH_REASON, b"assert at wlan.c:42\0stale bytes");

    rig.irqs.fire(root.irq(InboundLine::Fatal));

    assert_eq!(
        rig.registry.crash_info(root.id).unwrap(),
        CrashInfo {
            crashed: true,
            reason: Some(String::from("assert at wlan.c:42")),
        }
    );
    assert_eq!(rig.registry.lifecycle(root.id).unwrap(), Lifecycle::Crashed);
    assert!(!rig.registry.is_running(root.id).unwrap());
}

#[test]
fn crash_during_start_is_a_state_not_an_error() {
    let rig = Rig::new();
    rig.firmware.insert(FW, image());
    let root = rig.root(&[FW], 10);
    rig.crash_on_reset(&root);

    assert_eq!(rig.registry.boot(root.id).unwrap(), Lifecycle::Crashed);
    assert_eq!(rig.registry.power_count(root.id).unwrap(), 1);
    assert_eq!(
        rig.registry.crash_info(root.id).unwrap(),
        CrashInfo {
            crashed: true,
            reason: None
        }
    );
}

#[test]
fn crash_while_loading_is_not_lost() {
    let rig = Rig::with_timeouts(Timeouts::default());
    rig.firmware.insert(FW, image());
    let root = rig.root(&[FW], 10);
    let irqs = Arc::clone(&rig.irqs);
    let fatal = root.irq(InboundLine::Fatal);
    rig.secure
        .on("pas_init_image", Arc::new(move || irqs.fire(fatal)));

    let started = Instant::now();
    assert_eq!(rig.registry.boot(root.id).unwrap(), Lifecycle::Crashed);
    assert!(started.elapsed() < Timeouts::default().start);
    assert!(rig.registry.crash_info(root.id).unwrap().crashed);
    assert!(!rig.registry.is_running(root.id).unwrap());
    assert_eq!(rig.registry.power_count(root.id).unwrap(), 1);

    rig.registry.shutdown(root.id).unwrap();
    assert_eq!(rig.registry.lifecycle(root.id).unwrap(), Lifecycle::Offline);
    assert_eq!(rig.secure.count("pas_shutdown"), 1);
}

#[test]
fn dependent_crash_while_its_root_boots_is_not_lost() {
    let rig = Rig::with_timeouts(Timeouts::default());
    let root = running_root(&rig);
    let pd = rig.dependent("pd-1", AHB, PD_FW, root.id, 20);
    let irqs = Arc::clone(&rig.irqs);
    let fatal = pd.irq(InboundLine::Fatal);
    rig.secure
        .on("auth_and_reset", Arc::new(move || irqs.fire(fatal)));

    let started = Instant::now();
    assert_eq!(rig.registry.boot(pd.id).unwrap(), Lifecycle::Crashed);
    assert!(started.elapsed() < Timeouts::default().spawn);
    assert_eq!(rig.registry.lifecycle(root.id).unwrap(), Lifecycle::Running);
    assert!(!rig.registry.is_running(pd.id).unwrap());
    assert_eq!(pd.word.value(), 0);

    rig.registry.shutdown(pd.id).unwrap();
    assert_eq!(rig.registry.power_count(root.id).unwrap(), 0);
    assert_eq!(rig.registry.lifecycle(root.id).unwrap(), Lifecycle::Offline);
}

#[test]
fn fatal_interrupt_aborts_a_pending_spawn() {
    let rig = Rig::with_timeouts(Timeouts::default());
    let root = running_root(&rig);
    let pd = rig.dependent("pd-1", AHB, PD_FW, root.id, 20);
    let irqs = Arc::clone(&rig.irqs);
    let word = Arc::clone(&pd.word);
    let fatal = pd.irq(InboundLine::Fatal);

    let started = Instant::now();
    let outcome = thread::scope(|s| {
        s.spawn(move || {
            while word.value() & (1 << SPAWN_BIT) == 0 {
                thread::sleep(Duration::from_millis(1));
            }
            thread::sleep(Duration::from_millis(10));
            irqs.fire(fatal);
        });
        rig.registry.boot(pd.id)
    });

    assert_eq!(outcome.unwrap(), Lifecycle::Crashed);
    assert!(started.elapsed() < Timeouts::default().spawn);
    assert_eq!(pd.word.value(), 0);
}

#[test]
fn crashed_dependent_is_stopped_without_the_doorbell() {
    let rig = Rig::new();
    let root = running_root(&rig);
    let pd = cooperative_pd(&rig, "pd-1", &root, 20);
    rig.registry.boot(pd.id).unwrap();

    rig.irqs.fire(pd.irq(InboundLine::Fatal));
    rig.registry.shutdown(pd.id).unwrap();

    assert_eq!(pd.word.raised(STOP_BIT), 0);
    assert_eq!(rig.secure.count("int_radio_powerdown"), 1);
    assert_eq!(rig.registry.lifecycle(root.id).unwrap(), Lifecycle::Offline);
    let crashed_stop = rig
        .notes
        .events()
        .into_iter()
        .any(|(name, event, crashed)| {
            name == "pd-1" && event == SsrEvent::BeforeShutdown && crashed
        });
    assert!(crashed_stop);
}

#[test]
fn recovery_restarts_a_crashed_root() {
    let rig = Rig::new();
    let root = running_root(&rig);
    rig.registry.boot(root.id).unwrap();
    rig.smem.set(WCSS_CRASH_REASON, b"watchdog bite\0");
    rig.irqs.fire(root.irq(InboundLine::Fatal));

    assert_eq!(rig.registry.recover(root.id).unwrap(), Lifecycle::Running);

    assert_eq!(rig.registry.power_count(root.id).unwrap(), 1);
    assert_eq!(rig.secure.count("pas_shutdown"), 1);
    assert_eq!(rig.secure.count("auth_and_reset"), 2);
    assert_eq!(
        rig.registry.crash_info(root.id).unwrap(),
        CrashInfo {
            crashed: false,
            reason: None
        }
    );

    // Nothing to do for a healthy domain.
    rig.secure.clear();
    assert_eq!(rig.registry.recover(root.id).unwrap(), Lifecycle::Running);
    assert!(rig.secure.calls().is_empty());
}

#[test]
fn crash_after_the_last_shutdown_is_not_restarted() {
    let rig = Rig::new();
    let root = running_root(&rig);
    rig.registry.boot(root.id).unwrap();
    rig.registry.shutdown(root.id).unwrap();

    rig.irqs.fire(root.irq(InboundLine::Fatal));
    assert_eq!(rig.registry.lifecycle(root.id).unwrap(), Lifecycle::Crashed);

    assert_eq!(rig.registry.recover(root.id).unwrap(), Lifecycle::Offline);
    assert_eq!(rig.registry.power_count(root.id).unwrap(), 0);
    assert_eq!(rig.secure.count("auth_and_reset"), 1);
    assert_eq!(rig.secure.count("pas_shutdown"), 1);

    // The next cycle boots and stops normally.
    assert_eq!(rig.registry.boot(root.id).unwrap(), Lifecycle::Running);
    rig.registry.shutdown(root.id).unwrap();
    assert_eq!(rig.registry.lifecycle(root.id).unwrap(), Lifecycle::Offline);
    assert_eq!(rig.secure.count("pas_shutdown"), 2);
}

#[test]
fn failed_recovery_leaves_the_domain_unpowered() {
    let rig = Rig::new();
    let root = running_root(&rig);
    rig.registry.boot(root.id).unwrap();
    rig.irqs.fire(root.irq(InboundLine::Fatal));
    rig.secure.refuse("auth_and_reset");

    assert!(rig.registry.recover(root.id).is_err());
    assert_eq!(rig.registry.power_count(root.id).unwrap(), 0);
    assert_eq!(rig.registry.lifecycle(root.id).unwrap(), Lifecycle::Offline);
    assert_eq!(rig.clock.enabled(), 0);
}

#[test]
fn panic_raises_the_root_stop_doorbell() {
    let rig = Rig::new();
    let root = running_root(&rig);
    let pd = cooperative_pd(&rig, "pd-1", &root, 20);
    rig.registry.boot(pd.id).unwrap();

    assert_eq!(rig.registry.panic(root.id).unwrap(), Some(PANIC_DELAY));
    assert_eq!(root.word.value() & (1 << STOP_BIT), 1 << STOP_BIT);
    assert_eq!(rig.registry.panic(pd.id).unwrap(), None);
}

#[test]
fn concurrent_dependents_share_one_root_boot() {
    let rig = Rig::new();
    let root = running_root(&rig);
    let pds: Vec<_> = (1..=3)
        .map(|n| cooperative_pd(&rig, &format!("pd-{n}"), &root, 10 * (n + 1)))
        .collect();
    let barrier = Barrier::new(pds.len());

    thread::scope(|s| {
        for pd in &pds {
            let (rig, barrier) = (&rig, &barrier);
            s.spawn(move || {
                barrier.wait();
                assert_eq!(rig.registry.boot(pd.id).unwrap(), Lifecycle::Running);
            });
        }
    });

    assert_eq!(rig.secure.count("auth_and_reset"), 1);
    assert_eq!(rig.registry.power_count(root.id).unwrap(), 3);

    thread::scope(|s| {
        for pd in &pds {
            let rig = &rig;
            s.spawn(move || rig.registry.shutdown(pd.id).unwrap());
        }
    });
    assert_eq!(rig.secure.count("pas_shutdown"), 1);
    assert_eq!(rig.registry.lifecycle(root.id).unwrap(), Lifecycle::Offline);
}

#[derive(Default)]
struct StopBit(Arc<sim::SmemWord>);

impl q6_mpd::SmemStateProvider for StopBit {
    fn state(&self, name: &str) -> Option<(Arc<dyn q6_mpd::SmemState>, u32)> {
        let word: Arc<dyn q6_mpd::SmemState> = self.0.clone();
        (name == "stop").then_some((word, STOP_BIT))
    }
}
