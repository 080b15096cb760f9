#![allow(dead_code)]

use driver_firmware::MemoryStore;
use driver_sync::SpinLock;
use q6_mpd::signals::InboundLine;
use q6_mpd::{
    Clock, ClockError, DomainId, DomainNode, DomainRegistry, DoorbellError, HeapRegion,
    InterruptController, IrqError, IrqHandler, IrqResolver, MemoryRegion, PdSegment, Platform,
    ReservedMemory, SecureCallError, SecureMonitor, SmemItems, SmemState, SmemStateProvider,
    SsrEvent, SsrNotifier, Timeouts,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

pub const PHYS: u64 = 0x4B00_0000;
pub const WINDOW: usize = 0x10_0000;
pub const STOP_BIT: u32 = 0;
pub const SPAWN_BIT: u32 = 1;

pub type Hook = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Call {
    InitImage { pas: u32, metadata_len: usize },
    MemSetup { pas: u32, addr: u64, size: u64 },
    AuthAndReset(u32),
    Shutdown(u32),
    RadioUp(u32),
    RadioDown(u32),
    PdSegment {
        pas: u32,
        asid: u8,
        index: usize,
        paddr: u64,
        data: Vec<u8>,
    },
}

impl Call {
    const fn name(&self) -> &'static str {
        match self {
            Self::InitImage { .. } => "pas_init_image",
            Self::MemSetup { .. } => "pas_mem_setup",
            Self::AuthAndReset(_) => "auth_and_reset",
            Self::Shutdown(_) => "pas_shutdown",
            Self::RadioUp(_) => "int_radio_powerup",
            Self::RadioDown(_) => "int_radio_powerdown",
            Self::PdSegment { .. } => "pd_segment_load",
        }
    }
}

/// Secure monitor that records every call; calls can be refused or trigger
/// a reaction from the simulated remote.
#[derive(Default)]
pub struct Monitor {
    calls: SpinLock<Vec<Call>>,
    refused: SpinLock<Vec<&'static str>>,
    hooks: SpinLock<Vec<(&'static str, Hook)>>,
}

impl Monitor {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.with_lock(|c| c.clone())
    }

    pub fn count(&self, name: &str) -> usize {
        self.calls
            .with_lock(|c| c.iter().filter(|call| call.name() == name).count())
    }

    pub fn clear(&self) {
        self.calls.with_lock(Vec::clear);
    }

    pub fn refuse(&self, name: &'static str) {
        self.refused.with_lock(|r| r.push(name));
    }

    pub fn allow(&self, name: &str) {
        self.refused.with_lock(|r| r.retain(|n| *n != name));
    }

    pub fn on(&self, name: &'static str, hook: Hook) {
        self.hooks.with_lock(|h| h.push((name, hook)));
    }

    pub fn clear_hooks(&self) {
        self.hooks.with_lock(Vec::clear);
    }

    fn record(&self, pas: u32, call: Call) -> Result<(), SecureCallError> {
        let name = call.name();
        self.calls.with_lock(|c| c.push(call));
        if self.refused.with_lock(|r| r.contains(&name)) {
            return Err(SecureCallError {
                call: name,
                pas,
                code: -22,
            });
        }
        let hooks: Vec<Hook> = self.hooks.with_lock(|h| {
            h.iter()
                .filter(|(n, _)| *n == name)
                .map(|(_, hook)| Arc::clone(hook))
                .collect()
        });
        for hook in hooks {
            hook();
        }
        Ok(())
    }
}

impl SecureMonitor for Monitor {
    fn pas_init_image(&self, pas: u32, metadata: &[u8]) -> Result<(), SecureCallError> {
        self.record(
            pas,
            Call::InitImage {
                pas,
                metadata_len: metadata.len(),
            },
        )
    }

    fn pas_mem_setup(&self, pas: u32, addr: u64, size: u64) -> Result<(), SecureCallError> {
        self.record(pas, Call::MemSetup { pas, addr, size })
    }

    fn pas_auth_and_reset(&self, pas: u32) -> Result<(), SecureCallError> {
        self.record(pas, Call::AuthAndReset(pas))
    }

    fn pas_shutdown(&self, pas: u32) -> Result<(), SecureCallError> {
        self.record(pas, Call::Shutdown(pas))
    }

    fn int_radio_powerup(&self, pas: u32) -> Result<(), SecureCallError> {
        self.record(pas, Call::RadioUp(pas))
    }

    fn int_radio_powerdown(&self, pas: u32) -> Result<(), SecureCallError> {
        self.record(pas, Call::RadioDown(pas))
    }

    fn pd_segment_load(&self, pas: u32, segment: PdSegment<'_>) -> Result<(), SecureCallError> {
        self.record(
            pas,
            Call::PdSegment {
                pas,
                asid: segment.pd_asid,
                index: segment.index,
                paddr: segment.paddr,
                data: segment.data.to_vec(),
            },
        )
    }
}

/// Interrupt controller whose lines are fired by the test.
#[derive(Default)]
pub struct Irqs {
    handlers: SpinLock<BTreeMap<u32, (String, IrqHandler)>>,
    refused: SpinLock<Vec<u32>>,
}

impl Irqs {
    pub fn fire(&self, number: u32) {
        let handler = self
            .handlers
            .with_lock(|h| h.get(&number).map(|(_, handler)| Arc::clone(handler)));
        if let Some(handler) = handler {
            handler();
        }
    }

    pub fn name_of(&self, number: u32) -> Option<String> {
        self.handlers
            .with_lock(|h| h.get(&number).map(|(name, _)| name.clone()))
    }

    pub fn claimed(&self) -> Vec<u32> {
        self.handlers.with_lock(|h| h.keys().copied().collect())
    }

    pub fn refuse(&self, number: u32) {
        self.refused.with_lock(|r| r.push(number));
    }
}

impl InterruptController for Irqs {
    fn request_irq(&self, number: u32, name: &str, handler: IrqHandler) -> Result<(), IrqError> {
        if self.refused.with_lock(|r| r.contains(&number)) {
            return Err(IrqError {
                number,
                reason: String::from("busy"),
            });
        }
        self.handlers
            .with_lock(|h| h.insert(number, (name.to_string(), handler)));
        Ok(())
    }

    fn free_irq(&self, number: u32) {
        self.handlers.with_lock(|h| h.remove(&number));
    }
}

/// `interrupt-names` of one node.
pub struct Lines(BTreeMap<&'static str, u32>);

impl Lines {
    /// Consecutive numbers from `base` in `fatal, ready, stop-ack, spawn-ack` order.
    pub fn all(base: u32) -> Self {
        Self(
            InboundLine::ALL
                .iter()
                .zip(base..)
                .map(|(line, n)| (line.resource_name(), n))
                .collect(),
        )
    }

    pub fn without(mut self, name: &str) -> Self {
        self.0.remove(name);
        self
    }
}

impl IrqResolver for Lines {
    fn irq_by_name(&self, name: &str) -> Option<u32> {
        self.0.get(name).copied()
    }
}

/// One outbound SMEM state word.
#[derive(Default)]
pub struct SmemWord {
    value: SpinLock<u32>,
    history: SpinLock<Vec<(u32, u32)>>,
    hooks: SpinLock<Vec<(u32, Hook)>>,
}

impl SmemWord {
    pub fn value(&self) -> u32 {
        self.value.load()
    }

    /// `(mask, value)` of every update.
    pub fn history(&self) -> Vec<(u32, u32)> {
        self.history.with_lock(|h| h.clone())
    }

    pub fn raised(&self, bit: u32) -> usize {
        self.history()
            .iter()
            .filter(|&&(mask, value)| mask == 1 << bit && value != 0)
            .count()
    }

    /// Run `hook` whenever `bit` is raised.
    pub fn on_raise(&self, bit: u32, hook: Hook) {
        self.hooks.with_lock(|h| h.push((bit, hook)));
    }
}

impl SmemState for SmemWord {
    fn update_bits(&self, mask: u32, value: u32) -> Result<(), DoorbellError> {
        self.value.with_lock(|v| *v = (*v & !mask) | (value & mask));
        self.history.with_lock(|h| h.push((mask, value)));
        if value & mask == 0 {
            return Ok(());
        }
        let hooks: Vec<Hook> = self.hooks.with_lock(|h| {
            h.iter()
                .filter(|(bit, _)| mask & (1 << bit) != 0)
                .map(|(_, hook)| Arc::clone(hook))
                .collect()
        });
        for hook in hooks {
            hook();
        }
        Ok(())
    }
}

/// `qcom,smem-state-names` of one node.
pub struct States {
    word: Arc<SmemWord>,
    names: Vec<(&'static str, u32)>,
}

impl SmemStateProvider for States {
    fn state(&self, name: &str) -> Option<(Arc<dyn SmemState>, u32)> {
        let word: Arc<dyn SmemState> = self.word.clone();
        self.names
            .iter()
            .find(|(n, _)| *n == name)
            .map(|&(_, bit)| (word, bit))
    }
}

#[derive(Default)]
pub struct Items(SpinLock<BTreeMap<u32, Vec<u8>>>);

impl Items {
    pub fn set(&self, item: u32, data: &[u8]) {
        self.0.with_lock(|m| m.insert(item, data.to_vec()));
    }
}

impl SmemItems for Items {
    fn get(&self, item: u32) -> Option<Vec<u8>> {
        self.0.with_lock(|m| m.get(&item).cloned())
    }
}

#[derive(Default)]
pub struct PrngClock {
    enabled: SpinLock<i32>,
    pub fail: SpinLock<bool>,
}

impl PrngClock {
    pub fn enabled(&self) -> i32 {
        self.enabled.load()
    }
}

impl Clock for PrngClock {
    fn name(&self) -> &str {
        "prng"
    }

    fn prepare_enable(&self) -> Result<(), ClockError> {
        if self.fail.load() {
            return Err(ClockError {
                clock: String::from("prng"),
                reason: String::from("stuck"),
            });
        }
        self.enabled.with_lock(|e| *e += 1);
        Ok(())
    }

    fn disable_unprepare(&self) {
        self.enabled.with_lock(|e| *e -= 1);
    }

    fn set_rate(&self, _hz: u64) -> Result<(), ClockError> {
        Ok(())
    }
}

#[derive(Default)]
pub struct Notes(SpinLock<Vec<(String, SsrEvent, bool)>>);

impl Notes {
    pub fn events(&self) -> Vec<(String, SsrEvent, bool)> {
        self.0.with_lock(|n| n.clone())
    }
}

impl SsrNotifier for Notes {
    fn notify(&self, subsystem: &str, event: SsrEvent, crashed: bool) {
        self.0
            .with_lock(|n| n.push((subsystem.to_string(), event, crashed)));
    }
}

/// A probed domain and its simulated wiring.
pub struct Endpoint {
    pub id: DomainId,
    pub irq_base: u32,
    pub word: Arc<SmemWord>,
}

impl Endpoint {
    pub fn irq(&self, line: InboundLine) -> u32 {
        let index = InboundLine::ALL.iter().position(|l| *l == line).unwrap_or(0);
        self.irq_base + u32::try_from(index).unwrap()
    }
}

pub struct Rig {
    pub secure: Arc<Monitor>,
    pub firmware: Arc<MemoryStore>,
    pub irqs: Arc<Irqs>,
    pub smem: Arc<Items>,
    pub notes: Arc<Notes>,
    pub memory: Arc<HeapRegion>,
    pub clock: Arc<PrngClock>,
    pub registry: DomainRegistry,
}

pub fn short_timeouts() -> Timeouts {
    Timeouts {
        start: Duration::from_millis(100),
        spawn: Duration::from_millis(100),
        pd_start: Duration::from_millis(100),
        stop: Duration::from_millis(100),
    }
}

impl Rig {
    pub fn new() -> Self {
        Self::with_timeouts(short_timeouts())
    }

    pub fn with_timeouts(timeouts: Timeouts) -> Self {
        let secure = Arc::new(Monitor::default());
        let firmware = Arc::new(MemoryStore::new());
        let irqs = Arc::new(Irqs::default());
        let smem = Arc::new(Items::default());
        let notes = Arc::new(Notes::default());
        let platform = Platform {
            secure: secure.clone(),
            firmware: firmware.clone(),
            interrupts: irqs.clone(),
            smem: smem.clone(),
            notifier: Some(notes.clone()),
        };
        Self {
            secure,
            firmware,
            irqs,
            smem,
            notes,
            memory: Arc::new(HeapRegion::new(WINDOW)),
            clock: Arc::new(PrngClock::default()),
            registry: DomainRegistry::new(platform, timeouts),
        }
    }

    pub fn reserved(&self) -> ReservedMemory {
        let region: Arc<dyn MemoryRegion> = self.memory.clone();
        ReservedMemory::new(PHYS, region)
    }

    fn wire(node: DomainNode, irq_base: u32, word: &Arc<SmemWord>) -> DomainNode {
        node.interrupts(Arc::new(Lines::all(irq_base)))
            .smem_states(Arc::new(States {
                word: Arc::clone(word),
                names: vec![("stop", STOP_BIT), ("spawn", SPAWN_BIT)],
            }))
    }

    /// An ipq5018 root with every line and doorbell, a PRNG clock and the
    /// given firmware names.
    pub fn root(&self, firmware: &[&str], irq_base: u32) -> Endpoint {
        let mut node = DomainNode::new("q6v5_wcss", "qcom,ipq5018-q6-mpd")
            .memory_region(self.reserved())
            .prng_clock(self.clock.clone());
        for name in firmware {
            node = node.firmware(name);
        }
        let word = Arc::new(SmemWord::default());
        let id = self
            .registry
            .probe(Self::wire(node, irq_base, &word))
            .unwrap();
        Endpoint { id, irq_base, word }
    }

    pub fn dependent(
        &self,
        name: &str,
        compatible: &str,
        firmware: &str,
        parent: DomainId,
        irq_base: u32,
    ) -> Endpoint {
        let node = DomainNode::new(name, compatible)
            .firmware(firmware)
            .parent(parent);
        let word = Arc::new(SmemWord::default());
        let id = self
            .registry
            .probe(Self::wire(node, irq_base, &word))
            .unwrap();
        Endpoint { id, irq_base, word }
    }

    fn fire_hook(&self, number: u32) -> Hook {
        let irqs = Arc::clone(&self.irqs);
        Arc::new(move || irqs.fire(number))
    }

    /// The root reports ready as soon as it is released from reset.
    pub fn auto_ready(&self, root: &Endpoint) {
        self.secure
            .on("auth_and_reset", self.fire_hook(root.irq(InboundLine::Ready)));
    }

    /// The root crashes as soon as it is released from reset.
    pub fn crash_on_reset(&self, root: &Endpoint) {
        self.secure
            .on("auth_and_reset", self.fire_hook(root.irq(InboundLine::Fatal)));
    }

    /// A dependent acknowledges the spawn doorbell and reports ready.
    pub fn auto_spawn(&self, pd: &Endpoint) {
        pd.word
            .on_raise(SPAWN_BIT, self.fire_hook(pd.irq(InboundLine::SpawnAck)));
        pd.word
            .on_raise(SPAWN_BIT, self.fire_hook(pd.irq(InboundLine::Ready)));
    }

    /// A domain acknowledges the stop doorbell.
    pub fn auto_stop(&self, ep: &Endpoint) {
        ep.word
            .on_raise(STOP_BIT, self.fire_hook(ep.irq(InboundLine::StopAck)));
    }
}
