//! # Per-SoC Descriptors
//!
//! Every supported compatible string maps to an immutable [`WcssDescriptor`]
//! describing how that flavour of domain is brought up. Descriptors are
//! resolved once at probe time and stored by reference in the domain.

/// Secure PAS identifier of the single-PD WCSS firmware.
pub const WCNSS_PAS_ID: u32 = 6;
/// Secure PAS identifier of the multi-PD WCSS firmware.
pub const MPD_WCNSS_PAS_ID: u32 = 0xD;
/// SMEM item carrying the crash reason string.
pub const WCSS_CRASH_REASON: u32 = 421;
/// Primary image plus up to two extra segment files.
pub const MAX_FIRMWARE: usize = 3;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Role {
    /// Owns the memory window and the Q6 reset.
    Root,
    /// A user PD running on top of a root.
    Dependent,
}

/// How a dependent loads its own firmware once the root is up.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PdLoader {
    /// Only the segments tagged with the PD's ASID, through the secure
    /// segment loader.
    PdSegments,
    /// The complete image with secure init, like a root.
    FullImage,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct WcssDescriptor {
    pub compatible: &'static str,
    pub role: Role,
    pub pasid: u32,
    pub crash_reason_smem: u32,
    /// Subsystem name used for restart notifications.
    pub ssr_name: Option<&'static str>,
    /// Interrupt lines and doorbells are wired up at probe.
    pub signals: bool,
    /// The domain is started with an explicit spawn handshake.
    pub reset_seq: bool,
    pub pd_loader: Option<PdLoader>,
    /// Power the radio up and down through the secure monitor.
    pub scm_power: bool,
}

impl WcssDescriptor {
    const fn root(compatible: &'static str, pasid: u32) -> Self {
        Self {
            compatible,
            role: Role::Root,
            pasid,
            crash_reason_smem: WCSS_CRASH_REASON,
            ssr_name: Some("q6wcss"),
            signals: true,
            reset_seq: false,
            pd_loader: None,
            scm_power: false,
        }
    }

    const fn dependent(compatible: &'static str, pasid: u32, loader: PdLoader) -> Self {
        Self {
            compatible,
            role: Role::Dependent,
            pasid,
            crash_reason_smem: WCSS_CRASH_REASON,
            ssr_name: None,
            signals: false,
            reset_seq: false,
            pd_loader: Some(loader),
            scm_power: false,
        }
    }

    const fn with_reset_seq(mut self) -> Self {
        self.signals = true;
        self.reset_seq = true;
        self
    }

    const fn with_scm_power(mut self) -> Self {
        self.scm_power = true;
        self
    }

    #[must_use]
    pub const fn is_root(&self) -> bool {
        matches!(self.role, Role::Root)
    }
}

pub static DESCRIPTORS: [WcssDescriptor; 6] = [
    WcssDescriptor::root("qcom,ipq5018-q6-mpd", MPD_WCNSS_PAS_ID),
    WcssDescriptor::root("qcom,ipq8074-q6-mpd", WCNSS_PAS_ID),
    WcssDescriptor::root("qcom,ipq9574-q6-mpd", WCNSS_PAS_ID),
    WcssDescriptor::dependent(
        "qcom,ipq5018-wcss-ahb-mpd",
        MPD_WCNSS_PAS_ID,
        PdLoader::PdSegments,
    )
    .with_reset_seq()
    .with_scm_power(),
    WcssDescriptor::dependent("qcom,ipq9574-wcss-ahb-mpd", WCNSS_PAS_ID, PdLoader::FullImage),
    WcssDescriptor::dependent(
        "qcom,ipq5018-wcss-pcie-mpd",
        MPD_WCNSS_PAS_ID,
        PdLoader::PdSegments,
    )
    .with_reset_seq(),
];

#[must_use]
pub fn lookup(compatible: &str) -> Option<&'static WcssDescriptor> {
    DESCRIPTORS.iter().find(|d| d.compatible == compatible)
}
