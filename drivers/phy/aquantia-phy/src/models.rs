//! Supported PHY models.

/// Firmware file requested by models that boot from host-provided firmware.
pub const FIRMWARE_NAME: &str = "marvell/aqr113c.cld";

/// Only the model bits of the PHY identifier are compared; the low nibble is
/// the silicon revision.
pub const MODEL_MASK: u32 = 0xffff_fff0;

pub const PHY_ID_AQ1202: u32 = 0x03a1_b445;
pub const PHY_ID_AQ2104: u32 = 0x03a1_b460;
pub const PHY_ID_AQR105: u32 = 0x03a1_b4a2;
pub const PHY_ID_AQR106: u32 = 0x03a1_b4d0;
pub const PHY_ID_AQR107: u32 = 0x03a1_b4e0;
pub const PHY_ID_AQCS109: u32 = 0x03a1_b5c2;
pub const PHY_ID_AQR405: u32 = 0x03a1_b4b0;
pub const PHY_ID_AQR113C: u32 = 0x31c3_1c12;
pub const PHY_ID_AQR813: u32 = 0x31c3_1cb2;
pub const PHY_ID_AQR112: u32 = 0x03a1_b662;
pub const PHY_ID_AQR412: u32 = 0x03a1_b712;
pub const PHY_ID_AQR113: u32 = 0x31c3_1c40;
pub const PHY_ID_AQR112C: u32 = 0x03a1_b790;
pub const PHY_ID_AQR112R: u32 = 0x31c3_1d12;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct PhyModel {
    pub id: u32,
    pub name: &'static str,
    /// Firmware downloaded at probe time, if any.
    pub firmware: Option<&'static str>,
    /// Supports low-power suspend/resume.
    pub low_power: bool,
}

impl PhyModel {
    const fn new(id: u32, name: &'static str) -> Self {
        Self {
            id,
            name,
            firmware: None,
            low_power: false,
        }
    }

    const fn downloads(mut self) -> Self {
        self.firmware = Some(FIRMWARE_NAME);
        self
    }

    const fn low_power(mut self) -> Self {
        self.low_power = true;
        self
    }

    #[must_use]
    pub const fn matches(&self, phy_id: u32) -> bool {
        (self.id & MODEL_MASK) == (phy_id & MODEL_MASK)
    }

    #[must_use]
    pub const fn downloads_firmware(&self) -> bool {
        self.firmware.is_some()
    }
}

pub static MODELS: [PhyModel; 14] = [
    PhyModel::new(PHY_ID_AQ1202, "Aquantia AQ1202"),
    PhyModel::new(PHY_ID_AQ2104, "Aquantia AQ2104"),
    PhyModel::new(PHY_ID_AQR105, "Aquantia AQR105").low_power(),
    PhyModel::new(PHY_ID_AQR106, "Aquantia AQR106"),
    PhyModel::new(PHY_ID_AQR107, "Aquantia AQR107")
        .downloads()
        .low_power(),
    PhyModel::new(PHY_ID_AQCS109, "Aquantia AQCS109")
        .downloads()
        .low_power(),
    PhyModel::new(PHY_ID_AQR405, "Aquantia AQR405"),
    PhyModel::new(PHY_ID_AQR113C, "Aquantia AQR113C")
        .downloads()
        .low_power(),
    PhyModel::new(PHY_ID_AQR813, "Aquantia AQR813")
        .downloads()
        .low_power(),
    PhyModel::new(PHY_ID_AQR112, "Aquantia AQR112").downloads(),
    PhyModel::new(PHY_ID_AQR412, "Aquantia AQR412").downloads(),
    PhyModel::new(PHY_ID_AQR113, "Aquantia AQR113"),
    PhyModel::new(PHY_ID_AQR112C, "Aquantia AQR112C").downloads(),
    PhyModel::new(PHY_ID_AQR112R, "Aquantia AQR112R").downloads(),
];

/// Model record for a PHY identifier read from the bus.
#[must_use]
pub fn lookup(phy_id: u32) -> Option<&'static PhyModel> {
    MODELS.iter().find(|m| m.matches(phy_id))
}
