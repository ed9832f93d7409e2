//! Board description files
//!
//! A board file describes the controller wiring and the chips on it:
//!
//! ```toml
//! [board]
//! bus_width = 4
//! delay_chain = 8
//! dma_channel = 0
//! capabilities = ["quad", "suspend", "dual-cs"]
//!
//! [primary]
//! id = "0x1560C8"
//! image = "firmware.bin"
//!
//! [secondary]
//! id = "0x1840EF"
//! ```
//!
//! Numeric fields take decimal or `0x` hex strings. Image paths are
//! relative to the board file.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use xipflash_core::config::{BoardConfig, Capabilities};
use xipflash_sim::{SimChipConfig, TimingWindow};

use crate::error::{CliError, Result};

/// Deserialize a number that can be hex (0x...) or decimal
fn deserialize_hex_u32<'de, D>(deserializer: D) -> std::result::Result<Option<u32>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum HexOrInt {
        Int(u32),
        Str(String),
    }

    match Option::<HexOrInt>::deserialize(deserializer)? {
        None => Ok(None),
        Some(HexOrInt::Int(n)) => Ok(Some(n)),
        Some(HexOrInt::Str(s)) => parse_number(&s).map(Some).map_err(serde::de::Error::custom),
    }
}

fn parse_number(s: &str) -> std::result::Result<u32, String> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("invalid hex: {}", e))
    } else {
        s.parse().map_err(|e| format!("invalid number: {}", e))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct BoardFile {
    board: BoardSection,
    primary: ChipSection,
    secondary: Option<ChipSection>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct BoardSection {
    bus_width: Option<u8>,
    delay_chain: Option<u8>,
    dma_channel: Option<u8>,
    flash_clock_mhz: Option<u32>,
    capabilities: Vec<String>,
    #[serde(deserialize_with = "deserialize_hex_u32")]
    secondary_size: Option<u32>,
    vdd_mv: Option<u16>,
    xip_limit: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ChipSection {
    #[serde(deserialize_with = "deserialize_hex_u32")]
    id: Option<u32>,
    image: Option<PathBuf>,
    #[serde(deserialize_with = "deserialize_hex_u32")]
    image_offset: Option<u32>,
    status: Option<[u8; 3]>,
    wrsr2_supported: Option<bool>,
    suspend_supported: Option<bool>,
    resume_erratum: Option<bool>,
    timing: Option<TimingWindow>,
    #[serde(deserialize_with = "deserialize_hex_u32")]
    protected_len: Option<u32>,
    sector_erase_us: Option<u32>,
    block_erase_us: Option<u32>,
}

/// One emulated chip and what to preload into it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChipSpec {
    /// Chip model
    pub model: SimChipConfig,
    /// Image file and the offset it goes to
    pub image: Option<(PathBuf, u32)>,
}

/// Parsed board description
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardSpec {
    /// Driver configuration
    pub config: BoardConfig,
    /// Chip on the controller chip select
    pub primary: ChipSpec,
    /// Chip on the GPIO chip select
    pub secondary: Option<ChipSpec>,
}

impl Default for BoardSpec {
    fn default() -> Self {
        Self {
            config: BoardConfig::default(),
            primary: ChipSpec {
                model: SimChipConfig::default(),
                image: None,
            },
            secondary: None,
        }
    }
}

fn parse_capabilities(names: &[String]) -> Result<Capabilities> {
    names.iter().try_fold(Capabilities::empty(), |caps, name| {
        let flag = name.trim().to_ascii_uppercase().replace('-', "_");
        Capabilities::from_name(&flag)
            .map(|c| caps | c)
            .ok_or_else(|| CliError::Board(format!("unknown capability '{}'", name)))
    })
}

impl ChipSection {
    fn into_spec(self, base: &Path) -> ChipSpec {
        let mut model = SimChipConfig::default();
        if let Some(id) = self.id {
            model = SimChipConfig::with_id(id);
        }
        model.status = self.status.unwrap_or(model.status);
        model.wrsr2_supported = self.wrsr2_supported.unwrap_or(model.wrsr2_supported);
        model.suspend_supported = self.suspend_supported.unwrap_or(model.suspend_supported);
        model.resume_erratum = self.resume_erratum.or(model.resume_erratum);
        model.timing = self.timing.unwrap_or(model.timing);
        model.protected_len = self.protected_len.unwrap_or(model.protected_len);
        model.sector_erase_us = self.sector_erase_us.unwrap_or(model.sector_erase_us);
        model.block_erase_us = self.block_erase_us.unwrap_or(model.block_erase_us);

        let image = self
            .image
            .map(|path| (base.join(path), self.image_offset.unwrap_or(0)));
        ChipSpec { model, image }
    }
}

impl BoardSpec {
    /// Load a board description from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(CliError::io(path))?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_toml_str(&content, base)
    }

    /// Parse a board description; image paths resolve against `base`
    pub fn from_toml_str(content: &str, base: &Path) -> Result<Self> {
        let file: BoardFile = toml::from_str(content)?;
        let defaults = BoardConfig::default();
        let b = file.board;

        let config = BoardConfig {
            bus_width: b.bus_width.unwrap_or(defaults.bus_width),
            delay_chain: b.delay_chain.unwrap_or(defaults.delay_chain),
            dma_channel: b.dma_channel,
            flash_clock_mhz: b.flash_clock_mhz.unwrap_or(defaults.flash_clock_mhz),
            capabilities: parse_capabilities(&b.capabilities)?,
            secondary_size: b.secondary_size,
            vdd_mv: b.vdd_mv.unwrap_or(defaults.vdd_mv),
            xip_limit: b.xip_limit.unwrap_or(defaults.xip_limit),
        };
        config
            .validate()
            .map_err(|e| CliError::Board(e.to_string()))?;

        let secondary = file.secondary.map(|s| s.into_spec(base));
        if secondary.is_some() && !config.has(Capabilities::DUAL_CS) {
            log::warn!("[secondary] given but the board has no dual-cs capability; it will not be probed");
        }

        Ok(Self {
            config,
            primary: file.primary.into_spec(base),
            secondary,
        })
    }
}
