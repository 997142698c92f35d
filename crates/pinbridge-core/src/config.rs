//! Configuration records produced by the administrative side.
//!
//! Records arrive already validated for shape (JSON with the host's camelCase
//! field names); semantic checks such as a missing type or an out-of-range
//! address happen when the registry turns a record into a handler, so one bad
//! device never prevents the others from loading.

use crate::{
    BusAddress, Result,
    constants::{DEFAULT_NAMESPACE, MIN_POLLING_INTERVAL_MS},
    error::Error,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Direction of one expander pin.
///
/// Direction is fixed once the device has started; changing it requires a
/// reconfiguration, which recreates the handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PinDirection {
    /// Input without internal pull-up resistor.
    #[serde(rename = "in-no")]
    InputNoPullUp,

    /// Input with internal pull-up resistor.
    ///
    /// The legacy byte-expander tag `"in"` maps here.
    #[serde(rename = "in-pu", alias = "in")]
    InputPullUp,

    /// Push-pull or quasi-bidirectional output.
    #[default]
    #[serde(rename = "out")]
    Output,
}

impl PinDirection {
    /// Check if this direction reads the pin.
    #[must_use]
    pub fn is_input(&self) -> bool {
        !matches!(self, Self::Output)
    }
}

/// Configuration of a single pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PinConfig {
    /// Pin direction.
    #[serde(default)]
    pub dir: PinDirection,

    /// Invert the logic level between the bus and the state point.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inv: Option<bool>,
}

impl PinConfig {
    /// Input pin with pull-up, not inverted.
    #[must_use]
    pub fn input() -> Self {
        Self {
            dir: PinDirection::InputPullUp,
            inv: None,
        }
    }

    /// Output pin, not inverted.
    #[must_use]
    pub fn output() -> Self {
        Self {
            dir: PinDirection::Output,
            inv: None,
        }
    }

    /// Set the inversion flag.
    #[must_use]
    pub fn with_inverted(mut self, inverted: bool) -> Self {
        self.inv = Some(inverted);
        self
    }

    /// Check if the pin reads from the bus.
    #[must_use]
    pub fn is_input(&self) -> bool {
        self.dir.is_input()
    }

    /// Check if the logic level is inverted.
    #[must_use]
    pub fn is_inverted(&self) -> bool {
        self.inv == Some(true)
    }
}

/// Configuration of one peripheral on the bus.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceConfig {
    /// 7-bit bus address. Kept wide so an out-of-range value is rejected
    /// for this record only.
    #[serde(default)]
    pub address: Option<u64>,

    /// Device family tag (e.g. `"PCF8574"`).
    #[serde(default, rename = "type")]
    pub kind: Option<String>,

    /// Human-readable name.
    #[serde(default)]
    pub name: Option<String>,

    /// Polling interval in milliseconds; 0 disables polling.
    #[serde(default)]
    pub polling_interval: u64,

    /// Foreign state id of an interrupt line, if wired.
    #[serde(default)]
    pub interrupt: Option<String>,

    /// Per-pin configuration, in pin order.
    #[serde(default)]
    pub pins: Vec<PinConfig>,
}

impl DeviceConfig {
    /// Create a device record with address and family tag.
    pub fn new(address: u8, kind: impl Into<String>) -> Self {
        Self {
            address: Some(u64::from(address)),
            kind: Some(kind.into()),
            ..Self::default()
        }
    }

    /// Set the device name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the polling interval in milliseconds.
    #[must_use]
    pub fn with_polling_interval(mut self, interval_ms: u64) -> Self {
        self.polling_interval = interval_ms;
        self
    }

    /// Set the interrupt state id.
    #[must_use]
    pub fn with_interrupt(mut self, id: impl Into<String>) -> Self {
        self.interrupt = Some(id.into());
        self
    }

    /// Replace the pin list.
    #[must_use]
    pub fn with_pins(mut self, pins: impl IntoIterator<Item = PinConfig>) -> Self {
        self.pins = pins.into_iter().collect();
        self
    }

    /// Validated bus address.
    ///
    /// # Errors
    /// Returns `Error::MissingConfig` when no address is set and
    /// `Error::InvalidAddress` when it does not fit in 7 bits.
    pub fn bus_address(&self) -> Result<BusAddress> {
        let raw = self
            .address
            .ok_or_else(|| Error::MissingConfig("address".to_string()))?;
        let raw = u8::try_from(raw).map_err(|_| Error::InvalidAddress(raw))?;
        BusAddress::new(raw)
    }

    /// Family tag.
    ///
    /// # Errors
    /// Returns `Error::MissingConfig` when the tag is absent or blank.
    pub fn kind(&self) -> Result<&str> {
        match self.kind.as_deref().map(str::trim) {
            Some(kind) if !kind.is_empty() => Ok(kind),
            _ => Err(Error::MissingConfig("type".to_string())),
        }
    }

    /// Configuration of pin `index`; pins without an entry are plain
    /// outputs.
    #[must_use]
    pub fn pin(&self, index: usize) -> PinConfig {
        self.pins.get(index).copied().unwrap_or_default()
    }

    /// Interrupt state id, if one is configured and non-empty.
    #[must_use]
    pub fn interrupt_id(&self) -> Option<&str> {
        self.interrupt.as_deref().filter(|id| !id.is_empty())
    }

    /// Effective polling period, clamped to [`MIN_POLLING_INTERVAL_MS`];
    /// `None` when polling is disabled.
    #[must_use]
    pub fn polling_period(&self) -> Option<Duration> {
        if self.polling_interval == 0 {
            return None;
        }
        Some(Duration::from_millis(
            self.polling_interval.max(MIN_POLLING_INTERVAL_MS),
        ))
    }
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

/// Complete adapter configuration: one bus and its devices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdapterConfig {
    /// Number of the bus to open (e.g. 1 for `/dev/i2c-1`).
    #[serde(default)]
    pub bus_number: u32,

    /// Namespace prefix of the adapter's own state ids.
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Configured devices.
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            bus_number: 0,
            namespace: default_namespace(),
            devices: Vec::new(),
        }
    }
}

impl AdapterConfig {
    /// Parse a configuration document.
    ///
    /// # Errors
    /// Returns `Error::Json` if the document is not a valid configuration.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_parse_full_config() {
        let json = r#"{
            "busNumber": 1,
            "devices": [
                {
                    "address": 32,
                    "type": "PCF8574",
                    "name": "Relays",
                    "pollingInterval": 200,
                    "interrupt": "gpio.0.irq",
                    "pins": [{"dir": "out"}, {"dir": "in", "inv": true}, {"dir": "in-no"}]
                }
            ]
        }"#;

        let config = AdapterConfig::from_json(json).unwrap();
        assert_eq!(config.bus_number, 1);
        assert_eq!(config.namespace, DEFAULT_NAMESPACE);

        let device = &config.devices[0];
        assert_eq!(device.bus_address().unwrap().as_u8(), 0x20);
        assert_eq!(device.kind().unwrap(), "PCF8574");
        assert_eq!(device.interrupt_id(), Some("gpio.0.irq"));
        assert_eq!(device.pin(0), PinConfig::output());
        assert_eq!(device.pin(1), PinConfig::input().with_inverted(true));
        assert_eq!(device.pin(2).dir, PinDirection::InputNoPullUp);
    }

    #[test]
    fn test_missing_pin_defaults_to_plain_output() {
        let device = DeviceConfig::new(0x20, "PCF8574").with_pins([PinConfig::input()]);
        let pin = device.pin(7);
        assert_eq!(pin.dir, PinDirection::Output);
        assert!(!pin.is_inverted());
    }

    #[rstest]
    #[case(0, None)]
    #[case(10, Some(50))]
    #[case(50, Some(50))]
    #[case(200, Some(200))]
    fn test_polling_period_clamp(#[case] interval: u64, #[case] expected_ms: Option<u64>) {
        let device = DeviceConfig::new(0x20, "PCF8574").with_polling_interval(interval);
        assert_eq!(
            device.polling_period(),
            expected_ms.map(Duration::from_millis)
        );
    }

    #[test]
    fn test_missing_type_and_address() {
        let device: DeviceConfig = serde_json::from_str(r#"{"name": "x"}"#).unwrap();
        assert!(matches!(device.kind(), Err(Error::MissingConfig(_))));
        assert!(matches!(device.bus_address(), Err(Error::MissingConfig(_))));

        let blank = DeviceConfig {
            kind: Some("  ".to_string()),
            ..DeviceConfig::default()
        };
        assert!(blank.kind().is_err());
    }

    #[test]
    fn test_address_out_of_range() {
        let device = DeviceConfig::new(0x80, "PCF8574");
        assert!(matches!(device.bus_address(), Err(Error::InvalidAddress(0x80))));
    }

    #[test]
    fn test_wide_address_fails_only_its_record() {
        let json = r#"{"devices": [
            {"address": 300, "type": "PCF8574"},
            {"address": 33, "type": "PCF8574"}
        ]}"#;

        let config = AdapterConfig::from_json(json).unwrap();

        assert!(matches!(
            config.devices[0].bus_address(),
            Err(Error::InvalidAddress(300))
        ));
        assert_eq!(config.devices[1].bus_address().unwrap().as_u8(), 0x21);
    }

    #[test]
    fn test_empty_interrupt_is_ignored() {
        let device = DeviceConfig::new(0x20, "PCF8574").with_interrupt("");
        assert_eq!(device.interrupt_id(), None);
    }

    #[test]
    fn test_pin_direction_serialization() {
        assert_eq!(
            serde_json::to_string(&PinDirection::InputPullUp).unwrap(),
            "\"in-pu\""
        );
        assert_eq!(
            serde_json::from_str::<PinDirection>("\"in\"").unwrap(),
            PinDirection::InputPullUp
        );
        assert!(serde_json::from_str::<PinDirection>("\"sideways\"").is_err());
    }

    #[test]
    fn test_invalid_document() {
        assert!(matches!(
            AdapterConfig::from_json("{\"devices\": 3}"),
            Err(Error::Json(_))
        ));
    }
}
