//! Chip family registry.
//!
//! Maps a configuration's family tag to a factory. Tags are matched
//! case-insensitively.

use super::{AnyDeviceHandler, Mcp23017, Pcf8574};
use crate::error::Result;
use pinbridge_core::{DeviceConfig, Error};
use std::collections::BTreeMap;
use tracing::debug;

/// Builds a handler from its configuration.
pub type HandlerFactory = fn(DeviceConfig) -> Result<AnyDeviceHandler>;

/// Family tag to factory mapping.
#[derive(Debug, Clone)]
pub struct DeviceRegistry {
    factories: BTreeMap<String, HandlerFactory>,
}

impl DeviceRegistry {
    /// Registry without any family.
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Registry with the built-in families.
    pub fn with_builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(Pcf8574::FAMILY, |config| {
            Ok(AnyDeviceHandler::Pcf8574(Pcf8574::new(config)?))
        });
        registry.register(Mcp23017::FAMILY, |config| {
            Ok(AnyDeviceHandler::Mcp23017(Mcp23017::new(config)?))
        });
        registry
    }

    /// Register a family, replacing and returning any previous factory.
    pub fn register(&mut self, family: &str, factory: HandlerFactory) -> Option<HandlerFactory> {
        debug!(family, "Registering device family");
        self.factories.insert(family.to_ascii_uppercase(), factory)
    }

    /// Check if a family tag is known.
    pub fn supports(&self, family: &str) -> bool {
        self.factories.contains_key(&family.to_ascii_uppercase())
    }

    /// Known family tags, sorted.
    pub fn families(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    /// Build the handler for one configuration record.
    ///
    /// # Errors
    /// Fails if the record has no type, an unknown type, or an invalid
    /// address.
    pub fn create(&self, config: &DeviceConfig) -> Result<AnyDeviceHandler> {
        let family = config.kind()?;
        let factory = self
            .factories
            .get(&family.to_ascii_uppercase())
            .ok_or_else(|| Error::UnknownDeviceType(family.to_string()))?;
        factory(config.clone())
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AdapterError;
    use crate::handler::{DeviceHandler, HandlerBase, HandlerContext};
    use pinbridge_core::StateValue;
    use rstest::rstest;

    #[derive(Debug)]
    struct Sensor {
        base: HandlerBase,
    }

    impl DeviceHandler for Sensor {
        fn base(&self) -> &HandlerBase {
            &self.base
        }

        fn base_mut(&mut self) -> &mut HandlerBase {
            &mut self.base
        }

        fn start(&mut self, _ctx: &mut HandlerContext<'_>) -> Result<()> {
            self.base.mark_started()
        }

        fn write_output(&mut self, _ctx: &mut HandlerContext<'_>, _pin: usize, _value: StateValue) -> Result<()> {
            Ok(())
        }

        fn read_inputs(&mut self, _ctx: &mut HandlerContext<'_>, _force: bool) -> Result<()> {
            Ok(())
        }
    }

    fn sensor_factory(config: DeviceConfig) -> Result<AnyDeviceHandler> {
        Ok(AnyDeviceHandler::Custom(Box::new(Sensor {
            base: HandlerBase::new("BH1750", &config)?,
        })))
    }

    #[rstest]
    #[case("PCF8574")]
    #[case("pcf8574")]
    #[case("Mcp23017")]
    fn test_builtin_families(#[case] family: &str) {
        let registry = DeviceRegistry::default();
        assert!(registry.supports(family));
        assert!(registry.create(&DeviceConfig::new(0x20, family)).is_ok());
    }

    #[test]
    fn test_families_sorted() {
        assert_eq!(DeviceRegistry::default().families(), vec!["MCP23017", "PCF8574"]);
    }

    #[test]
    fn test_unknown_family() {
        let result = DeviceRegistry::default().create(&DeviceConfig::new(0x20, "XYZ123"));
        assert!(matches!(
            result,
            Err(AdapterError::Core(Error::UnknownDeviceType(family))) if family == "XYZ123"
        ));
    }

    #[test]
    fn test_missing_type() {
        let mut config = DeviceConfig::new(0x20, "PCF8574");
        config.kind = None;
        let result = DeviceRegistry::default().create(&config);
        assert!(matches!(result, Err(AdapterError::Core(Error::MissingConfig(_)))));
    }

    #[test]
    fn test_invalid_address() {
        let result = DeviceRegistry::default().create(&DeviceConfig::new(0x80, "PCF8574"));
        assert!(matches!(result, Err(AdapterError::Core(Error::InvalidAddress(0x80)))));
    }

    #[test]
    fn test_register_custom_family() {
        let mut registry = DeviceRegistry::empty();
        assert!(registry.register("BH1750", sensor_factory).is_none());

        let handler = registry.create(&DeviceConfig::new(0x23, "bh1750")).unwrap();
        assert!(matches!(handler, AnyDeviceHandler::Custom(_)));
        assert_eq!(handler.base().family(), "BH1750");
        assert!(registry.register("bh1750", sensor_factory).is_some());
    }
}
