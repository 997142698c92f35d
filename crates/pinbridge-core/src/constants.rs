//! Protocol and timing constants.
//!
//! Values shared by the bus transport, the device handlers and the adapter
//! runtime. The glitch-read values describe an empirical workaround for the
//! PCF8574 family and must not be applied to other chips.

// ============================================================================
// Addressing
// ============================================================================

/// Highest valid 7-bit bus address.
pub const MAX_BUS_ADDRESS: u8 = 0x7F;

/// First address probed by a bus scan (0x00-0x02 are reserved).
pub const SCAN_FIRST_ADDRESS: u8 = 0x03;

/// Last address probed by a bus scan (0x78-0x7F are reserved).
pub const SCAN_LAST_ADDRESS: u8 = 0x77;

/// Separator between the segments of a hierarchical state id.
pub const STATE_ID_SEPARATOR: char = '.';

/// Namespace the adapter's own state ids live under when none is configured.
pub const DEFAULT_NAMESPACE: &str = "i2c.0";

// ============================================================================
// Timing
// ============================================================================

/// Lower bound for a device polling interval in milliseconds.
///
/// Configured intervals below this value are clamped up to it; an interval of
/// zero disables polling entirely.
pub const MIN_POLLING_INTERVAL_MS: u64 = 50;

// ============================================================================
// PCF8574 (8-bit quasi-bidirectional expander)
// ============================================================================

/// Number of I/O pins on a PCF8574.
pub const PCF8574_PIN_COUNT: usize = 8;

/// Byte a PCF8574 returns after a reset glitch.
pub const GLITCH_READ_VALUE: u8 = 0xFF;

/// Total number of reads attempted while the PCF8574 keeps returning
/// [`GLITCH_READ_VALUE`] on a non-forced read.
pub const GLITCH_READ_ATTEMPTS: usize = 3;

// ============================================================================
// MCP23017 (16-bit expander, big-endian word access)
// ============================================================================

/// Number of I/O pins on an MCP23017 (ports A and B).
pub const MCP23017_PIN_COUNT: usize = 16;

/// I/O direction register pair (1 = input).
pub const MCP23017_IODIR: u8 = 0x00;

/// Input polarity register pair.
pub const MCP23017_IPOL: u8 = 0x02;

/// Pull-up enable register pair.
pub const MCP23017_GPPU: u8 = 0x0C;

/// Port value register pair.
pub const MCP23017_GPIO: u8 = 0x12;

/// Output latch register pair.
pub const MCP23017_OLAT: u8 = 0x14;
