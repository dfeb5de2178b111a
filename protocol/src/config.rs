//! # Kernel Configuration & Constants
//!
//! Every magic number in Crown lives here. Contracts, tests and the
//! scenario runner all read from this module, so a constant that appears
//! anywhere else is a bug waiting to happen.

// ---------------------------------------------------------------------------
// Versioning
// ---------------------------------------------------------------------------

/// Kernel version string, reported by `crown-node version`.
pub const KERNEL_VERSION: &str = "0.1.0";

/// Version of the scenario file format accepted by the runner.
pub const SCENARIO_FORMAT_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Principals & Roles
// ---------------------------------------------------------------------------

/// Length of a principal address in bytes. Twenty, like every EVM-shaped
/// ledger out there.
pub const ADDRESS_LENGTH: usize = 20;

/// Length of a role tag in bytes.
pub const ROLE_LENGTH: usize = 32;

/// BLAKE3 `derive_key` context for role tags.
pub const ROLE_HASH_CONTEXT: &str = "crown 2026 role tag v1";

/// BLAKE3 `derive_key` context for label-derived principals.
pub const ADDRESS_HASH_CONTEXT: &str = "crown 2026 principal address v1";

/// The super-role. Holding it satisfies every role gate.
pub const KING_ROLE_NAME: &str = "KING_ROLE";

/// Gate for the external `mint` entry point.
pub const MINTER_ROLE_NAME: &str = "MINTER_ROLE";

/// Gate for the external `burn_from` entry point.
pub const BURNER_ROLE_NAME: &str = "BURNER_ROLE";

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// Display precision of every Crown token. Fixed; not configurable.
pub const TOKEN_DECIMALS: u8 = 18;

/// An allowance equal to this value never depletes on spend.
pub const UNLIMITED_ALLOWANCE: u128 = u128::MAX;

// ---------------------------------------------------------------------------
// Runner
// ---------------------------------------------------------------------------

/// Default tracing filter when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "crown_node=info,crown_contracts=info";

/// Scenario file the runner looks for when none is given.
pub const DEFAULT_SCENARIO_FILE: &str = "scenario.json";
