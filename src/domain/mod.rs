//! Domain Layer - Core types for the pullback sniper
//!
//! Pure data and rules with no I/O. All external interactions happen through
//! the ports layer.

pub mod price_point;
pub mod volume_gate;
pub mod token;
pub mod position;
pub mod trade;

pub use price_point::{check_ordering, PricePoint};
pub use volume_gate::{is_volume_viable, min_volume_for_age};
pub use token::{LifecycleError, Token, TokenCandidate, TokenStatus};
pub use position::{MomentumPhase, Position, PositionError, BREAKOUT_MARKET_CAP, EXPLOSIVE_MARKET_CAP};
pub use trade::{Alert, AlertKind, EquityCurve, EquityPoint, ExitReason, Trade, INITIAL_CAPITAL_USD};
