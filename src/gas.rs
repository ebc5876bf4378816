//! Fee bump applied to simulated requests before sending.
//!
//! Gas estimates and fee suggestions drift between simulation and inclusion.
//! `FeeBump` scales the gas limit, max fee and max priority fee by a fixed
//! rational factor so the sent transaction does not fall short.

use crate::ext::PreparedRequest;

/// Rational multiplier applied to gas and fee fields (default: 12/10).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeBump {
    pub numerator: u128,
    pub denominator: u128,
}

impl Default for FeeBump {
    fn default() -> Self {
        Self {
            numerator: 12,
            denominator: 10,
        }
    }
}

impl FeeBump {
    pub fn new(numerator: u128, denominator: u128) -> Self {
        Self {
            numerator,
            denominator: denominator.max(1),
        }
    }

    /// No-op bump.
    pub fn none() -> Self {
        Self::new(1, 1)
    }

    /// Scale a single value, rounding down.
    pub fn scale(&self, value: u128) -> u128 {
        value.saturating_mul(self.numerator) / self.denominator
    }

    /// Apply the bump to gas limit and both EIP-1559 fee fields.
    pub fn apply(&self, mut request: PreparedRequest) -> PreparedRequest {
        let original_gas_limit = request.gas_limit;
        let original_max_fee = request.max_fee_per_gas;

        request.gas_limit = u64::try_from(self.scale(u128::from(request.gas_limit)))
            .unwrap_or(u64::MAX);
        request.max_fee_per_gas = self.scale(request.max_fee_per_gas);
        request.max_priority_fee_per_gas = self.scale(request.max_priority_fee_per_gas);

        tracing::debug!(
            original_gas_limit,
            gas_limit = request.gas_limit,
            original_max_fee,
            max_fee = request.max_fee_per_gas,
            priority_fee = request.max_priority_fee_per_gas,
            numerator = self.numerator,
            denominator = self.denominator,
            "applied fee bump"
        );

        request
    }
}
