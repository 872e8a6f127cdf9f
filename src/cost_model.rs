//! Fee and rent-exemption arithmetic used to pre-validate spendable balance.
//!
//! Everything here is pure: no I/O and no shared state beyond the constants below.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Signature fee charged for every transaction
pub const BASE_FEE_LAMPORTS: u64 = 5_000;

/// Rent rate per byte-year
pub const LAMPORTS_PER_BYTE_YEAR: u64 = 3_480;

/// Years of rent an account must hold to be exempt
pub const EXEMPTION_YEARS: f64 = 2.0;

/// Per-account storage overhead added to the data size
pub const ACCOUNT_STORAGE_OVERHEAD: u64 = 128;

const MICRO_LAMPORTS_PER_LAMPORT: u128 = 1_000_000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CostError {
    #[error("Unknown account type: {0}")]
    UnknownAccountType(String),
}

/// Account kinds a transaction may create, with their fixed data sizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Basic,
    Token,
    Mint,
    Multisig,
}

impl AccountType {
    pub fn data_size(&self) -> u64 {
        match self {
            AccountType::Basic => 0,
            AccountType::Token => 165,
            AccountType::Mint => 82,
            AccountType::Multisig => 355,
        }
    }
}

impl std::str::FromStr for AccountType {
    type Err = CostError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "basic" => Ok(AccountType::Basic),
            "token" => Ok(AccountType::Token),
            "mint" => Ok(AccountType::Mint),
            "multisig" => Ok(AccountType::Multisig),
            other => Err(CostError::UnknownAccountType(other.to_string())),
        }
    }
}

/// Derived cost of one transaction; recomputed per validation, never stored
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub base_fee_lamports: u64,
    pub priority_fee_lamports: u64,
    /// One entry per account created, in request order
    pub rent_required_lamports: Vec<(AccountType, u64)>,
    pub buffer_lamports: u64,
    pub total_lamports: u64,
}

impl CostBreakdown {
    pub fn total_rent(&self) -> u64 {
        self.rent_required_lamports.iter().map(|(_, r)| *r).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceCheck {
    pub is_valid: bool,
    /// Lamports missing; zero when valid
    pub shortfall: u64,
}

/// Base fee plus the priority fee for `compute_unit_limit` units, rounded up
pub fn transaction_fee(priority_fee_micro_lamports: u64, compute_unit_limit: u32) -> u64 {
    let micro = priority_fee_micro_lamports as u128 * compute_unit_limit as u128;
    let priority = micro.div_ceil(MICRO_LAMPORTS_PER_LAMPORT);
    BASE_FEE_LAMPORTS.saturating_add(u64::try_from(priority).unwrap_or(u64::MAX))
}

fn priority_fee(priority_fee_micro_lamports: u64, compute_unit_limit: u32) -> u64 {
    transaction_fee(priority_fee_micro_lamports, compute_unit_limit) - BASE_FEE_LAMPORTS
}

/// Lamports an account of `account_type` must hold to be rent exempt
pub fn rent_exemption(account_type: AccountType) -> u64 {
    let bytes = account_type.data_size() + ACCOUNT_STORAGE_OVERHEAD;
    ((bytes * LAMPORTS_PER_BYTE_YEAR) as f64 * EXEMPTION_YEARS).ceil() as u64
}

/// Like [`rent_exemption`] for a caller-supplied type name
pub fn rent_exemption_for(name: &str) -> Result<u64, CostError> {
    Ok(rent_exemption(name.parse()?))
}

/// Fee plus rent for every account created, with an optional 10% buffer over the rent
pub fn total_cost(
    priority_fee_micro_lamports: u64,
    compute_unit_limit: u32,
    accounts_to_create: &[AccountType],
    include_buffer: bool,
) -> CostBreakdown {
    let rent_required_lamports: Vec<(AccountType, u64)> = accounts_to_create
        .iter()
        .map(|t| (*t, rent_exemption(*t)))
        .collect();
    let total_rent: u64 = rent_required_lamports.iter().map(|(_, r)| *r).sum();
    let buffer_lamports = if include_buffer {
        total_rent.div_ceil(10)
    } else {
        0
    };
    let priority_fee_lamports = priority_fee(priority_fee_micro_lamports, compute_unit_limit);

    CostBreakdown {
        base_fee_lamports: BASE_FEE_LAMPORTS,
        priority_fee_lamports,
        total_lamports: BASE_FEE_LAMPORTS
            .saturating_add(priority_fee_lamports)
            .saturating_add(total_rent)
            .saturating_add(buffer_lamports),
        rent_required_lamports,
        buffer_lamports,
    }
}

/// [`total_cost`] over account type names, failing on the first unknown name
pub fn total_cost_for_names(
    priority_fee_micro_lamports: u64,
    compute_unit_limit: u32,
    account_types: &[&str],
    include_buffer: bool,
) -> Result<CostBreakdown, CostError> {
    let types = account_types
        .iter()
        .map(|name| name.parse())
        .collect::<Result<Vec<AccountType>, _>>()?;
    Ok(total_cost(
        priority_fee_micro_lamports,
        compute_unit_limit,
        &types,
        include_buffer,
    ))
}

/// Check that `balance` covers the cost plus whatever else the caller will spend
pub fn validate_balance(balance: u64, cost: &CostBreakdown, additional_spend: u64) -> BalanceCheck {
    let required = cost.total_lamports.saturating_add(additional_spend);
    let shortfall = required.saturating_sub(balance);
    BalanceCheck {
        is_valid: shortfall == 0,
        shortfall,
    }
}
