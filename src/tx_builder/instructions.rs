//! Compute budget instruction handling
//!
//! Every attempt rebuilds its instruction list from the caller's base instructions:
//! any compute budget instruction the caller supplied is stripped, then the
//! attempt's limit and price are prepended.
//!
//! Order: compute unit limit → compute unit price → program instructions

use solana_sdk::{compute_budget::ComputeBudgetInstruction, instruction::Instruction};

/// Runtime ceiling on a transaction's compute unit limit
pub const MAX_COMPUTE_UNIT_LIMIT: u32 = 1_400_000;

/// Per-retry growth of the compute unit limit
pub const COMPUTE_ESCALATION_FACTOR: f64 = 1.1;

/// Compute unit limit for a 0-based attempt: `base × 1.1^attempt`, capped at the runtime max
pub fn escalated_compute_limit(base: u32, attempt: u32) -> u32 {
    let scaled = (base as f64 * COMPUTE_ESCALATION_FACTOR.powi(attempt as i32)).round();
    if scaled >= MAX_COMPUTE_UNIT_LIMIT as f64 {
        MAX_COMPUTE_UNIT_LIMIT
    } else {
        scaled as u32
    }
}

#[inline]
pub fn is_compute_budget_instruction(ix: &Instruction) -> bool {
    ix.program_id == solana_sdk::compute_budget::id()
}

/// Drop every compute budget instruction, keeping the rest in order
pub fn strip_compute_budget(instructions: &[Instruction]) -> Vec<Instruction> {
    instructions
        .iter()
        .filter(|ix| !is_compute_budget_instruction(ix))
        .cloned()
        .collect()
}

/// Base instructions with a fresh compute budget prefix.
///
/// A zero `cu_limit` or `priority_fee_micro_lamports` skips that instruction.
pub fn with_compute_budget(
    instructions: &[Instruction],
    cu_limit: u32,
    priority_fee_micro_lamports: u64,
) -> Vec<Instruction> {
    let mut planned = Vec::with_capacity(instructions.len() + 2);

    if cu_limit > 0 {
        planned.push(ComputeBudgetInstruction::set_compute_unit_limit(cu_limit));
    }
    if priority_fee_micro_lamports > 0 {
        planned.push(ComputeBudgetInstruction::set_compute_unit_price(
            priority_fee_micro_lamports,
        ));
    }

    planned.extend(strip_compute_budget(instructions));
    planned
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::{instruction::AccountMeta, pubkey::Pubkey};

    fn program_ix() -> Instruction {
        Instruction::new_with_bytes(
            Pubkey::new_unique(),
            &[1, 2, 3, 4],
            vec![AccountMeta::new(Pubkey::new_unique(), false)],
        )
    }

    #[test]
    fn test_escalation() {
        assert_eq!(escalated_compute_limit(300_000, 0), 300_000);
        assert_eq!(escalated_compute_limit(300_000, 1), 330_000);
        assert_eq!(escalated_compute_limit(300_000, 2), 363_000);
        assert_eq!(escalated_compute_limit(1_300_000, 1), MAX_COMPUTE_UNIT_LIMIT);
        assert_eq!(escalated_compute_limit(0, 3), 0);
    }

    #[test]
    fn test_reinjection_replaces_existing_budget() {
        let ix = program_ix();
        let original = vec![
            ComputeBudgetInstruction::set_compute_unit_limit(100_000),
            ix.clone(),
            ComputeBudgetInstruction::set_compute_unit_price(1),
        ];

        let planned = with_compute_budget(&original, 330_000, 200_000);

        assert_eq!(planned.len(), 3);
        assert_eq!(planned[0], ComputeBudgetInstruction::set_compute_unit_limit(330_000));
        assert_eq!(planned[1], ComputeBudgetInstruction::set_compute_unit_price(200_000));
        assert_eq!(planned[2], ix);
    }

    #[test]
    fn test_zero_values_skip_instructions() {
        let ix = program_ix();
        let planned = with_compute_budget(&[ix.clone()], 0, 0);
        assert_eq!(planned, vec![ix.clone()]);

        let planned = with_compute_budget(&[ix], 200_000, 0);
        assert_eq!(planned.len(), 2);
        assert!(is_compute_budget_instruction(&planned[0]));
    }

    #[test]
    fn test_strip() {
        let ix = program_ix();
        let stripped = strip_compute_budget(&[
            ComputeBudgetInstruction::set_compute_unit_price(5),
            ix.clone(),
        ]);
        assert_eq!(stripped, vec![ix]);
    }
}
